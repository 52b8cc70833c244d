//! Multi-segment consistency orchestration
//!
//! Drives two job shapes with different concurrency for a reason:
//!
//! - **Restyle runs** process segments strictly in order, because segment
//!   `i > 0` may depend on the accepted output of segment 0 (the
//!   consistency reference). Parallelizing would break style propagation.
//! - **Whole-page section generation** has no cross-section dependency, so
//!   sections run concurrently under an explicit semaphore bound, joined
//!   all-settled: one failed section never fails the batch.
//!
//! Per-segment failures are isolated; only run-level validation failures
//! propagate, and those are converted into a terminal `error` progress
//! event before returning.

use crate::broker::{EditRequest, EditResult, GenerativeEditBroker, InlineImage};
use crate::compositor::SafeguardCompositor;
use crate::config::{EditConfig, RestyleStyle};
use crate::error::{MaskGuardError, Result};
use crate::repair::BorderArtifactRepair;
use crate::services::format::encode_png;
use crate::services::progress::{ProgressEvent, ProgressSink};
use crate::storage::{
    restyle_filename, section_filename, BlobStore, EditAction, EditHistoryEntry, EditLedger,
    GeneratedImageRecord,
};
use crate::types::{
    RestyleSummary, SectionBatchSummary, SectionOutcome, SectionRequest, SegmentJob,
    SegmentOutcome, SegmentRole, SegmentState,
};
use chrono::Utc;
use image::DynamicImage;
use log::warn;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::instrument;

/// Default storage bucket for generated frames
const DEFAULT_BUCKET: &str = "generated-images";

/// Drives multi-segment restyle runs and whole-page section batches
pub struct SegmentConsistencyOrchestrator {
    broker: GenerativeEditBroker,
    blobs: Arc<dyn BlobStore>,
    ledger: Arc<dyn EditLedger>,
    config: EditConfig,
    bucket: String,
}

impl SegmentConsistencyOrchestrator {
    /// Create an orchestrator over the given broker and collaborators
    #[must_use]
    pub fn new(
        broker: GenerativeEditBroker,
        blobs: Arc<dyn BlobStore>,
        ledger: Arc<dyn EditLedger>,
        config: EditConfig,
    ) -> Self {
        Self {
            broker,
            blobs,
            ledger,
            config,
            bucket: DEFAULT_BUCKET.to_string(),
        }
    }

    /// Override the storage bucket
    #[must_use]
    pub fn with_bucket<S: Into<String>>(mut self, bucket: S) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Run a multi-segment restyle, sequentially and in segment order.
    ///
    /// Segment 0's accepted result becomes the consistency reference for
    /// later segments (unless the configured style is the identity
    /// "sampling" style). A segment whose retries exhaust is logged and
    /// skipped; the run continues and the failure is reflected in the
    /// summary. Exactly one terminal progress event is emitted.
    ///
    /// # Errors
    /// Returns `MaskGuardError::Validation` for an empty job list, after
    /// emitting a terminal `error` event.
    pub async fn run_restyle(
        &self,
        jobs: &[SegmentJob],
        progress: &dyn ProgressSink,
    ) -> Result<RestyleSummary> {
        progress.emit(ProgressEvent::init());

        if jobs.is_empty() {
            let err = MaskGuardError::validation("restyle requires at least one segment");
            progress.emit(ProgressEvent::error(err.user_message()));
            return Err(err);
        }

        progress.emit(ProgressEvent::setup("preparing segment payloads"));

        let total = jobs.len();
        let mut reference: Option<InlineImage> = None;
        let mut segments = Vec::with_capacity(total);

        for (position, job) in jobs.iter().enumerate() {
            progress.emit(ProgressEvent::processing(position + 1, total));

            let (outcome, new_reference) =
                self.process_segment(job, reference.as_ref(), position).await;

            if job.order_index == 0 && !self.config.style.is_identity() {
                if let Some(accepted) = new_reference {
                    reference = Some(accepted);
                }
            }
            segments.push(outcome);
        }

        let updated_count = segments
            .iter()
            .filter(|s| s.state == SegmentState::Succeeded)
            .count();

        progress.emit(ProgressEvent::complete(updated_count, total));

        Ok(RestyleSummary {
            updated_count,
            total_count: total,
            segments,
        })
    }

    /// Process one segment to a terminal state. Failures are absorbed into
    /// the outcome; this never fails the run.
    #[instrument(
        skip(self, job, reference),
        fields(segment = job.order_index, section = %job.section_id)
    )]
    async fn process_segment(
        &self,
        job: &SegmentJob,
        reference: Option<&InlineImage>,
        position: usize,
    ) -> (SegmentOutcome, Option<InlineImage>) {
        let failed = || SegmentOutcome {
            order_index: job.order_index,
            state: SegmentState::Failed,
            image_url: None,
        };

        let dimensions = (job.image.width(), job.image.height());
        let source_bytes = match encode_png(&job.image) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("segment {}: failed to encode source: {e}", job.order_index);
                return (failed(), None);
            },
        };

        let attach_reference = !self.config.style.is_identity()
            && job.order_index > 0
            && reference.is_some();
        let temperature = self.config.aggressiveness.temperature(attach_reference);
        let instruction = restyle_instruction(
            job.role,
            self.config.style,
            self.config.aggressiveness,
            attach_reference,
        );

        let mut request = EditRequest::new(InlineImage::png(source_bytes), instruction.clone())
            .with_temperature(temperature);
        request.size_hint = Some(dimensions);
        if attach_reference {
            if let Some(reference) = reference {
                request = request.with_style_reference(reference.clone());
            }
        }

        let generated = match self.broker.submit(&request, &self.config.retry_policy).await {
            Ok(EditResult::Edited { image, .. }) => image,
            Ok(EditResult::Failed { kind, message, attempts }) => {
                warn!(
                    "segment {} failed after {attempts} attempt(s) ({kind:?}): {message}",
                    job.order_index
                );
                return (failed(), None);
            },
            Err(e) => {
                warn!("segment {} submission rejected: {e}", job.order_index);
                return (failed(), None);
            },
        };

        // Whole-frame mode: the segment was intentionally replaced, only
        // its slot dimensions are enforced
        let mut composited = SafeguardCompositor::apply_whole_frame(dimensions, &generated);
        if self.config.repair_border_artifacts {
            let frame = DynamicImage::ImageRgba8(composited);
            if BorderArtifactRepair::has_red_border(&frame) {
                composited = BorderArtifactRepair::repair(&frame);
            } else {
                composited = frame.to_rgba8();
            }
        }
        let final_image = DynamicImage::ImageRgba8(composited);

        let new_reference = match encode_png(&final_image) {
            Ok(bytes) => Some(InlineImage::png(bytes)),
            Err(e) => {
                warn!("segment {}: failed to encode result: {e}", job.order_index);
                None
            },
        };
        let Some(ref accepted_payload) = new_reference else {
            return (failed(), None);
        };

        let url = match self
            .persist_frame(
                accepted_payload.bytes.clone(),
                restyle_filename(Utc::now(), job.order_index),
                dimensions,
                &job.section_id,
                job.previous_image_id.clone(),
                EditAction::Restyle,
                &instruction,
            )
            .await
        {
            Ok(url) => url,
            Err(e) => {
                // Fatal for this segment only; the run continues
                warn!("segment {}: {e}", job.order_index);
                return (failed(), None);
            },
        };

        (
            SegmentOutcome {
                order_index: job.order_index,
                state: SegmentState::Succeeded,
                image_url: Some(url),
            },
            new_reference,
        )
    }

    /// Generate independent whole-page sections with bounded concurrency.
    ///
    /// All sections are launched under a semaphore bound and joined
    /// all-settled: a failed section is recorded with `image_url: None`
    /// and surfaced in the summary, never failing the batch.
    ///
    /// # Errors
    /// Returns `MaskGuardError::Validation` for an empty request list,
    /// after emitting a terminal `error` event.
    pub async fn generate_sections(
        &self,
        requests: &[SectionRequest],
        progress: &dyn ProgressSink,
    ) -> Result<SectionBatchSummary> {
        progress.emit(ProgressEvent::init());

        if requests.is_empty() {
            let err = MaskGuardError::validation("section batch requires at least one section");
            progress.emit(ProgressEvent::error(err.user_message()));
            return Err(err);
        }

        let total = requests.len();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_sections));

        let tasks = requests.iter().enumerate().map(|(index, section)| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        warn!("section '{}': semaphore closed: {e}", section.section_id);
                        return SectionOutcome {
                            section_id: section.section_id.clone(),
                            image_url: None,
                        };
                    },
                };
                progress.emit(ProgressEvent::processing(index + 1, total));
                self.generate_one_section(section).await
            }
        });

        let outcomes = futures::future::join_all(tasks).await;

        let succeeded = outcomes.iter().filter(|o| o.image_url.is_some()).count();
        let failed = total - succeeded;

        progress.emit(ProgressEvent::complete(succeeded, total));

        Ok(SectionBatchSummary {
            succeeded,
            failed,
            outcomes,
        })
    }

    /// Generate and persist one section. Failures are absorbed into the
    /// outcome.
    #[instrument(skip(self, section), fields(section = %section.section_id))]
    async fn generate_one_section(&self, section: &SectionRequest) -> SectionOutcome {
        let failed = || SectionOutcome {
            section_id: section.section_id.clone(),
            image_url: None,
        };

        let mut request =
            EditRequest::generation(section.prompt.clone(), (section.width, section.height));
        if let Some(style) = &section.design_style {
            request = request.with_design_style(style.clone());
        }

        let generated = match self.broker.submit(&request, &self.config.retry_policy).await {
            Ok(EditResult::Edited { image, .. }) => image,
            Ok(EditResult::Failed { kind, message, .. }) => {
                warn!(
                    "section '{}' failed ({kind:?}): {message}",
                    section.section_id
                );
                return failed();
            },
            Err(e) => {
                warn!("section '{}' submission rejected: {e}", section.section_id);
                return failed();
            },
        };

        let dimensions = (section.width, section.height);
        let composited = SafeguardCompositor::apply_whole_frame(dimensions, &generated);
        let final_image = DynamicImage::ImageRgba8(composited);

        let bytes = match encode_png(&final_image) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("section '{}': failed to encode result: {e}", section.section_id);
                return failed();
            },
        };

        match self
            .persist_frame(
                bytes,
                section_filename(Utc::now(), &section.section_id),
                dimensions,
                &section.section_id,
                None,
                EditAction::SectionGenerate,
                &section.prompt,
            )
            .await
        {
            Ok(url) => SectionOutcome {
                section_id: section.section_id.clone(),
                image_url: Some(url),
            },
            Err(e) => {
                warn!("section '{}': {e}", section.section_id);
                failed()
            },
        }
    }

    /// Upload a frame and record it in the ledger: new image row, section
    /// pointer update, and an append-only history fact
    #[allow(clippy::too_many_arguments)]
    async fn persist_frame(
        &self,
        bytes: Vec<u8>,
        filename: String,
        dimensions: (u32, u32),
        section_id: &str,
        previous_image_id: Option<String>,
        action: EditAction,
        prompt: &str,
    ) -> Result<String> {
        let url = self
            .blobs
            .upload(&self.bucket, &filename, bytes, "image/png")
            .await?;

        let image_id = self
            .ledger
            .record_generated_image(GeneratedImageRecord {
                url: url.clone(),
                width: dimensions.0,
                height: dimensions.1,
            })
            .await?;
        self.ledger
            .update_section_pointer(section_id, &image_id)
            .await?;
        self.ledger
            .append_history(EditHistoryEntry {
                previous_image_id,
                new_image_id: image_id,
                action,
                prompt: prompt.to_string(),
            })
            .await?;

        Ok(url)
    }
}

/// Instruction text for one restyle segment
fn restyle_instruction(
    role: SegmentRole,
    style: RestyleStyle,
    aggressiveness: crate::config::EditAggressiveness,
    with_reference: bool,
) -> String {
    let mut text = String::from(role.framing());
    text.push(' ');

    if style.is_identity() {
        text.push_str("Regenerate this section faithfully, preserving its current style.");
    } else {
        text.push_str(&format!("Redraw this section in {}.", style.descriptor()));
    }

    match aggressiveness {
        crate::config::EditAggressiveness::Conservative => {
            text.push_str(" Preserve the existing layout and element positions.");
        },
        crate::config::EditAggressiveness::Aggressive => {
            text.push_str(" You may recompose the layout where it improves the design.");
        },
    }

    if with_reference {
        text.push_str(
            " Match the visual style of the attached reference image exactly: \
             background and gradient treatment, button shape and corner radius, \
             font style, icon style, shadow strength, and decorative elements.",
        );
    }

    text
}
