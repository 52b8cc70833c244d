//! Generative edit broker
//!
//! The resilient wrapper around the external model call. Each attempt-cycle
//! tries the primary endpoint and, on failure or an imageless response, the
//! fallback endpoint with the same payload. Attempt-cycles are separated by
//! exponential backoff and capped by the retry policy. The broker is always
//! awaited to completion; retries never run concurrently.

use crate::backends::{ContentPart, GenerationParams, GenerativeModel, ModelRequest};
use crate::config::RetryPolicy;
use crate::error::{MaskGuardError, Result};
use crate::types::DesignStyle;
use image::DynamicImage;
use log::{debug, warn};
use std::future::Future;
use std::sync::Arc;

/// Inline image payload attached to an edit request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    /// Encoded image bytes
    pub bytes: Vec<u8>,
    /// MIME type of the encoded bytes
    pub mime_type: String,
}

impl InlineImage {
    /// PNG-encoded payload
    #[must_use]
    pub fn png(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime_type: "image/png".to_string(),
        }
    }
}

/// One edit request for the broker
#[derive(Debug, Clone)]
pub struct EditRequest {
    /// Source image the model should edit; absent for pure generation
    pub source_image: Option<InlineImage>,
    /// Instruction text
    pub instruction: String,
    /// Previously accepted image attached to bias visual consistency
    pub style_reference: Option<InlineImage>,
    /// Opaque style descriptor, forwarded verbatim into the instruction
    pub design_style: Option<DesignStyle>,
    /// Sampling temperature
    pub temperature: f32,
    /// Optional output size hint (width, height)
    pub size_hint: Option<(u32, u32)>,
}

impl EditRequest {
    /// Create an edit request over a source image
    #[must_use]
    pub fn new(source_image: InlineImage, instruction: String) -> Self {
        Self {
            source_image: Some(source_image),
            instruction,
            style_reference: None,
            design_style: None,
            temperature: 0.15,
            size_hint: None,
        }
    }

    /// Create a generation request with no source image
    #[must_use]
    pub fn generation(instruction: String, size_hint: (u32, u32)) -> Self {
        Self {
            source_image: None,
            instruction,
            style_reference: None,
            design_style: None,
            temperature: 0.35,
            size_hint: Some(size_hint),
        }
    }

    /// Attach a style reference image
    #[must_use]
    pub fn with_style_reference(mut self, reference: InlineImage) -> Self {
        self.style_reference = Some(reference);
        self
    }

    /// Attach an opaque design style descriptor
    #[must_use]
    pub fn with_design_style(mut self, style: DesignStyle) -> Self {
        self.design_style = Some(style);
        self
    }

    /// Set the sampling temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Validate the request before submission
    ///
    /// # Errors
    /// Returns `MaskGuardError::Validation` for a missing instruction
    pub fn validate(&self) -> Result<()> {
        if self.instruction.trim().is_empty() {
            return Err(MaskGuardError::validation("instruction text is required"));
        }
        Ok(())
    }

    /// Build the provider payload: source image, then the style reference
    /// as a second image input, then the instruction text with the design
    /// style interpolated
    #[must_use]
    pub fn to_model_request(&self) -> ModelRequest {
        let mut parts = Vec::new();
        if let Some(source) = &self.source_image {
            parts.push(ContentPart::InlineImage {
                mime_type: source.mime_type.clone(),
                data: source.bytes.clone(),
            });
        }
        if let Some(reference) = &self.style_reference {
            parts.push(ContentPart::InlineImage {
                mime_type: reference.mime_type.clone(),
                data: reference.bytes.clone(),
            });
        }

        let text = match &self.design_style {
            Some(style) => format!("{}\nDesired design style: {style}.", self.instruction),
            None => self.instruction.clone(),
        };
        parts.push(ContentPart::Text(text));

        ModelRequest {
            parts,
            params: GenerationParams {
                temperature: self.temperature,
                size_hint: self.size_hint,
            },
        }
    }
}

/// Which failure mode dominated an exhausted submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditFailureKind {
    /// Transport failure or non-success status from both endpoints
    UpstreamUnavailable,
    /// Responses arrived but carried no usable image part
    NoImageInResponse,
}

impl EditFailureKind {
    /// Convert to the pipeline error type with the given message
    #[must_use]
    pub fn into_error(self, message: String) -> MaskGuardError {
        match self {
            Self::UpstreamUnavailable => MaskGuardError::UpstreamUnavailable(message),
            Self::NoImageInResponse => MaskGuardError::NoImageInResponse(message),
        }
    }
}

/// Outcome of a broker submission.
///
/// A submission that exhausts its retries is a first-class value, distinct
/// from a transport `Err`: the caller decides whether that fails the job.
#[derive(Debug)]
pub enum EditResult {
    /// The model produced an image
    Edited {
        /// Decoded result frame
        image: DynamicImage,
        /// Endpoint that produced the accepted frame
        model_id: String,
        /// Attempt-cycles consumed
        attempts: u32,
    },
    /// Retries exhausted without a usable image
    Failed {
        /// Dominant failure mode across attempts
        kind: EditFailureKind,
        /// Last failure message (internal; not user-facing)
        message: String,
        /// Attempt-cycles consumed
        attempts: u32,
    },
}

impl EditResult {
    /// Whether the submission produced an image
    #[must_use]
    pub fn is_edited(&self) -> bool {
        matches!(self, Self::Edited { .. })
    }

    /// Convert into a `Result`, turning an exhausted submission into its
    /// corresponding typed error
    pub fn into_result(self) -> Result<(DynamicImage, String, u32)> {
        match self {
            Self::Edited {
                image,
                model_id,
                attempts,
            } => Ok((image, model_id, attempts)),
            Self::Failed { kind, message, .. } => Err(kind.into_error(message)),
        }
    }
}

/// Tagged outcome of a retried operation
#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    /// The operation succeeded
    Success {
        /// The operation's value
        value: T,
        /// Attempts consumed, including the successful one
        attempts: u32,
    },
    /// Every attempt failed
    Exhausted {
        /// One error per attempt, in attempt order
        errors: Vec<E>,
    },
}

/// Run `operation` up to `policy.max_attempts` times, sleeping the policy's
/// exponential backoff between failed attempts. No sleep is taken after the
/// final attempt. The operation receives the zero-based attempt index.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut operation: F) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    let mut errors = Vec::new();
    for attempt in 0..policy.max_attempts {
        match operation(attempt).await {
            Ok(value) => {
                return RetryOutcome::Success {
                    value,
                    attempts: attempt + 1,
                }
            },
            Err(error) => {
                errors.push(error);
                if attempt + 1 < policy.max_attempts {
                    tokio::time::sleep(policy.backoff_delay(attempt)).await;
                }
            },
        }
    }
    RetryOutcome::Exhausted { errors }
}

/// One attempt-cycle's failure, classified for dominance accounting
#[derive(Debug)]
struct AttemptFailure {
    kind: EditFailureKind,
    message: String,
}

/// Resilient wrapper around the external generative model call
pub struct GenerativeEditBroker {
    primary: Arc<dyn GenerativeModel>,
    fallback: Arc<dyn GenerativeModel>,
}

impl GenerativeEditBroker {
    /// Create a broker over a primary and a fallback endpoint.
    ///
    /// The fallback is tried only after the primary fails outright or
    /// responds without an image; it is not a quality alternative.
    #[must_use]
    pub fn new(primary: Arc<dyn GenerativeModel>, fallback: Arc<dyn GenerativeModel>) -> Self {
        Self { primary, fallback }
    }

    /// Submit an edit request under the given retry policy.
    ///
    /// # Errors
    /// Returns `MaskGuardError::Validation` for a malformed request. An
    /// exhausted retry budget is NOT an `Err`: it comes back as
    /// [`EditResult::Failed`].
    pub async fn submit(&self, request: &EditRequest, policy: &RetryPolicy) -> Result<EditResult> {
        request.validate()?;
        let model_request = request.to_model_request();

        match with_retry(policy, |_attempt| self.attempt_cycle(&model_request)).await {
            RetryOutcome::Success {
                value: (image, model_id),
                attempts,
            } => {
                debug!("edit accepted from '{model_id}' after {attempts} attempt(s)");
                Ok(EditResult::Edited {
                    image,
                    model_id,
                    attempts,
                })
            },
            RetryOutcome::Exhausted { errors } => {
                let attempts = errors.len() as u32;
                let no_image = errors
                    .iter()
                    .filter(|e| e.kind == EditFailureKind::NoImageInResponse)
                    .count();
                let upstream = errors.len() - no_image;
                // Ties go to the more actionable transport signal
                let kind = if no_image > upstream {
                    EditFailureKind::NoImageInResponse
                } else {
                    EditFailureKind::UpstreamUnavailable
                };
                let message = errors
                    .last()
                    .map_or_else(|| "no attempts were made".to_string(), |e| e.message.clone());
                warn!("edit failed after {attempts} attempt(s): {message}");
                Ok(EditResult::Failed {
                    kind,
                    message,
                    attempts,
                })
            },
        }
    }

    /// One attempt-cycle: primary, then fallback with the same payload
    async fn attempt_cycle(
        &self,
        request: &ModelRequest,
    ) -> std::result::Result<(DynamicImage, String), AttemptFailure> {
        let mut saw_no_image = false;
        let mut messages = Vec::new();

        for model in [&self.primary, &self.fallback] {
            let model_id = model.model_id();
            match model.generate(request).await {
                Ok(response) => {
                    let diagnostic = response.joined_text();
                    if !diagnostic.is_empty() {
                        debug!("'{model_id}' diagnostic text: {diagnostic}");
                    }
                    match response.first_inline_image() {
                        Some((_mime, data)) => match image::load_from_memory(data) {
                            Ok(image) => return Ok((image, model_id.to_string())),
                            Err(e) => {
                                saw_no_image = true;
                                messages
                                    .push(format!("'{model_id}' returned undecodable image: {e}"));
                            },
                        },
                        None => {
                            saw_no_image = true;
                            messages.push(format!("'{model_id}' response contained no image part"));
                        },
                    }
                },
                Err(e) => {
                    warn!("'{model_id}' call failed: {e}");
                    messages.push(format!("'{model_id}': {e}"));
                },
            }
        }

        Err(AttemptFailure {
            kind: if saw_no_image {
                EditFailureKind::NoImageInResponse
            } else {
                EditFailureKind::UpstreamUnavailable
            },
            message: messages.join("; "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::{MockGenerativeModel, MockReply};

    fn request() -> EditRequest {
        EditRequest::new(
            InlineImage::png(crate::backends::test_utils::solid_png(
                8,
                8,
                [0, 0, 0, 255],
            )),
            "remove the logo".to_string(),
        )
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff_base_ms: 4000,
        }
    }

    #[test]
    fn test_payload_part_order() {
        let reference = InlineImage::png(vec![7, 7]);
        let model_request = request()
            .with_style_reference(reference)
            .with_temperature(0.1)
            .to_model_request();
        assert_eq!(model_request.image_part_count(), 2);
        // Source image first, reference second, text last
        assert!(matches!(
            model_request.parts[0],
            ContentPart::InlineImage { .. }
        ));
        assert!(matches!(
            model_request.parts[2],
            ContentPart::Text(ref t) if t.contains("remove the logo")
        ));
        assert!((model_request.params.temperature - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn test_design_style_is_interpolated_verbatim() {
        let style = DesignStyle {
            palette: "neon".to_string(),
            typography_mood: "brutalist".to_string(),
            layout_density: "dense".to_string(),
        };
        let model_request = request().with_design_style(style).to_model_request();
        let text = model_request.joined_text();
        assert!(text.contains("neon"));
        assert!(text.contains("brutalist"));
        assert!(text.contains("dense"));
    }

    #[test]
    fn test_empty_instruction_is_rejected() {
        let mut bad = request();
        bad.instruction = "   ".to_string();
        assert!(bad.validate().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_bound_and_total_backoff() {
        let primary = Arc::new(MockGenerativeModel::always_unavailable("primary"));
        let fallback = Arc::new(MockGenerativeModel::always_unavailable("fallback"));
        let broker = GenerativeEditBroker::new(primary.clone(), fallback.clone());

        let started = tokio::time::Instant::now();
        let result = broker.submit(&request(), &policy()).await.unwrap();

        // Exactly max_attempts cycles, each touching both endpoints
        assert_eq!(primary.call_count(), 3);
        assert_eq!(fallback.call_count(), 3);
        // Total wait: 4s + 8s, no wait after the final attempt
        assert_eq!(started.elapsed(), std::time::Duration::from_secs(12));

        match result {
            EditResult::Failed {
                kind, attempts, ..
            } => {
                assert_eq!(kind, EditFailureKind::UpstreamUnavailable);
                assert_eq!(attempts, 3);
            },
            EditResult::Edited { .. } => panic!("submission cannot succeed"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_image_dominance() {
        let primary = Arc::new(MockGenerativeModel::always_text_only("primary"));
        let fallback = Arc::new(MockGenerativeModel::always_unavailable("fallback"));
        let broker = GenerativeEditBroker::new(primary, fallback);

        let result = broker.submit(&request(), &policy()).await.unwrap();
        match result {
            EditResult::Failed { kind, .. } => {
                assert_eq!(kind, EditFailureKind::NoImageInResponse);
            },
            EditResult::Edited { .. } => panic!("submission cannot succeed"),
        }
    }

    #[tokio::test]
    async fn test_fallback_rescues_failed_primary() {
        let primary = Arc::new(MockGenerativeModel::always_unavailable("primary"));
        let fallback = Arc::new(MockGenerativeModel::always_image("fallback", 8, 8));
        let broker = GenerativeEditBroker::new(primary.clone(), fallback.clone());

        let result = broker.submit(&request(), &policy()).await.unwrap();
        match result {
            EditResult::Edited {
                model_id, attempts, ..
            } => {
                assert_eq!(model_id, "fallback");
                assert_eq!(attempts, 1);
            },
            EditResult::Failed { .. } => panic!("fallback should have rescued the attempt"),
        }
        assert_eq!(primary.call_count(), 1);
        assert_eq!(fallback.call_count(), 1);
    }

    #[tokio::test]
    async fn test_fallback_rescues_imageless_primary() {
        let primary = Arc::new(MockGenerativeModel::always_text_only("primary"));
        let fallback = Arc::new(MockGenerativeModel::always_image("fallback", 8, 8));
        let broker = GenerativeEditBroker::new(primary, fallback);

        let result = broker.submit(&request(), &policy()).await.unwrap();
        assert!(result.is_edited());
    }

    #[tokio::test]
    async fn test_fallback_untouched_when_primary_succeeds() {
        let primary = Arc::new(MockGenerativeModel::always_image("primary", 8, 8));
        let fallback = Arc::new(MockGenerativeModel::always_image("fallback", 8, 8));
        let broker = GenerativeEditBroker::new(primary.clone(), fallback.clone());

        let result = broker.submit(&request(), &policy()).await.unwrap();
        match result {
            EditResult::Edited { model_id, .. } => assert_eq!(model_id, "primary"),
            EditResult::Failed { .. } => panic!("primary should succeed"),
        }
        assert_eq!(fallback.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_recovers() {
        let primary = Arc::new(MockGenerativeModel::scripted(
            "primary",
            vec![MockReply::Unavailable("blip".to_string())],
            MockReply::image(8, 8),
        ));
        let fallback = Arc::new(MockGenerativeModel::always_unavailable("fallback"));
        let broker = GenerativeEditBroker::new(primary, fallback);

        let started = tokio::time::Instant::now();
        let result = broker.submit(&request(), &policy()).await.unwrap();
        match result {
            EditResult::Edited { attempts, .. } => assert_eq!(attempts, 2),
            EditResult::Failed { .. } => panic!("second attempt should succeed"),
        }
        // One backoff between the two attempts
        assert_eq!(started.elapsed(), std::time::Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_undecodable_bytes_count_as_no_image() {
        let primary = Arc::new(MockGenerativeModel::scripted(
            "primary",
            Vec::new(),
            MockReply::Raw {
                mime_type: "image/png".to_string(),
                data: vec![0xDE, 0xAD, 0xBE, 0xEF],
            },
        ));
        let fallback = Arc::new(MockGenerativeModel::always_unavailable("fallback"));
        let broker = GenerativeEditBroker::new(primary, fallback);

        let policy = RetryPolicy {
            max_attempts: 1,
            backoff_base_ms: 1,
        };
        let result = broker.submit(&request(), &policy).await.unwrap();
        match result {
            EditResult::Failed { kind, .. } => {
                assert_eq!(kind, EditFailureKind::NoImageInResponse);
            },
            EditResult::Edited { .. } => panic!("garbage bytes cannot decode"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_reports_all_errors() {
        let policy = RetryPolicy {
            max_attempts: 4,
            backoff_base_ms: 100,
        };
        let outcome: RetryOutcome<(), u32> = with_retry(&policy, |attempt| async move {
            Err::<(), u32>(attempt)
        })
        .await;
        match outcome {
            RetryOutcome::Exhausted { errors } => assert_eq!(errors, vec![0, 1, 2, 3]),
            RetryOutcome::Success { .. } => panic!("operation always fails"),
        }
    }
}
