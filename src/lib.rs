#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # Maskguard
//!
//! Mask-guided generative image editing with hard pixel guarantees. An
//! unreliable external model redraws caller-selected regions of a raster
//! image; this library guarantees that (a) every pixel outside those
//! regions survives byte-identical, and (b) when an image is split into an
//! ordered sequence of segments edited independently, later segments track
//! the style already accepted for earlier ones.
//!
//! ## Features
//!
//! - **Region math**: fractional mask descriptors converted to clamped
//!   pixel rectangles, portable across image renditions
//! - **Mask synthesis**: binary mask and highlight-overlay bitmaps derived
//!   from the same mask set
//! - **Resilient brokering**: primary/fallback model endpoints, exponential
//!   backoff, typed no-image vs unavailable outcomes
//! - **Safeguard compositing**: the original image is the base; only the
//!   requested rectangles pass through from the model
//! - **Segment consistency**: segment 0's accepted output biases later
//!   segments via a style reference and tightened temperature
//! - **Progress streaming**: ordered lifecycle events with exactly one
//!   terminal event, SSE-encodable for HTTP callers
//! - **Border repair**: standalone detection and healing of a known
//!   red-border contamination pattern
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use maskguard::{
//!     edit_regions_from_bytes, EditConfig, GenerativeEditBroker,
//!     HttpGenerativeModel, MaskRegion, MaskSet,
//! };
//! use std::sync::Arc;
//!
//! # async fn example(image_bytes: Vec<u8>) -> anyhow::Result<()> {
//! let primary = Arc::new(HttpGenerativeModel::new(
//!     "https://api.example.com/v1",
//!     "pixel-edit-2",
//!     "API_KEY",
//! )?);
//! let fallback = Arc::new(HttpGenerativeModel::new(
//!     "https://api.example.com/v1",
//!     "pixel-edit-1",
//!     "API_KEY",
//! )?);
//! let broker = GenerativeEditBroker::new(primary, fallback);
//!
//! let masks = MaskSet::new(vec![MaskRegion::new(0.1, 0.1, 0.3, 0.2)]);
//! let config = EditConfig::default();
//! let result =
//!     edit_regions_from_bytes(&image_bytes, &masks, "remove the logo", &broker, &config)
//!         .await?;
//! result.save_png("edited.png")?;
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod broker;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compositor;
pub mod config;
pub mod error;
pub mod mask;
pub mod orchestrator;
pub mod region;
pub mod repair;
pub mod services;
pub mod storage;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;

// Public API exports
pub use backends::{
    ContentPart, GenerationParams, GenerativeModel, HttpGenerativeModel, ModelRequest,
    ModelResponse,
};
pub use broker::{
    with_retry, EditFailureKind, EditRequest, EditResult, GenerativeEditBroker, InlineImage,
    RetryOutcome,
};
pub use compositor::SafeguardCompositor;
pub use config::{
    EditAggressiveness, EditConfig, EditConfigBuilder, OutputFormat, RestyleStyle, RetryPolicy,
};
pub use error::{MaskGuardError, Result};
pub use mask::MaskImageSynthesizer;
pub use orchestrator::SegmentConsistencyOrchestrator;
pub use region::{MaskRegion, MaskSet, PixelRect};
pub use repair::{BorderArtifactRepair, BorderReport};
pub use services::{
    LogProgressSink, NoOpProgressSink, OutputEncoder, ProgressEvent, ProgressSink, ProgressStream,
};
pub use storage::{
    BlobStore, EditAction, EditHistoryEntry, EditLedger, GeneratedImageRecord, MemoryBlobStore,
    MemoryEditLedger,
};
pub use types::{
    DesignStyle, EditMetadata, EditTimings, EditedImage, RestyleSummary, SectionBatchSummary,
    SectionOutcome, SectionRequest, SegmentJob, SegmentOutcome, SegmentRole, SegmentState,
};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

use crate::mask::MaskImageSynthesizer as Synthesizer;
use crate::repair::BorderArtifactRepair as Repair;
use crate::services::format::{decode_image, encode_png};
use image::DynamicImage;
use instant::Instant;

/// Edit the masked regions of an image provided as encoded bytes.
///
/// Decodes the bytes and delegates to [`edit_regions`]. Suitable for web
/// servers and memory-based processing where no file is available.
///
/// # Errors
/// - Image decoding failures
/// - Everything [`edit_regions`] can return
pub async fn edit_regions_from_bytes(
    image_bytes: &[u8],
    masks: &MaskSet,
    instruction: &str,
    broker: &GenerativeEditBroker,
    config: &EditConfig,
) -> Result<EditedImage> {
    let image = decode_image(image_bytes)?;
    edit_regions(&image, masks, instruction, broker, config).await
}

/// Edit the masked regions of a `DynamicImage`.
///
/// The overlay bitmap (source plus highlighted regions) is what travels to
/// the model; the returned frame is then safeguard-composited so every
/// pixel outside the mask rectangles is byte-identical to the source.
///
/// # Errors
/// - `Validation` for an empty mask set or missing instruction
/// - `UpstreamUnavailable` / `NoImageInResponse` when the broker exhausts
///   its retry budget
pub async fn edit_regions(
    image: &DynamicImage,
    masks: &MaskSet,
    instruction: &str,
    broker: &GenerativeEditBroker,
    config: &EditConfig,
) -> Result<EditedImage> {
    masks.validate()?;

    let total_start = Instant::now();
    let mut timings = EditTimings::default();
    let dimensions = (image.width(), image.height());

    // Prepare: the overlay is the image the model actually sees
    let prepare_start = Instant::now();
    let overlay = Synthesizer::overlay(image, masks);
    let overlay_bytes = encode_png(&DynamicImage::ImageRgba8(overlay))?;
    timings.prepare_ms = prepare_start.elapsed().as_millis() as u64;

    let request = EditRequest::new(InlineImage::png(overlay_bytes), instruction.to_string())
        .with_temperature(config.aggressiveness.temperature(false));

    let generate_start = Instant::now();
    let (generated, model_id, attempts) = broker
        .submit(&request, &config.retry_policy)
        .await?
        .into_result()?;
    timings.generate_ms = generate_start.elapsed().as_millis() as u64;
    timings.attempts = attempts;

    // Heal known contamination on the generated frame before compositing,
    // so the repair can never touch safeguarded pixels
    let generated = if config.repair_border_artifacts && Repair::has_red_border(&generated) {
        DynamicImage::ImageRgba8(Repair::repair(&generated))
    } else {
        generated
    };

    let composite_start = Instant::now();
    let (composited, applied_rects) =
        SafeguardCompositor::apply_regions(image, &generated, masks);
    timings.composite_ms = composite_start.elapsed().as_millis() as u64;
    timings.total_ms = total_start.elapsed().as_millis() as u64;

    let mut metadata = EditMetadata::new(instruction.to_string());
    metadata.model_id = Some(model_id);
    metadata.timings = timings;

    Ok(EditedImage::new(
        DynamicImage::ImageRgba8(composited),
        applied_rects,
        dimensions,
        metadata,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_api_compiles() {
        // Basic compilation test to ensure API is well-formed
        let _config = EditConfig::default();
        // API compiles successfully if we reach this point
    }
}
