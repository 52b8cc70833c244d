//! Core types for mask-guided edit operations

use crate::config::OutputFormat;
use crate::error::Result;
use crate::region::PixelRect;
use crate::services::format::OutputEncoder;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Result of a mask-guided edit operation
#[derive(Debug, Clone)]
pub struct EditedImage {
    /// The composited result image
    pub image: DynamicImage,

    /// Pixel rectangles that were allowed through from the generated frame,
    /// in mask-set order (empty rects kept so indexes line up)
    pub applied_rects: Vec<PixelRect>,

    /// Source image dimensions
    pub original_dimensions: (u32, u32),

    /// Processing metadata
    pub metadata: EditMetadata,
}

impl EditedImage {
    /// Create a new edit result
    #[must_use]
    pub fn new(
        image: DynamicImage,
        applied_rects: Vec<PixelRect>,
        original_dimensions: (u32, u32),
        metadata: EditMetadata,
    ) -> Self {
        Self {
            image,
            applied_rects,
            original_dimensions,
            metadata,
        }
    }

    /// Get image dimensions
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    /// Get the image as encoded bytes in the specified format
    pub fn to_bytes(&self, format: OutputFormat, quality: u8) -> Result<Vec<u8>> {
        OutputEncoder::encode(&self.image, format, quality)
    }

    /// Save the result as PNG
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.image.save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }

    /// Get detailed timing breakdown
    #[must_use]
    pub fn timings(&self) -> &EditTimings {
        &self.metadata.timings
    }
}

/// Timing breakdown for a single edit call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EditTimings {
    /// Input preparation (decode, mask/overlay synthesis) in milliseconds
    pub prepare_ms: u64,
    /// Broker round trips including retries and backoff, in milliseconds
    pub generate_ms: u64,
    /// Safeguard compositing in milliseconds
    pub composite_ms: u64,
    /// End-to-end wall time in milliseconds
    pub total_ms: u64,
    /// Attempt-cycles the broker consumed
    pub attempts: u32,
}

/// Metadata carried on an edit result
#[derive(Debug, Clone, Default)]
pub struct EditMetadata {
    /// The instruction text sent with the request
    pub instruction: String,
    /// Model id that produced the accepted frame
    pub model_id: Option<String>,
    /// Timing breakdown
    pub timings: EditTimings,
}

impl EditMetadata {
    /// Create metadata for an instruction
    #[must_use]
    pub fn new(instruction: String) -> Self {
        Self {
            instruction,
            model_id: None,
            timings: EditTimings::default(),
        }
    }
}

/// Which slot of the composite image a segment occupies.
///
/// The role picks the prompt framing: the first segment is framed as a
/// header/hero, the last as a footer, everything in between as generic
/// content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentRole {
    /// Header/hero slot
    First,
    /// Generic content slot
    Middle,
    /// Footer slot
    Last,
}

impl SegmentRole {
    /// Prompt framing clause for this slot
    #[must_use]
    pub fn framing(self) -> &'static str {
        match self {
            Self::First => "This is the header and hero section at the top of the page.",
            Self::Middle => "This is a content section in the body of the page.",
            Self::Last => "This is the footer section at the bottom of the page.",
        }
    }
}

/// One independently-edited slice of a larger composite image
#[derive(Debug, Clone)]
pub struct SegmentJob {
    /// Position in the segment sequence; segment 0 seeds the consistency
    /// reference
    pub order_index: usize,
    /// Current image for this segment
    pub image: DynamicImage,
    /// Slot the segment occupies
    pub role: SegmentRole,
    /// Owning section record id, for ledger pointer updates
    pub section_id: String,
    /// Ledger id of the image currently attached to the section, if any
    pub previous_image_id: Option<String>,
}

/// Opaque structured style descriptor forwarded verbatim into instruction
/// text. The pipeline never interprets these fields beyond interpolation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignStyle {
    /// Palette description, e.g. "warm earth tones"
    pub palette: String,
    /// Typography mood, e.g. "rounded and friendly"
    pub typography_mood: String,
    /// Layout density, e.g. "airy"
    pub layout_density: String,
}

impl std::fmt::Display for DesignStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "palette: {}; typography: {}; layout density: {}",
            self.palette, self.typography_mood, self.layout_density
        )
    }
}

/// Lifecycle state of one segment in a restyle run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentState {
    /// Not yet submitted
    Pending,
    /// Submitted to the broker
    Generating,
    /// Accepted, composited, and persisted
    Succeeded,
    /// Retries exhausted or persistence failed; prior image left untouched
    Failed,
}

/// Per-segment outcome recorded in the run summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentOutcome {
    /// Position in the segment sequence
    pub order_index: usize,
    /// Terminal state the segment reached
    pub state: SegmentState,
    /// Storage URL of the accepted image, when the segment succeeded
    pub image_url: Option<String>,
}

/// Summary of a multi-segment restyle run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestyleSummary {
    /// Segments that reached `Succeeded`
    pub updated_count: usize,
    /// Segments attempted
    pub total_count: usize,
    /// Per-segment outcomes in order
    pub segments: Vec<SegmentOutcome>,
}

/// Request for one independent section of a whole-page generation batch
#[derive(Debug, Clone)]
pub struct SectionRequest {
    /// Owning section record id
    pub section_id: String,
    /// Target slot dimensions
    pub width: u32,
    /// Target slot dimensions
    pub height: u32,
    /// Instruction text describing the section's content
    pub prompt: String,
    /// Optional style descriptor interpolated into the instruction
    pub design_style: Option<DesignStyle>,
}

/// Per-section outcome of a whole-page generation batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionOutcome {
    /// Owning section record id
    pub section_id: String,
    /// Storage URL of the generated image; `None` when the section failed
    pub image_url: Option<String>,
}

/// Summary of a whole-page generation batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionBatchSummary {
    /// Sections that produced and persisted an image
    pub succeeded: usize,
    /// Sections that did not
    pub failed: usize,
    /// Per-section outcomes in request order
    pub outcomes: Vec<SectionOutcome>,
}
