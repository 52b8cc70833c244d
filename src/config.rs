//! Configuration types for mask-guided edit operations

use crate::error::{MaskGuardError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Output image format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// PNG with alpha channel transparency
    Png,
    /// JPEG (no transparency, RGB output)
    Jpeg,
    /// WebP with alpha channel transparency
    WebP,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Png
    }
}

/// Restyle presets a multi-segment run can target.
///
/// `Sampling` is the identity style: segments are regenerated faithfully to
/// their current look, so no cross-segment consistency reference is needed
/// or used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestyleStyle {
    /// Identity style: keep the current look, no consistency reference
    Sampling,
    /// Clean corporate look, restrained palette
    Professional,
    /// Saturated colors, bold decoration
    Vibrant,
    /// Sparse layout, muted palette
    Minimal,
}

impl RestyleStyle {
    /// Whether this is the identity style (no regeneration drift desired)
    #[must_use]
    pub fn is_identity(self) -> bool {
        matches!(self, Self::Sampling)
    }

    /// Short style descriptor interpolated into instruction text
    #[must_use]
    pub fn descriptor(self) -> &'static str {
        match self {
            Self::Sampling => "the existing visual style, unchanged",
            Self::Professional => "a clean, professional style with a restrained palette",
            Self::Vibrant => "a vibrant style with saturated colors and bold decoration",
            Self::Minimal => "a minimal style with sparse layout and muted colors",
        }
    }
}

impl std::fmt::Display for RestyleStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sampling => write!(f, "sampling"),
            Self::Professional => write!(f, "professional"),
            Self::Vibrant => write!(f, "vibrant"),
            Self::Minimal => write!(f, "minimal"),
        }
    }
}

impl std::str::FromStr for RestyleStyle {
    type Err = MaskGuardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sampling" => Ok(Self::Sampling),
            "professional" => Ok(Self::Professional),
            "vibrant" => Ok(Self::Vibrant),
            "minimal" => Ok(Self::Minimal),
            other => Err(MaskGuardError::validation(format!(
                "Unknown style '{other}'. Supported: sampling, professional, vibrant, minimal"
            ))),
        }
    }
}

/// How far a generation call may deviate from the source layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditAggressiveness {
    /// Bias toward layout preservation
    Conservative,
    /// Permit layout re-composition
    Aggressive,
}

impl Default for EditAggressiveness {
    fn default() -> Self {
        Self::Conservative
    }
}

impl EditAggressiveness {
    /// Generation temperature for this mode.
    ///
    /// Attaching a consistency reference tightens the temperature further
    /// to bias the model toward the already-accepted palette and shapes.
    #[must_use]
    pub fn temperature(self, with_reference: bool) -> f32 {
        match (self, with_reference) {
            (Self::Conservative, false) => 0.15,
            (Self::Conservative, true) => 0.10,
            (Self::Aggressive, false) => 0.35,
            (Self::Aggressive, true) => 0.30,
        }
    }
}

/// Retry policy for the generative edit broker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempt-cycles (each cycle = primary + fallback)
    pub max_attempts: u32,
    /// Base backoff in milliseconds; the wait after attempt `k` is
    /// `backoff_base_ms * 2^k`
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 4000,
        }
    }
}

impl RetryPolicy {
    /// Backoff delay after the zero-indexed attempt `attempt`.
    ///
    /// No delay is taken after the final attempt; callers index waits by the
    /// attempt that just failed.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_base_ms.saturating_mul(1_u64 << attempt.min(16)))
    }
}

/// Configuration for mask-guided edit and restyle operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditConfig {
    /// Retry policy applied to every broker submission
    pub retry_policy: RetryPolicy,

    /// Layout-preservation bias for generation calls
    pub aggressiveness: EditAggressiveness,

    /// Target style for multi-segment restyle runs
    pub style: RestyleStyle,

    /// Output format for encoded results
    pub output_format: OutputFormat,

    /// JPEG quality (0-100, only used for JPEG output)
    pub jpeg_quality: u8,

    /// WebP quality (0-100, only used for WebP output)
    pub webp_quality: u8,

    /// Heal colored-border contamination on generated frames before
    /// compositing (default: true)
    pub repair_border_artifacts: bool,

    /// Concurrency bound for independent whole-page section generation
    pub max_concurrent_sections: usize,

    /// Enable debug mode (additional logging and validation)
    pub debug: bool,
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            retry_policy: RetryPolicy::default(),
            aggressiveness: EditAggressiveness::default(),
            style: RestyleStyle::Sampling,
            output_format: OutputFormat::default(),
            jpeg_quality: 90,
            webp_quality: 85,
            repair_border_artifacts: true,
            max_concurrent_sections: 3,
            debug: false,
        }
    }
}

impl EditConfig {
    /// Create a new configuration builder for fluent API construction
    #[must_use]
    pub fn builder() -> EditConfigBuilder {
        EditConfigBuilder::new()
    }
}

/// Builder for `EditConfig`
pub struct EditConfigBuilder {
    config: EditConfig,
}

impl EditConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: EditConfig::default(),
        }
    }

    #[must_use]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry_policy = policy;
        self
    }

    #[must_use]
    pub fn aggressiveness(mut self, aggressiveness: EditAggressiveness) -> Self {
        self.config.aggressiveness = aggressiveness;
        self
    }

    #[must_use]
    pub fn style(mut self, style: RestyleStyle) -> Self {
        self.config.style = style;
        self
    }

    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    #[must_use]
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(0, 100);
        self
    }

    #[must_use]
    pub fn webp_quality(mut self, quality: u8) -> Self {
        self.config.webp_quality = quality.clamp(0, 100);
        self
    }

    #[must_use]
    pub fn repair_border_artifacts(mut self, repair: bool) -> Self {
        self.config.repair_border_artifacts = repair;
        self
    }

    #[must_use]
    pub fn max_concurrent_sections(mut self, bound: usize) -> Self {
        self.config.max_concurrent_sections = bound;
        self
    }

    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build the edit configuration
    ///
    /// # Errors
    ///
    /// Returns `MaskGuardError` for:
    /// - A retry policy with zero attempts
    /// - A zero section-concurrency bound
    pub fn build(self) -> Result<EditConfig> {
        if self.config.retry_policy.max_attempts == 0 {
            return Err(MaskGuardError::invalid_config(
                "retry policy must allow at least 1 attempt",
            ));
        }
        if self.config.max_concurrent_sections == 0 {
            return Err(MaskGuardError::invalid_config(
                "max_concurrent_sections must be at least 1",
            ));
        }

        Ok(self.config)
    }
}

impl Default for EditConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
