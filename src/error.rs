//! Error taxonomy for maskguard.
//!
//! [`MaskGuardError`] is the single error type threaded through the library's
//! fallible surface via the [`Result`] alias. Variants map one-to-one onto the
//! failure modes the pipeline can produce, and the helper constructors keep
//! call sites terse while funnelling free-form context into the right variant.

use std::fmt;

/// Convenience alias for results produced across the crate.
pub type Result<T> = std::result::Result<T, MaskGuardError>;

/// All failures surfaced by the maskguard pipeline.
#[derive(Debug, thiserror::Error)]
pub enum MaskGuardError {
    /// A caller-supplied request or value failed validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// The edit configuration could not be built.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Both upstream endpoints were unreachable or returned a transport error.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The upstream responded but carried no usable image part.
    #[error("no image in response: {0}")]
    NoImageInResponse(String),

    /// The upstream returned a malformed or unexpected response.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// A network transport operation failed.
    #[error("network error: {0}")]
    Network(String),

    /// Persisting a blob or record failed.
    #[error("upload error: {0}")]
    Upload(String),

    /// An image codec rejected an encode or decode.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl MaskGuardError {
    /// Build a [`MaskGuardError::Validation`] from any string-like value.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Build a [`MaskGuardError::InvalidConfig`] from any string-like value.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Build a [`MaskGuardError::Upstream`] from any string-like value.
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }

    /// Build a [`MaskGuardError::Upload`] from any string-like value.
    pub fn upload(message: impl Into<String>) -> Self {
        Self::Upload(message.into())
    }

    /// Build a [`MaskGuardError::Network`] from a context and an underlying
    /// source, both rendered via [`fmt::Display`].
    pub fn network_error(context: impl fmt::Display, source: impl fmt::Display) -> Self {
        Self::Network(format!("{context}: {source}"))
    }

    /// A message suitable for surfacing to an end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}
