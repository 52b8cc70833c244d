//! Generative model abstraction
//!
//! The external model is a black box: an ordered list of content parts in,
//! an ordered list of content parts out. Any concrete provider can be
//! substituted behind the `GenerativeModel` trait; the pipeline never
//! depends on a provider's request/response shape beyond this part-list
//! contract.

pub mod http;
pub mod test_utils;

pub use http::HttpGenerativeModel;

use crate::error::Result;
use async_trait::async_trait;

/// One ordered element of a model request or response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    /// Inline image bytes with their MIME type
    InlineImage {
        /// MIME type, e.g. `image/png`
        mime_type: String,
        /// Raw encoded image bytes
        data: Vec<u8>,
    },
    /// A text part
    Text(String),
}

/// Generation parameters forwarded with every request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    /// Sampling temperature
    pub temperature: f32,
    /// Optional output size hint (width, height)
    pub size_hint: Option<(u32, u32)>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.15,
            size_hint: None,
        }
    }
}

/// An ordered part-list request to the model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    /// Ordered content parts
    pub parts: Vec<ContentPart>,
    /// Generation parameters
    pub params: GenerationParams,
}

impl ModelRequest {
    /// Number of inline image parts in the request
    #[must_use]
    pub fn image_part_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|p| matches!(p, ContentPart::InlineImage { .. }))
            .count()
    }

    /// Concatenated text parts, for logging and assertions
    #[must_use]
    pub fn joined_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text(text) => Some(text.as_str()),
                ContentPart::InlineImage { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// An ordered part-list response from the model.
///
/// A response with no image part is a valid, non-exceptional outcome.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    /// Ordered content parts
    pub parts: Vec<ContentPart>,
}

impl ModelResponse {
    /// The first part carrying inline image bytes, if any.
    ///
    /// This is the extraction rule for edit results: text-only parts are
    /// ignored for the result but may be surfaced as diagnostic text.
    #[must_use]
    pub fn first_inline_image(&self) -> Option<(&str, &[u8])> {
        self.parts.iter().find_map(|p| match p {
            ContentPart::InlineImage { mime_type, data } => {
                Some((mime_type.as_str(), data.as_slice()))
            },
            ContentPart::Text(_) => None,
        })
    }

    /// Concatenated text parts, surfaced as diagnostics
    #[must_use]
    pub fn joined_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text(text) => Some(text.as_str()),
                ContentPart::InlineImage { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Capability interface to an external generative model endpoint
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Identifier of the concrete model, for logging and result metadata
    fn model_id(&self) -> &str;

    /// Execute one generation call.
    ///
    /// # Errors
    /// - Transport failures and non-success upstream statuses
    ///
    /// A successful response that carries no image part is `Ok`; absence of
    /// image data is a first-class outcome, not an error.
    async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse>;
}
