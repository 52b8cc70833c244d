//! Scripted mock models for deterministic tests
//!
//! Mirrors the part-list contract without any network traffic. A mock
//! plays back a finite script of replies and then repeats a configurable
//! exhausted-script reply, so both bounded scenarios ("fail twice, then
//! succeed") and unbounded ones ("always fails") are expressible.

use crate::backends::{ContentPart, GenerativeModel, ModelRequest, ModelResponse};
use crate::error::{MaskGuardError, Result};
use async_trait::async_trait;
use image::{DynamicImage, Rgba, RgbaImage};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// One scripted reply from a mock model
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Respond with a solid-color PNG of the given size
    Image {
        /// Frame width
        width: u32,
        /// Frame height
        height: u32,
        /// Solid fill color
        color: [u8; 4],
    },
    /// Respond successfully with text parts only (no image)
    TextOnly(String),
    /// Respond with raw inline bytes, not necessarily a decodable image
    Raw {
        /// Claimed MIME type
        mime_type: String,
        /// Raw payload bytes
        data: Vec<u8>,
    },
    /// Fail at the transport level
    Unavailable(String),
}

impl MockReply {
    /// Solid mid-gray frame of the given size
    #[must_use]
    pub fn image(width: u32, height: u32) -> Self {
        Self::Image {
            width,
            height,
            color: [128, 128, 128, 255],
        }
    }

    /// Solid frame of the given size and color
    #[must_use]
    pub fn image_colored(width: u32, height: u32, color: [u8; 4]) -> Self {
        Self::Image {
            width,
            height,
            color,
        }
    }
}

/// Encode a solid-color PNG, the payload shape mocks reply with
#[must_use]
pub fn solid_png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(color)));
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    image
        .write_to(&mut cursor, image::ImageFormat::Png)
        .expect("encoding a solid PNG cannot fail");
    buffer
}

/// Scripted in-memory model
pub struct MockGenerativeModel {
    id: String,
    script: Mutex<VecDeque<MockReply>>,
    exhausted_reply: MockReply,
    calls: AtomicU32,
    requests: Mutex<Vec<ModelRequest>>,
}

impl MockGenerativeModel {
    /// Create a mock that plays `script` and then repeats `exhausted_reply`
    #[must_use]
    pub fn scripted(id: &str, script: Vec<MockReply>, exhausted_reply: MockReply) -> Self {
        Self {
            id: id.to_string(),
            script: Mutex::new(script.into()),
            exhausted_reply,
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A model whose every call fails at the transport level
    #[must_use]
    pub fn always_unavailable(id: &str) -> Self {
        Self::scripted(
            id,
            Vec::new(),
            MockReply::Unavailable("connection refused".to_string()),
        )
    }

    /// A model that always responds successfully but never with an image
    #[must_use]
    pub fn always_text_only(id: &str) -> Self {
        Self::scripted(
            id,
            Vec::new(),
            MockReply::TextOnly("I cannot edit this image.".to_string()),
        )
    }

    /// A model that always returns a solid frame of the given size
    #[must_use]
    pub fn always_image(id: &str, width: u32, height: u32) -> Self {
        Self::scripted(id, Vec::new(), MockReply::image(width, height))
    }

    /// Number of calls made so far
    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, in call order
    #[must_use]
    pub fn recorded_requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().expect("mock lock poisoned").clone()
    }
}

#[async_trait]
impl GenerativeModel for MockGenerativeModel {
    fn model_id(&self) -> &str {
        &self.id
    }

    async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .expect("mock lock poisoned")
            .push(request.clone());

        let reply = self
            .script
            .lock()
            .expect("mock lock poisoned")
            .pop_front()
            .unwrap_or_else(|| self.exhausted_reply.clone());

        match reply {
            MockReply::Image {
                width,
                height,
                color,
            } => Ok(ModelResponse {
                parts: vec![ContentPart::InlineImage {
                    mime_type: "image/png".to_string(),
                    data: solid_png(width, height, color),
                }],
            }),
            MockReply::TextOnly(text) => Ok(ModelResponse {
                parts: vec![ContentPart::Text(text)],
            }),
            MockReply::Raw { mime_type, data } => Ok(ModelResponse {
                parts: vec![ContentPart::InlineImage { mime_type, data }],
            }),
            MockReply::Unavailable(message) => {
                Err(MaskGuardError::network_error(&self.id, message))
            },
        }
    }
}
