//! Output format handling service
//!
//! This module separates output encoding from business logic, making the
//! pipeline testable without touching disk.

use crate::config::OutputFormat;
use crate::error::Result;
use image::DynamicImage;
use std::io::Cursor;

/// Service for encoding result images at the pipeline boundary
pub struct OutputEncoder;

impl OutputEncoder {
    /// Encode an image to bytes in the specified output format
    ///
    /// # Arguments
    /// * `image` - Source image to encode
    /// * `format` - Target output format
    /// * `quality` - Quality (0-100) for lossy formats; ignored for PNG
    ///
    /// # Errors
    /// Returns `MaskGuardError::Image` when the codec rejects the image
    pub fn encode(image: &DynamicImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);
        match format {
            OutputFormat::Png => {
                image.write_to(&mut cursor, image::ImageFormat::Png)?;
            },
            OutputFormat::Jpeg => {
                // JPEG carries no alpha channel
                let rgb_image = image.to_rgb8();
                let mut encoder =
                    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality);
                encoder.encode_image(&rgb_image)?;
            },
            OutputFormat::WebP => {
                #[cfg(feature = "webp-support")]
                {
                    image.write_to(&mut cursor, image::ImageFormat::WebP)?;
                }
                #[cfg(not(feature = "webp-support"))]
                {
                    image.write_to(&mut cursor, image::ImageFormat::Png)?;
                }
            },
        }
        Ok(buffer)
    }

    /// Get the appropriate file extension for a given output format
    #[must_use]
    pub fn extension(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::WebP => "webp",
        }
    }

    /// MIME content type for a given output format
    #[must_use]
    pub fn content_type(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::WebP => "image/webp",
        }
    }

    /// Check if a format supports transparency (alpha channel)
    #[must_use]
    pub fn supports_transparency(format: OutputFormat) -> bool {
        match format {
            OutputFormat::Png | OutputFormat::WebP => true,
            OutputFormat::Jpeg => false,
        }
    }
}

/// Decode image bytes at the pipeline boundary, with a pipeline error type
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    Ok(image::load_from_memory(bytes)?)
}

/// Encode an image as PNG bytes, the interchange format used between
/// pipeline stages and for upstream payloads
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    OutputEncoder::encode(image, OutputFormat::Png, 100)
}
