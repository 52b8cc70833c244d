//! Safeguard compositing
//!
//! The generative model offers no guarantee about pixels it was not asked
//! to touch. The compositor restores that guarantee: the original image is
//! the base, and only the requested mask rectangles are allowed through
//! from the generated frame. For any pixel outside all mask rectangles,
//! `result[p] == source[p]` regardless of what the model produced there.

use crate::region::{MaskSet, PixelRect};
use image::{imageops::FilterType, DynamicImage, RgbaImage};
use log::debug;

/// Restores guaranteed pixels after a generative edit
pub struct SafeguardCompositor;

impl SafeguardCompositor {
    /// Region-safeguard mode, used when masks are present.
    ///
    /// The generated frame is first normalized to the source dimensions
    /// (the model may return a different size; this is auto-corrected, not
    /// an error). Each mask rectangle is then stamped from the generated
    /// frame onto a copy of the source, in set order, so later regions win
    /// on overlap. Returns the composited image and the pixel rectangles
    /// that were applied, index-aligned with the mask set (empty rects
    /// kept so bookkeeping lines up).
    #[must_use]
    pub fn apply_regions(
        source: &DynamicImage,
        generated: &DynamicImage,
        masks: &MaskSet,
    ) -> (RgbaImage, Vec<PixelRect>) {
        let (width, height) = (source.width(), source.height());
        let generated = Self::normalize_dimensions(generated, width, height);
        let mut out = source.to_rgba8();

        let rects = masks.to_pixel_rects(width, height);
        for rect in &rects {
            if rect.is_empty() {
                continue;
            }
            for y in rect.y..rect.bottom() {
                for x in rect.x..rect.right() {
                    out.put_pixel(x, y, *generated.get_pixel(x, y));
                }
            }
        }

        debug!(
            "composited {} region(s) onto {}x{} source",
            rects.iter().filter(|r| !r.is_empty()).count(),
            width,
            height
        );

        (out, rects)
    }

    /// Whole-frame mode, used for full-segment restyling with no explicit
    /// mask.
    ///
    /// The generated frame replaces the source entirely, after being
    /// resized to exactly the source slot's dimensions. The output slot's
    /// aspect ratio is never allowed to change.
    #[must_use]
    pub fn apply_whole_frame(
        source_dimensions: (u32, u32),
        generated: &DynamicImage,
    ) -> RgbaImage {
        let (width, height) = source_dimensions;
        Self::normalize_dimensions(generated, width, height)
    }

    /// Stretch the generated frame to the expected dimensions when they
    /// differ
    fn normalize_dimensions(generated: &DynamicImage, width: u32, height: u32) -> RgbaImage {
        if generated.width() == width && generated.height() == height {
            return generated.to_rgba8();
        }
        debug!(
            "normalizing generated frame {}x{} -> {}x{}",
            generated.width(),
            generated.height(),
            width,
            height
        );
        generated
            .resize_exact(width, height, FilterType::Lanczos3)
            .to_rgba8()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::MaskRegion;
    use image::Rgba;

    const SOURCE_PIXEL: Rgba<u8> = Rgba([10, 20, 30, 255]);
    const MODEL_PIXEL: Rgba<u8> = Rgba([200, 100, 50, 255]);

    fn solid(width: u32, height: u32, pixel: Rgba<u8>) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, pixel))
    }

    #[test]
    fn test_outside_pixels_are_source_pixels() {
        let source = solid(100, 100, SOURCE_PIXEL);
        let generated = solid(100, 100, MODEL_PIXEL);
        let masks = MaskSet::new(vec![MaskRegion::new(0.2, 0.2, 0.4, 0.4)]);

        let (result, rects) = SafeguardCompositor::apply_regions(&source, &generated, &masks);

        for y in 0..100 {
            for x in 0..100 {
                let inside = rects.iter().any(|r| r.contains(x, y));
                let expected = if inside { MODEL_PIXEL } else { SOURCE_PIXEL };
                assert_eq!(result.get_pixel(x, y), &expected, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_adversarial_generated_frame_cannot_leak() {
        let source = solid(64, 64, SOURCE_PIXEL);
        // A generated frame with per-pixel garbage everywhere
        let mut noise = RgbaImage::new(64, 64);
        for (x, y, pixel) in noise.enumerate_pixels_mut() {
            *pixel = Rgba([
                (x * 7 + y * 13) as u8,
                (x * 31 ^ y * 17) as u8,
                (x + y * 3) as u8,
                255,
            ]);
        }
        let generated = DynamicImage::ImageRgba8(noise);
        let masks = MaskSet::new(vec![MaskRegion::new(0.25, 0.25, 0.25, 0.25)]);

        let (result, rects) = SafeguardCompositor::apply_regions(&source, &generated, &masks);

        for y in 0..64 {
            for x in 0..64 {
                if !rects.iter().any(|r| r.contains(x, y)) {
                    assert_eq!(result.get_pixel(x, y), &SOURCE_PIXEL);
                }
            }
        }
    }

    #[test]
    fn test_overlapping_regions_hold_invariant() {
        let source = solid(80, 80, SOURCE_PIXEL);
        let generated = solid(80, 80, MODEL_PIXEL);
        let masks = MaskSet::new(vec![
            MaskRegion::new(0.1, 0.1, 0.5, 0.5),
            MaskRegion::new(0.3, 0.3, 0.5, 0.5),
            // Degenerate: zero area after conversion
            MaskRegion::new(0.9, 0.9, 0.0, 0.2),
        ]);

        let (result, rects) = SafeguardCompositor::apply_regions(&source, &generated, &masks);
        assert_eq!(rects.len(), 3);
        assert!(rects[2].is_empty());

        for y in 0..80 {
            for x in 0..80 {
                let inside = rects.iter().any(|r| r.contains(x, y));
                let expected = if inside { MODEL_PIXEL } else { SOURCE_PIXEL };
                assert_eq!(result.get_pixel(x, y), &expected);
            }
        }
    }

    #[test]
    fn test_dimension_mismatch_is_normalized() {
        let source = solid(100, 100, SOURCE_PIXEL);
        // Model returned a differently-sized frame; solid color survives
        // resampling exactly
        let generated = solid(50, 75, MODEL_PIXEL);
        let masks = MaskSet::new(vec![MaskRegion::new(0.0, 0.0, 0.5, 0.5)]);

        let (result, _) = SafeguardCompositor::apply_regions(&source, &generated, &masks);
        assert_eq!(result.dimensions(), (100, 100));
        assert_eq!(result.get_pixel(10, 10), &MODEL_PIXEL);
        assert_eq!(result.get_pixel(90, 90), &SOURCE_PIXEL);
    }

    #[test]
    fn test_whole_frame_resizes_to_slot() {
        let generated = solid(512, 512, MODEL_PIXEL);
        let result = SafeguardCompositor::apply_whole_frame((800, 600), &generated);
        assert_eq!(result.dimensions(), (800, 600));
        assert_eq!(result.get_pixel(400, 300), &MODEL_PIXEL);
    }

    #[test]
    fn test_whole_frame_exact_size_passthrough() {
        let mut rgba = RgbaImage::from_pixel(30, 20, MODEL_PIXEL);
        rgba.put_pixel(3, 4, Rgba([1, 2, 3, 255]));
        let generated = DynamicImage::ImageRgba8(rgba.clone());
        let result = SafeguardCompositor::apply_whole_frame((30, 20), &generated);
        assert_eq!(result, rgba);
    }

    #[test]
    fn test_end_to_end_scenario_rect() {
        // 800x600, one region {0.1, 0.1, 0.3, 0.2} -> rect x:80 y:60 w:240 h:120
        let source = solid(800, 600, SOURCE_PIXEL);
        let generated = solid(800, 600, MODEL_PIXEL);
        let masks = MaskSet::new(vec![MaskRegion::new(0.1, 0.1, 0.3, 0.2)]);

        let (result, rects) = SafeguardCompositor::apply_regions(&source, &generated, &masks);
        assert_eq!(
            rects[0],
            PixelRect {
                x: 80,
                y: 60,
                width: 240,
                height: 120
            }
        );
        assert_eq!(result.get_pixel(80, 60), &MODEL_PIXEL);
        assert_eq!(result.get_pixel(319, 179), &MODEL_PIXEL);
        assert_eq!(result.get_pixel(320, 180), &SOURCE_PIXEL);
        assert_eq!(result.get_pixel(79, 60), &SOURCE_PIXEL);
    }
}
