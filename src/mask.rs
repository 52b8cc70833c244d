//! Mask and overlay bitmap synthesis
//!
//! Two bitmaps are derived from the same mask set: a binary mask kept for
//! bookkeeping and debugging, and an overlay that is actually sent to the
//! model so it can visually identify the edit zone.

use crate::region::MaskSet;
use image::{DynamicImage, Rgba, RgbaImage};

/// Semi-transparent accent used to highlight edit regions in the overlay
const ACCENT_FILL: Rgba<u8> = Rgba([255, 60, 60, 110]);

/// Solid stroke drawn around each edit region in the overlay
const ACCENT_STROKE: Rgba<u8> = Rgba([220, 30, 30, 255]);

/// Stroke thickness in pixels
const STROKE_WIDTH: u32 = 3;

/// Builds mask and overlay bitmaps from a mask set
pub struct MaskImageSynthesizer;

impl MaskImageSynthesizer {
    /// Render the binary mask: opaque black background, each region
    /// rectangle filled pure white.
    ///
    /// Not transmitted to the model in the mask-guided edit flow; kept for
    /// bookkeeping parity with the model's visual cue.
    #[must_use]
    pub fn binary_mask(masks: &MaskSet, width: u32, height: u32) -> RgbaImage {
        let mut out = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]));

        for region in masks {
            let rect = region.to_pixel_rect(width, height);
            if rect.is_empty() {
                continue;
            }
            for y in rect.y..rect.bottom() {
                for x in rect.x..rect.right() {
                    out.put_pixel(x, y, Rgba([255, 255, 255, 255]));
                }
            }
        }

        out
    }

    /// Render the overlay: the source image with each region painted with a
    /// semi-transparent accent fill plus a solid border stroke.
    ///
    /// Regions are composited in set order, so later regions win on overlap.
    /// No deduplication is performed.
    #[must_use]
    pub fn overlay(source: &DynamicImage, masks: &MaskSet) -> RgbaImage {
        let mut out = source.to_rgba8();
        let (width, height) = out.dimensions();

        for region in masks {
            let rect = region.to_pixel_rect(width, height);
            if rect.is_empty() {
                continue;
            }

            for y in rect.y..rect.bottom() {
                for x in rect.x..rect.right() {
                    let on_stroke = x < rect.x + STROKE_WIDTH
                        || x >= rect.right().saturating_sub(STROKE_WIDTH)
                        || y < rect.y + STROKE_WIDTH
                        || y >= rect.bottom().saturating_sub(STROKE_WIDTH);

                    if on_stroke {
                        out.put_pixel(x, y, ACCENT_STROKE);
                    } else {
                        let base = *out.get_pixel(x, y);
                        out.put_pixel(x, y, blend_over(base, ACCENT_FILL));
                    }
                }
            }
        }

        out
    }
}

/// Normal alpha blending of `overlay` onto an opaque `base` pixel
fn blend_over(base: Rgba<u8>, overlay: Rgba<u8>) -> Rgba<u8> {
    let alpha = f32::from(overlay.0[3]) / 255.0;
    let inv_alpha = 1.0 - alpha;

    Rgba([
        (f32::from(overlay.0[0]) * alpha + f32::from(base.0[0]) * inv_alpha) as u8,
        (f32::from(overlay.0[1]) * alpha + f32::from(base.0[1]) * inv_alpha) as u8,
        (f32::from(overlay.0[2]) * alpha + f32::from(base.0[2]) * inv_alpha) as u8,
        base.0[3],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::MaskRegion;

    fn single_region_set() -> MaskSet {
        MaskSet::new(vec![MaskRegion::new(0.25, 0.25, 0.5, 0.5)])
    }

    #[test]
    fn test_binary_mask_white_inside_black_outside() {
        let mask = MaskImageSynthesizer::binary_mask(&single_region_set(), 100, 100);
        assert_eq!(mask.get_pixel(50, 50), &Rgba([255, 255, 255, 255]));
        assert_eq!(mask.get_pixel(10, 10), &Rgba([0, 0, 0, 255]));
        assert_eq!(mask.get_pixel(90, 90), &Rgba([0, 0, 0, 255]));
        // Boundary: rect is [25, 75) in both axes
        assert_eq!(mask.get_pixel(25, 25), &Rgba([255, 255, 255, 255]));
        assert_eq!(mask.get_pixel(75, 75), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_binary_mask_is_fully_opaque() {
        let mask = MaskImageSynthesizer::binary_mask(&single_region_set(), 64, 64);
        assert!(mask.pixels().all(|p| p.0[3] == 255));
    }

    #[test]
    fn test_overlay_leaves_outside_untouched() {
        let source = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            100,
            100,
            Rgba([10, 120, 200, 255]),
        ));
        let overlay = MaskImageSynthesizer::overlay(&source, &single_region_set());
        assert_eq!(overlay.get_pixel(5, 5), &Rgba([10, 120, 200, 255]));
        assert_eq!(overlay.get_pixel(95, 95), &Rgba([10, 120, 200, 255]));
    }

    #[test]
    fn test_overlay_tints_interior_and_strokes_edge() {
        let source = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            100,
            100,
            Rgba([10, 120, 200, 255]),
        ));
        let overlay = MaskImageSynthesizer::overlay(&source, &single_region_set());

        // Edge of the rect carries the solid stroke
        assert_eq!(overlay.get_pixel(25, 50), &ACCENT_STROKE);
        // Interior is tinted toward the accent but not replaced
        let interior = overlay.get_pixel(50, 50);
        assert_ne!(interior, &Rgba([10, 120, 200, 255]));
        assert_ne!(interior, &ACCENT_STROKE);
        assert!(interior.0[0] > 10, "red channel should rise under the tint");
    }

    #[test]
    fn test_overlay_later_region_wins_on_overlap() {
        let source = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            100,
            100,
            Rgba([0, 0, 0, 255]),
        ));
        // Second region's stroke crosses the first region's interior
        let masks = MaskSet::new(vec![
            MaskRegion::new(0.1, 0.1, 0.6, 0.6),
            MaskRegion::new(0.4, 0.4, 0.3, 0.3),
        ]);
        let overlay = MaskImageSynthesizer::overlay(&source, &masks);
        // (40, 50) is interior of region 0 but stroke of region 1
        assert_eq!(overlay.get_pixel(40, 50), &ACCENT_STROKE);
    }

    #[test]
    fn test_degenerate_region_is_skipped() {
        let source = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            50,
            50,
            Rgba([7, 7, 7, 255]),
        ));
        let masks = MaskSet::new(vec![MaskRegion::new(0.5, 0.5, 0.0, 0.0)]);
        let overlay = MaskImageSynthesizer::overlay(&source, &masks);
        assert!(overlay.pixels().all(|p| *p == Rgba([7, 7, 7, 255])));
    }
}
