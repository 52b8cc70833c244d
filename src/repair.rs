//! Border artifact detection and repair
//!
//! A prior buggy transformation is known to contaminate generated frames
//! with a red border. This module detects that pattern by pixel-color
//! thresholding along the frame edges and heals it by directional fill
//! from the first clean pixel inward. It depends on nothing else in the
//! pipeline and can run against any bitmap.

use image::{DynamicImage, Rgba, RgbaImage};
use log::debug;

/// Rows/columns scanned along each edge when detecting contamination
const DETECT_BAND: u32 = 6;

/// Depth of the border band that repair is responsible for clearing
const REPAIR_BAND: u32 = 5;

/// Fraction of band pixels that must match the artifact predicate for an
/// edge to count as contaminated
const DENSITY_THRESHOLD: f32 = 0.05;

/// The artifact color predicate: strongly red, weak green and blue
fn is_artifact_pixel(pixel: Rgba<u8>) -> bool {
    pixel.0[0] > 180 && pixel.0[1] < 100 && pixel.0[2] < 100
}

/// Which edges of a frame carry the contamination pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BorderReport {
    /// Top edge band is contaminated
    pub top: bool,
    /// Bottom edge band is contaminated
    pub bottom: bool,
    /// Left edge band is contaminated
    pub left: bool,
    /// Right edge band is contaminated
    pub right: bool,
}

impl BorderReport {
    /// Whether any edge is contaminated
    #[must_use]
    pub fn any(&self) -> bool {
        self.top || self.bottom || self.left || self.right
    }
}

/// Detects and heals red-border contamination in generated frames
pub struct BorderArtifactRepair;

impl BorderArtifactRepair {
    /// Scan all four edge bands and report which are contaminated
    #[must_use]
    pub fn detect(image: &DynamicImage) -> BorderReport {
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return BorderReport::default();
        }

        let band_h = DETECT_BAND.min(height);
        let band_w = DETECT_BAND.min(width);

        let top = band_density(&rgba, 0, width, 0, band_h);
        let bottom = band_density(&rgba, 0, width, height - band_h, height);
        let left = band_density(&rgba, 0, band_w, 0, height);
        let right = band_density(&rgba, width - band_w, width, 0, height);

        BorderReport {
            top: top >= DENSITY_THRESHOLD,
            bottom: bottom >= DENSITY_THRESHOLD,
            left: left >= DENSITY_THRESHOLD,
            right: right >= DENSITY_THRESHOLD,
        }
    }

    /// Whether the frame carries the red-border contamination pattern on
    /// any edge
    #[must_use]
    pub fn has_red_border(image: &DynamicImage) -> bool {
        Self::detect(image).any()
    }

    /// Heal the contamination by directional fill.
    ///
    /// Every artifact pixel within the perimeter repair band is replaced by
    /// the first non-artifact pixel found scanning inward along the band's
    /// perpendicular axis. After repair no pixel within the band satisfies
    /// the artifact predicate.
    #[must_use]
    pub fn repair(image: &DynamicImage) -> RgbaImage {
        let mut rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return rgba;
        }

        let band_h = REPAIR_BAND.min(height);
        let band_w = REPAIR_BAND.min(width);
        let mut healed = 0_u64;

        // Top band: fill downward
        for y in 0..band_h {
            for x in 0..width {
                if is_artifact_pixel(*rgba.get_pixel(x, y)) {
                    let fill = scan_down(&rgba, x, band_h, height);
                    rgba.put_pixel(x, y, fill);
                    healed += 1;
                }
            }
        }

        // Bottom band: fill upward
        for y in height.saturating_sub(band_h)..height {
            for x in 0..width {
                if is_artifact_pixel(*rgba.get_pixel(x, y)) {
                    let fill = scan_up(&rgba, x, height.saturating_sub(band_h));
                    rgba.put_pixel(x, y, fill);
                    healed += 1;
                }
            }
        }

        // Left band: fill rightward
        for x in 0..band_w {
            for y in 0..height {
                if is_artifact_pixel(*rgba.get_pixel(x, y)) {
                    let fill = scan_right(&rgba, y, band_w, width);
                    rgba.put_pixel(x, y, fill);
                    healed += 1;
                }
            }
        }

        // Right band: fill leftward
        for x in width.saturating_sub(band_w)..width {
            for y in 0..height {
                if is_artifact_pixel(*rgba.get_pixel(x, y)) {
                    let fill = scan_left(&rgba, y, width.saturating_sub(band_w));
                    rgba.put_pixel(x, y, fill);
                    healed += 1;
                }
            }
        }

        if healed > 0 {
            debug!("healed {healed} border artifact pixels");
        }

        rgba
    }
}

/// Fraction of pixels in the given band matching the artifact predicate
fn band_density(rgba: &RgbaImage, x0: u32, x1: u32, y0: u32, y1: u32) -> f32 {
    let mut matching = 0_u32;
    let mut total = 0_u32;
    for y in y0..y1 {
        for x in x0..x1 {
            total += 1;
            if is_artifact_pixel(*rgba.get_pixel(x, y)) {
                matching += 1;
            }
        }
    }
    if total == 0 {
        0.0
    } else {
        matching as f32 / total as f32
    }
}

/// Neutral fill used when an entire scan line is contaminated
const FALLBACK_FILL: Rgba<u8> = Rgba([255, 255, 255, 255]);

fn scan_down(rgba: &RgbaImage, x: u32, from_y: u32, height: u32) -> Rgba<u8> {
    (from_y..height)
        .map(|y| *rgba.get_pixel(x, y))
        .find(|p| !is_artifact_pixel(*p))
        .unwrap_or(FALLBACK_FILL)
}

fn scan_up(rgba: &RgbaImage, x: u32, to_y: u32) -> Rgba<u8> {
    (0..to_y)
        .rev()
        .map(|y| *rgba.get_pixel(x, y))
        .find(|p| !is_artifact_pixel(*p))
        .unwrap_or(FALLBACK_FILL)
}

fn scan_right(rgba: &RgbaImage, y: u32, from_x: u32, width: u32) -> Rgba<u8> {
    (from_x..width)
        .map(|x| *rgba.get_pixel(x, y))
        .find(|p| !is_artifact_pixel(*p))
        .unwrap_or(FALLBACK_FILL)
}

fn scan_left(rgba: &RgbaImage, y: u32, to_x: u32) -> Rgba<u8> {
    (0..to_x)
        .rev()
        .map(|x| *rgba.get_pixel(x, y))
        .find(|p| !is_artifact_pixel(*p))
        .unwrap_or(FALLBACK_FILL)
}
