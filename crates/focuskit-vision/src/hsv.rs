//! HSV conversion and band masks
//!
//! Uses the 8-bit HSV convention of common vision libraries: hue is halved
//! to fit `0..=179`, saturation and value span `0..=255`.

use image::{GrayImage, Luma, RgbImage};
use serde::{Deserialize, Serialize};

/// One pixel in 8-bit HSV
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hsv {
    /// Hue, `0..=179`
    pub h: u8,
    /// Saturation, `0..=255`
    pub s: u8,
    /// Value, `0..=255`
    pub v: u8,
}

impl Hsv {
    /// Largest hue value
    pub const HUE_MAX: u8 = 179;

    /// Convert an RGB pixel
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = f32::from(max - min);

        let s = if max == 0 {
            0.0
        } else {
            255.0 * delta / f32::from(max)
        };

        let h = if delta == 0.0 {
            0.0
        } else {
            let (rf, gf, bf) = (f32::from(r), f32::from(g), f32::from(b));
            let degrees = if max == r {
                60.0 * (gf - bf) / delta
            } else if max == g {
                120.0 + 60.0 * (bf - rf) / delta
            } else {
                240.0 + 60.0 * (rf - gf) / delta
            };
            if degrees < 0.0 {
                degrees + 360.0
            } else {
                degrees
            }
        };

        Self {
            h: ((h / 2.0).round() as u16 % 180) as u8,
            s: s.round() as u8,
            v: max,
        }
    }
}

/// Inclusive range of 8-bit values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    /// Lower bound, inclusive
    pub from: u8,
    /// Upper bound, inclusive
    pub to: u8,
}

impl ByteRange {
    /// Create a range
    pub const fn new(from: u8, to: u8) -> Self {
        Self { from, to }
    }

    /// Whether `value` lies inside the range
    pub fn contains(&self, value: u8) -> bool {
        (self.from..=self.to).contains(&value)
    }

    /// Whether the bounds are ordered
    pub fn is_ordered(&self) -> bool {
        self.from <= self.to
    }
}

/// Hue, saturation and value window selecting one colour band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HsvBand {
    /// Hue window
    pub hue: ByteRange,
    /// Saturation window
    pub saturation: ByteRange,
    /// Value window
    pub value: ByteRange,
}

impl HsvBand {
    /// Mask value for one pixel: 255 inside the band, 0 outside
    pub fn mask(&self, pixel: Hsv) -> u8 {
        if self.hue.contains(pixel.h)
            && self.saturation.contains(pixel.s)
            && self.value.contains(pixel.v)
        {
            u8::MAX
        } else {
            0
        }
    }
}

/// Combined mask of two bands, by saturating addition
///
/// Red wraps around the hue circle, so the beam colour needs a band at
/// each end of the hue range.
pub fn combined_mask(pixel: Hsv, low: &HsvBand, high: &HsvBand) -> u8 {
    low.mask(pixel).saturating_add(high.mask(pixel))
}

/// Value channel of `image`, kept only where a pixel falls in either band
pub fn masked_value(image: &RgbImage, low: &HsvBand, high: &HsvBand) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        let pixel = Hsv::from_rgb(r, g, b);
        if combined_mask(pixel, low, high) > 0 {
            Luma([pixel.v])
        } else {
            Luma([0])
        }
    })
}
