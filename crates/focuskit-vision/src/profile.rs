//! Row integration profile of the masked value channel
//!
//! The profile is indexed bottom-up: entry `0` is the last image row. The
//! beam appears as a run of rows whose summed value exceeds a threshold
//! relative to a fully saturated row.

use image::GrayImage;

/// First and last over-threshold profile indices of a detected beam
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamSpan {
    /// Lowest over-threshold index
    pub first: usize,
    /// Highest over-threshold index
    pub last: usize,
}

impl BeamSpan {
    /// Centre of the span in profile rows
    pub fn midpoint(&self) -> f32 {
        (self.first as f32 + self.last as f32) / 2.0
    }
}

/// Per-row sums of one frame and the rows above threshold
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationProfile {
    sums: Vec<f32>,
    over_threshold: Vec<usize>,
    threshold_abs: f32,
}

impl IntegrationProfile {
    /// Integrate `masked` over the column window `from..to` (fractions of
    /// width).
    ///
    /// A row is over threshold when its sum exceeds
    /// `threshold * width * 255`.
    pub fn integrate(masked: &GrayImage, from: f32, to: f32, threshold: f32) -> Self {
        let (width, height) = masked.dimensions();
        let col_from = column(from, width);
        let col_to = column(to, width).max(col_from);
        let threshold_abs = threshold * width as f32 * 255.0;

        let sums: Vec<f32> = (0..height)
            .rev()
            .map(|row| {
                (col_from..col_to)
                    .map(|col| f32::from(masked.get_pixel(col, row).0[0]))
                    .sum()
            })
            .collect();

        let over_threshold = sums
            .iter()
            .enumerate()
            .filter(|(_, sum)| **sum > threshold_abs)
            .map(|(i, _)| i)
            .collect();

        Self {
            sums,
            over_threshold,
            threshold_abs,
        }
    }

    /// Raw row sums, bottom row first
    pub fn sums(&self) -> &[f32] {
        &self.sums
    }

    /// Number of rows in the profile
    pub fn len(&self) -> usize {
        self.sums.len()
    }

    /// Whether the profile has no rows
    pub fn is_empty(&self) -> bool {
        self.sums.is_empty()
    }

    /// Absolute threshold a row sum must exceed
    pub fn threshold_abs(&self) -> f32 {
        self.threshold_abs
    }

    /// Row sums divided by their maximum; all zeros for a dark frame
    pub fn normalized(&self) -> Vec<f32> {
        let max = self.sums.iter().copied().fold(0.0f32, f32::max);
        if max <= 0.0 {
            return vec![0.0; self.sums.len()];
        }
        self.sums.iter().map(|s| s / max).collect()
    }

    /// Indices of over-threshold rows in ascending order
    pub fn over_threshold(&self) -> &[usize] {
        &self.over_threshold
    }

    /// Beam bounds, present when at least two rows are over threshold
    pub fn beam(&self) -> Option<BeamSpan> {
        match self.over_threshold.as_slice() {
            [first, .., last] => Some(BeamSpan {
                first: *first,
                last: *last,
            }),
            _ => None,
        }
    }
}

fn column(fraction: f32, width: u32) -> u32 {
    ((fraction.clamp(0.0, 1.0) * width as f32) as u32).min(width)
}
