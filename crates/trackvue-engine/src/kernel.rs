//! Pluggable template tracker kernel

use trackvue_core::{AlgorithmFlags, MotionModel, Track};

/// Grayscale float patch handed to the tracker
#[derive(Debug, Clone, Copy)]
pub struct Patch<'a> {
    pub pixels: &'a [f32],
    pub width: u32,
    pub height: u32,
}

impl<'a> Patch<'a> {
    pub fn new(pixels: &'a [f32], width: u32, height: u32) -> Self {
        debug_assert_eq!(pixels.len(), (width * height) as usize);
        Self {
            pixels,
            width,
            height,
        }
    }

    fn at(&self, x: i32, y: i32) -> f32 {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return 0.0;
        }
        self.pixels[(y as u32 * self.width + x as u32) as usize]
    }
}

/// Settings for one [`TrackerKernel::track_region`] call
#[derive(Debug, Clone)]
pub struct TrackRegionOptions {
    pub motion_model: MotionModel,
    pub num_iterations: u32,
    pub minimum_correlation: f64,
    pub sigma: f64,
    pub use_brute: bool,
    pub use_normalization: bool,
}

impl TrackRegionOptions {
    /// Options for a track, the way the tracking pipeline configures them.
    pub fn from_track(track: &Track) -> Self {
        Self {
            motion_model: track.motion_model,
            num_iterations: 50,
            minimum_correlation: track.minimum_correlation as f64,
            sigma: 0.9,
            use_brute: track.algorithm_flags.contains(AlgorithmFlags::USE_BRUTE),
            use_normalization: track
                .algorithm_flags
                .contains(AlgorithmFlags::USE_NORMALIZATION),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TrackRegionResult {
    /// Correlation between the warped reference and the matched region
    pub correlation: f64,
}

/// The planar template matcher the tracking pipeline calls per track and
/// frame.
///
/// `src_x`/`src_y` are the five reference points (four pattern corners plus
/// center) in the reference patch; `dst_x`/`dst_y` come pre-filled with the
/// initial guess in the destination patch and receive the result. `None`
/// means the match failed (below minimum correlation or degenerate input);
/// the destination points are meaningless in that case.
pub trait TrackerKernel: Sync {
    #[allow(clippy::too_many_arguments)]
    fn track_region(
        &self,
        options: &TrackRegionOptions,
        reference: Patch<'_>,
        destination: Patch<'_>,
        reference_mask: Option<&[f32]>,
        src_x: &[f64; 5],
        src_y: &[f64; 5],
        dst_x: &mut [f64; 5],
        dst_y: &mut [f64; 5],
    ) -> Option<TrackRegionResult>;
}

/// Default kernel: exhaustive translation search maximizing the zero-mean
/// normalized cross-correlation of the pattern bbox. No warp refinement, so
/// rotation/scale motion models degrade to translation.
#[derive(Debug, Default, Clone, Copy)]
pub struct BruteForceTracker;

impl TrackerKernel for BruteForceTracker {
    fn track_region(
        &self,
        options: &TrackRegionOptions,
        reference: Patch<'_>,
        destination: Patch<'_>,
        reference_mask: Option<&[f32]>,
        src_x: &[f64; 5],
        src_y: &[f64; 5],
        dst_x: &mut [f64; 5],
        dst_y: &mut [f64; 5],
    ) -> Option<TrackRegionResult> {
        // template region: pattern bbox in the reference patch
        let min_x = src_x[..4].iter().cloned().fold(f64::MAX, f64::min).round() as i32;
        let max_x = src_x[..4].iter().cloned().fold(f64::MIN, f64::max).round() as i32;
        let min_y = src_y[..4].iter().cloned().fold(f64::MAX, f64::min).round() as i32;
        let max_y = src_y[..4].iter().cloned().fold(f64::MIN, f64::max).round() as i32;

        let template_width = max_x - min_x + 1;
        let template_height = max_y - min_y + 1;
        if template_width <= 0 || template_height <= 0 {
            return None;
        }

        let mut template =
            Vec::with_capacity((template_width * template_height) as usize);
        for y in 0..template_height {
            for x in 0..template_width {
                let mut value = reference.at(min_x + x, min_y + y);
                if let Some(mask) = reference_mask {
                    let mx = min_x + x;
                    let my = min_y + y;
                    if mx >= 0 && my >= 0 && mx < reference.width as i32 && my < reference.height as i32 {
                        value *= mask[(my as u32 * reference.width + mx as u32) as usize];
                    }
                }
                template.push(value as f64);
            }
        }

        let template_mean = template.iter().sum::<f64>() / template.len() as f64;
        let template_var: f64 = template
            .iter()
            .map(|value| (value - template_mean) * (value - template_mean))
            .sum();
        if template_var < 1e-12 {
            return None;
        }

        // exhaustive search over every position the template fits
        let mut best_correlation = f64::MIN;
        let mut best = (min_x, min_y);

        let span_x = destination.width as i32 - template_width;
        let span_y = destination.height as i32 - template_height;
        if span_x < 0 || span_y < 0 {
            return None;
        }

        let mut candidate = vec![0.0f64; template.len()];
        for offset_y in 0..=span_y {
            for offset_x in 0..=span_x {
                for y in 0..template_height {
                    for x in 0..template_width {
                        candidate[(y * template_width + x) as usize] =
                            destination.at(offset_x + x, offset_y + y) as f64;
                    }
                }

                let mean = candidate.iter().sum::<f64>() / candidate.len() as f64;
                let mut covariance = 0.0;
                let mut variance = 0.0;
                for (t, c) in template.iter().zip(candidate.iter()) {
                    covariance += (t - template_mean) * (c - mean);
                    variance += (c - mean) * (c - mean);
                }

                if variance < 1e-12 {
                    continue;
                }

                let correlation = covariance / (template_var * variance).sqrt();
                if correlation > best_correlation {
                    best_correlation = correlation;
                    best = (offset_x, offset_y);
                }
            }
        }

        if best_correlation < options.minimum_correlation {
            return None;
        }

        // translation that moves the template onto the best match
        let shift_x = (best.0 - min_x) as f64;
        let shift_y = (best.1 - min_y) as f64;

        for i in 0..5 {
            dst_x[i] = src_x[i] + shift_x;
            dst_y[i] = src_y[i] + shift_y;
        }

        Some(TrackRegionResult {
            correlation: best_correlation,
        })
    }
}
