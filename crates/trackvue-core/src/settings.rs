//! Session-wide tracking defaults and solver settings

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::track::{AlgorithmFlags, MotionModel, PatternMatch, TrackFlags};

bitflags! {
    /// Which intrinsics the solver is allowed to refine
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct RefineFlags: u8 {
        const FOCAL_LENGTH = 1 << 0;
        const PRINCIPAL_POINT = 1 << 1;
        const RADIAL_K1 = 1 << 2;
        const RADIAL_K2 = 1 << 3;
    }
}

bitflags! {
    /// Reconstruction behavior switches
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct ReconstructionSettingsFlags: u8 {
        /// Let the solver pick the two initialization keyframes
        const KEYFRAME_SELECTION = 1 << 0;
        /// Fall back to a plain reprojection solve when the threshold fails
        const FALLBACK_RECONSTRUCTION = 1 << 1;
    }
}

bitflags! {
    /// Camera motion type switches
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct MotionFlags: u8 {
        /// Tripod shot: solve rotation only
        const MODAL = 1 << 0;
    }
}

/// Defaults used when adding tracks, plus solver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingSettings {
    pub default_motion_model: MotionModel,
    pub default_pattern_match: PatternMatch,
    pub default_algorithm_flags: AlgorithmFlags,
    pub default_flags: TrackFlags,
    pub default_minimum_correlation: f32,
    /// Side length of a fresh pattern region, in pixels
    pub default_pattern_size: u32,
    /// Side length of a fresh search region, in pixels
    pub default_search_size: u32,
    pub default_margin: i32,
    pub default_frames_limit: i32,

    pub motion_flags: MotionFlags,
    pub reconstruction_flags: ReconstructionSettingsFlags,
    pub refine_intrinsics: RefineFlags,
    pub reconstruction_success_threshold: f32,
    /// Distance between the two bootstrap cameras, reconstruction scale
    pub object_distance: f32,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            default_motion_model: MotionModel::Translation,
            default_pattern_match: PatternMatch::Keyframe,
            default_algorithm_flags: AlgorithmFlags::USE_BRUTE,
            default_flags: TrackFlags::empty(),
            default_minimum_correlation: 0.75,
            default_pattern_size: 15,
            default_search_size: 61,
            default_margin: 0,
            default_frames_limit: 0,
            motion_flags: MotionFlags::empty(),
            reconstruction_flags: ReconstructionSettingsFlags::empty(),
            refine_intrinsics: RefineFlags::empty(),
            reconstruction_success_threshold: 1e-3,
            object_distance: 1.0,
        }
    }
}
