//! 2D stabilization configuration and cached state

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::track::TrackId;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct StabilizationFlags: u8 {
        /// Master switch for 2D stabilization
        const USE_2D_STABILIZATION = 1 << 0;
        /// Scale frames up until no black border remains
        const AUTOSCALE = 1 << 1;
        /// Compensate rotation around the designated rotation track
        const STABILIZE_ROTATION = 1 << 2;
    }
}

/// Interpolation filter used when resampling the stabilized frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StabilizationFilter {
    Nearest,
    #[default]
    Bilinear,
    Bicubic,
}

/// Stabilization setup plus the cached autoscale factor.
///
/// `scale` and `ok` form a lazy cache: any marker or settings mutation calls
/// [`Stabilization::tag_update`], the next data query recomputes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stabilization {
    pub flags: StabilizationFlags,
    /// Influence of translation compensation, 0..1
    pub locinf: f32,
    /// Influence of the autoscale factor, 0..1
    pub scaleinf: f32,
    /// Influence of rotation compensation, 0..1
    pub rotinf: f32,
    /// Upper bound for the autoscale factor; 0 disables the bound
    pub maxscale: f32,
    /// Track whose markers define the rotation to compensate
    pub rot_track: Option<TrackId>,
    pub filter: StabilizationFilter,

    /// Cached autoscale factor
    pub scale: f32,
    /// Cache validity
    #[serde(skip)]
    pub ok: bool,
}

impl Default for Stabilization {
    fn default() -> Self {
        Self {
            flags: StabilizationFlags::empty(),
            locinf: 1.0,
            scaleinf: 1.0,
            rotinf: 1.0,
            maxscale: 2.0,
            rot_track: None,
            filter: StabilizationFilter::default(),
            scale: 1.0,
            ok: false,
        }
    }
}

impl Stabilization {
    /// Invalidate the cached autoscale factor.
    pub fn tag_update(&mut self) {
        self.ok = false;
    }
}
