//! trackvue-image: pixel-level operations for the motion tracker
//!
//! Frame buffers with float and 8-bit storage, search/pattern region
//! sampling for the template tracker, polygonal mask rasterization, the
//! radial lens distortion kernel, and 2D frame stabilization.

pub mod buffer;
pub mod channels;
pub mod distortion;
pub mod mask;
pub mod sampler;
pub mod stabilization;

pub use buffer::*;
pub use channels::*;
pub use distortion::*;
pub use mask::*;
pub use sampler::*;
pub use stabilization::*;
