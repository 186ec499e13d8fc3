//! Feature detection driver

use glam::Vec2;
use tracing::debug;

use trackvue_core::{MaskLayer, TrackArea, TrackId, Tracking};
use trackvue_image::{mask, rgba_to_gray_bytes, ImageBuf};

/// One detected feature candidate, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Feature {
    pub x: f64,
    pub y: f64,
    pub score: f64,
    pub size: f64,
}

/// Corner detector the driver calls on a grayscale byte frame.
pub trait FeatureDetector {
    #[allow(clippy::too_many_arguments)]
    fn detect(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
        stride: u32,
        margin: i32,
        min_trackness: i32,
        min_distance: i32,
    ) -> Vec<Feature>;
}

/// Run the detector on a frame and add one selected track per accepted
/// feature.
///
/// An optional polygonal layer filters candidates: with
/// `place_outside_layer` features inside the layer are dropped, otherwise
/// only features inside it are kept. Returns the created track ids.
#[allow(clippy::too_many_arguments)]
pub fn detect_features(
    tracking: &mut Tracking,
    object_index: usize,
    ibuf: &ImageBuf,
    frame: i32,
    margin: i32,
    min_trackness: i32,
    min_distance: i32,
    layer: Option<&MaskLayer>,
    place_outside_layer: bool,
    detector: &dyn FeatureDetector,
) -> Vec<TrackId> {
    let width = ibuf.width();
    let height = ibuf.height();

    let pixels = rgba_to_gray_bytes(ibuf);
    let features = detector.detect(
        &pixels,
        width,
        height,
        width,
        margin,
        min_trackness,
        min_distance,
    );

    debug!(count = features.len(), frame, "features detected");

    let mut created = Vec::new();

    for feature in features {
        let xu = (feature.x / width as f64) as f32;
        let yu = (feature.y / height as f64) as f32;

        let ok = match layer {
            Some(layer) => mask::point_in_layer(layer, xu, yu) != place_outside_layer,
            None => true,
        };

        if ok {
            let id = tracking.track_add(object_index, Vec2::new(xu, yu), frame, width, height);
            tracking.track_select(object_index, id, TrackArea::ALL, true);
            created.push(id);
        }
    }

    created
}
