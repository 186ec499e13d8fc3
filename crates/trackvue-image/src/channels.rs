//! Channel disabling and grayscale conversion

use trackvue_core::{Track, TrackFlags};

use crate::buffer::ImageBuf;

/// Rec. 709 luminance weights
pub const LUMA_RED: f32 = 0.2126;
pub const LUMA_GREEN: f32 = 0.7152;
pub const LUMA_BLUE: f32 = 0.0722;

/// Zap channels the user disabled. Instead of plain zeroing, the remaining
/// channels are rescaled so their luminance weights still sum to one, which
/// keeps e.g. a blue-only preview from going nearly black. With `grayscale`
/// the rescaled luminance is written to all three channels.
pub fn disable_channels(
    buf: &mut ImageBuf,
    disable_red: bool,
    disable_green: bool,
    disable_blue: bool,
    grayscale: bool,
) {
    if !disable_red && !disable_green && !disable_blue && !grayscale {
        return;
    }

    let scale = (if disable_red { 0.0 } else { LUMA_RED })
        + (if disable_green { 0.0 } else { LUMA_GREEN })
        + (if disable_blue { 0.0 } else { LUMA_BLUE });
    // all channels disabled: avoid dividing by zero, output goes black
    let scale = scale.max(f32::EPSILON);

    let width = buf.width();
    let height = buf.height();

    for y in 0..height {
        for x in 0..width {
            let mut rgba = buf.pixel(x as i64, y as i64);
            if disable_red {
                rgba[0] = 0.0;
            }
            if disable_green {
                rgba[1] = 0.0;
            }
            if disable_blue {
                rgba[2] = 0.0;
            }

            if grayscale {
                let gray =
                    (LUMA_RED * rgba[0] + LUMA_GREEN * rgba[1] + LUMA_BLUE * rgba[2]) / scale;
                rgba[0] = gray;
                rgba[1] = gray;
                rgba[2] = gray;
            }

            buf.set_pixel(x, y, rgba);
        }
    }
}

/// Apply [`disable_channels`] according to a track's channel flags.
pub fn disable_track_channels(buf: &mut ImageBuf, track: &Track, grayscale: bool) {
    disable_channels(
        buf,
        track.flags.contains(TrackFlags::DISABLE_RED),
        track.flags.contains(TrackFlags::DISABLE_GREEN),
        track.flags.contains(TrackFlags::DISABLE_BLUE),
        grayscale,
    );
}

/// Whether the track requests any channel manipulation at all.
pub fn track_disables_channels(track: &Track) -> bool {
    track.flags.intersects(
        TrackFlags::DISABLE_RED
            | TrackFlags::DISABLE_GREEN
            | TrackFlags::DISABLE_BLUE
            | TrackFlags::PREVIEW_GRAYSCALE,
    )
}

/// Collapse an RGBA buffer to grayscale float intensities.
pub fn rgba_to_gray(buf: &ImageBuf) -> Vec<f32> {
    let count = (buf.width() * buf.height()) as usize;
    let mut gray = Vec::with_capacity(count);

    match (buf.float_pixels(), buf.byte_pixels()) {
        (Some(pixels), _) => {
            for pixel in pixels.chunks_exact(4) {
                gray.push(LUMA_RED * pixel[0] + LUMA_GREEN * pixel[1] + LUMA_BLUE * pixel[2]);
            }
        }
        (_, Some(pixels)) => {
            for pixel in pixels.chunks_exact(4) {
                gray.push(
                    (LUMA_RED * pixel[0] as f32
                        + LUMA_GREEN * pixel[1] as f32
                        + LUMA_BLUE * pixel[2] as f32)
                        / 255.0,
                );
            }
        }
        _ => unreachable!("buffer is either float or byte"),
    }

    gray
}

/// Grayscale 8-bit intensities, used by feature detection.
pub fn rgba_to_gray_bytes(buf: &ImageBuf) -> Vec<u8> {
    rgba_to_gray(buf)
        .into_iter()
        .map(|value| (value.clamp(0.0, 1.0) * 255.0).round() as u8)
        .collect()
}
