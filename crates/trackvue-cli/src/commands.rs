//! Subcommand implementations

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use trackvue_core::{
    coverage_per_frame, DopesheetFlags, DopesheetSort, Tracking,
};
use trackvue_image::stabilization_data;

fn load_session(path: &Path) -> Result<Tracking> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read session file {}", path.display()))?;
    let tracking: Tracking = serde_json::from_str(&data)
        .with_context(|| format!("failed to parse session file {}", path.display()))?;
    Ok(tracking)
}

pub fn info(file: &Path) -> Result<()> {
    let tracking = load_session(file)?;

    println!("Session: {}", file.display());
    println!(
        "Camera: focal {:.1}px, principal ({:.1}, {:.1}), k1 {:.4} k2 {:.4} k3 {:.4}",
        tracking.camera.focal,
        tracking.camera.principal.x,
        tracking.camera.principal.y,
        tracking.camera.k1,
        tracking.camera.k2,
        tracking.camera.k3,
    );
    println!();

    for (index, object) in tracking.objects.iter().enumerate() {
        let tracks = tracking.object_tracks(index);
        let reconstruction = tracking.object_reconstruction(index);

        let kind = if object.is_camera() { "camera" } else { "object" };
        println!(
            "[{kind}] {} - {} tracks, keyframes {}..{}",
            object.name,
            tracks.len(),
            object.keyframe1,
            object.keyframe2,
        );

        for track in tracks {
            let markers = track.markers();
            let enabled = markers.iter().filter(|m| !m.is_disabled()).count();
            let bundle = match track.bundle_pos {
                Some(pos) => format!("bundle ({:.3}, {:.3}, {:.3})", pos.x, pos.y, pos.z),
                None => "no bundle".to_string(),
            };
            println!(
                "  {} - {} markers ({} enabled), {}",
                track.name,
                markers.len(),
                enabled,
                bundle,
            );
        }

        if reconstruction.is_reconstructed() {
            println!(
                "  reconstructed: {} cameras, error {:.4}",
                reconstruction.cameras().len(),
                reconstruction.error,
            );
        }
    }

    Ok(())
}

pub fn dope(file: &Path, sort: &str, inverse: bool) -> Result<()> {
    let mut tracking = load_session(file)?;

    tracking.dopesheet.sort_method = match sort {
        "name" => DopesheetSort::Name,
        "longest" => DopesheetSort::Longest,
        "total" => DopesheetSort::Total,
        "error" => DopesheetSort::AverageError,
        other => anyhow::bail!("unknown sort order `{other}` (name, longest, total, error)"),
    };
    if inverse {
        tracking.dopesheet.flags |= DopesheetFlags::SORT_INVERSE;
    }

    tracking.dopesheet_tag_update();
    tracking.dopesheet_update();

    println!("{:<24} {:>8} {:>8}  segments", "channel", "total", "longest");
    for channel in &tracking.dopesheet.channels {
        let segments: Vec<String> = channel
            .segments
            .iter()
            .map(|(start, end)| format!("{start}..{end}"))
            .collect();
        println!(
            "{:<24} {:>8} {:>8}  {}",
            channel.name,
            channel.total_frames,
            channel.max_segment,
            segments.join(", "),
        );
    }

    println!();
    println!("coverage:");
    let mut current: Option<(i32, i32, trackvue_core::Coverage)> = None;
    for (frame, coverage) in coverage_per_frame(tracking.active_tracks()) {
        match current.as_mut() {
            Some((_, end, class)) if *class == coverage && *end + 1 == frame => *end = frame,
            _ => {
                if let Some((start, end, class)) = current.take() {
                    println!("  {start}..{end}: {class:?}");
                }
                current = Some((frame, frame, coverage));
            }
        }
    }
    if let Some((start, end, class)) = current {
        println!("  {start}..{end}: {class:?}");
    }

    Ok(())
}

pub fn stab(file: &Path, width: u32, height: u32, from: i32, to: i32) -> Result<()> {
    let mut tracking = load_session(file)?;

    println!(
        "{:>6} {:>10} {:>10} {:>8} {:>8}",
        "frame", "tx", "ty", "scale", "angle"
    );
    for frame in from..=to {
        let (translation, scale, angle) = stabilization_data(&mut tracking, frame, width, height);
        println!(
            "{frame:>6} {:>10.3} {:>10.3} {scale:>8.4} {:>8.4}",
            translation.x,
            translation.y,
            angle.to_degrees(),
        );
    }

    Ok(())
}
