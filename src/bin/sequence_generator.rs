use std::path::PathBuf;

use anyhow::Context;
use ar4maps::io::{load_rgb, object_to_json, save_frame};
use ar4maps::synthetic::{orbit_homography, textured_image, warp_perspective};
use clap::Parser;
use image::Rgb;
use indicatif::ParallelProgressIterator;
use log::info;
use rayon::prelude::*;
use serde::Serialize;

#[derive(Parser)]
#[command(author, version, about = "Generate a synthetic moving-marker frame sequence", long_about = None)]
struct Args {
    /// Marker image; a seeded texture is used when omitted
    #[arg(short, long)]
    marker: Option<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    output: PathBuf,

    /// Number of frames to generate
    #[arg(short, long, default_value = "60")]
    frames: usize,

    /// Image width
    #[arg(long, default_value = "640")]
    width: u32,

    /// Image height
    #[arg(long, default_value = "480")]
    height: u32,

    /// Seed for the generated marker texture
    #[arg(long, default_value = "0")]
    seed: u64,
}

/// Ground truth for one frame: marker pixels to frame pixels, row-major.
#[derive(Serialize)]
struct TrajectoryEntry {
    frame: usize,
    file: String,
    homography: [[f64; 3]; 3],
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let marker = match &args.marker {
        Some(path) => load_rgb(path).with_context(|| format!("loading {}", path.display()))?,
        None => textured_image(args.width / 2, args.height / 2, args.seed),
    };
    let marker_size = marker.dimensions();
    let canvas = (args.width, args.height);
    let frames_dir = args.output.join("frames");
    std::fs::create_dir_all(&frames_dir)
        .with_context(|| format!("creating {}", frames_dir.display()))?;

    let trajectory: Vec<TrajectoryEntry> = (0..args.frames)
        .into_par_iter()
        .progress_count(args.frames as u64)
        .map(|i| -> anyhow::Result<TrajectoryEntry> {
            let h = orbit_homography(marker_size, canvas, i as f64 / args.frames as f64);
            let frame = warp_perspective(&marker, &h, args.width, args.height, Rgb([48, 48, 48]));
            // frame files are numbered from 1, like the tracker's frame counter
            save_frame(&frames_dir, i + 1, &frame)?;
            Ok(TrajectoryEntry {
                frame: i + 1,
                file: format!("frames/frame_{:06}.png", i + 1),
                homography: std::array::from_fn(|r| std::array::from_fn(|c| h[(r, c)])),
            })
        })
        .collect::<anyhow::Result<_>>()?;

    let marker_path = args.output.join("marker.png");
    marker
        .save(&marker_path)
        .with_context(|| format!("writing {}", marker_path.display()))?;
    object_to_json(args.output.join("trajectory.json"), &trajectory)?;

    info!(
        "generated {} frames in {}",
        trajectory.len(),
        args.output.display()
    );
    Ok(())
}
