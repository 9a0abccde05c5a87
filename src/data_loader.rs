use std::path::{Path, PathBuf};

use glob::glob;
use image::RgbImage;
use indicatif::ParallelProgressIterator;
use log::{info, trace, warn};
use rayon::prelude::*;

use crate::config::{LayerConfig, ProjectConfig};
use crate::error::{Error, Result};
use crate::io::{load_rgb, object_from_json};
use crate::projector::CoordinateProjector;
use crate::vector::FeatureSet;

pub const PROJECT_FILE: &str = "config.json";

/// A project directory: `config.json`, the marker image and layer files.
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub config: ProjectConfig,
}

impl Project {
    pub fn open(root: impl AsRef<Path>) -> Result<Project> {
        let root = root.as_ref().to_path_buf();
        let config: ProjectConfig = object_from_json(root.join(PROJECT_FILE))?;
        info!(
            "project {} with {} layers",
            root.display(),
            config.layers.len()
        );
        Ok(Project { root, config })
    }

    pub fn load_marker(&self) -> Result<RgbImage> {
        load_rgb(self.root.join(&self.config.target))
    }

    /// Parses and projects a layer. Configuration problems surface here,
    /// before anything is drawn with the layer.
    pub fn load_layer(&self, layer: &LayerConfig) -> Result<FeatureSet> {
        let projector = CoordinateProjector::from_config(self.config.transform_for(layer)?)?;
        let data: serde_json::Value = object_from_json(self.root.join(&layer.file))?;
        let features = FeatureSet::from_geojson(&data, &projector)?;
        info!("layer `{}`: {} features", layer.name, features.len());
        Ok(features)
    }

    pub fn load_layer_by_name(&self, name: &str) -> Result<FeatureSet> {
        self.load_layer(self.config.layer(name)?)
    }
}

fn img_filter(rp: glob::GlobResult) -> Option<PathBuf> {
    match rp {
        Ok(p) => {
            let ext = p.extension()?.to_string_lossy().to_ascii_lowercase();
            matches!(ext.as_str(), "png" | "jpg" | "jpeg").then_some(p)
        }
        Err(e) => {
            warn!("unreadable path: {}", e);
            None
        }
    }
}

/// Sorted image files directly inside `dir`.
pub fn frame_paths(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let pattern = dir.join("*");
    let pattern = pattern.to_string_lossy();
    let img_paths = glob(&pattern).map_err(|_| Error::NoFrames(dir.to_path_buf()))?;
    let mut sorted_path: Vec<PathBuf> = img_paths.filter_map(img_filter).collect();
    sorted_path.sort();
    trace!("{} frames in {}", sorted_path.len(), dir.display());
    if sorted_path.is_empty() {
        return Err(Error::NoFrames(dir.to_path_buf()));
    }
    Ok(sorted_path)
}

/// Decodes every frame of `dir` in parallel, keeping file order.
pub fn load_frames(dir: impl AsRef<Path>, start_idx: usize, step: usize) -> Result<Vec<RgbImage>> {
    let paths = frame_paths(dir)?;
    let new_paths: Vec<_> = paths.iter().skip(start_idx).step_by(step.max(1)).collect();
    new_paths
        .par_iter()
        .progress_count(new_paths.len() as u64)
        .map(|p| load_rgb(p))
        .collect()
}
