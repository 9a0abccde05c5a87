//! Project description loaded from `config.json`, plus the tunables of the
//! tracker and the compositor.
//!
//! ```json
//! {
//!   "target": "marker.png",
//!   "coords": { "src": [[-8.61, 41.15], ...], "dst": [[120, 80], ...] },
//!   "layers": [{ "name": "Monuments", "description": "...", "file": "monuments.geojson" }]
//! }
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::detection::OrbConfig;
use crate::error::{Error, Result};
use crate::optical_flow::LkConfig;
use crate::optimization::RansacConfig;

/// Point correspondences from geographic points, given in planar
/// `[lon, lat]` order, to marker pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformConfig {
    pub src: Vec<[f64; 2]>,
    pub dst: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// GeoJSON file, relative to the project directory.
    pub file: PathBuf,
    /// Overrides the project-level transform for this layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coords: Option<TransformConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Marker image, relative to the project directory.
    pub target: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coords: Option<TransformConfig>,
    #[serde(default)]
    pub layers: Vec<LayerConfig>,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

impl ProjectConfig {
    pub fn layer(&self, name: &str) -> Result<&LayerConfig> {
        self.layers
            .iter()
            .find(|l| l.name == name)
            .ok_or_else(|| Error::UnknownLayer(name.to_string()))
    }

    /// The layer's own transform, else the project one.
    pub fn transform_for<'a>(&'a self, layer: &'a LayerConfig) -> Result<&'a TransformConfig> {
        layer
            .coords
            .as_ref()
            .or(self.coords.as_ref())
            .ok_or_else(|| Error::MissingTransform {
                layer: layer.name.clone(),
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Re-acquisition needs strictly more ratio-test matches than this.
    pub min_matches: usize,
    /// Optical flow keeps tracking while at least
    /// `flow_survivor_factor * min_matches` points survive.
    pub flow_survivor_factor: usize,
    /// While lost, detection runs on frames whose index is a multiple of this.
    pub reacquire_period: u64,
    pub lowe_ratio: f32,
    pub ransac: RansacConfig,
    pub orb: OrbConfig,
    pub lk: LkConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            min_matches: 50,
            flow_survivor_factor: 25,
            reacquire_period: 10,
            lowe_ratio: 0.7,
            ransac: RansacConfig::default(),
            orb: OrbConfig::default(),
            lk: LkConfig::default(),
        }
    }
}

impl TrackerConfig {
    pub fn min_flow_survivors(&self) -> usize {
        self.flow_survivor_factor * self.min_matches
    }
}

/// Colours are RGB, sizes are pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Overlay weight of the blend; the frame gets `1 - opacity`.
    pub opacity: f32,
    pub point_color: [u8; 3],
    pub point_radius: i32,
    pub line_color: [u8; 3],
    pub line_thickness: i32,
    pub polygon_color: [u8; 3],
    pub polygon_border_color: [u8; 3],
    pub highlight_ring_offset: i32,
    pub highlight_ring_thickness: i32,
    pub draw_marker_border: bool,
    pub marker_border_color: [u8; 3],
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            opacity: 0.6,
            point_color: [255, 60, 0],
            point_radius: 5,
            line_color: [255, 215, 0],
            line_thickness: 2,
            polygon_color: [255, 139, 0],
            polygon_border_color: [255, 0, 0],
            highlight_ring_offset: 13,
            highlight_ring_thickness: 3,
            draw_marker_border: false,
            marker_border_color: [0, 255, 0],
        }
    }
}
