//! Augmented-reality map overlay.
//!
//! A [`tracker::Tracker`] follows a planar marker (a printed map) through a
//! video, a [`projector::CoordinateProjector`] places geographic features on
//! the marker, and a [`render::Compositor`] draws them into each frame.

pub mod camera;
pub mod capture;
pub mod config;
pub mod data_loader;
pub mod detected_points;
pub mod detection;
pub mod error;
pub mod io;
pub mod matching;
pub mod optical_flow;
pub mod optimization;
pub mod projector;
pub mod render;
pub mod synthetic;
pub mod tracker;
pub mod types;
pub mod util;
pub mod vector;

#[cfg(feature = "visualization")]
pub mod visualization;

pub use error::{Error, Result};
