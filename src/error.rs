use std::path::PathBuf;

/// Errors surfaced while loading projects, layers and imagery.
///
/// Tracking loss is not an error: it is reported as `None` from
/// [`crate::tracker::Tracker::update`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("too few correspondences: need {needed}, got {got}")]
    TooFewCorrespondences { needed: usize, got: usize },

    #[error("src has {src} points but dst has {dst}")]
    MismatchedCorrespondences { src: usize, dst: usize },

    #[error("correspondences do not define an invertible transform")]
    DegenerateTransform,

    #[error("layer `{layer}` has no coordinate transform")]
    MissingTransform { layer: String },

    #[error("unknown layer `{0}`")]
    UnknownLayer(String),

    #[error("no frames found in {0}")]
    NoFrames(PathBuf),

    #[error("geojson has no `features` array")]
    NotAFeatureCollection,
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Error {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
