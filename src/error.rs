//! Crate-level error type and `Result` alias.
//!
//! Only failures the caller has to act on live here: I/O, GDAL, malformed
//! configuration and missing data the run cannot do without. Parameters that
//! cannot be produced for a scene are not errors, see [`crate::parameters::Skip`].
use thiserror::Error;

use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Band catalog is empty, cannot match {target} nm")]
    EmptyCatalog { target: f64 },

    #[error("Band {name} not found in scene")]
    MissingBand { name: String },

    #[error("Raster {name} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        name: String,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Invalid subset: {0}")]
    Subset(String),

    #[error("Output directory {} is the scene directory", .0.display())]
    OutputIsInput(std::path::PathBuf),
}
