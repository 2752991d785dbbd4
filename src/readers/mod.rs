pub mod geotiff;
pub mod types;

pub use geotiff::{GeoTiffSceneReader, SCENE_ATTRIBUTES_FILE};
pub use types::BandReader;
