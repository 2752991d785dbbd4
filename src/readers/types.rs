use std::collections::BTreeMap;

use ndarray::Array2;

use crate::bbox::Window;
use crate::error::Result;
use crate::scene::SceneAttributes;

/// Storage-side access to one scene.
pub trait BandReader {
    fn scene_attributes(&self) -> Result<SceneAttributes>;

    /// Every raster available, reflectance bands and auxiliary ones alike.
    fn band_names(&self) -> Result<Vec<String>>;

    /// `(width, height)` of the full rasters.
    fn raster_size(&self) -> Result<(usize, usize)>;

    fn geotransform(&self) -> Result<[f64; 6]>;

    /// Reads a band as `f32`, no-data values replaced by NaN.
    fn read_band(&self, name: &str, window: Option<&Window>) -> Result<Array2<f32>>;

    fn band_attributes(&self, name: &str) -> Result<BTreeMap<String, String>>;
}
