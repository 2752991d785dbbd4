//! Scene directories of single-band GeoTIFFs.
//!
//! ```text
//! scene/
//!   scene.json      {"sensor": "S2A_MSI", "sza": 35.2, ...}
//!   rhot_443.tif
//!   rhos_443.tif
//!   ...
//!   lon.tif
//!   lat.tif
//! ```
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use gdal::{Dataset, Metadata};
use ndarray::Array2;
use tracing::debug;
use walkdir::WalkDir;

use super::types::BandReader;
use crate::bbox::Window;
use crate::error::{Error, Result};
use crate::scene::SceneAttributes;

pub const SCENE_ATTRIBUTES_FILE: &str = "scene.json";

pub struct GeoTiffSceneReader {
    dir: PathBuf,
    bands: BTreeMap<String, PathBuf>,
    attributes: SceneAttributes,
}

impl GeoTiffSceneReader {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();

        let file = File::open(dir.join(SCENE_ATTRIBUTES_FILE))?;
        let attributes: SceneAttributes = serde_json::from_reader(BufReader::new(file))?;

        let mut bands = BTreeMap::new();
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| Error::Io(e.into()))?;
            let path = entry.path();

            let is_tiff = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("tif") || ext.eq_ignore_ascii_case("tiff"));
            if !entry.file_type().is_file() || !is_tiff {
                continue;
            }

            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                bands.insert(stem.to_string(), path.to_path_buf());
            }
        }

        debug!("Found {} rasters in {}", bands.len(), dir.display());

        Ok(Self {
            dir,
            bands,
            attributes,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Projection WKT of the first raster, empty when there is none.
    pub fn projection(&self) -> Result<String> {
        match self.bands.values().next() {
            Some(path) => Ok(Dataset::open(path)?.projection()),
            None => Ok(String::new()),
        }
    }

    fn dataset(&self, name: &str) -> Result<Dataset> {
        let path = self.bands.get(name).ok_or_else(|| Error::MissingBand {
            name: name.to_string(),
        })?;
        Ok(Dataset::open(path)?)
    }

    fn first_dataset(&self) -> Result<Dataset> {
        let name = self.bands.keys().next().ok_or_else(|| Error::MissingBand {
            name: format!("any raster in {}", self.dir.display()),
        })?;
        self.dataset(name)
    }
}

impl BandReader for GeoTiffSceneReader {
    fn scene_attributes(&self) -> Result<SceneAttributes> {
        Ok(self.attributes.clone())
    }

    fn band_names(&self) -> Result<Vec<String>> {
        Ok(self.bands.keys().cloned().collect())
    }

    fn raster_size(&self) -> Result<(usize, usize)> {
        Ok(self.first_dataset()?.raster_size())
    }

    fn geotransform(&self) -> Result<[f64; 6]> {
        let dataset = self.first_dataset()?;
        Ok(dataset
            .geo_transform()
            .unwrap_or([0.0, 1.0, 0.0, 0.0, 0.0, 1.0]))
    }

    fn read_band(&self, name: &str, window: Option<&Window>) -> Result<Array2<f32>> {
        let dataset = self.dataset(name)?;
        let band = dataset.rasterband(1)?;

        let (width, height) = dataset.raster_size();
        let window = window.copied().unwrap_or(Window {
            x_off: 0,
            y_off: 0,
            width,
            height,
        });

        let buffer = band.read_as::<f32>(
            (window.x_off as isize, window.y_off as isize),
            (window.width, window.height),
            (window.width, window.height),
            None,
        )?;

        let no_data = band.no_data_value();
        let scale = band.scale().unwrap_or(1.0) as f32;
        let offset = band.offset().unwrap_or(0.0) as f32;

        let data: Vec<f32> = buffer
            .data()
            .iter()
            .map(|&v| match no_data {
                Some(nd) if nd.is_nan() && v.is_nan() => f32::NAN,
                Some(nd) if v as f64 == nd => f32::NAN,
                _ => v * scale + offset,
            })
            .collect();

        let found = (data.len() / window.width.max(1), window.width);
        Array2::from_shape_vec(window.shape(), data).map_err(|_| Error::ShapeMismatch {
            name: name.to_string(),
            expected: window.shape(),
            found,
        })
    }

    fn band_attributes(&self, name: &str) -> Result<BTreeMap<String, String>> {
        let dataset = self.dataset(name)?;
        let band = dataset.rasterband(1)?;

        let mut attributes = BTreeMap::new();
        for entries in [dataset.metadata_domain(""), band.metadata_domain("")]
            .into_iter()
            .flatten()
        {
            for entry in entries {
                if let Some((key, value)) = entry.split_once('=') {
                    attributes.insert(key.to_string(), value.to_string());
                }
            }
        }

        Ok(attributes)
    }
}
