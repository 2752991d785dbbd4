use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use gdal::raster::{Buffer, GdalType};
use gdal::{Dataset, DriverManager, Metadata};
use ndarray::ArrayView2;
use tracing::debug;

use super::{OutputRecord, ProductSink, RasterData};
use crate::error::{Error, Result};

/// Metadata domain holding the run-wide attributes.
pub const GLOBAL_METADATA_DOMAIN: &str = "L2W_GLOBAL";

/// Item every raster written by the sink carries in the global domain. Files
/// without it are never listed or removed.
const OWNER_ITEM: &str = "l2w_dataset";

/// Refuses an output directory that is the scene directory itself.
pub fn ensure_distinct(input: &Path, output: &Path) -> Result<()> {
    if input.canonicalize()? == output.canonicalize()? {
        return Err(Error::OutputIsInput(output.to_path_buf()));
    }
    Ok(())
}

fn is_owned(path: &Path) -> bool {
    Dataset::open(path)
        .ok()
        .and_then(|ds| ds.metadata_item(OWNER_ITEM, GLOBAL_METADATA_DOMAIN))
        .is_some()
}

/// Writes every dataset to `<dir>/<name>.tif`.
pub struct GeoTiffSink {
    dir: PathBuf,
    geotransform: Option<[f64; 6]>,
    projection: Option<String>,
}

impl GeoTiffSink {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            geotransform: None,
            projection: None,
        }
    }

    /// Georeferencing applied to every written raster.
    pub fn with_georeference(mut self, geotransform: [f64; 6], projection: String) -> Self {
        self.geotransform = Some(geotransform);
        self.projection = (!projection.is_empty()).then_some(projection);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.tif", name))
    }

    fn pattern(&self) -> String {
        format!(
            "{}/*.tif",
            glob::Pattern::escape(&self.dir.to_string_lossy())
        )
    }

    /// Rasters in the directory this sink wrote.
    fn owned_paths(&self) -> Result<Vec<PathBuf>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        Ok(glob::glob(&self.pattern())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?
            .flatten()
            .filter(|path| is_owned(path))
            .collect())
    }

    fn clear(&self) -> Result<()> {
        for path in self.owned_paths()? {
            debug!("Removing {}", path.display());
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    fn create<T: GdalType + Copy>(&self, path: &Path, data: ArrayView2<'_, T>) -> Result<Dataset> {
        let (rows, cols) = data.dim();
        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let mut ds = driver.create_with_band_type::<T, _>(path, cols, rows, 1)?;

        if let Some(gt) = self.geotransform {
            ds.set_geo_transform(&gt)?;
            if let Some(projection) = &self.projection {
                ds.set_projection(projection)?;
            }
        }

        let mut buf = Buffer::new((cols, rows), data.iter().copied().collect());
        let mut band = ds.rasterband(1)?;
        band.write((0, 0), (cols, rows), &mut buf)?;

        Ok(ds)
    }
}

impl ProductSink for GeoTiffSink {
    fn dataset_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .owned_paths()?
            .into_iter()
            .filter_map(|path| {
                path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .map(str::to_string)
            })
            .collect();
        names.sort();

        Ok(names)
    }

    fn write(&mut self, record: OutputRecord<'_>) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        if record.new {
            self.clear()?;
        }

        let path = self.path(record.name);
        let mut ds = match record.data {
            RasterData::Float32(data) => {
                let ds = self.create(&path, data)?;
                ds.rasterband(1)?.set_no_data_value(Some(f64::NAN))?;
                ds
            }
            RasterData::Int32(data) => self.create(&path, data)?,
        };

        for (key, value) in record.attributes {
            ds.set_metadata_item(key, value, "")?;
        }
        for (key, value) in record.global {
            ds.set_metadata_item(key, value, GLOBAL_METADATA_DOMAIN)?;
        }
        ds.set_metadata_item(OWNER_ITEM, record.name, GLOBAL_METADATA_DOMAIN)?;

        debug!("Wrote {}", path.display());
        Ok(())
    }
}
