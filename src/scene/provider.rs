use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use ndarray::Array2;
use tracing::debug;

use super::{BandCatalog, Domain, SceneAttributes, SolarZenith, parse_band_name};
use crate::bbox::{Subset, Window};
use crate::error::{Error, Result};
use crate::readers::BandReader;

/// Name of the optional per-pixel solar zenith raster.
pub const SZA_BAND: &str = "sza";

/// Source of band rasters for the flag engine, the copy stage and the
/// parameter families.
///
/// Every fetched raster is an owned copy the caller may modify (masking,
/// unit conversion) and drop once it is consumed.
pub trait BandProvider {
    fn attributes(&self) -> &SceneAttributes;

    /// `(rows, cols)` of every raster served.
    fn shape(&self) -> (usize, usize);

    fn catalog(&self, domain: Domain) -> &BandCatalog;

    fn has_band(&self, name: &str) -> bool;

    fn band(&self, name: &str) -> Result<Array2<f32>>;

    fn band_attributes(&self, name: &str) -> Result<BTreeMap<String, String>>;

    /// Per-pixel solar zenith when the scene carries an `sza` raster, the
    /// scene attribute otherwise.
    fn solar_zenith(&self) -> Result<Option<SolarZenith>> {
        if self.has_band(SZA_BAND) {
            return Ok(Some(SolarZenith::Raster(self.band(SZA_BAND)?)));
        }
        Ok(self.attributes().sza.map(SolarZenith::Scalar))
    }
}

/// Scene backed by a [`BandReader`], rasters are read when first asked for.
///
/// With `retain_bands` the rasters stay cached after the first read, which
/// trades memory for I/O when the same band feeds several parameters.
pub struct LazyScene<R> {
    reader: R,
    attributes: SceneAttributes,
    window: Option<Window>,
    shape: (usize, usize),
    names: BTreeSet<String>,
    catalogs: BTreeMap<Domain, BandCatalog>,
    cache: Option<RefCell<HashMap<String, Array2<f32>>>>,
}

impl<R: BandReader> LazyScene<R> {
    pub fn open(reader: R, subset: Option<&Subset>) -> Result<Self> {
        let attributes = reader.scene_attributes()?;
        let (width, height) = reader.raster_size()?;

        let window = match subset {
            Some(subset) => Some(subset.resolve(&reader.geotransform()?, width, height)?),
            None => None,
        };
        let shape = window.map(|w| w.shape()).unwrap_or((height, width));

        let mut names = BTreeSet::new();
        let mut catalogs: BTreeMap<Domain, BandCatalog> = BTreeMap::new();
        for name in reader.band_names()? {
            if let Some((domain, wavelength)) = parse_band_name(&name) {
                catalogs
                    .entry(domain)
                    .or_default()
                    .push(wavelength, name.clone());
            }
            names.insert(name);
        }
        // file discovery order says nothing about the spectrum
        for catalog in catalogs.values_mut() {
            catalog.sort_by_wavelength();
        }

        debug!(
            "Opened scene for {} with {} bands, shape {:?}",
            attributes.sensor,
            names.len(),
            shape
        );

        Ok(Self {
            reader,
            attributes,
            window,
            shape,
            names,
            catalogs,
            cache: None,
        })
    }

    pub fn retain_bands(mut self, retain: bool) -> Self {
        self.cache = retain.then(|| RefCell::new(HashMap::new()));
        self
    }

    pub fn window(&self) -> Option<&Window> {
        self.window.as_ref()
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }
}

impl<R: BandReader> BandProvider for LazyScene<R> {
    fn attributes(&self) -> &SceneAttributes {
        &self.attributes
    }

    fn shape(&self) -> (usize, usize) {
        self.shape
    }

    fn catalog(&self, domain: Domain) -> &BandCatalog {
        static EMPTY: BandCatalog = BandCatalog::new();
        self.catalogs.get(&domain).unwrap_or(&EMPTY)
    }

    fn has_band(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    fn band(&self, name: &str) -> Result<Array2<f32>> {
        if !self.has_band(name) {
            return Err(Error::MissingBand {
                name: name.to_string(),
            });
        }

        if let Some(data) = self
            .cache
            .as_ref()
            .and_then(|cache| cache.borrow().get(name).cloned())
        {
            return Ok(data);
        }

        let data = self.reader.read_band(name, self.window.as_ref())?;
        if data.dim() != self.shape {
            return Err(Error::ShapeMismatch {
                name: name.to_string(),
                expected: self.shape,
                found: data.dim(),
            });
        }

        if let Some(cache) = &self.cache {
            cache.borrow_mut().insert(name.to_string(), data.clone());
        }

        Ok(data)
    }

    fn band_attributes(&self, name: &str) -> Result<BTreeMap<String, String>> {
        self.reader.band_attributes(name)
    }
}
