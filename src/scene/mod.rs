//! In-memory scene model: named band rasters, band catalogs per reflectance
//! domain and scene-level attributes.

use std::collections::BTreeMap;
use std::fmt::Display;

use ndarray::Array2;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::sensor::Sensor;

pub mod catalog;
pub mod provider;

pub use catalog::{BandCatalog, BandMatch, CatalogEntry};
pub use provider::{BandProvider, LazyScene};

/// Reflectance quantity encoded in a band name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Domain {
    /// Top-of-atmosphere reflectance (`rhot_`)
    Toa,
    /// Surface reflectance (`rhos_`)
    Surface,
    /// Remote-sensing reflectance (`Rrs_`)
    RemoteSensing,
    /// Water-leaving reflectance (`rhow_`)
    WaterLeaving,
}

impl Domain {
    pub const ALL: [Domain; 4] = [
        Domain::Toa,
        Domain::Surface,
        Domain::RemoteSensing,
        Domain::WaterLeaving,
    ];

    pub fn prefix(&self) -> &'static str {
        match self {
            Domain::Toa => "rhot",
            Domain::Surface => "rhos",
            Domain::RemoteSensing => "Rrs",
            Domain::WaterLeaving => "rhow",
        }
    }

    pub fn band_name(&self, wavelength: u32) -> String {
        format!("{}_{}", self.prefix(), wavelength)
    }

    /// Factor converting surface reflectance into this domain.
    pub fn from_surface_factor(&self) -> f32 {
        match self {
            Domain::RemoteSensing => std::f32::consts::FRAC_1_PI,
            _ => 1.0,
        }
    }
}

impl Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

/// Splits a `<quantity>_<wavelength>` band name, e.g. `rhos_865`.
pub fn parse_band_name(name: &str) -> Option<(Domain, u32)> {
    let (prefix, wave) = name.split_once('_')?;
    let domain = Domain::ALL.into_iter().find(|d| d.prefix() == prefix)?;
    let wavelength = wave.parse().ok()?;
    Some((domain, wavelength))
}

/// Solar zenith angle in degrees, either one value for the scene or per pixel.
#[derive(Debug, Clone, PartialEq)]
pub enum SolarZenith {
    Scalar(f64),
    Raster(Array2<f32>),
}

impl SolarZenith {
    pub fn at(&self, row: usize, col: usize) -> f64 {
        match self {
            SolarZenith::Scalar(sza) => *sza,
            SolarZenith::Raster(sza) => sza[(row, col)] as f64,
        }
    }
}

/// Scene-level attributes, read from the scene metadata.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SceneAttributes {
    pub sensor: Sensor,
    #[serde(default)]
    pub sza: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl SceneAttributes {
    pub fn new(sensor: Sensor) -> Self {
        Self {
            sensor,
            sza: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_sza(mut self, sza: f64) -> Self {
        self.sza = Some(sza);
        self
    }

    /// Flattened string attributes written alongside every output dataset.
    pub fn global_attributes(&self) -> BTreeMap<String, String> {
        let mut attributes: BTreeMap<String, String> = self
            .extra
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect();

        attributes.insert("sensor".to_string(), self.sensor.to_string());
        if let Some(sza) = self.sza {
            attributes.insert("sza".to_string(), sza.to_string());
        }

        attributes
    }
}

/// Scene held entirely in memory.
#[derive(Debug, Clone)]
pub struct Scene {
    attributes: SceneAttributes,
    shape: (usize, usize),
    bands: BTreeMap<String, Array2<f32>>,
    band_attributes: BTreeMap<String, BTreeMap<String, String>>,
    catalogs: BTreeMap<Domain, BandCatalog>,
}

impl Scene {
    /// Empty scene of `(rows, cols)` pixels.
    pub fn new(attributes: SceneAttributes, shape: (usize, usize)) -> Self {
        Self {
            attributes,
            shape,
            bands: BTreeMap::new(),
            band_attributes: BTreeMap::new(),
            catalogs: BTreeMap::new(),
        }
    }

    /// Adds a raster. Names following `<quantity>_<wavelength>` also enter
    /// the catalog of their domain, in insertion order.
    pub fn insert_band(&mut self, name: impl Into<String>, data: Array2<f32>) -> Result<()> {
        let name = name.into();

        if data.dim() != self.shape {
            return Err(Error::ShapeMismatch {
                name,
                expected: self.shape,
                found: data.dim(),
            });
        }

        if !self.bands.contains_key(&name) {
            if let Some((domain, wavelength)) = parse_band_name(&name) {
                self.catalogs
                    .entry(domain)
                    .or_default()
                    .push(wavelength, name.clone());
            }
        }
        self.bands.insert(name, data);

        Ok(())
    }

    pub fn with_band(mut self, name: impl Into<String>, data: Array2<f32>) -> Result<Self> {
        self.insert_band(name, data)?;
        Ok(self)
    }

    /// Convenience for synthetic scenes: a band filled with one value.
    pub fn with_constant_band(self, name: impl Into<String>, value: f32) -> Result<Self> {
        let shape = self.shape;
        self.with_band(name, Array2::from_elem(shape, value))
    }

    pub fn insert_band_attributes(
        &mut self,
        name: impl Into<String>,
        attributes: BTreeMap<String, String>,
    ) {
        self.band_attributes.insert(name.into(), attributes);
    }

    pub fn band_names(&self) -> impl Iterator<Item = &str> {
        self.bands.keys().map(String::as_str)
    }
}

impl BandProvider for Scene {
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
        self.bands.contains_key(name)
    }

    fn band(&self, name: &str) -> Result<Array2<f32>> {
        self.bands
            .get(name)
            .cloned()
            .ok_or_else(|| Error::MissingBand {
                name: name.to_string(),
            })
    }

    fn band_attributes(&self, name: &str) -> Result<BTreeMap<String, String>> {
        if !self.has_band(name) {
            return Err(Error::MissingBand {
                name: name.to_string(),
            });
        }
        Ok(self.band_attributes.get(name).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_band_name() {
        assert_eq!(parse_band_name("rhos_865"), Some((Domain::Surface, 865)));
        assert_eq!(parse_band_name("rhot_1610"), Some((Domain::Toa, 1610)));
        assert_eq!(parse_band_name("Rrs_443"), Some((Domain::RemoteSensing, 443)));
        assert_eq!(parse_band_name("lon"), None);
        assert_eq!(parse_band_name("rhos_abc"), None);
        assert_eq!(parse_band_name("chl_oc3"), None);
    }

    #[test]
    fn test_scene_builds_catalogs_in_insertion_order() {
        let scene = Scene::new(SceneAttributes::new(Sensor::Landsat8Oli), (2, 2))
            .with_constant_band("rhos_865", 0.1)
            .unwrap()
            .with_constant_band("rhos_443", 0.02)
            .unwrap()
            .with_constant_band("rhot_443", 0.12)
            .unwrap()
            .with_constant_band("lon", 3.0)
            .unwrap();

        assert_eq!(scene.catalog(Domain::Surface).wavelengths(), vec![865, 443]);
        assert_eq!(scene.catalog(Domain::Toa).wavelengths(), vec![443]);
        assert!(scene.catalog(Domain::WaterLeaving).is_empty());
        assert!(scene.has_band("lon"));
    }

    #[test]
    fn test_shape_mismatch_is_rejected() {
        let mut scene = Scene::new(SceneAttributes::new(Sensor::Landsat8Oli), (2, 2));
        let result = scene.insert_band("rhos_560", Array2::zeros((3, 2)));
        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_global_attributes() {
        let attributes: SceneAttributes = serde_json::from_str(
            r#"{"sensor": "S2A_MSI", "sza": 42.5, "isodate": "2021-06-01T10:50:00", "tile": 31}"#,
        )
        .unwrap();

        assert_eq!(attributes.sensor, Sensor::Sentinel2aMsi);

        let global = attributes.global_attributes();
        assert_eq!(global["sensor"], "S2A_MSI");
        assert_eq!(global["sza"], "42.5");
        assert_eq!(global["isodate"], "2021-06-01T10:50:00");
        assert_eq!(global["tile"], "31");
    }
}
