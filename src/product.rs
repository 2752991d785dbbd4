//! Derived rasters and the provenance attached to them.
use std::collections::BTreeMap;

use ndarray::Array2;

use crate::scene::Domain;

/// Provenance of one derived dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterAttributes {
    pub ds_name: String,
    pub algorithm: String,
    pub title: String,
    pub reference: String,
    pub standard_name: String,
    pub long_name: String,
    pub units: String,
    /// Reflectance quantity the inputs were taken from.
    pub dataset: Option<Domain>,
    /// Wavelengths of the bands actually used (nm).
    pub waves: Vec<u32>,
    pub coefficients: BTreeMap<String, f64>,
}

impl ParameterAttributes {
    pub fn new(algorithm: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            ..Self::default()
        }
    }

    pub fn with_dataset(mut self, dataset: Domain) -> Self {
        self.dataset = Some(dataset);
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = units.into();
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    pub fn with_names(
        mut self,
        standard_name: impl Into<String>,
        long_name: impl Into<String>,
    ) -> Self {
        self.standard_name = standard_name.into();
        self.long_name = long_name.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_waves(mut self, waves: Vec<u32>) -> Self {
        self.waves = waves;
        self
    }

    pub fn with_coefficient(mut self, name: impl Into<String>, value: f64) -> Self {
        self.coefficients.insert(name.into(), value);
        self
    }

    /// Copy of these attributes for the dataset `ds_name`.
    pub fn named(&self, ds_name: impl Into<String>) -> Self {
        Self {
            ds_name: ds_name.into(),
            ..self.clone()
        }
    }

    /// Flat key/value form, empty fields left out.
    pub fn to_metadata(&self) -> BTreeMap<String, String> {
        let mut metadata = BTreeMap::new();

        for (key, value) in [
            ("ds_name", &self.ds_name),
            ("algorithm", &self.algorithm),
            ("title", &self.title),
            ("reference", &self.reference),
            ("standard_name", &self.standard_name),
            ("long_name", &self.long_name),
            ("units", &self.units),
        ] {
            if !value.is_empty() {
                metadata.insert(key.to_string(), value.clone());
            }
        }

        if let Some(dataset) = self.dataset {
            metadata.insert("dataset".to_string(), dataset.prefix().to_string());
        }

        if !self.waves.is_empty() {
            let waves: Vec<String> = self.waves.iter().map(|w| w.to_string()).collect();
            metadata.insert("waves".to_string(), waves.join(","));
            for (i, wave) in self.waves.iter().enumerate() {
                metadata.insert(format!("wave_{}", i), wave.to_string());
            }
        }

        for (name, value) in &self.coefficients {
            metadata.insert(name.clone(), value.to_string());
        }

        metadata
    }
}

/// One derived raster ready to be written.
#[derive(Debug, Clone)]
pub struct ProductRaster {
    pub name: String,
    pub data: Array2<f32>,
    pub attributes: ParameterAttributes,
}

impl ProductRaster {
    /// Sets `ds_name` from `name`.
    pub fn new(name: impl Into<String>, data: Array2<f32>, attributes: &ParameterAttributes) -> Self {
        let name = name.into();
        Self {
            attributes: attributes.named(name.clone()),
            name,
            data,
        }
    }
}
