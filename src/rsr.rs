//! Relative spectral response tables and band convolution.
//!
//! ```json
//! {"L8_OLI": {"bands": [{"name": "4", "wave_name": "655",
//!                        "wave": [0.630, 0.640, ...], "response": [0.01, 0.6, ...]}]}}
//! ```
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;

use crate::config::ConfigError;
use crate::sensor::Sensor;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RsrBand {
    pub name: String,
    /// Nominal wavelength label used in band identifiers, e.g. "655".
    pub wave_name: String,
    /// Wavelength grid in micrometres.
    pub wave: Vec<f64>,
    pub response: Vec<f64>,
}

impl RsrBand {
    /// Response-weighted mean of a spectrum sampled at `wave` (µm), linearly
    /// interpolated onto this band's grid. Values beyond the spectrum's ends
    /// take the edge value.
    pub fn convolve(&self, wave: &[f64], values: &[f64]) -> Option<f64> {
        if wave.is_empty() || wave.len() != values.len() {
            return None;
        }

        let mut weighted = 0.0;
        let mut total = 0.0;
        for (&w, &r) in self.wave.iter().zip(&self.response) {
            weighted += interpolate(wave, values, w) * r;
            total += r;
        }

        (total > 0.0).then(|| weighted / total)
    }
}

// `xs` ascending
fn interpolate(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    let last = xs.len() - 1;
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[last] {
        return ys[last];
    }

    let i = xs.partition_point(|&v| v <= x);
    let (x0, x1) = (xs[i - 1], xs[i]);
    let (y0, y1) = (ys[i - 1], ys[i]);
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SensorRsr {
    pub bands: Vec<RsrBand>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct RsrTable {
    sensors: BTreeMap<String, SensorRsr>,
}

impl RsrTable {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn sensor(&self, sensor: &Sensor) -> Option<&SensorRsr> {
        self.sensors.get(&sensor.to_string())
    }

    /// Band whose nominal wavelength label is `wavelength`.
    pub fn band_for_wave(&self, sensor: &Sensor, wavelength: u32) -> Option<&RsrBand> {
        let label = wavelength.to_string();
        self.sensor(sensor)?
            .bands
            .iter()
            .find(|band| band.wave_name == label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn table() -> RsrTable {
        serde_json::from_str(
            r#"{"L8_OLI": {"bands": [
                {"name": "4", "wave_name": "655", "wave": [0.64, 0.65, 0.66], "response": [0.5, 1.0, 0.5]},
                {"name": "5", "wave_name": "865", "wave": [0.85, 0.87], "response": [1.0, 1.0]}
            ]}}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_band_for_wave() {
        let table = table();
        assert_eq!(
            table.band_for_wave(&Sensor::Landsat8Oli, 655).unwrap().name,
            "4"
        );
        assert!(table.band_for_wave(&Sensor::Landsat8Oli, 443).is_none());
        assert!(table.band_for_wave(&Sensor::Sentinel2aMsi, 655).is_none());
    }

    #[test]
    fn test_convolve_linear_spectrum() {
        let table = table();
        let band = table.band_for_wave(&Sensor::Landsat8Oli, 655).unwrap();

        // Symmetric response over a linear spectrum gives the centre value
        let value = band.convolve(&[0.6, 0.7], &[100.0, 200.0]).unwrap();
        assert_relative_eq!(value, 150.0, epsilon = 1e-9);
    }

    #[test]
    fn test_convolve_clamps_edges() {
        let table = table();
        let band = table.band_for_wave(&Sensor::Landsat8Oli, 865).unwrap();

        let value = band.convolve(&[0.5, 0.8], &[1.0, 3.0]).unwrap();
        assert_relative_eq!(value, 3.0);
        assert!(band.convolve(&[], &[]).is_none());
    }
}
