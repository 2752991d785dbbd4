use serde::Deserialize;
use serde::Deserializer;
use serde::de::Error;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::bbox::{Bbox, Subset, Window};

pub mod error;
pub use error::ConfigError;

/// Bit exponents of the four flag tests. Values are independent, the flag
/// engine never assumes they are contiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagExponents {
    pub swir: u32,
    pub cirrus: u32,
    pub toa: u32,
    pub negative: u32,
}

impl Default for FlagExponents {
    fn default() -> Self {
        Self {
            swir: 0,
            cirrus: 1,
            toa: 2,
            negative: 3,
        }
    }
}

/// Thresholds and toggles for the flag engine and the product mask.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskSettings {
    /// Master switch, no pixel is masked when false.
    pub enabled: bool,
    pub swir: bool,
    pub cirrus: bool,
    pub high_toa: bool,
    pub negative_rhow: bool,
    pub wave: f64,
    pub threshold: f64,
    pub smooth: bool,
    pub smooth_sigma: f64,
    pub cirrus_wave: f64,
    pub cirrus_threshold: f64,
    pub high_toa_threshold: f64,
    pub negative_wave_range: (f64, f64),
    pub exponents: FlagExponents,
}

impl Default for MaskSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            swir: true,
            cirrus: false,
            high_toa: true,
            negative_rhow: true,
            wave: 1600.0,
            threshold: 0.0215,
            smooth: true,
            smooth_sigma: 3.0,
            cirrus_wave: 1373.0,
            cirrus_threshold: 0.005,
            high_toa_threshold: 0.3,
            negative_wave_range: (400.0, 900.0),
            exponents: FlagExponents::default(),
        }
    }
}

impl MaskSettings {
    /// OR of the bit values of every test enforced on masked products.
    pub fn selector(&self) -> i32 {
        if !self.enabled {
            return 0;
        }

        let FlagExponents {
            swir,
            cirrus,
            toa,
            negative,
        } = self.exponents;

        [
            (self.swir, swir),
            (self.cirrus, cirrus),
            (self.high_toa, toa),
            (self.negative_rhow, negative),
        ]
        .into_iter()
        .filter(|(enforced, _)| *enforced)
        .fold(0, |selector, (_, exponent)| selector | (1 << exponent))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    l2w_parameters: Vec<String>,
    copy_datasets: Vec<String>,
    mask: MaskSettings,
    coefficients_dir: Option<PathBuf>,
    rsr_file: Option<PathBuf>,
    subset: Option<Subset>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            l2w_parameters: Vec::new(),
            copy_datasets: vec!["lon".to_string(), "lat".to_string()],
            mask: MaskSettings::default(),
            coefficients_dir: None,
            rsr_file: None,
            subset: None,
        }
    }
}

// Every field is optional, missing ones fall back to the defaults above. Values
// are validated here so the flag engine can trust them.
impl<'de> Deserialize<'de> for Settings {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct SettingsHelper {
            l2w_parameters: Option<Vec<String>>,
            copy_datasets: Option<Vec<String>>,
            l2w_mask: Option<bool>,
            l2w_mask_swir: Option<bool>,
            l2w_mask_cirrus: Option<bool>,
            l2w_mask_high_toa: Option<bool>,
            l2w_mask_negative_rhow: Option<bool>,
            l2w_mask_wave: Option<f64>,
            l2w_mask_threshold: Option<f64>,
            l2w_mask_smooth: Option<bool>,
            l2w_mask_smooth_sigma: Option<f64>,
            l2w_mask_cirrus_wave: Option<f64>,
            l2w_mask_cirrus_threshold: Option<f64>,
            l2w_mask_high_toa_threshold: Option<f64>,
            l2w_mask_negative_wave_range: Option<(f64, f64)>,
            flag_exponent_swir: Option<u32>,
            flag_exponent_cirrus: Option<u32>,
            flag_exponent_toa: Option<u32>,
            flag_exponent_negative: Option<u32>,
            coefficients_dir: Option<PathBuf>,
            rsr_file: Option<PathBuf>,
            bbox: Option<BboxHelper>,
            window: Option<Window>,
        }

        #[derive(Deserialize)]
        struct BboxHelper {
            xmin: f64,
            xmax: f64,
            ymin: f64,
            ymax: f64,
        }

        let helper = SettingsHelper::deserialize(deserializer)?;
        let defaults = MaskSettings::default();
        let default_exponents = defaults.exponents;

        let smooth_sigma = helper
            .l2w_mask_smooth_sigma
            .unwrap_or(defaults.smooth_sigma);
        if smooth_sigma <= 0.0 || !smooth_sigma.is_finite() {
            return Err(D::Error::custom(ConfigError::SmoothSigma(smooth_sigma)));
        }

        let negative_wave_range = helper
            .l2w_mask_negative_wave_range
            .unwrap_or(defaults.negative_wave_range);
        if negative_wave_range.0 > negative_wave_range.1 {
            return Err(D::Error::custom(ConfigError::WaveRange(
                negative_wave_range.0,
                negative_wave_range.1,
            )));
        }

        let exponents = FlagExponents {
            swir: helper.flag_exponent_swir.unwrap_or(default_exponents.swir),
            cirrus: helper
                .flag_exponent_cirrus
                .unwrap_or(default_exponents.cirrus),
            toa: helper.flag_exponent_toa.unwrap_or(default_exponents.toa),
            negative: helper
                .flag_exponent_negative
                .unwrap_or(default_exponents.negative),
        };
        for (name, value) in [
            ("flag_exponent_swir", exponents.swir),
            ("flag_exponent_cirrus", exponents.cirrus),
            ("flag_exponent_toa", exponents.toa),
            ("flag_exponent_negative", exponents.negative),
        ] {
            if value > 30 {
                return Err(D::Error::custom(ConfigError::FlagExponent { name, value }));
            }
        }

        // A pixel window wins over a bbox when both are given
        let subset = match (helper.window, helper.bbox) {
            (Some(window), _) => Some(Subset::Pixels(window)),
            (None, Some(b)) => Some(Subset::Geographic(
                Bbox::new(b.xmin, b.xmax, b.ymin, b.ymax)
                    .map_err(|e| D::Error::custom(ConfigError::Bbox(e)))?,
            )),
            (None, None) => None,
        };

        let mask = MaskSettings {
            enabled: helper.l2w_mask.unwrap_or(defaults.enabled),
            swir: helper.l2w_mask_swir.unwrap_or(defaults.swir),
            cirrus: helper.l2w_mask_cirrus.unwrap_or(defaults.cirrus),
            high_toa: helper.l2w_mask_high_toa.unwrap_or(defaults.high_toa),
            negative_rhow: helper
                .l2w_mask_negative_rhow
                .unwrap_or(defaults.negative_rhow),
            wave: helper.l2w_mask_wave.unwrap_or(defaults.wave),
            threshold: helper.l2w_mask_threshold.unwrap_or(defaults.threshold),
            smooth: helper.l2w_mask_smooth.unwrap_or(defaults.smooth),
            smooth_sigma,
            cirrus_wave: helper.l2w_mask_cirrus_wave.unwrap_or(defaults.cirrus_wave),
            cirrus_threshold: helper
                .l2w_mask_cirrus_threshold
                .unwrap_or(defaults.cirrus_threshold),
            high_toa_threshold: helper
                .l2w_mask_high_toa_threshold
                .unwrap_or(defaults.high_toa_threshold),
            negative_wave_range,
            exponents,
        };

        Ok(Settings {
            l2w_parameters: helper.l2w_parameters.unwrap_or_default(),
            copy_datasets: helper
                .copy_datasets
                .unwrap_or_else(|| Settings::default().copy_datasets),
            mask,
            coefficients_dir: helper.coefficients_dir,
            rsr_file: helper.rsr_file,
            subset,
        })
    }
}

impl Settings {
    pub fn new(l2w_parameters: Vec<String>, mask: MaskSettings) -> Self {
        Self {
            l2w_parameters,
            mask,
            ..Self::default()
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Settings, ConfigError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let settings: Settings = serde_json::from_reader(reader).map_err(ConfigError::from)?;

        Ok(settings)
    }

    pub fn l2w_parameters(&self) -> &[String] {
        &self.l2w_parameters
    }

    pub fn copy_datasets(&self) -> &[String] {
        &self.copy_datasets
    }

    pub fn mask(&self) -> &MaskSettings {
        &self.mask
    }

    pub fn coefficients_dir(&self) -> Option<&Path> {
        self.coefficients_dir.as_deref()
    }

    pub fn rsr_file(&self) -> Option<&Path> {
        self.rsr_file.as_deref()
    }

    pub fn subset(&self) -> Option<&Subset> {
        self.subset.as_ref()
    }

    pub fn with_copy_datasets(mut self, copy_datasets: Vec<String>) -> Self {
        self.copy_datasets = copy_datasets;
        self
    }

    pub fn with_subset(mut self, subset: Subset) -> Self {
        self.subset = Some(subset);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_from_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("settings.json");
        let mut file = File::create(&file_path).unwrap();

        let settings_data = r#"
    {
        "l2w_parameters": ["ndvi", "t_nechad_665", "Rrs_*"],
        "l2w_mask_threshold": 0.05,
        "l2w_mask_cirrus": true,
        "flag_exponent_negative": 7,
        "bbox": {"xmin": 2.0, "xmax": 3.0, "ymin": 51.0, "ymax": 52.0}
    }
    "#;

        file.write_all(settings_data.as_bytes()).unwrap();

        let settings = Settings::from_file(file_path).unwrap();

        assert_eq!(settings.l2w_parameters(), ["ndvi", "t_nechad_665", "Rrs_*"]);
        assert_eq!(settings.mask().threshold, 0.05);
        assert_eq!(settings.mask().exponents.negative, 7);
        assert_eq!(settings.mask().smooth_sigma, 3.0);
        assert_eq!(settings.copy_datasets(), ["lon", "lat"]);
        assert!(matches!(settings.subset(), Some(Subset::Geographic(_))));
    }

    #[test]
    fn test_empty_object_gives_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_invalid_sigma_is_rejected() {
        let result: Result<Settings, _> =
            serde_json::from_str(r#"{"l2w_mask_smooth_sigma": 0.0}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_exponent_is_rejected() {
        let result: Result<Settings, _> = serde_json::from_str(r#"{"flag_exponent_toa": 31}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_unordered_wave_range_is_rejected() {
        let result: Result<Settings, _> =
            serde_json::from_str(r#"{"l2w_mask_negative_wave_range": [900, 400]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_selector_with_non_contiguous_exponents() {
        let mask = MaskSettings {
            cirrus: true,
            negative_rhow: false,
            exponents: FlagExponents {
                swir: 1,
                cirrus: 4,
                toa: 9,
                negative: 12,
            },
            ..MaskSettings::default()
        };

        assert_eq!(mask.selector(), (1 << 1) | (1 << 4) | (1 << 9));
    }

    #[test]
    fn test_selector_disabled() {
        let mask = MaskSettings {
            enabled: false,
            ..MaskSettings::default()
        };
        assert_eq!(mask.selector(), 0);
    }
}
