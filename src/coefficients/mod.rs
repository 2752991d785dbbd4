//! Algorithm coefficient tables.
//!
//! Every table has a built-in default compiled from `data/coefficients/`. A
//! directory holding files with the same names replaces the defaults table
//! by table.
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::ConfigError;
use crate::sensor::Sensor;

pub const NECHAD_HYPER_FILE: &str = "nechad_hyper.json";
pub const NECHAD_2016_FILE: &str = "nechad_2016.json";
pub const DOGLIOTTI_FILE: &str = "dogliotti.json";
pub const CHL_OC_FILE: &str = "chl_oc.json";
pub const QAA_FILE: &str = "qaa.json";
pub const P3QAA_FILE: &str = "p3qaa.json";
pub const FAIT_FILE: &str = "fait.json";

const NECHAD_HYPER: &str = include_str!("../../data/coefficients/nechad_hyper.json");
const NECHAD_2016: &str = include_str!("../../data/coefficients/nechad_2016.json");
const DOGLIOTTI: &str = include_str!("../../data/coefficients/dogliotti.json");
const CHL_OC: &str = include_str!("../../data/coefficients/chl_oc.json");
const QAA: &str = include_str!("../../data/coefficients/qaa.json");
const P3QAA: &str = include_str!("../../data/coefficients/p3qaa.json");
const FAIT: &str = include_str!("../../data/coefficients/fait.json");

/// Hyperspectral Nechad calibration, one (A, C) pair per wavelength (nm).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NechadTable {
    pub wave: Vec<f64>,
    #[serde(rename = "A")]
    pub a: Vec<f64>,
    #[serde(rename = "C")]
    pub c: Vec<f64>,
}

impl NechadTable {
    /// (A, C) at the table wavelength closest to `wave`.
    pub fn closest(&self, wave: f64) -> Option<(f64, f64)> {
        let idx = self
            .wave
            .iter()
            .enumerate()
            .min_by(|(_, x), (_, y)| (*x - wave).abs().total_cmp(&(*y - wave).abs()))
            .map(|(i, _)| i)?;
        Some((*self.a.get(idx)?, *self.c.get(idx)?))
    }
}

/// Per sensor and band Nechad calibration (2016 update).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Nechad2016Entry {
    pub sensor: String,
    pub band: String,
    pub wave: u32,
    pub par: String,
    #[serde(rename = "A")]
    pub a: f64,
    #[serde(rename = "C")]
    pub c: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DogliottiConfig {
    #[serde(rename = "A_T_red")]
    pub a_red: f64,
    #[serde(rename = "C_T_red")]
    pub c_red: f64,
    #[serde(rename = "A_T_nir")]
    pub a_nir: f64,
    #[serde(rename = "C_T_nir")]
    pub c_nir: f64,
    pub lower_lim: f64,
    pub upper_lim: f64,
    pub algo_wave_red: u32,
    pub algo_wave_nir: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChlOcEntry {
    pub blue: Vec<u32>,
    pub green: Vec<u32>,
    pub chl_coef: [f64; 5],
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QaaV5 {
    pub h: [f64; 3],
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QaaV6 {
    pub h: [f64; 3],
    /// Below this Rrs at the red band the green reference is used.
    pub red_threshold: f64,
    pub red_coef: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QaaRed {
    pub red_coef: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QaaCoefficients {
    pub g0: f64,
    pub g1: f64,
    pub v5: QaaV5,
    pub v6: QaaV6,
    pub vw: QaaRed,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BandCentres {
    #[serde(rename = "B")]
    pub blue: u32,
    #[serde(rename = "G")]
    pub green: u32,
    #[serde(rename = "R")]
    pub red: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct P3qaaConfig {
    pub center_wl: BandCentres,
    pub h: [f64; 3],
    pub eta: [f64; 3],
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FaitConfig {
    pub fai_threshold: f64,
    pub red_threshold: f64,
    pub rgb_limit: f64,
    #[serde(rename = "L_limit")]
    pub l_limit: f64,
    pub a_threshold: BTreeMap<String, f64>,
}

impl FaitConfig {
    pub fn a_threshold(&self, sensor: &Sensor) -> Option<f64> {
        self.a_threshold.get(&sensor.to_string()).copied()
    }
}

/// Every coefficient table, read-only for a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Coefficients {
    pub nechad_hyper: BTreeMap<String, NechadTable>,
    pub nechad_2016: Vec<Nechad2016Entry>,
    pub dogliotti: BTreeMap<String, DogliottiConfig>,
    pub chl_oc: BTreeMap<String, BTreeMap<String, ChlOcEntry>>,
    pub qaa: QaaCoefficients,
    pub p3qaa: BTreeMap<String, P3qaaConfig>,
    pub fait: FaitConfig,
}

fn parse<T: DeserializeOwned>(table: &'static str, text: &str) -> Result<T, ConfigError> {
    serde_json::from_str(text).map_err(|e| ConfigError::Coefficients {
        table,
        message: e.to_string(),
    })
}

// Reads `<dir>/<table>` when present, the compiled default otherwise
fn load<T: DeserializeOwned>(
    dir: &Path,
    table: &'static str,
    builtin: &str,
) -> Result<T, ConfigError> {
    let path = dir.join(table);
    if !path.is_file() {
        return parse(table, builtin);
    }

    debug!("Loading {} from {}", table, path.display());
    let reader = BufReader::new(File::open(&path)?);
    serde_json::from_reader(reader).map_err(|e| ConfigError::Coefficients {
        table,
        message: e.to_string(),
    })
}

impl Coefficients {
    pub fn builtin() -> Result<Self, ConfigError> {
        Ok(Self {
            nechad_hyper: parse(NECHAD_HYPER_FILE, NECHAD_HYPER)?,
            nechad_2016: parse(NECHAD_2016_FILE, NECHAD_2016)?,
            dogliotti: parse(DOGLIOTTI_FILE, DOGLIOTTI)?,
            chl_oc: parse(CHL_OC_FILE, CHL_OC)?,
            qaa: parse(QAA_FILE, QAA)?,
            p3qaa: parse(P3QAA_FILE, P3QAA)?,
            fait: parse(FAIT_FILE, FAIT)?,
        })
    }

    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        Ok(Self {
            nechad_hyper: load(dir, NECHAD_HYPER_FILE, NECHAD_HYPER)?,
            nechad_2016: load(dir, NECHAD_2016_FILE, NECHAD_2016)?,
            dogliotti: load(dir, DOGLIOTTI_FILE, DOGLIOTTI)?,
            chl_oc: load(dir, CHL_OC_FILE, CHL_OC)?,
            qaa: load(dir, QAA_FILE, QAA)?,
            p3qaa: load(dir, P3QAA_FILE, P3QAA)?,
            fait: load(dir, FAIT_FILE, FAIT)?,
        })
    }

    /// 2016 calibration for `sensor`, matched on the band name when one is
    /// known and on the nominal wavelength otherwise.
    pub fn nechad_2016(
        &self,
        sensor: &Sensor,
        par: &str,
        band: Option<&str>,
        wave: u32,
    ) -> Option<&Nechad2016Entry> {
        let sensor = sensor.to_string();
        self.nechad_2016.iter().find(|entry| {
            entry.sensor == sensor
                && entry.par == par
                && match band {
                    Some(band) => entry.band == format!("B{}", band),
                    None => entry.wave == wave,
                }
        })
    }

    pub fn chl_oc(&self, sensor: &Sensor, variant: &str) -> Option<&ChlOcEntry> {
        self.chl_oc.get(&sensor.to_string())?.get(variant)
    }

    pub fn p3qaa(&self, sensor: &Sensor) -> Option<&P3qaaConfig> {
        self.p3qaa.get(&sensor.to_string())
    }
}
