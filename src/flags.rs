//! Quality flags: four independent validity tests, each owning one bit of an
//! `i32` raster.
use ndarray::{Array2, Zip};
use tracing::{debug, info};

use crate::config::MaskSettings;
use crate::error::Result;
use crate::filters;
use crate::scene::{BandProvider, Domain};

/// Name of the flag dataset in the output.
pub const FLAGS_DATASET: &str = "l2_flags";

/// The cirrus test needs a TOA band closer than this to the configured
/// wavelength (nm).
const CIRRUS_MAX_OFFSET: f64 = 5.0;

#[derive(Debug, Clone, PartialEq)]
pub struct FlagRaster {
    data: Array2<i32>,
}

impl FlagRaster {
    pub fn zeros(shape: (usize, usize)) -> Self {
        Self {
            data: Array2::zeros(shape),
        }
    }

    pub fn from_array(data: Array2<i32>) -> Self {
        Self { data }
    }

    /// ORs `2^exponent` into every pixel where `test` holds. Other bits are
    /// left untouched.
    pub fn set_bit(&mut self, test: &Array2<bool>, exponent: u32) {
        let bit = 1i32 << exponent;
        Zip::from(&mut self.data).and(test).for_each(|flag, &hit| {
            if hit {
                *flag |= bit;
            }
        });
    }

    pub fn data(&self) -> &Array2<i32> {
        &self.data
    }

    pub fn into_inner(self) -> Array2<i32> {
        self.data
    }

    /// Pixels a masked product must not report.
    pub fn masked(&self, selector: i32) -> Array2<bool> {
        self.data.mapv(|flag| flag & selector != 0)
    }

    /// Sets masked pixels to NaN.
    pub fn apply_mask(&self, data: &mut Array2<f32>, selector: i32) {
        if selector == 0 {
            return;
        }
        Zip::from(data).and(&self.data).for_each(|value, &flag| {
            if flag & selector != 0 {
                *value = f32::NAN;
            }
        });
    }
}

fn prepare(data: Array2<f32>, settings: &MaskSettings) -> Array2<f32> {
    if settings.smooth {
        filters::smooth(&data, settings.smooth_sigma)
    } else {
        data
    }
}

// NaN > t is false, so missing pixels never raise a flag
fn above(data: &Array2<f32>, threshold: f64) -> Array2<bool> {
    data.mapv(|v| v as f64 > threshold)
}

pub fn compute_flags<P: BandProvider + ?Sized>(
    provider: &P,
    settings: &MaskSettings,
) -> Result<FlagRaster> {
    let shape = provider.shape();
    let mut flags = FlagRaster::zeros(shape);
    let toa = provider.catalog(Domain::Toa);

    // SWIR high reflectance
    if toa.is_empty() {
        debug!(
            "No TOA bands, skipping the {} nm reflectance test",
            settings.wave
        );
    } else {
        let band = toa.closest(settings.wave)?;
        debug!("Reflectance test on {}", band.name);
        let data = prepare(provider.band(&band.name)?, settings);
        flags.set_bit(&above(&data, settings.threshold), settings.exponents.swir);
    }

    // Cirrus
    match toa.closest(settings.cirrus_wave).ok() {
        Some(band) if band.offset < CIRRUS_MAX_OFFSET => {
            debug!("Cirrus test on {}", band.name);
            let data = prepare(provider.band(&band.name)?, settings);
            flags.set_bit(
                &above(&data, settings.cirrus_threshold),
                settings.exponents.cirrus,
            );
        }
        _ => info!("No suitable band found for cirrus masking"),
    }

    // TOA out of limit, any band
    let mut high_toa = Array2::from_elem(shape, false);
    for entry in toa.iter() {
        let data = prepare(provider.band(&entry.name)?, settings);
        Zip::from(&mut high_toa)
            .and(&data)
            .for_each(|hit, &v| *hit |= v as f64 > settings.high_toa_threshold);
    }
    flags.set_bit(&high_toa, settings.exponents.toa);

    // Negative surface reflectance, never smoothed
    let (low, high) = settings.negative_wave_range;
    let mut negative = Array2::from_elem(shape, false);
    for entry in provider.catalog(Domain::Surface).iter() {
        let wave = entry.wavelength as f64;
        if wave < low || wave > high {
            continue;
        }
        let data = provider.band(&entry.name)?;
        Zip::from(&mut negative)
            .and(&data)
            .for_each(|hit, &v| *hit |= v < 0.0);
    }
    flags.set_bit(&negative, settings.exponents.negative);

    Ok(flags)
}
