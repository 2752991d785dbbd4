//! Band-ratio chlorophyll a (OC2/OC3 type).
//!
//! `log10(chl) = c0 + c1 x + c2 x^2 + c3 x^3 + c4 x^4` with
//! `x = log10(max(blue) / green)`.

use ndarray::{Array2, Zip};

use super::{Context, ParameterError, Skip};
use crate::product::{ParameterAttributes, ProductRaster};
use crate::scene::Domain;

/// Largest distance between a configured wavelength and the band used for it.
pub const CHL_OC_TOLERANCE: f64 = 20.0;

pub fn chl_oc(blue: f32, green: f32, coef: &[f64; 5]) -> f32 {
    let x = (blue as f64 / green as f64).log10();
    let log_chl = coef
        .iter()
        .rev()
        .fold(0.0, |acc, c| acc * x + c);
    10f64.powf(log_chl) as f32
}

pub fn compute(ctx: &Context<'_>, variant: &str) -> Result<Vec<ProductRaster>, ParameterError> {
    let sensor = &ctx.provider.attributes().sensor;
    if !ctx.coefficients.chl_oc.contains_key(&sensor.to_string()) {
        return Err(ctx.sensor_not_configured().into());
    }
    let entry = ctx
        .coefficients
        .chl_oc(sensor, variant)
        .ok_or_else(|| Skip::MissingCoefficients {
            what: format!("{} for {}", variant, sensor),
        })?;

    let mut waves = Vec::new();
    let mut blue: Option<Array2<f32>> = None;
    for wave in &entry.blue {
        let Ok(band) = ctx.select(Domain::Surface, *wave as f64, Some(CHL_OC_TOLERANCE)) else {
            continue;
        };
        let data = ctx.read(&band)?;
        waves.push(band.wavelength);
        blue = Some(match blue {
            // f32::max keeps the non-NaN operand
            Some(mut current) => {
                current.zip_mut_with(&data, |c, d| *c = c.max(*d));
                current
            }
            None => data,
        });
    }

    let mut green: Option<Array2<f32>> = None;
    for wave in &entry.green {
        let Ok(band) = ctx.select(Domain::Surface, *wave as f64, Some(CHL_OC_TOLERANCE)) else {
            continue;
        };
        waves.push(band.wavelength);
        green = Some(ctx.read(&band)?);
        break;
    }

    let (Some(blue), Some(green)) = (blue, green) else {
        let target = entry
            .blue
            .first()
            .or(entry.green.first())
            .copied()
            .unwrap_or_default();
        return Err(Skip::BandUnavailable {
            domain: Domain::Surface,
            target: target as f64,
            closest: None,
            tolerance: Some(CHL_OC_TOLERANCE),
        }
        .into());
    };

    let mut attributes = ParameterAttributes::new(variant)
        .with_title(format!("Chlorophyll a ({})", variant))
        .with_names("chlorophyll_concentration", "Chlorophyll a concentration")
        .with_units("mg m^-3")
        .with_reference("O'Reilly et al. 2019")
        .with_dataset(Domain::Surface)
        .with_waves(waves);
    for (i, c) in entry.chl_coef.iter().enumerate() {
        attributes = attributes.with_coefficient(format!("chl_coef_{}", i), *c);
    }

    let data = Zip::from(&blue)
        .and(&green)
        .map_collect(|b, g| chl_oc(*b, *g, &entry.chl_coef));

    Ok(vec![ProductRaster::new(variant, data, &attributes)])
}
