//! Floating Algae Index (Hu 2009) and the FAI-based floating algae
//! detection of Dogliotti et al. (2018).

use ndarray::{Array2, Zip};

use super::colorspace::{quantise, srgb_to_lab};
use super::{Context, ParameterError};
use crate::product::{ParameterAttributes, ProductRaster};
use crate::scene::{BandMatch, Domain};

pub const FAI_WAVES: [f64; 3] = [660.0, 865.0, 1610.0];
pub const FAI_TOLERANCES: [f64; 3] = [10.0, 30.0, 80.0];

pub const FAIT_WAVES: [f64; 5] = [490.0, 560.0, 660.0, 865.0, 1610.0];
pub const FAIT_TOLERANCES: [f64; 5] = [10.0, 10.0, 10.0, 30.0, 80.0];

/// NIR reflectance above the red to SWIR baseline.
pub fn fai(red: f32, nir: f32, swir: f32, slope: f32) -> f32 {
    nir - (red + (swir - red) * slope)
}

/// Baseline position of the NIR band between red and SWIR.
pub fn baseline_slope(bands: &[BandMatch]) -> f32 {
    let [red, nir, swir] = [&bands[0], &bands[1], &bands[2]].map(|b| b.wavelength as f32);
    (nir - red) / (swir - red)
}

fn fai_raster(ctx: &Context<'_>, bands: &[BandMatch]) -> Result<Array2<f32>, ParameterError> {
    let slope = baseline_slope(bands);
    let mut data = ctx.read(&bands[1])?;
    let red = ctx.read(&bands[0])?;
    let swir = ctx.read(&bands[2])?;

    Zip::from(&mut data)
        .and(&red)
        .and(&swir)
        .for_each(|n, r, s| *n = fai(*r, *n, *s, slope));

    Ok(data)
}

pub fn compute_fai(ctx: &Context<'_>, domain: Domain) -> Result<Vec<ProductRaster>, ParameterError> {
    let bands = ctx.select_all(domain, &FAI_WAVES, &FAI_TOLERANCES)?;
    let name = match domain {
        Domain::Toa => "fai_rhot",
        _ => "fai",
    };

    let attributes = ParameterAttributes::new("FAI")
        .with_title("Floating Algae Index")
        .with_names("fai", "Floating Algae Index")
        .with_units("1")
        .with_reference("Hu 2009")
        .with_dataset(domain)
        .with_waves(bands.iter().map(|b| b.wavelength).collect());

    let data = fai_raster(ctx, &bands)?;
    Ok(vec![ProductRaster::new(name, data, &attributes)])
}

pub fn compute_fait(ctx: &Context<'_>) -> Result<Vec<ProductRaster>, ParameterError> {
    let config = &ctx.coefficients.fait;
    let a_threshold = config
        .a_threshold(&ctx.provider.attributes().sensor)
        .ok_or_else(|| ctx.sensor_not_configured())?;
    let bands = ctx.select_all(Domain::Surface, &FAIT_WAVES, &FAIT_TOLERANCES)?;

    let attributes = ParameterAttributes::new("FAIT")
        .with_title("Floating algae detection")
        .with_names("fait", "Floating algae presence")
        .with_units("1")
        .with_reference("Dogliotti et al. 2018")
        .with_dataset(Domain::Surface)
        .with_waves(bands.iter().map(|b| b.wavelength).collect())
        .with_coefficient("fai_threshold", config.fai_threshold)
        .with_coefficient("red_threshold", config.red_threshold)
        .with_coefficient("L_limit", config.l_limit)
        .with_coefficient("a_threshold", a_threshold);

    let mut data = fai_raster(ctx, &bands[2..])?;
    let blue = ctx.read(&bands[0])?;
    let green = ctx.read(&bands[1])?;
    let red = ctx.read(&bands[2])?;

    let fai_threshold = config.fai_threshold as f32;
    let red_threshold = config.red_threshold as f32;
    Zip::from(&mut data)
        .and(&blue)
        .and(&green)
        .and(&red)
        .for_each(|v, b, g, r| {
            let lab = srgb_to_lab(
                quantise(*b, config.rgb_limit),
                quantise(*g, config.rgb_limit),
                quantise(*r, config.rgb_limit),
            );
            let bright = *r > red_threshold
                || lab.l as f64 >= config.l_limit
                || lab.a as f64 >= a_threshold;
            // bright pixels are cleared even where the FAI is missing
            *v = if bright {
                0.0
            } else if v.is_nan() {
                f32::NAN
            } else if *v >= fai_threshold {
                1.0
            } else {
                0.0
            };
        });

    Ok(vec![ProductRaster::new("fait", data, &attributes)])
}
