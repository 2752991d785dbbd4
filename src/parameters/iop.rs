//! QAA and P3QAA inversions on the scene's surface reflectance.
//!
//! Inputs are masked before the inversion and converted to Rrs (rhos / pi).

use std::collections::BTreeMap;
use std::f32::consts::PI;

use ndarray::Array2;
use tracing::debug;

use super::{Context, ParameterError, Skip};
use crate::coefficients::P3qaaConfig;
use crate::iop::p3qaa::{P3QAA_BAND_PRODUCTS, P3QAA_SCALAR_PRODUCTS};
use crate::iop::{QAA_WAVES, QaaInput, QaaSelection, p3qaa_compute, qaa_compute};
use crate::product::{ParameterAttributes, ProductRaster};
use crate::scene::provider::SZA_BAND;
use crate::scene::{BandMatch, Domain};

fn units(product: &str) -> &'static str {
    match product.split('_').next() {
        Some("a" | "bbp" | "bb" | "kd") => "m^-1",
        Some("rrs") => "sr^-1",
        _ => "1",
    }
}

fn read_rrs(ctx: &Context<'_>, band: &BandMatch) -> Result<Array2<f32>, ParameterError> {
    let mut data = ctx.read_masked(band)?;
    data.mapv_inplace(|v| v / PI);
    Ok(data)
}

fn into_products(
    prefix: &str,
    products: BTreeMap<String, Array2<f32>>,
    attributes: &ParameterAttributes,
) -> Vec<ProductRaster> {
    products
        .into_iter()
        .map(|(product, data)| {
            let attributes = attributes
                .clone()
                .with_names(product.clone(), format!("{} {}", prefix.to_uppercase(), product))
                .with_units(units(&product));
            ProductRaster::new(format!("{}_{}", prefix, product), data, &attributes)
        })
        .collect()
}

// single products asked for elsewhere in the list ride along
fn with_requested(ctx: &Context<'_>, selection: &QaaSelection) -> QaaSelection {
    let mut selection = selection.clone();
    selection.products.extend(
        ctx.requested
            .iter()
            .filter_map(|name| name.strip_prefix("qaa_"))
            .map(str::to_string),
    );
    selection
}

/// Dataset names a QAA run would write.
pub fn qaa_output_names(ctx: &Context<'_>, selection: &QaaSelection) -> Vec<String> {
    let with_kd = ctx.provider.has_band(SZA_BAND) || ctx.provider.attributes().sza.is_some();
    with_requested(ctx, selection)
        .output_names(with_kd)
        .into_iter()
        .map(|product| format!("qaa_{}", product))
        .collect()
}

pub fn compute_qaa(
    ctx: &Context<'_>,
    selection: &QaaSelection,
) -> Result<Vec<ProductRaster>, ParameterError> {
    if !ctx.provider.attributes().sensor.supports_qaa() {
        return Err(ctx.sensor_not_configured().into());
    }

    let selection = with_requested(ctx, selection);

    let bands = QAA_WAVES
        .iter()
        .map(|wave| ctx.select(Domain::Surface, *wave as f64, None))
        .collect::<Result<Vec<_>, Skip>>()?;

    let input = QaaInput {
        rrs: [
            read_rrs(ctx, &bands[0])?,
            read_rrs(ctx, &bands[1])?,
            read_rrs(ctx, &bands[2])?,
            read_rrs(ctx, &bands[3])?,
        ],
        waves: [0, 1, 2, 3].map(|i| bands[i].wavelength),
        sza: ctx.provider.solar_zenith()?,
    };
    if input.sza.is_none() {
        debug!("No solar zenith angle, QAA kd products are skipped");
    }

    let products = qaa_compute(&input, &ctx.coefficients.qaa, &selection);
    if products.is_empty() {
        return Err(Skip::NothingSelected.into());
    }

    let attributes = ParameterAttributes::new("QAA")
        .with_title("Quasi-Analytical Algorithm")
        .with_reference("Lee et al. 2002")
        .with_dataset(Domain::Surface)
        .with_waves(input.waves.to_vec());

    Ok(into_products("qaa", products, &attributes))
}

fn p3qaa_bands<'c>(
    ctx: &Context<'c>,
) -> Result<(&'c P3qaaConfig, Vec<BandMatch>), ParameterError> {
    let config = ctx
        .coefficients
        .p3qaa(&ctx.provider.attributes().sensor)
        .ok_or_else(|| ctx.sensor_not_configured())?;

    let centres = [config.center_wl.blue, config.center_wl.green, config.center_wl.red];
    let bands = centres
        .iter()
        .map(|wave| ctx.select(Domain::Surface, *wave as f64, None))
        .collect::<Result<Vec<_>, Skip>>()?;

    Ok((config, bands))
}

fn keeps_p3qaa(ctx: &Context<'_>, product: &str, name: &str) -> bool {
    name == product || ctx.requested.iter().any(|r| r == &format!("p3qaa_{}", name))
}

/// Dataset names a P3QAA run would write.
pub fn p3qaa_output_names(
    ctx: &Context<'_>,
    product: Option<&str>,
) -> Result<Vec<String>, ParameterError> {
    let (_, bands) = p3qaa_bands(ctx)?;

    let scalar = P3QAA_SCALAR_PRODUCTS.iter().map(|p| p.to_string());
    let per_band = P3QAA_BAND_PRODUCTS
        .iter()
        .flat_map(|p| bands.iter().map(move |b| format!("{}_{}", p, b.wavelength)));

    Ok(scalar
        .chain(per_band)
        .filter(|name| product.is_none_or(|product| keeps_p3qaa(ctx, product, name)))
        .map(|name| format!("p3qaa_{}", name))
        .collect())
}

pub fn compute_p3qaa(
    ctx: &Context<'_>,
    product: Option<&str>,
) -> Result<Vec<ProductRaster>, ParameterError> {
    let (config, bands) = p3qaa_bands(ctx)?;

    let rrs = [
        read_rrs(ctx, &bands[0])?,
        read_rrs(ctx, &bands[1])?,
        read_rrs(ctx, &bands[2])?,
    ];
    let waves = [0, 1, 2].map(|i| bands[i].wavelength);

    let mut products =
        p3qaa_compute(&rrs, waves, config, &ctx.coefficients.qaa).into_named(waves);
    if let Some(product) = product {
        products.retain(|name, _| keeps_p3qaa(ctx, product, name));
    }
    if products.is_empty() {
        return Err(Skip::NothingSelected.into());
    }

    let mut attributes = ParameterAttributes::new("P3QAA")
        .with_title("Three-band Quasi-Analytical Algorithm")
        .with_reference("Lee et al. 2002, three-band adaptation")
        .with_dataset(Domain::Surface)
        .with_waves(waves.to_vec());
    for (i, h) in config.h.iter().enumerate() {
        attributes = attributes.with_coefficient(format!("h{}", i), *h);
    }

    Ok(into_products("p3qaa", products, &attributes))
}
