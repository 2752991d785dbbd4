//! Band-difference indices: NDVI, NDCI and the line heights SLH and OLH.

use ndarray::Zip;

use super::fai::FAI_TOLERANCES;
use super::{Context, ParameterError, Skip};
use crate::product::{ParameterAttributes, ProductRaster};
use crate::scene::{BandMatch, Domain};

pub const NDVI_WAVES: [f64; 2] = [660.0, 865.0];
pub const NDCI_WAVES: [f64; 2] = [670.0, 705.0];
pub const SLH_WAVES: [f64; 3] = [670.0, 705.0, 780.0];
pub const RED_EDGE_TOLERANCE: f64 = 10.0;

/// Orange band contrast, defined on the OLI 561/613/655 nm bands.
pub const OLH_BANDS: [u32; 3] = [561, 613, 655];

pub fn normalized_difference(low: f32, high: f32) -> f32 {
    (high - low) / (high + low)
}

/// Height of the middle band above the line joining its neighbours.
pub fn line_height(left: f32, centre: f32, right: f32, weight: f32) -> f32 {
    centre - (left + (right - left) * weight)
}

fn waves(bands: &[BandMatch]) -> Vec<u32> {
    bands.iter().map(|b| b.wavelength).collect()
}

fn normalized_difference_raster(
    ctx: &Context<'_>,
    bands: &[BandMatch],
) -> Result<ndarray::Array2<f32>, ParameterError> {
    let mut data = ctx.read(&bands[0])?;
    let high = ctx.read(&bands[1])?;
    data.zip_mut_with(&high, |l, h| *l = normalized_difference(*l, *h));
    Ok(data)
}

fn line_height_raster(
    ctx: &Context<'_>,
    bands: &[BandMatch],
    weight: f32,
) -> Result<ndarray::Array2<f32>, ParameterError> {
    let left = ctx.read(&bands[0])?;
    let mut data = ctx.read(&bands[1])?;
    let right = ctx.read(&bands[2])?;
    Zip::from(&mut data)
        .and(&left)
        .and(&right)
        .for_each(|c, l, r| *c = line_height(*l, *c, *r, weight));
    Ok(data)
}

pub fn compute_ndvi(ctx: &Context<'_>, domain: Domain) -> Result<Vec<ProductRaster>, ParameterError> {
    let bands = ctx.select_all(domain, &NDVI_WAVES, &FAI_TOLERANCES[..2])?;
    let name = match domain {
        Domain::Toa => "ndvi_rhot",
        _ => "ndvi",
    };

    let attributes = ParameterAttributes::new("NDVI")
        .with_title("Normalised Difference Vegetation Index")
        .with_names("ndvi", "Normalised Difference Vegetation Index")
        .with_units("1")
        .with_dataset(domain)
        .with_waves(waves(&bands));

    let data = normalized_difference_raster(ctx, &bands)?;
    Ok(vec![ProductRaster::new(name, data, &attributes)])
}

pub fn compute_ndci(ctx: &Context<'_>) -> Result<Vec<ProductRaster>, ParameterError> {
    if !ctx.provider.attributes().sensor.is_sentinel2() {
        return Err(ctx.sensor_not_configured().into());
    }
    let bands = ctx.select_all(
        Domain::Surface,
        &NDCI_WAVES,
        &[RED_EDGE_TOLERANCE; 2],
    )?;

    let attributes = ParameterAttributes::new("NDCI")
        .with_title("Normalised Difference Chlorophyll Index")
        .with_names("ndci", "Normalised Difference Chlorophyll Index")
        .with_units("1")
        .with_reference("Mishra and Mishra 2012")
        .with_dataset(Domain::Surface)
        .with_waves(waves(&bands));

    let data = normalized_difference_raster(ctx, &bands)?;
    Ok(vec![ProductRaster::new("ndci", data, &attributes)])
}

pub fn compute_slh(ctx: &Context<'_>) -> Result<Vec<ProductRaster>, ParameterError> {
    if !ctx.provider.attributes().sensor.is_sentinel2() {
        return Err(ctx.sensor_not_configured().into());
    }
    let bands = ctx.select_all(
        Domain::Surface,
        &SLH_WAVES,
        &[RED_EDGE_TOLERANCE; 3],
    )?;

    let [left, centre, right] = [0, 1, 2].map(|i| bands[i].wavelength as f32);
    let weight = (centre - left) / (right - left);

    let attributes = ParameterAttributes::new("SLH")
        .with_title("Scattering Line Height")
        .with_names("slh", "Scattering Line Height")
        .with_units("1")
        .with_reference("Kudela et al. 2015")
        .with_dataset(Domain::Surface)
        .with_waves(waves(&bands));

    let data = line_height_raster(ctx, &bands, weight)?;
    Ok(vec![ProductRaster::new("slh", data, &attributes)])
}

pub fn compute_olh(ctx: &Context<'_>) -> Result<Vec<ProductRaster>, ParameterError> {
    if !ctx.provider.attributes().sensor.is_landsat8() {
        return Err(ctx.sensor_not_configured().into());
    }

    let catalog = ctx.provider.catalog(Domain::Surface);
    let bands = OLH_BANDS
        .iter()
        .map(|wave| {
            catalog
                .exact(*wave)
                .map(|entry| BandMatch {
                    wavelength: entry.wavelength,
                    name: entry.name.clone(),
                    offset: 0.0,
                })
                .ok_or_else(|| Skip::MissingBand {
                    name: Domain::Surface.band_name(*wave),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let [left, centre, right] = OLH_BANDS.map(|w| w as f32);
    // weight of the left band in the baseline at the centre
    let ow = (right - centre) / (right - left);

    let attributes = ParameterAttributes::new("OLH")
        .with_title("Orange Line Height")
        .with_names("olh", "Orange Line Height")
        .with_units("1")
        .with_reference("Castagna et al. 2020")
        .with_dataset(Domain::Surface)
        .with_waves(waves(&bands));

    let data = line_height_raster(ctx, &bands, 1.0 - ow)?;
    Ok(vec![ProductRaster::new("olh", data, &attributes)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coefficients::Coefficients;
    use crate::parameters::Parameter;
    use crate::parameters::test_support::{run, skip_of, surface_scene};
    use crate::sensor::Sensor;
    use approx::assert_relative_eq;

    #[test]
    fn test_ndvi() {
        let coefficients = Coefficients::builtin().unwrap();
        let scene = surface_scene(Sensor::Landsat8Oli, &[(655, 0.05), (865, 0.15)]);

        let products = run(&Parameter::parse("ndvi").unwrap(), &scene, &coefficients).unwrap();
        assert_eq!(products[0].name, "ndvi");
        assert_relative_eq!(products[0].data[(0, 0)], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_ndvi_rhot_without_toa() {
        let coefficients = Coefficients::builtin().unwrap();
        let scene = surface_scene(Sensor::Landsat8Oli, &[(655, 0.05), (865, 0.15)]);

        let skip = skip_of(run(&Parameter::parse("ndvi_rhot").unwrap(), &scene, &coefficients));
        assert!(matches!(
            skip,
            Skip::BandUnavailable {
                domain: Domain::Toa,
                closest: None,
                ..
            }
        ));
    }

    #[test]
    fn test_ndci_sentinel2_only() {
        let coefficients = Coefficients::builtin().unwrap();

        let s2 = surface_scene(Sensor::Sentinel2bMsi, &[(665, 0.02), (704, 0.03)]);
        let products = run(&Parameter::Ndci, &s2, &coefficients).unwrap();
        assert_relative_eq!(products[0].data[(0, 0)], 0.2, epsilon = 1e-6);

        let l8 = surface_scene(Sensor::Landsat8Oli, &[(665, 0.02), (704, 0.03)]);
        assert!(matches!(
            skip_of(run(&Parameter::Ndci, &l8, &coefficients)),
            Skip::SensorNotConfigured { .. }
        ));
    }

    #[test]
    fn test_slh_baseline() {
        let coefficients = Coefficients::builtin().unwrap();
        let scene = surface_scene(
            Sensor::Sentinel2aMsi,
            &[(665, 0.02), (704, 0.05), (783, 0.03)],
        );

        let products = run(&Parameter::Slh, &scene, &coefficients).unwrap();

        let weight = (704.0 - 665.0) / (783.0 - 665.0);
        let expected = 0.05 - (0.02 + (0.03 - 0.02) * weight);
        assert_relative_eq!(products[0].data[(0, 0)], expected as f32, epsilon = 1e-6);
    }

    #[test]
    fn test_olh() {
        let coefficients = Coefficients::builtin().unwrap();
        let scene = surface_scene(
            Sensor::Landsat8Oli,
            &[(561, 0.02), (613, 0.03), (655, 0.01)],
        );

        let products = run(&Parameter::Olh, &scene, &coefficients).unwrap();

        let ow = (655.0 - 613.0) / (655.0 - 561.0);
        let expected = 0.03 - (0.02 * ow + 0.01 * (1.0 - ow));
        assert_eq!(products[0].name, "olh");
        assert_relative_eq!(products[0].data[(0, 0)], expected as f32, epsilon = 1e-6);

        let partial = surface_scene(Sensor::Landsat8Oli, &[(561, 0.02), (655, 0.01)]);
        assert_eq!(
            skip_of(run(&Parameter::Olh, &partial, &coefficients)),
            Skip::MissingBand {
                name: "rhos_613".to_string()
            }
        );
    }
}
