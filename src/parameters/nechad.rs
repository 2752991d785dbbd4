//! Single-band turbidity and suspended matter, Nechad et al. (2009, 2010).
//!
//! `P = A * rho / (1 - rho / C)` with `rho` the surface reflectance of the
//! band closest to the requested wavelength.

use super::{Context, NechadQuantity, NechadVariant, ParameterError, Skip};
use crate::product::{ParameterAttributes, ProductRaster};
use crate::scene::Domain;

pub fn nechad(rho: f32, a: f64, c: f64) -> f32 {
    let rho = rho as f64;
    (a * rho / (1.0 - rho / c)) as f32
}

fn attributes(quantity: NechadQuantity) -> ParameterAttributes {
    match quantity {
        NechadQuantity::Turbidity => ParameterAttributes::new("Nechad et al. 2009")
            .with_title("Nechad Turbidity")
            .with_names("turbidity", "Water turbidity")
            .with_units("FNU")
            .with_reference("Nechad et al. 2009"),
        NechadQuantity::Spm => ParameterAttributes::new("Nechad et al. 2010")
            .with_title("Nechad SPM")
            .with_names("spm", "Suspended Particulate Matter")
            .with_units("g m^-3")
            .with_reference("Nechad et al. 2010"),
    }
}

pub fn compute(
    ctx: &Context<'_>,
    quantity: NechadQuantity,
    variant: NechadVariant,
    wave: u32,
) -> Result<Vec<ProductRaster>, ParameterError> {
    let par = quantity.key();
    let sensor = &ctx.provider.attributes().sensor;
    let band = ctx.select(Domain::Surface, wave as f64, None)?;
    let cw = band.wavelength;
    let rsr_band = ctx.rsr.and_then(|rsr| rsr.band_for_wave(sensor, cw));

    let hyper = || {
        ctx.coefficients
            .nechad_hyper
            .get(par)
            .ok_or_else(|| Skip::MissingCoefficients {
                what: format!("Nechad {}", par),
            })
    };

    let (name, a, c) = match variant {
        NechadVariant::Centre => {
            let (a, c) = hyper()?
                .closest(wave as f64)
                .ok_or_else(|| Skip::MissingCoefficients {
                    what: format!("Nechad {} at {} nm", par, wave),
                })?;
            (format!("{}_Nechad_{}", par, cw), a, c)
        }
        NechadVariant::Resampled => {
            let table = hyper()?;
            let rsr_band = rsr_band.ok_or_else(|| Skip::MissingCoefficients {
                what: format!("response of the {} nm band of {}", cw, sensor),
            })?;
            let wave_um: Vec<f64> = table.wave.iter().map(|w| w / 1000.0).collect();
            let resampled = rsr_band
                .convolve(&wave_um, &table.a)
                .zip(rsr_band.convolve(&wave_um, &table.c))
                .ok_or_else(|| Skip::MissingCoefficients {
                    what: format!("Nechad {} resampled to {} nm", par, cw),
                })?;
            (format!("{}_Nechad_{}_ave", par, cw), resampled.0, resampled.1)
        }
        NechadVariant::Calibration2016 => {
            let entry = ctx
                .coefficients
                .nechad_2016(sensor, par, rsr_band.map(|b| b.name.as_str()), cw)
                .ok_or_else(|| Skip::MissingCoefficients {
                    what: format!("Nechad 2016 {} at {} nm for {}", par, cw, sensor),
                })?;
            (format!("{}_Nechad2016_{}", par, cw), entry.a, entry.c)
        }
    };

    let attributes = attributes(quantity)
        .with_dataset(Domain::Surface)
        .with_waves(vec![cw])
        .with_coefficient(format!("A_{}", par), a)
        .with_coefficient(format!("C_{}", par), c);

    let data = ctx.read(&band)?.mapv(|rho| nechad(rho, a, c));

    Ok(vec![ProductRaster::new(name, data, &attributes)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coefficients::Coefficients;
    use crate::parameters::Parameter;
    use crate::parameters::test_support::{run, skip_of, surface_scene};
    use crate::rsr::RsrTable;
    use crate::sensor::Sensor;
    use approx::assert_relative_eq;

    #[test]
    fn test_nechad_formula() {
        assert_relative_eq!(nechad(0.1, 100.0, 0.2), 20.0, epsilon = 1e-5);
        assert!(nechad(f32::NAN, 100.0, 0.2).is_nan());
    }

    #[test]
    fn test_spm_at_665() {
        let coefficients = Coefficients::builtin().unwrap();
        let scene = surface_scene(Sensor::Sentinel2aMsi, &[(560, 0.04), (665, 0.05)]);
        let parameter = Parameter::parse("spm_nechad_665").unwrap();

        let products = run(&parameter, &scene, &coefficients).unwrap();

        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "SPM_Nechad_665");
        let expected = 355.85 * 0.05 / (1.0 - 0.05 / 0.1728);
        assert_relative_eq!(products[0].data[(1, 2)], expected as f32, epsilon = 1e-3);

        let metadata = products[0].attributes.to_metadata();
        assert_eq!(metadata["A_SPM"], "355.85");
        assert_eq!(metadata["units"], "g m^-3");
    }

    #[test]
    fn test_name_follows_selected_band() {
        let coefficients = Coefficients::builtin().unwrap();
        let scene = surface_scene(Sensor::Landsat8Oli, &[(561, 0.04), (655, 0.05)]);
        let parameter = Parameter::parse("t_nechad").unwrap();

        let products = run(&parameter, &scene, &coefficients).unwrap();
        assert_eq!(products[0].name, "TUR_Nechad_655");
    }

    #[test]
    fn test_2016_lookup_by_wave() {
        let coefficients = Coefficients::builtin().unwrap();
        let scene = surface_scene(Sensor::Landsat8Oli, &[(655, 0.05)]);
        let parameter = Parameter::parse("t_nechad2016_655").unwrap();

        let products = run(&parameter, &scene, &coefficients).unwrap();
        assert_eq!(products[0].name, "TUR_Nechad2016_655");
        assert_eq!(products[0].attributes.coefficients["A_TUR"], 289.29);
    }

    #[test]
    fn test_resampled_needs_response() {
        let coefficients = Coefficients::builtin().unwrap();
        let scene = surface_scene(Sensor::Landsat8Oli, &[(655, 0.05)]);
        let parameter = Parameter::parse("t_nechad_ave_655").unwrap();

        assert!(matches!(
            skip_of(run(&parameter, &scene, &coefficients)),
            Skip::MissingCoefficients { .. }
        ));
    }

    #[test]
    fn test_resampled_with_response() {
        let coefficients = Coefficients::builtin().unwrap();
        let scene = surface_scene(Sensor::Landsat8Oli, &[(655, 0.05)]);
        let rsr: RsrTable = serde_json::from_str(
            r#"{"L8_OLI": {"bands": [{"name": "4", "wave_name": "655",
                "wave": [0.665, 0.666], "response": [1.0, 1.0]}]}}"#,
        )
        .unwrap();

        let flags = crate::flags::FlagRaster::zeros((2, 3));
        let requested = Vec::new();
        let ctx = Context {
            provider: &scene,
            coefficients: &coefficients,
            rsr: Some(&rsr),
            flags: &flags,
            selector: 0,
            requested: &requested,
        };
        let products = compute(
            &ctx,
            NechadQuantity::Turbidity,
            NechadVariant::Resampled,
            655,
        )
        .unwrap();

        assert_eq!(products[0].name, "TUR_Nechad_655_ave");
        // response sits just above the 665 nm table entry
        assert_relative_eq!(
            products[0].attributes.coefficients["A_TUR"],
            366.14,
            epsilon = 3.5
        );
    }
}
