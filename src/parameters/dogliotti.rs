//! Switching red/NIR turbidity, Dogliotti et al. (2015).
//!
//! The red calibration is used in clear to moderately turbid water and the
//! NIR one in very turbid water, with a linear blend between the two where
//! red reflectance falls inside `[lower_lim, upper_lim]`.

use super::nechad::nechad;
use super::{Context, DogliottiMode, ParameterError, Skip};
use crate::coefficients::DogliottiConfig;
use crate::product::{ParameterAttributes, ProductRaster};
use crate::scene::Domain;

/// Blended turbidity at one pixel from the red reflectance and both
/// single-band estimates.
pub fn blend(rho_red: f32, t_red: f32, t_nir: f32, lower: f64, upper: f64) -> f32 {
    let rho = rho_red as f64;
    if rho.is_nan() {
        f32::NAN
    } else if rho < lower {
        t_red
    } else if rho > upper {
        t_nir
    } else {
        let weight = ((rho - lower) / (upper - lower)) as f32;
        (1.0 - weight) * t_red + weight * t_nir
    }
}

fn output_name(mode: DogliottiMode, config: &str, suffixed: bool) -> String {
    match (suffixed, mode) {
        (false, _) => "TUR_Dogliotti".to_string(),
        (true, DogliottiMode::Blended) => format!("TUR_Dogliotti_{}", config),
        (true, mode) => format!("TUR_Dogliotti_{}", mode.name()),
    }
}

pub fn compute(
    ctx: &Context<'_>,
    mode: DogliottiMode,
    config_name: &str,
    suffixed: bool,
) -> Result<Vec<ProductRaster>, ParameterError> {
    let config: &DogliottiConfig = ctx
        .coefficients
        .dogliotti
        .get(config_name)
        .ok_or_else(|| Skip::MissingCoefficients {
            what: format!("Dogliotti {}", config_name),
        })?;

    let red = ctx.select(Domain::Surface, config.algo_wave_red as f64, None)?;
    let nir = ctx.select(Domain::Surface, config.algo_wave_nir as f64, None)?;

    let attributes = ParameterAttributes::new("Dogliotti et al. 2015")
        .with_title("Dogliotti Turbidity")
        .with_names("turbidity", "Water turbidity")
        .with_units("FNU")
        .with_reference("Dogliotti et al. 2015")
        .with_dataset(Domain::Surface)
        .with_waves(vec![red.wavelength, nir.wavelength])
        .with_coefficient("A_T_red", config.a_red)
        .with_coefficient("C_T_red", config.c_red)
        .with_coefficient("A_T_nir", config.a_nir)
        .with_coefficient("C_T_nir", config.c_nir)
        .with_coefficient("lower_lim", config.lower_lim)
        .with_coefficient("upper_lim", config.upper_lim);

    let name = output_name(mode, config_name, suffixed);
    let t_red = |rho: f32| nechad(rho, config.a_red, config.c_red);
    let t_nir = |rho: f32| nechad(rho, config.a_nir, config.c_nir);

    let data = match mode {
        DogliottiMode::Red => ctx.read(&red)?.mapv(t_red),
        DogliottiMode::Nir => ctx.read(&nir)?.mapv(t_nir),
        DogliottiMode::Blended => {
            let mut red_data = ctx.read(&red)?;
            let nir_data = ctx.read(&nir)?;
            red_data.zip_mut_with(&nir_data, |r, n| {
                *r = blend(*r, t_red(*r), t_nir(*n), config.lower_lim, config.upper_lim);
            });
            red_data
        }
    };

    Ok(vec![ProductRaster::new(name, data, &attributes)])
}
