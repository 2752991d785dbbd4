//! Three-band QAA: blue, green and red only, green reference.
//!
//! The spectral slope of particulate backscattering is parameterised per
//! sensor as `eta = e0 * (1 - e1 * exp(-e2 * rrs_B / rrs_G))`.

use std::collections::BTreeMap;

use ndarray::Array2;

use super::qaa::{below_surface, u_ratio};
use crate::coefficients::{P3qaaConfig, QaaCoefficients};
use crate::iop::constants::{self, AW_ALL, BBW_ALL};

/// Spectrally resolved outputs, one raster per band.
pub const P3QAA_BAND_PRODUCTS: [&str; 3] = ["a", "bbp", "bb"];
/// Outputs with a single raster.
pub const P3QAA_SCALAR_PRODUCTS: [&str; 2] = ["eta", "chi"];

/// Result of the inversion. Band products are ordered blue, green, red.
#[derive(Debug, Clone)]
pub struct P3qaaOutput {
    pub eta: Array2<f32>,
    pub chi: Array2<f32>,
    pub a: [Array2<f32>; 3],
    pub bbp: [Array2<f32>; 3],
    pub bb: [Array2<f32>; 3],
}

impl P3qaaOutput {
    /// Products named `<product>` or `<product>_<wave>` for the given band
    /// wavelengths.
    pub fn into_named(self, waves: [u32; 3]) -> BTreeMap<String, Array2<f32>> {
        let mut named = BTreeMap::new();
        for (product, data) in P3QAA_SCALAR_PRODUCTS.iter().zip([self.eta, self.chi]) {
            named.insert(product.to_string(), data);
        }

        for (product, bands) in P3QAA_BAND_PRODUCTS.iter().zip([self.a, self.bbp, self.bb]) {
            for (wave, data) in waves.iter().zip(bands) {
                named.insert(format!("{}_{}", product, wave), data);
            }
        }

        named
    }
}

/// `rrs` holds above-surface Rrs for blue, green and red, `waves` the band
/// wavelengths they were read at.
pub fn p3qaa_compute(
    rrs: &[Array2<f32>; 3],
    waves: [u32; 3],
    config: &P3qaaConfig,
    qaa: &QaaCoefficients,
) -> P3qaaOutput {
    let shape = rrs[0].dim();
    let nan = || Array2::from_elem(shape, f32::NAN);
    let mut out = P3qaaOutput {
        eta: nan(),
        chi: nan(),
        a: [nan(), nan(), nan()],
        bbp: [nan(), nan(), nan()],
        bb: [nan(), nan(), nan()],
    };

    let aw = waves.map(|w| constants::closest_value(&AW_ALL, w).unwrap_or(f64::NAN));
    let bbw = waves.map(|w| constants::closest_value(&BBW_ALL, w).unwrap_or(f64::NAN));
    let lambda = waves.map(f64::from);
    let [h0, h1, h2] = config.h;
    let [e0, e1, e2] = config.eta;

    for ((row, col), _) in rrs[0].indexed_iter() {
        let idx = (row, col);
        let r = [0, 1, 2].map(|i| below_surface(rrs[i][idx] as f64));
        let u = r.map(|v| u_ratio(v, qaa.g0, qaa.g1));

        let ratio = r[0] / r[1];
        let chi = ratio.log10();
        let a_green = aw[1] + 10f64.powf(h0 + h1 * chi + h2 * chi.powi(2));
        let bbp_green = u[1] * a_green / (1.0 - u[1]) - bbw[1];
        let eta = e0 * (1.0 - e1 * (-e2 * ratio).exp());

        out.eta[idx] = eta as f32;
        out.chi[idx] = chi as f32;
        for i in 0..3 {
            let bbp = bbp_green * (lambda[1] / lambda[i]).powf(eta);
            let bb = bbp + bbw[i];
            out.bbp[i][idx] = bbp as f32;
            out.bb[i][idx] = bb as f32;
            out.a[i][idx] = ((1.0 - u[i]) * bb / u[i]) as f32;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coefficients::Coefficients;
    use crate::sensor::Sensor;
    use approx::assert_relative_eq;

    #[test]
    fn test_p3qaa() {
        let coefficients = Coefficients::builtin().unwrap();
        let config = coefficients.p3qaa(&Sensor::Landsat8Oli).unwrap();
        let rrs = [0.006f32, 0.004, 0.001].map(|v| Array2::from_elem((1, 2), v));

        let out = p3qaa_compute(&rrs, [483, 561, 655], config, &coefficients.qaa);

        let ratio = below_surface(0.006) / below_surface(0.004);
        assert_relative_eq!(out.chi[(0, 0)], ratio.log10() as f32, epsilon = 1e-6);

        // bb = bbp + bbw at every band, and green carries the reference bbp
        for i in 0..3 {
            assert!(out.a[i][(0, 1)] > 0.0);
            assert!(out.bb[i][(0, 1)] > out.bbp[i][(0, 1)]);
        }
        assert!(out.bbp[0][(0, 0)] > out.bbp[2][(0, 0)]);

        let named = out.into_named([483, 561, 655]);
        let mut names: Vec<&str> = named.keys().map(String::as_str).collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "a_483", "a_561", "a_655", "bb_483", "bb_561", "bb_655", "bbp_483", "bbp_561",
                "bbp_655", "chi", "eta"
            ]
        );
    }
}
