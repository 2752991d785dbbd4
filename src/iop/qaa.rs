//! Quasi-Analytical Algorithm (QAA) on rasters
//!
//! Four-band inversion of remote-sensing reflectance into total absorption
//! `a`, particulate backscattering `bbp` and diffuse attenuation `kd`. Three
//! versions share the same skeleton and differ in how the reference
//! absorption is obtained:
//!
//! - **v5**: green reference, empirical `a(λ0)` from a blue/green/red ratio
//! - **v6**: as v5 where Rrs(red) is below a threshold, red reference above it
//! - **vw**: red reference everywhere, suited to turbid waters
//!
//! Bands are addressed by their nominal slot, 443, 490, 560 and 665 nm, and
//! products are named after the slot (`a_443_v6`, `rrs_560`, ...) whatever
//! band the sensor actually provides.
//!
//! ## References
//!
//! - Lee, Z., Carder, K. L., & Arnone, R. A. (2002). Deriving inherent optical properties
//!   from water color: a multiband quasi-analytical algorithm for optically deep waters.
//!   *Applied Optics*, 41(27), 5755-5772.
//! - Lee, Z., Du, K., & Arnone, R. (2005). A model for the diffuse attenuation coefficient
//!   of downwelling irradiance. *Journal of Geophysical Research*, 110, C02016.
//! - QAA v6 update, <https://www.ioccg.org/groups/Software_OCA/QAA_v6_2014209.pdf>

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

use ndarray::Array2;

use crate::coefficients::QaaCoefficients;
use crate::iop::constants::{self, AW_ALL, BBW_ALL};
use crate::scene::SolarZenith;

/// Nominal band slots: blue, blue-green, green, red.
pub const QAA_WAVES: [u32; 4] = [443, 490, 560, 665];

const BLUE: usize = 0;
const CYAN: usize = 1;
const GREEN: usize = 2;
const RED: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QaaVersion {
    V5,
    V6,
    Vw,
}

impl QaaVersion {
    pub const ALL: [QaaVersion; 3] = [QaaVersion::V5, QaaVersion::V6, QaaVersion::Vw];

    pub fn suffix(&self) -> &'static str {
        match self {
            QaaVersion::V5 => "v5",
            QaaVersion::V6 => "v6",
            QaaVersion::Vw => "vw",
        }
    }

    /// Version a product name belongs to, from its `_v5`/`_v6`/`_vw` suffix.
    pub fn of_product(product: &str) -> Option<QaaVersion> {
        let (_, suffix) = product.rsplit_once('_')?;
        Self::ALL.into_iter().find(|v| v.suffix() == suffix)
    }
}

impl Display for QaaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.suffix())
    }
}

/// Rrs at the four slots, and the wavelengths of the bands that fed them.
pub struct QaaInput {
    pub rrs: [Array2<f32>; 4],
    pub waves: [u32; 4],
    pub sza: Option<SolarZenith>,
}

/// Products to keep. Shared products (`rrs_<w>`, `u_<w>`) come with any full
/// version; single products can be asked for by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QaaSelection {
    pub versions: BTreeSet<QaaVersion>,
    pub products: BTreeSet<String>,
}

impl QaaSelection {
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty() && self.products.is_empty()
    }

    fn wants(&self, product: &str) -> bool {
        if self.products.contains(product) {
            return true;
        }
        match QaaVersion::of_product(product) {
            Some(version) => self.versions.contains(&version),
            None => !self.versions.is_empty(),
        }
    }

    /// Names [`qaa_compute`] returns for this selection, without running it.
    pub fn output_names(&self, with_kd: bool) -> Vec<String> {
        let shared = QAA_WAVES
            .iter()
            .flat_map(|w| [format!("rrs_{}", w), format!("u_{}", w)]);
        let per_version = QaaVersion::ALL
            .into_iter()
            .filter(|v| self.needs(*v))
            .flat_map(|v| {
                QAA_WAVES.iter().flat_map(move |w| {
                    [
                        format!("a_{}_{}", w, v),
                        format!("bbp_{}_{}", w, v),
                        format!("kd_{}_{}", w, v),
                    ]
                })
            });

        shared
            .chain(per_version)
            .filter(|name| self.wants(name))
            .filter(|name| with_kd || !name.starts_with("kd_"))
            .collect()
    }

    fn needs(&self, version: QaaVersion) -> bool {
        self.versions.contains(&version)
            || self
                .products
                .iter()
                .any(|p| QaaVersion::of_product(p) == Some(version))
    }
}

#[derive(Debug, Clone, Copy)]
struct WaterConstants {
    aw: [f64; 4],
    bbw: [f64; 4],
    waves: [f64; 4],
}

impl WaterConstants {
    fn new(waves: [u32; 4]) -> Self {
        // Tables cover the visible range, the lookup never fails
        let aw = waves.map(|w| constants::closest_value(&AW_ALL, w).unwrap_or(f64::NAN));
        let bbw = waves.map(|w| constants::closest_value(&BBW_ALL, w).unwrap_or(f64::NAN));
        Self {
            aw,
            bbw,
            waves: waves.map(f64::from),
        }
    }
}

/// Below-surface reflectance from above-surface Rrs.
pub fn below_surface(rrs: f64) -> f64 {
    rrs / (constants::RRS_A + constants::RRS_B * rrs)
}

/// Ratio of backscattering to absorption plus backscattering.
pub fn u_ratio(rrs: f64, g0: f64, g1: f64) -> f64 {
    ((g0.powi(2) + 4.0 * g1 * rrs).sqrt() - g0) / (2.0 * g1)
}

/// Lee et al. (2005) diffuse attenuation.
pub fn kd_lee(a: f64, bb: f64, sza: f64) -> f64 {
    (1.0 + constants::KD_M0 * sza) * a
        + constants::KD_M1 * (1.0 - constants::KD_M2 * (-constants::KD_M3 * a).exp()) * bb
}

#[derive(Debug, Clone, Copy)]
enum Reference {
    Green([f64; 3]),
    Red([f64; 2]),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Iops {
    a: [f64; 4],
    bbp: [f64; 4],
}

fn invert(
    rrs_above: &[f64; 4],
    rrs: &[f64; 4],
    u: &[f64; 4],
    water: &WaterConstants,
    reference: Reference,
) -> Iops {
    let (idx, a_ref) = match reference {
        Reference::Green(h) => {
            let chi = ((rrs[BLUE] + rrs[CYAN])
                / (rrs[GREEN] + 5.0 * rrs[RED] / rrs[CYAN] * rrs[RED]))
                .log10();
            let a = water.aw[GREEN] + 10f64.powf(h[0] + h[1] * chi + h[2] * chi.powi(2));
            (GREEN, a)
        }
        Reference::Red(c) => {
            let ratio = rrs_above[RED] / (rrs_above[BLUE] + rrs_above[CYAN]);
            (RED, water.aw[RED] + c[0] * ratio.powf(c[1]))
        }
    };

    let bbp_ref = u[idx] * a_ref / (1.0 - u[idx]) - water.bbw[idx];
    let eta = 2.0 * (1.0 - 1.2 * (-0.9 * rrs[BLUE] / rrs[GREEN]).exp());

    let mut iops = Iops {
        a: [0.0; 4],
        bbp: [0.0; 4],
    };
    for i in 0..4 {
        let bbp = bbp_ref * (water.waves[idx] / water.waves[i]).powf(eta);
        iops.bbp[i] = bbp;
        iops.a[i] = (1.0 - u[i]) * (water.bbw[i] + bbp) / u[i];
    }
    iops
}

fn reference(version: QaaVersion, rrs_red: f64, coef: &QaaCoefficients) -> Reference {
    match version {
        QaaVersion::V5 => Reference::Green(coef.v5.h),
        QaaVersion::V6 if rrs_red < coef.v6.red_threshold => Reference::Green(coef.v6.h),
        QaaVersion::V6 => Reference::Red(coef.v6.red_coef),
        QaaVersion::Vw => Reference::Red(coef.vw.red_coef),
    }
}

/// Runs the selected versions and returns the selected products keyed by
/// product name (without the `qaa_` prefix).
pub fn qaa_compute(
    input: &QaaInput,
    coef: &QaaCoefficients,
    selection: &QaaSelection,
) -> BTreeMap<String, Array2<f32>> {
    let shape = input.rrs[0].dim();
    let water = WaterConstants::new(input.waves);
    let versions: Vec<QaaVersion> = QaaVersion::ALL
        .into_iter()
        .filter(|v| selection.needs(*v))
        .collect();

    let mut products: BTreeMap<String, Array2<f32>> = BTreeMap::new();
    let mut add = |name: String| {
        if selection.wants(&name) {
            products.insert(name.clone(), Array2::from_elem(shape, f32::NAN));
        }
        name
    };

    let shared: Vec<(String, String)> = QAA_WAVES
        .iter()
        .map(|w| (add(format!("rrs_{}", w)), add(format!("u_{}", w))))
        .collect();

    let per_version: Vec<(QaaVersion, Vec<[String; 3]>)> = versions
        .iter()
        .map(|v| {
            let names = QAA_WAVES
                .iter()
                .map(|w| {
                    [
                        add(format!("a_{}_{}", w, v)),
                        add(format!("bbp_{}_{}", w, v)),
                        add(format!("kd_{}_{}", w, v)),
                    ]
                })
                .collect();
            (*v, names)
        })
        .collect();

    // kd needs the sun
    if input.sza.is_none() {
        products.retain(|name, _| !name.starts_with("kd_"));
    }

    let mut set = |name: &str, idx: (usize, usize), value: f64| {
        if let Some(data) = products.get_mut(name) {
            data[idx] = value as f32;
        }
    };

    for row in 0..shape.0 {
        for col in 0..shape.1 {
            let idx = (row, col);
            let rrs_above = [0, 1, 2, 3].map(|i| input.rrs[i][idx] as f64);
            let rrs = rrs_above.map(below_surface);
            let u = rrs.map(|r| u_ratio(r, coef.g0, coef.g1));

            for (i, (rrs_name, u_name)) in shared.iter().enumerate() {
                set(rrs_name, idx, rrs[i]);
                set(u_name, idx, u[i]);
            }

            let sza = input.sza.as_ref().map(|s| s.at(row, col));
            for (version, names) in &per_version {
                let iops = invert(
                    &rrs_above,
                    &rrs,
                    &u,
                    &water,
                    reference(*version, rrs_above[RED], coef),
                );
                for (i, [a_name, bbp_name, kd_name]) in names.iter().enumerate() {
                    set(a_name, idx, iops.a[i]);
                    set(bbp_name, idx, iops.bbp[i]);
                    if let Some(sza) = sza {
                        set(kd_name, idx, kd_lee(iops.a[i], water.bbw[i] + iops.bbp[i], sza));
                    }
                }
            }
        }
    }

    products
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coefficients::Coefficients;
    use approx::assert_relative_eq;

    // Clear-water spectrum, Rrs(665) below the v6 red threshold
    const CLEAR: [f32; 4] = [0.0050, 0.0045, 0.0020, 0.0003];
    // Turbid spectrum, Rrs(665) well above it
    const TURBID: [f32; 4] = [0.0060, 0.0090, 0.0150, 0.0110];

    fn input(spectrum: [f32; 4], sza: Option<f64>) -> QaaInput {
        QaaInput {
            rrs: spectrum.map(|v| Array2::from_elem((2, 2), v)),
            waves: [443, 482, 561, 655],
            sza: sza.map(SolarZenith::Scalar),
        }
    }

    fn all_versions() -> QaaSelection {
        QaaSelection {
            versions: QaaVersion::ALL.into_iter().collect(),
            products: BTreeSet::new(),
        }
    }

    #[test]
    fn test_below_surface_and_u() {
        let rrs = below_surface(0.01);
        assert_relative_eq!(rrs, 0.01 / 0.537);

        let coef = Coefficients::builtin().unwrap().qaa;
        let u = u_ratio(rrs, coef.g0, coef.g1);
        // u solves rrs = g0 u + g1 u^2
        assert_relative_eq!(coef.g0 * u + coef.g1 * u * u, rrs, epsilon = 1e-12);
    }

    #[test]
    fn test_v6_matches_v5_in_clear_water() {
        let coef = Coefficients::builtin().unwrap().qaa;
        let products = qaa_compute(&input(CLEAR, Some(30.0)), &coef, &all_versions());

        for w in QAA_WAVES {
            let v5 = products[&format!("a_{}_v5", w)][(0, 0)];
            let v6 = products[&format!("a_{}_v6", w)][(0, 0)];
            assert_relative_eq!(v5, v6);
            assert!(v5 > 0.0);
        }
    }

    #[test]
    fn test_v6_matches_vw_in_turbid_water() {
        let coef = Coefficients::builtin().unwrap().qaa;
        let products = qaa_compute(&input(TURBID, Some(30.0)), &coef, &all_versions());

        for w in QAA_WAVES {
            assert_relative_eq!(
                products[&format!("bbp_{}_v6", w)][(1, 1)],
                products[&format!("bbp_{}_vw", w)][(1, 1)]
            );
        }
        assert!(products["bbp_665_vw"][(0, 0)] > 0.0);
    }

    #[test]
    fn test_kd_needs_solar_zenith() {
        let coef = Coefficients::builtin().unwrap().qaa;

        let with_sun = qaa_compute(&input(CLEAR, Some(30.0)), &coef, &all_versions());
        assert!(with_sun.contains_key("kd_490_v6"));
        assert!(with_sun["kd_490_v6"][(0, 0)] > with_sun["a_490_v6"][(0, 0)]);

        let without_sun = qaa_compute(&input(CLEAR, None), &coef, &all_versions());
        assert!(!without_sun.keys().any(|k| k.starts_with("kd_")));
        assert!(without_sun.contains_key("a_490_v6"));
    }

    #[test]
    fn test_selection() {
        let coef = Coefficients::builtin().unwrap().qaa;

        let v5_only = QaaSelection {
            versions: BTreeSet::from([QaaVersion::V5]),
            products: BTreeSet::new(),
        };
        let products = qaa_compute(&input(CLEAR, Some(30.0)), &coef, &v5_only);
        assert!(products.contains_key("rrs_443"));
        assert!(products.contains_key("u_665"));
        assert!(products.contains_key("kd_560_v5"));
        assert!(!products.keys().any(|k| k.ends_with("_v6") || k.ends_with("_vw")));

        let single = QaaSelection {
            versions: BTreeSet::new(),
            products: BTreeSet::from(["a_443_vw".to_string()]),
        };
        let products = qaa_compute(&input(TURBID, None), &coef, &single);
        assert_eq!(products.keys().collect::<Vec<_>>(), vec!["a_443_vw"]);
    }

    #[test]
    fn test_nan_input_stays_nan() {
        let coef = Coefficients::builtin().unwrap().qaa;
        let mut input = input(CLEAR, Some(30.0));
        input.rrs[0][(0, 1)] = f32::NAN;

        let products = qaa_compute(&input, &coef, &all_versions());
        assert!(products["a_560_v5"][(0, 1)].is_nan());
        assert!(!products["a_560_v5"][(0, 0)].is_nan());
    }

    #[test]
    fn test_version_of_product() {
        assert_eq!(QaaVersion::of_product("a_443_v5"), Some(QaaVersion::V5));
        assert_eq!(QaaVersion::of_product("kd_665_vw"), Some(QaaVersion::Vw));
        assert_eq!(QaaVersion::of_product("rrs_443"), None);
    }

    #[test]
    fn test_output_names_match_products() {
        let coef = Coefficients::builtin().unwrap().qaa;
        let single = QaaSelection {
            versions: BTreeSet::new(),
            products: BTreeSet::from(["bbp_560_v6".to_string(), "rrs_443".to_string()]),
        };

        for selection in [all_versions(), single] {
            for sza in [Some(30.0), None] {
                let products = qaa_compute(&input(CLEAR, sza), &coef, &selection);
                let mut names = selection.output_names(sza.is_some());
                names.sort();
                assert_eq!(names, products.keys().cloned().collect::<Vec<_>>());
            }
        }
    }
}
