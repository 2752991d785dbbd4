//! Pure-water optical constants and fixed coefficients of the inversions.

use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Water absorption coefficients at different wavelengths (nm)
/// Values represent absorption coefficient in m^-1
/// Data from Pope and Fry (1997) and other standard oceanographic references
/// https://oceancolor.gsfc.nasa.gov/docs/rsr/water_coef.txt
pub static AW_ALL: LazyLock<BTreeMap<u32, f64>> = LazyLock::new(|| {
    BTreeMap::from([
        (410, 0.00473),
        (412, 0.00455056),
        (442, 0.00690),
        (443, 0.00706914),
        (469, 0.0104326),
        (482, 0.0119),
        (483, 0.0122),
        (486, 0.0139217),
        (488, 0.0145167),
        (490, 0.015),
        (492, 0.0159),
        (510, 0.0325),
        (531, 0.0439153),
        (547, 0.0531686),
        (551, 0.0577925),
        (555, 0.0596),
        (559, 0.0611),
        (560, 0.0619),
        (561, 0.0628),
        (645, 0.325),
        (655, 0.3693),
        (665, 0.429),
        (667, 0.434888),
        (670, 0.439),
        (671, 0.442831),
        (678, 0.462323),
    ])
});

/// Water backscattering coefficients at different wavelengths (nm)
/// Values represent backscattering coefficient in m^-1
/// Data from Zhang et al. (2009) and other standard oceanographic references
pub static BBW_ALL: LazyLock<BTreeMap<u32, f64>> = LazyLock::new(|| {
    BTreeMap::from([
        (410, 0.00339515),
        (412, 0.003325),
        (442, 0.00245),
        (443, 0.002436175),
        (469, 0.001908315),
        (482, 0.00171),
        (483, 0.00169),
        (486, 0.0016387),
        (488, 0.001610175),
        (490, 0.001582255),
        (492, 0.001566),
        (510, 0.001333585),
        (531, 0.001122495),
        (547, 0.000988925),
        (551, 0.000958665),
        (555, 0.000929535),
        (559, 0.000902),
        (560, 0.000895),
        (561, 0.000888),
        (645, 0.00049015),
        (655, 0.000454),
        (665, 0.000426),
        (667, 0.000425025),
        (670, 0.000416998),
        (671, 0.000414364),
        (678, 0.000396492),
    ])
});

/// Value of `table` at the tabulated wavelength closest to `wavelength`.
pub fn closest_value(table: &BTreeMap<u32, f64>, wavelength: u32) -> Option<f64> {
    table
        .iter()
        .min_by_key(|(wl, _)| wl.abs_diff(wavelength))
        .map(|(_, v)| *v)
}

/// Above-to-below surface conversion, rrs = Rrs / (RRS_A + RRS_B * Rrs)
pub const RRS_A: f64 = 0.52;
pub const RRS_B: f64 = 1.7;

/// Diffuse attenuation from a and bb, Lee et al. (2005)
/// Kd = (1 + M0 * sza) * a + M1 * (1 - M2 * exp(-M3 * a)) * bb
pub const KD_M0: f64 = 0.005;
pub const KD_M1: f64 = 4.18;
pub const KD_M2: f64 = 0.52;
pub const KD_M3: f64 = 10.8;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closest_value() {
        assert_eq!(closest_value(&AW_ALL, 490), Some(0.015));
        assert_eq!(closest_value(&AW_ALL, 700), Some(0.462323));
        assert_eq!(closest_value(&BBW_ALL, 2000), Some(0.000396492));
        assert_eq!(closest_value(&BTreeMap::new(), 490), None);
    }
}
