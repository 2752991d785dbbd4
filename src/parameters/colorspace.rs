//! Reflectance composites in CIE Lab (D65), used by the FAIT cloud and glint
//! screening.

use palette::white_point::D65;
use palette::{IntoColor, Lab, LinSrgb, Srgb};

pub type LabD65 = Lab<D65, f32>;

/// Reflectance stretched linearly from `[0, limit]` onto 8-bit levels and
/// back to `[0, 1]`. NaN maps to black.
pub fn quantise(value: f32, limit: f64) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    let scaled = (value as f64 / limit).clamp(0.0, 1.0);
    (scaled * 255.0).floor() as f32 / 255.0
}

/// Lab of an sRGB-encoded triplet in `[0, 1]`.
pub fn srgb_to_lab(red: f32, green: f32, blue: f32) -> LabD65 {
    let srgb = Srgb::new(red, green, blue);
    let lin: LinSrgb<f32> = srgb.into_linear();
    lin.into_color()
}
