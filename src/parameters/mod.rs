//! Derived parameters: request-name parsing and the algorithm families.
//!
//! Every family is a function of a [`Context`] returning the rasters it
//! produced, or the reason it could not produce any.

use std::collections::BTreeSet;
use std::fmt::Display;

use ndarray::Array2;

use crate::coefficients::Coefficients;
use crate::error::Error;
use crate::flags::FlagRaster;
use crate::iop::{QaaSelection, QaaVersion};
use crate::product::ProductRaster;
use crate::rsr::RsrTable;
use crate::scene::{BandMatch, BandProvider, Domain};

pub mod chl_oc;
pub mod colorspace;
pub mod dogliotti;
pub mod fai;
pub mod indices;
pub mod iop;
pub mod nechad;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NechadQuantity {
    Turbidity,
    Spm,
}

impl NechadQuantity {
    /// Key of the quantity in the coefficient tables.
    pub fn key(&self) -> &'static str {
        match self {
            NechadQuantity::Turbidity => "TUR",
            NechadQuantity::Spm => "SPM",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NechadVariant {
    /// Hyperspectral coefficients at the requested wavelength.
    Centre,
    /// Hyperspectral coefficients convolved with the band response.
    Resampled,
    /// Per sensor and band calibration of 2016.
    Calibration2016,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DogliottiMode {
    Blended,
    Red,
    Nir,
}

impl DogliottiMode {
    pub fn name(&self) -> &'static str {
        match self {
            DogliottiMode::Blended => "blended",
            DogliottiMode::Red => "red",
            DogliottiMode::Nir => "nir",
        }
    }
}

/// A requested parameter, recognised from its name.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    Nechad {
        quantity: NechadQuantity,
        variant: NechadVariant,
        wave: u32,
    },
    Dogliotti {
        mode: DogliottiMode,
        config: String,
        /// Whether the mode or config was spelled out in the request.
        suffixed: bool,
    },
    ChlOc {
        variant: String,
    },
    P3qaa {
        product: Option<String>,
    },
    Qaa {
        selection: QaaSelection,
    },
    Fait,
    Fai {
        domain: Domain,
    },
    Ndvi {
        domain: Domain,
    },
    Ndci,
    Slh,
    Olh,
}

const NECHAD_DEFAULT_WAVE: u32 = 665;
const DOGLIOTTI_DEFAULT_CONFIG: &str = "defaults";

fn parse_nechad(name: &str) -> Option<Parameter> {
    let quantity = match name.chars().next()? {
        't' => NechadQuantity::Turbidity,
        's' => NechadQuantity::Spm,
        _ => return None,
    };

    let resampled = name.contains("ave");
    let variant = if resampled {
        NechadVariant::Resampled
    } else if name.contains("2016") {
        NechadVariant::Calibration2016
    } else {
        NechadVariant::Centre
    };

    // t_nechad_<w>, but spm_nechad_ave_<w>
    let parts: Vec<&str> = name.split('_').collect();
    let wave_idx = if resampled { 3 } else { 2 };
    let wave = match parts.get(wave_idx) {
        Some(wave) => wave.parse().ok()?,
        None => NECHAD_DEFAULT_WAVE,
    };

    Some(Parameter::Nechad {
        quantity,
        variant,
        wave,
    })
}

fn parse_dogliotti(name: &str) -> Parameter {
    match name.split('_').nth(2) {
        Some("red") => Parameter::Dogliotti {
            mode: DogliottiMode::Red,
            config: DOGLIOTTI_DEFAULT_CONFIG.to_string(),
            suffixed: true,
        },
        Some("nir") => Parameter::Dogliotti {
            mode: DogliottiMode::Nir,
            config: DOGLIOTTI_DEFAULT_CONFIG.to_string(),
            suffixed: true,
        },
        Some(config) => Parameter::Dogliotti {
            mode: DogliottiMode::Blended,
            config: config.to_string(),
            suffixed: true,
        },
        None => Parameter::Dogliotti {
            mode: DogliottiMode::Blended,
            config: DOGLIOTTI_DEFAULT_CONFIG.to_string(),
            suffixed: false,
        },
    }
}

fn parse_qaa(name: &str) -> Option<Parameter> {
    let versions: BTreeSet<QaaVersion> = match name {
        "qaa" => QaaVersion::ALL.into_iter().collect(),
        "qaa5" => BTreeSet::from([QaaVersion::V5]),
        "qaa6" => BTreeSet::from([QaaVersion::V6]),
        "qaaw" => BTreeSet::from([QaaVersion::Vw]),
        _ => {
            let product = name.strip_prefix("qaa_").filter(|p| !p.is_empty())?;
            return Some(Parameter::Qaa {
                selection: QaaSelection {
                    versions: BTreeSet::new(),
                    products: BTreeSet::from([product.to_string()]),
                },
            });
        }
    };

    Some(Parameter::Qaa {
        selection: QaaSelection {
            versions,
            products: BTreeSet::new(),
        },
    })
}

impl Parameter {
    /// Recognises a requested name. Families are tried in a fixed order and
    /// the first match wins, so `fait` is never taken for `fai`.
    pub fn parse(name: &str) -> Option<Parameter> {
        if name.contains("nechad") {
            return parse_nechad(name);
        }
        if name.contains("dogliotti") {
            return Some(parse_dogliotti(name));
        }
        if name.contains("chl_oc") {
            let variant = match name {
                "chl_oc" | "chl_oc2" => "chl_oc2",
                other => other,
            };
            return Some(Parameter::ChlOc {
                variant: variant.to_string(),
            });
        }
        if let Some(rest) = name.strip_prefix("p3qaa") {
            let product = rest.strip_prefix('_').map(str::to_string);
            if rest.is_empty() || product.as_deref().is_some_and(|p| !p.is_empty()) {
                return Some(Parameter::P3qaa { product });
            }
            return None;
        }
        if name.starts_with("qaa") {
            return parse_qaa(name);
        }

        match name {
            "fait" => Some(Parameter::Fait),
            "fai" => Some(Parameter::Fai {
                domain: Domain::Surface,
            }),
            "fai_rhot" => Some(Parameter::Fai {
                domain: Domain::Toa,
            }),
            "ndvi" => Some(Parameter::Ndvi {
                domain: Domain::Surface,
            }),
            "ndvi_rhot" => Some(Parameter::Ndvi {
                domain: Domain::Toa,
            }),
            "ndci" => Some(Parameter::Ndci),
            "slh" => Some(Parameter::Slh),
            "olh" => Some(Parameter::Olh),
            _ => None,
        }
    }

    /// Water products, NaN where the flag selector hits.
    pub fn is_masked(&self) -> bool {
        !matches!(
            self,
            Parameter::Fai { .. } | Parameter::Fait | Parameter::Ndvi { .. }
        )
    }

    pub fn family(&self) -> &'static str {
        match self {
            Parameter::Nechad { .. } => "Nechad",
            Parameter::Dogliotti { .. } => "Dogliotti",
            Parameter::ChlOc { .. } => "chl_oc",
            Parameter::P3qaa { .. } => "P3QAA",
            Parameter::Qaa { .. } => "QAA",
            Parameter::Fait => "FAIT",
            Parameter::Fai { .. } => "FAI",
            Parameter::Ndvi { .. } => "NDVI",
            Parameter::Ndci => "NDCI",
            Parameter::Slh => "SLH",
            Parameter::Olh => "OLH",
        }
    }

    /// Datasets the multi-product inversions would write, known before
    /// running them. `None` for single-output families.
    pub fn output_names(&self, ctx: &Context<'_>) -> Result<Option<Vec<String>>, ParameterError> {
        match self {
            Parameter::Qaa { selection } => Ok(Some(iop::qaa_output_names(ctx, selection))),
            Parameter::P3qaa { product } => {
                iop::p3qaa_output_names(ctx, product.as_deref()).map(Some)
            }
            _ => Ok(None),
        }
    }

    pub fn compute(&self, ctx: &Context<'_>) -> Result<Vec<ProductRaster>, ParameterError> {
        match self {
            Parameter::Nechad {
                quantity,
                variant,
                wave,
            } => nechad::compute(ctx, *quantity, *variant, *wave),
            Parameter::Dogliotti {
                mode,
                config,
                suffixed,
            } => dogliotti::compute(ctx, *mode, config, *suffixed),
            Parameter::ChlOc { variant } => chl_oc::compute(ctx, variant),
            Parameter::P3qaa { product } => iop::compute_p3qaa(ctx, product.as_deref()),
            Parameter::Qaa { selection } => iop::compute_qaa(ctx, selection),
            Parameter::Fait => fai::compute_fait(ctx),
            Parameter::Fai { domain } => fai::compute_fai(ctx, *domain),
            Parameter::Ndvi { domain } => indices::compute_ndvi(ctx, *domain),
            Parameter::Ndci => indices::compute_ndci(ctx),
            Parameter::Slh => indices::compute_slh(ctx),
            Parameter::Olh => indices::compute_olh(ctx),
        }
    }
}

/// Why a requested parameter produced nothing. Never fatal for the run.
#[derive(Debug, Clone, PartialEq)]
pub enum Skip {
    Unrecognised,
    SensorNotConfigured { sensor: String },
    BandUnavailable {
        domain: Domain,
        target: f64,
        closest: Option<u32>,
        tolerance: Option<f64>,
    },
    MissingBand { name: String },
    MissingCoefficients { what: String },
    NothingSelected,
    AlreadyWritten,
}

impl Display for Skip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Skip::Unrecognised => write!(f, "not a recognised parameter"),
            Skip::SensorNotConfigured { sensor } => write!(f, "not configured for {}", sensor),
            Skip::BandUnavailable {
                domain,
                target,
                closest: Some(closest),
                tolerance: Some(tolerance),
            } => write!(
                f,
                "no {} band within {} nm of {} nm (closest {} nm)",
                domain, tolerance, target, closest
            ),
            Skip::BandUnavailable { domain, target, .. } => {
                write!(f, "no {} band for {} nm", domain, target)
            }
            Skip::MissingBand { name } => write!(f, "band {} not in scene", name),
            Skip::MissingCoefficients { what } => write!(f, "no coefficients for {}", what),
            Skip::NothingSelected => write!(f, "no products selected"),
            Skip::AlreadyWritten => write!(f, "all outputs already written"),
        }
    }
}

#[derive(Debug)]
pub enum ParameterError {
    Skip(Skip),
    Fatal(Error),
}

impl From<Skip> for ParameterError {
    fn from(skip: Skip) -> Self {
        ParameterError::Skip(skip)
    }
}

impl From<Error> for ParameterError {
    fn from(error: Error) -> Self {
        ParameterError::Fatal(error)
    }
}

/// Everything a family may look at for one scene.
pub struct Context<'a> {
    pub provider: &'a dyn BandProvider,
    pub coefficients: &'a Coefficients,
    pub rsr: Option<&'a RsrTable>,
    pub flags: &'a FlagRaster,
    pub selector: i32,
    /// Every name in the run's parameter list.
    pub requested: &'a [String],
}

impl Context<'_> {
    /// Closest band to `target`, optionally no further than `tolerance`.
    pub fn select(
        &self,
        domain: Domain,
        target: f64,
        tolerance: Option<f64>,
    ) -> Result<BandMatch, Skip> {
        let unavailable = |closest: Option<u32>| Skip::BandUnavailable {
            domain,
            target,
            closest,
            tolerance,
        };

        let band = self
            .provider
            .catalog(domain)
            .closest(target)
            .map_err(|_| unavailable(None))?;

        match tolerance {
            Some(tolerance) if band.offset > tolerance => Err(unavailable(Some(band.wavelength))),
            _ => Ok(band),
        }
    }

    /// One band per target, all within their tolerance, or nothing.
    pub fn select_all(
        &self,
        domain: Domain,
        targets: &[f64],
        tolerances: &[f64],
    ) -> Result<Vec<BandMatch>, Skip> {
        targets
            .iter()
            .zip(tolerances)
            .map(|(target, tolerance)| self.select(domain, *target, Some(*tolerance)))
            .collect()
    }

    pub fn read(&self, band: &BandMatch) -> Result<Array2<f32>, Error> {
        self.provider.band(&band.name)
    }

    /// Band with flagged pixels set to NaN.
    pub fn read_masked(&self, band: &BandMatch) -> Result<Array2<f32>, Error> {
        let mut data = self.read(band)?;
        self.flags.apply_mask(&mut data, self.selector);
        Ok(data)
    }

    pub fn sensor_name(&self) -> String {
        self.provider.attributes().sensor.to_string()
    }

    pub fn sensor_not_configured(&self) -> Skip {
        Skip::SensorNotConfigured {
            sensor: self.sensor_name(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::scene::{Scene, SceneAttributes};
    use crate::sensor::Sensor;

    /// Scene with constant bands `rhos_<w>`, one per `(w, value)`.
    pub fn surface_scene(sensor: Sensor, bands: &[(u32, f32)]) -> Scene {
        let mut scene = Scene::new(SceneAttributes::new(sensor).with_sza(30.0), (2, 3));
        for (wave, value) in bands {
            scene
                .insert_band(Domain::Surface.band_name(*wave), Array2::from_elem((2, 3), *value))
                .unwrap();
        }
        scene
    }

    pub fn run(
        parameter: &Parameter,
        scene: &Scene,
        coefficients: &Coefficients,
    ) -> Result<Vec<ProductRaster>, ParameterError> {
        let flags = FlagRaster::zeros(scene.shape());
        let requested = Vec::new();
        let ctx = Context {
            provider: scene,
            coefficients,
            rsr: None,
            flags: &flags,
            selector: 0,
            requested: &requested,
        };
        parameter.compute(&ctx)
    }

    pub fn skip_of(result: Result<Vec<ProductRaster>, ParameterError>) -> Skip {
        match result {
            Err(ParameterError::Skip(skip)) => skip,
            Err(ParameterError::Fatal(e)) => panic!("unexpected error {}", e),
            Ok(products) => panic!("unexpected {} products", products.len()),
        }
    }
}
