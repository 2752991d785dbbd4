//! Inherent Optical Properties (IOP) module
//!
//! Semi-analytical inversions of remote-sensing reflectance into absorption
//! and backscattering, plus the pure-water constants they rely on.

pub mod constants;
pub mod p3qaa;
pub mod qaa;

pub use p3qaa::{P3qaaOutput, p3qaa_compute};
pub use qaa::{QAA_WAVES, QaaInput, QaaSelection, QaaVersion, qaa_compute};
