//! Level-2 water products from atmospherically corrected reflectance.
//!
//! A run computes the quality flags of a scene, copies the requested input
//! datasets and derives every requested water-quality parameter, writing
//! each raster to a [`writers::ProductSink`] as soon as it is ready.

pub mod bbox;
pub mod coefficients;
pub mod config;
pub mod copy;
pub mod error;
pub mod filters;
pub mod flags;
pub mod iop;
pub mod parameters;
pub mod processor;
pub mod product;
pub mod readers;
pub mod rsr;
pub mod scene;
pub mod sensor;
pub mod writers;

pub use error::{Error, Result};
pub use processor::{L2wProcessor, RunOptions, RunSummary};
