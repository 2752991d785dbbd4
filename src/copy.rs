//! Pass-through of scene bands into the output, optionally converted to
//! another reflectance quantity.
use std::collections::HashSet;

use tracing::debug;

use crate::config::Settings;
use crate::error::Result;
use crate::flags::FlagRaster;
use crate::scene::{BandProvider, Domain, parse_band_name};
use crate::writers::{ProductSink, ProductWriter};

/// Requested names that expand to every band of a quantity.
pub const WILDCARDS: [&str; 4] = ["rhot_*", "rhos_*", "rhow_*", "Rrs_*"];

pub fn is_wildcard(name: &str) -> bool {
    WILDCARDS.iter().any(|w| w.eq_ignore_ascii_case(name))
}

fn wildcard_requested(settings: &Settings, domain: Domain) -> bool {
    let wildcard = format!("{}_*", domain.prefix());
    settings
        .l2w_parameters()
        .iter()
        .any(|p| p.eq_ignore_ascii_case(&wildcard))
}

/// One dataset the copy stage writes.
#[derive(Debug, Clone, PartialEq)]
pub struct CopyRequest {
    /// Output name.
    pub name: String,
    /// Scene band the data comes from.
    pub source: String,
    pub factor: f32,
    pub masked: bool,
}

impl CopyRequest {
    fn verbatim(name: &str) -> Self {
        Self {
            name: name.to_string(),
            source: name.to_string(),
            factor: 1.0,
            masked: false,
        }
    }

    /// `rhow_<w>` or `Rrs_<w>` derived from `rhos_<w>`.
    fn converted(domain: Domain, wavelength: u32) -> Self {
        Self {
            name: domain.band_name(wavelength),
            source: Domain::Surface.band_name(wavelength),
            factor: domain.from_surface_factor(),
            masked: true,
        }
    }
}

/// Datasets to copy, in order, without duplicates.
pub fn copy_list<P: BandProvider + ?Sized>(provider: &P, settings: &Settings) -> Vec<CopyRequest> {
    let mut requests = Vec::new();
    let mut push = |request: CopyRequest| {
        if !requests.iter().any(|r: &CopyRequest| r.name == request.name) {
            requests.push(request);
        }
    };

    for name in settings.copy_datasets() {
        if provider.has_band(name) {
            push(CopyRequest::verbatim(name));
        }
    }

    for name in settings.l2w_parameters() {
        if provider.has_band(name) {
            push(CopyRequest::verbatim(name));
        }
    }

    for domain in [Domain::Toa, Domain::Surface] {
        if wildcard_requested(settings, domain) {
            for entry in provider.catalog(domain).iter() {
                push(CopyRequest::verbatim(&entry.name));
            }
        }
    }

    let surface = provider.catalog(Domain::Surface);
    for domain in [Domain::WaterLeaving, Domain::RemoteSensing] {
        if wildcard_requested(settings, domain) {
            for entry in surface.iter() {
                push(CopyRequest::converted(domain, entry.wavelength));
            }
        }
    }

    // Single converted bands asked for by name
    for name in settings.l2w_parameters() {
        if let Some((domain, wavelength)) = parse_band_name(name) {
            let convertible = matches!(domain, Domain::WaterLeaving | Domain::RemoteSensing);
            if convertible
                && !provider.has_band(name)
                && surface.exact(wavelength).is_some()
            {
                push(CopyRequest::converted(domain, wavelength));
            }
        }
    }

    requests
}

/// Writes every request, one raster at a time. Returns the names written.
pub fn copy_datasets<P, S>(
    provider: &P,
    writer: &mut ProductWriter<'_, S>,
    requests: &[CopyRequest],
    flags: &FlagRaster,
    selector: i32,
) -> Result<Vec<String>>
where
    P: BandProvider + ?Sized,
    S: ProductSink,
{
    let mut written = Vec::new();

    for request in requests {
        if writer.contains(&request.name) {
            debug!("{} already in output", request.name);
            continue;
        }

        let mut data = provider.band(&request.source)?;
        if request.factor != 1.0 {
            data.mapv_inplace(|v| v * request.factor);
        }
        if request.masked {
            flags.apply_mask(&mut data, selector);
        }

        let attributes = provider.band_attributes(&request.source)?;
        if writer.write_f32(&request.name, data.view(), &attributes)? {
            written.push(request.name.clone());
        }
    }

    Ok(written)
}

/// Names the copy stage takes care of, the dispatcher leaves them alone.
pub fn handled_by_copy(name: &str, requests: &[CopyRequest]) -> bool {
    is_wildcard(name) || requests.iter().any(|r| r.name == name)
}

/// Requested names still unique after removing copy-stage names.
pub fn remaining_parameters<'a>(settings: &'a Settings, requests: &[CopyRequest]) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    settings
        .l2w_parameters()
        .iter()
        .map(String::as_str)
        .filter(|name| !handled_by_copy(name, requests))
        .filter(|name| seen.insert(*name))
        .collect()
}
