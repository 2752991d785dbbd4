//! Band catalogs and nearest-wavelength matching.

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub wavelength: u32,
    pub name: String,
}

/// A band chosen for a requested wavelength.
#[derive(Debug, Clone, PartialEq)]
pub struct BandMatch {
    pub wavelength: u32,
    pub name: String,
    /// Absolute distance between the requested and selected wavelength (nm).
    pub offset: f64,
}

/// Ordered (wavelength, band name) pairs for one reflectance domain.
///
/// Entries keep insertion order. Nothing requires them to be sorted, ties in
/// [`BandCatalog::closest`] go to the earliest entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BandCatalog {
    entries: Vec<CatalogEntry>,
}

impl BandCatalog {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, wavelength: u32, name: impl Into<String>) {
        self.entries.push(CatalogEntry {
            wavelength,
            name: name.into(),
        });
    }

    /// Orders entries by wavelength. Equal wavelengths keep their order.
    pub fn sort_by_wavelength(&mut self) {
        self.entries.sort_by_key(|e| e.wavelength);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    pub fn wavelengths(&self) -> Vec<u32> {
        self.entries.iter().map(|e| e.wavelength).collect()
    }

    /// Band whose wavelength is closest to `target`.
    pub fn closest(&self, target: f64) -> Result<BandMatch> {
        let mut best: Option<(&CatalogEntry, f64)> = None;

        for entry in &self.entries {
            let offset = (entry.wavelength as f64 - target).abs();
            // Strict comparison keeps the first of equally distant entries
            if best.is_none_or(|(_, best_offset)| offset < best_offset) {
                best = Some((entry, offset));
            }
        }

        best.map(|(entry, offset)| BandMatch {
            wavelength: entry.wavelength,
            name: entry.name.clone(),
            offset,
        })
        .ok_or(Error::EmptyCatalog { target })
    }

    /// Closest band, or `None` when the catalog is empty or the best match is
    /// further than `tolerance` from `target`.
    pub fn within(&self, target: f64, tolerance: f64) -> Option<BandMatch> {
        self.closest(target)
            .ok()
            .filter(|band| band.offset <= tolerance)
    }

    /// Band with exactly this nominal wavelength.
    pub fn exact(&self, wavelength: u32) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.wavelength == wavelength)
    }
}
