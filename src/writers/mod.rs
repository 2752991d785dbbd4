//! Output side: a [`ProductSink`] receives one named raster at a time and
//! [`ProductWriter`] enforces write-once names on top of it.
use std::collections::{BTreeMap, HashSet};

use ndarray::ArrayView2;
use tracing::info;

use crate::error::Result;

pub mod geotiff;
pub mod memory;

pub use geotiff::GeoTiffSink;
pub use memory::MemorySink;

#[derive(Debug, Clone, Copy)]
pub enum RasterData<'a> {
    Float32(ArrayView2<'a, f32>),
    Int32(ArrayView2<'a, i32>),
}

impl RasterData<'_> {
    pub fn dim(&self) -> (usize, usize) {
        match self {
            RasterData::Float32(data) => data.dim(),
            RasterData::Int32(data) => data.dim(),
        }
    }
}

/// One dataset handed to a sink.
#[derive(Debug, Clone, Copy)]
pub struct OutputRecord<'a> {
    pub name: &'a str,
    pub data: RasterData<'a>,
    pub attributes: &'a BTreeMap<String, String>,
    pub global: &'a BTreeMap<String, String>,
    /// First record of a fresh output, the sink drops the datasets it wrote
    /// before.
    pub new: bool,
}

pub trait ProductSink {
    /// Names of the datasets already present in the output.
    fn dataset_names(&self) -> Result<Vec<String>>;

    fn write(&mut self, record: OutputRecord<'_>) -> Result<()>;
}

/// Append-only view of a sink for one run.
pub struct ProductWriter<'a, S: ProductSink> {
    sink: &'a mut S,
    global: BTreeMap<String, String>,
    written: HashSet<String>,
    new: bool,
}

impl<'a, S: ProductSink> ProductWriter<'a, S> {
    /// With `new_file` the output is started from scratch, otherwise the
    /// datasets it already holds are kept and never rewritten.
    pub fn open(sink: &'a mut S, global: BTreeMap<String, String>, new_file: bool) -> Result<Self> {
        let written = if new_file {
            HashSet::new()
        } else {
            sink.dataset_names()?
                .into_iter()
                .map(|name| name.to_lowercase())
                .collect()
        };

        Ok(Self {
            sink,
            global,
            written,
            new: new_file,
        })
    }

    /// Dataset names compare case-insensitively.
    pub fn contains(&self, name: &str) -> bool {
        self.written.contains(&name.to_lowercase())
    }

    /// Returns false when the name is already in the output.
    pub fn write_f32(
        &mut self,
        name: &str,
        data: ArrayView2<'_, f32>,
        attributes: &BTreeMap<String, String>,
    ) -> Result<bool> {
        self.write(name, RasterData::Float32(data.reborrow()), attributes)
    }

    pub fn write_i32(
        &mut self,
        name: &str,
        data: ArrayView2<'_, i32>,
        attributes: &BTreeMap<String, String>,
    ) -> Result<bool> {
        self.write(name, RasterData::Int32(data.reborrow()), attributes)
    }

    fn write<'b>(
        &'b mut self,
        name: &'b str,
        data: RasterData<'b>,
        attributes: &'b BTreeMap<String, String>,
    ) -> Result<bool> {
        if self.contains(name) {
            return Ok(false);
        }

        info!("Writing {}", name);
        self.sink.write(OutputRecord {
            name,
            data,
            attributes,
            global: &self.global,
            new: self.new,
        })?;

        self.new = false;
        self.written.insert(name.to_lowercase());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_names_are_written_once() {
        let mut sink = MemorySink::default();
        let data = Array2::<f32>::zeros((2, 2));
        let attributes = BTreeMap::new();

        let mut writer = ProductWriter::open(&mut sink, BTreeMap::new(), true).unwrap();
        assert!(writer.write_f32("ndvi", data.view(), &attributes).unwrap());
        assert!(!writer.write_f32("NDVI", data.view(), &attributes).unwrap());
        assert!(writer.contains("Ndvi"));

        assert_eq!(sink.names(), vec!["ndvi"]);
    }

    #[test]
    fn test_existing_datasets_are_kept() {
        let mut sink = MemorySink::default();
        let data = Array2::<f32>::ones((2, 2));
        let attributes = BTreeMap::new();

        let mut writer = ProductWriter::open(&mut sink, BTreeMap::new(), true).unwrap();
        writer.write_f32("chl_oc3", data.view(), &attributes).unwrap();

        let mut writer = ProductWriter::open(&mut sink, BTreeMap::new(), false).unwrap();
        assert!(writer.contains("chl_oc3"));
        assert!(!writer.write_f32("chl_oc3", data.view(), &attributes).unwrap());
        assert!(writer.write_f32("ndci", data.view(), &attributes).unwrap());

        assert_eq!(sink.names(), vec!["chl_oc3", "ndci"]);
    }

    #[test]
    fn test_new_output_replaces_sink_contents() {
        let mut sink = MemorySink::default();
        let data = Array2::<f32>::ones((2, 2));
        let attributes = BTreeMap::new();

        let mut writer = ProductWriter::open(&mut sink, BTreeMap::new(), true).unwrap();
        writer.write_f32("fai", data.view(), &attributes).unwrap();

        let mut writer = ProductWriter::open(&mut sink, BTreeMap::new(), true).unwrap();
        writer.write_f32("ndvi", data.view(), &attributes).unwrap();

        assert_eq!(sink.names(), vec!["ndvi"]);
    }
}
