use std::collections::BTreeMap;

use ndarray::Array2;

use super::{OutputRecord, ProductSink, RasterData};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub enum StoredRaster {
    Float32(Array2<f32>),
    Int32(Array2<i32>),
}

#[derive(Debug, Clone)]
pub struct StoredDataset {
    pub name: String,
    pub data: StoredRaster,
    pub attributes: BTreeMap<String, String>,
}

/// Sink keeping every dataset in memory, in write order.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    datasets: Vec<StoredDataset>,
    global: BTreeMap<String, String>,
}

impl MemorySink {
    pub fn names(&self) -> Vec<&str> {
        self.datasets.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&StoredDataset> {
        self.datasets.iter().find(|d| d.name == name)
    }

    pub fn get_f32(&self, name: &str) -> Option<&Array2<f32>> {
        match self.get(name).map(|d| &d.data) {
            Some(StoredRaster::Float32(data)) => Some(data),
            _ => None,
        }
    }

    pub fn get_i32(&self, name: &str) -> Option<&Array2<i32>> {
        match self.get(name).map(|d| &d.data) {
            Some(StoredRaster::Int32(data)) => Some(data),
            _ => None,
        }
    }

    pub fn attributes(&self, name: &str) -> Option<&BTreeMap<String, String>> {
        self.get(name).map(|d| &d.attributes)
    }

    pub fn global_attributes(&self) -> &BTreeMap<String, String> {
        &self.global
    }
}

impl ProductSink for MemorySink {
    fn dataset_names(&self) -> Result<Vec<String>> {
        Ok(self.datasets.iter().map(|d| d.name.clone()).collect())
    }

    fn write(&mut self, record: OutputRecord<'_>) -> Result<()> {
        if record.new {
            self.datasets.clear();
        }

        let data = match record.data {
            RasterData::Float32(data) => StoredRaster::Float32(data.to_owned()),
            RasterData::Int32(data) => StoredRaster::Int32(data.to_owned()),
        };

        self.global = record.global.clone();
        self.datasets.push(StoredDataset {
            name: record.name.to_string(),
            data,
            attributes: record.attributes.clone(),
        });

        Ok(())
    }
}
