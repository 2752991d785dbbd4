//! One L2W run over a scene: flags, copied datasets, then every requested
//! parameter, each raster written as soon as it exists.

use std::collections::BTreeMap;

use chrono::Utc;
use ndarray::Array2;
use tracing::{debug, info, warn};

use crate::coefficients::Coefficients;
use crate::config::Settings;
use crate::copy::{copy_datasets, copy_list, remaining_parameters};
use crate::error::Result;
use crate::flags::{FLAGS_DATASET, FlagRaster, compute_flags};
use crate::parameters::{Context, Parameter, ParameterError, Skip};
use crate::product::ProductRaster;
use crate::rsr::RsrTable;
use crate::scene::{BandProvider, Domain};
use crate::writers::{ProductSink, ProductWriter};

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Start the output from scratch instead of appending to it.
    pub new_file: bool,
    /// Keep written parameter rasters in the summary.
    pub retain: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            new_file: true,
            retain: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub written: Vec<String>,
    pub skipped: Vec<(String, Skip)>,
    /// Flag raster of the scene, whether or not it was written this run.
    pub flags: Option<Array2<i32>>,
    pub retained: Vec<ProductRaster>,
    /// Reflectance domains the scene should carry but has no bands for.
    pub missing_domains: Vec<Domain>,
}

pub struct L2wProcessor {
    settings: Settings,
    coefficients: Coefficients,
    rsr: Option<RsrTable>,
}

impl L2wProcessor {
    pub fn new(settings: Settings, coefficients: Coefficients, rsr: Option<RsrTable>) -> Self {
        Self {
            settings,
            coefficients,
            rsr,
        }
    }

    /// Loads the coefficient tables and RSR file the settings point to.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let coefficients = match settings.coefficients_dir() {
            Some(dir) => Coefficients::from_dir(dir)?,
            None => Coefficients::builtin()?,
        };
        let rsr = match settings.rsr_file() {
            Some(path) => Some(RsrTable::from_file(path)?),
            None => None,
        };

        Ok(Self::new(settings, coefficients, rsr))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn global_attributes(provider: &dyn BandProvider) -> BTreeMap<String, String> {
        let mut global = provider.attributes().global_attributes();
        global.insert("l2w_processing_time".to_string(), Utc::now().to_rfc3339());
        global.insert(
            "l2w_version".to_string(),
            env!("CARGO_PKG_VERSION").to_string(),
        );
        global
    }

    fn flag_attributes(&self) -> BTreeMap<String, String> {
        let mask = self.settings.mask();
        let exponents = mask.exponents;
        BTreeMap::from([
            ("ds_name".to_string(), FLAGS_DATASET.to_string()),
            ("flag_exponent_swir".to_string(), exponents.swir.to_string()),
            ("flag_exponent_cirrus".to_string(), exponents.cirrus.to_string()),
            ("flag_exponent_toa".to_string(), exponents.toa.to_string()),
            ("flag_exponent_negative".to_string(), exponents.negative.to_string()),
            ("l2w_mask_selector".to_string(), mask.selector().to_string()),
        ])
    }

    pub fn run<S: ProductSink>(
        &self,
        provider: &dyn BandProvider,
        sink: &mut S,
        options: RunOptions,
    ) -> Result<RunSummary> {
        let mask = self.settings.mask();
        let selector = mask.selector();
        let mut summary = RunSummary::default();

        for domain in [Domain::Toa, Domain::Surface] {
            if provider.catalog(domain).is_empty() {
                warn!(
                    "Scene has no {}_ bands, continuing without them",
                    domain.prefix()
                );
                summary.missing_domains.push(domain);
            }
        }

        let mut writer =
            ProductWriter::open(sink, Self::global_attributes(provider), options.new_file)?;

        info!("Computing flags for {}", provider.attributes().sensor);
        let flags = compute_flags(provider, mask)?;
        if writer.write_i32(FLAGS_DATASET, flags.data().view(), &self.flag_attributes())? {
            summary.written.push(FLAGS_DATASET.to_string());
        } else {
            debug!("{} already in output", FLAGS_DATASET);
        }

        let requests = copy_list(provider, &self.settings);
        summary.written.extend(copy_datasets(
            provider,
            &mut writer,
            &requests,
            &flags,
            selector,
        )?);

        let ctx = Context {
            provider,
            coefficients: &self.coefficients,
            rsr: self.rsr.as_ref(),
            flags: &flags,
            selector,
            requested: self.settings.l2w_parameters(),
        };

        for name in remaining_parameters(&self.settings, &requests) {
            match self.run_parameter(name, &ctx, &mut writer, &flags, options, &mut summary) {
                Ok(()) => {}
                Err(ParameterError::Skip(skip)) => {
                    match skip {
                        Skip::AlreadyWritten => debug!("Skipping {}: {}", name, skip),
                        _ => warn!("Skipping {}: {}", name, skip),
                    }
                    summary.skipped.push((name.to_string(), skip));
                }
                Err(ParameterError::Fatal(e)) => return Err(e),
            }
        }

        summary.flags = Some(flags.into_inner());
        Ok(summary)
    }

    fn run_parameter<S: ProductSink>(
        &self,
        name: &str,
        ctx: &Context<'_>,
        writer: &mut ProductWriter<'_, S>,
        flags: &FlagRaster,
        options: RunOptions,
        summary: &mut RunSummary,
    ) -> std::result::Result<(), ParameterError> {
        if writer.contains(name) {
            return Err(Skip::AlreadyWritten.into());
        }

        let parameter = Parameter::parse(name).ok_or(Skip::Unrecognised)?;
        if let Some(expected) = parameter.output_names(ctx)? {
            if !expected.is_empty() && expected.iter().all(|n| writer.contains(n)) {
                return Err(Skip::AlreadyWritten.into());
            }
        }

        debug!("Computing {} ({})", name, parameter.family());

        let products = parameter.compute(ctx)?;
        let mut written = 0;
        for mut product in products {
            if writer.contains(&product.name) {
                debug!("{} already in output", product.name);
                continue;
            }
            if parameter.is_masked() {
                flags.apply_mask(&mut product.data, ctx.selector);
            }

            let attributes = product.attributes.to_metadata();
            if writer.write_f32(&product.name, product.data.view(), &attributes)? {
                written += 1;
                summary.written.push(product.name.clone());
                if options.retain {
                    summary.retained.push(product);
                }
            }
        }

        if written == 0 {
            return Err(Skip::AlreadyWritten.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MaskSettings;
    use crate::scene::{BandCatalog, Scene, SceneAttributes};
    use std::cell::Cell;
    use crate::sensor::Sensor;
    use crate::writers::MemorySink;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn scene() -> Scene {
        let mut scene = Scene::new(
            SceneAttributes::new(Sensor::Landsat8Oli).with_sza(35.0),
            (2, 2),
        );
        // bright SWIR in the top-left pixel
        scene
            .insert_band("rhot_1609", array![[0.2, 0.01], [0.01, 0.01]])
            .unwrap();
        for (wave, value) in [(443, 0.02), (482, 0.018), (561, 0.012), (655, 0.05), (865, 0.15)] {
            scene
                .insert_band(format!("rhos_{}", wave), Array2::from_elem((2, 2), value))
                .unwrap();
        }
        scene
            .insert_band("lon", array![[2.0, 2.1], [2.0, 2.1]])
            .unwrap();
        scene
    }

    fn processor(parameters: &[&str]) -> L2wProcessor {
        let mask = MaskSettings {
            smooth: false,
            ..MaskSettings::default()
        };
        let settings = Settings::new(parameters.iter().map(|p| p.to_string()).collect(), mask);
        L2wProcessor::new(settings, Coefficients::builtin().unwrap(), None)
    }

    #[test]
    fn test_run_order_and_masking() {
        let processor = processor(&["ndvi", "t_nechad", "Rrs_*", "chlorophyll"]);
        let mut sink = MemorySink::default();

        let summary = processor
            .run(&scene(), &mut sink, RunOptions::default())
            .unwrap();

        let names = sink.names();
        assert_eq!(names[0], "l2_flags");
        assert_eq!(names[1], "lon");
        assert!(names.contains(&"Rrs_655"));
        assert!(names.contains(&"TUR_Nechad_655"));
        assert!(names.contains(&"ndvi"));

        // swir test hit the top-left pixel, only masked products lose it
        assert_eq!(sink.get_i32("l2_flags").unwrap()[(0, 0)], 1);
        assert!(sink.get_f32("TUR_Nechad_655").unwrap()[(0, 0)].is_nan());
        assert!(sink.get_f32("TUR_Nechad_655").unwrap()[(1, 1)].is_finite());
        assert!(sink.get_f32("Rrs_655").unwrap()[(0, 0)].is_nan());
        assert_relative_eq!(sink.get_f32("ndvi").unwrap()[(0, 0)], 0.5, epsilon = 1e-6);

        assert_eq!(
            summary.skipped,
            vec![("chlorophyll".to_string(), Skip::Unrecognised)]
        );
        assert_eq!(summary.flags.unwrap()[(0, 0)], 1);
        assert!(summary.retained.is_empty());
        assert!(summary.missing_domains.is_empty());

        let global = sink.global_attributes();
        assert_eq!(global["sensor"], "L8_OLI");
        assert!(global.contains_key("l2w_processing_time"));
        assert_eq!(global["l2w_version"], env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_second_run_writes_nothing() {
        let processor = processor(&["ndvi", "t_nechad", "qaa", "fai"]);
        let mut sink = MemorySink::default();
        let scene = scene();

        let first = processor
            .run(&scene, &mut sink, RunOptions::default())
            .unwrap();
        assert!(first.written.len() > 3);
        // no SWIR band within tolerance for fai
        assert_eq!(first.skipped.len(), 1);

        let count = sink.names().len();
        let options = RunOptions {
            new_file: false,
            retain: false,
        };
        let second = processor.run(&scene, &mut sink, options).unwrap();

        assert!(second.written.is_empty());
        assert_eq!(sink.names().len(), count);
        assert!(second
            .skipped
            .iter()
            .filter(|(name, _)| name != "fai")
            .all(|(_, skip)| *skip == Skip::AlreadyWritten));
    }

    /// Counts band reads of the wrapped scene.
    struct CountingScene {
        scene: Scene,
        reads: Cell<usize>,
    }

    impl BandProvider for CountingScene {
        fn attributes(&self) -> &SceneAttributes {
            self.scene.attributes()
        }

        fn shape(&self) -> (usize, usize) {
            self.scene.shape()
        }

        fn catalog(&self, domain: Domain) -> &BandCatalog {
            self.scene.catalog(domain)
        }

        fn has_band(&self, name: &str) -> bool {
            self.scene.has_band(name)
        }

        fn band(&self, name: &str) -> Result<Array2<f32>> {
            self.reads.set(self.reads.get() + 1);
            self.scene.band(name)
        }

        fn band_attributes(&self, name: &str) -> Result<BTreeMap<String, String>> {
            self.scene.band_attributes(name)
        }
    }

    #[test]
    fn test_append_skips_written_inversions() {
        let scene = CountingScene {
            scene: scene(),
            reads: Cell::new(0),
        };
        let mut sink = MemorySink::default();
        processor(&["qaa", "p3qaa"])
            .run(&scene, &mut sink, RunOptions::default())
            .unwrap();

        let append = RunOptions {
            new_file: false,
            retain: false,
        };

        scene.reads.set(0);
        processor(&[]).run(&scene, &mut sink, append).unwrap();
        let baseline = scene.reads.get();

        scene.reads.set(0);
        let summary = processor(&["qaa", "p3qaa"])
            .run(&scene, &mut sink, append)
            .unwrap();

        assert_eq!(scene.reads.get(), baseline);
        assert!(summary.written.is_empty());
        assert_eq!(
            summary.skipped,
            vec![
                ("qaa".to_string(), Skip::AlreadyWritten),
                ("p3qaa".to_string(), Skip::AlreadyWritten),
            ]
        );
    }

    #[test]
    fn test_scene_without_toa_bands() {
        let mut scene = Scene::new(SceneAttributes::new(Sensor::Landsat8Oli), (2, 2));
        for (wave, value) in [(655, 0.02), (865, 0.01)] {
            scene
                .insert_band(format!("rhos_{}", wave), Array2::from_elem((2, 2), value))
                .unwrap();
        }
        let mut sink = MemorySink::default();

        let summary = processor(&["ndvi"])
            .run(&scene, &mut sink, RunOptions::default())
            .unwrap();

        assert_eq!(summary.missing_domains, vec![Domain::Toa]);
        assert_eq!(sink.names(), vec!["l2_flags", "ndvi"]);
        assert!(sink.get_i32("l2_flags").unwrap().iter().all(|&f| f == 0));
    }

    #[test]
    fn test_scene_without_surface_bands() {
        let mut scene = Scene::new(SceneAttributes::new(Sensor::Landsat8Oli), (2, 2));
        scene
            .insert_band("rhot_1609", Array2::from_elem((2, 2), 0.01))
            .unwrap();
        let mut sink = MemorySink::default();

        let summary = processor(&["t_nechad"])
            .run(&scene, &mut sink, RunOptions::default())
            .unwrap();

        assert_eq!(summary.missing_domains, vec![Domain::Surface]);
        assert_eq!(sink.names(), vec!["l2_flags"]);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].0, "t_nechad");
    }

    #[test]
    fn test_retain() {
        let processor = processor(&["ndvi"]);
        let mut sink = MemorySink::default();
        let options = RunOptions {
            new_file: true,
            retain: true,
        };

        let summary = processor.run(&scene(), &mut sink, options).unwrap();

        assert_eq!(summary.retained.len(), 1);
        assert_eq!(summary.retained[0].name, "ndvi");
        assert_eq!(summary.retained[0].attributes.waves, vec![655, 865]);
    }
}
