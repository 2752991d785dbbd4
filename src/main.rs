use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use l2w::config::Settings;
use l2w::readers::{BandReader, GeoTiffSceneReader};
use l2w::scene::LazyScene;
use l2w::writers::GeoTiffSink;
use l2w::writers::geotiff::ensure_distinct;
use l2w::{L2wProcessor, RunOptions};

#[derive(Parser, Debug)]
#[command(name = "l2w", version, about = "Water-quality parameters from surface reflectance")]
struct Args {
    /// Scene directory with one GeoTIFF per band and a scene.json
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory, one GeoTIFF per dataset
    #[arg(short, long)]
    output: PathBuf,

    /// Settings JSON, defaults apply when omitted
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Keep datasets already in the output and only add missing ones
    #[arg(long)]
    append: bool,

    /// Keep band and parameter rasters in memory until the run ends
    #[arg(long)]
    retain: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let settings = match &args.settings {
        Some(path) => Settings::from_file(path)?,
        None => Settings::default(),
    };

    let reader = GeoTiffSceneReader::open(&args.input)?;
    let projection = reader.projection()?;
    let geotransform = reader.geotransform()?;

    let scene = LazyScene::open(reader, settings.subset())?.retain_bands(args.retain);
    let geotransform = match scene.window() {
        Some(window) => window.geotransform(&geotransform),
        None => geotransform,
    };

    std::fs::create_dir_all(&args.output)?;
    ensure_distinct(&args.input, &args.output)?;
    let mut sink = GeoTiffSink::new(&args.output).with_georeference(geotransform, projection);

    let processor = L2wProcessor::from_settings(settings)?;
    let options = RunOptions {
        new_file: !args.append,
        retain: args.retain,
    };

    info!("Processing {}", args.input.display());
    let summary = processor.run(&scene, &mut sink, options)?;

    println!(
        "Wrote {} datasets to {}",
        summary.written.len(),
        args.output.display()
    );
    for name in &summary.written {
        println!("  {}", name);
    }
    if !summary.skipped.is_empty() {
        println!("Skipped {} parameters", summary.skipped.len());
        for (name, reason) in &summary.skipped {
            println!("  {}: {}", name, reason);
        }
    }

    Ok(())
}
