use clap::Parser;
use image::ImageReader;
use log::info;
use std::{error::Error, path::PathBuf};
use waymark::prelude::*;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file, created with defaults if missing.
    #[arg(short, long, default_value = "waymark.json")]
    config: PathBuf,

    /// GeoJSON FeatureCollection holding the mission's landmarks.
    #[arg(short, long)]
    landmarks: PathBuf,

    /// Camera frame to localize.
    #[arg(short, long)]
    image: PathBuf,
}

fn main() -> Result<(), Box<dyn Error>> {
    pretty_env_logger::init();
    let args = Args::parse();

    let config = Config::load_or_create(&args.config)?;
    let provider = GeoJsonProvider::new(&args.landmarks);
    let localizer = Localizer::from_config(&config, &provider);

    let image = ImageReader::open(&args.image)?.decode()?.into_luma8();
    info!(
        "localizing {} ({}x{})",
        args.image.display(),
        image.width(),
        image.height()
    );

    let localization = localizer.localize(&image);
    println!("{}", localization.estimate);
    Ok(())
}
