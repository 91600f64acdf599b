use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use rust_photo_loupe::{app, config::Configuration, logging};

/// GPU-accelerated pan/zoom loupe for very large still images.
#[derive(Debug, Parser)]
#[command(name = "rust-photo-loupe", version, about = "Pan/zoom viewer for very large images")]
struct Args {
    /// Image to open
    #[arg(value_name = "IMAGE")]
    image: PathBuf,

    /// Optional YAML viewer configuration
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    logging::init();
    let Args { image, config } = Args::parse();

    let configuration = match config {
        Some(path) => Configuration::from_yaml_file(&path)?,
        None => Configuration::default(),
    }
    .validated()?;

    app::run_viewer(configuration, image)
}
