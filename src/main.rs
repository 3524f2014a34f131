use anyhow::{Context, Result};
use clap::Parser;
use image::{DynamicImage, ImageReader};

use brewscan::{scan_sheet, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load input image
    let img = ImageReader::open(&cli.input)
        .with_context(|| format!("Failed to open input file: {:?}", cli.input))?
        .decode()
        .with_context(|| format!("Failed to decode image: {:?}", cli.input))?;
    let rgba = img.to_rgba8();

    if cli.verbose {
        eprintln!(
            "Loaded image: {:?} ({}x{})",
            cli.input,
            rgba.width(),
            rgba.height()
        );
    }

    let report = scan_sheet(&rgba, &cli.scan_options()).context("Failed to scan the scorecard")?;

    for item in &report.items {
        println!("{}", item);
    }

    // JPEG output has no alpha channel
    let annotated = DynamicImage::ImageRgba8(report.annotated).to_rgb8();
    let output_path = cli.output_path();
    annotated
        .save(&output_path)
        .with_context(|| format!("Failed to save output: {:?}", output_path))?;

    if cli.verbose {
        eprintln!(
            "Saved annotated image: {:?} (measured skew {:.2}°)",
            output_path, report.skew_degrees
        );
    }

    Ok(())
}
