use clap::Parser;
use std::path::PathBuf;

use crate::geometry::SkewEdge;
use crate::scan::ScanOptions;

#[derive(Parser, Debug)]
#[command(name = "brewscan")]
#[command(version, about = "Read the marked checkboxes off a photographed beer tasting scorecard")]
pub struct Cli {
    /// Input photo of the scorecard
    #[arg(required = true)]
    pub input: PathBuf,

    /// Annotated output image path [default: output.jpg next to the input]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Feature detector window size in pixels
    #[arg(long, default_value_t = 5)]
    pub sensitivity: u32,

    /// Minimum feature response for a pixel to count as a corner candidate
    #[arg(long, default_value_t = 500)]
    pub threshold: u32,

    /// Degrees added to the measured skew angle (scanner calibration)
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub angle_bias: f64,

    /// Document edge used to measure skew ("bottom" or "top")
    #[arg(long, default_value = "bottom", value_parser = parse_skew_edge)]
    pub skew_edge: SkewEdge,

    /// Binarize at this brightness cutoff (0-255) before detection
    #[arg(long)]
    pub binarize: Option<u8>,

    /// Show detection details
    #[arg(long)]
    pub verbose: bool,
}

impl Cli {
    pub fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let parent = self.input.parent().unwrap_or(std::path::Path::new("."));
            parent.join("output.jpg")
        })
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            sensitivity: self.sensitivity,
            threshold: self.threshold,
            angle_bias: self.angle_bias,
            skew_edge: self.skew_edge,
            binarize: self.binarize,
            verbose: self.verbose,
        }
    }
}

fn parse_skew_edge(s: &str) -> Result<SkewEdge, String> {
    match s {
        "bottom" => Ok(SkewEdge::Bottom),
        "top" => Ok(SkewEdge::Top),
        other => Err(format!("Invalid skew edge '{}', expected bottom or top", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_defaults_next_to_input() {
        let cli = Cli::parse_from(["brewscan", "photos/input3.jpg"]);
        assert_eq!(cli.output_path(), PathBuf::from("photos/output.jpg"));
    }

    #[test]
    fn test_skew_edge_parsing() {
        assert_eq!(parse_skew_edge("top"), Ok(SkewEdge::Top));
        assert!(parse_skew_edge("left").is_err());
    }
}
