pub mod cli;
pub mod detection;
pub mod geometry;
pub mod scan;
pub mod score;

pub use cli::Cli;
pub use detection::{estimate_corners, moravec, CornerEstimates, CornernessMap, DocumentCorners};
pub use geometry::{skew_degrees, GridGeometry, SkewEdge};
pub use scan::{analyze_block, binarize, deskew, scan_sheet, ScanOptions, ScanReport};
pub use score::{score_for, Category, ItemScore};
