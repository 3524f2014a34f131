use anyhow::Result;
use image::{GrayImage, Luma, Rgba, RgbaImage};
use imageproc::contrast::{threshold, ThresholdType};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use imageproc::rect::Rect;
use nalgebra::Point2;

use crate::detection::{estimate_corners, moravec, DocumentCorners};
use crate::geometry::{skew_degrees, GridGeometry, SkewEdge, GRID_COLUMNS};
use crate::score::{Category, ItemScore};

/// Rotation fill for pixels with no source mapping. Normalized to
/// `BACKGROUND` before any aggregation looks at the image.
const UNDEFINED: Rgba<u8> = Rgba([0, 0, 0, 0]);
/// Background sentinel: opaque white, contributing zero darkness.
const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

const CORNER_MARKER: Rgba<u8> = Rgba([255, 0, 255, 255]);
const SAMPLED_TINT: Rgba<u8> = Rgba([0, 0, 255, 255]);
const WINNER_FILL: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Side length of the corner markers drawn on the annotated image.
const CORNER_MARKER_SIZE: u32 = 12;

/// Tuning knobs for one scan. The defaults are the values the original
/// sheet geometry was calibrated against; the right skew edge and angle
/// bias depend on the camera setup.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Feature detector window size in pixels.
    pub sensitivity: u32,
    /// Minimum feature response for a pixel to count as a corner candidate.
    pub threshold: u32,
    /// Empirical correction added to the computed skew angle, in degrees.
    pub angle_bias: f64,
    /// Document edge used to compute the skew angle.
    pub skew_edge: SkewEdge,
    /// Optional global binarization cutoff applied before detection.
    pub binarize: Option<u8>,
    pub verbose: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            sensitivity: 5,
            threshold: 500,
            angle_bias: 0.0,
            skew_edge: SkewEdge::Bottom,
            binarize: None,
            verbose: false,
        }
    }
}

/// Result of scanning one sheet.
pub struct ScanReport {
    pub items: Vec<ItemScore>,
    /// Deskewed copy of the input with corners, sampled regions and winning
    /// cells drawn on it.
    pub annotated: RgbaImage,
    /// Skew angle that was measured on the first detection pass, in degrees.
    pub skew_degrees: f64,
}

fn luma(pixel: &Rgba<u8>) -> u8 {
    (0.299 * pixel[0] as f64 + 0.587 * pixel[1] as f64 + 0.114 * pixel[2] as f64) as u8
}

/// Darkness of a pixel: 0 for background and undefined pixels, otherwise
/// distance from white. Any positive darkness counts as ink.
fn darkness(pixel: &Rgba<u8>) -> u64 {
    if pixel[3] == 0 {
        0
    } else {
        255 - luma(pixel) as u64
    }
}

/// Grayscale view for the feature detector; undefined pixels read as white.
fn to_grayscale(image: &RgbaImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut gray = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let pixel = image.get_pixel(x, y);
            let value = if pixel[3] == 0 { 255 } else { luma(pixel) };
            gray.put_pixel(x, y, Luma([value]));
        }
    }
    gray
}

/// Global binarization pre-pass: pixels brighter than `cutoff` become pure
/// white, the rest pure black.
pub fn binarize(image: &RgbaImage, cutoff: u8) -> RgbaImage {
    let bw = threshold(&to_grayscale(image), cutoff, ThresholdType::Binary);
    let (width, height) = bw.dimensions();
    let mut out = RgbaImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let v = bw.get_pixel(x, y)[0];
            out.put_pixel(x, y, Rgba([v, v, v, 255]));
        }
    }
    out
}

/// Force every pixel the rotation left undefined or partially blended to
/// the background sentinel, so interpolation fringes outside the document
/// do not read as ink.
fn normalize_rotation_fill(image: &mut RgbaImage) {
    for pixel in image.pixels_mut() {
        if pixel[3] < 255 {
            *pixel = BACKGROUND;
        }
    }
}

/// Rotate the image clockwise by the rounded skew angle. Angles that round
/// to zero skip the rotation entirely and return an untouched copy.
pub fn deskew(image: &RgbaImage, degrees: f64) -> RgbaImage {
    let rounded = degrees.round() as i32;
    if rounded == 0 {
        return image.clone();
    }
    let mut rotated = rotate_about_center(
        image,
        (rounded as f32).to_radians(),
        Interpolation::Bilinear,
        UNDEFINED,
    );
    normalize_rotation_fill(&mut rotated);
    rotated
}

fn draw_corner_markers(annotated: &mut RgbaImage, corners: &DocumentCorners) {
    let half = (CORNER_MARKER_SIZE / 2) as i64;
    for p in [
        corners.top_left,
        corners.top_right,
        corners.bottom_left,
        corners.bottom_right,
    ] {
        let rect = Rect::at((p.x - half) as i32, (p.y - half) as i32)
            .of_size(CORNER_MARKER_SIZE, CORNER_MARKER_SIZE);
        draw_filled_rect_mut(annotated, rect, CORNER_MARKER);
    }
}

fn draw_interior(annotated: &mut RgbaImage, interior: (i64, i64, i64, i64), color: Rgba<u8>) {
    let (x0, x1, y0, y1) = interior;
    let rect = Rect::at(x0 as i32, y0 as i32).of_size((x1 - x0) as u32, (y1 - y0) as u32);
    draw_filled_rect_mut(annotated, rect, color);
}

/// Scan one category block across all item columns and pick the marked row
/// per column: darkest interior by average wins, with ties (including the
/// all-background case) going to the lowest row index.
pub fn analyze_block(
    image: &RgbaImage,
    annotated: &mut RgbaImage,
    grid: &GridGeometry,
    category: Category,
) -> Vec<usize> {
    let block = grid.block_top_left(category);
    let rows = category.rows();
    let mut winners = Vec::with_capacity(GRID_COLUMNS as usize);

    for column in 0..GRID_COLUMNS {
        let x = block.x + column * grid.cell_width();

        let mut aggregates = vec![0u64; rows];
        for (row, aggregate) in aggregates.iter_mut().enumerate() {
            let y = block.y + row as i64 * grid.cell_height();
            let interior = grid.cell_interior(Point2::new(x, y));
            let (x0, x1, y0, y1) = interior;

            let mut sum: u64 = 0;
            let mut count: u64 = 0;
            for l in y0..y1 {
                for k in x0..x1 {
                    // Background pixels add nothing to the sum but stay in
                    // the denominator: the average is over the full
                    // rectangle, not just the ink.
                    sum += darkness(image.get_pixel(k as u32, l as u32));
                    count += 1;
                }
            }
            *aggregate = sum / count;

            draw_interior(annotated, interior, SAMPLED_TINT);
        }

        let mut winner = 0;
        let mut max_darkness = 0u64;
        for (row, &aggregate) in aggregates.iter().enumerate() {
            if aggregate > max_darkness {
                max_darkness = aggregate;
                winner = row;
            }
        }
        winners.push(winner);

        let y = block.y + winner as i64 * grid.cell_height();
        draw_interior(annotated, grid.cell_interior(Point2::new(x, y)), WINNER_FILL);
    }

    winners
}

/// Run the full pipeline on a loaded sheet photo: locate the document,
/// correct its skew, re-locate the bottom-right corner, then read the
/// marked checkbox of every category block for all ten beer columns.
pub fn scan_sheet(image: &RgbaImage, options: &ScanOptions) -> Result<ScanReport> {
    let working = match options.binarize {
        Some(cutoff) => binarize(image, cutoff),
        None => image.clone(),
    };
    let (width, height) = working.dimensions();

    // First pass: corners of the raw photo, for the skew angle only.
    let map = moravec(&to_grayscale(&working), options.sensitivity, options.threshold);
    let corners = estimate_corners(&map).validate(width, height)?;
    let skew = skew_degrees(&corners, options.skew_edge) + options.angle_bias;

    if options.verbose {
        eprintln!(
            "Corners: tl=({}, {}) tr=({}, {}) bl=({}, {}) br=({}, {})",
            corners.top_left.x,
            corners.top_left.y,
            corners.top_right.x,
            corners.top_right.y,
            corners.bottom_left.x,
            corners.bottom_left.y,
            corners.bottom_right.x,
            corners.bottom_right.y
        );
        eprintln!("Skew: {:.2}° (rounds to {}°)", skew, skew.round() as i32);
    }

    let corrected = deskew(&working, skew);

    // Second pass on the corrected image: the bottom-right corner anchors
    // the grid.
    let map = moravec(
        &to_grayscale(&corrected),
        options.sensitivity,
        options.threshold,
    );
    let corners = estimate_corners(&map).validate(width, height)?;
    let grid = GridGeometry::from_bottom_right(width, height, corners.bottom_right)?;

    if options.verbose {
        eprintln!(
            "Grid: origin=({}, {}) scale={}",
            grid.origin.x, grid.origin.y, grid.scale
        );
    }

    let mut annotated = corrected.clone();
    draw_corner_markers(&mut annotated, &corners);

    let mut items: Vec<ItemScore> = (1..=GRID_COLUMNS as usize).map(ItemScore::new).collect();
    for category in Category::ALL {
        let winners = analyze_block(&corrected, &mut annotated, &grid, category);
        for (item, row) in items.iter_mut().zip(winners) {
            item.set_from_row(category, row)?;
        }
    }

    Ok(ScanReport {
        items,
        annotated,
        skew_degrees: skew,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{CELL_HEIGHT, CELL_WIDTH};

    fn white_sheet(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, BACKGROUND)
    }

    fn ink_cell(image: &mut RgbaImage, grid: &GridGeometry, block: Point2<i64>, column: i64, row: i64, value: u8) {
        let x0 = block.x + column * grid.cell_width();
        let y0 = block.y + row * grid.cell_height();
        for y in y0..y0 + grid.cell_height() {
            for x in x0..x0 + grid.cell_width() {
                image.put_pixel(x as u32, y as u32, Rgba([value, value, value, 255]));
            }
        }
    }

    #[test]
    fn test_darkness_of_sentinels() {
        assert_eq!(darkness(&BACKGROUND), 0);
        assert_eq!(darkness(&UNDEFINED), 0);
        assert_eq!(darkness(&Rgba([0, 0, 0, 255])), 255);
    }

    #[test]
    fn test_deskew_skips_subdegree_angles() {
        let image = white_sheet(50, 50);
        let out = deskew(&image, 0.4);
        assert_eq!(out, image);
        let out = deskew(&image, -0.49);
        assert_eq!(out, image);
    }

    #[test]
    fn test_normalize_fill_clears_undefined_pixels() {
        let mut image = white_sheet(20, 20);
        image.put_pixel(3, 4, UNDEFINED);
        image.put_pixel(5, 6, Rgba([40, 40, 40, 120]));
        normalize_rotation_fill(&mut image);
        assert_eq!(*image.get_pixel(3, 4), BACKGROUND);
        assert_eq!(*image.get_pixel(5, 6), BACKGROUND);
        assert!(image.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn test_binarize_maps_to_pure_black_and_white() {
        let mut image = white_sheet(4, 4);
        image.put_pixel(0, 0, Rgba([100, 100, 100, 255]));
        image.put_pixel(1, 0, Rgba([200, 200, 200, 255]));
        let out = binarize(&image, 128);
        assert_eq!(*out.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
        assert_eq!(*out.get_pixel(1, 0), BACKGROUND);
    }

    #[test]
    fn test_marked_row_wins_its_column() {
        let grid = GridGeometry {
            origin: Point2::new(5, 5),
            scale: 1,
        };
        let width = (5 + GRID_COLUMNS * CELL_WIDTH + 5) as u32;
        let height = (5 + 5 * CELL_HEIGHT + 5) as u32;
        let mut image = white_sheet(width, height);
        let block = grid.block_top_left(Category::Foam);

        ink_cell(&mut image, &grid, block, 0, 2, 0);
        ink_cell(&mut image, &grid, block, 3, 1, 90);

        let mut annotated = image.clone();
        let winners = analyze_block(&image, &mut annotated, &grid, Category::Foam);
        assert_eq!(winners[0], 2);
        assert_eq!(winners[3], 1);
    }

    #[test]
    fn test_all_background_block_selects_row_zero() {
        let grid = GridGeometry {
            origin: Point2::new(0, 0),
            scale: 1,
        };
        let width = (GRID_COLUMNS * CELL_WIDTH) as u32;
        let height = (5 * CELL_HEIGHT) as u32;
        let image = white_sheet(width, height);
        let mut annotated = image.clone();
        let winners = analyze_block(&image, &mut annotated, &grid, Category::Foam);
        assert!(winners.iter().all(|&w| w == 0));
    }

    #[test]
    fn test_equal_aggregates_tie_to_lowest_row() {
        let grid = GridGeometry {
            origin: Point2::new(0, 0),
            scale: 1,
        };
        let width = (GRID_COLUMNS * CELL_WIDTH) as u32;
        let height = (5 * CELL_HEIGHT) as u32;
        let mut image = white_sheet(width, height);
        let block = grid.block_top_left(Category::Foam);

        // Rows 1 and 2 identically inked; strict comparison keeps row 1.
        ink_cell(&mut image, &grid, block, 0, 1, 120);
        ink_cell(&mut image, &grid, block, 0, 2, 120);

        let mut annotated = image.clone();
        let winners = analyze_block(&image, &mut annotated, &grid, Category::Foam);
        assert_eq!(winners[0], 1);
    }

    #[test]
    fn test_overlay_marks_winning_cell() {
        let grid = GridGeometry {
            origin: Point2::new(0, 0),
            scale: 1,
        };
        let width = (GRID_COLUMNS * CELL_WIDTH) as u32;
        let height = (3 * CELL_HEIGHT) as u32;
        let mut image = white_sheet(width, height);
        let block = grid.block_top_left(Category::Foam);
        ink_cell(&mut image, &grid, block, 0, 1, 0);

        let mut annotated = image.clone();
        analyze_block(&image, &mut annotated, &grid, Category::Foam);

        let (x0, _, y0, _) =
            grid.cell_interior(Point2::new(block.x, block.y + grid.cell_height()));
        assert_eq!(*annotated.get_pixel(x0 as u32, y0 as u32), WINNER_FILL);
        // A losing row's interior is tinted, not filled red.
        let (x0, _, y0, _) = grid.cell_interior(Point2::new(block.x, block.y));
        assert_eq!(*annotated.get_pixel(x0 as u32, y0 as u32), SAMPLED_TINT);
    }
}
