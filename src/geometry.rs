use anyhow::{ensure, Result};
use nalgebra::Point2;

use crate::detection::DocumentCorners;
use crate::score::Category;

/// Canonical cell size on the printed sheet, in pixels at scale 1.
pub const CELL_WIDTH: i64 = 61;
pub const CELL_HEIGHT: i64 = 35;

/// Interior margins excluded from sampling, so the printed box outline does
/// not count as ink.
pub const CELL_LEFT_MARGIN: i64 = 10;
pub const CELL_RIGHT_MARGIN: i64 = 10;
pub const CELL_TOP_MARGIN: i64 = 14;
pub const CELL_BOTTOM_MARGIN: i64 = 4;

/// Sheet width in pixels that the cell constants were authored against.
pub const REFERENCE_WIDTH: u32 = 1239;

/// Scored columns per sheet and total cell rows between the grid origin and
/// the bottom-right document corner.
pub const GRID_COLUMNS: i64 = 10;
pub const GRID_ROWS: i64 = 41;

/// Which document edge seeds the skew angle. The bottom edge is the
/// original calibration's choice; which edge works better depends on the
/// camera setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkewEdge {
    Bottom,
    Top,
}

/// Skew of the chosen document edge in degrees, counter-clockwise positive
/// in screen coordinates. A perfectly level edge yields 0.
pub fn skew_degrees(corners: &DocumentCorners, edge: SkewEdge) -> f64 {
    let (left, right) = match edge {
        SkewEdge::Bottom => (corners.bottom_left, corners.bottom_right),
        SkewEdge::Top => (corners.top_left, corners.top_right),
    };
    let dx = (right.x - left.x) as f64;
    // Screen y grows downward; negate so an edge rising to the right is a
    // positive angle.
    let dy = -((right.y - left.y) as f64);
    dy.atan2(dx).to_degrees()
}

/// Absolute grid placement for one sheet: the top-left pixel of the first
/// cell and the integer DPI scale factor relating the photo to the
/// canonical layout resolution.
#[derive(Debug, Clone, Copy)]
pub struct GridGeometry {
    pub origin: Point2<i64>,
    pub scale: i64,
}

impl GridGeometry {
    /// Anchor the grid to the detected bottom-right document corner. The
    /// full 10-column, 41-row lattice must land inside the image.
    pub fn from_bottom_right(
        width: u32,
        height: u32,
        bottom_right: Point2<i64>,
    ) -> Result<GridGeometry> {
        let scale = ((width / REFERENCE_WIDTH) as i64).max(1);
        let origin = Point2::new(
            bottom_right.x - GRID_COLUMNS * CELL_WIDTH * scale,
            bottom_right.y - GRID_ROWS * CELL_HEIGHT * scale,
        );
        ensure!(
            origin.x >= 0 && origin.y >= 0,
            "boundary detection failed: grid origin {:?} falls outside the image \
             (bottom-right corner {:?}, scale {})",
            (origin.x, origin.y),
            (bottom_right.x, bottom_right.y),
            scale
        );
        ensure!(
            bottom_right.x <= width as i64 && bottom_right.y <= height as i64,
            "boundary detection failed: bottom-right corner {:?} outside {}x{} image",
            (bottom_right.x, bottom_right.y),
            width,
            height
        );
        Ok(GridGeometry { origin, scale })
    }

    pub fn cell_width(&self) -> i64 {
        CELL_WIDTH * self.scale
    }

    pub fn cell_height(&self) -> i64 {
        CELL_HEIGHT * self.scale
    }

    /// Absolute top-left of a category block's first cell.
    pub fn block_top_left(&self, category: Category) -> Point2<i64> {
        Point2::new(
            self.origin.x,
            self.origin.y + category.block_offset() * self.cell_height(),
        )
    }

    /// Interior sampling rectangle of the cell whose top-left is given, as
    /// half-open pixel ranges (x0..x1, y0..y1) with the margins excluded.
    pub fn cell_interior(&self, cell_top_left: Point2<i64>) -> (i64, i64, i64, i64) {
        let x0 = cell_top_left.x + CELL_LEFT_MARGIN * self.scale;
        let x1 = cell_top_left.x + (CELL_WIDTH - CELL_RIGHT_MARGIN) * self.scale;
        let y0 = cell_top_left.y + CELL_TOP_MARGIN * self.scale;
        let y1 = cell_top_left.y + (CELL_HEIGHT - CELL_BOTTOM_MARGIN) * self.scale;
        (x0, x1, y0, y1)
    }
}
