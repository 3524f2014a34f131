use anyhow::{bail, ensure, Result};
use image::GrayImage;
use nalgebra::{Point2, Vector2};

/// Per-pixel feature response grid, same extents as the analyzed image.
/// A cell with a positive score is a candidate corner pixel.
pub struct CornernessMap {
    width: u32,
    height: u32,
    scores: Vec<u32>,
}

impl CornernessMap {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            scores: vec![0; (width * height) as usize],
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn get(&self, x: u32, y: u32) -> u32 {
        self.scores[(y * self.width + x) as usize]
    }

    fn set(&mut self, x: u32, y: u32, score: u32) {
        self.scores[(y * self.width + x) as usize] = score;
    }
}

/// Moravec corner response: for each pixel, the minimum over the eight
/// shift directions of the sum of squared window differences. Responses at
/// or below `threshold` are suppressed to zero, responses beyond `u32::MAX`
/// saturate. `window` is the full window width; border pixels the window
/// does not fit around score zero.
pub fn moravec(gray: &GrayImage, window: u32, threshold: u32) -> CornernessMap {
    const SHIFTS: [(i64, i64); 8] = [
        (-1, -1),
        (0, -1),
        (1, -1),
        (-1, 0),
        (1, 0),
        (-1, 1),
        (0, 1),
        (1, 1),
    ];

    let (width, height) = gray.dimensions();
    let mut map = CornernessMap::new(width, height);
    let r = (window / 2).max(1) as i64;
    let margin = r + 1;
    if (width as i64) <= 2 * margin || (height as i64) <= 2 * margin {
        return map;
    }

    let data = gray.as_raw();
    let at = |x: i64, y: i64| -> i64 { data[y as usize * width as usize + x as usize] as i64 };

    for y in margin..height as i64 - margin {
        for x in margin..width as i64 - margin {
            let mut response = u64::MAX;
            for (dx, dy) in SHIFTS {
                // Summed in u64: a wide window times the maximum squared
                // difference does not fit in u32.
                let mut ssd: u64 = 0;
                for v in -r..=r {
                    for u in -r..=r {
                        let diff = at(x + u + dx, y + v + dy) - at(x + u, y + v);
                        ssd += (diff * diff) as u64;
                    }
                }
                response = response.min(ssd);
            }
            if response > threshold as u64 {
                map.set(x as u32, y as u32, response.min(u32::MAX as u64) as u32);
            }
        }
    }

    map
}

/// Corner estimates from one pass over a cornerness map. A corner is absent
/// when no candidate pixel existed on that side of the document.
#[derive(Debug, Clone, Default)]
pub struct CornerEstimates {
    pub top_left: Option<Point2<i64>>,
    pub top_right: Option<Point2<i64>>,
    pub bottom_left: Option<Point2<i64>>,
    pub bottom_right: Option<Point2<i64>>,
}

/// All four document corners, validated against the image extents.
#[derive(Debug, Clone, Copy)]
pub struct DocumentCorners {
    pub top_left: Point2<i64>,
    pub top_right: Point2<i64>,
    pub bottom_left: Point2<i64>,
    pub bottom_right: Point2<i64>,
}

fn distance(p: Point2<i64>, reference: (i64, i64)) -> f64 {
    Vector2::new((p.x - reference.0) as f64, (p.y - reference.1) as f64).norm()
}

/// Streaming arg-min over the four image corners: every candidate pixel is
/// compared against each geometric corner and replaces the running estimate
/// only on a strictly smaller Euclidean distance, so the first candidate
/// encountered in scan order wins ties.
pub fn estimate_corners(map: &CornernessMap) -> CornerEstimates {
    let (width, height) = map.dimensions();
    let (w, h) = (width as i64, height as i64);
    let references = [(0, 0), (w, 0), (0, h), (w, h)];

    let mut estimates = CornerEstimates::default();
    let mut best = [f64::INFINITY; 4];

    for y in 0..height {
        for x in 0..width {
            if map.get(x, y) == 0 {
                continue;
            }
            let candidate = Point2::new(x as i64, y as i64);
            let slots = [
                &mut estimates.top_left,
                &mut estimates.top_right,
                &mut estimates.bottom_left,
                &mut estimates.bottom_right,
            ];
            for ((slot, reference), best) in slots.into_iter().zip(references).zip(&mut best) {
                let d = distance(candidate, reference);
                if d < *best {
                    *slot = Some(candidate);
                    *best = d;
                }
            }
        }
    }

    estimates
}

impl CornerEstimates {
    /// Reject degenerate geometry before it can propagate: all four corners
    /// must exist, lie inside the image, and be pairwise distinct.
    pub fn validate(&self, width: u32, height: u32) -> Result<DocumentCorners> {
        let named = [
            ("top-left", self.top_left),
            ("top-right", self.top_right),
            ("bottom-left", self.bottom_left),
            ("bottom-right", self.bottom_right),
        ];

        let mut points = [Point2::new(0, 0); 4];
        for (slot, (name, estimate)) in points.iter_mut().zip(named) {
            let Some(p) = estimate else {
                bail!("boundary detection failed: no {} corner candidate", name);
            };
            ensure!(
                p.x >= 0 && p.x < width as i64 && p.y >= 0 && p.y < height as i64,
                "boundary detection failed: {} corner {:?} outside {}x{} image",
                name,
                (p.x, p.y),
                width,
                height
            );
            *slot = p;
        }

        for i in 0..4 {
            for j in i + 1..4 {
                ensure!(
                    points[i] != points[j],
                    "boundary detection failed: {} and {} corners coincide at {:?}",
                    named[i].0,
                    named[j].0,
                    (points[i].x, points[i].y)
                );
            }
        }

        Ok(DocumentCorners {
            top_left: points[0],
            top_right: points[1],
            bottom_left: points[2],
            bottom_right: points[3],
        })
    }
}
