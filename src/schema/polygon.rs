//! Axis-aligned block geometry.
//!
//! Upstream layout models report a four-point polygon per block. Everything
//! in this crate only ever needs its bounding box, but the full polygon is
//! kept so a round-tripped document is byte-identical to its input.

use serde::{Deserialize, Serialize};

/// A block's bounding shape as four corner points, clockwise from top-left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonBox {
    pub polygon: [[f32; 2]; 4],
}

impl PolygonBox {
    /// Build a rectangle from `[x0, y0, x1, y1]`.
    pub fn from_bbox(bbox: [f32; 4]) -> Self {
        let [x0, y0, x1, y1] = bbox;
        Self {
            polygon: [[x0, y0], [x1, y0], [x1, y1], [x0, y1]],
        }
    }

    /// Tight `[x0, y0, x1, y1]` enclosing all four points.
    pub fn bbox(&self) -> [f32; 4] {
        let xs = self.polygon.iter().map(|p| p[0]);
        let ys = self.polygon.iter().map(|p| p[1]);
        [
            xs.clone().fold(f32::INFINITY, f32::min),
            ys.clone().fold(f32::INFINITY, f32::min),
            xs.fold(f32::NEG_INFINITY, f32::max),
            ys.fold(f32::NEG_INFINITY, f32::max),
        ]
    }

    pub fn width(&self) -> f32 {
        let [x0, _, x1, _] = self.bbox();
        x1 - x0
    }

    pub fn height(&self) -> f32 {
        let [_, y0, _, y1] = self.bbox();
        y1 - y0
    }

    /// Map the polygon from one coordinate space (`old_size`) into another.
    ///
    /// Used to go from page units to rendered-image pixels before cropping.
    pub fn rescale(&self, old_size: (f32, f32), new_size: (f32, f32)) -> Self {
        let sx = if old_size.0 > 0.0 { new_size.0 / old_size.0 } else { 1.0 };
        let sy = if old_size.1 > 0.0 { new_size.1 / old_size.1 } else { 1.0 };
        let mut polygon = self.polygon;
        for p in polygon.iter_mut() {
            p[0] *= sx;
            p[1] *= sy;
        }
        Self { polygon }
    }

    /// Grow the box by a fraction of its own width/height on every side.
    pub fn expand(&self, x_margin: f32, y_margin: f32) -> Self {
        let [x0, y0, x1, y1] = self.bbox();
        let dx = (x1 - x0) * x_margin;
        let dy = (y1 - y0) * y_margin;
        Self::from_bbox([x0 - dx, y0 - dy, x1 + dx, y1 + dy])
    }
}
