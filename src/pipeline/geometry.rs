//! Cell geometry: where a reconstructed cell sits inside its table.
//!
//! The model only returns markup, so there is no measured position for a
//! rebuilt cell. Two approximations are offered through [`CellGeometry`].

use crate::pipeline::grid::GridCell;
use crate::schema::PolygonBox;
use serde::{Deserialize, Serialize};

/// Strategy for assigning a bounding box to a reconstructed cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellGeometry {
    /// Table origin offset by the cell's grid coordinates, one unit per
    /// row/column. Cheap, and what existing downstream consumers expect.
    #[default]
    GridOffset,
    /// The table's bounding box divided evenly into rows × columns.
    Proportional,
}

/// Bounding box for `cell` inside a table occupying `parent`, whose grid is
/// `grid` = (rows, cols).
pub fn cell_polygon(
    parent: &PolygonBox,
    cell: &GridCell,
    grid: (usize, usize),
    geometry: CellGeometry,
) -> PolygonBox {
    let [x0, y0, x1, y1] = parent.bbox();
    let (row, col) = (cell.row as f32, cell.col as f32);
    let (rowspan, colspan) = (cell.rowspan as f32, cell.colspan as f32);

    match geometry {
        CellGeometry::GridOffset => PolygonBox::from_bbox([
            x0 + col,
            y0 + row,
            x0 + col + colspan,
            y0 + row + rowspan,
        ]),
        CellGeometry::Proportional => {
            let (rows, cols) = (grid.0.max(1) as f32, grid.1.max(1) as f32);
            let cw = (x1 - x0) / cols;
            let rh = (y1 - y0) / rows;
            PolygonBox::from_bbox([
                x0 + col * cw,
                y0 + row * rh,
                x0 + (col + colspan) * cw,
                y0 + (row + rowspan) * rh,
            ])
        }
    }
}
