//! Structure commit: swap a table's children for freshly built cells.
//!
//! Everything fallible (parsing, validation, geometry) happens before this
//! point; by the time [`commit_cells`] runs the new blocks are fully built,
//! so the swap either happens completely or, if the table cannot be found,
//! not at all.

use crate::pipeline::geometry::{cell_polygon, CellGeometry};
use crate::pipeline::grid::GridReconstruction;
use crate::schema::{Block, BlockId, Page, TableCell};
use tracing::debug;

/// Build one `TableCell` block per reconstructed cell, in emission order.
pub fn build_cell_blocks(
    page_id: usize,
    table: &Block,
    grid: &GridReconstruction,
    geometry: CellGeometry,
) -> Vec<Block> {
    grid.cells
        .iter()
        .map(|c| {
            let polygon = cell_polygon(&table.polygon, c, (grid.rows, grid.cols), geometry);
            Block::table_cell(
                page_id,
                polygon,
                TableCell {
                    row_id: c.row,
                    col_id: c.col,
                    rowspan: c.rowspan,
                    colspan: c.colspan,
                    is_header: c.is_header,
                    text: c.text.clone(),
                },
            )
        })
        .collect()
}

/// Register `cells` in `page` and make them the children of `table`.
///
/// Previous children are detached but stay in the page table. Returns the
/// new child ids, or `None` (with `page` untouched) when `table` is not on
/// this page.
pub fn commit_cells(page: &mut Page, table: BlockId, cells: Vec<Block>) -> Option<Vec<BlockId>> {
    page.get_block(table)?;

    let ids: Vec<BlockId> = cells
        .into_iter()
        .map(|cell| page.add_full_block(cell))
        .collect();

    let block = page.get_block_mut(table)?;
    let detached = std::mem::replace(&mut block.structure, ids.clone());
    debug!(
        "Block {}: committed {} cells, detached {} children",
        table,
        ids.len(),
        detached.len()
    );
    Some(ids)
}
