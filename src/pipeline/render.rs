//! Table rendering: a table block's cell children → HTML markup.
//!
//! This is the inverse of [`crate::pipeline::grid`]: rendering a grid and
//! reconstructing the result yields the same cells. The table prompt embeds
//! this markup so the model corrects the structure we already have instead
//! of transcribing the table from scratch.

use crate::pipeline::grid::GridCell;
use crate::schema::{BlockId, BlockType, Page, TableCell};
use std::collections::BTreeMap;

impl From<&TableCell> for GridCell {
    fn from(c: &TableCell) -> Self {
        GridCell {
            row: c.row_id,
            col: c.col_id,
            rowspan: c.rowspan,
            colspan: c.colspan,
            is_header: c.is_header,
            text: c.text.clone(),
        }
    }
}

/// Cells of a table block, in structure order.
pub fn table_cells(page: &Page, table: BlockId) -> Vec<&TableCell> {
    page.contained_blocks(table, &[BlockType::TableCell])
        .into_iter()
        .filter_map(|b| b.cell.as_ref())
        .collect()
}

/// Render a table block as HTML.
///
/// A table without cells renders its raw text as a single cell so the model
/// still sees what was recognised; an entirely empty block renders as an
/// empty table.
pub fn render_table(page: &Page, table: BlockId) -> String {
    let cells: Vec<GridCell> = table_cells(page, table)
        .into_iter()
        .map(GridCell::from)
        .collect();
    if !cells.is_empty() {
        return render_cells(&cells);
    }
    let text = page.raw_text(table);
    if text.trim().is_empty() {
        "<table></table>".to_string()
    } else {
        format!("<table><tr><td>{}</td></tr></table>", escape_cell_text(text.trim()))
    }
}

/// Render placed cells as `<table>` markup, one `<tr>` per grid row.
///
/// Rows covered entirely by rowspans from above are emitted as empty `<tr>`
/// elements so row indices survive a round trip.
pub fn render_cells(cells: &[GridCell]) -> String {
    let n_rows = cells.iter().map(|c| c.row + c.rowspan.max(1)).max().unwrap_or(0);
    let mut by_row: BTreeMap<usize, Vec<&GridCell>> = BTreeMap::new();
    for cell in cells {
        by_row.entry(cell.row).or_default().push(cell);
    }

    let mut html = String::from("<table>");
    for row in 0..n_rows {
        html.push_str("<tr>");
        if let Some(row_cells) = by_row.get_mut(&row) {
            row_cells.sort_by_key(|c| c.col);
            for cell in row_cells.iter() {
                let tag = if cell.is_header { "th" } else { "td" };
                html.push('<');
                html.push_str(tag);
                if cell.rowspan > 1 {
                    html.push_str(&format!(" rowspan=\"{}\"", cell.rowspan));
                }
                if cell.colspan > 1 {
                    html.push_str(&format!(" colspan=\"{}\"", cell.colspan));
                }
                html.push('>');
                html.push_str(&escape_cell_text(&cell.text));
                html.push_str("</");
                html.push_str(tag);
                html.push('>');
            }
        }
        html.push_str("</tr>");
    }
    html.push_str("</table>");
    html
}

fn escape_cell_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\n' => out.push_str("<br>"),
            c => out.push(c),
        }
    }
    out
}
