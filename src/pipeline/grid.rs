//! Grid reconstruction: HTML table markup → positioned cell records.
//!
//! The model returns whatever table markup it likes: merged cells, ragged
//! rows, spans that run off the edge, the odd stray `<b>`. This module turns
//! that into a set of cells with a resolved top-left anchor and clipped
//! spans such that no two footprints overlap and every footprint lies inside
//! the grid.
//!
//! ## Algorithm
//!
//! 1. Rows = number of `<tr>` elements. Columns = the widest row, measured
//!    as the sum of its declared colspans.
//! 2. An occupancy grid (rows × columns) starts all free.
//! 3. Rows top to bottom, cells left to right, with a per-row column cursor:
//!    the cursor skips columns already claimed by an earlier rowspan; a row
//!    whose cursor runs off the right edge loses its remaining cells; spans
//!    are clipped to the grid edge and to the first claimed slot in their
//!    way (first writer wins); a span that clips to zero drops the cell.
//!
//! Dropped cells are reported as [`StructuralWarning`]s, never as errors.
//! The sweep is O(rows × columns + cells) and fully deterministic.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Node, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// HTML caps `colspan` at 1000 and `rowspan` at 65534. The grid itself is
/// never wider than `MAX_COLSPAN` columns.
const MAX_COLSPAN: usize = 1000;
const MAX_ROWSPAN: usize = 65534;

static TABLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("table").unwrap());

/// A cell as declared in the markup, before placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupCell {
    pub rowspan: usize,
    pub colspan: usize,
    pub is_header: bool,
    pub text: String,
}

impl MarkupCell {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            rowspan: 1,
            colspan: 1,
            is_header: false,
            text: text.into(),
        }
    }

    pub fn spans(mut self, rowspan: usize, colspan: usize) -> Self {
        self.rowspan = rowspan;
        self.colspan = colspan;
        self
    }

    pub fn header(mut self) -> Self {
        self.is_header = true;
        self
    }
}

/// A placed cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridCell {
    pub row: usize,
    pub col: usize,
    pub rowspan: usize,
    pub colspan: usize,
    pub is_header: bool,
    pub text: String,
}

/// A cell that could not be placed as declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructuralWarning {
    /// The row ran out of columns; `dropped` trailing cells were discarded.
    ColumnOverflow { row: usize, dropped: usize },
    /// The cell's span clipped to zero and it was discarded.
    EmptySpan { row: usize, col: usize },
    /// The cell's span ran into slots claimed by an earlier cell and was cut.
    SpanClipped { row: usize, col: usize },
}

/// Result of [`reconstruct`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridReconstruction {
    pub rows: usize,
    pub cols: usize,
    pub cells: Vec<GridCell>,
    pub warnings: Vec<StructuralWarning>,
}

impl GridReconstruction {
    /// Total characters of cell text.
    pub fn text_len(&self) -> usize {
        self.cells.iter().map(|c| c.text.chars().count()).sum()
    }
}

/// Parse `markup` and place its cells on a grid.
///
/// The first `<table>` in the markup is used; markup without one yields an
/// empty reconstruction.
pub fn reconstruct(markup: &str) -> GridReconstruction {
    let rows = parse_table(markup);
    place_cells(&rows)
}

/// Extract rows of declared cells from the first table in `markup`.
pub fn parse_table(markup: &str) -> Vec<Vec<MarkupCell>> {
    let fragment = Html::parse_fragment(markup);
    let Some(table) = fragment.select(&TABLE_SELECTOR).next() else {
        debug!("No <table> element in markup ({} bytes)", markup.len());
        return Vec::new();
    };

    direct_rows(table)
        .into_iter()
        .map(|row| {
            direct_cells(row)
                .into_iter()
                .map(|cell| MarkupCell {
                    rowspan: span_attr(cell, "rowspan", MAX_ROWSPAN),
                    colspan: span_attr(cell, "colspan", MAX_COLSPAN),
                    is_header: cell.value().name() == "th",
                    text: cell_text(cell),
                })
                .collect()
        })
        .collect()
}

/// Place declared cells row-major on an occupancy grid.
pub fn place_cells(rows: &[Vec<MarkupCell>]) -> GridReconstruction {
    let n_rows = rows.len();
    let n_cols = rows
        .iter()
        .map(|r| r.iter().map(|c| c.colspan).fold(0usize, usize::saturating_add))
        .max()
        .unwrap_or(0)
        .min(MAX_COLSPAN);

    let mut occupied = vec![vec![false; n_cols]; n_rows];
    let mut cells = Vec::new();
    let mut warnings = Vec::new();

    for (i, row) in rows.iter().enumerate() {
        let mut cursor = 0;
        for (j, cell) in row.iter().enumerate() {
            while cursor < n_cols && occupied[i][cursor] {
                cursor += 1;
            }
            if cursor >= n_cols {
                let dropped = row.len() - j;
                warn!(
                    "Table parsing warning: too many columns in row {} ({} cell(s) dropped)",
                    i, dropped
                );
                warnings.push(StructuralWarning::ColumnOverflow { row: i, dropped });
                break;
            }

            let rowspan = cell.rowspan.min(n_rows - i);
            let colspan = cell.colspan.min(n_cols - cursor);
            if rowspan == 0 || colspan == 0 {
                warn!(
                    "Table parsing warning: invalid span at row {} col {} (rowspan {}, colspan {})",
                    i, cursor, cell.rowspan, cell.colspan
                );
                warnings.push(StructuralWarning::EmptySpan { row: i, col: cursor });
                continue;
            }

            // First writer wins: stop the span at the first claimed slot.
            let free_cols = occupied[i][cursor..cursor + colspan]
                .iter()
                .take_while(|taken| !**taken)
                .count();
            let free_rows = (i..i + rowspan)
                .take_while(|&r| !occupied[r][cursor..cursor + free_cols].iter().any(|t| *t))
                .count();
            if free_cols < colspan || free_rows < rowspan {
                debug!(
                    "Cell at row {} col {} clipped from {}x{} to {}x{}",
                    i, cursor, rowspan, colspan, free_rows, free_cols
                );
                warnings.push(StructuralWarning::SpanClipped { row: i, col: cursor });
            }
            let (rowspan, colspan) = (free_rows, free_cols);

            for slots in occupied.iter_mut().skip(i).take(rowspan) {
                for slot in &mut slots[cursor..cursor + colspan] {
                    *slot = true;
                }
            }

            cells.push(GridCell {
                row: i,
                col: cursor,
                rowspan,
                colspan,
                is_header: cell.is_header,
                text: cell.text.clone(),
            });
            cursor += colspan;
        }
    }

    GridReconstruction {
        rows: n_rows,
        cols: n_cols,
        cells,
        warnings,
    }
}

/// `<tr>` children of the table, including those inside row groups.
///
/// Rows of nested tables are not included.
fn direct_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let mut rows = Vec::new();
    for child in table.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => rows.extend(
                child
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|e| e.value().name() == "tr"),
            ),
            _ => {}
        }
    }
    rows
}

fn direct_cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|e| matches!(e.value().name(), "td" | "th"))
        .collect()
}

/// Leading digits of a span attribute; missing or unparsable means 1.
fn span_attr(cell: ElementRef<'_>, name: &str, cap: usize) -> usize {
    cell.value()
        .attr(name)
        .and_then(|v| {
            let digits: String = v.trim().chars().take_while(char::is_ascii_digit).collect();
            digits.parse::<usize>().ok()
        })
        .unwrap_or(1)
        .min(cap)
}

/// Cell text with `<br>` kept as `\n` and every other tag reduced to its text.
fn cell_text(cell: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(cell, &mut out);
    out.trim().to_string()
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(e) if e.name() == "br" => out.push('\n'),
            Node::Element(_) => {
                if let Some(el) = ElementRef::wrap(child) {
                    collect_text(el, out);
                }
            }
            _ => {}
        }
    }
}
