//! Table correction with grid reconstruction.
//!
//! The table's current cells are rendered to HTML and sent with the table
//! crop. The model either confirms the markup ("No corrections needed.") or
//! returns corrected markup, which is rebuilt into a cell grid.

use crate::config::CorrectionConfig;
use crate::error::BlockError;
use crate::pipeline::extract::block_image_data;
use crate::pipeline::gateway::ModelResponse;
use crate::pipeline::grid::reconstruct;
use crate::pipeline::postprocess::{clean_reply, is_no_corrections};
use crate::pipeline::render::{render_table, table_cells};
use crate::processors::{
    required_str, Preparation, ProcessorKind, PromptContext, Verdict, CORRECTED_HTML_KEY,
};
use crate::prompts::{build_prompt, TABLE_PLACEHOLDER};
use crate::schema::{BlockId, Page};
use std::collections::BTreeSet;
use tracing::debug;

pub fn prepare(page: &Page, block_id: BlockId, config: &CorrectionConfig) -> Preparation {
    let Some(block) = page.get_block(block_id) else {
        return Preparation::Skip("block not found".into());
    };
    let cells = table_cells(page, block_id);

    if cells.is_empty() && config.table.require_cells {
        return Preparation::Skip("table has no cells".into());
    }
    let rows: BTreeSet<usize> = cells.iter().map(|c| c.row_id).collect();
    if rows.len() > config.table.max_row_count {
        return Preparation::Skip(format!(
            "{} rows exceeds limit of {}",
            rows.len(),
            config.table.max_row_count
        ));
    }

    // Only cell text counts; a cell-less table's own text reaches the
    // model through the rendered markup but sets no length floor.
    let original_len: usize = cells.iter().map(|c| c.text.chars().count()).sum();

    let html = render_table(page, block_id);
    let kind = ProcessorKind::Table;
    let prompt = build_prompt(kind.prompt_template(config), TABLE_PLACEHOLDER, &html);
    let image = block_image_data(page, block, config.image_expansion_ratio);
    debug!(
        "Block {}: {} cells, {} rows, {} chars of markup",
        block_id,
        cells.len(),
        rows.len(),
        html.len()
    );

    Preparation::Ready(Box::new(PromptContext {
        block_id,
        kind,
        original: html,
        original_len,
        prompt,
        image,
    }))
}

pub fn validate(ctx: &PromptContext, response: &ModelResponse, config: &CorrectionConfig) -> Verdict {
    let markup = match required_str(response, CORRECTED_HTML_KEY) {
        Ok(m) => clean_reply(m),
        Err(e) => return Verdict::Reject(e),
    };

    if is_no_corrections(&markup) {
        return Verdict::Unchanged;
    }

    let grid = reconstruct(&markup);
    if grid.cells.len() < config.table.min_cells {
        return Verdict::Reject(BlockError::TooFewCells {
            cells: grid.cells.len(),
        });
    }

    let corrected = grid.text_len();
    let threshold = ctx.original_len as f32 * config.table.min_text_ratio;
    if (corrected as f32) < threshold {
        return Verdict::Reject(BlockError::TooShort {
            corrected,
            original: ctx.original_len,
        });
    }

    Verdict::Restructure(grid)
}
