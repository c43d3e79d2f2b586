//! Blocks: the nodes of the document tree.

use crate::schema::polygon::PolygonBox;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of content a block holds, as assigned by the upstream layout model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockType {
    Text,
    SectionHeader,
    ListItem,
    Caption,
    Footnote,
    Equation,
    Handwriting,
    Figure,
    Picture,
    Form,
    Table,
    TableOfContents,
    TableCell,
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Stable address of a block: page plus index into that page's block table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId {
    pub page_id: usize,
    pub block_id: usize,
    pub block_type: BlockType,
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/page/{}/{}/{}", self.page_id, self.block_type, self.block_id)
    }
}

/// Per-block bookkeeping written by correction passes.
///
/// `llm_error_count` is a signal for downstream consumers (fallback routing,
/// quality reports); nothing in this crate reads it back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMetadata {
    #[serde(default)]
    pub llm_error_count: u32,
}

impl BlockMetadata {
    pub fn record_llm_error(&mut self) {
        self.llm_error_count = self.llm_error_count.saturating_add(1);
    }
}

/// Grid placement of a table cell.
///
/// Spans are always ≥ 1 for cells produced by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCell {
    pub row_id: usize,
    pub col_id: usize,
    pub rowspan: usize,
    pub colspan: usize,
    pub is_header: bool,
    pub text: String,
}

/// One extracted content unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub polygon: PolygonBox,
    /// Ordered child references; children live in the same page's table.
    #[serde(default)]
    pub structure: Vec<BlockId>,
    #[serde(default)]
    pub metadata: BlockMetadata,
    /// Recognised text for leaf blocks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Rendered HTML, set when a correction replaces the block's content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell: Option<TableCell>,
}

impl Block {
    /// A block with no content yet; `id.block_id` is reassigned on insertion.
    pub fn new(page_id: usize, block_type: BlockType, polygon: PolygonBox) -> Self {
        Self {
            id: BlockId {
                page_id,
                block_id: 0,
                block_type,
            },
            polygon,
            structure: Vec::new(),
            metadata: BlockMetadata::default(),
            text: None,
            html: None,
            cell: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// A `TableCell` block carrying `cell`.
    pub fn table_cell(page_id: usize, polygon: PolygonBox, cell: TableCell) -> Self {
        let mut block = Self::new(page_id, BlockType::TableCell, polygon);
        block.cell = Some(cell);
        block
    }

    pub fn block_type(&self) -> BlockType {
        self.id.block_type
    }

    /// Own text of this block, ignoring children.
    pub fn own_text(&self) -> &str {
        match (&self.cell, &self.text) {
            (Some(cell), _) => &cell.text,
            (None, Some(text)) => text,
            (None, None) => "",
        }
    }
}
