//! Document and page containers.
//!
//! A [`Page`] owns every block on it in one flat table; tree structure is
//! expressed through [`Block::structure`] references into that table. This
//! keeps lookup O(1) and lets a correction swap a table's children without
//! moving any other block.

use crate::error::RefineError;
use crate::schema::block::{Block, BlockId, BlockType};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// One page of an extracted document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub page_id: usize,
    /// Page size in the coordinate space of block polygons.
    pub size: (f32, f32),
    /// Flat lookup table; `BlockId::block_id` indexes into it.
    #[serde(default)]
    pub blocks: Vec<Block>,
    /// Top-level blocks in reading order.
    #[serde(default)]
    pub structure: Vec<BlockId>,
    /// Rendered page image, relative to the document file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<PathBuf>,
    #[serde(skip)]
    pub image: Option<Arc<DynamicImage>>,
}

impl Page {
    pub fn new(page_id: usize, size: (f32, f32)) -> Self {
        Self {
            page_id,
            size,
            blocks: Vec::new(),
            structure: Vec::new(),
            image_path: None,
            image: None,
        }
    }

    /// Register `block` in this page's table and return its new id.
    pub fn add_full_block(&mut self, mut block: Block) -> BlockId {
        block.id.page_id = self.page_id;
        block.id.block_id = self.blocks.len();
        let id = block.id;
        self.blocks.push(block);
        id
    }

    /// Register `block` and append it to the page's top-level structure.
    pub fn add_block(&mut self, block: Block) -> BlockId {
        let id = self.add_full_block(block);
        self.structure.push(id);
        id
    }

    pub fn get_block(&self, id: BlockId) -> Option<&Block> {
        if id.page_id != self.page_id {
            return None;
        }
        self.blocks
            .get(id.block_id)
            .filter(|b| b.id.block_type == id.block_type)
    }

    pub fn get_block_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        if id.page_id != self.page_id {
            return None;
        }
        self.blocks
            .get_mut(id.block_id)
            .filter(|b| b.id.block_type == id.block_type)
    }

    /// All descendants of `id` whose type is in `types`, depth-first in
    /// structure order.
    pub fn contained_blocks(&self, id: BlockId, types: &[BlockType]) -> Vec<&Block> {
        self.descendants(id)
            .into_iter()
            .filter(|b| types.contains(&b.block_type()))
            .collect()
    }

    /// Plain text of a block subtree: its own text for leaves, the
    /// newline-joined text of the leaves below it otherwise.
    pub fn raw_text(&self, id: BlockId) -> String {
        let Some(block) = self.get_block(id) else {
            return String::new();
        };
        if block.structure.is_empty() {
            return block.own_text().to_string();
        }
        self.descendants(id)
            .into_iter()
            .filter(|b| b.structure.is_empty())
            .map(Block::own_text)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Descendants of `id`, depth-first in structure order. Each block is
    /// visited once, so structure loops in loaded documents terminate.
    fn descendants(&self, id: BlockId) -> Vec<&Block> {
        let mut found = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut stack: Vec<BlockId> = match self.get_block(id) {
            Some(b) => b.structure.iter().rev().copied().collect(),
            None => return found,
        };
        while let Some(child_id) = stack.pop() {
            if !seen.insert(child_id) {
                continue;
            }
            if let Some(child) = self.get_block(child_id) {
                found.push(child);
                stack.extend(child.structure.iter().rev().copied());
            }
        }
        found
    }
}

/// A whole extracted document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filepath: Option<String>,
    #[serde(default)]
    pub pages: Vec<Page>,
}

impl Document {
    pub fn get_page(&self, page_id: usize) -> Option<&Page> {
        self.pages.iter().find(|p| p.page_id == page_id)
    }

    pub fn get_page_mut(&mut self, page_id: usize) -> Option<&mut Page> {
        self.pages.iter_mut().find(|p| p.page_id == page_id)
    }

    pub fn get_block(&self, id: BlockId) -> Option<&Block> {
        self.get_page(id.page_id)?.get_block(id)
    }

    pub fn raw_text(&self, id: BlockId) -> String {
        self.get_page(id.page_id)
            .map(|p| p.raw_text(id))
            .unwrap_or_default()
    }

    /// Decode every page's `image_path` (resolved against `base_dir`).
    ///
    /// Pages without an image path are left alone; their blocks are sent to
    /// the model without an image.
    pub fn load_images(&mut self, base_dir: &Path) -> Result<(), RefineError> {
        for page in &mut self.pages {
            let Some(ref rel) = page.image_path else {
                continue;
            };
            let path = base_dir.join(rel);
            let img = image::open(&path).map_err(|e| RefineError::ImageLoadFailed {
                path: path.clone(),
                detail: e.to_string(),
            })?;
            debug!(
                "Page {}: loaded {}x{} image from {}",
                page.page_id,
                img.width(),
                img.height(),
                path.display()
            );
            page.image = Some(Arc::new(img));
        }
        Ok(())
    }
}
