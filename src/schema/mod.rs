//! Document tree model consumed and mutated by correction passes.
//!
//! Only the fields the correction stage needs are modelled: block type,
//! geometry, child structure, recognised text / rendered HTML, table-cell
//! placement and the metadata counters. Everything serialises with serde so
//! a document can be loaded from and written back to JSON.

pub mod block;
pub mod document;
pub mod polygon;

pub use block::{Block, BlockId, BlockMetadata, BlockType, TableCell};
pub use document::{Document, Page};
pub use polygon::PolygonBox;
