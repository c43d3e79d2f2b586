//! # edgequake-refine
//!
//! Correct the blocks of an extracted document with Vision Language Models.
//!
//! ## Why this crate?
//!
//! Layout-aware extraction gets most of a page right, but handwriting, math
//! and tables come out garbled: characters are misread, merged cells are
//! split, rows drift between columns. This crate sends each such block to a
//! VLM together with a crop of the page image and its current content, checks
//! the reply, and writes the correction back into the document tree. For
//! tables the corrected HTML is rebuilt into a proper cell grid honouring
//! `rowspan`/`colspan`.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Document (JSON + page images)
//!  │
//!  ├─ 1. Prepare   pick candidate blocks, render table HTML, crop images
//!  ├─ 2. Call      concurrent model calls with retry/backoff (gateway)
//!  ├─ 3. Validate  schema, length and cell-count checks per processor
//!  └─ 4. Apply     replace HTML, rebuild table cells, or count the error
//! ```
//!
//! A rejected correction never changes a block beyond incrementing its
//! `llm_error_count`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_refine::{correct_file, CorrectionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = CorrectionConfig::default();
//!     let report = correct_file("doc.json", "doc.corrected.json", &config).await?;
//!     eprintln!(
//!         "{} corrected, {} rejected",
//!         report.stats.corrected, report.stats.rejected
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `refine` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-refine = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod dispatch;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod processors;
pub mod progress;
pub mod prompts;
pub mod schema;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    CellGeometry, CorrectionConfig, CorrectionConfigBuilder, HandwritingConfig, TableConfig,
};
pub use dispatch::{correct_document, correct_document_sync, correct_file, correct_from_bytes};
pub use error::{BlockError, GatewayError, RefineError};
pub use output::{BlockOutcome, CorrectionReport, CorrectionStats, OutcomeStatus};
pub use pipeline::gateway::{
    GatewayRequest, LlmGateway, ModelGateway, ModelResponse, ResponseSchema,
};
pub use pipeline::grid::{reconstruct, GridCell, GridReconstruction, StructuralWarning};
pub use pipeline::input::{load_document, save_document};
pub use processors::ProcessorKind;
pub use progress::{CorrectionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use schema::{Block, BlockId, BlockType, Document, Page, PolygonBox, TableCell};
