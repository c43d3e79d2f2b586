//! Pipeline stages for block correction.
//!
//! Each submodule implements exactly one step, so each is independently
//! testable and the processors compose them without knowing their internals.
//!
//! ## Data Flow
//!
//! ```text
//!            ┌─ render ─┐
//! block ─────┤          ├─▶ gateway ─▶ postprocess ─▶ grid ─▶ geometry ─▶ commit
//!            └─ extract ┘   (model)     (cleanup)    (table)  (bbox)    (swap)
//! ```
//!
//! 1. [`render`]: table cells → HTML markup for the prompt
//! 2. [`extract`]: crop and PNG-encode the block image
//! 3. [`gateway`]: schema-checked model call with retry/backoff; the only
//!    stage with network I/O
//! 4. [`postprocess`]: strip fences, detect the sentinel, Markdown → HTML
//! 5. [`grid`]: corrected table markup → placed cells
//! 6. [`geometry`]: bounding boxes for rebuilt cells
//! 7. [`commit`]: swap a table's children in one step
//!
//! [`input`] loads and saves whole documents.

pub mod commit;
pub mod extract;
pub mod gateway;
pub mod geometry;
pub mod grid;
pub mod input;
pub mod postprocess;
pub mod render;
