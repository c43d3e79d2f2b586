//! Progress-callback trait for per-block correction events.
//!
//! Inject an [`Arc<dyn CorrectionProgressCallback>`] via
//! [`crate::config::CorrectionConfigBuilder::progress_callback`] to receive
//! events as the dispatcher works through a document.
//!
//! Callers can forward events to a channel, a log, or a terminal progress
//! bar without the library knowing how the host application communicates.
//!
//! # Example
//!
//! ```rust
//! use edgequake_refine::{BlockId, CorrectionConfig, CorrectionProgressCallback, OutcomeStatus};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     corrected: Arc<AtomicUsize>,
//! }
//!
//! impl CorrectionProgressCallback for CountingCallback {
//!     fn on_block_complete(&self, block: &BlockId, status: OutcomeStatus) {
//!         if status == OutcomeStatus::Corrected {
//!             self.corrected.fetch_add(1, Ordering::SeqCst);
//!         }
//!         eprintln!("{} → {:?}", block, status);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     corrected: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = CorrectionConfig::builder()
//!     .progress_callback(counter as Arc<dyn CorrectionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::OutcomeStatus;
use crate::schema::BlockId;
use std::sync::Arc;

/// Called by the dispatcher as it corrects each block.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// `on_block_start` is called concurrently from the model-call phase.
/// `on_block_complete` and `on_block_error` are called from the sequential
/// apply phase, in candidate order. Implementations must still protect
/// shared mutable state (`Mutex`, atomics).
pub trait CorrectionProgressCallback: Send + Sync {
    /// Called once, after candidate blocks have been collected.
    fn on_correction_start(&self, total_blocks: usize) {
        let _ = total_blocks;
    }

    /// Called just before the model request for a block is sent.
    fn on_block_start(&self, block: &BlockId, total_blocks: usize) {
        let _ = (block, total_blocks);
    }

    /// Called once per candidate block with its final outcome.
    fn on_block_complete(&self, block: &BlockId, status: OutcomeStatus) {
        let _ = (block, status);
    }

    /// Called when a block's correction is rejected, in addition to
    /// `on_block_complete`.
    fn on_block_error(&self, block: &BlockId, error: &str) {
        let _ = (block, error);
    }

    /// Called once after every candidate has been applied.
    ///
    /// `corrected` counts blocks whose content or structure changed.
    fn on_correction_complete(&self, total_blocks: usize, corrected: usize) {
        let _ = (total_blocks, corrected);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl CorrectionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::CorrectionConfig`].
pub type ProgressCallback = Arc<dyn CorrectionProgressCallback>;
