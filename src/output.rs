//! Result types for a correction pass.
//!
//! The corrected content itself lives in the mutated [`crate::Document`];
//! these types describe what happened to each candidate block.

use crate::error::BlockError;
use crate::processors::ProcessorKind;
use crate::schema::BlockId;
use serde::{Deserialize, Serialize};

/// Final state of one candidate block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeStatus {
    /// Content or cell structure was replaced.
    Corrected,
    /// The model confirmed the existing content; nothing changed.
    Unchanged,
    /// The correction was rejected; the block's error count was incremented.
    Rejected,
    /// Filtered out before any model call.
    Skipped,
}

/// What happened to one candidate block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockOutcome {
    pub block_id: BlockId,
    pub processor: ProcessorKind,
    pub status: OutcomeStatus,
    /// Why the block was rejected or skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<BlockError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    /// Cells committed for a restructured table.
    #[serde(default)]
    pub cells: usize,
    /// Structural warnings raised while rebuilding the grid.
    #[serde(default)]
    pub warnings: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration_ms: u64,
}

impl BlockOutcome {
    pub(crate) fn new(block_id: BlockId, processor: ProcessorKind, status: OutcomeStatus) -> Self {
        Self {
            block_id,
            processor,
            status,
            error: None,
            skip_reason: None,
            cells: 0,
            warnings: 0,
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: 0,
        }
    }
}

/// Aggregate counters for a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionStats {
    pub candidate_blocks: usize,
    pub corrected: usize,
    pub unchanged: usize,
    pub rejected: usize,
    pub skipped: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
}

impl CorrectionStats {
    pub(crate) fn record(&mut self, outcome: &BlockOutcome) {
        self.candidate_blocks += 1;
        match outcome.status {
            OutcomeStatus::Corrected => self.corrected += 1,
            OutcomeStatus::Unchanged => self.unchanged += 1,
            OutcomeStatus::Rejected => self.rejected += 1,
            OutcomeStatus::Skipped => self.skipped += 1,
        }
        self.total_input_tokens += outcome.input_tokens;
        self.total_output_tokens += outcome.output_tokens;
    }
}

/// Everything a correction pass reports back.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorrectionReport {
    /// One entry per candidate block, in candidate order.
    pub outcomes: Vec<BlockOutcome>,
    pub stats: CorrectionStats,
}

impl CorrectionReport {
    pub fn outcome(&self, block_id: BlockId) -> Option<&BlockOutcome> {
        self.outcomes.iter().find(|o| o.block_id == block_id)
    }

    pub fn rejected(&self) -> impl Iterator<Item = &BlockOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Rejected)
    }
}
