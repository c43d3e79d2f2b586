//! Correction entry points and the block dispatcher.
//!
//! ## Three phases
//!
//! ```text
//! prepare (sequential, &Document)
//!   └─ find candidates, render/extract content, crop images, fill prompts
//! call + validate (concurrent, buffer_unordered(concurrency))
//!   └─ gateway.generate → processor validate → Verdict
//! apply (sequential, &mut Document)
//!   └─ replace HTML / commit cells / bump llm_error_count
//! ```
//!
//! Only the apply phase writes to the document, so page-table insertions are
//! serialised without any locking, and the concurrent phase shares nothing
//! mutable. A failure or panic in one block's call becomes a rejection for
//! that block and never reaches the others.

use crate::config::CorrectionConfig;
use crate::error::{BlockError, RefineError};
use crate::output::{BlockOutcome, CorrectionReport, CorrectionStats, OutcomeStatus};
use crate::pipeline::commit::{build_cell_blocks, commit_cells};
use crate::pipeline::gateway::{GatewayRequest, LlmGateway, ModelGateway};
use crate::pipeline::input;
use crate::processors::{Preparation, ProcessorKind, PromptContext, Verdict};
use crate::schema::{BlockId, Document};
use edgequake_llm::{LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Correct every eligible block of `doc` in place.
///
/// # Returns
/// `Ok(CorrectionReport)` whenever the pass ran, even if every block was
/// rejected (check `report.stats.rejected`).
///
/// # Errors
/// Returns `Err(RefineError)` only for fatal errors:
/// - invalid configuration
/// - no model gateway or provider could be configured
pub async fn correct_document(
    doc: &mut Document,
    config: &CorrectionConfig,
) -> Result<CorrectionReport, RefineError> {
    let total_start = Instant::now();
    config.validate()?;

    // ── Phase 1: prepare ─────────────────────────────────────────────────
    let candidates = collect_candidates(doc, config);
    let total = candidates.len();
    info!(
        "Starting correction: {} candidate blocks across {} pages",
        total,
        doc.pages.len()
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_correction_start(total);
    }

    let prepared: Vec<Preparation> = candidates
        .iter()
        .map(|&(id, kind)| match doc.get_page(id.page_id) {
            Some(page) => kind.prepare(page, id, config),
            None => Preparation::Skip("page not found".into()),
        })
        .collect();

    // ── Phase 2: call + validate ─────────────────────────────────────────
    let ready: Vec<(usize, &PromptContext)> = prepared
        .iter()
        .enumerate()
        .filter_map(|(i, p)| match p {
            Preparation::Ready(ctx) => Some((i, ctx.as_ref())),
            Preparation::Skip(_) => None,
        })
        .collect();

    let mut attempts: Vec<Option<Attempt>> = vec![None; total];
    if !ready.is_empty() {
        let gateway = resolve_gateway(config).await?;
        let calls: Vec<_> = ready
            .into_iter()
            .map(|(i, ctx)| {
                let gateway = Arc::clone(&gateway);
                async move {
                    if let Some(ref cb) = config.progress_callback {
                        cb.on_block_start(&ctx.block_id, total);
                    }
                    (i, run_attempt(gateway, ctx, config).await)
                }
            })
            .collect();
        let results: Vec<(usize, Attempt)> = stream::iter(calls)
            .buffer_unordered(config.concurrency)
            .collect()
            .await;

        for (i, attempt) in results {
            attempts[i] = Some(attempt);
        }
    }

    // ── Phase 3: apply ───────────────────────────────────────────────────
    let mut report = CorrectionReport::default();
    for (((id, kind), prep), attempt) in candidates.into_iter().zip(prepared).zip(attempts) {
        let outcome = match (prep, attempt) {
            (Preparation::Skip(reason), _) => {
                debug!("Block {}: skipped ({})", id, reason);
                let mut o = BlockOutcome::new(id, kind, OutcomeStatus::Skipped);
                o.skip_reason = Some(reason);
                o
            }
            (Preparation::Ready(_), Some(attempt)) => apply_attempt(doc, id, kind, attempt, config),
            (Preparation::Ready(_), None) => {
                let mut o = BlockOutcome::new(id, kind, OutcomeStatus::Skipped);
                o.skip_reason = Some("no model call was made".into());
                o
            }
        };

        if let Some(ref cb) = config.progress_callback {
            if let Some(ref e) = outcome.error {
                cb.on_block_error(&id, &e.to_string());
            }
            cb.on_block_complete(&id, outcome.status);
        }
        report.stats.record(&outcome);
        report.outcomes.push(outcome);
    }

    report.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    let CorrectionStats {
        corrected,
        unchanged,
        rejected,
        skipped,
        total_duration_ms,
        ..
    } = report.stats;
    info!(
        "Correction complete: {} corrected, {} unchanged, {} rejected, {} skipped in {}ms",
        corrected, unchanged, rejected, skipped, total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_correction_complete(total, corrected);
    }

    Ok(report)
}

/// Synchronous wrapper around [`correct_document`].
///
/// Creates a temporary tokio runtime internally.
pub fn correct_document_sync(
    doc: &mut Document,
    config: &CorrectionConfig,
) -> Result<CorrectionReport, RefineError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| RefineError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(correct_document(doc, config))
}

/// Load a document file, correct it, and write the result to `output`.
///
/// Page images are resolved relative to `input`. The write is atomic.
pub async fn correct_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &CorrectionConfig,
) -> Result<CorrectionReport, RefineError> {
    let mut doc = input::load_document(input_path).await?;
    let report = correct_document(&mut doc, config).await?;
    input::save_document(&doc, output_path).await?;
    Ok(report)
}

/// Parse document JSON held in memory, correct it, and return both.
///
/// Page image paths are resolved against `image_dir`.
pub async fn correct_from_bytes(
    bytes: &[u8],
    image_dir: impl Into<PathBuf>,
    config: &CorrectionConfig,
) -> Result<(Document, CorrectionReport), RefineError> {
    let mut doc = input::parse_document(bytes, Path::new("<memory>"), image_dir.into()).await?;
    let report = correct_document(&mut doc, config).await?;
    Ok((doc, report))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Blocks with an enabled processor, page by page in page-table order.
fn collect_candidates(doc: &Document, config: &CorrectionConfig) -> Vec<(BlockId, ProcessorKind)> {
    doc.pages
        .iter()
        .flat_map(|page| page.blocks.iter())
        .filter_map(|block| {
            ProcessorKind::for_block(config, block.block_type()).map(|kind| (block.id, kind))
        })
        .collect()
}

/// Result of the concurrent phase for one block.
#[derive(Debug, Clone)]
struct Attempt {
    verdict: Verdict,
    input_tokens: u64,
    output_tokens: u64,
    duration_ms: u64,
}

/// Upper bound on one block's gateway call, retries and backoff included.
fn call_budget(config: &CorrectionConfig) -> Duration {
    let attempts = u64::from(config.max_retries) + 1;
    let backoff_ms = config
        .retry_backoff_ms
        .saturating_mul(1u64.checked_shl(config.max_retries).unwrap_or(u64::MAX));
    Duration::from_secs(config.api_timeout_secs.saturating_mul(attempts))
        + Duration::from_millis(backoff_ms)
}

async fn run_attempt(
    gateway: Arc<dyn ModelGateway>,
    ctx: &PromptContext,
    config: &CorrectionConfig,
) -> Attempt {
    let start = Instant::now();
    let request = GatewayRequest {
        block_id: ctx.block_id,
        prompt: ctx.prompt.clone(),
        image: ctx.image.clone(),
        schema: ctx.kind.spec().schema,
    };
    let budget = call_budget(config);

    let call = async {
        let response = tokio::time::timeout(budget, gateway.generate(request))
            .await
            .map_err(|_| BlockError::Timeout {
                secs: budget.as_secs(),
            })?
            .map_err(BlockError::from)?;
        let verdict = ctx.kind.validate(ctx, &response, config);
        Ok::<_, BlockError>((verdict, response.input_tokens, response.output_tokens))
    };

    let (verdict, input_tokens, output_tokens) = match AssertUnwindSafe(call).catch_unwind().await
    {
        Ok(Ok(done)) => done,
        Ok(Err(e)) => (Verdict::Reject(e), 0, 0),
        Err(payload) => {
            let msg = panic_message(payload.as_ref());
            warn!("Block {}: correction panicked: {}", ctx.block_id, msg);
            (Verdict::Reject(BlockError::Panicked(msg)), 0, 0)
        }
    };

    Attempt {
        verdict,
        input_tokens,
        output_tokens,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Apply one verdict to the document.
fn apply_attempt(
    doc: &mut Document,
    id: BlockId,
    kind: ProcessorKind,
    attempt: Attempt,
    config: &CorrectionConfig,
) -> BlockOutcome {
    let mut outcome = BlockOutcome::new(id, kind, OutcomeStatus::Unchanged);
    outcome.input_tokens = attempt.input_tokens;
    outcome.output_tokens = attempt.output_tokens;
    outcome.duration_ms = attempt.duration_ms;

    let Some(page) = doc.get_page_mut(id.page_id) else {
        outcome.status = OutcomeStatus::Skipped;
        outcome.skip_reason = Some("page not found".into());
        return outcome;
    };

    match attempt.verdict {
        Verdict::Unchanged => {
            debug!("Block {}: no corrections needed", id);
        }
        Verdict::Replace { html } => {
            if let Some(block) = page.get_block_mut(id) {
                block.html = Some(html);
                outcome.status = OutcomeStatus::Corrected;
                debug!("Block {}: content replaced", id);
            }
        }
        Verdict::Restructure(grid) => {
            let Some(table) = page.get_block(id) else {
                outcome.status = OutcomeStatus::Skipped;
                outcome.skip_reason = Some("block not found".into());
                return outcome;
            };
            let cells = build_cell_blocks(page.page_id, table, &grid, config.cell_geometry);
            if let Some(ids) = commit_cells(page, id, cells) {
                outcome.status = OutcomeStatus::Corrected;
                outcome.cells = ids.len();
                outcome.warnings = grid.warnings.len();
            }
        }
        Verdict::Reject(error) => {
            if let Some(block) = page.get_block_mut(id) {
                block.metadata.record_llm_error();
            }
            warn!("Block {}: {} correction rejected: {}", id, kind, error);
            outcome.status = OutcomeStatus::Rejected;
            outcome.error = Some(error);
        }
    }
    outcome
}

/// Resolve the gateway, from most-specific to least-specific.
///
/// 1. **Pre-built gateway** (`config.gateway`): used as-is.
/// 2. **Pre-built provider** (`config.provider`): wrapped in an [`LlmGateway`].
/// 3. **Named provider + model** (`config.provider_name`).
/// 4. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 5. **OpenAI key** (`OPENAI_API_KEY`): preferred when several keys exist.
/// 6. **Full auto-detection** (`ProviderFactory::from_env`).
pub async fn resolve_gateway(
    config: &CorrectionConfig,
) -> Result<Arc<dyn ModelGateway>, RefineError> {
    if let Some(ref gateway) = config.gateway {
        return Ok(Arc::clone(gateway));
    }
    let provider = resolve_provider(config)?;
    Ok(Arc::new(LlmGateway::new(provider, config)))
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, RefineError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        RefineError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

fn resolve_provider(config: &CorrectionConfig) -> Result<Arc<dyn LLMProvider>, RefineError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| RefineError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
