//! Integration tests for the correction pass.
//!
//! A scripted in-memory [`ModelGateway`] stands in for the model, so these
//! run offline and deterministically.

use async_trait::async_trait;
use edgequake_refine::pipeline::gateway::parse_reply;
use edgequake_refine::{
    correct_document, correct_file, correct_from_bytes, Block, BlockError, BlockId, BlockType, CellGeometry,
    CorrectionConfig, CorrectionProgressCallback, Document, GatewayError, GatewayRequest,
    ModelGateway, ModelResponse, OutcomeStatus, Page, PolygonBox, RefineError, TableCell,
};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Scripted gateway ─────────────────────────────────────────────────────────

#[derive(Clone)]
enum Script {
    /// A JSON reply, checked against the request schema.
    Json(Value),
    /// A raw text reply, parsed like a real model reply.
    Text(&'static str),
    Fail(GatewayError),
    Panic,
    Hang,
}

#[derive(Default)]
struct ScriptedGateway {
    scripts: Mutex<HashMap<BlockId, VecDeque<Script>>>,
    fallback: Option<Script>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    fn new() -> Self {
        Self::default()
    }

    fn always(script: Script) -> Self {
        Self {
            fallback: Some(script),
            ..Self::default()
        }
    }

    fn on(self, id: BlockId, script: Script) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(id)
            .or_default()
            .push_back(script);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    async fn generate(&self, request: GatewayRequest) -> Result<ModelResponse, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.clone());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&request.block_id)
            .and_then(VecDeque::pop_front)
            .or_else(|| self.fallback.clone())
            .expect("no script for block");

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match script {
            Script::Json(value) => {
                let mut resp = ModelResponse::new(request.schema.validate(value)?);
                resp.input_tokens = 100;
                resp.output_tokens = 20;
                Ok(resp)
            }
            Script::Text(text) => parse_reply(text, &request.schema),
            Script::Fail(e) => Err(e),
            Script::Panic => panic!("scripted gateway panic"),
            Script::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

// ── Document helpers ─────────────────────────────────────────────────────────

fn bbox() -> PolygonBox {
    PolygonBox::from_bbox([10.0, 20.0, 210.0, 120.0])
}

fn cell(row: usize, col: usize, text: &str) -> TableCell {
    TableCell {
        row_id: row,
        col_id: col,
        rowspan: 1,
        colspan: 1,
        is_header: false,
        text: text.into(),
    }
}

/// Add a table with the given cells to `page`.
fn add_table(page: &mut Page, cells: &[TableCell]) -> BlockId {
    let table = page.add_block(Block::new(page.page_id, BlockType::Table, bbox()));
    let ids: Vec<BlockId> = cells
        .iter()
        .map(|c| page.add_full_block(Block::table_cell(page.page_id, bbox(), c.clone())))
        .collect();
    page.get_block_mut(table).unwrap().structure = ids;
    table
}

fn add_equation(page: &mut Page, text: &str) -> BlockId {
    page.add_block(Block::new(page.page_id, BlockType::Equation, bbox()).with_text(text))
}

fn single_page() -> Page {
    Page::new(0, (600.0, 800.0))
}

fn document(pages: Vec<Page>) -> Document {
    Document {
        pages,
        ..Document::default()
    }
}

fn config_with(gateway: Arc<ScriptedGateway>) -> CorrectionConfig {
    CorrectionConfig::builder()
        .gateway(gateway as Arc<dyn ModelGateway>)
        .build()
        .unwrap()
}

fn committed_cells(doc: &Document, table: BlockId) -> Vec<TableCell> {
    doc.get_page(table.page_id)
        .unwrap()
        .contained_blocks(table, &[BlockType::TableCell])
        .into_iter()
        .filter_map(|b| b.cell.clone())
        .collect()
}

fn error_count(doc: &Document, id: BlockId) -> u32 {
    doc.get_block(id).unwrap().metadata.llm_error_count
}

fn html_reply(html: &str) -> Script {
    Script::Json(json!({ "corrected_html": html }))
}

// ── Table correction ─────────────────────────────────────────────────────────

#[tokio::test]
async fn cells_are_committed_onto_cell_less_table() {
    let mut page = single_page();
    let table = add_table(&mut page, &[]);
    let mut doc = document(vec![page]);

    let gw = Arc::new(ScriptedGateway::new().on(
        table,
        html_reply("<table><tr><td>A</td><td>B</td></tr></table>"),
    ));
    let report = correct_document(&mut doc, &config_with(gw.clone())).await.unwrap();

    let cells = committed_cells(&doc, table);
    assert_eq!(cells.len(), 2);
    assert_eq!((cells[0].row_id, cells[0].col_id, cells[0].text.as_str()), (0, 0, "A"));
    assert_eq!((cells[1].row_id, cells[1].col_id, cells[1].text.as_str()), (0, 1, "B"));
    assert!(cells.iter().all(|c| c.rowspan == 1 && c.colspan == 1));

    let outcome = report.outcome(table).unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Corrected);
    assert_eq!(outcome.cells, 2);
    assert_eq!(error_count(&doc, table), 0);
    assert_eq!(gw.calls(), 1);
}

#[tokio::test]
async fn cell_less_table_with_own_text_takes_new_cells() {
    let mut page = single_page();
    let table = page.add_block(
        Block::new(0, BlockType::Table, bbox()).with_text("Quarterly revenue by region"),
    );
    let mut doc = document(vec![page]);

    let gw = Arc::new(ScriptedGateway::always(html_reply(
        "<table><tr><td>A</td><td>B</td></tr></table>",
    )));
    let report = correct_document(&mut doc, &config_with(gw.clone())).await.unwrap();

    assert_eq!(report.outcome(table).unwrap().status, OutcomeStatus::Corrected);
    let cells = committed_cells(&doc, table);
    let placed: Vec<(usize, usize, &str)> = cells
        .iter()
        .map(|c| (c.row_id, c.col_id, c.text.as_str()))
        .collect();
    assert_eq!(placed, vec![(0, 0, "A"), (0, 1, "B")]);
    assert_eq!(error_count(&doc, table), 0);
    assert!(gw.prompts.lock().unwrap()[0].contains("Quarterly revenue by region"));
}

#[tokio::test]
async fn merged_cells_are_placed_on_the_grid() {
    let mut page = single_page();
    let table = add_table(&mut page, &[cell(0, 0, "Region"), cell(0, 1, "Q1")]);
    let mut doc = document(vec![page]);

    let gw = Arc::new(ScriptedGateway::new().on(
        table,
        html_reply(
            "```html\n<table><tr><th rowspan=\"2\">Region</th><th>Q1</th></tr>\
             <tr><td>12</td></tr></table>\n```",
        ),
    ));
    correct_document(&mut doc, &config_with(gw)).await.unwrap();

    let cells = committed_cells(&doc, table);
    let placed: Vec<(usize, usize, usize, usize, &str)> = cells
        .iter()
        .map(|c| (c.row_id, c.col_id, c.rowspan, c.colspan, c.text.as_str()))
        .collect();
    assert_eq!(
        placed,
        vec![(0, 0, 2, 1, "Region"), (0, 1, 1, 1, "Q1"), (1, 1, 1, 1, "12")]
    );
    assert!(cells[0].is_header);
}

#[tokio::test]
async fn sentinel_reply_leaves_document_untouched() {
    let mut page = single_page();
    let table = add_table(&mut page, &[cell(0, 0, "a"), cell(0, 1, "b")]);
    let mut doc = document(vec![page]);
    let before = serde_json::to_value(&doc).unwrap();

    let gw = Arc::new(
        ScriptedGateway::new()
            .on(table, html_reply("   No Corrections Needed.  "))
            .on(table, Script::Text("```html\nno corrections needed\n```")),
    );
    let config = config_with(gw);

    for _ in 0..2 {
        let report = correct_document(&mut doc, &config).await.unwrap();
        assert_eq!(report.outcome(table).unwrap().status, OutcomeStatus::Unchanged);
        assert_eq!(serde_json::to_value(&doc).unwrap(), before);
    }
}

#[tokio::test]
async fn missing_key_counts_an_error_each_time() {
    let mut page = single_page();
    let table = add_table(&mut page, &[cell(0, 0, "x"), cell(0, 1, "y")]);
    let mut doc = document(vec![page]);
    let original = doc.get_block(table).unwrap().clone();

    let gw = Arc::new(ScriptedGateway::always(Script::Json(json!({ "html": "<table/>" }))));
    let config = config_with(gw);

    let report = correct_document(&mut doc, &config).await.unwrap();
    let outcome = report.outcome(table).unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Rejected);
    assert_eq!(
        outcome.error,
        Some(BlockError::MissingKey {
            key: "corrected_html".into()
        })
    );
    assert_eq!(error_count(&doc, table), 1);

    correct_document(&mut doc, &config).await.unwrap();
    assert_eq!(error_count(&doc, table), 2);

    let mut after = doc.get_block(table).unwrap().clone();
    after.metadata = original.metadata.clone();
    assert_eq!(after, original);
    assert_eq!(committed_cells(&doc, table).len(), 2);
}

#[tokio::test]
async fn unusable_tables_are_rejected_without_changes() {
    let mut page = single_page();
    let one_cell = add_table(&mut page, &[cell(0, 0, "alpha"), cell(0, 1, "beta")]);
    let too_short = add_table(&mut page, &[cell(0, 0, "Revenue 2023"), cell(0, 1, "1,234,567")]);
    let mut doc = document(vec![page]);

    let gw = Arc::new(
        ScriptedGateway::new()
            .on(one_cell, html_reply("<table><tr><td>alpha beta</td></tr></table>"))
            .on(too_short, html_reply("<table><tr><td>R</td><td>1</td></tr></table>")),
    );
    let report = correct_document(&mut doc, &config_with(gw)).await.unwrap();

    assert_eq!(
        report.outcome(one_cell).unwrap().error,
        Some(BlockError::TooFewCells { cells: 1 })
    );
    assert!(matches!(
        report.outcome(too_short).unwrap().error,
        Some(BlockError::TooShort { .. })
    ));
    assert_eq!(committed_cells(&doc, one_cell)[0].text, "alpha");
    assert_eq!(committed_cells(&doc, too_short)[1].text, "1,234,567");
    assert_eq!(report.stats.rejected, 2);
}

#[tokio::test]
async fn oversized_table_is_skipped_without_a_call() {
    let mut page = single_page();
    let cells: Vec<TableCell> = (0..5).map(|r| cell(r, 0, "v")).collect();
    let table = add_table(&mut page, &cells);
    let mut doc = document(vec![page]);

    let gw = Arc::new(ScriptedGateway::new());
    let config = CorrectionConfig::builder()
        .gateway(gw.clone() as Arc<dyn ModelGateway>)
        .max_table_rows(4)
        .build()
        .unwrap();
    let report = correct_document(&mut doc, &config).await.unwrap();

    let outcome = report.outcome(table).unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Skipped);
    assert!(outcome.skip_reason.is_some());
    assert_eq!(gw.calls(), 0);
    assert_eq!(error_count(&doc, table), 0);
}

#[tokio::test]
async fn proportional_geometry_spreads_cells_over_table() {
    let mut page = single_page();
    let table = add_table(&mut page, &[]);
    let mut doc = document(vec![page]);

    let gw = Arc::new(ScriptedGateway::always(html_reply(
        "<table><tr><td>A</td><td>B</td></tr><tr><td>C</td><td>D</td></tr></table>",
    )));
    let config = CorrectionConfig::builder()
        .gateway(gw as Arc<dyn ModelGateway>)
        .cell_geometry(CellGeometry::Proportional)
        .build()
        .unwrap();
    correct_document(&mut doc, &config).await.unwrap();

    let page = doc.get_page(0).unwrap();
    let last = page.contained_blocks(table, &[BlockType::TableCell])[3];
    assert_eq!(last.polygon.bbox(), [110.0, 70.0, 210.0, 120.0]);
}

// ── Handwriting / equation correction ────────────────────────────────────────

#[tokio::test]
async fn equation_markdown_is_rendered_to_html() {
    let mut page = single_page();
    let eq = add_equation(&mut page, "E = mc2");
    let mut doc = document(vec![page]);

    let gw = Arc::new(ScriptedGateway::always(Script::Json(
        json!({ "markdown": "<math>E = mc^2</math>" }),
    )));
    let report = correct_document(&mut doc, &config_with(gw.clone())).await.unwrap();

    assert_eq!(report.outcome(eq).unwrap().status, OutcomeStatus::Corrected);
    let html = doc.get_block(eq).unwrap().html.clone().unwrap();
    assert!(html.contains("<math>E = mc^2</math>"), "got: {html}");
    assert!(gw.prompts.lock().unwrap()[0].contains("E = mc2"));
}

#[tokio::test]
async fn truncated_transcription_is_rejected() {
    let mut page = single_page();
    let eq = add_equation(&mut page, "a long handwritten note about the results");
    let mut doc = document(vec![page]);

    let gw = Arc::new(ScriptedGateway::always(Script::Json(json!({ "markdown": "a long" }))));
    let report = correct_document(&mut doc, &config_with(gw)).await.unwrap();

    assert!(matches!(
        report.outcome(eq).unwrap().error,
        Some(BlockError::TooShort { corrected: 6, .. })
    ));
    assert!(doc.get_block(eq).unwrap().html.is_none());
    assert_eq!(error_count(&doc, eq), 1);
}

#[tokio::test]
async fn prose_reply_never_replaces_content() {
    let mut page = single_page();
    let refusal = add_equation(&mut page, "x + y = z");
    let wrapped = add_equation(&mut page, "a + b = c");
    let mut doc = document(vec![page]);
    let before = doc.get_block(refusal).unwrap().clone();

    let gw = Arc::new(
        ScriptedGateway::new()
            .on(refusal, Script::Text("Sorry, I cannot read this image."))
            .on(
                wrapped,
                Script::Text("Sure! {\"markdown\": \"a + b = c\"} Let me know if that helps."),
            ),
    );
    let report = correct_document(&mut doc, &config_with(gw)).await.unwrap();

    for id in [refusal, wrapped] {
        let outcome = report.outcome(id).unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Rejected);
        assert!(matches!(outcome.error, Some(BlockError::SchemaMismatch { .. })));
        assert_eq!(error_count(&doc, id), 1);
        assert!(doc.get_block(id).unwrap().html.is_none());
    }
    let mut after = doc.get_block(refusal).unwrap().clone();
    after.metadata = before.metadata.clone();
    assert_eq!(after, before);
}

#[tokio::test]
async fn blank_equation_is_skipped() {
    let mut page = single_page();
    let eq = add_equation(&mut page, "  ");
    let mut doc = document(vec![page]);

    let gw = Arc::new(ScriptedGateway::new());
    let report = correct_document(&mut doc, &config_with(gw.clone())).await.unwrap();
    assert_eq!(report.outcome(eq).unwrap().status, OutcomeStatus::Skipped);
    assert_eq!(gw.calls(), 0);
}

// ── Failure isolation ────────────────────────────────────────────────────────

#[tokio::test]
async fn failures_stay_with_their_block() {
    let mut page = single_page();
    let failing = add_table(&mut page, &[cell(0, 0, "a"), cell(0, 1, "b")]);
    let panicking = add_equation(&mut page, "x + y");
    let fine = add_table(&mut page, &[]);
    let mut doc = document(vec![page]);

    let gw = Arc::new(
        ScriptedGateway::new()
            .on(
                failing,
                Script::Fail(GatewayError::Transport {
                    retries: 3,
                    detail: "503 Service Unavailable".into(),
                }),
            )
            .on(panicking, Script::Panic)
            .on(fine, html_reply("<table><tr><td>1</td><td>2</td></tr></table>")),
    );
    let report = correct_document(&mut doc, &config_with(gw)).await.unwrap();

    assert!(matches!(
        report.outcome(failing).unwrap().error,
        Some(BlockError::Transport { retries: 3, .. })
    ));
    assert!(matches!(
        report.outcome(panicking).unwrap().error,
        Some(BlockError::Panicked(ref msg)) if msg.contains("scripted gateway panic")
    ));
    assert_eq!(report.outcome(fine).unwrap().status, OutcomeStatus::Corrected);
    assert_eq!(error_count(&doc, failing), 1);
    assert_eq!(error_count(&doc, panicking), 1);
    assert_eq!(committed_cells(&doc, fine).len(), 2);
}

#[tokio::test]
async fn hung_gateway_times_out() {
    let mut page = single_page();
    let table = add_table(&mut page, &[cell(0, 0, "a"), cell(0, 1, "b")]);
    let mut doc = document(vec![page]);

    let gw = Arc::new(ScriptedGateway::always(Script::Hang));
    let config = CorrectionConfig::builder()
        .gateway(gw as Arc<dyn ModelGateway>)
        .api_timeout_secs(1)
        .max_retries(0)
        .retry_backoff_ms(0)
        .build()
        .unwrap();
    let report = correct_document(&mut doc, &config).await.unwrap();

    assert_eq!(
        report.outcome(table).unwrap().error,
        Some(BlockError::Timeout { secs: 1 })
    );
    assert_eq!(error_count(&doc, table), 1);
}

// ── Dispatcher behaviour ─────────────────────────────────────────────────────

#[tokio::test]
async fn concurrency_is_bounded() {
    let mut page = single_page();
    let ids: Vec<BlockId> = (0..8).map(|i| add_equation(&mut page, &format!("x_{i}"))).collect();
    let mut doc = document(vec![page]);

    let gw = Arc::new(ScriptedGateway {
        fallback: Some(Script::Json(json!({ "markdown": "x_i corrected" }))),
        delay: Some(Duration::from_millis(30)),
        ..ScriptedGateway::default()
    });
    let config = CorrectionConfig::builder()
        .gateway(gw.clone() as Arc<dyn ModelGateway>)
        .concurrency(3)
        .build()
        .unwrap();
    let report = correct_document(&mut doc, &config).await.unwrap();

    assert_eq!(report.stats.corrected, 8);
    assert_eq!(gw.calls(), 8);
    let peak = gw.max_in_flight.load(Ordering::SeqCst);
    assert!(peak <= 3 && peak > 1, "peak in-flight calls: {peak}");
    // Outcomes come back in candidate order regardless of completion order.
    let order: Vec<BlockId> = report.outcomes.iter().map(|o| o.block_id).collect();
    assert_eq!(order, ids);
}

#[tokio::test]
async fn blocks_on_every_page_are_visited() {
    let mut first = Page::new(0, (600.0, 800.0));
    let t0 = add_table(&mut first, &[]);
    let mut second = Page::new(1, (600.0, 800.0));
    second.add_block(Block::new(1, BlockType::Text, bbox()).with_text("plain prose"));
    let t1 = add_table(&mut second, &[]);
    let mut doc = document(vec![first, second]);

    let gw = Arc::new(ScriptedGateway::always(html_reply(
        "<table><tr><td>k</td><td>v</td></tr></table>",
    )));
    let report = correct_document(&mut doc, &config_with(gw)).await.unwrap();

    assert_eq!(report.stats.candidate_blocks, 2);
    assert_eq!(committed_cells(&doc, t0).len(), 2);
    assert_eq!(committed_cells(&doc, t1).len(), 2);
    let t1_children = &doc.get_block(t1).unwrap().structure;
    assert!(t1_children.iter().all(|c| c.page_id == 1));
}

#[tokio::test]
async fn disabled_processors_make_no_calls() {
    let mut page = single_page();
    add_table(&mut page, &[]);
    add_equation(&mut page, "x");
    let mut doc = document(vec![page]);

    let gw = Arc::new(ScriptedGateway::new());
    let config = CorrectionConfig::builder()
        .gateway(gw.clone() as Arc<dyn ModelGateway>)
        .handwriting_enabled(false)
        .table_enabled(false)
        .build()
        .unwrap();
    let report = correct_document(&mut doc, &config).await.unwrap();
    assert!(report.outcomes.is_empty());
    assert_eq!(gw.calls(), 0);
}

#[test]
fn sync_entry_point_matches_async() {
    let build = || {
        let mut page = single_page();
        let table = add_table(&mut page, &[]);
        (document(vec![page]), table)
    };
    let (mut a, table) = build();
    let (mut b, _) = build();
    let gw = Arc::new(ScriptedGateway::always(html_reply(
        "<table><tr><td>A</td><td>B</td></tr></table>",
    )));
    let config = config_with(gw);

    edgequake_refine::correct_document_sync(&mut a, &config).unwrap();
    tokio_test::block_on(correct_document(&mut b, &config)).unwrap();
    assert_eq!(committed_cells(&a, table), committed_cells(&b, table));
}

#[tokio::test]
async fn invalid_config_is_fatal() {
    let mut doc = document(vec![single_page()]);
    let mut config = CorrectionConfig::default();
    config.concurrency = 0;
    let err = correct_document(&mut doc, &config).await.unwrap_err();
    assert!(matches!(err, RefineError::InvalidConfig(_)));
}

#[derive(Default)]
struct Counting {
    started: AtomicUsize,
    completed: AtomicUsize,
    errors: AtomicUsize,
    corrected: AtomicUsize,
}

impl CorrectionProgressCallback for Counting {
    fn on_block_start(&self, _block: &BlockId, _total: usize) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }
    fn on_block_complete(&self, _block: &BlockId, _status: OutcomeStatus) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
    fn on_block_error(&self, _block: &BlockId, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
    fn on_correction_complete(&self, _total: usize, corrected: usize) {
        self.corrected.store(corrected, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn progress_callback_sees_every_block() {
    let mut page = single_page();
    let good = add_table(&mut page, &[]);
    let bad = add_equation(&mut page, "y = 2x");
    add_equation(&mut page, "");
    let mut doc = document(vec![page]);

    let gw = Arc::new(
        ScriptedGateway::new()
            .on(good, html_reply("<table><tr><td>1</td><td>2</td></tr></table>"))
            .on(bad, Script::Json(json!({ "wrong": "key" }))),
    );
    let counter = Arc::new(Counting::default());
    let config = CorrectionConfig::builder()
        .gateway(gw as Arc<dyn ModelGateway>)
        .progress_callback(counter.clone() as Arc<dyn CorrectionProgressCallback>)
        .build()
        .unwrap();
    correct_document(&mut doc, &config).await.unwrap();

    assert_eq!(counter.started.load(Ordering::SeqCst), 2);
    assert_eq!(counter.completed.load(Ordering::SeqCst), 3);
    assert_eq!(counter.errors.load(Ordering::SeqCst), 1);
    assert_eq!(counter.corrected.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn looped_structure_in_loaded_bytes_is_corrected() {
    let mut page = single_page();
    let table = add_table(&mut page, &[cell(0, 0, "a"), cell(0, 1, "b")]);
    let first_cell = page.get_block(table).unwrap().structure[0];
    page.get_block_mut(table).unwrap().structure.push(table);
    page.get_block_mut(first_cell).unwrap().structure = vec![table];
    let bytes = serde_json::to_vec(&document(vec![page])).unwrap();

    let gw = Arc::new(ScriptedGateway::always(html_reply(
        "<table><tr><td>a</td><td>b</td></tr></table>",
    )));
    let dir = tempfile::tempdir().unwrap();
    let (doc, report) = correct_from_bytes(&bytes, dir.path(), &config_with(gw.clone()))
        .await
        .unwrap();

    assert_eq!(doc.filepath.as_deref(), Some("<memory>"));
    assert_eq!(report.outcome(table).unwrap().status, OutcomeStatus::Corrected);
    assert!(gw.prompts.lock().unwrap()[0].contains("<td>a</td>"));
    assert_eq!(committed_cells(&doc, table).len(), 2);
}

#[tokio::test]
async fn correct_file_writes_corrected_document() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("doc.json");
    let output = dir.path().join("out").join("doc.corrected.json");

    let mut page = single_page();
    let table = add_table(&mut page, &[]);
    std::fs::write(&input, serde_json::to_vec(&document(vec![page])).unwrap()).unwrap();

    let gw = Arc::new(ScriptedGateway::always(html_reply(
        "<table><tr><td>A</td><td>B</td></tr></table>",
    )));
    let report = correct_file(&input, &output, &config_with(gw)).await.unwrap();
    assert_eq!(report.stats.corrected, 1);

    let written: Document = serde_json::from_slice(&std::fs::read(&output).unwrap()).unwrap();
    let cells = committed_cells(&written, table);
    assert_eq!(cells.iter().map(|c| c.text.as_str()).collect::<Vec<_>>(), ["A", "B"]);
}
