//! Configuration types for a block-correction pass.
//!
//! All behaviour is controlled through [`CorrectionConfig`], built via its
//! [`CorrectionConfigBuilder`]. Per-processor knobs live in the nested
//! [`HandwritingConfig`] and [`TableConfig`].
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! documented defaults for the rest.

use crate::error::RefineError;
use crate::pipeline::gateway::ModelGateway;
use crate::progress::{CorrectionProgressCallback, ProgressCallback};
use crate::prompts::{TABLE_PLACEHOLDER, TEXT_PLACEHOLDER};
use crate::schema::BlockType;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

pub use crate::pipeline::geometry::CellGeometry;

/// Configuration for a correction pass.
///
/// Built via [`CorrectionConfig::builder()`] or using
/// [`CorrectionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_refine::CorrectionConfig;
///
/// let config = CorrectionConfig::builder()
///     .concurrency(4)
///     .model("gpt-4.1-nano")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct CorrectionConfig {
    /// Number of concurrent model calls. Default: 10.
    ///
    /// Calls are network-bound. Lower this if the provider answers with
    /// rate-limit errors (`429`).
    pub concurrency: usize,

    /// LLM model identifier, e.g. "gpt-4.1-nano". If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed gateway. Takes precedence over every provider setting.
    pub gateway: Option<Arc<dyn ModelGateway>>,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Correction is transcription, not generation: keep it near zero.
    pub temperature: f32,

    /// Maximum tokens the model may generate per block. Default: 4096.
    ///
    /// Large tables serialise to long HTML; too low a limit truncates the
    /// reply, which then fails the length or cell-count checks.
    pub max_tokens: usize,

    /// Maximum retry attempts on a transport failure. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Fraction of a block's size added on every side before cropping its
    /// image. Default: 0.01.
    pub image_expansion_ratio: f32,

    /// How rebuilt table cells get their bounding boxes. Default: [`CellGeometry::GridOffset`].
    pub cell_geometry: CellGeometry,

    pub handwriting: HandwritingConfig,

    pub table: TableConfig,

    /// Receives per-block progress events. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            model: None,
            provider_name: None,
            provider: None,
            gateway: None,
            temperature: 0.1,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            image_expansion_ratio: 0.01,
            cell_geometry: CellGeometry::default(),
            handwriting: HandwritingConfig::default(),
            table: TableConfig::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for CorrectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrectionConfig")
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("gateway", &self.gateway.as_ref().map(|_| "<dyn ModelGateway>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("image_expansion_ratio", &self.image_expansion_ratio)
            .field("cell_geometry", &self.cell_geometry)
            .field("handwriting", &self.handwriting)
            .field("table", &self.table)
            .finish()
    }
}

impl CorrectionConfig {
    /// Create a new builder for `CorrectionConfig`.
    pub fn builder() -> CorrectionConfigBuilder {
        CorrectionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Check cross-field constraints. Called by [`CorrectionConfigBuilder::build`]
    /// and again by the dispatcher, since fields are public.
    pub fn validate(&self) -> Result<(), RefineError> {
        if self.concurrency == 0 {
            return Err(RefineError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if !(0.0..=1.0).contains(&self.image_expansion_ratio) {
            return Err(RefineError::InvalidConfig(format!(
                "image_expansion_ratio must be 0–1, got {}",
                self.image_expansion_ratio
            )));
        }
        check_prompt(&self.handwriting.prompt, TEXT_PLACEHOLDER, "handwriting")?;
        check_prompt(&self.table.prompt, TABLE_PLACEHOLDER, "table")?;
        check_ratio(self.handwriting.min_length_ratio, "handwriting.min_length_ratio")?;
        check_ratio(self.table.min_text_ratio, "table.min_text_ratio")?;
        Ok(())
    }
}

fn check_prompt(prompt: &Option<String>, placeholder: &str, which: &str) -> Result<(), RefineError> {
    match prompt {
        Some(p) if !p.contains(placeholder) => Err(RefineError::InvalidConfig(format!(
            "custom {} prompt must contain the {} placeholder",
            which, placeholder
        ))),
        _ => Ok(()),
    }
}

fn check_ratio(value: f32, name: &str) -> Result<(), RefineError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(RefineError::InvalidConfig(format!(
            "{} must be 0–1, got {}",
            name, value
        )))
    }
}

/// Settings for the handwriting / equation re-reading processor.
#[derive(Debug, Clone)]
pub struct HandwritingConfig {
    /// Default: true.
    pub enabled: bool,
    /// Block types this processor corrects. Default: `[Handwriting, Equation]`.
    pub block_types: Vec<BlockType>,
    /// Custom prompt; must contain `{extracted_text}`. Default: built-in.
    pub prompt: Option<String>,
    /// Reject a correction shorter than this fraction of the original text.
    /// Default: 0.5.
    pub min_length_ratio: f32,
}

impl Default for HandwritingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            block_types: vec![BlockType::Handwriting, BlockType::Equation],
            prompt: None,
            min_length_ratio: 0.5,
        }
    }
}

/// Settings for the table correction processor.
#[derive(Debug, Clone)]
pub struct TableConfig {
    /// Default: true.
    pub enabled: bool,
    /// Block types this processor corrects. Default: `[Table, TableOfContents]`.
    pub block_types: Vec<BlockType>,
    /// Custom prompt; must contain `{block_html}`. Default: built-in.
    pub prompt: Option<String>,
    /// Tables with more distinct rows than this are skipped. Default: 75.
    ///
    /// Very long tables blow past output-token limits and come back truncated.
    pub max_row_count: usize,
    /// Skip tables that have no cell children. Default: false.
    pub require_cells: bool,
    /// Reject a correction whose total cell text is shorter than this
    /// fraction of the original. Default: 0.5.
    pub min_text_ratio: f32,
    /// Reject a correction that reconstructs into fewer cells. Default: 2.
    pub min_cells: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            block_types: vec![BlockType::Table, BlockType::TableOfContents],
            prompt: None,
            max_row_count: 75,
            require_cells: false,
            min_text_ratio: 0.5,
            min_cells: 2,
        }
    }
}

/// Builder for [`CorrectionConfig`].
#[derive(Debug)]
pub struct CorrectionConfigBuilder {
    config: CorrectionConfig,
}

impl CorrectionConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn gateway(mut self, gateway: Arc<dyn ModelGateway>) -> Self {
        self.config.gateway = Some(gateway);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn image_expansion_ratio(mut self, ratio: f32) -> Self {
        self.config.image_expansion_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn cell_geometry(mut self, geometry: CellGeometry) -> Self {
        self.config.cell_geometry = geometry;
        self
    }

    pub fn handwriting(mut self, handwriting: HandwritingConfig) -> Self {
        self.config.handwriting = handwriting;
        self
    }

    pub fn table(mut self, table: TableConfig) -> Self {
        self.config.table = table;
        self
    }

    pub fn handwriting_enabled(mut self, v: bool) -> Self {
        self.config.handwriting.enabled = v;
        self
    }

    pub fn table_enabled(mut self, v: bool) -> Self {
        self.config.table.enabled = v;
        self
    }

    pub fn handwriting_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.handwriting.prompt = Some(prompt.into());
        self
    }

    pub fn table_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.table.prompt = Some(prompt.into());
        self
    }

    pub fn max_table_rows(mut self, n: usize) -> Self {
        self.config.table.max_row_count = n;
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn CorrectionProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<CorrectionConfig, RefineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
