//! Correction processors: one per kind of block the model can repair.
//!
//! The set is a closed, static registry. Each [`ProcessorKind`] names its
//! prompt placeholder, default template and response schema in a
//! [`ProcessorSpec`], and implements two pure steps:
//!
//! * **prepare**: read-only: gather the block's current content, crop its
//!   image and fill the prompt, or decide to skip it.
//! * **validate**: decide what a model reply means for the block, without
//!   touching the document.
//!
//! Applying a [`Verdict`] to the document is the dispatcher's job.

pub mod handwriting;
pub mod table;

use crate::config::CorrectionConfig;
use crate::error::BlockError;
use crate::pipeline::gateway::{ModelResponse, ResponseSchema, SchemaField, ValueKind};
use crate::pipeline::grid::GridReconstruction;
use crate::prompts::{HANDWRITING_PROMPT, TABLE_PLACEHOLDER, TABLE_PROMPT, TEXT_PLACEHOLDER};
use crate::schema::{BlockId, BlockType, Page};
use edgequake_llm::ImageData;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A correction processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessorKind {
    /// Re-reads handwriting and equation blocks as Markdown.
    Handwriting,
    /// Corrects table markup and rebuilds the cell grid.
    Table,
}

/// Static description of a processor.
#[derive(Debug)]
pub struct ProcessorSpec {
    pub kind: ProcessorKind,
    pub placeholder: &'static str,
    pub default_prompt: &'static str,
    pub schema: ResponseSchema,
}

/// Key holding the corrected Markdown in a handwriting reply.
pub const MARKDOWN_KEY: &str = "markdown";
/// Key holding the corrected markup in a table reply.
pub const CORRECTED_HTML_KEY: &str = "corrected_html";

static HANDWRITING_FIELDS: [SchemaField; 1] = [SchemaField {
    name: MARKDOWN_KEY,
    kind: ValueKind::String,
}];

static TABLE_FIELDS: [SchemaField; 1] = [SchemaField {
    name: CORRECTED_HTML_KEY,
    kind: ValueKind::String,
}];

static HANDWRITING_SPEC: ProcessorSpec = ProcessorSpec {
    kind: ProcessorKind::Handwriting,
    placeholder: TEXT_PLACEHOLDER,
    default_prompt: HANDWRITING_PROMPT,
    schema: ResponseSchema {
        fields: &HANDWRITING_FIELDS,
        sentinel_field: None,
    },
};

static TABLE_SPEC: ProcessorSpec = ProcessorSpec {
    kind: ProcessorKind::Table,
    placeholder: TABLE_PLACEHOLDER,
    default_prompt: TABLE_PROMPT,
    schema: ResponseSchema {
        fields: &TABLE_FIELDS,
        sentinel_field: Some(CORRECTED_HTML_KEY),
    },
};

impl ProcessorKind {
    /// Every processor, in the order they claim block types.
    pub const ALL: [ProcessorKind; 2] = [ProcessorKind::Handwriting, ProcessorKind::Table];

    pub fn spec(self) -> &'static ProcessorSpec {
        match self {
            ProcessorKind::Handwriting => &HANDWRITING_SPEC,
            ProcessorKind::Table => &TABLE_SPEC,
        }
    }

    pub fn enabled(self, config: &CorrectionConfig) -> bool {
        match self {
            ProcessorKind::Handwriting => config.handwriting.enabled,
            ProcessorKind::Table => config.table.enabled,
        }
    }

    pub fn block_types(self, config: &CorrectionConfig) -> &[BlockType] {
        match self {
            ProcessorKind::Handwriting => &config.handwriting.block_types,
            ProcessorKind::Table => &config.table.block_types,
        }
    }

    /// Configured prompt template, or the built-in one.
    pub fn prompt_template(self, config: &CorrectionConfig) -> &str {
        let custom = match self {
            ProcessorKind::Handwriting => config.handwriting.prompt.as_deref(),
            ProcessorKind::Table => config.table.prompt.as_deref(),
        };
        custom.unwrap_or(self.spec().default_prompt)
    }

    /// The first enabled processor that handles `block_type`.
    pub fn for_block(config: &CorrectionConfig, block_type: BlockType) -> Option<ProcessorKind> {
        Self::ALL
            .into_iter()
            .find(|k| k.enabled(config) && k.block_types(config).contains(&block_type))
    }

    /// Gather everything the model call needs. Read-only.
    pub fn prepare(self, page: &Page, block_id: BlockId, config: &CorrectionConfig) -> Preparation {
        match self {
            ProcessorKind::Handwriting => handwriting::prepare(page, block_id, config),
            ProcessorKind::Table => table::prepare(page, block_id, config),
        }
    }

    /// Interpret a schema-valid reply.
    pub fn validate(
        self,
        ctx: &PromptContext,
        response: &ModelResponse,
        config: &CorrectionConfig,
    ) -> Verdict {
        match self {
            ProcessorKind::Handwriting => handwriting::validate(ctx, response, config),
            ProcessorKind::Table => table::validate(ctx, response, config),
        }
    }
}

impl fmt::Display for ProcessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessorKind::Handwriting => write!(f, "handwriting"),
            ProcessorKind::Table => write!(f, "table"),
        }
    }
}

/// Per-block input to a model call. Built once, consumed once.
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub block_id: BlockId,
    pub kind: ProcessorKind,
    /// Current text (handwriting) or rendered markup (table).
    pub original: String,
    /// Character count the corrected content is measured against.
    pub original_len: usize,
    pub prompt: String,
    pub image: Option<ImageData>,
}

/// Outcome of the prepare step.
#[derive(Debug, Clone)]
pub enum Preparation {
    /// Not worth a model call; the reason is reported, no error is counted.
    Skip(String),
    Ready(Box<PromptContext>),
}

/// What a reply means for the block.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Replace the block's rendered content.
    Replace { html: String },
    /// Replace the table's cell children.
    Restructure(GridReconstruction),
    /// The model confirmed the current content.
    Unchanged,
    Reject(BlockError),
}

/// Pull a required string out of a reply, as a rejection if absent.
pub(crate) fn required_str<'a>(
    response: &'a ModelResponse,
    key: &'static str,
) -> Result<&'a str, BlockError> {
    response.get_str(key).ok_or_else(|| BlockError::MissingKey {
        key: key.to_string(),
    })
}
