//! Handwriting and equation re-reading.
//!
//! OCR on handwriting and math is poor, but a vision model looking at the
//! crop together with the OCR text usually recovers it. The reply is
//! Markdown, which replaces the block's rendered HTML.

use crate::config::CorrectionConfig;
use crate::error::BlockError;
use crate::pipeline::extract::block_image_data;
use crate::pipeline::gateway::ModelResponse;
use crate::pipeline::postprocess::{clean_reply, markdown_to_html};
use crate::processors::{required_str, Preparation, ProcessorKind, PromptContext, Verdict, MARKDOWN_KEY};
use crate::prompts::{build_prompt, TEXT_PLACEHOLDER};
use crate::schema::{BlockId, Page};

pub fn prepare(page: &Page, block_id: BlockId, config: &CorrectionConfig) -> Preparation {
    let Some(block) = page.get_block(block_id) else {
        return Preparation::Skip("block not found".into());
    };
    let text = page.raw_text(block_id);
    if text.trim().is_empty() {
        return Preparation::Skip("no extracted text".into());
    }

    let kind = ProcessorKind::Handwriting;
    let prompt = build_prompt(kind.prompt_template(config), TEXT_PLACEHOLDER, &text);
    let image = block_image_data(page, block, config.image_expansion_ratio);

    Preparation::Ready(Box::new(PromptContext {
        block_id,
        kind,
        original_len: text.chars().count(),
        original: text,
        prompt,
        image,
    }))
}

/// Accept the Markdown unless it is missing or much shorter than the OCR text.
///
/// Length is measured on the raw reply, before fences are stripped.
pub fn validate(ctx: &PromptContext, response: &ModelResponse, config: &CorrectionConfig) -> Verdict {
    let markdown = match required_str(response, MARKDOWN_KEY) {
        Ok(m) => m,
        Err(e) => return Verdict::Reject(e),
    };

    let corrected = markdown.chars().count();
    let threshold = ctx.original_len as f32 * config.handwriting.min_length_ratio;
    if (corrected as f32) < threshold {
        return Verdict::Reject(BlockError::TooShort {
            corrected,
            original: ctx.original_len,
        });
    }

    let cleaned = clean_reply(markdown);
    Verdict::Replace {
        html: markdown_to_html(&cleaned),
    }
}
