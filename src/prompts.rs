//! Prompt templates for block correction.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth**: changing what the model is asked to do
//!    requires editing exactly one place.
//!
//! 2. **Testability**: unit tests can import and inspect prompts directly
//!    without a live model, making prompt regressions easy to catch.
//!
//! Each template carries exactly one placeholder token which the prompt
//! builder replaces with the block's current content. Callers can override
//! a template via [`crate::config::HandwritingConfig::prompt`] /
//! [`crate::config::TableConfig::prompt`]; overrides must keep the token.

use crate::pipeline::gateway::ResponseSchema;

/// Placeholder replaced with the block's extracted text.
pub const TEXT_PLACEHOLDER: &str = "{extracted_text}";

/// Placeholder replaced with the table's current HTML.
pub const TABLE_PLACEHOLDER: &str = "{block_html}";

/// Default prompt for re-reading handwriting and equation blocks.
pub const HANDWRITING_PROMPT: &str = r#"You are an expert editor specializing in accurately reproducing text from images.
You will receive an image of a text block, along with the text that can be extracted. Your task is to generate markdown to properly represent the content of the image. Do not omit any text present in the image - make sure everything is included in the markdown representation. The markdown representation should be as faithful to the original image as possible.

Formatting should be in markdown, with the following rules:
- * for italics, ** for bold, and ` for inline code.
- Headers should be formatted with #, with one # for the largest header, and up to 6 for the smallest.
- Lists should be formatted with either - or 1. for unordered and ordered lists, respectively.
- Links should be formatted with [text](url).
- Use ``` for code blocks.
- Inline math should be formatted with <math>math expression</math>.
- Display math should be formatted with <math display="block">math expression</math>.
- Values and labels should be extracted from forms, and put into markdown tables, with the labels on the left side, and values on the right. The headers should be "Labels" and "Values". Other text in the form can appear between the tables.
- Tables should be formatted with markdown tables, with the headers bolded.

**Instructions:**
1. Carefully examine the provided block image.
2. Analyze the existing text representation.
3. Output the markdown representing the content of the image.
**Example:**
Input:
```text
This i sm handwritting.
```
Output:
```markdown
This is some *handwriting*.
```
**Input:**
```text
{extracted_text}
```
"#;

/// Default prompt for correcting table HTML.
pub const TABLE_PROMPT: &str = r#"You are a text correction expert specializing in accurately reproducing text from images.
You will receive an image of a text block and an html representation of the table in the image.
Your task is to correct any errors in the html representation. The html representation should be as faithful to the original table as possible.

Some guidelines:
- Make sure to reproduce the original values as faithfully as possible.
- If you see any math in a table cell, fence it with the <math display="inline"> tag. Block math should be fenced with <math display="block">.
- Replace any images with a description, like "Image: [description]".
- Only use the tags th, td, tr, span, i, b, math, and table. Only use the attributes display, style, colspan, and rowspan if necessary.

**Instructions:**
1. Carefully examine the provided text block image.
2. Analyze the html representation of the table.
3. If the html representation is largely correct, or you cannot read the image properly, then write "No corrections needed."
4. If the html representation contains errors, generate the corrected html representation.
5. Output only either the corrected html representation or "No corrections needed."
**Example:**
Input:
```html
<table>
    <tr>
        <th>First Name</th>
        <th>Last Name</th>
        <th>Age</th>
    </tr>
    <tr>
        <td>John</td>
        <td>Doe</td>
        <td>25</td>
    </tr>
</table>
```
Output:
```html
No corrections needed.
```
**Input:**
```html
{block_html}
```
"#;

/// Substitute `content` for `placeholder` in `template`.
pub fn build_prompt(template: &str, placeholder: &str, content: &str) -> String {
    template.replacen(placeholder, content, 1)
}

/// System message telling the model to answer with a JSON object matching
/// `schema`.
pub fn json_response_instructions(schema: &ResponseSchema) -> String {
    let fields: Vec<String> = schema
        .fields
        .iter()
        .map(|f| format!("  \"{}\": <{}>", f.name, f.kind.json_name()))
        .collect();
    format!(
        "Respond with a single JSON object and nothing else. \
         It must contain exactly these keys:\n{{\n{}\n}}\n\
         Do not wrap the JSON in code fences.",
        fields.join(",\n")
    )
}
