//! Post-processing: deterministic cleanup of model replies.
//!
//! Even well-prompted models wrap their answer in ` ```html ... ``` ` fences,
//! use Windows line endings, or sprinkle zero-width characters into text.
//! These rules undo that before anything is validated or stored, so the
//! validators only ever see the content itself.
//!
//! Each rule is a pure `&str → String` function and independently testable.

use once_cell::sync::Lazy;
use pulldown_cmark::{html, Options, Parser};
use regex::Regex;

/// Lower-case start of the "No corrections needed." answer the table prompt
/// asks for when the current markup is already right.
pub const NO_CORRECTIONS_PREFIX: &str = "no corrections";

/// Clean a raw reply value: normalise line endings, drop invisible
/// characters, strip wrapping code fences, trim.
pub fn clean_reply(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    strip_code_fences(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ──────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Strip wrapping code fences ───────────────────────────────────────
//
// The opening and closing fences are handled separately: a reply cut off by
// the token limit still starts with ```html but never closes it.

static RE_LEADING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^```[A-Za-z0-9_+-]*[ \t]*(?:\n|$)").unwrap());
static RE_TRAILING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:^|\n)```\s*$").unwrap());

/// Remove a leading ` ```lang ` line and a trailing ` ``` ` line, then trim.
pub fn strip_code_fences(input: &str) -> String {
    let s = input.trim();
    let s = RE_LEADING_FENCE.replace(s, "");
    let s = RE_TRAILING_FENCE.replace(&s, "");
    s.trim().to_string()
}

// ── Sentinel detection ───────────────────────────────────────────────────────

/// Whether a cleaned reply is the "no corrections needed" answer.
///
/// Case-insensitive, tolerant of surrounding whitespace and a trailing full
/// stop. Markup that merely mentions the phrase inside a cell does not match.
pub fn is_no_corrections(reply: &str) -> bool {
    let s = reply.trim().trim_end_matches('.').trim();
    s.to_lowercase().starts_with(NO_CORRECTIONS_PREFIX)
}

// ── Markdown → HTML ──────────────────────────────────────────────────────────

/// Render corrected Markdown into the HTML stored on the block.
///
/// Raw inline HTML (`<math>…</math>`) passes through untouched.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(markdown, options);
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

// ── Tests ────────────────────────────────────────────────────────────────────
