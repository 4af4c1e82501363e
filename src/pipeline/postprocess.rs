//! Post-processing: deterministic cleanup of extracted text.
//!
//! Vision models sometimes wrap their answer in a ```` ```markdown ```` fence
//! despite being told not to, emit CRLF line endings, or sprinkle zero-width
//! characters. The pdfium text layer has its own quirks (CRLF, runs of blank
//! lines from empty text boxes). Both paths go through the same small set of
//! pure `&str → String` rules so page outputs concatenate cleanly.
//!
//! Rules (applied in order):
//! 1. Strip an outer code fence (vision output only)
//! 2. Normalise line endings (CRLF / CR → LF)
//! 3. Trim trailing whitespace per line
//! 4. Collapse runs of blank lines to a single blank line
//! 5. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
//! 6. Trim leading and trailing blank space of the whole text

use once_cell::sync::Lazy;
use regex::Regex;

/// Clean the raw text returned by a vision engine.
pub fn clean_markdown(input: &str) -> String {
    let s = strip_outer_fence(input);
    clean_text(&s)
}

/// Clean a page's native text layer.
pub fn clean_native_text(input: &str) -> String {
    clean_text(input)
}

fn clean_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    s.trim().to_string()
}

// ── Rule 1: Strip outer code fence ───────────────────────────────────────────

static RE_OPENING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^```[A-Za-z]*[ \t]*\r?\n").unwrap());

/// Opening and closing fences are removed independently: models often emit
/// the opener and get cut off before the closer.
fn strip_outer_fence(input: &str) -> String {
    let trimmed = input.trim();
    let body = match RE_OPENING_FENCE.find(trimmed) {
        Some(m) => &trimmed[m.end()..],
        None => trimmed,
    };
    let body = body.trim_end();
    let body = body.strip_suffix("```").unwrap_or(body);
    body.to_string()
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse blank-line runs ─────────────────────────────────────────

static RE_BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_RUN.replace_all(input, "\n\n").into_owned()
}

// ── Rule 5: Remove invisible Unicode characters ──────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        ['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}'],
        "",
    )
}
