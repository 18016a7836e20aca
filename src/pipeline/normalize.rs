//! Local normalization: cheap, deterministic cleanup of model output.
//!
//! Two entry points with different scopes:
//!
//! - [`clean_model_output`] runs on every single model response before the
//!   responses are joined. It undoes transport-level quirks (outer fences,
//!   CRLF, invisible characters) and never changes Markdown structure.
//! - [`normalize_markdown`] runs once on the joined document. It isolates
//!   bold spans on their own lines, collapses blank-line runs and rewrites
//!   `-` bullets to `*`. Fenced code blocks are passed through untouched.
//!
//! ## Rule Order
//!
//! Bold isolation runs before blank-line collapsing because it may insert
//! newlines next to existing ones; bullet rewriting runs last because it
//! only looks at line starts, which the first two rules can create but
//! never destroy. With this order a second pass is a no-op.

use once_cell::sync::Lazy;
use regex::Regex;

use super::extract::RE_CODE_BLOCK;

/// Normalize joined Markdown. Pure, total and idempotent.
pub fn normalize_markdown(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 16);
    let mut last = 0;
    for fence in RE_CODE_BLOCK.find_iter(input) {
        out.push_str(&normalize_prose(&input[last..fence.start()]));
        out.push_str(fence.as_str());
        last = fence.end();
    }
    out.push_str(&normalize_prose(&input[last..]));
    out
}

fn normalize_prose(segment: &str) -> String {
    let s = isolate_bold(segment);
    let s = collapse_blank_lines(&s);
    canonical_bullets(&s)
}

// ── Rule 1: Bold spans on their own line ─────────────────────────────────────

static RE_BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*[^*\n]+\*\*").unwrap());

fn isolate_bold(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 8);
    let mut last = 0;
    for m in RE_BOLD.find_iter(input) {
        out.push_str(&input[last..m.start()]);
        if m.start() > 0 && !input[..m.start()].ends_with('\n') {
            out.push('\n');
        }
        out.push_str(m.as_str());
        if m.end() < input.len() && !input[m.end()..].starts_with('\n') {
            out.push('\n');
        }
        last = m.end();
    }
    out.push_str(&input[last..]);
    out
}

// ── Rule 2: Collapse blank-line runs ─────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").into_owned()
}

// ── Rule 3: Canonical bullet marker ──────────────────────────────────────────

static RE_DASH_BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^([ \t]*)-([ \t])").unwrap());

fn canonical_bullets(input: &str) -> String {
    RE_DASH_BULLET.replace_all(input, "${1}*${2}").into_owned()
}

/// Sanitize one raw model response.
///
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Strip an outer ```` ```markdown ```` fence the model added despite the prompt
/// 3. Trim trailing whitespace per line
/// 4. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens…)
/// 5. Trim leading and trailing blank lines
pub fn clean_model_output(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = strip_markdown_fences(&s);
    let s = trim_trailing_whitespace(&s);
    let s = remove_invisible_chars(&s);
    s.trim_matches('\n').to_string()
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// Only a fence labelled as Markdown is unwrapped; a bare fence may be a
// genuine code block.
static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)[ \t]*\n(.*)\n```\s*$").unwrap());

fn strip_markdown_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .split('\n')
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}
