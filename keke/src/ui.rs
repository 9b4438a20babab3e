//! Human-facing console output.
//!
//! Product output goes through here so every user-visible line is a single,
//! readable status line. Developer diagnostics use `tracing` instead (see
//! [`crate::logging`]).

use console::style;

/// Longest tool output shown inline after an action completes.
pub const INLINE_OUTPUT_LIMIT: usize = 200;
/// Characters kept when a longer output is previewed.
pub const PREVIEW_CHARS: usize = 100;

pub fn info(msg: impl AsRef<str>) {
    println!("{} {}", style("►").cyan().dim(), msg.as_ref());
}

pub fn success(msg: impl AsRef<str>) {
    println!("{} {}", style("✓").green().bold(), msg.as_ref());
}

pub fn warning(msg: impl AsRef<str>) {
    println!("{} {}", style("⚠").yellow().bold(), msg.as_ref());
}

pub fn error(msg: impl AsRef<str>) {
    println!("{} {}", style("✗").red().bold(), msg.as_ref());
}

pub fn plain(msg: impl AsRef<str>) {
    println!("{}", msg.as_ref());
}

pub fn blank() {
    println!();
}

pub fn divider() {
    println!("{}", style("─".repeat(40)).dim());
}

/// Styled question label used by the terminal prompter.
pub fn prompt_label(question: &str) -> String {
    format!("{} {}", style("►").cyan().dim(), question)
}

/// Inline preview of tool output: short output verbatim, long output cut
/// to [`PREVIEW_CHARS`] characters plus its byte length.
pub fn preview(output: &str) -> String {
    if output.len() < INLINE_OUTPUT_LIMIT {
        return output.to_string();
    }
    format!("{}... ({} bytes)", truncate_chars(output, PREVIEW_CHARS), output.len())
}

/// Truncate to at most `max` characters without splitting a UTF-8 sequence.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
