//! Interactive line input.
//!
//! [`Prompter`] decouples the permission gate and the restore flow from the
//! terminal. Tests use scripted prompters that return queued answers.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};

use crate::ui;

/// Source of one line of human input per question.
pub trait Prompter {
    /// Show `question` and block until one line is entered. The returned line
    /// is trimmed. End of input yields an empty string.
    fn ask(&self, question: &str) -> Result<String>;
}

/// Prompter reading from the process's stdin.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn ask(&self, question: &str) -> Result<String> {
        let mut stdout = io::stdout().lock();
        write!(stdout, "{} ", ui::prompt_label(question)).context("write prompt")?;
        stdout.flush().context("flush prompt")?;
        drop(stdout);
        read_answer(io::stdin().lock())
    }
}

fn read_answer<R: BufRead>(mut reader: R) -> Result<String> {
    let mut line = String::new();
    reader.read_line(&mut line).context("read answer")?;
    Ok(line.trim().to_string())
}

/// Whether `answer` is an affirmative reply (`y` / `yes`, any case).
pub fn is_affirmative(answer: &str) -> bool {
    let answer = answer.trim();
    answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}
