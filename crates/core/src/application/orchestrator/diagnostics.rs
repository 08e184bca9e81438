// Diagnostic extraction from captured tool output

use once_cell::sync::Lazy;
use regex::Regex;

use crate::port::ToolOutput;

/// CSI escape sequences (colours, cursor movement)
static ANSI_ESCAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").expect("static regex is valid")
});

/// Strip terminal escape codes from one line
pub fn strip_ansi(line: &str) -> String {
    ANSI_ESCAPE.replace_all(line, "").into_owned()
}

/// Non-empty, trimmed, escape-free lines of `text`, in order
pub fn lines_of(text: &str) -> Vec<String> {
    text.lines()
        .map(strip_ansi)
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

/// Ordered diagnostics for a failed invocation
///
/// Derived line by line from stderr. Falls back to stdout when stderr has
/// nothing, and to a synthetic exit-status line when both are empty, so a
/// failed invocation never yields an empty list.
pub fn extract_diagnostics(output: &ToolOutput) -> Vec<String> {
    let from_stderr = lines_of(&output.stderr);
    if !from_stderr.is_empty() {
        return from_stderr;
    }

    let from_stdout = lines_of(&output.stdout);
    if !from_stdout.is_empty() {
        return from_stdout;
    }

    match output.exit_code {
        Some(code) => vec![format!("tool exited with code {} and no output", code)],
        None => vec!["tool was terminated by a signal and produced no output".to_string()],
    }
}
