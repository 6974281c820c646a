// src/core/diagnostics.rs
//! Pretty, colored, file+line diagnostics.

use colored::Colorize;

use crate::core::semantic_analyzer::{SemanticDiagnostic, Severity};

pub struct Span {
    pub line: usize,
    pub col: usize,
    pub len: usize, // underline length (use 1 if unknown)
}

impl Span {
    pub fn single(line: usize, col: usize) -> Self {
        Self { line, col, len: 1 }
    }

    pub fn sized(line: usize, col: usize, len: usize) -> Self {
        Self { line, col, len }
    }
}

pub fn print_error(filename: &str, source: &str, title: &str, span: Span) {
    print_diagnostic(filename, source, "error:", title, span, true);
}

pub fn print_warning(filename: &str, source: &str, title: &str, span: Span) {
    print_diagnostic(filename, source, "warning:", title, span, false);
}

/// Render the analyzer's findings. Advisory: callers report and move on.
pub fn print_semantic(filename: &str, source: &str, diagnostics: &[SemanticDiagnostic]) {
    for diag in diagnostics {
        let span = Span::sized(diag.line, diag.column, diag.length);
        match diag.severity {
            Severity::Error => print_error(filename, source, &diag.message, span),
            Severity::Warning => print_warning(filename, source, &diag.message, span),
        }
    }
}

fn print_diagnostic(
    filename: &str,
    source: &str,
    header: &str,
    title: &str,
    span: Span,
    is_error: bool,
) {
    let head = if is_error {
        header.bright_red().bold()
    } else {
        header.yellow().bold()
    };
    eprintln!("{} {}", head, title.bright_white());
    let (ln, col) = (span.line, span.col);
    let line_text = nth_line(source, ln).unwrap_or_default();

    let ln_str = format!("{:>4}", ln);
    eprintln!(
        "{} {}",
        "-->".bright_blue(),
        format!("{}:{}:{}", filename, ln, col).bright_white()
    );
    eprintln!(" {} {}", ln_str.dimmed(), "|".dimmed());
    eprintln!("{} {} {}", ln_str.dimmed(), "|".dimmed(), line_text);

    let underline = " ".repeat(col.saturating_sub(1)) + &"^".repeat(span.len.max(1));
    let marker = if is_error {
        underline.bright_red()
    } else {
        underline.yellow()
    };
    eprintln!(" {} {} {}", " ".repeat(ln_str.len()).dimmed(), "|".dimmed(), marker);
    eprintln!();
}

fn nth_line(src: &str, n: usize) -> Option<String> {
    src.lines().nth(n.saturating_sub(1)).map(|s| s.to_string())
}
