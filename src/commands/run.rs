use std::fs;
use std::path::Path;

use colored::Colorize;

use crate::core::diagnostics::{print_error, print_semantic, Span};
use crate::core::interpreter::Interpreter;
use crate::core::lexer::Lexer;
use crate::core::parser::Parser as AbParser;
use crate::core::semantic_analyzer::SemanticAnalyzer;

/// Append `.ab` when the path does not already carry it.
pub fn resolve_script_path(path: &Path) -> std::path::PathBuf {
    let display = path.to_string_lossy();
    if display.ends_with(".ab") {
        path.to_path_buf()
    } else {
        std::path::PathBuf::from(format!("{}.ab", display))
    }
}

/// Execute a script file and report the process exit code: 0 on success,
/// 1 on a missing file or any lexical/parse/runtime error.
pub fn run_file(path: &Path, pretty: bool, no_sema: bool) -> i32 {
    let path = resolve_script_path(path);
    let source = match fs::read_to_string(&path) {
        Ok(source) => source,
        Err(_) => {
            // Distinct from language errors: the driver-level contract.
            println!("Error: File not found: {}", path.display());
            return 1;
        }
    };
    run_source(&source, &path.display().to_string(), pretty, no_sema)
}

pub fn run_source(source: &str, filename: &str, pretty: bool, no_sema: bool) -> i32 {
    // Lex
    let tokens = match Lexer::new(source).tokenize() {
        Ok(tokens) => tokens,
        Err(e) => {
            if pretty {
                let (line, col) = e.position();
                print_error(filename, source, &e.to_string(), Span::single(line, col));
            } else {
                println!("Error: {}", e);
            }
            return 1;
        }
    };

    // Parse
    let program = match AbParser::new(tokens).parse() {
        Ok(program) => program,
        Err(e) => {
            if pretty {
                print_error(filename, source, &e.message, Span::single(e.line, e.column));
            } else {
                println!("Error: {}", e);
            }
            return 1;
        }
    };

    // Analyze. Diagnostics are advisory: they are reported and execution
    // proceeds regardless.
    if !no_sema {
        let diagnostics = SemanticAnalyzer::new().analyze(&program);
        if !diagnostics.is_empty() {
            if pretty {
                print_semantic(filename, source, &diagnostics);
            } else {
                for diag in &diagnostics {
                    eprintln!(
                        "{} {} (line {})",
                        "sema:".yellow().bold(),
                        diag.message,
                        diag.line
                    );
                }
            }
        }
    }

    // Interpret
    match Interpreter::new().interpret(&program) {
        Ok(_) => 0,
        Err(e) => {
            println!("Error: {}: {}", e.kind_name(), e.message);
            1
        }
    }
}
