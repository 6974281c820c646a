//! Interactive REPL: banner, `:command` handling, multi-line buffering,
//! auto-printed expression results, and environment display.

use std::collections::HashSet;
use std::io::{self, Write};

use colored::Colorize;

use crate::cli::VERSION;
use crate::commands::run::resolve_script_path;
use crate::core::builtins;
use crate::core::interpreter::{Interpreter, RuntimeError, RuntimeErrorKind};
use crate::core::lexer::Lexer;
use crate::core::parser::Parser as AbParser;
use crate::core::ast::Stmt;
use crate::core::value::Value;

const BANNER: &str = r#"
╔══════════════════════════════════════════════╗
║                A R Y A N B L O C K           ║
║                                              ║
║    Type :help for commands, :quit to exit    ║
╚══════════════════════════════════════════════╝
"#;

const HELP_TEXT: &str = r#"
╔══════════════════════════════════════════════╗
║            AryanBlock REPL Commands          ║
╠══════════════════════════════════════════════╣
║  :help, :h      Show this help message       ║
║  :quit, :q      Exit the REPL                ║
║  :clear, :c     Clear the screen             ║
║  :reset, :r     Reset interpreter state      ║
║  :env, :e       Show current variables       ║
║  :load <file>   Load and run a .ab file      ║
║  :version       Show version info            ║
╠══════════════════════════════════════════════╣
║  Tips:                                       ║
║  • Expressions are automatically printed     ║
║  • Use 'let' for immutable, 'mut' for        ║
║    mutable vars                              ║
║  • End multi-line input with empty line      ║
╚══════════════════════════════════════════════╝
"#;

pub fn start() -> anyhow::Result<()> {
    let mut repl = Repl::new();
    repl.run()
}

struct Repl {
    interpreter: Interpreter,
    buffer: Vec<String>,
    running: bool,
}

impl Repl {
    fn new() -> Self {
        Self {
            interpreter: Interpreter::new(),
            buffer: Vec::new(),
            running: false,
        }
    }

    fn run(&mut self) -> anyhow::Result<()> {
        self.running = true;
        print_banner();

        while self.running {
            let prompt = if self.buffer.is_empty() { "ab> " } else { "... " };
            print!("{}", prompt.bright_magenta().bold());
            io::stdout().flush().ok();

            let mut line = String::new();
            if io::stdin().read_line(&mut line)? == 0 {
                println!("\n★ Goodbye! ★");
                break;
            }
            let line = line.trim_end_matches(&['\r', '\n'][..]).to_string();

            if line.starts_with(':') && self.buffer.is_empty() {
                self.handle_command(&line);
                continue;
            }

            if self.is_incomplete(&line) || !self.buffer.is_empty() {
                self.buffer.push(line.clone());
                if line.is_empty() {
                    let source = self.buffer[..self.buffer.len() - 1].join("\n");
                    self.buffer.clear();
                    if !source.trim().is_empty() {
                        self.execute(&source);
                    }
                }
                continue;
            }

            if !line.trim().is_empty() {
                self.execute(&line);
            }
        }
        Ok(())
    }

    fn handle_command(&mut self, command: &str) {
        let mut parts = command.splitn(2, char::is_whitespace);
        let cmd = parts.next().unwrap_or("").to_lowercase();
        let args = parts.next().unwrap_or("").trim();

        match cmd.as_str() {
            ":help" | ":h" => print!("{}", HELP_TEXT),
            ":quit" | ":q" | ":exit" => {
                println!("★ Goodbye! ★");
                self.running = false;
            }
            ":clear" | ":c" | ":cls" => {
                print!("\x1b[2J\x1b[H");
                print_banner();
            }
            ":reset" | ":r" => {
                self.interpreter = Interpreter::new();
                println!("{} Interpreter state reset", "✓".green());
            }
            ":env" | ":e" => self.show_environment(),
            ":load" | ":l" => {
                if args.is_empty() {
                    println!("{} Usage: :load <filename>", "✗".red());
                } else {
                    self.load_file(args);
                }
            }
            ":version" => println!("AryanBlock v{}", VERSION),
            other => {
                println!("{} Unknown command: {}", "✗".red(), other);
                println!("  Type :help for available commands");
            }
        }
    }

    fn execute(&mut self, source: &str) {
        let tokens = match Lexer::new(source).tokenize() {
            Ok(tokens) => tokens,
            Err(e) => {
                println!("{} Syntax Error: {}", "✗".red(), e);
                return;
            }
        };
        let program = match AbParser::new(tokens).parse() {
            Ok(program) => program,
            Err(e) => {
                println!("{} Syntax Error: {}", "✗".red(), e);
                return;
            }
        };

        // A sole expression statement is evaluated and auto-printed.
        if program.start_block.is_none() && program.statements.len() == 1 {
            if let Stmt::Expression(expr) = &program.statements[0] {
                match self.interpreter.eval_expression(expr) {
                    Ok(value) => self.print_result(&value),
                    Err(e) => print_runtime_error(&e),
                }
                return;
            }
        }

        for stmt in &program.statements {
            if let Err(e) = self.interpreter.run_statement(stmt) {
                print_runtime_error(&e);
                return;
            }
        }
        if program.start_block.is_some() {
            let entry = crate::core::ast::Program {
                statements: Vec::new(),
                start_block: program.start_block,
            };
            match self.interpreter.interpret(&entry) {
                Ok(Some(value)) => self.print_result(&value),
                Ok(None) => {}
                Err(e) => print_runtime_error(&e),
            }
        }
    }

    fn print_result(&self, value: &Value) {
        if matches!(value, Value::Null) {
            return;
        }
        println!("→ {}", value);
    }

    fn is_incomplete(&self, line: &str) -> bool {
        let opens = line.matches(&['{', '(', '['][..]).count();
        let closes = line.matches(&['}', ')', ']'][..]).count();
        if opens > closes {
            return true;
        }
        let stripped = line.trim_end();
        ["and", "or", "+", "-", "*", "/", "|>", "=>", "->"]
            .iter()
            .any(|op| stripped.ends_with(op))
    }

    fn show_environment(&self) {
        let builtin_names: HashSet<&str> =
            builtins::registry().into_iter().map(|(name, _)| name).collect();
        let globals = self.interpreter.globals().borrow();

        println!();
        println!("╔══════════════════════════════╗");
        println!("║     Current Environment      ║");
        println!("╠══════════════════════════════╣");

        if !globals.variables.is_empty() {
            println!("║ Variables:");
            for (name, var) in &globals.variables {
                let marker = if var.mutable {
                    "mut "
                } else if var.constant {
                    "const "
                } else {
                    ""
                };
                println!("║   {}{} = {}", marker, name, var.value);
            }
        }

        let user_funcs: Vec<&String> = globals
            .functions
            .keys()
            .filter(|name| !builtin_names.contains(name.as_str()))
            .collect();
        if !user_funcs.is_empty() {
            println!("║ Functions:");
            for name in user_funcs {
                println!("║   func {}()", name);
            }
        }

        if !globals.classes.is_empty() {
            println!("║ Classes:");
            for name in globals.classes.keys() {
                println!("║   class {}", name);
            }
        }

        if !globals.blocks.is_empty() {
            println!("║ Blocks:");
            for name in globals.blocks.keys() {
                println!("║   block {}", name);
            }
        }

        println!("╚══════════════════════════════╝");
        println!();
    }

    fn load_file(&mut self, filename: &str) {
        let path = resolve_script_path(std::path::Path::new(filename));
        let source = match std::fs::read_to_string(&path) {
            Ok(source) => source,
            Err(_) => {
                println!("{} File not found: {}", "✗".red(), path.display());
                return;
            }
        };
        println!("► Loading {}...", path.display());
        let tokens = match Lexer::new(&source).tokenize() {
            Ok(tokens) => tokens,
            Err(e) => {
                println!("{} Syntax Error: {}", "✗".red(), e);
                return;
            }
        };
        let program = match AbParser::new(tokens).parse() {
            Ok(program) => program,
            Err(e) => {
                println!("{} Syntax Error: {}", "✗".red(), e);
                return;
            }
        };
        match self.interpreter.interpret(&program) {
            Ok(_) => println!("{} Loaded {} successfully", "✓".green(), path.display()),
            Err(e) => print_runtime_error(&e),
        }
    }
}

fn print_banner() {
    println!("{}", BANNER.bright_magenta());
    println!("    Version {}\n", VERSION);
}

fn print_runtime_error(error: &RuntimeError) {
    match error.kind {
        RuntimeErrorKind::Name => println!("{} Name Error: {}", "✗".red(), error.message),
        RuntimeErrorKind::Type => println!("{} Type Error: {}", "✗".red(), error.message),
        RuntimeErrorKind::ZeroDivision => println!("{} Error: Division by zero", "✗".red()),
        _ => println!("{} Error: {}", "✗".red(), error.message),
    }
}
