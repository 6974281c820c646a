// src/core/semantic_analyzer.rs
//! Best-effort semantic analysis: scope resolution plus advisory type
//! checking. All findings land in a diagnostics list; analysis never halts
//! on an error and never gates execution — the interpreter does not consult
//! analyzer output.

use crate::core::ast::{
    CaseBody, Expr, FunctionDecl, InitMethod, Program, Stmt, StringPart, TypeAnnotation,
};
use crate::core::builtins;
use crate::core::symbols::{Symbol, SymbolKind, SymbolTable};

#[derive(Debug, Clone, PartialEq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct SemanticDiagnostic {
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub length: usize,
    pub severity: Severity,
}

pub struct SemanticAnalyzer {
    table: SymbolTable,
    current_function: Option<String>,
    current_class: Option<String>,
    diagnostics: Vec<SemanticDiagnostic>,
}

impl Default for SemanticAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SemanticAnalyzer {
    pub fn new() -> Self {
        let mut table = SymbolTable::new();
        // Pre-register the builtin registry so calls to natives resolve.
        for (name, _) in builtins::registry() {
            table.define(Symbol::function(name, vec!["any".into()], Some("any".into())));
        }
        for (name, _) in builtins::constants() {
            table.define(Symbol::variable(name, "float", false, true));
        }
        Self {
            table,
            current_function: None,
            current_class: None,
            diagnostics: Vec::new(),
        }
    }

    /// Two passes: register all top-level declarations first so forward
    /// references resolve at module scope, then walk every statement.
    pub fn analyze(&mut self, program: &Program) -> Vec<SemanticDiagnostic> {
        for stmt in &program.statements {
            match stmt {
                Stmt::Function(decl) => {
                    let params = decl.params.iter().map(|p| p.name.clone()).collect();
                    let return_type = decl.return_type.as_ref().map(annotation_name);
                    self.table.define(
                        Symbol::function(&decl.name, params, return_type)
                            .at(decl.line, decl.column),
                    );
                }
                Stmt::Class { name, line, column, .. } => {
                    self.table
                        .define(Symbol::named(name, SymbolKind::Class).at(*line, *column));
                }
                Stmt::Block { name, line, column, .. } => {
                    self.table
                        .define(Symbol::named(name, SymbolKind::Block).at(*line, *column));
                }
                Stmt::Trait { name, line, column, .. } => {
                    self.table
                        .define(Symbol::named(name, SymbolKind::Trait).at(*line, *column));
                }
                _ => {}
            }
        }
        for stmt in &program.statements {
            self.visit_stmt(stmt);
        }
        if let Some(start) = &program.start_block {
            self.in_scope(|analyzer| {
                for stmt in start {
                    analyzer.visit_stmt(stmt);
                }
            });
        }
        std::mem::take(&mut self.diagnostics)
    }

    fn error(&mut self, message: impl Into<String>, line: usize, column: usize, length: usize) {
        self.diagnostics.push(SemanticDiagnostic {
            message: message.into(),
            line,
            column,
            length: length.max(1),
            severity: Severity::Error,
        });
    }

    fn warning(&mut self, message: impl Into<String>, line: usize, column: usize, length: usize) {
        self.diagnostics.push(SemanticDiagnostic {
            message: message.into(),
            line,
            column,
            length: length.max(1),
            severity: Severity::Warning,
        });
    }

    fn in_scope(&mut self, f: impl FnOnce(&mut Self)) {
        self.table.push_scope();
        f(self);
        self.table.pop_scope();
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::VarDecl { name, initializer, type_annotation, is_mutable, is_constant, line, column } => {
                if self.table.resolve_local(name).is_some() {
                    self.error(
                        format!("Variable '{}' is already declared in this scope", name),
                        *line,
                        *column,
                        name.len(),
                    );
                    return;
                }
                let declared = type_annotation.as_ref().map(annotation_name);
                let inferred = initializer.as_ref().map(|init| self.infer_type(init));
                if let (Some(declared), Some(inferred)) = (&declared, &inferred) {
                    if !types_compatible(declared, inferred) {
                        // Advisory only: the runtime is dynamically typed.
                        self.warning(
                            format!(
                                "Type mismatch: declared '{}', got '{}'",
                                declared, inferred
                            ),
                            *line,
                            *column,
                            name.len(),
                        );
                    }
                }
                let final_type = declared
                    .or(inferred)
                    .unwrap_or_else(|| "any".to_string());
                self.table.define(
                    Symbol::variable(name, &final_type, *is_mutable, *is_constant)
                        .at(*line, *column),
                );
                if let Some(init) = initializer {
                    self.visit_expr(init);
                }
            }
            Stmt::Function(decl) => self.visit_function(decl),
            Stmt::Class { name, parent, traits, members, init_method, line, column } => {
                if let Some(parent) = parent {
                    let ok = matches!(
                        self.table.resolve(parent),
                        Some(symbol) if symbol.kind == SymbolKind::Class
                    );
                    if !ok {
                        self.error(
                            format!("Parent class '{}' is not defined", parent),
                            *line,
                            *column,
                            parent.len(),
                        );
                    }
                }
                for trait_name in traits {
                    let ok = matches!(
                        self.table.resolve(trait_name),
                        Some(symbol) if symbol.kind == SymbolKind::Trait
                    );
                    if !ok {
                        self.error(
                            format!("Trait '{}' is not defined", trait_name),
                            *line,
                            *column,
                            trait_name.len(),
                        );
                    }
                }
                let previous_class = self.current_class.replace(name.clone());
                self.in_scope(|analyzer| {
                    analyzer.table.define(Symbol::variable("self", name, false, false));
                    for member in members {
                        analyzer.visit_stmt(member);
                    }
                    if let Some(init) = init_method {
                        analyzer.visit_init(init);
                    }
                });
                self.current_class = previous_class;
            }
            Stmt::Block { members, .. } => {
                self.in_scope(|analyzer| {
                    for member in members {
                        analyzer.visit_stmt(member);
                    }
                });
            }
            Stmt::Trait { methods, .. } => {
                for method in methods {
                    self.visit_function(method);
                }
            }
            Stmt::If { condition, then_branch, elif_branches, else_branch } => {
                self.visit_expr(condition);
                self.in_scope(|a| {
                    for stmt in then_branch {
                        a.visit_stmt(stmt);
                    }
                });
                for (cond, body) in elif_branches {
                    self.visit_expr(cond);
                    self.in_scope(|a| {
                        for stmt in body {
                            a.visit_stmt(stmt);
                        }
                    });
                }
                if let Some(body) = else_branch {
                    self.in_scope(|a| {
                        for stmt in body {
                            a.visit_stmt(stmt);
                        }
                    });
                }
            }
            Stmt::Match { value, cases } => {
                self.visit_expr(value);
                for case in cases {
                    self.visit_expr(&case.pattern);
                    match &case.body {
                        CaseBody::Block(stmts) => self.in_scope(|a| {
                            for stmt in stmts {
                                a.visit_stmt(stmt);
                            }
                        }),
                        CaseBody::Expr(expr) => self.visit_expr(expr),
                    }
                }
            }
            Stmt::For { variable, iterable, body } => {
                self.visit_expr(iterable);
                self.in_scope(|a| {
                    a.table.define(Symbol::variable(variable, "any", false, false));
                    for stmt in body {
                        a.visit_stmt(stmt);
                    }
                });
            }
            Stmt::While { condition, body } => {
                self.visit_expr(condition);
                self.in_scope(|a| {
                    for stmt in body {
                        a.visit_stmt(stmt);
                    }
                });
            }
            Stmt::Loop { count, body } => {
                self.visit_expr(count);
                self.in_scope(|a| {
                    for stmt in body {
                        a.visit_stmt(stmt);
                    }
                });
            }
            Stmt::Try { try_body, catch_var, catch_body, finally_body } => {
                self.in_scope(|a| {
                    for stmt in try_body {
                        a.visit_stmt(stmt);
                    }
                });
                if let Some(body) = catch_body {
                    self.in_scope(|a| {
                        if let Some(var) = catch_var {
                            a.table.define(Symbol::variable(var, "Error", true, false));
                        }
                        for stmt in body {
                            a.visit_stmt(stmt);
                        }
                    });
                }
                if let Some(body) = finally_body {
                    self.in_scope(|a| {
                        for stmt in body {
                            a.visit_stmt(stmt);
                        }
                    });
                }
            }
            Stmt::Return { value, line, column } => {
                if self.current_function.is_none() {
                    self.error("'return' outside of function", *line, *column, 6);
                }
                if let Some(value) = value {
                    self.visit_expr(value);
                }
            }
            Stmt::Break | Stmt::Continue => {}
            Stmt::Expression(expr) => self.visit_expr(expr),
        }
    }

    fn visit_function(&mut self, decl: &FunctionDecl) {
        let previous = self.current_function.replace(decl.name.clone());
        self.in_scope(|analyzer| {
            for param in &decl.params {
                let data_type = param
                    .type_annotation
                    .as_ref()
                    .map(annotation_name)
                    .unwrap_or_else(|| "any".to_string());
                analyzer
                    .table
                    .define(Symbol::variable(&param.name, &data_type, true, false));
                if let Some(default) = &param.default_value {
                    analyzer.visit_expr(default);
                }
            }
            for stmt in &decl.body {
                analyzer.visit_stmt(stmt);
            }
        });
        self.current_function = previous;
    }

    fn visit_init(&mut self, init: &InitMethod) {
        // `init` is a call boundary, so `return` inside it is legal.
        let previous = self.current_function.replace("init".to_string());
        self.in_scope(|analyzer| {
            for param in &init.params {
                let data_type = param
                    .type_annotation
                    .as_ref()
                    .map(annotation_name)
                    .unwrap_or_else(|| "any".to_string());
                analyzer
                    .table
                    .define(Symbol::variable(&param.name, &data_type, true, false));
            }
            for stmt in &init.body {
                analyzer.visit_stmt(stmt);
            }
        });
        self.current_function = previous;
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Binary { left, right, .. } => {
                self.visit_expr(left);
                self.visit_expr(right);
            }
            Expr::Unary { operand, .. } => self.visit_expr(operand),
            Expr::Call { callee, arguments } => {
                self.visit_expr(callee);
                for arg in arguments {
                    self.visit_expr(arg);
                }
            }
            Expr::Member { object, .. } => self.visit_expr(object),
            Expr::Index { object, index } => {
                self.visit_expr(object);
                self.visit_expr(index);
            }
            Expr::Assignment { target, value, line, column, .. } => {
                if let Expr::Identifier { name, .. } = &**target {
                    let resolved = self
                        .table
                        .resolve(name)
                        .map(|s| (s.kind, s.mutable, s.constant));
                    if let Some((kind, mutable, constant)) = resolved {
                        if constant {
                            self.error(
                                format!("Cannot reassign constant '{}'", name),
                                *line,
                                *column,
                                name.len(),
                            );
                        } else if kind == SymbolKind::Variable && !mutable {
                            self.error(
                                format!("Cannot reassign immutable variable '{}'", name),
                                *line,
                                *column,
                                name.len(),
                            );
                        }
                    }
                }
                self.visit_expr(target);
                self.visit_expr(value);
            }
            Expr::Lambda { params, body } => {
                self.in_scope(|analyzer| {
                    for param in params {
                        let data_type = param
                            .type_annotation
                            .as_ref()
                            .map(annotation_name)
                            .unwrap_or_else(|| "any".to_string());
                        analyzer
                            .table
                            .define(Symbol::variable(&param.name, &data_type, true, false));
                    }
                    analyzer.visit_expr(body);
                });
            }
            Expr::Pipe { value, function } => {
                self.visit_expr(value);
                self.visit_expr(function);
            }
            Expr::NullCoalesce { value, default } => {
                self.visit_expr(value);
                self.visit_expr(default);
            }
            Expr::Range { start, end } => {
                self.visit_expr(start);
                self.visit_expr(end);
            }
            Expr::Await(inner) => self.visit_expr(inner),
            Expr::SelfExpr { line, column } => {
                if self.current_class.is_none() {
                    self.error("'self' outside of class", *line, *column, 4);
                }
            }
            Expr::SuperExpr { line, column, .. } => {
                if self.current_class.is_none() {
                    self.error("'super' outside of class", *line, *column, 5);
                }
            }
            Expr::Interpolated(parts) => {
                for part in parts {
                    if let StringPart::Expr(expr) = part {
                        self.visit_expr(expr);
                    }
                }
            }
            Expr::Array(elements) | Expr::Tuple(elements) => {
                for element in elements {
                    self.visit_expr(element);
                }
            }
            Expr::Map(entries) => {
                for (key, value) in entries {
                    self.visit_expr(key);
                    self.visit_expr(value);
                }
            }
            Expr::Identifier { .. }
            | Expr::Integer(_)
            | Expr::Float(_)
            | Expr::Str(_)
            | Expr::Boolean(_)
            | Expr::NullLiteral => {}
        }
    }

    /* ── Type inference ──────────────────────────────────── */

    fn infer_type(&self, expr: &Expr) -> String {
        match expr {
            Expr::Integer(_) => "int".into(),
            Expr::Float(_) => "float".into(),
            Expr::Str(_) | Expr::Interpolated(_) => "string".into(),
            Expr::Boolean(_) => "bool".into(),
            Expr::NullLiteral => "null".into(),
            Expr::Array(_) => "array".into(),
            Expr::Map(_) => "map".into(),
            Expr::Tuple(_) => "tuple".into(),
            Expr::Identifier { name, .. } => self
                .table
                .resolve(name)
                .and_then(|s| s.data_type.clone())
                .unwrap_or_else(|| "any".into()),
            Expr::Binary { left, operator, right } => {
                match operator.as_str() {
                    "==" | "!=" | "<" | ">" | "<=" | ">=" | "and" | "or" => "bool".into(),
                    "+" | "-" | "*" | "/" | "%" | "**" => {
                        let lt = self.infer_type(left);
                        let rt = self.infer_type(right);
                        if lt == "float" || rt == "float" {
                            "float".into()
                        } else if lt == "int" && rt == "int" {
                            "int".into()
                        } else if lt == "string" && operator == "+" {
                            "string".into()
                        } else {
                            "any".into()
                        }
                    }
                    _ => "any".into(),
                }
            }
            Expr::Unary { operator, operand } => {
                if operator == "not" {
                    "bool".into()
                } else {
                    self.infer_type(operand)
                }
            }
            Expr::Call { callee, .. } => {
                if let Expr::Identifier { name, .. } = &**callee {
                    if let Some(symbol) = self.table.resolve(name) {
                        if let Some(ret) = &symbol.return_type {
                            return ret.clone();
                        }
                    }
                }
                "any".into()
            }
            _ => "any".into(),
        }
    }
}

fn annotation_name(annotation: &TypeAnnotation) -> String {
    if annotation.nullable {
        format!("{}?", annotation.name)
    } else {
        annotation.name.clone()
    }
}

/// `any` matches everything, identical types match, int/float interchange,
/// and a nullable `T?` accepts `T` or null.
fn types_compatible(expected: &str, actual: &str) -> bool {
    if expected == "any" || actual == "any" {
        return true;
    }
    if expected == actual {
        return true;
    }
    if matches!(expected, "int" | "float") && matches!(actual, "int" | "float") {
        return true;
    }
    if let Some(base) = expected.strip_suffix('?') {
        return actual == "null" || types_compatible(base, actual);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lexer::Lexer;
    use crate::core::parser::Parser;

    fn analyze(source: &str) -> Vec<SemanticDiagnostic> {
        let tokens = Lexer::new(source).tokenize().expect("lexes");
        let program = Parser::new(tokens).parse().expect("parses");
        SemanticAnalyzer::new().analyze(&program)
    }

    fn errors(source: &str) -> Vec<String> {
        analyze(source)
            .into_iter()
            .filter(|d| d.severity == Severity::Error)
            .map(|d| d.message)
            .collect()
    }

    #[test]
    fn redeclaration_in_same_scope_is_flagged() {
        let msgs = errors("start { let x = 1 let x = 2 }");
        assert!(msgs.iter().any(|m| m.contains("already declared")), "{:?}", msgs);
    }

    #[test]
    fn shadowing_in_nested_scope_is_legal() {
        let msgs = errors("start { let x = 1 if true { let x = 2 } }");
        assert!(msgs.is_empty(), "{:?}", msgs);
    }

    #[test]
    fn constant_reassignment_is_flagged() {
        let msgs = errors("const LIMIT = 10 start { LIMIT = 20 }");
        assert!(msgs.iter().any(|m| m.contains("Cannot reassign constant")), "{:?}", msgs);
    }

    #[test]
    fn immutable_reassignment_is_flagged() {
        let msgs = errors("start { let x = 1 x = 2 }");
        assert!(
            msgs.iter().any(|m| m.contains("Cannot reassign immutable")),
            "{:?}",
            msgs
        );
    }

    #[test]
    fn mutable_reassignment_is_clean() {
        let msgs = errors("start { mut x = 1 x = 2 }");
        assert!(msgs.is_empty(), "{:?}", msgs);
    }

    #[test]
    fn unknown_parent_class_is_flagged() {
        let msgs = errors("class Dog extends Animal { }");
        assert!(msgs.iter().any(|m| m.contains("Parent class 'Animal'")), "{:?}", msgs);
    }

    #[test]
    fn forward_reference_to_class_is_fine() {
        let msgs = errors("class Dog extends Animal { } class Animal { }");
        assert!(msgs.is_empty(), "{:?}", msgs);
    }

    #[test]
    fn unknown_trait_is_flagged() {
        let msgs = errors("class Dog implements Walker { }");
        assert!(msgs.iter().any(|m| m.contains("Trait 'Walker'")), "{:?}", msgs);
    }

    #[test]
    fn return_outside_function_is_flagged() {
        let msgs = errors("start { return 1 }");
        assert!(msgs.iter().any(|m| m.contains("'return' outside")), "{:?}", msgs);
    }

    #[test]
    fn self_outside_class_is_flagged() {
        let msgs = errors("start { self.x = 1 }");
        assert!(msgs.iter().any(|m| m.contains("'self' outside")), "{:?}", msgs);
    }

    #[test]
    fn return_inside_init_is_legal() {
        let msgs = errors("class A { init() { return } }");
        assert!(msgs.is_empty(), "{:?}", msgs);
    }

    #[test]
    fn type_mismatch_is_a_warning() {
        let diags = analyze("start { let x: int = \"hello\" }");
        assert!(
            diags
                .iter()
                .any(|d| d.severity == Severity::Warning && d.message.contains("Type mismatch")),
            "{:?}",
            diags.iter().map(|d| &d.message).collect::<Vec<_>>()
        );
    }

    #[test]
    fn int_float_are_interchangeable() {
        let diags = analyze("start { let x: float = 1 }");
        assert!(diags.is_empty());
    }

    #[test]
    fn nullable_type_accepts_null() {
        let diags = analyze("start { let x: int? = null }");
        assert!(diags.is_empty());
    }

    #[test]
    fn numeric_binary_promotes_to_float() {
        let diags = analyze("start { let x: float = 1 + 2.0 }");
        assert!(diags.is_empty());
        let diags = analyze("start { let n: int = 1 + 2 }");
        assert!(diags.is_empty());
    }

    #[test]
    fn comparison_infers_bool() {
        let diags = analyze("start { let b: bool = 1 < 2 }");
        assert!(diags.is_empty());
    }

    #[test]
    fn diagnostics_never_gate_execution() {
        // The analyzer reports, the interpreter is oblivious: both run.
        use crate::core::interpreter::Interpreter;
        let tokens = Lexer::new("start { let x = 1 let x = 2 }").tokenize().expect("lexes");
        let program = Parser::new(tokens).parse().expect("parses");
        let diags = SemanticAnalyzer::new().analyze(&program);
        assert!(!diags.is_empty());
        assert!(Interpreter::new().interpret(&program).is_ok());
    }
}
