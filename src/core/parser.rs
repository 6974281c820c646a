// src/core/parser.rs
//! Recursive-descent parser for AryanBlock with precedence climbing.
//!
//! Ladder, lowest binding first: assignment < null-coalesce < logical-or <
//! logical-and < equality < comparison < pipe < range < additive <
//! multiplicative < power (right-associative) < unary < postfix < primary.
//!
//! Parse failure is fatal: the offending token and position are reported and
//! parsing aborts with no recovery.

use std::mem;

use crate::core::ast::{
    CaseBody, Expr, FunctionDecl, InitMethod, MatchCase, Parameter, Program, Stmt, StringPart,
    TypeAnnotation,
};
use crate::core::lexer::Lexer;
use crate::core::token::{Token, TokenKind};

#[derive(Debug, Clone)]
pub struct ParserError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for ParserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at line {}", self.message, self.line)
    }
}

impl std::error::Error for ParserError {}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        let needs_eof = !matches!(tokens.last().map(|t| &t.kind), Some(TokenKind::Eof));
        if needs_eof {
            tokens.push(Token::new(TokenKind::Eof, 0, 0, 0));
        }
        Parser { tokens, pos: 0 }
    }

    pub fn parse(&mut self) -> Result<Program, ParserError> {
        let mut program = Program::default();
        while !self.check(&TokenKind::Eof) {
            if self.check(&TokenKind::Start) {
                program.start_block = Some(self.parse_start()?);
            } else {
                program.statements.push(self.parse_declaration()?);
            }
        }
        Ok(program)
    }

    /// Entry point for the REPL and string interpolation: parse a single
    /// expression from an already-lexed token stream.
    pub fn parse_expression_only(&mut self) -> Result<Expr, ParserError> {
        self.parse_expression()
    }

    fn parse_declaration(&mut self) -> Result<Stmt, ParserError> {
        match self.peek().kind.clone() {
            TokenKind::Func => self.parse_function().map(Stmt::Function),
            TokenKind::Async => {
                self.advance();
                let mut func = self.parse_function()?;
                func.is_async = true;
                Ok(Stmt::Function(func))
            }
            TokenKind::Class => self.parse_class(),
            TokenKind::Block => self.parse_block_decl(),
            TokenKind::Trait => self.parse_trait(),
            TokenKind::Let | TokenKind::Mut | TokenKind::Const => self.parse_var(),
            _ => self.parse_statement(),
        }
    }

    fn parse_start(&mut self) -> Result<Vec<Stmt>, ParserError> {
        self.consume(TokenKind::Start, "Expected 'start'")?;
        self.consume(TokenKind::LBrace, "Expected '{' after 'start'")?;
        let body = self.parse_block_body()?;
        self.consume(TokenKind::RBrace, "Expected '}' after start block")?;
        Ok(body)
    }

    fn parse_function(&mut self) -> Result<FunctionDecl, ParserError> {
        let func_tok = self.consume(TokenKind::Func, "Expected 'func'")?;
        let (line, column) = (func_tok.line, func_tok.column);
        let name = self.consume_identifier("Expected function name")?;
        self.consume(TokenKind::LParen, "Expected '(' after function name")?;
        let params = self.parse_params()?;
        self.consume(TokenKind::RParen, "Expected ')' after parameters")?;
        let return_type = if self.matches(&[TokenKind::Arrow]) {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.consume(TokenKind::LBrace, "Expected '{' before function body")?;
        let body = self.parse_block_body()?;
        self.consume(TokenKind::RBrace, "Expected '}' after function body")?;
        Ok(FunctionDecl { name, params, body, return_type, is_async: false, line, column })
    }

    fn parse_params(&mut self) -> Result<Vec<Parameter>, ParserError> {
        let mut params = Vec::new();
        while !self.check(&TokenKind::RParen) {
            let name = self.consume_identifier("Expected parameter name")?;
            let type_annotation = if self.matches(&[TokenKind::Colon]) {
                Some(self.parse_type()?)
            } else {
                None
            };
            let default_value = if self.matches(&[TokenKind::Assign]) {
                Some(self.parse_expression()?)
            } else {
                None
            };
            params.push(Parameter { name, type_annotation, default_value });
            if !self.check(&TokenKind::RParen) {
                self.consume(TokenKind::Comma, "Expected ',' between parameters")?;
            }
        }
        Ok(params)
    }

    fn parse_type(&mut self) -> Result<TypeAnnotation, ParserError> {
        let name = self.consume_identifier("Expected type name")?;
        let nullable = self.matches(&[TokenKind::Question]);
        Ok(TypeAnnotation { name, nullable })
    }

    fn parse_class(&mut self) -> Result<Stmt, ParserError> {
        let class_tok = self.consume(TokenKind::Class, "Expected 'class'")?;
        let (line, column) = (class_tok.line, class_tok.column);
        let name = self.consume_identifier("Expected class name")?;
        let parent = if self.matches(&[TokenKind::Extends]) {
            Some(self.consume_identifier("Expected parent class name")?)
        } else {
            None
        };
        let mut traits = Vec::new();
        if self.matches(&[TokenKind::Implements]) {
            loop {
                traits.push(self.consume_identifier("Expected trait name")?);
                if !self.matches(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenKind::LBrace, "Expected '{' after class header")?;
        let mut members = Vec::new();
        let mut init_method = None;
        while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
            match self.peek().kind.clone() {
                TokenKind::Init => init_method = Some(self.parse_init()?),
                TokenKind::Func => members.push(Stmt::Function(self.parse_function()?)),
                TokenKind::Let | TokenKind::Mut => members.push(self.parse_var()?),
                _ => break,
            }
        }
        self.consume(TokenKind::RBrace, "Expected '}' after class body")?;
        Ok(Stmt::Class { name, parent, traits, members, init_method, line, column })
    }

    fn parse_init(&mut self) -> Result<InitMethod, ParserError> {
        self.consume(TokenKind::Init, "Expected 'init'")?;
        self.consume(TokenKind::LParen, "Expected '(' after 'init'")?;
        let params = self.parse_params()?;
        self.consume(TokenKind::RParen, "Expected ')' after init parameters")?;
        self.consume(TokenKind::LBrace, "Expected '{' before init body")?;
        let body = self.parse_block_body()?;
        self.consume(TokenKind::RBrace, "Expected '}' after init body")?;
        Ok(InitMethod { params, body })
    }

    fn parse_block_decl(&mut self) -> Result<Stmt, ParserError> {
        let block_tok = self.consume(TokenKind::Block, "Expected 'block'")?;
        let (line, column) = (block_tok.line, block_tok.column);
        let name = self.consume_identifier("Expected block name")?;
        self.consume(TokenKind::LBrace, "Expected '{' after block name")?;
        let mut members = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
            match self.peek().kind.clone() {
                TokenKind::Func => members.push(Stmt::Function(self.parse_function()?)),
                TokenKind::Let | TokenKind::Mut | TokenKind::Const => {
                    members.push(self.parse_var()?)
                }
                _ => break,
            }
        }
        self.consume(TokenKind::RBrace, "Expected '}' after block body")?;
        Ok(Stmt::Block { name, members, line, column })
    }

    fn parse_trait(&mut self) -> Result<Stmt, ParserError> {
        let trait_tok = self.consume(TokenKind::Trait, "Expected 'trait'")?;
        let (line, column) = (trait_tok.line, trait_tok.column);
        let name = self.consume_identifier("Expected trait name")?;
        self.consume(TokenKind::LBrace, "Expected '{' after trait name")?;
        let mut methods = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
            methods.push(self.parse_function()?);
        }
        self.consume(TokenKind::RBrace, "Expected '}' after trait body")?;
        Ok(Stmt::Trait { name, methods, line, column })
    }

    fn parse_var(&mut self) -> Result<Stmt, ParserError> {
        let is_mutable = self.check(&TokenKind::Mut);
        let is_constant = self.check(&TokenKind::Const);
        self.advance();
        let (line, column) = (self.peek().line, self.peek().column);
        let name = self.consume_identifier("Expected variable name")?;
        let type_annotation = if self.matches(&[TokenKind::Colon]) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let initializer = if self.matches(&[TokenKind::Assign]) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        Ok(Stmt::VarDecl { name, initializer, type_annotation, is_mutable, is_constant, line, column })
    }

    fn parse_statement(&mut self) -> Result<Stmt, ParserError> {
        match self.peek().kind.clone() {
            TokenKind::If => self.parse_if(),
            TokenKind::Match => self.parse_match(),
            TokenKind::For => self.parse_for(),
            TokenKind::While => self.parse_while(),
            TokenKind::Loop => self.parse_loop(),
            TokenKind::Try => self.parse_try(),
            TokenKind::Return => {
                let tok = self.advance();
                let (line, column) = (tok.line, tok.column);
                let value = if self.check(&TokenKind::RBrace) {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                Ok(Stmt::Return { value, line, column })
            }
            TokenKind::Break => {
                self.advance();
                Ok(Stmt::Break)
            }
            TokenKind::Continue => {
                self.advance();
                Ok(Stmt::Continue)
            }
            TokenKind::Let | TokenKind::Mut | TokenKind::Const => self.parse_var(),
            _ => Ok(Stmt::Expression(self.parse_expression()?)),
        }
    }

    fn parse_if(&mut self) -> Result<Stmt, ParserError> {
        self.consume(TokenKind::If, "Expected 'if'")?;
        let condition = self.parse_expression()?;
        self.consume(TokenKind::LBrace, "Expected '{' after if condition")?;
        let then_branch = self.parse_block_body()?;
        self.consume(TokenKind::RBrace, "Expected '}' after if body")?;
        let mut elif_branches = Vec::new();
        while self.matches(&[TokenKind::Elif]) {
            let cond = self.parse_expression()?;
            self.consume(TokenKind::LBrace, "Expected '{' after elif condition")?;
            let body = self.parse_block_body()?;
            self.consume(TokenKind::RBrace, "Expected '}' after elif body")?;
            elif_branches.push((cond, body));
        }
        let else_branch = if self.matches(&[TokenKind::Else]) {
            self.consume(TokenKind::LBrace, "Expected '{' after 'else'")?;
            let body = self.parse_block_body()?;
            self.consume(TokenKind::RBrace, "Expected '}' after else body")?;
            Some(body)
        } else {
            None
        };
        Ok(Stmt::If { condition, then_branch, elif_branches, else_branch })
    }

    fn parse_match(&mut self) -> Result<Stmt, ParserError> {
        self.consume(TokenKind::Match, "Expected 'match'")?;
        let value = self.parse_expression()?;
        self.consume(TokenKind::LBrace, "Expected '{' after match value")?;
        let mut cases = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
            let is_default =
                matches!(&self.peek().kind, TokenKind::Identifier(name) if name == "_");
            let pattern = if is_default {
                let tok = self.advance();
                Expr::identifier("_", tok.line, tok.column)
            } else {
                self.parse_expression()?
            };
            self.consume(TokenKind::FatArrow, "Expected '=>' after match pattern")?;
            let body = if self.matches(&[TokenKind::LBrace]) {
                let stmts = self.parse_block_body()?;
                self.consume(TokenKind::RBrace, "Expected '}' after match case body")?;
                CaseBody::Block(stmts)
            } else {
                CaseBody::Expr(self.parse_expression()?)
            };
            cases.push(MatchCase { pattern, body, is_default });
            self.matches(&[TokenKind::Comma]);
        }
        self.consume(TokenKind::RBrace, "Expected '}' after match cases")?;
        Ok(Stmt::Match { value, cases })
    }

    fn parse_for(&mut self) -> Result<Stmt, ParserError> {
        self.consume(TokenKind::For, "Expected 'for'")?;
        let variable = self.consume_identifier("Expected loop variable")?;
        self.consume(TokenKind::In, "Expected 'in' after loop variable")?;
        let iterable = self.parse_expression()?;
        self.consume(TokenKind::LBrace, "Expected '{' after for header")?;
        let body = self.parse_block_body()?;
        self.consume(TokenKind::RBrace, "Expected '}' after for body")?;
        Ok(Stmt::For { variable, iterable, body })
    }

    fn parse_while(&mut self) -> Result<Stmt, ParserError> {
        self.consume(TokenKind::While, "Expected 'while'")?;
        let condition = self.parse_expression()?;
        self.consume(TokenKind::LBrace, "Expected '{' after while condition")?;
        let body = self.parse_block_body()?;
        self.consume(TokenKind::RBrace, "Expected '}' after while body")?;
        Ok(Stmt::While { condition, body })
    }

    fn parse_loop(&mut self) -> Result<Stmt, ParserError> {
        self.consume(TokenKind::Loop, "Expected 'loop'")?;
        let count = self.parse_expression()?;
        self.consume(TokenKind::LBrace, "Expected '{' after loop count")?;
        let body = self.parse_block_body()?;
        self.consume(TokenKind::RBrace, "Expected '}' after loop body")?;
        Ok(Stmt::Loop { count, body })
    }

    fn parse_try(&mut self) -> Result<Stmt, ParserError> {
        self.consume(TokenKind::Try, "Expected 'try'")?;
        self.consume(TokenKind::LBrace, "Expected '{' after 'try'")?;
        let try_body = self.parse_block_body()?;
        self.consume(TokenKind::RBrace, "Expected '}' after try body")?;
        let mut catch_var = None;
        let mut catch_body = None;
        if self.matches(&[TokenKind::Catch]) {
            catch_var = Some(self.consume_identifier("Expected catch variable")?);
            self.consume(TokenKind::LBrace, "Expected '{' after catch variable")?;
            catch_body = Some(self.parse_block_body()?);
            self.consume(TokenKind::RBrace, "Expected '}' after catch body")?;
        }
        let finally_body = if self.matches(&[TokenKind::Finally]) {
            self.consume(TokenKind::LBrace, "Expected '{' after 'finally'")?;
            let body = self.parse_block_body()?;
            self.consume(TokenKind::RBrace, "Expected '}' after finally body")?;
            Some(body)
        } else {
            None
        };
        Ok(Stmt::Try { try_body, catch_var, catch_body, finally_body })
    }

    fn parse_block_body(&mut self) -> Result<Vec<Stmt>, ParserError> {
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
            stmts.push(self.parse_statement()?);
        }
        Ok(stmts)
    }

    /* ── Expressions ─────────────────────────────────────── */

    fn parse_expression(&mut self) -> Result<Expr, ParserError> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr, ParserError> {
        let expr = self.parse_null_coalesce()?;
        if self.check(&TokenKind::Assign)
            || self.check(&TokenKind::PlusAssign)
            || self.check(&TokenKind::MinusAssign)
            || self.check(&TokenKind::MultAssign)
            || self.check(&TokenKind::DivAssign)
        {
            let op_tok = self.advance();
            let (line, column) = (op_tok.line, op_tok.column);
            let operator = op_tok.kind.to_string();
            let value = self.parse_assignment()?;
            return Ok(Expr::Assignment {
                target: Box::new(expr),
                value: Box::new(value),
                operator,
                line,
                column,
            });
        }
        Ok(expr)
    }

    fn parse_null_coalesce(&mut self) -> Result<Expr, ParserError> {
        let expr = self.parse_or()?;
        if self.matches(&[TokenKind::NullCoalesce]) {
            let default = self.parse_null_coalesce()?;
            return Ok(Expr::NullCoalesce { value: Box::new(expr), default: Box::new(default) });
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr, ParserError> {
        let mut expr = self.parse_and()?;
        while self.matches(&[TokenKind::Or]) {
            let right = self.parse_and()?;
            expr = Expr::binary(expr, "or", right);
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr, ParserError> {
        let mut expr = self.parse_equality()?;
        while self.matches(&[TokenKind::And]) {
            let right = self.parse_equality()?;
            expr = Expr::binary(expr, "and", right);
        }
        Ok(expr)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParserError> {
        let mut expr = self.parse_comparison()?;
        while self.check(&TokenKind::Equal) || self.check(&TokenKind::NotEqual) {
            let op = self.advance().kind.to_string();
            let right = self.parse_comparison()?;
            expr = Expr::binary(expr, &op, right);
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParserError> {
        let mut expr = self.parse_pipe()?;
        while self.check(&TokenKind::Less)
            || self.check(&TokenKind::Greater)
            || self.check(&TokenKind::LessEqual)
            || self.check(&TokenKind::GreaterEqual)
        {
            let op = self.advance().kind.to_string();
            let right = self.parse_pipe()?;
            expr = Expr::binary(expr, &op, right);
        }
        Ok(expr)
    }

    fn parse_pipe(&mut self) -> Result<Expr, ParserError> {
        let mut expr = self.parse_range()?;
        while self.matches(&[TokenKind::Pipe]) {
            let function = self.parse_range()?;
            expr = Expr::Pipe { value: Box::new(expr), function: Box::new(function) };
        }
        Ok(expr)
    }

    fn parse_range(&mut self) -> Result<Expr, ParserError> {
        let expr = self.parse_additive()?;
        if self.matches(&[TokenKind::Range]) {
            let end = self.parse_additive()?;
            return Ok(Expr::Range { start: Box::new(expr), end: Box::new(end) });
        }
        Ok(expr)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParserError> {
        let mut expr = self.parse_multiplicative()?;
        while self.check(&TokenKind::Plus) || self.check(&TokenKind::Minus) {
            let op = self.advance().kind.to_string();
            let right = self.parse_multiplicative()?;
            expr = Expr::binary(expr, &op, right);
        }
        Ok(expr)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParserError> {
        let mut expr = self.parse_power()?;
        while self.check(&TokenKind::Multiply)
            || self.check(&TokenKind::Divide)
            || self.check(&TokenKind::Modulo)
        {
            let op = self.advance().kind.to_string();
            let right = self.parse_power()?;
            expr = Expr::binary(expr, &op, right);
        }
        Ok(expr)
    }

    fn parse_power(&mut self) -> Result<Expr, ParserError> {
        let expr = self.parse_unary()?;
        if self.matches(&[TokenKind::Power]) {
            // Right-associative: 2 ** 3 ** 2 == 2 ** (3 ** 2)
            let right = self.parse_power()?;
            return Ok(Expr::binary(expr, "**", right));
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParserError> {
        if self.check(&TokenKind::Minus) || self.check(&TokenKind::Not) {
            let op = self.advance().kind.to_string();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary { operator: op, operand: Box::new(operand) });
        }
        if self.matches(&[TokenKind::Await]) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Await(Box::new(operand)));
        }
        self.parse_call()
    }

    fn parse_call(&mut self) -> Result<Expr, ParserError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.matches(&[TokenKind::LParen]) {
                let mut arguments = Vec::new();
                while !self.check(&TokenKind::RParen) {
                    arguments.push(self.parse_expression()?);
                    if !self.check(&TokenKind::RParen) {
                        self.consume(TokenKind::Comma, "Expected ',' between arguments")?;
                    }
                }
                self.consume(TokenKind::RParen, "Expected ')' after arguments")?;
                expr = Expr::Call { callee: Box::new(expr), arguments };
            } else if self.matches(&[TokenKind::Dot]) {
                let member = self.consume_identifier("Expected member name after '.'")?;
                expr = Expr::Member { object: Box::new(expr), member, null_safe: false };
            } else if self.matches(&[TokenKind::NullSafe]) {
                let member = self.consume_identifier("Expected member name after '?.'")?;
                expr = Expr::Member { object: Box::new(expr), member, null_safe: true };
            } else if self.matches(&[TokenKind::LBracket]) {
                let index = self.parse_expression()?;
                self.consume(TokenKind::RBracket, "Expected ']' after index")?;
                expr = Expr::Index { object: Box::new(expr), index: Box::new(index) };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParserError> {
        let tok = self.advance();
        match tok.kind {
            TokenKind::Integer(v) => Ok(Expr::Integer(v)),
            TokenKind::Float(v) => Ok(Expr::Float(v)),
            TokenKind::Str(s) => self.parse_string(&s, tok.line, tok.column),
            TokenKind::Boolean(b) => Ok(Expr::Boolean(b)),
            TokenKind::Null => Ok(Expr::NullLiteral),
            TokenKind::SelfKw => Ok(Expr::SelfExpr { line: tok.line, column: tok.column }),
            TokenKind::Super => {
                let member = if self.matches(&[TokenKind::Dot]) {
                    Some(self.consume_identifier("Expected member name after 'super.'")?)
                } else {
                    None
                };
                Ok(Expr::SuperExpr { member, line: tok.line, column: tok.column })
            }
            TokenKind::Identifier(name) => {
                // A bare identifier immediately followed by `=>` is a
                // one-parameter lambda, not a plain reference.
                if self.check(&TokenKind::FatArrow) {
                    self.advance();
                    let body = self.parse_expression()?;
                    return Ok(Expr::Lambda {
                        params: vec![Parameter {
                            name,
                            type_annotation: None,
                            default_value: None,
                        }],
                        body: Box::new(body),
                    });
                }
                Ok(Expr::identifier(&name, tok.line, tok.column))
            }
            TokenKind::LBracket => self.parse_array(),
            TokenKind::LBrace => self.parse_map(),
            TokenKind::LParen => self.parse_paren(),
            other => Err(ParserError {
                message: format!("Unexpected token: {}", other),
                line: tok.line,
                column: tok.column,
            }),
        }
    }

    /// Split a string literal containing `${...}` spans into parts; each
    /// span is re-tokenized and re-parsed as a standalone expression, with
    /// brace nesting tracked to find the matching close.
    fn parse_string(&mut self, value: &str, line: usize, column: usize) -> Result<Expr, ParserError> {
        if !value.contains("${") {
            return Ok(Expr::Str(value.to_string()));
        }
        let chars: Vec<char> = value.chars().collect();
        let mut parts = Vec::new();
        let mut text = String::new();
        let mut i = 0;
        while i < chars.len() {
            if chars[i] == '$' && chars.get(i + 1) == Some(&'{') {
                if !text.is_empty() {
                    parts.push(StringPart::Text(std::mem::take(&mut text)));
                }
                i += 2;
                let start = i;
                let mut depth = 1usize;
                while i < chars.len() && depth > 0 {
                    match chars[i] {
                        '{' => depth += 1,
                        '}' => depth -= 1,
                        _ => {}
                    }
                    i += 1;
                }
                let expr_str: String = chars[start..i.saturating_sub(1)].iter().collect();
                let tokens = Lexer::new(&expr_str).tokenize().map_err(|e| ParserError {
                    message: format!("In interpolation: {}", e),
                    line,
                    column,
                })?;
                let expr = Parser::new(tokens).parse_expression()?;
                parts.push(StringPart::Expr(expr));
            } else {
                text.push(chars[i]);
                i += 1;
            }
        }
        if !text.is_empty() {
            parts.push(StringPart::Text(text));
        }
        Ok(Expr::Interpolated(parts))
    }

    fn parse_array(&mut self) -> Result<Expr, ParserError> {
        let mut elements = Vec::new();
        while !self.check(&TokenKind::RBracket) {
            elements.push(self.parse_expression()?);
            if !self.check(&TokenKind::RBracket) {
                self.consume(TokenKind::Comma, "Expected ',' between array elements")?;
            }
        }
        self.consume(TokenKind::RBracket, "Expected ']' after array elements")?;
        Ok(Expr::Array(elements))
    }

    fn parse_map(&mut self) -> Result<Expr, ParserError> {
        let mut entries = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let key_tok = self.advance();
            let key = match key_tok.kind {
                TokenKind::Str(s) => Expr::Str(s),
                TokenKind::Identifier(name) => Expr::Str(name),
                TokenKind::Integer(v) => Expr::Str(v.to_string()),
                other => {
                    return Err(ParserError {
                        message: format!("Invalid map key: {}", other),
                        line: key_tok.line,
                        column: key_tok.column,
                    })
                }
            };
            self.consume(TokenKind::Colon, "Expected ':' after map key")?;
            let value = self.parse_expression()?;
            entries.push((key, value));
            if !self.check(&TokenKind::RBrace) {
                self.consume(TokenKind::Comma, "Expected ',' between map entries")?;
            }
        }
        self.consume(TokenKind::RBrace, "Expected '}' after map entries")?;
        Ok(Expr::Map(entries))
    }

    /// Parenthesized expressions, tuple literals, and lambda parameter
    /// lists. A `(...)` immediately followed by `=>` is always a lambda.
    fn parse_paren(&mut self) -> Result<Expr, ParserError> {
        if self.matches(&[TokenKind::RParen]) {
            if self.matches(&[TokenKind::FatArrow]) {
                let body = self.parse_expression()?;
                return Ok(Expr::Lambda { params: vec![], body: Box::new(body) });
            }
            return Ok(Expr::Tuple(vec![]));
        }
        let expr = self.parse_expression()?;
        if self.check(&TokenKind::Comma) {
            let mut elements = vec![expr];
            while self.matches(&[TokenKind::Comma]) {
                elements.push(self.parse_expression()?);
            }
            self.consume(TokenKind::RParen, "Expected ')' after tuple elements")?;
            if self.matches(&[TokenKind::FatArrow]) {
                let params = self.lambda_params(elements)?;
                let body = self.parse_expression()?;
                return Ok(Expr::Lambda { params, body: Box::new(body) });
            }
            return Ok(Expr::Tuple(elements));
        }
        self.consume(TokenKind::RParen, "Expected ')' after expression")?;
        if self.matches(&[TokenKind::FatArrow]) {
            let params = self.lambda_params(vec![expr])?;
            let body = self.parse_expression()?;
            return Ok(Expr::Lambda { params, body: Box::new(body) });
        }
        Ok(expr)
    }

    fn lambda_params(&self, elements: Vec<Expr>) -> Result<Vec<Parameter>, ParserError> {
        let mut params = Vec::new();
        for element in elements {
            match element {
                Expr::Identifier { name, .. } => params.push(Parameter {
                    name,
                    type_annotation: None,
                    default_value: None,
                }),
                _ => {
                    return Err(self.error_here("Lambda parameters must be identifiers"));
                }
            }
        }
        Ok(params)
    }

    /* ── Token utilities ─────────────────────────────────── */

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: &TokenKind) -> bool {
        mem::discriminant(&self.peek().kind) == mem::discriminant(kind)
    }

    fn matches(&mut self, kinds: &[TokenKind]) -> bool {
        for kind in kinds {
            if self.check(kind) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn consume(&mut self, kind: TokenKind, msg: &str) -> Result<Token, ParserError> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(self.error_here(msg))
        }
    }

    fn consume_identifier(&mut self, msg: &str) -> Result<String, ParserError> {
        if let TokenKind::Identifier(name) = self.peek().kind.clone() {
            self.advance();
            Ok(name)
        } else {
            Err(self.error_here(msg))
        }
    }

    fn error_here(&self, msg: &str) -> ParserError {
        ParserError {
            message: format!("{} (found {})", msg, self.peek().kind),
            line: self.peek().line,
            column: self.peek().column,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_source(source: &str) -> Program {
        let tokens = Lexer::new(source).tokenize().expect("lexes");
        Parser::new(tokens).parse().expect("parses")
    }

    fn parse_expr(source: &str) -> Expr {
        let tokens = Lexer::new(source).tokenize().expect("lexes");
        Parser::new(tokens).parse_expression_only().expect("parses")
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        let expr = parse_expr("1 + 2 * 3");
        assert_eq!(
            expr,
            Expr::binary(
                Expr::Integer(1),
                "+",
                Expr::binary(Expr::Integer(2), "*", Expr::Integer(3))
            )
        );
    }

    #[test]
    fn power_is_right_associative() {
        // 2 ** 3 ** 2 parses as 2 ** (3 ** 2)
        let expr = parse_expr("2 ** 3 ** 2");
        assert_eq!(
            expr,
            Expr::binary(
                Expr::Integer(2),
                "**",
                Expr::binary(Expr::Integer(3), "**", Expr::Integer(2))
            )
        );
    }

    #[test]
    fn lambda_from_parenthesized_params() {
        let expr = parse_expr("(a, b) => a + b");
        match expr {
            Expr::Lambda { params, .. } => {
                let names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
                assert_eq!(names, vec!["a", "b"]);
            }
            other => panic!("expected Lambda, found {:?}", other),
        }
    }

    #[test]
    fn bare_identifier_lambda() {
        let expr = parse_expr("x => x * 2");
        assert!(matches!(expr, Expr::Lambda { ref params, .. } if params.len() == 1));
    }

    #[test]
    fn parenthesized_comma_list_is_a_tuple() {
        let expr = parse_expr("(1, 2)");
        assert_eq!(expr, Expr::Tuple(vec![Expr::Integer(1), Expr::Integer(2)]));
    }

    #[test]
    fn interpolated_string_splits_parts() {
        let expr = parse_expr(r#""Hi, ${name}!""#);
        match expr {
            Expr::Interpolated(parts) => {
                assert_eq!(parts.len(), 3);
                assert_eq!(parts[0], StringPart::Text("Hi, ".into()));
                assert!(matches!(parts[1], StringPart::Expr(Expr::Identifier { .. })));
                assert_eq!(parts[2], StringPart::Text("!".into()));
            }
            other => panic!("expected Interpolated, found {:?}", other),
        }
    }

    #[test]
    fn interpolation_tracks_nested_braces() {
        let expr = parse_expr(r#""v=${ {a: 1}.a }""#);
        match expr {
            Expr::Interpolated(parts) => {
                assert!(matches!(
                    parts.as_slice(),
                    [StringPart::Text(_), StringPart::Expr(Expr::Member { .. })]
                ));
            }
            other => panic!("expected Interpolated, found {:?}", other),
        }
    }

    #[test]
    fn pipe_parses_left_associatively() {
        let expr = parse_expr("x |> f |> g");
        match expr {
            Expr::Pipe { value, .. } => assert!(matches!(*value, Expr::Pipe { .. })),
            other => panic!("expected Pipe, found {:?}", other),
        }
    }

    #[test]
    fn range_in_for_header() {
        let program = parse_source("start { for i in 0..3 { print(i) } }");
        let body = program.start_block.expect("start block");
        match &body[0] {
            Stmt::For { iterable, .. } => assert!(matches!(iterable, Expr::Range { .. })),
            other => panic!("expected For, found {:?}", other),
        }
    }

    #[test]
    fn class_with_init_and_members() {
        let program = parse_source(
            "class Counter { mut value: int init(start: int) { self.value = start } func get() -> int { return self.value } }",
        );
        match &program.statements[0] {
            Stmt::Class { name, members, init_method, .. } => {
                assert_eq!(name, "Counter");
                assert_eq!(members.len(), 2);
                assert!(init_method.is_some());
            }
            other => panic!("expected Class, found {:?}", other),
        }
    }

    #[test]
    fn match_with_wildcard_case() {
        let program = parse_source("start { match x { 1 => print(\"one\"), _ => print(\"other\") } }");
        let body = program.start_block.expect("start block");
        match &body[0] {
            Stmt::Match { cases, .. } => {
                assert_eq!(cases.len(), 2);
                assert!(!cases[0].is_default);
                assert!(cases[1].is_default);
            }
            other => panic!("expected Match, found {:?}", other),
        }
    }

    #[test]
    fn parse_error_reports_offending_line() {
        let tokens = Lexer::new("func ()").tokenize().expect("lexes");
        let err = Parser::new(tokens).parse().unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.message.contains("Expected function name"));
    }
}
