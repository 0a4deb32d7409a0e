//! Seed-script AST
//!
//! The candidate sources the mutation engine operates on are seed
//! scripts: a deterministic statement language with imports, assignments,
//! expressions, `while` loops and `pass` no-ops. Parse → transform →
//! unparse must round-trip; the unparser output always re-parses to the
//! same tree.

use std::collections::BTreeSet;
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Import(String),
    Assign(String, Expr),
    Expr(Expr),
    While(Expr, Vec<Stmt>),
    Pass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl BinOp {
    fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Name(String),
    Attr(Box<Expr>, String),
    Call(Box<Expr>, Vec<Expr>),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    List(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

// ---------------------------------------------------------------- lexer

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Symbol(&'static str),
    Newline,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            line: self.line,
        }
    }

    fn tokenize(mut self) -> Result<Vec<(Token, usize)>, ParseError> {
        let mut tokens = Vec::new();
        while let Some(&c) = self.chars.peek() {
            match c {
                '\n' => {
                    self.chars.next();
                    tokens.push((Token::Newline, self.line));
                    self.line += 1;
                }
                ';' => {
                    self.chars.next();
                    tokens.push((Token::Newline, self.line));
                }
                c if c.is_whitespace() => {
                    self.chars.next();
                }
                '#' => {
                    while let Some(&c) = self.chars.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.chars.next();
                    }
                }
                '"' => {
                    self.chars.next();
                    let mut value = String::new();
                    loop {
                        match self.chars.next() {
                            Some('"') => break,
                            Some('\\') => match self.chars.next() {
                                Some('n') => value.push('\n'),
                                Some('t') => value.push('\t'),
                                Some('"') => value.push('"'),
                                Some('\\') => value.push('\\'),
                                other => {
                                    return Err(self.error(format!(
                                        "invalid escape: {other:?}"
                                    )));
                                }
                            },
                            Some('\n') | None => {
                                return Err(self.error("unterminated string"));
                            }
                            Some(c) => value.push(c),
                        }
                    }
                    tokens.push((Token::Str(value), self.line));
                }
                c if c.is_ascii_digit() => {
                    let mut literal = String::new();
                    let mut is_float = false;
                    while let Some(&c) = self.chars.peek() {
                        if c.is_ascii_digit() {
                            literal.push(c);
                            self.chars.next();
                        } else if c == '.' && !is_float {
                            is_float = true;
                            literal.push(c);
                            self.chars.next();
                        } else {
                            break;
                        }
                    }
                    let token = if is_float {
                        Token::Float(
                            literal
                                .parse()
                                .map_err(|_| self.error(format!("invalid float: {literal}")))?,
                        )
                    } else {
                        Token::Int(
                            literal
                                .parse()
                                .map_err(|_| self.error(format!("invalid integer: {literal}")))?,
                        )
                    };
                    tokens.push((token, self.line));
                }
                c if c.is_ascii_alphabetic() || c == '_' => {
                    let mut ident = String::new();
                    while let Some(&c) = self.chars.peek() {
                        if c.is_ascii_alphanumeric() || c == '_' {
                            ident.push(c);
                            self.chars.next();
                        } else {
                            break;
                        }
                    }
                    tokens.push((Token::Ident(ident), self.line));
                }
                _ => {
                    self.chars.next();
                    let symbol = match c {
                        '(' => "(",
                        ')' => ")",
                        '{' => "{",
                        '}' => "}",
                        '[' => "[",
                        ']' => "]",
                        ',' => ",",
                        '.' => ".",
                        '+' => "+",
                        '-' => "-",
                        '*' => "*",
                        '/' => "/",
                        '%' => "%",
                        '<' | '>' | '=' | '!' => {
                            let double = matches!(self.chars.peek(), Some(&'='));
                            if double {
                                self.chars.next();
                            }
                            match (c, double) {
                                ('<', true) => "<=",
                                ('<', false) => "<",
                                ('>', true) => ">=",
                                ('>', false) => ">",
                                ('=', true) => "==",
                                ('=', false) => "=",
                                ('!', true) => "!=",
                                ('!', false) => {
                                    return Err(self.error("unexpected '!'"));
                                }
                                _ => unreachable!(),
                            }
                        }
                        other => {
                            return Err(self.error(format!("unexpected character: {other:?}")));
                        }
                    };
                    tokens.push((Token::Symbol(symbol), self.line));
                }
            }
        }
        Ok(tokens)
    }
}

// --------------------------------------------------------------- parser

struct Parser {
    tokens: Vec<(Token, usize)>,
    position: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position).map(|(t, _)| t)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.position.min(self.tokens.len().saturating_sub(1)))
            .map(|(_, line)| *line)
            .unwrap_or(1)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            line: self.line(),
        }
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).map(|(t, _)| t.clone());
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn eat_symbol(&mut self, symbol: &str) -> bool {
        if matches!(self.peek(), Some(Token::Symbol(s)) if *s == symbol) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, symbol: &'static str) -> Result<(), ParseError> {
        if self.eat_symbol(symbol) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{symbol}'")))
        }
    }

    fn skip_newlines(&mut self) {
        while self.peek() == Some(&Token::Newline) {
            self.position += 1;
        }
    }

    fn parse_module(&mut self) -> Result<Module, ParseError> {
        let mut body = Vec::new();
        self.skip_newlines();
        while self.peek().is_some() {
            body.push(self.parse_stmt()?);
            self.skip_newlines();
        }
        Ok(Module { body })
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect_symbol("{")?;
        let mut body = Vec::new();
        self.skip_newlines();
        while self.peek() != Some(&Token::Symbol("}")) {
            if self.peek().is_none() {
                return Err(self.error("unterminated block"));
            }
            body.push(self.parse_stmt()?);
            self.skip_newlines();
        }
        self.expect_symbol("}")?;
        Ok(body)
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        match self.peek() {
            Some(Token::Ident(ident)) if ident == "import" => {
                self.next();
                match self.next() {
                    Some(Token::Ident(name)) => Ok(Stmt::Import(name)),
                    _ => Err(self.error("import requires a module name")),
                }
            }
            Some(Token::Ident(ident)) if ident == "pass" => {
                self.next();
                Ok(Stmt::Pass)
            }
            Some(Token::Ident(ident)) if ident == "while" => {
                self.next();
                let condition = self.parse_expr()?;
                let body = self.parse_block()?;
                Ok(Stmt::While(condition, body))
            }
            Some(Token::Ident(_)) => {
                // Lookahead for `name = expr`; `==` is a comparison.
                if let (Some(Token::Ident(name)), Some(Token::Symbol("="))) = (
                    self.tokens.get(self.position).map(|(t, _)| t.clone()),
                    self.tokens.get(self.position + 1).map(|(t, _)| t),
                ) {
                    self.position += 2;
                    let value = self.parse_expr()?;
                    return Ok(Stmt::Assign(name, value));
                }
                Ok(Stmt::Expr(self.parse_expr()?))
            }
            _ => Ok(Stmt::Expr(self.parse_expr()?)),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Symbol("<")) => BinOp::Lt,
                Some(Token::Symbol("<=")) => BinOp::Le,
                Some(Token::Symbol(">")) => BinOp::Gt,
                Some(Token::Symbol(">=")) => BinOp::Ge,
                Some(Token::Symbol("==")) => BinOp::Eq,
                Some(Token::Symbol("!=")) => BinOp::Ne,
                _ => break,
            };
            self.position += 1;
            let right = self.parse_additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Symbol("+")) => BinOp::Add,
                Some(Token::Symbol("-")) => BinOp::Sub,
                _ => break,
            };
            self.position += 1;
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Symbol("*")) => BinOp::Mul,
                Some(Token::Symbol("/")) => BinOp::Div,
                Some(Token::Symbol("%")) => BinOp::Rem,
                _ => break,
            };
            self.position += 1;
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.eat_symbol("-") {
            return Ok(Expr::Neg(Box::new(self.parse_unary()?)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat_symbol(".") {
                match self.next() {
                    Some(Token::Ident(attr)) => {
                        expr = Expr::Attr(Box::new(expr), attr);
                    }
                    _ => return Err(self.error("expected attribute name after '.'")),
                }
            } else if self.eat_symbol("(") {
                let mut args = Vec::new();
                if !self.eat_symbol(")") {
                    loop {
                        args.push(self.parse_expr()?);
                        if self.eat_symbol(")") {
                            break;
                        }
                        self.expect_symbol(",")?;
                    }
                }
                expr = Expr::Call(Box::new(expr), args);
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.next() {
            Some(Token::Int(value)) => Ok(Expr::Int(value)),
            Some(Token::Float(value)) => Ok(Expr::Float(value)),
            Some(Token::Str(value)) => Ok(Expr::Str(value)),
            Some(Token::Ident(ident)) if ident == "true" => Ok(Expr::Bool(true)),
            Some(Token::Ident(ident)) if ident == "false" => Ok(Expr::Bool(false)),
            Some(Token::Ident(ident)) => Ok(Expr::Name(ident)),
            Some(Token::Symbol("(")) => {
                let expr = self.parse_expr()?;
                self.expect_symbol(")")?;
                Ok(expr)
            }
            Some(Token::Symbol("[")) => {
                let mut items = Vec::new();
                if !self.eat_symbol("]") {
                    loop {
                        items.push(self.parse_expr()?);
                        if self.eat_symbol("]") {
                            break;
                        }
                        self.expect_symbol(",")?;
                    }
                }
                Ok(Expr::List(items))
            }
            other => Err(self.error(format!("unexpected token: {other:?}"))),
        }
    }
}

/// Parse a seed script into a module.
pub fn parse(source: &str) -> Result<Module, ParseError> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser { tokens, position: 0 };
    parser.parse_module()
}

// ------------------------------------------------------------- unparser

fn write_expr(out: &mut String, expr: &Expr) {
    match expr {
        Expr::Int(value) => {
            let _ = write!(out, "{value}");
        }
        Expr::Float(value) => {
            if value.fract() == 0.0 && value.is_finite() {
                let _ = write!(out, "{value:.1}");
            } else {
                let _ = write!(out, "{value}");
            }
        }
        Expr::Str(value) => {
            out.push('"');
            for c in value.chars() {
                match c {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    '\t' => out.push_str("\\t"),
                    c => out.push(c),
                }
            }
            out.push('"');
        }
        Expr::Bool(true) => out.push_str("true"),
        Expr::Bool(false) => out.push_str("false"),
        Expr::Name(name) => out.push_str(name),
        Expr::Attr(base, attr) => {
            write_expr(out, base);
            out.push('.');
            out.push_str(attr);
        }
        Expr::Call(callee, args) => {
            write_expr(out, callee);
            out.push('(');
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(out, arg);
            }
            out.push(')');
        }
        Expr::Neg(inner) => {
            out.push('-');
            write_expr(out, inner);
        }
        Expr::Binary(op, left, right) => {
            out.push('(');
            write_expr(out, left);
            let _ = write!(out, " {} ", op.symbol());
            write_expr(out, right);
            out.push(')');
        }
        Expr::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(out, item);
            }
            out.push(']');
        }
    }
}

fn write_stmt(out: &mut String, stmt: &Stmt, indent: usize) {
    for _ in 0..indent {
        out.push_str("    ");
    }
    match stmt {
        Stmt::Import(name) => {
            let _ = write!(out, "import {name}");
        }
        Stmt::Assign(name, value) => {
            let _ = write!(out, "{name} = ");
            write_expr(out, value);
        }
        Stmt::Expr(expr) => write_expr(out, expr),
        Stmt::Pass => out.push_str("pass"),
        Stmt::While(condition, body) => {
            out.push_str("while ");
            write_expr(out, condition);
            out.push_str(" {\n");
            for inner in body {
                write_stmt(out, inner, indent + 1);
                out.push('\n');
            }
            for _ in 0..indent {
                out.push_str("    ");
            }
            out.push('}');
        }
    }
}

/// Render a module back to source. The output re-parses to the same tree.
pub fn unparse(module: &Module) -> String {
    let mut out = String::new();
    for stmt in &module.body {
        write_stmt(&mut out, stmt, 0);
        out.push('\n');
    }
    out
}

// ------------------------------------------------------------ transforms

/// The single named transformation: remove trivial no-op statements at
/// module level. Returns the mutated module and the mutation kind when
/// anything changed.
pub fn drop_pass(module: &Module) -> (Module, Option<&'static str>) {
    let body: Vec<Stmt> = module
        .body
        .iter()
        .filter(|stmt| !matches!(stmt, Stmt::Pass))
        .cloned()
        .collect();
    let changed = body.len() != module.body.len();
    (
        Module { body },
        if changed { Some("drop_pass") } else { None },
    )
}

fn collect_imports(body: &[Stmt], into: &mut BTreeSet<String>) {
    for stmt in body {
        match stmt {
            Stmt::Import(name) => {
                into.insert(name.clone());
            }
            Stmt::While(_, inner) => collect_imports(inner, into),
            _ => {}
        }
    }
}

/// Every module name the script imports, including inside loops.
pub fn imports(module: &Module) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    collect_imports(&module.body, &mut names);
    names
}
