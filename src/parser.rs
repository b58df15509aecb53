// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Text parser: turns raw source into `AssemblyLine`/`Expression` trees.
//!
//! The language is line-oriented. Each line is tokenized on its own; a
//! second step nests the bodies of MACRO/FUNC/GFUNC/APP_DATA blocks under
//! their opening line, so the rest of the pipeline never sees END. The
//! core consumes the resulting tree and never re-parses text.

use crate::core::constant::NumberConstant;
use crate::core::error::AssemblyError;
use crate::core::expr::{BinaryOp, ExprKind, Expression, UnaryOp};
use crate::core::line::AssemblyLine;

/// Directives whose body runs until a matching END.
const BLOCK_OPENERS: &[&str] = &["MACRO", "FUNC", "GFUNC", "APP_DATA"];

/// Directive name given to `name:` label lines.
pub const LABEL_DIRECTIVE: &str = "LABEL";

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i128),
    Float(f64),
    Str(String),
    Comma,
    Colon,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Shl,
    Shr,
}

struct Tokenizer<'a> {
    bytes: &'a [u8],
    cursor: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(line: &'a str) -> Self {
        Self {
            bytes: line.as_bytes(),
            cursor: 0,
        }
    }

    fn peek(&self) -> u8 {
        if self.cursor < self.bytes.len() {
            self.bytes[self.cursor]
        } else {
            0
        }
    }

    fn peek_at(&self, ahead: usize) -> u8 {
        if self.cursor + ahead < self.bytes.len() {
            self.bytes[self.cursor + ahead]
        } else {
            0
        }
    }

    fn bump(&mut self) -> u8 {
        let byte = self.peek();
        self.cursor += 1;
        byte
    }

    fn skip_white(&mut self) {
        while matches!(self.peek(), b' ' | b'\t' | b'\r') {
            self.cursor += 1;
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, AssemblyError> {
        self.skip_white();
        let c = self.peek();
        if c == 0 || c == b';' {
            return Ok(None);
        }
        if c.is_ascii_alphabetic() || c == b'_' {
            return Ok(Some(self.scan_identifier()));
        }
        if c.is_ascii_digit() {
            return self.scan_number().map(Some);
        }
        if c == b'"' {
            return self.scan_string().map(Some);
        }
        if c == b'\'' {
            return self.scan_char().map(Some);
        }

        self.cursor += 1;
        let token = match c {
            b',' => Token::Comma,
            b':' => Token::Colon,
            b'[' => Token::LBracket,
            b']' => Token::RBracket,
            b'(' => Token::LParen,
            b')' => Token::RParen,
            b'+' => Token::Plus,
            b'-' => Token::Minus,
            b'*' => Token::Star,
            b'/' => Token::Slash,
            b'%' => Token::Percent,
            b'&' => Token::Amp,
            b'|' => Token::Pipe,
            b'^' => Token::Caret,
            b'~' => Token::Tilde,
            b'<' if self.peek() == b'<' => {
                self.cursor += 1;
                Token::Shl
            }
            b'>' if self.peek() == b'>' => {
                self.cursor += 1;
                Token::Shr
            }
            _ => {
                return Err(AssemblyError::new(format!(
                    "Illegal character '{}'",
                    c as char
                )));
            }
        };
        Ok(Some(token))
    }

    fn scan_identifier(&mut self) -> Token {
        let start = self.cursor;
        while self.peek().is_ascii_alphanumeric() || self.peek() == b'_' {
            self.cursor += 1;
        }
        let text = std::str::from_utf8(&self.bytes[start..self.cursor])
            .unwrap_or_default()
            .to_string();
        Token::Ident(text)
    }

    fn scan_number(&mut self) -> Result<Token, AssemblyError> {
        let start = self.cursor;
        if self.peek() == b'0' && matches!(self.peek_at(1), b'x' | b'X') {
            self.cursor += 2;
            let digits = self.take_while(|c| c.is_ascii_hexdigit());
            return parse_radix(digits, 16);
        }
        if self.peek() == b'0' && matches!(self.peek_at(1), b'b' | b'B') {
            self.cursor += 2;
            let digits = self.take_while(|c| matches!(c, b'0' | b'1'));
            return parse_radix(digits, 2);
        }

        self.take_while(|c| c.is_ascii_digit());
        let mut is_float = false;
        if self.peek() == b'.' && self.peek_at(1).is_ascii_digit() {
            is_float = true;
            self.cursor += 1;
            self.take_while(|c| c.is_ascii_digit());
        }
        let text = std::str::from_utf8(&self.bytes[start..self.cursor]).unwrap_or_default();
        if is_float {
            text.parse::<f64>()
                .map(Token::Float)
                .map_err(|_| AssemblyError::new(format!("Invalid number literal '{text}'")))
        } else {
            text.parse::<i128>()
                .map(Token::Int)
                .map_err(|_| AssemblyError::new(format!("Invalid number literal '{text}'")))
        }
    }

    fn take_while(&mut self, keep: impl Fn(u8) -> bool) -> &str {
        let start = self.cursor;
        while self.cursor < self.bytes.len() && keep(self.bytes[self.cursor]) {
            self.cursor += 1;
        }
        std::str::from_utf8(&self.bytes[start..self.cursor]).unwrap_or_default()
    }

    fn scan_string(&mut self) -> Result<Token, AssemblyError> {
        self.cursor += 1;
        let mut text = String::new();
        loop {
            match self.peek() {
                0 => return Err(AssemblyError::new("Unterminated string literal")),
                b'"' => {
                    self.cursor += 1;
                    return Ok(Token::Str(text));
                }
                b'\\' => {
                    self.cursor += 1;
                    text.push(self.scan_escape()?);
                }
                byte if byte.is_ascii() => {
                    self.cursor += 1;
                    text.push(byte as char);
                }
                _ => {
                    // The cursor sits on a char boundary, so the tail of the
                    // source line is still valid UTF-8.
                    let rest =
                        std::str::from_utf8(&self.bytes[self.cursor..]).unwrap_or_default();
                    match rest.chars().next() {
                        Some(ch) => {
                            self.cursor += ch.len_utf8();
                            text.push(ch);
                        }
                        None => {
                            return Err(AssemblyError::new("Invalid string literal"));
                        }
                    }
                }
            }
        }
    }

    fn scan_char(&mut self) -> Result<Token, AssemblyError> {
        self.cursor += 1;
        let value = match self.bump() {
            0 | b'\'' => return Err(AssemblyError::new("Empty character literal")),
            b'\\' => self.scan_escape()?,
            byte => byte as char,
        };
        if self.bump() != b'\'' {
            return Err(AssemblyError::new("Unterminated character literal"));
        }
        Ok(Token::Int(value as u32 as i128))
    }

    fn scan_escape(&mut self) -> Result<char, AssemblyError> {
        let escaped = match self.bump() {
            b'n' => '\n',
            b't' => '\t',
            b'r' => '\r',
            b'0' => '\0',
            b'\\' => '\\',
            b'"' => '"',
            b'\'' => '\'',
            b'x' => {
                let hi = self.bump();
                let lo = self.bump();
                let pair = [hi, lo];
                let text = std::str::from_utf8(&pair)
                    .map_err(|_| AssemblyError::new("Invalid escape sequence"))?;
                let value = u8::from_str_radix(text, 16)
                    .map_err(|_| AssemblyError::new("Invalid escape sequence"))?;
                value as char
            }
            other => {
                return Err(AssemblyError::new(format!(
                    "Invalid escape sequence '\\{}'",
                    other as char
                )));
            }
        };
        Ok(escaped)
    }
}

fn parse_radix(digits: &str, radix: u32) -> Result<Token, AssemblyError> {
    if digits.is_empty() {
        return Err(AssemblyError::new("Invalid number literal"));
    }
    i128::from_str_radix(digits, radix)
        .map(Token::Int)
        .map_err(|_| AssemblyError::new(format!("Invalid number literal '{digits}'")))
}

struct TokenStream {
    tokens: Vec<Token>,
    pos: usize,
}

impl TokenStream {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }
}

/// Parse a whole source text into nested assembly lines.
pub fn parse_source(source: &str, file: &str) -> Result<Vec<AssemblyLine>, AssemblyError> {
    let mut flat = Vec::new();
    for (index, raw) in source.lines().enumerate() {
        let line_no = index as u32 + 1;
        if let Some(line) = parse_line(raw, line_no, file)
            .map_err(|err| err.fill_location(line_no, file))?
        {
            flat.push(line);
        }
    }
    nest_blocks(flat)
}

fn parse_line(raw: &str, line_no: u32, file: &str) -> Result<Option<AssemblyLine>, AssemblyError> {
    let mut tokenizer = Tokenizer::new(raw);
    let mut tokens = Vec::new();
    while let Some(token) = tokenizer.next_token()? {
        tokens.push(token);
    }
    if tokens.is_empty() {
        return Ok(None);
    }

    let directive = match &tokens[0] {
        Token::Ident(name) => name.clone(),
        _ => return Err(AssemblyError::new("Expected directive or label name")),
    };

    // `name:` alone on a line is a label definition.
    if tokens.len() == 2 && tokens[1] == Token::Colon {
        let line = AssemblyLine::new(
            LABEL_DIRECTIVE,
            vec![Expression::ident(directive)],
            line_no,
            file,
        );
        return Ok(Some(line));
    }

    let mut stream = TokenStream { tokens, pos: 1 };
    let mut args = Vec::new();
    if !stream.at_end() {
        loop {
            args.push(parse_expr(&mut stream)?);
            if !stream.eat(&Token::Comma) {
                break;
            }
        }
    }
    if let Some(extra) = stream.peek() {
        return Err(AssemblyError::new(format!(
            "Unexpected token after arguments: {extra:?}"
        )));
    }
    Ok(Some(AssemblyLine::new(directive, args, line_no, file)))
}

fn parse_expr(stream: &mut TokenStream) -> Result<Expression, AssemblyError> {
    parse_bitor(stream)
}

fn parse_bitor(stream: &mut TokenStream) -> Result<Expression, AssemblyError> {
    let mut left = parse_bitxor(stream)?;
    while stream.eat(&Token::Pipe) {
        let right = parse_bitxor(stream)?;
        left = Expression::binary(BinaryOp::Or, left, right);
    }
    Ok(left)
}

fn parse_bitxor(stream: &mut TokenStream) -> Result<Expression, AssemblyError> {
    let mut left = parse_bitand(stream)?;
    while stream.eat(&Token::Caret) {
        let right = parse_bitand(stream)?;
        left = Expression::binary(BinaryOp::Xor, left, right);
    }
    Ok(left)
}

fn parse_bitand(stream: &mut TokenStream) -> Result<Expression, AssemblyError> {
    let mut left = parse_shift(stream)?;
    while stream.eat(&Token::Amp) {
        let right = parse_shift(stream)?;
        left = Expression::binary(BinaryOp::And, left, right);
    }
    Ok(left)
}

fn parse_shift(stream: &mut TokenStream) -> Result<Expression, AssemblyError> {
    let mut left = parse_sum(stream)?;
    loop {
        let op = match stream.peek() {
            Some(Token::Shl) => BinaryOp::Shl,
            Some(Token::Shr) => BinaryOp::Shr,
            _ => break,
        };
        stream.next();
        let right = parse_sum(stream)?;
        left = Expression::binary(op, left, right);
    }
    Ok(left)
}

fn parse_sum(stream: &mut TokenStream) -> Result<Expression, AssemblyError> {
    let mut left = parse_term(stream)?;
    loop {
        let op = match stream.peek() {
            Some(Token::Plus) => BinaryOp::Add,
            Some(Token::Minus) => BinaryOp::Sub,
            _ => break,
        };
        stream.next();
        let right = parse_term(stream)?;
        left = Expression::binary(op, left, right);
    }
    Ok(left)
}

fn parse_term(stream: &mut TokenStream) -> Result<Expression, AssemblyError> {
    let mut left = parse_factor(stream)?;
    loop {
        let op = match stream.peek() {
            Some(Token::Star) => BinaryOp::Mul,
            Some(Token::Slash) => BinaryOp::Div,
            Some(Token::Percent) => BinaryOp::Mod,
            _ => break,
        };
        stream.next();
        let right = parse_factor(stream)?;
        left = Expression::binary(op, left, right);
    }
    Ok(left)
}

fn parse_factor(stream: &mut TokenStream) -> Result<Expression, AssemblyError> {
    if stream.eat(&Token::Minus) {
        let operand = parse_factor(stream)?;
        return Ok(Expression::unary(UnaryOp::Neg, operand));
    }
    if stream.eat(&Token::Tilde) {
        let operand = parse_factor(stream)?;
        return Ok(Expression::unary(UnaryOp::BitNot, operand));
    }
    parse_postfix(stream)
}

fn parse_postfix(stream: &mut TokenStream) -> Result<Expression, AssemblyError> {
    let base = parse_primary(stream)?;
    if !stream.eat(&Token::LBracket) {
        return Ok(base);
    }
    let index = parse_expr(stream)?;
    if !stream.eat(&Token::RBracket) {
        return Err(AssemblyError::new("Expected ']' in subscript"));
    }
    if !stream.eat(&Token::Colon) {
        return Err(AssemblyError::new("Expected ':type' after subscript"));
    }
    let dtype = match stream.next() {
        Some(Token::Ident(name)) => Expression::ident(name),
        _ => return Err(AssemblyError::new("Expected data type after ':'")),
    };
    Ok(Expression::new(ExprKind::Subscript {
        base: Box::new(base),
        index: Box::new(index),
        dtype: Box::new(dtype),
    }))
}

fn parse_primary(stream: &mut TokenStream) -> Result<Expression, AssemblyError> {
    match stream.next() {
        Some(Token::Int(value)) => {
            let number = NumberConstant::from_int_literal(value)?;
            Ok(Expression::new(ExprKind::Number(number)))
        }
        Some(Token::Float(value)) => Ok(Expression::new(ExprKind::Number(
            NumberConstant::from_float_literal(value),
        ))),
        Some(Token::Str(text)) => Ok(Expression::string(text)),
        Some(Token::Ident(name)) => Ok(Expression::ident(name)),
        Some(Token::LParen) => {
            let inner = parse_expr(stream)?;
            if !stream.eat(&Token::RParen) {
                return Err(AssemblyError::new("Expected ')'"));
            }
            Ok(inner)
        }
        other => Err(AssemblyError::new(format!(
            "Expected expression, found {other:?}"
        ))),
    }
}

fn nest_blocks(flat: Vec<AssemblyLine>) -> Result<Vec<AssemblyLine>, AssemblyError> {
    struct Frame {
        opener: AssemblyLine,
        body: Vec<AssemblyLine>,
    }

    let mut stack: Vec<Frame> = Vec::new();
    let mut root = Vec::new();

    for line in flat {
        if line.is("END") {
            match stack.pop() {
                Some(frame) => {
                    let closed = frame.opener.with_block(frame.body);
                    match stack.last_mut() {
                        Some(parent) => parent.body.push(closed),
                        None => root.push(closed),
                    }
                }
                None => {
                    return Err(line.error("END without a matching block"));
                }
            }
        } else if BLOCK_OPENERS.iter().any(|opener| line.is(opener)) {
            stack.push(Frame {
                opener: line,
                body: Vec::new(),
            });
        } else {
            match stack.last_mut() {
                Some(frame) => frame.body.push(line),
                None => root.push(line),
            }
        }
    }

    if let Some(frame) = stack.pop() {
        return Err(frame.opener.error(format!(
            "Missing END for {} block",
            frame.opener.directive.to_ascii_uppercase()
        )));
    }
    Ok(root)
}
