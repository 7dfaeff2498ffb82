use std::collections::VecDeque;

use crate::diagnostic::Diagnostic;
use crate::syntax::lexeme::Lexeme;
use crate::syntax::span::{Span, Spanned};

const TAB_WIDTH: usize = 8;

pub(crate) struct Lexer<'src> {
    source: &'src [u8],
    pos: usize,
    diagnostics: Vec<Diagnostic>,
    /// Indentation columns of the enclosing blocks; always starts with 0.
    indents: Vec<usize>,
    /// Open `(`/`[` count. Newlines inside brackets are not significant.
    bracket_depth: u32,
    at_line_start: bool,
    /// Layout tokens (dedents) waiting to be handed out.
    pending: VecDeque<Spanned<Lexeme>>,
    last: Option<Lexeme>,
}

impl<'src> Lexer<'src> {
    pub(crate) fn new(source: &'src str) -> Self {
        Self {
            source: source.as_bytes(),
            pos: 0,
            diagnostics: Vec::new(),
            indents: vec![0],
            bracket_depth: 0,
            at_line_start: true,
            pending: VecDeque::new(),
            last: None,
        }
    }

    pub(crate) fn tokenize(mut self) -> (Vec<Spanned<Lexeme>>, Vec<Diagnostic>) {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token();
            let is_eof = tok.node == Lexeme::Eof;
            self.last = Some(tok.node.clone());
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        (tokens, self.diagnostics)
    }

    fn next_token(&mut self) -> Spanned<Lexeme> {
        loop {
            if let Some(tok) = self.pending.pop_front() {
                return tok;
            }

            if self.at_line_start && self.bracket_depth == 0 {
                self.at_line_start = false;
                if let Some(tok) = self.scan_indentation() {
                    return tok;
                }
                continue;
            }

            self.skip_inline_whitespace();

            if self.pos >= self.source.len() {
                return self.finish();
            }

            let start = self.pos;
            let ch = self.source[self.pos];

            if ch == b'\n' {
                self.pos += 1;
                if self.bracket_depth > 0 {
                    continue;
                }
                self.at_line_start = true;
                return self.make_token(Lexeme::Newline, start, self.pos);
            }

            if ch == b'\\' && self.peek_at(1) == Some(b'\n') {
                // Explicit line joining.
                self.pos += 2;
                continue;
            }

            if is_ident_start(ch) {
                return self.scan_ident_or_keyword();
            }

            if ch.is_ascii_digit()
                || (ch == b'.' && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()))
            {
                return self.scan_number();
            }

            if ch == b'"' || ch == b'\'' {
                return self.scan_string();
            }

            if let Some(tok) = self.scan_symbol(start) {
                return tok;
            }
            // scan_symbol returned None → error was recorded, try again
        }
    }

    /// Measure the indentation of a fresh logical line and emit
    /// `Indent`/`Dedent` tokens. Blank and comment-only lines are skipped.
    fn scan_indentation(&mut self) -> Option<Spanned<Lexeme>> {
        let line_start = self.pos;
        let mut column = 0usize;
        while let Some(ch) = self.peek_at(0) {
            match ch {
                b' ' => column += 1,
                b'\t' => column = (column / TAB_WIDTH + 1) * TAB_WIDTH,
                b'\r' | b'\x0c' => {}
                _ => break,
            }
            self.pos += 1;
        }

        match self.peek_at(0) {
            None => return None,
            Some(b'\n') => {
                self.pos += 1;
                self.at_line_start = true;
                return None;
            }
            Some(b'#') => {
                self.skip_comment();
                if self.peek_at(0) == Some(b'\n') {
                    self.pos += 1;
                }
                self.at_line_start = true;
                return None;
            }
            Some(_) => {}
        }

        let current = *self.indents.last().unwrap_or(&0);
        if column > current {
            self.indents.push(column);
            return Some(self.make_token(Lexeme::Indent, line_start, self.pos));
        }
        if column < current {
            while self.indents.len() > 1 && *self.indents.last().unwrap_or(&0) > column {
                self.indents.pop();
                let tok = self.make_token(Lexeme::Dedent, self.pos, self.pos);
                self.pending.push_back(tok);
            }
            if *self.indents.last().unwrap_or(&0) != column {
                self.diagnostics.push(
                    Diagnostic::error(
                        "unindent does not match any outer indentation level".to_string(),
                        Span::new(line_start as u32, self.pos as u32),
                    )
                    .with_help("indent this line to the level of an enclosing block".to_string()),
                );
            }
            return self.pending.pop_front();
        }
        None
    }

    fn finish(&mut self) -> Spanned<Lexeme> {
        let end = self.source.len();
        let needs_newline = !matches!(
            self.last,
            None | Some(Lexeme::Newline) | Some(Lexeme::Dedent) | Some(Lexeme::Indent)
        );
        if needs_newline {
            self.last = Some(Lexeme::Newline);
            return self.make_token(Lexeme::Newline, end, end);
        }
        if self.indents.len() > 1 {
            self.indents.pop();
            return self.make_token(Lexeme::Dedent, end, end);
        }
        self.make_token(Lexeme::Eof, end, end)
    }

    fn skip_inline_whitespace(&mut self) {
        while let Some(ch) = self.peek_at(0) {
            match ch {
                b' ' | b'\t' | b'\r' | b'\x0c' => self.pos += 1,
                b'\n' if self.bracket_depth > 0 => self.pos += 1,
                b'#' => self.skip_comment(),
                _ => break,
            }
        }
    }

    fn skip_comment(&mut self) {
        while self.pos < self.source.len() && self.source[self.pos] != b'\n' {
            self.pos += 1;
        }
    }

    fn scan_ident_or_keyword(&mut self) -> Spanned<Lexeme> {
        let start = self.pos;
        while self.pos < self.source.len() && is_ident_continue(self.source[self.pos]) {
            self.pos += 1;
        }
        let text = String::from_utf8_lossy(&self.source[start..self.pos]).into_owned();
        let token = Lexeme::from_keyword(&text).unwrap_or(Lexeme::Ident(text));
        self.make_token(token, start, self.pos)
    }

    fn scan_number(&mut self) -> Spanned<Lexeme> {
        let start = self.pos;
        let mut is_float = false;
        self.eat_digits();
        if self.peek_at(0) == Some(b'.') {
            is_float = true;
            self.pos += 1;
            self.eat_digits();
        }
        if matches!(self.peek_at(0), Some(b'e') | Some(b'E')) {
            let save = self.pos;
            self.pos += 1;
            if matches!(self.peek_at(0), Some(b'+') | Some(b'-')) {
                self.pos += 1;
            }
            if self.peek_at(0).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                self.eat_digits();
            } else {
                self.pos = save;
            }
        }

        let text: String = String::from_utf8_lossy(&self.source[start..self.pos])
            .chars()
            .filter(|c| *c != '_')
            .collect();
        let span = Span::new(start as u32, self.pos as u32);
        if is_float {
            match text.parse::<f64>() {
                Ok(v) => self.make_token(Lexeme::Float(v), start, self.pos),
                Err(_) => {
                    self.diagnostics.push(Diagnostic::error(
                        format!("invalid float literal '{}'", text),
                        span,
                    ));
                    self.make_token(Lexeme::Float(0.0), start, self.pos)
                }
            }
        } else {
            match text.parse::<i64>() {
                Ok(n) => self.make_token(Lexeme::Integer(n), start, self.pos),
                Err(_) => {
                    self.diagnostics.push(
                        Diagnostic::error(format!("integer literal '{}' is too large", text), span)
                            .with_help(format!("maximum integer value is {}", i64::MAX)),
                    );
                    self.make_token(Lexeme::Integer(0), start, self.pos)
                }
            }
        }
    }

    fn eat_digits(&mut self) {
        while self
            .peek_at(0)
            .is_some_and(|c| c.is_ascii_digit() || c == b'_')
        {
            self.pos += 1;
        }
    }

    /// Scan a single- or triple-quoted string literal.
    fn scan_string(&mut self) -> Spanned<Lexeme> {
        let start = self.pos;
        let quote = self.source[self.pos];
        let triple = self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote);
        self.pos += if triple { 3 } else { 1 };

        let mut value: Vec<u8> = Vec::new();
        loop {
            let Some(ch) = self.peek_at(0) else {
                self.diagnostics.push(
                    Diagnostic::error(
                        "unterminated string literal".to_string(),
                        Span::new(start as u32, self.pos as u32),
                    )
                    .with_help("add the closing quote".to_string()),
                );
                break;
            };
            if ch == quote {
                if !triple {
                    self.pos += 1;
                    break;
                }
                if self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote) {
                    self.pos += 3;
                    break;
                }
            }
            if ch == b'\n' && !triple {
                self.diagnostics.push(Diagnostic::error(
                    "unterminated string literal".to_string(),
                    Span::new(start as u32, self.pos as u32),
                ));
                break;
            }
            if ch == b'\\' {
                if let Some(esc) = self.peek_at(1) {
                    let resolved = match esc {
                        b'n' => Some(b'\n'),
                        b't' => Some(b'\t'),
                        b'r' => Some(b'\r'),
                        b'0' => Some(b'\0'),
                        b'\\' => Some(b'\\'),
                        b'\'' => Some(b'\''),
                        b'"' => Some(b'"'),
                        b'\n' => None,
                        other => {
                            value.push(b'\\');
                            Some(other)
                        }
                    };
                    if let Some(b) = resolved {
                        value.push(b);
                    }
                    self.pos += 2;
                    continue;
                }
            }
            value.push(ch);
            self.pos += 1;
        }

        let text = String::from_utf8_lossy(&value).into_owned();
        self.make_token(Lexeme::Str(text), start, self.pos)
    }

    fn scan_symbol(&mut self, start: usize) -> Option<Spanned<Lexeme>> {
        let ch = self.source[self.pos];
        self.pos += 1;

        let token = match ch {
            b'(' => {
                self.bracket_depth += 1;
                Lexeme::LParen
            }
            b')' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                Lexeme::RParen
            }
            b'[' => {
                self.bracket_depth += 1;
                Lexeme::LBracket
            }
            b']' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                Lexeme::RBracket
            }
            b',' => Lexeme::Comma,
            b':' => Lexeme::Colon,
            b';' => Lexeme::Semicolon,
            b'.' => Lexeme::Dot,
            b'@' => Lexeme::At,
            b'%' => Lexeme::Percent,
            b'+' => self.with_eq(Lexeme::Plus, Lexeme::PlusEq),
            b'-' => {
                if self.peek_at(0) == Some(b'>') {
                    self.pos += 1;
                    Lexeme::Arrow
                } else {
                    self.with_eq(Lexeme::Minus, Lexeme::MinusEq)
                }
            }
            b'*' => {
                if self.peek_at(0) == Some(b'*') {
                    self.pos += 1;
                    Lexeme::StarStar
                } else {
                    self.with_eq(Lexeme::Star, Lexeme::StarEq)
                }
            }
            b'/' => {
                if self.peek_at(0) == Some(b'/') {
                    self.pos += 1;
                    Lexeme::SlashSlash
                } else {
                    self.with_eq(Lexeme::Slash, Lexeme::SlashEq)
                }
            }
            b'=' => self.with_eq(Lexeme::Eq, Lexeme::EqEq),
            b'<' => self.with_eq(Lexeme::Lt, Lexeme::LtEq),
            b'>' => self.with_eq(Lexeme::Gt, Lexeme::GtEq),
            b'!' if self.peek_at(0) == Some(b'=') => {
                self.pos += 1;
                Lexeme::NotEq
            }
            _ => {
                let c = self.char_at(self.pos - 1);
                if !c.is_ascii() {
                    self.pos += c.len_utf8() - 1;
                }
                self.diagnostics.push(
                    Diagnostic::error(
                        format!("unexpected character '{}' (U+{:04X})", c, c as u32),
                        Span::new(start as u32, self.pos as u32),
                    )
                    .with_help(
                        "this character is not part of the kernel function syntax".to_string(),
                    ),
                );
                return None;
            }
        };

        Some(self.make_token(token, start, self.pos))
    }

    /// The full character starting at byte `pos`.
    fn char_at(&self, pos: usize) -> char {
        let end = (pos + 4).min(self.source.len());
        let bytes = &self.source[pos..end];
        let text = match std::str::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => std::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or(""),
        };
        text.chars().next().unwrap_or(char::REPLACEMENT_CHARACTER)
    }

    /// Return `compound` and consume a following `=`, or return `plain`.
    fn with_eq(&mut self, plain: Lexeme, compound: Lexeme) -> Lexeme {
        if self.peek_at(0) == Some(b'=') {
            self.pos += 1;
            compound
        } else {
            plain
        }
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn make_token(&self, token: Lexeme, start: usize, end: usize) -> Spanned<Lexeme> {
        Spanned::new(token, Span::new(start as u32, end as u32))
    }
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_ident_continue(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || ch == b'_'
}

#[cfg(test)]
mod tests;
