mod expr;
mod stmt;

use crate::ast::Module;
use crate::diagnostic::Diagnostic;
use crate::syntax::lexeme::Lexeme;
use crate::syntax::span::{Span, Spanned};

const MAX_NESTING_DEPTH: u32 = 200;

pub(crate) struct Parser {
    tokens: Vec<Spanned<Lexeme>>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
    depth: u32,
}

impl Parser {
    pub(crate) fn new(tokens: Vec<Spanned<Lexeme>>) -> Self {
        Self {
            tokens,
            pos: 0,
            diagnostics: Vec::new(),
            depth: 0,
        }
    }

    fn enter_nesting(&mut self) -> bool {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            self.error_with_help(
                "nesting depth exceeded (maximum 200 levels)",
                "split the expression into several assignments",
            );
            return false;
        }
        true
    }

    fn exit_nesting(&mut self) {
        self.depth -= 1;
    }

    pub(crate) fn parse_module(mut self) -> Result<Module, Vec<Diagnostic>> {
        let mut body = Vec::new();
        while !self.at(&Lexeme::Eof) {
            if self.eat(&Lexeme::Newline) {
                continue;
            }
            if self.at(&Lexeme::Indent) {
                self.error_at_current("unexpected indent");
                self.advance();
                continue;
            }
            if self.at(&Lexeme::Dedent) {
                self.advance();
                continue;
            }
            let before = self.pos;
            body.extend(self.parse_statement());
            if self.pos == before {
                // guarantee progress on garbage input
                self.advance();
            }
        }

        if !self.diagnostics.is_empty() {
            return Err(self.diagnostics);
        }
        Ok(Module { body })
    }

    // --- Utility methods ---

    fn peek(&self) -> &Lexeme {
        &self.tokens[self.pos].node
    }

    fn peek_nth(&self, n: usize) -> &Lexeme {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx].node
    }

    fn current_span(&self) -> Span {
        self.tokens[self.pos].span
    }

    fn prev_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span
        } else {
            self.current_span()
        }
    }

    fn advance(&mut self) -> &Spanned<Lexeme> {
        let tok = &self.tokens[self.pos];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn at(&self, token: &Lexeme) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(token)
    }

    fn eat(&mut self, token: &Lexeme) -> bool {
        if self.at(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Lexeme) -> Span {
        if self.at(token) {
            let span = self.current_span();
            self.advance();
            span
        } else {
            self.error_at_current(&format!(
                "expected {}, found {}",
                token.description(),
                self.peek().description()
            ));
            self.current_span()
        }
    }

    fn expect_ident(&mut self) -> Spanned<String> {
        if let Lexeme::Ident(name) = self.peek().clone() {
            let span = self.current_span();
            self.advance();
            Spanned::new(name, span)
        } else {
            self.error_at_current(&format!(
                "expected identifier, found {}",
                self.peek().description()
            ));
            Spanned::new("_error_".to_string(), self.current_span())
        }
    }

    /// Skip to the start of the next logical line after an error.
    fn synchronize(&mut self) {
        while !self.at(&Lexeme::Newline) && !self.at(&Lexeme::Eof) {
            self.advance();
        }
        self.eat(&Lexeme::Newline);
    }

    fn error_at_current(&mut self, msg: &str) {
        self.diagnostics
            .push(Diagnostic::error(msg.to_string(), self.current_span()));
    }

    fn error_with_help(&mut self, msg: &str, help: &str) {
        self.diagnostics.push(
            Diagnostic::error(msg.to_string(), self.current_span()).with_help(help.to_string()),
        );
    }
}
