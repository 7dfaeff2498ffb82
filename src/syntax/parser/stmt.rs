use crate::ast::*;
use crate::syntax::lexeme::Lexeme;
use crate::syntax::span::Spanned;

use super::Parser;

impl Parser {
    /// Parse one logical line or compound statement. A line holding
    /// `a = 1; b = 2` yields several statements.
    pub(super) fn parse_statement(&mut self) -> Vec<Spanned<Stmt>> {
        match self.peek() {
            Lexeme::At | Lexeme::Def => vec![self.parse_function_def()],
            Lexeme::If => vec![self.parse_if()],
            Lexeme::While => vec![self.parse_while()],
            Lexeme::For => vec![self.parse_for()],
            _ => self.parse_simple_line(),
        }
    }

    fn parse_simple_line(&mut self) -> Vec<Spanned<Stmt>> {
        let mut stmts = vec![self.parse_small_statement()];
        while self.eat(&Lexeme::Semicolon) {
            if self.at(&Lexeme::Newline) || self.at(&Lexeme::Eof) {
                break;
            }
            stmts.push(self.parse_small_statement());
        }
        if !self.eat(&Lexeme::Newline) && !self.at(&Lexeme::Eof) {
            self.error_at_current(&format!(
                "expected end of line, found {}",
                self.peek().description()
            ));
            self.synchronize();
        }
        stmts
    }

    fn parse_small_statement(&mut self) -> Spanned<Stmt> {
        let start = self.current_span();
        match self.peek() {
            Lexeme::Pass => {
                self.advance();
                Spanned::new(Stmt::Pass, start)
            }
            Lexeme::Return => {
                self.advance();
                let value = if self.at_line_end() {
                    None
                } else {
                    Some(self.parse_expr_list())
                };
                Spanned::new(Stmt::Return(value), start.merge(self.prev_span()))
            }
            _ => self.parse_expr_statement(),
        }
    }

    fn parse_expr_statement(&mut self) -> Spanned<Stmt> {
        let start = self.current_span();
        let first = self.parse_expr_list();

        if let Some(op) = augmented_operator(self.peek()) {
            self.advance();
            let value = self.parse_expr_list();
            let span = start.merge(self.prev_span());
            return Spanned::new(
                Stmt::AugAssign {
                    target: first,
                    op,
                    value,
                },
                span,
            );
        }

        if !self.at(&Lexeme::Eq) {
            let span = first.span;
            return Spanned::new(Stmt::Expr(first), span);
        }

        let mut chain = vec![first];
        while self.eat(&Lexeme::Eq) {
            chain.push(self.parse_expr_list());
        }
        let value = chain.pop().unwrap_or_else(|| Spanned::dummy(Expr::Tuple(Vec::new())));
        let span = start.merge(self.prev_span());
        Spanned::new(
            Stmt::Assign {
                targets: chain,
                value,
            },
            span,
        )
    }

    fn parse_function_def(&mut self) -> Spanned<Stmt> {
        let start = self.current_span();

        let mut decorators = Vec::new();
        while self.eat(&Lexeme::At) {
            decorators.push(self.parse_expr());
            if !self.eat(&Lexeme::Newline) {
                self.error_at_current("expected end of line after decorator");
                self.synchronize();
            }
            while self.eat(&Lexeme::Newline) {}
        }

        self.expect(&Lexeme::Def);
        let name = self.expect_ident();
        self.expect(&Lexeme::LParen);
        let args = self.parse_params();
        self.expect(&Lexeme::RParen);
        let returns = if self.eat(&Lexeme::Arrow) {
            Some(self.parse_expr())
        } else {
            None
        };
        let body = self.parse_block();
        let span = start.merge(self.prev_span());

        Spanned::new(
            Stmt::FunctionDef(FunctionDef {
                name,
                decorators,
                args,
                returns,
                body,
            }),
            span,
        )
    }

    fn parse_params(&mut self) -> Vec<Arg> {
        let mut args = Vec::new();
        while !self.at(&Lexeme::RParen) && !self.at(&Lexeme::Eof) {
            if self.at(&Lexeme::Star) || self.at(&Lexeme::StarStar) {
                self.error_with_help(
                    "variadic parameters are not supported",
                    "declare every tensor parameter explicitly",
                );
                self.advance();
                continue;
            }
            let name = self.expect_ident();
            let annotation = if self.eat(&Lexeme::Colon) {
                Some(self.parse_expr())
            } else {
                None
            };
            if self.at(&Lexeme::Eq) {
                self.error_with_help(
                    "default parameter values are not supported",
                    "every parameter is bound to a tensor argument at call time",
                );
                self.advance();
                self.parse_expr();
            }
            args.push(Arg { name, annotation });
            if !self.eat(&Lexeme::Comma) {
                break;
            }
        }
        args
    }

    fn parse_if(&mut self) -> Spanned<Stmt> {
        let start = self.current_span();
        self.advance(); // `if` or `elif`
        let test = self.parse_expr();
        let body = self.parse_block();
        let orelse = if self.at(&Lexeme::Elif) {
            vec![self.parse_if()]
        } else if self.eat(&Lexeme::Else) {
            self.parse_block()
        } else {
            Vec::new()
        };
        let span = start.merge(self.prev_span());
        Spanned::new(Stmt::If { test, body, orelse }, span)
    }

    fn parse_while(&mut self) -> Spanned<Stmt> {
        let start = self.expect(&Lexeme::While);
        let test = self.parse_expr();
        let body = self.parse_block();
        let span = start.merge(self.prev_span());
        Spanned::new(Stmt::While { test, body }, span)
    }

    fn parse_for(&mut self) -> Spanned<Stmt> {
        let start = self.expect(&Lexeme::For);
        let target = self.parse_expr_list();
        self.expect(&Lexeme::In);
        let iter = self.parse_expr_list();
        let body = self.parse_block();
        let span = start.merge(self.prev_span());
        Spanned::new(Stmt::For { target, iter, body }, span)
    }

    /// `: NEWLINE INDENT stmt+ DEDENT`, or `: simple_stmt` on the same line.
    fn parse_block(&mut self) -> Vec<Spanned<Stmt>> {
        self.expect(&Lexeme::Colon);
        if !self.enter_nesting() {
            self.synchronize();
            self.exit_nesting();
            return Vec::new();
        }

        let mut body = Vec::new();
        if self.eat(&Lexeme::Newline) {
            if !self.eat(&Lexeme::Indent) {
                self.error_at_current("expected an indented block");
                self.exit_nesting();
                return body;
            }
            while !self.at(&Lexeme::Dedent) && !self.at(&Lexeme::Eof) {
                if self.eat(&Lexeme::Newline) {
                    continue;
                }
                let before = self.pos;
                body.extend(self.parse_statement());
                if self.pos == before {
                    self.advance();
                }
            }
            self.eat(&Lexeme::Dedent);
        } else {
            body.extend(self.parse_simple_line());
        }

        self.exit_nesting();
        body
    }

    fn at_line_end(&self) -> bool {
        matches!(
            self.peek(),
            Lexeme::Newline | Lexeme::Semicolon | Lexeme::Eof | Lexeme::Dedent
        )
    }
}

fn augmented_operator(lexeme: &Lexeme) -> Option<Operator> {
    match lexeme {
        Lexeme::PlusEq => Some(Operator::Add),
        Lexeme::MinusEq => Some(Operator::Sub),
        Lexeme::StarEq => Some(Operator::Mult),
        Lexeme::SlashEq => Some(Operator::Div),
        _ => None,
    }
}
