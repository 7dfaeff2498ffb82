use crate::ast::*;
use crate::syntax::lexeme::Lexeme;
use crate::syntax::span::Spanned;

use super::Parser;

/// Infix operators recognized by the binding-power loop.
#[derive(Clone, Copy)]
enum Infix {
    Arith(Operator),
    Cmp(CmpOperator),
    Bool(BoolOperator),
}

impl Infix {
    fn from_lexeme(lexeme: &Lexeme) -> Option<Infix> {
        let op = match lexeme {
            Lexeme::Plus => Infix::Arith(Operator::Add),
            Lexeme::Minus => Infix::Arith(Operator::Sub),
            Lexeme::Star => Infix::Arith(Operator::Mult),
            Lexeme::At => Infix::Arith(Operator::MatMult),
            Lexeme::Slash => Infix::Arith(Operator::Div),
            Lexeme::SlashSlash => Infix::Arith(Operator::FloorDiv),
            Lexeme::Percent => Infix::Arith(Operator::Mod),
            Lexeme::StarStar => Infix::Arith(Operator::Pow),
            Lexeme::EqEq => Infix::Cmp(CmpOperator::Eq),
            Lexeme::NotEq => Infix::Cmp(CmpOperator::NotEq),
            Lexeme::Lt => Infix::Cmp(CmpOperator::Lt),
            Lexeme::LtEq => Infix::Cmp(CmpOperator::LtE),
            Lexeme::Gt => Infix::Cmp(CmpOperator::Gt),
            Lexeme::GtEq => Infix::Cmp(CmpOperator::GtE),
            Lexeme::And => Infix::Bool(BoolOperator::And),
            Lexeme::Or => Infix::Bool(BoolOperator::Or),
            _ => return None,
        };
        Some(op)
    }

    fn binding_power(self) -> (u8, u8) {
        match self {
            Infix::Arith(op) => op.binding_power(),
            Infix::Cmp(_) => CMP_BP,
            Infix::Bool(BoolOperator::And) => AND_BP,
            Infix::Bool(BoolOperator::Or) => OR_BP,
        }
    }
}

impl Parser {
    pub(super) fn parse_expr(&mut self) -> Spanned<Expr> {
        self.parse_expr_bp(0)
    }

    /// A comma-separated expression list; more than one element (or a
    /// trailing comma) makes a tuple, as in `return a, b`.
    pub(super) fn parse_expr_list(&mut self) -> Spanned<Expr> {
        let first = self.parse_expr();
        if !self.at(&Lexeme::Comma) {
            return first;
        }
        let start = first.span;
        let mut elts = vec![first];
        while self.eat(&Lexeme::Comma) {
            if self.at_expr_list_end() {
                break;
            }
            elts.push(self.parse_expr());
        }
        let span = start.merge(self.prev_span());
        Spanned::new(Expr::Tuple(elts), span)
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> Spanned<Expr> {
        if !self.enter_nesting() {
            let span = self.current_span();
            self.exit_nesting();
            return Spanned::new(Expr::Name("_error_".to_string()), span);
        }

        let mut lhs = self.parse_prefix();

        while let Some(infix) = Infix::from_lexeme(self.peek()) {
            let (l_bp, r_bp) = infix.binding_power();
            if l_bp < min_bp {
                break;
            }

            self.advance(); // consume operator
            let rhs = self.parse_expr_bp(r_bp);
            let span = lhs.span.merge(rhs.span);
            let left = Box::new(lhs);
            let right = Box::new(rhs);
            let node = match infix {
                Infix::Arith(op) => Expr::BinOp { op, left, right },
                Infix::Cmp(op) => Expr::Compare { op, left, right },
                Infix::Bool(op) => Expr::BoolOp { op, left, right },
            };
            lhs = Spanned::new(node, span);
        }

        self.exit_nesting();
        lhs
    }

    fn parse_prefix(&mut self) -> Spanned<Expr> {
        let start = self.current_span();
        let (op, bp) = match self.peek() {
            Lexeme::Minus => (UnaryOperator::Neg, UNARY_BP),
            Lexeme::Plus => (UnaryOperator::Pos, UNARY_BP),
            Lexeme::Not => (UnaryOperator::Not, NOT_BP),
            _ => {
                let atom = self.parse_primary();
                return self.parse_postfix(atom);
            }
        };
        self.advance();
        let operand = self.parse_expr_bp(bp);
        let span = start.merge(operand.span);
        Spanned::new(
            Expr::UnaryOp {
                op,
                operand: Box::new(operand),
            },
            span,
        )
    }

    /// Postfix operations: calls, `.attr`, and `[index]`.
    fn parse_postfix(&mut self, mut expr: Spanned<Expr>) -> Spanned<Expr> {
        loop {
            if self.eat(&Lexeme::LParen) {
                let (args, keywords) = self.parse_call_args();
                self.expect(&Lexeme::RParen);
                let span = expr.span.merge(self.prev_span());
                expr = Spanned::new(
                    Expr::Call {
                        func: Box::new(expr),
                        args,
                        keywords,
                    },
                    span,
                );
            } else if self.eat(&Lexeme::Dot) {
                let attr = self.expect_ident();
                let span = expr.span.merge(attr.span);
                expr = Spanned::new(
                    Expr::Attribute {
                        value: Box::new(expr),
                        attr,
                    },
                    span,
                );
            } else if self.eat(&Lexeme::LBracket) {
                let index = self.parse_expr_list();
                self.expect(&Lexeme::RBracket);
                let span = expr.span.merge(self.prev_span());
                expr = Spanned::new(
                    Expr::Subscript {
                        value: Box::new(expr),
                        index: Box::new(index),
                    },
                    span,
                );
            } else {
                break;
            }
        }
        expr
    }

    fn parse_primary(&mut self) -> Spanned<Expr> {
        let start = self.current_span();

        match self.peek().clone() {
            Lexeme::Integer(n) => {
                self.advance();
                Spanned::new(Expr::Constant(Constant::Int(n)), start)
            }
            Lexeme::Float(v) => {
                self.advance();
                Spanned::new(Expr::Constant(Constant::Float(v)), start)
            }
            Lexeme::Str(s) => {
                self.advance();
                // adjacent literals concatenate: "a" "b"
                let mut text = s;
                while let Lexeme::Str(more) = self.peek().clone() {
                    self.advance();
                    text.push_str(&more);
                }
                let span = start.merge(self.prev_span());
                Spanned::new(Expr::Constant(Constant::Str(text)), span)
            }
            Lexeme::True => {
                self.advance();
                Spanned::new(Expr::Constant(Constant::Bool(true)), start)
            }
            Lexeme::False => {
                self.advance();
                Spanned::new(Expr::Constant(Constant::Bool(false)), start)
            }
            Lexeme::None => {
                self.advance();
                Spanned::new(Expr::Constant(Constant::None), start)
            }
            Lexeme::Ident(name) => {
                self.advance();
                Spanned::new(Expr::Name(name), start)
            }
            Lexeme::LParen => {
                self.advance();
                if self.eat(&Lexeme::RParen) {
                    let span = start.merge(self.prev_span());
                    return Spanned::new(Expr::Tuple(Vec::new()), span);
                }
                let first = self.parse_expr();
                if self.eat(&Lexeme::Comma) {
                    let mut elts = vec![first];
                    while !self.at(&Lexeme::RParen) && !self.at(&Lexeme::Eof) {
                        elts.push(self.parse_expr());
                        if !self.eat(&Lexeme::Comma) {
                            break;
                        }
                    }
                    self.expect(&Lexeme::RParen);
                    let span = start.merge(self.prev_span());
                    Spanned::new(Expr::Tuple(elts), span)
                } else {
                    // Parenthesized expression
                    self.expect(&Lexeme::RParen);
                    first
                }
            }
            Lexeme::LBracket => {
                self.advance();
                let mut elts = Vec::new();
                while !self.at(&Lexeme::RBracket) && !self.at(&Lexeme::Eof) {
                    elts.push(self.parse_expr());
                    if !self.eat(&Lexeme::Comma) {
                        break;
                    }
                }
                self.expect(&Lexeme::RBracket);
                let span = start.merge(self.prev_span());
                Spanned::new(Expr::List(elts), span)
            }
            other => {
                self.error_at_current(&format!("expected expression, found {}", other.description()));
                if !matches!(
                    other,
                    Lexeme::Newline | Lexeme::Eof | Lexeme::Dedent | Lexeme::Indent
                ) {
                    self.advance();
                }
                Spanned::new(Expr::Name("_error_".to_string()), start)
            }
        }
    }

    fn parse_call_args(&mut self) -> (Vec<Spanned<Expr>>, Vec<Keyword>) {
        let mut args = Vec::new();
        let mut keywords: Vec<Keyword> = Vec::new();
        while !self.at(&Lexeme::RParen) && !self.at(&Lexeme::Eof) {
            let is_keyword =
                matches!(self.peek(), Lexeme::Ident(_)) && matches!(self.peek_nth(1), Lexeme::Eq);
            if is_keyword {
                let arg = self.expect_ident();
                self.expect(&Lexeme::Eq);
                let value = self.parse_expr();
                keywords.push(Keyword { arg, value });
            } else {
                if !keywords.is_empty() {
                    self.error_at_current("positional argument follows keyword argument");
                }
                args.push(self.parse_expr());
            }
            if !self.eat(&Lexeme::Comma) {
                break;
            }
        }
        (args, keywords)
    }

    fn at_expr_list_end(&self) -> bool {
        matches!(
            self.peek(),
            Lexeme::Newline
                | Lexeme::Eof
                | Lexeme::Eq
                | Lexeme::Semicolon
                | Lexeme::Colon
                | Lexeme::RParen
                | Lexeme::RBracket
                | Lexeme::In
        )
    }
}
