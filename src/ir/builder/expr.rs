//! Expression lowering and struct-info inference.

use crate::ast::{Constant, Expr, Operator};
use crate::error::{JitError, Result};
use crate::ir::{HighOp, Op, PrintArg, StructInfo, ValueId};
use crate::syntax::span::{Span, Spanned};
use crate::tensor::{broadcast_shapes, DType, Scalar, TensorDescriptor};

use super::GraphBuilder;

/// Result of lowering one expression.
pub(crate) enum Lowered {
    Value(ValueId),
    /// A string literal; only meaningful as a `print` argument.
    Literal(String),
}

impl GraphBuilder<'_> {
    /// Lower an expression that must produce a graph value.
    pub(crate) fn build_value(&mut self, expr: &Spanned<Expr>) -> Result<ValueId> {
        match self.build_expr(expr)? {
            Lowered::Value(var) => Ok(var),
            Lowered::Literal(_) => Err(JitError::unsupported(
                "string literal outside of print",
                expr.span,
            )),
        }
    }

    pub(crate) fn build_expr(&mut self, expr: &Spanned<Expr>) -> Result<Lowered> {
        match &expr.node {
            Expr::Name(name) => self
                .symbols
                .get(name)
                .copied()
                .map(Lowered::Value)
                .ok_or_else(|| JitError::UnboundName {
                    name: name.clone(),
                    span: expr.span,
                }),
            Expr::Constant(c) => self.build_constant(c, expr.span),
            Expr::BinOp { op, left, right } => {
                let high = match op {
                    Operator::Add => HighOp::Add,
                    Operator::Mult => HighOp::Multiply,
                    other => {
                        return Err(JitError::unsupported(
                            format!("operator {}", other.name()),
                            expr.span,
                        ))
                    }
                };
                let lhs = self.build_value(left)?;
                let rhs = self.build_value(right)?;
                let (info, weak) = self.infer_binary(high, lhs, rhs, expr.span)?;
                let var = self.emit(
                    Op::Call {
                        op: high,
                        args: vec![lhs, rhs],
                    },
                    StructInfo::Tensor(info),
                    weak,
                );
                Ok(Lowered::Value(var))
            }
            Expr::Call {
                func,
                args,
                keywords,
            } => {
                let callee = func.node.dotted_path();
                if callee.as_deref() != Some("print") {
                    let shown = callee.unwrap_or_else(|| crate::ast::unparse(&func.node));
                    return Err(JitError::unsupported(format!("call to '{}'", shown), func.span));
                }
                if let Some(kw) = keywords.first() {
                    return Err(JitError::unsupported(
                        format!("keyword argument '{}' to print", kw.arg.node),
                        kw.arg.span,
                    ));
                }
                let mut print_args = Vec::with_capacity(args.len());
                for arg in args {
                    print_args.push(match self.build_expr(arg)? {
                        Lowered::Value(var) => PrintArg::Value(var),
                        Lowered::Literal(text) => PrintArg::Literal(text),
                    });
                }
                let var = self.emit(Op::Print(print_args), StructInfo::Object, false);
                Ok(Lowered::Value(var))
            }
            Expr::Tuple(elts) => {
                let mut fields = Vec::with_capacity(elts.len());
                let mut infos = Vec::with_capacity(elts.len());
                for elt in elts {
                    let var = self.build_value(elt)?;
                    infos.push(self.info(var));
                    fields.push(var);
                }
                let var = self.emit(Op::Tuple(fields), StructInfo::Tuple(infos), false);
                Ok(Lowered::Value(var))
            }
            Expr::UnaryOp { op, .. } => Err(JitError::unsupported(
                format!("operator {}", op.name()),
                expr.span,
            )),
            Expr::Compare { op, .. } => Err(JitError::unsupported(
                format!("comparison {}", op.name()),
                expr.span,
            )),
            Expr::BoolOp { op, .. } => Err(JitError::unsupported(
                format!("boolean operator {}", op.name()),
                expr.span,
            )),
            Expr::Attribute { .. } => Err(JitError::unsupported(
                format!("attribute access '{}'", crate::ast::unparse(&expr.node)),
                expr.span,
            )),
            Expr::Subscript { .. } => Err(JitError::unsupported("subscript", expr.span)),
            Expr::List(_) => Err(JitError::unsupported("list literal", expr.span)),
        }
    }

    fn build_constant(&mut self, c: &Constant, span: Span) -> Result<Lowered> {
        let value = match c {
            Constant::Int(n) => Scalar::I64(*n),
            Constant::Float(v) => Scalar::F32(*v as f32),
            Constant::Str(s) => return Ok(Lowered::Literal(s.clone())),
            Constant::Bool(b) => {
                let text = if *b { "True" } else { "False" };
                return Err(JitError::unsupported(format!("constant {}", text), span));
            }
            Constant::None => return Err(JitError::unsupported("constant None", span)),
        };
        let info = StructInfo::Tensor(TensorDescriptor::scalar(value.dtype()));
        Ok(Lowered::Value(self.emit(Op::Constant(value), info, true)))
    }

    pub(crate) fn info(&self, var: ValueId) -> StructInfo {
        self.infos.get(&var).cloned().unwrap_or(StructInfo::Object)
    }

    fn tensor_operand(&self, op: HighOp, var: ValueId, span: Span) -> Result<TensorDescriptor> {
        match self.info(var) {
            StructInfo::Tensor(desc) => Ok(desc),
            StructInfo::Tuple(_) => Err(JitError::TypeMismatch {
                message: format!("{} expects tensor operands, got a tuple", op.name()),
                span,
            }),
            StructInfo::Object => Err(JitError::TypeMismatch {
                message: format!("{} expects tensor operands, got an object", op.name()),
                span,
            }),
        }
    }

    /// Result descriptor of an element-wise binary op, and whether it stays weak.
    fn infer_binary(
        &self,
        op: HighOp,
        lhs: ValueId,
        rhs: ValueId,
        span: Span,
    ) -> Result<(TensorDescriptor, bool)> {
        let l = self.tensor_operand(op, lhs, span)?;
        let r = self.tensor_operand(op, rhs, span)?;
        let (lw, rw) = (self.weak.contains(&lhs), self.weak.contains(&rhs));
        let (dtype, weak) = match (lw, rw) {
            (true, true) => {
                let dtype = if l.dtype.is_float() || r.dtype.is_float() {
                    DType::Float32
                } else {
                    DType::Int64
                };
                (dtype, true)
            }
            (true, false) => (r.dtype, false),
            (false, true) => (l.dtype, false),
            (false, false) if l.dtype == r.dtype => (l.dtype, false),
            (false, false) => {
                return Err(JitError::TypeMismatch {
                    message: format!("{}: operand dtypes {} and {} differ", op.name(), l.dtype, r.dtype),
                    span,
                })
            }
        };
        let shape = broadcast_shapes(&l.shape, &r.shape).ok_or_else(|| JitError::TypeMismatch {
            message: format!(
                "{}: shapes {} and {} cannot be broadcast",
                op.name(),
                l.shape_str(),
                r.shape_str()
            ),
            span,
        })?;
        Ok((TensorDescriptor::new(shape, dtype), weak))
    }
}
