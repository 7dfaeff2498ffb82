//! Statement lowering.

use crate::ast::{Expr, Stmt};
use crate::error::{JitError, Result};
use crate::ir::FuncResult;
use crate::syntax::span::Spanned;

use super::{is_docstring, GraphBuilder};

impl GraphBuilder<'_> {
    pub(crate) fn build_stmt(&mut self, stmt: &Spanned<Stmt>) -> Result<()> {
        match &stmt.node {
            Stmt::Assign { targets, value } => {
                let target = match targets.as_slice() {
                    [one] => one,
                    _ => return Err(JitError::unsupported("multiple assignment", stmt.span)),
                };
                let name = match &target.node {
                    Expr::Name(name) => name,
                    Expr::Tuple(_) | Expr::List(_) => {
                        return Err(JitError::unsupported("destructuring assignment", target.span))
                    }
                    other => {
                        return Err(JitError::unsupported(
                            format!("assignment to {}", other.kind()),
                            target.span,
                        ))
                    }
                };
                let var = self.build_value(value)?;
                // Name the binding just created; anything else is an alias.
                if let Some(last) = self.bindings.last_mut() {
                    if last.var == var && last.name.is_none() {
                        last.name = Some(name.clone());
                    }
                }
                self.symbols.insert(name.clone(), var);
                Ok(())
            }
            Stmt::Return(None) => {
                self.result = FuncResult::Empty;
                Ok(())
            }
            Stmt::Return(Some(value)) => {
                let var = self.build_value(value)?;
                self.result = FuncResult::Value(var);
                Ok(())
            }
            Stmt::Pass => Ok(()),
            Stmt::Expr(e) if is_docstring(&e.node) => Ok(()),
            Stmt::Expr(e) => self.build_expr(e).map(|_| ()),
            Stmt::AugAssign { op, .. } => Err(JitError::unsupported(
                format!("augmented assignment ({}=)", op.symbol()),
                stmt.span,
            )),
            Stmt::If { .. } | Stmt::While { .. } | Stmt::For { .. } => Err(JitError::unsupported(
                format!("control flow ({})", stmt.node.kind()),
                stmt.span,
            )),
            Stmt::FunctionDef(def) => Err(JitError::unsupported(
                format!("nested function definition '{}'", def.name.node),
                stmt.span,
            )),
        }
    }
}
