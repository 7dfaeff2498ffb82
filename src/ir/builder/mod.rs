//! GraphBuilder: lowers a parsed function into an [`IRModule`].
//!
//! One `build` call owns all builder state (module under construction,
//! symbol table, pending bindings, declared result); `build` consumes the
//! builder, so a builder can never be re-entered or reused.
//!
//! Lowering is a single ordered walk over the function body. Every
//! expression becomes zero or more bindings in one plain block; the
//! optimization pipeline splits that block into dataflow regions later.

mod expr;
mod stmt;
#[cfg(test)]
mod tests;

use std::collections::{HashMap, HashSet};

use crate::ast::{FunctionDef, Module, Stmt};
use crate::context::Context;
use crate::error::{JitError, Result};
use crate::syntax::span::Span;
use crate::tensor::TensorDescriptor;

use super::{Binding, Block, FuncResult, Function, IRModule, Op, Param, StructInfo, ValueId};

// ─── GraphBuilder ──────────────────────────────────────────────────

pub struct GraphBuilder<'ctx> {
    /// Bindings visible to parameter annotations.
    ctx: &'ctx Context,
    /// Module under construction; owns the value counter.
    pub(crate) module: IRModule,
    /// Flat name -> value map. Stores overwrite, there is no versioning.
    pub(crate) symbols: HashMap<String, ValueId>,
    /// Struct info of every parameter and binding emitted so far.
    pub(crate) infos: HashMap<ValueId, StructInfo>,
    /// Literal-derived values whose dtype yields to the other operand.
    pub(crate) weak: HashSet<ValueId>,
    /// Bindings of the function body, in source order.
    pub(crate) bindings: Vec<Binding>,
    /// Value of the last executed `return`.
    pub(crate) result: FuncResult,
}

impl<'ctx> GraphBuilder<'ctx> {
    pub fn new(ctx: &'ctx Context) -> Self {
        Self {
            ctx,
            module: IRModule::new(),
            symbols: HashMap::new(),
            infos: HashMap::new(),
            weak: HashSet::new(),
            bindings: Vec::new(),
            result: FuncResult::Empty,
        }
    }

    /// Lower a module holding exactly one function definition.
    pub fn build(mut self, module: &Module) -> Result<IRModule> {
        let mut def: Option<&FunctionDef> = None;
        for stmt in &module.body {
            match &stmt.node {
                Stmt::FunctionDef(f) if def.is_none() => def = Some(f),
                Stmt::FunctionDef(_) => {
                    return Err(JitError::unsupported("more than one function definition", stmt.span))
                }
                // A module-level docstring is harmless.
                Stmt::Expr(e) if is_docstring(&e.node) => {}
                other => {
                    return Err(JitError::unsupported(
                        format!("top-level {} statement", other.kind()),
                        stmt.span,
                    ))
                }
            }
        }
        let def = def.ok_or_else(|| JitError::unsupported("source without a function definition", Span::dummy()))?;

        let params = self.build_params(def)?;
        for stmt in &def.body {
            self.build_stmt(stmt)?;
        }

        let blocks = if self.bindings.is_empty() {
            Vec::new()
        } else {
            vec![Block {
                dataflow: false,
                bindings: std::mem::take(&mut self.bindings),
            }]
        };
        self.module.functions.push(Function {
            name: def.name.node.clone(),
            params,
            blocks,
            result: self.result,
            primitive: false,
        });
        Ok(self.module)
    }

    /// Check every parameter before anything is bound, then bind them all.
    fn build_params(&mut self, def: &FunctionDef) -> Result<Vec<Param>> {
        let mut seen = HashSet::new();
        let mut descs: Vec<TensorDescriptor> = Vec::with_capacity(def.args.len());
        for arg in &def.args {
            let name = &arg.name.node;
            if !seen.insert(name.as_str()) {
                return Err(JitError::unsupported(
                    format!("duplicate parameter '{}'", name),
                    arg.name.span,
                ));
            }
            let annotation = arg.annotation.as_ref().ok_or_else(|| JitError::MissingAnnotation {
                param: name.clone(),
                reason: "parameter has no annotation".to_string(),
                span: arg.name.span,
            })?;
            descs.push(self.ctx.eval_descriptor(name, annotation)?);
        }

        let mut params = Vec::with_capacity(descs.len());
        for (arg, desc) in def.args.iter().zip(descs) {
            let var = self.module.fresh_value();
            self.symbols.insert(arg.name.node.clone(), var);
            self.infos.insert(var, StructInfo::Tensor(desc.clone()));
            params.push(Param {
                var,
                name: arg.name.node.clone(),
                desc,
            });
        }
        Ok(params)
    }

    /// Append a binding and return its value.
    pub(crate) fn emit(&mut self, op: Op, info: StructInfo, weak: bool) -> ValueId {
        let var = self.module.fresh_value();
        self.infos.insert(var, info.clone());
        if weak {
            self.weak.insert(var);
        }
        self.bindings.push(Binding {
            var,
            name: None,
            info,
            op,
            weak,
        });
        var
    }
}

pub(crate) fn is_docstring(expr: &crate::ast::Expr) -> bool {
    matches!(expr, crate::ast::Expr::Constant(crate::ast::Constant::Str(_)))
}
