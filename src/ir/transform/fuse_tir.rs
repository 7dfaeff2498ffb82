use std::collections::{HashMap, HashSet};

use super::legalize::intern_prim;
use super::Pass;
use crate::error::{JitError, Result};
use crate::ir::{AxisIndex, FuncResult, Function, IRModule, KernelExpr, Op, OpPattern, PrimFunc, ValueId};

/// Compose the kernels of every fused sub-function into one [`PrimFunc`]
/// and call it directly. Afterwards no sub-function remains, and kernels
/// nothing calls any more are dropped.
///
/// Composition inlines each producer's body at the load that reads it,
/// substituting the consumer's index map into the producer's loads.
pub struct FuseTIR;

impl Pass for FuseTIR {
    fn name(&self) -> &'static str {
        "FuseTIR"
    }

    fn run(&self, mut module: IRModule) -> Result<IRModule> {
        let (subs, mut functions): (Vec<Function>, Vec<Function>) =
            std::mem::take(&mut module.functions).into_iter().partition(|f| f.primitive);
        for func in &mut functions {
            for block in &mut func.blocks {
                for binding in &mut block.bindings {
                    let Op::CallFunc { func: callee, args } = &binding.op else {
                        continue;
                    };
                    let sub = subs
                        .iter()
                        .find(|f| &f.name == callee)
                        .ok_or_else(|| JitError::backend("FuseTIR", format!("no fused sub-function '{}'", callee)))?;
                    let prim = compose_function(&module, sub)?;
                    let args = args.clone();
                    let name = intern_prim(&mut module, prim);
                    binding.op = Op::CallPrim { func: name, args };
                }
            }
        }
        module.functions = functions;

        let called: HashSet<String> = module
            .functions
            .iter()
            .flat_map(|f| f.bindings())
            .filter_map(|b| match &b.op {
                Op::CallPrim { func, .. } => Some(func.clone()),
                _ => None,
            })
            .collect();
        module.prim_funcs.retain(|p| called.contains(&p.name));
        Ok(module)
    }
}

/// One kernel equivalent to the whole body of fused sub-function `sub`.
fn compose_function(module: &IRModule, sub: &Function) -> Result<PrimFunc> {
    let FuncResult::Value(sink) = sub.result else {
        return Err(JitError::backend("FuseTIR", format!("'{}' has no result", sub.name)));
    };
    let output = sub
        .info_of(sink)
        .and_then(|i| i.as_tensor().cloned())
        .ok_or_else(|| JitError::backend("FuseTIR", format!("'{}' does not return a tensor", sub.name)))?;
    let param_index: HashMap<ValueId, usize> = sub.params.iter().enumerate().map(|(i, p)| (p.var, i)).collect();

    let composer = Composer {
        module,
        sub,
        param_index,
    };
    let identity: Vec<AxisIndex> = (0..output.ndim()).map(AxisIndex::Axis).collect();
    let body = composer.compose(sink, &identity)?;

    let mut pattern = OpPattern::ElemWise;
    for binding in sub.bindings() {
        if let Op::CallPrim { func, .. } = &binding.op {
            if let Some(p) = module.prim_func(func).and_then(|p| p.pattern) {
                pattern = pattern.max(p);
            }
        }
    }
    let mut prim = PrimFunc::new(
        sub.name.clone(),
        sub.params.iter().map(|p| p.desc.clone()).collect(),
        output,
        body,
    );
    prim.pattern = Some(pattern);
    Ok(prim)
}

struct Composer<'a> {
    module: &'a IRModule,
    sub: &'a Function,
    param_index: HashMap<ValueId, usize>,
}

impl Composer<'_> {
    /// Expression for the element of `var` at `indices` (one entry per
    /// axis of `var`, each in terms of the fused output space).
    fn compose(&self, var: ValueId, indices: &[AxisIndex]) -> Result<KernelExpr> {
        if let Some(&param) = self.param_index.get(&var) {
            return Ok(KernelExpr::Load {
                param,
                indices: indices.to_vec(),
            });
        }
        let binding = self
            .sub
            .binding(var)
            .ok_or_else(|| JitError::backend("FuseTIR", format!("undefined value %{}", var.0)))?;
        let (func, args) = match &binding.op {
            Op::CallPrim { func, args } => (func, args),
            Op::Constant(value) => return Ok(KernelExpr::Const(*value)),
            _ => {
                return Err(JitError::backend(
                    "FuseTIR",
                    format!("only primitive calls can be fused, found in '{}'", self.sub.name),
                ))
            }
        };
        let prim = self
            .module
            .prim_func(func)
            .ok_or_else(|| JitError::backend("FuseTIR", format!("unknown primitive function '{}'", func)))?;

        let mut failure = None;
        let body = prim.body.map_loads(&mut |param, inner| {
            let mapped: Vec<AxisIndex> = inner
                .iter()
                .map(|idx| match idx {
                    AxisIndex::Axis(k) => indices.get(*k).copied().unwrap_or(AxisIndex::Zero),
                    AxisIndex::Zero => AxisIndex::Zero,
                })
                .collect();
            match args.get(param) {
                Some(&arg) => self.compose(arg, &mapped).unwrap_or_else(|e| {
                    failure.get_or_insert(e);
                    KernelExpr::Const(crate::tensor::Scalar::I64(0))
                }),
                None => {
                    failure.get_or_insert(JitError::backend(
                        "FuseTIR",
                        format!("'{}' reads parameter {} but was called with {} arguments", func, param, args.len()),
                    ));
                    KernelExpr::Const(crate::tensor::Scalar::I64(0))
                }
            }
        });
        match failure {
            Some(e) => Err(e),
            None => Ok(body),
        }
    }
}
