use std::collections::HashMap;

use super::Pass;
use crate::error::{JitError, Result};
use crate::ir::{Function, IRModule, KernelExpr, Op, PrimFunc, StructInfo, ValueId};
use crate::tensor::{Scalar, TensorDescriptor};

/// Replace every `add` / `multiply` call with a call to a generated
/// [`PrimFunc`]. Weak constant operands become immediates, so their
/// bindings usually go dead and are dropped afterwards.
pub struct LegalizeOps;

impl Pass for LegalizeOps {
    fn name(&self) -> &'static str {
        "LegalizeOps"
    }

    fn run(&self, mut module: IRModule) -> Result<IRModule> {
        for fi in 0..module.functions.len() {
            if module.functions[fi].primitive {
                continue;
            }
            let mut func = module.functions[fi].clone();
            legalize_function(&mut module, &mut func)?;
            remove_dead_constants(&mut func);
            module.functions[fi] = func;
        }
        Ok(module)
    }
}

fn legalize_function(module: &mut IRModule, func: &mut Function) -> Result<()> {
    let constants: HashMap<ValueId, Scalar> = func
        .bindings()
        .filter(|b| b.weak)
        .filter_map(|b| match b.op {
            Op::Constant(value) => Some((b.var, value)),
            _ => None,
        })
        .collect();
    let infos: HashMap<ValueId, StructInfo> = func
        .params
        .iter()
        .map(|p| (p.var, StructInfo::Tensor(p.desc.clone())))
        .chain(func.bindings().map(|b| (b.var, b.info.clone())))
        .collect();

    for block in &mut func.blocks {
        for binding in &mut block.bindings {
            let (op, args) = match &binding.op {
                Op::Call { op, args } => (*op, args.clone()),
                _ => continue,
            };
            let out = binding
                .info
                .as_tensor()
                .cloned()
                .ok_or_else(|| JitError::backend("LegalizeOps", format!("{} result is not a tensor", op.name())))?;

            let mut params: Vec<TensorDescriptor> = Vec::new();
            let mut call_args: Vec<ValueId> = Vec::new();
            let mut operands: Vec<KernelExpr> = Vec::with_capacity(args.len());
            for arg in &args {
                if let Some(value) = constants.get(arg) {
                    operands.push(KernelExpr::Const(value.cast(out.dtype)));
                    continue;
                }
                let desc = infos
                    .get(arg)
                    .and_then(|i| i.as_tensor())
                    .cloned()
                    .ok_or_else(|| JitError::backend("LegalizeOps", format!("operand of {} is not a tensor", op.name())))?;
                let load = KernelExpr::broadcast_load(params.len(), &desc.shape, &out.shape);
                operands.push(if desc.dtype == out.dtype {
                    load
                } else {
                    KernelExpr::Cast {
                        dtype: out.dtype,
                        value: Box::new(load),
                    }
                });
                params.push(desc);
                call_args.push(*arg);
            }

            let (lhs, rhs) = match <[KernelExpr; 2]>::try_from(operands) {
                Ok([lhs, rhs]) => (lhs, rhs),
                Err(_) => return Err(JitError::backend("LegalizeOps", format!("{} takes two operands", op.name()))),
            };
            let body = KernelExpr::Binary {
                op: op.binary(),
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                dtype: out.dtype,
            };
            let prim = PrimFunc::new(op.name(), params, out, body);
            let name = intern_prim(module, prim);
            binding.op = Op::CallPrim {
                func: name,
                args: call_args,
            };
            binding.weak = false;
        }
    }
    Ok(())
}

/// Add `prim` unless an equivalent one exists; returns the name to call.
pub(crate) fn intern_prim(module: &mut IRModule, mut prim: PrimFunc) -> String {
    if let Some(existing) = module.prim_funcs.iter().find(|p| p.same_computation(&prim)) {
        return existing.name.clone();
    }
    prim.name = module.unique_global_name(&prim.name);
    let name = prim.name.clone();
    module.prim_funcs.push(prim);
    name
}

fn remove_dead_constants(func: &mut Function) {
    let uses = func.use_counts();
    for block in &mut func.blocks {
        block
            .bindings
            .retain(|b| !matches!(b.op, Op::Constant(_)) || uses.get(&b.var).copied().unwrap_or(0) > 0);
    }
    func.blocks.retain(|b| !b.bindings.is_empty());
}
