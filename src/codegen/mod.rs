//! KernelLowering: turns primitive functions into kernel source text.
//!
//! Each output element is computed by one thread (accelerator) or one
//! loop iteration (host). The flat output index is decomposed into axis
//! coordinates, and every load is addressed through the parameter's
//! row-major strides. Broadcast axes contribute nothing to the offset.
//!
//! The generated text is what a native toolchain would compile; the
//! runtime executes the same kernels from its own bytecode.

mod cuda;
mod host;

pub use cuda::CudaLowering;
pub use host::HostLowering;

use crate::config::target::{JitTarget, Target};
use crate::ir::{AxisIndex, BinaryOp, KernelExpr, PrimFunc};
use crate::tensor::{Scalar, TensorDescriptor};

/// Lowers one primitive function into a complete kernel source unit.
pub trait KernelLowering {
    /// The target name (e.g. "cuda", "c").
    fn target_name(&self) -> &str;

    fn lower(&self, prim: &PrimFunc) -> String;
}

/// Create the kernel-lowering backend for a resolved target.
pub fn create_kernel_lowering(target: &Target) -> Box<dyn KernelLowering> {
    match target.kind {
        JitTarget::Cpu => Box::new(HostLowering::new()),
        JitTarget::Cuda => {
            let arch = target
                .model
                .as_ref()
                .map(|m| m.arch.clone())
                .unwrap_or_else(|| "sm_86".to_string());
            Box::new(CudaLowering::new(arch))
        }
    }
}

/// Row-major strides of `shape`.
pub fn strides(shape: &[usize]) -> Vec<usize> {
    let mut out = vec![1; shape.len()];
    for k in (0..shape.len().saturating_sub(1)).rev() {
        out[k] = out[k + 1] * shape[k + 1];
    }
    out
}

/// `ax{k} = ...` declarations recovering coordinates from flat `index`.
pub(crate) fn axis_decls(output: &TensorDescriptor, index: &str) -> Vec<String> {
    let st = strides(&output.shape);
    output
        .shape
        .iter()
        .enumerate()
        .map(|(k, &dim)| {
            let quotient = if st[k] == 1 {
                index.to_string()
            } else {
                format!("{} / {}", index, st[k])
            };
            let value = if k == 0 { quotient } else { format!("{} % {}", quotient, dim) };
            format!("long long ax{} = {};", k, value)
        })
        .collect()
}

fn offset_text(param: &TensorDescriptor, indices: &[AxisIndex]) -> String {
    let st = strides(&param.shape);
    let terms: Vec<String> = indices
        .iter()
        .zip(st)
        .filter_map(|(idx, stride)| match idx {
            AxisIndex::Axis(k) if stride == 1 => Some(format!("ax{}", k)),
            AxisIndex::Axis(k) => Some(format!("ax{} * {}", k, stride)),
            AxisIndex::Zero => None,
        })
        .collect();
    if terms.is_empty() {
        "0".to_string()
    } else {
        terms.join(" + ")
    }
}

fn literal(value: Scalar) -> String {
    match value {
        Scalar::F32(v) => format!("{:?}f", v),
        Scalar::F64(v) => format!("{:?}", v),
        Scalar::I32(v) => v.to_string(),
        Scalar::I64(v) => format!("{}LL", v),
    }
}

/// C expression text of a kernel body.
pub(crate) fn expr_c(prim: &PrimFunc, expr: &KernelExpr) -> String {
    match expr {
        KernelExpr::Load { param, indices } => format!(
            "{}[{}]",
            crate::ir::prim::param_name(*param),
            offset_text(&prim.params[*param], indices)
        ),
        KernelExpr::Const(value) => literal(*value),
        KernelExpr::Binary { op, lhs, rhs, .. } => {
            let sym = match op {
                BinaryOp::Add => "+",
                BinaryOp::Mul => "*",
            };
            format!("({} {} {})", expr_c(prim, lhs), sym, expr_c(prim, rhs))
        }
        KernelExpr::Cast { dtype, value } => format!("(({})({}))", dtype.c_type(), expr_c(prim, value)),
    }
}

/// Parameter list shared by both lowerings.
pub(crate) fn c_params(prim: &PrimFunc, qualifier: &str) -> String {
    let mut params: Vec<String> = prim
        .params
        .iter()
        .enumerate()
        .map(|(i, p)| {
            format!(
                "const {}* {}{}",
                p.dtype.c_type(),
                qualifier,
                crate::ir::prim::param_name(i)
            )
        })
        .collect();
    params.push(format!("{}* {}T_out", prim.output.dtype.c_type(), qualifier));
    params.join(", ")
}
