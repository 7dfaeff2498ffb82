//! Kernel programs: a primitive function compiled into postfix bytecode
//! with every load's broadcast strides resolved ahead of time.
//!
//! The host executor walks the output serially. The accelerator executor
//! emulates the launch grid: each block is a rayon task over a chunk of
//! `threads_per_block` output slots, and every thread checks its global
//! index against the element count before writing.

use rayon::prelude::*;

use crate::codegen::strides;
use crate::error::{JitError, Result};
use crate::ir::{AxisIndex, BinaryOp, KernelExpr, PrimFunc, Schedule};
use crate::tensor::{Buffer, DType, Device, NDArray, Scalar, TensorDescriptor};

/// One output axis contributing to a load offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OffsetTerm {
    /// Stride of the axis in the output space.
    pub out_stride: usize,
    pub out_dim: usize,
    /// Stride of the matching axis in the parameter.
    pub param_stride: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub enum KernelOp {
    Load { param: usize, terms: Vec<OffsetTerm> },
    Const(Scalar),
    Add(DType),
    Mul(DType),
    Cast(DType),
}

/// How a kernel is launched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Launch {
    Serial,
    Grid { blocks: u32, threads_per_block: u32 },
}

impl Launch {
    pub fn from_schedule(schedule: &Schedule) -> Self {
        Launch::Grid {
            blocks: schedule.blocks,
            threads_per_block: schedule.threads_per_block,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Kernel {
    pub name: String,
    pub params: Vec<TensorDescriptor>,
    pub output: TensorDescriptor,
    pub ops: Vec<KernelOp>,
}

impl Kernel {
    pub fn compile(prim: &PrimFunc) -> Result<Self> {
        let out_strides = strides(&prim.output.shape);
        let mut ops = Vec::new();
        emit(prim, &prim.body, &out_strides, &mut ops)?;
        Ok(Self {
            name: prim.name.clone(),
            params: prim.params.clone(),
            output: prim.output.clone(),
            ops,
        })
    }

    /// Run the kernel over `args`, producing a fresh array on `device`.
    pub fn execute(&self, args: &[&NDArray], device: Device, launch: Launch) -> Result<NDArray> {
        if args.len() != self.params.len() {
            return Err(JitError::backend(
                "execute",
                format!("kernel '{}' takes {} buffers, got {}", self.name, self.params.len(), args.len()),
            ));
        }
        for (i, (arg, param)) in args.iter().zip(&self.params).enumerate() {
            if arg.descriptor() != param {
                return Err(JitError::backend(
                    "execute",
                    format!(
                        "kernel '{}' buffer {} is {}, expected {}",
                        self.name,
                        i,
                        arg.descriptor(),
                        param
                    ),
                ));
            }
        }

        let numel = self.output.numel();
        let zero = Scalar::zero(self.output.dtype);
        let mut out = vec![zero; numel];
        match launch {
            Launch::Serial => {
                for (tid, slot) in out.iter_mut().enumerate() {
                    *slot = self.eval(args, tid);
                }
            }
            Launch::Grid {
                blocks,
                threads_per_block,
            } => {
                let tpb = threads_per_block.max(1) as usize;
                if (blocks as usize) * tpb < numel {
                    return Err(JitError::backend(
                        "execute",
                        format!(
                            "grid of {} x {} threads does not cover {} elements of '{}'",
                            blocks, tpb, numel, self.name
                        ),
                    ));
                }
                out.par_chunks_mut(tpb).enumerate().for_each(|(block, chunk)| {
                    for (thread, slot) in chunk.iter_mut().enumerate() {
                        let tid = block * tpb + thread;
                        if tid < numel {
                            *slot = self.eval(args, tid);
                        }
                    }
                });
            }
        }
        NDArray::from_buffer(self.output.shape.clone(), to_buffer(self.output.dtype, &out), device)
    }

    fn eval(&self, args: &[&NDArray], tid: usize) -> Scalar {
        let mut stack: Vec<Scalar> = Vec::with_capacity(8);
        for op in &self.ops {
            match op {
                KernelOp::Load { param, terms } => {
                    let offset: usize = terms
                        .iter()
                        .map(|t| (tid / t.out_stride) % t.out_dim * t.param_stride)
                        .sum();
                    stack.push(args[*param].get(offset));
                }
                KernelOp::Const(value) => stack.push(*value),
                KernelOp::Add(dtype) | KernelOp::Mul(dtype) => {
                    let rhs = stack.pop().unwrap_or(Scalar::zero(*dtype));
                    let lhs = stack.pop().unwrap_or(Scalar::zero(*dtype));
                    let op = if matches!(op, KernelOp::Add(_)) {
                        BinaryOp::Add
                    } else {
                        BinaryOp::Mul
                    };
                    stack.push(apply(op, lhs.cast(*dtype), rhs.cast(*dtype)));
                }
                KernelOp::Cast(dtype) => {
                    let value = stack.pop().unwrap_or(Scalar::zero(*dtype));
                    stack.push(value.cast(*dtype));
                }
            }
        }
        stack.pop().unwrap_or(Scalar::zero(self.output.dtype))
    }
}

fn emit(prim: &PrimFunc, expr: &KernelExpr, out_strides: &[usize], ops: &mut Vec<KernelOp>) -> Result<()> {
    match expr {
        KernelExpr::Load { param, indices } => {
            let desc = prim.params.get(*param).ok_or_else(|| {
                JitError::backend("compile", format!("'{}' loads missing buffer {}", prim.name, param))
            })?;
            let param_strides = strides(&desc.shape);
            let mut terms = Vec::new();
            for (j, idx) in indices.iter().enumerate() {
                if let AxisIndex::Axis(k) = idx {
                    terms.push(OffsetTerm {
                        out_stride: out_strides[*k],
                        out_dim: prim.output.shape[*k],
                        param_stride: param_strides[j],
                    });
                }
            }
            ops.push(KernelOp::Load { param: *param, terms });
        }
        KernelExpr::Const(value) => ops.push(KernelOp::Const(*value)),
        KernelExpr::Binary { op, lhs, rhs, dtype } => {
            emit(prim, lhs, out_strides, ops)?;
            emit(prim, rhs, out_strides, ops)?;
            ops.push(match op {
                BinaryOp::Add => KernelOp::Add(*dtype),
                BinaryOp::Mul => KernelOp::Mul(*dtype),
            });
        }
        KernelExpr::Cast { dtype, value } => {
            emit(prim, value, out_strides, ops)?;
            ops.push(KernelOp::Cast(*dtype));
        }
    }
    Ok(())
}

/// Integer arithmetic wraps like the device does.
fn apply(op: BinaryOp, lhs: Scalar, rhs: Scalar) -> Scalar {
    match (op, lhs, rhs) {
        (BinaryOp::Add, Scalar::F32(a), Scalar::F32(b)) => Scalar::F32(a + b),
        (BinaryOp::Add, Scalar::F64(a), Scalar::F64(b)) => Scalar::F64(a + b),
        (BinaryOp::Add, Scalar::I32(a), Scalar::I32(b)) => Scalar::I32(a.wrapping_add(b)),
        (BinaryOp::Add, Scalar::I64(a), Scalar::I64(b)) => Scalar::I64(a.wrapping_add(b)),
        (BinaryOp::Mul, Scalar::F32(a), Scalar::F32(b)) => Scalar::F32(a * b),
        (BinaryOp::Mul, Scalar::F64(a), Scalar::F64(b)) => Scalar::F64(a * b),
        (BinaryOp::Mul, Scalar::I32(a), Scalar::I32(b)) => Scalar::I32(a.wrapping_mul(b)),
        (BinaryOp::Mul, Scalar::I64(a), Scalar::I64(b)) => Scalar::I64(a.wrapping_mul(b)),
        // operands are cast to one dtype before `apply`
        (_, lhs, _) => lhs,
    }
}

fn to_buffer(dtype: DType, values: &[Scalar]) -> Buffer {
    match dtype {
        DType::Float32 => Buffer::F32(values.iter().map(|v| v.as_f64() as f32).collect()),
        DType::Float64 => Buffer::F64(values.iter().map(|v| v.as_f64()).collect()),
        DType::Int32 => Buffer::I32(values.iter().map(|v| v.as_i64() as i32).collect()),
        DType::Int64 => Buffer::I64(values.iter().map(|v| v.as_i64()).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broadcast_add() -> PrimFunc {
        let out = TensorDescriptor::new(vec![2, 3], DType::Int32);
        PrimFunc::new(
            "add",
            vec![out.clone(), TensorDescriptor::new(vec![3], DType::Int32)],
            out.clone(),
            KernelExpr::Binary {
                op: BinaryOp::Add,
                lhs: Box::new(KernelExpr::broadcast_load(0, &[2, 3], &[2, 3])),
                rhs: Box::new(KernelExpr::broadcast_load(1, &[3], &[2, 3])),
                dtype: DType::Int32,
            },
        )
    }

    fn inputs() -> (NDArray, NDArray) {
        let a = NDArray::from_vec(vec![2, 3], vec![0i32, 1, 2, 3, 4, 5], Device::cpu(0)).unwrap();
        let b = NDArray::from_vec(vec![3], vec![10i32, 20, 30], Device::cpu(0)).unwrap();
        (a, b)
    }

    #[test]
    fn test_serial_broadcast() {
        let kernel = Kernel::compile(&broadcast_add()).unwrap();
        let (a, b) = inputs();
        let out = kernel.execute(&[&a, &b], Device::cpu(0), Launch::Serial).unwrap();
        assert_eq!(out.as_slice::<i32>(), Some(&[10, 21, 32, 13, 24, 35][..]));
    }

    #[test]
    fn test_grid_matches_serial() {
        let kernel = Kernel::compile(&broadcast_add()).unwrap();
        let (a, b) = inputs();
        let serial = kernel.execute(&[&a, &b], Device::cpu(0), Launch::Serial).unwrap();
        for tpb in [1, 2, 4, 32] {
            let blocks = 6u32.div_ceil(tpb);
            let launch = Launch::Grid {
                blocks,
                threads_per_block: tpb,
            };
            let grid = kernel.execute(&[&a, &b], Device::cuda(0), launch).unwrap();
            assert_eq!(grid.buffer(), serial.buffer());
            assert_eq!(grid.device(), Device::cuda(0));
        }
    }

    #[test]
    fn test_grid_must_cover_output() {
        let kernel = Kernel::compile(&broadcast_add()).unwrap();
        let (a, b) = inputs();
        let launch = Launch::Grid {
            blocks: 1,
            threads_per_block: 4,
        };
        assert!(kernel.execute(&[&a, &b], Device::cuda(0), launch).is_err());
    }

    #[test]
    fn test_rejects_wrong_buffers() {
        let kernel = Kernel::compile(&broadcast_add()).unwrap();
        let (a, _) = inputs();
        assert!(kernel.execute(&[&a], Device::cpu(0), Launch::Serial).is_err());
        assert!(kernel.execute(&[&a, &a], Device::cpu(0), Launch::Serial).is_err());
    }

    #[test]
    fn test_integer_overflow_wraps() {
        let desc = TensorDescriptor::new(vec![1], DType::Int32);
        let prim = PrimFunc::new(
            "multiply",
            vec![desc.clone()],
            desc,
            KernelExpr::Binary {
                op: BinaryOp::Mul,
                lhs: Box::new(KernelExpr::broadcast_load(0, &[1], &[1])),
                rhs: Box::new(KernelExpr::Const(Scalar::I32(2))),
                dtype: DType::Int32,
            },
        );
        let a = NDArray::from_vec(vec![1], vec![i32::MAX], Device::cpu(0)).unwrap();
        let out = Kernel::compile(&prim)
            .unwrap()
            .execute(&[&a], Device::cpu(0), Launch::Serial)
            .unwrap();
        assert_eq!(out.as_slice::<i32>(), Some(&[-2][..]));
    }
}
