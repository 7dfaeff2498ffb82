//! Low-level per-operator kernels.
//!
//! A [`PrimFunc`] computes one output buffer element-by-element: for every
//! index of the output iteration space, `body` is evaluated with loads that
//! address the parameters through per-axis index maps. Broadcast inputs
//! read index zero along their stretched axes.

use std::fmt;

use crate::error::{JitError, Result};
use crate::tensor::{DType, Scalar, TensorDescriptor};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Mul,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Mul => "*",
        }
    }
}

/// One coordinate of a load: an output axis, or the broadcast index zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AxisIndex {
    Axis(usize),
    Zero,
}

#[derive(Clone, Debug, PartialEq)]
pub enum KernelExpr {
    /// Read parameter `param` at `indices` (one entry per parameter axis).
    Load {
        param: usize,
        indices: Vec<AxisIndex>,
    },
    Const(Scalar),
    Binary {
        op: BinaryOp,
        lhs: Box<KernelExpr>,
        rhs: Box<KernelExpr>,
        dtype: DType,
    },
    Cast {
        dtype: DType,
        value: Box<KernelExpr>,
    },
}

impl KernelExpr {
    /// Load `param` with the index map of an operand broadcast from
    /// `shape` to an output of rank `out_rank`.
    pub fn broadcast_load(param: usize, shape: &[usize], out_shape: &[usize]) -> Self {
        let offset = out_shape.len() - shape.len();
        let indices = shape
            .iter()
            .enumerate()
            .map(|(k, &dim)| {
                if dim == 1 && out_shape[offset + k] != 1 {
                    AxisIndex::Zero
                } else {
                    AxisIndex::Axis(offset + k)
                }
            })
            .collect();
        KernelExpr::Load { param, indices }
    }

    /// Result dtype given the parameter descriptors.
    pub fn dtype(&self, params: &[TensorDescriptor]) -> DType {
        match self {
            KernelExpr::Load { param, .. } => params[*param].dtype,
            KernelExpr::Const(value) => value.dtype(),
            KernelExpr::Binary { dtype, .. } | KernelExpr::Cast { dtype, .. } => *dtype,
        }
    }

    /// Rebuild the tree, replacing every load with `f(param, indices)`.
    pub fn map_loads(&self, f: &mut impl FnMut(usize, &[AxisIndex]) -> KernelExpr) -> KernelExpr {
        match self {
            KernelExpr::Load { param, indices } => f(*param, indices),
            KernelExpr::Const(value) => KernelExpr::Const(*value),
            KernelExpr::Binary {
                op,
                lhs,
                rhs,
                dtype,
            } => KernelExpr::Binary {
                op: *op,
                lhs: Box::new(lhs.map_loads(f)),
                rhs: Box::new(rhs.map_loads(f)),
                dtype: *dtype,
            },
            KernelExpr::Cast { dtype, value } => KernelExpr::Cast {
                dtype: *dtype,
                value: Box::new(value.map_loads(f)),
            },
        }
    }

    pub fn for_each_load(&self, f: &mut impl FnMut(usize, &[AxisIndex])) {
        match self {
            KernelExpr::Load { param, indices } => f(*param, indices),
            KernelExpr::Const(_) => {}
            KernelExpr::Binary { lhs, rhs, .. } => {
                lhs.for_each_load(f);
                rhs.for_each_load(f);
            }
            KernelExpr::Cast { value, .. } => value.for_each_load(f),
        }
    }
}

/// Operator pattern classes, ordered from most to least fusable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OpPattern {
    ElemWise,
    Broadcast,
    Injective,
    CommReduce,
    OutEWiseFusable,
    Tuple,
    Opaque,
}

impl OpPattern {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn is_fusable(self) -> bool {
        self <= OpPattern::Injective
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScheduleKind {
    Fallback,
    Tuned,
    Manual,
}

impl ScheduleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ScheduleKind::Fallback => "fallback",
            ScheduleKind::Tuned => "tuned",
            ScheduleKind::Manual => "manual",
        }
    }
}

/// A one-dimensional launch configuration over the flattened output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Schedule {
    pub kind: ScheduleKind,
    pub threads_per_block: u32,
    pub blocks: u32,
}

impl Schedule {
    pub fn new(kind: ScheduleKind, threads_per_block: u32, numel: u32) -> Self {
        let threads_per_block = threads_per_block.max(1);
        Self {
            kind,
            threads_per_block,
            blocks: numel.div_ceil(threads_per_block).max(1),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PrimFunc {
    pub name: String,
    pub params: Vec<TensorDescriptor>,
    pub output: TensorDescriptor,
    pub body: KernelExpr,
    pub pattern: Option<OpPattern>,
    pub schedule: Option<Schedule>,
}

impl PrimFunc {
    pub fn new(name: impl Into<String>, params: Vec<TensorDescriptor>, output: TensorDescriptor, body: KernelExpr) -> Self {
        Self {
            name: name.into(),
            params,
            output,
            body,
            pattern: None,
            schedule: None,
        }
    }

    /// Output element count as a launch extent. One thread per element
    /// must be addressable with a `u32`.
    pub fn launch_extent(&self) -> Result<u32> {
        let numel = self.output.numel();
        u32::try_from(numel).map_err(|_| {
            JitError::backend(
                "schedule",
                format!(
                    "'{}' writes {} elements, more than one launch can address ({})",
                    self.name,
                    numel,
                    u32::MAX
                ),
            )
        })
    }

    /// Same computation, ignoring the name and annotations.
    pub fn same_computation(&self, other: &PrimFunc) -> bool {
        self.params == other.params && self.output == other.output && self.body == other.body
    }

    /// Pattern implied by the body: every load an identity map of the
    /// output space is element-wise; anything else broadcasts.
    pub fn classify(&self) -> OpPattern {
        let rank = self.output.ndim();
        let mut identity = true;
        self.body.for_each_load(&mut |param, indices| {
            let same_shape = self.params[param].shape == self.output.shape;
            let in_order = indices.len() == rank
                && indices
                    .iter()
                    .enumerate()
                    .all(|(k, idx)| *idx == AxisIndex::Axis(k));
            identity &= same_shape && in_order;
        });
        if identity {
            OpPattern::ElemWise
        } else {
            OpPattern::Broadcast
        }
    }

    /// Shape signature used to key tuning records: the parameter and output
    /// types plus a digest of the kernel body.
    pub fn signature(&self) -> String {
        let types: Vec<String> = self.params.iter().map(buffer_type).collect();
        let digest = blake3::hash(format!("{:?}", self.body).as_bytes());
        format!(
            "{}->{}#{}",
            types.join(","),
            buffer_type(&self.output),
            &digest.to_hex()[..16]
        )
    }
}

fn buffer_type(desc: &TensorDescriptor) -> String {
    format!("{}{}", desc.dtype, desc.shape_str())
}

/// Buffer name of parameter `i`: `A`, `B`, ..., then `p26`, `p27`, ...
pub fn param_name(i: usize) -> String {
    if i < 26 {
        ((b'A' + i as u8) as char).to_string()
    } else {
        format!("p{}", i)
    }
}

fn axis_name(k: usize) -> String {
    format!("ax{}", k)
}

fn index_list(indices: &[AxisIndex]) -> String {
    if indices.is_empty() {
        return "()".to_string();
    }
    let parts: Vec<String> = indices
        .iter()
        .map(|idx| match idx {
            AxisIndex::Axis(k) => axis_name(*k),
            AxisIndex::Zero => "0".to_string(),
        })
        .collect();
    parts.join(", ")
}

fn scalar_literal(value: Scalar) -> String {
    match value {
        Scalar::F32(v) => format!("T.float32({:?})", v),
        Scalar::F64(v) => format!("T.float64({:?})", v),
        Scalar::I32(v) => format!("T.int32({})", v),
        Scalar::I64(v) => format!("T.int64({})", v),
    }
}

fn expr_text(expr: &KernelExpr, top: bool) -> String {
    match expr {
        KernelExpr::Load { param, indices } => format!("{}[{}]", param_name(*param), index_list(indices)),
        KernelExpr::Const(value) => scalar_literal(*value),
        KernelExpr::Binary { op, lhs, rhs, .. } => {
            let text = format!("{} {} {}", expr_text(lhs, false), op.symbol(), expr_text(rhs, false));
            if top {
                text
            } else {
                format!("({})", text)
            }
        }
        KernelExpr::Cast { dtype, value } => format!("T.Cast(\"{}\", {})", dtype, expr_text(value, true)),
    }
}

impl fmt::Display for PrimFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut params: Vec<String> = self
            .params
            .iter()
            .enumerate()
            .map(|(i, p)| format!("{}: T.Buffer({}, \"{}\")", param_name(i), p.shape_str(), p.dtype))
            .collect();
        params.push(format!(
            "T_out: T.Buffer({}, \"{}\")",
            self.output.shape_str(),
            self.output.dtype
        ));
        writeln!(f, "@T.prim_func(private=True)")?;
        writeln!(f, "def {}({}):", self.name, params.join(", "))?;
        match self.pattern {
            Some(p) => writeln!(f, "    T.func_attr({{\"op_pattern\": {}, \"tir.noalias\": True}})", p.code())?,
            None => writeln!(f, "    T.func_attr({{\"tir.noalias\": True}})")?,
        }
        if let Some(s) = &self.schedule {
            writeln!(f, "    # schedule: {}", s.kind.as_str())?;
            writeln!(f, "    T.launch_thread(\"blockIdx.x\", {})", s.blocks)?;
            writeln!(f, "    T.launch_thread(\"threadIdx.x\", {})", s.threads_per_block)?;
        }
        let rank = self.output.ndim();
        let out_index = index_list(&(0..rank).map(AxisIndex::Axis).collect::<Vec<_>>());
        let store = format!("T_out[{}] = {}", out_index, expr_text(&self.body, true));
        if rank == 0 {
            return writeln!(f, "    {}", store);
        }
        let axes: Vec<String> = (0..rank).map(axis_name).collect();
        let extents: Vec<String> = self.output.shape.iter().map(|d| d.to_string()).collect();
        writeln!(f, "    for {} in T.grid({}):", axes.join(", "), extents.join(", "))?;
        writeln!(f, "        {}", store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32s(shape: &[usize]) -> TensorDescriptor {
        TensorDescriptor::new(shape.to_vec(), DType::Float32)
    }

    fn add(lhs: KernelExpr, rhs: KernelExpr) -> KernelExpr {
        KernelExpr::Binary {
            op: BinaryOp::Add,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            dtype: DType::Float32,
        }
    }

    #[test]
    fn test_broadcast_load_maps_stretched_axes_to_zero() {
        let load = KernelExpr::broadcast_load(1, &[1, 3], &[2, 3]);
        assert_eq!(
            load,
            KernelExpr::Load {
                param: 1,
                indices: vec![AxisIndex::Zero, AxisIndex::Axis(1)]
            }
        );
        let lower_rank = KernelExpr::broadcast_load(0, &[3], &[4, 3]);
        assert_eq!(
            lower_rank,
            KernelExpr::Load {
                param: 0,
                indices: vec![AxisIndex::Axis(1)]
            }
        );
    }

    #[test]
    fn test_classify() {
        let out = f32s(&[2, 3]);
        let ew = PrimFunc::new(
            "add",
            vec![out.clone(), out.clone()],
            out.clone(),
            add(
                KernelExpr::broadcast_load(0, &[2, 3], &[2, 3]),
                KernelExpr::broadcast_load(1, &[2, 3], &[2, 3]),
            ),
        );
        assert_eq!(ew.classify(), OpPattern::ElemWise);

        let bc = PrimFunc::new(
            "add",
            vec![out.clone(), f32s(&[3])],
            out.clone(),
            add(
                KernelExpr::broadcast_load(0, &[2, 3], &[2, 3]),
                KernelExpr::broadcast_load(1, &[3], &[2, 3]),
            ),
        );
        assert_eq!(bc.classify(), OpPattern::Broadcast);
        assert!(OpPattern::Broadcast.is_fusable());
        assert!(!OpPattern::Opaque.is_fusable());
    }

    #[test]
    fn test_signature_is_stable_and_shape_sensitive() {
        let body = add(
            KernelExpr::broadcast_load(0, &[4], &[4]),
            KernelExpr::Const(Scalar::F32(1.0)),
        );
        let a = PrimFunc::new("add", vec![f32s(&[4])], f32s(&[4]), body.clone());
        let b = PrimFunc::new("add1", vec![f32s(&[4])], f32s(&[4]), body);
        assert_eq!(a.signature(), b.signature());
        assert!(a.signature().starts_with("float32(4,)->float32(4,)#"));
        assert!(a.same_computation(&b));
    }

    #[test]
    fn test_schedule_block_count() {
        let s = Schedule::new(ScheduleKind::Fallback, 32, 6);
        assert_eq!((s.threads_per_block, s.blocks), (32, 1));
        let s = Schedule::new(ScheduleKind::Manual, 4, 10);
        assert_eq!(s.blocks, 3);
    }

    #[test]
    fn test_prim_func_text() {
        let out = f32s(&[2, 3]);
        let mut func = PrimFunc::new(
            "add",
            vec![out.clone(), out.clone()],
            out.clone(),
            add(
                KernelExpr::broadcast_load(0, &[2, 3], &[2, 3]),
                KernelExpr::broadcast_load(1, &[2, 3], &[2, 3]),
            ),
        );
        func.pattern = Some(OpPattern::ElemWise);
        insta::assert_snapshot!(func.to_string(), @r#"
        @T.prim_func(private=True)
        def add(A: T.Buffer((2, 3), "float32"), B: T.Buffer((2, 3), "float32"), T_out: T.Buffer((2, 3), "float32")):
            T.func_attr({"op_pattern": 0, "tir.noalias": True})
            for ax0, ax1 in T.grid(2, 3):
                T_out[ax0, ax1] = A[ax0, ax1] + B[ax0, ax1]
        "#);
    }
}
