//! Graph-level IR.
//!
//! An [`IRModule`] holds graph functions made of bindings (one value per
//! binding, SSA style) and the low-level [`PrimFunc`]s they call once
//! legalized. Modules are created fresh for each compilation and are
//! consumed and returned by every pass.

pub mod builder;
pub mod display;
pub mod prim;
pub mod transform;

pub use builder::GraphBuilder;
pub use prim::{AxisIndex, BinaryOp, KernelExpr, OpPattern, PrimFunc, Schedule, ScheduleKind};

use crate::error::{JitError, Result};
use crate::tensor::{Scalar, TensorDescriptor};

/// A module-unique value handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

/// Static type of a graph value. `Object` is the unconstrained placeholder.
#[derive(Clone, Debug, PartialEq)]
pub enum StructInfo {
    Tensor(TensorDescriptor),
    Tuple(Vec<StructInfo>),
    Object,
}

impl StructInfo {
    pub fn as_tensor(&self) -> Option<&TensorDescriptor> {
        match self {
            StructInfo::Tensor(desc) => Some(desc),
            _ => None,
        }
    }
}

/// High-level tensor operators produced by lowering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HighOp {
    Add,
    Multiply,
}

impl HighOp {
    pub fn name(self) -> &'static str {
        match self {
            HighOp::Add => "add",
            HighOp::Multiply => "multiply",
        }
    }

    pub fn binary(self) -> BinaryOp {
        match self {
            HighOp::Add => BinaryOp::Add,
            HighOp::Multiply => BinaryOp::Mul,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PrintArg {
    Value(ValueId),
    /// A raw string literal, never a graph value.
    Literal(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    Constant(Scalar),
    Call { op: HighOp, args: Vec<ValueId> },
    Print(Vec<PrintArg>),
    Tuple(Vec<ValueId>),
    /// Call of a low-level kernel in `IRModule::prim_funcs`.
    CallPrim { func: String, args: Vec<ValueId> },
    /// Call of another graph function (fusion groups).
    CallFunc { func: String, args: Vec<ValueId> },
}

impl Op {
    pub fn operands(&self) -> Vec<ValueId> {
        match self {
            Op::Constant(_) => Vec::new(),
            Op::Call { args, .. }
            | Op::Tuple(args)
            | Op::CallPrim { args, .. }
            | Op::CallFunc { args, .. } => args.clone(),
            Op::Print(args) => args
                .iter()
                .filter_map(|a| match a {
                    PrintArg::Value(v) => Some(*v),
                    PrintArg::Literal(_) => None,
                })
                .collect(),
        }
    }

    /// Everything except print is a pure tensor operation.
    pub fn is_pure(&self) -> bool {
        !matches!(self, Op::Print(_))
    }

    fn remap(&mut self, f: &impl Fn(ValueId) -> ValueId) {
        match self {
            Op::Constant(_) => {}
            Op::Call { args, .. }
            | Op::Tuple(args)
            | Op::CallPrim { args, .. }
            | Op::CallFunc { args, .. } => args.iter_mut().for_each(|a| *a = f(*a)),
            Op::Print(args) => {
                for arg in args {
                    if let PrintArg::Value(v) = arg {
                        *v = f(*v);
                    }
                }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Binding {
    pub var: ValueId,
    /// Source name the value was assigned to, if any.
    pub name: Option<String>,
    pub info: StructInfo,
    pub op: Op,
    /// Literal-derived value whose dtype yields to the other operand.
    pub weak: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    /// Dataflow blocks hold only pure bindings and may be fused.
    pub dataflow: bool,
    pub bindings: Vec<Binding>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub var: ValueId,
    pub name: String,
    pub desc: TensorDescriptor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FuncResult {
    Value(ValueId),
    /// No return executed; the caller receives the zero sentinel.
    Empty,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub blocks: Vec<Block>,
    pub result: FuncResult,
    /// Fusion sub-function, inlined again by `FuseTIR`.
    pub primitive: bool,
}

impl Function {
    pub fn bindings(&self) -> impl Iterator<Item = &Binding> {
        self.blocks.iter().flat_map(|b| b.bindings.iter())
    }

    pub fn binding(&self, var: ValueId) -> Option<&Binding> {
        self.bindings().find(|b| b.var == var)
    }

    /// Struct info of a parameter or binding.
    pub fn info_of(&self, var: ValueId) -> Option<StructInfo> {
        if let Some(p) = self.params.iter().find(|p| p.var == var) {
            return Some(StructInfo::Tensor(p.desc.clone()));
        }
        self.binding(var).map(|b| b.info.clone())
    }

    /// Number of times each value is read, counting the result.
    pub fn use_counts(&self) -> std::collections::HashMap<ValueId, usize> {
        let mut counts = std::collections::HashMap::new();
        for binding in self.bindings() {
            for v in binding.op.operands() {
                *counts.entry(v).or_insert(0) += 1;
            }
        }
        if let FuncResult::Value(v) = self.result {
            *counts.entry(v).or_insert(0) += 1;
        }
        counts
    }

    pub(crate) fn remap_values(&mut self, f: &impl Fn(ValueId) -> ValueId) {
        for p in &mut self.params {
            p.var = f(p.var);
        }
        for block in &mut self.blocks {
            for binding in &mut block.bindings {
                binding.var = f(binding.var);
                binding.op.remap(f);
            }
        }
        if let FuncResult::Value(v) = &mut self.result {
            *v = f(*v);
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct IRModule {
    pub functions: Vec<Function>,
    pub prim_funcs: Vec<PrimFunc>,
    next_value: u32,
}

impl IRModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh_value(&mut self) -> ValueId {
        let id = ValueId(self.next_value);
        self.next_value += 1;
        id
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// The single non-primitive function.
    pub fn entry(&self) -> Option<&Function> {
        self.functions.iter().find(|f| !f.primitive)
    }

    pub fn prim_func(&self, name: &str) -> Option<&PrimFunc> {
        self.prim_funcs.iter().find(|p| p.name == name)
    }

    /// Pick `base`, or `base1`, `base2`, ... if taken by any global.
    pub fn unique_global_name(&self, base: &str) -> String {
        let taken = |name: &str| self.function(name).is_some() || self.prim_func(name).is_some();
        if !taken(base) {
            return base.to_string();
        }
        (1..)
            .map(|i| format!("{}{}", base, i))
            .find(|name| !taken(name))
            .unwrap_or_else(|| base.to_string())
    }

    /// Attach a manual schedule to a primitive function. Manual schedules
    /// are never replaced by the scheduler.
    pub fn set_schedule(&mut self, prim: &str, threads_per_block: u32) -> Result<()> {
        if threads_per_block == 0 {
            return Err(JitError::backend("schedule", "threads_per_block must be > 0"));
        }
        let func = self
            .prim_funcs
            .iter_mut()
            .find(|p| p.name == prim)
            .ok_or_else(|| JitError::backend("schedule", format!("no primitive function '{}'", prim)))?;
        let numel = func.launch_extent()?;
        func.schedule = Some(Schedule::new(ScheduleKind::Manual, threads_per_block, numel));
        Ok(())
    }
}

impl std::fmt::Display for IRModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&display::module_to_string(self))
    }
}
