//! Compiler and executor.
//!
//! `build` turns a fully lowered, scheduled [`IRModule`] into an
//! [`Executable`]: one compiled kernel per primitive function, the
//! generated kernel source for the target, and a register-based driver
//! program for the entry function. A [`VirtualMachine`] runs the driver.

pub mod console;
pub mod kernel;
pub mod vm;

use std::collections::HashMap;
use std::fmt;

pub use console::Console;
pub use kernel::{Kernel, Launch};
pub use vm::{Instr, Object, PrintOperand, VirtualMachine, VmFunction};

use crate::codegen::create_kernel_lowering;
use crate::config::target::Target;
use crate::error::{JitError, Result};
use crate::ir::{FuncResult, IRModule, Op, PrintArg, ValueId};
use crate::tensor::TensorDescriptor;

// ─── Types ─────────────────────────────────────────────────────────

/// A kernel with its launch configuration.
#[derive(Clone, Debug)]
pub struct CompiledKernel {
    pub kernel: Kernel,
    pub launch: Launch,
    /// Kernel source text for the target.
    pub source: String,
}

/// The compiled artifact: bound to one target and one entry function.
#[derive(Clone, Debug)]
pub struct Executable {
    pub target: Target,
    pub entry: String,
    /// Entry parameters, in call order.
    pub params: Vec<(String, TensorDescriptor)>,
    pub kernels: Vec<CompiledKernel>,
    pub code: Vec<Instr>,
    pub num_registers: usize,
}

impl Executable {
    /// Concatenated kernel source for every primitive function.
    pub fn source(&self) -> String {
        self.kernels
            .iter()
            .map(|k| k.source.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for Executable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "executable {} on {}", self.entry, self.target)?;
        for (i, k) in self.kernels.iter().enumerate() {
            let launch = match k.launch {
                Launch::Serial => "serial".to_string(),
                Launch::Grid {
                    blocks,
                    threads_per_block,
                } => format!("grid({}, {})", blocks, threads_per_block),
            };
            writeln!(f, "  kernel #{} {} {}", i, k.kernel.name, launch)?;
        }
        for instr in &self.code {
            writeln!(f, "  {}", instr)?;
        }
        Ok(())
    }
}

// ─── Build ─────────────────────────────────────────────────────────

fn fail(message: impl Into<String>) -> JitError {
    JitError::backend("build", message)
}

/// Compile a lowered module for `target`.
pub fn build(module: &IRModule, target: &Target) -> Result<Executable> {
    if let Some(sub) = module.functions.iter().find(|f| f.primitive) {
        return Err(fail(format!("primitive function '{}' was not inlined", sub.name)));
    }
    let func = module
        .entry()
        .ok_or_else(|| fail("module has no entry function"))?;

    let lowering = create_kernel_lowering(target);
    let mut kernels = Vec::with_capacity(module.prim_funcs.len());
    let mut kernel_index = HashMap::new();
    for prim in &module.prim_funcs {
        let launch = if target.is_accelerator() {
            let schedule = prim
                .schedule
                .ok_or_else(|| fail(format!("'{}' has no schedule for {}", prim.name, target.target_string)))?;
            if (schedule.blocks as usize) * (schedule.threads_per_block as usize) < prim.output.numel() {
                return Err(fail(format!("schedule of '{}' does not cover its output", prim.name)));
            }
            if let Some(model) = &target.model {
                if schedule.threads_per_block > model.max_threads_per_block {
                    return Err(fail(format!(
                        "'{}' uses {} threads per block, {} allows {}",
                        prim.name, schedule.threads_per_block, model.display_name, model.max_threads_per_block
                    )));
                }
            }
            Launch::from_schedule(&schedule)
        } else {
            Launch::Serial
        };
        kernel_index.insert(prim.name.clone(), kernels.len());
        kernels.push(CompiledKernel {
            kernel: Kernel::compile(prim)?,
            launch,
            source: lowering.lower(prim),
        });
    }

    let mut regs: HashMap<ValueId, usize> = HashMap::new();
    let params: Vec<(String, TensorDescriptor)> = func
        .params
        .iter()
        .enumerate()
        .map(|(i, p)| {
            regs.insert(p.var, i);
            (p.name.clone(), p.desc.clone())
        })
        .collect();
    let mut next = params.len();
    let lookup = |regs: &HashMap<ValueId, usize>, v: ValueId| -> Result<usize> {
        regs.get(&v)
            .copied()
            .ok_or_else(|| fail(format!("value %{} used before definition", v.0)))
    };

    let mut code = Vec::new();
    for binding in func.bindings() {
        let dst = next;
        next += 1;
        let instr = match &binding.op {
            Op::Constant(value) => Instr::LoadConst { value: *value, dst },
            Op::CallPrim { func: name, args } => {
                let kernel = *kernel_index
                    .get(name)
                    .ok_or_else(|| fail(format!("call to unknown primitive function '{}'", name)))?;
                let args = args.iter().map(|v| lookup(&regs, *v)).collect::<Result<Vec<_>>>()?;
                Instr::CallKernel { kernel, args, dst }
            }
            Op::Tuple(fields) => Instr::MakeTuple {
                fields: fields.iter().map(|v| lookup(&regs, *v)).collect::<Result<Vec<_>>>()?,
                dst,
            },
            Op::Print(args) => Instr::Print {
                args: args
                    .iter()
                    .map(|a| match a {
                        PrintArg::Value(v) => lookup(&regs, *v).map(PrintOperand::Reg),
                        PrintArg::Literal(s) => Ok(PrintOperand::Literal(s.clone())),
                    })
                    .collect::<Result<Vec<_>>>()?,
                dst,
            },
            Op::Call { op, .. } => {
                return Err(fail(format!("operator '{}' was not legalized", op.name())));
            }
            Op::CallFunc { func: name, .. } => {
                return Err(fail(format!("call to sub-function '{}' was not fused", name)));
            }
        };
        regs.insert(binding.var, dst);
        code.push(instr);
    }
    code.push(match func.result {
        FuncResult::Value(v) => Instr::Ret(Some(lookup(&regs, v)?)),
        FuncResult::Empty => Instr::Ret(None),
    });

    Ok(Executable {
        target: target.clone(),
        entry: func.name.clone(),
        params,
        kernels,
        code,
        num_registers: next,
    })
}

#[cfg(test)]
mod tests;
