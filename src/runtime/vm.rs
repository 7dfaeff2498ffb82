//! The virtual machine: runs an executable's driver program over
//! device-resident arrays.

use std::fmt;
use std::sync::Arc;

use super::console::Console;
use super::Executable;
use crate::error::{JitError, Result};
use crate::syntax::span::Span;
use crate::tensor::{Device, NDArray, Scalar};

/// Register index in the driver program.
pub type Reg = usize;

#[derive(Clone, Debug, PartialEq)]
pub enum PrintOperand {
    Reg(Reg),
    Literal(String),
}

/// Driver instructions. Registers `0..params` hold the arguments.
#[derive(Clone, Debug, PartialEq)]
pub enum Instr {
    LoadConst { value: Scalar, dst: Reg },
    CallKernel { kernel: usize, args: Vec<Reg>, dst: Reg },
    MakeTuple { fields: Vec<Reg>, dst: Reg },
    /// Writes one line to the program console; `dst` receives the sentinel.
    Print { args: Vec<PrintOperand>, dst: Reg },
    /// `None` returns the sentinel.
    Ret(Option<Reg>),
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let regs = |rs: &[Reg]| rs.iter().map(|r| format!("%{}", r)).collect::<Vec<_>>().join(", ");
        match self {
            Instr::LoadConst { value, dst } => write!(f, "%{} = const {}:{}", dst, value, value.dtype()),
            Instr::CallKernel { kernel, args, dst } => write!(f, "%{} = call_kernel #{}({})", dst, kernel, regs(args)),
            Instr::MakeTuple { fields, dst } => write!(f, "%{} = tuple({})", dst, regs(fields)),
            Instr::Print { args, dst } => {
                let parts: Vec<String> = args
                    .iter()
                    .map(|a| match a {
                        PrintOperand::Reg(r) => format!("%{}", r),
                        PrintOperand::Literal(s) => format!("{:?}", s),
                    })
                    .collect();
                write!(f, "%{} = print({})", dst, parts.join(", "))
            }
            Instr::Ret(Some(r)) => write!(f, "ret %{}", r),
            Instr::Ret(None) => f.write_str("ret sentinel"),
        }
    }
}

/// A runtime value.
#[derive(Clone, Debug)]
pub enum Object {
    Tensor(NDArray),
    Tuple(Vec<Object>),
}

impl Object {
    pub fn as_tensor(&self) -> Option<&NDArray> {
        match self {
            Object::Tensor(array) => Some(array),
            Object::Tuple(_) => None,
        }
    }

    pub fn into_tensor(self) -> Option<NDArray> {
        match self {
            Object::Tensor(array) => Some(array),
            Object::Tuple(_) => None,
        }
    }

    pub fn fields(&self) -> &[Object] {
        match self {
            Object::Tuple(fields) => fields,
            Object::Tensor(_) => &[],
        }
    }

    /// The zero-valued sentinel returned by functions without a result.
    pub fn sentinel(device: Device) -> Self {
        Object::Tensor(NDArray::scalar(Scalar::I64(0), device))
    }

    pub fn is_sentinel(&self) -> bool {
        match self {
            Object::Tensor(array) => {
                array.descriptor().is_scalar() && array.item() == Some(Scalar::I64(0))
            }
            Object::Tuple(_) => false,
        }
    }
}

/// Python-style `str()`.
impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Tensor(array) => write!(f, "{}", array),
            Object::Tuple(fields) => {
                let parts: Vec<String> = fields.iter().map(|o| o.to_string()).collect();
                if parts.len() == 1 {
                    write!(f, "({},)", parts[0])
                } else {
                    write!(f, "({})", parts.join(", "))
                }
            }
        }
    }
}

pub struct VirtualMachine {
    exec: Arc<Executable>,
    device: Device,
    console: Console,
}

impl VirtualMachine {
    /// Bind an executable to a device of the kind it was compiled for.
    pub fn new(exec: Arc<Executable>, device: Device) -> Result<Self> {
        if device.kind != exec.target.device.kind {
            return Err(JitError::binding(format!(
                "executable for {} cannot run on {}",
                exec.target.device, device
            )));
        }
        Ok(Self {
            exec,
            device,
            console: Console::default(),
        })
    }

    pub fn with_console(mut self, console: Console) -> Self {
        self.console = console;
        self
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Look up an exported function.
    pub fn function(&self, name: &str) -> Result<VmFunction<'_>> {
        if name != self.exec.entry {
            return Err(JitError::UnboundName {
                name: name.to_string(),
                span: Span::dummy(),
            });
        }
        Ok(VmFunction { vm: self })
    }
}

/// A callable entry point of a loaded executable.
pub struct VmFunction<'vm> {
    vm: &'vm VirtualMachine,
}

impl VmFunction<'_> {
    pub fn call(&self, args: &[NDArray]) -> Result<Object> {
        let exec = &self.vm.exec;
        let device = self.vm.device;
        if args.len() != exec.params.len() {
            return Err(JitError::binding(format!(
                "'{}' takes {} arguments, got {}",
                exec.entry,
                exec.params.len(),
                args.len()
            )));
        }
        for (i, (arg, (name, desc))) in args.iter().zip(&exec.params).enumerate() {
            if arg.device() != device {
                return Err(JitError::binding(format!(
                    "argument {} ('{}') is on {}, expected {}",
                    i,
                    name,
                    arg.device(),
                    device
                )));
            }
            if arg.descriptor() != desc {
                return Err(JitError::binding(format!(
                    "argument {} ('{}') is {}, expected {}",
                    i,
                    name,
                    arg.descriptor(),
                    desc
                )));
            }
        }

        let mut regs: Vec<Option<Object>> = vec![None; exec.num_registers.max(args.len())];
        for (i, arg) in args.iter().enumerate() {
            regs[i] = Some(Object::Tensor(arg.clone()));
        }
        let read = |regs: &[Option<Object>], r: Reg| -> Result<Object> {
            regs.get(r)
                .cloned()
                .flatten()
                .ok_or_else(|| JitError::backend("vm", format!("register %{} read before write", r)))
        };

        for instr in &exec.code {
            match instr {
                Instr::LoadConst { value, dst } => {
                    regs[*dst] = Some(Object::Tensor(NDArray::scalar(*value, device)));
                }
                Instr::CallKernel { kernel, args, dst } => {
                    let compiled = exec
                        .kernels
                        .get(*kernel)
                        .ok_or_else(|| JitError::backend("vm", format!("no kernel #{}", kernel)))?;
                    let inputs = args
                        .iter()
                        .map(|r| {
                            read(&regs, *r)?.into_tensor().ok_or_else(|| {
                                JitError::backend("vm", format!("kernel argument %{} is not a tensor", r))
                            })
                        })
                        .collect::<Result<Vec<NDArray>>>()?;
                    let refs: Vec<&NDArray> = inputs.iter().collect();
                    let out = compiled.kernel.execute(&refs, device, compiled.launch)?;
                    regs[*dst] = Some(Object::Tensor(out));
                }
                Instr::MakeTuple { fields, dst } => {
                    let fields = fields.iter().map(|r| read(&regs, *r)).collect::<Result<Vec<_>>>()?;
                    regs[*dst] = Some(Object::Tuple(fields));
                }
                Instr::Print { args, dst } => {
                    let mut parts = Vec::with_capacity(args.len());
                    for arg in args {
                        parts.push(match arg {
                            PrintOperand::Reg(r) => read(&regs, *r)?.to_string(),
                            PrintOperand::Literal(text) => text.clone(),
                        });
                    }
                    self.vm.console.program(&parts.join(" "));
                    regs[*dst] = Some(Object::sentinel(device));
                }
                Instr::Ret(Some(r)) => return read(&regs, *r),
                Instr::Ret(None) => return Ok(Object::sentinel(device)),
            }
        }
        Err(JitError::backend("vm", "driver program ended without ret"))
    }
}
