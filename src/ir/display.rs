//! Deterministic script-like text of an [`IRModule`].
//!
//! Value names come from the binding name hints, made unique per function
//! (`out`, `out1`, ...); unnamed values print as `lv`, `lv1`, ....

use std::collections::{HashMap, HashSet};
use std::fmt::Write;

use super::{Binding, Block, FuncResult, Function, IRModule, Op, PrintArg, StructInfo, ValueId};
use crate::tensor::{Scalar, TensorDescriptor};

pub fn module_to_string(module: &IRModule) -> String {
    let mut out = String::new();
    out.push_str("@I.ir_module\nclass Module:\n");
    let mut first = true;
    for prim in &module.prim_funcs {
        if !first {
            out.push('\n');
        }
        first = false;
        indent_into(&mut out, &prim.to_string(), 1);
    }
    for func in &module.functions {
        if !first {
            out.push('\n');
        }
        first = false;
        indent_into(&mut out, &function_to_string(func), 1);
    }
    if first {
        out.push_str("    pass\n");
    }
    out
}

fn indent_into(out: &mut String, text: &str, level: usize) {
    let pad = "    ".repeat(level);
    for line in text.lines() {
        if line.is_empty() {
            out.push('\n');
        } else {
            let _ = writeln!(out, "{}{}", pad, line);
        }
    }
}

pub fn tensor_type(desc: &TensorDescriptor) -> String {
    format!("R.Tensor({}, dtype=\"{}\")", desc.shape_str(), desc.dtype)
}

pub fn struct_info_text(info: &StructInfo) -> String {
    match info {
        StructInfo::Tensor(desc) => tensor_type(desc),
        StructInfo::Tuple(fields) => {
            let parts: Vec<String> = fields.iter().map(struct_info_text).collect();
            format!("R.Tuple({})", parts.join(", "))
        }
        StructInfo::Object => "R.Object".to_string(),
    }
}

fn const_text(value: Scalar) -> String {
    match value {
        Scalar::F32(v) => format!("R.const({:?}, \"float32\")", v),
        Scalar::F64(v) => format!("R.const({:?}, \"float64\")", v),
        Scalar::I32(v) => format!("R.const({}, \"int32\")", v),
        Scalar::I64(v) => format!("R.const({}, \"int64\")", v),
    }
}

#[derive(Default)]
struct Namer {
    used: HashSet<String>,
    names: HashMap<ValueId, String>,
}

impl Namer {
    fn bind(&mut self, var: ValueId, hint: &str) {
        let name = if self.used.contains(hint) {
            (1..)
                .map(|i| format!("{}{}", hint, i))
                .find(|n| !self.used.contains(n))
                .unwrap_or_else(|| hint.to_string())
        } else {
            hint.to_string()
        };
        self.used.insert(name.clone());
        self.names.insert(var, name);
    }

    fn get(&self, var: ValueId) -> String {
        self.names
            .get(&var)
            .cloned()
            .unwrap_or_else(|| format!("%{}", var.0))
    }

    fn list(&self, vars: &[ValueId]) -> String {
        let parts: Vec<String> = vars.iter().map(|v| self.get(*v)).collect();
        parts.join(", ")
    }
}

fn op_text(op: &Op, info: &StructInfo, namer: &Namer) -> String {
    match op {
        Op::Constant(value) => const_text(*value),
        Op::Call { op, args } => format!("R.{}({})", op.name(), namer.list(args)),
        Op::Print(args) => {
            let parts: Vec<String> = args
                .iter()
                .map(|a| match a {
                    PrintArg::Value(v) => namer.get(*v),
                    PrintArg::Literal(s) => format!("{:?}", s),
                })
                .collect();
            format!("R.print({})", parts.join(", "))
        }
        Op::Tuple(args) if args.len() == 1 => format!("({},)", namer.get(args[0])),
        Op::Tuple(args) => format!("({})", namer.list(args)),
        Op::CallPrim { func, args } => {
            let args = match args.as_slice() {
                [one] => format!("({},)", namer.get(*one)),
                _ => format!("({})", namer.list(args)),
            };
            format!(
                "R.call_tir(cls.{}, {}, out_sinfo={})",
                func,
                args,
                struct_info_text(info)
            )
        }
        Op::CallFunc { func, args } => format!("cls.{}({})", func, namer.list(args)),
    }
}

/// Vars defined in `block` that are read after it or returned.
fn escaping(func: &Function, index: usize, block: &Block) -> Vec<ValueId> {
    let mut later: HashSet<ValueId> = func.blocks[index + 1..]
        .iter()
        .flat_map(|b| b.bindings.iter())
        .flat_map(|b| b.op.operands())
        .collect();
    if let FuncResult::Value(v) = func.result {
        later.insert(v);
    }
    block
        .bindings
        .iter()
        .map(|b| b.var)
        .filter(|v| later.contains(v))
        .collect()
}

fn binding_line(binding: &Binding, namer: &Namer) -> String {
    format!(
        "{}: {} = {}",
        namer.get(binding.var),
        struct_info_text(&binding.info),
        op_text(&binding.op, &binding.info, namer)
    )
}

pub fn function_to_string(func: &Function) -> String {
    let mut namer = Namer::default();
    for param in &func.params {
        namer.bind(param.var, &param.name);
    }
    for binding in func.bindings() {
        namer.bind(binding.var, binding.name.as_deref().unwrap_or("lv"));
    }

    let mut out = String::new();
    if func.primitive {
        out.push_str("@R.function(private=True)\n");
    } else {
        out.push_str("@R.function\n");
    }
    let params: Vec<String> = func
        .params
        .iter()
        .map(|p| format!("{}: {}", namer.get(p.var), tensor_type(&p.desc)))
        .collect();
    let ret = match func.result {
        FuncResult::Value(v) => func
            .info_of(v)
            .map(|i| struct_info_text(&i))
            .unwrap_or_else(|| "R.Object".to_string()),
        FuncResult::Empty => "R.Shape([])".to_string(),
    };
    let _ = writeln!(out, "def {}({}) -> {}:", func.name, params.join(", "), ret);
    if func.primitive {
        out.push_str("    R.func_attr({\"Primitive\": 1})\n");
    }
    let uses_cls = func
        .bindings()
        .any(|b| matches!(b.op, Op::CallPrim { .. } | Op::CallFunc { .. }));
    if uses_cls {
        out.push_str("    cls = Module\n");
    }
    for (i, block) in func.blocks.iter().enumerate() {
        if block.dataflow {
            out.push_str("    with R.dataflow():\n");
            for binding in &block.bindings {
                let _ = writeln!(out, "        {}", binding_line(binding, &namer));
            }
            let outputs = escaping(func, i, block);
            if !outputs.is_empty() {
                let _ = writeln!(out, "        R.output({})", namer.list(&outputs));
            }
        } else {
            for binding in &block.bindings {
                let _ = writeln!(out, "    {}", binding_line(binding, &namer));
            }
        }
    }
    match func.result {
        FuncResult::Value(v) => {
            let _ = writeln!(out, "    return {}", namer.get(v));
        }
        FuncResult::Empty => out.push_str("    return R.shape([])\n"),
    }
    out
}
