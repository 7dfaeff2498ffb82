//! Host lowering: a plain C loop over the flat output index.

use super::{axis_decls, c_params, expr_c, KernelLowering};
use crate::ir::PrimFunc;

#[derive(Default)]
pub struct HostLowering;

impl HostLowering {
    pub fn new() -> Self {
        Self
    }
}

impl KernelLowering for HostLowering {
    fn target_name(&self) -> &str {
        "c"
    }

    fn lower(&self, prim: &PrimFunc) -> String {
        let mut out = String::new();
        out.push_str("// target: llvm\n");
        out.push_str(&format!("void {}({}) {{\n", prim.name, c_params(prim, "")));
        out.push_str(&format!("  for (long long i = 0; i < {}; ++i) {{\n", prim.output.numel()));
        for decl in axis_decls(&prim.output, "i") {
            out.push_str(&format!("    {}\n", decl));
        }
        out.push_str(&format!("    T_out[i] = {};\n", expr_c(prim, &prim.body)));
        out.push_str("  }\n}\n");
        out
    }
}
