//! CUDA lowering: one thread per output element, guarded by the element count.

use super::{axis_decls, c_params, expr_c, KernelLowering};
use crate::ir::PrimFunc;

pub struct CudaLowering {
    arch: String,
}

impl CudaLowering {
    pub fn new(arch: String) -> Self {
        Self { arch }
    }
}

impl KernelLowering for CudaLowering {
    fn target_name(&self) -> &str {
        "cuda"
    }

    fn lower(&self, prim: &PrimFunc) -> String {
        let numel = prim.output.numel();
        let threads = prim.schedule.map(|s| s.threads_per_block).unwrap_or(1024);
        let mut out = String::new();
        out.push_str(&format!("// target: cuda -arch={}\n", self.arch));
        if let Some(s) = &prim.schedule {
            out.push_str(&format!(
                "// schedule: {} grid=({}, 1, 1) block=({}, 1, 1)\n",
                s.kind.as_str(),
                s.blocks,
                s.threads_per_block
            ));
        }
        out.push_str(&format!(
            "extern \"C\" __global__ void __launch_bounds__({}) {}_kernel({}) {{\n",
            threads,
            prim.name,
            c_params(prim, "__restrict__ ")
        ));
        out.push_str("  long long tid = (long long)blockIdx.x * blockDim.x + threadIdx.x;\n");
        out.push_str(&format!("  if (tid < {}) {{\n", numel));
        for decl in axis_decls(&prim.output, "tid") {
            out.push_str(&format!("    {}\n", decl));
        }
        out.push_str(&format!("    T_out[tid] = {};\n", expr_c(prim, &prim.body)));
        out.push_str("  }\n}\n");
        out
    }
}
