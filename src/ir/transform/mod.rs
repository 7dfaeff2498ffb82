//! Module-to-module optimization passes.
//!
//! Each pass consumes a module and returns the rewritten one. Passes keep
//! binding order intact; `print` bindings are never fused or moved.

mod dataflow;
mod fuse_ops;
mod fuse_tir;
mod legalize;
mod pattern;

pub use dataflow::ConvertToDataflow;
pub use fuse_ops::FuseOps;
pub use fuse_tir::FuseTIR;
pub use legalize::LegalizeOps;
pub use pattern::AnnotateOpPattern;

use super::IRModule;
use crate::error::Result;

pub trait Pass {
    fn name(&self) -> &'static str;
    fn run(&self, module: IRModule) -> Result<IRModule>;
}

/// Runs its passes in order, stopping at the first failure.
#[derive(Default)]
pub struct Sequential {
    passes: Vec<Box<dyn Pass>>,
}

impl Sequential {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, pass: impl Pass + 'static) -> Self {
        self.passes.push(Box::new(pass));
        self
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }
}

impl Pass for Sequential {
    fn name(&self) -> &'static str {
        "Sequential"
    }

    fn run(&self, module: IRModule) -> Result<IRModule> {
        self.passes.iter().try_fold(module, |m, pass| pass.run(m))
    }
}

/// The fixed pipeline applied to every freshly built module.
pub fn default_pipeline() -> Sequential {
    Sequential::new()
        .with(ConvertToDataflow)
        .with(LegalizeOps)
        .with(AnnotateOpPattern)
        .with(FuseOps)
        .with(FuseTIR)
}
