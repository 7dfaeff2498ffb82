use super::Pass;
use crate::error::Result;
use crate::ir::IRModule;

/// Tag every primitive function with its [`OpPattern`](crate::ir::OpPattern).
/// Existing tags are left alone.
pub struct AnnotateOpPattern;

impl Pass for AnnotateOpPattern {
    fn name(&self) -> &'static str {
        "AnnotateOpPattern"
    }

    fn run(&self, mut module: IRModule) -> Result<IRModule> {
        for prim in module.prim_funcs.iter_mut().filter(|p| p.pattern.is_none()) {
            prim.pattern = Some(prim.classify());
        }
        Ok(module)
    }
}
