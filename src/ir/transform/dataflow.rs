use super::Pass;
use crate::error::Result;
use crate::ir::{Block, IRModule};

/// Split function bodies into maximal runs of pure bindings.
/// `[add, add, print, add]` → `dataflow{add, add}, plain{print}, dataflow{add}`.
pub struct ConvertToDataflow;

impl Pass for ConvertToDataflow {
    fn name(&self) -> &'static str {
        "ConvertToDataflow"
    }

    fn run(&self, mut module: IRModule) -> Result<IRModule> {
        for func in module.functions.iter_mut().filter(|f| !f.primitive) {
            let bindings: Vec<_> = std::mem::take(&mut func.blocks)
                .into_iter()
                .flat_map(|b| b.bindings)
                .collect();
            let mut blocks: Vec<Block> = Vec::new();
            for binding in bindings {
                let dataflow = binding.op.is_pure();
                match blocks.last_mut() {
                    Some(block) if block.dataflow == dataflow => block.bindings.push(binding),
                    _ => blocks.push(Block {
                        dataflow,
                        bindings: vec![binding],
                    }),
                }
            }
            func.blocks = blocks;
        }
        Ok(module)
    }
}
