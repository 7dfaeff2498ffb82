pub mod ast;
pub mod codegen;
pub mod config;
pub mod context;
pub mod diagnostic;
pub mod error;
pub mod ir;
pub mod jit;
pub mod runtime;
pub mod schedule;
pub mod syntax;
pub mod tensor;

// Re-exports: flat paths used by the CLI, tests and benches
pub use config::target;
pub use context::{Context, ContextValue};
pub use error::{JitError, Result};
pub use jit::{jit, CompiledArtifact, FunctionSource, Jit, JitFunction, JitOptions};
pub use runtime::{Console, Object};
pub use syntax::span;
pub use target::{DeviceModel, JitTarget, Target};
pub use tensor::{DType, Device, ForeignArray, NDArray, Scalar, Tensor, TensorDescriptor};

use ir::transform::{default_pipeline, Pass};
use ir::{GraphBuilder, IRModule};

/// Parse, lower and optimize one function's source with the prelude
/// context. The result is not yet scheduled for any target.
pub fn lower_source(source: &str) -> Result<IRModule> {
    let tree = syntax::parse(source)?;
    let module = GraphBuilder::new(&Context::new()).build(&tree)?;
    default_pipeline().run(module)
}

/// Compile one function's source for a target, with no tuning database.
pub fn compile_source(source: &str, target: &Target) -> Result<runtime::Executable> {
    let module = schedule::apply_default_schedule(lower_source(source)?, target, None)?;
    runtime::build(&module, target)
}
