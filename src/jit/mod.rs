//! The JIT wrapper: `jit(target)` validates the target token up front and
//! wraps a function source; every call re-extracts the source, compiles
//! it through the whole pipeline, and invokes the result.
//!
//! ```text
//! source -> parse -> GraphBuilder -> default_pipeline -> Target::resolve
//!        -> apply_default_schedule -> runtime::build -> VirtualMachine
//! ```
//!
//! Nothing is cached unless `JitOptions::with_cache(true)` is set.

mod cache;
#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::sync::Arc;

pub use cache::{artifact_key, ArtifactCache};

use crate::ast;
use crate::config::target::{DeviceModel, JitTarget, Target};
use crate::context::Context;
use crate::error::{JitError, Result};
use crate::ir::transform::{default_pipeline, Pass};
use crate::ir::{GraphBuilder, IRModule};
use crate::runtime::{self, Console, Executable, Object, VirtualMachine};
use crate::schedule::{apply_default_schedule, TuningDatabase};
use crate::tensor::{NDArray, Tensor, TensorDescriptor};

// ─── Options ───────────────────────────────────────────────────────

/// Per-function compilation options.
#[derive(Clone, Debug)]
pub struct JitOptions {
    pub device_model: DeviceModel,
    /// Write the AST dump and the optimized module to the console.
    pub dump: bool,
    /// Reuse compiled artifacts across calls.
    pub cache: bool,
    pub console: Console,
    pub tuning_db: Option<Arc<TuningDatabase>>,
}

impl Default for JitOptions {
    fn default() -> Self {
        Self {
            device_model: DeviceModel::default(),
            dump: true,
            cache: false,
            console: Console::default(),
            tuning_db: None,
        }
    }
}

impl JitOptions {
    pub fn with_device_model(mut self, model: DeviceModel) -> Self {
        self.device_model = model;
        self
    }

    pub fn with_dump(mut self, dump: bool) -> Self {
        self.dump = dump;
        self
    }

    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_console(mut self, console: Console) -> Self {
        self.console = console;
        self
    }

    pub fn with_tuning_db(mut self, db: TuningDatabase) -> Self {
        self.tuning_db = Some(Arc::new(db));
        self
    }
}

// ─── Decoration ────────────────────────────────────────────────────

/// Where a jitted function's source comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FunctionSource {
    /// Source text of exactly one function.
    Inline(String),
    /// Function `name` inside `path`; the file is re-read on every call.
    File { path: PathBuf, name: String },
}

impl FunctionSource {
    pub fn file(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        FunctionSource::File {
            path: path.into(),
            name: name.into(),
        }
    }

    /// Current text of the function.
    pub fn read(&self) -> Result<String> {
        match self {
            FunctionSource::Inline(text) => Ok(text.clone()),
            FunctionSource::File { path, name } => {
                let text = std::fs::read_to_string(path).map_err(|e| JitError::io(path, e))?;
                crate::syntax::source::extract_function(&text, name)
            }
        }
    }

    /// Name used when rendering diagnostics.
    pub fn filename(&self) -> String {
        match self {
            FunctionSource::Inline(_) => "<inline>".to_string(),
            FunctionSource::File { path, .. } => path.display().to_string(),
        }
    }
}

/// A validated target token, ready to wrap functions.
#[derive(Clone, Debug)]
pub struct Jit {
    target: JitTarget,
    options: JitOptions,
}

/// Decorate with a target token. Anything but `cpu`/`cuda` fails here,
/// before any function is compiled.
pub fn jit(token: &str) -> Result<Jit> {
    Ok(Jit {
        target: JitTarget::parse(token)?,
        options: JitOptions::default(),
    })
}

impl Jit {
    pub fn with_options(mut self, options: JitOptions) -> Self {
        self.options = options;
        self
    }

    pub fn target(&self) -> JitTarget {
        self.target
    }

    pub fn wrap(self, source: FunctionSource, context: Context) -> JitFunction {
        JitFunction {
            target: self.target,
            options: self.options,
            source,
            context,
            cache: ArtifactCache::default(),
        }
    }
}

// ─── Compiled artifacts ────────────────────────────────────────────

/// Everything one compilation produced.
#[derive(Debug)]
pub struct CompiledArtifact {
    /// The optimized, scheduled module.
    pub module: IRModule,
    pub executable: Arc<Executable>,
}

/// A wrapped function. Calling it compiles and runs.
#[derive(Debug)]
pub struct JitFunction {
    target: JitTarget,
    options: JitOptions,
    source: FunctionSource,
    context: Context,
    cache: ArtifactCache,
}

impl JitFunction {
    pub fn options(&self) -> &JitOptions {
        &self.options
    }

    pub fn source(&self) -> &FunctionSource {
        &self.source
    }

    pub fn resolved_target(&self) -> Target {
        Target::resolve(self.target, &self.options.device_model)
    }

    /// Compile the current source without running it.
    pub fn prepare(&self) -> Result<Arc<CompiledArtifact>> {
        let text = self.source.read()?;
        self.compile(&text).map(Arc::new)
    }

    fn compile(&self, text: &str) -> Result<CompiledArtifact> {
        let console = &self.options.console;
        let tree = crate::syntax::parse(text)?;
        if self.options.dump {
            console.diagnostic(&ast::dump(&tree));
        }
        let module = GraphBuilder::new(&self.context).build(&tree)?;
        let module = default_pipeline().run(module)?;
        if self.options.dump {
            console.diagnostic(&module.to_string());
        }
        let target = self.resolved_target();
        let module = apply_default_schedule(module, &target, self.options.tuning_db.as_deref())?;
        let executable = runtime::build(&module, &target)?;
        Ok(CompiledArtifact {
            module,
            executable: Arc::new(executable),
        })
    }

    /// Run a prepared artifact on bound tensors.
    pub fn invoke(&self, artifact: &CompiledArtifact, args: &[&Tensor]) -> Result<Object> {
        let arrays = args
            .iter()
            .map(|t| t.data().cloned())
            .collect::<Result<Vec<NDArray>>>()?;
        let exec = Arc::clone(&artifact.executable);
        let device = exec.target.device;
        let entry = exec.entry.clone();
        let vm = VirtualMachine::new(exec, device)?.with_console(self.options.console.clone());
        vm.function(&entry)?.call(&arrays)
    }

    /// Compile and run. With the cache off this recompiles on every call.
    pub fn call(&self, args: &[&Tensor]) -> Result<Object> {
        let text = self.source.read()?;
        if !self.options.cache {
            let artifact = self.compile(&text)?;
            return self.invoke(&artifact, args);
        }
        let descs: Vec<&TensorDescriptor> = args.iter().map(|t| t.descriptor()).collect();
        let key = artifact_key(&text, self.target, &self.options.device_model, &descs);
        let artifact = match self.cache.get(&key) {
            Some(artifact) => artifact,
            None => {
                let artifact = Arc::new(self.compile(&text)?);
                self.cache.insert(key, Arc::clone(&artifact));
                artifact
            }
        };
        self.invoke(&artifact, args)
    }

    /// Parameter names and descriptors of the current source.
    pub fn signature(&self) -> Result<Vec<(String, TensorDescriptor)>> {
        let tree = crate::syntax::parse(&self.source.read()?)?;
        let module = GraphBuilder::new(&self.context).build(&tree)?;
        let entry = module
            .entry()
            .ok_or_else(|| JitError::backend("signature", "module has no entry function"))?;
        Ok(entry.params.iter().map(|p| (p.name.clone(), p.desc.clone())).collect())
    }

    pub fn cached_artifacts(&self) -> usize {
        self.cache.len()
    }
}
