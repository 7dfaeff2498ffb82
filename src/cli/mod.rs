pub mod dump;
pub mod emit;
pub mod run;
pub mod targets;
pub mod tune;

use std::path::{Path, PathBuf};
use std::process;

use tcl::syntax::source::{discover, extract_function};
use tcl::{DeviceModel, JitError, JitTarget};

/// One kernel function selected from a host source file.
pub struct SelectedFunction {
    pub name: String,
    /// Extracted, dedented function text.
    pub text: String,
    /// Target token of its `@jit(...)` decorator, if any.
    pub decorated: Option<JitTarget>,
}

fn read_file(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", path.display(), e);
            process::exit(1);
        }
    }
}

/// Select `function` from `input`, or every jit-decorated function when
/// no name is given.
pub fn select_functions(input: &Path, function: Option<&str>) -> Vec<SelectedFunction> {
    let text = read_file(input);
    let decorated = match discover(&text) {
        Ok(found) => found,
        Err(e) => fail(&e, input, &text),
    };
    let names: Vec<String> = match function {
        Some(name) => vec![name.to_string()],
        None => decorated.iter().map(|d| d.name.clone()).collect(),
    };
    if names.is_empty() {
        eprintln!("error: no @jit functions in '{}'; pass --function", input.display());
        process::exit(1);
    }
    names
        .into_iter()
        .map(|name| {
            let body = match extract_function(&text, &name) {
                Ok(body) => body,
                Err(e) => fail(&e, input, &text),
            };
            let target = decorated.iter().find(|d| d.name == name).map(|d| d.target);
            SelectedFunction {
                name,
                text: body,
                decorated: target,
            }
        })
        .collect()
}

/// Target from `--target`, else the decorator, else the host.
pub fn pick_target(flag: Option<&str>, decorated: Option<JitTarget>) -> JitTarget {
    match flag {
        Some(token) => match JitTarget::parse(token) {
            Ok(target) => target,
            Err(e) => {
                eprintln!("error: {}", e);
                process::exit(1);
            }
        },
        None => decorated.unwrap_or(JitTarget::Cpu),
    }
}

/// Resolve `--device-model` (a built-in name, a model name under
/// `devices/`, or a path to a `.toml` file).
pub fn resolve_device_model(name: Option<&str>) -> DeviceModel {
    let Some(name) = name else {
        return DeviceModel::default();
    };
    let result = if name.ends_with(".toml") {
        DeviceModel::load(&PathBuf::from(name))
    } else {
        DeviceModel::resolve(name)
    };
    match result {
        Ok(model) => model,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }
}

/// Render `err` against `source` and exit.
pub fn fail(err: &JitError, input: &Path, source: &str) -> ! {
    err.render(&input.display().to_string(), source);
    eprintln!("error: {}", err);
    process::exit(1);
}
