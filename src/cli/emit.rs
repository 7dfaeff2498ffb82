use std::path::PathBuf;
use std::process;

use clap::Args;

use super::{fail, pick_target, resolve_device_model, select_functions};
use tcl::Target;

#[derive(Args)]
pub struct EmitArgs {
    /// Python-style source file containing the kernel functions
    pub input: PathBuf,
    /// Function to compile (default: every @jit-decorated function)
    #[arg(short, long)]
    pub function: Option<String>,
    /// Override the decorator's target (cpu or cuda)
    #[arg(long)]
    pub target: Option<String>,
    /// Accelerator device model (built-in name or .toml path)
    #[arg(long)]
    pub device_model: Option<String>,
    /// Write kernel source here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Also print the driver program
    #[arg(long)]
    pub driver: bool,
}

pub fn cmd_emit(args: EmitArgs) {
    let model = resolve_device_model(args.device_model.as_deref());
    let mut out = String::new();
    for selected in select_functions(&args.input, args.function.as_deref()) {
        let target = Target::resolve(pick_target(args.target.as_deref(), selected.decorated), &model);
        let exec = tcl::compile_source(&selected.text, &target)
            .unwrap_or_else(|e| fail(&e, &args.input, &selected.text));
        out.push_str(&format!("// {} for {}\n", selected.name, target));
        out.push_str(&exec.source());
        if args.driver {
            for line in exec.to_string().lines() {
                out.push_str("// ");
                out.push_str(line);
                out.push('\n');
            }
        }
    }

    match &args.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, &out) {
                eprintln!("error: cannot write '{}': {}", path.display(), e);
                process::exit(1);
            }
            eprintln!("Compiled -> {}", path.display());
        }
        None => print!("{}", out),
    }
}
