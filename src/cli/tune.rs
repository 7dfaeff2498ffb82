use std::path::PathBuf;
use std::process;

use clap::Args;

use super::{fail, resolve_device_model, select_functions};
use tcl::schedule::{tune_module, TuningDatabase};

#[derive(Args)]
pub struct TuneArgs {
    /// Python-style source file containing the kernel functions
    pub input: PathBuf,
    /// Function to tune (default: every @jit-decorated function)
    #[arg(short, long)]
    pub function: Option<String>,
    /// Accelerator device model (built-in name or .toml path)
    #[arg(long)]
    pub device_model: Option<String>,
    /// Tuning database to update
    #[arg(long, value_name = "PATH", default_value = "tuning.rkyv")]
    pub db: PathBuf,
    /// Launches measured per candidate block size
    #[arg(long, default_value_t = 5)]
    pub repeats: usize,
}

pub fn cmd_tune(args: TuneArgs) {
    let model = resolve_device_model(args.device_model.as_deref());
    let mut db = TuningDatabase::open(&args.db).unwrap_or_else(|e| {
        eprintln!("error: {}", e);
        process::exit(1);
    });

    for selected in select_functions(&args.input, args.function.as_deref()) {
        let module = tcl::lower_source(&selected.text).unwrap_or_else(|e| fail(&e, &args.input, &selected.text));
        let records = tune_module(&module, &model, &mut db, args.repeats)
            .unwrap_or_else(|e| fail(&e, &args.input, &selected.text));
        for (prim, record) in module.prim_funcs.iter().zip(&records) {
            println!(
                "{} {}: {} threads/block, {} ns",
                selected.name, prim.name, record.threads_per_block, record.measured_ns
            );
        }
    }

    if let Err(e) = db.save(&args.db) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
    eprintln!("Tuned {} kernel(s) on {} -> {}", db.len(), model.display_name, args.db.display());
}
