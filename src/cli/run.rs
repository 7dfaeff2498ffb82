use std::path::PathBuf;
use std::process;

use clap::Args;

use super::{fail, pick_target, resolve_device_model, select_functions};
use tcl::schedule::TuningDatabase;
use tcl::{jit, Context, FunctionSource, JitOptions, NDArray, Tensor};

#[derive(Args)]
pub struct RunArgs {
    /// Python-style source file containing the kernel functions
    pub input: PathBuf,
    /// Function to run (default: every @jit-decorated function)
    #[arg(short, long)]
    pub function: Option<String>,
    /// Override the decorator's target (cpu or cuda)
    #[arg(long)]
    pub target: Option<String>,
    /// Accelerator device model (built-in name or .toml path)
    #[arg(long)]
    pub device_model: Option<String>,
    /// Value every input element is filled with
    #[arg(long, default_value_t = 1.0)]
    pub fill: f64,
    /// Tuning database consulted by the scheduler
    #[arg(long, value_name = "PATH")]
    pub tuning_db: Option<PathBuf>,
    /// Do not print the AST and IR dumps
    #[arg(short, long)]
    pub quiet: bool,
}

pub fn cmd_run(args: RunArgs) {
    let model = resolve_device_model(args.device_model.as_deref());
    let db = args.tuning_db.as_deref().map(|path| match TuningDatabase::open(path) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    });

    for selected in select_functions(&args.input, args.function.as_deref()) {
        let target = pick_target(args.target.as_deref(), selected.decorated);
        let mut options = JitOptions::default()
            .with_device_model(model.clone())
            .with_dump(!args.quiet);
        if let Some(db) = &db {
            options = options.with_tuning_db(db.clone());
        }
        let f = match jit(target.as_str()) {
            Ok(j) => j.with_options(options),
            Err(e) => fail(&e, &args.input, &selected.text),
        }
        .wrap(FunctionSource::Inline(selected.text.clone()), Context::new());

        let device = f.resolved_target().device;
        let signature = f.signature().unwrap_or_else(|e| fail(&e, &args.input, &selected.text));
        let inputs: Vec<Tensor> = signature
            .iter()
            .map(|(_, desc)| Tensor::from_array(NDArray::full(desc, args.fill, device)))
            .collect();
        let refs: Vec<&Tensor> = inputs.iter().collect();

        eprintln!("Running {} on {}", selected.name, f.resolved_target());
        match f.call(&refs) {
            Ok(result) => println!("{} = {}", selected.name, result),
            Err(e) => fail(&e, &args.input, &selected.text),
        }
    }
}
