mod cli;

use clap::{Parser, Subcommand};

use cli::dump::{cmd_dump, DumpArgs};
use cli::emit::{cmd_emit, EmitArgs};
use cli::run::{cmd_run, RunArgs};
use cli::targets::cmd_targets;
use cli::tune::{cmd_tune, TuneArgs};

#[derive(Parser)]
#[command(
    name = "tcl",
    version,
    about = "Tensor JIT: compile straight-line tensor functions for cpu or cuda"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile and run kernel functions on inputs filled with one value
    Run(RunArgs),
    /// Print the AST and the optimized IR module
    Dump(DumpArgs),
    /// Print generated kernel source for a target
    Emit(EmitArgs),
    /// Measure block sizes and record the best in a tuning database
    Tune(TuneArgs),
    /// List targets and built-in device models
    Targets,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => cmd_run(args),
        Command::Dump(args) => cmd_dump(args),
        Command::Emit(args) => cmd_emit(args),
        Command::Tune(args) => cmd_tune(args),
        Command::Targets => cmd_targets(),
    }
}
