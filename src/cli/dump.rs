use std::path::PathBuf;

use clap::Args;

use super::{fail, select_functions};

#[derive(Args)]
pub struct DumpArgs {
    /// Python-style source file containing the kernel functions
    pub input: PathBuf,
    /// Function to dump (default: every @jit-decorated function)
    #[arg(short, long)]
    pub function: Option<String>,
    /// Print the structural AST dump too
    #[arg(long)]
    pub ast: bool,
    /// Stop before the optimization pipeline
    #[arg(long)]
    pub raw: bool,
}

pub fn cmd_dump(args: DumpArgs) {
    for selected in select_functions(&args.input, args.function.as_deref()) {
        let tree = tcl::syntax::parse(&selected.text).unwrap_or_else(|e| fail(&e, &args.input, &selected.text));
        if args.ast {
            println!("{}", tcl::ast::dump(&tree));
        }
        let module = if args.raw {
            tcl::ir::GraphBuilder::new(&tcl::Context::new()).build(&tree)
        } else {
            tcl::lower_source(&selected.text)
        };
        match module {
            Ok(module) => println!("{}", module),
            Err(e) => fail(&e, &args.input, &selected.text),
        }
    }
}
