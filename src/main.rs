//! Binary entry point: installs a panic hook, initializes tracing, parses
//! arguments, and dispatches to the matching `cli::commands` function,
//! mapping any error to a non-zero exit code.

use clap::Parser;
use flowgraph::cli::{Cli, Command};
use flowgraph::observability::init_tracing;

fn main() {
    std::panic::set_hook(Box::new(|info| {
        tracing::error!(%info, "flowgraph panicked");
        eprintln!("flowgraph: internal error: {info}");
    }));

    init_tracing();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("flowgraph: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Analyze {
            file,
            config,
            format,
            graph,
            only,
        } => {
            let output = flowgraph::cli::commands::run_analyze(&file, config, format, graph, only)?;
            print!("{output}");
            Ok(())
        }
    }
}
