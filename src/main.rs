use clap::Parser;
use fileflow::cli::{Cli, run_cli};
use fileflow::output::OutputFormatter;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise -v raises fileflow's own level.
    let default_filter = match cli.verbose {
        0 => "warn",
        1 => "warn,fileflow=info",
        _ => "warn,fileflow=debug",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    if let Err(e) = run_cli(cli) {
        OutputFormatter::error(&e);
        std::process::exit(1);
    }
}
