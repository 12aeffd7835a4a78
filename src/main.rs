use std::process::ExitCode;
use std::sync::Once;

use colored::Colorize;
use outputify::cli::CommandLineInterface;

static TRACING_INIT: Once = Once::new();

/// `OUTPUTIFY_LOG`, then `RUST_LOG`, else warnings only.
fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::prelude::*;
        use tracing_subscriber::{EnvFilter, fmt};

        let filter = EnvFilter::try_from_env("OUTPUTIFY_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("warn"));

        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true).with_level(true))
            .with(filter)
            .init();
    });
}

fn main() -> ExitCode {
    init_tracing();
    let command_line_interface = CommandLineInterface::load();
    match command_line_interface.run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}
