use std::env;
use std::sync::Arc;

use console::style;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use orbit_cli::{GlobalArgs, TerminalSink};

fn main() {
    let argv: Vec<String> = env::args().collect();
    let globals = GlobalArgs::from_argv(&argv).unwrap_or_else(|err| err.exit());

    init_tracing(globals.debug);

    if let Err(err) = orbit_cli::run(&globals, &argv, Arc::new(TerminalSink::new())) {
        if let Some(clap_err) = err.downcast_ref::<clap::Error>() {
            clap_err.exit();
        }
        eprintln!("{} {:#}", style("Error:").red().bold(), err);
        std::process::exit(1);
    }
}

/// `RUST_LOG` drives the filter; `--debug` forces debug output for orbit.
fn init_tracing(debug: bool) {
    let filter = if debug {
        println!(
            "{} Debug mode is verbose and {} slow down the program as well as clogging down your stdout.",
            style("WARNING!").magenta(),
            style("will").bold()
        );
        EnvFilter::from_default_env().add_directive(
            "orbit=debug"
                .parse()
                .unwrap_or_else(|_| LevelFilter::DEBUG.into()),
        )
    } else {
        EnvFilter::from_default_env()
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
