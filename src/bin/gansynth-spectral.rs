//! gansynth-spectral CLI
//!
//! Thin shell over `gansynth_spectral::cli`: parse, run, print.

use clap::Parser;
use gansynth_spectral::cli::{run, Args};

fn main() {
    #[cfg(feature = "tracing")]
    init_tracing();

    let args = Args::parse();
    let verbose = args.verbose;

    match run(args) {
        Ok(result) => {
            print!("{}", result.message);
            if verbose {
                if let Some(ms) = result.elapsed_ms {
                    eprintln!("[INFO] done in {ms:.1} ms");
                }
            }
            if !result.success {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(feature = "tracing")]
fn init_tracing() {
    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}
