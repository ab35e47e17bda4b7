//! CLI module for gansynth-spectral
//!
//! All logic lives here so it can be tested; the binary
//! (`src/bin/gansynth-spectral.rs`) only parses arguments and calls [`run`].
//!
//! ```text
//! src/cli/
//! ├── mod.rs       # module exports
//! ├── args.rs      # argument parsing with clap
//! ├── commands.rs  # command implementations
//! └── output.rs    # text / JSON reports
//! ```

pub mod args;
pub mod commands;
pub mod output;

pub use args::{Args, Command};
pub use commands::{run, CliError, CliResult, CommandResult};
pub use output::Report;
