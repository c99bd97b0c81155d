//! Terminal and file logging.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use log::LevelFilter;
use simplelog::{ColorChoice, CombinedLogger, Config, SharedLogger, TermLogger, TerminalMode, WriteLogger};

/// Log `Info` and above to the terminal and everything from `Debug` up to
/// `<output>/log.txt`.
pub fn initialize_logging(output: &Path, verbose: bool) -> Result<()> {
    let log_path = output.join("log.txt");
    let log_file = File::create(&log_path)
        .with_context(|| format!("Failed to create log file {}", log_path.display()))?;
    let term_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let loggers: Vec<Box<dyn SharedLogger>> = vec![
        TermLogger::new(term_level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto),
        WriteLogger::new(LevelFilter::Debug, Config::default(), log_file),
    ];
    CombinedLogger::init(loggers).context("Failed to initialize logging")
}
