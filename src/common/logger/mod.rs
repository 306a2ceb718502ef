use std::{fs, path::Path};

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub mod formatter;
pub mod writer;

pub use formatter::*;
pub use writer::*;

use crate::configs::LoggingConfig;

/// Builds the `EnvFilter` directive string from the logging section.
/// Noisy HTTP internals are capped at `warn` unless explicitly overridden.
pub fn filter_directives(logging: &LoggingConfig) -> String {
    let level = logging.level.as_deref().unwrap_or("info");
    match logging.filters.as_deref() {
        Some(filters) if !filters.trim().is_empty() => {
            format!("{level},hyper=warn,reqwest=warn,{}", filters.trim())
        }
        _ => format!("{level},hyper=warn,reqwest=warn"),
    }
}

pub fn init(logging: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(logging)));

    let stdout_layer = fmt::layer()
        .event_format(LineFormatter::new(true))
        .with_ansi(true);

    let file_layer = logging.file.as_ref().map(|file| {
        if let Some(parent) = Path::new(&file.path).parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                eprintln!("Failed to create log directory: {}", e);
            }
        }

        fmt::layer()
            .with_writer(CappedFileWriter::new(&file.path, file.max_lines))
            .event_format(LineFormatter::new(false))
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();
}
