use std::process::ExitCode;

use tallyline_core::config::{AppConfig, LoadOptions, LoggingConfig};

fn init_logging(config: &LoggingConfig) {
    use tallyline_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    // stdout carries the JSON command payload
    match config.format {
        Compact => builder.compact().init(),
        Pretty => builder.pretty().init(),
        Json => builder.json().init(),
    }
}

fn main() -> ExitCode {
    // An invalid config is reported by the command itself as a structured failure.
    if let Ok(config) = AppConfig::load(LoadOptions::default()) {
        init_logging(&config.logging);
    }

    tallyline_cli::run()
}
