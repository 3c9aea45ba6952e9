mod cli;
mod commands;

use std::path::Path;
use std::process::ExitCode;

use palaver_config::PalaverConfig;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_DIRECTIVE: &str = "palaver=info";

fn init_logging(directive: &str) {
    let filter = match directive.parse() {
        Ok(directive) => EnvFilter::from_default_env().add_directive(directive),
        Err(_) => EnvFilter::new(DEFAULT_LOG_DIRECTIVE),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args = cli::parse();

    // Config is read before logging so its level can seed the filter.
    let loaded = match args.config.as_deref() {
        Some(path) => palaver_config::load_config_from(Path::new(path)),
        None => palaver_config::load_config(),
    };
    let directive = args
        .log_level
        .clone()
        .or_else(|| {
            loaded
                .as_ref()
                .ok()
                .map(|c| c.logging.level.directive().to_string())
        })
        .unwrap_or_else(|| DEFAULT_LOG_DIRECTIVE.to_string());
    init_logging(&directive);

    tracing::debug!("palaver v{} starting", env!("CARGO_PKG_VERSION"));
    if let Some(ref path) = args.config {
        tracing::info!("Using config override: {path}");
    }
    let config = loaded.unwrap_or_else(|e| {
        tracing::warn!("Config load failed, using defaults: {e}");
        PalaverConfig::default()
    });

    match commands::run(&args.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
