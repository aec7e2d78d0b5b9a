pub mod globals;
pub mod helper;
pub mod config;
pub mod modules;

// Re-exports
pub use globals::*;
pub use config::{CONFIG, find_config_file};

/// Initialize logging; `RUST_LOG` still overrides the default level.
pub fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}
