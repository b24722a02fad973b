//! Logger setup for the binaries

use env_logger::{Builder, Env};
use log::LevelFilter;

/// Targets that are too chatty at info level
const NOISY_TARGETS: &[&str] = &["actix_server", "actix_web::middleware::logger", "mio"];

/// Install `env_logger` at `level` unless `RUST_LOG` says otherwise.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging(level: &str) {
    let mut builder = Builder::from_env(Env::default().default_filter_or(level));
    if std::env::var_os("RUST_LOG").is_none() {
        let cap = parse_level(level).min(LevelFilter::Warn);
        for target in NOISY_TARGETS {
            builder.filter_module(target, cap);
        }
    }
    let _ = builder.format_timestamp_millis().try_init();
}

/// Parse a level name, defaulting to `Info`
pub fn parse_level(level: &str) -> LevelFilter {
    level.parse().unwrap_or(LevelFilter::Info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), LevelFilter::Debug);
        assert_eq!(parse_level("WARN"), LevelFilter::Warn);
        assert_eq!(parse_level("loud"), LevelFilter::Info);
    }

    #[test]
    fn test_init_twice() {
        init_logging("info");
        init_logging("debug");
        log::info!("logger initialized");
    }
}
