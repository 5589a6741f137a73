use jaro_rs_config::LoggingConfig;
use log::LevelFilter;

/// Install env_logger at the configured level. `RUST_LOG` still wins.
pub fn init_logging(logging: &LoggingConfig) {
    let _ = env_logger::builder()
        .format_timestamp_millis()
        .filter_level(level_filter(&logging.level))
        .parse_default_env()
        .try_init();
}

/// Unknown levels fall back to `info`.
pub fn level_filter(level: &str) -> LevelFilter {
    level.trim().parse().unwrap_or(LevelFilter::Info)
}
