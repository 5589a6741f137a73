//! Environment variable overrides.

use crate::{ConfigError, JaroConfig};
use log::debug;
use std::str::FromStr;

/// Apply every recognised variable; returns how many were set.
pub(super) fn apply<F>(config: &mut JaroConfig, lookup: &F) -> Result<usize, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut applied = 0;
    let mut get = |key: &str| -> Option<String> {
        let value = lookup(key).filter(|value| !value.is_empty())?;
        debug!("config override from environment (key={key})");
        applied += 1;
        Some(value)
    };

    if let Some(value) = get("SERVER_PORT") {
        config.server.port = parse_number("SERVER_PORT", &value)?;
    }
    if let Some(value) = get("SERVER_HOST") {
        config.server.host = value;
    }
    if let Some(value) = get("REQUEST_TIMEOUT") {
        config.server.request_timeout_secs = parse_seconds("REQUEST_TIMEOUT", &value)?;
    }
    if let Some(value) = get("IDLE_TIMEOUT") {
        config.server.idle_timeout_secs = parse_seconds("IDLE_TIMEOUT", &value)?;
    }
    if let Some(value) = get("MAX_BODY_SIZE") {
        config.server.max_body_size = parse_number("MAX_BODY_SIZE", &value)?;
    }
    if let Some(value) = get("MAX_FILE_SIZE") {
        config.server.max_file_upload_size = parse_number("MAX_FILE_SIZE", &value)?;
    }
    if let Some(value) = get("ALLOWED_MIMES") {
        config.server.allowed_mime_types = value
            .split(',')
            .map(|mime| mime.trim().to_string())
            .filter(|mime| !mime.is_empty())
            .collect();
    }
    if let Some(value) = get("LOG_LEVEL") {
        config.logging.level = value;
    }
    if let Some(value) = get("ENABLE_METRICS") {
        config.features.enable_metrics = value == "true" || value == "1";
    }
    if let Some(value) = get("OPENAI_API_KEY") {
        config.llm.openai_api_key = Some(value);
    }
    if let Some(value) = get("ANTHROPIC_API_KEY") {
        config.llm.anthropic_api_key = Some(value);
    }
    if let Some(value) = get("DEFAULT_LLM_MODEL") {
        config.llm.default_model = value;
    }
    if let Some(value) = get("LLM_TIMEOUT") {
        config.llm.timeout_secs = parse_seconds("LLM_TIMEOUT", &value)?;
    }
    if let Some(value) = get("LLM_MAX_RETRIES") {
        config.llm.max_retries = parse_number("LLM_MAX_RETRIES", &value)?;
    }
    if let Some(value) = get("MAX_STEP_RETRIES") {
        config.engine.max_step_retries = parse_number("MAX_STEP_RETRIES", &value)?;
    }

    Ok(applied)
}

fn parse_number<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|err| ConfigError::InvalidField {
        path: format!("env:{key}"),
        message: err.to_string(),
    })
}

/// Whole seconds, either bare (`30`) or with an `s`, `m` or `h` suffix.
pub(super) fn parse_seconds(key: &str, value: &str) -> Result<u64, ConfigError> {
    let value = value.trim();
    let (digits, multiplier) = match value.char_indices().last() {
        Some((idx, 's')) => (&value[..idx], 1),
        Some((idx, 'm')) => (&value[..idx], 60),
        Some((idx, 'h')) => (&value[..idx], 3600),
        _ => (value, 1),
    };
    let amount: u64 = parse_number(key, digits)?;
    amount
        .checked_mul(multiplier)
        .ok_or_else(|| ConfigError::InvalidField {
            path: format!("env:{key}"),
            message: "duration overflows".to_string(),
        })
}
