//! Clock, id and logging adapters backed by the host.

use crate::ports::{Clock, IdGenerator, Logger};
use chrono::{DateTime, Utc};
use log::{Level, log, log_enabled};
use uuid::Uuid;

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Random v4 UUIDs.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn new_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Bridges the `Logger` port to the `log` facade under the `jaro` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogLogger;

impl LogLogger {
    pub const TARGET: &'static str = "jaro";

    fn emit(level: Level, message: &str, fields: &[(&str, &str)]) {
        if !log_enabled!(target: Self::TARGET, level) {
            return;
        }
        if fields.is_empty() {
            log!(target: Self::TARGET, level, "{message}");
        } else {
            log!(target: Self::TARGET, level, "{message} ({})", format_fields(fields));
        }
    }
}

impl Logger for LogLogger {
    fn info(&self, message: &str, fields: &[(&str, &str)]) {
        Self::emit(Level::Info, message, fields);
    }

    fn warn(&self, message: &str, fields: &[(&str, &str)]) {
        Self::emit(Level::Warn, message, fields);
    }

    fn error(&self, message: &str, fields: &[(&str, &str)]) {
        Self::emit(Level::Error, message, fields);
    }
}

/// `key=value` pairs joined by `, `.
pub fn format_fields(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(", ")
}
