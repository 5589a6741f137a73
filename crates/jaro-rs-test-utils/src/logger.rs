use jaro_rs_core::Logger;
use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub level: &'static str,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl LogLine {
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

/// Logger that keeps every line for later assertions.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    lines: Mutex<Vec<LogLine>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<LogLine> {
        self.lines.lock().clone()
    }

    /// Lines recorded at `level` ("info", "warn" or "error").
    pub fn at_level(&self, level: &str) -> Vec<LogLine> {
        self.lines
            .lock()
            .iter()
            .filter(|line| line.level == level)
            .cloned()
            .collect()
    }

    pub fn contains(&self, level: &str, message: &str) -> bool {
        self.lines
            .lock()
            .iter()
            .any(|line| line.level == level && line.message == message)
    }

    fn record(&self, level: &'static str, message: &str, fields: &[(&str, &str)]) {
        self.lines.lock().push(LogLine {
            level,
            message: message.to_string(),
            fields: fields
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        });
    }
}

impl Logger for RecordingLogger {
    fn info(&self, message: &str, fields: &[(&str, &str)]) {
        self.record("info", message, fields);
    }

    fn warn(&self, message: &str, fields: &[(&str, &str)]) {
        self.record("warn", message, fields);
    }

    fn error(&self, message: &str, fields: &[(&str, &str)]) {
        self.record("error", message, fields);
    }
}
