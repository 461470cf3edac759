//! Structured Logging with Sensitive Data Redaction
//!
//! Lines go to stderr as `[timestamp] LEVEL [module] message | k=v ...`.
//! Debug lines are dropped unless `enable_debug` was called (the CLI's
//! `--debug` flag). Field values are masked according to their key:
//! signing secrets never appear, hashes and addresses are shortened.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

pub fn enable_debug() {
    DEBUG_ENABLED.store(true, Ordering::SeqCst);
}

pub fn is_debug_enabled() -> bool {
    DEBUG_ENABLED.load(Ordering::SeqCst)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn label(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How a field value is shown, picked from its key name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Masking {
    Hidden,
    Hash,
    Address,
    Plain,
}

const MASKING_RULES: &[(&str, Masking)] = &[
    ("secret", Masking::Hidden),
    ("private", Masking::Hidden),
    ("pin", Masking::Hidden),
    ("passphrase", Masking::Hidden),
    ("wif", Masking::Hidden),
    ("encryption_key", Masking::Hidden),
    ("plaintext", Masking::Hidden),
    ("txid", Masking::Hash),
    ("digest", Masking::Hash),
    ("reference_id", Masking::Hash),
    ("address", Masking::Address),
];

/// Rules match whole `_`-separated segments, so `pin` hides `user_pin`
/// but not `spending_address`.
fn masking_for(key: &str) -> Masking {
    let key = format!("_{}_", key.to_ascii_lowercase());
    MASKING_RULES
        .iter()
        .find(|(needle, _)| key.contains(&format!("_{}_", needle)))
        .map_or(Masking::Plain, |(_, masking)| *masking)
}

fn mask(masking: Masking, value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        return "[EMPTY]".to_string();
    }
    match masking {
        Masking::Plain => value.to_string(),
        Masking::Hidden => format!("[REDACTED:{}chars]", value.chars().count()),
        Masking::Hash => abbreviate(value, 10, 6),
        Masking::Address => abbreviate(value, 6, 4),
    }
}

/// Keep `head` and `tail` characters of long ASCII values
fn abbreviate(value: &str, head: usize, tail: usize) -> String {
    if !value.is_ascii() || value.len() <= head + tail + 3 {
        return value.to_string();
    }
    format!("{}...{}", &value[..head], &value[value.len() - tail..])
}

/// One log line under construction
#[derive(Debug)]
pub struct LogEntry {
    pub level: LogLevel,
    pub module: &'static str,
    pub message: String,
    pub fields: Vec<(&'static str, String)>,
}

impl LogEntry {
    pub fn new(level: LogLevel, module: &'static str, message: impl Into<String>) -> Self {
        Self {
            level,
            module,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        let shown = mask(masking_for(key), &value.to_string());
        self.fields.push((key, shown));
        self
    }

    pub fn render(&self) -> String {
        let mut line = format!("{} [{}] {}", self.level, self.module, self.message);
        for (i, (key, value)) in self.fields.iter().enumerate() {
            line.push_str(if i == 0 { " | " } else { " " });
            line.push_str(key);
            line.push('=');
            line.push_str(value);
        }
        line
    }

    pub fn emit(self) {
        if self.level == LogLevel::Debug && !is_debug_enabled() {
            return;
        }
        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ");
        eprintln!("[{}] {}", timestamp, self.render());
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_at {
    ($level:ident, $module:expr, $msg:expr $(, $key:ident = $value:expr)* $(,)?) => {
        $crate::utils::logging::LogEntry::new($crate::utils::logging::LogLevel::$level, $module, $msg)
            $(.field(stringify!($key), &$value))*
            .emit()
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($args:tt)*) => { $crate::__log_at!(Debug, $($args)*) };
}

#[macro_export]
macro_rules! log_info {
    ($($args:tt)*) => { $crate::__log_at!(Info, $($args)*) };
}

#[macro_export]
macro_rules! log_warn {
    ($($args:tt)*) => { $crate::__log_at!(Warn, $($args)*) };
}

#[macro_export]
macro_rules! log_error {
    ($($args:tt)*) => { $crate::__log_at!(Error, $($args)*) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_fields_are_hidden() {
        let entry = LogEntry::new(LogLevel::Info, "test", "msg")
            .field("pin", "123456")
            .field("passphrase_hex", "deadbeeffeedface");
        let rendered = entry.render();
        assert!(!rendered.contains("123456"));
        assert!(!rendered.contains("deadbeef"));
        assert!(rendered.contains("pin=[REDACTED:6chars]"));
    }

    #[test]
    fn test_txid_is_shortened() {
        let txid = "2464c6122378ee5ed9a42d5192e15713b107924d05d15b58254eb7b2030118c7";
        assert_eq!(mask(masking_for("unsigned_txid"), txid), "2464c61223...0118c7");
    }

    #[test]
    fn test_address_is_shortened() {
        let addr = "tltc1qk2erszs7fp407kh94e6v3yhfq2njczjvg4hnz6";
        assert_eq!(mask(masking_for("address"), addr), "tltc1q...hnz6");
        assert_eq!(mask(masking_for("address"), "short"), "short");
    }

    #[test]
    fn test_rules_match_whole_segments() {
        assert_eq!(masking_for("pin"), Masking::Hidden);
        assert_eq!(masking_for("user_pin"), Masking::Hidden);
        assert_eq!(masking_for("PIN_hex"), Masking::Hidden);
        assert_eq!(masking_for("spending_address"), Masking::Address);
        assert_eq!(masking_for("expected_txid"), Masking::Hash);
        assert_eq!(masking_for("shipping"), Masking::Plain);

        let rendered = LogEntry::new(LogLevel::Info, "signing", "input")
            .field("spending_address", "QPZMy7ivpYdkJRLhtTx7tj5Fa4doQ2auWk")
            .render();
        assert_eq!(rendered, "INFO [signing] input | spending_address=QPZMy7...auWk");
    }

    #[test]
    fn test_empty_values() {
        assert_eq!(mask(Masking::Hidden, ""), "[EMPTY]");
        assert_eq!(mask(Masking::Plain, "  "), "[EMPTY]");
    }

    #[test]
    fn test_plain_fields_pass_through() {
        let entry = LogEntry::new(LogLevel::Debug, "signing", "round")
            .field("inputs", 3)
            .field("network", "LTCTEST");
        assert_eq!(entry.render(), "DEBUG [signing] round | inputs=3 network=LTCTEST");
        assert_eq!(LogEntry::new(LogLevel::Warn, "api", "retry").render(), "WARN [api] retry");
    }
}
