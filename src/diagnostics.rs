//! Process-wide diagnostics for animated images.
//!
//! A single [`LogConfig`] (threshold + sink) may be installed once at startup with
//! [`init`]. Until then every record is forwarded to the `log` facade. The
//! [`anim_log!`](crate::anim_log) macro checks the threshold before any of its
//! format arguments are evaluated.

use crate::error::{AnimError, AnimResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LogLevel {
    None = 0,
    Error,
    Warn,
    Info,
    Debug,
    Verbose,
}

impl LogLevel {
    pub fn as_log_level(self) -> Option<log::Level> {
        match self {
            Self::None => None,
            Self::Error => Some(log::Level::Error),
            Self::Warn => Some(log::Level::Warn),
            Self::Info => Some(log::Level::Info),
            Self::Debug => Some(log::Level::Debug),
            Self::Verbose => Some(log::Level::Trace),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::Verbose => "VERBOSE",
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Error
    }
}

pub type LogSink = Box<dyn Fn(&str, LogLevel) + Send + Sync>;

pub struct LogConfig {
    level: LogLevel,
    sink: LogSink,
}

impl LogConfig {
    /// Config that forwards records at or above `level` to the `log` facade.
    pub fn new(level: LogLevel) -> Self {
        Self {
            level,
            sink: Box::new(forward_to_log),
        }
    }

    pub fn with_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(&str, LogLevel) + Send + Sync + 'static,
    {
        self.sink = Box::new(sink);
        self
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level != LogLevel::None && level <= self.level
    }

    pub fn emit(&self, level: LogLevel, args: fmt::Arguments<'_>) {
        if self.enabled(level) {
            (self.sink)(&fmt::format(args), level);
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new(LogLevel::default())
    }
}

impl fmt::Debug for LogConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogConfig")
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}

static CONFIG: OnceLock<LogConfig> = OnceLock::new();

pub fn init(config: LogConfig) -> AnimResult<()> {
    CONFIG
        .set(config)
        .map_err(|_| AnimError::LoggingAlreadyInitialized)
}

pub fn enabled(level: LogLevel) -> bool {
    match CONFIG.get() {
        Some(config) => config.enabled(level),
        None => level
            .as_log_level()
            .is_some_and(|level| level <= log::max_level()),
    }
}

#[doc(hidden)]
pub fn emit(level: LogLevel, args: fmt::Arguments<'_>) {
    match CONFIG.get() {
        Some(config) => config.emit(level, args),
        None => {
            if let Some(level) = level.as_log_level() {
                log::log!(target: "wk_animated", level, "{}", args);
            }
        }
    }
}

fn forward_to_log(message: &str, level: LogLevel) {
    if let Some(level) = level.as_log_level() {
        log::log!(target: "wk_animated", level, "{}", message);
    }
}

#[macro_export]
macro_rules! anim_log {
    ($level:expr, $($arg:tt)+) => {{
        let level = $level;
        if $crate::diagnostics::enabled(level) {
            $crate::diagnostics::emit(level, format_args!($($arg)+));
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::None < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Verbose);
    }

    #[test]
    fn test_threshold_filters_records() {
        let records = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&records);
        let config = LogConfig::new(LogLevel::Warn).with_sink(move |msg, level| {
            captured.lock().unwrap().push((msg.to_string(), level));
        });

        config.emit(LogLevel::Error, format_args!("frame {} failed", 7));
        config.emit(LogLevel::Info, format_args!("cache grew"));
        config.emit(LogLevel::None, format_args!("never"));

        let records = records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, "frame 7 failed");
        assert_eq!(records[0].1, LogLevel::Error);
    }

    #[test]
    fn test_none_threshold_disables_everything() {
        let config = LogConfig::new(LogLevel::None);
        assert!(!config.enabled(LogLevel::Error));
        assert!(!config.enabled(LogLevel::Verbose));
    }

    #[test]
    fn test_global_init_once_and_lazy_arguments() {
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let captured = Arc::clone(&seen);
        let installed = init(LogConfig::new(LogLevel::Warn).with_sink(move |msg, _| {
            captured.lock().unwrap().push(msg.to_string());
        }));
        assert!(installed.is_ok());
        assert!(matches!(
            init(LogConfig::default()),
            Err(AnimError::LoggingAlreadyInitialized)
        ));

        let evaluations = AtomicUsize::new(0);
        crate::anim_log!(LogLevel::Debug, "{}", {
            evaluations.fetch_add(1, Ordering::SeqCst);
            "debug-marker"
        });
        assert_eq!(evaluations.load(Ordering::SeqCst), 0);

        crate::anim_log!(LogLevel::Warn, "{}", {
            evaluations.fetch_add(1, Ordering::SeqCst);
            "warn-marker"
        });
        assert_eq!(evaluations.load(Ordering::SeqCst), 1);

        let seen = seen.lock().unwrap();
        assert!(seen.iter().any(|m| m == "warn-marker"));
        assert!(!seen.iter().any(|m| m == "debug-marker"));
    }
}
