//! Bounded in-memory ring of recent log entries.
//!
//! Error and Warn entries invoke an injected trigger hook — the engine
//! binds it to "advance idle tracking and sync now". The `_no_trigger`
//! variants exist for the sync path itself: a sync-failure log must never
//! enqueue another sync.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use periscope_types::format_utc;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Default ring capacity.
const DEFAULT_CAPACITY: usize = 100;

/// Structured context attached to every log entry.
pub type LogContext = serde_json::Map<String, Value>;

/// Hook invoked on Error/Warn to request an immediate sync.
pub type TriggerHook = Arc<dyn Fn() + Send + Sync>;

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single ring entry.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub context: LogContext,
}

struct Ring {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    trigger: Option<TriggerHook>,
}

/// Tracks recent log messages for the `recent-logs` component.
pub struct RecentLogs {
    ring: Mutex<Ring>,
}

impl RecentLogs {
    /// Creates a ring holding at most `capacity` entries (0 selects the
    /// default of 100). Oldest entries are evicted first.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 { DEFAULT_CAPACITY } else { capacity };
        Self {
            ring: Mutex::new(Ring {
                entries: VecDeque::with_capacity(capacity),
                capacity,
                trigger: None,
            }),
        }
    }

    /// Installs the hook called on Error/Warn.
    pub fn set_trigger_hook(&self, hook: TriggerHook) {
        self.ring.lock().trigger = Some(hook);
    }

    /// Logs an error and fires the trigger hook.
    ///
    /// # Panics
    /// Panics when `context` is not a non-empty JSON object.
    pub fn error(&self, message: &str, context: Value) {
        self.append(LogLevel::Error, message, context);
        self.fire_trigger();
    }

    /// Logs a warning and fires the trigger hook.
    ///
    /// # Panics
    /// Panics when `context` is not a non-empty JSON object.
    pub fn warn(&self, message: &str, context: Value) {
        self.append(LogLevel::Warn, message, context);
        self.fire_trigger();
    }

    /// Logs an info entry.
    ///
    /// # Panics
    /// Panics when `context` is not a non-empty JSON object.
    pub fn info(&self, message: &str, context: Value) {
        self.append(LogLevel::Info, message, context);
    }

    /// Logs a debug entry.
    ///
    /// # Panics
    /// Panics when `context` is not a non-empty JSON object.
    pub fn debug(&self, message: &str, context: Value) {
        self.append(LogLevel::Debug, message, context);
    }

    /// Logs an error WITHOUT firing the trigger hook. For use inside the
    /// sync path, where a triggering log would loop back into sync.
    pub fn error_no_trigger(&self, message: &str, context: Value) {
        self.append(LogLevel::Error, message, context);
    }

    /// Logs a warning WITHOUT firing the trigger hook.
    pub fn warn_no_trigger(&self, message: &str, context: Value) {
        self.append(LogLevel::Warn, message, context);
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.lock().entries.len()
    }

    /// True when no entries are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.lock().entries.is_empty()
    }

    /// Snapshot of the retained entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.ring.lock().entries.iter().cloned().collect()
    }

    /// Ring data for the `recent-logs` component.
    #[must_use]
    pub fn data(&self) -> Value {
        let ring = self.ring.lock();

        let mut errors = 0usize;
        let mut warnings = 0usize;
        let mut infos = 0usize;
        let mut debugs = 0usize;
        let entries: Vec<Value> = ring
            .entries
            .iter()
            .map(|entry| {
                match entry.level {
                    LogLevel::Error => errors += 1,
                    LogLevel::Warn => warnings += 1,
                    LogLevel::Info => infos += 1,
                    LogLevel::Debug => debugs += 1,
                }
                json!({
                    "timestamp": format_utc(entry.timestamp),
                    "level": entry.level.as_str(),
                    "message": entry.message,
                    "context": Value::Object(entry.context.clone()),
                })
            })
            .collect();

        json!({
            "entries": entries,
            "stats": {
                "total_count": ring.entries.len(),
                "errors_count": errors,
                "warnings_count": warnings,
                "info_count": infos,
                "debug_count": debugs,
                "max_entries": ring.capacity,
            },
        })
    }

    fn append(&self, level: LogLevel, message: &str, context: Value) {
        // Empty context is a programming error: the ring exists to carry
        // structured logs, not bare strings.
        let context = match context {
            Value::Object(map) if !map.is_empty() => map,
            _ => panic!("log context must be a non-empty JSON object (use structured logging)"),
        };

        // Mirror to tracing so entries show up in the process log stream,
        // not only at the registrar.
        let rendered = Value::Object(context.clone());
        match level {
            LogLevel::Error => error!("{message} {rendered}"),
            LogLevel::Warn => warn!("{message} {rendered}"),
            LogLevel::Info => info!("{message} {rendered}"),
            LogLevel::Debug => debug!("{message} {rendered}"),
        }

        let mut ring = self.ring.lock();
        if ring.entries.len() == ring.capacity {
            ring.entries.pop_front();
        }
        ring.entries.push_back(LogEntry {
            timestamp: Utc::now(),
            level,
            message: message.to_string(),
            context,
        });
    }

    fn fire_trigger(&self) {
        // Clone out of the lock; the hook reaches into the engine.
        let hook = self.ring.lock().trigger.clone();
        if let Some(hook) = hook {
            hook();
        }
    }
}
