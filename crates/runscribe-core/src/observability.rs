use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

const DEFAULT_JSON_LOG_FILE: &str = "runscribe.logs.jsonl";

/// Operator log settings resolved from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LogSettings {
    enabled: bool,
    /// `RUNSCRIBE_LOG_LEVEL` directive; `RUST_LOG` then `info` apply when unset or invalid.
    level: Option<String>,
    json_path: Option<PathBuf>,
}

impl LogSettings {
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            enabled: lookup("RUNSCRIBE_OBSERVABILITY_ENABLED")
                .map(|v| parse_bool_env(&v).unwrap_or(true))
                .unwrap_or(true),
            level: lookup("RUNSCRIBE_LOG_LEVEL").filter(|v| !v.trim().is_empty()),
            json_path: lookup("RUNSCRIBE_JSON_LOG_PATH")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    fn env_filter(&self) -> EnvFilter {
        self.level
            .as_deref()
            .and_then(|level| EnvFilter::try_new(level).ok())
            .or_else(|| EnvFilter::try_from_default_env().ok())
            .unwrap_or_else(|| EnvFilter::new("info"))
    }
}

fn parse_bool_env(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

/// Splits a log path into the directory and file name `tracing-appender` expects.
fn split_log_path(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_JSON_LOG_FILE)
        .to_string();
    (dir, file_name)
}

/// Initialize operator logging once per process.
///
/// Environment variables:
/// - `RUNSCRIBE_OBSERVABILITY_ENABLED`: optional enable/disable flag (default enabled).
/// - `RUNSCRIBE_LOG_LEVEL`: optional level/filter override, ahead of `RUST_LOG`.
/// - `RUNSCRIBE_JSON_LOG_PATH`: JSONL log file. When unset, compact console
///   output goes to stderr so stdout stays free for the answer.
pub fn init_observability() {
    INIT.get_or_init(|| {
        let settings = LogSettings::from_lookup(|key| std::env::var(key).ok());
        if !settings.enabled {
            return;
        }

        let json_layer = settings.json_path.as_deref().map(|path| {
            let (dir, file_name) = split_log_path(path);
            let _ = std::fs::create_dir_all(&dir);
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_target(false)
                .with_writer(tracing_appender::rolling::never(dir, file_name))
        });
        let console_layer = settings.json_path.is_none().then(|| {
            tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr)
        });

        let _ = tracing_subscriber::registry()
            .with(settings.env_filter())
            .with(json_layer)
            .with(console_layer)
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(vars: &[(&str, &str)]) -> LogSettings {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LogSettings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn bool_flags_accept_common_spellings() {
        for on in ["1", "true", " YES ", "on", "enabled"] {
            assert_eq!(parse_bool_env(on), Some(true), "{on}");
        }
        for off in ["0", "False", "no", "off", "disabled"] {
            assert_eq!(parse_bool_env(off), Some(false), "{off}");
        }
        assert_eq!(parse_bool_env("maybe"), None);
    }

    #[test]
    fn defaults_enable_console_logging() {
        let defaults = settings(&[]);
        assert!(defaults.enabled);
        assert_eq!(defaults.level, None);
        assert_eq!(defaults.json_path, None);
    }

    #[test]
    fn unrecognized_flag_keeps_logging_on() {
        assert!(!settings(&[("RUNSCRIBE_OBSERVABILITY_ENABLED", "off")]).enabled);
        assert!(settings(&[("RUNSCRIBE_OBSERVABILITY_ENABLED", "sometimes")]).enabled);
    }

    #[test]
    fn json_path_splits_into_dir_and_file() {
        let s = settings(&[("RUNSCRIBE_JSON_LOG_PATH", "logs/run.jsonl"), ("RUNSCRIBE_LOG_LEVEL", "debug")]);
        assert_eq!(s.level.as_deref(), Some("debug"));
        let (dir, file) = split_log_path(s.json_path.as_deref().unwrap());
        assert_eq!(dir, PathBuf::from("logs"));
        assert_eq!(file, "run.jsonl");
        assert_eq!(split_log_path(Path::new("run.jsonl")).0, PathBuf::from("."));
    }

    #[test]
    fn init_is_idempotent() {
        init_observability();
        init_observability();
        tracing::info!(event = "observability.test", domain = "test");
    }
}
