use std::path::PathBuf;

use crate::errors::ConfigError;

/// Default cap on characters per concise-sink field and per log-line field.
pub const DEFAULT_MAX_FIELD_CHARS: usize = 20_000;

const ENV_CONCISE_PATH: &str = "RUNSCRIBE_TRACE_CSV";
const ENV_VERBOSE_PATH: &str = "RUNSCRIBE_TRACE_NDJSON";
const ENV_MAX_FIELD_CHARS: &str = "RUNSCRIBE_TRACE_MAX_CHARS";

/// Configuration for the trace writer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceConfig {
    /// Fixed-column, size-capped CSV trace.
    pub concise_path: PathBuf,
    /// Full-fidelity newline-delimited JSON trace.
    pub verbose_path: PathBuf,
    /// Truncation cap for concise-sink fields and log-line fields.
    pub max_field_chars: usize,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            concise_path: PathBuf::from("traces/run_trace.csv"),
            verbose_path: PathBuf::from("traces/run_trace.ndjson"),
            max_field_chars: DEFAULT_MAX_FIELD_CHARS,
        }
    }
}

impl TraceConfig {
    /// Defaults overlaid with `RUNSCRIBE_TRACE_CSV`, `RUNSCRIBE_TRACE_NDJSON`
    /// and `RUNSCRIBE_TRACE_MAX_CHARS` when set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(path) = lookup(ENV_CONCISE_PATH).filter(|v| !v.trim().is_empty()) {
            config.concise_path = PathBuf::from(path);
        }
        if let Some(path) = lookup(ENV_VERBOSE_PATH).filter(|v| !v.trim().is_empty()) {
            config.verbose_path = PathBuf::from(path);
        }
        if let Some(raw) = lookup(ENV_MAX_FIELD_CHARS) {
            config.max_field_chars =
                raw.trim()
                    .parse::<usize>()
                    .map_err(|e| ConfigError::InvalidEnv {
                        key: ENV_MAX_FIELD_CHARS,
                        message: format!("{raw:?}: {e}"),
                    })?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Overrides the concise (CSV) sink path.
    pub fn concise_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.concise_path = path.into();
        self
    }

    /// Overrides the verbose (NDJSON) sink path.
    pub fn verbose_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.verbose_path = path.into();
        self
    }

    /// Overrides the truncation cap.
    pub fn max_field_chars(mut self, cap: usize) -> Self {
        self.max_field_chars = cap;
        self
    }

    /// Places both sinks under `dir` with their default file names.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self::default()
            .concise_path(dir.join("run_trace.csv"))
            .verbose_path(dir.join("run_trace.ndjson"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_field_chars == 0 {
            return Err(ConfigError::ZeroCap);
        }
        if self.concise_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyPath("concise"));
        }
        if self.verbose_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyPath("verbose"));
        }
        Ok(())
    }
}
