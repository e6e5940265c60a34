//! Configuration options enumerated in spec §6, all immutable after
//! start. Mirrors the teacher's per-field `#[serde(default = "...")]`
//! pattern (`handlers/benchmark.rs::BenchmarkConfig`), generalized to
//! the full option set, and loadable from a TOML file.

use crate::types::{Category, WindowDef};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_bucket_width_seconds")]
    pub bucket_width_seconds: i64,

    #[serde(default = "default_windows")]
    pub windows: Vec<WindowDef>,

    #[serde(default)]
    pub categories: Vec<String>,

    #[serde(default = "default_k")]
    pub k: usize,

    #[serde(default = "default_refresh_interval_seconds")]
    pub refresh_interval_seconds: f64,

    /// `None` means "default to window_max", resolved in `validate`.
    #[serde(default)]
    pub max_event_skew_seconds: Option<i64>,

    #[serde(default = "default_small_future_seconds")]
    pub small_future_seconds: i64,

    #[serde(default = "default_ingest_queue_capacity")]
    pub ingest_queue_capacity: usize,

    #[serde(default = "default_subscriber_mailbox_capacity")]
    pub subscriber_mailbox_capacity: usize,

    /// `None` means "default to window_max + grace".
    #[serde(default)]
    pub idempotency_ttl_seconds: Option<i64>,

    #[serde(default = "default_snapshot_persist_every_n_ticks")]
    pub snapshot_persist_every_n_ticks: u32,

    #[serde(default = "default_snapshot_retention_generations")]
    pub snapshot_retention_generations: u32,

    /// Grace period added past `window_max` before a bucket or an
    /// idempotency entry is evicted (spec §3 I2, §4.3).
    #[serde(default = "default_grace_seconds")]
    pub grace_seconds: i64,
}

fn default_bucket_width_seconds() -> i64 {
    60
}
fn default_windows() -> Vec<WindowDef> {
    vec![WindowDef {
        name: "1h".into(),
        duration_secs: 3600,
    }]
}
fn default_k() -> usize {
    100
}
fn default_refresh_interval_seconds() -> f64 {
    2.0
}
fn default_small_future_seconds() -> i64 {
    5
}
fn default_ingest_queue_capacity() -> usize {
    10_000
}
fn default_subscriber_mailbox_capacity() -> usize {
    256
}
fn default_snapshot_persist_every_n_ticks() -> u32 {
    1
}
fn default_snapshot_retention_generations() -> u32 {
    100
}
fn default_grace_seconds() -> i64 {
    60
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            bucket_width_seconds: default_bucket_width_seconds(),
            windows: default_windows(),
            categories: Vec::new(),
            k: default_k(),
            refresh_interval_seconds: default_refresh_interval_seconds(),
            max_event_skew_seconds: None,
            small_future_seconds: default_small_future_seconds(),
            ingest_queue_capacity: default_ingest_queue_capacity(),
            subscriber_mailbox_capacity: default_subscriber_mailbox_capacity(),
            idempotency_ttl_seconds: None,
            snapshot_persist_every_n_ticks: default_snapshot_persist_every_n_ticks(),
            snapshot_retention_generations: default_snapshot_retention_generations(),
            grace_seconds: default_grace_seconds(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&contents)?)
    }

    /// Longest configured window, in seconds. Used as the default for
    /// `max_event_skew_seconds` and the basis for idempotency TTL.
    pub fn window_max_seconds(&self) -> i64 {
        self.windows
            .iter()
            .map(|w| w.duration_secs)
            .max()
            .unwrap_or(0)
    }

    pub fn effective_max_event_skew_seconds(&self) -> i64 {
        self.max_event_skew_seconds
            .unwrap_or_else(|| self.window_max_seconds())
    }

    pub fn effective_idempotency_ttl_seconds(&self) -> i64 {
        self.idempotency_ttl_seconds
            .unwrap_or_else(|| self.window_max_seconds() + self.grace_seconds)
    }

    /// The full category set, including the always-present `ALL`.
    pub fn all_categories(&self) -> Vec<Category> {
        let mut out: Vec<Category> = self.categories.iter().map(|c| Category(c.clone())).collect();
        if !out.iter().any(|c| c.is_all()) {
            out.push(Category::all());
        }
        out
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.bucket_width_seconds <= 0 {
            return Err("bucket_width_seconds must be positive".into());
        }
        if self.windows.is_empty() {
            return Err("at least one window must be configured".into());
        }
        for w in &self.windows {
            if w.duration_secs <= 0 {
                return Err(format!("window {} has non-positive duration", w.name));
            }
        }
        if self.k == 0 {
            return Err("k must be positive".into());
        }
        if self.refresh_interval_seconds <= 0.0 {
            return Err("refresh_interval_seconds must be positive".into());
        }
        if self.categories.iter().any(|c| c == Category::ALL_NAME) {
            return Err("ALL is implicit and must not be listed explicitly".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        let cfg = EngineConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.window_max_seconds(), 3600);
        assert_eq!(cfg.effective_max_event_skew_seconds(), 3600);
        assert_eq!(cfg.effective_idempotency_ttl_seconds(), 3660);
    }

    #[test]
    fn all_categories_always_includes_all() {
        let mut cfg = EngineConfig::default();
        cfg.categories = vec!["music".into(), "gaming".into()];
        let cats = cfg.all_categories();
        assert!(cats.iter().any(|c| c.is_all()));
        assert_eq!(cats.len(), 3);
    }

    #[test]
    fn parses_from_toml() {
        let toml_str = r#"
            bucket_width_seconds = 30
            k = 10

            [[windows]]
            name = "5m"
            duration_secs = 300
        "#;
        let cfg = EngineConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(cfg.bucket_width_seconds, 30);
        assert_eq!(cfg.k, 10);
        assert_eq!(cfg.windows[0].name, "5m");
    }

    #[test]
    fn rejects_explicit_all_category() {
        let mut cfg = EngineConfig::default();
        cfg.categories = vec!["ALL".into()];
        assert!(cfg.validate().is_err());
    }
}
