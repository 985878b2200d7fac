//! Application-level configuration loading: group labels, sync mode, retry policy and the
//! defaults shown when the store is empty or unreachable.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::{
    dao::{
        document_store::RawDocument,
        models::{DEFAULT_TEAM_GLYPH, DocumentModel},
    },
    sync::{CollectionDefaults, RetryPolicy, SyncSettings},
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "GAMEON_BACK_CONFIG_PATH";

/// How the server keeps its in-memory state in step with the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Load once per (re)connection; edits are written key by key.
    OneShot,
    /// Like [`SyncMode::OneShot`], but team edits rewrite the whole groups snapshot.
    BulkRewrite,
    /// Load, then follow remote changes continuously.
    #[default]
    Live,
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    group_labels: Vec<String>,
    default_glyph: String,
    sync_mode: SyncMode,
    retry: RetryPolicy,
    defaults: CollectionDefaults,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        groups = app_config.group_labels.len(),
                        mode = ?app_config.sync_mode,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a configuration document.
    pub fn from_json(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Group labels always shown, in display order.
    pub fn group_labels(&self) -> &[String] {
        &self.group_labels
    }

    /// Glyph given to newly registered teams.
    pub fn default_glyph(&self) -> &str {
        &self.default_glyph
    }

    /// Selected sync mode.
    pub fn sync_mode(&self) -> SyncMode {
        self.sync_mode
    }

    /// Fallback contents for each collection.
    pub fn defaults(&self) -> &CollectionDefaults {
        &self.defaults
    }

    /// Settings for the sync engine.
    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            retry: self.retry,
            group_labels: self.group_labels.clone(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    group_labels: Option<Vec<String>>,
    default_glyph: Option<String>,
    sync_mode: SyncMode,
    retry: RawRetry,
    defaults: RawDefaults,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawRetry {
    max_attempts: u32,
    initial_delay_ms: u64,
    max_delay_ms: u64,
    call_timeout_ms: u64,
}

impl Default for RawRetry {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_delay_ms: policy.initial_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
            call_timeout_ms: policy.call_timeout.as_millis() as u64,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawDefaults {
    groups: IndexMap<String, Vec<RawEntity>>,
    fixtures: Vec<RawEntity>,
    results: Vec<RawEntity>,
}

/// Default entity written in the same shape as a stored document, plus its key.
#[derive(Debug, Deserialize)]
struct RawEntity {
    key: String,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl RawEntity {
    fn decode<E: DocumentModel>(self) -> E {
        E::from_document(RawDocument {
            key: self.key,
            fields: self.fields,
        })
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let group_labels = value
            .group_labels
            .filter(|labels| !labels.is_empty())
            .unwrap_or_else(default_group_labels);
        let default_glyph = value
            .default_glyph
            .filter(|glyph| !glyph.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TEAM_GLYPH.to_string());

        let retry = RetryPolicy {
            max_attempts: value.retry.max_attempts.max(1),
            initial_delay: Duration::from_millis(value.retry.initial_delay_ms),
            max_delay: Duration::from_millis(value.retry.max_delay_ms),
            call_timeout: Duration::from_millis(value.retry.call_timeout_ms),
        };

        let RawDefaults {
            groups,
            fixtures,
            results,
        } = value.defaults;
        let defaults = CollectionDefaults {
            groups: groups
                .into_iter()
                .map(|(label, teams)| (label, teams.into_iter().map(RawEntity::decode).collect()))
                .collect(),
            fixtures: fixtures.into_iter().map(RawEntity::decode).collect(),
            results: results.into_iter().map(RawEntity::decode).collect(),
        };

        Self {
            group_labels,
            default_glyph,
            sync_mode: value.sync_mode,
            retry,
            defaults,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn default_group_labels() -> Vec<String> {
    ["A", "B", "C"].into_iter().map(String::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_builtin_defaults() {
        let config = AppConfig::from_json("{}").unwrap();

        assert_eq!(config.group_labels(), ["A", "B", "C"]);
        assert_eq!(config.default_glyph(), DEFAULT_TEAM_GLYPH);
        assert_eq!(config.sync_mode(), SyncMode::Live);
        assert_eq!(config.sync_settings().retry, RetryPolicy::default());
        assert_eq!(config.defaults(), &CollectionDefaults::default());
    }

    #[test]
    fn parses_every_setting() {
        let config = AppConfig::from_json(
            r#"{
                "groupLabels": ["North", "South"],
                "defaultGlyph": "🏆",
                "syncMode": "bulk_rewrite",
                "retry": {"maxAttempts": 0, "initialDelayMs": 10, "maxDelayMs": 80, "callTimeoutMs": 500},
                "defaults": {
                    "groups": {"North": [{"key": "t1", "name": "Alpha", "points": "3"}]},
                    "fixtures": [{"key": "f1", "match": "Alpha vs Beta", "date": "2025-06-01"}],
                    "results": [{"key": "r1", "home": "Alpha", "away": "Beta", "homeScore": 2}]
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.group_labels(), ["North", "South"]);
        assert_eq!(config.default_glyph(), "🏆");
        assert_eq!(config.sync_mode(), SyncMode::BulkRewrite);

        let retry = config.sync_settings().retry;
        assert_eq!(retry.max_attempts, 1);
        assert_eq!(retry.max_delay, Duration::from_millis(80));

        let team = &config.defaults().groups["North"][0];
        assert_eq!(team.key, "t1");
        assert_eq!(team.points, 3);
        assert_eq!(config.defaults().fixtures[0].label, "Alpha vs Beta");
        assert_eq!(config.defaults().results[0].home_score, 2);
    }

    #[test]
    fn unknown_sync_mode_is_an_error() {
        assert!(AppConfig::from_json(r#"{"syncMode": "sometimes"}"#).is_err());
    }
}
