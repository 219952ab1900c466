//! Configuration.
//!
//! [`RouterConfig`] sizes the worker pools and queues and selects the
//! dispatch behaviour. [`EngineConfig`] is the TOML document read by the
//! `vigil` binary: logging, router settings, the decoder, policies and the
//! entries to register at startup.
//!
//! ```toml
//! decoder = "wazuh"
//!
//! [logging]
//! level = "info"
//!
//! [router]
//! workers = 4
//! dispatch = "first_match"
//! no_match = { action = "route", entry = "catch-all" }
//! default_test_lifetime = "10m"
//!
//! [[policies]]
//! name = "tag"
//! stages = [{ name = "mark", kind = "set", params = { field = "/tag", value = "seen" } }]
//!
//! [[entries]]
//! name = "catch-all"
//! policy = "tag"
//! priority = 1000
//! filter = { type = "all" }
//! ```

use crate::entry::{EntryPost, MAX_PRIORITY, MIN_PRIORITY, TestEntryPost};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use thiserror::Error;
use vigil_core::{Decoder, Policy};
use vigil_std::{JsonDecoder, WazuhDecoder, decoder::DEFAULT_SUBJECT_POINTER};

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Io {
        /// Path of the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for [`EngineConfig`].
    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Router
// ============================================================================

/// How many entries receive an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Only the highest-priority matching entry.
    #[default]
    FirstMatch,
    /// Every matching entry, each with its own copy, in priority order.
    Broadcast,
}

/// What happens to an event no entry matches.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum NoMatchPolicy {
    /// Drop the event, counting and logging it.
    #[default]
    Drop,
    /// Hand the event to a named production entry.
    Route {
        /// Name of the fallback entry.
        entry: String,
    },
}

/// Router sizing and dispatch settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouterConfig {
    /// Production worker threads.
    pub workers: usize,
    /// Test worker threads.
    pub test_workers: usize,
    /// Capacity of the production event queue.
    pub queue_capacity: usize,
    /// Capacity of the test request queue.
    pub test_queue_capacity: usize,
    /// Dispatch behaviour.
    pub dispatch: DispatchMode,
    /// No-match behaviour.
    pub no_match: NoMatchPolicy,
    /// Lifetime given to test entries posted without one.
    #[serde(with = "humantime_serde")]
    pub default_test_lifetime: Option<Duration>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            test_workers: 1,
            queue_capacity: 8192,
            test_queue_capacity: 1024,
            dispatch: DispatchMode::FirstMatch,
            no_match: NoMatchPolicy::Drop,
            default_test_lifetime: None,
        }
    }
}

impl RouterConfig {
    /// Set the number of production workers.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the number of test workers.
    pub fn with_test_workers(mut self, workers: usize) -> Self {
        self.test_workers = workers;
        self
    }

    /// Set both queue capacities.
    pub fn with_capacities(mut self, events: usize, tests: usize) -> Self {
        self.queue_capacity = events;
        self.test_queue_capacity = tests;
        self
    }

    /// Set the dispatch mode.
    pub fn with_dispatch(mut self, dispatch: DispatchMode) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Set the no-match policy.
    pub fn with_no_match(mut self, no_match: NoMatchPolicy) -> Self {
        self.no_match = no_match;
        self
    }

    /// Set the default test entry lifetime.
    pub fn with_default_test_lifetime(mut self, lifetime: Duration) -> Self {
        self.default_test_lifetime = Some(lifetime);
        self
    }

    /// Check that pools and queues are non-empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("workers", self.workers),
            ("test_workers", self.test_workers),
            ("queue_capacity", self.queue_capacity),
            ("test_queue_capacity", self.test_queue_capacity),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("router.{key} must be at least 1")));
            }
        }
        if let NoMatchPolicy::Route { entry } = &self.no_match {
            if entry.is_empty() {
                return Err(ConfigError::Invalid(
                    "router.no_match.entry must not be empty".into(),
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// An `EnvFilter` directive such as `info` or `vigil=debug`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
        }
    }
}

/// Which decoder turns raw lines into events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecoderKind {
    /// `<queue>:<location>:<message>` lines.
    #[default]
    Wazuh,
    /// One JSON object per line.
    Json,
}

/// The full engine configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Router settings.
    pub router: RouterConfig,
    /// Raw event decoder.
    pub decoder: DecoderKind,
    /// JSON pointer of the subject for the JSON decoder.
    pub subject_pointer: Option<String>,
    /// Policies loaded into the store.
    pub policies: Vec<Policy>,
    /// Production entries registered at startup.
    pub entries: Vec<EntryPost>,
    /// Test entries registered at startup.
    pub test_entries: Vec<TestEntryPost>,
}

impl EngineConfig {
    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        tracing::debug!(path = %path.display(), "reading config");
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        let config = Self::parse(&text)?;
        tracing::info!(
            path = %path.display(),
            policies = config.policies.len(),
            entries = config.entries.len(),
            "loaded config"
        );
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check router settings, priorities and references between sections.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.router.validate()?;

        let mut policies = HashSet::new();
        for policy in &self.policies {
            if !policies.insert(policy.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "policy '{}' is defined twice",
                    policy.name
                )));
            }
        }

        let posted = self
            .entries
            .iter()
            .map(|e| (e.name.as_str(), e.policy.as_str(), Some(e.priority)))
            .chain(
                self.test_entries
                    .iter()
                    .map(|e| (e.name.as_str(), e.policy.as_str(), e.priority)),
            );
        for (name, policy, priority) in posted {
            if !policies.contains(policy) {
                return Err(ConfigError::Invalid(format!(
                    "entry '{name}' references unknown policy '{policy}'"
                )));
            }
            if let Some(priority) = priority {
                if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
                    return Err(ConfigError::Invalid(format!(
                        "entry '{name}' has priority {priority} outside {MIN_PRIORITY}..={MAX_PRIORITY}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Build the configured decoder.
    pub fn decoder(&self) -> Arc<dyn Decoder> {
        match self.decoder {
            DecoderKind::Wazuh => Arc::new(WazuhDecoder::new()),
            DecoderKind::Json => Arc::new(JsonDecoder::with_subject(
                self.subject_pointer
                    .as_deref()
                    .unwrap_or(DEFAULT_SUBJECT_POINTER),
            )),
        }
    }
}
