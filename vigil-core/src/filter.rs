//! Routing filters.
//!
//! A [`FilterSpec`] decides whether an entry applies to an event. Filters are
//! plain data so they can be stored in configuration and copied into entry
//! snapshots.

use crate::event::Event;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A predicate over an [`Event`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterSpec {
    /// Accept every event.
    #[default]
    All,
    /// Match the event subject. `"*"` accepts any subject and a trailing `*`
    /// turns the value into a prefix.
    Subject {
        /// Expected subject or pattern.
        value: String,
    },
    /// Match a field by JSON pointer against an exact value.
    Field {
        /// JSON pointer to the field.
        path: String,
        /// Expected value.
        value: Value,
    },
    /// Accept events that carry the given field.
    Exists {
        /// JSON pointer to the field.
        path: String,
    },
}

impl FilterSpec {
    /// Filter on the event subject.
    pub fn subject(value: impl Into<String>) -> Self {
        FilterSpec::Subject {
            value: value.into(),
        }
    }

    /// Filter on a field value.
    pub fn field(path: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterSpec::Field {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Filter on field presence.
    pub fn exists(path: impl Into<String>) -> Self {
        FilterSpec::Exists { path: path.into() }
    }

    /// Evaluate the filter against an event.
    pub fn matches(&self, event: &Event) -> bool {
        match self {
            FilterSpec::All => true,
            FilterSpec::Subject { value } => match value.strip_suffix('*') {
                Some(prefix) => event.subject().starts_with(prefix),
                None => event.subject() == value,
            },
            FilterSpec::Field { path, value } => event.get(path) == Some(value),
            FilterSpec::Exists { path } => event.get(path).is_some(),
        }
    }
}

impl fmt::Display for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterSpec::All => write!(f, "all"),
            FilterSpec::Subject { value } => write!(f, "subject == {value}"),
            FilterSpec::Field { path, value } => write!(f, "{path} == {value}"),
            FilterSpec::Exists { path } => write!(f, "exists({path})"),
        }
    }
}
