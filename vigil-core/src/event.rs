//! # Normalized Event
//!
//! An [`Event`] is the unit of telemetry flowing through the router. It pairs
//! an identifying *subject* (the agent or source that produced it) with a
//! JSON document holding the payload.
//!
//! Events are moved, never shared: a queue slot owns the event until a worker
//! pops it, and from then on the worker (and the pipeline it invokes) owns it
//! exclusively. Mutation therefore only happens through `&mut Event` inside a
//! pipeline stage.
//!
//! Fields are addressed with JSON pointers (`/agent/name`).

use crate::error::FieldError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A normalized security event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    subject: String,
    document: Value,
}

impl Event {
    /// Create an event from a subject and a document.
    pub fn new(subject: impl Into<String>, document: Value) -> Self {
        Self {
            subject: subject.into(),
            document,
        }
    }

    /// The agent or source this event originates from.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// The full event document.
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Consume the event, returning its document.
    pub fn into_document(self) -> Value {
        self.document
    }

    /// Look up a field by JSON pointer.
    pub fn get(&self, pointer: &str) -> Option<&Value> {
        self.document.pointer(pointer)
    }

    /// Write a field, creating intermediate objects as needed.
    ///
    /// The empty pointer replaces the whole document.
    pub fn set(&mut self, pointer: &str, value: Value) -> Result<(), FieldError> {
        if pointer.is_empty() {
            self.document = value;
            return Ok(());
        }
        let tokens = split_pointer(pointer)?;
        let (last, parents) = tokens
            .split_last()
            .ok_or_else(|| FieldError::InvalidPath(pointer.to_owned()))?;

        if self.document.is_null() {
            self.document = Value::Object(Map::new());
        }
        let mut current = &mut self.document;
        for token in parents {
            let object = current
                .as_object_mut()
                .ok_or_else(|| FieldError::NotAnObject(token.clone()))?;
            current = object
                .entry(token.clone())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        current
            .as_object_mut()
            .ok_or_else(|| FieldError::NotAnObject(pointer.to_owned()))?
            .insert(last.clone(), value);
        Ok(())
    }

    /// Remove a field, returning its previous value.
    pub fn remove(&mut self, pointer: &str) -> Option<Value> {
        let tokens = split_pointer(pointer).ok()?;
        let (last, parents) = tokens.split_last()?;
        let mut current = &mut self.document;
        for token in parents {
            current = current.as_object_mut()?.get_mut(token)?;
        }
        current.as_object_mut()?.remove(last)
    }
}

/// Split a JSON pointer into unescaped reference tokens.
fn split_pointer(pointer: &str) -> Result<Vec<String>, FieldError> {
    let rest = pointer
        .strip_prefix('/')
        .ok_or_else(|| FieldError::InvalidPath(pointer.to_owned()))?;
    Ok(rest
        .split('/')
        .map(|token| token.replace("~1", "/").replace("~0", "~"))
        .collect())
}
