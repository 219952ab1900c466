//! Built-in stages.
//!
//! | kind      | params                | behaviour                                    |
//! |-----------|-----------------------|----------------------------------------------|
//! | `set`     | `field`, `value`      | write `value` at `field`                     |
//! | `remove`  | `field`               | delete `field` if present                    |
//! | `rename`  | `from`, `to`          | move a field, no-op if `from` is missing     |
//! | `require` | `field`               | fail unless `field` is present               |
//! | `match`   | `field`, `value`      | stop the pipeline unless `field == value`    |
//! | `log`     | none                  | log the event at INFO                        |
//!
//! Field parameters are JSON pointers.

use crate::catalog::StageFactory;
use serde_json::Value;
use thiserror::Error;
use vigil_core::{BoxError, BuildError, Event, Flow, Stage, StageSpec};

inventory::submit! { StageFactory::new("set", SetField::from_spec) }
inventory::submit! { StageFactory::new("remove", RemoveField::from_spec) }
inventory::submit! { StageFactory::new("rename", RenameField::from_spec) }
inventory::submit! { StageFactory::new("require", RequireField::from_spec) }
inventory::submit! { StageFactory::new("match", MatchField::from_spec) }
inventory::submit! { StageFactory::new("log", LogEvent::from_spec) }

/// A required field is absent.
#[derive(Error, Debug)]
#[error("missing required field '{0}'")]
pub struct MissingField(pub String);

fn invalid(spec: &StageSpec, reason: impl Into<String>) -> BuildError {
    BuildError::InvalidStage {
        stage: spec.name.clone(),
        reason: reason.into(),
    }
}

fn pointer_param(spec: &StageSpec, key: &str) -> Result<String, BuildError> {
    let value = spec
        .str_param(key)
        .ok_or_else(|| invalid(spec, format!("missing string parameter '{key}'")))?;
    if !value.starts_with('/') {
        return Err(invalid(
            spec,
            format!("parameter '{key}' must be a JSON pointer, got '{value}'"),
        ));
    }
    Ok(value.to_owned())
}

fn value_param(spec: &StageSpec, key: &str) -> Result<Value, BuildError> {
    spec.params
        .get(key)
        .cloned()
        .ok_or_else(|| invalid(spec, format!("missing parameter '{key}'")))
}

// ============================================================================
// Field manipulation
// ============================================================================

/// Writes a constant value into a field.
#[derive(Debug)]
pub struct SetField {
    name: String,
    field: String,
    value: Value,
}

impl SetField {
    /// Build from a `set` stage definition.
    pub fn from_spec(spec: &StageSpec) -> Result<Box<dyn Stage>, BuildError> {
        Ok(Box::new(Self {
            name: spec.name.clone(),
            field: pointer_param(spec, "field")?,
            value: value_param(spec, "value")?,
        }))
    }
}

impl Stage for SetField {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, event: &mut Event) -> Result<Flow, BoxError> {
        event.set(&self.field, self.value.clone())?;
        Ok(Flow::Next)
    }
}

/// Deletes a field.
#[derive(Debug)]
pub struct RemoveField {
    name: String,
    field: String,
}

impl RemoveField {
    /// Build from a `remove` stage definition.
    pub fn from_spec(spec: &StageSpec) -> Result<Box<dyn Stage>, BuildError> {
        Ok(Box::new(Self {
            name: spec.name.clone(),
            field: pointer_param(spec, "field")?,
        }))
    }
}

impl Stage for RemoveField {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, event: &mut Event) -> Result<Flow, BoxError> {
        event.remove(&self.field);
        Ok(Flow::Next)
    }
}

/// Moves a field to a new location.
#[derive(Debug)]
pub struct RenameField {
    name: String,
    from: String,
    to: String,
}

impl RenameField {
    /// Build from a `rename` stage definition.
    pub fn from_spec(spec: &StageSpec) -> Result<Box<dyn Stage>, BuildError> {
        Ok(Box::new(Self {
            name: spec.name.clone(),
            from: pointer_param(spec, "from")?,
            to: pointer_param(spec, "to")?,
        }))
    }
}

impl Stage for RenameField {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, event: &mut Event) -> Result<Flow, BoxError> {
        if let Some(value) = event.remove(&self.from) {
            event.set(&self.to, value)?;
        }
        Ok(Flow::Next)
    }
}

// ============================================================================
// Checks
// ============================================================================

/// Fails the pipeline when a field is absent.
#[derive(Debug)]
pub struct RequireField {
    name: String,
    field: String,
}

impl RequireField {
    /// Build from a `require` stage definition.
    pub fn from_spec(spec: &StageSpec) -> Result<Box<dyn Stage>, BuildError> {
        Ok(Box::new(Self {
            name: spec.name.clone(),
            field: pointer_param(spec, "field")?,
        }))
    }
}

impl Stage for RequireField {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, event: &mut Event) -> Result<Flow, BoxError> {
        match event.get(&self.field) {
            Some(_) => Ok(Flow::Next),
            None => Err(Box::new(MissingField(self.field.clone()))),
        }
    }
}

/// Stops the pipeline unless a field has the expected value.
#[derive(Debug)]
pub struct MatchField {
    name: String,
    field: String,
    value: Value,
}

impl MatchField {
    /// Build from a `match` stage definition.
    pub fn from_spec(spec: &StageSpec) -> Result<Box<dyn Stage>, BuildError> {
        Ok(Box::new(Self {
            name: spec.name.clone(),
            field: pointer_param(spec, "field")?,
            value: value_param(spec, "value")?,
        }))
    }
}

impl Stage for MatchField {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, event: &mut Event) -> Result<Flow, BoxError> {
        if event.get(&self.field) == Some(&self.value) {
            Ok(Flow::Next)
        } else {
            Ok(Flow::Stop)
        }
    }
}

// ============================================================================
// Output
// ============================================================================

/// Logs the event document.
#[derive(Debug)]
pub struct LogEvent {
    name: String,
}

impl LogEvent {
    /// Build from a `log` stage definition.
    pub fn from_spec(spec: &StageSpec) -> Result<Box<dyn Stage>, BuildError> {
        Ok(Box::new(Self {
            name: spec.name.clone(),
        }))
    }
}

impl Stage for LogEvent {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, event: &mut Event) -> Result<Flow, BoxError> {
        tracing::info!(
            stage = %self.name,
            subject = %event.subject(),
            event = %event.document(),
            "event"
        );
        Ok(Flow::Next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StageCatalog;
    use serde_json::json;

    fn build(kind: &str, params: Value) -> std::sync::Arc<dyn Stage> {
        StageCatalog::new()
            .build(&StageSpec::new(kind, kind, params))
            .unwrap()
    }

    fn event() -> Event {
        Event::new("host1", json!({"src": {"ip": "10.0.0.1"}, "level": 3}))
    }

    #[test]
    fn test_set() {
        let mut e = event();
        let flow = build("set", json!({"field": "/tag", "value": "seen"}))
            .apply(&mut e)
            .unwrap();
        assert_eq!(flow, Flow::Next);
        assert_eq!(e.get("/tag"), Some(&json!("seen")));
    }

    #[test]
    fn test_remove_and_rename() {
        let mut e = event();
        build("rename", json!({"from": "/src/ip", "to": "/source/address"}))
            .apply(&mut e)
            .unwrap();
        build("remove", json!({"field": "/level"}))
            .apply(&mut e)
            .unwrap();
        assert_eq!(e.get("/source/address"), Some(&json!("10.0.0.1")));
        assert_eq!(e.get("/src/ip"), None);
        assert_eq!(e.get("/level"), None);
    }

    #[test]
    fn test_require() {
        let stage = build("require", json!({"field": "/missing"}));
        let err = stage.apply(&mut event()).unwrap_err();
        assert_eq!(err.to_string(), "missing required field '/missing'");
    }

    #[test]
    fn test_match_stops_on_mismatch() {
        let stage = build("match", json!({"field": "/level", "value": 3}));
        assert_eq!(stage.apply(&mut event()).unwrap(), Flow::Next);
        let stage = build("match", json!({"field": "/level", "value": 7}));
        assert_eq!(stage.apply(&mut event()).unwrap(), Flow::Stop);
    }

    #[test]
    fn test_invalid_params() {
        let err = StageCatalog::new()
            .build(&StageSpec::new("bad", "set", json!({"field": "tag", "value": 1})))
            .err()
            .unwrap();
        assert!(matches!(err, BuildError::InvalidStage { stage, .. } if stage == "bad"));

        let err = StageCatalog::new()
            .build(&StageSpec::new("bad", "set", json!({"field": "/tag"})))
            .err()
            .unwrap();
        assert!(err.to_string().contains("missing parameter 'value'"));
    }
}
