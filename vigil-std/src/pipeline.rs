//! Sequential stage pipeline.
//!
//! [`StagePipeline`] is the standard [`Controller`]: it runs its stages in
//! order, stops early on [`Flow::Stop`], and aborts on the first stage error.
//! When a trace sink is supplied, every executed stage the sink is interested
//! in yields exactly one line: `success`, `stopped` or `failure: <reason>`.

use std::sync::Arc;
use vigil_core::{BoxError, Controller, Event, Flow, Stage, TraceSink};

/// Trace message for a stage that returned [`Flow::Next`].
pub const TRACE_SUCCESS: &str = "success";
/// Trace message for a stage that returned [`Flow::Stop`].
pub const TRACE_STOPPED: &str = "stopped";

/// A stage failed while the pipeline was running.
#[derive(thiserror::Error, Debug)]
#[error("stage '{stage}' failed: {source}")]
pub struct StageFailure {
    /// Name of the failing stage.
    pub stage: String,
    /// Underlying error.
    #[source]
    pub source: BoxError,
}

/// A runnable list of stages.
pub struct StagePipeline {
    policy: String,
    stages: Vec<Arc<dyn Stage>>,
}

impl StagePipeline {
    /// Create a pipeline for `policy`.
    pub fn new(policy: impl Into<String>, stages: Vec<Arc<dyn Stage>>) -> Self {
        Self {
            policy: policy.into(),
            stages,
        }
    }

    /// The policy this pipeline was built from.
    pub fn policy(&self) -> &str {
        &self.policy
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the pipeline has no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl Controller for StagePipeline {
    fn ingest(
        &self,
        mut event: Event,
        mut trace: Option<&mut dyn TraceSink>,
    ) -> Result<Event, BoxError> {
        for stage in &self.stages {
            let name = stage.name();
            let result = stage.apply(&mut event);

            if let Some(sink) = trace.as_deref_mut() {
                if sink.is_enabled(name) {
                    let message = match &result {
                        Ok(Flow::Next) => TRACE_SUCCESS.to_owned(),
                        Ok(Flow::Stop) => TRACE_STOPPED.to_owned(),
                        Err(e) => format!("failure: {e}"),
                    };
                    sink.record(name, message);
                }
            }

            match result {
                Ok(Flow::Next) => continue,
                Ok(Flow::Stop) => break,
                Err(source) => {
                    return Err(Box::new(StageFailure {
                        stage: name.to_owned(),
                        source,
                    }));
                }
            }
        }
        Ok(event)
    }

    fn stages(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name().to_owned()).collect()
    }
}

impl std::fmt::Debug for StagePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagePipeline")
            .field("policy", &self.policy)
            .field("stages", &self.stages())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Tag(&'static str, Flow);

    impl Stage for Tag {
        fn name(&self) -> &str {
            self.0
        }

        fn apply(&self, event: &mut Event) -> Result<Flow, BoxError> {
            event.set(&format!("/{}", self.0), json!(true))?;
            Ok(self.1)
        }
    }

    struct Broken;

    impl Stage for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn apply(&self, _event: &mut Event) -> Result<Flow, BoxError> {
            Err("boom".into())
        }
    }

    #[derive(Default)]
    struct Lines(Vec<(String, String)>);

    impl TraceSink for Lines {
        fn is_enabled(&self, _stage: &str) -> bool {
            true
        }

        fn record(&mut self, stage: &str, message: String) {
            self.0.push((stage.to_owned(), message));
        }
    }

    fn pipeline(stages: Vec<Arc<dyn Stage>>) -> StagePipeline {
        StagePipeline::new("policy", stages)
    }

    #[test]
    fn test_runs_stages_in_order() {
        let p = pipeline(vec![Arc::new(Tag("a", Flow::Next)), Arc::new(Tag("b", Flow::Next))]);
        let mut lines = Lines::default();
        let out = p
            .ingest(Event::new("h", json!({})), Some(&mut lines))
            .unwrap();

        assert_eq!(out.document(), &json!({"a": true, "b": true}));
        assert_eq!(
            lines.0,
            vec![
                ("a".to_owned(), TRACE_SUCCESS.to_owned()),
                ("b".to_owned(), TRACE_SUCCESS.to_owned())
            ]
        );
    }

    #[test]
    fn test_stop_skips_remaining_stages() {
        let p = pipeline(vec![Arc::new(Tag("a", Flow::Stop)), Arc::new(Tag("b", Flow::Next))]);
        let mut lines = Lines::default();
        let out = p
            .ingest(Event::new("h", json!({})), Some(&mut lines))
            .unwrap();

        assert_eq!(out.document(), &json!({"a": true}));
        assert_eq!(lines.0, vec![("a".to_owned(), TRACE_STOPPED.to_owned())]);
    }

    #[test]
    fn test_stage_error_aborts() {
        let p = pipeline(vec![Arc::new(Broken), Arc::new(Tag("b", Flow::Next))]);
        let mut lines = Lines::default();
        let err = p
            .ingest(Event::new("h", json!({})), Some(&mut lines))
            .unwrap_err();

        assert_eq!(err.to_string(), "stage 'broken' failed: boom");
        assert_eq!(lines.0.len(), 1);
        assert_eq!(lines.0[0].1, "failure: boom");
    }

    #[test]
    fn test_untraced_run() {
        let p = pipeline(vec![Arc::new(Tag("a", Flow::Next))]);
        let out = p.ingest(Event::new("h", json!({})), None).unwrap();
        assert_eq!(p.policy(), "policy");
        assert_eq!(p.len(), 1);
        assert!(!p.is_empty());
        assert!(pipeline(Vec::new()).is_empty());
        assert_eq!(p.stages(), vec!["a".to_owned()]);
        assert_eq!(out.get("/a"), Some(&json!(true)));
    }
}
