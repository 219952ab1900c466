//! Raw event decoders.
//!
//! - [`WazuhDecoder`] - `<queue>:<location>:<message>` lines as emitted by
//!   agents and the analysis daemon
//! - [`JsonDecoder`] - one JSON object per event

use serde_json::{Map, Value, json};
use vigil_core::{Decoder, Event, ParseError};

/// Default JSON pointer holding the subject of a JSON event.
pub const DEFAULT_SUBJECT_POINTER: &str = "/agent/name";

// ============================================================================
// Wazuh protocol
// ============================================================================

/// Decodes `<queue>:<location>:<message>` lines.
///
/// The queue is a single character. Inside the location a literal colon is
/// escaped as `|:`. Agent locations look like
/// `[001] (web-01) 10.0.0.5->/var/log/auth.log` and populate `agent.id`,
/// `agent.name` and `agent.ip`; the subject is then the agent name. Any
/// other location becomes the subject as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct WazuhDecoder;

/// Agent information embedded in a location.
#[derive(Debug, PartialEq, Eq)]
struct AgentLocation<'a> {
    id: &'a str,
    name: &'a str,
    ip: &'a str,
    origin: &'a str,
}

impl WazuhDecoder {
    /// Create a decoder.
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for WazuhDecoder {
    fn decode(&self, raw: &str) -> Result<Event, ParseError> {
        let raw = raw.trim_end_matches(['\r', '\n']);
        if raw.trim().is_empty() {
            return Err(ParseError::Empty);
        }

        let mut chars = raw.chars();
        let queue = chars
            .next()
            .ok_or(ParseError::Empty)?;
        if chars.next() != Some(':') {
            return Err(ParseError::Malformed(
                "expected ':' after the queue identifier".into(),
            ));
        }
        let rest = &raw[queue.len_utf8() + 1..];

        let (location, message) = split_location(rest).ok_or_else(|| {
            ParseError::Malformed("missing ':' between location and message".into())
        })?;
        if location.is_empty() {
            return Err(ParseError::Malformed("empty location".into()));
        }

        let mut wazuh = Map::new();
        wazuh.insert("queue".into(), json!(queue as u32));
        wazuh.insert("location".into(), json!(location));

        let mut document = Map::new();
        let subject = match parse_agent(&location) {
            Some(agent) => {
                wazuh.insert("origin".into(), json!(agent.origin));
                document.insert(
                    "agent".into(),
                    json!({"id": agent.id, "name": agent.name, "ip": agent.ip}),
                );
                agent.name.to_owned()
            }
            None => location.clone(),
        };
        document.insert("wazuh".into(), Value::Object(wazuh));
        document.insert("event".into(), json!({"original": message}));

        Ok(Event::new(subject, Value::Object(document)))
    }
}

/// Split `location:message` at the first unescaped colon, unescaping `|:`.
fn split_location(rest: &str) -> Option<(String, &str)> {
    let mut location = String::new();
    let mut iter = rest.char_indices().peekable();
    while let Some((idx, c)) = iter.next() {
        match c {
            '|' if matches!(iter.peek(), Some((_, ':'))) => {
                location.push(':');
                iter.next();
            }
            ':' => return Some((location, &rest[idx + 1..])),
            other => location.push(other),
        }
    }
    None
}

/// Parse `[id] (name) ip->origin`.
fn parse_agent(location: &str) -> Option<AgentLocation<'_>> {
    let rest = location.strip_prefix('[')?;
    let (id, rest) = rest.split_once("] (")?;
    let (name, rest) = rest.split_once(") ")?;
    let (ip, origin) = rest.split_once("->")?;
    Some(AgentLocation {
        id,
        name,
        ip,
        origin,
    })
}

// ============================================================================
// JSON
// ============================================================================

/// Decodes a JSON object, reading the subject from a JSON pointer.
#[derive(Debug, Clone)]
pub struct JsonDecoder {
    subject_pointer: String,
}

impl JsonDecoder {
    /// Create a decoder reading the subject from `/agent/name`.
    pub fn new() -> Self {
        Self::with_subject(DEFAULT_SUBJECT_POINTER)
    }

    /// Create a decoder reading the subject from `pointer`.
    pub fn with_subject(pointer: impl Into<String>) -> Self {
        Self {
            subject_pointer: pointer.into(),
        }
    }
}

impl Default for JsonDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for JsonDecoder {
    fn decode(&self, raw: &str) -> Result<Event, ParseError> {
        if raw.trim().is_empty() {
            return Err(ParseError::Empty);
        }
        let document: Value = serde_json::from_str(raw)?;
        if !document.is_object() {
            return Err(ParseError::Malformed("expected a JSON object".into()));
        }
        let subject = document
            .pointer(&self.subject_pointer)
            .and_then(Value::as_str)
            .ok_or_else(|| ParseError::MissingSubject(self.subject_pointer.clone()))?
            .to_owned();
        Ok(Event::new(subject, document))
    }
}
