//! Structured JSON log lines on stderr, one object per line.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::types::RuntimeEvent;

/// Fields repeated on every line of one run.
#[derive(Clone, Copy, Debug)]
pub struct LogScope<'a> {
    pub session_id: &'a str,
    pub scenario: Option<&'a str>,
    pub seed: Option<u32>,
}

impl<'a> LogScope<'a> {
    pub fn session(session_id: &'a str) -> Self {
        Self {
            session_id,
            scenario: None,
            seed: None,
        }
    }

    pub fn scenario(session_id: &'a str, scenario: &'a str, seed: u32) -> Self {
        Self {
            session_id,
            scenario: Some(scenario),
            seed: Some(seed),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct StructuredLogLine {
    #[serde(rename = "timestampMs")]
    pub timestamp_ms: u64,
    pub level: String,
    pub event: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tick: Option<u64>,
    pub details: Value,
}

pub fn format_log_line(
    level: &str,
    event: &str,
    scope: &LogScope<'_>,
    tick: Option<u64>,
    details: Value,
) -> String {
    let line = StructuredLogLine {
        timestamp_ms: Utc::now().timestamp_millis().max(0) as u64,
        level: level.to_string(),
        event: event.to_string(),
        session_id: scope.session_id.to_string(),
        scenario: scope.scenario.map(str::to_string),
        seed: scope.seed,
        tick,
        details,
    };
    match serde_json::to_string(&line) {
        Ok(text) => text,
        Err(error) => format!(
            "{{\"level\":\"error\",\"event\":\"log_serialize_failed\",\"error\":{:?}}}",
            error.to_string()
        ),
    }
}

pub fn emit_log(
    level: &str,
    event: &str,
    scope: &LogScope<'_>,
    tick: Option<u64>,
    details: Value,
) {
    eprintln!("{}", format_log_line(level, event, scope, tick, details));
}

/// Level, event name and payload for a runtime event. Sound cues are too
/// chatty to log and return `None`.
pub fn describe_event(event: &RuntimeEvent) -> Option<(&'static str, String, Value)> {
    if matches!(event, RuntimeEvent::Sound { .. }) {
        return None;
    }
    let mut details = serde_json::to_value(event).ok()?;
    let name = details
        .as_object_mut()?
        .remove("type")?
        .as_str()?
        .to_string();
    let level = match event {
        RuntimeEvent::PlayerCaught { .. } => "warn",
        _ => "info",
    };
    Some((level, name, details))
}

pub fn log_runtime_events(scope: &LogScope<'_>, tick: u64, events: &[RuntimeEvent]) {
    for event in events {
        if let Some((level, name, details)) = describe_event(event) {
            emit_log(level, &name, scope, Some(tick), details);
        }
    }
}
