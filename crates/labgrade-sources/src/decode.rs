//! Event log wire formats.
//!
//! Three encodings are accepted:
//!
//! - a JSON object `{"events": [...], "filtered": [...]}`,
//! - a JSON array of events,
//! - JSON lines, one event per line (blank lines skipped).
//!
//! When the payload carries no filtered subset, [`filter_events`] builds one.

use labgrade_core::error::SourceError;
use labgrade_core::model::{Event, EventLog, EventType};

/// Events worth grading: a known event type and a non-blank student.
pub fn filter_events(events: &[Event]) -> Vec<Event> {
    events
        .iter()
        .filter(|e| e.event_type != EventType::Other && !e.student.trim().is_empty())
        .cloned()
        .collect()
}

/// Decode a fetched payload into an event log.
pub fn decode_event_log(body: &str) -> Result<EventLog, SourceError> {
    let trimmed = body.trim_start();

    let mut log = if trimmed.starts_with('{') && looks_like_envelope(trimmed) {
        serde_json::from_str::<EventLog>(trimmed)
            .map_err(|e| SourceError::Malformed(format!("invalid event log object: {e}")))?
    } else if trimmed.starts_with('[') {
        let events: Vec<Event> = serde_json::from_str(trimmed)
            .map_err(|e| SourceError::Malformed(format!("invalid event array: {e}")))?;
        EventLog::new(events)
    } else {
        EventLog::new(decode_lines(body)?)
    };

    if log.filtered.is_empty() {
        log.filtered = filter_events(&log.events);
    }
    Ok(log)
}

/// A single-line object with an `events` key is an envelope, not one event.
fn looks_like_envelope(text: &str) -> bool {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => value.get("events").is_some(),
        Err(_) => false,
    }
}

fn decode_lines(body: &str) -> Result<Vec<Event>, SourceError> {
    body.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str::<Event>(line)
                .map_err(|e| SourceError::Malformed(format!("line {}: {e}", n + 1)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANA: &str = r#"{"student":"ana","quiz_title":"Q1","event_type":"validate","timestamp":"2025-03-01T10:00:00Z","score":4.5}"#;
    const BLANK: &str = r#"{"student":" ","quiz_title":"Q1","event_type":"validate","timestamp":"2025-03-01T10:01:00Z"}"#;
    const OTHER: &str = r#"{"student":"bob","quiz_title":"Q1","event_type":"page_view","timestamp":"2025-03-01T10:02:00Z"}"#;

    #[test]
    fn decodes_array_and_builds_filtered_subset() {
        let body = format!("[{ANA},{BLANK},{OTHER}]");
        let log = decode_event_log(&body).unwrap();
        assert_eq!(log.events.len(), 3);
        assert_eq!(log.filtered.len(), 1);
        assert_eq!(log.filtered[0].student, "ana");
    }

    #[test]
    fn decodes_json_lines() {
        let body = format!("{ANA}\n\n{OTHER}\n");
        let log = decode_event_log(&body).unwrap();
        assert_eq!(log.events.len(), 2);
        assert_eq!(log.events[1].event_type, EventType::Other);
    }

    #[test]
    fn single_event_line_is_not_an_envelope() {
        let log = decode_event_log(ANA).unwrap();
        assert_eq!(log.events.len(), 1);
    }

    #[test]
    fn envelope_keeps_its_filtered_subset() {
        let body = format!(r#"{{"events": [{ANA},{OTHER}], "filtered": [{OTHER}]}}"#);
        let log = decode_event_log(&body).unwrap();
        assert_eq!(log.events.len(), 2);
        assert_eq!(log.filtered.len(), 1);
        assert_eq!(log.filtered[0].student, "bob");
    }

    #[test]
    fn malformed_line_is_reported_with_its_number() {
        let body = format!("{ANA}\nnot json\n");
        let err = decode_event_log(&body).unwrap_err();
        assert!(matches!(err, SourceError::Malformed(_)));
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn empty_body_is_empty_log() {
        let log = decode_event_log("").unwrap();
        assert!(log.is_empty());
        assert!(log.filtered.is_empty());
    }
}
