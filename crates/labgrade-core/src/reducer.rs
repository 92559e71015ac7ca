//! Event-log reduction.
//!
//! Collapses the append-only log into at most one pending submission per
//! (student, quiz). Events of a pair are ordered by timestamp; ties keep
//! log order.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Event, EventType};

/// The pending submission of one (student, quiz) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReducedAttempt {
    pub student: String,
    pub quiz_title: String,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    /// Score carried by the submission, if the client sent one.
    pub score: Option<f64>,
    /// Position of the submission in the input slice.
    pub log_index: usize,
}

/// Group event indices by (student, quiz_title), each group sorted by
/// timestamp with ties in log order.
pub fn partition(events: &[Event]) -> BTreeMap<(&str, &str), Vec<usize>> {
    let mut groups: BTreeMap<(&str, &str), Vec<usize>> = BTreeMap::new();
    for (index, event) in events.iter().enumerate() {
        groups
            .entry((event.student.as_str(), event.quiz_title.as_str()))
            .or_default()
            .push(index);
    }
    for indices in groups.values_mut() {
        // stable: equal timestamps stay in log order
        indices.sort_by_key(|&i| events[i].timestamp);
    }
    groups
}

/// Reduce the log to the pending submission of every (student, quiz) pair.
///
/// A submission is pending when no correction event sits at or after it in
/// its pair's ordering. The flag is computed by a monotone scan from the
/// newest event backwards; the newest submission with the flag unset is
/// kept. A pair whose newest relevant event is a correction yields nothing.
///
/// The result is sorted by (student, quiz_title).
pub fn reduce(events: &[Event]) -> Vec<ReducedAttempt> {
    let mut attempts = Vec::new();

    for ((student, quiz_title), indices) in partition(events) {
        let mut corrected = false;
        for &index in indices.iter().rev() {
            let event = &events[index];
            if event.event_type == EventType::Correction {
                corrected = true;
            }
            if corrected {
                break;
            }
            if event.event_type.is_submission() {
                attempts.push(ReducedAttempt {
                    student: student.to_string(),
                    quiz_title: quiz_title.to_string(),
                    event_type: event.event_type,
                    timestamp: event.timestamp,
                    score: event.score,
                    log_index: index,
                });
                break;
            }
        }
    }

    tracing::debug!(events = events.len(), attempts = attempts.len(), "reduced event log");
    attempts
}

/// Submissions made before the student first opened the correction, per
/// (student, quiz), in chronological order.
///
/// This is the forward counterpart of [`reduce`]: once a correction has
/// been seen, every later submission of the pair is discarded. Scorers use
/// it so that answers given after reading the correction never count.
pub fn pre_correction_submissions(events: &[Event]) -> BTreeMap<(&str, &str), Vec<&Event>> {
    let mut result = BTreeMap::new();

    for (key, indices) in partition(events) {
        let mut has_seen_correction = false;
        let mut submissions = Vec::new();
        for index in indices {
            let event = &events[index];
            has_seen_correction |= event.event_type == EventType::Correction;
            if !has_seen_correction && event.event_type.is_submission() {
                submissions.push(event);
            }
        }
        if !submissions.is_empty() {
            result.insert(key, submissions);
        }
    }

    result
}

/// The newest event of any type per (student, quiz).
pub fn latest_events(events: &[Event]) -> Vec<&Event> {
    partition(events)
        .into_values()
        .filter_map(|indices| indices.last().map(|&i| &events[i]))
        .collect()
}
