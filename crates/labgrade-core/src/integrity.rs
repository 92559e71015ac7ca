//! Composite reference hash and reference configuration.
//!
//! Quiz clients declare a `full_hash` parameter computed over the quiz they
//! run and their watched parameters. The reference side computes the same
//! digest here; detection compares the two as opaque strings.

use std::collections::BTreeMap;

use serde_json::json;
use sha2::{Digest, Sha256};

use crate::anomaly::ReferenceConfig;
use crate::model::{ParamMap, QuizDefinition};

/// Parameters folded into the reference hash when no watchlist is given.
pub const DEFAULT_WATCHLIST: &[&str] = &["retries", "exam_mode", "test_mode"];

/// Canonical bytes of the quiz definition plus the watched parameters.
///
/// Only grading-relevant question fields are included, so relabelling a
/// question does not change the hash.
pub fn canonical_bytes(quiz: &QuizDefinition, parameters: &ParamMap, watchlist: &[&str]) -> Vec<u8> {
    let questions: Vec<serde_json::Value> = quiz
        .questions
        .iter()
        .map(|q| {
            json!({
                "id": q.id,
                "quiz_title": q.quiz_title,
                "expected": q.expected,
            })
        })
        .collect();
    let watched: BTreeMap<&str, String> = watchlist
        .iter()
        .filter_map(|key| parameters.get(*key).map(|v| (*key, v.to_string())))
        .collect();

    json!({
        "quiz": quiz.id,
        "questions": questions,
        "watched": watched,
    })
    .to_string()
    .into_bytes()
}

/// Hex-encoded SHA-256 of [`canonical_bytes`].
pub fn reference_hash(quiz: &QuizDefinition, parameters: &ParamMap, watchlist: &[&str]) -> String {
    hex::encode(Sha256::digest(canonical_bytes(quiz, parameters, watchlist)))
}

/// Build the reference for one correction run.
///
/// Starts from the quiz's keyword parameters; operator-declared
/// `monitored` values take precedence. With `use_full_hash` the composite
/// hash is added under `full_hash`; otherwise a `full_hash` declared among
/// the parameters is used as is.
pub fn build_reference(
    quiz: &QuizDefinition,
    monitored: &ParamMap,
    use_full_hash: bool,
) -> ReferenceConfig {
    let mut parameters = quiz.parameters.clone();
    parameters.extend(monitored.iter().map(|(k, v)| (k.clone(), v.clone())));

    let reference = ReferenceConfig::new(parameters);
    if use_full_hash {
        let hash = reference_hash(quiz, &reference.parameters, DEFAULT_WATCHLIST);
        tracing::debug!(%hash, "reference hash computed");
        reference.with_full_hash(hash)
    } else {
        reference
    }
}
