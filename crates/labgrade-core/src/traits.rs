//! Seams to the external collaborators: event sources, quiz definition
//! providers and scorers.
//!
//! Event sources are async because they perform I/O; they are implemented
//! in `labgrade-sources`. Scoring is a plain synchronous call, implemented
//! in `labgrade-scorer`.

use async_trait::async_trait;

use crate::model::{EventLog, QuizDefinition};
use crate::scores::{Bareme, ScoreTable, WeightMatrix};

/// Supplies the raw event log and its filtered subset.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Human-readable source name (e.g. "file", "http").
    fn name(&self) -> &str;

    /// Fetch a fresh copy of the log.
    async fn fetch(&self) -> anyhow::Result<EventLog>;
}

/// Supplies expected answers and run parameters.
pub trait QuizDefinitionProvider: Send + Sync {
    fn load(&self) -> anyhow::Result<QuizDefinition>;
}

/// Everything a scorer needs for one grading pass.
#[derive(Debug, Clone, Copy)]
pub struct ScoreRequest<'a> {
    pub log: &'a EventLog,
    pub quiz: &'a QuizDefinition,
    pub weights: &'a WeightMatrix,
    /// Per-question scale used for the scorer's own `Note`.
    pub bareme: &'a Bareme,
    /// Floor applied to each student's aggregate mark.
    pub threshold: f64,
    /// Number of pre-correction submissions taken into account.
    pub max_tries: u32,
    /// Exam title in randomized-exam mode, `None` for fixed-title grading.
    pub title: Option<&'a str>,
}

/// Turns per-question answers into per-question scores.
///
/// Implementations return one row per graded student, one score per
/// question, and a `Note` out of 20 already floored at the threshold.
pub trait Scorer: Send + Sync {
    fn name(&self) -> &str;

    fn score(&self, request: &ScoreRequest<'_>) -> anyhow::Result<ScoreTable>;
}
