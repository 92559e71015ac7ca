//! Correction session: the results of the last grading pass.
//!
//! ```text
//! NoResults --run_correction--> Scored --finalize--> Finalized
//!                                  ^                     |
//!                                  +--adjust_coefficients+
//! ```
//!
//! Every method takes `&mut self`, so at most one pass is in flight per
//! session. A failed correction run leaves the previous results intact.

use chrono::{DateTime, Utc};

use crate::error::GradingError;
use crate::grading::GradingEngine;
use crate::model::{EventLog, QuizDefinition};
use crate::scores::{Bareme, ScoreTable};

/// Where a session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoResults,
    Scored,
    Finalized,
}

/// Published raw and final tables of one operator session.
#[derive(Debug, Clone)]
pub struct CorrectionSession {
    state: SessionState,
    raw_scores: Option<ScoreTable>,
    final_scores: Option<ScoreTable>,
    coefficients: Bareme,
    last_update: Option<DateTime<Utc>>,
}

impl Default for CorrectionSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrectionSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::NoResults,
            raw_scores: None,
            final_scores: None,
            coefficients: Bareme::new(),
            last_update: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn raw_scores(&self) -> Option<&ScoreTable> {
        self.raw_scores.as_ref()
    }

    pub fn final_scores(&self) -> Option<&ScoreTable> {
        self.final_scores.as_ref()
    }

    pub fn coefficients(&self) -> &Bareme {
        &self.coefficients
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    /// Score the log and replace every published result.
    pub fn run_correction(
        &mut self,
        engine: &GradingEngine,
        log: &EventLog,
        quiz: &QuizDefinition,
    ) -> Result<&ScoreTable, GradingError> {
        let raw = engine.score(log, quiz)?;

        self.coefficients = engine.initial_coefficients(&raw);
        self.final_scores = None;
        self.state = SessionState::Scored;
        self.last_update = Some(Utc::now());
        Ok(&*self.raw_scores.insert(raw))
    }

    /// Publish final marks for `coefficients`.
    ///
    /// On failure the final table is withdrawn and the session falls back
    /// to `Scored`; the raw table is kept.
    pub fn finalize(
        &mut self,
        engine: &GradingEngine,
        log: &EventLog,
        quiz: &QuizDefinition,
        coefficients: Bareme,
    ) -> Result<&ScoreTable, GradingError> {
        let raw = self.raw_scores.as_ref().ok_or(GradingError::NotScored)?;
        let result = engine.recompute(log, quiz, raw, &coefficients);
        self.coefficients = coefficients;

        match result {
            Ok(table) => {
                self.state = SessionState::Finalized;
                Ok(&*self.final_scores.insert(table))
            }
            Err(e) => {
                tracing::warn!(error = %e, "final marks withdrawn");
                self.final_scores = None;
                self.state = SessionState::Scored;
                Err(e)
            }
        }
    }

    /// Edit coefficients after publication: the current final table is
    /// invalidated, then recomputed.
    pub fn adjust_coefficients(
        &mut self,
        engine: &GradingEngine,
        log: &EventLog,
        quiz: &QuizDefinition,
        coefficients: Bareme,
    ) -> Result<&ScoreTable, GradingError> {
        if self.raw_scores.is_none() {
            return Err(GradingError::NotScored);
        }
        self.final_scores = None;
        self.state = SessionState::Scored;
        self.finalize(engine, log, quiz, coefficients)
    }
}
