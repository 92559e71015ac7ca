//! Grading engine: from scorer output to published final marks.
//!
//! Two modes, chosen once from configuration:
//!
//! - **Fixed title**: every student answered the same questions. Final
//!   marks are a weighted average of the raw per-question scores, so
//!   coefficient edits never call the scorer again.
//! - **Randomized exam**: each student drew a different subset of
//!   questions. A weighted average over the table columns would be wrong,
//!   so every coefficient edit re-runs the scorer with the adjusted bareme
//!   and republishes its `Note` as `FinalMark`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::GradingError;
use crate::model::{EventLog, QuizDefinition};
use crate::scores::{Bareme, ScoreTable, WeightMatrix};
use crate::traits::{ScoreRequest, Scorer};

/// Final marks are expressed out of this many points.
pub const MARK_SCALE: f64 = 20.0;

/// How final marks are derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum GradingMode {
    FixedTitle,
    RandomizedExam { exam_title: String },
}

impl GradingMode {
    /// Blank title selects fixed-title grading.
    pub fn from_exam_title(title: &str) -> Self {
        let title = title.trim();
        if title.is_empty() {
            GradingMode::FixedTitle
        } else {
            GradingMode::RandomizedExam {
                exam_title: title.to_string(),
            }
        }
    }

    pub fn exam_title(&self) -> Option<&str> {
        match self {
            GradingMode::FixedTitle => None,
            GradingMode::RandomizedExam { exam_title } => Some(exam_title),
        }
    }
}

/// Settings of a grading pass.
#[derive(Debug, Clone, PartialEq)]
pub struct GradingConfig {
    pub weights: WeightMatrix,
    /// Initial per-question coefficients.
    pub bareme: Bareme,
    /// Floor for final marks (0 prevents negative marks).
    pub threshold: f64,
    /// Allowed submissions per quiz.
    pub max_tries: u32,
    pub mode: GradingMode,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            weights: WeightMatrix::default(),
            bareme: Bareme::new(),
            threshold: 0.0,
            max_tries: 1,
            mode: GradingMode::FixedTitle,
        }
    }
}

/// Runs the scorer and recomputes final marks.
pub struct GradingEngine {
    scorer: Arc<dyn Scorer>,
    config: GradingConfig,
}

impl GradingEngine {
    pub fn new(scorer: Arc<dyn Scorer>, config: GradingConfig) -> Self {
        Self { scorer, config }
    }

    pub fn config(&self) -> &GradingConfig {
        &self.config
    }

    pub fn mode(&self) -> &GradingMode {
        &self.config.mode
    }

    /// Run the scorer and return the canonical raw score table.
    ///
    /// In fixed-title mode the scorer's `Note` is dropped; final marks come
    /// from [`GradingEngine::recompute`].
    pub fn score(&self, log: &EventLog, quiz: &QuizDefinition) -> Result<ScoreTable, GradingError> {
        let mut table = self.invoke(log, quiz, &self.config.bareme)?;
        for row in &mut table.rows {
            row.final_mark = None;
        }
        if self.config.mode == GradingMode::FixedTitle {
            table.drop_note();
        }
        tracing::info!(
            scorer = self.scorer.name(),
            students = table.rows.len(),
            questions = table.questions.len(),
            "scores computed"
        );
        Ok(table)
    }

    /// Starting coefficients for a raw table: the configured bareme, 1.0
    /// for every question it does not list.
    pub fn initial_coefficients(&self, table: &ScoreTable) -> Bareme {
        table
            .questions
            .iter()
            .map(|q| (q.clone(), self.config.bareme.coefficient(q)))
            .collect()
    }

    /// Derive final marks from `raw` under adjusted `coefficients`.
    ///
    /// `raw` is never modified; the result is a new table.
    pub fn recompute(
        &self,
        log: &EventLog,
        quiz: &QuizDefinition,
        raw: &ScoreTable,
        coefficients: &Bareme,
    ) -> Result<ScoreTable, GradingError> {
        coefficients.validate()?;
        match &self.config.mode {
            GradingMode::FixedTitle => recompute_fixed(raw, coefficients, self.config.threshold),
            GradingMode::RandomizedExam { exam_title } => {
                tracing::debug!(exam_title, "re-running scorer with adjusted bareme");
                let mut table = self.invoke(log, quiz, coefficients)?;
                for row in &mut table.rows {
                    let note = row.note.take().ok_or_else(|| GradingError::MissingNote {
                        student: row.student.clone(),
                    })?;
                    row.final_mark = Some(note);
                }
                Ok(table)
            }
        }
    }

    fn invoke(
        &self,
        log: &EventLog,
        quiz: &QuizDefinition,
        bareme: &Bareme,
    ) -> Result<ScoreTable, GradingError> {
        self.config.weights.validate()?;
        bareme.validate()?;
        if !self.config.threshold.is_finite() {
            return Err(GradingError::InvalidCoefficient {
                question: "threshold".into(),
                value: self.config.threshold,
            });
        }

        let request = ScoreRequest {
            log,
            quiz,
            weights: &self.config.weights,
            bareme,
            threshold: self.config.threshold,
            max_tries: self.config.max_tries,
            title: self.config.mode.exam_title(),
        };
        self.scorer.score(&request).map_err(GradingError::Scorer)
    }
}

/// Fixed-title final marks: `Σ score·coef · 20 / Σ coef`, floored at
/// `threshold`. A missing cell counts as 0.
pub fn recompute_fixed(
    raw: &ScoreTable,
    coefficients: &Bareme,
    threshold: f64,
) -> Result<ScoreTable, GradingError> {
    let total: f64 = raw
        .questions
        .iter()
        .map(|q| coefficients.coefficient(q))
        .sum();
    if !(total > 0.0) {
        return Err(GradingError::DegenerateCoefficients { sum: total });
    }

    let mut table = raw.clone();
    for row in &mut table.rows {
        let weighted: f64 = raw
            .questions
            .iter()
            .map(|q| row.scores.get(q).copied().unwrap_or(0.0) * coefficients.coefficient(q))
            .sum();
        row.note = None;
        row.final_mark = Some((weighted * MARK_SCALE / total).max(threshold));
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scores::ScoreRow;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Returns a fixed table and records every bareme it was called with.
    struct RecordingScorer {
        table: ScoreTable,
        calls: AtomicU32,
        baremes: Mutex<Vec<Bareme>>,
        fail: bool,
    }

    impl RecordingScorer {
        fn new(table: ScoreTable) -> Self {
            Self {
                table,
                calls: AtomicU32::new(0),
                baremes: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::Relaxed)
        }
    }

    impl Scorer for RecordingScorer {
        fn name(&self) -> &str {
            "recording"
        }

        fn score(&self, request: &ScoreRequest<'_>) -> anyhow::Result<ScoreTable> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.baremes.lock().unwrap().push(request.bareme.clone());
            if self.fail {
                anyhow::bail!("quiz definition unreadable");
            }
            // emulate a scorer whose Note follows the bareme of q1
            let mut table = self.table.clone();
            for row in &mut table.rows {
                row.note = Some(10.0 * request.bareme.coefficient("q1"));
            }
            Ok(table)
        }
    }

    fn row(student: &str, scores: &[(&str, f64)]) -> ScoreRow {
        let mut row = ScoreRow::new(student);
        for (q, s) in scores {
            row.scores.insert(q.to_string(), *s);
        }
        row
    }

    fn table() -> ScoreTable {
        ScoreTable {
            questions: vec!["q1".into(), "q2".into()],
            rows: vec![
                row("ana", &[("q1", 1.0), ("q2", 0.5)]),
                row("bob", &[("q1", 0.0), ("q2", 1.0)]),
            ],
        }
    }

    fn quiz() -> QuizDefinition {
        QuizDefinition {
            id: "quiz".into(),
            name: "Quiz".into(),
            description: String::new(),
            parameters: Default::default(),
            questions: vec![],
        }
    }

    fn coefficients(pairs: &[(&str, f64)]) -> Bareme {
        pairs.iter().map(|(q, c)| (q.to_string(), *c)).collect()
    }

    #[test]
    fn mode_from_title() {
        assert_eq!(GradingMode::from_exam_title(""), GradingMode::FixedTitle);
        assert_eq!(GradingMode::from_exam_title("  "), GradingMode::FixedTitle);
        assert_eq!(
            GradingMode::from_exam_title("Final").exam_title(),
            Some("Final")
        );
    }

    #[test]
    fn fixed_title_weighted_average() {
        let result = recompute_fixed(&table(), &coefficients(&[("q1", 3.0), ("q2", 1.0)]), 0.0).unwrap();
        // ana: (1*3 + 0.5*1) * 20 / 4 = 17.5
        assert_eq!(result.row("ana").unwrap().final_mark, Some(17.5));
        // bob: (0*3 + 1*1) * 20 / 4 = 5
        assert_eq!(result.row("bob").unwrap().final_mark, Some(5.0));
    }

    #[test]
    fn fixed_title_is_scale_invariant() {
        let base = coefficients(&[("q1", 3.0), ("q2", 1.0)]);
        let a = recompute_fixed(&table(), &base, 0.0).unwrap();
        let b = recompute_fixed(&table(), &base.scaled(2.0), 0.0).unwrap();
        for (x, y) in a.rows.iter().zip(&b.rows) {
            let (x, y) = (x.final_mark.unwrap(), y.final_mark.unwrap());
            assert!((x - y).abs() < 1e-12, "{x} != {y}");
        }
    }

    #[test]
    fn fixed_title_rejects_zero_coefficients() {
        let err = recompute_fixed(&table(), &coefficients(&[("q1", 0.0), ("q2", 0.0)]), 0.0)
            .unwrap_err();
        assert!(matches!(err, GradingError::DegenerateCoefficients { sum } if sum == 0.0));
    }

    #[test]
    fn unlisted_questions_weigh_one() {
        let result = recompute_fixed(&table(), &Bareme::new(), 0.0).unwrap();
        assert_eq!(result.row("ana").unwrap().final_mark, Some(15.0));
    }

    #[test]
    fn threshold_floors_final_mark_but_not_cells() {
        let raw = ScoreTable {
            questions: vec!["q1".into()],
            rows: vec![row("ana", &[("q1", -1.0)])],
        };
        let result = recompute_fixed(&raw, &coefficients(&[("q1", 1.0)]), 0.0).unwrap();
        let ana = result.row("ana").unwrap();
        assert_eq!(ana.scores["q1"], -1.0);
        assert_eq!(ana.final_mark, Some(0.0));

        let floored_lower = recompute_fixed(&raw, &coefficients(&[("q1", 1.0)]), -5.0).unwrap();
        assert_eq!(floored_lower.row("ana").unwrap().final_mark, Some(-5.0));
    }

    #[test]
    fn fixed_recompute_never_calls_scorer_nor_mutates_raw() {
        let scorer = Arc::new(RecordingScorer::new(table()));
        let engine = GradingEngine::new(scorer.clone(), GradingConfig::default());
        let log = EventLog::default();

        let raw = engine.score(&log, &quiz()).unwrap();
        assert_eq!(scorer.calls(), 1);
        assert!(!raw.has_note(), "fixed-title raw table must not carry Note");

        let snapshot = raw.clone();
        let finals = engine
            .recompute(&log, &quiz(), &raw, &coefficients(&[("q1", 5.0), ("q2", 1.0)]))
            .unwrap();
        assert_eq!(scorer.calls(), 1);
        assert_eq!(raw, snapshot);
        assert!(finals.rows.iter().all(|r| r.final_mark.is_some()));
    }

    #[test]
    fn randomized_recompute_rescores_and_hides_note() {
        let scorer = Arc::new(RecordingScorer::new(table()));
        let config = GradingConfig {
            mode: GradingMode::from_exam_title("Final exam"),
            ..Default::default()
        };
        let engine = GradingEngine::new(scorer.clone(), config);
        let log = EventLog::default();

        let raw = engine.score(&log, &quiz()).unwrap();
        assert!(raw.has_note());

        let adjusted = coefficients(&[("q1", 2.0)]);
        let finals = engine.recompute(&log, &quiz(), &raw, &adjusted).unwrap();
        assert_eq!(scorer.calls(), 2);
        assert_eq!(scorer.baremes.lock().unwrap()[1], adjusted);
        assert!(!finals.columns().contains(&"Note".to_string()));
        assert!(finals.columns().contains(&"FinalMark".to_string()));
        assert_eq!(finals.row("ana").unwrap().final_mark, Some(20.0));
        // the canonical table still holds the original Note
        assert_eq!(raw.row("ana").unwrap().note, Some(10.0));
    }

    #[test]
    fn initial_coefficients_use_bareme() {
        let config = GradingConfig {
            bareme: coefficients(&[("q2", 4.0)]),
            ..Default::default()
        };
        let engine = GradingEngine::new(Arc::new(RecordingScorer::new(table())), config);
        let coeffs = engine.initial_coefficients(&table());
        assert_eq!(coeffs.coefficient("q1"), 1.0);
        assert_eq!(coeffs.coefficient("q2"), 4.0);
        assert_eq!(coeffs.len(), 2);
    }

    #[test]
    fn scorer_failure_propagates() {
        let mut scorer = RecordingScorer::new(table());
        scorer.fail = true;
        let engine = GradingEngine::new(Arc::new(scorer), GradingConfig::default());
        let err = engine.score(&EventLog::default(), &quiz()).unwrap_err();
        assert!(matches!(err, GradingError::Scorer(_)));
        assert!(err.to_string().contains("quiz definition unreadable"));
    }

    #[test]
    fn invalid_inputs_fail_the_pass() {
        let config = GradingConfig {
            weights: WeightMatrix {
                false_true: f64::INFINITY,
                ..Default::default()
            },
            ..Default::default()
        };
        let engine = GradingEngine::new(Arc::new(RecordingScorer::new(table())), config);
        assert!(matches!(
            engine.score(&EventLog::default(), &quiz()),
            Err(GradingError::InvalidWeights(_))
        ));

        let engine = GradingEngine::new(
            Arc::new(RecordingScorer::new(table())),
            GradingConfig::default(),
        );
        let negative = coefficients(&[("q1", -1.0)]);
        assert!(matches!(
            engine.recompute(&EventLog::default(), &quiz(), &table(), &negative),
            Err(GradingError::InvalidCoefficient { .. })
        ));
    }
}
