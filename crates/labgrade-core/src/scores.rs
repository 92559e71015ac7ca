//! Weight matrix, grading scale, and the score table exchanged with scorers.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::GradingError;

/// Scoring weights for the four (expected, observed) outcomes of a
/// proposition.
///
/// Serialized keys are `TT`, `TF`, `FT`, `FF` (expected first). The aliases
/// `TP`, `FP`, `FN`, `TN` map to the same slots, in that order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightMatrix {
    #[serde(rename = "TT", alias = "TP")]
    pub true_true: f64,
    #[serde(rename = "TF", alias = "FP")]
    pub true_false: f64,
    #[serde(rename = "FT", alias = "FN")]
    pub false_true: f64,
    #[serde(rename = "FF", alias = "TN")]
    pub false_false: f64,
}

impl Default for WeightMatrix {
    fn default() -> Self {
        Self {
            true_true: 1.0,
            true_false: -1.0,
            false_true: 0.0,
            false_false: 0.0,
        }
    }
}

impl WeightMatrix {
    /// Weight of one proposition outcome.
    pub fn weight(&self, expected: bool, observed: bool) -> f64 {
        match (expected, observed) {
            (true, true) => self.true_true,
            (true, false) => self.true_false,
            (false, true) => self.false_true,
            (false, false) => self.false_false,
        }
    }

    /// Reject non-finite weights.
    pub fn validate(&self) -> Result<(), GradingError> {
        for (name, value) in [
            ("TT", self.true_true),
            ("TF", self.true_false),
            ("FT", self.false_true),
            ("FF", self.false_false),
        ] {
            if !value.is_finite() {
                return Err(GradingError::InvalidWeights(format!(
                    "{name} is {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Per-question grading coefficients. Questions not listed weigh 1.0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bareme(BTreeMap<String, f64>);

impl Bareme {
    pub fn new() -> Self {
        Self::default()
    }

    /// Coefficient of `question`, defaulting to 1.0.
    pub fn coefficient(&self, question: &str) -> f64 {
        self.0.get(question).copied().unwrap_or(1.0)
    }

    pub fn set(&mut self, question: impl Into<String>, coefficient: f64) {
        self.0.insert(question.into(), coefficient);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Scale every coefficient by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self(self.0.iter().map(|(k, v)| (k.clone(), v * factor)).collect())
    }

    /// Reject negative or non-finite coefficients.
    pub fn validate(&self) -> Result<(), GradingError> {
        for (question, &value) in &self.0 {
            if !value.is_finite() || value < 0.0 {
                return Err(GradingError::InvalidCoefficient {
                    question: question.clone(),
                    value,
                });
            }
        }
        Ok(())
    }
}

impl FromIterator<(String, f64)> for Bareme {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One student's line of a score table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRow {
    pub student: String,
    /// Question id → score, one column per question. Undrawn questions
    /// are absent.
    #[serde(flatten)]
    pub scores: BTreeMap<String, f64>,
    /// Mark computed by the scorer itself (randomized-exam output).
    #[serde(rename = "Note", default, skip_serializing_if = "Option::is_none")]
    pub note: Option<f64>,
    /// Published mark out of 20.
    #[serde(rename = "FinalMark", default, skip_serializing_if = "Option::is_none")]
    pub final_mark: Option<f64>,
}

impl ScoreRow {
    pub fn new(student: impl Into<String>) -> Self {
        Self {
            student: student.into(),
            scores: BTreeMap::new(),
            note: None,
            final_mark: None,
        }
    }
}

/// Students × questions score matrix.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreTable {
    /// Question columns, in display order.
    pub questions: Vec<String>,
    pub rows: Vec<ScoreRow>,
}

impl ScoreTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, student: &str) -> Option<&ScoreRow> {
        self.rows.iter().find(|r| r.student == student)
    }

    /// Whether any row still carries a scorer `Note`.
    pub fn has_note(&self) -> bool {
        self.rows.iter().any(|r| r.note.is_some())
    }

    /// Column names as published: `student`, the questions, then `Note`
    /// and `FinalMark` when present.
    pub fn columns(&self) -> Vec<String> {
        let mut columns = Vec::with_capacity(self.questions.len() + 3);
        columns.push("student".to_string());
        columns.extend(self.questions.iter().cloned());
        if self.has_note() {
            columns.push("Note".to_string());
        }
        if self.rows.iter().any(|r| r.final_mark.is_some()) {
            columns.push("FinalMark".to_string());
        }
        columns
    }

    /// Mean score per question over the students who have one.
    pub fn question_averages(&self) -> BTreeMap<String, f64> {
        self.questions
            .iter()
            .filter_map(|q| {
                let values: Vec<f64> = self
                    .rows
                    .iter()
                    .filter_map(|r| r.scores.get(q).copied())
                    .collect();
                if values.is_empty() {
                    None
                } else {
                    Some((q.clone(), values.iter().sum::<f64>() / values.len() as f64))
                }
            })
            .collect()
    }

    /// Drop the scorer `Note` column.
    pub fn drop_note(&mut self) {
        for row in &mut self.rows {
            row.note = None;
        }
    }

    /// Save the table as JSON.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize score table")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write score table to {}", path.display()))?;
        Ok(())
    }

    /// Load a table saved with [`ScoreTable::save_json`].
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read score table from {}", path.display()))?;
        serde_json::from_str(&content).context("failed to parse score table JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_lookup_is_expected_first() {
        let w = WeightMatrix::default();
        assert_eq!(w.weight(true, true), 1.0);
        assert_eq!(w.weight(true, false), -1.0);
        assert_eq!(w.weight(false, true), 0.0);
        assert_eq!(w.weight(false, false), 0.0);
    }

    #[test]
    fn weights_require_all_four_keys() {
        let partial = r#"{"TT": 1.0, "TF": -1.0, "FT": 0.0}"#;
        assert!(serde_json::from_str::<WeightMatrix>(partial).is_err());

        let aliased = r#"{"TP": 2.0, "FP": -1.0, "FN": 0.5, "TN": 0.0}"#;
        let w: WeightMatrix = serde_json::from_str(aliased).unwrap();
        assert_eq!(w.true_true, 2.0);
        assert_eq!(w.false_true, 0.5);
    }

    #[test]
    fn non_finite_weight_rejected() {
        let w = WeightMatrix {
            true_true: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(w.validate(), Err(GradingError::InvalidWeights(_))));
    }

    #[test]
    fn bareme_defaults_to_one() {
        let mut b = Bareme::new();
        b.set("q1", 2.0);
        assert_eq!(b.coefficient("q1"), 2.0);
        assert_eq!(b.coefficient("q9"), 1.0);
        assert_eq!(b.scaled(2.0).coefficient("q1"), 4.0);
    }

    #[test]
    fn bareme_rejects_negative() {
        let b: Bareme = [("q1".to_string(), -0.5)].into_iter().collect();
        assert!(matches!(
            b.validate(),
            Err(GradingError::InvalidCoefficient { .. })
        ));
    }

    #[test]
    fn columns_follow_contents() {
        let mut row = ScoreRow::new("ana");
        row.scores.insert("q1".into(), 1.0);
        row.note = Some(12.0);
        let mut table = ScoreTable {
            questions: vec!["q1".into()],
            rows: vec![row],
        };
        assert_eq!(table.columns(), vec!["student", "q1", "Note"]);
        table.drop_note();
        table.rows[0].final_mark = Some(20.0);
        assert_eq!(table.columns(), vec!["student", "q1", "FinalMark"]);
    }

    #[test]
    fn averages_skip_missing_cells() {
        let mut a = ScoreRow::new("ana");
        a.scores.insert("q1".into(), 1.0);
        let mut b = ScoreRow::new("bob");
        b.scores.insert("q1".into(), 0.0);
        b.scores.insert("q2".into(), 0.5);
        let table = ScoreTable {
            questions: vec!["q1".into(), "q2".into(), "q3".into()],
            rows: vec![a, b],
        };
        let avg = table.question_averages();
        assert_eq!(avg["q1"], 0.5);
        assert_eq!(avg["q2"], 0.5);
        assert!(!avg.contains_key("q3"));
    }

    #[test]
    fn question_cells_are_top_level_columns() {
        let mut row = ScoreRow::new("bob");
        row.scores.insert("q1".into(), -1.0);
        row.final_mark = Some(0.0);
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["q1"], -1.0);
        assert_eq!(value["FinalMark"], 0.0);
        assert!(value.get("scores").is_none());

        let parsed: ScoreRow =
            serde_json::from_str(r#"{"student": "bob", "q1": -1.0, "q2": 0.5, "FinalMark": 0.0}"#)
                .unwrap();
        assert_eq!(parsed.scores.len(), 2);
        assert_eq!(parsed.scores["q2"], 0.5);
        assert_eq!(parsed.final_mark, Some(0.0));
        assert_eq!(parsed.note, None);
    }

    #[test]
    fn json_roundtrip_keeps_column_names() {
        let mut row = ScoreRow::new("ana");
        row.final_mark = Some(15.0);
        let table = ScoreTable {
            questions: vec![],
            rows: vec![row],
        };
        let json = serde_json::to_string(&table).unwrap();
        assert!(json.contains("\"FinalMark\":15.0"));
        assert!(!json.contains("Note"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.json");
        table.save_json(&path).unwrap();
        assert_eq!(ScoreTable::load_json(&path).unwrap(), table);
    }
}
