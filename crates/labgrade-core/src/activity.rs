//! Activity monitoring: who submitted what, per student and per class.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::reducer::ReducedAttempt;

/// Default display width for axis labels.
pub const DEFAULT_LABEL_WIDTH: usize = 10;

/// Quizzes submitted by one student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentQuizzes {
    pub nb: usize,
    pub quizzes_list: Vec<String>,
}

/// Monitoring counts derived from the reduced attempts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivitySummary {
    /// Student → number of distinct quizzes with a pending submission.
    pub per_student_counts: BTreeMap<String, usize>,
    /// (quiz title, number of students), in numeric title order.
    pub per_class_counts: Vec<(String, usize)>,
    /// Student → count and ordered list of quiz titles.
    pub per_student_quiz_list: BTreeMap<String, StudentQuizzes>,
    /// Student → sum of submission scores (missing scores count 0).
    pub per_student_scores: BTreeMap<String, f64>,
}

impl ActivitySummary {
    pub fn is_empty(&self) -> bool {
        self.per_student_counts.is_empty()
    }
}

/// Aggregate reduced attempts into monitoring counts. Attempts without a
/// student id are skipped.
pub fn aggregate(attempts: &[ReducedAttempt]) -> ActivitySummary {
    let mut per_student_quiz_list: BTreeMap<String, StudentQuizzes> = BTreeMap::new();
    let mut per_class: BTreeMap<&str, usize> = BTreeMap::new();
    let mut per_student_scores: BTreeMap<String, f64> = BTreeMap::new();

    for attempt in attempts.iter().filter(|a| !a.student.trim().is_empty()) {
        let entry = per_student_quiz_list
            .entry(attempt.student.clone())
            .or_insert_with(|| StudentQuizzes {
                nb: 0,
                quizzes_list: Vec::new(),
            });
        // reduction guarantees one attempt per pair; guard anyway for hand-built input
        if !entry.quizzes_list.contains(&attempt.quiz_title) {
            entry.quizzes_list.push(attempt.quiz_title.clone());
            *per_class.entry(attempt.quiz_title.as_str()).or_default() += 1;
        }
        *per_student_scores.entry(attempt.student.clone()).or_default() +=
            attempt.score.unwrap_or(0.0);
    }

    for quizzes in per_student_quiz_list.values_mut() {
        quizzes.quizzes_list.sort_by(|a, b| compare_quiz_titles(a, b));
        quizzes.nb = quizzes.quizzes_list.len();
    }

    let mut per_class_counts: Vec<(String, usize)> = per_class
        .into_iter()
        .map(|(title, count)| (title.to_string(), count))
        .collect();
    per_class_counts.sort_by(|(a, _), (b, _)| compare_quiz_titles(a, b));

    ActivitySummary {
        per_student_counts: per_student_quiz_list
            .iter()
            .map(|(s, q)| (s.clone(), q.nb))
            .collect(),
        per_class_counts,
        per_student_quiz_list,
        per_student_scores,
    }
}

/// The first run of ASCII digits in `title`, as a number.
pub fn numeric_token(title: &str) -> Option<u64> {
    let start = title.find(|c: char| c.is_ascii_digit())?;
    let digits: String = title[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    // absurdly long digit runs saturate instead of failing
    Some(digits.parse().unwrap_or(u64::MAX))
}

/// Numeric title order: by first digit run, titles without digits last,
/// ties broken by the title itself.
pub fn compare_quiz_titles(a: &str, b: &str) -> Ordering {
    match (numeric_token(a), numeric_token(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Shorten `label` to its first `width` characters followed by `..`.
pub fn truncate_label(label: &str, width: usize) -> String {
    if label.chars().count() > width {
        let mut short: String = label.chars().take(width).collect();
        short.push_str("..");
        short
    } else {
        label.to_string()
    }
}

/// [`truncate_label`] over arbitrary labels; non-string labels pass through.
pub fn truncate_labels(labels: &[serde_json::Value], width: usize) -> Vec<serde_json::Value> {
    labels
        .iter()
        .map(|label| match label {
            serde_json::Value::String(s) => serde_json::Value::String(truncate_label(s, width)),
            other => other.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EventType;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn attempt(student: &str, quiz: &str, score: Option<f64>) -> ReducedAttempt {
        ReducedAttempt {
            student: student.into(),
            quiz_title: quiz.into(),
            event_type: EventType::Validate,
            timestamp: Utc.timestamp_opt(0, 0).unwrap(),
            score,
            log_index: 0,
        }
    }

    #[test]
    fn anonymous_attempts_are_skipped() {
        let attempts = vec![attempt("", "Q1", Some(1.0)), attempt("ana", "Q1", None)];
        let summary = aggregate(&attempts);
        assert_eq!(summary.per_class_counts, vec![("Q1".to_string(), 1)]);
        assert!(!summary.per_student_counts.contains_key(""));
        assert!(!summary.per_student_scores.contains_key(""));
    }

    #[test]
    fn class_counts_sort_numerically() {
        let attempts = vec![
            attempt("ana", "Q1", None),
            attempt("ana", "Q10", None),
            attempt("bob", "Q2", None),
            attempt("bob", "Q10", None),
        ];
        let summary = aggregate(&attempts);
        let titles: Vec<&str> = summary
            .per_class_counts
            .iter()
            .map(|(t, _)| t.as_str())
            .collect();
        assert_eq!(titles, vec!["Q1", "Q2", "Q10"]);
        assert_eq!(summary.per_class_counts[2], ("Q10".to_string(), 2));
    }

    #[test]
    fn titles_without_digits_sort_last() {
        let attempts = vec![
            attempt("ana", "Intro", None),
            attempt("ana", "Lab 3", None),
            attempt("bob", "Final exam", None),
        ];
        let summary = aggregate(&attempts);
        let titles: Vec<&str> = summary
            .per_class_counts
            .iter()
            .map(|(t, _)| t.as_str())
            .collect();
        assert_eq!(titles, vec!["Lab 3", "Final exam", "Intro"]);
    }

    #[test]
    fn per_student_counts_and_lists() {
        let attempts = vec![
            attempt("ana", "Q2", Some(3.0)),
            attempt("ana", "Q1", Some(4.5)),
            attempt("bob", "Q1", None),
        ];
        let summary = aggregate(&attempts);
        assert_eq!(summary.per_student_counts["ana"], 2);
        assert_eq!(summary.per_student_counts["bob"], 1);
        assert_eq!(
            summary.per_student_quiz_list["ana"].quizzes_list,
            vec!["Q1", "Q2"]
        );
        assert_eq!(summary.per_student_scores["ana"], 7.5);
        assert_eq!(summary.per_student_scores["bob"], 0.0);
    }

    #[test]
    fn empty_input_is_empty_summary() {
        let summary = aggregate(&[]);
        assert!(summary.is_empty());
        assert!(summary.per_class_counts.is_empty());
    }

    #[test]
    fn numeric_token_extraction() {
        assert_eq!(numeric_token("Quiz 12 - part 3"), Some(12));
        assert_eq!(numeric_token("TP007"), Some(7));
        assert_eq!(numeric_token("Intro"), None);
        assert_eq!(numeric_token("Q99999999999999999999999"), Some(u64::MAX));
    }

    #[test]
    fn label_truncation() {
        assert_eq!(truncate_label("short", 10), "short");
        assert_eq!(truncate_label("exactly10!", 10), "exactly10!");
        assert_eq!(truncate_label("a much longer name", 10), "a much lon..");
        assert_eq!(truncate_label("Élodie-Françoise", 6), "Élodie..");

        let labels = vec![json!("Jean-Baptiste"), json!(42), json!(null)];
        assert_eq!(
            truncate_labels(&labels, DEFAULT_LABEL_WIDTH),
            vec![json!("Jean-Bapti.."), json!(42), json!(null)]
        );
    }
}
