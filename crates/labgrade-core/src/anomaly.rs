//! Integrity checks: declared run parameters vs. the reference setup.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{Event, ParamMap, ParamValue};

/// Parameter key under which clients declare the composite integrity hash.
pub const FULL_HASH_KEY: &str = "full_hash";

/// Expected parameter values for a correction run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceConfig {
    #[serde(default)]
    pub parameters: ParamMap,
    /// Composite hash, compared like any other parameter when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_hash: Option<String>,
}

impl ReferenceConfig {
    /// A `full_hash` entry among the parameters becomes the reference hash.
    pub fn new(mut parameters: ParamMap) -> Self {
        let full_hash = match parameters.remove(FULL_HASH_KEY) {
            Some(ParamValue::Text(hash)) => Some(hash),
            Some(other) => {
                tracing::warn!(value = %other, "ignoring non-text {FULL_HASH_KEY} parameter");
                None
            }
            None => None,
        };
        Self {
            parameters,
            full_hash,
        }
    }

    pub fn with_full_hash(mut self, hash: impl Into<String>) -> Self {
        self.full_hash = Some(hash.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty() && self.full_hash.is_none()
    }

    /// Every (key, expected value) pair, hash included.
    pub fn expected_values(&self) -> Vec<(&str, ParamValue)> {
        let mut values: Vec<(&str, ParamValue)> = self
            .parameters
            .iter()
            .filter(|(k, _)| k.as_str() != FULL_HASH_KEY)
            .map(|(k, v)| (k.as_str(), v.clone()))
            .collect();
        if let Some(hash) = &self.full_hash {
            values.push((FULL_HASH_KEY, ParamValue::Text(hash.clone())));
        }
        values
    }
}

/// How serious a mismatch is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    /// The composite hash differs: code, quiz or configuration was altered.
    Critical,
}

/// One mismatched parameter of one student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub student: String,
    pub parameter_name: String,
    pub expected: ParamValue,
    /// `None` when the student never declared the parameter.
    pub observed: Option<ParamValue>,
    pub severity: Severity,
}

impl AnomalyRecord {
    /// Short human-readable description of the mismatch.
    pub fn describe(&self) -> String {
        match &self.observed {
            Some(observed) => format!(
                "{}: expected {}, got {}",
                self.parameter_name, self.expected, observed
            ),
            None => format!(
                "{}: expected {}, not declared",
                self.parameter_name, self.expected
            ),
        }
    }
}

/// A row of the anomaly table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ReportRow {
    Anomaly(AnomalyRecord),
    /// "RAS": nothing to report for this student.
    Clean { student: String },
}

impl ReportRow {
    pub fn student(&self) -> &str {
        match self {
            ReportRow::Anomaly(record) => &record.student,
            ReportRow::Clean { student } => student,
        }
    }
}

/// The flat anomaly table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub rows: Vec<ReportRow>,
}

impl AnomalyReport {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn anomalies(&self) -> impl Iterator<Item = &AnomalyRecord> {
        self.rows.iter().filter_map(|row| match row {
            ReportRow::Anomaly(record) => Some(record),
            ReportRow::Clean { .. } => None,
        })
    }

    pub fn anomaly_count(&self) -> usize {
        self.anomalies().count()
    }

    /// Number of mismatches recorded for `student`.
    pub fn count_for(&self, student: &str) -> usize {
        self.anomalies().filter(|r| r.student == student).count()
    }
}

/// Per student, the newest non-empty parameter set found in the log.
pub fn latest_declared_parameters(events: &[Event]) -> BTreeMap<&str, &ParamMap> {
    let mut order: Vec<usize> = (0..events.len()).collect();
    order.sort_by_key(|&i| events[i].timestamp);

    let mut latest: BTreeMap<&str, &ParamMap> = BTreeMap::new();
    for index in order {
        let event = &events[index];
        if event.student.trim().is_empty() {
            continue;
        }
        let entry = latest.entry(event.student.as_str()).or_insert(&event.parameters);
        if !event.parameters.is_empty() {
            *entry = &event.parameters;
        }
    }
    latest
}

/// Compare every student's latest declared parameters with `reference`.
///
/// Keys in `ignore_keys` are skipped; keys absent from `reference` are never
/// compared. Students without mismatches get a clean row when
/// `include_clean` is set and are omitted otherwise. Rows are ordered by
/// student, then parameter name (hash last).
pub fn detect<S: AsRef<str>>(
    events: &[Event],
    reference: &ReferenceConfig,
    ignore_keys: &[S],
    include_clean: bool,
) -> AnomalyReport {
    let expected: Vec<(&str, ParamValue)> = reference
        .expected_values()
        .into_iter()
        .filter(|(key, _)| !ignore_keys.iter().any(|k| k.as_ref() == *key))
        .collect();

    let mut rows = Vec::new();
    for (student, declared) in latest_declared_parameters(events) {
        let before = rows.len();
        for (key, expected_value) in &expected {
            let observed = declared.get(*key);
            if observed != Some(expected_value) {
                rows.push(ReportRow::Anomaly(AnomalyRecord {
                    student: student.to_string(),
                    parameter_name: key.to_string(),
                    expected: expected_value.clone(),
                    observed: observed.cloned(),
                    severity: if *key == FULL_HASH_KEY {
                        Severity::Critical
                    } else {
                        Severity::Warning
                    },
                }));
            }
        }
        if rows.len() == before && include_clean {
            rows.push(ReportRow::Clean {
                student: student.to_string(),
            });
        }
    }

    let report = AnomalyReport { rows };
    tracing::debug!(
        checked_keys = expected.len(),
        anomalies = report.anomaly_count(),
        "integrity check complete"
    );
    report
}

/// All anomalies of one student, collapsed into a single row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedAnomalies {
    pub student: String,
    pub count: usize,
    pub severity: Severity,
    /// Mismatch descriptions joined with `"; "`.
    pub details: String,
}

/// Regroup a flat report per student. Clean rows are dropped, so a report
/// without any anomaly yields an empty vector.
pub fn group_anomalies_per_student(report: &AnomalyReport) -> Vec<GroupedAnomalies> {
    let mut grouped: BTreeMap<&str, Vec<&AnomalyRecord>> = BTreeMap::new();
    for record in report.anomalies() {
        grouped.entry(record.student.as_str()).or_default().push(record);
    }

    grouped
        .into_iter()
        .map(|(student, records)| GroupedAnomalies {
            student: student.to_string(),
            count: records.len(),
            severity: records
                .iter()
                .map(|r| r.severity)
                .max()
                .unwrap_or(Severity::Warning),
            details: records
                .iter()
                .map(|r| r.describe())
                .collect::<Vec<_>>()
                .join("; "),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EventType;
    use chrono::{TimeZone, Utc};

    fn params(pairs: &[(&str, ParamValue)]) -> ParamMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn declared(student: &str, t: i64, pairs: &[(&str, ParamValue)]) -> Event {
        Event::new(
            student,
            "Q1",
            EventType::Validate,
            Utc.timestamp_opt(t, 0).unwrap(),
        )
        .with_parameters(params(pairs))
    }

    fn reference() -> ReferenceConfig {
        ReferenceConfig::new(params(&[
            ("retries", ParamValue::Number(2.0)),
            ("exam_mode", ParamValue::Bool(true)),
        ]))
    }

    fn no_keys() -> &'static [&'static str] {
        &[]
    }

    #[test]
    fn reports_each_mismatch() {
        let events = vec![
            declared("ana", 1, &[("retries", 2.0.into()), ("exam_mode", true.into())]),
            declared("bob", 1, &[("retries", 5.0.into()), ("exam_mode", false.into())]),
        ];
        let report = detect(&events, &reference(), no_keys(), true);

        assert_eq!(report.count_for("ana"), 0);
        assert_eq!(report.count_for("bob"), 2);
        assert!(report
            .rows
            .contains(&ReportRow::Clean { student: "ana".into() }));
    }

    #[test]
    fn clean_students_omitted_without_include_clean() {
        let events = vec![declared(
            "ana",
            1,
            &[("retries", 2.0.into()), ("exam_mode", true.into())],
        )];
        assert!(detect(&events, &reference(), no_keys(), false).is_empty());
    }

    #[test]
    fn latest_declaration_wins() {
        let events = vec![
            declared("ana", 5, &[("retries", 2.0.into()), ("exam_mode", true.into())]),
            declared("ana", 1, &[("retries", 9.0.into()), ("exam_mode", true.into())]),
            // newer event without parameters does not erase the declaration
            declared("ana", 8, &[]),
        ];
        assert_eq!(detect(&events, &reference(), no_keys(), false).anomaly_count(), 0);
    }

    #[test]
    fn undeclared_and_type_mismatch_are_anomalies() {
        let events = vec![declared("ana", 1, &[("retries", ParamValue::Text("2".into()))])];
        let report = detect(&events, &reference(), no_keys(), false);
        let records: Vec<_> = report.anomalies().collect();
        assert_eq!(records.len(), 2);
        let exam = records.iter().find(|r| r.parameter_name == "exam_mode").unwrap();
        assert!(exam.observed.is_none());
        assert!(exam.describe().contains("not declared"));
    }

    #[test]
    fn extra_declared_parameters_are_ignored() {
        let events = vec![declared(
            "ana",
            1,
            &[
                ("retries", 2.0.into()),
                ("exam_mode", true.into()),
                ("theme", "dark".into()),
            ],
        )];
        assert_eq!(detect(&events, &reference(), no_keys(), false).anomaly_count(), 0);
    }

    #[test]
    fn hash_mismatch_is_critical() {
        let reference = reference().with_full_hash("abc123");
        let events = vec![declared(
            "ana",
            1,
            &[
                ("retries", 2.0.into()),
                ("exam_mode", true.into()),
                (FULL_HASH_KEY, "tampered".into()),
            ],
        )];
        let report = detect(&events, &reference, no_keys(), false);
        let records: Vec<_> = report.anomalies().collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].severity, Severity::Critical);
    }

    #[test]
    fn declared_hash_parameter_is_compared() {
        let reference = ReferenceConfig::new(params(&[
            ("retries", 2.0.into()),
            (FULL_HASH_KEY, "abc123".into()),
        ]));
        assert_eq!(reference.full_hash.as_deref(), Some("abc123"));
        assert!(!reference.parameters.contains_key(FULL_HASH_KEY));

        let events = vec![
            declared("ana", 1, &[("retries", 2.0.into()), (FULL_HASH_KEY, "abc123".into())]),
            declared("bob", 1, &[("retries", 2.0.into()), (FULL_HASH_KEY, "tampered".into())]),
        ];
        let report = detect(&events, &reference, no_keys(), false);
        let records: Vec<_> = report.anomalies().collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].student, "bob");
        assert_eq!(records[0].severity, Severity::Critical);
    }

    #[test]
    fn ignore_keys_never_increase_counts() {
        let events = vec![
            declared("ana", 1, &[("retries", 3.0.into())]),
            declared("bob", 1, &[("exam_mode", false.into())]),
            declared("chloe", 1, &[]),
        ];
        let reference = reference().with_full_hash("h");
        let key_sets: [&[&str]; 4] = [
            &[],
            &["retries"],
            &["retries", "exam_mode"],
            &["retries", "exam_mode", FULL_HASH_KEY],
        ];
        let mut previous: Option<AnomalyReport> = None;
        for keys in key_sets {
            let report = detect(&events, &reference, keys, true);
            if let Some(prev) = &previous {
                for student in ["ana", "bob", "chloe"] {
                    assert!(report.count_for(student) <= prev.count_for(student));
                }
            }
            previous = Some(report);
        }
        assert_eq!(previous.unwrap().anomaly_count(), 0);
    }

    #[test]
    fn grouping_concatenates_and_drops_clean() {
        let events = vec![
            declared("ana", 1, &[("retries", 2.0.into()), ("exam_mode", true.into())]),
            declared("bob", 1, &[("retries", 5.0.into()), ("exam_mode", false.into())]),
        ];
        let grouped = group_anomalies_per_student(&detect(&events, &reference(), no_keys(), true));
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].student, "bob");
        assert_eq!(grouped[0].count, 2);
        assert_eq!(
            grouped[0].details,
            "exam_mode: expected true, got false; retries: expected 2, got 5"
        );
    }

    #[test]
    fn grouping_empty_report_is_empty() {
        assert!(group_anomalies_per_student(&AnomalyReport::default()).is_empty());
    }
}
