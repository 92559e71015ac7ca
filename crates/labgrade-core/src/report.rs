//! Dashboard report: everything one monitoring + correction pass produced.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::activity::ActivitySummary;
use crate::anomaly::{AnomalyReport, GroupedAnomalies};
use crate::scores::ScoreTable;
use crate::statistics::MarkSummary;

/// A complete dashboard snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    /// Name of the quiz definition graded.
    pub quiz_name: String,
    /// Number of events in the pulled log.
    pub event_count: usize,
    #[serde(default)]
    pub anomalies: AnomalyReport,
    #[serde(default)]
    pub grouped_anomalies: Vec<GroupedAnomalies>,
    #[serde(default)]
    pub activity: ActivitySummary,
    /// Final marks, when a correction was run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grades: Option<ScoreTable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<MarkSummary>,
    /// Non-fatal input problems met while building the report.
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl DashboardReport {
    pub fn new(quiz_name: impl Into<String>, event_count: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            quiz_name: quiz_name.into(),
            event_count,
            anomalies: AnomalyReport::default(),
            grouped_anomalies: Vec::new(),
            activity: ActivitySummary::default(),
            grades: None,
            summary: None,
            warnings: Vec::new(),
        }
    }

    /// Attach final marks and their summary.
    pub fn with_grades(mut self, grades: ScoreTable) -> Self {
        self.summary = grades.summary();
        self.grades = Some(grades);
        self
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        serde_json::from_str(&content).context("failed to parse report JSON")
    }
}
