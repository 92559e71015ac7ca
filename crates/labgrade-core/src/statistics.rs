//! Summary statistics over published final marks.

use serde::{Deserialize, Serialize};

use crate::scores::ScoreTable;

/// Mean, spread and range of the `FinalMark` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkSummary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; `None` below two marks.
    pub std_dev: Option<f64>,
    pub min: f64,
    pub max: f64,
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1 denominator).
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

impl ScoreTable {
    /// Statistics of the `FinalMark` column, `None` when no row has one.
    pub fn summary(&self) -> Option<MarkSummary> {
        let marks: Vec<f64> = self.rows.iter().filter_map(|r| r.final_mark).collect();
        let mean = mean(&marks)?;
        Some(MarkSummary {
            count: marks.len(),
            mean,
            std_dev: sample_std_dev(&marks),
            min: marks.iter().copied().fold(f64::INFINITY, f64::min),
            max: marks.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scores::ScoreRow;

    #[test]
    fn mean_and_std() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[2.0, 4.0]), Some(3.0));
        assert_eq!(sample_std_dev(&[5.0]), None);
        let sd = sample_std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((sd - 2.138_089_935).abs() < 1e-6);
    }

    #[test]
    fn summary_of_final_marks() {
        let mut a = ScoreRow::new("ana");
        a.final_mark = Some(12.0);
        let mut b = ScoreRow::new("bob");
        b.final_mark = Some(16.0);
        let c = ScoreRow::new("chloe");
        let table = ScoreTable {
            questions: vec![],
            rows: vec![a, b, c],
        };

        let summary = table.summary().unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.mean, 14.0);
        assert_eq!(summary.min, 12.0);
        assert_eq!(summary.max, 16.0);
        assert!((summary.std_dev.unwrap() - 8f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn summary_of_raw_table_is_none() {
        assert!(ScoreTable::default().summary().is_none());
    }
}
