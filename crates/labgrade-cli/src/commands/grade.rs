//! The `labgrade grade` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use labgrade_core::activity::aggregate;
use labgrade_core::anomaly::{detect, group_anomalies_per_student};
use labgrade_core::grading::GradingEngine;
use labgrade_core::integrity::build_reference;
use labgrade_core::params::{parse_bareme_lenient, parse_weights};
use labgrade_core::reducer::reduce;
use labgrade_core::report::DashboardReport;
use labgrade_core::session::CorrectionSession;
use labgrade_report::html::write_html_report;
use labgrade_scorer::LocalScorer;
use labgrade_sources::load_config_from;

use super::{load_quiz, print_scores, resolve_source, warn};

#[allow(clippy::too_many_arguments)]
pub async fn execute(
    events: Option<PathBuf>,
    quiz_path: Option<PathBuf>,
    coefficients: Option<String>,
    weights: Option<String>,
    exam_title: Option<String>,
    threshold: Option<f64>,
    max_tries: Option<u32>,
    output: Option<PathBuf>,
    format: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config_from(config_path.as_deref())?;
    let formats: Vec<&str> = match format.as_str() {
        "all" => vec!["json", "html"],
        "table" => Vec::new(),
        other => other.split(',').map(str::trim).collect(),
    };

    if let Some(title) = exam_title {
        config.grading.exam_title = title;
    }
    if let Some(threshold) = threshold {
        config.grading.threshold = threshold;
    }
    if let Some(max_tries) = max_tries {
        config.grading.max_tries = max_tries;
    }

    let quiz = load_quiz(quiz_path.as_ref().unwrap_or(&config.quiz_file))?;
    let mut warnings = Vec::new();

    let mut grading = config.grading.grading_config(&quiz.declared_bareme());
    warnings.extend(grading.warning);
    if let Some(text) = &weights {
        grading.value.weights = parse_weights(text).context("invalid --weights")?;
    }
    let engine = GradingEngine::new(Arc::new(LocalScorer::new()), grading.value);

    let source = resolve_source(&config, events)?;
    let log = source.fetch().await?;
    tracing::info!(
        source = source.name(),
        events = log.events.len(),
        students = log.students().len(),
        "event log pulled"
    );

    let mut session = CorrectionSession::new();
    session.run_correction(&engine, &log, &quiz)?;

    let mut chosen = session.coefficients().clone();
    if let Some(text) = &coefficients {
        let parsed = parse_bareme_lenient(text);
        warnings.extend(parsed.warning);
        for (question, value) in parsed.value.iter() {
            chosen.set(question.clone(), *value);
        }
    }
    let finals = session.finalize(&engine, &log, &quiz, chosen)?.clone();

    for w in &warnings {
        warn(w);
    }
    print_scores(&finals);

    if formats.is_empty() {
        return Ok(());
    }

    let output = output.unwrap_or_else(|| config.output_dir.clone());
    std::fs::create_dir_all(&output)?;
    let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H%M%S");

    for fmt in &formats {
        match *fmt {
            "json" => {
                if let Some(raw) = session.raw_scores() {
                    let path = output.join(format!("raw-scores-{timestamp}.json"));
                    raw.save_json(&path)?;
                    println!("Raw scores saved to {}", path.display());
                }
                let path = output.join(format!("final-marks-{timestamp}.json"));
                finals.save_json(&path)?;
                println!("Final marks saved to {}", path.display());
            }
            "html" => {
                let monitored = config.monitoring.reference();
                warnings.extend(monitored.warning);
                let reference = build_reference(
                    &quiz,
                    &monitored.value.parameters,
                    config.monitoring.use_full_hash,
                );
                let anomalies = detect(
                    &log.events,
                    &reference,
                    config.monitoring.ignore_keys.as_slice(),
                    !config.monitoring.only_anomalies,
                );

                let mut report = DashboardReport::new(&quiz.name, log.events.len());
                report.grouped_anomalies = group_anomalies_per_student(&anomalies);
                report.anomalies = anomalies;
                report.activity = aggregate(&reduce(&log.events));
                report.warnings = warnings.clone();
                let report = report.with_grades(finals.clone());

                let path = output.join(format!("dashboard-{timestamp}.html"));
                write_html_report(&report, &path)?;
                println!("Dashboard saved to {}", path.display());
            }
            other => {
                eprintln!("Unknown format: {other}");
            }
        }
    }

    Ok(())
}
