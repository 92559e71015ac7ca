//! The `labgrade monitor` command.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use comfy_table::Table;

use labgrade_core::anomaly::{
    detect, group_anomalies_per_student, AnomalyReport, ReferenceConfig, ReportRow, Severity,
};
use labgrade_core::error::SourceError;
use labgrade_core::integrity::build_reference;
use labgrade_core::params::parse_reference_lenient;
use labgrade_core::traits::EventSource;
use labgrade_sources::load_config_from;

use super::{optional_quiz, resolve_source, warn};

/// Flags of the `monitor` subcommand that override the `[monitoring]`
/// section of the config.
pub struct MonitorOptions {
    pub parameters: Option<String>,
    pub ignore: Option<String>,
    pub group: bool,
    pub only_anomalies: bool,
    pub full_hash: bool,
    pub watch: bool,
    pub refresh: Option<u64>,
    pub format: String,
}

struct Check {
    reference: ReferenceConfig,
    ignore_keys: Vec<String>,
    include_clean: bool,
    group: bool,
    json: bool,
}

pub async fn execute(
    events: Option<PathBuf>,
    quiz: Option<PathBuf>,
    options: MonitorOptions,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let json = match options.format.as_str() {
        "table" => false,
        "json" => true,
        other => anyhow::bail!("unknown format '{other}' (expected table or json)"),
    };

    let declared = match &options.parameters {
        Some(text) => parse_reference_lenient(text),
        None => config.monitoring.reference(),
    };
    if let Some(w) = &declared.warning {
        warn(w);
    }

    let use_full_hash = options.full_hash || config.monitoring.use_full_hash;
    let reference = match optional_quiz(&config, quiz)? {
        Some(quiz) => build_reference(&quiz, &declared.value.parameters, use_full_hash),
        None if use_full_hash => {
            anyhow::bail!("the full hash needs a quiz definition: pass --quiz or set quiz_file")
        }
        None => declared.value,
    };
    if reference.is_empty() {
        warn("reference is empty, nothing will be compared");
    }

    let ignore_keys = match &options.ignore {
        Some(list) => list
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        None => config.monitoring.ignore_keys.clone(),
    };

    let check = Check {
        reference,
        ignore_keys,
        include_clean: !(options.only_anomalies || config.monitoring.only_anomalies),
        group: options.group,
        json,
    };
    let source = resolve_source(&config, events)?;

    if !options.watch {
        return run_pass(source.as_ref(), &check).await;
    }

    let minutes = options.refresh.unwrap_or(config.monitoring.refresh_minutes).max(1);
    tracing::info!(source = source.name(), minutes, "watching event log");
    let mut interval = tokio::time::interval(Duration::from_secs(minutes * 60));
    loop {
        interval.tick().await;
        if let Err(e) = run_pass(source.as_ref(), &check).await {
            let permanent = e
                .downcast_ref::<SourceError>()
                .is_some_and(SourceError::is_permanent);
            if permanent {
                return Err(e);
            }
            warn(&format!("pull failed, retrying at next refresh: {e:#}"));
        }
    }
}

async fn run_pass(source: &dyn EventSource, check: &Check) -> Result<()> {
    let log = source.fetch().await?;
    let report = detect(
        &log.events,
        &check.reference,
        check.ignore_keys.as_slice(),
        check.include_clean,
    );
    tracing::info!(
        events = log.events.len(),
        anomalies = report.anomaly_count(),
        "integrity check"
    );

    if check.json {
        let json = if check.group {
            serde_json::to_string_pretty(&group_anomalies_per_student(&report))?
        } else {
            serde_json::to_string_pretty(&report)?
        };
        println!("{json}");
    } else if check.group {
        print_grouped(&report);
    } else {
        print_flat(&report);
    }
    Ok(())
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Warning => "warning",
        Severity::Critical => "CRITICAL",
    }
}

fn print_flat(report: &AnomalyReport) {
    if report.is_empty() {
        println!("No anomalies.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["Student", "Parameter", "Expected", "Observed", "Severity"]);
    for row in &report.rows {
        match row {
            ReportRow::Anomaly(record) => {
                table.add_row(vec![
                    record.student.clone(),
                    record.parameter_name.clone(),
                    record.expected.to_string(),
                    record
                        .observed
                        .as_ref()
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| "(missing)".into()),
                    severity_label(record.severity).to_string(),
                ]);
            }
            ReportRow::Clean { student } => {
                table.add_row(vec![
                    student.clone(),
                    "-".into(),
                    "-".into(),
                    "-".into(),
                    "RAS".into(),
                ]);
            }
        }
    }
    println!("{table}");
    println!("\n{} anomalies", report.anomaly_count());
}

fn print_grouped(report: &AnomalyReport) {
    let grouped = group_anomalies_per_student(report);
    if grouped.is_empty() {
        println!("No anomalies.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["Student", "Count", "Severity", "Details"]);
    for g in &grouped {
        table.add_row(vec![
            g.student.clone(),
            g.count.to_string(),
            severity_label(g.severity).to_string(),
            g.details.clone(),
        ]);
    }
    println!("{table}");
}
