pub mod activity;
pub mod grade;
pub mod init;
pub mod monitor;
pub mod regrade;
pub mod validate;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use comfy_table::Table;

use labgrade_core::model::QuizDefinition;
use labgrade_core::parser::TomlQuizProvider;
use labgrade_core::scores::ScoreTable;
use labgrade_core::traits::{EventSource, QuizDefinitionProvider};
use labgrade_sources::config::LabgradeConfig;
use labgrade_sources::create_source;
use labgrade_sources::file::FileSource;

/// `--events` wins over the configured source.
fn resolve_source(config: &LabgradeConfig, events: Option<PathBuf>) -> Result<Box<dyn EventSource>> {
    match (events, config.source.as_ref()) {
        (Some(path), _) => Ok(Box::new(FileSource::new(path))),
        (None, Some(source)) => create_source(source),
        (None, None) => anyhow::bail!(
            "no event source: pass --events or add a [source] section to labgrade.toml"
        ),
    }
}

fn load_quiz(path: &Path) -> Result<QuizDefinition> {
    TomlQuizProvider::new(path)
        .load()
        .with_context(|| format!("failed to load quiz definition: {}", path.display()))
}

/// Explicit `--quiz`, or the configured quiz file when it exists.
fn optional_quiz(config: &LabgradeConfig, quiz: Option<PathBuf>) -> Result<Option<QuizDefinition>> {
    match quiz {
        Some(path) => load_quiz(&path).map(Some),
        None if config.quiz_file.exists() => load_quiz(&config.quiz_file).map(Some),
        None => Ok(None),
    }
}

fn warn(message: &str) {
    eprintln!("Warning: {message}");
}

fn format_mark(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".into())
}

fn print_scores(table: &ScoreTable) {
    if table.is_empty() {
        println!("No graded submissions.");
        return;
    }

    let columns = table.columns();
    let mut out = Table::new();
    out.set_header(&columns);
    for row in &table.rows {
        let mut cells = vec![row.student.clone()];
        for question in &table.questions {
            cells.push(format_mark(row.scores.get(question).copied()));
        }
        if table.has_note() {
            cells.push(format_mark(row.note));
        }
        if columns.iter().any(|c| c == "FinalMark") {
            cells.push(format_mark(row.final_mark));
        }
        out.add_row(cells);
    }
    println!("{out}");

    if let Some(summary) = table.summary() {
        let std_dev = summary
            .std_dev
            .map(|s| format!("{s:.2}"))
            .unwrap_or_else(|| "n/a".into());
        println!(
            "\n{} students: mean {:.2}, std dev {std_dev}, min {:.2}, max {:.2}",
            summary.count, summary.mean, summary.min, summary.max
        );
    }
}
