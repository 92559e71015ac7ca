//! The `labgrade activity` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::Table;

use labgrade_core::activity::aggregate;
use labgrade_core::reducer::reduce;
use labgrade_sources::load_config_from;

use super::resolve_source;

pub async fn execute(
    events: Option<PathBuf>,
    format: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let source = resolve_source(&config, events)?;
    let log = source.fetch().await?;

    let attempts = reduce(&log.events);
    let summary = aggregate(&attempts);
    tracing::info!(
        events = log.events.len(),
        attempts = attempts.len(),
        students = summary.per_student_counts.len(),
        "activity aggregated"
    );

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
            return Ok(());
        }
        "table" => {}
        other => anyhow::bail!("unknown format '{other}' (expected table or json)"),
    }

    if summary.is_empty() {
        println!("No submissions yet.");
        return Ok(());
    }

    let mut classes = Table::new();
    classes.set_header(vec!["Quiz", "Students"]);
    for (title, count) in &summary.per_class_counts {
        classes.add_row(vec![title.clone(), count.to_string()]);
    }
    println!("{classes}");

    let mut students = Table::new();
    students.set_header(vec!["Student", "Quizzes", "Submitted", "Score"]);
    for (student, quizzes) in &summary.per_student_quiz_list {
        let score = summary
            .per_student_scores
            .get(student)
            .copied()
            .unwrap_or(0.0);
        students.add_row(vec![
            student.clone(),
            quizzes.nb.to_string(),
            quizzes.quizzes_list.join(", "),
            format!("{score:.2}"),
        ]);
    }
    println!("\n{students}");

    Ok(())
}
