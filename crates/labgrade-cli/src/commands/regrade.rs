//! The `labgrade regrade` command.
//!
//! Offline recomputation only works for fixed-title tables: randomized
//! exams need the scorer and the log, so they go through `grade`.

use std::path::PathBuf;

use anyhow::Result;

use labgrade_core::grading::recompute_fixed;
use labgrade_core::params::parse_bareme_lenient;
use labgrade_core::scores::{Bareme, ScoreTable};
use labgrade_sources::load_config_from;

use super::{optional_quiz, print_scores, warn};

pub fn execute(
    raw_path: PathBuf,
    coefficients: Option<String>,
    threshold: Option<f64>,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let raw = ScoreTable::load_json(&raw_path)?;
    if raw.has_note() {
        anyhow::bail!(
            "{} holds randomized-exam scores; rerun `labgrade grade --coefficients ...` instead",
            raw_path.display()
        );
    }

    let declared = optional_quiz(&config, None)?
        .map(|quiz| quiz.declared_bareme())
        .unwrap_or_default();
    let configured = config.grading.grading_config(&declared);
    if let Some(w) = &configured.warning {
        warn(w);
    }
    let mut chosen: Bareme = raw
        .questions
        .iter()
        .map(|q| (q.clone(), configured.value.bareme.coefficient(q)))
        .collect();
    if let Some(text) = &coefficients {
        let parsed = parse_bareme_lenient(text);
        if let Some(w) = &parsed.warning {
            warn(w);
        }
        for (question, value) in parsed.value.iter() {
            chosen.set(question.clone(), *value);
        }
    }
    chosen.validate()?;

    let threshold = threshold.unwrap_or(config.grading.threshold);
    let finals = recompute_fixed(&raw, &chosen, threshold)?;
    tracing::info!(
        students = finals.rows.len(),
        questions = finals.questions.len(),
        "final marks recomputed"
    );
    print_scores(&finals);

    if let Some(path) = output {
        finals.save_json(&path)?;
        println!("Final marks saved to {}", path.display());
    }

    Ok(())
}
