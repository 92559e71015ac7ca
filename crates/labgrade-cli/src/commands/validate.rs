//! The `labgrade validate` command.

use std::path::PathBuf;

use anyhow::Result;

use labgrade_core::parser::{load_quiz_directory, parse_quiz_definition, validate_quiz_definition};

pub fn execute(quiz_path: PathBuf) -> Result<()> {
    let quizzes = if quiz_path.is_dir() {
        load_quiz_directory(&quiz_path)?
    } else {
        vec![parse_quiz_definition(&quiz_path)?]
    };

    let mut total_warnings = 0;

    for quiz in &quizzes {
        println!(
            "Quiz definition: {} ({} questions, {} quizzes)",
            quiz.name,
            quiz.questions.len(),
            quiz.quiz_titles().len()
        );

        let warnings = validate_quiz_definition(quiz);
        for w in &warnings {
            let prefix = w
                .question_id
                .as_ref()
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All quiz definitions valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
