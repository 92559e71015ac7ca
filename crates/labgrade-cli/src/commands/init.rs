//! The `labgrade init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("labgrade.toml").exists() {
        println!("labgrade.toml already exists, skipping.");
    } else {
        std::fs::write("labgrade.toml", SAMPLE_CONFIG)?;
        println!("Created labgrade.toml");
    }

    let quiz_path = std::path::Path::new("quiz.toml");
    if quiz_path.exists() {
        println!("quiz.toml already exists, skipping.");
    } else {
        std::fs::write(quiz_path, EXAMPLE_QUIZ)?;
        println!("Created quiz.toml");
    }

    println!("\nNext steps:");
    println!("  1. Point [source] in labgrade.toml at your event log");
    println!("  2. Run: labgrade validate --quiz quiz.toml");
    println!("  3. Run: labgrade monitor, then labgrade grade --format all");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# labgrade configuration

quiz_file = "quiz.toml"
output_dir = "./labgrade-results"

[source]
type = "file"
path = "events.jsonl"

# Remote log instead of a local export; LABGRADE_SECRET overrides `secret`.
# [source]
# type = "http"
# url = "https://example.org/quiz-log"
# secret = "${LABGRADE_SECRET}"
# timeout_secs = 30

[monitoring]
parameters = "{'retries': 2, 'exam_mode': False}"
ignore_keys = []
use_full_hash = false
only_anomalies = false
refresh_minutes = 5

[grading]
threshold = 0
max_tries = 1
# Set to grade a randomized exam instead of the fixed quizzes.
exam_title = ""
bareme = "{}"

[grading.weights]
TP = 1
FP = -1
FN = 0
TN = 0
"#;

const EXAMPLE_QUIZ: &str = r#"[quiz]
id = "example"
name = "Example Quiz"
description = "Two short quizzes to get started"

[quiz.parameters]
retries = 2
exam_mode = false

[[questions]]
id = "q1"
quiz_title = "Quiz 1"
label = "Which of these are immutable in Python?"
expected = { tuple = true, list = false, str = true }
points = 2

[[questions]]
id = "q2"
quiz_title = "Quiz 1"
label = "`len` is a built-in function."
expected = true

[[questions]]
id = "q3"
quiz_title = "Quiz 2"
label = "Which statements create a loop?"
expected = { for = true, while = true, if = false }
"#;
