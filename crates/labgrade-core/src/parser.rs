//! TOML quiz definition parser.
//!
//! Loads quiz definitions from TOML files and directories, and validates them.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{Answer, ParamMap, ParamValue, Question, QuizDefinition};
use crate::traits::QuizDefinitionProvider;

/// Intermediate TOML structure for quiz definition files.
#[derive(Debug, Deserialize)]
struct TomlQuizFile {
    quiz: TomlQuizHeader,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlQuizHeader {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    parameters: ParamMap,
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    id: String,
    quiz_title: String,
    #[serde(default)]
    label: String,
    expected: Answer,
    #[serde(default)]
    points: Option<f64>,
}

/// Parse a single TOML file into a `QuizDefinition`.
pub fn parse_quiz_definition(path: &Path) -> Result<QuizDefinition> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read quiz file: {}", path.display()))?;

    parse_quiz_definition_str(&content, path)
}

/// Parse a TOML string into a `QuizDefinition`.
pub fn parse_quiz_definition_str(content: &str, source_path: &Path) -> Result<QuizDefinition> {
    let parsed: TomlQuizFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let questions = parsed
        .questions
        .into_iter()
        .map(|q| {
            if let Some(points) = q.points {
                if !points.is_finite() || points < 0.0 {
                    anyhow::bail!("question '{}': points must be a non-negative number", q.id);
                }
            }
            Ok(Question {
                id: q.id,
                quiz_title: q.quiz_title,
                label: q.label,
                expected: q.expected,
                points: q.points,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(QuizDefinition {
        id: parsed.quiz.id,
        name: parsed.quiz.name,
        description: parsed.quiz.description,
        parameters: parsed.quiz.parameters,
        questions,
    })
}

/// Recursively load all `.toml` quiz definitions from a directory.
pub fn load_quiz_directory(dir: &Path) -> Result<Vec<QuizDefinition>> {
    let mut quizzes = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let path = entry?.path();

        if path.is_dir() {
            quizzes.extend(load_quiz_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_quiz_definition(&path) {
                Ok(quiz) => quizzes.push(quiz),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(quizzes)
}

/// A warning from quiz definition validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The question ID (if applicable).
    pub question_id: Option<String>,
    pub message: String,
}

/// Validate a quiz definition for common issues.
pub fn validate_quiz_definition(quiz: &QuizDefinition) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if quiz.questions.is_empty() {
        warnings.push(ValidationWarning {
            question_id: None,
            message: "quiz has no questions".into(),
        });
    }

    // Question ids are score-table columns
    let mut seen_ids = HashSet::new();
    for question in &quiz.questions {
        if !seen_ids.insert(&question.id) {
            warnings.push(ValidationWarning {
                question_id: Some(question.id.clone()),
                message: format!("duplicate question ID: {}", question.id),
            });
        }
        if question.quiz_title.trim().is_empty() {
            warnings.push(ValidationWarning {
                question_id: Some(question.id.clone()),
                message: "quiz_title is empty".into(),
            });
        }
        if let Answer::Choices(choices) = &question.expected {
            if choices.is_empty() {
                warnings.push(ValidationWarning {
                    question_id: Some(question.id.clone()),
                    message: "expected answer has no propositions".into(),
                });
            }
        }
        if question.points == Some(0.0) {
            warnings.push(ValidationWarning {
                question_id: Some(question.id.clone()),
                message: "points is 0, the question will not count".into(),
            });
        }
    }

    for (key, value) in &quiz.parameters {
        if matches!(value, ParamValue::Text(_)) {
            warnings.push(ValidationWarning {
                question_id: None,
                message: format!(
                    "parameter '{key}' is text; operator parameter strings only carry booleans and numbers"
                ),
            });
        }
    }

    warnings
}

/// Loads the quiz definition from a TOML file on every call.
#[derive(Debug, Clone)]
pub struct TomlQuizProvider {
    path: PathBuf,
}

impl TomlQuizProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl QuizDefinitionProvider for TomlQuizProvider {
    fn load(&self) -> Result<QuizDefinition> {
        parse_quiz_definition(&self.path)
    }
}
