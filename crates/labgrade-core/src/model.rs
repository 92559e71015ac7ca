//! Core data model types for labgrade.
//!
//! The event log is the only durable input: everything else (reduced
//! attempts, anomaly reports, score tables) is derived from it on demand.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scores::Bareme;

/// Kind of a logged quiz action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A student submitted a quiz.
    Validate,
    /// A student submitted a randomized exam draw.
    ValidateExam,
    /// The student opened the correction of the quiz.
    Correction,
    /// Anything else the client logs (page loads, hints, ...).
    #[serde(other)]
    Other,
}

impl EventType {
    /// Whether this event is a submission that can be graded.
    pub fn is_submission(self) -> bool {
        matches!(self, EventType::Validate | EventType::ValidateExam)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Validate => write!(f, "validate"),
            EventType::ValidateExam => write!(f, "validate_exam"),
            EventType::Correction => write!(f, "correction"),
            EventType::Other => write!(f, "other"),
        }
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "validate" => Ok(EventType::Validate),
            "validate_exam" => Ok(EventType::ValidateExam),
            "correction" => Ok(EventType::Correction),
            "" => Err("empty event type".to_string()),
            _ => Ok(EventType::Other),
        }
    }
}

/// A declared run parameter value.
///
/// Comparison is exact and type-strict: `true` never equals `1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            ParamValue::Number(n) => write!(f, "{n}"),
            ParamValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Number(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

/// Parameter name → declared value.
pub type ParamMap = BTreeMap<String, ParamValue>;

/// A student's answer to one question, or the expected answer in a quiz
/// definition.
///
/// A bare boolean is a question with a single implicit proposition; a map
/// holds one flag per proposition of a multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Single(bool),
    Choices(BTreeMap<String, bool>),
}

impl Answer {
    /// The (proposition, flag) pairs of this answer.
    pub fn propositions(&self) -> Vec<(&str, bool)> {
        match self {
            Answer::Single(value) => vec![("", *value)],
            Answer::Choices(map) => map.iter().map(|(k, v)| (k.as_str(), *v)).collect(),
        }
    }

    /// The flag given for `proposition`. Unticked propositions are `false`.
    pub fn value_of(&self, proposition: &str) -> bool {
        match self {
            Answer::Single(value) => *value,
            Answer::Choices(map) => map.get(proposition).copied().unwrap_or(false),
        }
    }
}

/// A single immutable entry of the activity log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Student identifier as typed in the quiz client.
    pub student: String,
    /// Title of the quiz (or exam) the event belongs to.
    pub quiz_title: String,
    /// What happened.
    pub event_type: EventType,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
    /// Run parameters declared by the client at that moment.
    #[serde(default)]
    pub parameters: ParamMap,
    /// Per-question answers, present on submissions.
    #[serde(default)]
    pub answers: Option<BTreeMap<String, Answer>>,
    /// Score computed client-side, if any.
    #[serde(default)]
    pub score: Option<f64>,
}

impl Event {
    /// Build a payload-free event.
    pub fn new(
        student: impl Into<String>,
        quiz_title: impl Into<String>,
        event_type: EventType,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            student: student.into(),
            quiz_title: quiz_title.into(),
            event_type,
            timestamp,
            parameters: ParamMap::new(),
            answers: None,
            score: None,
        }
    }

    pub fn with_parameters(mut self, parameters: ParamMap) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_answers(mut self, answers: BTreeMap<String, Answer>) -> Self {
        self.answers = Some(answers);
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }
}

/// The two tables handed over by the event source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    /// Every event, in log order.
    pub events: Vec<Event>,
    /// The source's filtered subset (its semantics belong to the source).
    #[serde(default)]
    pub filtered: Vec<Event>,
}

impl EventLog {
    /// A log with no filtered subset.
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            events,
            filtered: Vec::new(),
        }
    }

    /// The events a scorer should grade: the filtered subset when the
    /// source provided one, the full log otherwise.
    pub fn scoring_events(&self) -> &[Event] {
        if self.filtered.is_empty() {
            &self.events
        } else {
            &self.filtered
        }
    }

    /// Sorted distinct student names, ignoring blank ones.
    pub fn students(&self) -> Vec<String> {
        self.events
            .iter()
            .filter(|e| !e.student.trim().is_empty())
            .map(|e| e.student.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// One question of a quiz definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// Question identifier, used as a score-table column.
    pub id: String,
    /// Quiz the question belongs to.
    pub quiz_title: String,
    /// Optional statement, for reports.
    #[serde(default)]
    pub label: String,
    /// The correct answer.
    pub expected: Answer,
    /// Default coefficient of the question in the bareme.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<f64>,
}

/// Expected answers for a set of quizzes, plus the run parameters the
/// quizzes are meant to be taken with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizDefinition {
    /// Unique identifier of the definition file.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Keyword run parameters (`retries`, `exam_mode`, ...).
    #[serde(default)]
    pub parameters: ParamMap,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl QuizDefinition {
    /// Distinct quiz titles, in definition order.
    pub fn quiz_titles(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.questions
            .iter()
            .map(|q| q.quiz_title.as_str())
            .filter(|t| seen.insert(*t))
            .collect()
    }

    /// Questions belonging to `quiz_title`.
    pub fn questions_for<'a>(&'a self, quiz_title: &'a str) -> impl Iterator<Item = &'a Question> {
        self.questions
            .iter()
            .filter(move |q| q.quiz_title == quiz_title)
    }

    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Coefficients declared with `points` in the definition.
    pub fn declared_bareme(&self) -> Bareme {
        self.questions
            .iter()
            .filter_map(|q| q.points.map(|p| (q.id.clone(), p)))
            .collect()
    }
}
