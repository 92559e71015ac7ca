//! labgrade-scorer: Reference scorer.
//!
//! Grades each student's answers against the quiz definition. Only
//! submissions made before the student first opened a correction count,
//! and only the first `max_tries` of them; the last of those is graded.

pub mod correctness;

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;

use labgrade_core::model::{Answer, Event, EventType, Question};
use labgrade_core::reducer::pre_correction_submissions;
use labgrade_core::scores::{ScoreRow, ScoreTable};
use labgrade_core::traits::{ScoreRequest, Scorer};

pub use correctness::question_score;

/// Scores answers locally from the event log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalScorer;

impl LocalScorer {
    pub fn new() -> Self {
        Self
    }
}

impl Scorer for LocalScorer {
    fn name(&self) -> &str {
        "local"
    }

    fn score(&self, request: &ScoreRequest<'_>) -> Result<ScoreTable> {
        let events = request.log.scoring_events();
        let table = match request.title {
            None => score_fixed_title(events, request),
            Some(exam_title) => score_randomized(events, exam_title, request),
        };
        tracing::debug!(
            mode = if request.title.is_some() { "randomized" } else { "fixed" },
            students = table.rows.len(),
            "local scoring done"
        );
        Ok(table)
    }
}

/// The submission to grade among a pair's pre-correction submissions.
fn graded_submission<'a>(
    submissions: &[&'a Event],
    max_tries: u32,
    accept: impl Fn(EventType) -> bool,
) -> Option<&'a Event> {
    let allowed = max_tries.max(1) as usize;
    submissions
        .iter()
        .copied()
        .filter(|e| accept(e.event_type))
        .take(allowed)
        .last()
}

fn answer_of<'a>(submission: Option<&'a Event>, question_id: &str) -> Option<&'a Answer> {
    submission
        .and_then(|e| e.answers.as_ref())
        .and_then(|answers| answers.get(question_id))
}

/// `Σ S·b / Σ b · 20`, floored at the threshold.
fn note(row: &ScoreRow, request: &ScoreRequest<'_>) -> f64 {
    let mut weighted = 0.0;
    let mut total = 0.0;
    for (question, score) in &row.scores {
        let coefficient = request.bareme.coefficient(question);
        weighted += score * coefficient;
        total += coefficient;
    }
    let mark = if total > 0.0 {
        weighted * 20.0 / total
    } else {
        0.0
    };
    mark.max(request.threshold)
}

/// Every student answered every quiz of the definition with `validate`.
fn score_fixed_title(events: &[Event], request: &ScoreRequest<'_>) -> ScoreTable {
    let quiz = request.quiz;
    let titles = quiz.quiz_titles();
    let pre = pre_correction_submissions(events);

    let students: BTreeSet<&str> = pre
        .iter()
        .filter(|((_, title), subs)| {
            titles.contains(title) && subs.iter().any(|e| e.event_type == EventType::Validate)
        })
        .map(|((student, _), _)| *student)
        .collect();

    let rows = students
        .into_iter()
        .map(|student| {
            let mut row = ScoreRow::new(student);
            for title in &titles {
                let submission = pre.get(&(student, *title)).and_then(|subs| {
                    graded_submission(subs, request.max_tries, |t| t == EventType::Validate)
                });
                for question in quiz.questions_for(title) {
                    let score = question_score(
                        &question.expected,
                        answer_of(submission, &question.id),
                        request.weights,
                    );
                    row.scores.insert(question.id.clone(), score);
                }
            }
            row.note = Some(note(&row, request));
            row
        })
        .collect();

    ScoreTable {
        questions: quiz.questions.iter().map(|q| q.id.clone()).collect(),
        rows,
    }
}

/// Each student drew a subset of the definition's questions; only the
/// questions present in their answers are scored.
fn score_randomized(events: &[Event], exam_title: &str, request: &ScoreRequest<'_>) -> ScoreTable {
    let quiz = request.quiz;
    let pre = pre_correction_submissions(events);
    let mut drawn: BTreeSet<&str> = BTreeSet::new();
    let mut rows = Vec::new();

    for ((student, title), submissions) in &pre {
        if *title != exam_title {
            continue;
        }
        let Some(submission) =
            graded_submission(submissions, request.max_tries, EventType::is_submission)
        else {
            continue;
        };
        let answers: BTreeMap<&str, &Answer> = submission
            .answers
            .iter()
            .flatten()
            .map(|(id, answer)| (id.as_str(), answer))
            .collect();

        let mut row = ScoreRow::new(*student);
        for (id, answer) in answers {
            let Some(question) = quiz.question(id) else {
                tracing::debug!(student, question = id, "answer to unknown question ignored");
                continue;
            };
            drawn.insert(question.id.as_str());
            row.scores.insert(
                question.id.clone(),
                question_score(&question.expected, Some(answer), request.weights),
            );
        }
        row.note = Some(note(&row, request));
        rows.push(row);
    }

    let questions = quiz
        .questions
        .iter()
        .map(|q: &Question| q.id.as_str())
        .filter(|id| drawn.contains(id))
        .map(String::from)
        .collect();

    ScoreTable { questions, rows }
}
