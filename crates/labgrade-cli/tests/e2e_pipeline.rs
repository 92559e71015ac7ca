//! End-to-end pipeline tests: source → monitoring → correction session.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use labgrade_core::activity::aggregate;
use labgrade_core::anomaly::{detect, group_anomalies_per_student, Severity};
use labgrade_core::grading::{GradingConfig, GradingEngine, GradingMode};
use labgrade_core::integrity::build_reference;
use labgrade_core::model::{
    Answer, Event, EventLog, EventType, ParamMap, ParamValue, Question, QuizDefinition,
};
use labgrade_core::reducer::reduce;
use labgrade_core::scores::Bareme;
use labgrade_core::session::{CorrectionSession, SessionState};
use labgrade_core::traits::EventSource;
use labgrade_scorer::LocalScorer;
use labgrade_sources::decode_event_log;
use labgrade_sources::mock::MemorySource;

fn ts(minute: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_740_000_000 + minute * 60, 0).unwrap()
}

fn params(retries: f64) -> ParamMap {
    [
        ("retries".to_string(), ParamValue::Number(retries)),
        ("exam_mode".to_string(), ParamValue::Bool(false)),
    ]
    .into_iter()
    .collect()
}

fn quiz() -> QuizDefinition {
    QuizDefinition {
        id: "lab".into(),
        name: "Lab".into(),
        description: String::new(),
        parameters: params(2.0),
        questions: vec![
            Question {
                id: "q1".into(),
                quiz_title: "Quiz 1".into(),
                label: String::new(),
                expected: Answer::Single(true),
                points: Some(3.0),
            },
            Question {
                id: "q2".into(),
                quiz_title: "Quiz 2".into(),
                label: String::new(),
                expected: Answer::Single(true),
                points: None,
            },
        ],
    }
}

fn submit(student: &str, title: &str, minute: i64, answers: &[(&str, bool)]) -> Event {
    let answers: BTreeMap<String, Answer> = answers
        .iter()
        .map(|(q, a)| (q.to_string(), Answer::Single(*a)))
        .collect();
    Event::new(student, title, EventType::Validate, ts(minute))
        .with_parameters(params(2.0))
        .with_answers(answers)
        .with_score(1.0)
}

fn engine(quiz: &QuizDefinition) -> GradingEngine {
    GradingEngine::new(
        Arc::new(LocalScorer::new()),
        GradingConfig {
            bareme: quiz.declared_bareme(),
            max_tries: 2,
            ..Default::default()
        },
    )
}

#[tokio::test]
async fn monitoring_and_correction_on_one_log() {
    let quiz = quiz();
    let mut cheater = submit("bob", "Quiz 1", 2, &[("q1", true)]);
    cheater.parameters = params(9.0);
    let source = MemorySource::new(EventLog::new(vec![
        submit("ana", "Quiz 1", 1, &[("q1", true)]),
        cheater,
        submit("ana", "Quiz 2", 3, &[("q2", true)]),
    ]));

    let log = source.fetch().await.unwrap();

    let reference = build_reference(&quiz, &ParamMap::new(), true);
    let report = detect(&log.events, &reference, &[] as &[&str], true);
    let grouped = group_anomalies_per_student(&report);
    // everyone misses the full hash; bob also declares other retries
    assert_eq!(grouped.len(), 2);
    let bob = grouped.iter().find(|g| g.student == "bob").unwrap();
    assert_eq!(bob.count, 2);
    assert_eq!(bob.severity, Severity::Critical);

    let activity = aggregate(&reduce(&log.events));
    assert_eq!(activity.per_student_counts["ana"], 2);
    assert_eq!(activity.per_class_counts[0], ("Quiz 1".to_string(), 2));

    let engine = engine(&quiz);
    let mut session = CorrectionSession::new();
    let raw = session.run_correction(&engine, &log, &quiz).unwrap();
    assert_eq!(raw.questions, vec!["q1", "q2"]);
    assert!(!raw.has_note());
    assert_eq!(session.coefficients().coefficient("q1"), 3.0);

    let coefficients = session.coefficients().clone();
    let finals = session
        .finalize(&engine, &log, &quiz, coefficients)
        .unwrap();
    assert_eq!(finals.row("ana").unwrap().final_mark, Some(20.0));
    // unanswered q2 counts as a wrong answer: (3·1 + 1·(-1)) / 4 · 20
    assert_eq!(finals.row("bob").unwrap().final_mark, Some(10.0));
    assert_eq!(session.state(), SessionState::Finalized);
}

#[tokio::test]
async fn refresh_rescores_new_submissions() {
    let quiz = quiz();
    let source = MemorySource::new(EventLog::new(vec![submit(
        "ana",
        "Quiz 1",
        1,
        &[("q1", false)],
    )]));
    let engine = engine(&quiz);
    let mut session = CorrectionSession::new();

    let log = source.fetch().await.unwrap();
    session.run_correction(&engine, &log, &quiz).unwrap();
    let first = session.raw_scores().unwrap().row("ana").unwrap().scores["q1"];
    assert_eq!(first, -1.0);

    // a retry before opening the correction counts
    let mut events = log.events.clone();
    events.push(submit("ana", "Quiz 1", 2, &[("q1", true)]));
    source.replace(EventLog::new(events));

    let log = source.fetch().await.unwrap();
    session.run_correction(&engine, &log, &quiz).unwrap();
    assert_eq!(session.state(), SessionState::Scored);
    assert!(session.final_scores().is_none());
    assert_eq!(
        session.raw_scores().unwrap().row("ana").unwrap().scores["q1"],
        1.0
    );
    assert_eq!(source.fetch_count(), 2);
}

#[tokio::test]
async fn randomized_exam_through_decoded_log() {
    let body = r#"{"events": [
        {"student": "eve", "quiz_title": "Exam", "event_type": "validate_exam",
         "timestamp": "2025-03-01T10:00:00Z", "answers": {"q2": true}},
        {"student": "eve", "quiz_title": "Exam", "event_type": "correction",
         "timestamp": "2025-03-01T10:05:00Z"},
        {"student": "eve", "quiz_title": "Exam", "event_type": "validate_exam",
         "timestamp": "2025-03-01T10:06:00Z", "answers": {"q2": false}}
    ]}"#;
    let log = decode_event_log(body).unwrap();
    let quiz = quiz();
    let engine = GradingEngine::new(
        Arc::new(LocalScorer::new()),
        GradingConfig {
            mode: GradingMode::from_exam_title("Exam"),
            ..Default::default()
        },
    );

    let mut session = CorrectionSession::new();
    let raw = session.run_correction(&engine, &log, &quiz).unwrap();
    assert_eq!(raw.questions, vec!["q2"]);
    assert_eq!(raw.row("eve").unwrap().note, Some(20.0));

    let finals = session
        .finalize(&engine, &log, &quiz, Bareme::new())
        .unwrap();
    let eve = finals.row("eve").unwrap();
    assert_eq!(eve.final_mark, Some(20.0));
    assert_eq!(eve.note, None);
}
