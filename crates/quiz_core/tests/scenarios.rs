use quiz_core::{PhaseKind, Question, Quiz, QuizEngine, QuizOption, SubmissionTrigger, TickOutcome};
use uuid::Uuid;

/// Five questions, 70% to pass; option "a" is always correct.
fn five_question_quiz(time_limit_minutes: u32) -> Quiz {
    Quiz {
        id: Uuid::new_v4(),
        title: "Intro to Rust".to_string(),
        description: "End of module check".to_string(),
        time_limit_minutes,
        passing_score_percent: 70,
        questions: (0..5)
            .map(|i| Question {
                id: format!("q{}", i),
                text: format!("Question {}", i + 1),
                options: ["a", "b", "c"]
                    .iter()
                    .map(|o| QuizOption {
                        id: o.to_string(),
                        text: format!("Option {}", o),
                    })
                    .collect(),
                correct_option_id: "a".to_string(),
            })
            .collect(),
    }
}

fn taking(time_limit_minutes: u32) -> QuizEngine {
    let mut engine = QuizEngine::new(five_question_quiz(time_limit_minutes)).unwrap();
    engine.start().unwrap();
    engine
}

#[test]
fn four_correct_one_wrong_passes() {
    let mut engine = taking(15);
    for i in 0..4 {
        engine.select_answer(&format!("q{}", i), "a").unwrap();
    }
    engine.select_answer("q4", "b").unwrap();

    let score = engine.submit().unwrap();
    assert_eq!(score.correct_count, 4);
    assert_eq!(score.score_percent, 80);
    assert!(score.passed);
}

#[test]
fn three_correct_two_unanswered_fails() {
    let mut engine = taking(15);
    for i in 0..3 {
        engine.select_answer(&format!("q{}", i), "a").unwrap();
    }

    let score = engine.submit().unwrap();
    assert_eq!(score.correct_count, 3);
    assert_eq!(score.score_percent, 60);
    assert!(!score.passed);
}

#[test]
fn countdown_expiry_moves_to_result() {
    let mut engine = taking(15);
    assert_eq!(engine.time_remaining_seconds(), 900);
    engine.select_answer("q0", "a").unwrap();
    engine.select_answer("q1", "c").unwrap();

    let mut expired = 0;
    for n in 1..=900 {
        match engine.tick() {
            TickOutcome::Running {
                time_remaining_seconds,
            } => assert_eq!(time_remaining_seconds, 900 - n),
            TickOutcome::Expired(_) => expired += 1,
            TickOutcome::Inactive => panic!("session stopped early at tick {}", n),
        }
    }

    assert_eq!(expired, 1);
    assert_eq!(engine.phase_kind(), PhaseKind::Result);
    assert_eq!(engine.trigger(), Some(SubmissionTrigger::TimeExpired));
    assert_eq!(engine.answered_count(), 2);
    assert_eq!(engine.score().unwrap().correct_count, 1);

    // Extra ticks after expiry change nothing.
    assert_eq!(engine.tick(), TickOutcome::Inactive);
    assert_eq!(engine.time_remaining_seconds(), 0);
    assert_eq!(engine.score().unwrap().correct_count, 1);
}

#[test]
fn navigating_away_and_back_keeps_other_answers() {
    let mut engine = taking(15);
    engine.select_answer("q4", "b").unwrap();
    engine.select_answer("q2", "a").unwrap();

    engine.go_to(4).unwrap();
    engine.go_to(0).unwrap();
    engine.select_answer("q0", "a").unwrap();

    let answers = engine.answers().unwrap();
    assert_eq!(answers.len(), 3);
    assert_eq!(answers.get("q0").map(String::as_str), Some("a"));
    assert_eq!(answers.get("q2").map(String::as_str), Some("a"));
    assert_eq!(answers.get("q4").map(String::as_str), Some("b"));
    assert_eq!(engine.current_question_index(), 0);
}

#[test]
fn retry_starts_a_clean_session() {
    let mut engine = taking(1);
    engine.select_answer("q0", "a").unwrap();
    engine.toggle_flag("q3").unwrap();
    engine.go_to(3).unwrap();
    let first = engine.submit().unwrap();
    assert_eq!(engine.submit().unwrap(), first);

    engine.retry().unwrap();
    assert_eq!(engine.phase_kind(), PhaseKind::Intro);
    assert_eq!(engine.current_question_index(), 0);
    assert_eq!(engine.answered_count(), 0);
    assert!(engine.flags().map_or(true, |f| f.is_empty()));

    engine.start().unwrap();
    assert_eq!(engine.time_remaining_seconds(), 60);
    let second = engine.submit().unwrap();
    assert_eq!(second.correct_count, 0);
}
