use std::sync::Arc;

use backend::{Backend, BackendError, InMemoryBackend};
use chrono::Duration;
use exam_core::model::{
    AttemptStatus, OptionLabel, Question, QuestionId, QuestionOption, SubmitAck, TestDefinition,
    TestId, UserId,
};
use exam_core::time::fixed_now;
use services::{Clock, ExamSessionService, SessionError, SessionIdentity, SubmitPrompt};

fn seed_backend(questions: u64) -> InMemoryBackend {
    let backend = InMemoryBackend::new();
    let questions = (1..=questions)
        .map(|id| Question {
            id: QuestionId::new(id),
            text: format!("Question {id}"),
            options: vec![
                QuestionOption {
                    label: OptionLabel::A,
                    text: "first".into(),
                },
                QuestionOption {
                    label: OptionLabel::B,
                    text: "second".into(),
                },
            ],
            marks: 2,
            section: "General Awareness".into(),
        })
        .collect();
    let test = TestDefinition::new(TestId::new(21), "Champion Test", questions, 1, None).unwrap();
    backend.insert_test(test).unwrap();
    backend
}

#[tokio::test]
async fn manual_flow_submits_partial_answers_once() {
    let repo = seed_backend(5);
    let (clock, handle) = Clock::manual(fixed_now());
    let service = ExamSessionService::from_backend(
        clock,
        &Backend::in_memory(repo.clone()),
        Arc::new(SessionIdentity::signed_in(UserId::new(77))),
    );

    let mut session = service.open_session(TestId::new(21)).await.unwrap();
    assert_eq!(session.status(), AttemptStatus::NotStarted);
    session.accept_instructions().unwrap();

    for id in 1..=3 {
        session
            .select_answer(QuestionId::new(id), OptionLabel::B)
            .unwrap();
    }
    handle.advance(Duration::seconds(40));

    let prompt = session.request_submit().unwrap();
    assert_eq!(prompt.message().as_deref(), Some("3 of 5 answered"));
    let ticket = session.confirm_submit().unwrap().expect("ticket");
    service.submit(&mut session, ticket).await.unwrap();

    assert_eq!(session.status(), AttemptStatus::Submitted);
    let sent = repo.submissions().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].answers.len(), 3);
    assert_eq!(sent[0].elapsed_secs, 40);
    assert_eq!(sent[0].user_id, UserId::new(77));
    assert_eq!(session.ack().and_then(|a| a.reference.as_deref()), Some("21-77"));
}

#[tokio::test]
async fn rejected_submission_can_be_retried_manually() {
    let repo = seed_backend(1);
    repo.push_submit_outcome(Err(BackendError::Rejected("Please try later".into())))
        .unwrap();
    repo.push_submit_outcome(Ok(SubmitAck::default())).unwrap();
    let (clock, handle) = Clock::manual(fixed_now());
    let service = ExamSessionService::from_backend(
        clock,
        &Backend::in_memory(repo.clone()),
        Arc::new(SessionIdentity::signed_in(UserId::new(1))),
    );

    let mut session = service.open_session(TestId::new(21)).await.unwrap();
    session.accept_instructions().unwrap();
    session
        .select_answer(QuestionId::new(1), OptionLabel::A)
        .unwrap();

    let SubmitPrompt::Ready(ticket) = session.request_submit().unwrap() else {
        panic!("fully answered test should submit without confirmation");
    };
    let err = service.submit(&mut session, ticket).await.unwrap_err();
    assert_eq!(err, SessionError::SubmissionRejected("Please try later".into()));
    assert_eq!(session.status(), AttemptStatus::InProgress);

    // timer keeps running from the original start
    handle.advance(Duration::seconds(15));
    assert_eq!(session.remaining_secs(), Some(45));

    let SubmitPrompt::Ready(ticket) = session.request_submit().unwrap() else {
        panic!("retry should submit");
    };
    service.submit(&mut session, ticket).await.unwrap();
    assert_eq!(session.status(), AttemptStatus::Submitted);
    assert_eq!(repo.submissions().unwrap().len(), 2);
}

#[tokio::test]
async fn missing_test_is_reported() {
    let service = ExamSessionService::from_backend(
        Clock::fixed(fixed_now()),
        &Backend::in_memory(InMemoryBackend::new()),
        Arc::new(SessionIdentity::anonymous()),
    );
    let err = service.open_session(TestId::new(404)).await.unwrap_err();
    assert_eq!(err, SessionError::Backend(BackendError::NotFound));
    assert_eq!(err.user_message(), "This test could not be found.");
}

#[tokio::test]
async fn closed_window_cannot_start() {
    let repo = InMemoryBackend::new();
    let question = Question {
        id: QuestionId::new(1),
        text: "Q".into(),
        options: Vec::new(),
        marks: 1,
        section: "GK".into(),
    };
    let closes_at = fixed_now() - Duration::minutes(1);
    repo.insert_test(
        TestDefinition::new(TestId::new(3), "Late", vec![question], 30, Some(closes_at)).unwrap(),
    )
    .unwrap();
    let service = ExamSessionService::from_backend(
        Clock::fixed(fixed_now()),
        &Backend::in_memory(repo),
        Arc::new(SessionIdentity::signed_in(UserId::new(1))),
    );

    let mut session = service.open_session(TestId::new(3)).await.unwrap();
    let err = session.accept_instructions().unwrap_err();
    assert_eq!(err.user_message(), "This test is no longer open.");
    assert_eq!(session.status(), AttemptStatus::NotStarted);
}
