//! End-to-end tag session tests
//!
//! Two engines share one scripted transport, standing in for two phones
//! taking turns on the same tag.

use std::sync::Arc;
use std::time::Duration;

use spark_core::tag::MULTIPLE_TAGS_NOTICE;
use spark_core::{
    ConfirmOutcome, InterestCategory, MockTransport, RecordOutcome, SessionConfig,
    SessionFailure, SessionResult, SharedInterests, SparkEngine, TagCapability, TagId,
    TagMessage, TransportError,
};

fn single_tag() -> Result<Vec<TagId>, TransportError> {
    Ok(vec![TagId::new("04:a2:19")])
}

fn logged_in(tag: Arc<MockTransport>, username: &str) -> SparkEngine {
    let engine = SparkEngine::in_memory(tag, SessionConfig::default());
    engine.sign_up(username, "pw", "").unwrap();
    engine.log_in(username, "pw").unwrap();
    engine
}

fn accept(_: &str, _: &SharedInterests) -> ConfirmOutcome {
    ConfirmOutcome::connect()
}

#[tokio::test]
async fn test_partial_overlap_is_recorded() {
    let _ = tracing_subscriber::fmt::try_init();
    let tag = Arc::new(MockTransport::new().with_discoveries([single_tag(), single_tag()]));

    let bob = logged_in(tag.clone(), "bob");
    bob.remove_interest(InterestCategory::Academic, "Science").unwrap();
    bob.add_interest(InterestCategory::Media, "Podcasts").unwrap();
    assert_eq!(bob.share_profile().unwrap().outcome().await, Ok(SessionResult::WriteAck));

    let alice = logged_in(tag.clone(), "alice");
    let mut seen = Vec::new();
    let mut prompt = |peer: &str, shared: &SharedInterests| {
        seen.push((peer.to_string(), shared.to_string()));
        ConfirmOutcome::connect()
    };
    let encounter = alice.exchange(&mut prompt).await.unwrap();

    assert_eq!(encounter.peer.username, "bob");
    assert_eq!(encounter.shared.len(), 5);
    assert!(matches!(encounter.outcome, RecordOutcome::Recorded(_)));
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, "bob");
    assert!(!seen[0].1.contains("Science"));
    assert_eq!(tag.max_in_flight(), 1);
}

#[tokio::test]
async fn test_declined_encounter_changes_nothing() {
    let tag = Arc::new(MockTransport::new().with_discoveries([single_tag(), single_tag()]));
    let bob = logged_in(tag.clone(), "bob");
    bob.share_profile().unwrap().outcome().await.unwrap();

    let alice = logged_in(tag, "alice");
    let mut decline = |_: &str, _: &SharedInterests| ConfirmOutcome::Cancel;
    let encounter = alice.exchange(&mut decline).await.unwrap();

    assert_eq!(encounter.outcome, RecordOutcome::Declined);
    assert_eq!(alice.current_user().unwrap().connection_count(), 0);
}

#[tokio::test]
async fn test_empty_tag_reports_no_message() {
    let tag = Arc::new(MockTransport::new().with_discoveries([single_tag()]));
    let alice = logged_in(tag.clone(), "alice");

    let result = alice.exchange(&mut accept).await;
    assert_eq!(result.err(), Some(SessionFailure::NoMessage));
    assert_eq!(tag.release_count(), 1);
}

#[tokio::test]
async fn test_incompatible_tag() {
    let tag = Arc::new(
        MockTransport::new()
            .with_discoveries([single_tag()])
            .with_capability(Ok(TagCapability::NotSupported)),
    );
    let alice = logged_in(tag.clone(), "alice");

    let outcome = alice.share_profile().unwrap().outcome().await;
    assert_eq!(outcome, Err(SessionFailure::Incompatible));
    assert!(tag.message().is_none());
}

#[tokio::test]
async fn test_write_failure_is_reported() {
    let tag = Arc::new(
        MockTransport::new()
            .with_discoveries([single_tag()])
            .with_write_error(TransportError::Failed("tag moved".to_string())),
    );
    let alice = logged_in(tag.clone(), "alice");

    let outcome = alice.share_profile().unwrap().outcome().await;
    assert_eq!(outcome, Err(SessionFailure::WriteError("tag moved".to_string())));
    assert_eq!(tag.release_count(), 1);
}

#[tokio::test]
async fn test_read_failure_is_reported() {
    let tag = Arc::new(
        MockTransport::new()
            .with_discoveries([single_tag()])
            .with_message(TagMessage::from_payload(b"Username: bob".to_vec()))
            .with_read_error(TransportError::Failed("lost".to_string())),
    );
    let alice = logged_in(tag, "alice");

    let result = alice.exchange(&mut accept).await;
    assert_eq!(result.err(), Some(SessionFailure::ReadError("lost".to_string())));
}

#[tokio::test(start_paused = true)]
async fn test_multiple_tags_notice_then_success() {
    let _ = tracing_subscriber::fmt::try_init();
    let two = Ok(vec![TagId::new("a"), TagId::new("b")]);
    let tag = Arc::new(
        MockTransport::new()
            .with_discoveries([two, single_tag()])
            .with_message(TagMessage::from_payload(b"Username: bob\nMedia Interests: Music".to_vec())),
    );
    let alice = logged_in(tag.clone(), "alice");
    let mut notices = alice.subscribe_notices();

    let encounter = alice.exchange(&mut accept).await.unwrap();
    assert_eq!(encounter.shared.into_vec(), vec!["Music".to_string()]);

    let notice = notices.recv().await.unwrap();
    assert_eq!(notice.message, MULTIPLE_TAGS_NOTICE);
    assert_eq!(tag.discover_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_custom_timeout() {
    let tag = Arc::new(MockTransport::new());
    let engine = SparkEngine::in_memory(
        tag.clone(),
        SessionConfig::default().with_session_timeout(Duration::from_secs(3)),
    );

    let started = tokio::time::Instant::now();
    let outcome = engine.scan().outcome().await;
    assert_eq!(outcome, Err(SessionFailure::Timeout));
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert_eq!(tag.release_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_session_from_engine() {
    let tag = Arc::new(MockTransport::new());
    let engine = SparkEngine::in_memory(tag.clone(), SessionConfig::default());

    let handle = engine.scan();
    tokio::time::sleep(Duration::from_millis(50)).await;
    engine.cancel_session();

    assert_eq!(handle.outcome().await, Err(SessionFailure::Cancelled));
    assert_eq!(tag.release_count(), 1);
}
