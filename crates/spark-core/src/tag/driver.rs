//! Async session runner
//!
//! [`TagController`] turns a [`TagTransport`] and the pure [`TagSession`]
//! machine into a running session. Each transport call is awaited before
//! the next event is fed in, so at most one operation is outstanding. The
//! multi-tag re-poll sleeps inside the session task and never blocks the
//! caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::SessionConfig;
use crate::error::SessionFailure;
use crate::tag::session::{
    SessionAction, SessionEvent, SessionIntent, SessionOutcome, TagSession,
};
use crate::tag::{TagTransport, TransportError};

/// Default capacity for the notice broadcast channel
const NOTICE_CHANNEL_CAPACITY: usize = 64;

/// A message the UI should show while a session runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionNotice {
    /// Session that produced the notice
    pub session_id: u64,
    pub message: String,
}

/// Handle to a running session
#[derive(Debug)]
pub struct SessionHandle {
    id: u64,
    cancel: CancellationToken,
    task: JoinHandle<SessionOutcome>,
}

impl SessionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Invalidate the session. It ends with [`SessionFailure::Cancelled`].
    pub fn invalidate(&self) {
        self.cancel.cancel();
    }

    /// Wait for the session to end
    pub async fn outcome(self) -> SessionOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(session = self.id, error = %e, "Session task aborted");
                Err(SessionFailure::Cancelled)
            }
        }
    }
}

/// Runs tag sessions one at a time over a shared transport
pub struct TagController<T: TagTransport + ?Sized> {
    transport: Arc<T>,
    config: SessionConfig,
    notices: broadcast::Sender<SessionNotice>,
    /// Held by the running session for its whole lifetime
    radio: Arc<tokio::sync::Mutex<()>>,
    active: parking_lot::Mutex<Option<CancellationToken>>,
    next_id: AtomicU64,
}

impl<T: TagTransport + ?Sized> std::fmt::Debug for TagController<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagController")
            .field("transport", &"<TagTransport>")
            .field("config", &self.config)
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl<T: TagTransport + ?Sized + 'static> TagController<T> {
    pub fn new(transport: Arc<T>, config: SessionConfig) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);
        Self {
            transport,
            config,
            notices,
            radio: Arc::new(tokio::sync::Mutex::new(())),
            active: parking_lot::Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Receive notices from every session started after this call
    pub fn subscribe(&self) -> broadcast::Receiver<SessionNotice> {
        self.notices.subscribe()
    }

    /// Start a session that reads a peer's payload
    pub fn start_read(&self) -> SessionHandle {
        self.start(SessionIntent::Read)
    }

    /// Start a session that writes `payload` to a tag
    pub fn start_write(&self, payload: Vec<u8>) -> SessionHandle {
        self.start(SessionIntent::Write(payload))
    }

    /// Start a session, invalidating any session still running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, intent: SessionIntent) -> SessionHandle {
        let cancel = CancellationToken::new();
        if let Some(previous) = self.active.lock().replace(cancel.clone()) {
            if !previous.is_cancelled() {
                debug!("Invalidating previous session");
            }
            previous.cancel();
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        info!(session = id, write = intent.is_write(), "Starting tag session");

        let driver = SessionDriver {
            id,
            transport: self.transport.clone(),
            session: TagSession::with_retry_delay(intent, self.config.retry_delay),
            session_timeout: self.config.session_timeout,
            notices: self.notices.clone(),
            cancel: cancel.clone(),
        };
        let radio = self.radio.clone();

        let task = tokio::spawn(async move {
            let _radio = tokio::select! {
                biased;
                _ = driver.cancel.cancelled() => {
                    info!(session = id, "Session invalidated before it started");
                    return Err(SessionFailure::Cancelled);
                }
                guard = radio.lock_owned() => guard,
            };
            driver.run().await
        });

        SessionHandle { id, cancel, task }
    }

    /// Invalidate the running session, if any
    pub fn invalidate(&self) {
        if let Some(token) = self.active.lock().take() {
            token.cancel();
        }
    }
}

struct SessionDriver<T: TagTransport + ?Sized> {
    id: u64,
    transport: Arc<T>,
    session: TagSession,
    session_timeout: Duration,
    notices: broadcast::Sender<SessionNotice>,
    cancel: CancellationToken,
}

impl<T: TagTransport + ?Sized> SessionDriver<T> {
    async fn run(mut self) -> SessionOutcome {
        let deadline = Instant::now() + self.session_timeout;
        let available = self.transport.is_available();
        let mut transition = self.session.handle_event(SessionEvent::Start { available });

        loop {
            if let Some(message) = transition.notice.take() {
                // No subscribers is fine
                let _ = self.notices.send(SessionNotice {
                    session_id: self.id,
                    message,
                });
            }

            let event = match transition.action {
                SessionAction::Release => {
                    self.transport.release().await;
                    debug!(session = self.id, "Transport released");
                    break;
                }
                SessionAction::None => SessionEvent::Invalidate,
                action => {
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => SessionEvent::Invalidate,
                        event = self.perform(action, deadline) => event,
                    }
                }
            };
            transition = self.session.handle_event(event);
        }

        self.session
            .state()
            .outcome()
            .unwrap_or(Err(SessionFailure::Cancelled))
    }

    /// Execute one transport action and report its result as an event
    async fn perform(&self, action: SessionAction, deadline: Instant) -> SessionEvent {
        match action {
            SessionAction::BeginDiscovery => self.discover(None, deadline).await,
            SessionAction::RetryDiscoveryAfter(delay) => self.discover(Some(delay), deadline).await,
            SessionAction::Connect(tag) => SessionEvent::Connected(self.transport.connect(&tag).await),
            SessionAction::QueryCapability(tag) => {
                SessionEvent::CapabilityQueried(self.transport.query_capability(&tag).await)
            }
            SessionAction::Read(tag) => {
                SessionEvent::ReadFinished(self.transport.read_message(&tag).await)
            }
            SessionAction::Write(tag, message) => {
                SessionEvent::WriteFinished(self.transport.write_message(&tag, &message).await)
            }
            // Handled by the run loop
            SessionAction::None | SessionAction::Release => SessionEvent::Invalidate,
        }
    }

    async fn discover(&self, delay: Option<Duration>, deadline: Instant) -> SessionEvent {
        let poll = async {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.transport.discover().await
        };

        match tokio::time::timeout_at(deadline, poll).await {
            Err(_) => SessionEvent::TimedOut,
            Ok(Ok(tags)) => {
                debug!(session = self.id, count = tags.len(), "Discovery poll finished");
                SessionEvent::TagsDiscovered(tags)
            }
            Ok(Err(TransportError::UserCancelled)) => SessionEvent::UserCancelled,
            Ok(Err(TransportError::Failed(reason))) => SessionEvent::DiscoveryFailed(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{encode, TagMessage};
    use crate::tag::session::{SessionResult, MULTIPLE_TAGS_NOTICE};
    use crate::tag::{MockTransport, TagCapability, TagId};
    use crate::types::InterestSet;

    fn controller(transport: MockTransport) -> (TagController<MockTransport>, Arc<MockTransport>) {
        let transport = Arc::new(transport);
        (
            TagController::new(transport.clone(), SessionConfig::default()),
            transport,
        )
    }

    fn one_tag() -> Vec<TagId> {
        vec![TagId::new("a")]
    }

    #[tokio::test]
    async fn test_read_session_end_to_end() {
        let interests = InterestSet::from_lists(["Math"], ["Golf"], ["Jazz"]);
        let mock = MockTransport::new()
            .with_discoveries([Ok(one_tag())])
            .with_message(TagMessage::from_payload(encode("bob", &interests)));
        let (controller, transport) = controller(mock);

        let outcome = controller.start_read().outcome().await.unwrap();
        match outcome {
            SessionResult::Peer(peer) => {
                assert_eq!(peer.username, "bob");
                assert_eq!(peer.interests, interests);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(transport.release_count(), 1);
        assert_eq!(transport.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_write_session_end_to_end() {
        let mock = MockTransport::new().with_discoveries([Ok(one_tag())]);
        let (controller, transport) = controller(mock);

        let payload = encode("alice", &InterestSet::default());
        let outcome = controller.start_write(payload.clone()).outcome().await;
        assert_eq!(outcome, Ok(SessionResult::WriteAck));
        assert_eq!(transport.message(), Some(TagMessage::from_payload(payload)));
        assert_eq!(transport.release_count(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_hardware() {
        let (controller, transport) = controller(MockTransport::unavailable());
        let outcome = controller.start_read().outcome().await;
        assert_eq!(outcome, Err(SessionFailure::UnsupportedHardware));
        assert_eq!(transport.release_count(), 1);
        assert_eq!(transport.calls(), vec!["release"]);
    }

    #[tokio::test]
    async fn test_discovery_error_releases() {
        let mock = MockTransport::new()
            .with_discoveries([Err(TransportError::Failed("radio off".to_string()))]);
        let (controller, transport) = controller(mock);

        let outcome = controller.start_read().outcome().await;
        assert_eq!(
            outcome,
            Err(SessionFailure::DiscoveryError("radio off".to_string()))
        );
        assert_eq!(transport.release_count(), 1);
        assert_eq!(transport.calls(), vec!["discover", "release"]);
    }

    #[tokio::test]
    async fn test_capability_query_error_releases() {
        let mock = MockTransport::new()
            .with_discoveries([Ok(one_tag())])
            .with_capability(Err(TransportError::Failed("no answer".to_string())));
        let (controller, transport) = controller(mock);

        let outcome = controller.start_write(b"x".to_vec()).outcome().await;
        assert_eq!(
            outcome,
            Err(SessionFailure::CapabilityQueryError("no answer".to_string()))
        );
        assert!(transport.message().is_none());
        assert_eq!(transport.release_count(), 1);
    }

    #[tokio::test]
    async fn test_read_only_tag_rejects_write() {
        let mock = MockTransport::new()
            .with_discoveries([Ok(one_tag())])
            .with_capability(Ok(TagCapability::ReadOnly));
        let (controller, transport) = controller(mock);

        let outcome = controller.start_write(b"x".to_vec()).outcome().await;
        assert_eq!(outcome, Err(SessionFailure::ReadOnlyTag));
        assert!(transport.message().is_none());
        assert_eq!(transport.release_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_multiple_tags_retry_after_delay() {
        let mock = MockTransport::new()
            .with_discoveries([
                Ok(vec![TagId::new("a"), TagId::new("b")]),
                Ok(vec![TagId::new("a"), TagId::new("b")]),
                Ok(one_tag()),
            ])
            .with_capability(Ok(TagCapability::ReadWrite));
        let (controller, transport) = controller(mock);
        let mut notices = controller.subscribe();

        let started = Instant::now();
        let handle = controller.start_write(b"payload".to_vec());
        let outcome = handle.outcome().await;

        assert_eq!(outcome, Ok(SessionResult::WriteAck));
        assert!(started.elapsed() >= Duration::from_millis(1000));
        assert_eq!(transport.discover_count(), 3);

        let first = notices.recv().await.unwrap();
        assert_eq!(first.message, MULTIPLE_TAGS_NOTICE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovery_timeout() {
        // No scripted discoveries: polling never finds a tag
        let (controller, transport) = controller(MockTransport::new());
        let outcome = controller.start_read().outcome().await;
        assert_eq!(outcome, Err(SessionFailure::Timeout));
        assert_eq!(transport.release_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_covers_retries() {
        let busy = vec![TagId::new("a"), TagId::new("b")];
        let mock = MockTransport::new().with_discoveries(std::iter::repeat(Ok(busy)).take(1000));
        let transport = Arc::new(mock);
        let controller = TagController::new(
            transport.clone(),
            SessionConfig::default().with_session_timeout(Duration::from_secs(2)),
        );

        let outcome = controller.start_read().outcome().await;
        assert_eq!(outcome, Err(SessionFailure::Timeout));
        // One immediate poll plus one per 500ms retry inside the 2s budget
        assert!(transport.discover_count() <= 5);
    }

    #[tokio::test]
    async fn test_user_cancel_during_discovery() {
        let mock = MockTransport::new().with_discoveries([Err(TransportError::UserCancelled)]);
        let (controller, transport) = controller(mock);
        let outcome = controller.start_read().outcome().await;
        assert_eq!(outcome, Err(SessionFailure::UserCancelled));
        assert_eq!(transport.release_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_releases_transport() {
        let (controller, transport) = controller(MockTransport::new());
        let handle = controller.start_read();

        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.invalidate();

        assert_eq!(handle.outcome().await, Err(SessionFailure::Cancelled));
        assert_eq!(transport.release_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_session_invalidates_previous() {
        let interests = InterestSet::default();
        let mock = MockTransport::new()
            .with_message(TagMessage::from_payload(encode("bob", &interests)));
        let (controller, transport) = controller(mock);

        // Nothing to discover yet, so the first session waits
        let first = controller.start_read();
        tokio::time::sleep(Duration::from_millis(100)).await;

        transport.push_discovery(Ok(one_tag()));
        let second = controller.start_read();

        assert_eq!(first.outcome().await, Err(SessionFailure::Cancelled));
        assert!(matches!(second.outcome().await, Ok(SessionResult::Peer(_))));
        assert_eq!(transport.release_count(), 2);
        assert_eq!(transport.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_controller_invalidate_without_session() {
        let (controller, transport) = controller(MockTransport::new());
        controller.invalidate();
        assert_eq!(transport.release_count(), 0);
    }
}
