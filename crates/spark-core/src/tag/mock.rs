//! Scripted in-memory transport
//!
//! Used by the test suites and by the CLI's dry runs. Discovery results are
//! consumed in order; once the script runs out, discovery waits forever the
//! way a real radio does when no tag is in range.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::payload::TagMessage;
use crate::tag::{TagCapability, TagId, TagTransport, TransportError};

#[derive(Debug)]
pub struct MockTransport {
    available: bool,
    discoveries: Mutex<VecDeque<Result<Vec<TagId>, TransportError>>>,
    connect_result: Mutex<Result<(), TransportError>>,
    capability: Mutex<Result<TagCapability, TransportError>>,
    read_error: Mutex<Option<TransportError>>,
    write_error: Mutex<Option<TransportError>>,
    /// Current tag contents; writes replace it
    message: Mutex<Option<TagMessage>>,
    calls: Mutex<Vec<&'static str>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// A working read/write tag with nothing scripted yet
    pub fn new() -> Self {
        Self {
            available: true,
            discoveries: Mutex::new(VecDeque::new()),
            connect_result: Mutex::new(Ok(())),
            capability: Mutex::new(Ok(TagCapability::ReadWrite)),
            read_error: Mutex::new(None),
            write_error: Mutex::new(None),
            message: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// A device without tag hardware
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    pub fn with_discoveries(
        self,
        results: impl IntoIterator<Item = Result<Vec<TagId>, TransportError>>,
    ) -> Self {
        self.discoveries.lock().extend(results);
        self
    }

    pub fn with_connect_result(self, result: Result<(), TransportError>) -> Self {
        *self.connect_result.lock() = result;
        self
    }

    pub fn with_capability(self, result: Result<TagCapability, TransportError>) -> Self {
        *self.capability.lock() = result;
        self
    }

    pub fn with_message(self, message: TagMessage) -> Self {
        *self.message.lock() = Some(message);
        self
    }

    pub fn with_read_error(self, error: TransportError) -> Self {
        *self.read_error.lock() = Some(error);
        self
    }

    pub fn with_write_error(self, error: TransportError) -> Self {
        *self.write_error.lock() = Some(error);
        self
    }

    /// Script one more discovery result while sessions are running
    pub fn push_discovery(&self, result: Result<Vec<TagId>, TransportError>) {
        self.discoveries.lock().push_back(result);
    }

    /// Current tag contents
    pub fn message(&self) -> Option<TagMessage> {
        self.message.lock().clone()
    }

    /// Names of every transport call made so far, in order
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    pub fn discover_count(&self) -> usize {
        self.count("discover")
    }

    pub fn release_count(&self) -> usize {
        self.count("release")
    }

    /// Highest number of calls that were outstanding at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn count(&self, name: &str) -> usize {
        self.calls.lock().iter().filter(|c| **c == name).count()
    }

    fn enter(&self, name: &'static str) -> InFlight<'_> {
        self.calls.lock().push(name);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight(&self.in_flight)
    }
}

/// Decrements the in-flight counter when a call finishes or is dropped
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TagTransport for MockTransport {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn discover(&self) -> Result<Vec<TagId>, TransportError> {
        let _call = self.enter("discover");
        let next = self.discoveries.lock().pop_front();
        match next {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }

    async fn connect(&self, _tag: &TagId) -> Result<(), TransportError> {
        let _call = self.enter("connect");
        tokio::task::yield_now().await;
        self.connect_result.lock().clone()
    }

    async fn query_capability(&self, _tag: &TagId) -> Result<TagCapability, TransportError> {
        let _call = self.enter("query_capability");
        tokio::task::yield_now().await;
        self.capability.lock().clone()
    }

    async fn read_message(&self, _tag: &TagId) -> Result<Option<TagMessage>, TransportError> {
        let _call = self.enter("read_message");
        tokio::task::yield_now().await;
        if let Some(error) = self.read_error.lock().clone() {
            return Err(error);
        }
        Ok(self.message.lock().clone())
    }

    async fn write_message(&self, _tag: &TagId, message: &TagMessage) -> Result<(), TransportError> {
        let _call = self.enter("write_message");
        tokio::task::yield_now().await;
        if let Some(error) = self.write_error.lock().clone() {
            return Err(error);
        }
        *self.message.lock() = Some(message.clone());
        Ok(())
    }

    async fn release(&self) {
        let _call = self.enter("release");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_discoveries_are_consumed_in_order() {
        let mock = MockTransport::new().with_discoveries([
            Ok(vec![TagId::new("a"), TagId::new("b")]),
            Ok(vec![TagId::new("a")]),
        ]);
        assert_eq!(mock.discover().await.unwrap().len(), 2);
        assert_eq!(mock.discover().await.unwrap().len(), 1);
        assert_eq!(mock.discover_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_script_waits() {
        let mock = MockTransport::new();
        let poll = tokio::time::timeout(std::time::Duration::from_secs(5), mock.discover()).await;
        assert!(poll.is_err());
        assert_eq!(mock.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_write_replaces_message() {
        let mock = MockTransport::new().with_message(TagMessage::from_payload(b"old".to_vec()));
        let tag = TagId::new("a");
        let fresh = TagMessage::from_payload(b"new".to_vec());
        mock.write_message(&tag, &fresh).await.unwrap();
        assert_eq!(mock.read_message(&tag).await.unwrap(), Some(fresh));
    }
}
