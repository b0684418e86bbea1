//! Recording transport used by the bridge tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::common::error::{CommandError, ConnectError};
use crate::common::messages::TransportEvent;
use crate::common::transport::{EventSender, Transport};
use crate::common::types::{ChannelRef, Side};

/// A transport that records outbound calls and replays scripted events.
pub struct MockTransport {
    side: Side,
    failures_left: AtomicUsize,
    connect_attempts: AtomicUsize,
    fail_commands: AtomicBool,
    on_connect: Mutex<Vec<TransportEvent>>,
    events: Mutex<Option<EventSender>>,
    set_topics: Mutex<Vec<(String, String)>>,
    notices: Mutex<Vec<(String, String)>>,
    topic_limit: Mutex<Option<usize>>,
}

impl MockTransport {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            failures_left: AtomicUsize::new(0),
            connect_attempts: AtomicUsize::new(0),
            fail_commands: AtomicBool::new(false),
            on_connect: Mutex::new(Vec::new()),
            events: Mutex::new(None),
            set_topics: Mutex::new(Vec::new()),
            notices: Mutex::new(Vec::new()),
            topic_limit: Mutex::new(None),
        }
    }

    /// Fail the next `count` connect attempts.
    pub fn fail_connects(self, count: usize) -> Self {
        self.failures_left.store(count, Ordering::SeqCst);
        self
    }

    /// Emit these events right after every successful connect.
    pub fn emit_on_connect(self, events: Vec<TransportEvent>) -> Self {
        *self.on_connect.lock().unwrap() = events;
        self
    }

    pub fn set_topic_limit(&self, limit: Option<usize>) {
        *self.topic_limit.lock().unwrap() = limit;
    }

    pub fn fail_commands(&self, fail: bool) {
        self.fail_commands.store(fail, Ordering::SeqCst);
    }

    /// Push an event into the live session. Returns false when not connected.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.events
            .lock()
            .unwrap()
            .as_ref()
            .map(|tx| tx.send(event).is_ok())
            .unwrap_or(false)
    }

    /// End the live session the way a dropped connection would.
    pub fn drop_connection(&self, reason: &str) {
        if let Some(tx) = self.events.lock().unwrap().take() {
            let _ = tx.send(TransportEvent::Disconnected {
                reason: reason.to_string(),
            });
        }
    }

    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn set_topics(&self) -> Vec<(String, String)> {
        self.set_topics.lock().unwrap().clone()
    }

    pub fn notices(&self) -> Vec<(String, String)> {
        self.notices.lock().unwrap().clone()
    }

    fn check_commands(&self) -> Result<(), CommandError> {
        if self.fail_commands.load(Ordering::SeqCst) {
            Err(CommandError::PermissionDenied {
                message: "mock refused".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn side(&self) -> Side {
        self.side
    }

    async fn connect(&self, events: EventSender) -> Result<(), ConnectError> {
        self.connect_attempts.fetch_add(1, Ordering::SeqCst);

        let should_fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(ConnectError::ConnectionClosed);
        }

        let scripted = self.on_connect.lock().unwrap().clone();
        for event in scripted {
            let _ = events.send(event);
        }
        *self.events.lock().unwrap() = Some(events);
        Ok(())
    }

    fn topic_limit(&self, _channel: &ChannelRef) -> Option<usize> {
        *self.topic_limit.lock().unwrap()
    }

    async fn set_topic(&self, channel: &ChannelRef, text: &str) -> Result<(), CommandError> {
        self.check_commands()?;
        self.set_topics
            .lock()
            .unwrap()
            .push((channel.to_string(), text.to_string()));
        Ok(())
    }

    async fn send_notice(&self, channel: &ChannelRef, text: &str) -> Result<(), CommandError> {
        self.check_commands()?;
        self.notices
            .lock()
            .unwrap()
            .push((channel.to_string(), text.to_string()));
        Ok(())
    }

    async fn close(&self) {
        self.events.lock().unwrap().take();
    }
}
