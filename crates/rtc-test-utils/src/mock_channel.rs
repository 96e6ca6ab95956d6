//! Recording signaling channel.
//!
//! Stands in for the client's WebSocket: every [`SessionEvent`] sent to the
//! session and the final close are kept for assertions.

use common::types::{MediaKind, UserId};
use rtc_signaling::actors::ConnectionState;
use rtc_signaling::channel::{ChannelError, CloseReason, SessionEvent, SignalingChannel};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Recorded {
    events: Vec<SessionEvent>,
    closed: Option<CloseReason>,
    close_calls: usize,
}

/// Channel that records what the session sends.
///
/// After `close`, further sends fail with `ChannelError::Closed` (and are
/// not recorded), as a real socket would.
#[derive(Debug, Default)]
pub struct RecordingChannel {
    recorded: Mutex<Recorded>,
}

impl RecordingChannel {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[must_use]
    pub fn events(&self) -> Vec<SessionEvent> {
        self.recorded.lock().unwrap().events.clone()
    }

    /// Reason passed to `close`, if it was called.
    #[must_use]
    pub fn closed_with(&self) -> Option<CloseReason> {
        self.recorded.lock().unwrap().closed
    }

    #[must_use]
    pub fn close_calls(&self) -> usize {
        self.recorded.lock().unwrap().close_calls
    }

    #[must_use]
    pub fn contains(&self, event: &SessionEvent) -> bool {
        self.recorded.lock().unwrap().events.contains(event)
    }

    /// Number of recorded events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&SessionEvent) -> bool) -> usize {
        self.recorded
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| predicate(e))
            .count()
    }

    #[must_use]
    pub fn saw_peer_joined(&self, user_id: &str) -> bool {
        self.contains(&SessionEvent::PeerJoined {
            user_id: UserId::from(user_id),
        })
    }

    #[must_use]
    pub fn saw_peer_left(&self, user_id: &str) -> bool {
        self.contains(&SessionEvent::PeerLeft {
            user_id: UserId::from(user_id),
        })
    }

    #[must_use]
    pub fn saw_track_stopped(&self, user_id: &str, kind: MediaKind) -> bool {
        self.contains(&SessionEvent::TrackStopped {
            user_id: UserId::from(user_id),
            kind,
        })
    }

    /// States announced through `StateChanged`, in order.
    #[must_use]
    pub fn states(&self) -> Vec<ConnectionState> {
        self.recorded
            .lock()
            .unwrap()
            .events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::StateChanged { state } => Some(*state),
                _ => None,
            })
            .collect()
    }

    /// Reason of the `Closed` event, if one was sent.
    #[must_use]
    pub fn closed_event(&self) -> Option<CloseReason> {
        self.recorded
            .lock()
            .unwrap()
            .events
            .iter()
            .find_map(|e| match e {
                SessionEvent::Closed { reason } => Some(*reason),
                _ => None,
            })
    }

    pub fn clear(&self) {
        self.recorded.lock().unwrap().events.clear();
    }
}

impl SignalingChannel for RecordingChannel {
    fn send(&self, event: SessionEvent) -> Result<(), ChannelError> {
        let mut recorded = self.recorded.lock().unwrap();
        if recorded.closed.is_some() {
            return Err(ChannelError::Closed);
        }
        recorded.events.push(event);
        Ok(())
    }

    fn close(&self, reason: CloseReason) {
        let mut recorded = self.recorded.lock().unwrap();
        recorded.close_calls += 1;
        recorded.closed.get_or_insert(reason);
    }
}
