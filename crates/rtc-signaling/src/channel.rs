//! Client notification channel.
//!
//! The signaling transport (WebSocket framing, auth) sits outside this
//! crate. Sessions only see it through [`SignalingChannel`], a narrow
//! `send`/`close` capability, and only ever send the closed set of
//! [`SessionEvent`] notifications.

use crate::actors::ConnectionState;
use crate::observability::metrics;
use common::types::{MediaKind, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Why a session was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// The client left.
    Left,
    /// A newer join of the same user replaced this session.
    Preempted,
    /// The room was disposed.
    RoomDisposed,
    /// The signaling layer is stopping.
    Shutdown,
}

impl CloseReason {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Left => "left",
            CloseReason::Preempted => "preempted",
            CloseReason::RoomDisposed => "room_disposed",
            CloseReason::Shutdown => "shutdown",
        }
    }

    /// Whether the closure was imposed on the client.
    #[must_use]
    pub const fn is_forced(&self) -> bool {
        !matches!(self, CloseReason::Left)
    }
}

/// Notifications delivered to a session's client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    PeerJoined { user_id: UserId },
    PeerLeft { user_id: UserId },
    TrackStopped { user_id: UserId, kind: MediaKind },
    StateChanged { state: ConnectionState },
    Closed { reason: CloseReason },
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("channel is closed")]
    Closed,

    #[error("channel buffer is full")]
    Full,
}

/// Capability to notify one client.
pub trait SignalingChannel: Send + Sync + fmt::Debug {
    fn send(&self, event: SessionEvent) -> Result<(), ChannelError>;

    fn close(&self, reason: CloseReason);
}

/// Message seen by the reader of an [`MpscChannel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelMessage {
    Event(SessionEvent),
    Close(CloseReason),
}

/// Bounded channel. Sends never block the room actor: a full buffer drops
/// the event.
#[derive(Debug, Clone)]
pub struct MpscChannel {
    sender: mpsc::Sender<ChannelMessage>,
}

impl MpscChannel {
    /// Create a channel and the receiver the transport layer drains.
    #[must_use]
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<ChannelMessage>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        (Self { sender }, receiver)
    }
}

impl SignalingChannel for MpscChannel {
    fn send(&self, event: SessionEvent) -> Result<(), ChannelError> {
        match self.sender.try_send(ChannelMessage::Event(event)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(ChannelMessage::Event(event))) => {
                metrics::record_event_dropped();
                warn!(target: "rtc.channel", ?event, "Channel full, event dropped");
                Err(ChannelError::Full)
            }
            Err(mpsc::error::TrySendError::Full(_)) => Err(ChannelError::Full),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(ChannelError::Closed),
        }
    }

    fn close(&self, reason: CloseReason) {
        if let Err(e) = self.sender.try_send(ChannelMessage::Close(reason)) {
            debug!(target: "rtc.channel", reason = reason.as_str(), error = %e, "Close not delivered");
        }
    }
}
