//! Message types for actor communication.
//!
//! All inter-actor communication uses strongly-typed message passing via
//! `tokio::sync::mpsc`. Replies use `tokio::sync::oneshot`.

use super::room::RoomHandle;
use super::session::ClientSessionHandle;
use crate::channel::{CloseReason, SignalingChannel};
use crate::errors::SignalingError;
use crate::media::Transport;
use crate::tracks::Ssrcs;
use chrono::{DateTime, Utc};
use common::types::{MediaKind, RoomId, RoomType, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Unique id of one session. A rejoin under the same user gets a new id,
/// so handles to the replaced session go stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// One offer/answer exchange on a session. Each offer takes a new ticket;
/// transports and completions carrying an older one are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NegotiationTicket(u64);

impl NegotiationTicket {
    #[must_use]
    pub(crate) const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Addresses one session inside a room.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionRef {
    pub session_id: SessionId,
    pub user_id: UserId,
}

/// Session connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Joined,
    Negotiating,
    Connected,
    Closed,
}

impl ConnectionState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Joined => "joined",
            ConnectionState::Negotiating => "negotiating",
            ConnectionState::Connected => "connected",
            ConnectionState::Closed => "closed",
        }
    }
}

/// Why an idempotent track operation did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoOpReason {
    /// No transport negotiated yet.
    NoTransport,
    /// A track of that kind already exists.
    DuplicateTrack,
    /// The referenced track does not exist.
    TrackNotFound,
    /// The identifier set lacks a field the kind requires.
    InvalidIdentifiers,
    /// An identifier is already used by a live incoming track.
    IdentifierConflict,
    /// The session is closed or its handle is stale.
    SessionClosed,
}

impl NoOpReason {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            NoOpReason::NoTransport => "no_transport",
            NoOpReason::DuplicateTrack => "duplicate_track",
            NoOpReason::TrackNotFound => "track_not_found",
            NoOpReason::InvalidIdentifiers => "invalid_identifiers",
            NoOpReason::IdentifierConflict => "identifier_conflict",
            NoOpReason::SessionClosed => "session_closed",
        }
    }
}

/// Result of an idempotent track operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    Applied,
    Ignored(NoOpReason),
}

impl TrackOutcome {
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, TrackOutcome::Applied)
    }

    /// Metric label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            TrackOutcome::Applied => "applied",
            TrackOutcome::Ignored(reason) => reason.as_str(),
        }
    }
}

/// Read-only snapshot of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub room_id: RoomId,
    pub state: ConnectionState,
    pub published: Vec<MediaKind>,
    pub subscription_count: usize,
    pub joined_at: DateTime<Utc>,
}

/// Summary of one managed room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub room_type: RoomType,
    pub created_at: DateTime<Utc>,
}

/// Registry status.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStatus {
    pub room_count: usize,
    pub session_count: usize,
    pub rooms: Vec<RoomSummary>,
    pub mailbox_depth: usize,
}

/// Messages sent to `RoomRegistryActor`.
#[derive(Debug)]
pub enum RegistryMessage {
    /// Return the room for `room_id`, creating it if absent.
    EnsureRoom {
        room_id: RoomId,
        room_type: RoomType,
        respond_to: oneshot::Sender<Result<RoomHandle, SignalingError>>,
    },

    GetRoom {
        room_id: RoomId,
        respond_to: oneshot::Sender<Option<RoomHandle>>,
    },

    /// Tear down and forget a room. Disposing an absent id is a no-op.
    DisposeRoom {
        room_id: RoomId,
        respond_to: oneshot::Sender<bool>,
    },

    /// Register a new session, preempting the user's session in any other
    /// exclusive room first.
    Join {
        room_id: RoomId,
        user_id: UserId,
        room_type: RoomType,
        channel: Arc<dyn SignalingChannel>,
        respond_to: oneshot::Sender<Result<ClientSessionHandle, SignalingError>>,
    },

    GetStatus {
        respond_to: oneshot::Sender<RegistryStatus>,
    },

    /// Dispose every room and stop.
    Shutdown { respond_to: oneshot::Sender<()> },
}

/// Messages sent to `RoomActor`.
#[derive(Debug)]
pub enum RoomMessage {
    /// Insert a session for `user_id`, closing any previous one of that user.
    Join {
        user_id: UserId,
        channel: Arc<dyn SignalingChannel>,
        respond_to: oneshot::Sender<SessionId>,
    },

    /// Close the user's session, if any. Replies once teardown is complete.
    Evict {
        user_id: UserId,
        reason: CloseReason,
        respond_to: oneshot::Sender<bool>,
    },

    Leave {
        session: SessionRef,
        respond_to: oneshot::Sender<bool>,
    },

    /// Offer received: release media bound to any previous transport.
    BeginNegotiation {
        session: SessionRef,
        respond_to: oneshot::Sender<Result<NegotiationTicket, SignalingError>>,
    },

    /// Hand the freshly negotiated transport to the session.
    ClientOffer {
        session: SessionRef,
        ticket: NegotiationTicket,
        transport: Box<dyn Transport>,
        respond_to: oneshot::Sender<Result<(), SignalingError>>,
    },

    /// Answer produced.
    CompleteNegotiation {
        session: SessionRef,
        ticket: NegotiationTicket,
        respond_to: oneshot::Sender<Result<(), SignalingError>>,
    },

    Publish {
        session: SessionRef,
        kind: MediaKind,
        ssrcs: Ssrcs,
        respond_to: oneshot::Sender<Result<TrackOutcome, SignalingError>>,
    },

    StopPublishing {
        session: SessionRef,
        kind: MediaKind,
        respond_to: oneshot::Sender<Result<TrackOutcome, SignalingError>>,
    },

    Subscribe {
        session: SessionRef,
        source: UserId,
        kind: MediaKind,
        respond_to: oneshot::Sender<Result<TrackOutcome, SignalingError>>,
    },

    Unsubscribe {
        session: SessionRef,
        source: UserId,
        kind: MediaKind,
        respond_to: oneshot::Sender<Result<TrackOutcome, SignalingError>>,
    },

    InitIncomingCapabilities {
        session: SessionRef,
        ssrcs: Ssrcs,
        respond_to: oneshot::Sender<TrackOutcome>,
    },

    IsProducing {
        session: SessionRef,
        kind: MediaKind,
        respond_to: oneshot::Sender<bool>,
    },

    IsSubscribed {
        session: SessionRef,
        source: UserId,
        kind: MediaKind,
        respond_to: oneshot::Sender<bool>,
    },

    IncomingIdentifiers {
        session: SessionRef,
        respond_to: oneshot::Sender<Ssrcs>,
    },

    OutgoingIdentifiers {
        session: SessionRef,
        source: UserId,
        respond_to: oneshot::Sender<Ssrcs>,
    },

    GetSession {
        session: SessionRef,
        respond_to: oneshot::Sender<Option<SessionInfo>>,
    },

    ListSessions {
        respond_to: oneshot::Sender<Vec<SessionInfo>>,
    },

    /// Force-close every session. Replies with the number closed.
    Dispose {
        reason: CloseReason,
        respond_to: oneshot::Sender<usize>,
    },
}
