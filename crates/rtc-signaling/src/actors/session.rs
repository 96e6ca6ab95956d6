//! Client sessions.
//!
//! [`ClientSession`] is the per-user state machine. It is owned by its
//! room actor and never leaves it; callers hold a [`ClientSessionHandle`]
//! that routes every operation through the room's mailbox.
//!
//! State machine:
//!
//! ```text
//! Joined ──offer──▶ Negotiating ──answer──▶ Connected
//!                     ▲    │                    │
//!                     │    └─retry──┐           │
//!                     └─────────────┴─re-offer──┘
//! any ──leave / preempt / dispose──▶ Closed (terminal)
//! ```

use super::messages::{
    ConnectionState, NegotiationTicket, NoOpReason, SessionId, SessionInfo, SessionRef,
    TrackOutcome,
};
use super::room::RoomHandle;
use crate::channel::{CloseReason, SessionEvent, SignalingChannel};
use crate::errors::SignalingError;
use crate::media::{TrackSpec, Transport, TransportError};
use crate::tracks::{track_id_for, Ssrcs, TrackBinding, TrackDirection};
use chrono::{DateTime, Utc};
use common::types::{MediaKind, RoomId, RoomType, UserId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-user session state, owned by the room actor.
pub struct ClientSession {
    session_id: SessionId,
    user_id: UserId,
    room_id: RoomId,
    channel: Arc<dyn SignalingChannel>,
    state: ConnectionState,
    transport: Option<Box<dyn Transport>>,
    /// Published tracks, by kind.
    incoming: BTreeMap<MediaKind, TrackBinding>,
    /// Subscriptions, by (publishing user, kind).
    outgoing: HashMap<(UserId, MediaKind), TrackBinding>,
    /// Every identifier published on the current transport, stopped tracks included.
    used_identifiers: HashSet<u32>,
    incoming_identifiers: Ssrcs,
    negotiation: NegotiationTicket,
    joined_at: DateTime<Utc>,
}

impl ClientSession {
    #[must_use]
    pub fn new(user_id: UserId, room_id: RoomId, channel: Arc<dyn SignalingChannel>) -> Self {
        Self {
            session_id: SessionId::new(),
            user_id,
            room_id,
            channel,
            state: ConnectionState::Joined,
            transport: None,
            incoming: BTreeMap::new(),
            outgoing: HashMap::new(),
            used_identifiers: HashSet::new(),
            incoming_identifiers: Ssrcs::default(),
            negotiation: NegotiationTicket::default(),
            joined_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether `session` addresses this session (and not a replaced one).
    #[must_use]
    pub fn matches(&self, session: &SessionRef) -> bool {
        self.session_id == session.session_id && self.user_id == session.user_id
    }

    #[must_use]
    pub fn has_transport(&self) -> bool {
        self.transport.is_some()
    }

    #[must_use]
    pub fn is_producing(&self, kind: MediaKind) -> bool {
        self.state == ConnectionState::Connected && self.incoming.contains_key(&kind)
    }

    #[must_use]
    pub fn is_subscribed_to(&self, source: &UserId, kind: MediaKind) -> bool {
        self.state == ConnectionState::Connected
            && self.outgoing.contains_key(&(source.clone(), kind))
    }

    /// Published track of `kind`, if any.
    #[must_use]
    pub fn published(&self, kind: MediaKind) -> Option<&TrackBinding> {
        self.incoming.get(&kind)
    }

    #[must_use]
    pub fn published_kinds(&self) -> Vec<MediaKind> {
        self.incoming.keys().copied().collect()
    }

    pub fn notify(&self, event: SessionEvent) {
        if let Err(e) = self.channel.send(event) {
            debug!(
                target: "rtc.actor.room",
                room_id = %self.room_id,
                user_id = %self.user_id,
                error = %e,
                "Notification not delivered"
            );
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            self.state = state;
            self.notify(SessionEvent::StateChanged { state });
        }
    }

    /// Enter `Negotiating` and take a new ticket, superseding any offer
    /// still in flight. Media bound to a previous transport must be
    /// released by the caller first (see [`Self::release_media`]).
    pub fn begin_negotiation(&mut self) -> Result<NegotiationTicket, SignalingError> {
        if self.state == ConnectionState::Closed {
            return Err(SignalingError::SessionClosed);
        }
        self.negotiation = self.negotiation.next();
        self.set_state(ConnectionState::Negotiating);
        Ok(self.negotiation)
    }

    fn check_ticket(&self, ticket: NegotiationTicket) -> Result<(), SignalingError> {
        if self.state == ConnectionState::Closed {
            return Err(SignalingError::SessionClosed);
        }
        if ticket != self.negotiation {
            return Err(SignalingError::NegotiationSuperseded);
        }
        if self.state != ConnectionState::Negotiating {
            return Err(SignalingError::SessionClosed);
        }
        Ok(())
    }

    /// Take ownership of a newly negotiated transport. A transport for a
    /// superseded offer, or arriving outside `Negotiating`, is stopped.
    pub fn attach_transport(
        &mut self,
        ticket: NegotiationTicket,
        mut transport: Box<dyn Transport>,
    ) -> Result<(), SignalingError> {
        if let Err(e) = self.check_ticket(ticket) {
            transport.stop();
            return Err(e);
        }
        self.release_media();
        self.transport = Some(transport);
        Ok(())
    }

    pub fn complete_negotiation(
        &mut self,
        ticket: NegotiationTicket,
    ) -> Result<(), SignalingError> {
        self.check_ticket(ticket)?;
        if self.transport.is_none() {
            return Err(SignalingError::SessionClosed);
        }
        self.set_state(ConnectionState::Connected);
        Ok(())
    }

    /// Create an incoming track for `kind`.
    pub fn publish(&mut self, kind: MediaKind, ssrcs: &Ssrcs) -> Result<TrackOutcome, TransportError> {
        let Some(transport) = self.transport.as_mut() else {
            return Ok(TrackOutcome::Ignored(NoOpReason::NoTransport));
        };

        if self.incoming.contains_key(&kind) {
            return Ok(TrackOutcome::Ignored(NoOpReason::DuplicateTrack));
        }

        let identifiers = match ssrcs.identifiers_for(kind) {
            Ok(identifiers) => identifiers,
            Err(e) => {
                debug!(
                    target: "rtc.actor.room",
                    room_id = %self.room_id,
                    user_id = %self.user_id,
                    error = %e,
                    "Rejected identifier set"
                );
                return Ok(TrackOutcome::Ignored(NoOpReason::InvalidIdentifiers));
            }
        };

        if identifiers
            .iter()
            .any(|id| self.used_identifiers.contains(&id))
        {
            return Ok(TrackOutcome::Ignored(NoOpReason::IdentifierConflict));
        }

        let spec = TrackSpec {
            id: track_id_for(kind, &self.user_id),
            kind,
            identifiers,
        };
        let handle = transport.create_incoming_track(&spec)?;

        self.used_identifiers.extend(identifiers.iter());
        self.incoming_identifiers.record(&identifiers);
        self.incoming.insert(
            kind,
            TrackBinding::new(
                TrackDirection::Incoming,
                self.user_id.clone(),
                identifiers,
                handle,
            ),
        );
        Ok(TrackOutcome::Applied)
    }

    /// Stop this session's own track of `kind`. Peers' outgoing tracks fed
    /// by it must already be stopped.
    pub fn stop_incoming(&mut self, kind: MediaKind) -> bool {
        match self.incoming.remove(&kind) {
            Some(binding) => {
                binding.stop();
                true
            }
            None => false,
        }
    }

    /// Forward `source`'s track to this session.
    pub fn subscribe(&mut self, source: &TrackBinding) -> Result<TrackOutcome, TransportError> {
        let Some(transport) = self.transport.as_mut() else {
            return Ok(TrackOutcome::Ignored(NoOpReason::NoTransport));
        };

        let key = (source.source.clone(), source.kind);
        if self.outgoing.contains_key(&key) {
            return Ok(TrackOutcome::Ignored(NoOpReason::DuplicateTrack));
        }

        let spec = TrackSpec {
            id: source.track_id.clone(),
            kind: source.kind,
            identifiers: source.identifiers,
        };
        let mut handle = transport.create_outgoing_track(&spec)?;
        if let Err(e) = handle.attach_to(source.handle()) {
            handle.stop();
            return Err(e);
        }

        self.outgoing.insert(
            key,
            TrackBinding::new(
                TrackDirection::Outgoing,
                source.source.clone(),
                source.identifiers,
                handle,
            ),
        );
        Ok(TrackOutcome::Applied)
    }

    /// Stop the outgoing track for (`source`, `kind`). Never cascades.
    pub fn stop_outgoing(&mut self, source: &UserId, kind: MediaKind) -> bool {
        match self.outgoing.remove(&(source.clone(), kind)) {
            Some(binding) => {
                binding.stop();
                true
            }
            None => false,
        }
    }

    /// Outgoing tracks this session holds for `source`.
    #[must_use]
    pub fn outgoing_identifiers_for(&self, source: &UserId) -> Ssrcs {
        let mut ssrcs = Ssrcs::default();
        for kind in MediaKind::ALL {
            if let Some(binding) = self.outgoing.get(&(source.clone(), kind)) {
                ssrcs.record(&binding.identifiers);
            }
        }
        ssrcs
    }

    /// Record the advertised identifier set. Allowed in any open state.
    pub fn init_incoming_capabilities(&mut self, ssrcs: Ssrcs) {
        self.incoming_identifiers = ssrcs;
    }

    /// Recorded identifiers, or all zeros while not connected.
    #[must_use]
    pub fn incoming_identifiers(&self) -> Ssrcs {
        if self.state == ConnectionState::Connected {
            self.incoming_identifiers
        } else {
            Ssrcs::ZERO
        }
    }

    /// Stop every track and the transport, in dependency order.
    ///
    /// Peers' outgoing tracks keyed to this user are the room's job and
    /// must be stopped before this is called.
    pub fn release_media(&mut self) {
        for (_, binding) in self.outgoing.drain() {
            binding.stop();
        }
        while let Some((_, binding)) = self.incoming.pop_first() {
            binding.stop();
        }
        if let Some(mut transport) = self.transport.take() {
            transport.stop();
        }
        self.used_identifiers.clear();
    }

    /// Release everything and enter the terminal state.
    pub fn close(&mut self, reason: CloseReason) {
        self.release_media();
        self.state = ConnectionState::Closed;
        self.notify(SessionEvent::Closed { reason });
        if reason.is_forced() {
            self.channel.close(reason);
        }
    }

    #[must_use]
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.session_id,
            user_id: self.user_id.clone(),
            room_id: self.room_id.clone(),
            state: self.state,
            published: self.published_kinds(),
            subscription_count: self.outgoing.len(),
            joined_at: self.joined_at,
        }
    }
}

impl fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSession")
            .field("session_id", &self.session_id)
            .field("user_id", &self.user_id)
            .field("room_id", &self.room_id)
            .field("state", &self.state)
            .field("published", &self.incoming.len())
            .field("subscriptions", &self.outgoing.len())
            .finish_non_exhaustive()
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        if self.transport.is_some() || !self.incoming.is_empty() || !self.outgoing.is_empty() {
            warn!(
                target: "rtc.actor.room",
                room_id = %self.room_id,
                user_id = %self.user_id,
                "Session dropped with live media, releasing"
            );
            self.release_media();
        }
    }
}

/// Handle to one session.
///
/// Track operations never fail for bookkeeping reasons: they come back as
/// [`TrackOutcome::Ignored`]. A handle whose session was replaced, closed or
/// whose room is gone reports [`NoOpReason::SessionClosed`].
#[derive(Clone, Debug)]
pub struct ClientSessionHandle {
    session: SessionRef,
    room_id: RoomId,
    room_type: RoomType,
    room: RoomHandle,
}

impl ClientSessionHandle {
    #[must_use]
    pub(crate) fn new(
        session_id: SessionId,
        user_id: UserId,
        room_id: RoomId,
        room_type: RoomType,
        room: RoomHandle,
    ) -> Self {
        Self {
            session: SessionRef {
                session_id,
                user_id,
            },
            room_id,
            room_type,
            room,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session.session_id
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.session.user_id
    }

    #[must_use]
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Type of the room the session was admitted to.
    #[must_use]
    pub fn room_type(&self) -> RoomType {
        self.room_type
    }

    pub(crate) fn session_ref(&self) -> &SessionRef {
        &self.session
    }

    pub(crate) fn room(&self) -> &RoomHandle {
        &self.room
    }

    pub async fn is_producing(&self, kind: MediaKind) -> bool {
        self.room.is_producing(&self.session, kind).await
    }

    pub async fn is_subscribed_to(&self, source: &UserId, kind: MediaKind) -> bool {
        self.room
            .is_subscribed(&self.session, source.clone(), kind)
            .await
    }

    /// Create the incoming track for `kind` from the advertised identifiers.
    ///
    /// # Errors
    ///
    /// Only engine failures (`SignalingError::Transport`).
    pub async fn publish_track(
        &self,
        kind: MediaKind,
        ssrcs: Ssrcs,
    ) -> Result<TrackOutcome, SignalingError> {
        self.room.publish(&self.session, kind, ssrcs).await
    }

    /// Stop publishing `kind`; every peer's outgoing track fed by it is
    /// stopped first.
    pub async fn stop_publishing_track(
        &self,
        kind: MediaKind,
    ) -> Result<TrackOutcome, SignalingError> {
        self.room.stop_publishing(&self.session, kind).await
    }

    pub async fn subscribe_to_track(
        &self,
        source: &UserId,
        kind: MediaKind,
    ) -> Result<TrackOutcome, SignalingError> {
        self.room
            .subscribe(&self.session, source.clone(), kind)
            .await
    }

    pub async fn unsubscribe_from_track(
        &self,
        source: &UserId,
        kind: MediaKind,
    ) -> Result<TrackOutcome, SignalingError> {
        self.room
            .unsubscribe(&self.session, source.clone(), kind)
            .await
    }

    pub async fn init_incoming_capabilities(&self, ssrcs: Ssrcs) -> TrackOutcome {
        self.room.init_incoming(&self.session, ssrcs).await
    }

    /// Recorded incoming identifiers; all zeros unless connected.
    pub async fn incoming_identifiers(&self) -> Ssrcs {
        self.room.incoming_identifiers(&self.session).await
    }

    pub async fn outgoing_identifiers_for(&self, source: &UserId) -> Ssrcs {
        self.room
            .outgoing_identifiers(&self.session, source.clone())
            .await
    }

    /// Current state, or `None` once the session is gone.
    pub async fn state(&self) -> Option<ConnectionState> {
        self.info().await.map(|info| info.state)
    }

    pub async fn info(&self) -> Option<SessionInfo> {
        self.room.get_session(&self.session).await
    }

    /// Leave the room. Returns `false` if the session was already gone.
    pub async fn leave(&self) -> bool {
        self.room.leave(&self.session).await
    }
}
