//! `RoomActor` - one per room.
//!
//! The room actor owns every [`ClientSession`] of its room, so all
//! membership changes and track operations of a room are serialized:
//!
//! - A rejoin under the same user fully tears down the previous session
//!   before the new one is inserted.
//! - Subscribe looks up the source track, creates the outgoing track and
//!   attaches it in one step, so it can never race a concurrent
//!   stop-publishing of the source.
//! - Leaving or stopping a published track stops every peer's outgoing
//!   track fed by it before the source track itself.

use super::messages::{
    ConnectionState, NegotiationTicket, NoOpReason, RoomMessage, SessionId, SessionInfo,
    SessionRef, TrackOutcome,
};
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};
use super::session::{ClientSession, ClientSessionHandle};
use crate::channel::{CloseReason, SessionEvent, SignalingChannel};
use crate::errors::SignalingError;
use crate::media::Transport;
use crate::observability::metrics as prom;
use crate::tracks::Ssrcs;
use common::types::{MediaKind, RoomId, RoomType, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Default channel buffer size for a room mailbox.
const ROOM_CHANNEL_BUFFER: usize = 500;

/// Handle to a `RoomActor`.
#[derive(Clone, Debug)]
pub struct RoomHandle {
    sender: mpsc::Sender<RoomMessage>,
    cancel_token: CancellationToken,
    room_id: RoomId,
    room_type: RoomType,
}

impl RoomHandle {
    #[must_use]
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    #[must_use]
    pub fn room_type(&self) -> RoomType {
        self.room_type
    }

    /// Send `message` and await the reply. `None` if the actor is gone.
    async fn request<T>(&self, message: RoomMessage, rx: oneshot::Receiver<T>) -> Option<T> {
        if self.sender.send(message).await.is_err() {
            return None;
        }
        rx.await.ok()
    }

    /// Insert a session for `user_id`, replacing any previous one.
    pub async fn join(
        &self,
        user_id: UserId,
        channel: Arc<dyn SignalingChannel>,
    ) -> Result<SessionId, SignalingError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RoomMessage::Join {
                user_id,
                channel,
                respond_to: tx,
            })
            .await
            .map_err(|e| SignalingError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SignalingError::Internal(format!("response receive failed: {e}")))
    }

    /// Close `user_id`'s session, if present. Returns once teardown is done.
    pub async fn evict(&self, user_id: &UserId, reason: CloseReason) -> bool {
        let (tx, rx) = oneshot::channel();
        let message = RoomMessage::Evict {
            user_id: user_id.clone(),
            reason,
            respond_to: tx,
        };
        self.request(message, rx).await.unwrap_or(false)
    }

    pub async fn leave(&self, session: &SessionRef) -> bool {
        let (tx, rx) = oneshot::channel();
        let message = RoomMessage::Leave {
            session: session.clone(),
            respond_to: tx,
        };
        self.request(message, rx).await.unwrap_or(false)
    }

    pub async fn begin_negotiation(
        &self,
        session: &SessionRef,
    ) -> Result<NegotiationTicket, SignalingError> {
        let (tx, rx) = oneshot::channel();
        let message = RoomMessage::BeginNegotiation {
            session: session.clone(),
            respond_to: tx,
        };
        self.request(message, rx)
            .await
            .unwrap_or(Err(SignalingError::SessionClosed))
    }

    /// Move a configured transport into the session.
    ///
    /// If the room is gone the transport is stopped here.
    pub async fn client_offer(
        &self,
        session: &SessionRef,
        ticket: NegotiationTicket,
        transport: Box<dyn Transport>,
    ) -> Result<(), SignalingError> {
        let (tx, rx) = oneshot::channel();
        let message = RoomMessage::ClientOffer {
            session: session.clone(),
            ticket,
            transport,
            respond_to: tx,
        };
        if let Err(mpsc::error::SendError(returned)) = self.sender.send(message).await {
            if let RoomMessage::ClientOffer { mut transport, .. } = returned {
                transport.stop();
            }
            return Err(SignalingError::SessionClosed);
        }
        rx.await.unwrap_or(Err(SignalingError::SessionClosed))
    }

    pub async fn complete_negotiation(
        &self,
        session: &SessionRef,
        ticket: NegotiationTicket,
    ) -> Result<(), SignalingError> {
        let (tx, rx) = oneshot::channel();
        let message = RoomMessage::CompleteNegotiation {
            session: session.clone(),
            ticket,
            respond_to: tx,
        };
        self.request(message, rx)
            .await
            .unwrap_or(Err(SignalingError::SessionClosed))
    }

    pub async fn publish(
        &self,
        session: &SessionRef,
        kind: MediaKind,
        ssrcs: Ssrcs,
    ) -> Result<TrackOutcome, SignalingError> {
        let (tx, rx) = oneshot::channel();
        let message = RoomMessage::Publish {
            session: session.clone(),
            kind,
            ssrcs,
            respond_to: tx,
        };
        self.request(message, rx).await.unwrap_or(CLOSED)
    }

    pub async fn stop_publishing(
        &self,
        session: &SessionRef,
        kind: MediaKind,
    ) -> Result<TrackOutcome, SignalingError> {
        let (tx, rx) = oneshot::channel();
        let message = RoomMessage::StopPublishing {
            session: session.clone(),
            kind,
            respond_to: tx,
        };
        self.request(message, rx).await.unwrap_or(CLOSED)
    }

    pub async fn subscribe(
        &self,
        session: &SessionRef,
        source: UserId,
        kind: MediaKind,
    ) -> Result<TrackOutcome, SignalingError> {
        let (tx, rx) = oneshot::channel();
        let message = RoomMessage::Subscribe {
            session: session.clone(),
            source,
            kind,
            respond_to: tx,
        };
        self.request(message, rx).await.unwrap_or(CLOSED)
    }

    pub async fn unsubscribe(
        &self,
        session: &SessionRef,
        source: UserId,
        kind: MediaKind,
    ) -> Result<TrackOutcome, SignalingError> {
        let (tx, rx) = oneshot::channel();
        let message = RoomMessage::Unsubscribe {
            session: session.clone(),
            source,
            kind,
            respond_to: tx,
        };
        self.request(message, rx).await.unwrap_or(CLOSED)
    }

    pub async fn init_incoming(&self, session: &SessionRef, ssrcs: Ssrcs) -> TrackOutcome {
        let (tx, rx) = oneshot::channel();
        let message = RoomMessage::InitIncomingCapabilities {
            session: session.clone(),
            ssrcs,
            respond_to: tx,
        };
        self.request(message, rx)
            .await
            .unwrap_or(TrackOutcome::Ignored(NoOpReason::SessionClosed))
    }

    pub async fn is_producing(&self, session: &SessionRef, kind: MediaKind) -> bool {
        let (tx, rx) = oneshot::channel();
        let message = RoomMessage::IsProducing {
            session: session.clone(),
            kind,
            respond_to: tx,
        };
        self.request(message, rx).await.unwrap_or(false)
    }

    pub async fn is_subscribed(&self, session: &SessionRef, source: UserId, kind: MediaKind) -> bool {
        let (tx, rx) = oneshot::channel();
        let message = RoomMessage::IsSubscribed {
            session: session.clone(),
            source,
            kind,
            respond_to: tx,
        };
        self.request(message, rx).await.unwrap_or(false)
    }

    pub async fn incoming_identifiers(&self, session: &SessionRef) -> Ssrcs {
        let (tx, rx) = oneshot::channel();
        let message = RoomMessage::IncomingIdentifiers {
            session: session.clone(),
            respond_to: tx,
        };
        self.request(message, rx).await.unwrap_or(Ssrcs::ZERO)
    }

    pub async fn outgoing_identifiers(&self, session: &SessionRef, source: UserId) -> Ssrcs {
        let (tx, rx) = oneshot::channel();
        let message = RoomMessage::OutgoingIdentifiers {
            session: session.clone(),
            source,
            respond_to: tx,
        };
        self.request(message, rx).await.unwrap_or_default()
    }

    pub async fn get_session(&self, session: &SessionRef) -> Option<SessionInfo> {
        let (tx, rx) = oneshot::channel();
        let message = RoomMessage::GetSession {
            session: session.clone(),
            respond_to: tx,
        };
        self.request(message, rx).await.flatten()
    }

    /// Snapshot of every open session. Empty if the room is gone.
    pub async fn list_sessions(&self) -> Vec<SessionInfo> {
        let (tx, rx) = oneshot::channel();
        let message = RoomMessage::ListSessions { respond_to: tx };
        self.request(message, rx).await.unwrap_or_default()
    }

    /// Handles to every open session.
    pub async fn session_handles(&self) -> Vec<ClientSessionHandle> {
        self.list_sessions()
            .await
            .into_iter()
            .map(|info| {
                ClientSessionHandle::new(
                    info.session_id,
                    info.user_id,
                    self.room_id.clone(),
                    self.room_type,
                    self.clone(),
                )
            })
            .collect()
    }

    /// Force-close every session. Returns how many were closed.
    pub async fn dispose(&self, reason: CloseReason) -> usize {
        let (tx, rx) = oneshot::channel();
        let message = RoomMessage::Dispose {
            reason,
            respond_to: tx,
        };
        self.request(message, rx).await.unwrap_or(0)
    }

    /// Cancel the actor (sessions are closed with `CloseReason::Shutdown`).
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Whether both handles address the same actor.
    #[must_use]
    pub fn same_room(&self, other: &RoomHandle) -> bool {
        self.sender.same_channel(&other.sender)
    }
}

const CLOSED: Result<TrackOutcome, SignalingError> =
    Ok(TrackOutcome::Ignored(NoOpReason::SessionClosed));

/// The `RoomActor` implementation.
pub struct RoomActor {
    room_id: RoomId,
    room_type: RoomType,
    receiver: mpsc::Receiver<RoomMessage>,
    cancel_token: CancellationToken,
    /// Open sessions, one per user.
    sessions: HashMap<UserId, ClientSession>,
    metrics: Arc<ActorMetrics>,
    mailbox: MailboxMonitor,
}

impl RoomActor {
    /// Spawn a room actor and return its handle and task.
    pub fn spawn(
        room_id: RoomId,
        room_type: RoomType,
        cancel_token: CancellationToken,
        metrics: Arc<ActorMetrics>,
    ) -> (RoomHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(ROOM_CHANNEL_BUFFER);

        let actor = Self {
            room_id: room_id.clone(),
            room_type,
            receiver,
            cancel_token: cancel_token.clone(),
            sessions: HashMap::new(),
            metrics,
            mailbox: MailboxMonitor::new(ActorType::Room, room_id.as_str()),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = RoomHandle {
            sender,
            cancel_token,
            room_id,
            room_type,
        };

        (handle, task_handle)
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "rtc.actor.room", fields(room_id = %self.room_id, room_type = %self.room_type))]
    async fn run(mut self) {
        info!(
            target: "rtc.actor.room",
            room_id = %self.room_id,
            room_type = %self.room_type,
            "RoomActor started"
        );

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    debug!(
                        target: "rtc.actor.room",
                        room_id = %self.room_id,
                        "RoomActor received cancellation signal"
                    );
                    self.dispose(CloseReason::Shutdown);
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.record_received(self.receiver.len());
                            self.handle_message(message);
                            self.metrics.record_message_processed();
                        }
                        None => {
                            info!(
                                target: "rtc.actor.room",
                                room_id = %self.room_id,
                                "RoomActor channel closed, exiting"
                            );
                            self.dispose(CloseReason::Shutdown);
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "rtc.actor.room",
            room_id = %self.room_id,
            messages_processed = self.mailbox.messages_processed(),
            "RoomActor stopped"
        );
    }

    fn handle_message(&mut self, message: RoomMessage) {
        match message {
            RoomMessage::Join {
                user_id,
                channel,
                respond_to,
            } => {
                let _ = respond_to.send(self.join(user_id, channel));
            }

            RoomMessage::Evict {
                user_id,
                reason,
                respond_to,
            } => {
                let evicted = match self.sessions.remove(&user_id) {
                    Some(session) => {
                        self.teardown(session, reason);
                        true
                    }
                    None => false,
                };
                let _ = respond_to.send(evicted);
            }

            RoomMessage::Leave {
                session,
                respond_to,
            } => {
                let left = match self.take_session(&session) {
                    Some(removed) => {
                        self.teardown(removed, CloseReason::Left);
                        true
                    }
                    None => false,
                };
                let _ = respond_to.send(left);
            }

            RoomMessage::BeginNegotiation {
                session,
                respond_to,
            } => {
                let _ = respond_to.send(self.begin_negotiation(&session));
            }

            RoomMessage::ClientOffer {
                session,
                ticket,
                mut transport,
                respond_to,
            } => {
                let result = match self.session_mut(&session) {
                    Some(target) => target.attach_transport(ticket, transport),
                    None => {
                        transport.stop();
                        Err(SignalingError::SessionClosed)
                    }
                };
                let _ = respond_to.send(result);
            }

            RoomMessage::CompleteNegotiation {
                session,
                ticket,
                respond_to,
            } => {
                let result = match self.session_mut(&session) {
                    Some(target) => target.complete_negotiation(ticket),
                    None => Err(SignalingError::SessionClosed),
                };
                let _ = respond_to.send(result);
            }

            RoomMessage::Publish {
                session,
                kind,
                ssrcs,
                respond_to,
            } => {
                let result = match self.session_mut(&session) {
                    Some(target) => target.publish(kind, &ssrcs).map_err(SignalingError::from),
                    None => CLOSED,
                };
                self.record_track_operation("publish", &session, kind, &result);
                let _ = respond_to.send(result);
            }

            RoomMessage::StopPublishing {
                session,
                kind,
                respond_to,
            } => {
                let result = Ok(self.stop_publishing(&session, kind));
                self.record_track_operation("stop_publishing", &session, kind, &result);
                let _ = respond_to.send(result);
            }

            RoomMessage::Subscribe {
                session,
                source,
                kind,
                respond_to,
            } => {
                let result = self.subscribe(&session, &source, kind);
                self.record_track_operation("subscribe", &session, kind, &result);
                let _ = respond_to.send(result);
            }

            RoomMessage::Unsubscribe {
                session,
                source,
                kind,
                respond_to,
            } => {
                let outcome = match self.session_mut(&session) {
                    Some(target) if target.state() != ConnectionState::Connected => {
                        TrackOutcome::Ignored(NoOpReason::NoTransport)
                    }
                    Some(target) => {
                        if target.stop_outgoing(&source, kind) {
                            TrackOutcome::Applied
                        } else {
                            TrackOutcome::Ignored(NoOpReason::TrackNotFound)
                        }
                    }
                    None => TrackOutcome::Ignored(NoOpReason::SessionClosed),
                };
                let result = Ok(outcome);
                self.record_track_operation("unsubscribe", &session, kind, &result);
                let _ = respond_to.send(result);
            }

            RoomMessage::InitIncomingCapabilities {
                session,
                ssrcs,
                respond_to,
            } => {
                let outcome = match self.session_mut(&session) {
                    Some(target) => {
                        target.init_incoming_capabilities(ssrcs);
                        TrackOutcome::Applied
                    }
                    None => TrackOutcome::Ignored(NoOpReason::SessionClosed),
                };
                let _ = respond_to.send(outcome);
            }

            RoomMessage::IsProducing {
                session,
                kind,
                respond_to,
            } => {
                let producing = self
                    .session(&session)
                    .is_some_and(|s| s.is_producing(kind));
                let _ = respond_to.send(producing);
            }

            RoomMessage::IsSubscribed {
                session,
                source,
                kind,
                respond_to,
            } => {
                let subscribed = self
                    .session(&session)
                    .is_some_and(|s| s.is_subscribed_to(&source, kind));
                let _ = respond_to.send(subscribed);
            }

            RoomMessage::IncomingIdentifiers {
                session,
                respond_to,
            } => {
                let ssrcs = self
                    .session(&session)
                    .map_or(Ssrcs::ZERO, ClientSession::incoming_identifiers);
                let _ = respond_to.send(ssrcs);
            }

            RoomMessage::OutgoingIdentifiers {
                session,
                source,
                respond_to,
            } => {
                let ssrcs = self
                    .session(&session)
                    .map(|s| s.outgoing_identifiers_for(&source))
                    .unwrap_or_default();
                let _ = respond_to.send(ssrcs);
            }

            RoomMessage::GetSession {
                session,
                respond_to,
            } => {
                let _ = respond_to.send(self.session(&session).map(ClientSession::info));
            }

            RoomMessage::ListSessions { respond_to } => {
                let infos = self.sessions.values().map(ClientSession::info).collect();
                let _ = respond_to.send(infos);
            }

            RoomMessage::Dispose { reason, respond_to } => {
                let _ = respond_to.send(self.dispose(reason));
            }
        }
    }

    fn session(&self, session: &SessionRef) -> Option<&ClientSession> {
        self.sessions
            .get(&session.user_id)
            .filter(|s| s.matches(session))
    }

    fn session_mut(&mut self, session: &SessionRef) -> Option<&mut ClientSession> {
        self.sessions
            .get_mut(&session.user_id)
            .filter(|s| s.matches(session))
    }

    fn take_session(&mut self, session: &SessionRef) -> Option<ClientSession> {
        if self.session(session).is_some() {
            self.sessions.remove(&session.user_id)
        } else {
            None
        }
    }

    fn join(&mut self, user_id: UserId, channel: Arc<dyn SignalingChannel>) -> SessionId {
        if let Some(previous) = self.sessions.remove(&user_id) {
            info!(
                target: "rtc.actor.room",
                room_id = %self.room_id,
                user_id = %user_id,
                session_id = %previous.session_id(),
                "User rejoined, closing previous session"
            );
            self.teardown(previous, CloseReason::Preempted);
            prom::record_preemption();
        }

        let session = ClientSession::new(user_id.clone(), self.room_id.clone(), channel);
        let session_id = session.session_id();

        self.broadcast(
            &user_id,
            &SessionEvent::PeerJoined {
                user_id: user_id.clone(),
            },
        );
        self.sessions.insert(user_id.clone(), session);
        self.metrics.session_opened();

        info!(
            target: "rtc.actor.room",
            room_id = %self.room_id,
            user_id = %user_id,
            session_id = %session_id,
            members = self.sessions.len(),
            "Session joined"
        );

        session_id
    }

    /// Close a session that has already been removed from membership.
    fn teardown(&mut self, mut session: ClientSession, reason: CloseReason) {
        let user_id = session.user_id().clone();

        for kind in MediaKind::ALL {
            self.stop_peer_subscriptions(&user_id, kind);
        }
        session.close(reason);
        self.metrics.session_closed();

        self.broadcast(
            &user_id,
            &SessionEvent::PeerLeft {
                user_id: user_id.clone(),
            },
        );

        info!(
            target: "rtc.actor.room",
            room_id = %self.room_id,
            user_id = %user_id,
            session_id = %session.session_id(),
            reason = reason.as_str(),
            members = self.sessions.len(),
            "Session closed"
        );
    }

    /// Stop every other member's outgoing track fed by (`user_id`, `kind`).
    fn stop_peer_subscriptions(&mut self, user_id: &UserId, kind: MediaKind) -> usize {
        self.sessions
            .iter_mut()
            .filter(|(peer, _)| *peer != user_id)
            .map(|(_, session)| session.stop_outgoing(user_id, kind))
            .filter(|stopped| *stopped)
            .count()
    }

    fn broadcast(&self, except: &UserId, event: &SessionEvent) {
        for (user_id, session) in &self.sessions {
            if user_id != except {
                session.notify(event.clone());
            }
        }
    }

    fn begin_negotiation(
        &mut self,
        session: &SessionRef,
    ) -> Result<NegotiationTicket, SignalingError> {
        let Some(target) = self.session(session) else {
            return Err(SignalingError::SessionClosed);
        };

        if target.has_transport() {
            // Renegotiation: everything bound to the old transport goes.
            let published = target.published_kinds();
            for kind in &published {
                self.stop_peer_subscriptions(&session.user_id, *kind);
            }
            if let Some(target) = self.session_mut(session) {
                target.release_media();
            }
            for kind in published {
                self.broadcast(
                    &session.user_id,
                    &SessionEvent::TrackStopped {
                        user_id: session.user_id.clone(),
                        kind,
                    },
                );
            }
            debug!(
                target: "rtc.actor.room",
                room_id = %self.room_id,
                user_id = %session.user_id,
                "Released previous transport for renegotiation"
            );
        }

        match self.session_mut(session) {
            Some(target) => target.begin_negotiation(),
            None => Err(SignalingError::SessionClosed),
        }
    }

    fn stop_publishing(&mut self, session: &SessionRef, kind: MediaKind) -> TrackOutcome {
        if self.session(session).is_none() {
            return TrackOutcome::Ignored(NoOpReason::SessionClosed);
        }

        let peers = self.stop_peer_subscriptions(&session.user_id, kind);
        let stopped = self
            .session_mut(session)
            .is_some_and(|target| target.stop_incoming(kind));

        if !stopped {
            return TrackOutcome::Ignored(NoOpReason::TrackNotFound);
        }

        self.broadcast(
            &session.user_id,
            &SessionEvent::TrackStopped {
                user_id: session.user_id.clone(),
                kind,
            },
        );
        debug!(
            target: "rtc.actor.room",
            room_id = %self.room_id,
            user_id = %session.user_id,
            kind = %kind,
            peer_tracks_stopped = peers,
            "Stopped publishing"
        );
        TrackOutcome::Applied
    }

    fn subscribe(
        &mut self,
        session: &SessionRef,
        source: &UserId,
        kind: MediaKind,
    ) -> Result<TrackOutcome, SignalingError> {
        match self.session(session) {
            None => return CLOSED,
            Some(subscriber) if !subscriber.has_transport() => {
                return Ok(TrackOutcome::Ignored(NoOpReason::NoTransport));
            }
            Some(_) => {}
        }
        if *source == session.user_id {
            return Ok(TrackOutcome::Ignored(NoOpReason::TrackNotFound));
        }

        // Take the subscriber out so the source can be borrowed alongside it.
        let Some(mut subscriber) = self.sessions.remove(&session.user_id) else {
            return CLOSED;
        };
        let result = match self.sessions.get(source).and_then(|s| s.published(kind)) {
            Some(track) => subscriber.subscribe(track).map_err(SignalingError::from),
            None => Ok(TrackOutcome::Ignored(NoOpReason::TrackNotFound)),
        };
        self.sessions.insert(session.user_id.clone(), subscriber);

        result
    }

    /// Close every session. Idempotent.
    fn dispose(&mut self, reason: CloseReason) -> usize {
        let users: Vec<UserId> = self.sessions.keys().cloned().collect();
        let mut closed = 0;
        for user_id in users {
            if let Some(session) = self.sessions.remove(&user_id) {
                self.teardown(session, reason);
                closed += 1;
            }
        }
        if closed > 0 {
            info!(
                target: "rtc.actor.room",
                room_id = %self.room_id,
                closed,
                reason = reason.as_str(),
                "Room disposed"
            );
        }
        closed
    }

    fn record_track_operation(
        &self,
        operation: &'static str,
        session: &SessionRef,
        kind: MediaKind,
        result: &Result<TrackOutcome, SignalingError>,
    ) {
        match result {
            Ok(TrackOutcome::Applied) => {
                prom::record_track_operation(operation, "applied");
            }
            Ok(TrackOutcome::Ignored(reason)) => {
                prom::record_track_operation(operation, reason.as_str());
                match reason {
                    NoOpReason::DuplicateTrack
                    | NoOpReason::TrackNotFound
                    | NoOpReason::IdentifierConflict => warn!(
                        target: "rtc.actor.room",
                        room_id = %self.room_id,
                        user_id = %session.user_id,
                        operation,
                        kind = %kind,
                        reason = reason.as_str(),
                        "Track operation ignored"
                    ),
                    _ => debug!(
                        target: "rtc.actor.room",
                        room_id = %self.room_id,
                        user_id = %session.user_id,
                        operation,
                        kind = %kind,
                        reason = reason.as_str(),
                        "Track operation ignored"
                    ),
                }
            }
            Err(e) => {
                prom::record_track_operation(operation, "error");
                warn!(
                    target: "rtc.actor.room",
                    room_id = %self.room_id,
                    user_id = %session.user_id,
                    operation,
                    kind = %kind,
                    error = %e,
                    "Track operation failed"
                );
            }
        }
    }
}
