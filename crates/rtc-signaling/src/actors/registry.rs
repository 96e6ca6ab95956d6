//! `RoomRegistryActor` - owns the room id to room mapping.
//!
//! - One per [`SignalingDelegate`](crate::delegate::SignalingDelegate)
//! - Lazily creates room actors on first join, disposes them explicitly
//! - Owns the root `CancellationToken`; room actors get child tokens
//! - Serializes joins, so cross-room preemption of a user is never
//!   interleaved with another join of that user
//! - Monitors room actor health (panic detection via `JoinHandle`)
//!
//! # Exclusivity
//!
//! A user holds at most one session across all `guild-voice` and
//! `dm-voice` rooms. Joining an exclusive room first evicts the user from
//! every other exclusive room, and waits for each eviction to finish
//! tearing the old session down. `stream` rooms are exempt.

use super::messages::{RegistryMessage, RegistryStatus, RoomSummary};
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};
use super::room::{RoomActor, RoomHandle};
use super::session::ClientSessionHandle;
use crate::channel::{CloseReason, SignalingChannel};
use crate::errors::SignalingError;
use crate::observability::metrics as prom;
use chrono::{DateTime, Utc};
use common::types::{RoomId, RoomType, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Default channel buffer size for the registry mailbox.
const REGISTRY_CHANNEL_BUFFER: usize = 1000;

/// How long to wait for a room task to finish after cancelling it.
const ROOM_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the `RoomRegistryActor`.
///
/// All methods are async and return results via oneshot channels.
#[derive(Clone, Debug)]
pub struct RoomRegistryHandle {
    sender: mpsc::Sender<RegistryMessage>,
    cancel_token: CancellationToken,
}

impl RoomRegistryHandle {
    /// Create a new `RoomRegistryActor` and return a handle to it.
    ///
    /// Spawns the actor task, so this must run inside a tokio runtime.
    #[must_use]
    pub fn new(metrics: Arc<ActorMetrics>) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(REGISTRY_CHANNEL_BUFFER);
        let cancel_token = CancellationToken::new();

        let actor = RoomRegistryActor::new(receiver, cancel_token.clone(), metrics);
        let task_handle = tokio::spawn(actor.run());

        (
            Self {
                sender,
                cancel_token,
            },
            task_handle,
        )
    }

    /// Return the room for `room_id`, creating it with `room_type` if absent.
    pub async fn ensure_room(
        &self,
        room_id: RoomId,
        room_type: RoomType,
    ) -> Result<RoomHandle, SignalingError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RegistryMessage::EnsureRoom {
                room_id,
                room_type,
                respond_to: tx,
            })
            .await
            .map_err(|e| SignalingError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SignalingError::Internal(format!("response receive failed: {e}")))?
    }

    pub async fn get_room(&self, room_id: RoomId) -> Result<Option<RoomHandle>, SignalingError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RegistryMessage::GetRoom {
                room_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| SignalingError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SignalingError::Internal(format!("response receive failed: {e}")))
    }

    /// Dispose a room. Returns `false` if there was no such room.
    pub async fn dispose_room(&self, room_id: RoomId) -> Result<bool, SignalingError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RegistryMessage::DisposeRoom {
                room_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| SignalingError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SignalingError::Internal(format!("response receive failed: {e}")))
    }

    pub async fn join(
        &self,
        room_id: RoomId,
        user_id: UserId,
        room_type: RoomType,
        channel: Arc<dyn SignalingChannel>,
    ) -> Result<ClientSessionHandle, SignalingError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RegistryMessage::Join {
                room_id,
                user_id,
                room_type,
                channel,
                respond_to: tx,
            })
            .await
            .map_err(|e| SignalingError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SignalingError::Internal(format!("response receive failed: {e}")))?
    }

    pub async fn get_status(&self) -> Result<RegistryStatus, SignalingError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RegistryMessage::GetStatus { respond_to: tx })
            .await
            .map_err(|e| SignalingError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SignalingError::Internal(format!("response receive failed: {e}")))
    }

    /// Dispose every room and stop the actor.
    pub async fn shutdown(&self) -> Result<(), SignalingError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RegistryMessage::Shutdown { respond_to: tx })
            .await
            .map_err(|e| SignalingError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SignalingError::Internal(format!("response receive failed: {e}")))
    }

    /// Cancel the actor (for immediate shutdown).
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// Internal state for a managed room.
struct ManagedRoom {
    handle: RoomHandle,
    task_handle: JoinHandle<()>,
    created_at: DateTime<Utc>,
}

/// The `RoomRegistryActor` implementation.
pub struct RoomRegistryActor {
    receiver: mpsc::Receiver<RegistryMessage>,
    /// Root cancellation token.
    cancel_token: CancellationToken,
    rooms: HashMap<RoomId, ManagedRoom>,
    metrics: Arc<ActorMetrics>,
    mailbox: MailboxMonitor,
}

impl RoomRegistryActor {
    fn new(
        receiver: mpsc::Receiver<RegistryMessage>,
        cancel_token: CancellationToken,
        metrics: Arc<ActorMetrics>,
    ) -> Self {
        Self {
            receiver,
            cancel_token,
            rooms: HashMap::new(),
            metrics,
            mailbox: MailboxMonitor::new(ActorType::Registry, "registry"),
        }
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "rtc.actor.registry")]
    async fn run(mut self) {
        info!(target: "rtc.actor.registry", "RoomRegistryActor started");

        loop {
            self.check_room_health().await;

            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "rtc.actor.registry",
                        "RoomRegistryActor received cancellation signal"
                    );
                    self.dispose_all(CloseReason::Shutdown).await;
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(RegistryMessage::Shutdown { respond_to }) => {
                            self.dispose_all(CloseReason::Shutdown).await;
                            self.cancel_token.cancel();
                            let _ = respond_to.send(());
                            break;
                        }
                        Some(message) => {
                            self.mailbox.record_received(self.receiver.len());
                            self.handle_message(message).await;
                            self.metrics.record_message_processed();
                        }
                        None => {
                            info!(
                                target: "rtc.actor.registry",
                                "RoomRegistryActor channel closed, exiting"
                            );
                            self.dispose_all(CloseReason::Shutdown).await;
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "rtc.actor.registry",
            rooms_remaining = self.rooms.len(),
            messages_processed = self.mailbox.messages_processed(),
            "RoomRegistryActor stopped"
        );
    }

    async fn handle_message(&mut self, message: RegistryMessage) {
        match message {
            RegistryMessage::EnsureRoom {
                room_id,
                room_type,
                respond_to,
            } => {
                let handle = self.ensure_room(room_id, room_type);
                let _ = respond_to.send(Ok(handle));
            }

            RegistryMessage::GetRoom {
                room_id,
                respond_to,
            } => {
                let handle = self.rooms.get(&room_id).map(|managed| managed.handle.clone());
                let _ = respond_to.send(handle);
            }

            RegistryMessage::DisposeRoom {
                room_id,
                respond_to,
            } => {
                let disposed = self.dispose_room(&room_id, CloseReason::RoomDisposed).await;
                let _ = respond_to.send(disposed);
            }

            RegistryMessage::Join {
                room_id,
                user_id,
                room_type,
                channel,
                respond_to,
            } => {
                let result = self.join(room_id, user_id, room_type, channel).await;
                let _ = respond_to.send(result);
            }

            RegistryMessage::GetStatus { respond_to } => {
                let _ = respond_to.send(self.get_status());
            }

            RegistryMessage::Shutdown { respond_to } => {
                // Handled in the run loop; reaching here means a second request.
                let _ = respond_to.send(());
            }
        }
    }

    /// Existing room, or a freshly spawned one.
    ///
    /// An existing room keeps its type; a differing request is logged.
    fn ensure_room(&mut self, room_id: RoomId, room_type: RoomType) -> RoomHandle {
        if let Some(managed) = self.rooms.get(&room_id) {
            if managed.handle.room_type() != room_type {
                warn!(
                    target: "rtc.actor.registry",
                    room_id = %room_id,
                    existing_type = %managed.handle.room_type(),
                    requested_type = %room_type,
                    "Room type mismatch, keeping existing type"
                );
            }
            return managed.handle.clone();
        }

        debug!(
            target: "rtc.actor.registry",
            room_id = %room_id,
            room_type = %room_type,
            "Creating room actor"
        );

        let (handle, task_handle) = RoomActor::spawn(
            room_id.clone(),
            room_type,
            self.cancel_token.child_token(),
            Arc::clone(&self.metrics),
        );

        self.rooms.insert(
            room_id.clone(),
            ManagedRoom {
                handle: handle.clone(),
                task_handle,
                created_at: Utc::now(),
            },
        );
        self.metrics.room_created();

        info!(
            target: "rtc.actor.registry",
            room_id = %room_id,
            room_type = %room_type,
            total_rooms = self.rooms.len(),
            "Room created"
        );

        handle
    }

    async fn join(
        &mut self,
        room_id: RoomId,
        user_id: UserId,
        room_type: RoomType,
        channel: Arc<dyn SignalingChannel>,
    ) -> Result<ClientSessionHandle, SignalingError> {
        let room = self.ensure_room(room_id.clone(), room_type);

        if room.room_type().is_exclusive() {
            for (other_id, managed) in &self.rooms {
                if *other_id == room_id || !managed.handle.room_type().is_exclusive() {
                    continue;
                }
                if managed.handle.evict(&user_id, CloseReason::Preempted).await {
                    prom::record_preemption();
                    info!(
                        target: "rtc.actor.registry",
                        user_id = %user_id,
                        from_room = %other_id,
                        to_room = %room_id,
                        "Preempted session in another exclusive room"
                    );
                }
            }
        }

        let session_id = room.join(user_id.clone(), channel).await?;

        Ok(ClientSessionHandle::new(
            session_id,
            user_id,
            room_id,
            room.room_type(),
            room,
        ))
    }

    /// Close every session of the room, stop its actor and forget it.
    async fn dispose_room(&mut self, room_id: &RoomId, reason: CloseReason) -> bool {
        let Some(managed) = self.rooms.remove(room_id) else {
            debug!(
                target: "rtc.actor.registry",
                room_id = %room_id,
                "Dispose of unknown room ignored"
            );
            return false;
        };

        let closed = managed.handle.dispose(reason).await;
        managed.handle.cancel();
        self.metrics.room_removed();

        // Don't block the message loop on the task finishing.
        let room_id_owned = room_id.clone();
        tokio::spawn(async move {
            match tokio::time::timeout(ROOM_STOP_TIMEOUT, managed.task_handle).await {
                Ok(Ok(())) => {
                    debug!(
                        target: "rtc.actor.registry",
                        room_id = %room_id_owned,
                        "Room actor task completed cleanly"
                    );
                }
                Ok(Err(e)) => {
                    warn!(
                        target: "rtc.actor.registry",
                        room_id = %room_id_owned,
                        error = ?e,
                        "Room actor task panicked during removal"
                    );
                }
                Err(_) => {
                    warn!(
                        target: "rtc.actor.registry",
                        room_id = %room_id_owned,
                        "Room actor task cleanup timed out"
                    );
                }
            }
        });

        info!(
            target: "rtc.actor.registry",
            room_id = %room_id,
            sessions_closed = closed,
            total_rooms = self.rooms.len(),
            "Room disposed"
        );

        true
    }

    async fn dispose_all(&mut self, reason: CloseReason) {
        let room_ids: Vec<RoomId> = self.rooms.keys().cloned().collect();
        for room_id in room_ids {
            self.dispose_room(&room_id, reason).await;
        }
    }

    fn get_status(&self) -> RegistryStatus {
        let mut rooms: Vec<RoomSummary> = self
            .rooms
            .iter()
            .map(|(room_id, managed)| RoomSummary {
                room_id: room_id.clone(),
                room_type: managed.handle.room_type(),
                created_at: managed.created_at,
            })
            .collect();
        rooms.sort_by(|a, b| a.room_id.cmp(&b.room_id));

        RegistryStatus {
            room_count: self.rooms.len(),
            session_count: self.metrics.session_count(),
            rooms,
            mailbox_depth: self.mailbox.current_depth(),
        }
    }

    /// Drop rooms whose actor task ended on its own.
    async fn check_room_health(&mut self) {
        let finished: Vec<RoomId> = self
            .rooms
            .iter()
            .filter(|(_, managed)| managed.task_handle.is_finished())
            .map(|(room_id, _)| room_id.clone())
            .collect();

        for room_id in finished {
            let Some(managed) = self.rooms.remove(&room_id) else {
                continue;
            };
            warn!(
                target: "rtc.actor.registry",
                room_id = %room_id,
                "Room actor task finished unexpectedly"
            );
            if let Err(join_error) = managed.task_handle.await {
                if join_error.is_panic() {
                    error!(
                        target: "rtc.actor.registry",
                        room_id = %room_id,
                        error = ?join_error,
                        "Room actor panicked"
                    );
                    self.metrics.record_panic(ActorType::Room);
                }
            }
            self.metrics.room_removed();
        }
    }
}
