//! Upward-facing entry point of the signaling layer.
//!
//! The outer signaling transport (WebSocket framing, auth) holds one
//! [`SignalingDelegate`] and calls into it from independent request
//! handlers. The delegate owns the room registry and the negotiation
//! engine and has explicit start/stop.
//!
//! # Startup
//!
//! 1. Apply the configured port range to the media server
//! 2. Bind the endpoint on the public address
//! 3. Spawn the `RoomRegistryActor`
//!
//! Any failure here is fatal: a half-configured port range cannot safely
//! serve a session. [`SignalingDelegate::start_or_exit`] terminates the
//! process with exit code 1.

use crate::actors::{
    ActorMetrics, ClientSessionHandle, RegistryStatus, RoomHandle, RoomRegistryHandle,
};
use crate::channel::SignalingChannel;
use crate::config::{Config, PortRange};
use crate::errors::SignalingError;
use crate::media::sdp::DescriptionParser;
use crate::media::{Endpoint, MediaServer};
use crate::negotiation::{Answer, CodecCapability, NegotiationEngine};
use common::types::{RoomId, RoomType, UserId};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// How long `stop` waits for the registry task to finish.
const REGISTRY_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Signaling delegate: join, negotiate, leave, room lifecycle.
pub struct SignalingDelegate {
    registry: RoomRegistryHandle,
    registry_task: Mutex<Option<JoinHandle<()>>>,
    negotiation: NegotiationEngine,
    endpoint: Arc<dyn Endpoint>,
    metrics: Arc<ActorMetrics>,
    public_address: IpAddr,
    port_range: PortRange,
}

impl SignalingDelegate {
    /// Configure the media server and spawn the actor system.
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// `Configuration` if the media server rejects the port range,
    /// `Transport` if the endpoint cannot be bound.
    pub fn start(
        config: &Config,
        server: &dyn MediaServer,
        parser: Arc<dyn DescriptionParser>,
    ) -> Result<Self, SignalingError> {
        server.set_port_range(config.port_range).map_err(|e| {
            SignalingError::Configuration(format!(
                "media server rejected port range {}: {e}",
                config.port_range
            ))
        })?;

        let endpoint = server.create_endpoint(config.public_address)?;

        let metrics = ActorMetrics::new();
        let (registry, registry_task) = RoomRegistryHandle::new(Arc::clone(&metrics));
        let negotiation = NegotiationEngine::new(
            registry.clone(),
            parser,
            Arc::clone(&endpoint),
            config.public_address,
        );

        info!(
            target: "rtc.delegate",
            public_address = %config.public_address,
            port_range = %config.port_range,
            endpoint_port = endpoint.local_port(),
            "Signaling delegate started"
        );

        Ok(Self {
            registry,
            registry_task: Mutex::new(Some(registry_task)),
            negotiation,
            endpoint,
            metrics,
            public_address: config.public_address,
            port_range: config.port_range,
        })
    }

    /// Like [`start`](Self::start), but any failure terminates the process.
    #[must_use]
    pub fn start_or_exit(
        config: &Config,
        server: &dyn MediaServer,
        parser: Arc<dyn DescriptionParser>,
    ) -> Self {
        match Self::start(config, server, parser) {
            Ok(delegate) => delegate,
            Err(e) => {
                error!(target: "rtc.delegate", error = %e, "Signaling delegate failed to start");
                std::process::exit(1);
            }
        }
    }

    #[must_use]
    pub fn public_address(&self) -> IpAddr {
        self.public_address
    }

    #[must_use]
    pub fn port_range(&self) -> PortRange {
        self.port_range
    }

    /// Port of the bound endpoint.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.endpoint.local_port()
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<ActorMetrics> {
        &self.metrics
    }

    /// Join `user_id` to `room_id`, creating the room with `room_type` if
    /// needed. Any prior session of the user that conflicts is closed
    /// before the new one becomes visible.
    pub async fn join(
        &self,
        room_id: RoomId,
        user_id: UserId,
        channel: Arc<dyn SignalingChannel>,
        room_type: RoomType,
    ) -> Result<ClientSessionHandle, SignalingError> {
        self.registry
            .join(room_id, user_id, room_type, channel)
            .await
    }

    /// Negotiate an offer for `session`.
    pub async fn on_offer(
        &self,
        session: &ClientSessionHandle,
        offer: &str,
        codecs: &[CodecCapability],
    ) -> Result<Answer, SignalingError> {
        self.negotiation.negotiate(session, offer, codecs).await
    }

    /// Renegotiation through an updated description is not implemented.
    pub async fn update_sdp(
        &self,
        session: &ClientSessionHandle,
        _offer: &str,
    ) -> Result<Answer, SignalingError> {
        warn!(
            target: "rtc.delegate",
            room_id = %session.room_id(),
            user_id = %session.user_id(),
            "update_sdp called but not supported"
        );
        Err(SignalingError::Unsupported("update_sdp"))
    }

    /// The client's signaling connection went away.
    ///
    /// Returns `false` if the session was already gone.
    pub async fn on_client_close(&self, session: &ClientSessionHandle) -> bool {
        session.leave().await
    }

    /// Create the room if absent. Idempotent.
    pub async fn create_room(
        &self,
        room_id: RoomId,
        room_type: RoomType,
    ) -> Result<RoomHandle, SignalingError> {
        self.registry.ensure_room(room_id, room_type).await
    }

    /// Dispose the room, closing every member. Idempotent.
    pub async fn dispose_room(&self, room_id: RoomId) -> Result<bool, SignalingError> {
        self.registry.dispose_room(room_id).await
    }

    /// Snapshot of the room's sessions. Empty if the room does not exist.
    pub async fn list_sessions(
        &self,
        room_id: RoomId,
    ) -> Result<Vec<ClientSessionHandle>, SignalingError> {
        match self.registry.get_room(room_id).await? {
            Some(room) => Ok(room.session_handles().await),
            None => Ok(Vec::new()),
        }
    }

    pub async fn status(&self) -> Result<RegistryStatus, SignalingError> {
        self.registry.get_status().await
    }

    /// Close every session with `Shutdown` and stop all actors.
    pub async fn stop(&self) -> Result<(), SignalingError> {
        info!(target: "rtc.delegate", "Stopping signaling delegate");

        let result = self.registry.shutdown().await;
        if result.is_err() {
            // Already stopped or the actor died; make sure children are cancelled.
            self.registry.cancel();
        }

        if let Some(task) = self.registry_task.lock().await.take() {
            match tokio::time::timeout(REGISTRY_STOP_TIMEOUT, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(target: "rtc.delegate", error = %e, "Registry task panicked");
                }
                Err(_) => {
                    warn!(
                        target: "rtc.delegate",
                        timeout_secs = REGISTRY_STOP_TIMEOUT.as_secs(),
                        "Registry task did not stop in time"
                    );
                }
            }
        }

        info!(
            target: "rtc.delegate",
            rooms_active = self.metrics.room_count(),
            sessions_active = self.metrics.session_count(),
            "Signaling delegate stopped"
        );
        result
    }
}
