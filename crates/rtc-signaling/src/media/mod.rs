//! Media-transport collaborator interfaces.
//!
//! The forwarding engine (RTP relay, ICE/DTLS/SRTP, congestion control) is
//! opaque to the signaling layer. These traits are the only surface the
//! layer consumes. All calls are synchronous: engines do their I/O on their
//! own threads and return handles immediately.

pub mod sdp;

use crate::config::PortRange;
use crate::tracks::TrackIdentifiers;
use common::types::MediaKind;
use sdp::{Fingerprint, IceCandidate, IceCredentials, MediaDescription, SessionDescription};
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use thiserror::Error;

/// Failure reported by the media engine.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Local DTLS and ICE material of a transport.
#[derive(Debug)]
pub struct LocalSecurityInfo {
    pub fingerprint: Fingerprint,
    pub ice: IceCredentials,
    pub candidates: Vec<IceCandidate>,
}

/// What the server answered with, applied to the transport once negotiated.
#[derive(Debug, Clone, Copy)]
pub struct LocalProperties<'a> {
    pub security: &'a LocalSecurityInfo,
    pub audio: &'a MediaDescription,
    pub video: &'a MediaDescription,
}

/// Request for a new engine track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSpec {
    pub id: String,
    pub kind: MediaKind,
    pub identifiers: TrackIdentifiers,
}

/// Process-wide media engine.
pub trait MediaServer {
    /// Restrict transport allocation to `range`. Rejection is fatal at startup.
    fn set_port_range(&self, range: PortRange) -> Result<(), TransportError>;

    /// Bind an endpoint on the public address.
    fn create_endpoint(&self, address: IpAddr) -> Result<Arc<dyn Endpoint>, TransportError>;
}

/// Bound endpoint from which transports are allocated.
pub trait Endpoint: Send + Sync + fmt::Debug {
    fn local_port(&self) -> u16;

    fn create_transport(
        &self,
        description: &SessionDescription,
    ) -> Result<Box<dyn Transport>, TransportError>;
}

/// One peer connection, owned exclusively by a session.
pub trait Transport: Send + fmt::Debug {
    fn set_remote_properties(
        &mut self,
        description: &SessionDescription,
    ) -> Result<(), TransportError>;

    fn set_local_properties(&mut self, properties: LocalProperties<'_>)
        -> Result<(), TransportError>;

    fn local_security_info(&self) -> Result<LocalSecurityInfo, TransportError>;

    fn local_port(&self) -> u16;

    fn create_incoming_track(
        &mut self,
        spec: &TrackSpec,
    ) -> Result<Box<dyn TrackHandle>, TransportError>;

    fn create_outgoing_track(
        &mut self,
        spec: &TrackSpec,
    ) -> Result<Box<dyn TrackHandle>, TransportError>;

    /// Release the connection. Tracks must be stopped first.
    fn stop(&mut self);
}

/// Engine track handle.
pub trait TrackHandle: Send + fmt::Debug {
    fn id(&self) -> &str;

    /// Forward media arriving on `source` through this (outgoing) track.
    fn attach_to(&mut self, source: &dyn TrackHandle) -> Result<(), TransportError>;

    fn stop(&mut self);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::new("no free port in 50000-50999");
        assert_eq!(err.to_string(), "no free port in 50000-50999");
    }
}
