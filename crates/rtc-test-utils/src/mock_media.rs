//! Mock media engine for signaling tests.
//!
//! Every call the signaling layer makes into the engine is recorded in a
//! shared [`EngineLog`], so tests can assert on live/stopped tracks,
//! attachments and transport lifetimes. The mock also checks teardown
//! ordering: stopping an incoming track while an outgoing track is still
//! attached to it, or stopping a transport with live tracks, is recorded
//! as an ordering violation.
//!
//! # Example
//!
//! ```rust,ignore
//! use rtc_test_utils::MockMediaServer;
//!
//! let server = MockMediaServer::builder()
//!     .transport_port(50010)
//!     .without_candidates()
//!     .build();
//!
//! // Start the delegate against `server`, then inspect:
//! assert_eq!(server.live_tracks().len(), 0);
//! ```

use common::types::MediaKind;
use rtc_signaling::config::PortRange;
use rtc_signaling::media::sdp::{Fingerprint, IceCandidate, IceCredentials, MediaDescription, SessionDescription};
use rtc_signaling::media::{
    Endpoint, LocalProperties, LocalSecurityInfo, MediaServer, TrackHandle, TrackSpec, Transport,
    TransportError,
};
use rtc_signaling::tracks::{TrackDirection, TrackIdentifiers};
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard};

/// Default port reported by the mock endpoint.
pub const DEFAULT_ENDPOINT_PORT: u16 = 50000;

/// Default port reported by mock transports.
pub const DEFAULT_TRANSPORT_PORT: u16 = 50010;

/// One engine track as seen by the mock.
#[derive(Debug, Clone)]
pub struct TrackRecord {
    /// Unique engine id (`<spec id>#<serial>`).
    pub engine_id: String,
    /// Id requested by the signaling layer.
    pub spec_id: String,
    pub transport: u64,
    pub kind: MediaKind,
    pub direction: TrackDirection,
    pub identifiers: TrackIdentifiers,
    /// Engine id of the source this outgoing track forwards.
    pub attached_to: Option<String>,
    pub stopped: bool,
}

/// One transport as seen by the mock.
#[derive(Debug, Clone)]
pub struct TransportRecord {
    pub id: u64,
    pub remote_set: bool,
    pub local_audio: Option<MediaDescription>,
    pub local_video: Option<MediaDescription>,
    pub stopped: bool,
}

/// Shared record of engine calls.
#[derive(Debug, Default)]
pub struct EngineLog {
    pub port_range: Option<PortRange>,
    pub endpoints: Vec<IpAddr>,
    pub transports: Vec<TransportRecord>,
    pub tracks: Vec<TrackRecord>,
    /// Teardown ordering problems, described in plain text.
    pub ordering_violations: Vec<String>,
    next_serial: u64,
}

impl EngineLog {
    fn next_serial(&mut self) -> u64 {
        self.next_serial += 1;
        self.next_serial
    }

    fn track_mut(&mut self, engine_id: &str) -> Option<&mut TrackRecord> {
        self.tracks.iter_mut().find(|t| t.engine_id == engine_id)
    }

    fn transport_mut(&mut self, id: u64) -> Option<&mut TransportRecord> {
        self.transports.iter_mut().find(|t| t.id == id)
    }
}

#[derive(Debug, Clone)]
struct MockBehavior {
    reject_port_range: bool,
    fail_endpoint: bool,
    fail_transport: bool,
    fail_remote_properties: bool,
    fail_tracks: bool,
    with_candidates: bool,
    endpoint_port: u16,
    transport_port: u16,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            reject_port_range: false,
            fail_endpoint: false,
            fail_transport: false,
            fail_remote_properties: false,
            fail_tracks: false,
            with_candidates: true,
            endpoint_port: DEFAULT_ENDPOINT_PORT,
            transport_port: DEFAULT_TRANSPORT_PORT,
        }
    }
}

/// Mock media server. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct MockMediaServer {
    log: Arc<Mutex<EngineLog>>,
    behavior: MockBehavior,
}

impl MockMediaServer {
    /// A server that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn builder() -> MockMediaServerBuilder {
        MockMediaServerBuilder::default()
    }

    /// Lock the shared log.
    pub fn log(&self) -> MutexGuard<'_, EngineLog> {
        self.log.lock().unwrap()
    }

    /// Tracks that have not been stopped.
    #[must_use]
    pub fn live_tracks(&self) -> Vec<TrackRecord> {
        self.log()
            .tracks
            .iter()
            .filter(|t| !t.stopped)
            .cloned()
            .collect()
    }

    /// Live tracks requested under `spec_id` in `direction`.
    #[must_use]
    pub fn live_tracks_for(&self, spec_id: &str, direction: TrackDirection) -> Vec<TrackRecord> {
        self.live_tracks()
            .into_iter()
            .filter(|t| t.spec_id == spec_id && t.direction == direction)
            .collect()
    }

    /// Count of transports ever created.
    #[must_use]
    pub fn transports_created(&self) -> usize {
        self.log().transports.len()
    }

    /// Count of transports not yet stopped.
    #[must_use]
    pub fn live_transports(&self) -> usize {
        self.log().transports.iter().filter(|t| !t.stopped).count()
    }

    #[must_use]
    pub fn transport(&self, id: u64) -> Option<TransportRecord> {
        self.log().transports.iter().find(|t| t.id == id).cloned()
    }

    #[must_use]
    pub fn last_transport(&self) -> Option<TransportRecord> {
        self.log().transports.last().cloned()
    }

    #[must_use]
    pub fn ordering_violations(&self) -> Vec<String> {
        self.log().ordering_violations.clone()
    }

    #[must_use]
    pub fn port_range(&self) -> Option<PortRange> {
        self.log().port_range
    }
}

impl MediaServer for MockMediaServer {
    fn set_port_range(&self, range: PortRange) -> Result<(), TransportError> {
        if self.behavior.reject_port_range {
            return Err(TransportError::new(format!("port range {range} rejected")));
        }
        self.log().port_range = Some(range);
        Ok(())
    }

    fn create_endpoint(&self, address: IpAddr) -> Result<Arc<dyn Endpoint>, TransportError> {
        if self.behavior.fail_endpoint {
            return Err(TransportError::new("endpoint bind failed"));
        }
        self.log().endpoints.push(address);
        Ok(Arc::new(MockEndpoint {
            log: Arc::clone(&self.log),
            behavior: self.behavior.clone(),
            address,
        }))
    }
}

/// Builder for `MockMediaServer`.
#[derive(Debug, Default)]
pub struct MockMediaServerBuilder {
    behavior: MockBehavior,
}

impl MockMediaServerBuilder {
    /// `set_port_range` fails.
    #[must_use]
    pub fn reject_port_range(mut self) -> Self {
        self.behavior.reject_port_range = true;
        self
    }

    /// `create_endpoint` fails.
    #[must_use]
    pub fn fail_endpoint(mut self) -> Self {
        self.behavior.fail_endpoint = true;
        self
    }

    /// `create_transport` fails.
    #[must_use]
    pub fn fail_transport(mut self) -> Self {
        self.behavior.fail_transport = true;
        self
    }

    /// `set_remote_properties` fails on every transport.
    #[must_use]
    pub fn fail_remote_properties(mut self) -> Self {
        self.behavior.fail_remote_properties = true;
        self
    }

    /// Track creation fails on every transport.
    #[must_use]
    pub fn fail_tracks(mut self) -> Self {
        self.behavior.fail_tracks = true;
        self
    }

    /// Transports report no local candidate.
    #[must_use]
    pub fn without_candidates(mut self) -> Self {
        self.behavior.with_candidates = false;
        self
    }

    #[must_use]
    pub fn endpoint_port(mut self, port: u16) -> Self {
        self.behavior.endpoint_port = port;
        self
    }

    #[must_use]
    pub fn transport_port(mut self, port: u16) -> Self {
        self.behavior.transport_port = port;
        self
    }

    #[must_use]
    pub fn build(self) -> MockMediaServer {
        MockMediaServer {
            log: Arc::default(),
            behavior: self.behavior,
        }
    }
}

#[derive(Debug)]
struct MockEndpoint {
    log: Arc<Mutex<EngineLog>>,
    behavior: MockBehavior,
    address: IpAddr,
}

impl Endpoint for MockEndpoint {
    fn local_port(&self) -> u16 {
        self.behavior.endpoint_port
    }

    fn create_transport(
        &self,
        _description: &SessionDescription,
    ) -> Result<Box<dyn Transport>, TransportError> {
        if self.behavior.fail_transport {
            return Err(TransportError::new("transport allocation failed"));
        }
        let mut log = self.log.lock().unwrap();
        let id = log.next_serial();
        log.transports.push(TransportRecord {
            id,
            remote_set: false,
            local_audio: None,
            local_video: None,
            stopped: false,
        });
        Ok(Box::new(MockTransport {
            id,
            log: Arc::clone(&self.log),
            behavior: self.behavior.clone(),
            address: self.address,
            stopped: false,
        }))
    }
}

/// Mock transport. Dropping it without `stop` is recorded as a violation.
#[derive(Debug)]
pub struct MockTransport {
    id: u64,
    log: Arc<Mutex<EngineLog>>,
    behavior: MockBehavior,
    address: IpAddr,
    stopped: bool,
}

impl MockTransport {
    fn create_track(
        &mut self,
        spec: &TrackSpec,
        direction: TrackDirection,
    ) -> Result<Box<dyn TrackHandle>, TransportError> {
        if self.behavior.fail_tracks {
            return Err(TransportError::new("track creation failed"));
        }
        let mut log = self.log.lock().unwrap();
        if self.stopped {
            log.ordering_violations
                .push(format!("track {} created on stopped transport {}", spec.id, self.id));
        }
        let serial = log.next_serial();
        let engine_id = format!("{}#{serial}", spec.id);
        log.tracks.push(TrackRecord {
            engine_id: engine_id.clone(),
            spec_id: spec.id.clone(),
            transport: self.id,
            kind: spec.kind,
            direction,
            identifiers: spec.identifiers,
            attached_to: None,
            stopped: false,
        });
        Ok(Box::new(MockTrackHandle {
            engine_id,
            direction,
            log: Arc::clone(&self.log),
            stopped: false,
        }))
    }
}

impl Transport for MockTransport {
    fn set_remote_properties(
        &mut self,
        _description: &SessionDescription,
    ) -> Result<(), TransportError> {
        if self.behavior.fail_remote_properties {
            return Err(TransportError::new("remote properties rejected"));
        }
        let mut log = self.log.lock().unwrap();
        if let Some(record) = log.transport_mut(self.id) {
            record.remote_set = true;
        }
        Ok(())
    }

    fn set_local_properties(
        &mut self,
        properties: LocalProperties<'_>,
    ) -> Result<(), TransportError> {
        let mut log = self.log.lock().unwrap();
        if let Some(record) = log.transport_mut(self.id) {
            record.local_audio = Some(properties.audio.clone());
            record.local_video = Some(properties.video.clone());
        }
        Ok(())
    }

    fn local_security_info(&self) -> Result<LocalSecurityInfo, TransportError> {
        let candidates = if self.behavior.with_candidates {
            vec![IceCandidate {
                foundation: "1".to_string(),
                component: 1,
                transport: "UDP".to_string(),
                priority: 2_130_706_431,
                address: self.address.to_string(),
                port: self.behavior.transport_port,
                candidate_type: "host".to_string(),
            }]
        } else {
            Vec::new()
        };
        Ok(LocalSecurityInfo {
            fingerprint: Fingerprint {
                hash: "sha-256".to_string(),
                value: MOCK_FINGERPRINT.to_string(),
            },
            ice: IceCredentials {
                ufrag: format!("mock{}", self.id),
                pwd: format!("mock-ice-password-{}", self.id).into(),
            },
            candidates,
        })
    }

    fn local_port(&self) -> u16 {
        self.behavior.transport_port
    }

    fn create_incoming_track(
        &mut self,
        spec: &TrackSpec,
    ) -> Result<Box<dyn TrackHandle>, TransportError> {
        self.create_track(spec, TrackDirection::Incoming)
    }

    fn create_outgoing_track(
        &mut self,
        spec: &TrackSpec,
    ) -> Result<Box<dyn TrackHandle>, TransportError> {
        self.create_track(spec, TrackDirection::Outgoing)
    }

    fn stop(&mut self) {
        let mut log = self.log.lock().unwrap();
        let live = log
            .tracks
            .iter()
            .filter(|t| t.transport == self.id && !t.stopped)
            .count();
        if live > 0 {
            log.ordering_violations.push(format!(
                "transport {} stopped with {live} live tracks",
                self.id
            ));
        }
        if self.stopped {
            log.ordering_violations
                .push(format!("transport {} stopped twice", self.id));
        }
        if let Some(record) = log.transport_mut(self.id) {
            record.stopped = true;
        }
        self.stopped = true;
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        if !self.stopped {
            if let Ok(mut log) = self.log.lock() {
                log.ordering_violations
                    .push(format!("transport {} dropped without stop", self.id));
            }
        }
    }
}

/// Fingerprint reported by every mock transport.
pub const MOCK_FINGERPRINT: &str =
    "4F:7A:12:9C:D0:33:8B:E1:56:02:AF:90:6D:C4:1B:7E:25:88:F3:0A:BC:49:D7:61:3E:95:0C:72:A8:14:E6:5B";

/// Mock engine track.
#[derive(Debug)]
pub struct MockTrackHandle {
    engine_id: String,
    direction: TrackDirection,
    log: Arc<Mutex<EngineLog>>,
    stopped: bool,
}

impl TrackHandle for MockTrackHandle {
    fn id(&self) -> &str {
        &self.engine_id
    }

    fn attach_to(&mut self, source: &dyn TrackHandle) -> Result<(), TransportError> {
        let mut log = self.log.lock().unwrap();
        let source_live = log
            .tracks
            .iter()
            .any(|t| t.engine_id == source.id() && !t.stopped);
        if !source_live {
            return Err(TransportError::new(format!(
                "attach to unknown or stopped track {}",
                source.id()
            )));
        }
        if let Some(record) = log.track_mut(&self.engine_id) {
            record.attached_to = Some(source.id().to_string());
        }
        Ok(())
    }

    fn stop(&mut self) {
        let mut log = self.log.lock().unwrap();
        if self.direction == TrackDirection::Incoming {
            let dependents = log
                .tracks
                .iter()
                .filter(|t| !t.stopped && t.attached_to.as_deref() == Some(self.engine_id.as_str()))
                .count();
            if dependents > 0 {
                log.ordering_violations.push(format!(
                    "incoming track {} stopped with {dependents} attached outgoing tracks",
                    self.engine_id
                ));
            }
        }
        if self.stopped {
            log.ordering_violations
                .push(format!("track {} stopped twice", self.engine_id));
        }
        if let Some(record) = log.track_mut(&self.engine_id) {
            record.stopped = true;
        }
        self.stopped = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::UserId;
    use rtc_signaling::tracks::track_id_for;

    fn spec(kind: MediaKind, user: &str, media: u32) -> TrackSpec {
        TrackSpec {
            id: track_id_for(kind, &UserId::from(user)),
            kind,
            identifiers: TrackIdentifiers::Audio { media },
        }
    }

    #[test]
    fn test_port_range_rejection() {
        let server = MockMediaServer::builder().reject_port_range().build();
        let range = PortRange::new(50000, 50100).unwrap();
        assert!(server.set_port_range(range).is_err());
        assert!(server.port_range().is_none());
    }

    #[test]
    fn test_stop_order_is_checked() {
        let server = MockMediaServer::new();
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        let endpoint = server.create_endpoint(ip).unwrap();

        let mut publisher = endpoint.create_transport(&SessionDescription::default()).unwrap();
        let mut subscriber = endpoint.create_transport(&SessionDescription::default()).unwrap();

        let mut source = publisher
            .create_incoming_track(&spec(MediaKind::Audio, "alice", 1111))
            .unwrap();
        let mut forward = subscriber
            .create_outgoing_track(&spec(MediaKind::Audio, "alice", 1111))
            .unwrap();
        forward.attach_to(source.as_ref()).unwrap();

        // Wrong order: source first.
        source.stop();
        forward.stop();
        publisher.stop();
        subscriber.stop();

        let violations = server.ordering_violations();
        assert_eq!(violations.len(), 1, "{violations:?}");
        assert!(violations[0].contains("attached outgoing"));
        assert!(server.live_tracks().is_empty());
        assert_eq!(server.live_transports(), 0);
    }
}
