//! Test harness for driving a real `SignalingDelegate` against the mock
//! media engine.
//!
//! # Example
//! ```rust,ignore
//! #[tokio::test]
//! async fn test_join_flow() {
//!     let harness = TestSignaling::start();
//!     let alice = harness.connect("room-1", "alice", RoomType::GuildVoice).await;
//!
//!     assert_eq!(alice.session.state().await, Some(ConnectionState::Connected));
//!     harness.stop().await;
//! }
//! ```

use crate::fixtures::{chrome_codecs, CHROME_OFFER};
use crate::mock_channel::RecordingChannel;
use crate::mock_media::MockMediaServer;
use common::types::{RoomId, RoomType, UserId};
use rtc_signaling::actors::ClientSessionHandle;
use rtc_signaling::channel::SignalingChannel;
use rtc_signaling::config::Config;
use rtc_signaling::media::sdp::FragmentParser;
use rtc_signaling::negotiation::Answer;
use rtc_signaling::SignalingDelegate;
use std::collections::HashMap;
use std::sync::Arc;

/// Public address used by harness configs.
pub const TEST_PUBLIC_ADDRESS: &str = "203.0.113.10";

/// Port range used by harness configs.
pub const TEST_PORT_RANGE: &str = "50000-50100";

/// Config for tests, built through `Config::from_vars`.
#[must_use]
pub fn test_config() -> Config {
    let vars = HashMap::from([
        (
            "WEBRTC_ADDRESS".to_string(),
            TEST_PUBLIC_ADDRESS.to_string(),
        ),
        ("WEBRTC_PORT_RANGE".to_string(), TEST_PORT_RANGE.to_string()),
    ]);
    Config::from_vars(&vars).expect("test config should load")
}

/// A joined client: its session handle and the channel it listens on.
#[derive(Debug, Clone)]
pub struct TestClient {
    pub session: ClientSessionHandle,
    pub channel: Arc<RecordingChannel>,
}

/// Running delegate plus the mock engine behind it.
pub struct TestSignaling {
    delegate: SignalingDelegate,
    media: MockMediaServer,
}

impl TestSignaling {
    /// Start with an accept-everything media server.
    ///
    /// Must be called inside a tokio runtime.
    #[must_use]
    pub fn start() -> Self {
        Self::start_with(MockMediaServer::new())
    }

    /// Start against a preconfigured mock.
    #[must_use]
    pub fn start_with(media: MockMediaServer) -> Self {
        let delegate =
            SignalingDelegate::start(&test_config(), &media, Arc::new(FragmentParser))
                .expect("delegate should start");
        Self { delegate, media }
    }

    #[must_use]
    pub fn delegate(&self) -> &SignalingDelegate {
        &self.delegate
    }

    #[must_use]
    pub fn media(&self) -> &MockMediaServer {
        &self.media
    }

    /// Join without negotiating.
    pub async fn join(&self, room: &str, user: &str, room_type: RoomType) -> TestClient {
        let channel = RecordingChannel::new();
        let signaling: Arc<dyn SignalingChannel> = channel.clone();
        let session = self
            .delegate
            .join(
                RoomId::from(room),
                UserId::from(user),
                signaling,
                room_type,
            )
            .await
            .expect("join should succeed");
        TestClient { session, channel }
    }

    /// Join and negotiate a Chromium offer, leaving the session connected.
    pub async fn connect(&self, room: &str, user: &str, room_type: RoomType) -> TestClient {
        let client = self.join(room, user, room_type).await;
        self.negotiate(&client).await;
        client
    }

    /// Negotiate a Chromium offer for an existing client.
    pub async fn negotiate(&self, client: &TestClient) -> Answer {
        self.delegate
            .on_offer(&client.session, CHROME_OFFER, &chrome_codecs())
            .await
            .expect("negotiation should succeed")
    }

    pub async fn stop(&self) {
        self.delegate.stop().await.expect("stop should succeed");
    }
}
