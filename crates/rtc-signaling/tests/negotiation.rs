//! Integration tests for offer/answer negotiation.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use common::types::{MediaKind, RoomId, RoomType, UserId};
use rtc_signaling::actors::{ConnectionState, TrackOutcome};
use rtc_signaling::negotiation::{
    extensions, DEFAULT_H264_PAYLOAD_TYPE, DEFAULT_H264_RTX_PAYLOAD_TYPE,
    DEFAULT_OPUS_PAYLOAD_TYPE,
};
use rtc_signaling::SignalingError;
use rtc_test_utils::{
    audio_ssrcs, chrome_codecs, custom_h264_codecs, firefox_codecs, MockMediaServer,
    TestSignaling, CHROME_OFFER, FIREFOX_OFFER, MALFORMED_OFFER, MOCK_FINGERPRINT,
    OFFER_WITHOUT_PLAYOUT_DELAY, TEST_PUBLIC_ADDRESS,
};

// ============================================================================
// Answer contents
// ============================================================================

#[tokio::test]
async fn test_chromium_offer_gets_quirk_extensions() {
    let harness = TestSignaling::start();
    let client = harness.join("guild-1", "alice", RoomType::GuildVoice).await;

    let answer = harness
        .delegate()
        .on_offer(&client.session, CHROME_OFFER, &chrome_codecs())
        .await
        .unwrap();

    assert_eq!(answer.selected_video_codec, "H264");
    assert_eq!(answer.audio.extension_id(extensions::AUDIO_LEVEL), Some(1));
    assert_eq!(answer.audio.extension_id(extensions::TRANSPORT_CC), Some(3));
    assert_eq!(
        answer.video.extension_id(extensions::VIDEO_ORIENTATION),
        Some(13)
    );
    assert_eq!(answer.video.extensions.len(), 5);

    let opus = &answer.audio.codecs[0];
    assert_eq!(opus.name, "opus");
    assert_eq!(opus.payload_type, 111);
    assert_eq!(opus.channels, Some(2));
    assert_eq!(answer.audio.id, "0");
    assert_eq!(answer.video.id, "1");

    harness.stop().await;
}

#[tokio::test]
async fn test_other_browser_omits_quirk_extensions() {
    let harness = TestSignaling::start();
    let client = harness.join("guild-1", "alice", RoomType::GuildVoice).await;

    let answer = harness
        .delegate()
        .on_offer(&client.session, FIREFOX_OFFER, &firefox_codecs())
        .await
        .unwrap();

    // Ids come from the offer's own map.
    assert_eq!(answer.audio.extension_id(extensions::AUDIO_LEVEL), Some(2));
    assert_eq!(answer.audio.extension_id(extensions::TRANSPORT_CC), None);
    assert_eq!(answer.audio.extensions.len(), 1);
    assert_eq!(answer.video.extension_id(extensions::VIDEO_ORIENTATION), None);
    assert_eq!(answer.video.extension_id(extensions::PLAYOUT_DELAY), Some(6));
    assert_eq!(answer.video.extensions.len(), 4);

    assert_eq!(answer.audio.codecs[0].payload_type, 109);
    assert_eq!(answer.video.codecs[0].payload_type, 126);
    assert_eq!(answer.video.codecs[0].rtx_payload_type, Some(127));

    harness.stop().await;
}

#[tokio::test]
async fn test_h264_payload_types_echoed() {
    let harness = TestSignaling::start();
    let client = harness.join("guild-1", "alice", RoomType::GuildVoice).await;

    let answer = harness
        .delegate()
        .on_offer(&client.session, CHROME_OFFER, &custom_h264_codecs())
        .await
        .unwrap();

    assert_eq!(answer.video.codecs.len(), 1);
    assert_eq!(answer.video.codecs[0].payload_type, 120);
    assert_eq!(answer.video.codecs[0].rtx_payload_type, Some(121));

    harness.stop().await;
}

#[tokio::test]
async fn test_empty_capabilities_use_defaults() {
    let harness = TestSignaling::start();
    let client = harness.join("guild-1", "alice", RoomType::GuildVoice).await;

    let answer = harness
        .delegate()
        .on_offer(&client.session, CHROME_OFFER, &[])
        .await
        .unwrap();

    assert_eq!(answer.audio.codecs[0].payload_type, DEFAULT_OPUS_PAYLOAD_TYPE);
    assert_eq!(answer.video.codecs[0].payload_type, DEFAULT_H264_PAYLOAD_TYPE);
    assert_eq!(
        answer.video.codecs[0].rtx_payload_type,
        Some(DEFAULT_H264_RTX_PAYLOAD_TYPE)
    );
    // No Opus entry means no browser detection.
    assert_eq!(answer.audio.extension_id(extensions::TRANSPORT_CC), None);

    harness.stop().await;
}

#[tokio::test]
async fn test_answer_text_embeds_transport_security() {
    let harness = TestSignaling::start();
    let client = harness.join("guild-1", "alice", RoomType::GuildVoice).await;

    let answer = harness.negotiate(&client).await;
    let transport = harness.media().last_transport().unwrap();

    let lines: Vec<&str> = answer.sdp.lines().collect();
    assert_eq!(lines.len(), 8);
    assert_eq!(lines[0], "m=audio 50010 ICE/SDP");
    assert_eq!(lines[1], format!("a=fingerprint:sha-256 {MOCK_FINGERPRINT}"));
    assert_eq!(lines[2], format!("c=IN IP4 {TEST_PUBLIC_ADDRESS}"));
    assert_eq!(lines[3], "a=rtcp:50010");
    assert_eq!(lines[4], format!("a=ice-ufrag:mock{}", transport.id));
    assert_eq!(lines[5], format!("a=ice-pwd:mock-ice-password-{}", transport.id));
    assert_eq!(lines[6], lines[1]);
    assert_eq!(
        lines[7],
        format!("a=candidate:1 1 UDP 1 {TEST_PUBLIC_ADDRESS} 50010 typ host")
    );
    assert!(answer.sdp.ends_with('\n'));

    harness.stop().await;
}

#[tokio::test]
async fn test_transport_receives_canonical_descriptions() {
    let harness = TestSignaling::start();
    let client = harness.join("guild-1", "alice", RoomType::GuildVoice).await;

    let answer = harness.negotiate(&client).await;
    let transport = harness.media().last_transport().unwrap();

    assert!(transport.remote_set);
    assert_eq!(transport.local_audio.as_ref(), Some(&answer.audio));
    assert_eq!(transport.local_video.as_ref(), Some(&answer.video));
    assert!(!transport.stopped);

    harness.stop().await;
}

// ============================================================================
// State machine
// ============================================================================

#[tokio::test]
async fn test_offer_moves_session_to_connected() {
    let harness = TestSignaling::start();
    let client = harness.join("guild-1", "alice", RoomType::GuildVoice).await;
    assert_eq!(client.session.state().await, Some(ConnectionState::Joined));

    harness.negotiate(&client).await;

    assert_eq!(client.session.state().await, Some(ConnectionState::Connected));
    assert_eq!(
        client.channel.states(),
        vec![ConnectionState::Negotiating, ConnectionState::Connected]
    );

    harness.stop().await;
}

#[tokio::test]
async fn test_renegotiation_releases_previous_transport() {
    let harness = TestSignaling::start();
    let alice = UserId::from("alice");

    let alice_client = harness.connect("guild-1", "alice", RoomType::GuildVoice).await;
    let first_transport = harness.media().last_transport().unwrap().id;
    let bob = harness.connect("guild-1", "bob", RoomType::GuildVoice).await;

    alice_client
        .session
        .publish_track(MediaKind::Audio, audio_ssrcs(1111))
        .await
        .unwrap();
    bob.session
        .subscribe_to_track(&alice, MediaKind::Audio)
        .await
        .unwrap();

    harness.negotiate(&alice_client).await;

    assert!(harness.media().transport(first_transport).unwrap().stopped);
    assert_eq!(harness.media().transports_created(), 3);
    assert_eq!(harness.media().live_transports(), 2);
    assert!(harness.media().live_tracks().is_empty());
    assert!(harness.media().ordering_violations().is_empty());

    assert!(!bob.session.is_subscribed_to(&alice, MediaKind::Audio).await);
    assert!(bob.channel.saw_track_stopped("alice", MediaKind::Audio));
    assert!(!alice_client.session.is_producing(MediaKind::Audio).await);
    assert_eq!(
        alice_client.session.state().await,
        Some(ConnectionState::Connected)
    );

    // The new transport takes tracks again.
    assert_eq!(
        alice_client
            .session
            .publish_track(MediaKind::Audio, audio_ssrcs(1111))
            .await
            .unwrap(),
        TrackOutcome::Applied
    );

    harness.stop().await;
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_offer_after_dispose_is_precondition_failure() {
    let harness = TestSignaling::start();
    let client = harness.join("guild-1", "alice", RoomType::GuildVoice).await;

    harness
        .delegate()
        .dispose_room(RoomId::from("guild-1"))
        .await
        .unwrap();

    let err = harness
        .delegate()
        .on_offer(&client.session, CHROME_OFFER, &chrome_codecs())
        .await
        .unwrap_err();

    assert!(matches!(err, SignalingError::AuthenticationPrecondition));
    assert_eq!(err.error_code(), 2);
    assert_eq!(harness.media().transports_created(), 0);

    harness.stop().await;
}

#[tokio::test]
async fn test_offer_from_replaced_session_is_rejected() {
    let harness = TestSignaling::start();
    let old = harness.join("guild-1", "alice", RoomType::GuildVoice).await;
    let _new = harness.join("guild-1", "alice", RoomType::GuildVoice).await;

    let err = harness
        .delegate()
        .on_offer(&old.session, CHROME_OFFER, &chrome_codecs())
        .await
        .unwrap_err();
    assert!(matches!(err, SignalingError::SessionClosed));

    // Room recreated under the same id: the old handle is still stale.
    harness
        .delegate()
        .dispose_room(RoomId::from("guild-1"))
        .await
        .unwrap();
    harness.join("guild-1", "bob", RoomType::GuildVoice).await;
    let err = harness
        .delegate()
        .on_offer(&old.session, CHROME_OFFER, &chrome_codecs())
        .await
        .unwrap_err();
    assert!(matches!(err, SignalingError::SessionClosed));
    assert_eq!(harness.media().transports_created(), 0);

    harness.stop().await;
}

#[tokio::test]
async fn test_missing_extension_fails_and_allows_retry() {
    let harness = TestSignaling::start();
    let client = harness.join("guild-1", "alice", RoomType::GuildVoice).await;

    let err = harness
        .delegate()
        .on_offer(&client.session, OFFER_WITHOUT_PLAYOUT_DELAY, &chrome_codecs())
        .await
        .unwrap_err();

    assert!(
        matches!(err, SignalingError::MissingHeaderExtension(ref uri) if uri == extensions::PLAYOUT_DELAY)
    );
    assert_eq!(err.error_code(), 9);
    assert_eq!(harness.media().transports_created(), 0);
    assert_eq!(client.session.state().await, Some(ConnectionState::Joined));

    harness.negotiate(&client).await;
    assert_eq!(client.session.state().await, Some(ConnectionState::Connected));

    harness.stop().await;
}

#[tokio::test]
async fn test_malformed_offer_is_parse_error() {
    let harness = TestSignaling::start();
    let client = harness.join("guild-1", "alice", RoomType::GuildVoice).await;

    let err = harness
        .delegate()
        .on_offer(&client.session, MALFORMED_OFFER, &chrome_codecs())
        .await
        .unwrap_err();

    assert!(matches!(err, SignalingError::Parse(_)));
    assert_eq!(err.client_message(), "Malformed session description");

    harness.stop().await;
}

#[tokio::test]
async fn test_rejected_reoffer_keeps_connected_call() {
    let harness = TestSignaling::start();
    let alice = UserId::from("alice");

    let alice_client = harness.connect("guild-1", "alice", RoomType::GuildVoice).await;
    let bob = harness.connect("guild-1", "bob", RoomType::GuildVoice).await;
    alice_client
        .session
        .publish_track(MediaKind::Audio, audio_ssrcs(1111))
        .await
        .unwrap();
    bob.session
        .subscribe_to_track(&alice, MediaKind::Audio)
        .await
        .unwrap();
    let live_before = harness.media().live_tracks().len();

    for (offer, codecs) in [
        ("a=extmap:abc urn:x", chrome_codecs()),
        (OFFER_WITHOUT_PLAYOUT_DELAY, chrome_codecs()),
    ] {
        let err = harness
            .delegate()
            .on_offer(&alice_client.session, offer, &codecs)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), 9);

        assert_eq!(
            alice_client.session.state().await,
            Some(ConnectionState::Connected)
        );
        assert!(alice_client.session.is_producing(MediaKind::Audio).await);
        assert!(bob.session.is_subscribed_to(&alice, MediaKind::Audio).await);
        assert_eq!(harness.media().live_tracks().len(), live_before);
        assert_eq!(harness.media().transports_created(), 2);
        assert_eq!(harness.media().live_transports(), 2);
    }
    assert!(!bob.channel.saw_track_stopped("alice", MediaKind::Audio));

    harness.stop().await;
}

#[tokio::test]
async fn test_transport_without_candidate_is_stopped() {
    let harness =
        TestSignaling::start_with(MockMediaServer::builder().without_candidates().build());
    let client = harness.join("guild-1", "alice", RoomType::GuildVoice).await;

    let err = harness
        .delegate()
        .on_offer(&client.session, CHROME_OFFER, &chrome_codecs())
        .await
        .unwrap_err();

    assert!(matches!(err, SignalingError::Transport(_)));
    assert_eq!(err.client_message(), "An internal error occurred");
    assert_eq!(harness.media().transports_created(), 1);
    assert_eq!(harness.media().live_transports(), 0);
    assert!(harness.media().ordering_violations().is_empty());
    assert_eq!(
        client.session.state().await,
        Some(ConnectionState::Negotiating)
    );

    harness.stop().await;
}

#[tokio::test]
async fn test_remote_properties_failure_stops_transport() {
    let harness =
        TestSignaling::start_with(MockMediaServer::builder().fail_remote_properties().build());
    let client = harness.join("guild-1", "alice", RoomType::GuildVoice).await;

    let err = harness
        .delegate()
        .on_offer(&client.session, CHROME_OFFER, &chrome_codecs())
        .await
        .unwrap_err();

    assert!(matches!(err, SignalingError::Transport(_)));
    assert_eq!(harness.media().live_transports(), 0);

    harness.stop().await;
}

#[tokio::test]
async fn test_transport_allocation_failure() {
    let harness = TestSignaling::start_with(MockMediaServer::builder().fail_transport().build());
    let client = harness.join("guild-1", "alice", RoomType::GuildVoice).await;

    let err = harness
        .delegate()
        .on_offer(&client.session, CHROME_OFFER, &chrome_codecs())
        .await
        .unwrap_err();

    assert!(matches!(err, SignalingError::Transport(_)));
    assert_eq!(err.error_code(), 6);

    harness.stop().await;
}

#[tokio::test]
async fn test_update_sdp_is_unsupported() {
    let harness = TestSignaling::start();
    let client = harness.connect("guild-1", "alice", RoomType::GuildVoice).await;

    let err = harness
        .delegate()
        .update_sdp(&client.session, CHROME_OFFER)
        .await
        .unwrap_err();

    assert!(matches!(err, SignalingError::Unsupported("update_sdp")));
    assert_eq!(err.error_code(), 8);
    assert_eq!(harness.media().transports_created(), 1);

    harness.stop().await;
}
