//! Integration tests for room membership.
//!
//! Covers cross-room exclusivity, preemptive rejoin, leave and dispose,
//! driven through `SignalingDelegate` against the mock media engine.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use common::types::{MediaKind, RoomId, RoomType, UserId};
use rtc_signaling::actors::{ConnectionState, NoOpReason, TrackOutcome};
use rtc_signaling::channel::{CloseReason, SessionEvent};
use rtc_signaling::tracks::TrackDirection;
use rtc_test_utils::{audio_ssrcs, TestSignaling};

async fn members(harness: &TestSignaling, room: &str) -> Vec<String> {
    let mut users: Vec<String> = harness
        .delegate()
        .list_sessions(RoomId::from(room))
        .await
        .unwrap()
        .iter()
        .map(|s| s.user_id().to_string())
        .collect();
    users.sort();
    users
}

// ============================================================================
// Exclusivity
// ============================================================================

#[tokio::test]
async fn test_exclusive_join_closes_session_in_other_exclusive_room() {
    let harness = TestSignaling::start();

    let guild = harness.join("guild-1", "alice", RoomType::GuildVoice).await;
    let dm = harness.join("dm-1", "alice", RoomType::DmVoice).await;

    assert!(members(&harness, "guild-1").await.is_empty());
    assert_eq!(members(&harness, "dm-1").await, vec!["alice"]);

    assert_eq!(guild.channel.closed_with(), Some(CloseReason::Preempted));
    assert_eq!(guild.channel.closed_event(), Some(CloseReason::Preempted));
    assert_eq!(guild.session.state().await, None);
    assert_eq!(dm.session.state().await, Some(ConnectionState::Joined));

    harness.stop().await;
}

#[tokio::test]
async fn test_stream_rooms_are_exempt() {
    let harness = TestSignaling::start();

    let guild = harness.join("guild-1", "alice", RoomType::GuildVoice).await;
    let stream_a = harness.join("stream-a", "alice", RoomType::Stream).await;
    let stream_b = harness.join("stream-b", "alice", RoomType::Stream).await;

    assert_eq!(members(&harness, "guild-1").await, vec!["alice"]);
    assert_eq!(members(&harness, "stream-a").await, vec!["alice"]);
    assert_eq!(members(&harness, "stream-b").await, vec!["alice"]);
    assert!(guild.channel.closed_with().is_none());
    assert!(stream_a.channel.closed_with().is_none());

    // Moving to a dm room only touches the exclusive room.
    harness.join("dm-1", "alice", RoomType::DmVoice).await;
    assert!(members(&harness, "guild-1").await.is_empty());
    assert_eq!(members(&harness, "stream-a").await, vec!["alice"]);
    assert_eq!(stream_b.session.state().await, Some(ConnectionState::Joined));

    harness.stop().await;
}

#[tokio::test]
async fn test_other_users_unaffected_by_exclusivity() {
    let harness = TestSignaling::start();

    harness.join("guild-1", "alice", RoomType::GuildVoice).await;
    let bob = harness.join("guild-1", "bob", RoomType::GuildVoice).await;
    harness.join("guild-2", "alice", RoomType::GuildVoice).await;

    assert_eq!(members(&harness, "guild-1").await, vec!["bob"]);
    assert!(bob.channel.saw_peer_left("alice"));
    assert!(bob.channel.closed_with().is_none());

    harness.stop().await;
}

#[tokio::test]
async fn test_concurrent_exclusive_joins_leave_one_session() {
    let harness = std::sync::Arc::new(TestSignaling::start());

    let mut tasks = Vec::new();
    for i in 0..10 {
        let harness = std::sync::Arc::clone(&harness);
        tasks.push(tokio::spawn(async move {
            let room = format!("guild-{i}");
            harness.join(&room, "alice", RoomType::GuildVoice).await
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let mut total = 0;
    for i in 0..10 {
        total += members(&harness, &format!("guild-{i}")).await.len();
    }
    assert_eq!(total, 1);

    let status = harness.delegate().status().await.unwrap();
    assert_eq!(status.room_count, 10);
    assert_eq!(status.session_count, 1);

    harness.stop().await;
}

#[tokio::test]
async fn test_existing_room_type_wins() {
    let harness = TestSignaling::start();
    let delegate = harness.delegate();

    let room = delegate
        .create_room(RoomId::from("room-1"), RoomType::GuildVoice)
        .await
        .unwrap();
    let again = delegate
        .create_room(RoomId::from("room-1"), RoomType::Stream)
        .await
        .unwrap();
    assert_eq!(room.room_type(), RoomType::GuildVoice);
    assert_eq!(again.room_type(), RoomType::GuildVoice);

    // A join asking for a stream room still lands in the guild room and
    // is subject to exclusivity.
    let alice = harness.join("room-1", "alice", RoomType::Stream).await;
    assert_eq!(alice.session.room_type(), RoomType::GuildVoice);

    harness.join("guild-2", "alice", RoomType::GuildVoice).await;
    assert!(members(&harness, "room-1").await.is_empty());

    harness.stop().await;
}

// ============================================================================
// Preemptive rejoin
// ============================================================================

#[tokio::test]
async fn test_rejoin_tears_down_old_session_first() {
    let harness = TestSignaling::start();
    let alice = UserId::from("alice");

    let old = harness.connect("guild-1", "alice", RoomType::GuildVoice).await;
    let bob = harness.connect("guild-1", "bob", RoomType::GuildVoice).await;

    assert_eq!(
        old.session
            .publish_track(MediaKind::Audio, audio_ssrcs(1111))
            .await
            .unwrap(),
        TrackOutcome::Applied
    );
    assert_eq!(
        bob.session
            .subscribe_to_track(&alice, MediaKind::Audio)
            .await
            .unwrap(),
        TrackOutcome::Applied
    );
    bob.channel.clear();

    let new = harness.join("guild-1", "alice", RoomType::GuildVoice).await;

    // Old session fully released.
    assert_eq!(old.channel.closed_with(), Some(CloseReason::Preempted));
    assert!(harness
        .media()
        .live_tracks_for("audio-alice", TrackDirection::Incoming)
        .is_empty());
    assert!(harness
        .media()
        .live_tracks_for("audio-alice", TrackDirection::Outgoing)
        .is_empty());
    assert!(!bob.session.is_subscribed_to(&alice, MediaKind::Audio).await);
    assert!(harness.media().ordering_violations().is_empty());

    // Peers saw the old session leave before the new one joined.
    let events = bob.channel.events();
    let left = events
        .iter()
        .position(|e| *e == SessionEvent::PeerLeft { user_id: alice.clone() })
        .expect("PeerLeft");
    let joined = events
        .iter()
        .position(|e| *e == SessionEvent::PeerJoined { user_id: alice.clone() })
        .expect("PeerJoined");
    assert!(left < joined);

    assert_ne!(old.session.session_id(), new.session.session_id());
    assert_eq!(new.session.state().await, Some(ConnectionState::Joined));
    assert_eq!(members(&harness, "guild-1").await, vec!["alice", "bob"]);

    harness.stop().await;
}

#[tokio::test]
async fn test_stale_handle_is_neutral() {
    let harness = TestSignaling::start();

    let old = harness.connect("stream-1", "alice", RoomType::Stream).await;
    let _new = harness.join("stream-1", "alice", RoomType::Stream).await;

    assert_eq!(
        old.session
            .publish_track(MediaKind::Audio, audio_ssrcs(1111))
            .await
            .unwrap(),
        TrackOutcome::Ignored(NoOpReason::SessionClosed)
    );
    assert!(!old.session.is_producing(MediaKind::Audio).await);
    assert!(!old.session.leave().await);
    assert_eq!(members(&harness, "stream-1").await, vec!["alice"]);

    harness.stop().await;
}

// ============================================================================
// Leave
// ============================================================================

#[tokio::test]
async fn test_leave_notifies_peers_without_forced_close() {
    let harness = TestSignaling::start();

    let alice = harness.connect("guild-1", "alice", RoomType::GuildVoice).await;
    let bob = harness.connect("guild-1", "bob", RoomType::GuildVoice).await;
    assert!(alice.channel.saw_peer_joined("bob"));

    assert!(harness.delegate().on_client_close(&alice.session).await);

    assert_eq!(alice.channel.closed_event(), Some(CloseReason::Left));
    assert_eq!(alice.channel.close_calls(), 0);
    assert!(bob.channel.saw_peer_left("alice"));
    assert_eq!(members(&harness, "guild-1").await, vec!["bob"]);
    assert_eq!(harness.media().live_transports(), 1);

    // Second close is a no-op.
    assert!(!harness.delegate().on_client_close(&alice.session).await);

    harness.stop().await;
}

#[tokio::test]
async fn test_leave_stops_peer_subscriptions() {
    let harness = TestSignaling::start();
    let alice_id = UserId::from("alice");

    let alice = harness.connect("guild-1", "alice", RoomType::GuildVoice).await;
    let bob = harness.connect("guild-1", "bob", RoomType::GuildVoice).await;
    alice
        .session
        .publish_track(MediaKind::Audio, audio_ssrcs(1111))
        .await
        .unwrap();
    bob.session
        .subscribe_to_track(&alice_id, MediaKind::Audio)
        .await
        .unwrap();

    alice.session.leave().await;

    assert!(!bob.session.is_subscribed_to(&alice_id, MediaKind::Audio).await);
    assert!(harness.media().live_tracks().is_empty());
    assert!(harness.media().ordering_violations().is_empty());

    harness.stop().await;
}

// ============================================================================
// Dispose
// ============================================================================

#[tokio::test]
async fn test_dispose_then_ensure_yields_fresh_room() {
    let harness = TestSignaling::start();
    let delegate = harness.delegate();

    let alice = harness.connect("guild-1", "alice", RoomType::GuildVoice).await;
    let bob = harness.connect("guild-1", "bob", RoomType::GuildVoice).await;
    alice
        .session
        .publish_track(MediaKind::Audio, audio_ssrcs(1111))
        .await
        .unwrap();

    assert!(delegate.dispose_room(RoomId::from("guild-1")).await.unwrap());

    assert_eq!(alice.channel.closed_with(), Some(CloseReason::RoomDisposed));
    assert_eq!(bob.channel.closed_with(), Some(CloseReason::RoomDisposed));
    assert!(harness.media().live_tracks().is_empty());
    assert_eq!(harness.media().live_transports(), 0);
    assert!(harness.media().ordering_violations().is_empty());

    let fresh = delegate
        .create_room(RoomId::from("guild-1"), RoomType::Stream)
        .await
        .unwrap();
    assert_eq!(fresh.room_type(), RoomType::Stream);
    assert!(members(&harness, "guild-1").await.is_empty());

    // Handles to the old room see a closed session.
    assert_eq!(alice.session.state().await, None);
    assert_eq!(
        alice
            .session
            .publish_track(MediaKind::Audio, audio_ssrcs(1))
            .await
            .unwrap(),
        TrackOutcome::Ignored(NoOpReason::SessionClosed)
    );

    harness.stop().await;
}

#[tokio::test]
async fn test_dispose_is_idempotent() {
    let harness = TestSignaling::start();
    let delegate = harness.delegate();

    assert!(!delegate.dispose_room(RoomId::from("missing")).await.unwrap());

    harness.join("guild-1", "alice", RoomType::GuildVoice).await;
    assert!(delegate.dispose_room(RoomId::from("guild-1")).await.unwrap());
    assert!(!delegate.dispose_room(RoomId::from("guild-1")).await.unwrap());

    assert!(delegate
        .list_sessions(RoomId::from("guild-1"))
        .await
        .unwrap()
        .is_empty());

    harness.stop().await;
}

#[tokio::test]
async fn test_status_lists_rooms_sorted() {
    let harness = TestSignaling::start();

    harness.join("room-b", "alice", RoomType::GuildVoice).await;
    harness.join("room-a", "bob", RoomType::Stream).await;
    harness.join("room-a", "carol", RoomType::Stream).await;

    let status = harness.delegate().status().await.unwrap();
    assert_eq!(status.room_count, 2);
    assert_eq!(status.session_count, 3);
    assert_eq!(status.rooms[0].room_id.as_str(), "room-a");
    assert_eq!(status.rooms[0].room_type, RoomType::Stream);
    assert_eq!(status.rooms[1].room_id.as_str(), "room-b");

    harness.stop().await;
}
