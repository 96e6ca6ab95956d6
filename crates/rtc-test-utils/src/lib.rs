//! # RTC Test Utilities
//!
//! Shared test utilities for the signaling layer.
//!
//! This crate provides a recording mock of the media engine, a recording
//! client channel and fixtures, so the session and negotiation logic can be
//! tested without a real forwarding engine.
//!
//! ## Modules
//!
//! - `mock_media` - Mock media server/endpoint/transport/track handles
//! - `mock_channel` - Recording signaling channel
//! - `fixtures` - Offer fragments, codec lists, identifier sets
//! - `harness` - `TestSignaling` wrapper around a started delegate
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rtc_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let harness = TestSignaling::start();
//!     let alice = harness.connect("room-1", "alice", RoomType::GuildVoice).await;
//!     alice.session.publish_track(MediaKind::Audio, audio_ssrcs(1111)).await.unwrap();
//!
//!     assert_eq!(harness.media().live_tracks().len(), 1);
//! }
//! ```

pub mod fixtures;
pub mod harness;
pub mod mock_channel;
pub mod mock_media;

// Re-export commonly used items
pub use fixtures::*;
pub use harness::*;
pub use mock_channel::*;
pub use mock_media::*;
