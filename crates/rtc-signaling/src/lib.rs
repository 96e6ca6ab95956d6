//! RTC Signaling Library
//!
//! Session and negotiation layer for a WebRTC voice/video selective
//! forwarding unit:
//!
//! - Room membership with per-category exclusivity (a user sits in at most
//!   one guild-voice or dm-voice room; stream rooms are exempt)
//! - Client session state machine (joined, negotiating, connected, closed)
//! - Track publish/subscribe bookkeeping between sessions of a room
//! - Server-dictated offer/answer negotiation
//!
//! Packet forwarding, ICE/DTLS/SRTP and congestion control live in an
//! external media engine reached through the traits in [`media`]. The
//! outer signaling transport reaches this crate through
//! [`SignalingDelegate`] and receives notifications through
//! [`channel::SignalingChannel`].
//!
//! # Architecture
//!
//! ```text
//! SignalingDelegate
//! ├── NegotiationEngine (offer -> answer, transport allocation)
//! └── RoomRegistryActor (one per delegate)
//!     └── RoomActor (one per room)
//!         └── ClientSession (one per member)
//! ```
//!
//! # Modules
//!
//! - [`actors`] - Registry, room and session actors
//! - [`channel`] - Client notification channel
//! - [`config`] - Configuration from environment
//! - [`delegate`] - Upward API with explicit start/stop
//! - [`errors`] - Error types with signaling error codes
//! - [`media`] - Media engine traits and offer parsing
//! - [`negotiation`] - Answer planning and composition
//! - [`observability`] - Tracing and Prometheus metrics
//! - [`tracks`] - Identifier sets and track bindings

pub mod actors;
pub mod channel;
pub mod config;
pub mod delegate;
pub mod errors;
pub mod media;
pub mod negotiation;
pub mod observability;
pub mod tracks;

pub use delegate::SignalingDelegate;
pub use errors::SignalingError;
