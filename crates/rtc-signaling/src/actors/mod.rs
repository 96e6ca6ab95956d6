//! Actor hierarchy for room and session state.
//!
//! ```text
//! RoomRegistryActor (one per delegate)
//! └── RoomActor (one per room)
//!     └── ClientSession (owned state, one per user in the room)
//! ```
//!
//! Each actor owns its state and processes its mailbox sequentially, which
//! is what serializes concurrent calls touching the same room. Handles are
//! cheap to clone and talk to the actors via `mpsc` + `oneshot`.
//!
//! Cancellation flows parent to child: cancelling the registry token
//! cancels every room token, and each room closes its sessions with
//! [`CloseReason::Shutdown`](crate::channel::CloseReason) on the way out.

pub mod messages;
pub mod metrics;
pub mod registry;
pub mod room;
pub mod session;

pub use messages::{
    ConnectionState, NegotiationTicket, NoOpReason, RegistryStatus, RoomSummary, SessionId,
    SessionInfo, TrackOutcome,
};
pub use metrics::{ActorMetrics, ActorType, MailboxLevel, MailboxMonitor};
pub use registry::RoomRegistryHandle;
pub use room::RoomHandle;
pub use session::ClientSessionHandle;
