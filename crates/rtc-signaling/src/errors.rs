//! Signaling layer error types.
//!
//! Error types map to signaling error codes for client responses.
//! Internal details are logged server-side but not exposed to clients.
//!
//! Duplicate publishes and subscriptions to missing tracks are not errors:
//! they come back as [`TrackOutcome::Ignored`](crate::actors::TrackOutcome)
//! so a single bad call never disrupts the caller's control flow.

use crate::media::sdp::ParseError;
use crate::media::TransportError;
use thiserror::Error;

/// Signaling layer error type.
///
/// Maps to signaling error codes:
/// - `AuthenticationPrecondition`: `UNAUTHORIZED` (2)
/// - `SessionClosed`: `NOT_FOUND` (4)
/// - Internal, Transport, Configuration: `INTERNAL_ERROR` (6)
/// - `Unsupported`: `UNSUPPORTED` (8)
/// - Parse, `MissingHeaderExtension`, `NegotiationSuperseded`: `BAD_REQUEST` (9)
#[derive(Debug, Error)]
pub enum SignalingError {
    /// An offer arrived for a session whose room cannot be resolved
    /// (the join never completed or the room was disposed).
    #[error("Offer received before join completed")]
    AuthenticationPrecondition,

    /// The session was closed (left, preempted or disposed).
    #[error("Session is closed")]
    SessionClosed,

    /// The offer could not be parsed.
    #[error("Offer parse error: {0}")]
    Parse(#[from] ParseError),

    /// The offer did not declare a header extension the answer requires.
    #[error("Offer is missing header extension: {0}")]
    MissingHeaderExtension(String),

    /// A newer offer from the same session replaced this one.
    #[error("Negotiation superseded by a newer offer")]
    NegotiationSuperseded,

    /// The media transport engine failed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Startup configuration is invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The operation is declared but not implemented.
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    /// Internal error (actor mailbox closed, response dropped).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SignalingError {
    /// Returns the signaling error code for this error.
    #[must_use]
    pub fn error_code(&self) -> i32 {
        match self {
            SignalingError::AuthenticationPrecondition => 2, // UNAUTHORIZED
            SignalingError::SessionClosed => 4,              // NOT_FOUND
            SignalingError::Transport(_)
            | SignalingError::Configuration(_)
            | SignalingError::Internal(_) => 6, // INTERNAL_ERROR
            SignalingError::Unsupported(_) => 8, // UNSUPPORTED
            SignalingError::Parse(_)
            | SignalingError::MissingHeaderExtension(_)
            | SignalingError::NegotiationSuperseded => 9, // BAD_REQUEST
        }
    }

    /// Returns a client-safe error message (no internal details).
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            SignalingError::AuthenticationPrecondition => {
                "Not authenticated, join before sending an offer".to_string()
            }
            SignalingError::SessionClosed => "Session is closed".to_string(),
            SignalingError::Parse(_) => "Malformed session description".to_string(),
            SignalingError::MissingHeaderExtension(uri) => {
                format!("Offer is missing required header extension {uri}")
            }
            SignalingError::NegotiationSuperseded => {
                "Offer superseded by a newer offer".to_string()
            }
            SignalingError::Transport(_)
            | SignalingError::Configuration(_)
            | SignalingError::Internal(_) => "An internal error occurred".to_string(),
            SignalingError::Unsupported(operation) => {
                format!("Operation not supported: {operation}")
            }
        }
    }

    /// Short, bounded label for metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            SignalingError::AuthenticationPrecondition => "authentication_precondition",
            SignalingError::SessionClosed => "session_closed",
            SignalingError::Parse(_) => "parse",
            SignalingError::MissingHeaderExtension(_) => "missing_header_extension",
            SignalingError::NegotiationSuperseded => "negotiation_superseded",
            SignalingError::Transport(_) => "transport",
            SignalingError::Configuration(_) => "configuration",
            SignalingError::Unsupported(_) => "unsupported",
            SignalingError::Internal(_) => "internal",
        }
    }
}
