//! Track bindings and identifier sets.
//!
//! A [`TrackBinding`] records one media kind's publish or subscribe
//! relationship for one user pair, together with the engine handle that
//! carries it. Bindings are owned by exactly one session and are never
//! shared.

use crate::media::TrackHandle;
use common::types::{MediaKind, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Track id used by the engine for `user`'s track of `kind`.
#[must_use]
pub fn track_id_for(kind: MediaKind, user: &UserId) -> String {
    format!("{}-{}", kind.as_str(), user.as_str())
}

/// Wire form of an identifier set. Zero and absent are equivalent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ssrcs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_ssrc: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_ssrc: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtx_ssrc: Option<u32>,
}

impl Ssrcs {
    /// All-zero set reported by sessions that are not connected.
    pub const ZERO: Ssrcs = Ssrcs {
        audio_ssrc: Some(0),
        video_ssrc: Some(0),
        rtx_ssrc: Some(0),
    };

    /// Validate the fields `kind` needs into a typed identifier set.
    pub fn identifiers_for(&self, kind: MediaKind) -> Result<TrackIdentifiers, IdentifierError> {
        match kind {
            MediaKind::Audio => {
                let media = non_zero(self.audio_ssrc).ok_or(IdentifierError::MissingMedia(kind))?;
                Ok(TrackIdentifiers::Audio { media })
            }
            MediaKind::Video => {
                let media = non_zero(self.video_ssrc).ok_or(IdentifierError::MissingMedia(kind))?;
                let rtx = non_zero(self.rtx_ssrc);
                if rtx == Some(media) {
                    return Err(IdentifierError::RtxEqualsMedia(media));
                }
                Ok(TrackIdentifiers::Video { media, rtx })
            }
        }
    }

    /// Overwrite the fields belonging to `identifiers`' kind.
    pub fn record(&mut self, identifiers: &TrackIdentifiers) {
        match *identifiers {
            TrackIdentifiers::Audio { media } => self.audio_ssrc = Some(media),
            TrackIdentifiers::Video { media, rtx } => {
                self.video_ssrc = Some(media);
                self.rtx_ssrc = rtx;
            }
        }
    }
}

fn non_zero(value: Option<u32>) -> Option<u32> {
    value.filter(|v| *v != 0)
}

/// Rejected identifier sets.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("{0} track requires a media identifier")]
    MissingMedia(MediaKind),

    #[error("retransmission identifier {0} equals the media identifier")]
    RtxEqualsMedia(u32),
}

/// Validated per-kind identifier set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackIdentifiers {
    Audio { media: u32 },
    Video { media: u32, rtx: Option<u32> },
}

impl TrackIdentifiers {
    #[must_use]
    pub const fn kind(&self) -> MediaKind {
        match self {
            TrackIdentifiers::Audio { .. } => MediaKind::Audio,
            TrackIdentifiers::Video { .. } => MediaKind::Video,
        }
    }

    #[must_use]
    pub const fn media(&self) -> u32 {
        match *self {
            TrackIdentifiers::Audio { media } | TrackIdentifiers::Video { media, .. } => media,
        }
    }

    #[must_use]
    pub const fn rtx(&self) -> Option<u32> {
        match *self {
            TrackIdentifiers::Audio { .. } => None,
            TrackIdentifiers::Video { rtx, .. } => rtx,
        }
    }

    /// Every identifier in the set.
    pub fn iter(&self) -> impl Iterator<Item = u32> {
        std::iter::once(self.media()).chain(self.rtx())
    }

    /// Whether the two sets share any identifier.
    #[must_use]
    pub fn overlaps(&self, other: &TrackIdentifiers) -> bool {
        self.iter().any(|a| other.iter().any(|b| a == b))
    }

    /// Wire form holding only this set's fields.
    #[must_use]
    pub fn to_ssrcs(&self) -> Ssrcs {
        let mut ssrcs = Ssrcs::default();
        ssrcs.record(self);
        ssrcs
    }
}

/// Direction of a track relative to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackDirection {
    /// Media published by the session's own user.
    Incoming,
    /// Media forwarded to the session from another user.
    Outgoing,
}

impl TrackDirection {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            TrackDirection::Incoming => "incoming",
            TrackDirection::Outgoing => "outgoing",
        }
    }
}

/// One live track owned by a session.
pub struct TrackBinding {
    pub track_id: String,
    pub kind: MediaKind,
    pub direction: TrackDirection,
    /// Publishing user (the session's own user for incoming tracks).
    pub source: UserId,
    pub identifiers: TrackIdentifiers,
    handle: Box<dyn TrackHandle>,
}

impl TrackBinding {
    #[must_use]
    pub fn new(
        direction: TrackDirection,
        source: UserId,
        identifiers: TrackIdentifiers,
        handle: Box<dyn TrackHandle>,
    ) -> Self {
        let kind = identifiers.kind();
        Self {
            track_id: track_id_for(kind, &source),
            kind,
            direction,
            source,
            identifiers,
            handle,
        }
    }

    #[must_use]
    pub fn handle(&self) -> &dyn TrackHandle {
        self.handle.as_ref()
    }

    /// Stop the engine track, consuming the binding.
    pub fn stop(mut self) {
        self.handle.stop();
    }
}

impl fmt::Debug for TrackBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackBinding")
            .field("track_id", &self.track_id)
            .field("direction", &self.direction.as_str())
            .field("identifiers", &self.identifiers)
            .finish_non_exhaustive()
    }
}
