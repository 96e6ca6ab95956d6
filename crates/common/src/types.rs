//! Common data types for the RTC signaling components.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a voice/video room (opaque string supplied by the caller).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Create a room ID from any string-like value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RoomId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifier of a user (opaque string supplied by the caller).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Create a user ID from any string-like value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Kind of room, which decides the membership exclusivity rules.
///
/// A user holds at most one session across all `GuildVoice` and `DmVoice`
/// rooms combined. `Stream` rooms are exempt: a user may watch any number
/// of streams while also sitting in a voice room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoomType {
    /// Voice channel inside a guild.
    GuildVoice,
    /// Direct-message call.
    DmVoice,
    /// Go-live stream room.
    Stream,
}

impl RoomType {
    /// Returns the room type as used on the wire and in metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            RoomType::GuildVoice => "guild-voice",
            RoomType::DmVoice => "dm-voice",
            RoomType::Stream => "stream",
        }
    }

    /// Whether membership in this room type is exclusive per user.
    #[must_use]
    pub const fn is_exclusive(&self) -> bool {
        matches!(self, RoomType::GuildVoice | RoomType::DmVoice)
    }
}

impl fmt::Display for RoomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Media kind of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Opus audio.
    Audio,
    /// H264 video (with optional retransmission stream).
    Video,
}

impl MediaKind {
    /// All media kinds, in teardown order.
    pub const ALL: [MediaKind; 2] = [MediaKind::Audio, MediaKind::Video];

    /// Returns the kind as used in track IDs and metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_room_type_exclusivity() {
        assert!(RoomType::GuildVoice.is_exclusive());
        assert!(RoomType::DmVoice.is_exclusive());
        assert!(!RoomType::Stream.is_exclusive());
    }

    #[test]
    fn test_room_type_wire_format() {
        let parsed: RoomType = serde_json::from_str("\"guild-voice\"").unwrap();
        assert_eq!(parsed, RoomType::GuildVoice);
        assert_eq!(serde_json::to_string(&RoomType::DmVoice).unwrap(), "\"dm-voice\"");
        assert_eq!(RoomType::Stream.to_string(), "stream");
    }

    #[test]
    fn test_media_kind_wire_format() {
        let parsed: MediaKind = serde_json::from_str("\"video\"").unwrap();
        assert_eq!(parsed, MediaKind::Video);
        assert_eq!(MediaKind::Audio.as_str(), "audio");
    }

    #[test]
    fn test_ids_are_transparent() {
        let user: UserId = serde_json::from_str("\"1234\"").unwrap();
        assert_eq!(user, UserId::from("1234"));
        assert_eq!(serde_json::to_string(&RoomId::new("r-1")).unwrap(), "\"r-1\"");
        assert_eq!(user.to_string(), "1234");
    }
}
