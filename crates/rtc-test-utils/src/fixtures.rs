//! Offer fragments, codec lists and identifier sets for signaling tests.
//!
//! Fragments mirror what browsers send through the signaling channel: the
//! attribute lines of the offer without the session-level header.

use rtc_signaling::negotiation::{extensions, CodecCapability};
use rtc_signaling::tracks::Ssrcs;

/// Chromium-style offer: Opus at 111, every extension declared.
pub const CHROME_OFFER: &str = "\
a=ice-ufrag:Zq3c
a=ice-pwd:8fQvQ1pL0mRZ2wXk5sB7nT9y
a=fingerprint:sha-256 3A:96:6D:57:B2:C2:C7:61:A0:46:3E:1C:97:39:D3:F7:0A:88:A0:B1:EC:03:FB:10:A5:5D:3A:37:AB:DD:02:AA
a=setup:actpass
a=extmap:1 urn:ietf:params:rtp-hdrext:ssrc-audio-level
a=extmap:2 http://www.webrtc.org/experiments/rtp-hdrext/abs-send-time
a=extmap:3 http://www.ietf.org/id/draft-holmer-rmcat-transport-wide-cc-extensions-01
a=extmap:4 urn:ietf:params:rtp-hdrext:toffset
a=extmap:5 http://www.webrtc.org/experiments/rtp-hdrext/playout-delay
a=extmap:13 urn:3gpp:video-orientation
a=rtpmap:111 opus/48000/2
a=fmtp:111 minptime=10;useinbandfec=1
a=rtpmap:102 H264/90000
a=fmtp:102 level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42e01f
a=rtpmap:103 rtx/90000
a=fmtp:103 apt=102
";

/// Firefox-style offer: Opus at 109, different extension ids, no
/// orientation extension.
pub const FIREFOX_OFFER: &str = "\
a=ice-ufrag:9c1e7a2f
a=ice-pwd:0b7f3c2e9d4a51f6c8e2b7a90d13f5e4
a=fingerprint:sha-256 D1:2C:49:7A:0E:B3:55:9F:61:C8:27:E0:3D:94:AB:16:F2:78:5C:0D:A9:33:E6:41:BC:87:1F:60:D5:2A:9E:04
a=setup:actpass
a=extmap:1/recvonly urn:ietf:params:rtp-hdrext:csrc-audio-level
a=extmap:2 urn:ietf:params:rtp-hdrext:ssrc-audio-level
a=extmap:3 urn:ietf:params:rtp-hdrext:sdes:mid
a=extmap:4 http://www.webrtc.org/experiments/rtp-hdrext/abs-send-time
a=extmap:5 urn:ietf:params:rtp-hdrext:toffset
a=extmap:6/recvonly http://www.webrtc.org/experiments/rtp-hdrext/playout-delay
a=extmap:7 http://www.ietf.org/id/draft-holmer-rmcat-transport-wide-cc-extensions-01
a=rtpmap:109 opus/48000/2
a=fmtp:109 maxplaybackrate=48000;stereo=1;useinbandfec=1
";

/// Chromium offer missing the playout-delay extension.
pub const OFFER_WITHOUT_PLAYOUT_DELAY: &str = "\
a=ice-ufrag:Zq3c
a=ice-pwd:8fQvQ1pL0mRZ2wXk5sB7nT9y
a=extmap:1 urn:ietf:params:rtp-hdrext:ssrc-audio-level
a=extmap:2 http://www.webrtc.org/experiments/rtp-hdrext/abs-send-time
a=extmap:3 http://www.ietf.org/id/draft-holmer-rmcat-transport-wide-cc-extensions-01
a=extmap:4 urn:ietf:params:rtp-hdrext:toffset
a=extmap:13 urn:3gpp:video-orientation
";

/// Offer whose extension id does not fit in a byte.
pub const MALFORMED_OFFER: &str = "\
a=extmap:300 urn:ietf:params:rtp-hdrext:ssrc-audio-level
";

/// Extension ids declared by [`CHROME_OFFER`].
pub const CHROME_EXTENSION_IDS: [(&str, u8); 6] = [
    (extensions::AUDIO_LEVEL, 1),
    (extensions::ABS_SEND_TIME, 2),
    (extensions::TRANSPORT_CC, 3),
    (extensions::TIME_OFFSET, 4),
    (extensions::PLAYOUT_DELAY, 5),
    (extensions::VIDEO_ORIENTATION, 13),
];

/// Codec list a Chromium client advertises.
#[must_use]
pub fn chrome_codecs() -> Vec<CodecCapability> {
    vec![
        CodecCapability::new("opus", 111, None),
        CodecCapability::new("H264", 102, Some(103)),
        CodecCapability::new("VP8", 96, Some(97)),
    ]
}

/// Codec list a Firefox client advertises.
#[must_use]
pub fn firefox_codecs() -> Vec<CodecCapability> {
    vec![
        CodecCapability::new("opus", 109, None),
        CodecCapability::new("H264", 126, Some(127)),
    ]
}

/// Chromium codecs with H264 at 120/121.
#[must_use]
pub fn custom_h264_codecs() -> Vec<CodecCapability> {
    vec![
        CodecCapability::new("opus", 111, None),
        CodecCapability::new("H264", 120, Some(121)),
    ]
}

#[must_use]
pub fn audio_ssrcs(media: u32) -> Ssrcs {
    Ssrcs {
        audio_ssrc: Some(media),
        ..Ssrcs::default()
    }
}

#[must_use]
pub fn video_ssrcs(media: u32, rtx: Option<u32>) -> Ssrcs {
    Ssrcs {
        video_ssrc: Some(media),
        rtx_ssrc: rtx,
        ..Ssrcs::default()
    }
}

/// Audio and video identifiers derived from `seed`, unique per seed.
#[must_use]
pub fn full_ssrcs(seed: u32) -> Ssrcs {
    Ssrcs {
        audio_ssrc: Some(seed * 10 + 1),
        video_ssrc: Some(seed * 10 + 2),
        rtx_ssrc: Some(seed * 10 + 3),
    }
}
