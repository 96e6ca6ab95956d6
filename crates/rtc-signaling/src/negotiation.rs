//! Offer/answer negotiation.
//!
//! Negotiation is server-dictated: the answer always carries exactly one
//! Opus audio description and one H264 video description with fixed
//! parameters. The caller's codec capabilities only supply payload-type
//! numbers to echo back; no capability intersection is computed.
//!
//! Header extension ids are copied from the offer's own extension map by
//! exact URI. Two extensions (transport-wide congestion control on audio,
//! video orientation) are only added for Chromium, recognized by its Opus
//! payload type of 111.

use crate::actors::{ClientSessionHandle, RoomRegistryHandle};
use crate::errors::SignalingError;
use crate::media::sdp::{CodecInfo, DescriptionParser, MediaDescription};
use crate::media::{Endpoint, LocalProperties, LocalSecurityInfo, Transport, TransportError};
use crate::observability::metrics as prom;
use common::secret::ExposeSecret;
use common::types::MediaKind;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Opus payload type Chromium always advertises.
pub const CHROMIUM_OPUS_PAYLOAD_TYPE: u8 = 111;

pub const DEFAULT_OPUS_PAYLOAD_TYPE: u8 = 111;
pub const DEFAULT_H264_PAYLOAD_TYPE: u8 = 102;
pub const DEFAULT_H264_RTX_PAYLOAD_TYPE: u8 = 103;

pub const OPUS: &str = "opus";
pub const H264: &str = "H264";

/// Media section ids of the canonical answer.
pub const AUDIO_MEDIA_ID: &str = "0";
pub const VIDEO_MEDIA_ID: &str = "1";

/// RTP header extension URIs used in answers.
pub mod extensions {
    pub const AUDIO_LEVEL: &str = "urn:ietf:params:rtp-hdrext:ssrc-audio-level";
    pub const TRANSPORT_CC: &str =
        "http://www.ietf.org/id/draft-holmer-rmcat-transport-wide-cc-extensions-01";
    pub const ABS_SEND_TIME: &str = "http://www.webrtc.org/experiments/rtp-hdrext/abs-send-time";
    pub const TIME_OFFSET: &str = "urn:ietf:params:rtp-hdrext:toffset";
    pub const PLAYOUT_DELAY: &str = "http://www.webrtc.org/experiments/rtp-hdrext/playout-delay";
    pub const VIDEO_ORIENTATION: &str = "urn:3gpp:video-orientation";
}

/// Codec advertised by the caller alongside its offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecCapability {
    pub name: String,
    pub payload_type: u8,
    #[serde(default)]
    pub rtx_payload_type: Option<u8>,
}

impl CodecCapability {
    #[must_use]
    pub fn new(name: impl Into<String>, payload_type: u8, rtx_payload_type: Option<u8>) -> Self {
        Self {
            name: name.into(),
            payload_type,
            rtx_payload_type,
        }
    }
}

fn find_codec<'a>(codecs: &'a [CodecCapability], name: &str) -> Option<&'a CodecCapability> {
    codecs.iter().find(|c| c.name.eq_ignore_ascii_case(name))
}

/// Browser family, as far as negotiation cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserVariant {
    Chromium,
    Other,
}

impl BrowserVariant {
    #[must_use]
    pub fn detect(codecs: &[CodecCapability]) -> Self {
        match find_codec(codecs, OPUS) {
            Some(opus) if opus.payload_type == CHROMIUM_OPUS_PAYLOAD_TYPE => Self::Chromium,
            _ => Self::Other,
        }
    }

    /// Whether congestion control on audio and video orientation are added.
    #[must_use]
    pub const fn wants_quirk_extensions(&self) -> bool {
        matches!(self, Self::Chromium)
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Chromium => "chromium",
            Self::Other => "other",
        }
    }
}

/// Canonical media descriptions for one answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerPlan {
    pub variant: BrowserVariant,
    pub audio: MediaDescription,
    pub video: MediaDescription,
}

impl AnswerPlan {
    /// Build the plan from the offer's first media section (which carries
    /// its extension map) and the caller's codec list.
    ///
    /// # Errors
    ///
    /// `MissingHeaderExtension` if the offer never declared a URI the
    /// answer needs.
    pub fn build(
        offer: &MediaDescription,
        codecs: &[CodecCapability],
    ) -> Result<Self, SignalingError> {
        let variant = BrowserVariant::detect(codecs);
        let quirks = variant.wants_quirk_extensions();

        let mut audio = MediaDescription::new(AUDIO_MEDIA_ID, MediaKind::Audio);
        let mut opus = CodecInfo::new(
            OPUS,
            find_codec(codecs, OPUS).map_or(DEFAULT_OPUS_PAYLOAD_TYPE, |c| c.payload_type),
        );
        opus.add_param("minptime", "10")
            .add_param("usedtx", "1")
            .add_param("useinbandfec", "1")
            .set_channels(2);
        audio.add_codec(opus);

        copy_extension(offer, &mut audio, extensions::AUDIO_LEVEL)?;
        if quirks {
            copy_extension(offer, &mut audio, extensions::TRANSPORT_CC)?;
        }

        let mut video = MediaDescription::new(VIDEO_MEDIA_ID, MediaKind::Video);
        let advertised = find_codec(codecs, H264);
        let mut h264 = CodecInfo::new(
            H264,
            advertised.map_or(DEFAULT_H264_PAYLOAD_TYPE, |c| c.payload_type),
        );
        h264.set_rtx(
            advertised
                .and_then(|c| c.rtx_payload_type)
                .unwrap_or(DEFAULT_H264_RTX_PAYLOAD_TYPE),
        );
        h264.add_param("level-asymmetry-allowed", "1")
            .add_param("packetization-mode", "1")
            .add_param("profile-level-id", "42e01f")
            .add_param("x-google-max-bitrate", "2500");
        video.add_codec(h264);

        for uri in [
            extensions::ABS_SEND_TIME,
            extensions::TIME_OFFSET,
            extensions::PLAYOUT_DELAY,
            extensions::TRANSPORT_CC,
        ] {
            copy_extension(offer, &mut video, uri)?;
        }
        if quirks {
            copy_extension(offer, &mut video, extensions::VIDEO_ORIENTATION)?;
        }

        Ok(Self {
            variant,
            audio,
            video,
        })
    }

    /// Upper-cased name of the answered video codec.
    #[must_use]
    pub fn selected_video_codec(&self) -> String {
        self.video
            .codecs
            .first()
            .map(|c| c.name.to_uppercase())
            .unwrap_or_default()
    }
}

fn copy_extension(
    offer: &MediaDescription,
    target: &mut MediaDescription,
    uri: &str,
) -> Result<(), SignalingError> {
    let id = offer
        .extension_id(uri)
        .ok_or_else(|| SignalingError::MissingHeaderExtension(uri.to_string()))?;
    target.add_extension(id, uri);
    Ok(())
}

/// Render the answer text handed back to the client.
///
/// # Errors
///
/// `Transport` if the transport reported no local candidate.
pub fn compose_answer(
    port: u16,
    public_ip: IpAddr,
    security: &LocalSecurityInfo,
) -> Result<String, SignalingError> {
    let candidate = security
        .candidates
        .first()
        .ok_or_else(|| TransportError::new("transport has no local candidate"))?;

    let fingerprint = format!("{} {}", security.fingerprint.hash, security.fingerprint.value);
    let address_type = if public_ip.is_ipv4() { "IP4" } else { "IP6" };

    Ok(format!(
        "m=audio {port} ICE/SDP\n\
         a=fingerprint:{fingerprint}\n\
         c=IN {address_type} {public_ip}\n\
         a=rtcp:{port}\n\
         a=ice-ufrag:{ufrag}\n\
         a=ice-pwd:{pwd}\n\
         a=fingerprint:{fingerprint}\n\
         a=candidate:1 1 {transport} {foundation} {address} {candidate_port} typ host\n",
        ufrag = security.ice.ufrag,
        pwd = security.ice.pwd.expose_secret(),
        transport = candidate.transport,
        foundation = candidate.foundation,
        address = candidate.address,
        candidate_port = candidate.port,
    ))
}

/// Negotiated answer.
#[derive(Debug, Clone)]
pub struct Answer {
    pub sdp: String,
    pub selected_video_codec: String,
    pub audio: MediaDescription,
    pub video: MediaDescription,
}

/// Turns offers into answers and hands the resulting transport to the
/// owning room.
pub struct NegotiationEngine {
    registry: RoomRegistryHandle,
    parser: Arc<dyn DescriptionParser>,
    endpoint: Arc<dyn Endpoint>,
    public_ip: IpAddr,
}

impl NegotiationEngine {
    #[must_use]
    pub fn new(
        registry: RoomRegistryHandle,
        parser: Arc<dyn DescriptionParser>,
        endpoint: Arc<dyn Endpoint>,
        public_ip: IpAddr,
    ) -> Self {
        Self {
            registry,
            parser,
            endpoint,
            public_ip,
        }
    }

    /// Negotiate `offer` for `session`.
    ///
    /// The session is `Connected` once this returns `Ok`. An offer that
    /// fails to parse or plan leaves the session as it was; later failures
    /// leave it `Negotiating`. Either way a new offer may be sent.
    #[instrument(
        skip_all,
        name = "rtc.negotiation",
        fields(room_id = %session.room_id(), user_id = %session.user_id())
    )]
    pub async fn negotiate(
        &self,
        session: &ClientSessionHandle,
        offer: &str,
        codecs: &[CodecCapability],
    ) -> Result<Answer, SignalingError> {
        let start = Instant::now();
        let result = self.run(session, offer, codecs).await;

        match &result {
            Ok(answer) => {
                prom::record_negotiation("success", start.elapsed());
                info!(
                    target: "rtc.negotiation",
                    room_id = %session.room_id(),
                    user_id = %session.user_id(),
                    video_codec = %answer.selected_video_codec,
                    "Negotiation complete"
                );
            }
            Err(e) => {
                prom::record_negotiation("error", start.elapsed());
                warn!(
                    target: "rtc.negotiation",
                    room_id = %session.room_id(),
                    user_id = %session.user_id(),
                    error_kind = e.kind(),
                    error = %e,
                    "Negotiation failed"
                );
            }
        }

        result
    }

    async fn run(
        &self,
        session: &ClientSessionHandle,
        offer: &str,
        codecs: &[CodecCapability],
    ) -> Result<Answer, SignalingError> {
        let room = match self.registry.get_room(session.room_id().clone()).await? {
            Some(room) if room.same_room(session.room()) => room,
            Some(_) => return Err(SignalingError::SessionClosed),
            None => return Err(SignalingError::AuthenticationPrecondition),
        };
        let session_ref = session.session_ref();

        // A rejected offer must not disturb a connected session.
        let mut description = self.parser.parse(offer)?;
        let plan = AnswerPlan::build(description.first_media()?, codecs)?;
        let ticket = room.begin_negotiation(session_ref).await?;
        debug!(
            target: "rtc.negotiation",
            variant = plan.variant.as_str(),
            audio_pt = plan.audio.codecs.first().map(|c| c.payload_type),
            video_pt = plan.video.codecs.first().map(|c| c.payload_type),
            "Answer plan built"
        );
        description.medias = vec![plan.audio.clone(), plan.video.clone()];

        let mut transport = self.endpoint.create_transport(&description)?;
        let configured = configure_transport(transport.as_mut(), &description, &plan)
            .and_then(|(security, port)| compose_answer(port, self.public_ip, &security));
        let sdp = match configured {
            Ok(sdp) => sdp,
            Err(e) => {
                transport.stop();
                return Err(e);
            }
        };

        room.client_offer(session_ref, ticket, transport).await?;
        room.complete_negotiation(session_ref, ticket).await?;

        Ok(Answer {
            sdp,
            selected_video_codec: plan.selected_video_codec(),
            audio: plan.audio,
            video: plan.video,
        })
    }
}

/// Apply remote then local properties. Returns the local security info and port.
fn configure_transport(
    transport: &mut dyn Transport,
    description: &crate::media::sdp::SessionDescription,
    plan: &AnswerPlan,
) -> Result<(LocalSecurityInfo, u16), SignalingError> {
    transport.set_remote_properties(description)?;
    let security = transport.local_security_info()?;
    transport.set_local_properties(LocalProperties {
        security: &security,
        audio: &plan.audio,
        video: &plan.video,
    })?;
    Ok((security, transport.local_port()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::media::sdp::{Fingerprint, IceCandidate, IceCredentials};
    use common::secret::SecretString;

    fn offer_with_all_extensions() -> MediaDescription {
        let mut media = MediaDescription::new("0", MediaKind::Audio);
        media.add_extension(1, extensions::AUDIO_LEVEL);
        media.add_extension(2, extensions::ABS_SEND_TIME);
        media.add_extension(3, extensions::TRANSPORT_CC);
        media.add_extension(4, extensions::TIME_OFFSET);
        media.add_extension(5, extensions::PLAYOUT_DELAY);
        media.add_extension(13, extensions::VIDEO_ORIENTATION);
        media
    }

    fn chromium_codecs() -> Vec<CodecCapability> {
        vec![
            CodecCapability::new("opus", 111, None),
            CodecCapability::new("H264", 120, Some(121)),
        ]
    }

    fn security_info(candidates: Vec<IceCandidate>) -> LocalSecurityInfo {
        LocalSecurityInfo {
            fingerprint: Fingerprint {
                hash: "sha-256".to_string(),
                value: "AA:BB:CC".to_string(),
            },
            ice: IceCredentials {
                ufrag: "uFrg".to_string(),
                pwd: SecretString::from("s3cr3t-pwd".to_string()),
            },
            candidates,
        }
    }

    fn host_candidate() -> IceCandidate {
        IceCandidate {
            foundation: "1".to_string(),
            component: 1,
            transport: "UDP".to_string(),
            priority: 2_130_706_431,
            address: "203.0.113.5".to_string(),
            port: 50012,
            candidate_type: "host".to_string(),
        }
    }

    #[test]
    fn test_browser_variant_detection() {
        assert_eq!(
            BrowserVariant::detect(&chromium_codecs()),
            BrowserVariant::Chromium
        );
        assert_eq!(
            BrowserVariant::detect(&[CodecCapability::new("opus", 109, None)]),
            BrowserVariant::Other
        );
        assert_eq!(BrowserVariant::detect(&[]), BrowserVariant::Other);
    }

    #[test]
    fn test_chromium_plan_includes_quirk_extensions() {
        let plan = AnswerPlan::build(&offer_with_all_extensions(), &chromium_codecs()).unwrap();

        assert_eq!(plan.audio.extension_id(extensions::AUDIO_LEVEL), Some(1));
        assert_eq!(plan.audio.extension_id(extensions::TRANSPORT_CC), Some(3));
        assert_eq!(plan.video.extensions.len(), 5);
        assert_eq!(plan.video.extension_id(extensions::VIDEO_ORIENTATION), Some(13));
    }

    #[test]
    fn test_other_browser_plan_omits_quirk_extensions() {
        let codecs = vec![CodecCapability::new("opus", 109, None)];
        let plan = AnswerPlan::build(&offer_with_all_extensions(), &codecs).unwrap();

        assert_eq!(plan.audio.extensions.len(), 1);
        assert_eq!(plan.audio.extension_id(extensions::TRANSPORT_CC), None);
        assert_eq!(plan.video.extensions.len(), 4);
        assert_eq!(plan.video.extension_id(extensions::VIDEO_ORIENTATION), None);
        // Congestion control stays on video regardless of browser.
        assert_eq!(plan.video.extension_id(extensions::TRANSPORT_CC), Some(3));
    }

    #[test]
    fn test_payload_types_echoed() {
        let plan = AnswerPlan::build(&offer_with_all_extensions(), &chromium_codecs()).unwrap();

        let opus = &plan.audio.codecs[0];
        assert_eq!(opus.payload_type, 111);
        assert_eq!(opus.channels, Some(2));
        assert_eq!(opus.params.get("usedtx").map(String::as_str), Some("1"));

        let h264 = &plan.video.codecs[0];
        assert_eq!(h264.payload_type, 120);
        assert_eq!(h264.rtx_payload_type, Some(121));
        assert_eq!(
            h264.params.get("profile-level-id").map(String::as_str),
            Some("42e01f")
        );
        assert_eq!(plan.selected_video_codec(), "H264");
    }

    #[test]
    fn test_defaults_without_capabilities() {
        let mut offer = offer_with_all_extensions();
        offer.extensions.remove(&13);
        let plan = AnswerPlan::build(&offer, &[]).unwrap();

        assert_eq!(plan.audio.codecs[0].payload_type, DEFAULT_OPUS_PAYLOAD_TYPE);
        assert_eq!(plan.video.codecs[0].payload_type, DEFAULT_H264_PAYLOAD_TYPE);
        assert_eq!(
            plan.video.codecs[0].rtx_payload_type,
            Some(DEFAULT_H264_RTX_PAYLOAD_TYPE)
        );
    }

    #[test]
    fn test_codec_name_match_is_case_insensitive() {
        let codecs = vec![
            CodecCapability::new("OPUS", 111, None),
            CodecCapability::new("h264", 98, None),
        ];
        let plan = AnswerPlan::build(&offer_with_all_extensions(), &codecs).unwrap();

        assert_eq!(plan.variant, BrowserVariant::Chromium);
        assert_eq!(plan.video.codecs[0].payload_type, 98);
        // No advertised rtx falls back to the default.
        assert_eq!(
            plan.video.codecs[0].rtx_payload_type,
            Some(DEFAULT_H264_RTX_PAYLOAD_TYPE)
        );
    }

    #[test]
    fn test_missing_extension_fails_explicitly() {
        let mut offer = offer_with_all_extensions();
        offer.extensions.remove(&5);

        let err = AnswerPlan::build(&offer, &chromium_codecs()).unwrap_err();
        assert!(
            matches!(err, SignalingError::MissingHeaderExtension(ref uri) if uri == extensions::PLAYOUT_DELAY)
        );
        assert_eq!(err.error_code(), 9);
    }

    #[test]
    fn test_compose_answer_format() {
        let ip: IpAddr = "198.51.100.1".parse().unwrap();
        let answer = compose_answer(50012, ip, &security_info(vec![host_candidate()])).unwrap();

        assert_eq!(
            answer,
            "m=audio 50012 ICE/SDP\n\
             a=fingerprint:sha-256 AA:BB:CC\n\
             c=IN IP4 198.51.100.1\n\
             a=rtcp:50012\n\
             a=ice-ufrag:uFrg\n\
             a=ice-pwd:s3cr3t-pwd\n\
             a=fingerprint:sha-256 AA:BB:CC\n\
             a=candidate:1 1 UDP 1 203.0.113.5 50012 typ host\n"
        );
    }

    #[test]
    fn test_compose_answer_without_candidate() {
        let ip: IpAddr = "198.51.100.1".parse().unwrap();
        let err = compose_answer(50012, ip, &security_info(vec![])).unwrap_err();
        assert!(matches!(err, SignalingError::Transport(_)));
    }

    #[test]
    fn test_capability_wire_format() {
        let codecs: Vec<CodecCapability> = serde_json::from_str(
            r#"[{"name":"opus","type":"audio","priority":1000,"payload_type":111,"rtx_payload_type":null},
                {"name":"H264","type":"video","priority":1000,"payload_type":102,"rtx_payload_type":103}]"#,
        )
        .unwrap();
        assert_eq!(codecs[0], CodecCapability::new("opus", 111, None));
        assert_eq!(codecs[1].rtx_payload_type, Some(103));
    }
}
