//! Media descriptions and the offer fragment parser.
//!
//! Browsers send only the attribute lines of their offer through the
//! signaling channel. [`FragmentParser`] turns such a fragment into a
//! [`SessionDescription`] using `sdp-types` for the line grammar; a fragment
//! that does not start with an `m=` line is read as the audio section.

use common::secret::SecretString;
use common::types::MediaKind;
use std::collections::BTreeMap;
use thiserror::Error;

/// Highest valid dynamic/static RTP payload type.
pub const MAX_PAYLOAD_TYPE: u8 = 127;

/// Offer parse failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid header extension id: {0}")]
    InvalidExtensionId(String),

    #[error("invalid payload type: {0}")]
    InvalidPayloadType(String),

    #[error("malformed {attribute} line: {line}")]
    MalformedLine {
        attribute: &'static str,
        line: String,
    },

    #[error("description has no media section")]
    NoMediaSection,

    #[error("invalid description syntax: {0}")]
    Syntax(String),
}

/// One codec entry of a media section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecInfo {
    pub name: String,
    pub payload_type: u8,
    pub rtx_payload_type: Option<u8>,
    pub clock_rate: Option<u32>,
    pub channels: Option<u8>,
    pub params: BTreeMap<String, String>,
}

impl CodecInfo {
    #[must_use]
    pub fn new(name: impl Into<String>, payload_type: u8) -> Self {
        Self {
            name: name.into(),
            payload_type,
            rtx_payload_type: None,
            clock_rate: None,
            channels: None,
            params: BTreeMap::new(),
        }
    }

    pub fn add_param(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn set_channels(&mut self, channels: u8) -> &mut Self {
        self.channels = Some(channels);
        self
    }

    pub fn set_rtx(&mut self, rtx_payload_type: u8) -> &mut Self {
        self.rtx_payload_type = Some(rtx_payload_type);
        self
    }

    /// Case-insensitive codec name comparison.
    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// One `m=` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDescription {
    pub id: String,
    pub kind: MediaKind,
    pub codecs: Vec<CodecInfo>,
    /// Header extension id to URI.
    pub extensions: BTreeMap<u8, String>,
    pub ssrcs: Vec<u32>,
}

impl MediaDescription {
    #[must_use]
    pub fn new(id: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            id: id.into(),
            kind,
            codecs: Vec::new(),
            extensions: BTreeMap::new(),
            ssrcs: Vec::new(),
        }
    }

    pub fn add_codec(&mut self, codec: CodecInfo) {
        self.codecs.push(codec);
    }

    pub fn add_extension(&mut self, id: u8, uri: impl Into<String>) {
        self.extensions.insert(id, uri.into());
    }

    /// Id the section declared for `uri` (exact match).
    #[must_use]
    pub fn extension_id(&self, uri: &str) -> Option<u8> {
        self.extensions
            .iter()
            .find_map(|(id, declared)| (declared == uri).then_some(*id))
    }
}

/// DTLS fingerprint (`a=fingerprint:<hash> <value>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub hash: String,
    pub value: String,
}

/// ICE credentials. The password never shows up in `Debug` output.
#[derive(Debug)]
pub struct IceCredentials {
    pub ufrag: String,
    pub pwd: SecretString,
}

/// One ICE candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceCandidate {
    pub foundation: String,
    pub component: u16,
    pub transport: String,
    pub priority: u32,
    pub address: String,
    pub port: u16,
    pub candidate_type: String,
}

/// Parsed session description.
#[derive(Debug, Default)]
pub struct SessionDescription {
    pub ice: Option<IceCredentials>,
    pub fingerprint: Option<Fingerprint>,
    pub setup: Option<String>,
    pub candidates: Vec<IceCandidate>,
    pub medias: Vec<MediaDescription>,
}

impl SessionDescription {
    /// First media section, which carries the offer's extension map.
    pub fn first_media(&self) -> Result<&MediaDescription, ParseError> {
        self.medias.first().ok_or(ParseError::NoMediaSection)
    }

    /// First section of the given kind.
    #[must_use]
    pub fn media(&self, kind: MediaKind) -> Option<&MediaDescription> {
        self.medias.iter().find(|m| m.kind == kind)
    }
}

/// Text-description parser collaborator.
pub trait DescriptionParser: Send + Sync {
    fn parse(&self, text: &str) -> Result<SessionDescription, ParseError>;
}

/// Session header placed in front of every fragment so it forms a complete
/// description.
const FRAGMENT_HEADER: &str = "v=0\r\no=- 0 0 IN IP4 0.0.0.0\r\ns=-\r\nt=0 0\r\n";

/// Media line for fragments that carry only attribute lines.
const IMPLICIT_AUDIO_SECTION: &str = "m=audio 9 UDP/TLS/RTP/SAVPF 0\r\n";

/// Parser for attribute-only offer fragments.
///
/// The fragment's `m=` and `a=` lines are wrapped in a session header and
/// tokenized with `sdp-types`; other lines are ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct FragmentParser;

impl DescriptionParser for FragmentParser {
    fn parse(&self, text: &str) -> Result<SessionDescription, ParseError> {
        let session = sdp_types::Session::parse(wrap_fragment(text).as_bytes())
            .map_err(|e| ParseError::Syntax(e.to_string()))?;

        let mut description = SessionDescription::default();
        for attribute in &session.attributes {
            apply_session_attribute(&mut description, attribute)?;
        }

        for section in &session.medias {
            // Session-scoped attributes are accepted in any section.
            let mut media_attributes = Vec::new();
            for attribute in &section.attributes {
                if !apply_session_attribute(&mut description, attribute)? {
                    media_attributes.push(attribute);
                }
            }

            let kind = match section.media.as_str() {
                "audio" => MediaKind::Audio,
                "video" => MediaKind::Video,
                _ => continue,
            };
            let mut media = MediaDescription::new(description.medias.len().to_string(), kind);
            for attribute in media_attributes {
                apply_media_attribute(&mut media, attribute)?;
            }
            description.medias.push(finish_section(media));
        }

        Ok(description)
    }
}

/// Keeps `m=`/`a=` lines and adds the session header, plus an audio media
/// line when the fragment does not open with one.
fn wrap_fragment(text: &str) -> String {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("a=") || line.starts_with("m="))
        .collect();

    let mut wrapped = String::from(FRAGMENT_HEADER);
    if !lines.first().is_some_and(|line| line.starts_with("m=")) {
        wrapped.push_str(IMPLICIT_AUDIO_SECTION);
    }
    for line in lines {
        wrapped.push_str(line);
        wrapped.push_str("\r\n");
    }
    wrapped
}

fn attribute_value<'a>(
    attribute: &'a sdp_types::Attribute,
    name: &'static str,
) -> Result<&'a str, ParseError> {
    attribute
        .value
        .as_deref()
        .map(str::trim)
        .ok_or_else(|| malformed_attribute(name, attribute))
}

fn malformed_attribute(name: &'static str, attribute: &sdp_types::Attribute) -> ParseError {
    ParseError::MalformedLine {
        attribute: name,
        line: match &attribute.value {
            Some(value) => format!("a={}:{value}", attribute.attribute),
            None => format!("a={}", attribute.attribute),
        },
    }
}

/// Applies ICE, DTLS and candidate attributes. Returns false for anything else.
fn apply_session_attribute(
    description: &mut SessionDescription,
    attribute: &sdp_types::Attribute,
) -> Result<bool, ParseError> {
    match attribute.attribute.as_str() {
        "ice-ufrag" => {
            let ufrag = attribute_value(attribute, "ice-ufrag")?.to_string();
            let pwd = description.ice.take().map(|ice| ice.pwd);
            description.ice = Some(IceCredentials {
                ufrag,
                pwd: pwd.unwrap_or_else(|| SecretString::from(String::new())),
            });
        }
        "ice-pwd" => {
            let pwd = SecretString::from(attribute_value(attribute, "ice-pwd")?.to_string());
            let ufrag = description
                .ice
                .take()
                .map(|ice| ice.ufrag)
                .unwrap_or_default();
            description.ice = Some(IceCredentials { ufrag, pwd });
        }
        "fingerprint" => {
            description.fingerprint = Some(parse_fingerprint(attribute)?);
        }
        "setup" => {
            description.setup = Some(attribute_value(attribute, "setup")?.to_string());
        }
        "candidate" => {
            description.candidates.push(parse_candidate(attribute)?);
        }
        _ => return Ok(false),
    }
    Ok(true)
}

fn apply_media_attribute(
    media: &mut MediaDescription,
    attribute: &sdp_types::Attribute,
) -> Result<(), ParseError> {
    match attribute.attribute.as_str() {
        "extmap" => {
            let (id, uri) = parse_extmap(attribute)?;
            media.add_extension(id, uri);
        }
        "rtpmap" => media.add_codec(parse_rtpmap(attribute)?),
        "fmtp" => apply_fmtp(media, attribute)?,
        "ssrc" => {
            let ssrc = attribute
                .value
                .as_deref()
                .and_then(|v| v.split_whitespace().next())
                .and_then(|s| s.parse::<u32>().ok())
                .ok_or_else(|| malformed_attribute("ssrc", attribute))?;
            if !media.ssrcs.contains(&ssrc) {
                media.ssrcs.push(ssrc);
            }
        }
        _ => {}
    }
    Ok(())
}

fn parse_payload_type(value: &str) -> Result<u8, ParseError> {
    value
        .trim()
        .parse::<u8>()
        .ok()
        .filter(|pt| *pt <= MAX_PAYLOAD_TYPE)
        .ok_or_else(|| ParseError::InvalidPayloadType(value.trim().to_string()))
}

/// `<id>[/<direction>] <uri> [<attributes>]`
fn parse_extmap(attribute: &sdp_types::Attribute) -> Result<(u8, String), ParseError> {
    let value = attribute_value(attribute, "extmap")?;
    let mut parts = value.split_whitespace();
    let id_part = parts
        .next()
        .ok_or_else(|| malformed_attribute("extmap", attribute))?;
    let uri = parts
        .next()
        .ok_or_else(|| malformed_attribute("extmap", attribute))?;

    let id_text = id_part.split('/').next().unwrap_or(id_part);
    let id = id_text
        .parse::<u8>()
        .ok()
        .filter(|id| *id != 0)
        .ok_or_else(|| ParseError::InvalidExtensionId(id_text.to_string()))?;

    Ok((id, uri.to_string()))
}

/// `<pt> <name>/<clock>[/<channels>]`
fn parse_rtpmap(attribute: &sdp_types::Attribute) -> Result<CodecInfo, ParseError> {
    let malformed = || malformed_attribute("rtpmap", attribute);
    let (pt, encoding) = attribute_value(attribute, "rtpmap")?
        .split_once(' ')
        .ok_or_else(malformed)?;
    let payload_type = parse_payload_type(pt)?;

    let mut fields = encoding.trim().split('/');
    let name = fields
        .next()
        .filter(|n| !n.is_empty())
        .ok_or_else(malformed)?;

    let mut codec = CodecInfo::new(name, payload_type);
    if let Some(clock) = fields.next() {
        codec.clock_rate = Some(clock.parse().map_err(|_| malformed())?);
    }
    if let Some(channels) = fields.next() {
        codec.channels = Some(channels.parse().map_err(|_| malformed())?);
    }
    Ok(codec)
}

/// `<pt> key=value;key=value`. Parameters for an unmapped payload type are dropped.
fn apply_fmtp(media: &mut MediaDescription, attribute: &sdp_types::Attribute) -> Result<(), ParseError> {
    let (pt, params) = attribute_value(attribute, "fmtp")?
        .split_once(' ')
        .ok_or_else(|| malformed_attribute("fmtp", attribute))?;
    let payload_type = parse_payload_type(pt)?;

    let Some(codec) = media
        .codecs
        .iter_mut()
        .find(|c| c.payload_type == payload_type)
    else {
        return Ok(());
    };

    for param in params.split(';') {
        let param = param.trim();
        if param.is_empty() {
            continue;
        }
        match param.split_once('=') {
            Some((key, value)) => codec.add_param(key.trim(), value.trim()),
            None => codec.add_param(param, ""),
        };
    }
    Ok(())
}

fn parse_fingerprint(attribute: &sdp_types::Attribute) -> Result<Fingerprint, ParseError> {
    let (hash, fingerprint) = attribute_value(attribute, "fingerprint")?
        .split_once(' ')
        .ok_or_else(|| malformed_attribute("fingerprint", attribute))?;
    Ok(Fingerprint {
        hash: hash.to_string(),
        value: fingerprint.trim().to_string(),
    })
}

/// `<foundation> <component> <transport> <priority> <address> <port> typ <type> ...`
fn parse_candidate(attribute: &sdp_types::Attribute) -> Result<IceCandidate, ParseError> {
    let malformed = || malformed_attribute("candidate", attribute);
    let fields: Vec<&str> = attribute_value(attribute, "candidate")?
        .split_whitespace()
        .collect();
    let [foundation, component, transport, priority, address, port, typ, candidate_type, ..] =
        fields.as_slice()
    else {
        return Err(malformed());
    };
    if *typ != "typ" {
        return Err(malformed());
    }

    Ok(IceCandidate {
        foundation: (*foundation).to_string(),
        component: component.parse().map_err(|_| malformed())?,
        transport: (*transport).to_string(),
        priority: priority.parse().map_err(|_| malformed())?,
        address: (*address).to_string(),
        port: port.parse().map_err(|_| malformed())?,
        candidate_type: (*candidate_type).to_string(),
    })
}

/// Folds `rtx` entries into the codec named by their `apt` parameter.
fn finish_section(mut media: MediaDescription) -> MediaDescription {
    let rtx: Vec<(u8, u8)> = media
        .codecs
        .iter()
        .filter(|c| c.is("rtx"))
        .filter_map(|c| {
            let apt = c.params.get("apt")?.parse::<u8>().ok()?;
            Some((apt, c.payload_type))
        })
        .collect();

    for (apt, rtx_pt) in rtx {
        if let Some(codec) = media.codecs.iter_mut().find(|c| c.payload_type == apt) {
            codec.set_rtx(rtx_pt);
            media.codecs.retain(|c| c.payload_type != rtx_pt);
        }
    }
    media
}
