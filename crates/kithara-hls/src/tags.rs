//! Typed M3U8 tags and their attributes.
//!
//! A [`Tag`] is built from one `#EXT...` line (or a bare URI line) and is never
//! reinterpreted afterwards: its payload shape is fixed by its [`TagKind`].
//!
//! Standard tag payloads are decoded with `hls_m3u8`; only the LL-HLS part
//! tags and the presence-sensitive `EXT-X-MEDIA` flags are read from the raw
//! attribute list. Malformed payloads decode to `None`.

use std::{fmt, time::Duration};

use hls_m3u8::{
    tags::{ExtInf as HlsExtInf, ExtXMap as HlsExtXMap, ExtXStart as HlsExtXStart, VariantStream},
    types::{ByteRange as HlsByteRange, DecryptionKey as HlsDecryptionKey, Resolution},
};
use tracing::trace;

/// Recognised tag names. Anything else is dropped by the tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    /// Synthetic tag for a non-comment, non-tag line.
    Uri,
    ExtInf,
    ExtXVersion,
    ExtXTargetDuration,
    ExtXMediaSequence,
    ExtXPlaylistType,
    ExtXByteRange,
    ExtXProgramDateTime,
    ExtXKey,
    ExtXSessionKey,
    ExtXMap,
    ExtXDiscontinuity,
    ExtXEndList,
    ExtXStreamInf,
    ExtXMedia,
    ExtXStart,
    ExtXPartInf,
    ExtXPart,
}

/// How a tag's text after the `:` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagShape {
    /// One scalar value (`#EXT-X-TARGETDURATION:10`).
    Single,
    /// `NAME=value` pairs separated by commas.
    Attributes,
    /// Positional values (`#EXTINF:9.5,title`).
    ValuesList,
    /// No payload (`#EXT-X-ENDLIST`).
    Marker,
}

impl TagKind {
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "EXTINF" => Self::ExtInf,
            "EXT-X-VERSION" => Self::ExtXVersion,
            "EXT-X-TARGETDURATION" => Self::ExtXTargetDuration,
            "EXT-X-MEDIA-SEQUENCE" => Self::ExtXMediaSequence,
            "EXT-X-PLAYLIST-TYPE" => Self::ExtXPlaylistType,
            "EXT-X-BYTERANGE" => Self::ExtXByteRange,
            "EXT-X-PROGRAM-DATE-TIME" => Self::ExtXProgramDateTime,
            "EXT-X-KEY" => Self::ExtXKey,
            "EXT-X-SESSION-KEY" => Self::ExtXSessionKey,
            "EXT-X-MAP" => Self::ExtXMap,
            "EXT-X-DISCONTINUITY" => Self::ExtXDiscontinuity,
            "EXT-X-ENDLIST" => Self::ExtXEndList,
            "EXT-X-STREAM-INF" => Self::ExtXStreamInf,
            "EXT-X-MEDIA" => Self::ExtXMedia,
            "EXT-X-START" => Self::ExtXStart,
            "EXT-X-PART-INF" => Self::ExtXPartInf,
            "EXT-X-PART" => Self::ExtXPart,
            _ => return None,
        };
        Some(kind)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Uri => "URI",
            Self::ExtInf => "EXTINF",
            Self::ExtXVersion => "EXT-X-VERSION",
            Self::ExtXTargetDuration => "EXT-X-TARGETDURATION",
            Self::ExtXMediaSequence => "EXT-X-MEDIA-SEQUENCE",
            Self::ExtXPlaylistType => "EXT-X-PLAYLIST-TYPE",
            Self::ExtXByteRange => "EXT-X-BYTERANGE",
            Self::ExtXProgramDateTime => "EXT-X-PROGRAM-DATE-TIME",
            Self::ExtXKey => "EXT-X-KEY",
            Self::ExtXSessionKey => "EXT-X-SESSION-KEY",
            Self::ExtXMap => "EXT-X-MAP",
            Self::ExtXDiscontinuity => "EXT-X-DISCONTINUITY",
            Self::ExtXEndList => "EXT-X-ENDLIST",
            Self::ExtXStreamInf => "EXT-X-STREAM-INF",
            Self::ExtXMedia => "EXT-X-MEDIA",
            Self::ExtXStart => "EXT-X-START",
            Self::ExtXPartInf => "EXT-X-PART-INF",
            Self::ExtXPart => "EXT-X-PART",
        }
    }

    pub fn shape(self) -> TagShape {
        match self {
            Self::Uri
            | Self::ExtXVersion
            | Self::ExtXTargetDuration
            | Self::ExtXMediaSequence
            | Self::ExtXPlaylistType
            | Self::ExtXByteRange
            | Self::ExtXProgramDateTime => TagShape::Single,
            Self::ExtXKey
            | Self::ExtXSessionKey
            | Self::ExtXMap
            | Self::ExtXStreamInf
            | Self::ExtXMedia
            | Self::ExtXStart
            | Self::ExtXPartInf
            | Self::ExtXPart => TagShape::Attributes,
            Self::ExtInf => TagShape::ValuesList,
            Self::ExtXDiscontinuity | Self::ExtXEndList => TagShape::Marker,
        }
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named raw value with lenient typed accessors.
///
/// Accessors never fail: malformed input yields zero or empty values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Leading decimal digits as an unsigned integer.
    pub fn decimal(&self) -> u64 {
        let trimmed = self.value.trim_start();
        let end = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        trimmed[..end].parse().unwrap_or(0)
    }

    /// Leading signed decimal-floating-point number.
    pub fn floating_point(&self) -> f64 {
        let trimmed = self.value.trim_start();
        let end = trimmed
            .char_indices()
            .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+'))))
            .map_or(trimmed.len(), |(i, _)| i);
        trimmed[..end].parse().unwrap_or(0.0)
    }

    /// Value with one pair of surrounding double quotes removed.
    pub fn quoted_string(&self) -> String {
        unquote(&self.value).to_string()
    }

    /// Copy of this attribute with its value unquoted.
    pub fn unescape_quotes(&self) -> Attribute {
        Attribute::new(self.name.clone(), self.quoted_string())
    }

    /// Hexadecimal byte sequence, `0x`/`0X` prefix optional.
    ///
    /// An odd digit count is left-padded with a zero nibble.
    pub fn hex_sequence(&self) -> Vec<u8> {
        let raw = self.value.trim();
        let digits = raw
            .strip_prefix("0x")
            .or_else(|| raw.strip_prefix("0X"))
            .unwrap_or(raw);
        let result = if digits.len() % 2 == 1 {
            hex::decode(format!("0{digits}"))
        } else {
            hex::decode(digits)
        };
        result.unwrap_or_default()
    }

    /// `LENGTH[@OFFSET]` as `(offset, length)`; `(0, 0)` when malformed.
    pub fn byte_range(&self) -> (u64, u64) {
        HlsByteRange::try_from(unquote(self.value.trim()))
            .map_or((0, 0), |range| offset_length(range.start(), range.len()))
    }

    /// `WIDTHxHEIGHT`; `(0, 0)` when malformed.
    pub fn resolution(&self) -> (u32, u32) {
        let Ok(resolution) = self.value.trim().parse::<Resolution>() else {
            return (0, 0);
        };
        match (u32::try_from(resolution.width()), u32::try_from(resolution.height())) {
            (Ok(w), Ok(h)) => (w, h),
            _ => (0, 0),
        }
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Tag payload, one variant per [`TagShape`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    Single(Attribute),
    Attributes(Vec<Attribute>),
    ValuesList(Vec<Attribute>),
    Marker,
}

/// Typed `EXT-X-STREAM-INF` values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamInf {
    pub bandwidth: u64,
    pub codecs: Option<String>,
    pub frame_rate: Option<f64>,
}

/// `EXT-X-MAP` target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapSection {
    pub uri: String,
    /// `(offset, length)`.
    pub byte_range: Option<(u64, u64)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    kind: TagKind,
    value: TagValue,
    raw: String,
}

impl Tag {
    /// Build a tag from its name and the text after `:`.
    ///
    /// An empty name produces a [`TagKind::Uri`] tag holding `blob`; unknown
    /// names produce `None`.
    pub fn from_name(name: &str, blob: &str) -> Option<Self> {
        let kind = if name.is_empty() {
            TagKind::Uri
        } else {
            TagKind::from_name(name)?
        };
        Some(Self::with_kind(kind, blob))
    }

    pub fn with_kind(kind: TagKind, blob: &str) -> Self {
        let value = match kind.shape() {
            TagShape::Single => TagValue::Single(Attribute::new("", blob.trim())),
            TagShape::Attributes => TagValue::Attributes(parse_attribute_list(blob)),
            TagShape::ValuesList => TagValue::ValuesList(parse_values_list(kind, blob)),
            TagShape::Marker => TagValue::Marker,
        };
        Self {
            kind,
            value,
            raw: blob.trim().to_string(),
        }
    }

    pub fn kind(&self) -> TagKind {
        self.kind
    }

    pub fn payload(&self) -> &TagValue {
        &self.value
    }

    /// Text after the `:` as it appeared in the playlist.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The `#NAME:payload` line this tag was read from.
    pub fn line(&self) -> String {
        format!("#{}:{}", self.kind.name(), self.raw)
    }

    /// Scalar value of a single-value tag.
    pub fn value(&self) -> Option<&Attribute> {
        match &self.value {
            TagValue::Single(attr) => Some(attr),
            _ => None,
        }
    }

    /// Named attribute of an attribute-list or values-list tag.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        match &self.value {
            TagValue::Attributes(attrs) | TagValue::ValuesList(attrs) => {
                attrs.iter().find(|a| a.name == name)
            }
            _ => None,
        }
    }

    pub fn attributes(&self) -> &[Attribute] {
        match &self.value {
            TagValue::Attributes(attrs) | TagValue::ValuesList(attrs) => attrs,
            _ => &[],
        }
    }

    /// Append an attribute to an attribute-list tag; ignored for other shapes.
    pub fn push_attribute(&mut self, attr: Attribute) {
        if let TagValue::Attributes(attrs) = &mut self.value {
            attrs.push(attr);
        }
    }

    /// `EXTINF` duration.
    pub fn segment_duration(&self) -> Option<Duration> {
        if self.kind != TagKind::ExtInf {
            return None;
        }
        let line = self.line();
        match HlsExtInf::try_from(line.as_str()) {
            Ok(inf) => Some(inf.duration()),
            Err(e) => {
                trace!(line = %line, error = %e, "EXTINF without a duration");
                None
            }
        }
    }

    /// `EXT-X-BYTERANGE` as `(offset, length)`. A missing offset reads as 0.
    pub fn byte_range(&self) -> Option<(u64, u64)> {
        if self.kind != TagKind::ExtXByteRange {
            return None;
        }
        let range = HlsByteRange::try_from(self.raw.as_str()).ok()?;
        Some(offset_length(range.start(), range.len()))
    }

    /// `EXT-X-MAP` URI and optional byte range.
    pub fn map_section(&self) -> Option<MapSection> {
        if self.kind != TagKind::ExtXMap {
            return None;
        }
        let line = self.line();
        let map = HlsExtXMap::try_from(line.as_str())
            .map_err(|e| trace!(line = %line, error = %e, "unusable EXT-X-MAP"))
            .ok()?;
        Some(MapSection {
            uri: map.uri().to_string(),
            byte_range: map.range().map(|r| offset_length(r.start(), r.len())),
        })
    }

    /// Key description of an `EXT-X-KEY` or `EXT-X-SESSION-KEY`.
    ///
    /// `METHOD=NONE` and keys without a `URI` decode to `None`.
    pub fn decryption_key(&self) -> Option<HlsDecryptionKey<'_>> {
        if !matches!(self.kind, TagKind::ExtXKey | TagKind::ExtXSessionKey) {
            return None;
        }
        HlsDecryptionKey::try_from(self.raw.as_str())
            .map_err(|e| trace!(raw = %self.raw, error = %e, "no usable key"))
            .ok()
    }

    /// `EXT-X-START:TIME-OFFSET` in seconds.
    pub fn time_offset(&self) -> Option<f64> {
        if self.kind != TagKind::ExtXStart {
            return None;
        }
        let start = HlsExtXStart::try_from(self.line().as_str()).ok()?;
        Some(f64::from(start.time_offset().as_f32()))
    }

    /// Bandwidth, codecs and frame rate of an `EXT-X-STREAM-INF` whose URI
    /// has been folded in.
    pub fn stream_inf(&self) -> Option<StreamInf> {
        if self.kind != TagKind::ExtXStreamInf {
            return None;
        }
        let uri = self.attribute("URI").map_or("", |a| a.value.as_str());
        let text = format!("{}\n{}", self.line(), uri);
        let variant = VariantStream::try_from(text.as_str())
            .map_err(|e| trace!(uri, error = %e, "unusable EXT-X-STREAM-INF"))
            .ok()?;
        let VariantStream::ExtXStreamInf {
            stream_data,
            frame_rate,
            ..
        } = variant
        else {
            return None;
        };
        Some(StreamInf {
            bandwidth: stream_data.bandwidth(),
            codecs: stream_data.codecs().map(|c| c.to_string()),
            frame_rate: frame_rate.map(|f| f64::from(f.as_f32())),
        })
    }
}

fn offset_length(start: Option<usize>, len: usize) -> (u64, u64) {
    (start.unwrap_or(0) as u64, len as u64)
}

/// Split `A=1,B="x,y",C=z` into attributes, keeping quotes in the raw values.
fn parse_attribute_list(blob: &str) -> Vec<Attribute> {
    let mut attrs = Vec::new();
    let mut rest = blob.trim();

    while !rest.is_empty() {
        let Some(eq) = rest.find('=') else {
            break;
        };
        let name = rest[..eq].trim();
        let after = &rest[eq + 1..];

        let end = if after.starts_with('"') {
            after[1..].find('"').map_or(after.len(), |close| close + 2)
        } else {
            after.find(',').unwrap_or(after.len())
        };
        let value = after[..end].trim();
        if !name.is_empty() {
            attrs.push(Attribute::new(name, value));
        }

        rest = after[end..].trim_start();
        rest = rest.strip_prefix(',').unwrap_or(rest).trim_start();
    }

    attrs
}

/// `#EXTINF:<duration>,[<title>]` becomes `DURATION` and `TITLE`.
fn parse_values_list(kind: TagKind, blob: &str) -> Vec<Attribute> {
    match kind {
        TagKind::ExtInf => {
            let (duration, title) = blob.split_once(',').unwrap_or((blob, ""));
            let mut values = Vec::with_capacity(2);
            if !duration.trim().is_empty() {
                values.push(Attribute::new("DURATION", duration.trim()));
            }
            values.push(Attribute::new("TITLE", title.trim()));
            values
        }
        _ => blob
            .split(',')
            .enumerate()
            .map(|(i, v)| Attribute::new(i.to_string(), v.trim()))
            .collect(),
    }
}
