//! Master / media playlist assembly.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use tracing::{debug, trace};

use crate::{
    HlsError, HlsResult,
    builder::SegmentListBuilder,
    config::HlsConfig,
    encryption::{directory_of, has_scheme, join_relative, resolve_encryption},
    keys::Keyring,
    model::{
        AdaptationSet, AdaptationSetId, FrameRate, MICROS_PER_SEC, Period, Playlist,
        PlaylistKind, Representation, Role, StreamFormat, Timescale, UpdateSchedule,
    },
    tags::{Attribute, Tag, TagKind},
    tokenizer,
};

/// Turns playlist bytes into a [`Playlist`] tree.
#[derive(Clone, Default)]
pub struct PlaylistParser {
    builder: SegmentListBuilder,
    keyring: Option<Arc<dyn Keyring>>,
}

impl std::fmt::Debug for PlaylistParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaylistParser")
            .field("builder", &self.builder)
            .field("keyring", &self.keyring.as_ref().map(|_| "Keyring"))
            .finish()
    }
}

impl PlaylistParser {
    pub fn new(ll_hls: bool, timescale: Timescale) -> Self {
        Self {
            builder: SegmentListBuilder::new(ll_hls, timescale),
            keyring: None,
        }
    }

    pub fn from_config(config: &HlsConfig) -> Self {
        Self::new(config.ll_hls, config.timescale)
    }

    /// Keyring used to prefetch `EXT-X-SESSION-KEY` keys.
    pub fn with_keyring(mut self, keyring: Arc<dyn Keyring>) -> Self {
        self.keyring = Some(keyring);
        self
    }

    pub fn builder(&self) -> SegmentListBuilder {
        self.builder
    }

    pub fn parse(&self, data: &[u8], playlist_url: &str) -> HlsResult<Playlist> {
        let text = std::str::from_utf8(data)
            .map_err(|e| HlsError::PlaylistParse(format!("Invalid UTF-8: {e}")))?;
        self.parse_str(text, playlist_url)
    }

    pub fn parse_str(&self, text: &str, playlist_url: &str) -> HlsResult<Playlist> {
        let tags = tokenizer::tokenize(text)?;
        let is_master = tags.iter().any(|t| t.kind() == TagKind::ExtXStreamInf);

        let mut playlist = Playlist::new(if is_master {
            PlaylistKind::Master
        } else {
            PlaylistKind::Media
        });
        if !playlist_url.is_empty() {
            playlist.url = Some(format!("{}/", directory_of(playlist_url)));
        }

        let period = if is_master {
            self.assemble_master(&tags, playlist_url)
        } else {
            self.assemble_media(&mut playlist, &tags, playlist_url)
        };
        playlist.periods.push(period);

        if let Some(start) = tags.iter().find(|t| t.kind() == TagKind::ExtXStart) {
            playlist.presentation_start_offset = start
                .time_offset()
                .and_then(|offset| start_offset(offset, playlist.duration));
        }

        debug!(
            url = playlist_url,
            master = is_master,
            tags = tags.len(),
            "playlist parsed"
        );
        playlist.debug_dump();
        Ok(playlist)
    }

    fn assemble_master(&self, tags: &[Tag], playlist_url: &str) -> Period {
        let mut period = Period::default();

        self.prefetch_session_key(tags, playlist_url);

        // Alternative renditions keyed by URI; the first entry for a URI wins.
        let mut groups: BTreeMap<String, &Tag> = BTreeMap::new();
        for tag in tags_of(tags, TagKind::ExtXMedia) {
            if let Some(uri) = tag.attribute("URI") {
                groups.entry(uri.quoted_string()).or_insert(tag);
            }
        }

        let mut default_set = AdaptationSet::new(AdaptationSetId::Default);
        for tag in tags_of(tags, TagKind::ExtXStreamInf) {
            let Some(uri) = tag.attribute("URI") else {
                trace!("variant stream without URI");
                continue;
            };
            if !groups.contains_key(&uri.value) {
                default_set.add_representation(create_representation(tag, Some(playlist_url)));
            }
        }
        period.add_adaptation_set(default_set);

        let mut set_index = 1;
        for tag in groups.values() {
            let Some(kind) = tag.attribute("TYPE") else {
                trace!("media group without TYPE");
                continue;
            };

            let mut rep = create_representation(tag, Some(playlist_url));

            let description = [tag.attribute("GROUP-ID"), tag.attribute("NAME")]
                .into_iter()
                .flatten()
                .map(Attribute::quoted_string)
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            let id = if description.is_empty() {
                let id = AdaptationSetId::Index(set_index);
                set_index += 1;
                id
            } else {
                AdaptationSetId::Named(description.clone())
            };

            let mut set = AdaptationSet::new(id);
            if !description.is_empty() {
                set.description = Some(description);
            }

            let default = tag.attribute("DEFAULT");
            set.role = match default {
                Some(d) if d.value == "YES" => Role::Main,
                _ => Role::Alternate,
            };
            if default.is_none() && tag.attribute("AUTOSELECT").is_some_and(|a| a.value == "NO")
            {
                set.role = Role::Supplementary;
            }

            match kind.value.as_str() {
                "SUBTITLES" => {
                    debug!(rendition = %rep.id, "subtitle rendition is not playable");
                    set.role = Role::Subtitle;
                }
                "AUDIO" | "VIDEO" => {}
                other => {
                    debug!(rendition = %rep.id, kind = other, "unsupported rendition type");
                    rep.stream_format = StreamFormat::Unsupported;
                }
            }

            set.language = tag.attribute("LANGUAGE").map(Attribute::quoted_string);
            set.add_representation(rep);
            period.add_adaptation_set(set);
        }

        period
    }

    fn assemble_media(&self, playlist: &mut Playlist, tags: &[Tag], playlist_url: &str) -> Period {
        let mut period = Period::default();

        let mut inf = Tag::with_kind(TagKind::ExtXStreamInf, "");
        inf.push_attribute(Attribute::new("URI", playlist_url));
        let mut rep = create_representation(&inf, None);

        let report = self.builder.build(&mut rep, tags, true);
        playlist.account_duration(report.total_duration, report.live);
        rep.schedule_next_update(UpdateSchedule::NEVER, true);

        let mut set = AdaptationSet::new(AdaptationSetId::Default);
        set.add_representation(rep);
        period.add_adaptation_set(set);
        period
    }

    fn prefetch_session_key(&self, tags: &[Tag], playlist_url: &str) {
        let Some(session_key) = tags.iter().find(|t| t.kind() == TagKind::ExtXSessionKey) else {
            return;
        };
        let encryption = resolve_encryption(session_key, playlist_url);
        if !encryption.is_encrypted() || encryption.uri.is_empty() {
            return;
        }
        match &self.keyring {
            Some(keyring) => {
                debug!(uri = %encryption.uri, "prefetching session key");
                keyring.prefetch(&encryption.uri);
            }
            None => trace!(uri = %encryption.uri, "no keyring for session key"),
        }
    }
}

fn tags_of(tags: &[Tag], kind: TagKind) -> impl Iterator<Item = &Tag> {
    tags.iter().filter(move |t| t.kind() == kind)
}

/// Representation described by a variant stream or media tag.
///
/// With a `parent` playlist URL, relative references are resolved against
/// its directory; without one the reference is used as the playlist location.
fn create_representation(tag: &Tag, parent: Option<&str>) -> Representation {
    let uri = tag.attribute("URI").map_or_else(String::new, |attr| {
        if tag.kind() == TagKind::ExtXMedia {
            attr.quoted_string()
        } else {
            attr.value.clone()
        }
    });

    let location = match parent {
        Some(parent) if !parent.is_empty() && !has_scheme(&uri) => {
            join_relative(&format!("{}/", directory_of(parent)), &uri)
        }
        _ => uri.clone(),
    };

    let mut rep = Representation::new(uri.clone(), location);
    if uri.contains('/') {
        let dir = directory_of(&uri);
        if !dir.is_empty() {
            rep.base_url = Some(format!("{dir}/"));
        }
    }

    if let Some(inf) = tag.stream_inf() {
        rep.bandwidth = inf.bandwidth;
        if let Some(codecs) = inf.codecs {
            rep.add_codecs(&codecs);
        }
        rep.frame_rate = inf.frame_rate.and_then(FrameRate::from_f64);
    } else if let Some(codecs) = tag.attribute("CODECS") {
        rep.add_codecs(&codecs.quoted_string());
    }
    if let Some(resolution) = tag.attribute("RESOLUTION") {
        let (width, height) = resolution.resolution();
        if width != 0 && height != 0 {
            rep.width = Some(width);
            rep.height = Some(height);
        }
    }

    rep
}

/// Resolve an `EXT-X-START:TIME-OFFSET` against the playlist duration.
fn start_offset(offset_secs: f64, duration: Duration) -> Option<Duration> {
    if !offset_secs.is_finite() {
        return None;
    }
    let total = duration.as_micros();
    let magnitude = (offset_secs.abs() * MICROS_PER_SEC as f64) as u128;

    if offset_secs > 0.0 && magnitude <= total {
        Some(micros(magnitude))
    } else if offset_secs < 0.0 && magnitude <= total {
        Some(micros(total - magnitude))
    } else {
        None
    }
}

fn micros(value: u128) -> Duration {
    Duration::from_micros(u64::try_from(value).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(5.0, 20, Some(Duration::from_secs(5)))]
    #[case(20.0, 20, Some(Duration::from_secs(20)))]
    #[case(25.0, 20, None)]
    #[case(-5.0, 20, Some(Duration::from_secs(15)))]
    #[case(-25.0, 20, None)]
    #[case(0.0, 20, None)]
    #[case(3.0, 0, None)]
    fn start_offset_bounds(
        #[case] offset: f64,
        #[case] total_secs: u64,
        #[case] expected: Option<Duration>,
    ) {
        assert_eq!(start_offset(offset, Duration::from_secs(total_secs)), expected);
    }

    #[test]
    fn variant_attributes() {
        let mut tag = Tag::from_name(
            "EXT-X-STREAM-INF",
            r#"BANDWIDTH=1500000,CODECS="avc1.4d401f,mp4a.40.2",RESOLUTION=1280x720,FRAME-RATE=29.970"#,
        )
        .unwrap();
        tag.push_attribute(Attribute::new("URI", "hi/index.m3u8"));

        let rep = create_representation(&tag, Some("https://cdn.example.com/v/master.m3u8"));

        assert_eq!(rep.id, "hi/index.m3u8");
        assert_eq!(rep.playlist_url, "https://cdn.example.com/v/hi/index.m3u8");
        assert_eq!(rep.base_url.as_deref(), Some("hi/"));
        assert_eq!(rep.bandwidth, 1_500_000);
        assert_eq!(rep.codecs, vec!["avc1.4d401f", "mp4a.40.2"]);
        assert_eq!((rep.width, rep.height), (Some(1280), Some(720)));
        assert_eq!(rep.frame_rate, Some(FrameRate { num: 2997, den: 100 }));
    }

    #[test]
    fn half_resolution_is_ignored() {
        let mut tag = Tag::from_name("EXT-X-STREAM-INF", "RESOLUTION=0x720").unwrap();
        tag.push_attribute(Attribute::new("URI", "a.m3u8"));

        let rep = create_representation(&tag, None);

        assert_eq!(rep.width, None);
        assert_eq!(rep.base_url, None);
        assert_eq!(rep.playlist_url, "a.m3u8");
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn subtitle_rendition_is_flagged() {
        let text = r#"#EXTM3U
#EXT-X-MEDIA:TYPE=SUBTITLES,GROUP-ID="subs",NAME="English",URI="subs/en.m3u8"
#EXT-X-STREAM-INF:BANDWIDTH=800000,SUBTITLES="subs"
video.m3u8
"#;
        let logs = Captured::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let playlist = tracing::subscriber::with_default(subscriber, || {
            PlaylistParser::default()
                .parse_str(text, "https://cdn.example.com/show/master.m3u8")
                .unwrap()
        });

        let subs = playlist
            .adaptation_sets()
            .find(|s| s.role == Role::Subtitle)
            .unwrap();
        assert_eq!(
            subs.representations[0].stream_format,
            StreamFormat::Undetermined
        );
        let output = String::from_utf8(logs.0.lock().clone()).unwrap();
        assert!(output.contains("subtitle rendition is not playable"));
        assert!(output.contains("subs/en.m3u8"));
    }

    #[test]
    fn invalid_utf8_is_a_parse_error() {
        let err = PlaylistParser::default()
            .parse(b"#EXTM3U\n\xff\xfe\n", "http://h/p.m3u8")
            .unwrap_err();
        assert!(matches!(err, HlsError::PlaylistParse(_)));
    }
}
