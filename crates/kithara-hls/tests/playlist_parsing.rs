
use std::{sync::Arc, time::Duration};

use fixture::*;
use kithara_hls::{
    AdaptationSetId, ByteRange, EncryptionMethod, HlsError, Playlist, PlaylistKind,
    PlaylistParser, Role, StreamFormat, Timescale,
};
use rstest::rstest;

fn parse(text: &str, url: &str) -> Playlist {
    PlaylistParser::default().parse_str(text, url).unwrap()
}

#[test]
fn vod_media_playlist() {
    let playlist = parse(VOD_TWO_SEGMENTS, PLAYLIST_URL);

    assert_eq!(playlist.kind, PlaylistKind::Media);
    assert_eq!(playlist.url.as_deref(), Some("https://cdn.example.com/vod/"));
    assert_eq!(playlist.duration, Duration::from_millis(19_000));

    let reps: Vec<_> = playlist.representations().collect();
    assert_eq!(reps.len(), 1);
    let rep = reps[0];
    assert!(!rep.live);
    assert_eq!(rep.target_duration, 10);

    let segments = rep.segments();
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].source_url, "seg0.ts");
    assert_eq!(segments[0].duration, 9_500_000);
    assert_eq!(segments[1].start_time, 9_500_000);
    assert_eq!(rep.resolve_url(&segments[1].source_url), "https://cdn.example.com/vod/seg1.ts");

    let schedule = rep.next_update().unwrap();
    assert!(schedule.is_never());
    assert!(schedule.is_final);
}

#[test]
fn master_with_two_variants() {
    let playlist = parse(MASTER_TWO_VARIANTS, MASTER_URL);

    assert!(playlist.is_master());
    let sets: Vec<_> = playlist.adaptation_sets().collect();
    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].id, AdaptationSetId::Default);

    let reps = &sets[0].representations;
    assert_eq!(reps.len(), 2);
    assert_eq!(reps[0].bandwidth, 500_000);
    assert_eq!((reps[0].width, reps[0].height), (Some(640), Some(360)));
    assert_eq!(reps[0].playlist_url, "https://cdn.example.com/show/low/index.m3u8");
    assert_eq!(reps[1].bandwidth, 1_500_000);
    assert_eq!(reps[1].codecs, vec!["avc1.4d401f", "mp4a.40.2"]);
    assert_eq!(reps[1].base_url.as_deref(), Some("high/"));

    // Variants are declared, not loaded.
    assert!(reps.iter().all(|r| !r.loaded && r.segments().is_empty()));
    assert_eq!(playlist.duration, Duration::ZERO);
}

#[test]
fn key_rotation_and_clear() {
    let text = "#EXTM3U
#EXT-X-TARGETDURATION:4
#EXT-X-KEY:METHOD=AES-128,URI=\"key.bin\"
#EXTINF:4,
a.ts
#EXTINF:4,
b.ts
#EXT-X-KEY:METHOD=NONE
#EXTINF:4,
c.ts
#EXT-X-ENDLIST
";
    let playlist = parse(text, PLAYLIST_URL);
    let segments = playlist.representations().next().unwrap().segments();

    assert_eq!(segments.len(), 3);
    for segment in &segments[..2] {
        let enc = segment.encryption.as_ref().unwrap();
        assert_eq!(enc.method, EncryptionMethod::Aes128);
        assert_eq!(enc.uri, "https://cdn.example.com/vod/key.bin");
        assert!(enc.iv.is_empty());
    }
    assert!(segments[2].encryption.is_none());
}

#[test]
fn byte_range_sub_segments() {
    let text = "#EXTM3U
#EXT-X-TARGETDURATION:4
#EXT-X-BYTERANGE:1000@0
#EXTINF:4,
main.ts
#EXT-X-BYTERANGE:500
#EXTINF:4,
main.ts
#EXT-X-ENDLIST
";
    let playlist = parse(text, PLAYLIST_URL);
    let segments = playlist.representations().next().unwrap().segments();

    assert_eq!(segments[0].byte_range, Some(ByteRange::new(0, 999)));
    assert_eq!(segments[1].byte_range, Some(ByteRange::new(1000, 1499)));
    assert_eq!(segments[1].byte_range.unwrap().to_http_range(), "bytes=1000-1499");
}

#[test]
fn live_first_parse_holds_back_tail() {
    let playlist = parse(&live_media(0, 5), PLAYLIST_URL);
    let rep = playlist.representations().next().unwrap();

    assert!(rep.live);
    let seqs: Vec<_> = rep.segments().iter().map(|s| s.sequence).collect();
    assert_eq!(seqs, vec![0, 1, 2, 3]);
    assert_eq!(playlist.duration, Duration::ZERO);
}

#[rstest]
fn master_groups(keyring: Arc<RecordingKeyring>) {
    let parser = PlaylistParser::default().with_keyring(keyring.clone());
    let playlist = parser.parse_str(MASTER_WITH_GROUPS, MASTER_URL).unwrap();

    assert_eq!(
        *keyring.prefetched.lock(),
        vec!["https://cdn.example.com/show/keys/session.key".to_string()]
    );

    let sets: Vec<_> = playlist.adaptation_sets().collect();
    let ids: Vec<_> = sets.iter().map(|s| s.id.to_string()).collect();
    assert_eq!(
        ids,
        vec!["default", "aud Commentary", "aud Deutsch", "aud English", "#1", "subs English"]
    );

    // audio/en.m3u8 is also a rendition, so only the video variant is a default member.
    let default: Vec<_> = sets[0].representations.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(default, vec!["video/800k.m3u8"]);
    assert_eq!(sets[0].representations[0].bandwidth, 800_000);

    let roles: Vec<_> = sets[1..].iter().map(|s| s.role).collect();
    assert_eq!(
        roles,
        vec![
            Role::Supplementary,
            Role::Alternate,
            Role::Main,
            Role::Alternate,
            Role::Subtitle
        ]
    );

    assert_eq!(sets[2].language.as_deref(), Some("de"));
    assert_eq!(sets[3].language.as_deref(), Some("en"));
    assert_eq!(sets[3].description.as_deref(), Some("aud English"));
    assert_eq!(
        sets[3].representations[0].playlist_url,
        "https://cdn.example.com/show/audio/en.m3u8"
    );

    assert_eq!(sets[4].id, AdaptationSetId::Index(1));
    assert!(sets[4].description.is_none());
    assert_eq!(sets[4].representations[0].stream_format, StreamFormat::Unsupported);
    assert_eq!(sets[3].representations[0].stream_format, StreamFormat::Undetermined);

    assert!(playlist.representation("untyped.m3u8").is_none());
}

#[test]
fn session_key_without_keyring_is_ignored() {
    let playlist = parse(MASTER_WITH_GROUPS, MASTER_URL);
    assert!(playlist.is_master());
}

#[rstest]
#[case("#EXT-X-START:TIME-OFFSET=5", Some(Duration::from_secs(5)))]
#[case("#EXT-X-START:TIME-OFFSET=-4.5,PRECISE=YES", Some(Duration::from_millis(14_500)))]
#[case("#EXT-X-START:TIME-OFFSET=30", None)]
fn start_offset_against_duration(#[case] start: &str, #[case] expected: Option<Duration>) {
    let text = format!("#EXTM3U\n{start}\n{}", &VOD_TWO_SEGMENTS["#EXTM3U\n".len()..]);
    let playlist = parse(&text, PLAYLIST_URL);
    assert_eq!(playlist.presentation_start_offset, expected);
}

#[rstest]
#[case("")]
#[case("not a playlist\n#EXTINF:4,\na.ts\n")]
#[case("\n#EXTM3U\n")]
fn missing_header_is_rejected(#[case] text: &str) {
    let err = PlaylistParser::default().parse_str(text, PLAYLIST_URL).unwrap_err();
    assert!(matches!(err, HlsError::MissingHeader));
}

#[test]
fn custom_timescale_scales_times() {
    let parser = PlaylistParser::new(false, Timescale::new(90_000));
    let playlist = parser.parse_str(VOD_TWO_SEGMENTS, PLAYLIST_URL).unwrap();
    let rep = playlist.representations().next().unwrap();

    assert_eq!(rep.timescale, Timescale::new(90_000));
    assert_eq!(rep.segments()[0].duration, 855_000);
    assert_eq!(rep.segments()[1].start_time, 855_000);
    assert_eq!(playlist.duration, Duration::from_secs(19));
}

const MIXED_VOD: &str = "#EXTM3U
#EXT-X-TARGETDURATION:6
#EXT-X-MEDIA-SEQUENCE:40
#EXTINF:5.005,
a.ts
#EXTINF:6,
b.ts
#EXT-X-DISCONTINUITY
#EXTINF:2.5,
c.ts
d.ts
#EXTINF:0.5,
e.ts
#EXT-X-ENDLIST
";

#[rstest]
#[case(VOD_TWO_SEGMENTS)]
#[case(MIXED_VOD)]
fn vod_lists_are_contiguous(#[case] text: &str) {
    let playlist = parse(text, PLAYLIST_URL);
    let rep = playlist.representations().next().unwrap();
    let segments = rep.segments();

    let mut expected_start = 0;
    for pair in segments.windows(2) {
        assert_eq!(pair[1].sequence, pair[0].sequence + 1);
    }
    for segment in segments {
        assert_eq!(segment.start_time, expected_start);
        expected_start += segment.duration;
    }
    assert_eq!(
        playlist.duration,
        rep.timescale.to_duration(expected_start)
    );
}

#[test]
fn live_duration_stays_zero() {
    let playlist = parse(&live_media(10, 3), PLAYLIST_URL);
    assert_eq!(playlist.duration, Duration::ZERO);
    assert_eq!(
        playlist.representations().next().unwrap().segments()[0].sequence,
        10
    );
}

#[test]
fn reparsing_is_deterministic() {
    let first = parse(MIXED_VOD, PLAYLIST_URL);
    let second = parse(MIXED_VOD, PLAYLIST_URL);

    let a = first.representations().next().unwrap();
    let b = second.representations().next().unwrap();
    assert_eq!(a.segment_list(), b.segment_list());
    assert_eq!(first.duration, second.duration);
    assert!(a.segments()[2].discontinuity);

    let durations: Vec<_> = a.segments().iter().map(|s| s.duration).collect();
    assert_eq!(durations, vec![5_005_000, 6_000_000, 2_500_000, 6_000_000, 500_000]);
}

#[test]
fn gap_segments_are_not_built() {
    let text = "#EXTM3U
#EXT-X-TARGETDURATION:4
#EXTINF:4,
a.ts
#EXT-X-GAP
#EXTINF:4,
b.ts
#EXTINF:4,
c.ts
#EXT-X-ENDLIST
";
    let playlist = parse(text, PLAYLIST_URL);
    let rep = playlist.representations().next().unwrap();

    let urls: Vec<_> = rep.segments().iter().map(|s| s.source_url.as_str()).collect();
    assert_eq!(urls, vec!["a.ts", "c.ts"]);
    assert_eq!(playlist.duration, Duration::from_secs(8));
}

#[test]
fn growing_vod_duration_never_shrinks() {
    let mut playlist = parse(&ended(live_media(0, 3)), PLAYLIST_URL);
    assert_eq!(playlist.duration, Duration::from_secs(12));

    let grown = parse(&ended(live_media(0, 5)), PLAYLIST_URL);
    playlist.account_duration(grown.duration, false);
    assert_eq!(playlist.duration, Duration::from_secs(20));

    playlist.account_duration(Duration::from_secs(4), false);
    assert_eq!(playlist.duration, Duration::from_secs(20));
}
