use std::time::Duration;

use tracing::{debug, warn};

use super::{
    segment::{Segment, SegmentList},
    timescale::Timescale,
};
use crate::encryption::{directory_of, join_relative};

/// Container classification of a representation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamFormat {
    /// Not known until segments are inspected.
    #[default]
    Undetermined,
    /// Rendition type this engine cannot play (e.g. `CLOSED-CAPTIONS`).
    Unsupported,
}

/// Reduced frame rate fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRate {
    pub num: u32,
    pub den: u32,
}

impl FrameRate {
    /// `FRAME-RATE` value as a fraction over 1000, reduced.
    pub fn from_f64(rate: f64) -> Option<Self> {
        if !rate.is_finite() || rate <= 0.0 {
            return None;
        }
        let num = (rate * 1000.0).round();
        if num > f64::from(u32::MAX) {
            return None;
        }
        let num = num as u32;
        let divisor = gcd(num, 1000);
        Some(Self {
            num: num / divisor,
            den: 1000 / divisor,
        })
    }

    pub fn as_f64(&self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.max(1)
}

/// When a representation should be reloaded next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateSchedule {
    pub delay: Duration,
    /// No further reload is expected.
    pub is_final: bool,
}

impl UpdateSchedule {
    /// Sentinel delay meaning "never refresh automatically".
    pub const NEVER: Duration = Duration::MAX;

    pub fn never() -> Self {
        Self {
            delay: Self::NEVER,
            is_final: true,
        }
    }

    pub fn is_never(&self) -> bool {
        self.delay == Self::NEVER
    }
}

/// One rendition: a variant stream or an alternative media track.
#[derive(Debug, Clone)]
pub struct Representation {
    /// Raw playlist reference as written in the master playlist.
    pub id: String,
    /// Playlist location used for refreshes and key resolution.
    pub playlist_url: String,
    /// Directory of `id` (with trailing `/`) when `id` has a path.
    pub base_url: Option<String>,
    pub bandwidth: u64,
    pub codecs: Vec<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<FrameRate>,
    pub stream_format: StreamFormat,
    pub timescale: Timescale,
    /// Whole seconds from `EXT-X-TARGETDURATION`.
    pub target_duration: u64,
    /// Microseconds from `EXT-X-PART-INF:PART-TARGET`; zero without LL-HLS.
    pub part_target_duration: u64,
    pub live: bool,
    /// `false` once the timeline is anchored by program date time.
    pub consistent: bool,
    pub loaded: bool,
    played_sequence_number: u64,
    next_update: Option<UpdateSchedule>,
    segment_list: Option<SegmentList>,
}

impl Representation {
    pub fn new(id: impl Into<String>, playlist_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            playlist_url: playlist_url.into(),
            base_url: None,
            bandwidth: 0,
            codecs: Vec::new(),
            width: None,
            height: None,
            frame_rate: None,
            stream_format: StreamFormat::default(),
            timescale: Timescale::default(),
            target_duration: 0,
            part_target_duration: 0,
            live: true,
            consistent: true,
            loaded: false,
            played_sequence_number: 0,
            next_update: None,
            segment_list: None,
        }
    }

    /// Append comma-separated codec identifiers.
    pub fn add_codecs(&mut self, codecs: &str) {
        self.codecs.extend(
            codecs
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
        );
    }

    pub fn is_ll_hls(&self) -> bool {
        self.part_target_duration > 0
    }

    pub fn segment_list(&self) -> Option<&SegmentList> {
        self.segment_list.as_ref()
    }

    pub fn segments(&self) -> &[Segment] {
        self.segment_list.as_ref().map_or(&[], SegmentList::segments)
    }

    /// Install a freshly built list.
    ///
    /// The first parse replaces whatever was there; later parses append the
    /// segments newer than the current tail. Returns the number of segments
    /// that became visible.
    pub fn update_segment_list(&mut self, list: SegmentList, is_first_parse: bool) -> usize {
        let Some(current) = self.segment_list.as_mut().filter(|_| !is_first_parse) else {
            let count = list.len();
            self.segment_list = Some(list);
            return count;
        };

        if let (Some(tail), Some(incoming)) = (current.last_sequence(), list.last_sequence())
            && incoming < tail
        {
            warn!(
                representation = %self.id,
                tail,
                incoming,
                "media sequence went backwards; keeping current window"
            );
        }

        let appended = current.merge(list);
        debug!(representation = %self.id, appended, total = current.len(), "segment list updated");
        appended
    }

    /// Drop the oldest segments beyond `max_segments`.
    pub fn prune_segments(&mut self, max_segments: usize) -> usize {
        self.segment_list
            .as_mut()
            .map_or(0, |list| list.prune_to(max_segments))
    }

    pub fn set_played_sequence_number(&mut self, sequence: u64) {
        self.played_sequence_number = sequence;
    }

    pub fn played_sequence_number(&self) -> u64 {
        self.played_sequence_number
    }

    pub fn schedule_next_update(&mut self, delay: Duration, is_final: bool) {
        self.next_update = Some(UpdateSchedule { delay, is_final });
    }

    pub fn next_update(&self) -> Option<UpdateSchedule> {
        self.next_update
    }

    /// Absolute location of a segment or init section of this representation.
    pub fn resolve_url(&self, target: &str) -> String {
        let base = format!("{}/", directory_of(&self.playlist_url));
        join_relative(&base, target)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn list(seqs: &[u64]) -> SegmentList {
        let mut list = SegmentList::new();
        for &seq in seqs {
            list.add_segment(Segment::new(seq, format!("s{seq}.ts")));
        }
        list
    }

    #[rstest]
    #[case(29.97, 2_997, 100)]
    #[case(25.0, 25, 1)]
    #[case(23.976, 2_997, 125)]
    fn frame_rate_is_reduced(#[case] rate: f64, #[case] num: u32, #[case] den: u32) {
        assert_eq!(FrameRate::from_f64(rate), Some(FrameRate { num, den }));
    }

    #[test]
    fn frame_rate_rejects_non_positive() {
        assert!(FrameRate::from_f64(0.0).is_none());
        assert!(FrameRate::from_f64(-1.0).is_none());
    }

    #[test]
    fn defaults_are_live_and_consistent() {
        let rep = Representation::new("a.m3u8", "http://h/a.m3u8");
        assert!(rep.live);
        assert!(rep.consistent);
        assert!(!rep.loaded);
        assert!(rep.segments().is_empty());
        assert!(rep.next_update().is_none());
    }

    #[test]
    fn first_parse_replaces_refresh_appends() {
        let mut rep = Representation::new("a", "http://h/a.m3u8");

        assert_eq!(rep.update_segment_list(list(&[1, 2, 3]), true), 3);
        assert_eq!(rep.update_segment_list(list(&[7, 8]), true), 2);
        assert_eq!(rep.segments().len(), 2);

        assert_eq!(rep.update_segment_list(list(&[8, 9, 10]), false), 2);
        let seqs: Vec<_> = rep.segments().iter().map(|s| s.sequence).collect();
        assert_eq!(seqs, vec![7, 8, 9, 10]);
    }

    #[test]
    fn refresh_without_list_behaves_like_first_parse() {
        let mut rep = Representation::new("a", "http://h/a.m3u8");
        assert_eq!(rep.update_segment_list(list(&[5, 6]), false), 2);
        assert_eq!(rep.segments().len(), 2);
    }

    #[test]
    fn codecs_are_split() {
        let mut rep = Representation::new("a", "a");
        rep.add_codecs("avc1.4d401f, mp4a.40.2");
        assert_eq!(rep.codecs, vec!["avc1.4d401f", "mp4a.40.2"]);
    }

    #[test]
    fn never_schedule() {
        let mut rep = Representation::new("a", "a");
        rep.schedule_next_update(UpdateSchedule::NEVER, true);
        let schedule = rep.next_update().unwrap();
        assert!(schedule.is_never());
        assert!(schedule.is_final);
        assert_eq!(schedule, UpdateSchedule::never());
    }

    #[rstest]
    #[case("http://cdn/v/low/index.m3u8", "seg1.ts", "http://cdn/v/low/seg1.ts")]
    #[case("http://cdn/v/low/index.m3u8", "../init.mp4", "http://cdn/v/init.mp4")]
    #[case("http://cdn/v/low/index.m3u8", "https://o/s.ts", "https://o/s.ts")]
    fn resolves_segment_urls(#[case] playlist: &str, #[case] target: &str, #[case] expected: &str) {
        let rep = Representation::new("low/index.m3u8", playlist);
        assert_eq!(rep.resolve_url(target), expected);
    }
}
