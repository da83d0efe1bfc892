//! Segment list builder.
//!
//! A single forward fold over the tag list produces buffered segment records.
//! A windowing step then decides which of them become visible in the
//! representation's segment list.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime};
use tracing::{debug, trace};

use crate::{
    encryption::{CommonEncryption, resolve_encryption},
    model::{
        ByteRange, InitSegment, MICROS_PER_SEC, Representation, Segment, SegmentList, Timescale,
        duration_to_micros, secs_to_micros,
    },
    tags::{Tag, TagKind},
};

/// Records inserted after the LL-HLS start point on first parse.
const LL_HLS_START_RECORDS: usize = 3;
/// Distance from the last played part below which refreshed parts are ignored.
const LL_HLS_REFRESH_LAG: u64 = 2;

/// Outcome of one builder pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Records constructed from the tag stream.
    pub built: usize,
    /// Records selected by the windowing step.
    pub selected: usize,
    /// Records that became visible after merging into the current list.
    pub appended: usize,
    /// Sum of all record durations in this pass.
    pub total_duration: Duration,
    pub live: bool,
}

/// Builds segment lists for one representation.
#[derive(Debug, Clone, Copy)]
pub struct SegmentListBuilder {
    ll_hls: bool,
    timescale: Timescale,
}

impl Default for SegmentListBuilder {
    fn default() -> Self {
        Self::new(false, Timescale::default())
    }
}

impl SegmentListBuilder {
    pub fn new(ll_hls: bool, timescale: Timescale) -> Self {
        Self { ll_hls, timescale }
    }

    /// Run one pass over `tags` and merge the selected records into `rep`.
    ///
    /// `first` selects the initial-parse windowing policy and replaces the
    /// current list; otherwise the refresh policy applies and records are
    /// appended.
    pub fn build(&self, rep: &mut Representation, tags: &[Tag], first: bool) -> BuildReport {
        rep.timescale = self.timescale;
        rep.loaded = true;

        let ctx = tags
            .iter()
            .fold(ParseContext::new(self.ll_hls, self.timescale), |mut ctx, tag| {
                if let Some(record) = ctx.step(rep, tag) {
                    ctx.records.push(record);
                }
                ctx
            });

        let built = ctx.records.len();
        let total_duration = Duration::from_micros(ctx.total);
        let mut list = SegmentList::new();
        if let Some(init) = ctx.init.clone() {
            list.set_init_segment(init);
        }

        let selected = select_window(rep, &ctx, first);
        let selected_count = selected.len();
        for record in selected {
            list.add_segment(record);
        }

        let appended = rep.update_segment_list(list, first);

        debug!(
            representation = %rep.id,
            first,
            built,
            selected = selected_count,
            appended,
            live = rep.live,
            ll_hls = ctx.part_target > 0,
            "segment list built"
        );

        BuildReport {
            built,
            selected: selected_count,
            appended,
            total_duration,
            live: rep.live,
        }
    }
}

/// Sticky state threaded through the tag fold.
#[derive(Debug)]
struct ParseContext {
    ll_hls: bool,
    timescale: Timescale,
    /// Pending `EXTINF`; inner `None` means the tag carried no duration.
    extinf: Option<Option<u64>>,
    /// Pending `EXT-X-BYTERANGE` as `(offset, length)`.
    byte_range: Option<(u64, u64)>,
    discontinuity: bool,
    encryption: CommonEncryption,
    /// Relative time cursor, microseconds.
    start_time: u64,
    /// Wall-clock cursor, microseconds since the epoch.
    display_time: Option<i64>,
    sequence: u64,
    /// `PART-TARGET` in microseconds.
    part_target: u64,
    parts_per_segment: u64,
    byte_offset: u64,
    total: u64,
    init: Option<InitSegment>,
    records: Vec<Segment>,
}

impl ParseContext {
    fn new(ll_hls: bool, timescale: Timescale) -> Self {
        Self {
            ll_hls,
            timescale,
            extinf: None,
            byte_range: None,
            discontinuity: false,
            encryption: CommonEncryption::default(),
            start_time: 0,
            display_time: None,
            sequence: 0,
            part_target: 0,
            parts_per_segment: 0,
            byte_offset: 0,
            total: 0,
            init: None,
            records: Vec::new(),
        }
    }

    fn step(&mut self, rep: &mut Representation, tag: &Tag) -> Option<Segment> {
        match tag.kind() {
            TagKind::ExtXMediaSequence => {
                self.sequence = tag.value().map_or(0, |v| v.decimal());
            }
            TagKind::ExtInf => {
                self.extinf = Some(tag.segment_duration().map(duration_to_micros));
            }
            TagKind::ExtXPartInf if self.ll_hls => {
                if let Some(target) = tag.attribute("PART-TARGET") {
                    self.part_target = secs_to_micros(target.floating_point());
                    rep.part_target_duration = self.part_target;
                }
            }
            TagKind::ExtXPart if self.ll_hls => return self.part(rep, tag),
            TagKind::Uri => return self.segment(rep, tag),
            TagKind::ExtXTargetDuration => {
                rep.target_duration = tag.value().map_or(0, |v| v.decimal());
            }
            TagKind::ExtXPlaylistType => {
                rep.live = tag.value().is_none_or(|v| v.value != "VOD");
            }
            TagKind::ExtXByteRange => {
                self.byte_range = tag.byte_range();
            }
            TagKind::ExtXProgramDateTime => {
                rep.consistent = false;
                let anchor = tag.value().map_or(0, |v| parse_program_date_time(&v.value));
                self.display_time = Some(anchor);
                self.backfill_display_times(anchor);
            }
            TagKind::ExtXKey => {
                self.encryption = resolve_encryption(tag, &rep.playlist_url);
            }
            TagKind::ExtXMap => {
                if self.init.is_none()
                    && let Some(map) = tag.map_section()
                {
                    self.init = Some(InitSegment {
                        source_url: map.uri,
                        byte_range: map.byte_range.and_then(|(offset, length)| {
                            ByteRange::from_offset_length(offset, length)
                        }),
                    });
                }
            }
            TagKind::ExtXDiscontinuity => self.discontinuity = true,
            TagKind::ExtXEndList => rep.live = false,
            _ => {}
        }
        None
    }

    fn segment(&mut self, rep: &Representation, tag: &Tag) -> Option<Segment> {
        let uri = tag.value().map(|v| v.value.as_str()).unwrap_or_default();
        let extinf = self.extinf.take();
        let byte_range = self.byte_range.take();
        if uri.is_empty() || self.part_target > 0 {
            trace!(uri, "skipping plain segment");
            return None;
        }

        let duration = extinf
            .flatten()
            .unwrap_or_else(|| rep.target_duration.saturating_mul(MICROS_PER_SEC));

        let mut segment = self.open_record(self.sequence, uri, duration);
        self.sequence = self.sequence.saturating_add(1);

        if let Some((offset, length)) = byte_range {
            let start = if offset == 0 { self.byte_offset } else { offset };
            self.byte_offset = start.saturating_add(length);
            segment.byte_range = Some(ByteRange::new(start, self.byte_offset.saturating_sub(1)));
        }

        Some(segment)
    }

    fn part(&mut self, rep: &Representation, tag: &Tag) -> Option<Segment> {
        let duration = tag
            .attribute("DURATION")
            .map_or(0, |d| secs_to_micros(d.floating_point()));
        if duration > 0 {
            self.parts_per_segment = rep.target_duration.saturating_mul(MICROS_PER_SEC) / duration;
        }

        let uri = tag.attribute("URI").map(|u| u.quoted_string())?;
        if uri.is_empty() {
            return None;
        }

        let sequence = sequence_from_part_uri(&uri);
        let mut part = self.open_record(sequence, &uri, duration);
        self.sequence = sequence.saturating_add(1);
        part.independent = tag
            .attribute("INDEPENDENT")
            .is_some_and(|v| v.value == "YES");

        Some(part)
    }

    /// Build a record at the current cursors and advance them by `duration` µs.
    fn open_record(&mut self, sequence: u64, uri: &str, duration: u64) -> Segment {
        let mut record = Segment::new(sequence, uri);
        record.duration = self.timescale.to_scaled(duration);
        record.start_time = self.timescale.to_scaled(self.start_time);
        record.display_time = self.display_time;
        record.discontinuity = std::mem::take(&mut self.discontinuity);
        record.encryption = self
            .encryption
            .is_encrypted()
            .then(|| self.encryption.clone());

        self.start_time = self.start_time.saturating_add(duration);
        self.total = self.total.saturating_add(duration);
        if let Some(display) = self.display_time.as_mut() {
            *display = display.saturating_add(i64::try_from(duration).unwrap_or(i64::MAX));
        }
        record
    }

    /// Give buffered records preceding the first date anchor a wall-clock time.
    fn backfill_display_times(&mut self, anchor: i64) {
        if !self
            .records
            .last()
            .is_some_and(|r| r.display_time.is_none())
        {
            return;
        }

        let mut cursor = anchor;
        for record in self.records.iter_mut().rev() {
            let duration =
                i64::try_from(self.timescale.to_micros(record.duration)).unwrap_or(i64::MAX);
            cursor = if duration < cursor { cursor - duration } else { 0 };
            if record.display_time.is_none() {
                record.display_time = Some(cursor);
            }
        }
    }
}

/// Decide which buffered records enter the visible list.
fn select_window(rep: &mut Representation, ctx: &ParseContext, first: bool) -> Vec<Segment> {
    let records = &ctx.records;
    let ll_hls = ctx.part_target > 0;

    match (first, ll_hls) {
        (true, false) => {
            // A live tail may still be growing; keep it out unless it is alone.
            let keep = if rep.live && records.len() > 1 {
                records.len() - 1
            } else {
                records.len()
            };
            records[..keep].to_vec()
        }
        (true, true) => {
            let mut remaining = records.len() as u64;
            let mut ready = false;
            let mut selected = Vec::with_capacity(LL_HLS_START_RECORDS);
            for record in records {
                remaining -= 1;
                if remaining < ctx.parts_per_segment && record.independent {
                    ready = true;
                }
                if ready && selected.len() < LL_HLS_START_RECORDS {
                    selected.push(record.clone());
                }
            }
            if let Some(start) = selected.first() {
                rep.set_played_sequence_number(start.sequence);
            }
            selected
        }
        (false, true) => {
            let threshold = rep
                .played_sequence_number()
                .saturating_add(LL_HLS_REFRESH_LAG);
            let selected: Vec<Segment> = records
                .iter()
                .filter(|r| r.sequence >= threshold)
                .cloned()
                .collect();
            if let Some(start) = selected.first() {
                rep.set_played_sequence_number(start.sequence);
            }
            selected
        }
        (false, false) => records.clone(),
    }
}

/// Sequence number encoded in an LL-HLS part URI.
///
/// Reads the digits right after the last `_` of the path and stops at the
/// first non-digit (`seg_1042.3.mp4` gives 1042). URIs without such digits
/// yield 0.
pub fn sequence_from_part_uri(uri: &str) -> u64 {
    let path = uri.split(['?', '#']).next().unwrap_or(uri);
    let Some(pos) = path.rfind('_') else {
        return 0;
    };
    let tail = &path[pos + 1..];
    let end = tail
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(tail.len());
    tail[..end].parse().unwrap_or(0)
}

/// `EXT-X-PROGRAM-DATE-TIME` value to microseconds since the epoch; 0 if malformed.
pub fn parse_program_date_time(value: &str) -> i64 {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return dt.timestamp_micros();
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return dt.timestamp_micros();
    }
    // Offset-less timestamps are taken as UTC.
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|dt| dt.and_utc().timestamp_micros())
        .unwrap_or(0)
}
