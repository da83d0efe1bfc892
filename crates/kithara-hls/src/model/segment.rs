use crate::encryption::CommonEncryption;

/// Inclusive byte range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Range covering `length` bytes from `offset`; `None` for zero length.
    pub fn from_offset_length(offset: u64, length: u64) -> Option<Self> {
        (length > 0).then(|| Self::new(offset, offset.saturating_add(length - 1)))
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start).saturating_add(1)
    }

    /// Value for an HTTP `Range` request header.
    pub fn to_http_range(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

/// One media segment or LL-HLS partial segment.
///
/// `duration` and `start_time` are in representation timescale ticks.
/// `display_time` is microseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub sequence: u64,
    pub source_url: String,
    pub duration: u64,
    pub start_time: u64,
    pub display_time: Option<i64>,
    pub byte_range: Option<ByteRange>,
    pub discontinuity: bool,
    /// Starts with an independent frame (LL-HLS parts only).
    pub independent: bool,
    pub encryption: Option<CommonEncryption>,
}

impl Segment {
    pub fn new(sequence: u64, source_url: impl Into<String>) -> Self {
        Self {
            sequence,
            source_url: source_url.into(),
            duration: 0,
            start_time: 0,
            display_time: None,
            byte_range: None,
            discontinuity: false,
            independent: false,
            encryption: None,
        }
    }

    pub fn end_time(&self) -> u64 {
        self.start_time.saturating_add(self.duration)
    }
}

/// Media initialization section (`EXT-X-MAP`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitSegment {
    pub source_url: String,
    pub byte_range: Option<ByteRange>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentList {
    segments: Vec<Segment>,
    init: Option<InitSegment>,
}

impl SegmentList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_segment(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn init_segment(&self) -> Option<&InitSegment> {
        self.init.as_ref()
    }

    /// Install `init` unless one is already present. Returns whether it was set.
    pub fn set_init_segment(&mut self, init: InitSegment) -> bool {
        if self.init.is_some() {
            return false;
        }
        self.init = Some(init);
        true
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn first_sequence(&self) -> Option<u64> {
        self.segments.first().map(|s| s.sequence)
    }

    pub fn last_sequence(&self) -> Option<u64> {
        self.segments.last().map(|s| s.sequence)
    }

    /// Sum of segment durations in timescale ticks.
    pub fn total_duration(&self) -> u64 {
        self.segments.iter().map(|s| s.duration).sum()
    }

    pub fn segment_by_sequence(&self, sequence: u64) -> Option<&Segment> {
        self.segments
            .binary_search_by_key(&sequence, |s| s.sequence)
            .ok()
            .map(|i| &self.segments[i])
    }

    /// Append the segments of `update` newer than the current tail.
    ///
    /// Returns the number of appended segments. Older or repeated sequences
    /// are dropped so sequence numbers keep strictly increasing.
    pub fn merge(&mut self, update: SegmentList) -> usize {
        if self.init.is_none() {
            self.init = update.init;
        }

        let tail = self.last_sequence();
        let before = self.segments.len();
        self.segments.extend(
            update
                .segments
                .into_iter()
                .filter(|s| tail.is_none_or(|tail| s.sequence > tail)),
        );
        self.segments.len() - before
    }

    /// Keep at most `max_segments` of the newest segments.
    pub fn prune_to(&mut self, max_segments: usize) -> usize {
        let excess = self.segments.len().saturating_sub(max_segments);
        self.segments.drain(..excess);
        excess
    }
}
