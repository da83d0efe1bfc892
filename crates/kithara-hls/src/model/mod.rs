//! Period / adaptation set / representation / segment tree.

mod playlist;
mod representation;
mod segment;
mod timescale;

pub use playlist::{AdaptationSet, AdaptationSetId, Period, Playlist, PlaylistKind, Role};
pub use representation::{FrameRate, Representation, StreamFormat, UpdateSchedule};
pub use segment::{ByteRange, InitSegment, Segment, SegmentList};
pub use timescale::{MICROS_PER_SEC, Timescale, duration_to_micros, secs_to_micros};
