#![forbid(unsafe_code)]

//! HLS playlist ingestion.
//!
//! M3U8 text is tokenized into typed [`Tag`]s, folded into segment lists by
//! the [`SegmentListBuilder`] and assembled into a [`Playlist`] tree by the
//! [`PlaylistParser`]. The [`RefreshDriver`] keeps live representations
//! up to date.

pub mod builder;
pub mod config;
pub mod encryption;
pub mod error;
pub mod events;
pub mod keys;
pub mod model;
pub mod parser;
pub mod refresh;
pub mod retrieve;
pub mod tags;
pub mod tokenizer;

pub use builder::{BuildReport, SegmentListBuilder, sequence_from_part_uri};
pub use config::{HlsConfig, KeyContext, KeyOptions, KeyProcessor};
pub use encryption::{
    CommonEncryption, EncryptionMethod, directory_of, join_relative, resolve_encryption,
};
pub use error::{HlsError, HlsResult};
pub use events::{EventEmitter, HlsEvent};
pub use keys::{KeyManager, Keyring};
pub use model::{
    AdaptationSet, AdaptationSetId, ByteRange, FrameRate, InitSegment, Period, Playlist,
    PlaylistKind, Representation, Role, Segment, SegmentList, StreamFormat, Timescale,
    UpdateSchedule,
};
pub use parser::PlaylistParser;
pub use refresh::{RefreshDriver, SharedPlaylist};
pub use retrieve::{NetRetrieve, Retrieve};
pub use tags::{Attribute, Tag, TagKind, TagValue};
