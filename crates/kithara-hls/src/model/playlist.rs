use std::{fmt, time::Duration};

use tracing::debug;

use super::representation::Representation;

/// Role of an adaptation set within a period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Role {
    #[default]
    Main,
    Alternate,
    Supplementary,
    Subtitle,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AdaptationSetId {
    /// The set of variant streams not claimed by a media group.
    Default,
    /// `GROUP-ID NAME` of an alternative rendition.
    Named(String),
    /// Positional id for renditions without a description.
    Index(u32),
}

impl fmt::Display for AdaptationSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::Named(name) => f.write_str(name),
            Self::Index(index) => write!(f, "#{index}"),
        }
    }
}

/// Interchangeable representations.
#[derive(Debug, Clone)]
pub struct AdaptationSet {
    pub id: AdaptationSetId,
    pub description: Option<String>,
    pub role: Role,
    pub language: Option<String>,
    pub representations: Vec<Representation>,
}

impl AdaptationSet {
    pub fn new(id: AdaptationSetId) -> Self {
        Self {
            id,
            description: None,
            role: Role::default(),
            language: None,
            representations: Vec::new(),
        }
    }

    pub fn add_representation(&mut self, representation: Representation) {
        self.representations.push(representation);
    }
}

#[derive(Debug, Clone, Default)]
pub struct Period {
    pub adaptation_sets: Vec<AdaptationSet>,
}

impl Period {
    /// Attach `set` unless it has no representations. Returns whether it was kept.
    pub fn add_adaptation_set(&mut self, set: AdaptationSet) -> bool {
        if set.representations.is_empty() {
            return false;
        }
        self.adaptation_sets.push(set);
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistKind {
    Master,
    Media,
}

/// Parsed playlist tree. HLS always yields exactly one period.
#[derive(Debug, Clone)]
pub struct Playlist {
    pub kind: PlaylistKind,
    /// Directory of the playlist URL with a trailing `/`.
    pub url: Option<String>,
    /// Total duration; zero for live playlists.
    pub duration: Duration,
    /// Resolved `EXT-X-START` position.
    pub presentation_start_offset: Option<Duration>,
    pub periods: Vec<Period>,
}

impl Playlist {
    pub fn new(kind: PlaylistKind) -> Self {
        Self {
            kind,
            url: None,
            duration: Duration::ZERO,
            presentation_start_offset: None,
            periods: Vec::new(),
        }
    }

    pub fn is_master(&self) -> bool {
        self.kind == PlaylistKind::Master
    }

    pub fn first_period(&self) -> Option<&Period> {
        self.periods.first()
    }

    pub fn adaptation_sets(&self) -> impl Iterator<Item = &AdaptationSet> {
        self.periods.iter().flat_map(|p| p.adaptation_sets.iter())
    }

    pub fn representations(&self) -> impl Iterator<Item = &Representation> {
        self.adaptation_sets()
            .flat_map(|set| set.representations.iter())
    }

    pub fn representation(&self, id: &str) -> Option<&Representation> {
        self.representations().find(|rep| rep.id == id)
    }

    pub fn representation_mut(&mut self, id: &str) -> Option<&mut Representation> {
        self.periods
            .iter_mut()
            .flat_map(|p| p.adaptation_sets.iter_mut())
            .flat_map(|set| set.representations.iter_mut())
            .find(|rep| rep.id == id)
    }

    /// Fold a representation's pass total into the playlist duration.
    ///
    /// Live pins the duration to zero; otherwise it only grows.
    pub fn account_duration(&mut self, total: Duration, live: bool) {
        if live {
            self.duration = Duration::ZERO;
        } else if total > self.duration {
            self.duration = total;
        }
    }

    /// Log the playlist tree at debug level.
    pub fn debug_dump(&self) {
        debug!(
            kind = ?self.kind,
            url = ?self.url,
            duration = ?self.duration,
            start = ?self.presentation_start_offset,
            "playlist"
        );
        for set in self.adaptation_sets() {
            debug!(
                id = %set.id,
                role = ?set.role,
                lang = ?set.language,
                representations = set.representations.len(),
                "  adaptation set"
            );
            for rep in &set.representations {
                debug!(
                    id = %rep.id,
                    bandwidth = rep.bandwidth,
                    codecs = ?rep.codecs,
                    live = rep.live,
                    segments = rep.segments().len(),
                    "    representation"
                );
            }
        }
    }
}
