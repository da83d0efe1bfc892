//! Initial load and live refresh of representation segment lists.

use std::{sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    HlsError, HlsResult,
    builder::BuildReport,
    config::HlsConfig,
    events::EventEmitter,
    model::{MICROS_PER_SEC, Playlist, Representation},
    parser::PlaylistParser,
    retrieve::Retrieve,
    tags::Tag,
    tokenizer,
};

/// Playlist shared between the refresh loop and its readers.
///
/// The lock is held for a whole build-and-append, which serializes updates
/// per representation.
pub type SharedPlaylist = Arc<Mutex<Playlist>>;

/// Fetches playlists and feeds them through the segment list builder.
pub struct RefreshDriver<R> {
    retrieve: R,
    parser: PlaylistParser,
    events: EventEmitter,
    live_window: Option<usize>,
    min_refresh_interval: Duration,
    cancel: CancellationToken,
}

impl<R: Retrieve> RefreshDriver<R> {
    pub fn new(retrieve: R, parser: PlaylistParser) -> Self {
        Self {
            retrieve,
            parser,
            events: EventEmitter::default(),
            live_window: None,
            min_refresh_interval: Duration::from_secs(1),
            cancel: CancellationToken::new(),
        }
    }

    pub fn from_config(retrieve: R, config: &HlsConfig) -> Self {
        Self {
            retrieve,
            parser: PlaylistParser::from_config(config),
            events: EventEmitter::from_config(config),
            live_window: config.live_window,
            min_refresh_interval: config.min_refresh_interval,
            cancel: config.cancel.clone().unwrap_or_default(),
        }
    }

    pub fn with_parser(mut self, parser: PlaylistParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_events(mut self, events: EventEmitter) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    pub fn parser(&self) -> &PlaylistParser {
        &self.parser
    }

    /// Token from the config, or a fresh one owned by this driver.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Fetch and parse the top-level playlist.
    pub async fn open(&self, url: &str) -> HlsResult<Playlist> {
        let bytes = self.retrieve.retrieve(url).await?;
        let playlist = self.parser.parse(&bytes, url)?;
        self.events.emit_playlist_parsed(
            url,
            playlist.is_master(),
            playlist.representations().count(),
        );
        Ok(playlist)
    }

    /// First parse of a representation declared by a master playlist.
    pub async fn load(&self, playlist: &mut Playlist, rep_id: &str) -> HlsResult<BuildReport> {
        let url = playlist_url_of(playlist, rep_id)?;
        let tags = self.fetch_tags(&url).await?;
        self.apply(playlist, rep_id, &tags, true)
    }

    /// Re-fetch a representation and append what is new.
    ///
    /// A failed fetch or an unparsable body leaves the current list untouched
    /// and returns `Ok(None)`; only an unknown representation is an error.
    pub async fn refresh(
        &self,
        playlist: &mut Playlist,
        rep_id: &str,
    ) -> HlsResult<Option<BuildReport>> {
        let url = playlist_url_of(playlist, rep_id)?;
        match self.fetch_tags(&url).await {
            Ok(tags) => self.apply(playlist, rep_id, &tags, false).map(Some),
            Err(e) => {
                self.refresh_failed(rep_id, &e);
                Ok(None)
            }
        }
    }

    /// Refresh a representation that is not part of a playlist tree.
    pub async fn refresh_representation(&self, rep: &mut Representation) -> Option<BuildReport> {
        match self.fetch_tags(&rep.playlist_url).await {
            Ok(tags) => {
                let was_live = rep.live;
                let report = self.parser.builder().build(rep, &tags, false);
                self.after_update(rep, &report, was_live);
                Some(report)
            }
            Err(e) => {
                self.refresh_failed(&rep.id, &e);
                None
            }
        }
    }

    /// Keep `rep_id` fresh until it stops being live or the driver's token
    /// (see [`Self::cancel_token`]) fires.
    ///
    /// Loads the representation first if it has never been parsed. Fetches run
    /// without the playlist lock; building and appending hold it.
    pub async fn run(&self, playlist: SharedPlaylist, rep_id: &str) -> HlsResult<()> {
        let mut first = {
            let guard = playlist.lock().await;
            !representation(&guard, rep_id)?.loaded
        };

        loop {
            let (url, live, interval) = {
                let guard = playlist.lock().await;
                let rep = representation(&guard, rep_id)?;
                (rep.playlist_url.clone(), rep.live, self.refresh_interval(rep))
            };

            if !first {
                if !live {
                    debug!(representation = rep_id, "representation is no longer live");
                    return Ok(());
                }
                tokio::select! {
                    _ = self.cancel.cancelled() => return Err(HlsError::Cancelled),
                    _ = tokio::time::sleep(interval) => {}
                }
            }

            let fetched = tokio::select! {
                _ = self.cancel.cancelled() => return Err(HlsError::Cancelled),
                fetched = self.fetch_tags(&url) => fetched,
            };

            match fetched {
                Ok(tags) => {
                    let mut guard = playlist.lock().await;
                    self.apply(&mut guard, rep_id, &tags, first)?;
                    first = false;
                }
                Err(e) if first => return Err(e),
                Err(e) => self.refresh_failed(rep_id, &e),
            }
        }
    }

    /// `max(target duration, floor)`.
    pub fn refresh_interval(&self, rep: &Representation) -> Duration {
        Duration::from_micros(rep.target_duration.saturating_mul(MICROS_PER_SEC))
            .max(self.min_refresh_interval)
    }

    async fn fetch_tags(&self, url: &str) -> HlsResult<Vec<Tag>> {
        let bytes = self.retrieve.retrieve(url).await?;
        let text = std::str::from_utf8(&bytes)
            .map_err(|e| HlsError::PlaylistParse(format!("Invalid UTF-8: {e}")))?;
        tokenizer::tokenize(text)
    }

    fn apply(
        &self,
        playlist: &mut Playlist,
        rep_id: &str,
        tags: &[Tag],
        first: bool,
    ) -> HlsResult<BuildReport> {
        let builder = self.parser.builder();
        let rep = playlist
            .representation_mut(rep_id)
            .ok_or_else(|| HlsError::RepresentationNotFound(rep_id.to_string()))?;

        // A first parse has nothing to end.
        let was_live = rep.live && !first;
        let report = builder.build(rep, tags, first);
        self.after_update(rep, &report, was_live);
        playlist.account_duration(report.total_duration, report.live);
        Ok(report)
    }

    fn after_update(&self, rep: &mut Representation, report: &BuildReport, was_live: bool) {
        if rep.live
            && let Some(max) = self.live_window
        {
            let pruned = rep.prune_segments(max);
            if pruned > 0 {
                debug!(representation = %rep.id, pruned, "live window trimmed");
            }
        }

        let interval = self.refresh_interval(rep);
        rep.schedule_next_update(interval, !rep.live);

        self.events
            .emit_segments_appended(&rep.id, report.appended, rep.segments().len());
        if was_live && !rep.live {
            self.events.emit_end_of_stream(&rep.id);
        }
    }

    fn refresh_failed(&self, rep_id: &str, error: &HlsError) {
        warn!(representation = rep_id, error = %error, "playlist refresh failed; keeping previous list");
        self.events.emit_refresh_failed(rep_id, &error.to_string());
    }
}

fn representation<'a>(playlist: &'a Playlist, rep_id: &str) -> HlsResult<&'a Representation> {
    playlist
        .representation(rep_id)
        .ok_or_else(|| HlsError::RepresentationNotFound(rep_id.to_string()))
}

fn playlist_url_of(playlist: &Playlist, rep_id: &str) -> HlsResult<String> {
    representation(playlist, rep_id).map(|rep| rep.playlist_url.clone())
}
