use tokio::sync::broadcast;

use crate::config::HlsConfig;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HlsEvent {
    PlaylistParsed {
        url: String,
        master: bool,
        representations: usize,
    },
    SegmentsAppended {
        representation: String,
        appended: usize,
        total: usize,
    },
    RefreshFailed {
        representation: String,
        error: String,
    },
    KeyFetch {
        key_url: String,
        success: bool,
        cached: bool,
    },
    /// A live representation turned VOD (`EXT-X-ENDLIST`).
    EndOfStream {
        representation: String,
    },
}

#[derive(Clone, Debug)]
pub struct EventEmitter {
    tx: broadcast::Sender<HlsEvent>,
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(128)
    }
}

impl EventEmitter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn from_sender(tx: broadcast::Sender<HlsEvent>) -> Self {
        Self { tx }
    }

    /// Reuse the configured sender or open a channel of the configured capacity.
    pub fn from_config(config: &HlsConfig) -> Self {
        match &config.events_tx {
            Some(tx) => Self::from_sender(tx.clone()),
            None => Self::new(config.events_channel_capacity),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HlsEvent> {
        self.tx.subscribe()
    }

    pub fn emit_playlist_parsed(&self, url: &str, master: bool, representations: usize) {
        let _ = self.tx.send(HlsEvent::PlaylistParsed {
            url: url.to_string(),
            master,
            representations,
        });
    }

    pub fn emit_segments_appended(&self, representation: &str, appended: usize, total: usize) {
        let _ = self.tx.send(HlsEvent::SegmentsAppended {
            representation: representation.to_string(),
            appended,
            total,
        });
    }

    pub fn emit_refresh_failed(&self, representation: &str, error: &str) {
        let _ = self.tx.send(HlsEvent::RefreshFailed {
            representation: representation.to_string(),
            error: error.to_string(),
        });
    }

    pub fn emit_key_fetch(&self, key_url: &str, success: bool, cached: bool) {
        let _ = self.tx.send(HlsEvent::KeyFetch {
            key_url: key_url.to_string(),
            success,
            cached,
        });
    }

    pub fn emit_end_of_stream(&self, representation: &str) {
        let _ = self.tx.send(HlsEvent::EndOfStream {
            representation: representation.to_string(),
        });
    }
}
