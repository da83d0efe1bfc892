#![forbid(unsafe_code)]

use std::{collections::HashMap, sync::Arc, time::Duration};

use bytes::Bytes;
use kithara_net::NetOptions;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{error::HlsResult, events::HlsEvent, model::Timescale};

#[derive(Clone, Debug)]
pub struct KeyContext {
    pub iv: Option<[u8; 16]>,
    pub url: Url,
}

/// Callback for processing encryption keys.
pub type KeyProcessor = Arc<dyn Fn(Bytes, KeyContext) -> HlsResult<Bytes> + Send + Sync>;

/// Encryption key handling configuration.
#[derive(Clone, Default)]
pub struct KeyOptions {
    /// Callback for processing (e.g. unwrapping) raw key bytes after fetch.
    pub key_processor: Option<KeyProcessor>,
    /// Query parameters to append to key URLs.
    pub query_params: Option<HashMap<String, String>>,
    /// Headers to include in key requests.
    pub request_headers: Option<HashMap<String, String>>,
}

impl std::fmt::Debug for KeyOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyOptions")
            .field(
                "key_processor",
                &self.key_processor.as_ref().map(|_| "KeyProcessor"),
            )
            .field("query_params", &self.query_params)
            .field("request_headers", &self.request_headers)
            .finish()
    }
}

impl KeyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set query parameters to append to key URLs.
    pub fn with_query_params(mut self, params: HashMap<String, String>) -> Self {
        self.query_params = Some(params);
        self
    }

    /// Set headers to include in key requests.
    pub fn with_request_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.request_headers = Some(headers);
        self
    }

    /// Set callback for processing raw key bytes after fetch.
    pub fn with_key_processor(mut self, processor: KeyProcessor) -> Self {
        self.key_processor = Some(processor);
        self
    }
}

/// Configuration for playlist ingestion.
#[derive(Clone)]
pub struct HlsConfig {
    /// Cancellation token for the refresh loop.
    pub cancel: Option<CancellationToken>,
    /// Capacity of the events broadcast channel (used when `events_tx` is not provided).
    pub events_channel_capacity: usize,
    /// Events broadcast sender (optional - if not provided, one is created internally).
    pub events_tx: Option<broadcast::Sender<HlsEvent>>,
    /// Encryption key handling configuration.
    pub keys: KeyOptions,
    /// Keep at most this many segments per live representation.
    ///
    /// `None` lets the visible list grow for the lifetime of the stream.
    pub live_window: Option<usize>,
    /// Honour `EXT-X-PART-INF` / `EXT-X-PART` (LL-HLS).
    pub ll_hls: bool,
    /// Lower bound for the live refresh period.
    pub min_refresh_interval: Duration,
    /// Network configuration.
    pub net: NetOptions,
    /// Ticks per second for segment times.
    pub timescale: Timescale,
    /// Playlist URL (master or media).
    pub url: Url,
}

impl std::fmt::Debug for HlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HlsConfig")
            .field("url", &self.url.as_str())
            .field("ll_hls", &self.ll_hls)
            .field("timescale", &self.timescale)
            .field("live_window", &self.live_window)
            .field("min_refresh_interval", &self.min_refresh_interval)
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

impl HlsConfig {
    /// Create new config for a playlist URL.
    pub fn new(url: Url) -> Self {
        Self {
            cancel: None,
            events_channel_capacity: 32,
            events_tx: None,
            keys: KeyOptions::default(),
            live_window: None,
            ll_hls: false,
            min_refresh_interval: Duration::from_secs(1),
            net: NetOptions::default(),
            timescale: Timescale::default(),
            url,
        }
    }

    /// Enable LL-HLS partial segment handling.
    pub fn with_ll_hls(mut self, enabled: bool) -> Self {
        self.ll_hls = enabled;
        self
    }

    pub fn with_timescale(mut self, timescale: Timescale) -> Self {
        self.timescale = timescale;
        self
    }

    /// Set network options.
    pub fn with_net(mut self, net: NetOptions) -> Self {
        self.net = net;
        self
    }

    /// Set key handling options.
    pub fn with_keys(mut self, keys: KeyOptions) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_live_window(mut self, max_segments: usize) -> Self {
        self.live_window = Some(max_segments);
        self
    }

    /// Set the minimum delay between two live refreshes.
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Set cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Set events broadcast sender.
    pub fn with_events(mut self, events_tx: broadcast::Sender<HlsEvent>) -> Self {
        self.events_tx = Some(events_tx);
        self
    }

    /// Set events broadcast channel capacity.
    pub fn with_events_channel_capacity(mut self, capacity: usize) -> Self {
        self.events_channel_capacity = capacity;
        self
    }
}
