use std::{collections::HashMap, sync::Arc};

use bytes::Bytes;
use kithara_net::{Headers, Net};
use parking_lot::Mutex;
use tokio::{runtime::Handle, sync::OnceCell};
use tracing::{debug, warn};
use url::Url;

use crate::{
    HlsError, HlsResult,
    config::{KeyContext, KeyOptions},
    events::EventEmitter,
};

/// Decryption key store consulted by the parser.
pub trait Keyring: Send + Sync {
    /// Start fetching `uri` in the background; never blocks.
    fn prefetch(&self, uri: &str);
}

/// AES-128 key size in bytes.
const KEY_LEN: usize = 16;

/// Fetches, post-processes and caches AES-128 keys.
pub struct KeyManager<N> {
    inner: Arc<Inner<N>>,
}

struct Inner<N> {
    net: N,
    options: KeyOptions,
    events: Option<EventEmitter>,
    /// One cell per key URI; concurrent callers wait on the same fetch.
    cache: Mutex<HashMap<String, Arc<OnceCell<Bytes>>>>,
}

impl<N> Clone for KeyManager<N> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<N: Net + 'static> KeyManager<N> {
    pub fn new(net: N, options: KeyOptions, events: Option<EventEmitter>) -> Self {
        Self {
            inner: Arc::new(Inner {
                net,
                options,
                events,
                cache: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Key bytes already fetched for `uri`.
    pub fn cached(&self, uri: &str) -> Option<Bytes> {
        self.inner
            .cache
            .lock()
            .get(uri)
            .and_then(|cell| cell.get().cloned())
    }

    /// Fetch `uri` once and serve later calls from the cache.
    ///
    /// Callers racing on the same URI share one request. Failures are not
    /// cached; the next caller retries.
    pub async fn get_key(&self, uri: &str, iv: Option<[u8; 16]>) -> HlsResult<Bytes> {
        let cell = self
            .inner
            .cache
            .lock()
            .entry(uri.to_string())
            .or_default()
            .clone();

        let mut fetched = false;
        let result = cell
            .get_or_try_init(|| {
                fetched = true;
                self.load_key(uri, iv)
            })
            .await
            .cloned();

        match result {
            Ok(key) => {
                self.emit_key_fetch(uri, true, !fetched);
                Ok(key)
            }
            Err(e) => {
                self.emit_key_fetch(uri, false, false);
                Err(e)
            }
        }
    }

    async fn load_key(&self, uri: &str, iv: Option<[u8; 16]>) -> HlsResult<Bytes> {
        let url = Url::parse(uri)?;
        let raw = self.fetch_raw_key(&url).await?;
        self.process_key(raw, url, iv)
    }

    async fn fetch_raw_key(&self, url: &Url) -> HlsResult<Bytes> {
        let mut fetch_url = url.clone();

        if let Some(ref params) = self.inner.options.query_params {
            let mut pairs = fetch_url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }

        let headers: Option<Headers> = self
            .inner
            .options
            .request_headers
            .clone()
            .map(Headers::from);

        debug!(url = %fetch_url, "fetching key");
        Ok(self.inner.net.get_bytes(fetch_url, headers).await?)
    }

    fn process_key(&self, key: Bytes, url: Url, iv: Option<[u8; 16]>) -> HlsResult<Bytes> {
        let context = KeyContext { url, iv };

        let key = match self.inner.options.key_processor {
            Some(ref processor) => processor(key, context)?,
            None => key,
        };

        if key.len() != KEY_LEN {
            return Err(HlsError::KeyProcessing(format!(
                "invalid AES-128 key length: {}",
                key.len()
            )));
        }
        Ok(key)
    }

    fn emit_key_fetch(&self, uri: &str, success: bool, cached: bool) {
        if let Some(ref events) = self.inner.events {
            events.emit_key_fetch(uri, success, cached);
        }
    }
}

impl<N: Net + 'static> Keyring for KeyManager<N> {
    fn prefetch(&self, uri: &str) {
        let Ok(handle) = Handle::try_current() else {
            warn!(uri, "no async runtime; key prefetch skipped");
            return;
        };

        let manager = self.clone();
        let uri = uri.to_string();
        handle.spawn(async move {
            if let Err(e) = manager.get_key(&uri, None).await {
                warn!(uri = %uri, error = %e, "key prefetch failed");
            }
        });
    }
}
