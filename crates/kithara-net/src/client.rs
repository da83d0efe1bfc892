use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::trace;
use url::Url;

use crate::{
    error::{NetError, NetResult},
    traits::Net,
    types::{Headers, NetOptions},
};

#[derive(Clone, Debug)]
pub struct HttpClient {
    inner: Client,
    options: NetOptions,
}

impl HttpClient {
    /// # Errors
    ///
    /// Returns [`NetError::Http`] if the TLS backend cannot be initialised.
    pub fn new(options: NetOptions) -> NetResult<Self> {
        let inner = Client::builder()
            .pool_max_idle_per_host(options.pool_max_idle_per_host)
            .build()
            .map_err(|e| NetError::http(e.to_string()))?;
        Ok(Self { inner, options })
    }

    pub fn options(&self) -> &NetOptions {
        &self.options
    }
}

#[async_trait]
impl Net for HttpClient {
    async fn get_bytes(&self, url: Url, headers: Option<Headers>) -> NetResult<Bytes> {
        let mut req = self
            .inner
            .get(url.clone())
            .timeout(self.options.request_timeout);
        if let Some(headers) = headers {
            for (k, v) in headers.iter() {
                req = req.header(k, v);
            }
        }

        let resp = req.send().await?;
        let status = resp.status();
        trace!(url = %url, status = status.as_u16(), "response");

        if !status.is_success() {
            return Err(NetError::http_status(status.as_u16(), url.to_string()));
        }

        Ok(resp.bytes().await?)
    }
}
