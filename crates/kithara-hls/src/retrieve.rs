use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use kithara_net::Net;
use tracing::trace;
use url::Url;

use crate::HlsResult;

/// Fetches playlist bytes.
#[async_trait]
pub trait Retrieve: Send + Sync {
    async fn retrieve(&self, url: &str) -> HlsResult<Bytes>;
}

#[async_trait]
impl<R: Retrieve + ?Sized> Retrieve for Arc<R> {
    async fn retrieve(&self, url: &str) -> HlsResult<Bytes> {
        (**self).retrieve(url).await
    }
}

/// [`Retrieve`] over any `kithara-net` client.
#[derive(Clone, Debug)]
pub struct NetRetrieve<N> {
    net: N,
}

impl<N: Net> NetRetrieve<N> {
    pub fn new(net: N) -> Self {
        Self { net }
    }

    pub fn net(&self) -> &N {
        &self.net
    }
}

#[async_trait]
impl<N: Net> Retrieve for NetRetrieve<N> {
    async fn retrieve(&self, url: &str) -> HlsResult<Bytes> {
        let url = Url::parse(url)?;
        trace!(url = %url, "retrieving playlist");
        Ok(self.net.get_bytes(url, None).await?)
    }
}
