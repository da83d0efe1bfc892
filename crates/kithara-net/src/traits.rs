use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::{
    error::NetResult,
    retry::{DefaultRetryPolicy, RetryNet},
    timeout::TimeoutNet,
    types::{Headers, RetryPolicy},
};

#[async_trait]
pub trait Net: Send + Sync {
    /// Get the whole body of `url`.
    async fn get_bytes(&self, url: Url, headers: Option<Headers>) -> NetResult<Bytes>;
}

#[async_trait]
impl<N: Net + ?Sized> Net for Arc<N> {
    async fn get_bytes(&self, url: Url, headers: Option<Headers>) -> NetResult<Bytes> {
        (**self).get_bytes(url, headers).await
    }
}

pub trait NetExt: Net + Sized {
    /// Bound every request by `timeout`.
    fn with_timeout(self, timeout: Duration) -> TimeoutNet<Self> {
        TimeoutNet::new(self, timeout)
    }

    /// Retry retryable failures according to `policy`.
    fn with_retry(self, policy: RetryPolicy) -> RetryNet<Self, DefaultRetryPolicy> {
        RetryNet::new(self, DefaultRetryPolicy::new(policy))
    }
}

impl<T: Net> NetExt for T {}
