#![forbid(unsafe_code)]

//! Byte retrieval over HTTP.
//!
//! [`Net`] is the seam the playlist layer fetches through; [`HttpClient`] is the
//! reqwest-backed implementation and [`NetExt`] stacks timeout and retry
//! decorators on top of any implementation.

mod client;
mod error;
mod retry;
mod timeout;
mod traits;
mod types;

pub use crate::{
    client::HttpClient,
    error::{NetError, NetResult},
    retry::{DefaultRetryPolicy, RetryNet, RetryPolicyTrait},
    timeout::TimeoutNet,
    traits::{Net, NetExt},
    types::{Headers, NetOptions, RetryPolicy},
};
