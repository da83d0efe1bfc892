use thiserror::Error;

/// Errors produced while retrieving bytes.
#[derive(Debug, Error, Clone)]
pub enum NetError {
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("Timeout")]
    Timeout,
    #[error("Request failed after {max_retries} retries: {source}")]
    RetryExhausted {
        max_retries: u32,
        source: Box<NetError>,
    },
    #[error("HTTP {status} for URL: {url}")]
    HttpStatus { status: u16, url: String },
}

impl NetError {
    pub fn http_status(status: u16, url: String) -> Self {
        Self::HttpStatus { status, url }
    }

    pub fn http<S: Into<String>>(msg: S) -> Self {
        Self::Http(msg.into())
    }

    /// Whether another attempt may succeed.
    ///
    /// Transport failures and timeouts are retryable, as are 5xx, 408 and 429
    /// responses.
    pub fn is_retryable(&self) -> bool {
        match self {
            NetError::Http(message) => {
                let message = message.to_ascii_lowercase();
                message.contains("timeout")
                    || message.contains("connection")
                    || message.contains("network")
            }
            NetError::Timeout => true,
            NetError::RetryExhausted { .. } => false,
            NetError::HttpStatus { status, .. } => {
                *status >= 500 || *status == 429 || *status == 408
            }
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, NetError::Timeout)
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            NetError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for NetError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return Self::Timeout;
        }
        Self::Http(error.to_string())
    }
}

pub type NetResult<T> = Result<T, NetError>;

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::timeout(NetError::Timeout, true)]
    #[case::server_error(NetError::http_status(503, "http://a/".into()), true)]
    #[case::throttled(NetError::http_status(429, "http://a/".into()), true)]
    #[case::not_found(NetError::http_status(404, "http://a/".into()), false)]
    #[case::connection(NetError::http("Connection reset by peer"), true)]
    #[case::bad_body(NetError::http("invalid chunk"), false)]
    #[case::exhausted(
        NetError::RetryExhausted { max_retries: 3, source: Box::new(NetError::Timeout) },
        false
    )]
    fn retryable_classification(#[case] error: NetError, #[case] expected: bool) {
        assert_eq!(error.is_retryable(), expected);
    }

    #[test]
    fn status_code_only_for_status_errors() {
        assert_eq!(
            NetError::http_status(500, "http://a/".into()).status_code(),
            Some(500)
        );
        assert_eq!(NetError::Timeout.status_code(), None);
        assert!(NetError::Timeout.is_timeout());
    }
}
