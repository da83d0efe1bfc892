use std::{cmp::min, collections::HashMap, time::Duration};

/// Extra request headers, applied in insertion-independent order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Headers {
    inner: HashMap<String, String>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.inner.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl From<HashMap<String, String>> for Headers {
    fn from(map: HashMap<String, String>) -> Self {
        Self { inner: map }
    }
}

/// Exponential backoff settings.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// Delay before retry number `attempt` (0 is the initial request).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        min(self.base_delay.saturating_mul(factor), self.max_delay)
    }
}

#[derive(Clone, Debug)]
pub struct NetOptions {
    /// Whole-request timeout for playlist and key fetches.
    pub request_timeout: Duration,
    pub retry_policy: RetryPolicy,
    /// Max idle connections per host. Zero disables pooling.
    pub pool_max_idle_per_host: usize,
}

impl Default for NetOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            retry_policy: RetryPolicy::default(),
            pool_max_idle_per_host: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0, Duration::ZERO)]
    #[case(1, Duration::from_millis(100))]
    #[case(2, Duration::from_millis(200))]
    #[case(4, Duration::from_millis(800))]
    #[case(10, Duration::from_secs(5))]
    #[case(u32::MAX, Duration::from_secs(5))]
    fn backoff_doubles_and_caps(#[case] attempt: u32, #[case] expected: Duration) {
        assert_eq!(RetryPolicy::default().delay_for_attempt(attempt), expected);
    }

    #[test]
    fn headers_from_map() {
        let mut map = HashMap::new();
        map.insert("Authorization".to_string(), "Bearer x".to_string());
        let headers = Headers::from(map);

        assert!(!headers.is_empty());
        assert_eq!(headers.get("Authorization"), Some("Bearer x"));
        assert_eq!(headers.get("authorization"), None);
        assert_eq!(headers.iter().count(), 1);
    }
}
