//! `EXT-X-KEY` / `EXT-X-SESSION-KEY` handling and URL path helpers.

use hls_m3u8::types::EncryptionMethod as HlsEncryptionMethod;
use url::Url;

use crate::tags::Tag;

/// Supported segment encryption methods.
///
/// Anything other than AES-128 is treated as no encryption.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EncryptionMethod {
    #[default]
    None,
    /// AES-128 CBC of the whole segment.
    Aes128,
}

/// Sticky encryption context attached to segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommonEncryption {
    pub method: EncryptionMethod,
    /// Absolute (or directory-prefixed) key URI.
    pub uri: String,
    /// Initialization vector; empty when the playlist omits `IV`.
    pub iv: Vec<u8>,
}

impl CommonEncryption {
    pub fn is_encrypted(&self) -> bool {
        self.method != EncryptionMethod::None
    }
}

/// Build the encryption context described by a key tag.
///
/// Only `METHOD=AES-128` with a `URI` is recognised. A scheme-less key URI is
/// prefixed with the playlist directory by plain string concatenation rather
/// than full RFC 3986 resolution.
pub fn resolve_encryption(tag: &Tag, playlist_url: &str) -> CommonEncryption {
    let Some(key) = tag.decryption_key() else {
        return CommonEncryption::default();
    };
    if !matches!(key.method, HlsEncryptionMethod::Aes128) {
        return CommonEncryption::default();
    }

    let mut key_uri = key.uri().trim().to_string();
    if !has_scheme(&key_uri) {
        key_uri = format!("{}/{}", directory_of(playlist_url), key_uri);
    }

    CommonEncryption {
        method: EncryptionMethod::Aes128,
        uri: key_uri,
        iv: key.iv.to_slice().map(Vec::from).unwrap_or_default(),
    }
}

/// Everything before the last `/`, or the input itself when it has none.
pub fn directory_of(url: &str) -> &str {
    url.rfind('/').map_or(url, |pos| &url[..pos])
}

/// `true` for `scheme://...` style references.
pub fn has_scheme(url: &str) -> bool {
    let Some((scheme, _)) = url.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Resolve `rel` against `base`.
///
/// Uses RFC 3986 resolution when `base` is an absolute URL and falls back to
/// concatenation otherwise.
pub fn join_relative(base: &str, rel: &str) -> String {
    if has_scheme(rel) {
        return rel.to_string();
    }
    match Url::parse(base).and_then(|base| base.join(rel)) {
        Ok(url) => url.to_string(),
        Err(_) => format!("{base}{rel}"),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const PLAYLIST: &str = "https://cdn.example.com/live/stream/index.m3u8";

    fn key_tag(blob: &str) -> Tag {
        Tag::from_name("EXT-X-KEY", blob).unwrap()
    }

    #[test]
    fn relative_key_uri_is_prefixed_with_playlist_directory() {
        let enc = resolve_encryption(&key_tag(r#"METHOD=AES-128,URI="key.bin""#), PLAYLIST);

        assert_eq!(enc.method, EncryptionMethod::Aes128);
        assert_eq!(enc.uri, "https://cdn.example.com/live/stream/key.bin");
        assert!(enc.iv.is_empty());
    }

    #[test]
    fn absolute_key_uri_and_iv() {
        let enc = resolve_encryption(
            &key_tag(r#"METHOD=AES-128,URI="https://keys.example.com/k1",IV=0x000102030405060708090A0B0C0D0E0F"#),
            PLAYLIST,
        );

        assert_eq!(enc.uri, "https://keys.example.com/k1");
        assert_eq!(enc.iv, (0u8..16).collect::<Vec<_>>());
    }

    #[rstest]
    #[case("METHOD=NONE")]
    #[case(r#"METHOD=SAMPLE-AES,URI="skd://key""#)]
    #[case("METHOD=AES-128")]
    fn unsupported_or_incomplete_keys_mean_no_encryption(#[case] blob: &str) {
        let enc = resolve_encryption(&key_tag(blob), PLAYLIST);
        assert_eq!(enc, CommonEncryption::default());
        assert!(!enc.is_encrypted());
    }

    #[rstest]
    #[case("http://a/b/c.m3u8", "http://a/b")]
    #[case("c.m3u8", "c.m3u8")]
    #[case("dir/c.m3u8", "dir")]
    fn directory_of_cuts_at_last_slash(#[case] url: &str, #[case] dir: &str) {
        assert_eq!(directory_of(url), dir);
    }

    #[rstest]
    #[case("https://x/y", true)]
    #[case("skd://key", true)]
    #[case("key.bin", false)]
    #[case("/abs/key.bin", false)]
    #[case("://broken", false)]
    fn scheme_detection(#[case] url: &str, #[case] expected: bool) {
        assert_eq!(has_scheme(url), expected);
    }

    #[rstest]
    #[case("http://a/b/", "seg.ts", "http://a/b/seg.ts")]
    #[case("http://a/b/", "/root.ts", "http://a/root.ts")]
    #[case("http://a/b/", "http://c/d.ts", "http://c/d.ts")]
    #[case("local/", "seg.ts", "local/seg.ts")]
    fn join_relative_resolves(#[case] base: &str, #[case] rel: &str, #[case] expected: &str) {
        assert_eq!(join_relative(base, rel), expected);
    }
}
