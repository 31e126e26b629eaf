//! Magnet URIs: `magnet:?xt=urn:btih:<hash>&dn=<name>&tr=<tracker>...`

use crate::error::{BittorrentError, Result};
use crate::hash::{Hash, HASH_SIZE};
use data_encoding::BASE32;
use std::fmt;
use std::str::FromStr;
use url::form_urlencoded;
use url::Url;

const SCHEME: &str = "magnet";
const XT_PREFIX: &str = "urn:btih:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Magnet {
    pub info_hash: Hash,
    pub trackers: Vec<String>,
    pub display_name: Option<String>,
    /// Query parameters other than xt, dn and tr, in the order they appeared
    pub params: Vec<(String, String)>,
}

impl Magnet {
    pub fn new(info_hash: Hash) -> Self {
        Self {
            info_hash,
            trackers: Vec::new(),
            display_name: None,
            params: Vec::new(),
        }
    }

    pub fn parse(uri: &str) -> Result<Self> {
        let url = Url::parse(uri)?;
        if url.scheme() != SCHEME {
            return Err(BittorrentError::InvalidMagnet(format!(
                "unexpected scheme {:?}",
                url.scheme()
            )));
        }

        let mut info_hash = None;
        let mut trackers = Vec::new();
        let mut display_name = None;
        let mut params = Vec::new();

        for (key, value) in url.query_pairs() {
            match &*key {
                "xt" if info_hash.is_none() => info_hash = Some(parse_exact_topic(&value)?),
                "tr" => trackers.push(value.into_owned()),
                "dn" => {
                    display_name.get_or_insert_with(|| value.into_owned());
                }
                _ => params.push((key.into_owned(), value.into_owned())),
            }
        }

        let info_hash = info_hash
            .ok_or_else(|| BittorrentError::InvalidMagnet("missing xt parameter".to_string()))?;

        Ok(Self {
            info_hash,
            trackers,
            display_name,
            params,
        })
    }
}

// "urn:btih:" followed by 40 hex or 32 base32 characters
fn parse_exact_topic(xt: &str) -> Result<Hash> {
    let encoded = xt.strip_prefix(XT_PREFIX).ok_or_else(|| {
        BittorrentError::InvalidMagnet(format!("bad xt parameter {:?}", xt))
    })?;

    match encoded.len() {
        40 => Hash::from_hex(encoded).map_err(|e| BittorrentError::InvalidMagnet(e.to_string())),
        32 => {
            let bytes = BASE32
                .decode(encoded.to_ascii_uppercase().as_bytes())
                .map_err(|e| BittorrentError::InvalidMagnet(format!("bad base32 hash: {}", e)))?;
            Hash::from_slice(&bytes)
        }
        n => Err(BittorrentError::InvalidMagnet(format!(
            "info hash must be {} hex or 32 base32 characters, got {}",
            HASH_SIZE * 2,
            n
        ))),
    }
}

impl FromStr for Magnet {
    type Err = BittorrentError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Magnet {
    // Some clients only accept xt first and unescaped, so it is written by hand
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:?xt={}{}", SCHEME, XT_PREFIX, self.info_hash)?;

        let mut query = form_urlencoded::Serializer::new(String::new());
        for tracker in &self.trackers {
            query.append_pair("tr", tracker);
        }
        if let Some(name) = &self.display_name {
            query.append_pair("dn", name);
        }
        for (key, value) in &self.params {
            query.append_pair(key, value);
        }

        let rest = query.finish();
        if !rest.is_empty() {
            write!(f, "&{}", rest)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX: &str = "0123456789abcdef0123456789abcdef01234567";

    #[test]
    fn test_parse_and_format() {
        let uri = format!("magnet:?xt=urn:btih:{}&dn=test&tr=http://a/announce", HEX);
        let magnet: Magnet = uri.parse().unwrap();
        assert_eq!(magnet.info_hash.hex_string(), HEX);
        assert_eq!(magnet.display_name.as_deref(), Some("test"));
        assert_eq!(magnet.trackers, vec!["http://a/announce"]);
        assert!(magnet.params.is_empty());

        let formatted = magnet.to_string();
        assert!(formatted.starts_with(&format!("magnet:?xt=urn:btih:{}&", HEX)));
        assert_eq!(Magnet::parse(&formatted).unwrap(), magnet);
    }

    #[test]
    fn test_base32_hash() {
        let hash = Hash::from_hex(HEX).unwrap();
        let encoded = BASE32.encode(hash.as_bytes());
        assert_eq!(encoded.len(), 32);

        let magnet = Magnet::parse(&format!("magnet:?xt=urn:btih:{}", encoded)).unwrap();
        assert_eq!(magnet.info_hash, hash);

        let lower = Magnet::parse(&format!(
            "magnet:?xt=urn:btih:{}",
            encoded.to_ascii_lowercase()
        ))
        .unwrap();
        assert_eq!(lower.info_hash, hash);
    }

    #[test]
    fn test_duplicate_and_extra_params() {
        let uri = format!(
            "magnet:?xt=urn:btih:{}&dn=first&dn=second&tr=udp://b:80&tr=http://a&tr=udp://b:80&x.pe=1.2.3.4:5&ws=http%3A%2F%2Fseed",
            HEX
        );
        let magnet = Magnet::parse(&uri).unwrap();
        assert_eq!(magnet.display_name.as_deref(), Some("first"));
        assert_eq!(magnet.trackers, vec!["udp://b:80", "http://a", "udp://b:80"]);
        assert_eq!(
            magnet.params,
            vec![
                ("x.pe".to_string(), "1.2.3.4:5".to_string()),
                ("ws".to_string(), "http://seed".to_string()),
            ]
        );
        assert_eq!(Magnet::parse(&magnet.to_string()).unwrap(), magnet);
    }

    #[test]
    fn test_bare_magnet_formatting() {
        let magnet = Magnet::new(Hash::new([0xab; 20]));
        assert_eq!(magnet.to_string(), format!("magnet:?xt=urn:btih:{}", "ab".repeat(20)));
    }

    #[test]
    fn test_rejects_bad_uris() {
        let bad = [
            format!("http://x/?xt=urn:btih:{}", HEX),
            "magnet:?dn=nohash".to_string(),
            format!("magnet:?xt=urn:sha1:{}", HEX),
            "magnet:?xt=urn:btih:0123".to_string(),
            format!("magnet:?xt=urn:btih:{}", "z".repeat(40)),
            format!("magnet:?xt=urn:btih:{}", "1".repeat(32)),
        ];
        for uri in &bad {
            assert!(Magnet::parse(uri).is_err(), "{} should be rejected", uri);
        }
    }
}
