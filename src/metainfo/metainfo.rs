use super::announce_list::AnnounceList;
use super::info::Info;
use crate::bencode::{decode, encode, raw_dict_value, BencodeValue};
use crate::error::{BittorrentError, Result};
use crate::hash::Hash;
use crate::magnet::Magnet;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tracing::debug;

/// A DHT bootstrap node as "host:port"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node(pub String);

impl Node {
    // Either "host:port" or [host, port]
    fn from_bencode(value: &BencodeValue) -> Option<Self> {
        if let Some(s) = value.as_str() {
            return Some(Self(s.to_string()));
        }
        match value.as_list()? {
            [host, port] => Some(Self(format!("{}:{}", host.as_str()?, port.as_integer()?))),
            _ => None,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Top-level metainfo structure from a .torrent file
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetaInfo {
    /// The bencoded info dictionary exactly as it appeared in the file. The
    /// info hash is computed over these bytes, never over a re-encoding.
    pub info_bytes: Vec<u8>,
    /// URL of the tracker
    pub announce: String,
    pub announce_list: AnnounceList,
    pub nodes: Vec<Node>,
    /// Seconds since the Unix epoch
    pub creation_date: Option<i64>,
    pub comment: Option<String>,
    pub created_by: Option<String>,
    pub encoding: Option<String>,
    /// Web seeds (BEP 19)
    pub url_list: Vec<String>,
}

impl MetaInfo {
    /// Parse torrent data from bytes
    pub fn load(data: &[u8]) -> Result<Self> {
        let value = decode(data)?;
        if value.as_dict().is_none() {
            return Err(BittorrentError::InvalidTorrent("Torrent must be a dict".to_string()));
        }

        let info_bytes = raw_dict_value(data, b"info")?
            .ok_or_else(|| BittorrentError::InvalidTorrent("Missing 'info' field".to_string()))?
            .to_vec();

        let string = |key: &[u8]| value.dict_get_str(key).map(String::from);

        let url_list = match value.dict_get(b"url-list") {
            Some(BencodeValue::String(_)) => string(b"url-list").into_iter().collect(),
            Some(BencodeValue::List(urls)) => urls
                .iter()
                .filter_map(|u| u.as_str().map(String::from))
                .collect(),
            _ => Vec::new(),
        };

        Ok(MetaInfo {
            info_bytes,
            announce: string(b"announce").unwrap_or_default(),
            announce_list: value
                .dict_get(b"announce-list")
                .map(AnnounceList::from_bencode)
                .unwrap_or_default(),
            nodes: value
                .dict_get_list(b"nodes")
                .unwrap_or_default()
                .iter()
                .filter_map(Node::from_bencode)
                .collect(),
            creation_date: value.dict_get_int(b"creation date"),
            comment: string(b"comment"),
            created_by: string(b"created by"),
            encoding: string(b"encoding"),
            url_list,
        })
    }

    /// Load and parse a .torrent file
    pub async fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path)
            .await
            .map_err(|e| BittorrentError::file(path, e))?;
        debug!("Read {} bytes from {}", data.len(), path.display());
        Self::load(&data)
    }

    /// Bencode the metainfo. The info dictionary is written back verbatim.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut dict = BTreeMap::new();
        dict.insert(b"info".to_vec(), BencodeValue::Raw(self.info_bytes.clone()));

        if !self.announce.is_empty() {
            dict.insert(b"announce".to_vec(), BencodeValue::string(&self.announce));
        }
        if !self.announce_list.is_empty() {
            dict.insert(b"announce-list".to_vec(), self.announce_list.to_bencode());
        }
        if !self.nodes.is_empty() {
            dict.insert(
                b"nodes".to_vec(),
                BencodeValue::List(self.nodes.iter().map(|n| BencodeValue::string(&n.0)).collect()),
            );
        }
        if let Some(date) = self.creation_date {
            dict.insert(b"creation date".to_vec(), date.into());
        }
        for (key, field) in [
            (&b"comment"[..], &self.comment),
            (b"created by", &self.created_by),
            (b"encoding", &self.encoding),
        ] {
            if let Some(v) = field {
                dict.insert(key.to_vec(), BencodeValue::string(v));
            }
        }
        if !self.url_list.is_empty() {
            dict.insert(
                b"url-list".to_vec(),
                BencodeValue::List(self.url_list.iter().map(BencodeValue::string).collect()),
            );
        }

        encode(&dict.into())
    }

    pub async fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_bytes())
            .await
            .map_err(|e| BittorrentError::file(path, e))
    }

    /// The info hash: SHA1 over the raw info bytes
    pub fn hash_info_bytes(&self) -> Hash {
        Hash::digest(&self.info_bytes)
    }

    pub fn unmarshal_info(&self) -> Result<Info> {
        Info::from_bencode(&decode(&self.info_bytes)?)
    }

    /// Replace the info dictionary, e.g. when creating a new torrent
    pub fn set_info(&mut self, info: &Info) {
        self.info_bytes = encode(&info.to_bencode());
    }

    /// Fill in "created by" and "creation date"
    pub fn set_defaults(&mut self) {
        self.created_by = Some(format!(
            "{}/{}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        ));
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        self.creation_date = Some(now);
    }

    /// Tracker tiers, falling back to `announce` as a single tier
    pub fn upverted_announce_list(&self) -> AnnounceList {
        if self.announce_list.overrides_announce(&self.announce) {
            return self.announce_list.clone();
        }
        if !self.announce.is_empty() {
            return AnnounceList(vec![vec![self.announce.clone()]]);
        }
        AnnounceList::default()
    }

    /// A magnet link for this torrent. The display name is taken from `info`
    /// when given.
    pub fn magnet(&self, info: Option<&Info>) -> Magnet {
        Magnet {
            info_hash: self.hash_info_bytes(),
            trackers: self.upverted_announce_list().distinct_values(),
            display_name: info.map(|i| i.name.clone()),
            params: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metainfo::FileInfo;

    // info keys deliberately unsorted
    const TORRENT: &[u8] = b"d8:announce17:http://x/announce13:creation datei1700000000e4:infod4:name5:hello12:piece lengthi16384e6:lengthi5e6:pieces20:aaaaaaaaaaaaaaaaaaaae5:nodesl15:router.dht:6881l7:1.2.3.4i6882eee8:url-list13:http://seed/fe";

    #[test]
    fn test_load_fields() {
        let mi = MetaInfo::load(TORRENT).unwrap();
        assert_eq!(mi.announce, "http://x/announce");
        assert_eq!(mi.creation_date, Some(1_700_000_000));
        assert_eq!(
            mi.nodes,
            vec![Node("router.dht:6881".to_string()), Node("1.2.3.4:6882".to_string())]
        );
        assert_eq!(mi.url_list, vec!["http://seed/f"]);

        let info = mi.unmarshal_info().unwrap();
        assert_eq!(info.name, "hello");
        assert_eq!(info.length, 5);
        assert_eq!(info.num_pieces(), 1);
    }

    #[test]
    fn test_info_bytes_survive_load_write_load() {
        let mi = MetaInfo::load(TORRENT).unwrap();
        let original_hash = mi.hash_info_bytes();
        assert!(mi.info_bytes.starts_with(b"d4:name5:hello12:piece length"));

        let reloaded = MetaInfo::load(&mi.to_bytes()).unwrap();
        assert_eq!(reloaded.info_bytes, mi.info_bytes);
        assert_eq!(reloaded.hash_info_bytes(), original_hash);
        assert_eq!(reloaded, mi);

        // re-encoding the decoded info sorts its keys, which changes the hash
        let reencoded = encode(&mi.unmarshal_info().unwrap().to_bencode());
        assert_ne!(Hash::digest(&reencoded), original_hash);
    }

    #[test]
    fn test_missing_info_rejected() {
        assert!(MetaInfo::load(b"d8:announce3:urle").is_err());
        assert!(MetaInfo::load(b"li1ee").is_err());
    }

    #[test]
    fn test_upverted_announce_list() {
        let mut mi = MetaInfo {
            announce: "http://x".to_string(),
            announce_list: AnnounceList(vec![vec!["http://y".to_string()]]),
            ..Default::default()
        };
        assert_eq!(mi.upverted_announce_list().0, vec![vec!["http://y".to_string()]]);

        mi.announce_list = AnnounceList::default();
        assert_eq!(mi.upverted_announce_list().0, vec![vec!["http://x".to_string()]]);

        mi.announce.clear();
        assert!(mi.upverted_announce_list().is_empty());
    }

    #[test]
    fn test_set_info_and_magnet() {
        let info = Info {
            name: "pack".to_string(),
            piece_length: 16384,
            pieces: vec![0; 20],
            files: vec![FileInfo {
                length: 10,
                path: vec!["a".to_string()],
            }],
            ..Default::default()
        };
        let mut mi = MetaInfo {
            announce: "http://t/announce".to_string(),
            ..Default::default()
        };
        mi.set_info(&info);
        mi.set_defaults();
        assert!(mi.created_by.as_deref().unwrap().starts_with("bittorrent-wire/"));
        assert!(mi.creation_date.unwrap() > 0);

        let reloaded = MetaInfo::load(&mi.to_bytes()).unwrap();
        assert_eq!(reloaded.unmarshal_info().unwrap(), info);

        let magnet = mi.magnet(Some(&info));
        assert_eq!(magnet.info_hash, mi.hash_info_bytes());
        assert_eq!(magnet.display_name.as_deref(), Some("pack"));
        assert_eq!(magnet.trackers, vec!["http://t/announce"]);
    }

    #[tokio::test]
    async fn test_file_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("t.torrent");
        let mi = MetaInfo::load(TORRENT).unwrap();
        mi.write_to_file(&path).await.unwrap();
        assert_eq!(MetaInfo::load_from_file(&path).await.unwrap(), mi);

        let err = MetaInfo::load_from_file(dir.path().join("absent.torrent"))
            .await
            .unwrap_err();
        assert!(matches!(err, BittorrentError::FileError { .. }));
    }

    #[tokio::test]
    async fn test_write_failure_names_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("no_such_dir").join("t.torrent");
        let err = MetaInfo::load(TORRENT)
            .unwrap()
            .write_to_file(&path)
            .await
            .unwrap_err();
        assert!(matches!(&err, BittorrentError::FileError { path: p, .. } if *p == path));
        assert!(err.to_string().starts_with("I/O error on "));
    }
}
