//! BEP 10 extended handshake, carried as the payload of `Extended { id: 0 }`.

use super::message::Message;
use crate::bencode::{decode, encode, BencodeValue};
use crate::error::{BittorrentError, Result};
use std::collections::BTreeMap;

pub const HANDSHAKE_EXTENDED_ID: u8 = 0;

pub const EXTENSION_NAME_METADATA: &str = "ut_metadata";
pub const EXTENSION_NAME_PEX: &str = "ut_pex";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtendedHandshake {
    /// Extension name to the message ID the sender wants to receive it on.
    /// An ID of 0 disables the extension.
    pub m: BTreeMap<String, i64>,
    /// Client name and version
    pub v: Option<String>,
    /// Listen port
    pub p: Option<u16>,
    /// Outstanding requests the sender will queue
    pub reqq: Option<i64>,
    pub metadata_size: Option<i64>,
    /// Our address as the sender sees it
    pub yourip: Option<Vec<u8>>,
    /// Prefers encrypted connections
    pub encryption: bool,
}

impl ExtendedHandshake {
    pub fn from_bytes(payload: &[u8]) -> Result<Self> {
        let value = decode(payload)?;
        if value.as_dict().is_none() {
            return Err(BittorrentError::BencodeError(
                "Extended handshake must be a dict".to_string(),
            ));
        }

        let m = value
            .dict_get(b"m")
            .and_then(|v| v.as_dict())
            .map(|dict| {
                dict.iter()
                    .filter_map(|(k, v)| {
                        let name = String::from_utf8(k.clone()).ok()?;
                        Some((name, v.as_integer()?))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let p = value
            .dict_get_int(b"p")
            .and_then(|p| u16::try_from(p).ok());

        Ok(Self {
            m,
            v: value.dict_get_str(b"v").map(String::from),
            p,
            reqq: value.dict_get_int(b"reqq"),
            metadata_size: value.dict_get_int(b"metadata_size"),
            yourip: value
                .dict_get(b"yourip")
                .and_then(|v| v.as_bytes())
                .map(<[u8]>::to_vec),
            encryption: value.dict_get_int(b"e").unwrap_or(0) != 0,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut dict = BTreeMap::new();

        let m = self
            .m
            .iter()
            .map(|(k, v)| (k.as_bytes().to_vec(), BencodeValue::Integer(*v)))
            .collect();
        dict.insert(b"m".to_vec(), BencodeValue::Dict(m));

        if let Some(v) = &self.v {
            dict.insert(b"v".to_vec(), BencodeValue::string(v));
        }
        if let Some(p) = self.p {
            dict.insert(b"p".to_vec(), BencodeValue::Integer(p as i64));
        }
        if let Some(reqq) = self.reqq {
            dict.insert(b"reqq".to_vec(), BencodeValue::Integer(reqq));
        }
        if let Some(size) = self.metadata_size {
            dict.insert(b"metadata_size".to_vec(), BencodeValue::Integer(size));
        }
        if let Some(ip) = &self.yourip {
            dict.insert(b"yourip".to_vec(), BencodeValue::String(ip.clone()));
        }
        if self.encryption {
            dict.insert(b"e".to_vec(), BencodeValue::Integer(1));
        }

        encode(&BencodeValue::Dict(dict))
    }

    /// Message ID the peer wants `name` sent on, if it supports it
    pub fn extension_id(&self, name: &str) -> Option<u8> {
        self.m
            .get(name)
            .and_then(|id| u8::try_from(*id).ok())
            .filter(|id| *id != 0)
    }

    pub fn to_message(&self) -> Message {
        Message::Extended {
            id: HANDSHAKE_EXTENDED_ID,
            payload: self.to_bytes(),
        }
    }
}
