use bytes::{BufMut, BytesMut};
use crate::error::BittorrentError;
use std::fmt;

/// Peer protocol message type IDs
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Choke = 0,
    Unchoke = 1,
    Interested = 2,
    NotInterested = 3,
    Have = 4,
    Bitfield = 5,
    Request = 6,
    Piece = 7,
    Cancel = 8,
    Port = 9,

    // BEP 6 - Fast extension
    Suggest = 0x0d,
    HaveAll = 0x0e,
    HaveNone = 0x0f,
    Reject = 0x10,
    AllowedFast = 0x11,

    // BEP 10
    Extended = 20,
}

impl MessageType {
    pub fn is_fast_extension(self) -> bool {
        matches!(
            self,
            MessageType::Suggest
                | MessageType::HaveAll
                | MessageType::HaveNone
                | MessageType::Reject
                | MessageType::AllowedFast
        )
    }
}

impl TryFrom<u8> for MessageType {
    type Error = BittorrentError;

    fn try_from(b: u8) -> Result<Self, Self::Error> {
        Ok(match b {
            0 => MessageType::Choke,
            1 => MessageType::Unchoke,
            2 => MessageType::Interested,
            3 => MessageType::NotInterested,
            4 => MessageType::Have,
            5 => MessageType::Bitfield,
            6 => MessageType::Request,
            7 => MessageType::Piece,
            8 => MessageType::Cancel,
            9 => MessageType::Port,
            0x0d => MessageType::Suggest,
            0x0e => MessageType::HaveAll,
            0x0f => MessageType::HaveNone,
            0x10 => MessageType::Reject,
            0x11 => MessageType::AllowedFast,
            20 => MessageType::Extended,
            other => return Err(BittorrentError::UnknownMessageType(other)),
        })
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageType::Choke => "Choke",
            MessageType::Unchoke => "Unchoke",
            MessageType::Interested => "Interested",
            MessageType::NotInterested => "NotInterested",
            MessageType::Have => "Have",
            MessageType::Bitfield => "Bitfield",
            MessageType::Request => "Request",
            MessageType::Piece => "Piece",
            MessageType::Cancel => "Cancel",
            MessageType::Port => "Port",
            MessageType::Suggest => "Suggest",
            MessageType::HaveAll => "HaveAll",
            MessageType::HaveNone => "HaveNone",
            MessageType::Reject => "Reject",
            MessageType::AllowedFast => "AllowedFast",
            MessageType::Extended => "Extended",
        };
        f.write_str(name)
    }
}

/// A byte range within a piece
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RequestSpec {
    /// Piece index
    pub index: u32,
    /// Byte offset within the piece
    pub begin: u32,
    /// Length of the range
    pub length: u32,
}

impl RequestSpec {
    pub fn new(index: u32, begin: u32, length: u32) -> Self {
        Self {
            index,
            begin,
            length,
        }
    }
}

impl fmt::Display for RequestSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{} {} {}}}", self.index, self.begin, self.length)
    }
}

/// Messages exchanged between peers after the handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Zero-length frame, no type byte
    KeepAlive,
    Choke,
    Unchoke,
    Interested,
    NotInterested,
    Have { index: u32 },
    /// One entry per piece, most significant bit of the first byte first
    Bitfield { bits: Vec<bool> },
    Request { spec: RequestSpec },
    Piece { index: u32, begin: u32, data: Vec<u8> },
    Cancel { spec: RequestSpec },
    /// DHT listen port
    Port { port: u16 },
    /// BEP 10 message; `id` 0 is the extended handshake
    Extended { id: u8, payload: Vec<u8> },
    HaveAll,
    HaveNone,
    Suggest { index: u32 },
    Reject { spec: RequestSpec },
    AllowedFast { index: u32 },
}

impl Message {
    /// `None` for keep-alives, which carry no type byte
    pub fn message_type(&self) -> Option<MessageType> {
        Some(match self {
            Message::KeepAlive => return None,
            Message::Choke => MessageType::Choke,
            Message::Unchoke => MessageType::Unchoke,
            Message::Interested => MessageType::Interested,
            Message::NotInterested => MessageType::NotInterested,
            Message::Have { .. } => MessageType::Have,
            Message::Bitfield { .. } => MessageType::Bitfield,
            Message::Request { .. } => MessageType::Request,
            Message::Piece { .. } => MessageType::Piece,
            Message::Cancel { .. } => MessageType::Cancel,
            Message::Port { .. } => MessageType::Port,
            Message::Extended { .. } => MessageType::Extended,
            Message::HaveAll => MessageType::HaveAll,
            Message::HaveNone => MessageType::HaveNone,
            Message::Suggest { .. } => MessageType::Suggest,
            Message::Reject { .. } => MessageType::Reject,
            Message::AllowedFast { .. } => MessageType::AllowedFast,
        })
    }

    /// The byte range a Request, Cancel, Reject or Piece refers to. For
    /// pieces the length is that of the data actually carried.
    pub fn request_spec(&self) -> Option<RequestSpec> {
        match self {
            Message::Request { spec } | Message::Cancel { spec } | Message::Reject { spec } => {
                Some(*spec)
            }
            Message::Piece { index, begin, data } => {
                Some(RequestSpec::new(*index, *begin, data.len() as u32))
            }
            _ => None,
        }
    }

    /// Serialize message to bytes
    /// Format: <length prefix><message ID><payload>
    pub fn to_bytes(&self) -> Vec<u8> {
        let Some(message_type) = self.message_type() else {
            return vec![0; 4];
        };

        let mut body = BytesMut::new();
        body.put_u8(message_type as u8);

        match self {
            Message::KeepAlive
            | Message::Choke
            | Message::Unchoke
            | Message::Interested
            | Message::NotInterested
            | Message::HaveAll
            | Message::HaveNone => {}
            Message::Have { index }
            | Message::Suggest { index }
            | Message::AllowedFast { index } => {
                body.put_u32(*index);
            }
            Message::Request { spec } | Message::Cancel { spec } | Message::Reject { spec } => {
                body.put_u32(spec.index);
                body.put_u32(spec.begin);
                body.put_u32(spec.length);
            }
            Message::Bitfield { bits } => {
                body.put_slice(&pack_bitfield(bits));
            }
            Message::Piece { index, begin, data } => {
                body.put_u32(*index);
                body.put_u32(*begin);
                body.put_slice(data);
            }
            Message::Extended { id, payload } => {
                body.put_u8(*id);
                body.put_slice(payload);
            }
            Message::Port { port } => {
                body.put_u16(*port);
            }
        }

        let mut buf = BytesMut::with_capacity(4 + body.len());
        buf.put_u32(body.len() as u32);
        buf.put_slice(&body);
        buf.to_vec()
    }
}

/// Bit i lands in bit (7 - i % 8) of byte i / 8. Trailing bits are zero.
pub fn pack_bitfield(bits: &[bool]) -> Vec<u8> {
    let mut bytes = vec![0u8; bits.len().div_ceil(8)];
    for (i, _) in bits.iter().enumerate().filter(|(_, b)| **b) {
        bytes[i / 8] |= 1 << (7 - i % 8);
    }
    bytes
}

pub fn unpack_bitfield(bytes: &[u8]) -> Vec<bool> {
    bytes
        .iter()
        .flat_map(|byte| (0..8).map(move |i| byte & (1 << (7 - i)) != 0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitfield_bit_order() {
        assert_eq!(pack_bitfield(&[true, false, true]), vec![0xA0]);
        assert_eq!(
            unpack_bitfield(&[0xA0]),
            vec![true, false, true, false, false, false, false, false]
        );
        assert_eq!(pack_bitfield(&[]), Vec::<u8>::new());

        let mut nine = vec![false; 9];
        nine[8] = true;
        assert_eq!(pack_bitfield(&nine), vec![0x00, 0x80]);
    }

    #[test]
    fn test_keepalive_is_four_zero_bytes() {
        assert_eq!(Message::KeepAlive.to_bytes(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_length_prefix_matches_body() {
        let messages = vec![
            Message::Choke,
            Message::Have { index: 7 },
            Message::Bitfield {
                bits: vec![true; 11],
            },
            Message::Request {
                spec: RequestSpec::new(1, 2, 3),
            },
            Message::Piece {
                index: 1,
                begin: 0,
                data: vec![9; 100],
            },
            Message::Port { port: 6881 },
            Message::Extended {
                id: 0,
                payload: vec![],
            },
            Message::AllowedFast { index: 4 },
        ];

        for msg in messages {
            let bytes = msg.to_bytes();
            let declared = u32::from_be_bytes(bytes[..4].try_into().unwrap()) as usize;
            assert_eq!(declared, bytes.len() - 4, "{:?}", msg);
            assert_eq!(bytes[4], msg.message_type().unwrap() as u8);
        }
    }

    #[test]
    fn test_request_wire_layout() {
        let msg = Message::Request {
            spec: RequestSpec::new(1, 0x4000, 0x4000),
        };
        assert_eq!(
            msg.to_bytes(),
            vec![0, 0, 0, 13, 6, 0, 0, 0, 1, 0, 0, 0x40, 0, 0, 0, 0x40, 0]
        );
    }

    #[test]
    fn test_request_spec_from_piece_uses_data_length() {
        let msg = Message::Piece {
            index: 3,
            begin: 16,
            data: vec![0; 5],
        };
        assert_eq!(msg.request_spec(), Some(RequestSpec::new(3, 16, 5)));
        assert_eq!(Message::Choke.request_spec(), None);
        assert_eq!(RequestSpec::new(3, 16, 5).to_string(), "{3 16 5}");
    }

    #[test]
    fn test_message_type_codes() {
        assert_eq!(MessageType::try_from(17).unwrap(), MessageType::AllowedFast);
        assert_eq!(MessageType::try_from(20).unwrap(), MessageType::Extended);
        assert!(MessageType::try_from(10).is_err());
        assert!(MessageType::Reject.is_fast_extension());
        assert!(!MessageType::Piece.is_fast_extension());
    }
}
