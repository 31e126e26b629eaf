mod connection;
mod decoder;
mod extended;
mod extension_bits;
mod handshake;
mod integer;
mod message;
mod pool;

pub use connection::{ConnectionConfig, PeerConnection};
pub use decoder::{Decoder, DEFAULT_MAX_MESSAGE_LENGTH};
pub use extended::{
    ExtendedHandshake, EXTENSION_NAME_METADATA, EXTENSION_NAME_PEX, HANDSHAKE_EXTENDED_ID,
};
pub use extension_bits::{ExtensionBit, PeerExtensionBits};
pub use handshake::{handshake, HandshakeResult, HANDSHAKE_LENGTH, PROTOCOL};
pub use integer::Integer;
pub use message::{pack_bitfield, unpack_bitfield, Message, MessageType, RequestSpec};
pub use pool::{PieceBufferPool, BLOCK_SIZE};

use rand::Rng;

pub type PeerId = [u8; 20];

/// Generate a random peer ID
/// Format: -BW0001-<12 random chars>
pub fn generate_peer_id() -> PeerId {
    let mut peer_id = [0u8; 20];
    peer_id[0..8].copy_from_slice(b"-BW0001-");

    let mut rng = rand::thread_rng();
    for byte in &mut peer_id[8..] {
        *byte = rng.gen_range(b'0'..=b'z');
    }

    peer_id
}

// Peer connection states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerState {
    /// Whether we are choking the peer
    pub am_choking: bool,
    /// Whether we are interested in the peer
    pub am_interested: bool,
    /// Whether the peer is choking us
    pub peer_choking: bool,
    /// Whether the peer is interested in us
    pub peer_interested: bool,
}

impl Default for PeerState {
    fn default() -> Self {
        Self {
            am_choking: true,
            am_interested: false,
            peer_choking: true,
            peer_interested: false,
        }
    }
}
