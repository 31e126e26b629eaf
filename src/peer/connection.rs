use super::decoder::{Decoder, DEFAULT_MAX_MESSAGE_LENGTH};
use super::extended::ExtendedHandshake;
use super::extension_bits::{ExtensionBit, PeerExtensionBits};
use super::handshake::{handshake, HandshakeResult};
use super::message::Message;
use super::pool::{PieceBufferPool, BLOCK_SIZE, DEFAULT_POOL_BUFFERS};
use super::{generate_peer_id, PeerId, PeerState};
use crate::error::{BittorrentError, Result};
use crate::hash::Hash;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info};

// Bounds the bitfield grown from Have messages
const MAX_TRACKED_PIECES: usize = 1 << 22;

/// Settings shared by every connection we open or accept
#[derive(Clone)]
pub struct ConnectionConfig {
    pub peer_id: PeerId,
    /// Extensions advertised in our handshake
    pub extensions: PeerExtensionBits,
    /// Frames declaring more than this are rejected before reading them
    pub max_message_length: u32,
    /// Piece payload buffers; decoding fails for blocks larger than their capacity
    pub pool: Arc<PieceBufferPool>,
}

impl ConnectionConfig {
    pub fn with_piece_buffer_capacity(mut self, capacity: usize) -> Self {
        self.pool = PieceBufferPool::new(capacity, DEFAULT_POOL_BUFFERS);
        self
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            peer_id: generate_peer_id(),
            extensions: PeerExtensionBits::new(&[
                ExtensionBit::DHT,
                ExtensionBit::FAST,
                ExtensionBit::EXTENDED,
            ]),
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
            pool: PieceBufferPool::new(BLOCK_SIZE, DEFAULT_POOL_BUFFERS),
        }
    }
}

/// A handshaken connection to a peer
pub struct PeerConnection<S = TcpStream> {
    label: String,
    decoder: Decoder<ReadHalf<S>>,
    writer: WriteHalf<S>,
    state: PeerState,
    remote: HandshakeResult,
    bitfield: Option<Vec<bool>>,
    has_all: bool,
    pool: Arc<PieceBufferPool>,
}

impl PeerConnection<TcpStream> {
    /// Connect to a peer and perform handshake
    pub async fn connect(
        addr: SocketAddr,
        info_hash: Hash,
        config: &ConnectionConfig,
    ) -> Result<Self> {
        info!("Connecting to peer: {}", addr);

        let stream = TcpStream::connect(addr).await.map_err(|e| {
            BittorrentError::PeerError(format!("Failed to connect to {}: {}", addr, e))
        })?;

        Self::establish(addr.to_string(), stream, Some(info_hash), config).await
    }
}

impl<S> PeerConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Handshake with a peer that connected to us. The torrent is whatever the
    /// peer asks for; check [`info_hash`](Self::info_hash) before serving it.
    pub async fn accept(label: impl Into<String>, stream: S, config: &ConnectionConfig) -> Result<Self> {
        Self::establish(label.into(), stream, None, config).await
    }

    /// Handshake over an already open stream, as the dialling side.
    pub async fn open(
        label: impl Into<String>,
        stream: S,
        info_hash: Hash,
        config: &ConnectionConfig,
    ) -> Result<Self> {
        Self::establish(label.into(), stream, Some(info_hash), config).await
    }

    async fn establish(
        label: String,
        stream: S,
        info_hash: Option<Hash>,
        config: &ConnectionConfig,
    ) -> Result<Self> {
        let (stream, remote) =
            handshake(stream, info_hash, config.peer_id, config.extensions).await?;

        if let Some(expected) = info_hash {
            if remote.info_hash != expected {
                return Err(BittorrentError::InfoHashMismatch {
                    expected: expected.to_string(),
                    actual: remote.info_hash.to_string(),
                });
            }
        }

        info!(
            "Handshake with {} done, peer id {}",
            label,
            String::from_utf8_lossy(&remote.peer_id)
        );

        let (reader, writer) = tokio::io::split(stream);
        Ok(Self {
            label,
            decoder: Decoder::new(reader, config.max_message_length, config.pool.clone()),
            writer,
            state: PeerState::default(),
            remote,
            bitfield: None,
            has_all: false,
            pool: config.pool.clone(),
        })
    }

    /// Send a message to the peer
    pub async fn send_message(&mut self, message: &Message) -> Result<()> {
        self.writer.write_all(&message.to_bytes()).await?;

        // Update our state based on what we sent
        match message {
            Message::Choke => self.state.am_choking = true,
            Message::Unchoke => self.state.am_choking = false,
            Message::Interested => self.state.am_interested = true,
            Message::NotInterested => self.state.am_interested = false,
            _ => {}
        }

        debug!("Sent message to {}: {:?}", self.label, message.message_type());
        Ok(())
    }

    /// Send our BEP 10 handshake. Only meaningful if the peer advertised the
    /// extension protocol.
    pub async fn send_extended_handshake(&mut self, hs: &ExtendedHandshake) -> Result<()> {
        if !self.remote.extensions.supports_extended() {
            return Err(BittorrentError::PeerError(format!(
                "{} does not support the extension protocol",
                self.label
            )));
        }
        self.send_message(&hs.to_message()).await
    }

    /// Receive a message from the peer. `None` once the peer has closed the
    /// connection cleanly.
    pub async fn receive_message(&mut self) -> Result<Option<Message>> {
        let Some(message) = self.decoder.decode().await? else {
            debug!("{} closed the connection", self.label);
            return Ok(None);
        };

        self.handle_message(&message);
        debug!("Received message from {}: {:?}", self.label, message.message_type());

        Ok(Some(message))
    }

    /// Handle incoming message and update state
    fn handle_message(&mut self, message: &Message) {
        match message {
            Message::Choke => self.state.peer_choking = true,
            Message::Unchoke => self.state.peer_choking = false,
            Message::Interested => self.state.peer_interested = true,
            Message::NotInterested => self.state.peer_interested = false,
            Message::Bitfield { bits } => {
                self.bitfield = Some(bits.clone());
                self.has_all = false;
            }
            Message::HaveAll => {
                self.bitfield = None;
                self.has_all = true;
            }
            Message::HaveNone => {
                self.bitfield = None;
                self.has_all = false;
            }
            Message::Have { .. } if self.has_all => {}
            Message::Have { index } if *index as usize >= MAX_TRACKED_PIECES => {
                debug!("{} announced out of range piece {}", self.label, index);
            }
            Message::Have { index } => {
                let index = *index as usize;
                let bits = self.bitfield.get_or_insert_with(Vec::new);
                if bits.len() <= index {
                    bits.resize(index + 1, false);
                }
                bits[index] = true;
            }
            _ => {}
        }
    }

    /// Check if peer has a specific piece. A peer that sent HaveAll has every
    /// piece; one that sent nothing yet has none.
    pub fn has_piece(&self, piece_index: usize) -> bool {
        match &self.bitfield {
            Some(bits) => bits.get(piece_index).copied().unwrap_or(false),
            None => self.has_all,
        }
    }

    /// Give a piece payload buffer back for reuse
    pub fn recycle(&self, data: Vec<u8>) {
        self.pool.put(data);
    }

    pub fn state(&self) -> &PeerState {
        &self.state
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.remote.peer_id
    }

    pub fn info_hash(&self) -> Hash {
        self.remote.info_hash
    }

    pub fn extensions(&self) -> PeerExtensionBits {
        self.remote.extensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::RequestSpec;
    use tokio::io::duplex;

    const INFO_HASH: [u8; 20] = [0x42; 20];

    async fn pair() -> (PeerConnection<tokio::io::DuplexStream>, PeerConnection<tokio::io::DuplexStream>) {
        let (a, b) = duplex(64 * 1024);
        let config_a = ConnectionConfig::default();
        let config_b = ConnectionConfig::default();
        let (ra, rb) = tokio::join!(
            PeerConnection::open("b", a, Hash::new(INFO_HASH), &config_a),
            PeerConnection::accept("a", b, &config_b)
        );
        (ra.unwrap(), rb.unwrap())
    }

    #[tokio::test]
    async fn test_accept_learns_info_hash() {
        let (a, b) = pair().await;
        assert_eq!(b.info_hash(), Hash::new(INFO_HASH));
        assert_eq!(a.info_hash(), Hash::new(INFO_HASH));
        assert_eq!(&a.peer_id()[..8], b"-BW0001-");
        assert!(a.extensions().supports_fast());
        assert!(b.extensions().supports_extended());
    }

    #[tokio::test]
    async fn test_messages_update_state() {
        let (mut a, mut b) = pair().await;

        a.send_message(&Message::Interested).await.unwrap();
        assert!(a.state().am_interested);
        b.send_message(&Message::Unchoke).await.unwrap();
        assert!(!b.state().am_choking);

        assert_eq!(b.receive_message().await.unwrap(), Some(Message::Interested));
        assert!(b.state().peer_interested);
        assert_eq!(a.receive_message().await.unwrap(), Some(Message::Unchoke));
        assert!(!a.state().peer_choking);
    }

    #[tokio::test]
    async fn test_piece_availability_tracking() {
        let (mut a, mut b) = pair().await;
        assert!(!a.has_piece(0));

        b.send_message(&Message::Bitfield {
            bits: vec![false, true],
        })
        .await
        .unwrap();
        b.send_message(&Message::Have { index: 9 }).await.unwrap();
        b.send_message(&Message::HaveAll).await.unwrap();

        a.receive_message().await.unwrap();
        assert!(a.has_piece(1));
        assert!(!a.has_piece(0));
        a.receive_message().await.unwrap();
        assert!(a.has_piece(9));
        a.receive_message().await.unwrap();
        assert!(a.has_piece(12345));
    }

    #[tokio::test]
    async fn test_piece_round_trip_and_recycle() {
        let (mut a, mut b) = pair().await;
        b.send_message(&Message::Piece {
            index: 0,
            begin: 0,
            data: vec![5; 1024],
        })
        .await
        .unwrap();

        let msg = a.receive_message().await.unwrap().unwrap();
        assert_eq!(msg.request_spec(), Some(RequestSpec::new(0, 0, 1024)));
        if let Message::Piece { data, .. } = msg {
            a.recycle(data);
        }
    }

    #[tokio::test]
    async fn test_clean_close_yields_none() {
        let (mut a, b) = pair().await;
        drop(b);
        assert_eq!(a.receive_message().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_info_hash_mismatch() {
        let (a, b) = duplex(1024);
        let config = ConnectionConfig::default();
        let other = Hash::new([0x99; 20]);
        let (ra, _rb) = tokio::join!(
            PeerConnection::open("b", a, Hash::new(INFO_HASH), &config),
            PeerConnection::open("a", b, other, &config)
        );
        assert!(matches!(
            ra.err(),
            Some(BittorrentError::InfoHashMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_extended_handshake_sent() {
        let (mut a, mut b) = pair().await;
        let mut hs = ExtendedHandshake::default();
        hs.m.insert("ut_metadata".to_string(), 2);
        a.send_extended_handshake(&hs).await.unwrap();

        let Some(Message::Extended { id, payload }) = b.receive_message().await.unwrap() else {
            panic!("expected extended message");
        };
        assert_eq!(id, 0);
        assert_eq!(ExtendedHandshake::from_bytes(&payload).unwrap(), hs);
    }
}
