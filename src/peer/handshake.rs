use super::extension_bits::PeerExtensionBits;
use super::PeerId;
use crate::error::{BittorrentError, Result};
use crate::hash::Hash;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::debug;

/// Length-prefixed protocol string that opens every handshake
pub const PROTOCOL: &[u8; 20] = b"\x13BitTorrent protocol";

/// Format: <pstrlen><pstr><reserved><info_hash><peer_id>
/// Total: 1 + 19 + 8 + 20 + 20 = 68 bytes
pub const HANDSHAKE_LENGTH: usize = 68;

// Never more than four writes are posted during one handshake.
const SEND_QUEUE_CAPACITY: usize = 4;

/// What we learn about the remote side from its handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeResult {
    pub extensions: PeerExtensionBits,
    pub peer_id: PeerId,
    pub info_hash: Hash,
}

impl HandshakeResult {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HANDSHAKE_LENGTH);
        buf.extend_from_slice(PROTOCOL);
        buf.extend_from_slice(&self.extensions.0);
        buf.extend_from_slice(self.info_hash.as_bytes());
        buf.extend_from_slice(&self.peer_id);
        buf
    }

    pub fn from_bytes(data: &[u8; HANDSHAKE_LENGTH]) -> Result<Self> {
        if &data[..20] != PROTOCOL {
            return Err(BittorrentError::ProtocolMismatch(data[..20].to_vec()));
        }

        let mut extensions = [0u8; 8];
        extensions.copy_from_slice(&data[20..28]);

        let mut peer_id = [0u8; 20];
        peer_id.copy_from_slice(&data[48..68]);

        Ok(Self {
            extensions: PeerExtensionBits(extensions),
            info_hash: Hash::from_slice(&data[28..48])?,
            peer_id,
        })
    }
}

/// Exchange handshakes over `stream`.
///
/// With `info_hash` set (we dialled out) our whole handshake is sent without
/// waiting for the peer. Without it (we accepted) the info hash and peer ID
/// are sent only once the peer has told us which torrent it wants.
///
/// Writes go through a dedicated task so that reading the peer's handshake is
/// never held up by a slow socket. On success the stream is handed back once
/// every queued byte has been flushed.
pub async fn handshake<S>(
    stream: S,
    info_hash: Option<Hash>,
    peer_id: PeerId,
    extensions: PeerExtensionBits,
) -> Result<(S, HandshakeResult)>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut reader, writer) = tokio::io::split(stream);
    let (tx, rx) = mpsc::channel(SEND_QUEUE_CAPACITY);
    let writer_task = tokio::spawn(write_queued(writer, rx));

    let outcome = exchange(&mut reader, &tx, info_hash, peer_id, extensions).await;
    drop(tx);

    let result = match outcome {
        Ok(result) => result,
        Err(e) => {
            writer_task.abort();
            return Err(e);
        }
    };

    let (writer, written) = writer_task
        .await
        .map_err(|e| BittorrentError::HandshakeQueue(format!("writer task failed: {}", e)))?;
    written?;

    debug!(
        "Handshake complete: peer {} for {} ({:?})",
        String::from_utf8_lossy(&result.peer_id),
        result.info_hash,
        result.extensions
    );

    Ok((reader.unsplit(writer), result))
}

async fn exchange<R: AsyncRead + Unpin>(
    reader: &mut R,
    tx: &mpsc::Sender<Vec<u8>>,
    info_hash: Option<Hash>,
    peer_id: PeerId,
    extensions: PeerExtensionBits,
) -> Result<HandshakeResult> {
    let post = |bytes: Vec<u8>| {
        tx.try_send(bytes)
            .map_err(|e| BittorrentError::HandshakeQueue(e.to_string()))
    };

    post(PROTOCOL.to_vec())?;
    post(extensions.0.to_vec())?;
    if let Some(info_hash) = info_hash {
        post(info_hash.as_bytes().to_vec())?;
        post(peer_id.to_vec())?;
    }

    // TODO: a peer that hangs up here surfaces as a plain UnexpectedEof; callers
    // may want a dedicated error to stop retrying it.
    let mut buf = [0u8; HANDSHAKE_LENGTH];
    reader.read_exact(&mut buf).await?;
    let result = HandshakeResult::from_bytes(&buf)?;

    if info_hash.is_none() {
        post(result.info_hash.as_bytes().to_vec())?;
        post(peer_id.to_vec())?;
    }

    Ok(result)
}

/// Drain the queue onto the socket, stopping at the first write error.
async fn write_queued<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut rx: mpsc::Receiver<Vec<u8>>,
) -> (W, std::io::Result<()>) {
    while let Some(bytes) = rx.recv().await {
        if let Err(e) = writer.write_all(&bytes).await {
            return (writer, Err(e));
        }
    }
    let flushed = writer.flush().await;
    (writer, flushed)
}
