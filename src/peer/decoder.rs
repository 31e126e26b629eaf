use super::integer::Integer;
use super::message::{unpack_bitfield, Message, MessageType, RequestSpec};
use super::pool::PieceBufferPool;
use crate::error::{BittorrentError, Result};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

/// Largest frame accepted by default (256 KiB)
pub const DEFAULT_MAX_MESSAGE_LENGTH: u32 = 256 * 1024;

/// Reads length-prefixed peer messages off a byte stream.
///
/// Calls must be sequential; the decoder keeps no state besides the position
/// of the underlying reader.
pub struct Decoder<R> {
    reader: R,
    max_length: u32,
    pool: Arc<PieceBufferPool>,
}

impl<R: AsyncRead + Unpin> Decoder<R> {
    pub fn new(reader: R, max_length: u32, pool: Arc<PieceBufferPool>) -> Self {
        Self {
            reader,
            max_length,
            pool,
        }
    }

    /// Decode the next message.
    ///
    /// Returns `Ok(None)` when the stream ends exactly on a message boundary.
    /// A stream ending anywhere else is an `UnexpectedEof` I/O error.
    pub async fn decode(&mut self) -> Result<Option<Message>> {
        let mut prefix = [0u8; Integer::SIZE];
        let n = self.reader.read(&mut prefix).await?;
        if n == 0 {
            return Ok(None);
        }
        self.reader.read_exact(&mut prefix[n..]).await?;
        let mut length = Integer::unmarshal_binary(&prefix)?.0;

        if length > self.max_length {
            return Err(BittorrentError::MessageTooLong {
                length,
                max: self.max_length,
            });
        }

        if length == 0 {
            return Ok(Some(Message::KeepAlive));
        }

        let type_byte = self.reader.read_u8().await?;
        length -= 1;
        let message_type = MessageType::try_from(type_byte)?;

        let message = match message_type {
            MessageType::Choke => Message::Choke,
            MessageType::Unchoke => Message::Unchoke,
            MessageType::Interested => Message::Interested,
            MessageType::NotInterested => Message::NotInterested,
            MessageType::HaveAll => Message::HaveAll,
            MessageType::HaveNone => Message::HaveNone,
            MessageType::Have | MessageType::Suggest | MessageType::AllowedFast => {
                consume(&mut length, 4, type_byte)?;
                let index = Integer::read(&mut self.reader).await?.0;
                match message_type {
                    MessageType::Have => Message::Have { index },
                    MessageType::Suggest => Message::Suggest { index },
                    _ => Message::AllowedFast { index },
                }
            }
            MessageType::Request | MessageType::Cancel | MessageType::Reject => {
                consume(&mut length, 12, type_byte)?;
                let spec = self.read_request_spec().await?;
                match message_type {
                    MessageType::Request => Message::Request { spec },
                    MessageType::Cancel => Message::Cancel { spec },
                    _ => Message::Reject { spec },
                }
            }
            MessageType::Bitfield => {
                let mut packed = vec![0u8; length as usize];
                self.reader.read_exact(&mut packed).await?;
                length = 0;
                Message::Bitfield {
                    bits: unpack_bitfield(&packed),
                }
            }
            MessageType::Piece => {
                consume(&mut length, 8, type_byte)?;
                let index = Integer::read(&mut self.reader).await?.0;
                let begin = Integer::read(&mut self.reader).await?.0;
                let data = self.read_piece_data(length as usize).await?;
                length = 0;
                Message::Piece { index, begin, data }
            }
            MessageType::Extended => {
                consume(&mut length, 1, type_byte)?;
                let id = self.reader.read_u8().await?;
                let mut payload = vec![0u8; length as usize];
                self.reader.read_exact(&mut payload).await?;
                length = 0;
                Message::Extended { id, payload }
            }
            MessageType::Port => {
                consume(&mut length, 2, type_byte)?;
                let port = self.reader.read_u16().await?;
                Message::Port { port }
            }
        };

        if length != 0 {
            return Err(BittorrentError::UnusedBytes(length));
        }

        trace!("decoded {}", message_type);
        Ok(Some(message))
    }

    async fn read_request_spec(&mut self) -> Result<RequestSpec> {
        let index = Integer::read(&mut self.reader).await?.0;
        let begin = Integer::read(&mut self.reader).await?.0;
        let length = Integer::read(&mut self.reader).await?.0;
        Ok(RequestSpec::new(index, begin, length))
    }

    async fn read_piece_data(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = self.pool.get();
        if buf.capacity() < len {
            let capacity = buf.capacity();
            self.pool.put(buf);
            return Err(BittorrentError::PieceDataTooLong {
                length: len,
                capacity,
            });
        }
        buf.resize(len, 0);
        self.reader.read_exact(&mut buf).await?;
        Ok(buf)
    }
}

/// Charge `n` payload bytes against the declared length.
fn consume(length: &mut u32, n: u32, message_type: u8) -> Result<()> {
    *length = length
        .checked_sub(n)
        .ok_or(BittorrentError::MessageTooShort {
            message_type,
            length: *length + 1,
        })?;
    Ok(())
}
