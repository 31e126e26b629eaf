use crate::error::{BittorrentError, Result};
use tokio::io::{AsyncRead, AsyncReadExt};

/// A big-endian u32 as it appears on the wire. Every length and numeric
/// field of the peer protocol uses this representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Integer(pub u32);

impl Integer {
    pub const SIZE: usize = 4;

    /// Read exactly 4 bytes. A stream ending early yields `UnexpectedEof`.
    pub async fn read<R: AsyncRead + Unpin>(r: &mut R) -> Result<Self> {
        let mut buf = [0u8; Self::SIZE];
        r.read_exact(&mut buf).await?;
        Ok(Self(u32::from_be_bytes(buf)))
    }

    pub fn unmarshal_binary(b: &[u8]) -> Result<Self> {
        let buf: [u8; Self::SIZE] = b.try_into().map_err(|_| {
            BittorrentError::PeerError(format!("expected 4 bytes for integer, got {}", b.len()))
        })?;
        Ok(Self(u32::from_be_bytes(buf)))
    }

    pub fn marshal_binary(self) -> [u8; Self::SIZE] {
        self.0.to_be_bytes()
    }

}

impl From<u32> for Integer {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

impl From<Integer> for u32 {
    fn from(v: Integer) -> Self {
        v.0
    }
}
