use crate::error::{BittorrentError, Result};
use sha1::{Digest, Sha1};
use std::fmt;
use std::str::FromStr;

pub const HASH_SIZE: usize = 20;

/// A 20-byte SHA1 digest. Used for info hashes and piece hashes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash([u8; HASH_SIZE]);

impl Hash {
    pub fn new(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        let bytes: [u8; HASH_SIZE] = slice.try_into().map_err(|_| {
            BittorrentError::InvalidHash(format!(
                "expected {} bytes, got {}",
                HASH_SIZE,
                slice.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    /// Parse a 40 character hex string
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != HASH_SIZE * 2 {
            return Err(BittorrentError::InvalidHash(format!(
                "expected {} hex characters, got {}",
                HASH_SIZE * 2,
                s.len()
            )));
        }
        let bytes = hex::decode(s).map_err(|e| BittorrentError::InvalidHash(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// SHA1 of `data`
    pub fn digest(data: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    pub fn hex_string(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; HASH_SIZE]> for Hash {
    fn from(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for Hash {
    type Err = BittorrentError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex_string())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.hex_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_is_lowercase_and_lossless() {
        let hash = Hash::new([0xAB; 20]);
        let hex = hash.hex_string();
        assert_eq!(hex.len(), 40);
        assert_eq!(hex, "ab".repeat(20));
        assert_eq!(hex.parse::<Hash>().unwrap(), hash);
    }

    #[test]
    fn test_uppercase_hex_accepted() {
        let hash = Hash::from_hex("0123456789ABCDEF0123456789ABCDEF01234567").unwrap();
        assert_eq!(hash.to_string(), "0123456789abcdef0123456789abcdef01234567");
    }

    #[test]
    fn test_wrong_lengths_rejected() {
        assert!(Hash::from_hex("abcd").is_err());
        assert!(Hash::from_slice(&[0u8; 19]).is_err());
        assert!(Hash::from_hex(&"zz".repeat(20)).is_err());
    }

    #[test]
    fn test_digest() {
        // SHA1("abc")
        assert_eq!(
            Hash::digest(b"abc").to_string(),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }
}
