use super::info::Info;
use crate::hash::{Hash, HASH_SIZE};

/// A piece of a torrent, by index
#[derive(Debug, Clone, Copy)]
pub struct Piece<'a> {
    info: &'a Info,
    index: usize,
}

impl<'a> Piece<'a> {
    pub(crate) fn new(info: &'a Info, index: usize) -> Self {
        Self { info, index }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Byte offset of the piece within the concatenated torrent data
    pub fn offset(&self) -> u64 {
        self.index as u64 * self.info.piece_length
    }

    /// The last piece holds whatever remains after the full-sized ones
    pub fn length(&self) -> u64 {
        if self.index + 1 == self.info.num_pieces() {
            self.info.total_length().saturating_sub(self.offset())
        } else {
            self.info.piece_length
        }
    }

    /// Panics if the index is out of range.
    pub fn hash(&self) -> Hash {
        let start = self.index * HASH_SIZE;
        let mut hash = [0u8; HASH_SIZE];
        hash.copy_from_slice(&self.info.pieces[start..start + HASH_SIZE]);
        Hash::new(hash)
    }

    /// Whether `data` is the content of this piece
    pub fn verify(&self, data: &[u8]) -> bool {
        data.len() as u64 == self.length() && Hash::digest(data) == self.hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> Info {
        let mut pieces = Vec::new();
        for i in 0..3u8 {
            pieces.extend_from_slice(&[i; 20]);
        }
        Info {
            name: "f".to_string(),
            piece_length: 16384,
            length: 40000,
            pieces,
            ..Default::default()
        }
    }

    #[test]
    fn test_piece_boundaries() {
        let info = info();
        assert_eq!(info.num_pieces(), 3);
        assert_eq!(info.piece(0).length(), 16384);
        assert_eq!(info.piece(1).offset(), 16384);
        assert_eq!(info.piece(1).length(), 16384);
        assert_eq!(info.piece(2).offset(), 32768);
        assert_eq!(info.piece(2).length(), 40000 - 32768);
    }

    #[test]
    fn test_piece_hash_slices() {
        let info = info();
        assert_eq!(info.piece(1).hash(), Hash::new([1; 20]));
        assert_eq!(info.piece(2).hash(), Hash::new([2; 20]));
        let hashes: Vec<Hash> = info.piece_hashes().collect();
        assert_eq!(hashes.len(), info.num_pieces());
        assert_eq!(hashes[0], info.piece(0).hash());
        assert_eq!(hashes[2], Hash::new([2; 20]));
    }

    #[test]
    #[should_panic]
    fn test_out_of_range_piece_hash_panics() {
        info().piece(3).hash();
    }

    #[test]
    fn test_verify() {
        let data = b"hello world".to_vec();
        let info = Info {
            name: "h".to_string(),
            piece_length: 32,
            length: data.len() as u64,
            pieces: Hash::digest(&data).as_bytes().to_vec(),
            ..Default::default()
        };
        assert!(info.piece(0).verify(&data));
        assert!(!info.piece(0).verify(b"hello World"));
        assert!(!info.piece(0).verify(b"hello"));
    }
}
