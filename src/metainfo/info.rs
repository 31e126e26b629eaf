use super::piece::Piece;
use crate::bencode::BencodeValue;
use crate::error::{BittorrentError, Result};
use crate::hash::{Hash, HASH_SIZE};
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Smallest piece length picked when building a torrent (16 KiB)
pub const MINIMUM_PIECE_LENGTH: u64 = 16 * 1024;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Represents a file in a multi-file torrent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub length: u64,
    /// Path segments relative to the torrent root. Empty for the single file
    /// of a single-file torrent.
    pub path: Vec<String>,
}

impl FileInfo {
    pub fn display_path(&self) -> String {
        self.path.join("/")
    }
}

/// The info dictionary of a torrent
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Info {
    /// Number of bytes in each piece
    pub piece_length: u64,
    /// Concatenated 20-byte SHA1 hashes, one per piece
    pub pieces: Vec<u8>,
    /// Suggested name for the file or directory
    pub name: String,
    /// Length of a single-file torrent. Ignored when `files` is non-empty.
    pub length: u64,
    /// Files of a multi-file torrent
    pub files: Vec<FileInfo>,
    pub private: Option<bool>,
    pub source: Option<String>,
}

impl Info {
    pub fn from_bencode(value: &BencodeValue) -> Result<Self> {
        let dict = value
            .as_dict()
            .ok_or_else(|| BittorrentError::InvalidTorrent("Info must be a dict".to_string()))?;

        let name = dict
            .get(b"name".as_ref())
            .and_then(|v| v.as_str())
            .ok_or_else(|| BittorrentError::InvalidTorrent("Missing 'name' field".to_string()))?
            .to_string();

        let piece_length = dict
            .get(b"piece length".as_ref())
            .and_then(|v| v.as_integer())
            .and_then(|v| u64::try_from(v).ok())
            .ok_or_else(|| {
                BittorrentError::InvalidTorrent("Missing 'piece length' field".to_string())
            })?;
        if piece_length == 0 {
            return Err(BittorrentError::ZeroPieceLength);
        }

        let pieces = dict
            .get(b"pieces".as_ref())
            .and_then(|v| v.as_bytes())
            .ok_or_else(|| BittorrentError::InvalidTorrent("Missing 'pieces' field".to_string()))?
            .to_vec();
        if pieces.len() % HASH_SIZE != 0 {
            return Err(BittorrentError::InvalidTorrent(
                "Pieces length must be multiple of 20".to_string(),
            ));
        }

        let mut info = Info {
            name,
            piece_length,
            pieces,
            private: dict
                .get(b"private".as_ref())
                .and_then(|v| v.as_integer())
                .map(|v| v != 0),
            source: dict
                .get(b"source".as_ref())
                .and_then(|v| v.as_str())
                .map(String::from),
            ..Default::default()
        };

        let length = dict.get(b"length".as_ref());
        let files = dict.get(b"files".as_ref());
        if length.is_none() && files.is_none() {
            return Err(BittorrentError::InvalidTorrent(
                "Missing 'length' or 'files' field".to_string(),
            ));
        }

        if let Some(length_value) = length {
            info.length = length_value
                .as_integer()
                .and_then(|v| u64::try_from(v).ok())
                .ok_or_else(|| {
                    BittorrentError::InvalidTorrent("Invalid 'length' field".to_string())
                })?;
        }

        // A non-empty file list takes precedence over `length`
        if let Some(files_value) = files {
            let files_list = files_value.as_list().ok_or_else(|| {
                BittorrentError::InvalidTorrent("Invalid 'files' field".to_string())
            })?;
            info.files = files_list
                .iter()
                .map(file_info_from_bencode)
                .collect::<Result<Vec<_>>>()?;
        }

        Ok(info)
    }

    pub fn to_bencode(&self) -> BencodeValue {
        let mut dict = BTreeMap::new();
        dict.insert(b"name".to_vec(), BencodeValue::string(&self.name));
        dict.insert(
            b"piece length".to_vec(),
            BencodeValue::Integer(self.piece_length as i64),
        );
        dict.insert(b"pieces".to_vec(), BencodeValue::String(self.pieces.clone()));

        if self.files.is_empty() {
            dict.insert(b"length".to_vec(), BencodeValue::Integer(self.length as i64));
        } else {
            let files = self
                .files
                .iter()
                .map(|fi| {
                    let mut file = BTreeMap::new();
                    file.insert(b"length".to_vec(), BencodeValue::Integer(fi.length as i64));
                    file.insert(
                        b"path".to_vec(),
                        BencodeValue::List(fi.path.iter().map(BencodeValue::string).collect()),
                    );
                    BencodeValue::Dict(file)
                })
                .collect();
            dict.insert(b"files".to_vec(), BencodeValue::List(files));
        }

        if let Some(private) = self.private {
            dict.insert(b"private".to_vec(), BencodeValue::Integer(private as i64));
        }
        if let Some(source) = &self.source {
            dict.insert(b"source".to_vec(), BencodeValue::string(source));
        }

        BencodeValue::Dict(dict)
    }

    pub fn total_length(&self) -> u64 {
        if self.files.is_empty() {
            self.length
        } else {
            self.files.iter().map(|fi| fi.length).sum()
        }
    }

    pub fn num_pieces(&self) -> usize {
        self.pieces.len() / HASH_SIZE
    }

    pub fn is_dir(&self) -> bool {
        !self.files.is_empty()
    }

    /// The piece at `index`. Accessors of the returned piece panic if
    /// `index >= num_pieces()`.
    pub fn piece(&self, index: usize) -> Piece<'_> {
        Piece::new(self, index)
    }

    pub fn piece_hashes(&self) -> impl Iterator<Item = Hash> + '_ {
        self.pieces
            .chunks_exact(HASH_SIZE)
            .filter_map(|chunk| Hash::from_slice(chunk).ok())
    }

    /// The files as a list even for single-file torrents, whose one entry has
    /// an empty path.
    pub fn upverted_files(&self) -> Vec<FileInfo> {
        if self.files.is_empty() {
            vec![FileInfo {
                length: self.length,
                path: Vec::new(),
            }]
        } else {
            self.files.clone()
        }
    }

    /// Hash the concatenated contents of every file, one digest per piece.
    ///
    /// `open` is called once per file in order. Data is streamed, so the
    /// torrent never has to fit in memory.
    pub fn generate_pieces<F, R>(&mut self, mut open: F) -> Result<()>
    where
        F: FnMut(&FileInfo) -> Result<R>,
        R: Read,
    {
        if self.piece_length == 0 {
            return Err(BittorrentError::ZeroPieceLength);
        }

        let mut pieces = Vec::new();
        let mut hasher = Sha1::new();
        let mut in_piece = 0u64;
        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        for fi in self.upverted_files() {
            let label = if fi.path.is_empty() {
                PathBuf::from(&self.name)
            } else {
                fi.path.iter().collect()
            };
            let mut reader = open(&fi)?;

            loop {
                let n = match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => return Err(BittorrentError::file(label, e)),
                };

                let mut chunk = &buf[..n];
                while !chunk.is_empty() {
                    let take = chunk.len().min((self.piece_length - in_piece) as usize);
                    hasher.update(&chunk[..take]);
                    in_piece += take as u64;
                    chunk = &chunk[take..];

                    if in_piece == self.piece_length {
                        pieces.extend_from_slice(&hasher.finalize_reset());
                        in_piece = 0;
                    }
                }
            }
        }

        if in_piece > 0 {
            pieces.extend_from_slice(&hasher.finalize());
        }

        debug!(
            "Generated {} piece hashes for {}",
            pieces.len() / HASH_SIZE,
            self.name
        );
        self.pieces = pieces;
        Ok(())
    }

    /// Fill in the info from the file or directory at `root`.
    ///
    /// A directory's files are listed relative to `root` and sorted by path.
    /// The name defaults to the base name of `root` and the piece length to
    /// [`choose_piece_length`] when unset.
    pub fn build_from_file_path(&mut self, root: impl AsRef<Path>) -> Result<()> {
        let root = root.as_ref();

        if self.name.is_empty() {
            self.name = root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
        }

        self.files.clear();
        self.length = 0;

        let meta = fs::metadata(root).map_err(|e| BittorrentError::file(root, e))?;
        if meta.is_dir() {
            let mut files = Vec::new();
            walk(root, &mut Vec::new(), &mut files)?;
            files.sort_by_key(FileInfo::display_path);
            self.files = files;
        } else {
            self.length = meta.len();
        }

        if self.piece_length == 0 {
            self.piece_length = choose_piece_length(self.total_length());
        }

        info!(
            "Hashing {} ({} bytes, piece length {})",
            root.display(),
            self.total_length(),
            self.piece_length
        );

        let is_dir = meta.is_dir();
        self.generate_pieces(|fi| {
            let path = if is_dir {
                fi.path.iter().fold(root.to_path_buf(), |p, seg| p.join(seg))
            } else {
                root.to_path_buf()
            };
            File::open(&path).map_err(|e| BittorrentError::file(path, e))
        })
    }
}

/// A power of two, at least [`MINIMUM_PIECE_LENGTH`], giving fewer than 2048
/// pieces where possible.
pub fn choose_piece_length(total_length: u64) -> u64 {
    let mut piece_length = MINIMUM_PIECE_LENGTH;
    while total_length / piece_length >= 2048 {
        piece_length *= 2;
    }
    piece_length
}

// Symlinked directories are skipped so a link cycle cannot recurse forever
fn walk(dir: &Path, prefix: &mut Vec<String>, out: &mut Vec<FileInfo>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| BittorrentError::file(dir, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| BittorrentError::file(dir, e))?;
        let path = entry.path();
        let link = fs::symlink_metadata(&path).map_err(|e| BittorrentError::file(&path, e))?;
        let is_symlink = link.file_type().is_symlink();
        let meta = if is_symlink {
            fs::metadata(&path).map_err(|e| BittorrentError::file(&path, e))?
        } else {
            link
        };

        if meta.is_dir() && is_symlink {
            warn!("Skipping symlinked directory {}", path.display());
            continue;
        }

        prefix.push(entry.file_name().to_string_lossy().into_owned());
        if meta.is_dir() {
            walk(&path, prefix, out)?;
        } else {
            out.push(FileInfo {
                length: meta.len(),
                path: prefix.clone(),
            });
        }
        prefix.pop();
    }

    Ok(())
}

fn file_info_from_bencode(value: &BencodeValue) -> Result<FileInfo> {
    let file_dict = value
        .as_dict()
        .ok_or_else(|| BittorrentError::InvalidTorrent("File entry must be a dict".to_string()))?;

    let length = file_dict
        .get(b"length".as_ref())
        .and_then(|v| v.as_integer())
        .and_then(|v| u64::try_from(v).ok())
        .ok_or_else(|| BittorrentError::InvalidTorrent("Missing file 'length'".to_string()))?;

    let path = file_dict
        .get(b"path".as_ref())
        .and_then(|v| v.as_list())
        .ok_or_else(|| BittorrentError::InvalidTorrent("Missing file 'path'".to_string()))?
        .iter()
        .map(|v| {
            v.as_str()
                .map(String::from)
                .ok_or_else(|| BittorrentError::InvalidTorrent("Invalid path component".to_string()))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(FileInfo { length, path })
}
