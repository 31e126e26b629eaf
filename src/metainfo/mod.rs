mod announce_list;
mod info;
mod metainfo;
mod piece;

pub use announce_list::AnnounceList;
pub use info::{choose_piece_length, FileInfo, Info, MINIMUM_PIECE_LENGTH};
pub use metainfo::{MetaInfo, Node};
pub use piece::Piece;

use crate::error::Result;
use std::path::Path;

/// Load and parse a .torrent file
pub async fn load_torrent_file<P: AsRef<Path>>(path: P) -> Result<MetaInfo> {
    MetaInfo::load_from_file(path).await
}

/// Parse torrent data from bytes
pub fn parse_torrent(data: &[u8]) -> Result<MetaInfo> {
    MetaInfo::load(data)
}
