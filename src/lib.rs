//! BitTorrent peer wire protocol, handshakes, metainfo files and magnet links.

pub mod bencode;
pub mod error;
pub mod hash;
pub mod magnet;
pub mod metainfo;
pub mod peer;

pub use error::{BittorrentError, Result};
pub use hash::Hash;
pub use magnet::Magnet;
pub use metainfo::{Info, MetaInfo};
