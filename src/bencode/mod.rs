//! Minimal bencode support for metainfo files and extended handshakes.

mod decoder;
mod encoder;
mod value;

pub use decoder::{decode, raw_dict_value, MAX_NESTING_DEPTH};
pub use encoder::encode;
pub use value::{BencodeValue, Dict};
