use super::BencodeValue;
use crate::error::{BittorrentError, Result};
use std::collections::BTreeMap;

/// Lists and dictionaries nested deeper than this are rejected
pub const MAX_NESTING_DEPTH: usize = 64;

/// Decode bencoded data into a BencodeValue. Trailing bytes are an error.
pub fn decode(data: &[u8]) -> Result<BencodeValue> {
    let mut cursor = Cursor::new(data);
    let value = cursor.value()?;
    if cursor.pos != data.len() {
        return Err(error(format!(
            "{} trailing bytes after value",
            data.len() - cursor.pos
        )));
    }
    Ok(value)
}

/// Locate `key` in the top-level dictionary of `data` and return the exact
/// encoded bytes of its value, untouched.
pub fn raw_dict_value<'a>(data: &'a [u8], key: &[u8]) -> Result<Option<&'a [u8]>> {
    let mut cursor = Cursor::new(data);
    cursor.expect(b'd')?;
    cursor.depth = 1;

    while !cursor.at(b'e')? {
        let k = cursor.bytes()?;
        let start = cursor.pos;
        cursor.skip_value()?;
        if k == key {
            return Ok(Some(&data[start..cursor.pos]));
        }
    }

    Ok(None)
}

fn error(msg: impl Into<String>) -> BittorrentError {
    BittorrentError::BencodeError(msg.into())
}

/// Position within a bencoded buffer
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> Result<u8> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or_else(|| error("Unexpected end of input"))
    }

    fn expect(&mut self, token: u8) -> Result<()> {
        let c = self.peek()?;
        if c != token {
            return Err(error(format!(
                "Expected '{}' at offset {}, found '{}'",
                token as char, self.pos, c as char
            )));
        }
        self.pos += 1;
        Ok(())
    }

    /// Consumes `token` if it is next
    fn at(&mut self, token: u8) -> Result<bool> {
        if self.peek()? == token {
            self.pos += 1;
            return Ok(true);
        }
        Ok(false)
    }

    // Bytes up to (not including) `delim`, which is consumed
    fn until(&mut self, delim: u8, what: &str) -> Result<&'a [u8]> {
        let rest = &self.data[self.pos..];
        let end = rest
            .iter()
            .position(|&b| b == delim)
            .ok_or_else(|| error(format!("Unterminated {}", what)))?;
        self.pos += end + 1;
        Ok(&rest[..end])
    }

    fn value(&mut self) -> Result<BencodeValue> {
        match self.peek()? {
            b'i' => self.integer().map(BencodeValue::Integer),
            b'l' => self.nested(|c| {
                let mut list = Vec::new();
                while !c.at(b'e')? {
                    list.push(c.value()?);
                }
                Ok(BencodeValue::List(list))
            }),
            b'd' => self.nested(|c| {
                let mut dict = BTreeMap::new();
                while !c.at(b'e')? {
                    // Keys must be strings
                    let key = c.bytes()?.to_vec();
                    let value = c.value()?;
                    dict.insert(key, value);
                }
                Ok(BencodeValue::Dict(dict))
            }),
            b'0'..=b'9' => self.bytes().map(BencodeValue::string),
            c => Err(error(format!("Invalid bencode token: {}", c as char))),
        }
    }

    // Skips the opening token and decodes the body one level deeper
    fn nested<T>(&mut self, body: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(error(format!(
                "Nesting deeper than {} at offset {}",
                MAX_NESTING_DEPTH, self.pos
            )));
        }
        self.pos += 1;
        self.depth += 1;
        let result = body(self);
        self.depth -= 1;
        result
    }

    fn skip_value(&mut self) -> Result<()> {
        self.value().map(|_| ())
    }

    fn integer(&mut self) -> Result<i64> {
        self.expect(b'i')?;
        let digits = self.until(b'e', "integer")?;
        std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| error("Invalid integer"))
    }

    fn bytes(&mut self) -> Result<&'a [u8]> {
        let digits = self.until(b':', "string length")?;
        let len: usize = std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| error("Invalid string length"))?;

        if len > self.data.len() - self.pos {
            return Err(error("String length exceeds data"));
        }

        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }
}
