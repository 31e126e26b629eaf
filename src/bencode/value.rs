use std::collections::BTreeMap;

pub type Dict = BTreeMap<Vec<u8>, BencodeValue>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BencodeValue {
    Integer(i64),
    /// Byte string, not necessarily UTF-8
    String(Vec<u8>),
    List(Vec<BencodeValue>),
    /// Encoded with keys in sorted order
    Dict(Dict),
    /// Already-encoded bencode, written out verbatim. Never produced by the decoder.
    Raw(Vec<u8>),
}

impl BencodeValue {
    pub fn string(s: impl AsRef<[u8]>) -> Self {
        BencodeValue::String(s.as_ref().to_vec())
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            BencodeValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            BencodeValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// The byte string, if it is valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(self.as_bytes()?).ok()
    }

    pub fn as_list(&self) -> Option<&[BencodeValue]> {
        match self {
            BencodeValue::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            BencodeValue::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// `None` if this is not a dictionary or the key is absent
    pub fn dict_get(&self, key: &[u8]) -> Option<&BencodeValue> {
        self.as_dict()?.get(key)
    }

    pub fn dict_get_str(&self, key: &[u8]) -> Option<&str> {
        self.dict_get(key)?.as_str()
    }

    pub fn dict_get_int(&self, key: &[u8]) -> Option<i64> {
        self.dict_get(key)?.as_integer()
    }

    pub fn dict_get_list(&self, key: &[u8]) -> Option<&[BencodeValue]> {
        self.dict_get(key)?.as_list()
    }
}

impl From<i64> for BencodeValue {
    fn from(i: i64) -> Self {
        BencodeValue::Integer(i)
    }
}

impl From<&str> for BencodeValue {
    fn from(s: &str) -> Self {
        BencodeValue::string(s)
    }
}

impl From<String> for BencodeValue {
    fn from(s: String) -> Self {
        BencodeValue::String(s.into_bytes())
    }
}

impl From<Vec<BencodeValue>> for BencodeValue {
    fn from(list: Vec<BencodeValue>) -> Self {
        BencodeValue::List(list)
    }
}

impl From<Dict> for BencodeValue {
    fn from(dict: Dict) -> Self {
        BencodeValue::Dict(dict)
    }
}
