use super::BencodeValue;

/// Encode a BencodeValue into its byte representation
pub fn encode(value: &BencodeValue) -> Vec<u8> {
    let mut out = Vec::new();
    value.write_to(&mut out);
    out
}

impl BencodeValue {
    /// Append the encoding of this value to `out`. Dictionaries come out with
    /// sorted keys; `Raw` is copied as is.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            BencodeValue::Integer(i) => out.extend_from_slice(format!("i{}e", i).as_bytes()),
            BencodeValue::String(s) => write_bytes(s, out),
            BencodeValue::List(items) => {
                out.push(b'l');
                items.iter().for_each(|item| item.write_to(out));
                out.push(b'e');
            }
            BencodeValue::Dict(dict) => {
                out.push(b'd');
                for (key, value) in dict {
                    write_bytes(key, out);
                    value.write_to(out);
                }
                out.push(b'e');
            }
            BencodeValue::Raw(raw) => out.extend_from_slice(raw),
        }
    }
}

fn write_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(format!("{}:", bytes.len()).as_bytes());
    out.extend_from_slice(bytes);
}
