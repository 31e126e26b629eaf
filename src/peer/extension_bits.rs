use std::fmt;

/// Bit position in the handshake's reserved bytes, numbered from the least
/// significant bit of the last byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExtensionBit(pub u8);

impl ExtensionBit {
    /// BEP 5
    pub const DHT: ExtensionBit = ExtensionBit(0);
    /// BEP 6
    pub const FAST: ExtensionBit = ExtensionBit(2);
    /// BEP 52 upgrade bit
    pub const V2_UPGRADE: ExtensionBit = ExtensionBit(4);
    /// BEP 10
    pub const EXTENDED: ExtensionBit = ExtensionBit(20);
    pub const AZUREUS_MESSAGING: ExtensionBit = ExtensionBit(63);

    fn name(self) -> Option<&'static str> {
        match self.0 {
            0 => Some("dht"),
            2 => Some("fast"),
            4 => Some("v2"),
            20 => Some("ltep"),
            63 => Some("azureus"),
            _ => None,
        }
    }
}

/// The 8 reserved handshake bytes advertising protocol extensions
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PeerExtensionBits(pub [u8; 8]);

impl PeerExtensionBits {
    pub fn new(bits: &[ExtensionBit]) -> Self {
        let mut ret = Self::default();
        for bit in bits {
            ret.set_bit(*bit, true);
        }
        ret
    }

    pub fn get_bit(&self, bit: ExtensionBit) -> bool {
        let (byte, mask) = Self::locate(bit);
        self.0[byte] & mask != 0
    }

    pub fn set_bit(&mut self, bit: ExtensionBit, on: bool) {
        let (byte, mask) = Self::locate(bit);
        if on {
            self.0[byte] |= mask;
        } else {
            self.0[byte] &= !mask;
        }
    }

    fn locate(bit: ExtensionBit) -> (usize, u8) {
        let bit = bit.0 % 64;
        (7 - (bit / 8) as usize, 1 << (bit % 8))
    }

    pub fn supports_dht(&self) -> bool {
        self.get_bit(ExtensionBit::DHT)
    }

    pub fn supports_fast(&self) -> bool {
        self.get_bit(ExtensionBit::FAST)
    }

    pub fn supports_extended(&self) -> bool {
        self.get_bit(ExtensionBit::EXTENDED)
    }
}

impl From<[u8; 8]> for PeerExtensionBits {
    fn from(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for PeerExtensionBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for PeerExtensionBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        let mut unknown = Vec::new();
        for i in 0..64 {
            let bit = ExtensionBit(i);
            if !self.get_bit(bit) {
                continue;
            }
            match bit.name() {
                Some(name) => names.push(name.to_string()),
                None => unknown.push(i.to_string()),
            }
        }
        if !unknown.is_empty() {
            names.push(format!("unknown bits: {}", unknown.join(",")));
        }
        write!(f, "PeerExtensionBits({})", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_positions() {
        let bits = PeerExtensionBits::new(&[ExtensionBit::DHT]);
        assert_eq!(bits.0, [0, 0, 0, 0, 0, 0, 0, 0x01]);

        let bits = PeerExtensionBits::new(&[ExtensionBit::FAST]);
        assert_eq!(bits.0, [0, 0, 0, 0, 0, 0, 0, 0x04]);

        let bits = PeerExtensionBits::new(&[ExtensionBit::EXTENDED]);
        assert_eq!(bits.0, [0, 0, 0, 0, 0, 0x10, 0, 0]);

        let bits = PeerExtensionBits::new(&[ExtensionBit::AZUREUS_MESSAGING]);
        assert_eq!(bits.0, [0x80, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_supports_queries() {
        let mut bits = PeerExtensionBits::new(&[ExtensionBit::FAST, ExtensionBit::EXTENDED]);
        assert!(bits.supports_fast());
        assert!(bits.supports_extended());
        assert!(!bits.supports_dht());

        bits.set_bit(ExtensionBit::FAST, false);
        assert!(!bits.supports_fast());
        assert!(bits.supports_extended());
    }

    #[test]
    fn test_formatting() {
        let bits = PeerExtensionBits::new(&[ExtensionBit::DHT, ExtensionBit(9)]);
        assert_eq!(bits.to_string(), "0000000000000201");
        assert_eq!(
            format!("{:?}", bits),
            "PeerExtensionBits(dht, unknown bits: 9)"
        );
    }
}
