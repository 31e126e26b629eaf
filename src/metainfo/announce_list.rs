use crate::bencode::BencodeValue;

/// Tiers of tracker URLs, as in the `announce-list` key
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnnounceList(pub Vec<Vec<String>>);

impl AnnounceList {
    /// Whether this list should be used instead of the `announce` key.
    /// Any non-empty URL wins; so does any URL at all when `announce` is empty.
    pub fn overrides_announce(&self, announce: &str) -> bool {
        self.0
            .iter()
            .flatten()
            .any(|url| !url.is_empty() || announce.is_empty())
    }

    /// Every URL once, in first-seen order
    pub fn distinct_values(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for url in self.0.iter().flatten() {
            if !seen.contains(url) {
                seen.push(url.clone());
            }
        }
        seen
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn from_bencode(value: &BencodeValue) -> Self {
        let tiers = value
            .as_list()
            .unwrap_or_default()
            .iter()
            .filter_map(|tier| {
                tier.as_list().map(|urls| {
                    urls.iter()
                        .filter_map(|u| u.as_str().map(String::from))
                        .collect()
                })
            })
            .collect();
        Self(tiers)
    }

    pub(crate) fn to_bencode(&self) -> BencodeValue {
        BencodeValue::List(
            self.0
                .iter()
                .map(|tier| BencodeValue::List(tier.iter().map(BencodeValue::string).collect()))
                .collect(),
        )
    }
}

impl From<Vec<Vec<String>>> for AnnounceList {
    fn from(tiers: Vec<Vec<String>>) -> Self {
        Self(tiers)
    }
}
