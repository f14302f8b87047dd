use {
    serde::{Deserialize, Serialize},
    serde_with::{base64::Base64, serde_as},
};

/// Identifies an advertiser taking part in an auction.
#[derive(
    Clone,
    Debug,
    Default,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
pub struct BuyerId(pub String);

impl From<&str> for BuyerId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl AsRef<str> for BuyerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Opaque, already encoded signals a buyer contributes to a remote auction
/// next to its candidates.
#[serde_as]
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedSignals {
    #[serde_as(as = "Base64")]
    pub payload: Vec<u8>,
}

impl EncodedSignals {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signals_serialize_as_base64() {
        let signals = EncodedSignals::new(*b"hello");
        let json = serde_json::to_string(&signals).unwrap();
        assert_eq!(json, r#""aGVsbG8=""#);
        assert_eq!(
            serde_json::from_str::<EncodedSignals>(&json).unwrap(),
            signals
        );
    }

    #[test]
    fn buyer_id_is_a_plain_string() {
        let buyer: BuyerId = serde_json::from_str(r#""buyer.example""#).unwrap();
        assert_eq!(buyer, BuyerId::from("buyer.example"));
        assert_eq!(buyer.to_string(), "buyer.example");
    }
}
