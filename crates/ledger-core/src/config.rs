use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Who this node is: the url peers reach it on and its stable uuid.
///
/// Handed to every component that needs it at construction time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeIdentity {
    pub url: String,
    pub uuid: String,
}

impl NodeIdentity {
    pub fn new(url: impl Into<String>, uuid: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            uuid: uuid.into(),
        }
    }

    /// Identity with a freshly generated uuid.
    pub fn generate(url: impl Into<String>) -> Self {
        Self::new(url, generate_uuid())
    }
}

/// 128 random bits as 32 lowercase hex characters.
pub fn generate_uuid() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_uuids_are_hex_and_distinct() {
        let a = generate_uuid();
        let b = generate_uuid();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn generate_keeps_url() {
        let id = NodeIdentity::generate("http://127.0.0.1:8080");
        assert_eq!(id.url, "http://127.0.0.1:8080");
        assert_eq!(id.uuid.len(), 32);
    }
}
