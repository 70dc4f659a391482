use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::models::ChatRequest;

/// Hex encoded SHA-256 digest identifying a chat payload.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub const LEN: usize = 64;

    /// Accepts an already computed digest, e.g. a file stem read back from disk.
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = raw.len() == Self::LEN
            && raw.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Field order here is the canonical order: keys sorted, so the text
// never depends on how the request struct happens to be declared.
#[derive(Serialize)]
struct CanonicalMessage<'a> {
    content: &'a str,
    role: &'a str,
}

#[derive(Serialize)]
struct CanonicalPayload<'a> {
    messages: Vec<CanonicalMessage<'a>>,
    model: &'a str,
}

/// Compact, sorted-key JSON text of the normalized payload.
pub fn canonical_payload(req: &ChatRequest) -> Result<String, serde_json::Error> {
    let payload = CanonicalPayload {
        messages: req
            .messages
            .iter()
            .map(|m| CanonicalMessage {
                content: &m.content,
                role: &m.role,
            })
            .collect(),
        model: &req.model,
    };
    serde_json::to_string(&payload)
}

// Create a cache key (hash of the canonical model + messages text)
pub fn make_cache_key(req: &ChatRequest) -> Result<CacheKey, serde_json::Error> {
    let mut hasher = Sha256::new();
    hasher.update(canonical_payload(req)?.as_bytes());
    Ok(CacheKey(format!("{:x}", hasher.finalize())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Message;

    fn request(model: &str, turns: &[(&str, &str)]) -> ChatRequest {
        ChatRequest {
            model: model.to_string(),
            messages: turns
                .iter()
                .map(|(role, content)| Message {
                    role: role.to_string(),
                    content: content.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn canonical_text_has_sorted_keys() {
        let req = request("llama3", &[("user", "hi")]);
        assert_eq!(
            canonical_payload(&req).unwrap(),
            r#"{"messages":[{"content":"hi","role":"user"}],"model":"llama3"}"#
        );
    }

    #[test]
    fn key_is_deterministic_and_hex() {
        let req = request("llama3", &[("user", "hi")]);
        let a = make_cache_key(&req).unwrap();
        let b = make_cache_key(&req.clone()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), CacheKey::LEN);
        assert!(CacheKey::parse(a.as_str()).is_some());
    }

    #[test]
    fn key_ignores_inbound_field_order() {
        let a: ChatRequest = serde_json::from_str(
            r#"{"model":"llama3","messages":[{"role":"user","content":"hi"}]}"#,
        )
        .unwrap();
        let b: ChatRequest = serde_json::from_str(
            r#"{"messages":[{"content":"hi","role":"user"}],"model":"llama3","stream":false}"#,
        )
        .unwrap();
        assert_eq!(make_cache_key(&a).unwrap(), make_cache_key(&b).unwrap());
    }

    #[test]
    fn any_field_change_changes_the_key() {
        let key = |req: ChatRequest| make_cache_key(&req).unwrap();
        let base = key(request("llama3", &[("user", "hi")]));
        assert_ne!(base, key(request("mistral", &[("user", "hi")])));
        assert_ne!(base, key(request("llama3", &[("system", "hi")])));
        assert_ne!(base, key(request("llama3", &[("user", "hi!")])));
        assert_ne!(base, key(request("llama3", &[("user", "hi"), ("user", "hi")])));
    }

    #[test]
    fn key_is_never_the_digest_of_empty_text() {
        let empty = format!("{:x}", Sha256::digest(b""));
        let key = make_cache_key(&request("", &[])).unwrap();
        assert_ne!(key.as_str(), empty);
        assert_eq!(canonical_payload(&request("", &[])).unwrap(), r#"{"messages":[],"model":""}"#);
    }

    #[test]
    fn message_boundaries_are_not_ambiguous() {
        let joined = request("m", &[("user", "ab")]);
        let split = request("m", &[("user", "a"), ("user", "b")]);
        assert_ne!(make_cache_key(&joined).unwrap(), make_cache_key(&split).unwrap());
    }

    #[test]
    fn parse_rejects_non_digests() {
        assert!(CacheKey::parse("abc").is_none());
        assert!(CacheKey::parse(&"G".repeat(64)).is_none());
        assert!(CacheKey::parse(&"A".repeat(64)).is_none());
        assert!(CacheKey::parse(&"0f".repeat(32)).is_some());
    }
}
