//! # Synthetic Thread Keys
//!
//! Non-content operations (token negotiation for the meta scope, settings,
//! identity, reporting, reactions) still have to name a thread on the wire.
//! They use keys from a reserved namespace derived from the install
//! credential, so they are stable per install and never collide with a
//! caller's real discussion keys.
//!
//! ```text
//! sys:<purpose>:<first 32 hex chars of SHA-256("parley/<purpose>/" + api_key)>
//!
//! sys:meta:4f1c9e...      ◄── meta token negotiation
//! sys:settings:a07b3d...  ◄── GET /comments/settings
//! ```
//!
//! Caller-supplied keys starting with `sys:` are rejected by
//! [`validate_thread_key`](crate::validation::validate_thread_key).

use sha2::{Digest, Sha256};

/// Prefix reserved for synthetic keys.
pub const SYNTHETIC_KEY_PREFIX: &str = "sys:";

/// Hex characters of the digest kept in a synthetic key.
const DIGEST_HEX_LEN: usize = 32;

/// What a synthetic key is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyPurpose {
    /// Meta-scope token negotiation.
    Meta,
    /// Profile upserts.
    Identity,
    /// Moderation settings reads.
    Settings,
    /// Comment reports.
    Reporting,
    /// Reaction changes.
    Reactions,
}

impl KeyPurpose {
    /// Stable wire name of the purpose.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyPurpose::Meta => "meta",
            KeyPurpose::Identity => "identity",
            KeyPurpose::Settings => "settings",
            KeyPurpose::Reporting => "reporting",
            KeyPurpose::Reactions => "reactions",
        }
    }
}

impl std::fmt::Display for KeyPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// SHA-256 fingerprint of the install credential, hex encoded.
///
/// Safe to log; the credential cannot be recovered from it.
pub fn credential_fingerprint(api_key: &str) -> String {
    hex::encode(Sha256::digest(api_key.as_bytes()))
}

/// Derives the synthetic thread key for `purpose`.
pub fn synthetic_thread_key(api_key: &str, purpose: KeyPurpose) -> String {
    let digest = Sha256::new()
        .chain_update(b"parley/")
        .chain_update(purpose.as_str().as_bytes())
        .chain_update(b"/")
        .chain_update(api_key.as_bytes())
        .finalize();
    let hex = hex::encode(digest);

    format!(
        "{}{}:{}",
        SYNTHETIC_KEY_PREFIX,
        purpose.as_str(),
        &hex[..DIGEST_HEX_LEN]
    )
}

/// Returns true if `key` lives in the synthetic namespace.
pub fn is_synthetic_key(key: &str) -> bool {
    key.trim_start().starts_with(SYNTHETIC_KEY_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_key_is_deterministic() {
        let a = synthetic_thread_key("pk_test_123", KeyPurpose::Meta);
        let b = synthetic_thread_key("pk_test_123", KeyPurpose::Meta);
        assert_eq!(a, b);
        assert!(a.starts_with("sys:meta:"));
        assert_eq!(a.len(), "sys:meta:".len() + DIGEST_HEX_LEN);
        assert!(is_synthetic_key(&a));
    }

    #[test]
    fn test_synthetic_keys_differ_by_purpose_and_credential() {
        let meta = synthetic_thread_key("pk_test_123", KeyPurpose::Meta);
        let settings = synthetic_thread_key("pk_test_123", KeyPurpose::Settings);
        let other = synthetic_thread_key("pk_test_456", KeyPurpose::Meta);
        assert_ne!(meta, settings);
        assert_ne!(meta, other);
        assert_ne!(meta[9..], settings[13..]);
    }

    #[test]
    fn test_fingerprint() {
        // SHA-256("abc")
        assert_eq!(
            credential_fingerprint("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
