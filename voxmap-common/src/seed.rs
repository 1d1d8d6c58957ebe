//! Stable seed derivation for deterministic ordering
//!
//! The presentation order a voter sees must be reproducible across requests
//! and across reimplementations used for parity testing, so the seed basis is
//! pinned explicitly: SHA-256 over the UTF-8 string
//! `"{voter_id}:{poll_id}"` (or `"{voter_id}:{poll_id}:{override}"` when a
//! poll configures an override seed), taking the first 8 digest bytes as a
//! big-endian u64. Do not substitute a language-default hasher here.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Derive the ordering seed for a (voter, poll) pair
pub fn ordering_seed(voter_id: Uuid, poll_id: Uuid, override_seed: Option<i64>) -> u64 {
    let basis = match override_seed {
        Some(s) => format!("{}:{}:{}", voter_id, poll_id, s),
        None => format!("{}:{}", voter_id, poll_id),
    };
    seed_from_str(&basis)
}

/// First 8 bytes of SHA-256(input), big-endian
pub fn seed_from_str(input: &str) -> u64 {
    let digest = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}
