//! Secret keys are stored as SHA-256 digests and checked without early exit.

use sha2::{Digest, Sha256};

pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Check `provided` against a stored digest in time independent of where they differ.
pub fn verify_secret(provided: &str, stored_hash: &str) -> bool {
    constant_time_eq(hash_secret(provided).as_bytes(), stored_hash.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
