use sha2::{Digest, Sha256};

/// SHA-256 hash a string, returning the hex-encoded digest.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Short, non-reversible tag for a credential, safe to put in logs.
pub fn key_fingerprint(key: &str) -> String {
    let mut hex = sha256_hex(key);
    hex.truncate(12);
    hex
}
