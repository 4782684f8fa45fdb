//! Request-hash computation for the idempotency state table (spec §4.4).

use sha2::{Digest, Sha256};

/// Hash `method`, `path`, and the raw request body into the hex digest stored
/// alongside an `IdempotencyKey` row. Two requests that replay the same key
/// must produce the same hash to be treated as a retry rather than a
/// parameter mismatch (invariant 6, spec §3.2).
pub fn request_hash(method: &str, path: &str, body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\0");
    hasher.update(path.as_bytes());
    hasher.update(b"\0");
    hasher.update(body);
    hex::encode(hasher.finalize())
}
