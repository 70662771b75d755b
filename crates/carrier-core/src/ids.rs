//! Short control tokens for binding UI controls to jobs.
//!
//! Inline controls carry only a small opaque payload, so each job gets an
//! 8-hex-char token derived from its canonical key. Deterministic and cheap;
//! collision probability is negligible at the expected scale (a handful of
//! active + queued jobs).

use sha2::{Digest, Sha256};

/// Return the 8-char hex token for a canonical key.
pub fn short_token(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(&digest[..4])
}
