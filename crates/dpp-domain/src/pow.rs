//! Stage 1 proof-of-work predicate. Pure and CPU-bound: callers must hash
//! on a blocking thread rather than awaiting it inline on the connection
//! task.

use sha2::{Digest, Sha256};

/// `SHA256(nonce_bytes || utf8(solution))` as lowercase hex.
pub fn digest_hex(nonce: &[u8], solution: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(nonce);
    hasher.update(solution.as_bytes());
    hex::encode(hasher.finalize())
}

/// Accept iff the digest begins with `difficulty` `'0'` hex characters.
/// Difficulty 0 accepts any solution.
pub fn verify_solution(nonce: &[u8], solution: &str, difficulty: u32) -> bool {
    let digest = digest_hex(nonce, solution);
    let prefix: String = std::iter::repeat('0').take(difficulty as usize).collect();
    digest.starts_with(&prefix)
}
