// hasher.rs — Content hash of combined policy text.
//
// SHA-256, lowercase hex (64 chars). Used only for change detection
// between refreshes.

use sha2::{Digest, Sha256};

pub fn hash_str(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    format!("{:x}", hasher.finalize())
}
