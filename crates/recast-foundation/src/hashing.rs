//! Content-derived identities

use sha2::{Digest, Sha256};

/// Length of the hex prefix kept from the SHA-256 digest
const HASH_LENGTH: usize = 20;

/// Hash a sequence of parts into a stable hex identity.
///
/// Parts are length-prefixed so that `["ab", "c"]` and `["a", "bc"]` differ.
pub fn content_hash<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<[u8]>,
{
    let mut hasher = Sha256::new();
    for part in parts {
        let part = part.as_ref();
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    let digest = format!("{:x}", hasher.finalize());
    digest[..HASH_LENGTH].to_string()
}
