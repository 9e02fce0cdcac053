//! Enumeration digests for change detection
//!
//! A digest fingerprints the exact ordered identifier set a database
//! produces, so two documents (e.g. legacy and converted) can be compared
//! without storing either listing.

use sha2::{Digest, Sha256};

use crate::domain::Database;

/// Streaming SHA-256 over identifiers, one per line.
///
/// # Returns
/// 64-character lowercase hex string and the number of identifiers hashed
pub fn identifier_digest<I, S>(identifiers: I) -> (String, u64)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut hasher = Sha256::new();
    let mut count = 0u64;
    for id in identifiers {
        hasher.update(id.as_ref().as_bytes());
        hasher.update(b"\n");
        count += 1;
    }
    (hex::encode(hasher.finalize()), count)
}

/// Digest of everything `db` enumerates, in enumeration order.
pub fn channel_digest(db: &Database) -> (String, u64) {
    identifier_digest(db.enumerate_all().map(|c| c.identifier))
}

/// Short form for display (first 32 bits).
pub fn short_digest(digest: &str) -> &str {
    &digest[..digest.len().min(8)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_same_identifiers_when_hashing_then_deterministic() {
        let (a, n) = identifier_digest(["A:1", "A:2"]);
        let (b, _) = identifier_digest(vec!["A:1".to_string(), "A:2".to_string()]);
        assert_eq!(a, b);
        assert_eq!(n, 2);
        assert_eq!(a.len(), 64);
        assert_eq!(short_digest(&a).len(), 8);
    }

    #[test]
    fn given_reordered_identifiers_when_hashing_then_differs() {
        let (a, _) = identifier_digest(["A:1", "A:2"]);
        let (b, _) = identifier_digest(["A:2", "A:1"]);
        assert_ne!(a, b);
    }

    #[test]
    fn given_concatenation_ambiguity_when_hashing_then_line_breaks_separate() {
        let (a, _) = identifier_digest(["AB", "C"]);
        let (b, _) = identifier_digest(["A", "BC"]);
        assert_ne!(a, b);
    }
}
