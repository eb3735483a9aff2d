use sha2::{Digest, Sha256};

/// SHA-256 fingerprint of a post body, hex encoded.
///
/// Stored alongside every backup so identical snapshots are easy to spot when
/// browsing; it is never used to suppress a snapshot.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::content_hash;

    #[test]
    fn identical_bodies_share_a_fingerprint() {
        assert_eq!(content_hash("<p>uno</p>"), content_hash("<p>uno</p>"));
        assert_ne!(content_hash("<p>uno</p>"), content_hash("<p>due</p>"));
        assert_eq!(content_hash("").len(), 64);
    }
}
