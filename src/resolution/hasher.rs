use sha2::{Digest, Sha256};

/// Number of hex characters kept from each digest.
const DIGEST_CHARS: usize = 8;

fn short_digest(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let hex_str = hex::encode(hasher.finalize());
    hex_str[..DIGEST_CHARS].to_string()
}

/// Derives the anchor id of a bookmark from its collection id and name.
///
/// The format is `"d" + 8 hex chars + "_" + 8 hex chars`; the leading letter
/// keeps the token a valid markup identifier.
pub fn hash_destination(collection_id: &str, name: &str) -> String {
    format!("d{}_{}", short_digest(collection_id), short_digest(name))
}

/// URI fragment pointing at the anchor of a bookmark.
pub fn destination_fragment(collection_id: &str, name: &str) -> String {
    format!("#{}", hash_destination(collection_id, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(
            hash_destination("manual_a", "intro"),
            hash_destination("manual_a", "intro")
        );
    }

    #[test]
    fn test_hash_shape() {
        let id = hash_destination("manual_a", "intro");
        assert_eq!(id.len(), 1 + DIGEST_CHARS + 1 + DIGEST_CHARS);
        assert!(id.starts_with('d'));
        assert_eq!(id.as_bytes()[1 + DIGEST_CHARS], b'_');
        assert!(id[1..].chars().all(|c| c == '_' || c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_depends_on_both_inputs() {
        let base = hash_destination("manual_a", "intro");
        assert_ne!(base, hash_destination("manual_b", "intro"));
        assert_ne!(base, hash_destination("manual_a", "outro"));
    }

    #[test]
    fn test_fragment_prefix() {
        let fragment = destination_fragment("a", "b");
        assert_eq!(fragment, format!("#{}", hash_destination("a", "b")));
    }
}
