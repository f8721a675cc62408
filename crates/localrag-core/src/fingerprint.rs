//! Content fingerprint of an ordered chunk set.
//!
//! The digest is the cache key that ties a persisted vector index to the exact
//! chunking run it was built from, so chunk order is part of the input.

use sha2::{Digest, Sha256};

use crate::types::Chunk;

/// SHA-256 hex digest over every chunk's content and canonical metadata JSON.
pub fn fingerprint(chunks: &[Chunk]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((chunks.len() as u64).to_le_bytes());
    for chunk in chunks {
        update_field(&mut hasher, chunk.content.as_bytes());
        // BTreeMap keys serialize sorted; the map cannot fail to serialize.
        let meta = serde_json::to_vec(&chunk.metadata).unwrap_or_default();
        update_field(&mut hasher, &meta);
    }
    format!("{:x}", hasher.finalize())
}

// Length prefix keeps ("ab", "c") and ("a", "bc") apart.
fn update_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Metadata;
    use serde_json::json;

    fn corpus() -> Vec<Chunk> {
        vec![
            Chunk::new("cats are mammals", "docs/animals.txt"),
            Chunk::new("dogs are mammals", "docs/animals.txt"),
            Chunk::new("rocks are not alive", "docs/geology.txt"),
        ]
    }

    #[test]
    fn repeatable() {
        assert_eq!(fingerprint(&corpus()), fingerprint(&corpus()));
        assert_eq!(fingerprint(&corpus()).len(), 64);
    }

    #[test]
    fn content_change_changes_hash() {
        let mut changed = corpus();
        changed[1].content.push('!');
        assert_ne!(fingerprint(&corpus()), fingerprint(&changed));
    }

    #[test]
    fn metadata_change_changes_hash() {
        let mut changed = corpus();
        changed[2].metadata.insert("page".into(), json!(3));
        assert_ne!(fingerprint(&corpus()), fingerprint(&changed));
    }

    #[test]
    fn order_changes_hash() {
        let mut swapped = corpus();
        swapped.swap(0, 1);
        assert_ne!(fingerprint(&corpus()), fingerprint(&swapped));
    }

    #[test]
    fn metadata_insertion_order_is_irrelevant() {
        let mut a = Metadata::new();
        a.insert("source".into(), json!("x.txt"));
        a.insert("page".into(), json!(1));
        let mut b = Metadata::new();
        b.insert("page".into(), json!(1));
        b.insert("source".into(), json!("x.txt"));
        let left = vec![Chunk { content: "x".into(), metadata: a }];
        let right = vec![Chunk { content: "x".into(), metadata: b }];
        assert_eq!(fingerprint(&left), fingerprint(&right));
    }

    #[test]
    fn field_boundaries_do_not_alias() {
        let left = vec![Chunk { content: "ab".into(), metadata: Metadata::new() }];
        let right = vec![Chunk { content: "a".into(), metadata: Metadata::new() }];
        assert_ne!(fingerprint(&left), fingerprint(&right));
        assert_ne!(fingerprint(&[]), fingerprint(&right));
    }
}
