//! Model-free embedder for tests and offline development.
//!
//! Each normalized token is hashed into one of `dim` buckets; the bag of
//! buckets is L2-normalized. Texts sharing words get positive cosine
//! similarity, identical word multisets get similarity 1.

use anyhow::Result;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use localrag_core::traits::Embedder;

pub struct HashingEmbedder {
    dim: usize,
    id: String,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(1);
        Self { dim, id: format!("hashing:d{dim}") }
    }
}

impl Embedder for HashingEmbedder {
    fn model_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0f32; self.dim];
        for token in tokens(text) {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            #[allow(clippy::cast_possible_truncation)]
            let idx = (h % self.dim as u64) as usize;
            if let Some(slot) = v.get_mut(idx) { *slot += 1.0; }
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        Ok(v)
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }

    #[test]
    fn word_order_and_punctuation_do_not_matter() {
        let e = HashingEmbedder::new(256);
        let a = e.embed("cats are mammals").unwrap();
        let b = e.embed("Are cats mammals?").unwrap();
        assert!((cosine(&a, &b) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let e = HashingEmbedder::new(8);
        assert!(e.embed("  ").unwrap().iter().all(|x| *x == 0.0));
    }
}
