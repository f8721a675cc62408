use localrag_core::config::{EmbeddingProviderKind, EmbeddingSettings};
use localrag_core::traits::Embedder;
use localrag_embed::EmbeddingProvider;

#[test]
fn hashing_embedder_shapes_and_determinism() {
    let settings = EmbeddingSettings { provider: EmbeddingProviderKind::Hashing, dim: 1024, ..EmbeddingSettings::default() };
    let embedder = EmbeddingProvider::from_settings(&settings).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_many(&texts).expect("embed_many");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 1024, "embedding dim is 1024");
    assert_eq!(embedder.dim(), 1024);
    assert_eq!(embedder.model_id(), "hashing:d1024");

    // Norm approximately 1.0
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    // Deterministic for same input
    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn openai_provider_requires_url() {
    let settings = EmbeddingSettings { provider: EmbeddingProviderKind::OpenAi, url: None, ..EmbeddingSettings::default() };
    let err = EmbeddingProvider::from_settings(&settings).err().expect("missing url rejected");
    assert!(err.to_string().contains("embedding.url"));
}
