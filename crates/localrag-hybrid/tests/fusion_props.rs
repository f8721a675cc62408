use proptest::prelude::*;
use std::collections::HashSet;

use localrag_core::types::{CandidateList, Chunk, ScoredChunk, SourceKind};
use localrag_hybrid::rerank::select;
use localrag_hybrid::{fuse, RerankOptions, DEFAULT_RRF_CONSTANT};

fn list(ids: Vec<u8>, source: SourceKind) -> CandidateList {
	let mut seen = HashSet::new();
	ids.into_iter()
		.filter(|id| seen.insert(*id))
		.enumerate()
		.map(|(pos, id)| {
			#[allow(clippy::cast_precision_loss)]
			let score = 100.0 - pos as f32;
			ScoredChunk { chunk: Chunk::new(format!("chunk {id}"), "doc.txt"), score, source }
		})
		.collect()
}

proptest! {
	#[test]
	fn fusion_is_deterministic_and_sorted(
		dense in proptest::collection::vec(0u8..20, 0..15),
		sparse in proptest::collection::vec(0u8..20, 0..15),
		wd in 0.0f32..=1.0,
		ws in 0.0f32..=1.0,
	) {
		let lists = [(list(dense, SourceKind::Vector), wd), (list(sparse, SourceKind::Text), ws)];
		let a = fuse(&lists, DEFAULT_RRF_CONSTANT);
		let b = fuse(&lists, DEFAULT_RRF_CONSTANT);
		prop_assert_eq!(&a, &b);
		prop_assert!(a.windows(2).all(|w| w[0].score >= w[1].score));

		let unique: HashSet<String> = lists.iter().flat_map(|(l, _)| l.iter().map(|c| c.chunk.content.clone())).collect();
		prop_assert_eq!(a.len(), unique.len());
	}

	#[test]
	fn zero_weight_list_cannot_outrank(
		ignored in proptest::collection::vec(0u8..20, 1..15),
		used in proptest::collection::vec(0u8..20, 1..15),
		w in 0.01f32..=1.0,
	) {
		let ignored = list(ignored, SourceKind::Vector);
		let used = list(used, SourceKind::Text);
		let favored: HashSet<String> = used.iter().map(|c| c.chunk.content.clone()).collect();
		let fused = fuse(&[(ignored, 0.0), (used, w)], DEFAULT_RRF_CONSTANT);
		let first_unfavored = fused.iter().position(|f| !favored.contains(&f.chunk.content)).unwrap_or(fused.len());
		prop_assert!(fused[first_unfavored..].iter().all(|f| !favored.contains(&f.chunk.content)));
	}

	#[test]
	fn rerank_selection_respects_limits(
		scores in proptest::collection::vec(-5.0f32..5.0, 0..30),
		top_n in 1usize..12,
		threshold in proptest::option::of(-5.0f32..5.0),
	) {
		let chunks: Vec<Chunk> = (0..scores.len()).map(|i| Chunk::new(format!("c{i}"), "doc.txt")).collect();
		let options = RerankOptions { top_n, score_threshold: threshold, normalize_scores: false };
		let out = select(chunks, &scores, &options).unwrap();
		prop_assert!(out.len() <= top_n);
		let got: Vec<f64> = out.iter().map(|c| c.reranker_score().unwrap()).collect();
		prop_assert!(got.windows(2).all(|w| w[0] >= w[1]));
		if let Some(t) = threshold {
			prop_assert!(got.iter().all(|s| *s >= f64::from(t)));
		}
	}
}
