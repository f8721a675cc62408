//! Weighted reciprocal-rank fusion.
//!
//! A chunk's fused score is `sum(weight_i / (rank_i + c))` over the lists it
//! appears in, with 1-based ranks. Chunks are identified by content plus
//! `source`; duplicates are merged and their metadata unioned, first writer
//! wins on conflicting keys.

use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

use localrag_core::error::{Error, Result};
use localrag_core::traits::Retriever;
use localrag_core::types::{CandidateList, Chunk, ChunkKey, SourceKind};

pub const DEFAULT_RRF_CONSTANT: f32 = 60.0;

#[derive(Debug, Clone, PartialEq)]
pub struct FusedChunk {
	pub chunk: Chunk,
	pub score: f32,
	/// Engines that returned this chunk, in list order.
	pub retrieved_by: Vec<SourceKind>,
}

struct Entry {
	chunk: Chunk,
	score: f64,
	ranks: Vec<Option<usize>>,
	first_seen: usize,
	retrieved_by: Vec<SourceKind>,
}

/// Fuses ranked candidate lists. Ordering is fused score descending; ties go
/// to the better rank in the highest-weighted list, then the next list, then
/// first appearance.
pub fn fuse(lists: &[(CandidateList, f32)], rrf_constant: f32) -> Vec<FusedChunk> {
	let c = f64::from(rrf_constant);
	let mut entries: Vec<Entry> = Vec::new();
	let mut by_key: HashMap<ChunkKey, usize> = HashMap::new();

	for (list_idx, (candidates, weight)) in lists.iter().enumerate() {
		for (pos, candidate) in candidates.iter().enumerate() {
			let slot = *by_key.entry(candidate.chunk.key()).or_insert_with(|| {
				entries.push(Entry { chunk: candidate.chunk.clone(), score: 0.0, ranks: vec![None; lists.len()], first_seen: entries.len(), retrieved_by: Vec::new() });
				entries.len() - 1
			});
			let entry = &mut entries[slot];
			// A repeat within one list keeps its best rank only.
			if entry.ranks[list_idx].is_some() { continue; }
			let rank = pos + 1;
			entry.ranks[list_idx] = Some(rank);
			entry.score += f64::from(*weight) / (rank as f64 + c);
			if !entry.retrieved_by.contains(&candidate.source) {
				entry.retrieved_by.push(candidate.source);
			}
			for (k, v) in &candidate.chunk.metadata {
				entry.chunk.metadata.entry(k.clone()).or_insert_with(|| v.clone());
			}
		}
	}

	let mut by_weight: Vec<usize> = (0..lists.len()).collect();
	by_weight.sort_by(|&a, &b| lists[b].1.total_cmp(&lists[a].1));

	entries.sort_by(|a, b| {
		b.score.total_cmp(&a.score)
			.then_with(|| by_weight.iter().map(|&i| cmp_rank(a.ranks[i], b.ranks[i])).find(|o| o.is_ne()).unwrap_or(Ordering::Equal))
			.then(a.first_seen.cmp(&b.first_seen))
	});

	#[allow(clippy::cast_possible_truncation)]
	entries.into_iter().map(|e| FusedChunk { chunk: e.chunk, score: e.score as f32, retrieved_by: e.retrieved_by }).collect()
}

// Present beats absent; lower rank beats higher.
fn cmp_rank(a: Option<usize>, b: Option<usize>) -> Ordering {
	match (a, b) {
		(Some(x), Some(y)) => x.cmp(&y),
		(Some(_), None) => Ordering::Less,
		(None, Some(_)) => Ordering::Greater,
		(None, None) => Ordering::Equal,
	}
}

pub struct WeightedRetriever {
	pub retriever: Box<dyn Retriever>,
	pub weight: f32,
	pub top_k: usize,
}

/// Queries every member with its own `top_k` and fuses the results.
pub struct EnsembleRetriever {
	members: Vec<WeightedRetriever>,
	rrf_constant: f32,
}

impl EnsembleRetriever {
	pub fn new(rrf_constant: f32) -> Result<Self> {
		if !(rrf_constant > 0.0) {
			return Err(Error::InvalidArgument(format!("rrf constant must be positive, got {rrf_constant}")));
		}
		Ok(Self { members: Vec::new(), rrf_constant })
	}

	pub fn push(&mut self, retriever: Box<dyn Retriever>, weight: f32, top_k: usize) -> Result<()> {
		if !(0.0..=1.0).contains(&weight) {
			return Err(Error::InvalidArgument(format!("retriever weight must be within [0, 1], got {weight}")));
		}
		if top_k == 0 {
			return Err(Error::InvalidArgument("retriever top_k must be at least 1".into()));
		}
		self.members.push(WeightedRetriever { retriever, weight, top_k });
		Ok(())
	}

	pub fn len(&self) -> usize { self.members.len() }

	pub fn is_empty(&self) -> bool { self.members.is_empty() }

	pub fn retrieve(&self, query: &str) -> Result<Vec<FusedChunk>> {
		let mut lists = Vec::with_capacity(self.members.len());
		for member in &self.members {
			let candidates = member.retriever.retrieve(query, member.top_k)?;
			debug!(weight = member.weight, hits = candidates.len(), "retriever finished");
			lists.push((candidates, member.weight));
		}
		let fused = fuse(&lists, self.rrf_constant);
		for f in &fused {
			debug!(source = f.chunk.source().unwrap_or("-"), score = f.score, retrieved_by = ?f.retrieved_by, "fused candidate");
		}
		Ok(fused)
	}
}
