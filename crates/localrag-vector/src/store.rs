//! LanceDB-backed chunk table with exact cosine search.
//!
//! LanceDB only exposes an async API. The store owns a Tokio runtime and
//! blocks on it, so callers stay synchronous.

use arrow_array::types::Float32Type;
use arrow_array::{Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray};
use futures::TryStreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, DistanceType, Table};
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::{debug, info};

use localrag_core::error::{Error, Result};
use localrag_core::types::{Chunk, Metadata};

use crate::schema::{build_chunk_schema, vector_dim, CONTENT_COL, DISTANCE_COL, METADATA_COL, ORDINAL_COL, TABLE_NAME};

const WRITE_BATCH: usize = 1000;

/// One search result. `ordinal` is the chunk's insertion position.
#[derive(Debug, Clone)]
pub struct StoredHit {
	pub ordinal: usize,
	pub chunk: Chunk,
	pub similarity: f32,
}

pub struct VectorStore {
	rt: Runtime,
	table: Table,
	dim: usize,
}

impl VectorStore {
	/// Writes `chunks` with their `vectors` into a new dataset at `path`.
	pub fn build(path: &Path, chunks: &[Chunk], vectors: &[Vec<f32>], dim: usize) -> Result<Self> {
		if chunks.len() != vectors.len() {
			return Err(Error::IndexBuild(format!("{} chunks but {} vectors", chunks.len(), vectors.len())));
		}
		if let Some(bad) = vectors.iter().position(|v| v.len() != dim) {
			return Err(Error::IndexBuild(format!("vector {bad} has dimension {}, expected {dim}", vectors[bad].len())));
		}
		let dim_i32 = i32::try_from(dim).map_err(|_| Error::IndexBuild(format!("dimension {dim} too large")))?;
		let rt = Runtime::new()?;
		let uri = path.to_string_lossy().to_string();
		let schema = build_chunk_schema(dim_i32);

		let table = rt.block_on(async {
			let db = connect(&uri).execute().await.map_err(build_err)?;
			let empty = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
			let table = db.create_table(TABLE_NAME, Box::new(empty)).execute().await.map_err(build_err)?;

			let pb = progress_bar(chunks.len());
			for (batch_no, window) in chunks.chunks(WRITE_BATCH).enumerate() {
				let offset = batch_no * WRITE_BATCH;
				let batch = to_record_batch(schema.clone(), offset, window, &vectors[offset..offset + window.len()], dim_i32)?;
				let reader = RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema.clone());
				table.add(Box::new(reader)).execute().await.map_err(build_err)?;
				pb.inc(window.len() as u64);
			}
			pb.finish_and_clear();
			Ok::<_, Error>(table)
		})?;
		info!(path = %path.display(), rows = chunks.len(), dim, "vector store written");
		Ok(Self { rt, table, dim })
	}

	pub fn open(path: &Path) -> Result<Self> {
		let rt = Runtime::new()?;
		let uri = path.to_string_lossy().to_string();
		let (table, dim) = rt.block_on(async {
			let db = connect(&uri).execute().await.map_err(storage_err)?;
			let table = db.open_table(TABLE_NAME).execute().await.map_err(storage_err)?;
			let schema = table.schema().await.map_err(storage_err)?;
			let dim = vector_dim(&schema).ok_or_else(|| Error::Storage("chunk table has no vector column".into()))?;
			Ok::<_, Error>((table, dim))
		})?;
		debug!(path = %path.display(), dim, "vector store opened");
		Ok(Self { rt, table, dim })
	}

	pub fn dim(&self) -> usize { self.dim }

	pub fn count(&self) -> Result<usize> {
		self.rt.block_on(self.table.count_rows(None)).map_err(storage_err)
	}

	/// Returns up to `k` rows nearest to `query` by cosine distance, ordered by
	/// similarity descending then ordinal ascending.
	pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<StoredHit>> {
		if query.len() != self.dim {
			return Err(Error::Search(format!("query has dimension {}, index has {}", query.len(), self.dim)));
		}
		if k == 0 || self.count()? == 0 {
			return Ok(Vec::new());
		}
		let batches: Vec<RecordBatch> = self.rt.block_on(async {
			let stream = self.table
				.vector_search(query.to_vec())
				.map_err(storage_err)?
				.distance_type(DistanceType::Cosine)
				.limit(k)
				.execute()
				.await
				.map_err(storage_err)?;
			stream.try_collect::<Vec<_>>().await.map_err(storage_err)
		})?;

		let mut hits = Vec::new();
		for batch in &batches {
			read_hits(batch, &mut hits)?;
		}
		hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity).then(a.ordinal.cmp(&b.ordinal)));
		hits.truncate(k);
		Ok(hits)
	}
}

fn to_record_batch(schema: Arc<arrow_schema::Schema>, offset: usize, chunks: &[Chunk], vectors: &[Vec<f32>], dim: i32) -> Result<RecordBatch> {
	let mut ordinals = Vec::with_capacity(chunks.len());
	let mut contents = Vec::with_capacity(chunks.len());
	let mut metas = Vec::with_capacity(chunks.len());
	for (i, chunk) in chunks.iter().enumerate() {
		ordinals.push(i64::try_from(offset + i).map_err(|e| Error::IndexBuild(e.to_string()))?);
		contents.push(chunk.content.clone());
		metas.push(serde_json::to_string(&chunk.metadata).map_err(|e| Error::IndexBuild(e.to_string()))?);
	}
	let vecs = vectors.iter().map(|v| Some(v.iter().copied().map(Some).collect::<Vec<_>>()));
	RecordBatch::try_new(schema, vec![
		Arc::new(Int64Array::from(ordinals)),
		Arc::new(StringArray::from(contents)),
		Arc::new(StringArray::from(metas)),
		Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vecs, dim)),
	]).map_err(build_err)
}

fn read_hits(batch: &RecordBatch, out: &mut Vec<StoredHit>) -> Result<()> {
	let ordinals = column::<Int64Array>(batch, ORDINAL_COL)?;
	let contents = column::<StringArray>(batch, CONTENT_COL)?;
	let metas = column::<StringArray>(batch, METADATA_COL)?;
	let distances = column::<Float32Array>(batch, DISTANCE_COL)?;
	for i in 0..batch.num_rows() {
		let metadata: Metadata = serde_json::from_str(metas.value(i)).map_err(|e| Error::Storage(format!("corrupt chunk metadata: {e}")))?;
		out.push(StoredHit {
			ordinal: usize::try_from(ordinals.value(i)).map_err(|e| Error::Storage(e.to_string()))?,
			chunk: Chunk { content: contents.value(i).to_string(), metadata },
			similarity: 1.0 - distances.value(i),
		});
	}
	Ok(())
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<T>())
		.ok_or_else(|| Error::Storage(format!("column {name} missing or mistyped")))
}

fn progress_bar(len: usize) -> ProgressBar {
	let pb = ProgressBar::new(len as u64);
	if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%)") {
		pb.set_style(style.progress_chars("#>-"));
	}
	pb
}

fn build_err(e: impl std::fmt::Display) -> Error { Error::IndexBuild(e.to_string()) }
fn storage_err(e: impl std::fmt::Display) -> Error { Error::Storage(e.to_string()) }

