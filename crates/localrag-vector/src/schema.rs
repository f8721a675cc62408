//! Arrow layout of the persisted chunk table.
use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

pub const TABLE_NAME: &str = "chunks";
pub const ORDINAL_COL: &str = "ordinal";
pub const CONTENT_COL: &str = "content";
pub const METADATA_COL: &str = "metadata";
pub const VECTOR_COL: &str = "vector";
/// Column LanceDB appends to vector search results.
pub const DISTANCE_COL: &str = "_distance";

pub fn build_chunk_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new(ORDINAL_COL, DataType::Int64, false),
		Field::new(CONTENT_COL, DataType::Utf8, false),
		Field::new(METADATA_COL, DataType::Utf8, false),
		Field::new(VECTOR_COL, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}

/// Reads the vector width back from a persisted table's schema.
pub fn vector_dim(schema: &Schema) -> Option<usize> {
	match schema.field_with_name(VECTOR_COL).ok()?.data_type() {
		DataType::FixedSizeList(_, dim) => usize::try_from(*dim).ok(),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn dim_round_trips_through_schema() {
		assert_eq!(vector_dim(&build_chunk_schema(384)), Some(384));
	}
}
