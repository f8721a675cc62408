//! HTTP reranking service client.
//!
//! Request: `POST <url>` with `{"query": .., "documents": [..]}` and an
//! optional bearer token. A 200 response carries
//! `{"results": [{"relevance_score": f32, "index"?: usize}]}`, one result per
//! document. Results with `index` are placed by it, otherwise by position.

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use localrag_core::error::{Error, Result};

#[derive(Serialize)]
struct RerankRequest<'a> {
	query: &'a str,
	documents: &'a [String],
}

#[derive(Deserialize)]
struct RerankResponse {
	results: Vec<RerankResult>,
}

#[derive(Deserialize)]
struct RerankResult {
	#[serde(default)]
	index: Option<usize>,
	relevance_score: f32,
}

pub struct RemoteReranker {
	client: Client,
	url: String,
	api_token: Option<String>,
}

impl RemoteReranker {
	pub fn new(url: &str, api_token: Option<String>, timeout: Option<Duration>) -> anyhow::Result<Self> {
		let mut builder = Client::builder();
		if let Some(timeout) = timeout { builder = builder.timeout(timeout); }
		Ok(Self { client: builder.build()?, url: url.to_string(), api_token })
	}

	pub(crate) fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
		let mut request = self.client.post(&self.url).json(&RerankRequest { query, documents });
		if let Some(token) = &self.api_token { request = request.bearer_auth(token); }
		let response = request.send().map_err(|e| service_error(None, format!("POST {}: {e}", self.url)))?;
		let status = response.status();
		if status != reqwest::StatusCode::OK {
			let body = response.text().unwrap_or_default();
			return Err(service_error(Some(status.as_u16()), body));
		}
		let parsed: RerankResponse = response.json().map_err(|e| service_error(Some(status.as_u16()), format!("malformed response: {e}")))?;
		map_scores(parsed.results, documents.len())
	}
}

fn map_scores(results: Vec<RerankResult>, expected: usize) -> Result<Vec<f32>> {
	if results.len() != expected {
		return Err(service_error(Some(200), format!("{} results for {expected} documents", results.len())));
	}
	let mut scores: Vec<Option<f32>> = vec![None; expected];
	for (pos, result) in results.into_iter().enumerate() {
		let slot = result.index.unwrap_or(pos);
		let Some(entry) = scores.get_mut(slot) else {
			return Err(service_error(Some(200), format!("result index {slot} out of range")));
		};
		if entry.is_some() {
			return Err(service_error(Some(200), format!("duplicate result index {slot}")));
		}
		*entry = Some(result.relevance_score);
	}
	scores.into_iter().enumerate().map(|(i, s)| s.ok_or_else(|| service_error(Some(200), format!("no score for document {i}")))).collect()
}

fn service_error(status: Option<u16>, message: String) -> Error {
	Error::RerankerService { status, message }
}
