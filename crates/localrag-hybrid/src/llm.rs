//! Chat-completion backends behind [`LanguageModel`].

use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use localrag_core::config::{ChatProviderKind, ChatSettings};
use localrag_core::traits::LanguageModel;

#[derive(Debug, Clone)]
pub struct Sampling {
	pub temperature: f32,
	pub max_tokens: u32,
	pub top_p: f32,
	pub top_k: Option<u32>,
}

#[derive(Serialize)]
struct Message<'a> {
	role: &'static str,
	content: &'a str,
}

pub enum ChatProvider {
	/// OpenAI-compatible `/chat/completions`.
	OpenAi { client: Client, url: String, model: String, api_key: Option<String>, sampling: Sampling },
	/// Ollama `/api/chat`, non-streaming.
	Ollama { client: Client, url: String, model: String, sampling: Sampling },
}

impl ChatProvider {
	pub fn from_settings(settings: &ChatSettings) -> Result<Self> {
		let mut builder = Client::builder();
		if let Some(secs) = settings.timeout_secs { builder = builder.timeout(Duration::from_secs(secs)); }
		let client = builder.build().context("building HTTP client")?;
		let base = settings.url.trim_end_matches('/');
		let sampling = Sampling { temperature: settings.temperature, max_tokens: settings.max_tokens, top_p: settings.top_p, top_k: settings.top_k };
		Ok(match settings.provider {
			ChatProviderKind::OpenAi => Self::OpenAi {
				client,
				url: format!("{base}/chat/completions"),
				model: settings.model.clone(),
				api_key: settings.api_key.clone().or_else(|| std::env::var("OPENAI_API_KEY").ok()),
				sampling,
			},
			ChatProviderKind::Ollama => Self::Ollama { client, url: format!("{base}/api/chat"), model: settings.model.clone(), sampling },
		})
	}

	pub fn model(&self) -> &str {
		match self {
			Self::OpenAi { model, .. } | Self::Ollama { model, .. } => model,
		}
	}
}

#[derive(Deserialize)]
struct OpenAiResponse {
	choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
	message: ResponseMessage,
}

#[derive(Deserialize)]
struct OllamaResponse {
	message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
	#[serde(default)]
	content: String,
}

impl LanguageModel for ChatProvider {
	fn generate(&self, prompt: &str) -> Result<String> {
		let messages = [Message { role: "user", content: prompt }];
		match self {
			Self::OpenAi { client, url, model, api_key, sampling } => {
				let body = json!({
					"model": model,
					"messages": messages,
					"temperature": sampling.temperature,
					"max_tokens": sampling.max_tokens,
					"top_p": sampling.top_p,
				});
				let mut request = client.post(url).json(&body);
				if let Some(key) = api_key { request = request.bearer_auth(key); }
				let parsed: OpenAiResponse = send(request, url)?;
				parsed.choices.into_iter().next().map(|c| c.message.content).ok_or_else(|| anyhow!("chat service returned no choices"))
			}
			Self::Ollama { client, url, model, sampling } => {
				let mut options = json!({
					"temperature": sampling.temperature,
					"top_p": sampling.top_p,
					"num_predict": sampling.max_tokens,
				});
				if let Some(top_k) = sampling.top_k {
					options["top_k"] = json!(top_k);
				}
				let body = json!({ "model": model, "messages": messages, "stream": false, "options": options });
				let parsed: OllamaResponse = send(client.post(url).json(&body), url)?;
				Ok(parsed.message.content)
			}
		}
	}
}

fn send<T: for<'de> Deserialize<'de>>(request: reqwest::blocking::RequestBuilder, url: &str) -> Result<T> {
	let response = request.send().with_context(|| format!("POST {url}"))?;
	let status = response.status();
	if !status.is_success() {
		let body = response.text().unwrap_or_default();
		bail!("chat service returned {status}: {body}");
	}
	response.json().context("decoding chat response")
}
