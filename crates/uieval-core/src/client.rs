use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uieval_types::TokenUsage;

use crate::config::EvalConfig;
use crate::error::{CompletionError, EvalError};

/// Text returned by one completion call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Completion {
	/// First choice's content; empty when the backend returned none.
	pub text: String,
	pub usage: Option<TokenUsage>,
}

impl Completion {
	pub fn text(text: impl Into<String>) -> Self {
		Self { text: text.into(), usage: None }
	}
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
	async fn complete(&self, prompt: &str, model: &str) -> Result<Completion, CompletionError>;
}

/// Client for OpenAI-compatible `chat/completions` endpoints. No retries, no streaming.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
	http: reqwest::Client,
	api_base: String,
	api_key: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
	model: &'a str,
	messages: [ChatMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
	role: &'static str,
	content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
	#[serde(default)]
	choices: Vec<Choice>,
	#[serde(default)]
	usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
	#[serde(default)]
	message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
	#[serde(default)]
	content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
	#[serde(default)]
	prompt_tokens: u32,
	#[serde(default)]
	completion_tokens: u32,
	#[serde(default)]
	total_tokens: u32,
}

impl OpenAiClient {
	pub fn new(
		api_base: impl Into<String>,
		api_key: impl Into<String>,
		timeout: Option<Duration>,
	) -> Result<Self, CompletionError> {
		let mut builder = reqwest::Client::builder();
		if let Some(timeout) = timeout {
			builder = builder.timeout(timeout);
		}
		Ok(Self {
			http: builder.build()?,
			api_base: api_base.into().trim_end_matches('/').to_string(),
			api_key: api_key.into(),
		})
	}

	/// Build from configuration, reading the API key from the configured environment variable.
	pub fn from_config(config: &EvalConfig) -> crate::Result<Self> {
		let api_key = config
			.api_key()
			.ok_or_else(|| EvalError::Configuration(vec![config.missing_api_key_message()]))?;
		Ok(Self::new(&config.api_base, api_key, config.request_timeout())?)
	}

	fn endpoint(&self) -> String {
		format!("{}/chat/completions", self.api_base)
	}
}

#[async_trait]
impl CompletionClient for OpenAiClient {
	async fn complete(&self, prompt: &str, model: &str) -> Result<Completion, CompletionError> {
		let request = ChatRequest {
			model,
			messages: [ChatMessage { role: "user", content: prompt }],
		};
		tracing::debug!(model, prompt_chars = prompt.len(), "sending completion request");
		let started = Instant::now();

		let resp = self
			.http
			.post(self.endpoint())
			.bearer_auth(&self.api_key)
			.json(&request)
			.send()
			.await?;
		let status = resp.status();
		let body = resp.text().await?;
		if !status.is_success() {
			return Err(CompletionError::Status { status: status.as_u16(), body });
		}

		let parsed: ChatResponse =
			serde_json::from_str(&body).map_err(|e| CompletionError::Decode(e.to_string()))?;
		let usage = parsed.usage.map(|u| TokenUsage {
			input_tokens: u.prompt_tokens,
			output_tokens: u.completion_tokens,
			total_tokens: u.total_tokens,
		});
		let text = parsed
			.choices
			.into_iter()
			.next()
			.and_then(|choice| choice.message)
			.and_then(|message| message.content)
			.unwrap_or_default();

		tracing::debug!(
			model,
			elapsed_ms = started.elapsed().as_millis() as u64,
			total_tokens = usage.as_ref().map(|u| u.total_tokens),
			"completion received"
		);
		Ok(Completion { text, usage })
	}
}
