use std::sync::Arc;

use uieval_types::{EvalResult, ScenarioSpec, Trace};

use crate::client::CompletionClient;
use crate::config::EvalConfig;
use crate::error::{EvalError, Result};
use crate::prompt::{build_generation_prompt, build_judgment_prompt};
use crate::trace::report_trace;
use crate::verdict::parse_verdict;

/// Inputs shared read-only by every scenario of a run.
#[derive(Debug, Clone)]
pub struct EngineSettings {
	pub instructions: Arc<str>,
	pub technologies: Vec<String>,
	pub component_kind: String,
	pub model: String,
	pub judge_model: String,
}

impl EngineSettings {
	pub fn from_config(config: &EvalConfig, instructions: impl Into<Arc<str>>) -> Self {
		Self {
			instructions: instructions.into(),
			technologies: config.technologies.clone(),
			component_kind: config.component_kind(),
			model: config.model.clone(),
			judge_model: config.judge_model().to_string(),
		}
	}
}

/// An evaluation that stopped part way. `output` is set when generation had already finished.
#[derive(Debug)]
pub struct EvaluationFailure {
	pub error: EvalError,
	pub output: Option<String>,
}

impl From<EvalError> for EvaluationFailure {
	fn from(error: EvalError) -> Self {
		Self { error, output: None }
	}
}

/// Generates an artifact for one scenario, then has the judge answer its question.
pub struct EvaluationEngine {
	client: Arc<dyn CompletionClient>,
	settings: EngineSettings,
}

impl EvaluationEngine {
	pub fn new(client: Arc<dyn CompletionClient>, settings: EngineSettings) -> Self {
		Self { client, settings }
	}

	/// Generation strictly precedes judgment. Any failure propagates unmodified.
	pub async fn evaluate(&self, spec: &ScenarioSpec) -> std::result::Result<EvalResult, EvaluationFailure> {
		let generation_prompt = build_generation_prompt(
			&self.settings.instructions,
			&self.settings.technologies,
			&self.settings.component_kind,
			&spec.description,
		);
		let output = self.call("generation", &generation_prompt, &self.settings.model).await?;

		let judgment_prompt = build_judgment_prompt(&output, &spec.evaluation_prompt);
		let ai_evaluation = match self.call("judgment", &judgment_prompt, &self.settings.judge_model).await {
			Ok(reply) => reply,
			Err(error) => return Err(EvaluationFailure { error, output: Some(output) }),
		};

		let verdict = parse_verdict(&ai_evaluation);
		Ok(verdict.into_result(output, &spec.evaluation_prompt, ai_evaluation))
	}

	async fn call(&self, label: &str, prompt: &str, model: &str) -> Result<String> {
		let trace = Trace::start_now().label(label).model(model).prompt(prompt);
		match self.client.complete(prompt, model).await {
			Ok(completion) => {
				report_trace(trace.finish(&completion.text, completion.usage));
				Ok(completion.text)
			}
			Err(err) => {
				report_trace(trace.finish_with_error(err.to_string()));
				Err(err.into())
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::CompletionError;
	use crate::testing::is_judgment_prompt;
	use crate::testing::ScriptedClient;
	use crate::trace::scope_traces;

	fn settings() -> EngineSettings {
		EngineSettings {
			instructions: Arc::from("Virtualize lists above 200 items."),
			technologies: vec!["React".to_string()],
			component_kind: "select".to_string(),
			model: "gen-model".to_string(),
			judge_model: "judge-model".to_string(),
		}
	}

	#[tokio::test]
	async fn generation_then_judgment() {
		let client = Arc::new(ScriptedClient::with_replies(
			"export function UniversitySelect() {}",
			"ANSWER: YES\nREASONING: uses windowing",
		));
		let engine = EvaluationEngine::new(client.clone(), settings());
		let spec = ScenarioSpec::new(1, "select from 2000 universities", "Does it virtualize?");

		let (result, traces) = scope_traces(engine.evaluate(&spec)).await;
		let result = result.unwrap();

		assert!(result.passed);
		assert_eq!(result.score, 1.0);
		assert_eq!(result.reasoning, "uses windowing");
		assert_eq!(result.output, "export function UniversitySelect() {}");
		assert_eq!(result.test_prompt, "Does it virtualize?");
		assert_eq!(result.ai_evaluation, "ANSWER: YES\nREASONING: uses windowing");

		let calls = client.calls();
		assert_eq!(calls.len(), 2);
		assert_eq!(calls[0].model, "gen-model");
		assert!(calls[0].prompt.contains("select from 2000 universities"));
		assert!(calls[0].prompt.contains("Virtualize lists above 200 items."));
		assert_eq!(calls[1].model, "judge-model");
		assert!(calls[1].prompt.contains("export function UniversitySelect() {}"));
		assert!(calls[1].prompt.contains("Question: Does it virtualize?"));

		let labels: Vec<&str> = traces.iter().map(|t| t.label.as_str()).collect();
		assert_eq!(labels, vec!["generation", "judgment"]);
	}

	#[tokio::test]
	async fn malformed_judge_reply_fails_closed() {
		let client = Arc::new(ScriptedClient::with_replies("code", "Looks good to me!"));
		let engine = EvaluationEngine::new(client, settings());
		let spec = ScenarioSpec::new(2, "d", "q");

		let result = engine.evaluate(&spec).await.unwrap();
		assert!(!result.passed);
		assert_eq!(result.score, 0.0);
		assert_eq!(result.reasoning, crate::verdict::NO_REASONING);
	}

	#[tokio::test]
	async fn generation_failure_skips_judgment() {
		let client = Arc::new(ScriptedClient::new(|_prompt, _model| {
			Err(CompletionError::Status { status: 500, body: "overloaded".to_string() })
		}));
		let engine = EvaluationEngine::new(client.clone(), settings());
		let spec = ScenarioSpec::new(3, "d", "q");

		let (result, traces) = scope_traces(engine.evaluate(&spec)).await;
		let failure = result.unwrap_err();
		assert!(matches!(failure.error, EvalError::Completion(CompletionError::Status { status: 500, .. })));
		assert!(failure.output.is_none());
		assert_eq!(client.calls().len(), 1);
		assert_eq!(traces.len(), 1);
		assert!(traces[0].error.is_some());
	}

	#[tokio::test]
	async fn judgment_failure_keeps_generated_output() {
		let client = Arc::new(ScriptedClient::new(|prompt, _model| {
			if is_judgment_prompt(prompt) {
				Err(CompletionError::Status { status: 429, body: "rate limited".to_string() })
			} else {
				Ok("export function CitySelect() {}".to_string())
			}
		}));
		let engine = EvaluationEngine::new(client.clone(), settings());
		let spec = ScenarioSpec::new(4, "d", "q");

		let (result, traces) = scope_traces(engine.evaluate(&spec)).await;
		let failure = result.unwrap_err();
		assert!(matches!(failure.error, EvalError::Completion(CompletionError::Status { status: 429, .. })));
		assert_eq!(failure.output.as_deref(), Some("export function CitySelect() {}"));
		assert_eq!(client.calls().len(), 2);
		assert!(traces[0].error.is_none());
		assert!(traces[1].error.is_some());
	}
}
