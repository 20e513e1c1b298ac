use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use uieval_types::{EvalResult, EvaluationRun, EvaluationScenario, ScenarioSpec};

use crate::client::CompletionClient;
use crate::config::{EvalConfig, FailurePolicy};
use crate::datasource::{DataSource, JsonDataSource};
use crate::engine::{EngineSettings, EvaluationEngine, EvaluationFailure};
use crate::error::{EvalError, Result};
use crate::report::{Report, ReportGenerator};
use crate::store::{ArtifactStore, FsStore};
use crate::trace::scope_traces;

/// Longest reasoning excerpt logged per scenario.
const REASONING_PREVIEW_CHARS: usize = 100;

pub struct RunnerBuilder {
	config: Option<EvalConfig>,
	client: Option<Arc<dyn CompletionClient>>,
	store: Option<Arc<dyn ArtifactStore>>,
	data_source: Option<Arc<dyn DataSource>>,
}

impl RunnerBuilder {
	pub fn new() -> Self {
		Self {
			config: None,
			client: None,
			store: None,
			data_source: None,
		}
	}

	pub fn config(mut self, config: EvalConfig) -> Self {
		self.config = Some(config);
		self
	}

	pub fn client(mut self, client: Arc<dyn CompletionClient>) -> Self {
		self.client = Some(client);
		self
	}

	/// Where instructions are read and the report is written. Defaults to the filesystem.
	pub fn store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
		self.store = Some(store);
		self
	}

	/// Defaults to the configured dataset file, read through the store.
	pub fn data_source(mut self, data_source: Arc<dyn DataSource>) -> Self {
		self.data_source = Some(data_source);
		self
	}

	pub fn build(self) -> Result<Runner> {
		let config = self.config.unwrap_or_default();
		let client = self
			.client
			.ok_or_else(|| EvalError::Configuration(vec!["completion client must be set".to_string()]))?;
		let store = self
			.store
			.unwrap_or_else(|| Arc::new(FsStore::new()) as Arc<dyn ArtifactStore>);
		let data_source = self.data_source.unwrap_or_else(|| {
			Arc::new(JsonDataSource::with_store(config.dataset_file.clone(), store.clone())) as Arc<dyn DataSource>
		});
		Ok(Runner {
			config,
			client,
			store,
			data_source,
		})
	}
}

impl Default for RunnerBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
	pub run: EvaluationRun,
	pub report: Report,
	pub report_path: PathBuf,
}

pub struct Runner {
	config: EvalConfig,
	client: Arc<dyn CompletionClient>,
	store: Arc<dyn ArtifactStore>,
	data_source: Arc<dyn DataSource>,
}

impl Runner {
	pub fn builder() -> RunnerBuilder {
		RunnerBuilder::new()
	}

	/// Load inputs, evaluate every scenario, then render and write the report once.
	pub async fn run(&self) -> Result<RunOutcome> {
		let started_at = Utc::now();
		tracing::info!(
			model = %self.config.model,
			judge_model = %self.config.judge_model(),
			"Running AI-based evaluations..."
		);

		let instructions = self.store.read_text(&self.config.instruction_file).await?;
		let scenarios = self.data_source.load().await?;
		tracing::info!(scenarios = scenarios.len(), "dataset loaded");

		let engine = EvaluationEngine::new(
			self.client.clone(),
			EngineSettings::from_config(&self.config, instructions),
		);
		let evaluated = evaluate_scenarios(
			&engine,
			scenarios,
			self.config.concurrency,
			self.config.failure_policy,
		)
		.await?;

		let report = ReportGenerator::generate(&evaluated);
		let report_path = self.config.report_path(started_at);
		ReportGenerator::write(self.store.as_ref(), &report_path, &report).await?;
		tracing::info!(path = %report_path.display(), "report written");

		Ok(RunOutcome {
			run: EvaluationRun::new(evaluated),
			report,
			report_path,
		})
	}
}

/// Evaluate up to `concurrency` scenarios at once, yielding results in dataset order.
pub async fn evaluate_scenarios(
	engine: &EvaluationEngine,
	scenarios: Vec<ScenarioSpec>,
	concurrency: usize,
	policy: FailurePolicy,
) -> Result<Vec<EvaluationScenario>> {
	stream::iter(scenarios)
		.map(|spec| evaluate_one(engine, spec, policy))
		.buffered(concurrency.max(1))
		.try_collect()
		.await
}

async fn evaluate_one(
	engine: &EvaluationEngine,
	spec: ScenarioSpec,
	policy: FailurePolicy,
) -> Result<EvaluationScenario> {
	tracing::info!(
		scenario_id = spec.scenario_id,
		description = %spec.description,
		question = %spec.evaluation_prompt,
		"Testing Scenario {}", spec.scenario_id
	);

	let (result, traces) = scope_traces(engine.evaluate(&spec)).await;
	let total_tokens: u32 = traces
		.iter()
		.filter_map(|t| t.usage.as_ref())
		.map(|u| u.total_tokens)
		.sum();

	match result {
		Ok(eval_result) => {
			tracing::info!(
				scenario_id = spec.scenario_id,
				score = %format!("{:.1}%", eval_result.score * 100.0),
				total_tokens,
				reasoning = %reasoning_preview(&eval_result.reasoning),
				"Result: {}", if eval_result.passed { "PASSED" } else { "FAILED" }
			);
			Ok(EvaluationScenario::new(&spec, eval_result).with_traces(traces))
		}
		Err(EvaluationFailure { error, output }) => match policy {
			FailurePolicy::Abort => {
				tracing::error!(scenario_id = spec.scenario_id, error = %error, "scenario failed, aborting run");
				Err(error)
			}
			FailurePolicy::Isolate => {
				let message = error.to_string();
				tracing::warn!(scenario_id = spec.scenario_id, error = %message, "scenario failed, recorded as FAILED");
				let mut eval_result = EvalResult::errored(spec.evaluation_prompt.clone(), &message);
				if let Some(output) = output {
					eval_result = eval_result.with_output(output);
				}
				Ok(EvaluationScenario::new(&spec, eval_result)
					.with_error(message)
					.with_traces(traces))
			}
		},
	}
}

fn reasoning_preview(reasoning: &str) -> String {
	let preview: String = reasoning.chars().take(REASONING_PREVIEW_CHARS).collect();
	format!("{preview}...")
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::path::Path;
	use std::time::Duration;

	use crate::datasource::VecDataSource;
	use crate::error::CompletionError;
	use crate::testing::{is_judgment_prompt, MemoryStore, ScriptedClient};

	fn config() -> EvalConfig {
		EvalConfig {
			instruction_file: PathBuf::from("instructions/select.md"),
			output_file: PathBuf::from("reports/report.md"),
			..EvalConfig::default()
		}
	}

	fn store() -> Arc<MemoryStore> {
		Arc::new(MemoryStore::new().with_file("instructions/select.md", "Virtualize above 200 items."))
	}

	fn dataset(ids: &[u64]) -> Arc<VecDataSource> {
		Arc::new(VecDataSource::new(
			ids.iter()
				.map(|&id| ScenarioSpec::new(id, format!("scenario {id} query"), format!("question {id}?")))
				.collect(),
		))
	}

	/// Judge passes every scenario whose query mentions an odd id.
	fn odd_passes() -> ScriptedClient {
		ScriptedClient::new(|prompt, _model| {
			if !is_judgment_prompt(prompt) {
				let id = prompt
					.split("scenario ")
					.nth(1)
					.and_then(|rest| rest.split(' ').next())
					.unwrap_or("0");
				return Ok(format!("// artifact for {id}"));
			}
			if prompt.contains("artifact for 1") || prompt.contains("artifact for 3") {
				Ok("ANSWER: YES\nREASONING: fine".to_string())
			} else {
				Ok("ANSWER: NO\nREASONING: missing".to_string())
			}
		})
	}

	#[tokio::test]
	async fn run_writes_report_in_dataset_order() {
		let store = store();
		let runner = Runner::builder()
			.config(config())
			.client(Arc::new(odd_passes()))
			.store(store.clone())
			.data_source(dataset(&[3, 1, 2]))
			.build()
			.unwrap();

		let outcome = runner.run().await.unwrap();

		let ids: Vec<u64> = outcome.run.scenarios.iter().map(|s| s.scenario_id).collect();
		assert_eq!(ids, vec![3, 1, 2]);
		assert_eq!(outcome.run.statistics.passed_count, 2);
		assert_eq!(outcome.run.statistics.failed_count, 1);
		assert_eq!(outcome.report_path, PathBuf::from("reports/report.md"));

		let document = store.get(Path::new("reports/report.md")).unwrap();
		assert_eq!(document, outcome.report.document);
		let pos = |needle: &str| document.find(needle).unwrap();
		assert!(pos("## Scenario 3 ✅") < pos("## Scenario 1 ✅"));
		assert!(pos("## Scenario 1 ✅") < pos("## Scenario 2 ❌"));
	}

	#[tokio::test]
	async fn instructions_are_read_once() {
		let store = store();
		let runner = Runner::builder()
			.config(config())
			.client(Arc::new(odd_passes()))
			.store(store.clone())
			.data_source(dataset(&[1, 2, 3]))
			.build()
			.unwrap();

		runner.run().await.unwrap();
		assert_eq!(store.reads(), 1);
	}

	#[tokio::test]
	async fn concurrent_run_keeps_dataset_order() {
		// Earlier scenarios answer slower, so completion order is reversed.
		let client = odd_passes().delayed(|prompt| {
			if prompt.contains("scenario 1 ") || prompt.contains("artifact for 1") {
				Duration::from_millis(60)
			} else if prompt.contains("scenario 2 ") || prompt.contains("artifact for 2") {
				Duration::from_millis(30)
			} else {
				Duration::from_millis(1)
			}
		});
		let client = Arc::new(client);
		let runner = Runner::builder()
			.config(EvalConfig { concurrency: 3, ..config() })
			.client(client.clone())
			.store(store())
			.data_source(dataset(&[1, 2, 3]))
			.build()
			.unwrap();

		let outcome = runner.run().await.unwrap();

		let ids: Vec<u64> = outcome.run.scenarios.iter().map(|s| s.scenario_id).collect();
		assert_eq!(ids, vec![1, 2, 3]);
		let first_judgment = client.calls().iter().position(|c| is_judgment_prompt(&c.prompt)).unwrap();
		assert!(first_judgment >= 1);
		for scenario in &outcome.run.scenarios {
			let labels: Vec<&str> = scenario.traces.iter().map(|t| t.label.as_str()).collect();
			assert_eq!(labels, vec!["generation", "judgment"]);
		}
	}

	fn failing_on_two() -> ScriptedClient {
		ScriptedClient::new(|prompt, _model| {
			if prompt.contains("scenario 2 query") {
				Err(CompletionError::Status { status: 401, body: "bad key".to_string() })
			} else if is_judgment_prompt(prompt) {
				Ok("ANSWER: YES\nREASONING: fine".to_string())
			} else {
				Ok("code".to_string())
			}
		})
	}

	#[tokio::test]
	async fn abort_policy_stops_run_without_report() {
		let store = store();
		let client = Arc::new(failing_on_two());
		let runner = Runner::builder()
			.config(config())
			.client(client.clone())
			.store(store.clone())
			.data_source(dataset(&[1, 2, 3]))
			.build()
			.unwrap();

		let err = runner.run().await.unwrap_err();
		assert!(matches!(err, EvalError::Completion(CompletionError::Status { status: 401, .. })));
		assert!(store.get(Path::new("reports/report.md")).is_none());
		assert!(!client.calls().iter().any(|c| c.prompt.contains("scenario 3 query")));
	}

	#[tokio::test]
	async fn isolate_policy_records_failure_and_continues() {
		let store = store();
		let runner = Runner::builder()
			.config(EvalConfig { failure_policy: FailurePolicy::Isolate, ..config() })
			.client(Arc::new(failing_on_two()))
			.store(store.clone())
			.data_source(dataset(&[1, 2, 3]))
			.build()
			.unwrap();

		let outcome = runner.run().await.unwrap();

		assert_eq!(outcome.run.statistics.total_count, 3);
		assert_eq!(outcome.run.statistics.passed_count, 2);
		let failed = &outcome.run.scenarios[1];
		assert_eq!(failed.scenario_id, 2);
		assert!(!failed.passed());
		assert_eq!(failed.eval_result.score, 0.0);
		assert!(failed.error.as_deref().unwrap().contains("HTTP 401"));
		assert!(failed.eval_result.reasoning.starts_with("Evaluation error:"));
		assert!(store.get(Path::new("reports/report.md")).unwrap().contains("## Scenario 2 ❌ FAILED"));
	}

	#[tokio::test]
	async fn isolated_judgment_failure_keeps_artifact_in_report() {
		let store = store();
		let client = ScriptedClient::new(|prompt, _model| {
			if is_judgment_prompt(prompt) {
				Err(CompletionError::Status { status: 503, body: "judge down".to_string() })
			} else {
				Ok("export function RoleSelect() {}".to_string())
			}
		});
		let runner = Runner::builder()
			.config(EvalConfig { failure_policy: FailurePolicy::Isolate, ..config() })
			.client(Arc::new(client))
			.store(store.clone())
			.data_source(dataset(&[1]))
			.build()
			.unwrap();

		let outcome = runner.run().await.unwrap();

		let scenario = &outcome.run.scenarios[0];
		assert!(!scenario.passed());
		assert_eq!(scenario.eval_result.output, "export function RoleSelect() {}");
		assert!(scenario.error.as_deref().unwrap().contains("HTTP 503"));
		let document = store.get(Path::new("reports/report.md")).unwrap();
		assert!(document.contains("```typescript\nexport function RoleSelect() {}\n```"));
	}

	#[tokio::test]
	async fn empty_dataset_produces_empty_report() {
		let store = store();
		let client = Arc::new(odd_passes());
		let runner = Runner::builder()
			.config(config())
			.client(client.clone())
			.store(store.clone())
			.data_source(dataset(&[]))
			.build()
			.unwrap();

		let outcome = runner.run().await.unwrap();
		assert_eq!(outcome.run.statistics.total_count, 0);
		assert_eq!(outcome.run.statistics.success_rate, 0.0);
		assert!(client.calls().is_empty());
		assert!(store.get(Path::new("reports/report.md")).is_some());
	}

	#[tokio::test]
	async fn missing_instructions_fail_before_any_call() {
		let client = Arc::new(odd_passes());
		let runner = Runner::builder()
			.config(config())
			.client(client.clone())
			.store(Arc::new(MemoryStore::new()))
			.data_source(dataset(&[1]))
			.build()
			.unwrap();

		assert!(matches!(runner.run().await, Err(EvalError::Read { .. })));
		assert!(client.calls().is_empty());
	}

	#[test]
	fn builder_requires_client() {
		assert!(matches!(Runner::builder().build(), Err(EvalError::Configuration(_))));
	}

	#[test]
	fn reasoning_preview_is_bounded() {
		let long = "x".repeat(250);
		assert_eq!(reasoning_preview(&long).chars().count(), REASONING_PREVIEW_CHARS + 3);
		assert_eq!(reasoning_preview("short"), "short...");
	}
}
