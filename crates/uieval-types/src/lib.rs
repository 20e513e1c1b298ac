use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tabled::Tabled;

/// Trace data for a single completion call made while evaluating a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    /// Pipeline step that issued the call ("generation" or "judgment")
    pub label: String,

    /// When the call started
    pub start: SystemTime,

    /// When the call ended
    pub end: SystemTime,

    /// Duration of the call in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    /// Model name (e.g., "gpt-4o-mini")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Prompt length in characters
    pub prompt_chars: usize,

    /// Response length in characters
    pub response_chars: usize,

    /// Token usage information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,

    /// Error if the call failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

impl Trace {
    /// Create a new trace with start time
    pub fn start_now() -> TraceBuilder {
        TraceBuilder {
            start: SystemTime::now(),
            label: String::new(),
            model: None,
            prompt_chars: 0,
        }
    }
}

/// Builder for creating traces
pub struct TraceBuilder {
    start: SystemTime,
    label: String,
    model: Option<String>,
    prompt_chars: usize,
}

impl TraceBuilder {
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn prompt(mut self, prompt: &str) -> Self {
        self.prompt_chars = prompt.chars().count();
        self
    }

    pub fn finish(self, response: &str, usage: Option<TokenUsage>) -> Trace {
        let response_chars = response.chars().count();
        self.build(response_chars, usage, None)
    }

    pub fn finish_with_error(self, error: String) -> Trace {
        self.build(0, None, Some(error))
    }

    fn build(self, response_chars: usize, usage: Option<TokenUsage>, error: Option<String>) -> Trace {
        let end = SystemTime::now();
        let duration_ms = end
            .duration_since(self.start)
            .ok()
            .map(|d| d.as_millis() as u64);

        Trace {
            label: self.label,
            start: self.start,
            end,
            duration_ms,
            model: self.model,
            prompt_chars: self.prompt_chars,
            response_chars,
            usage,
            error,
        }
    }
}

/// One row of the evaluation dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioSpec {
	pub scenario_id: u64,
	/// User query that drives generation.
	pub description: String,
	/// Yes/no question that drives judgment.
	pub evaluation_prompt: String,
}

impl ScenarioSpec {
	pub fn new(scenario_id: u64, description: impl Into<String>, evaluation_prompt: impl Into<String>) -> Self {
		Self {
			scenario_id,
			description: description.into(),
			evaluation_prompt: evaluation_prompt.into(),
		}
	}

	/// Invariant violations of this record on its own (id uniqueness is a dataset concern).
	pub fn problems(&self) -> Vec<String> {
		let mut problems = Vec::new();
		if self.scenario_id == 0 {
			problems.push("scenarioId must be a positive integer".to_string());
		}
		if self.description.trim().is_empty() {
			problems.push(format!("scenario {}: description is empty", self.scenario_id));
		}
		if self.evaluation_prompt.trim().is_empty() {
			problems.push(format!("scenario {}: evaluationPrompt is empty", self.scenario_id));
		}
		problems
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalResult {
	pub passed: bool,
	/// Generated artifact, verbatim.
	pub output: String,
	/// Binary: 1.0 when passed, 0.0 otherwise.
	pub score: f64,
	pub test_prompt: String,
	/// Full judge reply, verbatim.
	pub ai_evaluation: String,
	pub reasoning: String,
}

impl EvalResult {
	pub fn new(
		passed: bool,
		output: impl Into<String>,
		test_prompt: impl Into<String>,
		ai_evaluation: impl Into<String>,
		reasoning: impl Into<String>,
	) -> Self {
		Self {
			passed,
			output: output.into(),
			score: score_for(passed),
			test_prompt: test_prompt.into(),
			ai_evaluation: ai_evaluation.into(),
			reasoning: reasoning.into(),
		}
	}

	/// Result recorded for a scenario whose evaluation could not complete.
	pub fn errored(test_prompt: impl Into<String>, message: &str) -> Self {
		Self::new(false, "", test_prompt, "", format!("Evaluation error: {message}"))
	}

	/// Keep an artifact that was generated before the evaluation failed.
	pub fn with_output(mut self, output: impl Into<String>) -> Self {
		self.output = output.into();
		self
	}

	pub fn answer(&self) -> &'static str {
		if self.passed { "YES" } else { "NO" }
	}
}

pub fn score_for(passed: bool) -> f64 {
	if passed { 1.0 } else { 0.0 }
}

/// A scenario joined with its outcome, carried into the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationScenario {
	pub scenario_id: u64,
	pub description: String,
	pub evaluation_prompt: String,
	pub eval_result: EvalResult,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub error: Option<String>,
	#[serde(skip_serializing_if = "Vec::is_empty", default)]
	pub traces: Vec<Trace>,
}

impl EvaluationScenario {
	pub fn new(spec: &ScenarioSpec, eval_result: EvalResult) -> Self {
		Self {
			scenario_id: spec.scenario_id,
			description: spec.description.clone(),
			evaluation_prompt: spec.evaluation_prompt.clone(),
			eval_result,
			error: None,
			traces: Vec::new(),
		}
	}

	pub fn with_error(mut self, error: impl Into<String>) -> Self {
		self.error = Some(error.into());
		self
	}

	pub fn with_traces(mut self, traces: Vec<Trace>) -> Self {
		self.traces = traces;
		self
	}

	pub fn passed(&self) -> bool {
		self.eval_result.passed
	}
}

/// Aggregates over one run. Rates are percentages and resolve to 0.0 for an empty run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatistics {
	pub total_count: usize,
	pub passed_count: usize,
	pub failed_count: usize,
	pub success_rate: f64,
	pub average_score: f64,
}

impl RunStatistics {
	pub fn from_scenarios(scenarios: &[EvaluationScenario]) -> Self {
		let total_count = scenarios.len();
		let passed_count = scenarios.iter().filter(|s| s.passed()).count();
		let score_sum: f64 = scenarios.iter().map(|s| s.eval_result.score).sum();

		let (success_rate, average_score) = if total_count == 0 {
			(0.0, 0.0)
		} else {
			let total = total_count as f64;
			(passed_count as f64 / total * 100.0, score_sum / total * 100.0)
		};

		RunStatistics {
			total_count,
			passed_count,
			failed_count: total_count - passed_count,
			success_rate,
			average_score,
		}
	}
}

/// Every scenario of a run plus its statistics; the shape of the JSON export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRun {
	pub statistics: RunStatistics,
	pub scenarios: Vec<EvaluationScenario>,
}

#[derive(Debug, Clone, Tabled)]
struct SummaryRow {
	id: u64,
	status: String,
	score: String,
	description: String,
	reasoning: String,
}

impl EvaluationRun {
	pub fn new(scenarios: Vec<EvaluationScenario>) -> Self {
		let statistics = RunStatistics::from_scenarios(&scenarios);
		Self { statistics, scenarios }
	}

	pub fn failed(&self) -> impl Iterator<Item = &EvaluationScenario> + '_ {
		self.scenarios.iter().filter(|s| !s.passed())
	}

	pub fn summary_table(&self) -> String {
		use tabled::Table;
		let rows: Vec<SummaryRow> = self.scenarios.iter().map(|s| {
			SummaryRow {
				id: s.scenario_id,
				status: if s.passed() { "✓".to_string() } else { "✗".to_string() },
				score: format!("{:.1}%", s.eval_result.score * 100.0),
				description: truncate(&s.description, 48),
				reasoning: truncate(&s.eval_result.reasoning, 64),
			}
		}).collect();

		let table = Table::new(rows);

		let summary_text = format!(
			"Total: {}  Passed: {}  Success rate: {:.1}%  Avg score: {:.1}%",
			self.statistics.total_count,
			self.statistics.passed_count,
			self.statistics.success_rate,
			self.statistics.average_score
		);

		format!("{}\n\n{}\n", table, summary_text)
	}
}

/// Cut `s` to at most `max_chars` characters, marking the cut with `…`.
pub fn truncate(s: &str, max_chars: usize) -> String {
	let single_line = s.replace('\n', " ");
	if single_line.chars().count() <= max_chars {
		return single_line;
	}
	let mut truncated = single_line.chars().take(max_chars.saturating_sub(1)).collect::<String>();
	truncated.push('…');
	truncated
}

#[cfg(test)]
mod tests {
	use super::*;

	fn scenario(id: u64, passed: bool) -> EvaluationScenario {
		let spec = ScenarioSpec::new(id, format!("description {id}"), "Does it work?");
		EvaluationScenario::new(&spec, EvalResult::new(passed, "code", "Does it work?", "ANSWER: NO", "r"))
	}

	#[test]
	fn statistics_count_passed_and_failed() {
		let scenarios = vec![scenario(1, true), scenario(2, false), scenario(3, true), scenario(4, true)];
		let stats = RunStatistics::from_scenarios(&scenarios);
		assert_eq!(stats.total_count, 4);
		assert_eq!(stats.passed_count, 3);
		assert_eq!(stats.failed_count, stats.total_count - stats.passed_count);
		assert_eq!(stats.success_rate, 75.0);
		assert_eq!(stats.average_score, 75.0);
	}

	#[test]
	fn statistics_of_empty_run_are_zero() {
		let stats = RunStatistics::from_scenarios(&[]);
		assert_eq!(stats.total_count, 0);
		assert_eq!(stats.failed_count, 0);
		assert_eq!(stats.success_rate, 0.0);
		assert_eq!(stats.average_score, 0.0);
		assert!(!stats.success_rate.is_nan());
	}

	#[test]
	fn score_tracks_passed() {
		assert_eq!(EvalResult::new(true, "", "", "", "").score, 1.0);
		assert_eq!(EvalResult::new(false, "", "", "", "").score, 0.0);
		let errored = EvalResult::errored("q", "boom");
		assert!(!errored.passed);
		assert_eq!(errored.score, 0.0);
		assert_eq!(errored.reasoning, "Evaluation error: boom");
		assert_eq!(errored.output, "");
		assert_eq!(errored.with_output("const A = 1;").output, "const A = 1;");
	}

	#[test]
	fn scenario_spec_uses_camel_case_fields() {
		let spec: ScenarioSpec = serde_json::from_str(
			r#"{"scenarioId": 7, "description": "pick a country", "evaluationPrompt": "Is it virtualized?"}"#,
		)
		.unwrap();
		assert_eq!(spec, ScenarioSpec::new(7, "pick a country", "Is it virtualized?"));
	}

	#[test]
	fn scenario_spec_problems() {
		assert!(ScenarioSpec::new(1, "a", "b").problems().is_empty());
		let problems = ScenarioSpec::new(0, " ", "").problems();
		assert_eq!(problems.len(), 3);
	}

	#[test]
	fn truncate_counts_characters() {
		assert_eq!(truncate("short", 10), "short");
		assert_eq!(truncate("ääääääääää", 5), "ääää…");
		assert_eq!(truncate("a\nb", 10), "a b");
	}

	#[test]
	fn summary_table_lists_every_scenario() {
		let run = EvaluationRun::new(vec![scenario(1, true), scenario(2, false)]);
		let table = run.summary_table();
		assert!(table.contains("description 1"));
		assert!(table.contains("description 2"));
		assert!(table.contains("Success rate: 50.0%"));
		assert_eq!(run.failed().count(), 1);
	}
}
