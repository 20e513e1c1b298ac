//! uieval-core: generate a UI component with an LLM, ask a judge LLM a yes/no
//! question about it, and aggregate the verdicts into a Markdown report.
//! Compose a completion client, a data source and a store; run with [`Runner`].

pub mod client;
pub mod config;
pub mod datasource;
pub mod engine;
pub mod error;
pub mod prompt;
pub mod report;
pub mod runner;
pub mod store;
pub mod testing;
pub mod trace;
pub mod verdict;

pub use client::{Completion, CompletionClient, OpenAiClient};
pub use config::{EvalConfig, FailurePolicy};
pub use datasource::{DataSource, JsonDataSource, VecDataSource};
pub use engine::{EngineSettings, EvaluationEngine, EvaluationFailure};
pub use error::{CompletionError, EvalError, Result};
pub use prompt::{build_generation_prompt, build_judgment_prompt, component_kind_from_path};
pub use report::{console_summary, Report, ReportGenerator};
pub use runner::{evaluate_scenarios, RunOutcome, Runner, RunnerBuilder};
pub use store::{ArtifactStore, FsStore};
pub use testing::{assert_all_passed, assert_average_score, assert_success_rate};
pub use trace::{report_trace, scope_traces, TokenUsage, Trace};
pub use uieval_types::{EvalResult, EvaluationRun, EvaluationScenario, RunStatistics, ScenarioSpec};
pub use verdict::{parse_verdict, Answer, Verdict, NO_REASONING};
