use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use uieval_core::{
	assert_success_rate, console_summary, EvalConfig, EvalError, FailurePolicy, OpenAiClient, Runner,
};

mod telemetry;

#[derive(Debug, Parser)]
#[command(
	name = "uieval",
	version,
	about = "Generate UI components with an LLM and judge them against a scenario dataset"
)]
struct Cli {
	#[command(subcommand)]
	command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
	/// Evaluate every scenario in the dataset and write a Markdown report.
	Run(RunArgs),
}

#[derive(Debug, Clone, Parser)]
struct RunArgs {
	/// YAML or JSON config file. Flags below override its values.
	#[arg(long, env = "UIEVAL_CONFIG")]
	config: Option<PathBuf>,

	/// Component instruction document (Markdown)
	#[arg(long)]
	instructions: Option<PathBuf>,

	/// JSON array or JSONL file of { "scenarioId", "description", "evaluationPrompt" }
	#[arg(long)]
	dataset: Option<PathBuf>,

	/// Where the Markdown report is written
	#[arg(long)]
	output: Option<PathBuf>,

	/// Generation model
	#[arg(long)]
	model: Option<String>,

	/// Judge model. Defaults to the generation model.
	#[arg(long)]
	judge_model: Option<String>,

	/// Comma-separated technologies the component must use
	#[arg(long, value_delimiter = ',')]
	technologies: Option<Vec<String>>,

	/// Base URL of the OpenAI-compatible API
	#[arg(long)]
	api_base: Option<String>,

	/// Scenarios in flight at once
	#[arg(long)]
	concurrency: Option<usize>,

	/// Record failed scenarios and keep going instead of aborting
	#[arg(long, action = ArgAction::SetTrue)]
	isolate_failures: bool,

	/// Per-call timeout in seconds
	#[arg(long)]
	timeout_secs: Option<u64>,

	/// Name the report <component>-<stem>-<timestamp>.md
	#[arg(long, action = ArgAction::SetTrue)]
	timestamped_output: bool,

	/// Also write the full run, traces included, as JSON
	#[arg(long)]
	json_out: Option<PathBuf>,

	/// Exit non-zero when the success rate (percent) is below this
	#[arg(long)]
	min_success_rate: Option<f64>,

	/// Emit logs as JSON lines
	#[arg(long, action = ArgAction::SetTrue)]
	log_json: bool,
}

impl RunArgs {
	/// Layer explicit flags over `config`.
	fn apply(&self, mut config: EvalConfig) -> EvalConfig {
		if let Some(path) = &self.instructions {
			config.instruction_file = path.clone();
		}
		if let Some(path) = &self.dataset {
			config.dataset_file = path.clone();
		}
		if let Some(path) = &self.output {
			config.output_file = path.clone();
		}
		if let Some(model) = &self.model {
			config.model = model.clone();
		}
		if let Some(judge) = &self.judge_model {
			config.judge_model = Some(judge.clone());
		}
		if let Some(technologies) = &self.technologies {
			config.technologies = technologies
				.iter()
				.map(|t| t.trim().to_string())
				.filter(|t| !t.is_empty())
				.collect();
		}
		if let Some(api_base) = &self.api_base {
			config.api_base = api_base.clone();
		}
		if let Some(concurrency) = self.concurrency {
			config.concurrency = concurrency;
		}
		if self.isolate_failures {
			config.failure_policy = FailurePolicy::Isolate;
		}
		if let Some(secs) = self.timeout_secs {
			config.request_timeout_secs = Some(secs);
		}
		if self.timestamped_output {
			config.timestamped_output = true;
		}
		config
	}

	fn load_config(&self) -> Result<EvalConfig> {
		let base = match &self.config {
			Some(path) => EvalConfig::from_file(path)?,
			None => EvalConfig::default(),
		};
		Ok(self.apply(base))
	}
}

/// Every reason the run cannot start, reported together.
fn preflight(config: &EvalConfig) -> std::result::Result<(), EvalError> {
	let mut problems = config.validate();
	if config.api_key().is_none() {
		problems.push(config.missing_api_key_message());
	}
	if problems.is_empty() {
		Ok(())
	} else {
		Err(EvalError::Configuration(problems))
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	dotenvy::dotenv().ok();
	let cli = Cli::parse();
	match cli.command {
		Commands::Run(args) => {
			telemetry::init_tracing(args.log_json, tracing::Level::INFO);
			if let Err(err) = run(args).await {
				tracing::error!(error = %err, "evaluation run failed");
				return Err(err);
			}
		}
	}
	Ok(())
}

async fn run(args: RunArgs) -> Result<()> {
	let config = args.load_config()?;
	preflight(&config)?;
	let client = OpenAiClient::from_config(&config)?;

	let runner = Runner::builder()
		.config(config)
		.client(Arc::new(client))
		.build()?;
	let outcome = runner.run().await?;

	println!("\n{}", console_summary(&outcome.run, &outcome.report_path));

	if let Some(path) = args.json_out {
		let json = serde_json::to_string_pretty(&outcome.run)?;
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			tokio::fs::create_dir_all(parent).await?;
		}
		tokio::fs::write(&path, json).await?;
		tracing::info!(path = %path.display(), "run exported");
	}

	if let Some(min) = args.min_success_rate {
		assert_success_rate(&outcome.run, min)?;
	}

	Ok(())
}
