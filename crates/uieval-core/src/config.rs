use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{EvalError, Result};
use crate::prompt::component_kind_from_path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    pub instruction_file: PathBuf,
    pub dataset_file: PathBuf,
    pub output_file: PathBuf,
    /// Model used for generation, and for judgment unless `judge_model` is set.
    pub model: String,
    pub judge_model: Option<String>,
    pub technologies: Vec<String>,
    pub api_base: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Scenarios in flight at once. 1 keeps the run strictly sequential.
    pub concurrency: usize,
    pub failure_policy: FailurePolicy,
    /// Per-call timeout. Unset means calls may wait indefinitely.
    pub request_timeout_secs: Option<u64>,
    /// Embed the component label and run timestamp in the report file name.
    pub timestamped_output: bool,
}

/// What a failed scenario does to the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Propagate the first failure; no report is written.
    #[default]
    Abort,
    /// Record the scenario as failed and keep going.
    Isolate,
}

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            instruction_file: PathBuf::from("instructions/select.md"),
            dataset_file: PathBuf::from("datasets/select.json"),
            output_file: PathBuf::from("reports/report.md"),
            model: DEFAULT_MODEL.to_string(),
            judge_model: None,
            technologies: ["Vite", "React", "Tailwind CSS", "Shadcn UI", "TypeScript"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            concurrency: 1,
            failure_policy: FailurePolicy::Abort,
            request_timeout_secs: None,
            timestamped_output: false,
        }
    }
}

impl EvalConfig {
    /// Load a YAML (`.yaml`/`.yml`) or JSON config file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| EvalError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let is_yaml = path
            .extension()
            .is_some_and(|ext| ext == "yaml" || ext == "yml");
        let parsed = if is_yaml {
            serde_yaml::from_str(&content).map_err(|e| e.to_string())
        } else {
            serde_json::from_str(&content).map_err(|e| e.to_string())
        };
        parsed.map_err(|e| {
            EvalError::Configuration(vec![format!("invalid config {}: {e}", path.display())])
        })
    }

    pub fn judge_model(&self) -> &str {
        self.judge_model.as_deref().unwrap_or(&self.model)
    }

    pub fn component_kind(&self) -> String {
        component_kind_from_path(&self.instruction_file)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// The API key, if the configured variable is set and non-empty.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    pub fn missing_api_key_message(&self) -> String {
        format!("environment variable {} is not set", self.api_key_env)
    }

    /// Every problem that would stop a run, checked before any network call.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !self.instruction_file.is_file() {
            problems.push(format!(
                "instruction file not found: {}",
                self.instruction_file.display()
            ));
        }
        if !self.dataset_file.is_file() {
            problems.push(format!(
                "dataset file not found: {}",
                self.dataset_file.display()
            ));
        }
        if let Some(problem) = output_location_problem(&self.output_file) {
            problems.push(problem);
        }
        if self.concurrency == 0 {
            problems.push("concurrency must be at least 1".to_string());
        }
        if self.model.trim().is_empty() {
            problems.push("model must not be empty".to_string());
        }
        problems
    }

    /// Report path for a run started at `started_at`.
    pub fn report_path(&self, started_at: DateTime<Utc>) -> PathBuf {
        if !self.timestamped_output {
            return self.output_file.clone();
        }
        let stem = self
            .output_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "report".to_string());
        let extension = self
            .output_file
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "md".to_string());
        let file_name = format!(
            "{}-{}-{}.{}",
            self.component_kind(),
            stem,
            started_at.format("%Y-%m-%d_%H-%M-%S"),
            extension
        );
        self.output_file.with_file_name(file_name)
    }
}

/// The nearest existing ancestor of `output` must be a directory this process can create files in.
fn output_location_problem(output: &Path) -> Option<String> {
    if output.is_dir() {
        return Some(format!("output path is a directory: {}", output.display()));
    }
    let existing = output
        .ancestors()
        .skip(1)
        .map(|dir| if dir.as_os_str().is_empty() { Path::new(".") } else { dir })
        .find(|dir| dir.exists())?;
    match std::fs::metadata(existing) {
        Ok(meta) if !meta.is_dir() => Some(format!(
            "output directory is not a directory: {}",
            existing.display()
        )),
        Ok(_) => tempfile::Builder::new()
            .prefix(".uieval-write-check")
            .tempfile_in(existing)
            .err()
            .map(|e| format!("output directory is not writable: {}: {e}", existing.display())),
        Err(e) => Some(format!(
            "output directory is not accessible: {}: {e}",
            existing.display()
        )),
    }
}
