use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use uieval_types::ScenarioSpec;

use crate::error::{EvalError, Result};
use crate::store::{ArtifactStore, FsStore};

#[async_trait]
pub trait DataSource: Send + Sync {
    /// Load every scenario in dataset order.
    async fn load(&self) -> Result<Vec<ScenarioSpec>>;
}

/// Scenarios embedded as literal data.
pub struct VecDataSource {
    scenarios: Vec<ScenarioSpec>,
}

impl VecDataSource {
    pub fn new(scenarios: Vec<ScenarioSpec>) -> Self {
        Self { scenarios }
    }
}

#[async_trait]
impl DataSource for VecDataSource {
    async fn load(&self) -> Result<Vec<ScenarioSpec>> {
        validate(Path::new("<embedded>"), &self.scenarios)?;
        Ok(self.scenarios.clone())
    }
}

/// Read a dataset file. Two layouts are accepted:
/// - a JSON array of `{"scenarioId": 1, "description": "...", "evaluationPrompt": "..."}`
/// - JSON Lines with one such object per line, when the extension is `.jsonl`
pub struct JsonDataSource {
    path: PathBuf,
    store: Arc<dyn ArtifactStore>,
}

impl JsonDataSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            store: Arc::new(FsStore::new()),
        }
    }

    pub fn with_store(path: impl Into<PathBuf>, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            path: path.into(),
            store,
        }
    }
}

#[async_trait]
impl DataSource for JsonDataSource {
    async fn load(&self) -> Result<Vec<ScenarioSpec>> {
        let content = self.store.read_text(&self.path).await?;
        let scenarios = parse(&self.path, &content)?;
        validate(&self.path, &scenarios)?;
        Ok(scenarios)
    }
}

fn is_jsonl(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "jsonl")
}

fn parse(path: &Path, content: &str) -> Result<Vec<ScenarioSpec>> {
    let invalid = |problems: Vec<String>| EvalError::Dataset {
        path: path.to_path_buf(),
        problems,
    };

    if !is_jsonl(path) {
        return serde_json::from_str(content).map_err(|e| invalid(vec![e.to_string()]));
    }

    let mut scenarios = Vec::new();
    let mut problems = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<ScenarioSpec>(line) {
            Ok(spec) => scenarios.push(spec),
            Err(e) => problems.push(format!("line {}: {}", idx + 1, e)),
        }
    }
    if problems.is_empty() {
        Ok(scenarios)
    } else {
        Err(invalid(problems))
    }
}

/// Check every record invariant plus id uniqueness, collecting all violations.
pub fn validate(path: &Path, scenarios: &[ScenarioSpec]) -> Result<()> {
    let mut problems = Vec::new();
    let mut seen = HashSet::new();
    for spec in scenarios {
        problems.extend(spec.problems());
        if spec.scenario_id != 0 && !seen.insert(spec.scenario_id) {
            problems.push(format!("duplicate scenarioId {}", spec.scenario_id));
        }
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(EvalError::Dataset {
            path: path.to_path_buf(),
            problems,
        })
    }
}
