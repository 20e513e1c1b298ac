use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use uieval_types::EvaluationRun;

use crate::client::{Completion, CompletionClient};
use crate::error::{CompletionError, EvalError};
use crate::store::ArtifactStore;

/// Helper to assert the run's success rate (a percentage) meets a threshold.
///
/// Use this in your `#[tokio::test]` functions.
///
/// # Example
/// ```ignore
/// #[tokio::test]
/// async fn select_component_guidelines() -> anyhow::Result<()> {
///     let outcome = Runner::builder()
///         .config(config)
///         .client(client)
///         .build()?
///         .run()
///         .await?;
///
///     // Assert 80% success rate
///     assert_success_rate(&outcome.run, 80.0)?;
///
///     Ok(())
/// }
/// ```
pub fn assert_success_rate(run: &EvaluationRun, min_percent: f64) -> Result<()> {
    if run.statistics.success_rate < min_percent {
        anyhow::bail!(
            "Evaluation failed: success rate {:.1}% is below threshold {:.1}%\n{}",
            run.statistics.success_rate,
            min_percent,
            run.summary_table()
        );
    }
    Ok(())
}

/// Helper to assert the average score (a percentage) meets a threshold.
pub fn assert_average_score(run: &EvaluationRun, min_percent: f64) -> Result<()> {
    if run.statistics.average_score < min_percent {
        anyhow::bail!(
            "Evaluation failed: average score {:.1}% is below threshold {:.1}%\n{}",
            run.statistics.average_score,
            min_percent,
            run.summary_table()
        );
    }
    Ok(())
}

/// Helper to assert every scenario passed.
pub fn assert_all_passed(run: &EvaluationRun) -> Result<()> {
    if run.statistics.passed_count != run.statistics.total_count {
        anyhow::bail!(
            "Evaluation failed: {}/{} scenarios passed\n{}",
            run.statistics.passed_count,
            run.statistics.total_count,
            run.summary_table()
        );
    }
    Ok(())
}

/// A completion call seen by [`ScriptedClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub prompt: String,
    pub model: String,
}

type Handler = dyn Fn(&str, &str) -> std::result::Result<String, CompletionError> + Send + Sync;
type DelayFn = dyn Fn(&str) -> Duration + Send + Sync;

/// Offline `CompletionClient` answering from a closure over `(prompt, model)`.
pub struct ScriptedClient {
    handler: Box<Handler>,
    delay: Option<Box<DelayFn>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedClient {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&str, &str) -> std::result::Result<String, CompletionError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer every generation prompt with `artifact` and every judgment prompt with `judge_reply`.
    pub fn with_replies(artifact: impl Into<String>, judge_reply: impl Into<String>) -> Self {
        let artifact = artifact.into();
        let judge_reply = judge_reply.into();
        Self::new(move |prompt, _model| {
            if is_judgment_prompt(prompt) {
                Ok(judge_reply.clone())
            } else {
                Ok(artifact.clone())
            }
        })
    }

    /// Sleep before answering, for a duration chosen per prompt.
    pub fn delayed<D>(mut self, delay: D) -> Self
    where
        D: Fn(&str) -> Duration + Send + Sync + 'static,
    {
        self.delay = Some(Box::new(delay));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

pub fn is_judgment_prompt(prompt: &str) -> bool {
    prompt.contains("You are an expert code reviewer.")
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, prompt: &str, model: &str) -> std::result::Result<Completion, CompletionError> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(RecordedCall {
                prompt: prompt.to_string(),
                model: model.to_string(),
            });
        if let Some(delay) = &self.delay {
            tokio::time::sleep(delay(prompt)).await;
        }
        (self.handler)(prompt, model).map(Completion::text)
    }
}

/// In-memory `ArtifactStore` that counts reads.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Mutex<HashMap<PathBuf, String>>,
    reads: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(path.into(), content.into());
        self
    }

    pub fn get(&self, path: &Path) -> Option<String> {
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(path)
            .cloned()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn read_text(&self, path: &Path) -> crate::Result<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.get(path).ok_or_else(|| EvalError::Read {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file in memory store"),
        })
    }

    async fn write_text(&self, path: &Path, content: &str) -> crate::Result<()> {
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(path.to_path_buf(), content.to_string());
        Ok(())
    }
}
