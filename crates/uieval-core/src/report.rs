use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};
use uieval_types::{EvaluationRun, EvaluationScenario, RunStatistics};

use crate::error::Result;
use crate::store::ArtifactStore;

/// A fully rendered report. Nothing is written until [`ReportGenerator::write`].
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub statistics: RunStatistics,
    pub generated_at: DateTime<Utc>,
    pub document: String,
}

pub struct ReportGenerator;

impl ReportGenerator {
    pub fn generate(scenarios: &[EvaluationScenario]) -> Report {
        Self::generate_at(scenarios, Utc::now())
    }

    /// Sections follow input order. Output depends only on `scenarios` and `generated_at`.
    pub fn generate_at(scenarios: &[EvaluationScenario], generated_at: DateTime<Utc>) -> Report {
        let statistics = RunStatistics::from_scenarios(scenarios);
        let mut document = render_header(&statistics, generated_at);
        for scenario in scenarios {
            render_scenario(&mut document, scenario);
        }
        Report {
            statistics,
            generated_at,
            document,
        }
    }

    pub async fn write(store: &dyn ArtifactStore, path: &Path, report: &Report) -> Result<()> {
        store.write_text(path, &report.document).await
    }
}

fn render_header(stats: &RunStatistics, generated_at: DateTime<Utc>) -> String {
    format!(
        "# AI Evaluation Report\n\n\
         **Generated:** {}\n\
         **Total Scenarios:** {}\n\
         **Passed:** {}\n\
         **Failed:** {}\n\
         **Success Rate:** {:.1}%\n\
         **Average Score:** {:.1}%\n\n\
         ---\n\n",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        stats.total_count,
        stats.passed_count,
        stats.failed_count,
        stats.success_rate,
        stats.average_score,
    )
}

fn render_scenario(out: &mut String, scenario: &EvaluationScenario) {
    let result = &scenario.eval_result;
    let status = if result.passed { "✅ PASSED" } else { "❌ FAILED" };

    // Writing into a String cannot fail.
    let _ = write!(out, "## Scenario {} {}\n\n", scenario.scenario_id, status);
    let _ = write!(out, "**Score:** {:.1}%\n\n", result.score * 100.0);
    if let Some(error) = &scenario.error {
        let _ = write!(out, "**Error:** {}\n\n", error);
    }
    let _ = write!(out, "### Input Description\n{}\n\n", scenario.description);
    let _ = write!(out, "### Evaluation Question\n{}\n\n", scenario.evaluation_prompt);
    let _ = write!(out, "### AI Evaluation Result\n**Answer:** {}\n\n", result.answer());
    let _ = write!(out, "### AI Reasoning\n{}\n\n", result.reasoning);
    out.push_str("### Generated Component Code\n");
    push_fenced(out, "typescript", &result.output);
    out.push_str("### Full AI Evaluation Response\n");
    push_fenced(out, "", &result.ai_evaluation);
    out.push_str("---\n\n");
}

/// Fence `body` verbatim, with a fence longer than any backtick run inside it.
fn push_fenced(out: &mut String, language: &str, body: &str) {
    let fence = "`".repeat(longest_backtick_run(body).max(2) + 1);
    out.push_str(&fence);
    out.push_str(language);
    out.push('\n');
    out.push_str(body);
    if !body.is_empty() && !body.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&fence);
    out.push_str("\n\n");
}

fn longest_backtick_run(s: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in s.chars() {
        if c == '`' {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

/// The block printed after a run: totals, report location, failed scenarios, table.
pub fn console_summary(run: &EvaluationRun, report_path: &Path) -> String {
    let stats = &run.statistics;
    let banner = "=".repeat(50);
    let mut out = String::new();
    let _ = writeln!(out, "{banner}");
    let _ = writeln!(out, "EVALUATION SUMMARY");
    let _ = writeln!(out, "{banner}");
    let _ = writeln!(out, "Total scenarios: {}", stats.total_count);
    let _ = writeln!(out, "Passed: {}", stats.passed_count);
    let _ = writeln!(out, "Failed: {}", stats.failed_count);
    let _ = writeln!(out, "Success rate: {:.1}%", stats.success_rate);
    let _ = writeln!(out, "Average score: {:.1}%", stats.average_score);
    let _ = writeln!(out, "\nDetailed report saved to: {}", report_path.display());

    let mut failed = run.failed().peekable();
    if failed.peek().is_some() {
        let _ = writeln!(out, "\nFailed scenarios:");
        for scenario in failed {
            let _ = writeln!(
                out,
                "- Scenario {}: {} (Score: {:.1}%)",
                scenario.scenario_id,
                scenario.description,
                scenario.eval_result.score * 100.0
            );
        }
    }

    if !run.scenarios.is_empty() {
        let _ = write!(out, "\n{}", run.summary_table());
    }
    out
}
