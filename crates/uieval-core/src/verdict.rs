//! Verdict extraction from a judge reply.
//!
//! Grammar, keywords case-insensitive, surrounding text ignored:
//!
//! ```text
//! reply     := .* answer? .* reasoning?
//! answer    := "ANSWER:" ws* ("YES" | "NO") word-boundary
//! reasoning := "REASONING:" ws* rest-of-reply
//! ```
//!
//! The first `answer` wins. A missing or unrecognised answer is a failed
//! verdict, never an error. A missing or blank reasoning becomes
//! [`NO_REASONING`].

use std::sync::OnceLock;

use regex::Regex;
use uieval_types::EvalResult;

pub const NO_REASONING: &str = "No reasoning provided";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// `None` when the reply carried no recognisable answer line.
    pub answer: Option<Answer>,
    pub reasoning: String,
}

impl Verdict {
    pub fn passed(&self) -> bool {
        self.answer == Some(Answer::Yes)
    }

    pub fn into_result(self, output: String, test_prompt: &str, ai_evaluation: String) -> EvalResult {
        EvalResult::new(self.passed(), output, test_prompt, ai_evaluation, self.reasoning)
    }
}

fn answer_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)ANSWER:\s*(YES|NO)\b").expect("answer pattern is valid"))
}

fn reasoning_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?is)REASONING:\s*(.*)").expect("reasoning pattern is valid"))
}

pub fn parse_verdict(reply: &str) -> Verdict {
    let answer = answer_pattern()
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .map(|m| {
            if m.as_str().eq_ignore_ascii_case("yes") {
                Answer::Yes
            } else {
                Answer::No
            }
        });

    let reasoning = reasoning_pattern()
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|r| !r.is_empty())
        .unwrap_or(NO_REASONING)
        .to_string();

    Verdict { answer, reasoning }
}
