//! Review gate
//!
//! Fetches the staged and unstaged diffs, sends them to the LLM with a
//! structured-review system prompt, and coerces the JSON reply into a
//! [`ReviewResult`]. An empty diff auto-approves without an LLM call.
//!
//! Response parsing is deliberately two-stage: a permissive raw shape is
//! extracted first, then filtered into the domain type so a malformed reply
//! can never surface as anything but a parse blocker.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use super::ReviewResult;
use crate::config::ReviewConfig;
use crate::domain::Task;
use crate::llm::{ChatMessage, LlmClient};
use crate::vcs::Vcs;

const REVIEW_SYSTEM_PROMPT: &str = "You are a strict code reviewer. Review the diff against these criteria:\n\
1. Correctness: does the change do what the task asks?\n\
2. Safety: no obvious bugs, panics, or unhandled error paths.\n\
3. Tests: behavior changes come with test changes.\n\
4. Scope: no unrelated edits.\n";

const RESPONSE_SCHEMA: &str = "Respond with a single JSON object and nothing else:\n\
{\"approved\": boolean, \"comments\": [string], \"suggestions\": [string], \"blockers\": [string]}\n\
Approve only when there are no blockers.";

/// Raw, permissive shape of the model reply; fields are coerced
/// individually so one bad field cannot poison the rest.
#[derive(Debug, Default, Deserialize)]
struct RawReview {
    #[serde(default)]
    approved: Option<serde_json::Value>,

    #[serde(default)]
    comments: Option<Vec<serde_json::Value>>,

    #[serde(default)]
    suggestions: Option<Vec<serde_json::Value>>,

    #[serde(default)]
    blockers: Option<Vec<serde_json::Value>>,
}

/// AI review gate runner
pub struct ReviewRunner {
    llm: Arc<dyn LlmClient>,
    vcs: Arc<dyn Vcs>,
    config: ReviewConfig,
    iteration: u32,
}

impl ReviewRunner {
    pub fn new(llm: Arc<dyn LlmClient>, vcs: Arc<dyn Vcs>, config: ReviewConfig) -> Self {
        Self {
            llm,
            vcs,
            config,
            iteration: 0,
        }
    }

    pub fn set_iteration(&mut self, iteration: u32) {
        self.iteration = iteration;
    }

    pub async fn run(&self, task: &Task) -> ReviewResult {
        debug!(task_id = %task.id, iteration = self.iteration, "ReviewRunner::run: called");

        let staged = match self.vcs.diff(true).await {
            Ok(diff) => diff,
            Err(e) => return Self::blocked(format!("Failed to fetch staged diff: {}", e)),
        };
        let unstaged = match self.vcs.diff(false).await {
            Ok(diff) => diff,
            Err(e) => return Self::blocked(format!("Failed to fetch unstaged diff: {}", e)),
        };

        let combined = match (staged.trim().is_empty(), unstaged.trim().is_empty()) {
            (true, true) => {
                debug!(task_id = %task.id, "ReviewRunner::run: empty diff, auto-approving");
                return ReviewResult {
                    approved: true,
                    comments: vec!["No changes to review".to_string()],
                    suggestions: vec![],
                    blockers: vec![],
                };
            }
            (true, false) => unstaged,
            (false, true) => staged,
            (false, false) => format!("{}\n{}", staged, unstaged),
        };

        let diff = self.truncate_diff(&combined);

        let messages = vec![
            ChatMessage::system(self.system_prompt()),
            ChatMessage::user(format!(
                "Task: {}\n{}\n\nDiff to review:\n{}",
                task.name, task.description, diff
            )),
        ];

        let response = match self.llm.chat(&messages).await {
            Ok(response) => response,
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "Review LLM call failed");
                return Self::blocked(format!("Review execution error: {}", e));
            }
        };

        let result = parse_review_response(&response.content);
        info!(
            task_id = %task.id,
            approved = result.approved,
            blockers = result.blockers.len(),
            "Review gate complete"
        );
        result
    }

    fn system_prompt(&self) -> String {
        let mut prompt = REVIEW_SYSTEM_PROMPT.to_string();
        for (i, criterion) in self.config.additional_criteria.iter().enumerate() {
            prompt.push_str(&format!("{}. {}\n", 5 + i, criterion));
        }
        prompt.push('\n');
        prompt.push_str(RESPONSE_SCHEMA);
        prompt
    }

    /// Truncate an oversized diff at the nearest newline under the limit
    /// and append the sentinel.
    fn truncate_diff(&self, diff: &str) -> String {
        if diff.len() <= self.config.max_diff_size {
            return diff.to_string();
        }
        let cut = diff[..self.config.max_diff_size]
            .rfind('\n')
            .unwrap_or(self.config.max_diff_size);
        debug!(original = diff.len(), cut, "ReviewRunner::truncate_diff: truncating");
        format!("{}\n[DIFF TRUNCATED]", &diff[..cut])
    }

    fn blocked(message: String) -> ReviewResult {
        ReviewResult {
            approved: false,
            comments: vec![],
            suggestions: vec![],
            blockers: vec![message],
        }
    }
}

/// Coerce a model reply into a [`ReviewResult`].
///
/// Strips optional fenced-code wrappers, extracts the outermost `{...}`
/// span, parses permissively, then normalizes: `approved` must be a real
/// boolean, the three lists keep only string elements, and approval is
/// withdrawn whenever blockers remain.
fn parse_review_response(content: &str) -> ReviewResult {
    let Some(raw) = extract_json_object(content) else {
        return parse_failure(content);
    };
    let Ok(review) = serde_json::from_str::<RawReview>(&raw) else {
        return parse_failure(content);
    };
    let Some(approved) = review.approved.as_ref().and_then(|v| v.as_bool()) else {
        return parse_failure(content);
    };

    let strings = |values: Option<Vec<serde_json::Value>>| -> Vec<String> {
        values
            .unwrap_or_default()
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    };

    let comments = strings(review.comments);
    let suggestions = strings(review.suggestions);
    let blockers = strings(review.blockers);

    ReviewResult {
        // approval requires an empty blocker list
        approved: approved && blockers.is_empty(),
        comments,
        suggestions,
        blockers,
    }
}

fn parse_failure(content: &str) -> ReviewResult {
    let preview: String = content.chars().take(200).collect();
    ReviewResult {
        approved: false,
        comments: vec![],
        suggestions: vec![],
        blockers: vec![format!("Failed to parse review response: {}", preview)],
    }
}

/// Strip fenced-code wrappers and return the outermost `{...}` span.
fn extract_json_object(content: &str) -> Option<String> {
    let mut text = content.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // drop the info string line and the closing fence
        text = rest;
        if let Some(newline) = text.find('\n') {
            text = &text[newline + 1..];
        }
        text = text.strip_suffix("```").unwrap_or(text).trim();
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(text[start..=end].to_string())
}
