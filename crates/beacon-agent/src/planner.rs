//! Query planner: one non-streaming generation call turns the conversation
//! into zero or more standalone search queries.
//!
//! The output contract with the model is deterministic: each query on its
//! own line inside `<query></query>` tags, or the `not_needed` sentinel when
//! the turn needs no retrieval. Planner failure is never fatal: the raw
//! user message becomes the single query.

use tracing::{debug, warn};

use beacon_core::models::ChatTurn;
use beacon_core::traits::ChatModel;

/// Output-format contract prepended to every planning prompt. The
/// focus-mode template supplies the domain instructions on top of this.
const PLANNER_ENVELOPE: &str = "You rewrite the latest question in a conversation into standalone \
web search queries, resolving pronouns and references against the prior turns. Return each query \
on its own line wrapped in <query></query> tags. If the question needs no web search (a greeting, \
a pure writing task, or something answerable from the conversation alone), return exactly \
<query>not_needed</query>.";

/// Plan search queries for a turn.
///
/// Returns an empty list when the model signals that no retrieval is
/// needed. A failing generation call falls back to the raw question.
pub async fn plan(
    chat: &dyn ChatModel,
    history: &[ChatTurn],
    question: &str,
    template: &str,
    file_summaries: &[String],
) -> Vec<String> {
    let mut system = String::from(PLANNER_ENVELOPE);
    if !template.is_empty() {
        system.push_str("\n\n");
        system.push_str(template);
    }
    if !file_summaries.is_empty() {
        system.push_str("\n\nAttached files:\n");
        for summary in file_summaries {
            system.push_str("- ");
            system.push_str(summary);
            system.push('\n');
        }
    }

    let mut turns = Vec::with_capacity(history.len() + 2);
    turns.push(ChatTurn::system(system));
    turns.extend(history.iter().cloned());
    turns.push(ChatTurn::user(question));

    match chat.generate(&turns).await {
        Ok(output) => {
            let queries = parse_queries(&output);
            debug!(count = queries.len(), "planner produced queries");
            queries
        }
        Err(e) => {
            warn!(error = %e, "planner generation failed, falling back to raw question");
            vec![question.to_string()]
        }
    }
}

/// Parse planner output. `<query>` tags are authoritative; without them,
/// each non-empty line counts as a query. The `not_needed` sentinel wins
/// over everything.
fn parse_queries(output: &str) -> Vec<String> {
    let mut queries = Vec::new();
    let mut rest = output;
    while let Some(start) = rest.find("<query>") {
        let after = &rest[start + "<query>".len()..];
        match after.find("</query>") {
            Some(end) => {
                let q = after[..end].trim();
                if !q.is_empty() {
                    queries.push(q.to_string());
                }
                rest = &after[end + "</query>".len()..];
            }
            None => break,
        }
    }

    if queries.is_empty() {
        queries = output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
    }

    if queries.iter().any(|q| q == "not_needed") {
        return Vec::new();
    }
    queries
}
