//! Answer generator: drives the streaming generation call with the ranked
//! documents as numbered sources, forwarding token deltas in arrival order.
//!
//! The citation set is emitted before the first delta. Mid-stream failure
//! preserves whatever text and citations were already produced; the caller
//! turns the recorded error into the terminal frame.

use std::future::Future;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use beacon_core::errors::BeaconError;
use beacon_core::models::{ChatTurn, Document, OptimizationMode, RankedDocument};
use beacon_core::traits::ChatModel;

use crate::protocol::{StreamClosed, StreamingEncoder};

/// Base answering instructions; the focus-mode response template and the
/// caller's system instructions are layered on top.
const RESPONSE_ENVELOPE: &str = "You are a search assistant. Answer the user's question using the \
numbered sources below when they are relevant, citing them inline as [number]. When no source \
covers the question, answer from general knowledge and say so.";

const SUGGESTION_ENVELOPE: &str = "Given the conversation and the answer just produced, propose up \
to three short follow-up questions the user might ask next. Return one question per line, nothing \
else.";

/// Everything accumulated by the time the stream stopped.
#[derive(Default)]
pub struct GenerationOutcome {
    pub content: String,
    pub sources: Vec<Document>,
    pub suggestions: Vec<String>,
    /// Set when the stream must terminate with an `error` frame.
    pub error: Option<BeaconError>,
}

/// Result of one cancel-aware frame send.
enum Dispatch {
    Sent,
    ConsumerGone,
    Cancelled,
}

/// A send into the bounded frame channel blocks while the consumer is not
/// reading; racing it against the turn's cancellation keeps a stalled
/// consumer from holding the turn past its deadline.
async fn dispatch(
    cancel: &CancellationToken,
    send: impl Future<Output = Result<(), StreamClosed>>,
) -> Dispatch {
    tokio::select! {
        _ = cancel.cancelled() => Dispatch::Cancelled,
        result = send => match result {
            Ok(()) => Dispatch::Sent,
            Err(StreamClosed) => Dispatch::ConsumerGone,
        },
    }
}

/// Stream an answer through the encoder.
#[allow(clippy::too_many_arguments)]
pub async fn generate(
    chat: &dyn ChatModel,
    history: &[ChatTurn],
    question: &str,
    ranked: &[RankedDocument],
    system_instructions: &str,
    response_template: &str,
    mode: OptimizationMode,
    encoder: &StreamingEncoder,
    cancel: &CancellationToken,
    deadline_secs: u64,
) -> GenerationOutcome {
    let mut outcome = GenerationOutcome {
        sources: ranked.iter().map(|r| r.document.clone()).collect(),
        ..Default::default()
    };

    // Citation set first: it must be available before the terminal frame
    // regardless of how generation goes.
    match dispatch(cancel, encoder.sources(&outcome.sources)).await {
        Dispatch::Sent => {}
        Dispatch::ConsumerGone => {
            debug!("consumer gone before sources frame");
            return outcome;
        }
        Dispatch::Cancelled => {
            outcome.error = Some(BeaconError::DeadlineExceeded(deadline_secs));
            return outcome;
        }
    }

    let turns = build_turns(history, question, ranked, system_instructions, response_template);

    let mut stream = match chat.generate_stream(&turns).await {
        Ok(stream) => stream,
        Err(e) => {
            outcome.error = Some(BeaconError::Generation(e.to_string()));
            return outcome;
        }
    };

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                outcome.error = Some(BeaconError::DeadlineExceeded(deadline_secs));
                return outcome;
            }
            item = stream.next() => match item {
                Some(Ok(delta)) => {
                    outcome.content.push_str(&delta);
                    match dispatch(cancel, encoder.token_delta(&delta)).await {
                        Dispatch::Sent => {}
                        Dispatch::ConsumerGone => {
                            debug!("consumer gone mid-stream");
                            return outcome;
                        }
                        Dispatch::Cancelled => {
                            outcome.error = Some(BeaconError::DeadlineExceeded(deadline_secs));
                            return outcome;
                        }
                    }
                }
                Some(Err(e)) => {
                    outcome.error = Some(BeaconError::Generation(e.to_string()));
                    return outcome;
                }
                None => break,
            }
        }
    }

    if mode.suggestions() {
        tokio::select! {
            _ = cancel.cancelled() => {
                outcome.error = Some(BeaconError::DeadlineExceeded(deadline_secs));
                return outcome;
            }
            suggestions = suggest(chat, question, &outcome.content) => {
                if !suggestions.is_empty() {
                    match dispatch(cancel, encoder.suggestions(&suggestions)).await {
                        Dispatch::Sent => outcome.suggestions = suggestions,
                        Dispatch::ConsumerGone => return outcome,
                        Dispatch::Cancelled => {
                            outcome.error = Some(BeaconError::DeadlineExceeded(deadline_secs));
                            return outcome;
                        }
                    }
                }
            }
        }
    }

    outcome
}

/// Follow-up suggestion pass. Best-effort: failure means no suggestions.
async fn suggest(chat: &dyn ChatModel, question: &str, answer: &str) -> Vec<String> {
    let turns = vec![
        ChatTurn::system(SUGGESTION_ENVELOPE),
        ChatTurn::user(format!("Question: {question}\n\nAnswer: {answer}")),
    ];
    match chat.generate(&turns).await {
        Ok(output) => parse_suggestions(&output),
        Err(e) => {
            warn!(error = %e, "suggestion pass failed, skipping");
            Vec::new()
        }
    }
}

fn build_turns(
    history: &[ChatTurn],
    question: &str,
    ranked: &[RankedDocument],
    system_instructions: &str,
    response_template: &str,
) -> Vec<ChatTurn> {
    let mut system = String::new();
    if !system_instructions.is_empty() {
        system.push_str(system_instructions);
        system.push_str("\n\n");
    }
    system.push_str(RESPONSE_ENVELOPE);
    if !response_template.is_empty() {
        system.push_str("\n\n");
        system.push_str(response_template);
    }
    system.push_str("\n\n");
    system.push_str(&context_block(ranked));

    let mut turns = Vec::with_capacity(history.len() + 2);
    turns.push(ChatTurn::system(system));
    turns.extend(history.iter().cloned());
    turns.push(ChatTurn::user(question));
    turns
}

/// The numbered-sources block embedded in the system turn.
fn context_block(ranked: &[RankedDocument]) -> String {
    if ranked.is_empty() {
        return "No sources were retrieved for this question.".to_string();
    }
    let mut block = String::from("Sources:\n");
    for (i, r) in ranked.iter().enumerate() {
        let doc = &r.document;
        block.push_str(&format!("[{}] {} - {} ({})\n", i + 1, doc.title, doc.snippet, doc.url));
    }
    block
}

/// Parse the suggestion pass output: one suggestion per non-empty line,
/// list markers stripped, capped at three.
fn parse_suggestions(output: &str) -> Vec<String> {
    output
        .lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(['-', '*', '•'])
                .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ')')
                .trim()
        })
        .filter(|line| !line.is_empty())
        .take(3)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked(title: &str, url: &str) -> RankedDocument {
        RankedDocument::scored(Document::new(title, url, "snippet"), 0.9)
    }

    #[test]
    fn context_block_numbers_sources_in_rank_order() {
        let docs = vec![ranked("First", "https://a.example"), ranked("Second", "https://b.example")];
        let block = context_block(&docs);
        assert!(block.contains("[1] First"));
        assert!(block.contains("[2] Second"));
        assert!(block.find("[1]").unwrap() < block.find("[2]").unwrap());
    }

    #[test]
    fn empty_sources_get_explicit_notice() {
        assert!(context_block(&[]).contains("No sources"));
    }

    #[test]
    fn system_turn_layers_instructions_template_and_context() {
        let turns = build_turns(
            &[ChatTurn::user("earlier")],
            "now",
            &[ranked("Doc", "https://d.example")],
            "be terse",
            "answer in bullet points",
        );
        assert_eq!(turns.len(), 3);
        let system = &turns[0].content;
        assert!(system.starts_with("be terse"));
        assert!(system.contains("bullet points"));
        assert!(system.contains("[1] Doc"));
        assert_eq!(turns[2].content, "now");
    }

    #[test]
    fn suggestions_parse_strips_markers_and_caps() {
        let out = "1. What about Lyon?\n- And Marseille?\n* Third\nFourth question?";
        let parsed = parse_suggestions(out);
        assert_eq!(
            parsed,
            vec!["What about Lyon?", "And Marseille?", "Third"]
        );
    }

    #[test]
    fn blank_suggestion_output_is_empty() {
        assert!(parse_suggestions("\n  \n").is_empty());
    }
}
