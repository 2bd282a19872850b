//! Orchestrator: composes planner, retrieval, ranker, generator, protocol
//! encoder, and the session store into one turn.
//!
//! Side-effect ordering per turn: the user message write happens before any
//! retrieval call; the assistant message write happens after the terminal
//! frame. One wall-clock deadline covers the whole turn; its cancellation
//! token reaches every in-flight external call.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use beacon_core::config::BeaconConfig;
use beacon_core::errors::{BeaconError, BeaconResult, ProviderError};
use beacon_core::models::{ModelRef, Role, StreamFrame, TurnRequest};
use beacon_core::traits::{ChatModel, EmbeddingModel, SearchEngine, SessionStore};
use beacon_providers::{ModelListing, ModelRegistry};
use beacon_retrieval::{ranking, RetrievalClient};

use crate::generator::{self, GenerationOutcome};
use crate::planner;
use crate::protocol::{ProtocolEncoder, StreamingEncoder};

/// Frame channel depth. Bounded so a stalled consumer applies backpressure
/// to generation instead of buffering the whole answer.
const FRAME_CHANNEL_DEPTH: usize = 64;

/// An accepted turn: the assistant message id and the frame stream.
#[derive(Debug)]
pub struct TurnStream {
    pub assistant_message_id: String,
    pub frames: ReceiverStream<StreamFrame>,
}

/// Per-process turn orchestrator. Shared across turns; all per-turn state
/// lives in the spawned task.
pub struct Orchestrator {
    registry: Arc<ModelRegistry>,
    search: Arc<dyn SearchEngine>,
    store: Arc<dyn SessionStore>,
    config: BeaconConfig,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<ModelRegistry>,
        search: Arc<dyn SearchEngine>,
        store: Arc<dyn SessionStore>,
        config: BeaconConfig,
    ) -> Self {
        Self {
            registry,
            search,
            store,
            config,
        }
    }

    /// The provider availability listing.
    pub fn available_models(&self) -> ModelListing {
        self.registry.available()
    }

    /// Handle one inbound turn.
    ///
    /// Fails fast (no stream opened, no writes) on empty content or
    /// unresolvable model selectors. On success the user message is already
    /// persisted and the returned stream will carry exactly one terminal
    /// frame.
    pub async fn handle_turn(&self, request: TurnRequest) -> BeaconResult<TurnStream> {
        if request.message.content.trim().is_empty() {
            return Err(BeaconError::Validation(
                "message content is required".to_string(),
            ));
        }

        let chat = self.resolve_chat(&request.chat_model)?;
        let embedder = self.resolve_embedding(&request.embedding_model)?;

        // User turn becomes durable before any planning or retrieval.
        self.store.ensure_session(
            &request.message.chat_id,
            &request.message.content,
            &request.focus_mode,
            &request.files,
        )?;
        self.store.append_or_fork_message(
            &request.message.chat_id,
            &request.message.message_id,
            Role::User,
            &request.message.content,
        )?;

        let assistant_message_id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(FRAME_CHANNEL_DEPTH);
        let encoder = ProtocolEncoder::new(tx.clone(), assistant_message_id.clone()).begin();

        let job = TurnJob {
            chat,
            embedder,
            search: Arc::clone(&self.search),
            store: Arc::clone(&self.store),
            config: self.config.clone(),
            request,
            assistant_message_id: assistant_message_id.clone(),
            settle: tx,
        };
        tokio::spawn(job.run(encoder));

        Ok(TurnStream {
            assistant_message_id,
            frames: ReceiverStream::new(rx),
        })
    }

    fn resolve_chat(&self, selector: &ModelRef) -> BeaconResult<Arc<dyn ChatModel>> {
        self.registry.resolve_chat(selector).map_err(|e| match e {
            ProviderError::NotFound { provider, name } => {
                BeaconError::Configuration(format!("chat model not available: {provider}/{name}"))
            }
            other => other.into(),
        })
    }

    fn resolve_embedding(&self, selector: &ModelRef) -> BeaconResult<Arc<dyn EmbeddingModel>> {
        self.registry
            .resolve_embedding(selector)
            .map_err(|e| match e {
                ProviderError::NotFound { provider, name } => BeaconError::Configuration(format!(
                    "embedding model not available: {provider}/{name}"
                )),
                other => other.into(),
            })
    }
}

/// Everything a spawned turn owns.
struct TurnJob {
    chat: Arc<dyn ChatModel>,
    embedder: Arc<dyn EmbeddingModel>,
    search: Arc<dyn SearchEngine>,
    store: Arc<dyn SessionStore>,
    config: BeaconConfig,
    request: TurnRequest,
    assistant_message_id: String,
    /// Extra frame-channel sender, held past the terminal frame so the
    /// stream only ends once the assistant record is durable.
    settle: mpsc::Sender<StreamFrame>,
}

impl TurnJob {
    async fn run(self, encoder: StreamingEncoder) {
        let deadline_secs = self.config.turn.deadline_secs;
        let cancel = CancellationToken::new();
        let watchdog = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(deadline_secs)).await;
                cancel.cancel();
            })
        };

        let outcome = self.pipeline(&encoder, &cancel).await;

        // Terminal frame first, then the durable assistant record.
        match &outcome.error {
            None => encoder.complete().await,
            Some(e) => {
                warn!(error = %e, "turn terminated with error frame");
                encoder.error(&e.frame_message()).await;
            }
        }

        if let Err(e) = self.store.finalize_assistant_message(
            &self.request.message.chat_id,
            &self.assistant_message_id,
            &outcome.content,
            &outcome.sources,
            &outcome.suggestions,
        ) {
            error!(error = %e, "failed to persist assistant message");
        }
        // Last sender drops here: consumers see end-of-stream only now.
        drop(self.settle);

        watchdog.abort();
        info!(
            chat_id = %self.request.message.chat_id,
            content_len = outcome.content.len(),
            sources = outcome.sources.len(),
            errored = outcome.error.is_some(),
            "turn finished"
        );
    }

    async fn pipeline(
        &self,
        encoder: &StreamingEncoder,
        cancel: &CancellationToken,
    ) -> GenerationOutcome {
        let deadline_secs = self.config.turn.deadline_secs;
        let question = self.request.message.content.clone();
        let focus = self.config.focus_mode(&self.request.focus_mode);

        let Some(queries) = with_cancel(
            cancel,
            planner::plan(
                self.chat.as_ref(),
                &self.request.history,
                &question,
                &focus.retriever_prompt,
                &self.request.files,
            ),
        )
        .await
        else {
            return deadline_outcome(deadline_secs);
        };

        let documents = if queries.is_empty() {
            debug!("planner requested no retrieval");
            Vec::new()
        } else {
            let client = RetrievalClient::new(
                Arc::clone(&self.search),
                Duration::from_secs(self.config.search.timeout_secs),
            );
            match with_cancel(cancel, client.retrieve(&queries, &focus.engines)).await {
                Some(documents) => documents,
                None => return deadline_outcome(deadline_secs),
            }
        };

        let ranked = match with_cancel(
            cancel,
            ranking::rank(
                self.embedder.as_ref(),
                &question,
                documents,
                self.config.ranking.threshold,
                self.request.optimization_mode,
            ),
        )
        .await
        {
            Some(mut ranked) => {
                ranked.truncate(self.config.turn.max_sources);
                ranked
            }
            None => return deadline_outcome(deadline_secs),
        };

        generator::generate(
            self.chat.as_ref(),
            &self.request.history,
            &question,
            &ranked,
            &self.request.system_instructions,
            &focus.response_prompt,
            self.request.optimization_mode,
            encoder,
            cancel,
            deadline_secs,
        )
        .await
    }
}

/// Run a stage under the turn's cancellation signal. `None` means the
/// deadline fired; the stage's in-flight external call is dropped.
async fn with_cancel<T>(cancel: &CancellationToken, fut: impl Future<Output = T>) -> Option<T> {
    tokio::select! {
        _ = cancel.cancelled() => None,
        value = fut => Some(value),
    }
}

fn deadline_outcome(deadline_secs: u64) -> GenerationOutcome {
    GenerationOutcome {
        error: Some(BeaconError::DeadlineExceeded(deadline_secs)),
        ..Default::default()
    }
}
