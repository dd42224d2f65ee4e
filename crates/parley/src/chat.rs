use indoc::formatdoc;
use std::sync::Arc;

use crate::adapter::ContentAdapter;
use crate::context::RequestContext;
use crate::errors::{ChatError, ChatResult};
use crate::knowledge::{DocumentIndexer, KnowledgeSearch};
use crate::memory::ConversationMemory;
use crate::models::attachment::Attachment;
use crate::models::content::{ContentPart, MultimodalContent};
use crate::providers::base::{CompletionEngine, ResponseStream};
use crate::render_loop::{Outcome, RenderLoop};
use crate::surface::Surface;

/// Knowledge search results handed to the model ahead of the user message
fn knowledge_context(results: &str) -> String {
    formatdoc! {"
        W kontekście zapytania użytkownika mogą się przydać poniższe informacje:
        ```
        {results}
        ```
        Zignoruj powyższe informacje jeśli nie są na temat.
        "}
}

/// Request a completion for a normalized message, grounded in the knowledge base
pub async fn respond(
    engine: &dyn CompletionEngine,
    knowledge: &dyn KnowledgeSearch,
    instruction: &str,
    message: MultimodalContent,
    memory: Arc<dyn ConversationMemory>,
) -> ChatResult<ResponseStream> {
    let results = knowledge.search(&message.as_string()).await?;

    let mut input = MultimodalContent::new();
    if !results.is_empty() {
        input.push(ContentPart::text(knowledge_context(&results)));
    }
    input.extend(message.into_parts());

    engine
        .completion(instruction, input.without_empty_text(), memory)
        .await
}

/// Handles one inbound chat message from adaptation to the final display
pub struct ChatHandler {
    adapter: ContentAdapter,
    engine: Arc<dyn CompletionEngine>,
    knowledge: Arc<dyn KnowledgeSearch>,
}

impl ChatHandler {
    pub fn new(
        engine: Arc<dyn CompletionEngine>,
        indexer: Arc<dyn DocumentIndexer>,
        knowledge: Arc<dyn KnowledgeSearch>,
    ) -> Self {
        Self {
            adapter: ContentAdapter::new(indexer),
            engine,
            knowledge,
        }
    }

    /// Show a response message, then fill it from the engine or replace it
    /// with an error.
    ///
    /// Failures while adapting the message or starting the completion take
    /// the same path as failures mid-stream.
    pub async fn handle(
        &self,
        ctx: &RequestContext,
        free_text: &str,
        attachments: &[Attachment],
        surface: &dyn Surface,
    ) -> Outcome {
        let render_loop = match RenderLoop::start(surface, ctx.cancellation().clone()).await {
            Ok(render_loop) => render_loop,
            Err(e) => {
                tracing::error!(error = %e, "failed to show response message");
                if let Err(shown) = surface.send_error(&e.to_string()).await {
                    tracing::warn!(error = %shown, "failed to show error message");
                }
                return Outcome::Failed(e);
            }
        };

        let prepared = tokio::select! {
            biased;
            _ = ctx.cancellation().cancelled() => Err(ChatError::Cancelled),
            prepared = self.prepare(ctx, free_text, attachments) => prepared,
        };

        match prepared {
            Ok(stream) => render_loop.run(stream).await,
            Err(e) => render_loop.fail(e).await,
        }
    }

    async fn prepare(
        &self,
        ctx: &RequestContext,
        free_text: &str,
        attachments: &[Attachment],
    ) -> ChatResult<ResponseStream> {
        let message = self.adapter.normalize(free_text, attachments).await?;
        respond(
            self.engine.as_ref(),
            self.knowledge.as_ref(),
            ctx.instruction(),
            message,
            ctx.memory(),
        )
        .await
    }
}
