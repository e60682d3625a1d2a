use crate::protocol::anthropic::{AnthropicResponse, AnthropicStreamEvent, AnthropicUsage};
use crate::protocol::mapping::{anthropic_id_to_openai, generate_openai_completion_id};
use crate::protocol::openai_chat::{
    OpenAiDelta, OpenAiStreamChoice, OpenAiStreamChunk, OpenAiUsage, CHAT_COMPLETION_CHUNK_OBJECT,
};

/// Token accounting and identity bookkeeping for one streamed exchange.
///
/// Counters only grow: upstream may report usage in several frames and every
/// report is added, duplicates included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeMetrics {
    pub model: String,
    pub stop_reason: Option<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_input_tokens: u64,
    pub cache_read_input_tokens: u64,
    pub upstream_message_id: Option<String>,
    pub client_facing_id: String,
    pub created: u64,
}

impl ExchangeMetrics {
    /// Start an exchange for `model`. The client id is provisional until
    /// `message_start` supplies the upstream one.
    #[must_use]
    pub fn new(model: String, created: u64) -> Self {
        Self {
            model,
            stop_reason: None,
            input_tokens: 0,
            output_tokens: 0,
            cache_creation_input_tokens: 0,
            cache_read_input_tokens: 0,
            upstream_message_id: None,
            client_facing_id: generate_openai_completion_id(),
            created,
        }
    }

    /// Metrics of a whole (non-streamed) response, for the completion log.
    #[must_use]
    pub fn from_response(response: &AnthropicResponse, created: u64) -> Self {
        let mut metrics = Self::new(response.model.clone(), created);
        if !response.id.is_empty() {
            metrics.client_facing_id = anthropic_id_to_openai(&response.id);
            metrics.upstream_message_id = Some(response.id.clone());
        }
        metrics.stop_reason.clone_from(&response.stop_reason);
        metrics.add_usage(&response.usage);
        metrics
    }

    /// Fold one frame into the running state.
    ///
    /// This is the only place counters change. Any frame kind may carry usage
    /// or a stop reason; `message_start` additionally refreshes ids and model.
    pub fn absorb(&mut self, event: &AnthropicStreamEvent) {
        if let AnthropicStreamEvent::MessageStart { message, .. } = event {
            if !message.id.is_empty() {
                self.client_facing_id = anthropic_id_to_openai(&message.id);
                self.upstream_message_id = Some(message.id.clone());
            }
            if !message.model.is_empty() {
                self.model.clone_from(&message.model);
            }
        }
        for usage in event.usage_reports() {
            self.add_usage(usage);
        }
        if let Some(reason) = event.stop_reason() {
            self.stop_reason = Some(reason.to_owned());
        }
    }

    fn add_usage(&mut self, usage: &AnthropicUsage) {
        self.input_tokens = self.input_tokens.saturating_add(usage.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(usage.output_tokens);
        self.cache_creation_input_tokens = self
            .cache_creation_input_tokens
            .saturating_add(usage.cache_creation_input_tokens);
        self.cache_read_input_tokens = self
            .cache_read_input_tokens
            .saturating_add(usage.cache_read_input_tokens);
    }

    #[must_use]
    pub fn has_tokens(&self) -> bool {
        self.input_tokens > 0 || self.output_tokens > 0
    }

    #[must_use]
    pub fn usage(&self) -> OpenAiUsage {
        OpenAiUsage {
            prompt_tokens: self.input_tokens,
            completion_tokens: self.output_tokens,
            total_tokens: self.input_tokens.saturating_add(self.output_tokens),
        }
    }

    /// Usage-only chunk for the end of the stream, or `None` when nothing was
    /// counted (a zero-usage chunk would only mislead clients).
    #[must_use]
    pub fn to_usage_chunk(&self) -> Option<OpenAiStreamChunk> {
        if !self.has_tokens() {
            return None;
        }
        let mut chunk = self.envelope(Vec::new());
        chunk.usage = Some(self.usage());
        Some(chunk)
    }

    /// Single-choice chunk stamped with the exchange's current id and model.
    #[must_use]
    pub fn chunk(&self, delta: OpenAiDelta, finish_reason: Option<String>) -> OpenAiStreamChunk {
        self.envelope(vec![OpenAiStreamChoice {
            index: 0,
            delta,
            finish_reason,
        }])
    }

    fn envelope(&self, choices: Vec<OpenAiStreamChoice>) -> OpenAiStreamChunk {
        OpenAiStreamChunk {
            id: self.client_facing_id.clone(),
            object: CHAT_COMPLETION_CHUNK_OBJECT.to_owned(),
            created: self.created,
            model: self.model.clone(),
            choices,
            usage: None,
        }
    }
}
