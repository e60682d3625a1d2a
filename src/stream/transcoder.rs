use memchr::memchr_iter;

use crate::protocol::anthropic::stream::decode_frame_line;
use crate::protocol::anthropic::{AnthropicContentBlock, AnthropicDelta, AnthropicStreamEvent};
use crate::protocol::mapping::anthropic_stop_to_openai;
use crate::protocol::openai_chat::{
    OpenAiDelta, OpenAiStreamChunk, OpenAiStreamToolCall, OpenAiStreamToolCallFunction,
};
use crate::stream::delta::{ToolCallAccumulator, ToolCallTable};
use crate::stream::metrics::ExchangeMetrics;
use crate::util::unix_now_secs;

/// One unit of translator output, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum OutgoingEvent {
    Chunk(OpenAiStreamChunk),
    /// End of the exchange; the boundary writes the protocol's `[DONE]` record.
    Terminal,
}

/// Converts an Anthropic Messages event stream into `OpenAI` chat-completion
/// chunks, one exchange per instance.
///
/// The translator owns all per-exchange state (tool-call accumulators and
/// metrics), never blocks, and never fails: frames it cannot use are dropped.
/// Once the terminal signal has been produced every further frame is ignored.
pub struct StreamTranslator {
    tools: ToolCallTable,
    metrics: ExchangeMetrics,
    emit_usage: bool,
    terminated: bool,
}

impl StreamTranslator {
    /// Start translating an exchange requested for `model`.
    #[must_use]
    pub fn new(model: String) -> Self {
        Self::with_created(model, unix_now_secs())
    }

    /// Same as [`StreamTranslator::new`] with a caller-chosen `created` stamp.
    #[must_use]
    pub fn with_created(model: String, created: u64) -> Self {
        Self {
            tools: ToolCallTable::new(),
            metrics: ExchangeMetrics::new(model, created),
            emit_usage: true,
            terminated: false,
        }
    }

    /// Toggle the trailing usage chunk (on by default).
    #[must_use]
    pub fn with_usage(mut self, emit_usage: bool) -> Self {
        self.emit_usage = emit_usage;
        self
    }

    #[must_use]
    pub fn metrics(&self) -> &ExchangeMetrics {
        &self.metrics
    }

    #[must_use]
    pub fn tool_calls(&self) -> &ToolCallTable {
        &self.tools
    }

    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Translate a slice of raw upstream text.
    ///
    /// `raw` holds zero or more newline-terminated records; each line gets
    /// exactly one decode attempt. A trailing line without a newline is decoded
    /// too.
    pub fn process_fragment(&mut self, raw: &str) -> Vec<OutgoingEvent> {
        let mut out = Vec::new();
        self.process_fragment_into(raw, &mut out);
        out
    }

    /// Same as [`StreamTranslator::process_fragment`] but appends into a
    /// caller-provided buffer.
    pub fn process_fragment_into(&mut self, raw: &str, out: &mut Vec<OutgoingEvent>) {
        let mut line_start = 0usize;
        for line_end in memchr_iter(b'\n', raw.as_bytes()) {
            self.process_line_into(&raw[line_start..line_end], out);
            line_start = line_end + 1;
        }
        if line_start < raw.len() {
            self.process_line_into(&raw[line_start..], out);
        }
    }

    fn process_line_into(&mut self, line: &str, out: &mut Vec<OutgoingEvent>) {
        match decode_frame_line(line) {
            Some(event) => self.process_event_into(&event, out),
            None => tracing::trace!(line_len = line.len(), "dropping non-frame stream line"),
        }
    }

    /// Translate one decoded frame.
    pub fn process_event_into(&mut self, event: &AnthropicStreamEvent, out: &mut Vec<OutgoingEvent>) {
        if self.terminated {
            return;
        }
        self.metrics.absorb(event);

        match event {
            AnthropicStreamEvent::Ping { .. }
            | AnthropicStreamEvent::ContentBlockStop { .. }
            | AnthropicStreamEvent::Other => {}
            AnthropicStreamEvent::MessageStart { .. } => {
                out.push(OutgoingEvent::Chunk(self.metrics.chunk(
                    OpenAiDelta {
                        role: Some("assistant".to_owned()),
                        content: Some(String::new()),
                        tool_calls: None,
                    },
                    None,
                )));
            }
            AnthropicStreamEvent::ContentBlockStart {
                index,
                content_block,
                ..
            } => self.start_block(*index, content_block, out),
            AnthropicStreamEvent::ContentBlockDelta { index, delta, .. } => {
                self.apply_delta(*index, delta, out);
            }
            AnthropicStreamEvent::MessageDelta { .. } => {
                if let Some(reason) = event.stop_reason() {
                    out.push(OutgoingEvent::Chunk(self.metrics.chunk(
                        OpenAiDelta::default(),
                        Some(anthropic_stop_to_openai(reason)),
                    )));
                }
            }
            AnthropicStreamEvent::MessageStop { .. } => {
                if self.emit_usage {
                    if let Some(chunk) = self.metrics.to_usage_chunk() {
                        out.push(OutgoingEvent::Chunk(chunk));
                    }
                }
                out.push(OutgoingEvent::Terminal);
                self.terminated = true;
            }
        }
    }

    fn start_block(
        &mut self,
        index: usize,
        content_block: &AnthropicContentBlock,
        out: &mut Vec<OutgoingEvent>,
    ) {
        // Text needs no announcement: the first content delta implies it.
        let AnthropicContentBlock::ToolUse { id, name, .. } = content_block else {
            return;
        };
        let Ok(tool_index) = u32::try_from(index) else {
            tracing::debug!(index, "tool_use block index exceeds the client range, skipping");
            return;
        };
        if id.is_none() || name.is_none() {
            tracing::debug!(index, "tool_use block without id or name");
        }
        let id = id.clone().unwrap_or_default();
        let name = name.clone().unwrap_or_default();
        self.tools.start(index, ToolCallAccumulator::new(id.clone(), name.clone()));
        out.push(OutgoingEvent::Chunk(self.metrics.chunk(
            OpenAiDelta {
                tool_calls: Some(vec![OpenAiStreamToolCall {
                    index: tool_index,
                    id: Some(id),
                    type_: Some("function".to_owned()),
                    function: OpenAiStreamToolCallFunction {
                        name: Some(name),
                        arguments: Some(String::new()),
                    },
                }]),
                ..OpenAiDelta::default()
            },
            None,
        )));
    }

    fn apply_delta(&mut self, index: usize, delta: &AnthropicDelta, out: &mut Vec<OutgoingEvent>) {
        match delta {
            AnthropicDelta::TextDelta { text } => {
                out.push(OutgoingEvent::Chunk(self.metrics.chunk(
                    OpenAiDelta {
                        content: Some(text.clone()),
                        ..OpenAiDelta::default()
                    },
                    None,
                )));
            }
            AnthropicDelta::InputJsonDelta { partial_json } => {
                let Some(accumulator) = self.tools.get_mut(index) else {
                    tracing::debug!(index, "argument delta for unknown block, skipping");
                    return;
                };
                let suffix = accumulator.resolve(partial_json);
                let Ok(tool_index) = u32::try_from(index) else {
                    return;
                };
                out.push(OutgoingEvent::Chunk(self.metrics.chunk(
                    OpenAiDelta {
                        tool_calls: Some(vec![OpenAiStreamToolCall {
                            index: tool_index,
                            id: None,
                            type_: None,
                            function: OpenAiStreamToolCallFunction {
                                name: None,
                                arguments: Some(suffix),
                            },
                        }]),
                        ..OpenAiDelta::default()
                    },
                    None,
                )));
            }
            AnthropicDelta::Other => {}
        }
    }
}
