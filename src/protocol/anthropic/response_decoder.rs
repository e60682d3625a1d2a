use crate::protocol::anthropic::{AnthropicContentBlock, AnthropicResponse};
use crate::protocol::mapping::{anthropic_id_to_openai, anthropic_stop_to_openai_opt};
use crate::protocol::openai_chat::{
    OpenAiAssistantMessage, OpenAiChatResponse, OpenAiChoice, OpenAiToolCall,
    OpenAiToolCallFunction, OpenAiUsage, CHAT_COMPLETION_OBJECT,
};

/// Translate a whole Anthropic Messages response into an `OpenAI` chat
/// completion.
///
/// Text blocks are concatenated in order; `tool_use` blocks become tool calls
/// in order, skipping any block that lacks an id or a name. With no text block
/// at all the message content is `null`, not `""`.
#[must_use]
pub fn decode_anthropic_response(response: &AnthropicResponse, created: u64) -> OpenAiChatResponse {
    let mut content: Option<String> = None;
    let mut tool_calls = Vec::new();

    for block in &response.content {
        match block {
            AnthropicContentBlock::Text { text } => {
                content.get_or_insert_with(String::new).push_str(text);
            }
            AnthropicContentBlock::ToolUse { id, name, input } => {
                let (Some(id), Some(name)) = (id, name) else {
                    tracing::debug!("tool_use block without id or name, skipping");
                    continue;
                };
                let arguments = input
                    .as_ref()
                    .map_or_else(|| "{}".to_owned(), serde_json::Value::to_string);
                tool_calls.push(OpenAiToolCall {
                    id: id.clone(),
                    type_: "function".to_owned(),
                    function: OpenAiToolCallFunction {
                        name: name.clone(),
                        arguments,
                    },
                });
            }
            AnthropicContentBlock::Other => {}
        }
    }

    let usage = &response.usage;
    OpenAiChatResponse {
        id: anthropic_id_to_openai(&response.id),
        object: CHAT_COMPLETION_OBJECT.to_owned(),
        created,
        model: response.model.clone(),
        choices: vec![OpenAiChoice {
            index: 0,
            message: OpenAiAssistantMessage {
                role: "assistant".to_owned(),
                content,
                tool_calls,
            },
            finish_reason: anthropic_stop_to_openai_opt(response.stop_reason.as_deref()),
        }],
        usage: OpenAiUsage {
            prompt_tokens: usage.input_tokens,
            completion_tokens: usage.output_tokens,
            total_tokens: usage.input_tokens.saturating_add(usage.output_tokens),
        },
    }
}
