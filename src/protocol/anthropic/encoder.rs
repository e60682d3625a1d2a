use serde_json::{json, Value};

use crate::config::UpstreamConfig;
use crate::error::BridgeError;
use crate::protocol::anthropic::{AnthropicMessage, AnthropicRequest, AnthropicTool};
use crate::protocol::mapping::openai_role_to_anthropic;
use crate::protocol::openai_chat::{OpenAiChatRequest, OpenAiMessage, OpenAiTool, OpenAiToolChoice};

/// Encode an `OpenAI` chat request into the Anthropic Messages API wire format.
///
/// # Errors
///
/// Returns [`BridgeError::InvalidRequest`] when the conversation has no
/// non-system message, a tool message lacks `tool_call_id`, or `tool_choice`
/// names an unknown mode.
pub fn encode_anthropic_request(
    request: &OpenAiChatRequest,
    upstream: &UpstreamConfig,
) -> Result<AnthropicRequest, BridgeError> {
    // --- system ---
    let mut system_parts: Vec<String> = Vec::new();
    let mut messages: Vec<AnthropicMessage> = Vec::with_capacity(request.messages.len());

    for msg in &request.messages {
        let Some(role) = openai_role_to_anthropic(&msg.role) else {
            let text = joined_text(msg.content.as_ref());
            if !text.is_empty() {
                system_parts.push(text);
            }
            continue;
        };

        let blocks = encode_blocks(msg)?;
        if blocks.is_empty() {
            tracing::debug!(role = %msg.role, "dropping message without content");
            continue;
        }
        push_merged(&mut messages, role, blocks);
    }

    if messages.is_empty() {
        return Err(BridgeError::InvalidRequest(
            "messages must contain at least one non-system message".to_string(),
        ));
    }
    for message in &mut messages {
        if message.role == "user" {
            hoist_tool_results(&mut message.content);
        }
    }

    // --- tools ---
    let tools = request
        .tools
        .as_deref()
        .filter(|tools| !tools.is_empty())
        .map(|tools| tools.iter().map(encode_tool).collect::<Vec<_>>());
    let tool_choice = match (&tools, &request.tool_choice) {
        (Some(_), Some(choice)) => Some(encode_tool_choice(choice)?),
        _ => None,
    };

    // --- generation params ---
    let max_tokens = request
        .max_completion_tokens
        .or(request.max_tokens)
        .unwrap_or(upstream.default_max_tokens);
    let stop_sequences = request
        .stop
        .clone()
        .map(|stop| stop.into_vec())
        .filter(|stops| !stops.is_empty());

    Ok(AnthropicRequest {
        model: upstream.upstream_model(&request.model).to_string(),
        max_tokens,
        system: (!system_parts.is_empty()).then(|| system_parts.join("\n\n")),
        messages,
        tools,
        tool_choice,
        stream: request.is_stream().then_some(true),
        temperature: request.temperature,
        top_p: request.top_p,
        stop_sequences,
    })
}

fn encode_blocks(msg: &OpenAiMessage) -> Result<Vec<Value>, BridgeError> {
    match msg.role.as_str() {
        "assistant" => {
            let mut blocks = text_blocks(msg.content.as_ref());
            for call in msg.tool_calls.iter().flatten() {
                blocks.push(json!({
                    "type": "tool_use",
                    "id": call.id,
                    "name": call.function.name,
                    "input": parse_tool_input(&call.function.arguments),
                }));
            }
            Ok(blocks)
        }
        "tool" => {
            let tool_use_id = msg.tool_call_id.as_deref().ok_or_else(|| {
                BridgeError::InvalidRequest("tool message is missing tool_call_id".to_string())
            })?;
            Ok(vec![json!({
                "type": "tool_result",
                "tool_use_id": tool_use_id,
                "content": joined_text(msg.content.as_ref()),
            })])
        }
        _ => Ok(text_blocks(msg.content.as_ref())),
    }
}

/// Tool arguments arrive as a JSON string; anything that is not a JSON
/// object becomes `{}`.
fn parse_tool_input(arguments: &str) -> Value {
    match serde_json::from_str::<Value>(arguments) {
        Ok(value @ Value::Object(_)) => value,
        _ => json!({}),
    }
}

fn push_merged(messages: &mut Vec<AnthropicMessage>, role: &str, blocks: Vec<Value>) {
    if let Some(last) = messages.last_mut() {
        if last.role == role {
            last.content.extend(blocks);
            return;
        }
    }
    messages.push(AnthropicMessage {
        role: role.to_string(),
        content: blocks,
    });
}

/// `tool_result` blocks must lead a user message.
fn hoist_tool_results(blocks: &mut [Value]) {
    // Stable: relative order inside each group is kept.
    blocks.sort_by_key(|block| block.get("type").and_then(Value::as_str) != Some("tool_result"));
}

fn text_blocks(content: Option<&Value>) -> Vec<Value> {
    let mut blocks = Vec::new();
    for_each_text(content, |text| {
        if !text.is_empty() {
            blocks.push(json!({"type": "text", "text": text}));
        }
    });
    blocks
}

fn joined_text(content: Option<&Value>) -> String {
    let mut out = String::new();
    for_each_text(content, |text| {
        if text.is_empty() {
            return;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(text);
    });
    out
}

/// Visit the text of a string content or of each `text` part in an array.
fn for_each_text<'a>(content: Option<&'a Value>, mut visit: impl FnMut(&'a str)) {
    match content {
        Some(Value::String(text)) => visit(text),
        Some(Value::Array(parts)) => {
            for part in parts {
                if part.get("type").and_then(Value::as_str) != Some("text") {
                    tracing::debug!("dropping non-text content part");
                    continue;
                }
                if let Some(text) = part.get("text").and_then(Value::as_str) {
                    visit(text);
                }
            }
        }
        _ => {}
    }
}

fn encode_tool(tool: &OpenAiTool) -> AnthropicTool {
    AnthropicTool {
        name: tool.function.name.clone(),
        description: tool.function.description.clone(),
        input_schema: tool
            .function
            .parameters
            .clone()
            .unwrap_or_else(|| json!({"type": "object", "properties": {}})),
    }
}

fn encode_tool_choice(choice: &OpenAiToolChoice) -> Result<Value, BridgeError> {
    match choice {
        OpenAiToolChoice::Mode(mode) => match mode.as_str() {
            "auto" => Ok(json!({"type": "auto"})),
            "none" => Ok(json!({"type": "none"})),
            "required" => Ok(json!({"type": "any"})),
            other => Err(BridgeError::InvalidRequest(format!(
                "unsupported tool_choice '{other}'"
            ))),
        },
        OpenAiToolChoice::Function(call) => {
            Ok(json!({"type": "tool", "name": call.function.name}))
        }
    }
}
