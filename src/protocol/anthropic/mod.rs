pub mod encoder;
pub mod response_decoder;
pub mod stream;

use serde::{Deserialize, Serialize};

/// Anthropic Messages API request wire type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicRequest {
    pub model: String,
    pub max_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<AnthropicTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
}

/// Anthropic message wire type. `content` is always sent as a block array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicMessage {
    pub role: String,
    pub content: Vec<serde_json::Value>,
}

/// Anthropic tool definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicTool {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: serde_json::Value,
}

/// Anthropic Messages API response wire type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicResponse {
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub content: Vec<AnthropicContentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: AnthropicUsage,
}

/// A content block, either inside a whole response or announced by
/// `content_block_start`.
///
/// Tool identity fields stay optional: a block missing them is skipped by the
/// translators rather than failing the whole payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnthropicContentBlock {
    #[serde(rename = "text")]
    Text {
        #[serde(default)]
        text: String,
    },
    #[serde(rename = "tool_use")]
    ToolUse {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        input: Option<serde_json::Value>,
    },
    #[serde(other)]
    Other,
}

/// Token counters. Every field is optional on the wire; absent means zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnthropicUsage {
    #[serde(default, deserialize_with = "zero_if_null")]
    pub input_tokens: u64,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub output_tokens: u64,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub cache_creation_input_tokens: u64,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub cache_read_input_tokens: u64,
}

fn zero_if_null<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.unwrap_or(0))
}

/// Anthropic SSE stream event, one per `data:` record.
///
/// Any frame kind may carry top-level `usage` and `stop_reason` fields next to
/// its own payload; they are kept on every variant so none is lost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnthropicStreamEvent {
    #[serde(rename = "message_start")]
    MessageStart {
        message: AnthropicMessageStart,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<AnthropicUsage>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stop_reason: Option<String>,
    },
    #[serde(rename = "content_block_start")]
    ContentBlockStart {
        index: usize,
        content_block: AnthropicContentBlock,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<AnthropicUsage>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stop_reason: Option<String>,
    },
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta {
        index: usize,
        delta: AnthropicDelta,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<AnthropicUsage>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stop_reason: Option<String>,
    },
    #[serde(rename = "content_block_stop")]
    ContentBlockStop {
        #[serde(default)]
        index: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<AnthropicUsage>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stop_reason: Option<String>,
    },
    #[serde(rename = "message_delta")]
    MessageDelta {
        #[serde(default)]
        delta: AnthropicMessageDeltaBody,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<AnthropicUsage>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stop_reason: Option<String>,
    },
    #[serde(rename = "message_stop")]
    MessageStop {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<AnthropicUsage>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stop_reason: Option<String>,
    },
    #[serde(rename = "ping")]
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<AnthropicUsage>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stop_reason: Option<String>,
    },
    #[serde(other)]
    Other,
}

impl AnthropicStreamEvent {
    fn top_level(&self) -> (Option<&AnthropicUsage>, Option<&str>) {
        match self {
            Self::MessageStart {
                usage, stop_reason, ..
            }
            | Self::ContentBlockStart {
                usage, stop_reason, ..
            }
            | Self::ContentBlockDelta {
                usage, stop_reason, ..
            }
            | Self::ContentBlockStop {
                usage, stop_reason, ..
            }
            | Self::MessageDelta {
                usage, stop_reason, ..
            }
            | Self::MessageStop { usage, stop_reason }
            | Self::Ping { usage, stop_reason } => (usage.as_ref(), stop_reason.as_deref()),
            Self::Other => (None, None),
        }
    }

    /// Every usage report carried by this frame, whatever its kind.
    ///
    /// `message_start` may report both inside `message` and at the top level;
    /// both are yielded, nested first.
    pub fn usage_reports(&self) -> impl Iterator<Item = &AnthropicUsage> {
        let nested = match self {
            Self::MessageStart { message, .. } => message.usage.as_ref(),
            _ => None,
        };
        nested.into_iter().chain(self.top_level().0)
    }

    /// Stop reason carried by this frame, whatever its kind.
    ///
    /// A reason nested in the frame's payload wins over a top-level one.
    #[must_use]
    pub fn stop_reason(&self) -> Option<&str> {
        let nested = match self {
            Self::MessageStart { message, .. } => message.stop_reason.as_deref(),
            Self::MessageDelta { delta, .. } => delta.stop_reason.as_deref(),
            _ => None,
        };
        nested.or(self.top_level().1)
    }
}

/// Message start payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnthropicMessageStart {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<AnthropicUsage>,
}

/// Delta variants for content block deltas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnthropicDelta {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    #[serde(rename = "input_json_delta")]
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Other,
}

/// Message delta body (`stop_reason` etc).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnthropicMessageDeltaBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequence: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_event_kind_decodes_as_other() {
        let event: AnthropicStreamEvent =
            serde_json::from_str(r#"{"type":"error","error":{"type":"overloaded_error"}}"#)
                .unwrap();
        assert_eq!(event, AnthropicStreamEvent::Other);
    }

    #[test]
    fn test_thinking_block_decodes_as_other() {
        let event: AnthropicStreamEvent = serde_json::from_str(
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"thinking","thinking":""}}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            AnthropicStreamEvent::ContentBlockStart {
                index: 0,
                content_block: AnthropicContentBlock::Other,
                usage: None,
                stop_reason: None,
            }
        );
    }

    #[test]
    fn test_message_delta_usage_and_stop_reason_accessors() {
        let event: AnthropicStreamEvent = serde_json::from_str(
            r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":7}}"#,
        )
        .unwrap();
        assert_eq!(event.stop_reason(), Some("end_turn"));
        let reports: Vec<_> = event.usage_reports().collect();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].output_tokens, 7);
        assert_eq!(reports[0].input_tokens, 0);
    }

    #[test]
    fn test_message_start_without_usage() {
        let event: AnthropicStreamEvent = serde_json::from_str(
            r#"{"type":"message_start","message":{"id":"msg_1","model":"claude-x"}}"#,
        )
        .unwrap();
        assert_eq!(event.usage_reports().count(), 0);
        assert!(event.stop_reason().is_none());
    }

    #[test]
    fn test_null_usage_counters_read_as_zero() {
        let usage: AnthropicUsage = serde_json::from_str(
            r#"{"input_tokens":5,"output_tokens":null,"cache_creation_input_tokens":null}"#,
        )
        .unwrap();
        assert_eq!(usage.input_tokens, 5);
        assert_eq!(usage.output_tokens, 0);
        assert_eq!(usage.cache_creation_input_tokens, 0);
    }

    #[test]
    fn test_usage_on_message_stop_and_block_frames() {
        for raw in [
            r#"{"type":"message_stop","usage":{"input_tokens":5,"output_tokens":3}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"a"},"usage":{"input_tokens":5,"output_tokens":3}}"#,
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""},"usage":{"input_tokens":5,"output_tokens":3}}"#,
            r#"{"type":"content_block_stop","index":0,"usage":{"input_tokens":5,"output_tokens":3}}"#,
            r#"{"type":"ping","usage":{"input_tokens":5,"output_tokens":3}}"#,
        ] {
            let event: AnthropicStreamEvent = serde_json::from_str(raw).unwrap();
            let reports: Vec<_> = event.usage_reports().collect();
            assert_eq!(reports.len(), 1, "usage lost on {raw}");
            assert_eq!(reports[0].input_tokens, 5);
            assert_eq!(reports[0].output_tokens, 3);
        }
    }

    #[test]
    fn test_message_start_yields_nested_and_top_level_usage() {
        let event: AnthropicStreamEvent = serde_json::from_str(
            r#"{"type":"message_start","message":{"id":"msg_1","usage":{"input_tokens":10}},"usage":{"output_tokens":2}}"#,
        )
        .unwrap();
        let reports: Vec<_> = event.usage_reports().collect();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].input_tokens, 10);
        assert_eq!(reports[1].output_tokens, 2);
    }

    #[test]
    fn test_top_level_stop_reason_on_any_frame() {
        let event: AnthropicStreamEvent =
            serde_json::from_str(r#"{"type":"message_stop","stop_reason":"max_tokens"}"#).unwrap();
        assert_eq!(event.stop_reason(), Some("max_tokens"));

        let event: AnthropicStreamEvent = serde_json::from_str(
            r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"stop_reason":"refusal"}"#,
        )
        .unwrap();
        assert_eq!(event.stop_reason(), Some("end_turn"));
    }

    #[test]
    fn test_bare_message_stop_decodes() {
        let event: AnthropicStreamEvent = serde_json::from_str(r#"{"type":"message_stop"}"#).unwrap();
        assert_eq!(
            event,
            AnthropicStreamEvent::MessageStop {
                usage: None,
                stop_reason: None,
            }
        );
    }
}
