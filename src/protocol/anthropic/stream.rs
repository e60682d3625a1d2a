use crate::protocol::anthropic::AnthropicStreamEvent;

/// Decode one raw stream line into a frame.
///
/// Anthropic uses named events (`event: message_start\ndata: {...}`), but the
/// name duplicates the JSON `type` tag, so only `data:` lines are decoded.
/// `event:` lines, comments, blank lines and payloads that are not a JSON
/// object with a `type` tag yield `None`.
#[must_use]
pub fn decode_frame_line(line: &str) -> Option<AnthropicStreamEvent> {
    let payload = extract_data_payload(line)?;
    serde_json::from_str(payload).ok()
}

#[inline]
fn extract_data_payload(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(':') {
        return None;
    }
    let payload = trimmed.strip_prefix("data:")?.trim_start();
    if payload.is_empty() || !payload.starts_with('{') {
        return None;
    }
    Some(payload)
}
