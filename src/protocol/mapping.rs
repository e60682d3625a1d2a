use uuid::Uuid;

const UPSTREAM_MESSAGE_ID_PREFIX: &str = "msg_";
const CLIENT_COMPLETION_ID_PREFIX: &str = "chatcmpl-";

// ---------------------------------------------------------------------------
// Stop reason mappings
// ---------------------------------------------------------------------------

/// Map an Anthropic stop reason to the `OpenAI` `finish_reason` vocabulary.
///
/// Only `end_turn` and `tool_use` have a fixed translation; every other value
/// (`max_tokens`, `stop_sequence`, `refusal`, ...) is forwarded verbatim.
#[must_use]
pub fn anthropic_stop_to_openai(reason: &str) -> String {
    match reason {
        "end_turn" => "stop".to_owned(),
        "tool_use" => "tool_calls".to_owned(),
        other => other.to_owned(),
    }
}

/// Optional form of [`anthropic_stop_to_openai`]; absent stays absent.
#[must_use]
pub fn anthropic_stop_to_openai_opt(reason: Option<&str>) -> Option<String> {
    reason.map(anthropic_stop_to_openai)
}

// ---------------------------------------------------------------------------
// Identifier mappings
// ---------------------------------------------------------------------------

/// Translate an upstream message id (`msg_...`) into the client id scheme
/// (`chatcmpl-...`).
///
/// Ids without the vendor prefix keep their full body. An empty id yields a
/// freshly generated one.
#[must_use]
pub fn anthropic_id_to_openai(message_id: &str) -> String {
    let body = message_id
        .strip_prefix(UPSTREAM_MESSAGE_ID_PREFIX)
        .unwrap_or(message_id);
    if body.is_empty() {
        return generate_openai_completion_id();
    }
    let mut out = String::with_capacity(CLIENT_COMPLETION_ID_PREFIX.len() + body.len());
    out.push_str(CLIENT_COMPLETION_ID_PREFIX);
    out.push_str(body);
    out
}

/// Generate a client-facing completion id for exchanges whose upstream id is
/// not known yet.
#[must_use]
pub fn generate_openai_completion_id() -> String {
    let mut out = String::with_capacity(CLIENT_COMPLETION_ID_PREFIX.len() + 32);
    out.push_str(CLIENT_COMPLETION_ID_PREFIX);
    out.push_str(Uuid::new_v4().simple().to_string().as_str());
    out
}

// ---------------------------------------------------------------------------
// Role mappings
// ---------------------------------------------------------------------------

/// Map an `OpenAI` message role to the Anthropic conversation role.
///
/// Returns `None` for roles that are lifted into the top-level `system` field.
#[must_use]
pub fn openai_role_to_anthropic(role: &str) -> Option<&'static str> {
    match role {
        "system" | "developer" => None,
        "assistant" => Some("assistant"),
        // tool results are user messages in Anthropic
        _ => Some("user"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
