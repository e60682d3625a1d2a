use criterion::{black_box, criterion_group, criterion_main, Criterion};
use msgbridge::config::parse_config;
use msgbridge::protocol::anthropic::encoder::encode_anthropic_request;
use msgbridge::protocol::anthropic::response_decoder::decode_anthropic_response;
use msgbridge::protocol::anthropic::AnthropicResponse;
use msgbridge::protocol::openai_chat::OpenAiChatRequest;
use msgbridge::stream::{encode_outgoing_sse, StreamTranslator};

fn text_stream(deltas: usize) -> String {
    let mut out = String::from(
        "event: message_start\ndata: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_bench\",\"model\":\"claude-sonnet-4-5\",\"usage\":{\"input_tokens\":100,\"output_tokens\":1}}}\n\n\
         event: content_block_start\ndata: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
    );
    for i in 0..deltas {
        out.push_str(&format!(
            "event: content_block_delta\ndata: {{\"type\":\"content_block_delta\",\"index\":0,\"delta\":{{\"type\":\"text_delta\",\"text\":\"token {i} \"}}}}\n\n"
        ));
    }
    out.push_str(
        "event: message_delta\ndata: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":200}}\n\n\
         event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n",
    );
    out
}

/// Tool arguments streamed either as independent fragments or as growing
/// snapshots of the whole document.
fn tool_stream(parts: usize, snapshots: bool) -> String {
    let mut out = String::from(
        "data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_tool\",\"model\":\"claude-sonnet-4-5\"}}\n\
         data: {\"type\":\"content_block_start\",\"index\":1,\"content_block\":{\"type\":\"tool_use\",\"id\":\"toolu_1\",\"name\":\"write_file\",\"input\":{}}}\n",
    );
    let mut document = String::new();
    for i in 0..parts {
        let piece = format!("line {i} of the file body; ");
        document.push_str(&piece);
        let payload = if snapshots { &document } else { &piece };
        let escaped = serde_json::to_string(payload).unwrap_or_default();
        let escaped = escaped.trim_matches('"');
        out.push_str(&format!(
            "data: {{\"type\":\"content_block_delta\",\"index\":1,\"delta\":{{\"type\":\"input_json_delta\",\"partial_json\":\"{escaped}\"}}}}\n"
        ));
    }
    out.push_str("data: {\"type\":\"message_stop\"}\n");
    out
}

fn bench_stream_translate(c: &mut Criterion) {
    let text = text_stream(200);
    let fragments = tool_stream(200, false);
    let snapshots = tool_stream(200, true);

    for (name, raw) in [
        ("stream_text_200", &text),
        ("stream_tool_fragments_200", &fragments),
        ("stream_tool_snapshots_200", &snapshots),
    ] {
        c.bench_function(name, |b| {
            b.iter(|| {
                let mut translator = StreamTranslator::with_created("m".to_string(), 0);
                let mut bytes = 0usize;
                for event in translator.process_fragment(black_box(raw)) {
                    if let Some(frame) = encode_outgoing_sse(&event) {
                        bytes += frame.len();
                    }
                }
                black_box(bytes);
            });
        });
    }
}

fn bench_snapshot_and_request(c: &mut Criterion) {
    let upstream = parse_config(
        "upstream:\n  base_url: https://api.anthropic.com\n  api_key: k\n\
         client_authentication:\n  allowed_keys: [c]\n",
    )
    .map(|config| config.upstream);
    let Ok(upstream) = upstream else {
        return;
    };

    let request: Result<OpenAiChatRequest, _> = serde_json::from_value(serde_json::json!({
        "model": "claude-sonnet-4-5",
        "messages": [
            {"role": "system", "content": "You are a helpful assistant"},
            {"role": "user", "content": "What is the weather in SF?"},
            {"role": "assistant", "content": null, "tool_calls": [
                {"id": "call_1", "type": "function",
                 "function": {"name": "get_weather", "arguments": "{\"city\":\"SF\"}"}}
            ]},
            {"role": "tool", "tool_call_id": "call_1", "content": "foggy"}
        ],
        "tools": [{"type": "function", "function": {
            "name": "get_weather",
            "parameters": {"type": "object", "properties": {"city": {"type": "string"}}}
        }}]
    }));
    let response: Result<AnthropicResponse, _> = serde_json::from_value(serde_json::json!({
        "id": "msg_1",
        "model": "claude-sonnet-4-5",
        "content": [
            {"type": "text", "text": "It is foggy."},
            {"type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {"city": "SF"}}
        ],
        "stop_reason": "tool_use",
        "usage": {"input_tokens": 40, "output_tokens": 12}
    }));
    let (Ok(request), Ok(response)) = (request, response) else {
        return;
    };

    c.bench_function("encode_anthropic_request", |b| {
        b.iter(|| black_box(encode_anthropic_request(black_box(&request), &upstream).is_ok()));
    });
    c.bench_function("decode_anthropic_response", |b| {
        b.iter(|| black_box(decode_anthropic_response(black_box(&response), 0)));
    });
}

criterion_group!(benches, bench_stream_translate, bench_snapshot_and_request);
criterion_main!(benches);
