use msgbridge::protocol::openai_chat::OpenAiStreamChunk;
use msgbridge::stream::{OutgoingEvent, StreamTranslator};

fn frame(json: &str) -> String {
    format!("event: x\ndata: {json}\n\n")
}

fn chunks(events: &[OutgoingEvent]) -> Vec<&OpenAiStreamChunk> {
    events
        .iter()
        .filter_map(|event| match event {
            OutgoingEvent::Chunk(chunk) => Some(chunk),
            OutgoingEvent::Terminal => None,
        })
        .collect()
}

fn arguments_for(events: &[OutgoingEvent], index: u32) -> String {
    chunks(events)
        .iter()
        .flat_map(|chunk| chunk.choices.iter())
        .flat_map(|choice| choice.delta.tool_calls.iter().flatten())
        .filter(|call| call.index == index)
        .filter_map(|call| call.function.arguments.as_deref())
        .collect()
}

fn tool_start(index: usize, id: &str) -> String {
    frame(&format!(
        "{{\"type\":\"content_block_start\",\"index\":{index},\"content_block\":{{\"type\":\"tool_use\",\"id\":\"{id}\",\"name\":\"f\",\"input\":{{}}}}}}"
    ))
}

fn args_delta(index: usize, partial: &str) -> String {
    let partial = serde_json::to_string(partial).unwrap();
    frame(&format!(
        "{{\"type\":\"content_block_delta\",\"index\":{index},\"delta\":{{\"type\":\"input_json_delta\",\"partial_json\":{partial}}}}}"
    ))
}

#[test]
fn fragments_and_snapshots_yield_the_same_arguments() {
    let document = r#"{"path":"/tmp/a.txt","body":"hello"}"#;
    let pieces = [r#"{"path":"#, r#""/tmp/a.txt","#, r#""body":"hello"}"#];

    let mut fragment_stream = tool_start(0, "t");
    let mut snapshot_stream = tool_start(0, "t");
    let mut snapshot = String::new();
    for piece in pieces {
        snapshot.push_str(piece);
        fragment_stream.push_str(&args_delta(0, piece));
        snapshot_stream.push_str(&args_delta(0, &snapshot));
    }

    let mut a = StreamTranslator::with_created("m".into(), 0);
    let mut b = StreamTranslator::with_created("m".into(), 0);
    let from_fragments = a.process_fragment(&fragment_stream);
    let from_snapshots = b.process_fragment(&snapshot_stream);

    assert_eq!(arguments_for(&from_fragments, 0), document);
    assert_eq!(arguments_for(&from_snapshots, 0), document);
    assert_eq!(a.tool_calls().get(0).unwrap().arguments(), document);
    assert_eq!(b.tool_calls().get(0).unwrap().arguments(), document);
}

#[test]
fn interleaved_tool_blocks_keep_separate_buffers() {
    let mut raw = String::new();
    raw.push_str(&tool_start(1, "a"));
    raw.push_str(&tool_start(2, "b"));
    raw.push_str(&args_delta(1, "{\"x\":"));
    raw.push_str(&args_delta(2, "{\"y\":2}"));
    raw.push_str(&args_delta(1, "{\"x\":1}"));

    let mut translator = StreamTranslator::with_created("m".into(), 0);
    let events = translator.process_fragment(&raw);
    assert_eq!(arguments_for(&events, 1), "{\"x\":1}");
    assert_eq!(arguments_for(&events, 2), "{\"y\":2}");
}

#[test]
fn usage_is_summed_and_terminal_is_last_and_single() {
    let raw = [
        frame(r#"{"type":"message_start","message":{"id":"msg_u","model":"m","usage":{"input_tokens":10,"output_tokens":1,"cache_read_input_tokens":4}}}"#),
        frame(r#"{"type":"message_delta","delta":{},"usage":{"output_tokens":5}}"#),
        frame(r#"{"type":"message_delta","delta":{"stop_reason":"max_tokens"},"usage":{"output_tokens":5}}"#),
        frame(r#"{"type":"message_stop"}"#),
        frame(r#"{"type":"message_stop"}"#),
        frame(r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"late"}}"#),
    ]
    .concat();

    let mut translator = StreamTranslator::with_created("m".into(), 0);
    let events = translator.process_fragment(&raw);

    let terminals = events
        .iter()
        .filter(|event| matches!(event, OutgoingEvent::Terminal))
        .count();
    assert_eq!(terminals, 1);
    assert!(matches!(events.last(), Some(OutgoingEvent::Terminal)));

    let metrics = translator.metrics();
    assert_eq!(metrics.input_tokens, 10);
    assert_eq!(metrics.output_tokens, 11);
    assert_eq!(metrics.cache_read_input_tokens, 4);

    let all = chunks(&events);
    let finish: Vec<&str> = all
        .iter()
        .flat_map(|chunk| chunk.choices.iter())
        .filter_map(|choice| choice.finish_reason.as_deref())
        .collect();
    assert_eq!(finish, vec!["max_tokens"]);

    let usage = all.last().unwrap().usage.unwrap();
    assert_eq!(usage.prompt_tokens, 10);
    assert_eq!(usage.completion_tokens, 11);
    assert_eq!(usage.total_tokens, 21);
    assert!(all.iter().all(|chunk| chunk.id == "chatcmpl-u"));
}

#[test]
fn usage_chunk_can_be_disabled() {
    let raw = [
        frame(r#"{"type":"message_start","message":{"id":"msg_u","model":"m","usage":{"input_tokens":3,"output_tokens":1}}}"#),
        frame(r#"{"type":"message_stop"}"#),
    ]
    .concat();
    let mut translator = StreamTranslator::with_created("m".into(), 0).with_usage(false);
    let events = translator.process_fragment(&raw);
    assert!(chunks(&events).iter().all(|chunk| chunk.usage.is_none()));
    assert!(matches!(events.last(), Some(OutgoingEvent::Terminal)));
}

#[test]
fn noise_never_produces_output() {
    let raw = concat!(
        ": keep-alive\n",
        "event: ping\n",
        "data: [DONE]\n",
        "data: {not json}\n",
        "data: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\n",
        "data: {\"type\":\"content_block_delta\",\"index\":7,\"delta\":{\"type\":\"input_json_delta\",\"partial_json\":\"{}\"}}\n",
        "id: 42\n",
        "\n",
    );
    let mut translator = StreamTranslator::with_created("m".into(), 0);
    assert!(translator.process_fragment(raw).is_empty());
    assert!(!translator.is_terminated());
    assert!(translator.metrics().client_facing_id.starts_with("chatcmpl-"));
}

#[test]
fn usage_on_stop_and_delta_frames_reaches_the_usage_chunk() {
    let raw = [
        frame(r#"{"type":"message_start","message":{"id":"msg_u2","model":"claude-x"}}"#),
        frame(r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"hi"},"usage":{"output_tokens":4}}"#),
        frame(r#"{"type":"message_stop","usage":{"input_tokens":5,"output_tokens":3}}"#),
    ]
    .concat();
    let mut translator = StreamTranslator::with_created("m".into(), 0);
    let out = translator.process_fragment(&raw);

    assert_eq!(out.last(), Some(&OutgoingEvent::Terminal));
    let OutgoingEvent::Chunk(usage_chunk) = &out[out.len() - 2] else {
        panic!("usage chunk must precede the terminal");
    };
    assert!(usage_chunk.choices.is_empty());
    let usage = usage_chunk.usage.expect("usage counted");
    assert_eq!(usage.prompt_tokens, 5);
    assert_eq!(usage.completion_tokens, 7);
    assert_eq!(usage.total_tokens, 12);
}

#[test]
fn far_apart_tool_indices_are_tracked() {
    let raw = [
        tool_start(1, "near"),
        tool_start(5000, "far"),
        args_delta(5000, r#"{"q":"x"}"#),
        args_delta(1, "{}"),
    ]
    .concat();
    let mut translator = StreamTranslator::with_created("m".into(), 0);
    let out = translator.process_fragment(&raw);
    assert_eq!(arguments_for(&out, 5000), r#"{"q":"x"}"#);
    assert_eq!(arguments_for(&out, 1), "{}");
    assert_eq!(translator.tool_calls().len(), 2);
}
