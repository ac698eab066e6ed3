//! End-to-end segmentation scenarios.
//!
//! These tests drive [`StreamingParser`] through complete responses and
//! check the assembled segments, the raw event order and the resulting
//! tool invocations.

use segstream::{
    GrammarName, JsonProfile, ParserConfig, Segment, SegmentError, SegmentEvent, SegmentKind,
    SentinelSpec, StreamingParser, ToolInvocation, TurnId, assemble_segments,
};
use serde_json::json;

/// Feed `chunks` then finalize, returning every event and invocation.
fn run(config: ParserConfig, chunks: &[&str]) -> (Vec<SegmentEvent>, Vec<ToolInvocation>) {
    let mut parser = StreamingParser::new(config).unwrap();
    let mut events = Vec::new();
    for chunk in chunks {
        events.extend(parser.feed(chunk).unwrap());
    }
    events.extend(parser.finalize().unwrap());
    assert_eq!(events.as_slice(), parser.all_events());
    (events, parser.all_invocations().to_vec())
}

fn segments(config: ParserConfig, chunks: &[&str]) -> Vec<Segment> {
    let (events, _) = run(config, chunks);
    assemble_segments(&events)
}

fn summary(segments: &[Segment]) -> Vec<(SegmentKind, String)> {
    segments
        .iter()
        .map(|s| (s.kind, s.content.clone()))
        .collect()
}

fn sentinel_config() -> ParserConfig {
    ParserConfig::new().with_sentinel(
        SentinelSpec::new("§S§", "§E§", SegmentKind::WriteFile).with_metadata("path", "a.txt"),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// XML-style tags
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_tool_tag_split_across_fragments() {
    let (events, invocations) = run(
        ParserConfig::new(),
        &["<tool name=", "\"search\">query</tool>"],
    );

    assert_eq!(events.len(), 3);
    assert!(matches!(
        &events[0],
        SegmentEvent::Start { kind: SegmentKind::ToolCall, metadata, .. }
            if metadata["tool_name"] == "search"
    ));
    assert_eq!(events[1].delta(), Some("query"));
    assert!(matches!(
        &events[2],
        SegmentEvent::End { kind: SegmentKind::ToolCall, .. }
    ));

    let (whole, _) = run(ParserConfig::new(), &["<tool name=\"search\">query</tool>"]);
    assert_eq!(assemble_segments(&events), assemble_segments(&whole));

    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].name, "search");
    assert_eq!(invocations[0].arguments, json!({"input": "query"}));
}

#[test]
fn test_tool_tag_with_arguments_and_id() {
    let (_, invocations) = run(
        ParserConfig::new(),
        &[
            "Searching now.\n<tool name=\"search\" id=\"call_1\">\n<arguments>\n",
            "  <arg name=\"query\">rust streams</arg>\n",
            "</arguments>\n</tool>\nDone.",
        ],
    );

    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].id, "call_1");
    assert_eq!(invocations[0].arguments, json!({"query": "rust streams"}));
}

#[test]
fn test_self_closing_tool_tag() {
    let (events, invocations) = run(ParserConfig::new(), &["ping <tool name=\"ping\"/> sent"]);
    let segments = assemble_segments(&events);

    assert_eq!(
        summary(&segments),
        vec![
            (SegmentKind::Text, "ping ".to_string()),
            (SegmentKind::ToolCall, String::new()),
            (SegmentKind::Text, " sent".to_string()),
        ]
    );
    assert_eq!(invocations[0].name, "ping");
    assert_eq!(invocations[0].arguments, json!({}));
}

#[test]
fn test_write_and_patch_files() {
    let segments = segments(
        ParserConfig::new(),
        &[
            "Writing:\n<write_file path=\"src/main.rs\">fn main() {}\n</write_file>\n",
            "<patch_file path='src/lib.rs'>@@ -1 +1 @@\n-a\n+b\n</patch_file>",
        ],
    );

    assert_eq!(segments.len(), 4);
    assert_eq!(segments[1].kind, SegmentKind::WriteFile);
    assert_eq!(segments[1].metadata["path"], "src/main.rs");
    assert_eq!(segments[1].content, "fn main() {}\n");
    assert_eq!(segments[2].content, "\n");
    assert_eq!(segments[3].kind, SegmentKind::PatchFile);
    assert_eq!(segments[3].metadata["path"], "src/lib.rs");
    assert!(segments.iter().all(|s| s.closed && !s.is_truncated()));
}

#[test]
fn test_file_body_may_contain_markers() {
    let segments = segments(
        ParserConfig::new(),
        &["<write_file path=\"a.html\"><tool name=\"x\">{\"tool\": 1}</write_file>"],
    );
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].content, "<tool name=\"x\">{\"tool\": 1}");
}

// ─────────────────────────────────────────────────────────────────────────────
// Sentinels
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_sentinel_split_delimiter() {
    let (events, _) = run(sentinel_config(), &["hello §S§body§", "E§ bye"]);

    let mut text_ids = Vec::new();
    let shape: Vec<String> = events
        .iter()
        .map(|e| match e {
            SegmentEvent::Start { kind, segment_id, .. } => {
                if *kind == SegmentKind::Text {
                    text_ids.push(segment_id.clone());
                }
                format!("start:{kind}")
            }
            SegmentEvent::Content { delta, .. } => format!("content:{delta}"),
            SegmentEvent::End { kind, .. } => format!("end:{kind}"),
        })
        .collect();

    assert_eq!(
        shape,
        vec![
            "start:text",
            "content:hello ",
            "end:text",
            "start:write_file",
            "content:body",
            "end:write_file",
            "start:text",
            "content: bye",
            "end:text",
        ]
    );
    assert_eq!(text_ids.len(), 2);
    assert!(matches!(
        &events[3],
        SegmentEvent::Start { metadata, .. } if metadata["path"] == "a.txt"
    ));
}

#[test]
fn test_sentinel_tool_call_with_attribute_name() {
    let config = ParserConfig::new().with_sentinel(
        SentinelSpec::new("<|call|>", "<|end|>", SegmentKind::ToolCall)
            .with_metadata("tool_name", "shell"),
    );
    let (_, invocations) = run(config, &["<|call|>{\"cmd\": ", "\"ls\"}<|e", "nd|>"]);

    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].name, "shell");
    assert_eq!(invocations[0].arguments, json!({"cmd": "ls"}));
}

#[test]
fn test_sentinel_tool_call_with_profile_body() {
    let config = ParserConfig::new()
        .with_json_profile(JsonProfile::Gemini)
        .with_strategies([GrammarName::Sentinel])
        .with_sentinel(SentinelSpec::new("<<", ">>", SegmentKind::ToolCall));
    let (_, invocations) = run(
        config,
        &["<<[{\"name\": \"a\", \"args\": {}}, {\"name\": \"b\", \"args\": {\"x\": 1}}]>>"],
    );

    let names: Vec<&str> = invocations.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(invocations[1].arguments, json!({"x": 1}));
}

// ─────────────────────────────────────────────────────────────────────────────
// JSON tool calls
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_default_profile_in_text() {
    let (events, invocations) = run(
        ParserConfig::new(),
        &[
            "Sure: {\"tool\": {\"function\": \"x\", ",
            "\"parameters\": \"not json\"}} ok",
        ],
    );
    let segments = assemble_segments(&events);

    assert_eq!(segments.len(), 3);
    assert_eq!(segments[0].content, "Sure: ");
    assert_eq!(segments[1].kind, SegmentKind::ToolCall);
    assert_eq!(
        segments[1].content,
        "{\"tool\": {\"function\": \"x\", \"parameters\": \"not json\"}}"
    );
    assert_eq!(segments[2].content, " ok");

    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].name, "x");
    assert_eq!(invocations[0].arguments, json!({}));
}

#[test]
fn test_gemini_array_is_one_segment() {
    let config = ParserConfig::new().with_json_profile(JsonProfile::Gemini);
    let (events, invocations) = run(
        config,
        &["[{\"name\":\"ls\",\"args\":{\"dir\":\".\"}},{\"name\":\"cat\",\"args\":{\"f\":\"a\"}}]"],
    );

    let segments = assemble_segments(&events);
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].metadata["tool_name"], "ls");
    assert_eq!(invocations.len(), 2);
    assert_eq!(invocations[1].arguments, json!({"f": "a"}));
}

#[test]
fn test_openai_profile_carries_ids() {
    let config = ParserConfig::new().with_json_profile(JsonProfile::OpenAi);
    let (_, invocations) = run(
        config,
        &[r#"{"tool_calls":[{"id":"call_9","type":"function","function":{"name":"get","arguments":"{\"k\":1}"}}]}"#],
    );

    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].id, "call_9");
    assert_eq!(invocations[0].arguments, json!({"k": 1}));
}

#[test]
fn test_plain_json_stays_text() {
    let input = "Config: {\"a\": [1, 2], \"b\": {\"c\": \"}\"}} and [1, 2].";
    let segments = segments(ParserConfig::new(), &[input]);
    assert_eq!(summary(&segments), vec![(SegmentKind::Text, input.to_string())]);
}

#[test]
fn test_unbalanced_json_at_end_is_text() {
    let input = "{\"tool\": {\"function\": \"x\"";
    let (events, invocations) = run(ParserConfig::new(), &[input]);
    assert_eq!(
        summary(&assemble_segments(&events)),
        vec![(SegmentKind::Text, input.to_string())]
    );
    assert!(invocations.is_empty());
}

#[test]
fn test_stray_json_trigger_streams_before_finalize() {
    let narration = "more narration that is plainly text. ";
    let mut parser = StreamingParser::new(ParserConfig::new()).unwrap();

    let mut streamed = parser.feed("Use {\"tool\": like this. ").unwrap();
    for _ in 0..200 {
        streamed.extend(parser.feed(narration).unwrap());
    }

    let text: String = streamed.iter().filter_map(SegmentEvent::delta).collect();
    assert_eq!(text, format!("Use {{\"tool\": like this. {}", narration.repeat(200)));

    let closing = parser.finalize().unwrap();
    assert_eq!(closing.len(), 1);
    assert!(closing[0].is_end());
}

#[test]
fn test_unterminated_json_string_gives_up_at_limit() {
    let config = ParserConfig::new().with_max_json_len(64);
    let mut parser = StreamingParser::new(config).unwrap();

    let mut streamed = parser.feed("{\"tool\": \"").unwrap();
    assert!(streamed.is_empty());
    streamed.extend(parser.feed(&"x".repeat(100)).unwrap());

    let text: String = streamed.iter().filter_map(SegmentEvent::delta).collect();
    assert_eq!(text, format!("{{\"tool\": \"{}", "x".repeat(100)));
    assert!(parser.all_invocations().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Degradation and configuration
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_malformed_markers_are_text() {
    let inputs = [
        "<tool>oops</tool>",
        "<toolbox name=\"x\">",
        "<write_file>no path</write_file>",
        "<patch_file path=\"\">empty</patch_file>",
        "<tool name=\"unterminated>",
        "a < b and c > d",
        "</tool> stray close",
    ];
    for input in inputs {
        let segments = segments(ParserConfig::new(), &[input]);
        assert_eq!(
            summary(&segments),
            vec![(SegmentKind::Text, input.to_string())],
            "input: {input}"
        );
    }
}

#[test]
fn test_opening_tag_longer_than_limit_is_text() {
    let input = "<tool name=\"a-rather-long-tool-name\">x</tool>";
    let config = ParserConfig::new().with_max_marker_len(24);
    let chunked = segments(config.clone(), &[&input[..10], &input[10..]]);
    let whole = segments(config, &[input]);

    assert_eq!(summary(&whole), vec![(SegmentKind::Text, input.to_string())]);
    assert_eq!(chunked, whole);
}

#[test]
fn test_marker_limit_must_fit_opening_tags() {
    let err = StreamingParser::new(ParserConfig::new().with_max_marker_len(4)).unwrap_err();
    assert!(matches!(err, SegmentError::Config(_)));

    let input = "<write_file path=a>x</write_file>";
    let segments = segments(ParserConfig::new().with_max_marker_len(19), &[input]);
    assert_eq!(summary(&segments), vec![(SegmentKind::WriteFile, "x".to_string())]);
    assert_eq!(segments[0].metadata["path"], "a");
}

#[test]
fn test_truncated_segments() {
    let (events, invocations) = run(
        ParserConfig::new(),
        &["before <tool name=\"ls\">{\"dir\": \"", "src"],
    );
    let segments = assemble_segments(&events);

    assert_eq!(segments.len(), 2);
    assert!(segments[1].is_truncated());
    assert_eq!(segments[1].content, "{\"dir\": \"src");
    assert!(invocations.is_empty());
}

#[test]
fn test_pending_marker_at_end_becomes_text() {
    let segments = segments(ParserConfig::new(), &["trailing <wri"]);
    assert_eq!(
        summary(&segments),
        vec![(SegmentKind::Text, "trailing <wri".to_string())]
    );
}

#[test]
fn test_tool_calls_disabled() {
    let config = ParserConfig::new().with_tool_calls(false);
    let (events, invocations) = run(
        config,
        &["<tool name=\"x\">y</tool> {\"tool\": {\"function\": \"z\"}} <write_file path=\"f\">b</write_file>"],
    );
    let segments = assemble_segments(&events);

    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].kind, SegmentKind::Text);
    assert_eq!(
        segments[0].content,
        "<tool name=\"x\">y</tool> {\"tool\": {\"function\": \"z\"}} "
    );
    assert_eq!(segments[1].kind, SegmentKind::WriteFile);
    assert!(invocations.is_empty());
}

#[test]
fn test_strategy_subset() {
    let config = ParserConfig::new().with_strategies([GrammarName::JsonToolCall]);
    let segments = segments(
        config,
        &["<tool name=\"x\"></tool>{\"tool\": {\"function\": \"z\"}}"],
    );
    assert_eq!(
        segments.iter().map(|s| s.kind).collect::<Vec<_>>(),
        vec![SegmentKind::Text, SegmentKind::ToolCall]
    );
}

#[test]
fn test_turn_id_attached() {
    let turn = TurnId::new();
    let mut parser = StreamingParser::new(ParserConfig::new()).unwrap();
    parser.set_turn_id(Some(turn));
    parser.feed("<tool name=\"a\"></tool>").unwrap();
    parser.finalize().unwrap();
    assert_eq!(parser.all_invocations()[0].turn_id, Some(turn));
}

#[test]
fn test_events_serialize_with_type_tag() {
    let (events, _) = run(ParserConfig::new(), &["hi"]);
    let value = serde_json::to_value(&events[0]).unwrap();
    assert_eq!(value["type"], "start");
    assert_eq!(value["kind"], "text");
}
