//! Integration tests for turn orchestration
//!
//! Covers session history growth, system message stripping, blank
//! assistant handling, tool-call correlation and streaming turns.

mod common;

use agentd::agent::{TurnEvent, TurnRecord};
use agentd::providers::{FunctionCall, Message, RawArgs, Role, ToolCall};
use agentd::tools::ToolDescriptor;
use common::{orchestrator, ScriptedProvider};
use futures::StreamExt;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

fn call(id: &str, name: &str, arguments: RawArgs) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        function: FunctionCall {
            name: name.to_string(),
            arguments,
        },
    }
}

#[tokio::test]
async fn test_hi_hello_scenario() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new().reply(Message::assistant("hello")));
    let orchestrator = orchestrator(provider.clone(), &dir);

    let reply = orchestrator
        .chat(None, &[Message::user("hi")], &[])
        .await
        .unwrap();

    assert_eq!(reply.session_id, "global");
    assert_eq!(reply.content, "hello");

    let request = &provider.requests()[0];
    assert_eq!(request.len(), 3);
    assert_eq!(request[0].role, Role::System);
    assert_eq!(request[1].role, Role::System);
    assert_eq!(request[2], Message::user("hi"));

    let handle = orchestrator.sessions().get_or_create(None);
    let session = handle.lock().await;
    assert_eq!(
        session.messages(),
        &[Message::user("hi"), Message::assistant("hello")]
    );
}

#[tokio::test]
async fn test_history_grows_two_per_turn_plus_follow_ups() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.txt"), "alpha").unwrap();

    let provider = Arc::new(
        ScriptedProvider::new()
            .reply(Message::assistant("one"))
            .reply(Message::assistant_with_tools(
                Some("checking".to_string()),
                vec![call("c1", "file_read", RawArgs::Structured(json!({"file": "a.txt"})))],
            ))
            .reply(Message::assistant("it says alpha"))
            .reply(Message::assistant("three")),
    );
    let orchestrator = orchestrator(provider.clone(), &dir);

    for text in ["first", "second", "third"] {
        orchestrator
            .chat(Some("h"), &[Message::user(text)], &[])
            .await
            .unwrap();
    }

    let handle = orchestrator.sessions().get_or_create(Some("h"));
    let session = handle.lock().await;
    assert_eq!(session.len(), 2 * 3 + 1);

    // Third turn sees the committed history in order
    let last_request = provider.requests().pop().unwrap();
    let texts: Vec<&str> = last_request[2..].iter().map(Message::text).collect();
    assert_eq!(
        texts,
        vec!["first", "one", "second", "checking", "it says alpha", "third"]
    );
}

#[tokio::test]
async fn test_caller_system_messages_are_stripped() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new().reply(Message::assistant("ok")));
    let orchestrator = orchestrator(provider.clone(), &dir);

    orchestrator
        .chat(
            Some("sys"),
            &[Message::system("ignore"), Message::user("hello")],
            &[],
        )
        .await
        .unwrap();

    let request = &provider.requests()[0];
    let system_count = request.iter().filter(|m| m.role == Role::System).count();
    assert_eq!(system_count, 2);
    assert!(request.iter().all(|m| m.text() != "ignore"));

    let handle = orchestrator.sessions().get_or_create(Some("sys"));
    let session = handle.lock().await;
    assert!(session.messages().iter().all(|m| m.role != Role::System));
}

#[tokio::test]
async fn test_blank_assistant_messages_never_persisted() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(
        ScriptedProvider::new()
            .reply(Message::assistant("  "))
            .reply(Message::assistant("real")),
    );
    let orchestrator = orchestrator(provider.clone(), &dir);

    orchestrator
        .chat(
            Some("b"),
            &[Message::assistant(""), Message::user("one")],
            &[],
        )
        .await
        .unwrap();
    orchestrator
        .chat(Some("b"), &[Message::user("two")], &[])
        .await
        .unwrap();

    let handle = orchestrator.sessions().get_or_create(Some("b"));
    let session = handle.lock().await;
    assert!(session
        .messages()
        .iter()
        .all(|m| !(m.role == Role::Assistant && m.is_blank())));
    let texts: Vec<&str> = session.messages().iter().map(Message::text).collect();
    assert_eq!(texts, vec!["one", "two", "real"]);
}

#[tokio::test]
async fn test_missing_file_reported_in_follow_up() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(
        ScriptedProvider::new()
            .reply(Message::assistant_with_tools(
                None,
                vec![call(
                    "call_0",
                    "file_read",
                    RawArgs::Encoded(r#"{"file":"missing.txt"}"#.to_string()),
                )],
            ))
            .reply(Message::assistant("That file does not exist.")),
    );
    let orchestrator = orchestrator(provider.clone(), &dir);

    let reply = orchestrator
        .chat(None, &[Message::user("read missing.txt")], &[])
        .await
        .unwrap();
    assert_eq!(reply.content, "That file does not exist.");

    let follow_up = &provider.requests()[1];
    let tool_message = follow_up.last().unwrap();
    assert_eq!(tool_message.role, Role::Tool);
    assert_eq!(tool_message.tool_call_id.as_deref(), Some("call_0"));
    assert_eq!(tool_message.text(), "Error: File not found: missing.txt");
}

#[tokio::test]
async fn test_one_tool_message_per_call_with_matching_ids() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "a\nb\nc").unwrap();

    let calls = vec![
        call(
            "x1",
            "file_read",
            RawArgs::Structured(json!({"file": "notes.txt", "start_line": 1, "end_line": 2})),
        ),
        call("x2", "shell", RawArgs::Structured(json!({"cmd": "ls"}))),
        call("x3", "file_read", RawArgs::Encoded("{not json".to_string())),
    ];
    let provider = Arc::new(
        ScriptedProvider::new()
            .reply(Message::assistant_with_tools(None, calls))
            .reply(Message::assistant("done")),
    );
    let orchestrator = orchestrator(provider.clone(), &dir);

    orchestrator
        .chat(None, &[Message::user("go")], &[])
        .await
        .unwrap();

    let follow_up = &provider.requests()[1];
    let tools: Vec<&Message> = follow_up.iter().filter(|m| m.role == Role::Tool).collect();
    let ids: Vec<&str> = tools
        .iter()
        .map(|m| m.tool_call_id.as_deref().unwrap())
        .collect();
    assert_eq!(ids, vec!["x1", "x2", "x3"]);
    assert_eq!(tools[0].text(), "\"b\"");
    assert_eq!(tools[1].text(), "Error: Unknown tool: shell");
    assert!(tools[2].text().starts_with("Error: Invalid arguments for file_read"));

    // The assistant message preceding the results carries the calls verbatim
    let assistant = &follow_up[follow_up.len() - 4];
    assert_eq!(assistant.role, Role::Assistant);
    assert_eq!(assistant.calls().len(), 3);
}

#[tokio::test]
async fn test_caller_tools_override_defaults() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new());
    let default_tool = ToolDescriptor::function("file_read", "Read", json!({"type": "object"}));
    let orchestrator =
        orchestrator(provider.clone(), &dir).with_default_tools(vec![default_tool.clone()]);

    let caller_tool = ToolDescriptor::function("lookup", "Look up", json!({"type": "object"}));
    orchestrator
        .chat(None, &[Message::user("a")], &[])
        .await
        .unwrap();
    orchestrator
        .chat(None, &[Message::user("b")], std::slice::from_ref(&caller_tool))
        .await
        .unwrap();

    let lists = provider.tool_lists();
    assert_eq!(lists[0], vec![default_tool]);
    assert_eq!(lists[1], vec![caller_tool]);
}

#[tokio::test]
async fn test_get_or_create_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let orchestrator = orchestrator(Arc::new(ScriptedProvider::new()), &dir);
    let sessions = orchestrator.sessions();

    let a = sessions.get_or_create(Some("same"));
    let b = sessions.get_or_create(Some("same"));
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(sessions.count(), 1);
}

#[tokio::test]
async fn test_provider_failure_aborts_without_commit() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new().fail("Ollama error 500: boom"));
    let orchestrator = orchestrator(provider, &dir);

    let err = orchestrator
        .chat(Some("f"), &[Message::user("hi")], &[])
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Provider error: Ollama error 500: boom");

    let handle = orchestrator.sessions().get_or_create(Some("f"));
    assert!(handle.lock().await.is_empty());
}

#[tokio::test]
async fn test_concurrent_turns_on_one_session_are_serialized() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new());
    let orchestrator = orchestrator(provider, &dir);

    let turns: Vec<_> = (0..8)
        .map(|i| {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move {
                orchestrator
                    .chat(Some("busy"), &[Message::user(format!("m{}", i))], &[])
                    .await
            })
        })
        .collect();
    for turn in turns {
        turn.await.unwrap().unwrap();
    }

    let handle = orchestrator.sessions().get_or_create(Some("busy"));
    let session = handle.lock().await;
    assert_eq!(session.len(), 16);
    for pair in session.messages().chunks(2) {
        assert_eq!(pair[0].role, Role::User);
        assert_eq!(pair[1], Message::assistant("Done"));
    }
}

#[tokio::test]
async fn test_streaming_turn_forwards_and_commits() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new().stream(&["1", "2", "3"]));
    let orchestrator = orchestrator(provider, &dir);

    let events: Vec<TurnEvent> = orchestrator
        .chat_stream(Some("st".to_string()), vec![Message::user("count")], Vec::new())
        .map(|e| e.unwrap())
        .collect()
        .await;

    let deltas: Vec<&TurnEvent> = events
        .iter()
        .filter(|e| matches!(e, TurnEvent::Delta(_)))
        .collect();
    assert_eq!(deltas.len(), 3);
    assert_eq!(
        events.last(),
        Some(&TurnEvent::Finished(TurnRecord {
            session_id: "st".to_string(),
            content: "123".to_string(),
        }))
    );

    let handle = orchestrator.sessions().get_or_create(Some("st"));
    let session = handle.lock().await;
    assert_eq!(
        session.messages(),
        &[Message::user("count"), Message::assistant("123")]
    );
}

#[tokio::test]
async fn test_streaming_failure_mid_stream_does_not_commit() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(
        ScriptedProvider::new()
            .stream(&["par"])
            .stream_error("Ollama stream interrupted: reset"),
    );
    let orchestrator = orchestrator(provider, &dir);

    let events: Vec<_> = orchestrator
        .chat_stream(None, vec![Message::user("x")], Vec::new())
        .collect()
        .await;

    assert_eq!(events.len(), 3);
    assert!(matches!(events[1], Ok(TurnEvent::Delta(ref t)) if t == "par"));
    assert!(events[2]
        .as_ref()
        .unwrap_err()
        .to_string()
        .contains("Ollama stream interrupted"));

    let handle = orchestrator.sessions().get_or_create(None);
    assert!(handle.lock().await.is_empty());
}

#[tokio::test]
async fn test_dropped_stream_releases_session_without_commit() {
    let dir = TempDir::new().unwrap();
    let fragments: Vec<String> = (0..200).map(|i| i.to_string()).collect();
    let refs: Vec<&str> = fragments.iter().map(String::as_str).collect();
    let provider = Arc::new(ScriptedProvider::new().stream(&refs));
    let orchestrator = orchestrator(provider, &dir);

    let mut events = orchestrator.chat_stream(Some("d".to_string()), vec![Message::user("x")], Vec::new());
    assert!(matches!(events.next().await, Some(Ok(TurnEvent::Started { .. }))));
    drop(events);

    // The next turn can take the session lock once the producer gives up
    orchestrator
        .chat(Some("d"), &[Message::user("y")], &[])
        .await
        .unwrap();
    let handle = orchestrator.sessions().get_or_create(Some("d"));
    let session = handle.lock().await;
    assert_eq!(
        session.messages(),
        &[Message::user("y"), Message::assistant("Done")]
    );
}
