use deepchat_llm::{
    ApiKey, ChatSession, ClientConfig, DeepSeekClient, ErrorKind, FragmentSink, Message, NullSink,
    Role,
};
use mockito::{Matcher, ServerGuard};
use serde_json::json;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const PATH: &str = "/chat/completions";

#[derive(Clone, Default)]
struct Recorder {
    fragments: Arc<Mutex<Vec<String>>>,
    finished: Arc<Mutex<usize>>,
    aborted: Arc<Mutex<usize>>,
}

impl FragmentSink for Recorder {
    fn on_fragment(&mut self, fragment: &str, _accumulated: &str) {
        self.fragments.lock().unwrap().push(fragment.to_string());
    }

    fn on_finish(&mut self, _accumulated: &str) {
        *self.finished.lock().unwrap() += 1;
    }

    fn on_abort(&mut self) {
        *self.aborted.lock().unwrap() += 1;
    }
}

fn client_for(server: &ServerGuard) -> Arc<DeepSeekClient> {
    let config = ClientConfig::new(ApiKey::new("sk-test").unwrap()).with_base_url(server.url());
    Arc::new(DeepSeekClient::from_config(config).unwrap())
}

fn session_for(server: &ServerGuard) -> ChatSession {
    ChatSession::builder(client_for(server)).sink(NullSink).build()
}

fn completion(content: &str) -> String {
    json!({
        "id": "cmpl-1",
        "object": "chat.completion",
        "model": "deepseek-chat",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
    })
    .to_string()
}

fn frame(content: &str) -> String {
    format!(
        "data: {}\n\n",
        json!({"id": "cmpl-1", "choices": [{"index": 0, "delta": {"content": content}, "finish_reason": null}]})
    )
}

/// Serves one request: sends `partial` under a larger content-length, then hangs up.
async fn truncated_stream_server(partial: String) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;

        let head = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ncontent-length: {}\r\n\r\n",
            partial.len() + 1000
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(partial.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();
    });

    format!("http://{}", addr)
}

async fn read_request(socket: &mut tokio::net::TcpStream) {
    let mut request = Vec::new();
    let mut buf = [0u8; 4096];

    loop {
        let n = socket.read(&mut buf).await.unwrap();
        if n == 0 {
            return;
        }
        request.extend_from_slice(&buf[..n]);

        let text = String::from_utf8_lossy(&request);
        if let Some(end) = text.find("\r\n\r\n") {
            let content_length = text[..end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if request.len() >= end + 4 + content_length {
                return;
            }
        }
    }
}

fn body(messages: serde_json::Value, stream: bool) -> Matcher {
    Matcher::Json(json!({
        "model": "deepseek-chat",
        "messages": messages,
        "stream": stream
    }))
}

#[tokio::test]
async fn test_buffered_answer_round_trip() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", PATH)
        .match_header("authorization", "Bearer sk-test")
        .match_header("content-type", "application/json")
        .match_body(body(json!([{"role": "user", "content": "What is Rust?"}]), false))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion("A systems language."))
        .create_async()
        .await;

    let mut session = session_for(&server);
    let answer = session.ask("What is Rust?", false).await.unwrap();

    mock.assert_async().await;
    assert_eq!(answer, "A systems language.");
    assert_eq!(
        session.messages().last(),
        Some(&Message::assistant("A systems language."))
    );
    assert_eq!(session.len(), 2);
}

#[tokio::test]
async fn test_second_call_replays_history() {
    let mut server = mockito::Server::new_async().await;
    let first = server
        .mock("POST", PATH)
        .match_body(body(json!([{"role": "user", "content": "q1"}]), false))
        .with_status(200)
        .with_body(completion("a1"))
        .create_async()
        .await;
    let second = server
        .mock("POST", PATH)
        .match_body(body(
            json!([
                {"role": "user", "content": "q1"},
                {"role": "assistant", "content": "a1"},
                {"role": "user", "content": "q2"}
            ]),
            false,
        ))
        .with_status(200)
        .with_body(completion("a2"))
        .create_async()
        .await;

    let mut session = session_for(&server);
    session.ask("q1", false).await.unwrap();
    session.ask("q2", false).await.unwrap();

    first.assert_async().await;
    second.assert_async().await;
    assert_eq!(session.len(), 4);
}

#[tokio::test]
async fn test_streamed_answer_is_accumulated() {
    let mut server = mockito::Server::new_async().await;
    let sse = format!(
        "data: {}\n\n{}{}data: [DONE]\n\n",
        json!({"choices": [{"index": 0, "delta": {"role": "assistant", "content": ""}}]}),
        frame("Hel"),
        frame("lo")
    );
    let mock = server
        .mock("POST", PATH)
        .match_body(body(json!([{"role": "user", "content": "greet me"}]), true))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(sse)
        .create_async()
        .await;

    let recorder = Recorder::default();
    let mut session = ChatSession::builder(client_for(&server))
        .sink(recorder.clone())
        .build();

    let answer = session.ask("greet me", true).await.unwrap();

    mock.assert_async().await;
    assert_eq!(answer, "Hello");
    assert_eq!(*recorder.fragments.lock().unwrap(), vec!["Hel", "lo"]);
    assert_eq!(*recorder.finished.lock().unwrap(), 1);

    let assistants: Vec<&Message> = session
        .messages()
        .iter()
        .filter(|m| m.role() == Role::Assistant)
        .collect();
    assert_eq!(assistants, vec![&Message::assistant("Hello")]);

    let stats = session.last_stream_stats().unwrap();
    assert_eq!(stats.fragments, 2);
    assert!(stats.done_received);
}

#[tokio::test]
async fn test_malformed_frame_does_not_abort_stream() {
    let mut server = mockito::Server::new_async().await;
    let sse = format!(
        "{}data: {{oops\n\n{}data: [DONE]\n\n",
        frame("Hel"),
        frame("lo")
    );
    server
        .mock("POST", PATH)
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(sse)
        .create_async()
        .await;

    let mut session = session_for(&server);
    let answer = session.ask("hi", true).await.unwrap();

    assert_eq!(answer, "Hello");
    assert_eq!(session.last_stream_stats().unwrap().skipped_frames, 1);
}

#[tokio::test]
async fn test_chunked_stream_body() {
    let mut server = mockito::Server::new_async().await;
    let sse = format!("{}{}data: [DONE]\n\n", frame("Hel"), frame("lo"));
    server
        .mock("POST", PATH)
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_chunked_body(move |w| {
            for piece in sse.as_bytes().chunks(7) {
                w.write_all(piece)?;
            }
            Ok(())
        })
        .create_async()
        .await;

    let mut session = session_for(&server);
    assert_eq!(session.ask("hi", true).await.unwrap(), "Hello");
}

#[tokio::test]
async fn test_clear_then_ask_sends_single_message() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", PATH)
        .match_body(body(json!([{"role": "user", "content": "before"}]), false))
        .with_status(200)
        .with_body(completion("earlier"))
        .create_async()
        .await;
    let after_clear = server
        .mock("POST", PATH)
        .match_body(body(json!([{"role": "user", "content": "after"}]), false))
        .with_status(200)
        .with_body(completion("fresh"))
        .create_async()
        .await;

    let mut session = session_for(&server);
    session.clear();
    assert!(session.is_empty());

    session.ask("before", false).await.unwrap();
    session.clear();
    session.clear();
    assert!(session.is_empty());

    session.ask("after", false).await.unwrap();
    after_clear.assert_async().await;
    assert_eq!(session.len(), 2);
}

#[tokio::test]
async fn test_server_error_keeps_user_turn_only() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", PATH)
        .with_status(500)
        .with_body("internal error")
        .create_async()
        .await;

    let mut session = session_for(&server);
    let err = session.ask("will fail", false).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::HttpStatus(500));
    assert!(err.to_string().contains("internal error"));
    assert!(err.hint().contains("internal error"));
    assert_eq!(session.messages(), &[Message::user("will fail")]);
}

#[tokio::test]
async fn test_streamed_server_error_writes_nothing() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", PATH)
        .with_status(429)
        .with_body("slow down")
        .create_async()
        .await;

    let recorder = Recorder::default();
    let mut session = ChatSession::builder(client_for(&server))
        .sink(recorder.clone())
        .build();

    let err = session.ask("hi", true).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::HttpStatus(429));
    assert!(recorder.fragments.lock().unwrap().is_empty());
    assert_eq!(*recorder.finished.lock().unwrap(), 0);
    assert_eq!(*recorder.aborted.lock().unwrap(), 1);
    assert!(session.last_stream_stats().is_none());
}

#[tokio::test]
async fn test_log_length_accounting() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", PATH)
        .match_body(body(json!([{"role": "user", "content": "ok"}]), false))
        .with_status(200)
        .with_body(completion("fine"))
        .create_async()
        .await;
    server
        .mock("POST", PATH)
        .match_body(body(
            json!([
                {"role": "user", "content": "ok"},
                {"role": "assistant", "content": "fine"},
                {"role": "user", "content": "fail"}
            ]),
            false,
        ))
        .with_status(500)
        .create_async()
        .await;

    let mut session = session_for(&server);
    session.ask("ok", false).await.unwrap();
    assert!(session.ask("fail", false).await.is_err());

    // one full exchange plus the orphaned user turn
    assert_eq!(session.len(), 3);
}

#[tokio::test]
async fn test_missing_content_is_decode_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", PATH)
        .with_status(200)
        .with_body(r#"{"choices": []}"#)
        .create_async()
        .await;

    let mut session = session_for(&server);
    let err = session.ask("hi", false).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Decode);
    assert_eq!(session.len(), 1);
}

#[tokio::test]
async fn test_connection_failure_is_transport_error() {
    let config = ClientConfig::new(ApiKey::new("sk-test").unwrap())
        .with_base_url("http://127.0.0.1:1");
    let client = Arc::new(DeepSeekClient::from_config(config).unwrap());
    let mut session = ChatSession::builder(client).sink(NullSink).build();

    let err = session.ask("anyone there?", false).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(err.hint().starts_with("Network error"));
}

#[tokio::test]
async fn test_stream_cut_off_midway_is_transport_error() {
    let base_url = truncated_stream_server(frame("Hel")).await;
    let config = ClientConfig::new(ApiKey::new("sk-test").unwrap()).with_base_url(base_url);
    let client = Arc::new(DeepSeekClient::from_config(config).unwrap());

    let recorder = Recorder::default();
    let mut session = ChatSession::builder(client)
        .sink(recorder.clone())
        .build();

    let err = session.ask("hi", true).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(*recorder.fragments.lock().unwrap(), vec!["Hel"]);
    assert_eq!(*recorder.finished.lock().unwrap(), 0);
    assert_eq!(*recorder.aborted.lock().unwrap(), 1);
    assert_eq!(session.messages(), &[Message::user("hi")]);
    assert!(session.last_stream_stats().is_none());
}
