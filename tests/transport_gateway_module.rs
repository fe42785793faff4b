mod support;

use flowdeck::client::{ApiClient, TransportError};
use flowdeck::draft::{StepPatch, WorkflowDraft};
use serde_json::{json, Value};
use support::MockRestServer;

fn record_body_for(request_body: &str) -> String {
    let request: Value = serde_json::from_str(request_body).expect("request body is json");
    let mut record = request;
    record["id"] = json!("wf-1");
    record["created_at"] = json!("2026-08-04T10:00:00");
    record["updated_at"] = json!("2026-08-04T10:00:00");
    for (index, step) in record["steps"]
        .as_array_mut()
        .expect("steps array")
        .iter_mut()
        .enumerate()
    {
        if step.get("id").is_none() {
            step["id"] = json!(format!("step-{index}"));
        }
    }
    record.to_string()
}

#[test]
fn create_workflow_sends_json_body_and_decodes_the_record() {
    let server = MockRestServer::start(1, |request| (200, record_body_for(&request.body)));

    let mut draft = WorkflowDraft::new();
    draft.set_name("ship notes");
    draft.update_step(
        0,
        StepPatch {
            prompt: Some("Summarize {{context}}".to_string()),
            ..StepPatch::default()
        },
    );

    let client = ApiClient::new(server.base_url.clone());
    let record = client
        .create_workflow(&draft.to_create_request())
        .expect("create workflow");
    assert_eq!(record.id, "wf-1");
    assert_eq!(record.name, "ship notes");
    assert_eq!(record.steps.len(), 1);

    let requests = server.finish();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path, "/workflows");
    assert!(requests[0].content_type.starts_with("application/json"));
    let sent: Value = serde_json::from_str(&requests[0].body).expect("sent body is json");
    assert_eq!(sent["name"], json!("ship notes"));
    assert_eq!(sent["steps"][0]["order"], json!(1));
}

#[test]
fn non_success_responses_surface_status_and_raw_body() {
    let server = MockRestServer::start(1, |_| (422, "prompt must not be empty{".to_string()));

    let client = ApiClient::new(server.base_url.clone());
    let err = client.get_workflow("wf-1").expect_err("expected failure");
    match err {
        TransportError::Status { status, body, .. } => {
            assert_eq!(status, 422);
            assert_eq!(body, "prompt must not be empty{");
        }
        other => panic!("expected status error, got {other:?}"),
    }
    server.finish();
}

#[test]
fn success_body_that_fails_decoding_is_a_decode_error() {
    let server = MockRestServer::start(1, |_| (200, "[]".to_string()));

    let client = ApiClient::new(server.base_url.clone());
    let err = client.get_run("run-1").expect_err("expected decode failure");
    assert!(matches!(err, TransportError::Decode { .. }));
    server.finish();
}

#[test]
fn delete_discards_the_response_body() {
    let server = MockRestServer::start(1, |_| (200, r#"{"status":"deleted"}"#.to_string()));

    let client = ApiClient::new(server.base_url.clone());
    client.delete_workflow("wf-1").expect("delete workflow");

    let requests = server.finish();
    assert_eq!(requests[0].method, "DELETE");
    assert_eq!(requests[0].path, "/workflows/wf-1");
}

#[test]
fn start_run_posts_initial_context_to_the_run_path() {
    let server = MockRestServer::start(1, |_| {
        (
            200,
            r#"{"run_id":"run-7","websocket_url":"/runs/run-7/events"}"#.to_string(),
        )
    });

    let client = ApiClient::new(server.base_url.clone());
    let started = client.start_run("wf-1", "seed context").expect("start run");
    assert_eq!(started.run_id, "run-7");

    let requests = server.finish();
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path, "/workflows/wf-1/run");
    let sent: Value = serde_json::from_str(&requests[0].body).expect("sent body is json");
    assert_eq!(sent, json!({"initial_context": "seed context"}));
}

#[test]
fn event_channel_invokes_handlers_and_drops_undecodable_frames() {
    use flowdeck::client::EventChannelHandlers;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    let (listener, ws_base) = support::ws_listener();
    let server = std::thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept channel");
        let mut socket = tungstenite::accept(stream).expect("websocket handshake");
        socket
            .send(tungstenite::Message::Text("not an event".to_string()))
            .expect("send garbage");
        socket
            .send(tungstenite::Message::Text(
                json!({"event": "run_started", "run_id": "run-1"}).to_string(),
            ))
            .expect("send event");
        let _ = socket.close(None);
        while socket.read().is_ok() {}
    });

    let (event_tx, event_rx) = mpsc::channel();
    let closed = Arc::new(AtomicUsize::new(0));
    let closed_for_handler = Arc::clone(&closed);
    let handlers = EventChannelHandlers {
        on_event: Box::new(move |event| {
            let _ = event_tx.send(event);
        }),
        on_close: Box::new(move || {
            closed_for_handler.fetch_add(1, Ordering::Relaxed);
        }),
        on_error: Box::new(|reason| panic!("unexpected channel error: {reason}")),
    };

    let client = ApiClient::new("http://unused.invalid").with_event_base(ws_base);
    let mut channel = client
        .open_event_channel("run-1", handlers)
        .expect("open channel");

    let event = event_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("well-formed event is still delivered after the garbage frame");
    assert_eq!(event.run_id, "run-1");

    let deadline = Instant::now() + Duration::from_secs(5);
    while closed.load(Ordering::Relaxed) == 0 {
        assert!(Instant::now() < deadline, "on_close was never invoked");
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(channel.dropped_message_count(), 1);

    channel.close();
    server.join().expect("event server");
}

#[test]
fn connection_failures_surface_as_request_errors() {
    // Nothing listens on this port; the listener is dropped immediately.
    let base_url = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        format!("http://{}", listener.local_addr().expect("addr"))
    };
    let client = ApiClient::new(base_url);
    let err = client.list_workflows().expect_err("expected failure");
    assert!(matches!(err, TransportError::Request { .. }));
}
