#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub content_type: String,
    pub body: String,
}

/// Minimal HTTP responder for exercising the REST gateway without a real
/// service. Accepts a fixed number of requests, records each one, and answers
/// with whatever the responder closure returns.
pub struct MockRestServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl MockRestServer {
    pub fn start<F>(expected_requests: usize, responder: F) -> Self
    where
        F: Fn(&RecordedRequest) -> (u16, String) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock rest server");
        let addr = listener.local_addr().expect("local addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let requests_for_thread = Arc::clone(&requests);
        let responder = Arc::new(responder);

        let handle = thread::spawn(move || {
            for _ in 0..expected_requests {
                let (mut stream, _) = match listener.accept() {
                    Ok(accepted) => accepted,
                    Err(_) => return,
                };
                let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));

                let mut request_line = String::new();
                if reader.read_line(&mut request_line).is_err() {
                    continue;
                }
                let mut parts = request_line.split_whitespace();
                let method = parts.next().unwrap_or("").to_string();
                let path = parts.next().unwrap_or("/").to_string();

                let mut content_type = String::new();
                let mut content_length = 0usize;
                loop {
                    let mut line = String::new();
                    if reader.read_line(&mut line).is_err() {
                        break;
                    }
                    if line == "\r\n" || line.is_empty() {
                        break;
                    }
                    let lower = line.to_ascii_lowercase();
                    if lower.starts_with("content-type:") {
                        content_type = line
                            .split_once(':')
                            .map(|(_, v)| v.trim().to_string())
                            .unwrap_or_default();
                    }
                    if lower.starts_with("content-length:") {
                        content_length = line
                            .split_once(':')
                            .map(|(_, v)| v.trim().parse::<usize>().unwrap_or(0))
                            .unwrap_or(0);
                    }
                }

                let mut body_bytes = vec![0u8; content_length];
                if content_length > 0 {
                    reader.read_exact(&mut body_bytes).expect("read body");
                }
                let recorded = RecordedRequest {
                    method,
                    path,
                    content_type,
                    body: String::from_utf8_lossy(&body_bytes).to_string(),
                };

                let (status, response_body) = responder(&recorded);
                requests_for_thread
                    .lock()
                    .expect("record request")
                    .push(recorded);

                let reason = match status {
                    200 => "OK",
                    404 => "Not Found",
                    422 => "Unprocessable Entity",
                    500 => "Internal Server Error",
                    _ => "Status",
                };
                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{response_body}",
                    response_body.len()
                );
                let _ = stream.write_all(response.as_bytes());
                let _ = stream.flush();
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
            handle: Some(handle),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("read requests").clone()
    }

    pub fn finish(mut self) -> Vec<RecordedRequest> {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.requests.lock().expect("read requests").clone()
    }
}

/// Binds a listener for a scripted WebSocket peer and returns it with the
/// `ws://` base the client should be pointed at.
pub fn ws_listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock event server");
    let addr = listener.local_addr().expect("local addr");
    (listener, format!("ws://{addr}"))
}
