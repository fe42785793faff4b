use super::TransportError;
use crate::records::ExecutionEvent;
use crate::shared::logging::append_client_log_line;
use std::io::ErrorKind;
use std::net::TcpStream;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{connect, Message, WebSocket};

const CHANNEL_IDLE_SLEEP: Duration = Duration::from_millis(40);

/// Completion hooks for one event channel. `on_event` delivers each decoded
/// message in arrival order. `on_close` fires once no further events will
/// arrive. `on_error` reports a transport-level failure; after it fires the
/// channel is not guaranteed to reach a closed state on its own, so the owner
/// must call [`EventChannel::close`] for a clean end state.
pub struct EventChannelHandlers {
    pub on_event: Box<dyn FnMut(ExecutionEvent) + Send>,
    pub on_close: Box<dyn FnMut() + Send>,
    pub on_error: Box<dyn FnMut(String) + Send>,
}

/// A live server-push stream scoped to one run. Closing (explicitly or on
/// drop) stops the reader; messages that cannot be decoded as an
/// [`ExecutionEvent`] are dropped with a diagnostic log line and never stop
/// the stream.
pub struct EventChannel {
    stop: Arc<AtomicBool>,
    dropped: Arc<AtomicUsize>,
    reader: Option<JoinHandle<()>>,
}

impl EventChannel {
    pub(crate) fn open(
        url: &str,
        diagnostics_root: Option<PathBuf>,
        handlers: EventChannelHandlers,
    ) -> Result<Self, TransportError> {
        let (mut socket, _) = connect(url).map_err(|err| TransportError::ChannelConnect {
            url: url.to_string(),
            reason: err.to_string(),
        })?;
        set_channel_nonblocking(&mut socket).map_err(|reason| TransportError::ChannelConnect {
            url: url.to_string(),
            reason,
        })?;

        let stop = Arc::new(AtomicBool::new(false));
        let dropped = Arc::new(AtomicUsize::new(0));
        let loop_stop = Arc::clone(&stop);
        let loop_dropped = Arc::clone(&dropped);
        let loop_url = url.to_string();
        let reader = thread::spawn(move || {
            run_channel_loop(
                socket,
                handlers,
                loop_stop,
                loop_dropped,
                diagnostics_root,
                loop_url,
            )
        });

        Ok(Self {
            stop,
            dropped,
            reader: Some(reader),
        })
    }

    pub fn dropped_message_count(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn close(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

impl Drop for EventChannel {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_channel_loop(
    mut socket: WebSocket<MaybeTlsStream<TcpStream>>,
    mut handlers: EventChannelHandlers,
    stop: Arc<AtomicBool>,
    dropped: Arc<AtomicUsize>,
    diagnostics_root: Option<PathBuf>,
    url: String,
) {
    loop {
        if stop.load(Ordering::Relaxed) {
            let _ = socket.close(None);
            (handlers.on_close)();
            return;
        }

        match socket.read() {
            Ok(Message::Text(text)) => match serde_json::from_str::<ExecutionEvent>(&text) {
                Ok(event) => (handlers.on_event)(event),
                Err(err) => {
                    dropped.fetch_add(1, Ordering::Relaxed);
                    if let Some(root) = &diagnostics_root {
                        let line = format!(
                            "ts={} channel={url} dropped undecodable message: {err}",
                            now_secs()
                        );
                        let _ = append_client_log_line(root, &line);
                    }
                }
            },
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {}
            Ok(Message::Ping(payload)) => {
                let _ = socket.send(Message::Pong(payload));
            }
            Ok(Message::Close(_)) => {
                let _ = socket.close(None);
                (handlers.on_close)();
                return;
            }
            Err(tungstenite::Error::Io(err))
                if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
            {
                thread::sleep(CHANNEL_IDLE_SLEEP);
            }
            Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                (handlers.on_close)();
                return;
            }
            Err(err) => {
                (handlers.on_error)(err.to_string());
                return;
            }
        }
    }
}

fn set_channel_nonblocking(
    socket: &mut WebSocket<MaybeTlsStream<TcpStream>>,
) -> Result<(), String> {
    match socket.get_mut() {
        MaybeTlsStream::Plain(stream) => stream.set_nonblocking(true),
        MaybeTlsStream::Rustls(stream) => stream.sock.set_nonblocking(true),
        _ => Ok(()),
    }
    .map_err(|err| format!("failed to configure event channel stream: {err}"))
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
