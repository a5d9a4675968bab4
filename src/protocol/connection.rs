//! Persistent WebSocket session against one head node.
//!
//! A single background task owns the socket for the connection's whole
//! lifetime. `connect()` and `disconnect()` only flip a "desired" flag; the
//! task connects, reads, and schedules retries by racing every wait against
//! that flag, so an explicit `disconnect()` cancels an already-scheduled
//! reconnect without any timer bookkeeping. Socket errors never propagate:
//! they collapse into a close, a state change to disconnected, and a retry.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::errors::ConnectionError;

use super::messages::{ClientInput, HeadState, ServerOutput, permitted, transition};

const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);
const NOTIFICATION_BUFFER: usize = 256;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Shared {
    url: String,
    reconnect_delay: Duration,
    connected_tx: watch::Sender<bool>,
    head_state_tx: watch::Sender<HeadState>,
    notify_tx: broadcast::Sender<ServerOutput>,
    /// Present exactly while a socket is open; commands are handed to the
    /// writer half through it. Never used as a queue: no socket, no send.
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    init_requested: AtomicBool,
    attempts: AtomicU32,
}

impl Shared {
    fn handle_frame(&self, text: &str) {
        let output: ServerOutput = match serde_json::from_str(text) {
            Ok(output) => output,
            Err(e) => {
                // Never let an unknown or malformed frame take the session down.
                warn!(error = %e, frame = %truncate(text, 120), "dropping unparseable frame");
                return;
            }
        };

        if matches!(output, ServerOutput::HeadIsAborted { .. }) {
            // The head is back to pre-initialization; allow a fresh Init.
            self.init_requested.store(false, Ordering::Relaxed);
        }

        self.head_state_tx.send_modify(|state| {
            let next = transition(*state, &output);
            if next != *state {
                info!(from = %state, to = %next, "head state changed");
                *state = next;
            }
        });

        // No subscribers is fine.
        let _ = self.notify_tx.send(output);
    }
}

/// Client side of one head node's control WebSocket.
pub struct HeadConnection {
    desired: watch::Sender<bool>,
    shared: Arc<Shared>,
}

impl HeadConnection {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_reconnect_delay(url, DEFAULT_RECONNECT_DELAY)
    }

    /// Must be called from within a tokio runtime; the session task is
    /// spawned immediately (idle until `connect()`).
    pub fn with_reconnect_delay(url: impl Into<String>, reconnect_delay: Duration) -> Self {
        let (desired, desired_rx) = watch::channel(false);
        let (connected_tx, _) = watch::channel(false);
        let (head_state_tx, _) = watch::channel(HeadState::Unknown);
        let (notify_tx, _) = broadcast::channel(NOTIFICATION_BUFFER);

        let shared = Arc::new(Shared {
            url: url.into(),
            reconnect_delay,
            connected_tx,
            head_state_tx,
            notify_tx,
            outbound: Mutex::new(None),
            init_requested: AtomicBool::new(false),
            attempts: AtomicU32::new(0),
        });

        tokio::spawn(session(Arc::clone(&shared), desired_rx));

        Self { desired, shared }
    }

    /// Ask for the connection to be up. Idempotent: calling while already
    /// connected (or already retrying) changes nothing.
    pub fn connect(&self) {
        self.desired.send_replace(true);
    }

    /// Tear the connection down and cancel any pending reconnect, atomically
    /// from the caller's perspective: a retry that was already scheduled
    /// observes the flag and becomes a no-op.
    pub fn disconnect(&self) {
        self.desired.send_replace(false);
        // Fail subsequent sends immediately rather than racing the task.
        self.shared.outbound.lock().unwrap().take();
    }

    /// Send a command over the open socket. Fails fast when disconnected;
    /// commands are never queued for later delivery.
    pub fn send(&self, input: &ClientInput) -> Result<(), ConnectionError> {
        let payload = serde_json::to_string(input)
            .map_err(|e| ConnectionError::Transport(e.to_string()))?;

        let guard = self.shared.outbound.lock().unwrap();
        let tx = guard.as_ref().ok_or(ConnectionError::NotConnected)?;
        tx.send(payload).map_err(|_| ConnectionError::NotConnected)?;

        if matches!(input, ClientInput::Init) {
            self.shared.init_requested.store(true, Ordering::Relaxed);
        }
        debug!(command = input.tag(), "command sent");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        *self.shared.connected_tx.borrow()
    }

    pub fn head_state(&self) -> HeadState {
        *self.shared.head_state_tx.borrow()
    }

    /// Caller-side validity gate for `input` given the current head state.
    pub fn permits(&self, input: &ClientInput) -> bool {
        permitted(
            input,
            self.head_state(),
            self.shared.init_requested.load(Ordering::Relaxed),
        )
    }

    pub fn subscribe_notifications(&self) -> broadcast::Receiver<ServerOutput> {
        self.shared.notify_tx.subscribe()
    }

    pub fn subscribe_connected(&self) -> watch::Receiver<bool> {
        self.shared.connected_tx.subscribe()
    }

    pub fn subscribe_head_state(&self) -> watch::Receiver<HeadState> {
        self.shared.head_state_tx.subscribe()
    }

    #[cfg(test)]
    fn init_requested(&self) -> bool {
        self.shared.init_requested.load(Ordering::Relaxed)
    }
}

/// The connection's single long-lived task: connects while desired, retries
/// after a fixed delay, and winds down when the owning `HeadConnection` is
/// dropped (the desired channel closes).
async fn session(shared: Arc<Shared>, mut desired: watch::Receiver<bool>) {
    loop {
        while !*desired.borrow_and_update() {
            if desired.changed().await.is_err() {
                return;
            }
        }

        match connect_async(shared.url.as_str()).await {
            Ok((ws, _)) => {
                shared.attempts.store(0, Ordering::Relaxed);
                run_socket(&shared, ws, &mut desired).await;
            }
            Err(e) => {
                let attempt = shared.attempts.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(url = %shared.url, attempt, error = %e, "connect attempt failed");
            }
        }

        if desired.has_changed().is_err() {
            return;
        }
        if !*desired.borrow() {
            continue;
        }

        // Cancellable retry delay: disconnect() (or drop) aborts the wait.
        tokio::select! {
            _ = tokio::time::sleep(shared.reconnect_delay) => {}
            res = desired.changed() => {
                if res.is_err() {
                    return;
                }
            }
        }
    }
}

async fn run_socket(shared: &Shared, ws: WsStream, desired: &mut watch::Receiver<bool>) {
    let (mut write, mut read) = ws.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

    *shared.outbound.lock().unwrap() = Some(out_tx);
    shared.connected_tx.send_replace(true);
    info!(url = %shared.url, "websocket connected");

    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => shared.handle_frame(&text),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {} // ping/pong/binary: nothing to do
                Some(Err(e)) => {
                    // Absorbed: the close path below drives the state change.
                    debug!(error = %e, "websocket read error");
                    break;
                }
            },
            command = out_rx.recv() => match command {
                Some(text) => {
                    if let Err(e) = write.send(Message::Text(text)).await {
                        debug!(error = %e, "websocket write error");
                        break;
                    }
                }
                None => break,
            },
            res = desired.changed() => {
                if res.is_err() || !*desired.borrow() {
                    break;
                }
            }
        }
    }

    shared.outbound.lock().unwrap().take();
    shared.connected_tx.send_replace(false);
    info!(url = %shared.url, "websocket disconnected");
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
