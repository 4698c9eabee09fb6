//! WebSocket server: accept loop and per-connection task management.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Upgrading each accepted connection to a WebSocket session.
//! 3. Running two halves per session:
//!    - **Writer task**: drains the connection's outbound queue into the
//!      socket, one frame at a time, each write bounded by `write_timeout`.
//!    - **Reader loop**: decodes inbound frames in arrival order and hands
//!      them to [`SessionCore::handle_event`].
//! 4. Unregistering the connection on every exit path via its
//!    [`Registration`](crate::application::Registration) guard.
//! 5. Stopping the accept loop when the `running` flag is cleared.
//!
//! # Ordering
//!
//! Everything a client receives, initial sync and broadcasts and replies,
//! goes through its single outbound queue, so the writer task is the only
//! code that touches the sink.  No lock around the sink is needed.
//!
//! # Wire format
//!
//! A session starts in `config.wire_format` and switches to whichever format
//! the client last sent, before that message is handled.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_async,
    tungstenite::{Error as WsError, Message as WsMessage},
    WebSocketStream,
};
use tracing::{debug, error, info, warn};

use checkbox_core::{InboundEvent, OutboundFrame};

use crate::application::{BitStore, ConnectionHandle, ConnectionRegistry, SessionCore};
use crate::domain::{ConnectionId, ServerConfig};

type WsSink = SplitSink<WebSocketStream<TcpStream>, WsMessage>;
type WsSource = SplitStream<WebSocketStream<TcpStream>>;

/// How often the accept loop wakes up to check the shutdown flag.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `config.bind_addr` and serves clients until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot be bound (e.g., the port is
/// already in use or the process lacks permission to bind).
pub async fn run_server(
    config: ServerConfig,
    store: Arc<dyn BitStore>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind WebSocket listener on {}", config.bind_addr))?;

    info!("checkbox server listening on {}", config.bind_addr);

    let registry = Arc::new(ConnectionRegistry::new());
    let core = Arc::new(SessionCore::from_config(store, registry, &config));
    serve(listener, core, Arc::new(config), running).await
}

/// Runs the accept loop on an already bound listener.
///
/// Split from [`run_server`] so tests can bind an ephemeral port and keep a
/// handle on the [`SessionCore`] they pass in.
///
/// # Errors
///
/// Currently never fails; accept errors are logged and the loop continues.
pub async fn serve(
    listener: TcpListener,
    core: Arc<SessionCore>,
    config: Arc<ServerConfig>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // Short timeout so the flag is re-checked even when nobody connects.
        match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                debug!("new TCP connection from {peer_addr}");
                let core = Arc::clone(&core);
                let config = Arc::clone(&config);
                tokio::spawn(async move {
                    handle_session(stream, peer_addr, core, config).await;
                });
            }
            Ok(Err(e)) => {
                // Transient (e.g. too many open files); keep serving.
                error!("accept error: {e}");
            }
            Err(_) => {}
        }
    }

    Ok(())
}

// ── Per-session handler ───────────────────────────────────────────────────────

/// Wraps [`run_session`] and logs the outcome.
async fn handle_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    core: Arc<SessionCore>,
    config: Arc<ServerConfig>,
) {
    match run_session(raw_stream, peer_addr, core, config).await {
        Ok(id) => info!("session {id} ({peer_addr}) closed"),
        Err(e) => warn!("session with {peer_addr} closed with error: {e:#}"),
    }
}

/// Runs the complete lifecycle of one client connection.
///
/// Returns the connection's id once it has been unregistered.
///
/// # Errors
///
/// Returns an error if the WebSocket handshake fails.  Once the session is
/// established every failure is logged and ends the session normally.
async fn run_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    core: Arc<SessionCore>,
    config: Arc<ServerConfig>,
) -> anyhow::Result<ConnectionId> {
    // ── Step 1: WebSocket handshake ───────────────────────────────────────────
    let ws_stream = accept_async(raw_stream)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;

    let id = ConnectionId::new();
    info!("session {id}: WebSocket established with {peer_addr}");

    // ── Step 2: Outbound queue and writer task ────────────────────────────────
    let (ws_tx, mut ws_rx) = ws_stream.split();
    let (handle, outbound_rx) = ConnectionHandle::channel(config.outbound_queue, config.wire_format);
    let mut writer_task = tokio::spawn(write_outbound(id, ws_tx, outbound_rx, config.write_timeout));

    // ── Step 3: Register ──────────────────────────────────────────────────────
    //
    // Dropped at the end of this function, which unregisters on every path
    // out, including a panic in the reader.
    let Some(_registration) = core.registry().acquire(id, handle.clone()) else {
        writer_task.abort();
        anyhow::bail!("session {id}: connection id already registered");
    };

    // ── Step 4: Initial sync, then process messages in arrival order ──────────
    let reader = async {
        match core.initial_sync(id, &handle).await {
            Ok(sent) => debug!("session {id}: synced {sent} checked boxes"),
            Err(e) => {
                debug!("session {id}: client gone during initial sync: {e}");
                return;
            }
        }
        read_inbound(id, &mut ws_rx, &core, &handle).await;
    };

    // ── Step 5: Whichever half finishes first ends the session ────────────────
    tokio::select! {
        () = reader => {
            debug!("session {id}: reader finished");
        }
        _ = &mut writer_task => {
            debug!("session {id}: writer task ended");
        }
    }
    writer_task.abort();

    Ok(id)
}

/// Reads client frames until the socket closes or errors.
async fn read_inbound(
    id: ConnectionId,
    ws_rx: &mut WsSource,
    core: &SessionCore,
    handle: &ConnectionHandle,
) {
    loop {
        let ws_msg = match ws_rx.next().await {
            Some(Ok(msg)) => msg,
            Some(Err(WsError::ConnectionClosed | WsError::Protocol(_))) => {
                debug!("session {id}: WebSocket closed");
                break;
            }
            Some(Err(e)) => {
                warn!("session {id}: WebSocket read error: {e}");
                break;
            }
            None => {
                debug!("session {id}: stream ended");
                break;
            }
        };

        let event = match ws_msg {
            WsMessage::Binary(bytes) => InboundEvent::from_binary(&bytes),
            WsMessage::Text(text) => InboundEvent::from_text(&text),
            WsMessage::Ping(data) => {
                // tungstenite queues the Pong itself.
                debug!("session {id}: WebSocket ping ({} bytes)", data.len());
                continue;
            }
            WsMessage::Pong(_) => {
                debug!("session {id}: WebSocket pong received");
                continue;
            }
            WsMessage::Close(_) => {
                debug!("session {id}: Close frame received");
                break;
            }
            WsMessage::Frame(_) => {
                debug!("session {id}: raw frame (ignored)");
                continue;
            }
        };

        debug!("session {id}: received {}", event_kind(&event));
        handle.set_format(event.wire());

        if let Some(reply) = core.handle_event(id, event).await {
            if handle.enqueue(reply).await.is_err() {
                debug!("session {id}: outbound queue closed, dropping reply");
                break;
            }
        }
    }
}

/// Drains the outbound queue into the socket.
///
/// Ends when the queue closes, a write fails, or a write takes longer than
/// `write_timeout`.
async fn write_outbound(
    id: ConnectionId,
    mut sink: WsSink,
    mut rx: mpsc::Receiver<OutboundFrame>,
    write_timeout: Duration,
) {
    while let Some(frame) = rx.recv().await {
        match timeout(write_timeout, sink.send(to_ws_message(frame))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!("session {id}: WebSocket send failed (client disconnected): {e}");
                break;
            }
            Err(_) => {
                warn!("session {id}: write stalled for {write_timeout:?}, closing session");
                break;
            }
        }
    }

    if let Ok(Err(e)) = timeout(write_timeout, sink.close()).await {
        debug!("session {id}: close failed: {e}");
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Maps a queued frame to the WebSocket message type that carries it.
fn to_ws_message(frame: OutboundFrame) -> WsMessage {
    match frame {
        OutboundFrame::Binary(bytes) => WsMessage::Binary(bytes.to_vec()),
        OutboundFrame::Text(json) => WsMessage::Text(json),
    }
}

/// Returns a short name for an inbound event, for debug logging.
fn event_kind(event: &InboundEvent) -> &'static str {
    match event {
        InboundEvent::BinarySet(_) => "binary SET",
        InboundEvent::TextSet(_) => "text SET",
        InboundEvent::Query { .. } => "GET",
        InboundEvent::Ignored { .. } => "ignored command",
        InboundEvent::Malformed { .. } => "malformed message",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
