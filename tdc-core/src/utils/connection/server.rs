//! WebSocket Server Module
//!
//! Accepts remote-controller connections over `picoserve`, parses JSON
//! `SystemCommand` messages, and forwards them to the single command channel.
//! When a live link ends, gracefully, through a protocol error, or through a
//! transport failure, the connection monitor demands a drive stop which is
//! queued before the socket is released, and the session is removed.

extern crate alloc;

use alloc::{string::String, vec::Vec};

use embassy_net::Stack;
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, mutex::Mutex};
use embassy_time::Duration;
use embedded_io_async::Read;
use hashbrown::HashMap;
use lazy_static::lazy_static;
use picoserve::{
    extract::FromRequest,
    io::embedded_io_async as embedded_aio,
    request::{RequestBody, RequestParts},
    response::{
        ws::{Message, ReadMessageError, SocketRx, SocketTx, WebSocketCallback, WebSocketUpgrade},
        StatusCode,
    },
    url_encoded::deserialize_form,
    Router,
};
use serde::Deserialize;

use super::{ConnectionMonitor, LinkAction, LinkEvent};
use crate::utils::controllers::{drive::DriveCommand, SystemCommand, SYSTEM_CHANNEL};

pub struct ServerTimer;
pub struct WebSocket {
    pub session_id: String,
}
#[derive(Clone, Debug)]
pub struct SessionState {
    pub last_seen: u64,
}
pub struct SessionManager;

lazy_static! {
    pub static ref SESSION_STORE: Mutex<CriticalSectionRawMutex, HashMap<String, SessionState>> =
        Mutex::new(HashMap::new());
}

/// Link state machine shared between the routes and the socket callback.
pub static LINK_MONITOR: Mutex<CriticalSectionRawMutex, ConnectionMonitor> =
    Mutex::new(ConnectionMonitor::new());

/// Manages timeouts for the WebSocket server.
#[allow(unused_qualifications)]
impl picoserve::Timer for ServerTimer {
    type Duration = embassy_time::Duration;
    type TimeoutError = embassy_time::TimeoutError;

    /// Runs a future with a timeout.
    async fn run_with_timeout<F: core::future::Future>(
        &mut self,
        duration: Self::Duration,
        future: F,
    ) -> Result<F::Output, Self::TimeoutError> {
        embassy_time::with_timeout(duration, future).await
    }
}

/// Handles incoming WebSocket connections.
impl WebSocketCallback for WebSocket {
    async fn run<Reader, Writer>(
        self,
        mut rx: SocketRx<Reader>,
        mut tx: SocketTx<Writer>,
    ) -> Result<(), Writer::Error>
    where
        Reader: embedded_aio::Read,
        Writer: embedded_aio::Write<Error = Reader::Error>,
    {
        let mut buffer = [0; 1024];

        LINK_MONITOR.lock().await.handle(LinkEvent::Established);
        tx.send_text("Connected").await?;

        let outcome = loop {
            match rx.next_message(&mut buffer).await {
                Ok(Message::Pong(_)) => continue,
                Ok(Message::Ping(data)) => tx.send_pong(data).await?,
                Ok(Message::Close(reason)) => {
                    tracing::info!(?reason, "websocket closed");
                    break Ok(None);
                }
                Ok(Message::Text(data)) => match serde_json::from_str::<SystemCommand>(data) {
                    Ok(command) => {
                        SYSTEM_CHANNEL.send(command).await;
                        tx.send_text("Command received and forwarded").await?;
                    }
                    Err(error) => {
                        tracing::error!(?error, "error deserializing SystemCommand");
                        tx.send_text("Invalid command format").await?
                    }
                },
                Ok(Message::Binary(data)) => match serde_json::from_slice::<SystemCommand>(data) {
                    Ok(command) => {
                        SYSTEM_CHANNEL.send(command).await;
                        tx.send_binary(b"Command received and forwarded").await?
                    }
                    Err(error) => {
                        tracing::error!(?error, "error deserializing incoming message");
                        tx.send_binary(b"Invalid command format").await?
                    }
                },
                Err(error) => {
                    tracing::error!(?error, "websocket error");
                    break match error {
                        ReadMessageError::TextIsNotUtf8 => Ok(Some((1007, "Websocket Error"))),
                        ReadMessageError::ReservedOpcode(_) => Ok(Some((1003, "Websocket Error"))),
                        ReadMessageError::ReadFrameError(_)
                        | ReadMessageError::UnexpectedMessageStart
                        | ReadMessageError::MessageStartsWithContinuation => {
                            Ok(Some((1002, "Websocket Error")))
                        }
                        // A transport failure exits through the same tail as
                        // every other end of the link.
                        ReadMessageError::Io(err) => Err(err),
                    };
                }
            };
        };

        // Whatever ended the link, the car must not keep driving on the last
        // command it happened to receive.
        if LINK_MONITOR.lock().await.handle(exit_event(&outcome)) == LinkAction::HaltDrive {
            SYSTEM_CHANNEL.send(SystemCommand::D(DriveCommand::Stop)).await;
        }
        SessionManager::remove_session(&self.session_id).await;

        match outcome {
            Ok(reason) => tx.close(reason).await,
            Err(err) => Err(err),
        }
    }
}

/// Only a clean close frame counts as a graceful shutdown; a protocol
/// violation or transport failure is a lost connection.
fn exit_event<T, E>(outcome: &Result<Option<T>, E>) -> LinkEvent {
    match outcome {
        Ok(None) => LinkEvent::Closed,
        Ok(Some(_)) | Err(_) => LinkEvent::ConnectionLost,
    }
}

#[allow(dead_code)]
impl SessionManager {
    /// Creates a new session with the given session ID and timestamp.
    pub async fn create_session(
        session_id: String,
        timestamp: u64,
    ) {
        SESSION_STORE.lock().await.insert(
            session_id,
            SessionState {
                last_seen: timestamp,
            },
        );
    }

    /// Retrieves a copy of the session state for the given session ID.
    /// Returns None if the session does not exist.
    pub async fn get_session(session_id: &str) -> Option<SessionState> {
        SESSION_STORE.lock().await.get(session_id).cloned()
    }

    /// Updates the last seen timestamp of the session identified by session_id.
    /// Returns true if the session was found and updated.
    pub async fn update_session(
        session_id: &str,
        timestamp: u64,
    ) -> bool {
        if let Some(session) = SESSION_STORE.lock().await.get_mut(session_id) {
            session.last_seen = timestamp;
            true
        } else {
            false
        }
    }

    /// Removes the session identified by session_id.
    /// Returns true if a session was removed.
    pub async fn remove_session(session_id: &str) -> bool {
        SESSION_STORE.lock().await.remove(session_id).is_some()
    }

    /// Purges sessions that have not been updated since the provided
    /// threshold: any session with last_seen below it is removed.
    pub async fn purge_stale_sessions(threshold: u64) {
        SESSION_STORE
            .lock()
            .await
            .retain(|_id, session| session.last_seen >= threshold);
    }

    /// Returns a list of active session IDs.
    pub async fn list_sessions() -> Vec<String> {
        SESSION_STORE.lock().await.keys().cloned().collect()
    }
}

/// Creates the command server.
pub async fn run(
    id: usize,
    port: u16,
    stack: Stack<'static>,
    config: Option<&'static picoserve::Config<Duration>>,
) -> ! {
    let default_config = picoserve::Config::new(picoserve::Timeouts {
        start_read_request: Some(Duration::from_secs(5)),
        persistent_start_read_request: None,
        read_request: Some(Duration::from_secs(1)),
        write: Some(Duration::from_secs(5)),
    });

    let config = config.unwrap_or(&default_config);

    let router = Router::new()
        // Plain status line at "/"
        .route(
            "/",
            picoserve::routing::get(|| async {
                picoserve::response::Response::new(
                    StatusCode::OK,
                    "tilt-drive-car: connect a controller on /ws",
                )
                .with_headers([("Content-Type", "text/plain; charset=utf-8")])
            }),
        )
        // Command stream on "/ws"
        .route(
            "/ws",
            picoserve::routing::get(|params: WsConnectionParams| async move {
                let session_id = params.query.session;
                tracing::info!("New controller connection with session id: {}", session_id);
                LINK_MONITOR.lock().await.handle(LinkEvent::ConnectStarted);
                let now = embassy_time::Instant::now().as_secs();
                SessionManager::create_session(session_id.clone(), now).await;
                params
                    .upgrade
                    .on_upgrade(WebSocket { session_id })
                    .with_protocol("messages")
            }),
        );

    // Print out the IP and port before starting the server.
    if let Some(ip_cfg) = stack.config_v4() {
        tracing::info!("Starting server at {}:{}", ip_cfg.address, port);
    } else {
        tracing::warn!(
            "Starting WebSocket server on port {port}, but no IPv4 address is assigned yet!"
        );
    }

    let (mut rx_buffer, mut tx_buffer, mut http_buffer) = ([0; 1024], [0; 1024], [0; 4096]);

    picoserve::listen_and_serve_with_state(
        id,
        &router,
        config,
        stack,
        port,
        &mut rx_buffer,
        &mut tx_buffer,
        &mut http_buffer,
        &(),
    )
    .await
}

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    session: String,
}

pub struct WsConnectionParams {
    pub upgrade: WebSocketUpgrade,
    pub query: QueryParams,
}

impl<'r, S> FromRequest<'r, S> for WsConnectionParams {
    type Rejection = &'static str;

    async fn from_request<R: Read>(
        state: &'r S,
        parts: RequestParts<'r>,
        body: RequestBody<'r, R>,
    ) -> Result<Self, Self::Rejection> {
        // First extract the WebSocketUpgrade as usual.
        let upgrade = WebSocketUpgrade::from_request(state, parts.clone(), body)
            .await
            .map_err(|_| "Failed to extract WebSocketUpgrade")?;

        // Then extract the query string for QueryParams.
        let query_str = parts.query().ok_or("Missing query parameters")?;
        let query =
            deserialize_form::<QueryParams>(query_str).map_err(|_| "Invalid query parameters")?;

        if query.session.is_empty() {
            return Err("Session ID is required");
        }

        Ok(WsConnectionParams { upgrade, query })
    }
}
