// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! WebSocket client for the TradingView streaming protocol.

use std::{
    fmt::{Debug, Formatter},
    sync::Arc,
};

use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        http::header::ORIGIN,
        Message,
    },
};

use crate::{
    common::urls::{get_ws_origin, get_ws_url},
    config::TradingViewClientConfig,
    error::TradingViewWsError,
    events::{EventCallback, EventChannel, EventDispatcher},
    http::client::{CredentialExchange, HttpCredentialExchange},
    websocket::{
        codec,
        handler::FeedHandler,
        messages::{HandlerCommand, SessionHandler, TransportEvent, ANONYMOUS_TOKEN, AUTH_MESSAGE_TYPE},
    },
};

/// Non-owning capability handed to session collaborators: the session
/// registry plus an outbound `send`. Collaborators never touch the transport
/// directly.
#[derive(Clone)]
pub struct TradingViewBridge {
    sessions: Arc<DashMap<String, Arc<dyn SessionHandler>>>,
    cmd_tx: tokio::sync::mpsc::UnboundedSender<HandlerCommand>,
}

impl Debug for TradingViewBridge {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradingViewBridge")
            .field("sessions", &self.sessions.len())
            .finish()
    }
}

impl TradingViewBridge {
    /// Registers a session handler under the given key. Keys are unique; a
    /// re-registration replaces the previous handler.
    pub fn register_session(&self, key: impl Into<String>, handler: Arc<dyn SessionHandler>) {
        self.sessions.insert(key.into(), handler);
    }

    /// Removes the session registration, returning whether it existed.
    pub fn unregister_session(&self, key: &str) -> bool {
        self.sessions.remove(key).is_some()
    }

    /// Returns true if a session is registered under the given key.
    #[must_use]
    pub fn has_session(&self, key: &str) -> bool {
        self.sessions.contains_key(key)
    }

    /// Encodes and enqueues an outbound message. The frame is transmitted
    /// once the client is connected and authenticated; after the transport
    /// has closed this becomes a silent no-op.
    pub fn send(&self, kind: &str, payload: &[Value]) -> Result<(), TradingViewWsError> {
        let frame = codec::encode_message(kind, payload)?;
        let _ = self.cmd_tx.send(HandlerCommand::Send { frame });
        Ok(())
    }
}

/// WebSocket client for the TradingView market-data/charting service.
///
/// The client owns the socket and three tasks: a reader feeding raw events
/// into the feed handler, a writer draining outbound frames, and the feed
/// handler itself which holds all mutable state. There is no automatic
/// reconnection: once the connection closes the instance is spent and a new
/// one must be created.
pub struct TradingViewWebSocketClient {
    config: TradingViewClientConfig,
    cmd_tx: tokio::sync::mpsc::UnboundedSender<HandlerCommand>,
    sessions: Arc<DashMap<String, Arc<dyn SessionHandler>>>,
    events: Arc<EventDispatcher>,
    handler_task: tokio::task::JoinHandle<()>,
}

impl Debug for TradingViewWebSocketClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradingViewWebSocketClient")
            .field("server", &self.config.server)
            .field("sessions", &self.sessions.len())
            .field("closed", &self.handler_task.is_finished())
            .finish()
    }
}

impl TradingViewWebSocketClient {
    /// Connects to the configured data server and starts the client tasks.
    ///
    /// For token-based access the credential exchange runs fire-and-forget;
    /// outbound sends queue up until it resolves. Anonymous access
    /// authenticates synchronously with the shared anonymous token.
    pub async fn connect(config: TradingViewClientConfig) -> Result<Self, TradingViewWsError> {
        let exchange = HttpCredentialExchange::new(config.resolve_proxy_url())?;
        Self::connect_with_exchange(config, Arc::new(exchange)).await
    }

    /// Connects with a caller-provided credential exchange collaborator.
    pub async fn connect_with_exchange(
        config: TradingViewClientConfig,
        exchange: Arc<dyn CredentialExchange>,
    ) -> Result<Self, TradingViewWsError> {
        Self::connect_with(config, exchange, Arc::new(EventDispatcher::new())).await
    }

    /// Connects with a caller-provided credential exchange and a
    /// pre-populated event dispatcher. Observers registered on `events`
    /// before the call are guaranteed to see the initial `connected`
    /// dispatch.
    pub async fn connect_with(
        config: TradingViewClientConfig,
        exchange: Arc<dyn CredentialExchange>,
        events: Arc<EventDispatcher>,
    ) -> Result<Self, TradingViewWsError> {
        let url = get_ws_url(config.server);
        tracing::debug!("Connecting to {url}");

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| TradingViewWsError::Client(e.to_string()))?;
        let origin = get_ws_origin(config.server)
            .parse()
            .map_err(|e| TradingViewWsError::Client(format!("invalid origin header: {e}")))?;
        request.headers_mut().insert(ORIGIN, origin);

        let (ws_stream, _response) = connect_async(request).await?;
        tracing::debug!("WebSocket connected: {url}");

        let (write, read) = ws_stream.split();
        let (cmd_tx, cmd_rx) = tokio::sync::mpsc::unbounded_channel::<HandlerCommand>();
        let (raw_tx, raw_rx) = tokio::sync::mpsc::unbounded_channel::<TransportEvent>();
        let (out_tx, mut out_rx) = tokio::sync::mpsc::unbounded_channel::<Message>();

        // The open notification must precede anything the reader produces
        let _ = raw_tx.send(TransportEvent::Open);

        tokio::spawn(async move {
            let mut write = write;
            while let Some(msg) = out_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = write.send(msg).await {
                    tracing::error!("Failed to write frame: {e}");
                    break;
                }
                if closing {
                    break;
                }
            }
            tracing::debug!("Writer task finished");
        });

        tokio::spawn(async move {
            let mut read = read;
            while let Some(item) = read.next().await {
                match item {
                    Ok(Message::Text(text)) => {
                        let _ = raw_tx.send(TransportEvent::Text(text.to_string()));
                    }
                    Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                        Ok(text) => {
                            let _ = raw_tx.send(TransportEvent::Text(text));
                        }
                        Err(_) => {
                            tracing::warn!("Ignoring non-UTF8 binary delivery ({} bytes)", data.len());
                        }
                    },
                    Ok(Message::Ping(data)) => {
                        let _ = raw_tx.send(TransportEvent::ControlPing(data.to_vec()));
                    }
                    Ok(Message::Pong(_)) => {}
                    Ok(Message::Close(frame)) => {
                        tracing::info!("Received close frame: {frame:?}");
                        break;
                    }
                    Ok(Message::Frame(_)) => {}
                    Err(e) => {
                        let _ = raw_tx.send(TransportEvent::Error(e.to_string()));
                        break;
                    }
                }
            }
            tracing::debug!("Reader task finished");
        });

        let sessions: Arc<DashMap<String, Arc<dyn SessionHandler>>> = Arc::new(DashMap::new());

        let handler = FeedHandler::new(
            cmd_rx,
            raw_rx,
            out_tx,
            Arc::clone(&sessions),
            Arc::clone(&events),
            config.debug,
        );
        let handler_task = tokio::spawn(handler.run());

        Self::start_authentication(&config, exchange, cmd_tx.clone())?;

        Ok(Self {
            config,
            cmd_tx,
            sessions,
            events,
            handler_task,
        })
    }

    /// Composes the auth frame (synchronously for anonymous access, through
    /// the credential exchange otherwise) and hands it to the handler.
    fn start_authentication(
        config: &TradingViewClientConfig,
        exchange: Arc<dyn CredentialExchange>,
        cmd_tx: tokio::sync::mpsc::UnboundedSender<HandlerCommand>,
    ) -> Result<(), TradingViewWsError> {
        if let (Some(token), Some(signature)) = (&config.token, &config.signature) {
            let future = exchange.exchange(token, signature, config.location.as_deref());
            // Fire-and-forget: never cancelled on shutdown, but the resulting
            // authorize command is a no-op once the transport has closed.
            tokio::spawn(async move {
                match future.await {
                    Ok(auth_token) => {
                        match codec::encode_message(AUTH_MESSAGE_TYPE, &[Value::String(auth_token)])
                        {
                            Ok(frame) => {
                                let _ = cmd_tx.send(HandlerCommand::Authorize { frame });
                            }
                            Err(e) => {
                                let _ = cmd_tx.send(HandlerCommand::CredentialFailure {
                                    message: e.to_string(),
                                });
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Credential exchange failed: {e}");
                        let _ = cmd_tx.send(HandlerCommand::CredentialFailure {
                            message: e.to_string(),
                        });
                    }
                }
            });
        } else {
            let frame = codec::encode_message(
                AUTH_MESSAGE_TYPE,
                &[Value::String(ANONYMOUS_TOKEN.to_string())],
            )?;
            let _ = cmd_tx.send(HandlerCommand::Authorize { frame });
        }

        Ok(())
    }

    /// Registers an observer on the given event channel.
    pub fn on(&self, channel: EventChannel, callback: EventCallback) {
        self.events.register(channel, callback);
    }

    /// Encodes and enqueues an outbound message (see [`TradingViewBridge::send`]).
    pub fn send(&self, kind: &str, payload: &[Value]) -> Result<(), TradingViewWsError> {
        let frame = codec::encode_message(kind, payload)?;
        let _ = self.cmd_tx.send(HandlerCommand::Send { frame });
        Ok(())
    }

    /// Returns the bridge capability for session collaborators.
    #[must_use]
    pub fn bridge(&self) -> TradingViewBridge {
        TradingViewBridge {
            sessions: Arc::clone(&self.sessions),
            cmd_tx: self.cmd_tx.clone(),
        }
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &TradingViewClientConfig {
        &self.config
    }

    /// Returns true while the feed handler is running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.handler_task.is_finished()
    }

    /// Returns true once the connection has fully closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.handler_task.is_finished()
    }

    /// Initiates an orderly close of the connection. The `disconnected`
    /// event fires once the socket reports closed.
    pub fn disconnect(&self) {
        let _ = self.cmd_tx.send(HandlerCommand::Disconnect);
    }
}
