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

//! Message types for the TradingView WebSocket protocol.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message type carried by the server's fatal error packet.
pub const PROTOCOL_ERROR_TYPE: &str = "protocol_error";

/// Message type of the authentication frame, always sent first.
pub const AUTH_MESSAGE_TYPE: &str = "set_auth_token";

/// Token value used for anonymous (unauthenticated) access.
pub const ANONYMOUS_TOKEN: &str = "unauthorized_user_token";

/// One decoded wire unit. Immutable once decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Application-level keepalive carrying the server's ping counter.
    Ping(i64),
    /// A typed message with its ordered argument payload.
    Message {
        /// The message type (`m` field).
        kind: String,
        /// The ordered argument sequence (`p` field).
        payload: Vec<Value>,
    },
}

/// The JSON envelope of a non-ping wire payload: `{"m": <type>, "p": [...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireMessage {
    /// The message type.
    #[serde(default)]
    pub m: String,
    /// The ordered argument sequence.
    #[serde(default)]
    pub p: Vec<Value>,
}

impl From<WireMessage> for Frame {
    fn from(msg: WireMessage) -> Self {
        Self::Message {
            kind: msg.m,
            payload: msg.p,
        }
    }
}

/// A routed message delivered to a registered session handler.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionMessage {
    /// The wire message type.
    pub kind: String,
    /// The full payload, first element being the session key.
    pub data: Vec<Value>,
}

/// Capability implemented by external session collaborators (quote and chart
/// sessions). The router delivers matching messages exclusively to the
/// registered handler; they never also surface as generic data events.
pub trait SessionHandler: Send + Sync {
    /// Invoked once per message routed to this session.
    fn on_data(&self, message: SessionMessage);
}

/// Raw transport notifications fed from the socket reader into the handler.
#[derive(Debug, Clone)]
pub(crate) enum TransportEvent {
    /// The socket completed its handshake and is open.
    Open,
    /// A raw inbound text delivery, possibly containing multiple frames.
    Text(String),
    /// A WebSocket-level ping control frame to answer with a pong.
    ControlPing(Vec<u8>),
    /// A socket-level error, reported exactly once.
    Error(String),
}

/// Commands sent from the client surface into the feed handler task.
#[derive(Debug, Clone)]
pub(crate) enum HandlerCommand {
    /// Enqueue the already-encoded auth frame at the queue head and mark the
    /// client authenticated.
    Authorize { frame: String },
    /// Enqueue an already-encoded frame at the queue tail.
    Send { frame: String },
    /// The credential exchange failed; the instance stays unauthenticated.
    CredentialFailure { message: String },
    /// Close the connection.
    Disconnect,
}
