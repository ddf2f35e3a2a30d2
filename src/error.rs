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

//! Error types produced by the TradingView WebSocket client.
//!
//! None of these categories carries automatic retry semantics: transport and
//! protocol failures are surfaced once through the `error` event channel and
//! the client makes no recovery attempt.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// A typed error enumeration for the TradingView WebSocket client.
#[derive(Debug, Clone, Error)]
pub enum TradingViewWsError {
    /// Socket-level failure, forwarded verbatim to the error channel.
    #[error("Transport error: {0}")]
    Transport(String),
    /// Server sent `protocol_error`; fatal to the connection.
    #[error("Protocol error: {0}")]
    Protocol(String),
    /// Credential exchange rejected; the client instance stays
    /// unauthenticated and its queue never flushes.
    #[error("Credential error: {0}")]
    Credential(String),
    /// Malformed wire frame (bad length prefix or unparseable payload).
    #[error("Decode error: {0}")]
    Decode(String),
    /// Failure during JSON serialization/deserialization.
    #[error("JSON error: {0}")]
    Json(String),
    /// Generic client error.
    #[error("Client error: {0}")]
    Client(String),
}

impl From<tungstenite::Error> for TradingViewWsError {
    fn from(error: tungstenite::Error) -> Self {
        Self::Transport(error.to_string())
    }
}

impl From<serde_json::Error> for TradingViewWsError {
    fn from(error: serde_json::Error) -> Self {
        Self::Json(error.to_string())
    }
}

impl From<reqwest::Error> for TradingViewWsError {
    fn from(error: reqwest::Error) -> Self {
        Self::Credential(error.to_string())
    }
}
