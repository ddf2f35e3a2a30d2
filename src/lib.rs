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

//! WebSocket client for the TradingView market-data/charting protocol.
//!
//! The crate provides the wire-framing codec (`~m~<len>~m~<payload>`), a
//! session-multiplexing router, the authentication gate with its outbound
//! send queue, and a callback-based event dispatcher. Quote and chart session
//! logic stays outside the crate: collaborators register a [`SessionHandler`]
//! through the [`TradingViewBridge`] and receive routed messages via
//! `on_data`, emitting their own frames through `bridge.send(..)`.
//!
//! There is no automatic reconnection and no retry of any kind: a dropped
//! connection requires a new client instance.

pub mod common;
pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod websocket;

pub use crate::{
    config::TradingViewClientConfig,
    error::TradingViewWsError,
    events::{EventCallback, EventChannel, EventDispatcher},
    http::client::{CredentialExchange, HttpCredentialExchange},
    websocket::{
        client::{TradingViewBridge, TradingViewWebSocketClient},
        messages::{Frame, SessionHandler, SessionMessage},
    },
};
