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

//! URL helpers and endpoint metadata for TradingView services.

use crate::common::enums::TradingViewServer;

const TV_WS_PATH: &str = "/socket.io/websocket";
const TV_HTTP_BASE_URL: &str = "https://www.tradingview.com";
const TV_QUOTE_TOKEN_ENDPOINT: &str = "/quote_token/";

/// Returns the WebSocket URL for the given data server.
#[must_use]
pub fn get_ws_url(server: TradingViewServer) -> String {
    format!(
        "wss://{}.tradingview.com{TV_WS_PATH}",
        server.as_host_prefix()
    )
}

/// Returns the HTTP origin to present during the WebSocket handshake.
#[must_use]
pub fn get_ws_origin(server: TradingViewServer) -> String {
    format!("https://{}.tradingview.com", server.as_host_prefix())
}

/// Returns the HTTP base URL for credential exchange.
#[must_use]
pub const fn get_http_base_url() -> &'static str {
    TV_HTTP_BASE_URL
}

/// Returns the full quote-token exchange URL.
#[must_use]
pub fn get_quote_token_url() -> String {
    format!("{TV_HTTP_BASE_URL}{TV_QUOTE_TOKEN_ENDPOINT}")
}
