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

//! Configuration for the TradingView WebSocket client.

use serde::{Deserialize, Serialize};

use crate::common::enums::TradingViewServer;

/// Configuration for a TradingView WebSocket client instance.
///
/// This struct contains only static configuration settings. Session handlers
/// and event callbacks are registered at runtime through the client and its
/// bridge. The `debug` flag is threaded explicitly to components that dump
/// raw frames rather than toggling any process-wide state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradingViewClientConfig {
    /// The session token (`sessionid` cookie value) for token-based auth.
    pub token: Option<String>,
    /// The session signature (`sessionid_sign` cookie value).
    pub signature: Option<String>,
    /// Optional location hint forwarded to the credential exchange.
    pub location: Option<String>,
    /// Enables verbose raw-frame logging.
    pub debug: bool,
    /// The data server to connect to.
    pub server: TradingViewServer,
    /// Optional HTTP(S) proxy URL for the credential exchange client.
    pub proxy_url: Option<String>,
}

impl TradingViewClientConfig {
    /// Creates a new [`TradingViewClientConfig`] with defaults (anonymous
    /// access against the `data` server).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when both token and signature are present, i.e. the
    /// client should perform the asynchronous credential exchange.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.token.is_some() && self.signature.is_some()
    }

    /// Resolves the proxy URL: the explicit config value wins, otherwise the
    /// process environment is consulted.
    #[must_use]
    pub fn resolve_proxy_url(&self) -> Option<String> {
        self.proxy_url.clone().or_else(proxy_from_env)
    }
}

/// Reads an HTTP(S) proxy URL from the process environment, matching the
/// conventional variable names case-insensitively (`HTTPS_PROXY` preferred
/// over `HTTP_PROXY`).
#[must_use]
pub fn proxy_from_env() -> Option<String> {
    let mut http_proxy = None;

    for (key, value) in std::env::vars() {
        if value.is_empty() {
            continue;
        }
        if key.eq_ignore_ascii_case("https_proxy") {
            return Some(value);
        }
        if key.eq_ignore_ascii_case("http_proxy") {
            http_proxy = Some(value);
        }
    }

    http_proxy
}
