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

//! Demonstration of the TradingView WebSocket client.
//!
//! Connects anonymously, registers a quote session, subscribes to a couple of
//! symbols, and prints routed session data for thirty seconds.
//!
//! Usage:
//! ```bash
//! cargo run --bin quote-demo
//!
//! # Authenticated real-time feed
//! export TV_SESSION_TOKEN=your_sessionid_cookie
//! export TV_SESSION_SIGNATURE=your_sessionid_sign_cookie
//! cargo run --bin quote-demo
//! ```

use std::{env, sync::Arc, time::Duration};

use serde_json::json;
use tradingview_ws::{
    common::generate_session_id,
    websocket::client::TradingViewBridge,
    SessionHandler, SessionMessage, TradingViewClientConfig, TradingViewWebSocketClient,
};
use tracing::level_filters::LevelFilter;

struct PrintingQuoteSession;

impl SessionHandler for PrintingQuoteSession {
    fn on_data(&self, message: SessionMessage) {
        tracing::info!("Quote session data [{}]: {:?}", message.kind, message.data);
    }
}

fn register_quote_session(bridge: &TradingViewBridge) -> anyhow::Result<String> {
    let session_id = generate_session_id("qs");
    bridge.register_session(session_id.clone(), Arc::new(PrintingQuoteSession));

    bridge.send("quote_create_session", &[json!(session_id)])?;
    bridge.send(
        "quote_add_symbols",
        &[
            json!(session_id),
            json!("BINANCE:BTCUSDT"),
            json!("NASDAQ:AAPL"),
        ],
    )?;

    Ok(session_id)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::DEBUG)
        .init();

    let config = TradingViewClientConfig {
        token: env::var("TV_SESSION_TOKEN").ok(),
        signature: env::var("TV_SESSION_SIGNATURE").ok(),
        debug: true,
        ..Default::default()
    };

    if config.has_credentials() {
        tracing::info!("=== TradingView Quote Demo (authenticated) ===");
    } else {
        tracing::info!("=== TradingView Quote Demo (anonymous) ===");
    }

    let client = TradingViewWebSocketClient::connect(config).await?;

    client.on(
        tradingview_ws::EventChannel::Error,
        Box::new(|args| tracing::error!("Client error: {args:?}")),
    );
    client.on(
        tradingview_ws::EventChannel::Ping,
        Box::new(|args| tracing::debug!("Server ping: {args:?}")),
    );

    let bridge = client.bridge();
    let session_id = register_quote_session(&bridge)?;
    tracing::info!("Registered quote session {session_id}");

    tokio::time::sleep(Duration::from_secs(30)).await;

    client.disconnect();
    tracing::info!("=== Demo Complete ===");

    Ok(())
}
