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

//! Credential exchange turning a session token into a quote auth token.
//!
//! The exchange is the only asynchronous collaborator of the client: it runs
//! fire-and-forget, is never retried, and its completion merely enqueues the
//! auth frame. A rejection leaves the client instance permanently
//! unauthenticated.

use futures_util::future::BoxFuture;
use reqwest::header::COOKIE;

use crate::{common::urls::get_quote_token_url, error::TradingViewWsError};

/// Capability exchanging `(token, signature, location?)` for an auth token.
pub trait CredentialExchange: Send + Sync {
    /// Resolves the auth token, or fails with a credential error.
    fn exchange(
        &self,
        token: &str,
        signature: &str,
        location: Option<&str>,
    ) -> BoxFuture<'static, Result<String, TradingViewWsError>>;
}

/// Default [`CredentialExchange`] implementation backed by the TradingView
/// quote-token endpoint.
#[derive(Debug, Clone)]
pub struct HttpCredentialExchange {
    client: reqwest::Client,
    url: String,
}

impl HttpCredentialExchange {
    /// Creates a new [`HttpCredentialExchange`], optionally tunneled through
    /// the given HTTP(S) proxy.
    pub fn new(proxy_url: Option<String>) -> Result<Self, TradingViewWsError> {
        let mut builder = reqwest::Client::builder();
        if let Some(url) = proxy_url {
            let proxy = reqwest::Proxy::all(&url)
                .map_err(|e| TradingViewWsError::Client(format!("invalid proxy URL: {e}")))?;
            builder = builder.proxy(proxy);
        }

        Ok(Self {
            client: builder
                .build()
                .map_err(|e| TradingViewWsError::Client(e.to_string()))?,
            url: get_quote_token_url(),
        })
    }

    /// Overrides the exchange endpoint URL (test servers).
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

impl CredentialExchange for HttpCredentialExchange {
    fn exchange(
        &self,
        token: &str,
        signature: &str,
        location: Option<&str>,
    ) -> BoxFuture<'static, Result<String, TradingViewWsError>> {
        let client = self.client.clone();
        let url = self.url.clone();
        let cookie = format!("sessionid={token}; sessionid_sign={signature}");
        let location = location.map(str::to_string);

        Box::pin(async move {
            let mut request = client.get(&url).header(COOKIE, cookie);
            if let Some(location) = location {
                request = request.query(&[("location", location)]);
            }

            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(TradingViewWsError::Credential(format!(
                    "quote token request failed with status {status}"
                )));
            }

            // The endpoint returns the token as a JSON-encoded string
            let body = response.text().await?;
            serde_json::from_str::<String>(&body).map_err(|e| {
                TradingViewWsError::Credential(format!("unexpected quote token body: {e}"))
            })
        })
    }
}
