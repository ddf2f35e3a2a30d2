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

//! Enumerations for TradingView endpoints.

use serde::{Deserialize, Serialize};

/// TradingView data server selection.
///
/// `Data` serves anonymous and delayed feeds, `ProData` authenticated
/// real-time feeds, `WidgetData` the embeddable widget feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingViewServer {
    #[default]
    Data,
    ProData,
    WidgetData,
}

impl TradingViewServer {
    /// Returns the server's hostname prefix as it appears on the wire.
    #[must_use]
    pub const fn as_host_prefix(&self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::ProData => "prodata",
            Self::WidgetData => "widgetdata",
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(TradingViewServer::Data, "data")]
    #[case(TradingViewServer::ProData, "prodata")]
    #[case(TradingViewServer::WidgetData, "widgetdata")]
    fn test_host_prefix(#[case] server: TradingViewServer, #[case] expected: &str) {
        assert_eq!(server.as_host_prefix(), expected);
    }

    #[rstest]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&TradingViewServer::ProData).unwrap();
        assert_eq!(json, "\"prodata\"");
        let back: TradingViewServer = serde_json::from_str("\"widgetdata\"").unwrap();
        assert_eq!(back, TradingViewServer::WidgetData);
    }
}
