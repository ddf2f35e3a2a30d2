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

//! Lifecycle and data event fan-out.
//!
//! Observers are plain boxed callbacks registered per channel; dispatch order
//! equals registration order. Every dispatch on a named channel is mirrored to
//! the catch-all [`EventChannel::Event`] channel with the channel name
//! prepended to the arguments. An unobserved `error` channel falls back to
//! `tracing::error!` so failures are never silently swallowed.

use std::{
    collections::HashMap,
    fmt::{Debug, Formatter},
    sync::{Arc, RwLock},
};

use serde_json::Value;

use crate::error::TradingViewWsError;

/// A registered observer callback receiving the dispatched arguments.
pub type EventCallback = Box<dyn Fn(&[Value]) + Send + Sync>;

/// Named event channels exposed by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventChannel {
    /// Socket opened.
    Connected,
    /// Socket closed (any prior state).
    Disconnected,
    /// Login acknowledgement packet received.
    Logged,
    /// Application-level ping received (argument: the ping counter).
    Ping,
    /// Generic unrouted data message.
    Data,
    /// Transport, protocol, credential, or decode error.
    Error,
    /// Catch-all channel mirroring every dispatch on the channels above.
    Event,
}

impl EventChannel {
    /// Returns the channel name as used in catch-all dispatches.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Logged => "logged",
            Self::Ping => "ping",
            Self::Data => "data",
            Self::Error => "error",
            Self::Event => "event",
        }
    }
}

/// Ordered per-channel observer lists with a catch-all mirror channel.
#[derive(Default)]
pub struct EventDispatcher {
    observers: RwLock<HashMap<EventChannel, Vec<Arc<EventCallback>>>>,
}

impl Debug for EventDispatcher {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<&'static str, usize> = self
            .observers
            .read()
            .map(|m| m.iter().map(|(k, v)| (k.as_str(), v.len())).collect())
            .unwrap_or_default();
        f.debug_struct("EventDispatcher")
            .field("observers", &counts)
            .finish()
    }
}

impl EventDispatcher {
    /// Creates a new [`EventDispatcher`] with no observers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `callback` to the observer list for `channel`.
    pub fn register(&self, channel: EventChannel, callback: EventCallback) {
        let mut observers = self.observers.write().expect("observer lock poisoned");
        observers.entry(channel).or_default().push(Arc::new(callback));
    }

    /// Dispatches `args` to every observer of `channel` in registration
    /// order, then mirrors the dispatch to the catch-all channel.
    ///
    /// Callbacks run on a snapshot of the observer lists taken before
    /// invocation, so a callback may itself call [`Self::register`]; the new
    /// observer takes effect from the next dispatch.
    pub fn dispatch(&self, channel: EventChannel, args: &[Value]) {
        let (callbacks, catch_all) = {
            let observers = self.observers.read().expect("observer lock poisoned");
            (
                observers.get(&channel).cloned().unwrap_or_default(),
                if channel == EventChannel::Event {
                    Vec::new()
                } else {
                    observers
                        .get(&EventChannel::Event)
                        .cloned()
                        .unwrap_or_default()
                },
            )
        };

        if channel == EventChannel::Error && callbacks.is_empty() {
            tracing::error!("Unhandled client error: {args:?}");
        } else {
            for callback in &callbacks {
                callback(args);
            }
        }

        if !catch_all.is_empty() {
            let mut mirrored = Vec::with_capacity(args.len() + 1);
            mirrored.push(Value::String(channel.as_str().to_string()));
            mirrored.extend_from_slice(args);
            for callback in &catch_all {
                callback(&mirrored);
            }
        }
    }

    /// Dispatches an error on the `error` channel as a single string argument.
    pub fn dispatch_error(&self, error: &TradingViewWsError) {
        self.dispatch(
            EventChannel::Error,
            &[Value::String(error.to_string())],
        );
    }
}
