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

//! Outbound send queue gated by connection and authentication state.
//!
//! Entries are already wire-encoded strings in strict FIFO order, except the
//! authentication frame which is always inserted at the head regardless of
//! arrival order. Draining requires `connected && authenticated`; the
//! `authenticated` flag flips the moment the auth frame is queued, not when
//! the server acknowledges it. Once the queue is closed, further enqueue and
//! drain attempts are silently discarded (end-of-life no-op, not an error).

use std::collections::VecDeque;

/// FIFO buffer of encoded outbound frames plus the client connection state.
#[derive(Debug, Default)]
pub struct SendQueue {
    entries: VecDeque<String>,
    connected: bool,
    authenticated: bool,
    closed: bool,
}

impl SendQueue {
    /// Creates a new, disconnected and unauthenticated [`SendQueue`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once the socket has reported open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Returns true once the auth frame has been queued.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Returns true once the transport is permanently closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Marks the socket open.
    pub fn mark_connected(&mut self) {
        self.connected = true;
    }

    /// Marks the transport permanently closed; queued entries are dropped and
    /// the authenticated flag resets.
    pub fn mark_closed(&mut self) {
        self.closed = true;
        self.connected = false;
        self.authenticated = false;
        if !self.entries.is_empty() {
            tracing::debug!(
                "Dropping {} queued frame(s) on closed transport",
                self.entries.len()
            );
            self.entries.clear();
        }
    }

    /// Inserts the auth frame at the queue head and marks the client
    /// authenticated immediately (optimistic, on composition not on ack).
    pub fn enqueue_auth(&mut self, frame: String) {
        if self.closed {
            tracing::debug!("Discarding auth frame on closed transport");
            return;
        }
        self.entries.push_front(frame);
        self.authenticated = true;
    }

    /// Appends an encoded frame at the queue tail.
    pub fn enqueue(&mut self, frame: String) {
        if self.closed {
            tracing::debug!("Discarding outbound frame on closed transport");
            return;
        }
        self.entries.push_back(frame);
    }

    /// Removes and returns all queued entries in FIFO order when the gating
    /// invariant holds; otherwise returns nothing and entries remain queued.
    #[must_use]
    pub fn drain_ready(&mut self) -> Vec<String> {
        if !(self.connected && self.authenticated) || self.closed {
            return Vec::new();
        }
        self.entries.drain(..).collect()
    }
}
