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

//! Session routing and the single feed-handler task.
//!
//! All mutable client state (send queue, auth flag, session delivery) lives
//! inside one task, fed by a command channel from the client surface and a
//! raw-event channel from the socket reader. Frames decoded from one inbound
//! delivery are processed strictly in codec order; outbound frames leave in
//! enqueue order with the auth frame always first.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;

use crate::{
    error::TradingViewWsError,
    events::{EventChannel, EventDispatcher},
    websocket::{
        codec,
        messages::{
            Frame, HandlerCommand, SessionHandler, SessionMessage, TransportEvent, WireMessage,
            PROTOCOL_ERROR_TYPE,
        },
        queue::SendQueue,
    },
};

/// The decision made by the router for one decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutingOutcome {
    /// Application-level ping: emit a ping notification and the given
    /// pre-encoded pong reply. Pings never enter session routing.
    Ping {
        /// The server's ping counter.
        n: i64,
        /// The encoded pong frame to send back.
        reply: String,
    },
    /// Server-sent fatal signal: close the transport immediately and process
    /// no further frames from the same decode batch.
    FatalProtocolError(Vec<Value>),
    /// Deliver exclusively to the registered session with this key.
    Session(String),
    /// Not yet authenticated: treat as the login acknowledgement packet.
    Logged,
    /// Generic unrouted data.
    Data,
}

/// Routes one decoded frame against the session registry and auth state.
#[must_use]
pub fn route_frame(
    frame: &Frame,
    sessions: &DashMap<String, Arc<dyn SessionHandler>>,
    authenticated: bool,
) -> RoutingOutcome {
    match frame {
        Frame::Ping(n) => RoutingOutcome::Ping {
            n: *n,
            reply: codec::encode_ping_reply(*n),
        },
        Frame::Message { kind, payload } => {
            if kind == PROTOCOL_ERROR_TYPE {
                return RoutingOutcome::FatalProtocolError(payload.clone());
            }

            if let Some(key) = payload.first().and_then(Value::as_str) {
                if sessions.contains_key(key) {
                    return RoutingOutcome::Session(key.to_string());
                }
            }

            if authenticated {
                RoutingOutcome::Data
            } else {
                RoutingOutcome::Logged
            }
        }
    }
}

pub(crate) struct FeedHandler {
    cmd_rx: tokio::sync::mpsc::UnboundedReceiver<HandlerCommand>,
    raw_rx: tokio::sync::mpsc::UnboundedReceiver<TransportEvent>,
    out_tx: tokio::sync::mpsc::UnboundedSender<Message>,
    sessions: Arc<DashMap<String, Arc<dyn SessionHandler>>>,
    events: Arc<EventDispatcher>,
    queue: SendQueue,
    debug: bool,
}

impl FeedHandler {
    pub(crate) fn new(
        cmd_rx: tokio::sync::mpsc::UnboundedReceiver<HandlerCommand>,
        raw_rx: tokio::sync::mpsc::UnboundedReceiver<TransportEvent>,
        out_tx: tokio::sync::mpsc::UnboundedSender<Message>,
        sessions: Arc<DashMap<String, Arc<dyn SessionHandler>>>,
        events: Arc<EventDispatcher>,
        debug: bool,
    ) -> Self {
        Self {
            cmd_rx,
            raw_rx,
            out_tx,
            sessions,
            events,
            queue: SendQueue::new(),
            debug,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                Some(cmd) = self.cmd_rx.recv() => {
                    match cmd {
                        HandlerCommand::Authorize { frame } => {
                            self.queue.enqueue_auth(frame);
                            self.flush();
                        }
                        HandlerCommand::Send { frame } => {
                            self.queue.enqueue(frame);
                            self.flush();
                        }
                        HandlerCommand::CredentialFailure { message } => {
                            self.events
                                .dispatch_error(&TradingViewWsError::Credential(message));
                        }
                        HandlerCommand::Disconnect => {
                            self.close_transport();
                        }
                    }
                }

                event = self.raw_rx.recv() => {
                    match event {
                        Some(TransportEvent::Open) => {
                            self.queue.mark_connected();
                            self.events.dispatch(EventChannel::Connected, &[]);
                            self.flush();
                        }
                        Some(TransportEvent::Text(text)) => {
                            self.handle_text(&text);
                        }
                        Some(TransportEvent::ControlPing(data)) => {
                            let _ = self.out_tx.send(Message::Pong(data.into()));
                        }
                        Some(TransportEvent::Error(msg)) => {
                            // Reported exactly once; no state change here, the
                            // reader closes the channel if the socket dies.
                            self.events
                                .dispatch_error(&TradingViewWsError::Transport(msg));
                        }
                        None => {
                            self.on_transport_closed();
                            return;
                        }
                    }
                }

                else => {
                    self.on_transport_closed();
                    return;
                }
            }
        }
    }

    fn handle_text(&mut self, text: &str) {
        if self.debug {
            tracing::debug!("<- {text}");
        }

        for result in codec::decode_frames(text) {
            match result {
                Ok(frame) => {
                    if self.apply(&frame) == BatchControl::Stop {
                        break;
                    }
                }
                Err(e) => self.events.dispatch_error(&e),
            }
        }
    }

    fn apply(&mut self, frame: &Frame) -> BatchControl {
        match route_frame(frame, &self.sessions, self.queue.is_authenticated()) {
            RoutingOutcome::Ping { n, reply } => {
                // Pong bypasses the queue: the socket is demonstrably open
                // and keepalives must not wait on authentication.
                if self.debug {
                    tracing::debug!("-> {reply}");
                }
                let _ = self.out_tx.send(Message::Text(reply.into()));
                self.events.dispatch(EventChannel::Ping, &[Value::from(n)]);
            }
            RoutingOutcome::FatalProtocolError(payload) => {
                let detail = Value::Array(payload).to_string();
                self.events
                    .dispatch_error(&TradingViewWsError::Protocol(detail));
                self.close_transport();
                return BatchControl::Stop;
            }
            RoutingOutcome::Session(key) => {
                if let Frame::Message { kind, payload } = frame {
                    // Snapshot the handler so delivery does not hold the map entry
                    let handler = self.sessions.get(&key).map(|e| Arc::clone(e.value()));
                    if let Some(handler) = handler {
                        handler.on_data(SessionMessage {
                            kind: kind.clone(),
                            data: payload.clone(),
                        });
                    } else {
                        tracing::debug!("Session {key} unregistered during routing");
                    }
                }
            }
            RoutingOutcome::Logged => {
                if let Frame::Message { kind, payload } = frame {
                    self.dispatch_frame(EventChannel::Logged, kind, payload);
                }
            }
            RoutingOutcome::Data => {
                if let Frame::Message { kind, payload } = frame {
                    self.dispatch_frame(EventChannel::Data, kind, payload);
                }
            }
        }

        BatchControl::Continue
    }

    // Observers on both channels receive the full frame as one JSON envelope
    fn dispatch_frame(&self, channel: EventChannel, kind: &str, payload: &[Value]) {
        let wire = WireMessage {
            m: kind.to_string(),
            p: payload.to_vec(),
        };
        match serde_json::to_value(&wire) {
            Ok(value) => self.events.dispatch(channel, &[value]),
            Err(e) => self
                .events
                .dispatch_error(&TradingViewWsError::Json(e.to_string())),
        }
    }

    fn flush(&mut self) {
        for frame in self.queue.drain_ready() {
            if self.debug {
                tracing::debug!("-> {frame}");
            }
            if self.out_tx.send(Message::Text(frame.into())).is_err() {
                // Writer gone: the transport is permanently closed and flush
                // attempts become silent no-ops.
                self.queue.mark_closed();
                return;
            }
        }
    }

    fn close_transport(&mut self) {
        let _ = self.out_tx.send(Message::Close(None));
    }

    fn on_transport_closed(&mut self) {
        if !self.queue.is_closed() {
            self.queue.mark_closed();
            self.events.dispatch(EventChannel::Disconnected, &[]);
        }
    }
}

#[derive(Debug, PartialEq)]
enum BatchControl {
    Continue,
    Stop,
}

#[cfg(test)]
mod tests {
    use std::{
        sync::Mutex,
        time::Duration,
    };

    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::{events::EventCallback, websocket::codec::encode_message};

    struct RecordingSession {
        received: Mutex<Vec<SessionMessage>>,
    }

    impl RecordingSession {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                received: Mutex::new(Vec::new()),
            })
        }
    }

    impl SessionHandler for RecordingSession {
        fn on_data(&self, message: SessionMessage) {
            self.received.lock().unwrap().push(message);
        }
    }

    fn registry_with(
        key: &str,
        session: Arc<RecordingSession>,
    ) -> Arc<DashMap<String, Arc<dyn SessionHandler>>> {
        let sessions: Arc<DashMap<String, Arc<dyn SessionHandler>>> = Arc::new(DashMap::new());
        sessions.insert(key.to_string(), session as Arc<dyn SessionHandler>);
        sessions
    }

    fn message_frame(kind: &str, payload: Vec<Value>) -> Frame {
        Frame::Message {
            kind: kind.to_string(),
            payload,
        }
    }

    #[rstest]
    fn test_route_ping_yields_reply() {
        let sessions: DashMap<String, Arc<dyn SessionHandler>> = DashMap::new();
        let outcome = route_frame(&Frame::Ping(123), &sessions, true);
        assert_eq!(
            outcome,
            RoutingOutcome::Ping {
                n: 123,
                reply: "~m~6~m~~h~123".to_string(),
            }
        );
    }

    #[rstest]
    fn test_route_protocol_error_is_fatal() {
        let sessions: DashMap<String, Arc<dyn SessionHandler>> = DashMap::new();
        let frame = message_frame("protocol_error", vec![json!("bad session")]);
        let outcome = route_frame(&frame, &sessions, true);
        assert_eq!(
            outcome,
            RoutingOutcome::FatalProtocolError(vec![json!("bad session")])
        );
    }

    #[rstest]
    fn test_route_registered_session_key() {
        let sessions = registry_with("qs_1", RecordingSession::new());
        let frame = message_frame("qsd", vec![json!("qs_1"), json!({"lp": 1})]);
        assert_eq!(
            route_frame(&frame, &sessions, true),
            RoutingOutcome::Session("qs_1".to_string())
        );
    }

    #[rstest]
    #[case(false, RoutingOutcome::Logged)]
    #[case(true, RoutingOutcome::Data)]
    fn test_route_unmatched_depends_on_auth_state(
        #[case] authenticated: bool,
        #[case] expected: RoutingOutcome,
    ) {
        let sessions: DashMap<String, Arc<dyn SessionHandler>> = DashMap::new();
        let frame = message_frame("quote_completed", vec![json!("other")]);
        assert_eq!(route_frame(&frame, &sessions, authenticated), expected);
    }

    #[rstest]
    fn test_route_non_string_first_payload_falls_through() {
        let sessions = registry_with("qs_1", RecordingSession::new());
        let frame = message_frame("qsd", vec![json!(42)]);
        assert_eq!(route_frame(&frame, &sessions, true), RoutingOutcome::Data);
    }

    // Async feed-handler tests below drive the full task through its channels.

    struct Harness {
        cmd_tx: tokio::sync::mpsc::UnboundedSender<HandlerCommand>,
        raw_tx: tokio::sync::mpsc::UnboundedSender<TransportEvent>,
        out_rx: tokio::sync::mpsc::UnboundedReceiver<Message>,
        events: Arc<EventDispatcher>,
        task: tokio::task::JoinHandle<()>,
    }

    fn spawn_handler(sessions: Arc<DashMap<String, Arc<dyn SessionHandler>>>) -> Harness {
        let (cmd_tx, cmd_rx) = tokio::sync::mpsc::unbounded_channel();
        let (raw_tx, raw_rx) = tokio::sync::mpsc::unbounded_channel();
        let (out_tx, out_rx) = tokio::sync::mpsc::unbounded_channel();
        let events = Arc::new(EventDispatcher::new());

        let handler = FeedHandler::new(
            cmd_rx,
            raw_rx,
            out_tx,
            sessions,
            Arc::clone(&events),
            false,
        );
        let task = tokio::spawn(handler.run());

        Harness {
            cmd_tx,
            raw_tx,
            out_rx,
            events,
            task,
        }
    }

    fn record_channel(
        events: &EventDispatcher,
        channel: EventChannel,
    ) -> Arc<Mutex<Vec<Vec<Value>>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let cloned = Arc::clone(&log);
        let callback: EventCallback = Box::new(move |args| {
            cloned.lock().unwrap().push(args.to_vec());
        });
        events.register(channel, callback);
        log
    }

    async fn next_out(out_rx: &mut tokio::sync::mpsc::UnboundedReceiver<Message>) -> Message {
        tokio::time::timeout(Duration::from_secs(1), out_rx.recv())
            .await
            .expect("timed out waiting for outbound frame")
            .expect("outbound channel closed")
    }

    fn as_text(msg: Message) -> String {
        match msg {
            Message::Text(text) => text.to_string(),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    #[rstest]
    #[tokio::test]
    async fn test_auth_frame_precedes_sends_queued_while_pending() {
        let sessions = Arc::new(DashMap::new());
        let mut harness = spawn_handler(sessions);

        harness.raw_tx.send(TransportEvent::Open).unwrap();
        harness
            .cmd_tx
            .send(HandlerCommand::Send {
                frame: "~m~2~m~s1".to_string(),
            })
            .unwrap();
        harness
            .cmd_tx
            .send(HandlerCommand::Send {
                frame: "~m~2~m~s2".to_string(),
            })
            .unwrap();
        harness
            .cmd_tx
            .send(HandlerCommand::Authorize {
                frame: "~m~4~m~auth".to_string(),
            })
            .unwrap();

        assert_eq!(as_text(next_out(&mut harness.out_rx).await), "~m~4~m~auth");
        assert_eq!(as_text(next_out(&mut harness.out_rx).await), "~m~2~m~s1");
        assert_eq!(as_text(next_out(&mut harness.out_rx).await), "~m~2~m~s2");

        harness.task.abort();
    }

    #[rstest]
    #[tokio::test]
    async fn test_ping_replies_and_notifies() {
        let sessions = Arc::new(DashMap::new());
        let mut harness = spawn_handler(sessions);
        let pings = record_channel(&harness.events, EventChannel::Ping);

        harness
            .raw_tx
            .send(TransportEvent::Text("~m~3~m~123".to_string()))
            .unwrap();

        assert_eq!(as_text(next_out(&mut harness.out_rx).await), "~m~6~m~~h~123");
        assert_eq!(*pings.lock().unwrap(), vec![vec![json!(123)]]);

        harness.task.abort();
    }

    #[rstest]
    #[tokio::test]
    async fn test_session_delivery_is_exclusive() {
        let session = RecordingSession::new();
        let sessions = registry_with("qs_1", Arc::clone(&session));
        let mut harness = spawn_handler(sessions);
        let data_events = record_channel(&harness.events, EventChannel::Data);

        // Authenticate so unmatched frames land on the data channel; the
        // flushed auth frame confirms the handler processed the command
        harness.raw_tx.send(TransportEvent::Open).unwrap();
        harness
            .cmd_tx
            .send(HandlerCommand::Authorize {
                frame: "~m~4~m~auth".to_string(),
            })
            .unwrap();
        assert_eq!(as_text(next_out(&mut harness.out_rx).await), "~m~4~m~auth");

        let batch = format!(
            "{}{}{}",
            encode_message("qsd", &[json!("qs_1"), json!({"lp": 42.5})]).unwrap(),
            encode_message("quote_completed", &[json!("full_symbol")]).unwrap(),
            "~m~1~m~1",
        );
        harness.raw_tx.send(TransportEvent::Text(batch)).unwrap();

        // The trailing ping reply confirms the whole batch was processed
        assert_eq!(as_text(next_out(&mut harness.out_rx).await), "~m~4~m~~h~1");

        let received = session.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].kind, "qsd");
        assert_eq!(received[0].data, vec![json!("qs_1"), json!({"lp": 42.5})]);

        // Only the unmatched frame surfaced as generic data
        let data = data_events.lock().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(
            data[0],
            vec![json!({"m": "quote_completed", "p": ["full_symbol"]})]
        );

        harness.task.abort();
    }

    #[rstest]
    #[tokio::test]
    async fn test_first_unmatched_frame_before_auth_is_logged() {
        let sessions = Arc::new(DashMap::new());
        let mut harness = spawn_handler(sessions);
        let logged = record_channel(&harness.events, EventChannel::Logged);
        let data_events = record_channel(&harness.events, EventChannel::Data);

        let batch = format!(
            "{}{}",
            encode_message("session_ack", &[json!({"user": "anon"})]).unwrap(),
            "~m~1~m~2",
        );
        harness.raw_tx.send(TransportEvent::Text(batch)).unwrap();
        assert_eq!(as_text(next_out(&mut harness.out_rx).await), "~m~4~m~~h~2");

        assert_eq!(
            *logged.lock().unwrap(),
            vec![vec![json!({"m": "session_ack", "p": [{"user": "anon"}]})]]
        );
        assert!(data_events.lock().unwrap().is_empty());

        harness.task.abort();
    }

    #[rstest]
    #[tokio::test]
    async fn test_fatal_protocol_error_closes_and_stops_batch() {
        let session = RecordingSession::new();
        let sessions = registry_with("qs_1", Arc::clone(&session));
        let mut harness = spawn_handler(sessions);
        let errors = record_channel(&harness.events, EventChannel::Error);

        let batch = format!(
            "{}{}",
            encode_message("protocol_error", &[json!("bad session")]).unwrap(),
            encode_message("qsd", &[json!("qs_1"), json!({"lp": 1})]).unwrap(),
        );
        harness.raw_tx.send(TransportEvent::Text(batch)).unwrap();

        assert!(matches!(
            next_out(&mut harness.out_rx).await,
            Message::Close(None)
        ));

        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0], vec![json!("Protocol error: [\"bad session\"]")]);

        // The frame after the fatal error was never routed
        assert!(session.received.lock().unwrap().is_empty());

        harness.task.abort();
    }

    #[rstest]
    #[tokio::test]
    async fn test_transport_close_emits_disconnected_once() {
        let sessions = Arc::new(DashMap::new());
        let harness = spawn_handler(sessions);
        let connected = record_channel(&harness.events, EventChannel::Connected);
        let disconnected = record_channel(&harness.events, EventChannel::Disconnected);

        harness.raw_tx.send(TransportEvent::Open).unwrap();
        drop(harness.raw_tx);
        drop(harness.cmd_tx);

        tokio::time::timeout(Duration::from_secs(1), harness.task)
            .await
            .expect("handler did not shut down")
            .unwrap();

        assert_eq!(connected.lock().unwrap().len(), 1);
        assert_eq!(disconnected.lock().unwrap().len(), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn test_decode_error_surfaces_and_batch_continues() {
        let sessions = Arc::new(DashMap::new());
        let mut harness = spawn_handler(sessions);
        let errors = record_channel(&harness.events, EventChannel::Error);

        harness
            .raw_tx
            .send(TransportEvent::Text("~m~xjunk~m~1~m~4".to_string()))
            .unwrap();

        assert_eq!(as_text(next_out(&mut harness.out_rx).await), "~m~4~m~~h~4");
        assert_eq!(errors.lock().unwrap().len(), 1);

        harness.task.abort();
    }

    #[rstest]
    #[tokio::test]
    async fn test_credential_failure_reported_queue_never_flushes() {
        let sessions = Arc::new(DashMap::new());
        let mut harness = spawn_handler(sessions);
        let errors = record_channel(&harness.events, EventChannel::Error);

        harness.raw_tx.send(TransportEvent::Open).unwrap();
        harness
            .cmd_tx
            .send(HandlerCommand::Send {
                frame: "~m~2~m~s1".to_string(),
            })
            .unwrap();
        harness
            .cmd_tx
            .send(HandlerCommand::CredentialFailure {
                message: "exchange rejected".to_string(),
            })
            .unwrap();
        // A ping still gets answered; queued sends stay gated
        harness
            .raw_tx
            .send(TransportEvent::Text("~m~1~m~8".to_string()))
            .unwrap();

        assert_eq!(as_text(next_out(&mut harness.out_rx).await), "~m~4~m~~h~8");
        assert_eq!(errors.lock().unwrap().len(), 1);
        assert!(harness.out_rx.try_recv().is_err());

        harness.task.abort();
    }
}
