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

//! Length-prefixed frame codec for the TradingView wire format.
//!
//! Frames are wrapped as `~m~<L>~m~<payload>` where `L` is the exact byte
//! length of the payload. A payload that parses as a bare integer is an
//! application-level ping; anything else is the JSON envelope
//! `{"m": <type>, "p": [<args...>]}`.
//!
//! Decoding is tolerant: a malformed length prefix or unparseable payload
//! yields a [`TradingViewWsError::Decode`] in place of the frame and decoding
//! resumes at the next marker, so one bad frame never poisons the rest of a
//! batch.

use serde_json::Value;

use crate::{
    error::TradingViewWsError,
    websocket::messages::{Frame, WireMessage},
};

/// The frame delimiter marker.
pub const FRAME_MARKER: &str = "~m~";

/// The keepalive payload prefix used in pong replies.
pub const PING_PREFIX: &str = "~h~";

/// Wraps an already-serialized payload as `~m~<byte length>~m~<payload>`.
#[must_use]
pub fn encode_payload(payload: &str) -> String {
    format!("{FRAME_MARKER}{}{FRAME_MARKER}{payload}", payload.len())
}

/// Serializes a typed message with its argument payload and wraps it.
pub fn encode_message(kind: &str, payload: &[Value]) -> Result<String, TradingViewWsError> {
    let wire = WireMessage {
        m: kind.to_string(),
        p: payload.to_vec(),
    };
    let json = serde_json::to_string(&wire)?;
    Ok(encode_payload(&json))
}

/// Encodes the pong reply for the given ping counter.
#[must_use]
pub fn encode_ping_reply(n: i64) -> String {
    encode_payload(&format!("{PING_PREFIX}{n}"))
}

/// Decodes a buffer containing zero or more concatenated frames.
///
/// Frames are yielded strictly in wire order. Malformed frames are skipped
/// and reported in-place as `Err` entries.
pub fn decode_frames(input: &str) -> Vec<Result<Frame, TradingViewWsError>> {
    let mut frames = Vec::new();
    let mut cursor = 0;

    while let Some(offset) = input[cursor..].find(FRAME_MARKER) {
        let len_start = cursor + offset + FRAME_MARKER.len();

        let digits = input[len_start..]
            .bytes()
            .take_while(u8::is_ascii_digit)
            .count();
        if digits == 0 {
            frames.push(Err(TradingViewWsError::Decode(format!(
                "missing length prefix at byte {len_start}"
            ))));
            cursor = len_start;
            continue;
        }

        let length: usize = match input[len_start..len_start + digits].parse() {
            Ok(length) => length,
            Err(e) => {
                frames.push(Err(TradingViewWsError::Decode(format!(
                    "invalid length prefix at byte {len_start}: {e}"
                ))));
                cursor = len_start + digits;
                continue;
            }
        };

        let payload_marker = len_start + digits;
        if !input[payload_marker..].starts_with(FRAME_MARKER) {
            frames.push(Err(TradingViewWsError::Decode(format!(
                "missing payload marker at byte {payload_marker}"
            ))));
            cursor = payload_marker;
            continue;
        }

        let payload_start = payload_marker + FRAME_MARKER.len();
        let payload_end = match payload_start.checked_add(length) {
            Some(end) => end,
            None => {
                frames.push(Err(TradingViewWsError::Decode(format!(
                    "payload length {length} at byte {payload_start} overflows"
                ))));
                cursor = payload_start;
                continue;
            }
        };
        match input.get(payload_start..payload_end) {
            Some(payload) => {
                frames.push(decode_payload(payload));
                cursor = payload_start + length;
            }
            None => {
                // Truncated or length landing inside a UTF-8 sequence
                frames.push(Err(TradingViewWsError::Decode(format!(
                    "payload of length {length} at byte {payload_start} exceeds buffer"
                ))));
                cursor = payload_start;
            }
        }
    }

    frames
}

fn decode_payload(payload: &str) -> Result<Frame, TradingViewWsError> {
    if let Ok(n) = payload.parse::<i64>() {
        return Ok(Frame::Ping(n));
    }

    let wire: WireMessage = serde_json::from_str(payload).map_err(|e| {
        TradingViewWsError::Decode(format!("unparseable payload {payload:?}: {e}"))
    })?;
    Ok(wire.into())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn unwrap_frames(input: &str) -> Vec<Frame> {
        decode_frames(input)
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[rstest]
    fn test_encode_payload_uses_byte_length() {
        assert_eq!(encode_payload("hello"), "~m~5~m~hello");
        // Multibyte payloads are measured in bytes, not chars
        assert_eq!(encode_payload("é"), "~m~2~m~é");
    }

    #[rstest]
    fn test_round_trip_preserves_payload() {
        let payload = vec![json!("qs_1"), json!({"lp": 42.5, "volume": 1000})];
        let encoded = encode_message("qsd", &payload).unwrap();
        let frames = unwrap_frames(&encoded);

        assert_eq!(
            frames,
            vec![Frame::Message {
                kind: "qsd".to_string(),
                payload,
            }]
        );
    }

    #[rstest]
    fn test_ping_decode_and_reply() {
        let frames = unwrap_frames("~m~3~m~123");
        assert_eq!(frames, vec![Frame::Ping(123)]);
        assert_eq!(encode_ping_reply(123), "~m~6~m~~h~123");
    }

    #[rstest]
    fn test_batch_preserves_order() {
        let batch = format!(
            "{}{}{}",
            encode_message("a", &[json!(1)]).unwrap(),
            "~m~1~m~7",
            encode_message("b", &[json!(2)]).unwrap(),
        );
        let frames = unwrap_frames(&batch);

        assert_eq!(frames.len(), 3);
        assert!(matches!(&frames[0], Frame::Message { kind, .. } if kind == "a"));
        assert_eq!(frames[1], Frame::Ping(7));
        assert!(matches!(&frames[2], Frame::Message { kind, .. } if kind == "b"));
    }

    #[rstest]
    fn test_empty_and_markerless_input_decode_to_nothing() {
        assert!(decode_frames("").is_empty());
        assert!(decode_frames("no frames here").is_empty());
    }

    #[rstest]
    fn test_malformed_json_skipped_batch_continues() {
        let batch = format!("~m~8~m~{{not json{}", "~m~1~m~5");
        let results = decode_frames(&batch);

        assert_eq!(results.len(), 2);
        assert!(matches!(
            results[0],
            Err(TradingViewWsError::Decode(_))
        ));
        assert_eq!(results[1].as_ref().unwrap(), &Frame::Ping(5));
    }

    #[rstest]
    fn test_missing_length_prefix_reported_and_skipped() {
        let results = decode_frames("~m~xjunk~m~1~m~9");

        assert_eq!(results.len(), 2);
        assert!(matches!(
            results[0],
            Err(TradingViewWsError::Decode(_))
        ));
        assert_eq!(results[1].as_ref().unwrap(), &Frame::Ping(9));
    }

    #[rstest]
    fn test_truncated_payload_reported() {
        let results = decode_frames("~m~100~m~short");
        assert_eq!(results.len(), 1);
        assert!(matches!(
            results[0],
            Err(TradingViewWsError::Decode(_))
        ));
    }

    #[rstest]
    fn test_huge_length_prefix_reported_and_skipped() {
        // usize::MAX as a length prefix must not wrap the payload range
        let results = decode_frames("~m~18446744073709551615~m~x~m~1~m~6");

        assert_eq!(results.len(), 2);
        assert!(matches!(
            results[0],
            Err(TradingViewWsError::Decode(_))
        ));
        assert_eq!(results[1].as_ref().unwrap(), &Frame::Ping(6));
    }

    #[rstest]
    fn test_message_without_type_field_decodes_with_defaults() {
        let frames = unwrap_frames("~m~2~m~{}");
        assert_eq!(
            frames,
            vec![Frame::Message {
                kind: String::new(),
                payload: vec![],
            }]
        );
    }

    #[rstest]
    fn test_negative_ping_counter_decodes() {
        let frames = unwrap_frames("~m~2~m~-1");
        assert_eq!(frames, vec![Frame::Ping(-1)]);
    }
}
