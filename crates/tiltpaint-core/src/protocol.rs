//! Wire protocol between the relay and its clients.
//!
//! Every frame is one JSON object tagged by `t`:
//! ```json
//! { "t": "init", "strokes": [ { "x1": 0, "y1": 0, "x2": 10, "y2": 10, "w": 8, "c": [0, 0, 0, 255] } ] }
//! { "t": "stroke", "s": { "x1": 0, "y1": 0, "x2": 10, "y2": 10, "w": 8, "c": [0, 0, 0, 255] } }
//! { "t": "clear" }
//! { "t": "players", "n": 3 }
//! ```

use crate::stroke::StrokeSegment;
use serde::{Deserialize, Serialize};

/// Messages sent to the relay.
///
/// Inbound frames are classified by [`crate::validate::classify`] rather than
/// deserialized into this type, so that malformed input is reported instead
/// of failing. This type is what well-behaved clients produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A freshly painted segment
    Stroke { s: StrokeSegment },
    /// Wipe the canvas for everyone
    Clear,
}

/// Messages sent by the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full history, sent once right after a client connects
    Init { strokes: Vec<StrokeSegment> },
    /// A segment accepted from some client
    Stroke { s: StrokeSegment },
    /// History was wiped
    Clear,
    /// Current number of connected clients
    Players { n: usize },
}

impl ServerMessage {
    /// Encode as a JSON text frame.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Build an `init` frame from segments that are already encoded.
///
/// Produces the same text as encoding [`ServerMessage::Init`] without
/// serializing the history again.
pub fn init_frame<S: AsRef<str>>(encoded: &[S]) -> String {
    let body: usize = encoded.iter().map(|s| s.as_ref().len() + 1).sum();
    let mut frame = String::with_capacity(body + 24);
    frame.push_str(r#"{"t":"init","strokes":["#);
    for (i, segment) in encoded.iter().enumerate() {
        if i > 0 {
            frame.push(',');
        }
        frame.push_str(segment.as_ref());
    }
    frame.push_str("]}");
    frame
}

impl ClientMessage {
    /// Encode as a JSON text frame.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn segment() -> StrokeSegment {
        serde_json::from_value(json!({"x1":0,"y1":0,"x2":10,"y2":10,"w":8,"c":[0,0,0,255]})).unwrap()
    }

    #[test]
    fn test_server_message_tags() {
        let init: Value = serde_json::from_str(
            &ServerMessage::Init { strokes: vec![] }.to_json().unwrap(),
        )
        .unwrap();
        assert_eq!(init, json!({"t": "init", "strokes": []}));

        let players: Value =
            serde_json::from_str(&ServerMessage::Players { n: 3 }.to_json().unwrap()).unwrap();
        assert_eq!(players, json!({"t": "players", "n": 3}));

        let clear: Value = serde_json::from_str(&ServerMessage::Clear.to_json().unwrap()).unwrap();
        assert_eq!(clear, json!({"t": "clear"}));
    }

    #[test]
    fn test_stroke_frame_shape() {
        let frame = ServerMessage::Stroke { s: segment() }.to_json().unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();

        assert_eq!(
            value,
            json!({"t": "stroke", "s": {"x1":0,"y1":0,"x2":10,"y2":10,"w":8,"c":[0,0,0,255]}})
        );
    }

    #[test]
    fn test_init_frame_matches_encoded_message() {
        let empty: [String; 0] = [];
        assert_eq!(
            init_frame(&empty),
            ServerMessage::Init { strokes: vec![] }.to_json().unwrap()
        );

        let strokes = vec![segment(), segment().with_origin("p1")];
        let encoded: Vec<String> = strokes
            .iter()
            .map(|s| serde_json::to_string(s).unwrap())
            .collect();
        assert_eq!(
            init_frame(&encoded),
            ServerMessage::Init { strokes }.to_json().unwrap()
        );
    }

    #[test]
    fn test_client_message_decodes() {
        let msg: ClientMessage = serde_json::from_str(r#"{"t":"clear"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Clear);

        let text = ClientMessage::Stroke { s: segment() }.to_json().unwrap();
        let msg: ClientMessage = serde_json::from_str(&text).unwrap();
        assert_eq!(msg, ClientMessage::Stroke { s: segment() });
    }
}
