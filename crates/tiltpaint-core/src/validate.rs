//! Classification of inbound frames.
//!
//! Clients are untrusted, so nothing here fails: every input maps to an
//! [`Inbound`], and anything that is not a well formed stroke or clear comes
//! back as [`Inbound::Unrecognized`] with the reason attached for logging.

use crate::stroke::StrokeSegment;
use serde_json::{Map, Number, Value};
use thiserror::Error;

/// What an inbound frame turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A well formed segment, with every field the client sent
    Stroke(StrokeSegment),
    /// Request to wipe the canvas
    Clear,
    /// Anything else; dropped by the relay
    Unrecognized(Rejection),
}

/// Why a frame was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("frame is not valid JSON")]
    Malformed,
    #[error("frame is not a JSON object")]
    NotAnObject,
    #[error("frame has no string \"t\" tag")]
    MissingTag,
    #[error("unknown frame tag {0:?}")]
    UnknownTag(String),
    #[error("stroke frame has no \"s\" segment")]
    MissingSegment,
    #[error("segment is not a JSON object")]
    SegmentNotObject,
    #[error("segment field {0:?} is missing or not a number")]
    BadField(&'static str),
    #[error("segment color must be an array of exactly 4 numbers")]
    BadColor,
}

/// Classify a raw text frame.
pub fn classify(text: &str) -> Inbound {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => classify_value(&value),
        Err(_) => Inbound::Unrecognized(Rejection::Malformed),
    }
}

/// Classify an already decoded frame.
pub fn classify_value(value: &Value) -> Inbound {
    let Some(envelope) = value.as_object() else {
        return Inbound::Unrecognized(Rejection::NotAnObject);
    };
    let Some(tag) = envelope.get("t").and_then(Value::as_str) else {
        return Inbound::Unrecognized(Rejection::MissingTag);
    };

    match tag {
        "stroke" => match envelope.get("s") {
            Some(segment) => match validate_segment(segment) {
                Ok(segment) => Inbound::Stroke(segment),
                Err(rejection) => Inbound::Unrecognized(rejection),
            },
            None => Inbound::Unrecognized(Rejection::MissingSegment),
        },
        "clear" => Inbound::Clear,
        other => Inbound::Unrecognized(Rejection::UnknownTag(other.to_string())),
    }
}

/// Check the shape of a single segment object.
///
/// Also used when replaying persisted history, so a record that would not be
/// accepted live is never loaded either.
pub fn validate_segment(value: &Value) -> Result<StrokeSegment, Rejection> {
    let fields = value.as_object().ok_or(Rejection::SegmentNotObject)?;

    let x1 = number(fields, "x1")?;
    let y1 = number(fields, "y1")?;
    let x2 = number(fields, "x2")?;
    let y2 = number(fields, "y2")?;
    let weight = number(fields, "w")?;
    let color = color(fields)?;

    let extra = fields
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), "x1" | "y1" | "x2" | "y2" | "w" | "c"))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Ok(StrokeSegment {
        x1,
        y1,
        x2,
        y2,
        weight,
        color,
        extra,
    })
}

fn number(fields: &Map<String, Value>, key: &'static str) -> Result<Number, Rejection> {
    match fields.get(key) {
        Some(Value::Number(n)) => Ok(n.clone()),
        _ => Err(Rejection::BadField(key)),
    }
}

fn color(fields: &Map<String, Value>) -> Result<[Number; 4], Rejection> {
    let Some(Value::Array(components)) = fields.get("c") else {
        return Err(Rejection::BadColor);
    };
    match components.as_slice() {
        [Value::Number(r), Value::Number(g), Value::Number(b), Value::Number(a)] => {
            Ok([r.clone(), g.clone(), b.clone(), a.clone()])
        }
        _ => Err(Rejection::BadColor),
    }
}
