//! Stroke segments, the unit of paint exchanged between clients.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Key under which clients tag the strokes they author.
pub const ORIGIN_ID_KEY: &str = "originId";

/// One straight line painted between two points.
///
/// Numbers are kept as JSON numbers rather than `f64` so a forwarded segment
/// carries exactly the representation the client sent (`10` stays `10`).
/// A `serde_json::Number` is always finite, and the color is always four
/// components, so a value of this type is well formed by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeSegment {
    pub x1: Number,
    pub y1: Number,
    pub x2: Number,
    pub y2: Number,
    /// Stroke thickness.
    #[serde(rename = "w")]
    pub weight: Number,
    /// `[r, g, b, a]`. Range is the client's business.
    #[serde(rename = "c")]
    pub color: [Number; 4],
    /// Fields the relay does not interpret, forwarded untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StrokeSegment {
    /// Build a segment from floating point parts.
    ///
    /// Returns `None` if any coordinate or the weight is not finite.
    pub fn new(start: (f64, f64), end: (f64, f64), weight: f64, color: [u8; 4]) -> Option<Self> {
        Some(Self {
            x1: Number::from_f64(start.0)?,
            y1: Number::from_f64(start.1)?,
            x2: Number::from_f64(end.0)?,
            y2: Number::from_f64(end.1)?,
            weight: Number::from_f64(weight)?,
            color: color.map(Number::from),
            extra: Map::new(),
        })
    }

    /// Tag the segment with the id of the client that painted it.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.extra
            .insert(ORIGIN_ID_KEY.to_string(), Value::String(origin.into()));
        self
    }

    /// The authoring client's id, if the client sent a string one.
    pub fn origin_id(&self) -> Option<&str> {
        self.extra.get(ORIGIN_ID_KEY).and_then(Value::as_str)
    }

    /// Encode as a single JSON object, the form stored and replayed.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
