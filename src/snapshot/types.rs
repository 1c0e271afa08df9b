//! Core data types for sensor snapshots
//!
//! - `WindowKey`: the (start, length) pair identifying a cached snapshot
//! - `StatSample`: one stream's aggregate over a window
//! - `Quantity`: the closed set of tracked physical quantities
//! - `EntityRecord`: one sensor with its per-quantity slots
//! - `Snapshot`: the complete, immutable answer for one window

use chrono::{DateTime, Duration, Utc};
use serde::ser::{Serialize, Serializer};
use std::collections::BTreeMap;

use super::error::WindowError;

/// Cache key for one requested window
///
/// Stored as nanoseconds so equality is exact and the end of the window is
/// known to be representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowKey {
    start_ns: i64,
    length_ns: i64,
}

impl WindowKey {
    /// Validate and build a key from a start instant and a length
    pub fn new(start: DateTime<Utc>, length: Duration) -> Result<Self, WindowError> {
        let start_ns = start
            .timestamp_nanos_opt()
            .ok_or_else(|| WindowError::OutOfRange(start.to_rfc3339()))?;
        let length_ns = length
            .num_nanoseconds()
            .ok_or_else(|| WindowError::OutOfRange(format!("length {}", length)))?;

        Self::from_nanos(start_ns, length_ns)
    }

    /// Validate and build a key from raw nanosecond values
    pub fn from_nanos(start_ns: i64, length_ns: i64) -> Result<Self, WindowError> {
        if length_ns <= 0 {
            return Err(WindowError::NonPositiveLength(length_ns));
        }
        start_ns
            .checked_add(length_ns)
            .ok_or_else(|| WindowError::OutOfRange(format!("{}ns + {}ns", start_ns, length_ns)))?;

        Ok(Self {
            start_ns,
            length_ns,
        })
    }

    /// Window start in nanoseconds since the Unix epoch
    pub fn start_ns(&self) -> i64 {
        self.start_ns
    }

    /// Window length in nanoseconds (always positive)
    pub fn length_ns(&self) -> i64 {
        self.length_ns
    }

    /// Window end in nanoseconds since the Unix epoch
    pub fn end_ns(&self) -> i64 {
        // checked in from_nanos
        self.start_ns + self.length_ns
    }

    pub fn start(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.start_ns)
    }

    pub fn end(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.end_ns())
    }

    pub fn length(&self) -> Duration {
        Duration::nanoseconds(self.length_ns)
    }
}

impl std::fmt::Display for WindowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, +{}s)", self.start().to_rfc3339(), self.length().num_seconds())
    }
}

/// Aggregate of one stream over a window
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StatSample {
    pub min: f64,
    pub mean: f64,
    pub max: f64,
    /// Number of raw readings behind the aggregate
    pub count: u64,
}

impl StatSample {
    pub fn new(min: f64, mean: f64, max: f64, count: u64) -> Self {
        Self {
            min,
            mean,
            max,
            count,
        }
    }
}

/// Physical quantity tracked per sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Quantity {
    Temperature,
    Humidity,
    Presence,
    Illuminance,
}

/// Archiver stream names and the quantity each one measures
const STREAM_NAMES: &[(&str, Quantity)] = &[
    ("air_temp", Quantity::Temperature),
    ("air_rh", Quantity::Humidity),
    ("presence", Quantity::Presence),
    ("lux", Quantity::Illuminance),
];

impl Quantity {
    /// Get all quantities for iteration
    pub fn all() -> &'static [Quantity] {
        &[
            Quantity::Temperature,
            Quantity::Humidity,
            Quantity::Presence,
            Quantity::Illuminance,
        ]
    }

    /// Map an archiver stream name to a quantity; unknown names are ignored
    pub fn from_stream_name(name: &str) -> Option<Quantity> {
        STREAM_NAMES
            .iter()
            .find(|(stream_name, _)| *stream_name == name)
            .map(|(_, quantity)| *quantity)
    }

    fn index(self) -> usize {
        match self {
            Quantity::Temperature => 0,
            Quantity::Humidity => 1,
            Quantity::Presence => 2,
            Quantity::Illuminance => 3,
        }
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Quantity::Temperature => write!(f, "temperature"),
            Quantity::Humidity => write!(f, "humidity"),
            Quantity::Presence => write!(f, "presence"),
            Quantity::Illuminance => write!(f, "illuminance"),
        }
    }
}

/// Stream assignment and joined statistics for one quantity of a sensor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuantitySlot {
    pub stream_id: Option<String>,
    pub sample: Option<StatSample>,
}

impl QuantitySlot {
    /// The sample, or all zeros with a zero count when absent
    pub fn sample_or_zero(&self) -> StatSample {
        self.sample.unwrap_or_default()
    }
}

/// One physical sensor in a snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub id: String,
    pub x: f64,
    pub y: f64,
    slots: [QuantitySlot; 4],
}

impl EntityRecord {
    pub fn new(id: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            slots: Default::default(),
        }
    }

    pub fn slot(&self, quantity: Quantity) -> &QuantitySlot {
        &self.slots[quantity.index()]
    }

    pub fn slot_mut(&mut self, quantity: Quantity) -> &mut QuantitySlot {
        &mut self.slots[quantity.index()]
    }

    /// Stream identifier resolved for a quantity
    pub fn stream_id(&self, quantity: Quantity) -> Option<&str> {
        self.slot(quantity).stream_id.as_deref()
    }

    /// Joined sample for a quantity
    pub fn sample(&self, quantity: Quantity) -> Option<&StatSample> {
        self.slot(quantity).sample.as_ref()
    }

    /// Iterate over quantities with a resolved stream identifier
    pub fn streams(&self) -> impl Iterator<Item = (Quantity, &str)> {
        Quantity::all()
            .iter()
            .filter_map(move |q| self.stream_id(*q).map(|id| (*q, id)))
    }
}

/// Wire form of an `EntityRecord`
///
/// Presence only publishes mean and count; stream identifiers are internal.
#[derive(serde::Serialize)]
struct EntityRecordWire<'a> {
    #[serde(rename = "ID")]
    id: &'a str,
    rcoord_x: f64,
    rcoord_y: f64,
    temp_min: f64,
    temp_max: f64,
    temp_mean: f64,
    temp_count: u64,
    humidity_min: f64,
    humidity_mean: f64,
    humidity_max: f64,
    humidity_count: u64,
    presence_mean: f64,
    presence_count: u64,
    lux_min: f64,
    lux_mean: f64,
    lux_max: f64,
    lux_count: u64,
}

impl Serialize for EntityRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let temp = self.slot(Quantity::Temperature).sample_or_zero();
        let humidity = self.slot(Quantity::Humidity).sample_or_zero();
        let presence = self.slot(Quantity::Presence).sample_or_zero();
        let lux = self.slot(Quantity::Illuminance).sample_or_zero();

        EntityRecordWire {
            id: &self.id,
            rcoord_x: self.x,
            rcoord_y: self.y,
            temp_min: temp.min,
            temp_max: temp.max,
            temp_mean: temp.mean,
            temp_count: temp.count,
            humidity_min: humidity.min,
            humidity_mean: humidity.mean,
            humidity_max: humidity.max,
            humidity_count: humidity.count,
            presence_mean: presence.mean,
            presence_count: presence.count,
            lux_min: lux.min,
            lux_mean: lux.mean,
            lux_max: lux.max,
            lux_count: lux.count,
        }
        .serialize(serializer)
    }
}

/// The complete answer for one window
///
/// Never mutated after construction; shared behind `Arc` by the cache.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Snapshot {
    /// Window start in nanoseconds since the Unix epoch
    pub window_start: i64,
    /// Window length in nanoseconds
    pub window_length: u64,
    /// Sensors keyed by identity
    pub data: BTreeMap<String, EntityRecord>,
}

impl Snapshot {
    pub fn new(key: WindowKey, data: BTreeMap<String, EntityRecord>) -> Self {
        Self {
            window_start: key.start_ns(),
            window_length: key.length_ns() as u64,
            data,
        }
    }

    /// The cache key this snapshot answers
    pub fn key(&self) -> Option<WindowKey> {
        WindowKey::from_nanos(self.window_start, self.window_length as i64).ok()
    }

    /// Serialize as single-space indented JSON
    ///
    /// Every line after the first carries one extra leading space, so nested
    /// lines are indented by `1 + depth` spaces and the closing brace by one.
    pub fn to_json_pretty(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut buf = Vec::with_capacity(256 + self.data.len() * 512);
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)?;
        Ok(prefix_lines(&buf))
    }
}

/// Insert a space after every newline
///
/// Encoded JSON strings never contain a raw newline, so only layout newlines
/// are affected.
fn prefix_lines(encoded: &[u8]) -> Vec<u8> {
    let newlines = encoded.iter().filter(|&&b| b == b'\n').count();
    let mut out = Vec::with_capacity(encoded.len() + newlines);
    for &byte in encoded {
        out.push(byte);
        if byte == b'\n' {
            out.push(b' ');
        }
    }
    out
}
