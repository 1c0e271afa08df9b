//! Archiver Integration
//!
//! Boundary to the external time-series store ("archiver") that holds both
//! sensor metadata and windowed statistics.
//!
//! ## Architecture
//!
//! - **MetadataResolver**: resolves candidate sensor streams with their attributes
//! - **StatisticsResolver**: resolves min/mean/max/count per stream for a window
//! - **HttpArchiver**: REST client implementing both resolvers
//! - **Queries**: typed selectors rendered into the archiver's query language
//!
//! The snapshot engine only depends on the two resolver traits, so tests and
//! alternative transports can plug in their own implementations.

mod client;
mod error;
mod query;

pub use client::{ArchiverConfig, HttpArchiver};
pub use error::ArchiverError;
pub use query::{MetadataQuery, StatisticsQuery};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Resolves sensor streams matching a metadata selector
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    /// Return every stream the selector matches, with its attribute bag
    async fn resolve_entities(&self, query: &MetadataQuery)
        -> Result<Vec<MetadataItem>, ArchiverError>;
}

/// Resolves windowed aggregates for a set of streams
#[async_trait]
pub trait StatisticsResolver: Send + Sync {
    /// Return the aggregates for the requested streams over the query window
    async fn resolve_statistics(
        &self,
        query: &StatisticsQuery,
    ) -> Result<Vec<StatisticsItem>, ArchiverError>;
}

/// One stream as described by the archiver's metadata store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataItem {
    /// Stream identifier
    #[serde(rename = "uuid")]
    pub stream_id: String,
    /// Slash-delimited hierarchical path of the stream
    pub path: String,
    /// Free-form attribute bag
    #[serde(rename = "metadata", default)]
    pub attributes: HashMap<String, serde_json::Value>,
}

impl MetadataItem {
    /// Create an item with an empty attribute bag
    pub fn new(stream_id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
            path: path.into(),
            attributes: HashMap::new(),
        }
    }

    /// Builder method: add a string attribute
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes
            .insert(key.into(), serde_json::Value::String(value.into()));
        self
    }

    /// Builder method: add an attribute of any JSON shape
    pub fn raw_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Typed lookup of a string attribute
    pub fn string_attribute(&self, key: &str) -> Attribute<&str> {
        match self.attributes.get(key) {
            None => Attribute::Absent,
            Some(serde_json::Value::String(s)) => Attribute::Present(s.as_str()),
            Some(_) => Attribute::WrongShape,
        }
    }
}

/// Outcome of looking up an attribute in a metadata bag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute<T> {
    /// The key is not in the bag
    Absent,
    /// The key is present but its value has an unexpected type
    WrongShape,
    /// The key is present with the expected type
    Present(T),
}

/// Aggregates for one stream, as parallel per-bucket arrays
///
/// The snapshot engine requests a single bucket spanning the whole window,
/// so only index 0 is consumed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticsItem {
    /// Stream identifier
    #[serde(rename = "uuid")]
    pub stream_id: String,
    #[serde(default)]
    pub min: Vec<f64>,
    #[serde(default)]
    pub mean: Vec<f64>,
    #[serde(default)]
    pub max: Vec<f64>,
    #[serde(default)]
    pub count: Vec<u64>,
}

impl StatisticsItem {
    /// Create a single-bucket statistics item
    pub fn single(stream_id: impl Into<String>, min: f64, mean: f64, max: f64, count: u64) -> Self {
        Self {
            stream_id: stream_id.into(),
            min: vec![min],
            mean: vec![mean],
            max: vec![max],
            count: vec![count],
        }
    }

    /// Number of buckets carried by every array
    pub fn points(&self) -> usize {
        self.min
            .len()
            .min(self.mean.len())
            .min(self.max.len())
            .min(self.count.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_attribute_lookup() {
        let item = MetadataItem::new("u1", "a/b/c/S1/d/e/f")
            .attribute("rcoords", "1.0,2.0")
            .raw_attribute("floor", json!(3));

        assert_eq!(item.string_attribute("rcoords"), Attribute::Present("1.0,2.0"));
        assert_eq!(item.string_attribute("floor"), Attribute::WrongShape);
        assert_eq!(item.string_attribute("missing"), Attribute::Absent);
    }

    #[test]
    fn test_metadata_item_wire_format() {
        let item: MetadataItem = serde_json::from_value(json!({
            "uuid": "u1",
            "path": "ns/sensors/s.hamilton/S1/i.temperature/signal/operative",
            "metadata": { "rcoords": "1.0,2.0", "_name": "air_temp" }
        }))
        .unwrap();

        assert_eq!(item.stream_id, "u1");
        assert_eq!(item.string_attribute("_name"), Attribute::Present("air_temp"));
    }

    #[test]
    fn test_statistics_points() {
        let item = StatisticsItem::single("u1", 1.0, 2.0, 3.0, 4);
        assert_eq!(item.points(), 1);

        let ragged = StatisticsItem {
            stream_id: "u2".to_string(),
            min: vec![1.0],
            mean: vec![1.0, 2.0],
            max: vec![],
            count: vec![1],
        };
        assert_eq!(ragged.points(), 0);
        assert_eq!(StatisticsItem::default().points(), 0);
    }
}
