//! Archiver Query Selectors
//!
//! Typed descriptions of the two queries the snapshot engine issues, rendered
//! into the archiver's textual query language only at the transport edge.

use serde::{Deserialize, Serialize};

/// Selects every tracked sensor stream that carries a coordinate attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataQuery {
    /// Attribute that must be present on every selected stream
    pub coordinate_attribute: String,
    /// Path pattern (archiver `like` syntax) of the tracked sensors
    pub path_pattern: String,
}

impl MetadataQuery {
    pub fn new(coordinate_attribute: impl Into<String>, path_pattern: impl Into<String>) -> Self {
        Self {
            coordinate_attribute: coordinate_attribute.into(),
            path_pattern: path_pattern.into(),
        }
    }

    /// Render as archiver query text
    pub fn render(&self) -> String {
        format!(
            r#"select * where has {} and path like "{}""#,
            self.coordinate_attribute, self.path_pattern
        )
    }
}

/// One batched windowed statistics query over a set of streams
///
/// A single bucket as wide as the window is requested, so every stream gets
/// one aggregate covering the whole window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsQuery {
    /// Streams to aggregate, deduplicated and sorted
    pub stream_ids: Vec<String>,
    /// Window start in nanoseconds since the Unix epoch
    pub start_ns: i64,
    /// Window length in nanoseconds
    pub length_ns: i64,
}

impl StatisticsQuery {
    pub fn new<I, S>(stream_ids: I, start_ns: i64, length_ns: i64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut stream_ids: Vec<String> = stream_ids.into_iter().map(Into::into).collect();
        stream_ids.sort();
        stream_ids.dedup();

        Self {
            stream_ids,
            start_ns,
            length_ns,
        }
    }

    /// Window end in nanoseconds since the Unix epoch
    pub fn end_ns(&self) -> i64 {
        self.start_ns.saturating_add(self.length_ns)
    }

    /// Render as archiver query text
    pub fn render(&self) -> String {
        let selector = self
            .stream_ids
            .iter()
            .map(|id| format!(r#"uuid = "{}""#, id))
            .collect::<Vec<_>>()
            .join(" or ");

        format!(
            "select window({}ns) data in ({}ns,{}ns) where {}",
            self.length_ns,
            self.start_ns,
            self.end_ns(),
            selector
        )
    }
}
