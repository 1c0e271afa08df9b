//! Metadata/Statistics Join
//!
//! Turns the two independently fetched archiver result sets into one record
//! per sensor.
//!
//! # Metadata phase
//!
//! Every metadata item is validated on its own. Items with missing or
//! malformed coordinates, or a path that is not exactly
//! [`PATH_SEGMENTS`] segments long, are logged and skipped. Valid items are
//! grouped by the entity identity found at path segment [`ENTITY_SEGMENT`].
//!
//! Tie-break: the first valid item of an entity (in input order) supplies the
//! coordinates, and the first valid item naming a quantity claims that
//! quantity's slot. Later duplicates are ignored.
//!
//! # Statistics phase
//!
//! Each resolved stream identifier is matched against the statistics result
//! by equality. A slot receives a sample only if the match carries at least
//! one bucket.

use std::collections::{BTreeMap, HashMap};

use crate::archiver::{Attribute, MetadataItem, StatisticsItem};

use super::error::MalformedMetadataItem;
use super::types::{EntityRecord, Quantity, StatSample};

/// Number of segments in a tracked sensor path
pub const PATH_SEGMENTS: usize = 7;

/// Path segment holding the entity identity
pub const ENTITY_SEGMENT: usize = 3;

/// Attribute names the join reads from the metadata bag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataSchema {
    /// Attribute holding `"x,y"` coordinates
    pub coordinate_attribute: String,
    /// Attribute naming the quantity a stream measures
    pub name_attribute: String,
}

impl Default for MetadataSchema {
    fn default() -> Self {
        Self {
            coordinate_attribute: "rcoords".to_string(),
            name_attribute: "_name".to_string(),
        }
    }
}

/// Counters describing one join, for logging
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinReport {
    /// Metadata items that passed validation
    pub accepted: usize,
    /// Metadata items skipped as malformed
    pub skipped: usize,
    /// Slots that received a sample, per quantity
    pub samples: BTreeMap<Quantity, usize>,
}

impl JoinReport {
    pub fn samples_for(&self, quantity: Quantity) -> usize {
        self.samples.get(&quantity).copied().unwrap_or(0)
    }
}

/// A metadata item that passed validation
#[derive(Debug, Clone, PartialEq)]
struct ValidItem<'a> {
    entity_id: &'a str,
    x: f64,
    y: f64,
    quantity: Option<Quantity>,
    stream_id: &'a str,
}

fn validate<'a>(
    item: &'a MetadataItem,
    schema: &MetadataSchema,
) -> Result<ValidItem<'a>, MalformedMetadataItem> {
    let coords = match item.string_attribute(&schema.coordinate_attribute) {
        Attribute::Present(value) => value,
        Attribute::Absent => {
            return Err(MalformedMetadataItem::MissingAttribute {
                stream_id: item.stream_id.clone(),
                attribute: schema.coordinate_attribute.clone(),
            })
        }
        Attribute::WrongShape => {
            return Err(MalformedMetadataItem::WrongAttributeType {
                stream_id: item.stream_id.clone(),
                attribute: schema.coordinate_attribute.clone(),
            })
        }
    };

    let (x, y) = parse_coordinates(coords).ok_or_else(|| MalformedMetadataItem::BadCoordinates {
        stream_id: item.stream_id.clone(),
        value: coords.to_string(),
    })?;

    let entity_id = entity_from_path(&item.path).ok_or_else(|| MalformedMetadataItem::BadPath {
        stream_id: item.stream_id.clone(),
        path: item.path.clone(),
        expected: PATH_SEGMENTS,
    })?;

    // A missing or odd name only means the stream feeds no slot.
    let quantity = match item.string_attribute(&schema.name_attribute) {
        Attribute::Present(name) => Quantity::from_stream_name(name),
        _ => None,
    };

    Ok(ValidItem {
        entity_id,
        x,
        y,
        quantity,
        stream_id: &item.stream_id,
    })
}

/// Parse `"x,y"` into two floats
pub fn parse_coordinates(value: &str) -> Option<(f64, f64)> {
    let mut parts = value.split(',');
    let x = parts.next()?.trim().parse::<f64>().ok()?;
    let y = parts.next()?.trim().parse::<f64>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((x, y))
}

/// Extract the entity identity from a tracked sensor path
pub fn entity_from_path(path: &str) -> Option<&str> {
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() != PATH_SEGMENTS {
        return None;
    }
    Some(segments[ENTITY_SEGMENT])
}

/// Group valid metadata items into entity records with stream assignments
///
/// Malformed items are logged and skipped; the join never fails as a whole.
pub fn join_metadata(
    items: &[MetadataItem],
    schema: &MetadataSchema,
) -> (BTreeMap<String, EntityRecord>, JoinReport) {
    let mut entities: BTreeMap<String, EntityRecord> = BTreeMap::new();
    let mut report = JoinReport::default();

    for item in items {
        let valid = match validate(item, schema) {
            Ok(valid) => valid,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping metadata item");
                report.skipped += 1;
                continue;
            }
        };
        report.accepted += 1;

        let record = entities
            .entry(valid.entity_id.to_string())
            .or_insert_with(|| EntityRecord::new(valid.entity_id, valid.x, valid.y));

        let Some(quantity) = valid.quantity else {
            continue;
        };

        let slot = record.slot_mut(quantity);
        match slot.stream_id.as_deref() {
            None => slot.stream_id = Some(valid.stream_id.to_string()),
            Some(existing) if existing != valid.stream_id => {
                tracing::debug!(
                    entity = valid.entity_id,
                    quantity = %quantity,
                    kept = existing,
                    ignored = valid.stream_id,
                    "Duplicate stream for quantity"
                );
            }
            Some(_) => {}
        }
    }

    (entities, report)
}

/// All stream identifiers resolved across the entities
pub fn resolved_streams(entities: &BTreeMap<String, EntityRecord>) -> Vec<String> {
    let mut streams: Vec<String> = entities
        .values()
        .flat_map(|record| record.streams().map(|(_, id)| id.to_string()))
        .collect();
    streams.sort();
    streams.dedup();
    streams
}

/// Copy the first bucket of each matching statistics item into its slot
pub fn join_statistics(
    entities: &mut BTreeMap<String, EntityRecord>,
    stats: &[StatisticsItem],
    report: &mut JoinReport,
) {
    // First occurrence wins on duplicate identifiers.
    let mut by_stream: HashMap<&str, &StatisticsItem> = HashMap::with_capacity(stats.len());
    for item in stats {
        by_stream.entry(item.stream_id.as_str()).or_insert(item);
    }

    for record in entities.values_mut() {
        for &quantity in Quantity::all() {
            let slot = record.slot_mut(quantity);
            let Some(stream_id) = slot.stream_id.as_deref() else {
                continue;
            };
            let Some(item) = by_stream.get(stream_id) else {
                continue;
            };
            if item.points() == 0 {
                continue;
            }

            slot.sample = Some(StatSample::new(
                item.min[0],
                item.mean[0],
                item.max[0],
                item.count[0],
            ));
            *report.samples.entry(quantity).or_insert(0) += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(entity: &str) -> String {
        format!("ns/sensors/s.hamilton/{}/i.temperature/signal/operative", entity)
    }

    fn item(stream: &str, entity: &str, coords: &str, name: &str) -> MetadataItem {
        MetadataItem::new(stream, path(entity))
            .attribute("rcoords", coords)
            .attribute("_name", name)
    }

    #[test]
    fn test_parse_coordinates() {
        assert_eq!(parse_coordinates("1.5,-2"), Some((1.5, -2.0)));
        assert_eq!(parse_coordinates(" 1.5 , 2.5 "), Some((1.5, 2.5)));
        assert_eq!(parse_coordinates("notanumber,3.5"), None);
        assert_eq!(parse_coordinates("1.0"), None);
        assert_eq!(parse_coordinates("1.0,2.0,3.0"), None);
        assert_eq!(parse_coordinates(""), None);
    }

    #[test]
    fn test_entity_from_path() {
        assert_eq!(entity_from_path(&path("S1")), Some("S1"));
        assert_eq!(entity_from_path("ns/sensors/S1"), None);
        assert_eq!(entity_from_path("a/b/c/d/e/f/g/h"), None);
    }

    #[test]
    fn test_join_merges_items_sharing_identity() {
        let items = vec![
            item("u1", "S1", "1.0,2.0", "air_temp"),
            item("u2", "S1", "9.0,9.0", "air_rh"),
        ];

        let (entities, report) = join_metadata(&items, &MetadataSchema::default());

        assert_eq!(report.accepted, 2);
        assert_eq!(entities.len(), 1);
        let s1 = &entities["S1"];
        assert_eq!((s1.x, s1.y), (1.0, 2.0));
        assert_eq!(s1.stream_id(Quantity::Temperature), Some("u1"));
        assert_eq!(s1.stream_id(Quantity::Humidity), Some("u2"));
        assert_eq!(s1.stream_id(Quantity::Presence), None);
    }

    #[test]
    fn test_join_skips_malformed_items() {
        let items = vec![
            item("bad-coords", "S1", "notanumber,3.5", "air_temp"),
            MetadataItem::new("no-coords", path("S2")).attribute("_name", "lux"),
            MetadataItem::new("odd-coords", path("S3"))
                .raw_attribute("rcoords", json!([1.0, 2.0]))
                .attribute("_name", "lux"),
            MetadataItem::new("bad-path", "ns/sensors/S4")
                .attribute("rcoords", "1.0,2.0")
                .attribute("_name", "lux"),
            item("u5", "S5", "5.0,6.0", "lux"),
        ];

        let (entities, report) = join_metadata(&items, &MetadataSchema::default());

        assert_eq!(report.skipped, 4);
        assert_eq!(report.accepted, 1);
        assert_eq!(entities.keys().collect::<Vec<_>>(), vec!["S5"]);
    }

    #[test]
    fn test_join_ignores_unknown_names() {
        let items = vec![
            item("u1", "S1", "1.0,2.0", "co2"),
            MetadataItem::new("u2", path("S1")).attribute("rcoords", "1.0,2.0"),
        ];

        let (entities, _) = join_metadata(&items, &MetadataSchema::default());

        let s1 = &entities["S1"];
        assert_eq!(s1.streams().count(), 0);
    }

    #[test]
    fn test_first_valid_item_wins() {
        let items = vec![
            item("bad", "S1", "x,y", "air_temp"),
            item("u1", "S1", "1.0,2.0", "air_temp"),
            item("u2", "S1", "3.0,4.0", "air_temp"),
        ];

        let (entities, _) = join_metadata(&items, &MetadataSchema::default());

        let s1 = &entities["S1"];
        assert_eq!((s1.x, s1.y), (1.0, 2.0));
        assert_eq!(s1.stream_id(Quantity::Temperature), Some("u1"));
    }

    #[test]
    fn test_join_statistics() {
        let items = vec![
            item("u1", "S1", "1.0,2.0", "air_temp"),
            item("u2", "S1", "1.0,2.0", "lux"),
            item("u3", "S2", "3.0,4.0", "presence"),
        ];
        let (mut entities, mut report) = join_metadata(&items, &MetadataSchema::default());
        assert_eq!(resolved_streams(&entities), vec!["u1", "u2", "u3"]);

        let stats = vec![
            StatisticsItem::single("u1", 18.0, 20.0, 22.0, 10),
            StatisticsItem::single("u1", 0.0, 0.0, 0.0, 99),
            StatisticsItem {
                stream_id: "u2".to_string(),
                ..Default::default()
            },
            StatisticsItem::single("unrelated", 1.0, 1.0, 1.0, 1),
        ];
        join_statistics(&mut entities, &stats, &mut report);

        let s1 = &entities["S1"];
        assert_eq!(
            s1.sample(Quantity::Temperature),
            Some(&StatSample::new(18.0, 20.0, 22.0, 10))
        );
        assert_eq!(s1.sample(Quantity::Illuminance), None);
        assert_eq!(entities["S2"].sample(Quantity::Presence), None);
        assert_eq!(report.samples_for(Quantity::Temperature), 1);
        assert_eq!(report.samples_for(Quantity::Illuminance), 0);
    }

    #[test]
    fn test_join_is_order_independent_for_distinct_items() {
        let items = vec![
            item("u1", "S1", "1.0,2.0", "air_temp"),
            item("u2", "S2", "3.0,4.0", "air_rh"),
            item("u3", "S1", "1.0,2.0", "lux"),
        ];
        let stats = vec![
            StatisticsItem::single("u1", 1.0, 2.0, 3.0, 4),
            StatisticsItem::single("u3", 5.0, 6.0, 7.0, 8),
        ];

        let run = |items: &[MetadataItem], stats: &[StatisticsItem]| {
            let (mut entities, mut report) = join_metadata(items, &MetadataSchema::default());
            join_statistics(&mut entities, stats, &mut report);
            entities
        };

        let forward = run(&items, &stats);
        let mut reversed_items = items.clone();
        reversed_items.reverse();
        let mut reversed_stats = stats.clone();
        reversed_stats.reverse();

        assert_eq!(forward, run(&reversed_items, &reversed_stats));
    }
}
