//! Result normalizer: turns raw store values into plain JSON.
//!
//! The conversion is structurally recursive: paths contain nodes and
//! relationships, and properties may contain lists and maps, all of which go
//! through the same rules.
//!
//! Integers outside the IEEE-754 safe range are emitted as their exact decimal
//! string instead of a lossy number. Non-finite floats are stringified for the
//! same reason: JSON has no representation for them.

use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

use super::types::*;

/// Largest integer a double represents exactly (`2^53 - 1`).
pub const MAX_SAFE_INTEGER: i64 = (1 << 53) - 1;

/// Normalize one result row, keeping its column names.
pub fn normalize_record(record: RawRecord) -> Map<String, Value> {
    record
        .into_iter()
        .map(|(column, value)| (column, normalize(value)))
        .collect()
}

/// Normalize a list of result rows into a JSON array of objects.
pub fn normalize_records(records: Vec<RawRecord>) -> Value {
    Value::Array(
        records
            .into_iter()
            .map(|r| Value::Object(normalize_record(r)))
            .collect(),
    )
}

/// Normalize a single value.
pub fn normalize(value: RawValue) -> Value {
    match value {
        RawValue::Null => Value::Null,
        RawValue::Node(node) => to_json(normalize_node(node)),
        RawValue::Relationship(rel) => to_json(normalize_relationship(rel)),
        RawValue::Path(path) => to_json(normalize_path(path)),
        RawValue::Integer(i) => integer(i),
        RawValue::Float(f) => float(f),
        RawValue::Boolean(b) => Value::Bool(b),
        RawValue::String(s) => Value::String(s),
        RawValue::List(items) => Value::Array(items.into_iter().map(normalize).collect()),
        RawValue::Map(map) => Value::Object(normalize_properties(map)),
    }
}

pub fn normalize_node(node: RawNode) -> GraphNode {
    GraphNode {
        id: node.id,
        labels: node.labels,
        properties: normalize_properties(node.properties),
    }
}

pub fn normalize_relationship(rel: RawRelationship) -> GraphRelationship {
    GraphRelationship {
        id: rel.id,
        rel_type: rel.rel_type,
        from_node: rel.start_id,
        to_node: rel.end_id,
        properties: normalize_properties(rel.properties),
    }
}

/// Flatten a path's segments into node and relationship lists.
///
/// Nodes are every segment's start followed by the last segment's end;
/// relationship direction is kept as the store reported it.
pub fn normalize_path(path: RawPath) -> GraphPath {
    let mut nodes = Vec::with_capacity(path.segments.len() + 1);
    let mut relationships = Vec::with_capacity(path.segments.len());

    let mut last_end = None;
    for segment in path.segments {
        nodes.push(normalize_node(segment.start));
        relationships.push(normalize_relationship(segment.relationship));
        last_end = Some(segment.end);
    }

    match last_end {
        Some(end) => nodes.push(normalize_node(end)),
        None => nodes.push(normalize_node(path.start)),
    }

    GraphPath {
        nodes,
        relationships,
    }
}

fn normalize_properties(properties: BTreeMap<String, RawValue>) -> Map<String, Value> {
    properties
        .into_iter()
        .map(|(key, value)| (key, normalize(value)))
        .collect()
}

fn integer(i: i64) -> Value {
    if (-MAX_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(&i) {
        Value::Number(Number::from(i))
    } else {
        tracing::debug!(value = i, "integer outside safe range, emitting as string");
        Value::String(i.to_string())
    }
}

fn float(f: f64) -> Value {
    match Number::from_f64(f) {
        Some(n) => Value::Number(n),
        None => Value::String(f.to_string()),
    }
}

fn to_json<T: serde::Serialize>(entity: T) -> Value {
    // Entity structs only hold strings, vectors and JSON maps.
    serde_json::to_value(entity).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(id: &str, label: &str, name: &str) -> RawNode {
        RawNode {
            id: id.to_string(),
            labels: vec![label.to_string()],
            properties: BTreeMap::from([("name".to_string(), RawValue::String(name.to_string()))]),
        }
    }

    fn rel(id: &str, rel_type: &str, start: &str, end: &str) -> RawRelationship {
        RawRelationship {
            id: id.to_string(),
            rel_type: rel_type.to_string(),
            start_id: start.to_string(),
            end_id: end.to_string(),
            properties: BTreeMap::new(),
        }
    }

    #[test]
    fn test_null_and_scalars() {
        assert_eq!(normalize(RawValue::Null), Value::Null);
        assert_eq!(normalize(RawValue::Boolean(true)), json!(true));
        assert_eq!(normalize(RawValue::Integer(42)), json!(42));
        assert_eq!(normalize(RawValue::Float(1.5)), json!(1.5));
        assert_eq!(normalize(RawValue::String("hi".into())), json!("hi"));
    }

    #[test]
    fn test_normalized_scalars_are_fixed_points() {
        for value in [json!("text"), json!(7), json!(-3.25), json!(false), Value::Null] {
            let once = normalize(RawValue::from(value.clone()));
            assert_eq!(once, value);
            let twice = normalize(RawValue::from(once));
            assert_eq!(twice, value);
        }
    }

    #[test]
    fn test_integer_safe_range_boundaries() {
        assert_eq!(normalize(RawValue::Integer(MAX_SAFE_INTEGER)), json!(9007199254740991i64));
        assert_eq!(normalize(RawValue::Integer(-MAX_SAFE_INTEGER)), json!(-9007199254740991i64));
        assert_eq!(
            normalize(RawValue::Integer(MAX_SAFE_INTEGER + 1)),
            json!("9007199254740992")
        );
        assert_eq!(normalize(RawValue::Integer(i64::MIN)), json!(i64::MIN.to_string()));
    }

    #[test]
    fn test_non_finite_float_is_stringified() {
        assert_eq!(normalize(RawValue::Float(f64::NAN)), json!("NaN"));
        assert_eq!(normalize(RawValue::Float(f64::INFINITY)), json!("inf"));
    }

    #[test]
    fn test_node_shape() {
        let mut raw = node("4:db:0", "Person", "Alice");
        raw.labels.push("Employee".to_string());
        raw.properties
            .insert("age".to_string(), RawValue::Integer(30));

        let value = normalize(RawValue::Node(raw));
        assert_eq!(
            value,
            json!({
                "id": "4:db:0",
                "labels": ["Person", "Employee"],
                "properties": {"name": "Alice", "age": 30}
            })
        );
    }

    #[test]
    fn test_relationship_shape() {
        let mut raw = rel("5:db:9", "KNOWS", "4:db:0", "4:db:1");
        raw.properties
            .insert("since".to_string(), RawValue::Integer(2020));

        let value = normalize(RawValue::Relationship(raw));
        assert_eq!(
            value,
            json!({
                "id": "5:db:9",
                "type": "KNOWS",
                "fromNode": "4:db:0",
                "toNode": "4:db:1",
                "properties": {"since": 2020}
            })
        );
    }

    #[test]
    fn test_path_preserves_traversal_order() {
        let n0 = node("n0", "Person", "A");
        let n1 = node("n1", "Person", "B");
        let n2 = node("n2", "Person", "C");
        // r1 points against the traversal direction and must stay that way.
        let path = RawPath {
            start: n0.clone(),
            segments: vec![
                RawSegment {
                    start: n0,
                    relationship: rel("r0", "KNOWS", "n0", "n1"),
                    end: n1.clone(),
                },
                RawSegment {
                    start: n1,
                    relationship: rel("r1", "KNOWS", "n2", "n1"),
                    end: n2,
                },
            ],
        };

        let normalized = normalize_path(path);
        let ids: Vec<&str> = normalized.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["n0", "n1", "n2"]);
        let rel_ids: Vec<&str> = normalized
            .relationships
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(rel_ids, vec!["r0", "r1"]);
        assert_eq!(normalized.relationships[1].from_node, "n2");
        assert_eq!(normalized.relationships[1].to_node, "n1");
    }

    #[test]
    fn test_zero_length_path() {
        let path = RawPath {
            start: node("n0", "Person", "Solo"),
            segments: vec![],
        };
        let normalized = normalize_path(path);
        assert_eq!(normalized.nodes.len(), 1);
        assert!(normalized.relationships.is_empty());
    }

    #[test]
    fn test_nested_collections_recurse() {
        let record = RawRecord::from([
            (
                "people".to_string(),
                RawValue::List(vec![
                    RawValue::Node(node("n0", "Person", "A")),
                    RawValue::Null,
                ]),
            ),
            (
                "stats".to_string(),
                RawValue::Map(BTreeMap::from([
                    ("total".to_string(), RawValue::Integer(i64::MAX)),
                    ("ratio".to_string(), RawValue::Float(0.5)),
                ])),
            ),
        ]);

        let normalized = normalize_record(record);
        assert_eq!(normalized["people"][0]["labels"], json!(["Person"]));
        assert_eq!(normalized["people"][1], Value::Null);
        assert_eq!(normalized["stats"]["total"], json!(i64::MAX.to_string()));
        assert_eq!(normalized["stats"]["ratio"], json!(0.5));
    }

    #[test]
    fn test_properties_are_normalized_recursively() {
        let mut raw = node("n0", "Sensor", "s1");
        raw.properties.insert(
            "readings".to_string(),
            RawValue::List(vec![RawValue::Integer(1), RawValue::Integer(i64::MAX)]),
        );
        let normalized = normalize_node(raw);
        assert_eq!(
            normalized.properties["readings"],
            json!([1, i64::MAX.to_string()])
        );
    }
}
