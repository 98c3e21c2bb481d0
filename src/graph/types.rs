//! Core types for graph results.
//!
//! Two families live here: the raw values handed over by a graph store
//! (`RawValue` and friends), classified once at the store boundary, and the
//! plain JSON-safe records the normalizer produces for MCP clients.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

// ─── Raw Store Values ─────────────────────────────────────────────────────────

/// A value as received from the graph store, already discriminated into a
/// closed set of shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Boolean(bool),
    /// A store-native 64-bit integer.
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<RawValue>),
    Map(BTreeMap<String, RawValue>),
    Node(RawNode),
    Relationship(RawRelationship),
    Path(RawPath),
}

/// One result row: output column name -> value.
pub type RawRecord = BTreeMap<String, RawValue>;

/// A node as reported by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct RawNode {
    /// Opaque store identifier.
    pub id: String,
    pub labels: Vec<String>,
    pub properties: BTreeMap<String, RawValue>,
}

/// A relationship as reported by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRelationship {
    pub id: String,
    pub rel_type: String,
    /// Id of the node the relationship starts at.
    pub start_id: String,
    /// Id of the node the relationship ends at.
    pub end_id: String,
    pub properties: BTreeMap<String, RawValue>,
}

/// One hop of a path in traversal order.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSegment {
    pub start: RawNode,
    pub relationship: RawRelationship,
    pub end: RawNode,
}

/// A path as reported by the store.
///
/// `start` is kept separately so a zero-length path (a single node) is
/// representable.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPath {
    pub start: RawNode,
    pub segments: Vec<RawSegment>,
}

/// Lifts plain JSON into the raw union. Graph entities never come out of
/// this, only scalars, lists and maps.
impl From<Value> for RawValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => RawValue::Null,
            Value::Bool(b) => RawValue::Boolean(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => RawValue::Integer(i),
                None => RawValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => RawValue::String(s),
            Value::Array(items) => RawValue::List(items.into_iter().map(RawValue::from).collect()),
            Value::Object(map) => RawValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, RawValue::from(v)))
                    .collect(),
            ),
        }
    }
}

// ─── Normalized Records ───────────────────────────────────────────────────────

/// A node in the shape returned to MCP clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub labels: Vec<String>,
    pub properties: Map<String, Value>,
}

/// A relationship in the shape returned to MCP clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphRelationship {
    pub id: String,
    #[serde(rename = "type")]
    pub rel_type: String,
    pub from_node: String,
    pub to_node: String,
    pub properties: Map<String, Value>,
}

/// A path: `nodes.len() == relationships.len() + 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphPath {
    pub nodes: Vec<GraphNode>,
    pub relationships: Vec<GraphRelationship>,
}

/// Neighborhood of a node, each neighbor listed once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Neighborhood {
    pub nodes: Vec<GraphNode>,
    pub relationships: Vec<GraphRelationship>,
}

// ─── Schema Summary ───────────────────────────────────────────────────────────

/// Summary of one node label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelDescriptor {
    pub name: String,
    pub property_keys: Vec<String>,
    pub count: i64,
}

/// Summary of one relationship type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipTypeDescriptor {
    #[serde(rename = "type")]
    pub rel_type: String,
    pub property_keys: Vec<String>,
    pub count: i64,
    #[serde(default)]
    pub start_node_labels: Vec<String>,
    #[serde(default)]
    pub end_node_labels: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaSummary {
    pub labels: Vec<LabelDescriptor>,
    pub relationship_types: Vec<RelationshipTypeDescriptor>,
}

// ─── Traversal Direction ──────────────────────────────────────────────────────

/// Which relationships to follow from a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
    #[default]
    Both,
}
