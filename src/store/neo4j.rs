//! Neo4j backend built on the `neo4rs` Bolt driver.
//!
//! This is the only place that sees driver types. Bolt values are
//! discriminated into [`RawValue`] here, and JSON parameters are turned into
//! Bolt values on the way out.

use async_trait::async_trait;
use neo4rs::{
    BoltBoolean, BoltFloat, BoltInteger, BoltList, BoltMap, BoltNode, BoltNull, BoltPath,
    BoltRelation, BoltString, BoltType, BoltUnboundedRelation, ConfigBuilder, Graph, Query, Row,
    Txn,
};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::{GraphSession, GraphStore, StoreError};
use crate::config::Neo4jConfig;
use crate::graph::{
    cypher, CypherQuery, RawNode, RawPath, RawRecord, RawRelationship, RawSegment, RawValue,
};

/// Connection pool to one Neo4j database.
pub struct Neo4jStore {
    graph: RwLock<Option<Graph>>,
    uri: String,
}

impl Neo4jStore {
    /// Build the driver from an explicit configuration. Call
    /// `verify_connectivity` afterwards to fail fast on a dead server.
    pub async fn connect(config: &Neo4jConfig, password: &str) -> Result<Self, StoreError> {
        let driver_config = ConfigBuilder::default()
            .uri(config.uri.as_str())
            .user(config.username.as_str())
            .password(password)
            .db(config.database.as_str())
            .fetch_size(config.fetch_size)
            .max_connections(config.max_connections)
            .build()
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let graph = Graph::connect(driver_config)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        info!(
            uri = %config.uri,
            user = %config.username,
            database = %config.database,
            "neo4j driver created"
        );

        Ok(Self {
            graph: RwLock::new(Some(graph)),
            uri: config.uri.clone(),
        })
    }

    async fn handle(&self) -> Result<Graph, StoreError> {
        self.graph
            .read()
            .await
            .clone()
            .ok_or_else(|| StoreError::Connection(format!("store for {} is closed", self.uri)))
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn open_session(&self) -> Result<Box<dyn GraphSession>, StoreError> {
        let graph = self.handle().await?;
        let txn = graph
            .start_txn()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Box::new(Neo4jSession { txn }))
    }

    async fn verify_connectivity(&self) -> Result<(), StoreError> {
        let graph = self.handle().await?;
        let mut stream = graph
            .execute(to_query(&cypher::ping())?)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        // Drain so the connection goes back to the pool clean.
        while stream
            .next()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?
            .is_some()
        {}
        info!(uri = %self.uri, "neo4j connectivity verified");
        Ok(())
    }

    async fn close(&self) {
        // Dropping the last handle shuts the pool down.
        if self.graph.write().await.take().is_some() {
            info!(uri = %self.uri, "neo4j driver closed");
        }
    }
}

/// An explicit transaction on a pooled connection.
///
/// Dropped without `finish`, the connection returns to the pool and the
/// server discards the open transaction.
struct Neo4jSession {
    txn: Txn,
}

#[async_trait]
impl GraphSession for Neo4jSession {
    async fn run(&mut self, query: &CypherQuery) -> Result<Vec<RawRecord>, StoreError> {
        let mut stream = self
            .txn
            .execute(to_query(query)?)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let mut records = Vec::new();
        while let Some(row) = stream
            .next(self.txn.handle())
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?
        {
            records.push(record_from_row(&row)?);
        }
        Ok(records)
    }

    async fn finish(self: Box<Self>, commit: bool) -> Result<(), StoreError> {
        let session = *self;
        let outcome = if commit {
            session.txn.commit().await
        } else {
            session.txn.rollback().await
        };
        outcome.map_err(|e| StoreError::Release(e.to_string()))
    }
}

// ─── Outbound: JSON parameters -> Bolt ────────────────────────────────────────

fn to_query(query: &CypherQuery) -> Result<Query, StoreError> {
    query
        .params
        .iter()
        .try_fold(neo4rs::query(&query.text), |q, (key, value)| {
            Ok(q.param(key, to_bolt(value)?))
        })
}

/// Bolt integers are signed 64-bit; larger JSON integers are refused rather
/// than rounded through a float.
fn to_bolt(value: &Value) -> Result<BoltType, StoreError> {
    Ok(match value {
        Value::Null => BoltType::Null(BoltNull),
        Value::Bool(b) => BoltType::Boolean(BoltBoolean::new(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => BoltType::Integer(BoltInteger::new(i)),
            None if n.is_u64() => {
                return Err(StoreError::Query(format!(
                    "integer parameter {} does not fit in a signed 64-bit integer",
                    n
                )))
            }
            None => BoltType::Float(BoltFloat::new(n.as_f64().unwrap_or(f64::NAN))),
        },
        Value::String(s) => BoltType::String(BoltString::new(s)),
        Value::Array(items) => BoltType::List(BoltList {
            value: items.iter().map(to_bolt).collect::<Result<_, _>>()?,
        }),
        Value::Object(map) => BoltType::Map(BoltMap {
            value: map
                .iter()
                .map(|(k, v)| Ok((BoltString::new(k), to_bolt(v)?)))
                .collect::<Result<_, StoreError>>()?,
        }),
    })
}

// ─── Inbound: Bolt -> RawValue ────────────────────────────────────────────────

/// A row decodes as a map from column name to value.
fn record_from_row(row: &Row) -> Result<RawRecord, StoreError> {
    let columns: BoltMap = row
        .to()
        .map_err(|e| StoreError::Query(format!("undecodable row: {}", e)))?;
    Ok(properties(columns))
}

impl From<BoltType> for RawValue {
    fn from(value: BoltType) -> Self {
        match value {
            BoltType::Null(_) => RawValue::Null,
            BoltType::Boolean(b) => RawValue::Boolean(b.value),
            BoltType::Integer(i) => RawValue::Integer(i.value),
            BoltType::Float(f) => RawValue::Float(f.value),
            BoltType::String(s) => RawValue::String(s.value),
            BoltType::List(list) => {
                RawValue::List(list.value.into_iter().map(RawValue::from).collect())
            }
            BoltType::Map(map) => RawValue::Map(properties(map)),
            BoltType::Node(node) => RawValue::Node(raw_node(node)),
            BoltType::Relation(rel) => RawValue::Relationship(raw_relationship(rel)),
            // Endpoints are only known inside a path.
            BoltType::UnboundedRelation(rel) => {
                warn!(id = rel.id.value, "relationship without endpoints outside a path, reporting null");
                RawValue::Null
            }
            BoltType::Path(path) => match raw_path(path) {
                Some(path) => RawValue::Path(path),
                None => {
                    warn!("driver returned a malformed path, reporting null");
                    RawValue::Null
                }
            },
            // Temporal, spatial and byte values have no JSON counterpart.
            other => RawValue::String(format!("{:?}", other)),
        }
    }
}

fn properties(map: BoltMap) -> BTreeMap<String, RawValue> {
    map.value
        .into_iter()
        .map(|(k, v)| (k.value, RawValue::from(v)))
        .collect()
}

fn raw_node(node: BoltNode) -> RawNode {
    RawNode {
        id: node.id.value.to_string(),
        labels: node
            .labels
            .value
            .into_iter()
            .filter_map(|label| match label {
                BoltType::String(s) => Some(s.value),
                _ => None,
            })
            .collect(),
        properties: properties(node.properties),
    }
}

fn raw_relationship(rel: BoltRelation) -> RawRelationship {
    RawRelationship {
        id: rel.id.value.to_string(),
        rel_type: rel.typ.value,
        start_id: rel.start_node_id.value.to_string(),
        end_id: rel.end_node_id.value.to_string(),
        properties: properties(rel.properties),
    }
}

fn bind_relationship(rel: BoltUnboundedRelation, start_id: String, end_id: String) -> RawRelationship {
    RawRelationship {
        id: rel.id.value.to_string(),
        rel_type: rel.typ.value,
        start_id,
        end_id,
        properties: properties(rel.properties),
    }
}

/// Rebuild traversal-ordered segments from Bolt's path encoding.
///
/// `indices` alternates a 1-based relationship index (negative when the
/// relationship points against the traversal) and a 0-based node index.
fn raw_path(path: BoltPath) -> Option<RawPath> {
    let nodes: Vec<RawNode> = path
        .nodes
        .value
        .into_iter()
        .map(|n| match n {
            BoltType::Node(node) => Some(raw_node(node)),
            _ => None,
        })
        .collect::<Option<_>>()?;
    let rels: Vec<BoltUnboundedRelation> = path
        .rels
        .value
        .into_iter()
        .map(|r| match r {
            BoltType::UnboundedRelation(rel) => Some(rel),
            _ => None,
        })
        .collect::<Option<_>>()?;
    let indices: Vec<i64> = path
        .indices
        .value
        .into_iter()
        .map(|i| match i {
            BoltType::Integer(i) => Some(i.value),
            _ => None,
        })
        .collect::<Option<_>>()?;

    if indices.len() % 2 != 0 {
        return None;
    }

    let start = nodes.first()?.clone();
    let mut current = start.clone();
    let mut segments = Vec::with_capacity(indices.len() / 2);
    for pair in indices.chunks(2) {
        let (rel_index, node_index) = (pair[0], pair[1]);
        let rel = rels.get(usize::try_from(rel_index.unsigned_abs()).ok()?.checked_sub(1)?)?;
        let next = nodes.get(usize::try_from(node_index).ok()?)?.clone();

        let (start_id, end_id) = if rel_index > 0 {
            (current.id.clone(), next.id.clone())
        } else {
            (next.id.clone(), current.id.clone())
        };
        segments.push(RawSegment {
            start: current,
            relationship: bind_relationship(rel.clone(), start_id, end_id),
            end: next.clone(),
        });
        current = next;
    }

    Some(RawPath { start, segments })
}
