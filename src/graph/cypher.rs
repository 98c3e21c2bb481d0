//! Cypher query builder.
//!
//! Values always travel as bound parameters. Labels and relationship types
//! cannot be parameterized in Cypher, so they are the only text interpolated
//! into a statement, and every one of them goes through [`identifier`] first.

use serde_json::{Map, Value};
use std::fmt::Write as _;
use thiserror::Error;

use super::types::Direction;

/// A Cypher statement plus the parameters it binds.
#[derive(Debug, Clone, PartialEq)]
pub struct CypherQuery {
    pub text: String,
    pub params: Map<String, Value>,
}

impl CypherQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Map::new(),
        }
    }

    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("invalid identifier {0:?}: must match ^[A-Za-z_][A-Za-z0-9_]*$")]
    InvalidIdentifier(String),

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("maxDepth must be at least 1")]
    ZeroDepth,
}

/// Validate a schema identifier against the allow-list and quote it.
pub fn identifier(token: &str) -> Result<String, BuildError> {
    let mut chars = token.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(format!("`{}`", token))
    } else {
        Err(BuildError::InvalidIdentifier(token.to_string()))
    }
}

/// `:`A`:`B`` label suffix for a node pattern.
fn label_suffix(labels: &[String]) -> Result<String, BuildError> {
    let mut out = String::new();
    for label in labels {
        out.push(':');
        out.push_str(&identifier(label)?);
    }
    Ok(out)
}

/// `:`A`|`B`` type alternation for a relationship pattern, or empty.
fn type_alternation(types: &[String]) -> Result<String, BuildError> {
    if types.is_empty() {
        return Ok(String::new());
    }
    let quoted = types
        .iter()
        .map(|t| identifier(t))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!(":{}", quoted.join("|")))
}

/// `MATCH (var) WHERE elementId(var) = $param`, an id seek on Neo4j 5.
fn match_by_id(var: &str, param: &str) -> String {
    format!("MATCH ({var}) WHERE elementId({var}) = ${param}", var = var, param = param)
}

/// Result columns carrying element ids next to the entities a builder
/// returns. The Bolt 4.4 driver only reports legacy numeric ids on the
/// entities themselves.
pub mod column {
    pub const NODE_ID: &str = "nodeId";
    pub const REL_ID: &str = "relId";
    pub const START_ID: &str = "startId";
    pub const END_ID: &str = "endId";
    pub const NODE_IDS: &str = "nodeIds";
    pub const REL_IDS: &str = "relIds";
    pub const NEIGHBOR_ID: &str = "neighborId";
    pub const REL_START_IDS: &str = "relStartIds";
    pub const REL_END_IDS: &str = "relEndIds";
}

// ─── Tool Queries ─────────────────────────────────────────────────────────────

/// Caller-supplied statement, used unmodified.
pub fn raw(query: &str, params: Map<String, Value>) -> CypherQuery {
    CypherQuery {
        text: query.to_string(),
        params,
    }
}

/// Whether a statement starts with one of the write clauses `modify_graph`
/// accepts. Client-side guard only.
pub fn is_write_statement(query: &str) -> bool {
    let head = query.trim_start();
    ["CREATE", "MERGE", "SET"].iter().any(|kw| {
        head.get(..kw.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(kw))
    })
}

pub fn create_node(
    labels: &[String],
    properties: Map<String, Value>,
) -> Result<CypherQuery, BuildError> {
    if labels.is_empty() {
        return Err(BuildError::Empty("labels"));
    }
    let text = format!(
        "CREATE (n{} $properties) RETURN n, elementId(n) AS {}",
        label_suffix(labels)?,
        column::NODE_ID
    );
    Ok(CypherQuery::new(text).param("properties", Value::Object(properties)))
}

pub fn create_relationship(
    from_id: &str,
    to_id: &str,
    rel_type: &str,
    properties: Map<String, Value>,
) -> Result<CypherQuery, BuildError> {
    let text = format!(
        "{} {} CREATE (a)-[r:{} $properties]->(b) \
         RETURN r, elementId(r) AS {}, elementId(a) AS {}, elementId(b) AS {}",
        match_by_id("a", "fromId"),
        match_by_id("b", "toId"),
        identifier(rel_type)?,
        column::REL_ID,
        column::START_ID,
        column::END_ID
    );
    Ok(CypherQuery::new(text)
        .param("fromId", from_id)
        .param("toId", to_id)
        .param("properties", Value::Object(properties)))
}

/// Shortest undirected path of at most `max_depth` hops. Identical
/// endpoints yield no row.
pub fn find_path(
    from_id: &str,
    to_id: &str,
    max_depth: u32,
    relationship_types: &[String],
) -> Result<CypherQuery, BuildError> {
    if max_depth == 0 {
        return Err(BuildError::ZeroDepth);
    }
    let text = format!(
        "{} {} AND a <> b \
         MATCH p = shortestPath((a)-[{}*1..{}]-(b)) \
         RETURN p, [x IN nodes(p) | elementId(x)] AS {}, \
         [x IN relationships(p) | elementId(x)] AS {} LIMIT 1",
        match_by_id("a", "fromId"),
        match_by_id("b", "toId"),
        type_alternation(relationship_types)?,
        max_depth,
        column::NODE_IDS,
        column::REL_IDS
    );
    Ok(CypherQuery::new(text)
        .param("fromId", from_id)
        .param("toId", to_id))
}

/// Adjacent nodes, one row per distinct neighbor with the relationships that
/// reach it.
pub fn neighbors(
    node_id: &str,
    direction: Direction,
    relationship_types: &[String],
    labels: &[String],
    limit: Option<u32>,
) -> Result<CypherQuery, BuildError> {
    let rel = format!("[r{}]", type_alternation(relationship_types)?);
    let pattern = match direction {
        Direction::Outgoing => format!("(n)-{}->(m)", rel),
        Direction::Incoming => format!("(n)<-{}-(m)", rel),
        Direction::Both => format!("(n)-{}-(m)", rel),
    };

    let mut text = format!("{} MATCH {}", match_by_id("n", "nodeId"), pattern);
    if !labels.is_empty() {
        let checks = labels
            .iter()
            .map(|l| identifier(l).map(|q| format!("m:{}", q)))
            .collect::<Result<Vec<_>, _>>()?;
        let _ = write!(text, " WHERE ({})", checks.join(" OR "));
    }
    let _ = write!(
        text,
        " WITH m, collect(DISTINCT r) AS rels \
         RETURN m, elementId(m) AS {}, rels, \
         [x IN rels | elementId(x)] AS {}, \
         [x IN rels | elementId(startNode(x))] AS {}, \
         [x IN rels | elementId(endNode(x))] AS {} \
         ORDER BY {}",
        column::NEIGHBOR_ID,
        column::REL_IDS,
        column::REL_START_IDS,
        column::REL_END_IDS,
        column::NEIGHBOR_ID
    );

    let mut query = CypherQuery::new(text).param("nodeId", node_id);
    if let Some(limit) = limit {
        query.text.push_str(" LIMIT $limit");
        query = query.param("limit", limit);
    }
    Ok(query)
}

// ─── Introspection ────────────────────────────────────────────────────────────

/// How many entities per label/type are sampled for property keys.
const SCHEMA_SAMPLE: u32 = 100;

/// Labels with sampled property keys and node counts.
///
/// Counts cover every node; property keys come from at most `$sample`
/// nodes per label.
pub fn schema_labels() -> CypherQuery {
    CypherQuery::new(
        "MATCH (n) UNWIND labels(n) AS label \
         WITH label, count(n) AS count \
         CALL { \
           WITH label \
           MATCH (s) WHERE label IN labels(s) \
           WITH s LIMIT $sample \
           WITH collect(keys(s)) AS keySets \
           RETURN reduce(acc = [], ks IN keySets | acc + [k IN ks WHERE NOT k IN acc]) AS propertyKeys \
         } \
         RETURN label AS name, propertyKeys, count \
         ORDER BY name",
    )
    .param("sample", SCHEMA_SAMPLE)
}

/// Relationship types with counts, plus property keys and endpoint labels
/// from at most `$sample` relationships per type.
pub fn schema_relationship_types() -> CypherQuery {
    CypherQuery::new(
        "MATCH ()-[r]->() \
         WITH type(r) AS type, count(r) AS count \
         CALL { \
           WITH type \
           MATCH (a)-[s]->(b) WHERE type(s) = type \
           WITH a, s, b LIMIT $sample \
           WITH collect(keys(s)) AS keySets, collect(labels(a)) AS startSets, collect(labels(b)) AS endSets \
           RETURN reduce(acc = [], ks IN keySets | acc + [k IN ks WHERE NOT k IN acc]) AS propertyKeys, \
                  reduce(acc = [], ls IN startSets | acc + [l IN ls WHERE NOT l IN acc]) AS startNodeLabels, \
                  reduce(acc = [], ls IN endSets | acc + [l IN ls WHERE NOT l IN acc]) AS endNodeLabels \
         } \
         RETURN type, propertyKeys, count, startNodeLabels, endNodeLabels \
         ORDER BY type",
    )
    .param("sample", SCHEMA_SAMPLE)
}

/// Number of nodes carrying `label`.
pub fn node_count(label: &str) -> Result<CypherQuery, BuildError> {
    Ok(CypherQuery::new(format!(
        "MATCH (n:{}) RETURN count(n) AS count",
        identifier(label)?
    )))
}

/// Number of relationships of type `rel_type`.
pub fn relationship_count(rel_type: &str) -> Result<CypherQuery, BuildError> {
    Ok(CypherQuery::new(format!(
        "MATCH ()-[r:{}]->() RETURN count(r) AS count",
        identifier(rel_type)?
    )))
}

pub fn index_listing() -> CypherQuery {
    CypherQuery::new(
        "SHOW INDEXES YIELD name, labelsOrTypes, properties, type \
         RETURN name, labelsOrTypes AS labels, properties, type \
         ORDER BY name",
    )
}

/// Cheap round-trip used to check connectivity.
pub fn ping() -> CypherQuery {
    CypherQuery::new("RETURN 1 AS ok")
}
