//! MCP tool implementations: maps tool calls to Cypher queries.
//!
//! A call goes through four steps: arguments are validated into a
//! [`ToolRequest`], the request is turned into queries, the queries run inside
//! one scoped session, and the raw rows are normalized into the tool's result
//! shape. Everything up to the second step happens before a session exists.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

use super::types::ToolDefinition;
use crate::error::{McpError, Result};
use crate::graph::cypher::column;
use crate::graph::{
    cypher, normalize_node, normalize_path, normalize_record, normalize_records,
    normalize_relationship, templates, CypherQuery, Direction, LabelDescriptor, Neighborhood,
    QueryTemplate, RawPath, RawRecord, RawValue, RelationshipTypeDescriptor, SchemaSummary,
};
use crate::store::{run_scoped, GraphStore};

const DEFAULT_MAX_DEPTH: u32 = 4;

/// Return the list of all available tools with their JSON schemas.
pub fn list_tools() -> Vec<ToolDefinition> {
    let read_query_schema = json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "Cypher query to execute"
            },
            "params": {
                "type": "object",
                "description": "Optional query parameters, referenced as $name in the query"
            }
        },
        "required": ["query"]
    });

    let endpoints = json!({
        "fromNode": {
            "type": "string",
            "description": "Id of the start node (alias: startNodeId)"
        },
        "toNode": {
            "type": "string",
            "description": "Id of the end node (alias: endNodeId)"
        }
    });

    let path_schema = json!({
        "type": "object",
        "properties": {
            "fromNode": endpoints["fromNode"],
            "toNode": endpoints["toNode"],
            "maxDepth": {
                "type": "integer",
                "description": "Maximum number of hops (default: 4)",
                "minimum": 1,
                "default": DEFAULT_MAX_DEPTH
            },
            "relationshipTypes": {
                "type": "array",
                "items": {"type": "string"},
                "description": "Optional: only traverse these relationship types"
            }
        },
        "required": ["fromNode", "toNode"]
    });

    vec![
        ToolDefinition {
            name: "execute_cypher".to_string(),
            description: "Execute a Cypher query with parameter binding. Returns one \
                object per result row; nodes, relationships and paths are returned \
                as plain objects."
                .to_string(),
            input_schema: read_query_schema.clone(),
        },
        ToolDefinition {
            name: "query_graph".to_string(),
            description: "Run a Cypher query against the graph and return its rows. \
                Same behavior as execute_cypher."
                .to_string(),
            input_schema: read_query_schema,
        },
        ToolDefinition {
            name: "modify_graph".to_string(),
            description: "Run a write query. The query must start with CREATE, MERGE or SET."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Cypher write query starting with CREATE, MERGE or SET",
                        "pattern": "^\\s*(?i:CREATE|MERGE|SET)"
                    },
                    "params": {
                        "type": "object",
                        "description": "Optional query parameters"
                    }
                },
                "required": ["query"]
            }),
        },
        ToolDefinition {
            name: "create_node".to_string(),
            description: "Create a node with one or more labels and a set of properties. \
                Returns the created node with its id."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "labels": {
                        "type": "array",
                        "items": {"type": "string", "pattern": "^[A-Za-z_][A-Za-z0-9_]*$"},
                        "minItems": 1,
                        "description": "Node labels (e.g., ['Person'])"
                    },
                    "properties": {
                        "type": "object",
                        "description": "Property values: strings, numbers, booleans, or lists/maps of those"
                    }
                },
                "required": ["labels"]
            }),
        },
        ToolDefinition {
            name: "create_relationship".to_string(),
            description: "Create a directed relationship between two existing nodes, \
                identified by their ids."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "fromNode": endpoints["fromNode"],
                    "toNode": endpoints["toNode"],
                    "type": {
                        "type": "string",
                        "pattern": "^[A-Za-z_][A-Za-z0-9_]*$",
                        "description": "Relationship type (e.g., 'KNOWS')"
                    },
                    "properties": {
                        "type": "object",
                        "description": "Optional relationship properties"
                    }
                },
                "required": ["fromNode", "toNode", "type"]
            }),
        },
        ToolDefinition {
            name: "find_path".to_string(),
            description: "Find the shortest path between two nodes. Returns null when \
                no path within maxDepth hops exists."
                .to_string(),
            input_schema: path_schema.clone(),
        },
        ToolDefinition {
            name: "find_paths".to_string(),
            description: "Same as find_path.".to_string(),
            input_schema: path_schema,
        },
        ToolDefinition {
            name: "get_neighbors".to_string(),
            description: "List the nodes adjacent to a node and the relationships that \
                connect them. Each neighbor appears once."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "nodeId": {
                        "type": "string",
                        "description": "Id of the node to expand"
                    },
                    "direction": {
                        "type": "string",
                        "enum": ["incoming", "outgoing", "both"],
                        "default": "both"
                    },
                    "relationshipTypes": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Optional: only follow these relationship types"
                    },
                    "labels": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Optional: only return neighbors with one of these labels"
                    },
                    "limit": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Optional: maximum number of neighbors"
                    }
                },
                "required": ["nodeId"]
            }),
        },
        ToolDefinition {
            name: "execute_template".to_string(),
            description: "Run a named query template from neo4j://templates/queries. \
                Every parameter the template declares is required."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "template": {
                        "type": "string",
                        "enum": templates::catalogue().iter().map(|t| t.name).collect::<Vec<_>>(),
                        "description": "Template name"
                    },
                    "parameters": {
                        "type": "object",
                        "description": "Template parameters (see the template's validation_rules)"
                    }
                },
                "required": ["template"]
            }),
        },
        ToolDefinition {
            name: "explore_schema".to_string(),
            description: "Summarize the graph schema: node labels and relationship types \
                with their property keys and counts."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
    ]
}

// ─── Argument Shapes ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CypherArgs {
    query: String,
    #[serde(default, alias = "parameters")]
    params: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct CreateNodeArgs {
    labels: Vec<String>,
    #[serde(default)]
    properties: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRelationshipArgs {
    #[serde(alias = "startNodeId")]
    from_node: String,
    #[serde(alias = "endNodeId")]
    to_node: String,
    #[serde(rename = "type")]
    rel_type: String,
    #[serde(default)]
    properties: Map<String, Value>,
}

fn default_max_depth() -> u32 {
    DEFAULT_MAX_DEPTH
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FindPathArgs {
    #[serde(alias = "startNodeId")]
    from_node: String,
    #[serde(alias = "endNodeId")]
    to_node: String,
    #[serde(default = "default_max_depth")]
    max_depth: u32,
    #[serde(default)]
    relationship_types: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NeighborArgs {
    node_id: String,
    #[serde(default)]
    direction: Direction,
    #[serde(default)]
    relationship_types: Vec<String>,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TemplateArgs {
    #[serde(alias = "template_name")]
    template: String,
    #[serde(default, alias = "params")]
    parameters: Map<String, Value>,
}

/// A validated tool invocation.
#[derive(Debug)]
enum ToolRequest {
    Query {
        query: String,
        params: Map<String, Value>,
    },
    CreateNode(CreateNodeArgs),
    CreateRelationship(CreateRelationshipArgs),
    FindPath(FindPathArgs),
    Neighbors(NeighborArgs),
    Template {
        template: QueryTemplate,
        parameters: Map<String, Value>,
    },
    ExploreSchema,
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Option<&Value>) -> Result<T> {
    let value = match arguments {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(v) => v.clone(),
    };
    serde_json::from_value(value).map_err(|e| McpError::validation(tool, e.to_string()))
}

/// Property values must be scalars, or lists / maps of scalars.
fn check_properties(tool: &str, properties: &Map<String, Value>) -> Result<()> {
    fn is_scalar(v: &Value) -> bool {
        matches!(v, Value::String(_) | Value::Number(_) | Value::Bool(_))
    }

    for (key, value) in properties {
        let ok = match value {
            Value::Array(items) => items.iter().all(is_scalar),
            Value::Object(map) => map.values().all(is_scalar),
            other => is_scalar(other),
        };
        if !ok {
            return Err(McpError::validation(
                tool,
                format!(
                    "property {:?} must be a string, number, boolean, or a list/map of those",
                    key
                ),
            ));
        }
    }
    Ok(())
}

/// Bolt integers are signed 64-bit. Larger JSON integers are refused.
fn check_integers(tool: &str, field: &str, value: &Value) -> Result<()> {
    match value {
        Value::Number(n) if n.is_u64() && !n.is_i64() => Err(McpError::validation(
            tool,
            format!("{} holds integer {} outside the signed 64-bit range", field, n),
        )),
        Value::Array(items) => items.iter().try_for_each(|v| check_integers(tool, field, v)),
        Value::Object(map) => map.values().try_for_each(|v| check_integers(tool, field, v)),
        _ => Ok(()),
    }
}

fn check_integer_map(tool: &str, field: &str, map: &Map<String, Value>) -> Result<()> {
    map.values().try_for_each(|v| check_integers(tool, field, v))
}

fn non_empty(tool: &str, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(McpError::validation(tool, format!("{} must not be empty", field)));
    }
    Ok(())
}

impl ToolRequest {
    fn parse(tool: &str, arguments: Option<&Value>) -> Result<Self> {
        match tool {
            "execute_cypher" | "query_graph" | "modify_graph" => {
                let args: CypherArgs = parse_args(tool, arguments)?;
                non_empty(tool, "query", &args.query)?;
                if tool == "modify_graph" && !cypher::is_write_statement(&args.query) {
                    return Err(McpError::validation(
                        tool,
                        "query must start with CREATE, MERGE or SET",
                    ));
                }
                let params = args.params.unwrap_or_default();
                check_integer_map(tool, "params", &params)?;
                Ok(ToolRequest::Query {
                    query: args.query,
                    params,
                })
            }
            "create_node" => {
                let args: CreateNodeArgs = parse_args(tool, arguments)?;
                check_properties(tool, &args.properties)?;
                check_integer_map(tool, "properties", &args.properties)?;
                Ok(ToolRequest::CreateNode(args))
            }
            "create_relationship" => {
                let args: CreateRelationshipArgs = parse_args(tool, arguments)?;
                non_empty(tool, "fromNode", &args.from_node)?;
                non_empty(tool, "toNode", &args.to_node)?;
                check_properties(tool, &args.properties)?;
                check_integer_map(tool, "properties", &args.properties)?;
                Ok(ToolRequest::CreateRelationship(args))
            }
            "find_path" | "find_paths" => {
                let args: FindPathArgs = parse_args(tool, arguments)?;
                non_empty(tool, "fromNode", &args.from_node)?;
                non_empty(tool, "toNode", &args.to_node)?;
                Ok(ToolRequest::FindPath(args))
            }
            "get_neighbors" => {
                let args: NeighborArgs = parse_args(tool, arguments)?;
                non_empty(tool, "nodeId", &args.node_id)?;
                if args.limit == Some(0) {
                    return Err(McpError::validation(tool, "limit must be at least 1"));
                }
                Ok(ToolRequest::Neighbors(args))
            }
            "execute_template" => {
                let args: TemplateArgs = parse_args(tool, arguments)?;
                let template = templates::find(&args.template)
                    .map_err(|e| McpError::validation(tool, e.to_string()))?;
                check_integer_map(tool, "parameters", &args.parameters)?;
                Ok(ToolRequest::Template {
                    template,
                    parameters: args.parameters,
                })
            }
            "explore_schema" => Ok(ToolRequest::ExploreSchema),
            _ => Err(McpError::UnknownTool(tool.to_string())),
        }
    }

    /// Build the queries for this request. Identifier problems surface here
    /// as validation errors.
    fn queries(&self, tool: &str) -> Result<Vec<CypherQuery>> {
        let built = match self {
            ToolRequest::Query { query, params } => Ok(vec![cypher::raw(query, params.clone())]),
            ToolRequest::CreateNode(args) => {
                cypher::create_node(&args.labels, args.properties.clone()).map(|q| vec![q])
            }
            ToolRequest::CreateRelationship(args) => cypher::create_relationship(
                &args.from_node,
                &args.to_node,
                &args.rel_type,
                args.properties.clone(),
            )
            .map(|q| vec![q]),
            ToolRequest::FindPath(args) => cypher::find_path(
                &args.from_node,
                &args.to_node,
                args.max_depth,
                &args.relationship_types,
            )
            .map(|q| vec![q]),
            ToolRequest::Neighbors(args) => cypher::neighbors(
                &args.node_id,
                args.direction,
                &args.relationship_types,
                &args.labels,
                args.limit,
            )
            .map(|q| vec![q]),
            ToolRequest::Template {
                template,
                parameters,
            } => {
                return template
                    .render(parameters)
                    .map(|q| vec![q])
                    .map_err(|e| McpError::validation(tool, e.to_string()));
            }
            ToolRequest::ExploreSchema => Ok(schema_queries()),
        };
        built.map_err(|e| McpError::validation(tool, e.to_string()))
    }

    /// Turn raw result sets (one per query) into the tool's payload.
    ///
    /// Builder-owned queries report element ids in their own columns; those
    /// replace the driver-reported ids on the returned entities.
    fn shape(&self, results: Vec<Vec<RawRecord>>) -> Result<Value> {
        match self {
            ToolRequest::Query { .. } => Ok(normalize_records(single(results))),
            ToolRequest::CreateNode(_) => {
                let no_node = || McpError::ToolExecution("create_node returned no node".to_string());
                let mut row = first_row(results).ok_or_else(no_node)?;
                let id = take_id(&mut row, column::NODE_ID)?;
                match row.remove("n") {
                    Some(RawValue::Node(mut node)) => {
                        node.id = id;
                        to_payload(&normalize_node(node))
                    }
                    _ => Err(no_node()),
                }
            }
            ToolRequest::CreateRelationship(args) => {
                let mut row = first_row(results).ok_or_else(|| {
                    McpError::ToolExecution(format!(
                        "no nodes found for fromNode {:?} and toNode {:?}",
                        args.from_node, args.to_node
                    ))
                })?;
                let id = take_id(&mut row, column::REL_ID)?;
                let start_id = take_id(&mut row, column::START_ID)?;
                let end_id = take_id(&mut row, column::END_ID)?;
                match row.remove("r") {
                    Some(RawValue::Relationship(mut rel)) => {
                        rel.id = id;
                        rel.start_id = start_id;
                        rel.end_id = end_id;
                        to_payload(&normalize_relationship(rel))
                    }
                    _ => Err(McpError::ToolExecution(
                        "create_relationship returned no relationship".to_string(),
                    )),
                }
            }
            ToolRequest::FindPath(_) => {
                let mut row = match first_row(results) {
                    Some(row) => row,
                    None => return Ok(Value::Null),
                };
                match row.remove("p") {
                    Some(RawValue::Path(path)) => {
                        let node_ids = take_ids(&mut row, column::NODE_IDS)?;
                        let rel_ids = take_ids(&mut row, column::REL_IDS)?;
                        to_payload(&normalize_path(with_element_ids(path, node_ids, rel_ids)?))
                    }
                    _ => Ok(Value::Null),
                }
            }
            ToolRequest::Neighbors(_) => to_payload(&neighborhood(single(results))?),
            ToolRequest::Template { template, .. } => Ok(json!({
                "template": template.name,
                "results": normalize_records(single(results)),
            })),
            ToolRequest::ExploreSchema => schema_from_results(results).and_then(|s| to_payload(&s)),
        }
    }
}

/// Rows of a single-query request.
fn single(results: Vec<Vec<RawRecord>>) -> Vec<RawRecord> {
    results.into_iter().next().unwrap_or_default()
}

fn first_row(results: Vec<Vec<RawRecord>>) -> Option<RawRecord> {
    single(results).into_iter().next()
}

fn to_payload<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| McpError::ToolExecution(e.to_string()))
}

fn missing_ids(column: &str) -> McpError {
    McpError::ToolExecution(format!("result has no element ids in column {:?}", column))
}

fn take_id(row: &mut RawRecord, column: &str) -> Result<String> {
    match row.remove(column) {
        Some(RawValue::String(id)) => Ok(id),
        _ => Err(missing_ids(column)),
    }
}

fn take_ids(row: &mut RawRecord, column: &str) -> Result<Vec<String>> {
    match row.remove(column) {
        Some(RawValue::List(items)) => items
            .into_iter()
            .map(|item| match item {
                RawValue::String(id) => Ok(id),
                _ => Err(missing_ids(column)),
            })
            .collect(),
        _ => Err(missing_ids(column)),
    }
}

/// Swap the driver ids in `path` for element ids given in traversal order.
fn with_element_ids(
    mut path: RawPath,
    node_ids: Vec<String>,
    rel_ids: Vec<String>,
) -> Result<RawPath> {
    let hops = path.segments.len();
    if node_ids.len() != hops + 1 || rel_ids.len() != hops {
        return Err(McpError::ToolExecution(format!(
            "path has {} hops but {} node ids and {} relationship ids",
            hops,
            node_ids.len(),
            rel_ids.len()
        )));
    }

    let mut traversal = vec![path.start.id.clone()];
    traversal.extend(path.segments.iter().map(|s| s.end.id.clone()));
    let by_driver_id: HashMap<String, String> = traversal.into_iter().zip(node_ids).collect();
    let lookup = |id: &str| {
        by_driver_id.get(id).cloned().ok_or_else(|| {
            McpError::ToolExecution(format!("path references node {} outside the path", id))
        })
    };

    path.start.id = lookup(&path.start.id)?;
    for (segment, rel_id) in path.segments.iter_mut().zip(rel_ids) {
        segment.start.id = lookup(&segment.start.id)?;
        segment.end.id = lookup(&segment.end.id)?;
        segment.relationship.start_id = lookup(&segment.relationship.start_id)?;
        segment.relationship.end_id = lookup(&segment.relationship.end_id)?;
        segment.relationship.id = rel_id;
    }
    Ok(path)
}

/// Collect neighbors and their relationships, each once, in row order.
fn neighborhood(rows: Vec<RawRecord>) -> Result<Neighborhood> {
    let mut out = Neighborhood::default();
    let mut seen_nodes = HashSet::new();
    let mut seen_rels = HashSet::new();

    for mut row in rows {
        let neighbor_id = take_id(&mut row, column::NEIGHBOR_ID)?;
        let rel_ids = take_ids(&mut row, column::REL_IDS)?;
        let start_ids = take_ids(&mut row, column::REL_START_IDS)?;
        let end_ids = take_ids(&mut row, column::REL_END_IDS)?;

        if let Some(RawValue::Node(mut node)) = row.remove("m") {
            node.id = neighbor_id;
            if seen_nodes.insert(node.id.clone()) {
                out.nodes.push(normalize_node(node));
            }
        }

        let rels = match row.remove("rels") {
            Some(RawValue::List(rels)) => rels,
            _ => Vec::new(),
        };
        if [rel_ids.len(), start_ids.len(), end_ids.len()]
            .iter()
            .any(|&n| n != rels.len())
        {
            return Err(missing_ids(column::REL_IDS));
        }

        let ids = rel_ids.into_iter().zip(start_ids).zip(end_ids);
        for (rel, ((id, start_id), end_id)) in rels.into_iter().zip(ids) {
            if let RawValue::Relationship(mut rel) = rel {
                rel.id = id;
                rel.start_id = start_id;
                rel.end_id = end_id;
                if seen_rels.insert(rel.id.clone()) {
                    out.relationships.push(normalize_relationship(rel));
                }
            }
        }
    }
    Ok(out)
}

// ─── Schema ───────────────────────────────────────────────────────────────────

fn schema_queries() -> Vec<CypherQuery> {
    vec![cypher::schema_labels(), cypher::schema_relationship_types()]
}

fn schema_rows<T: DeserializeOwned>(rows: Vec<RawRecord>) -> Result<Vec<T>> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(Value::Object(normalize_record(row)))
                .map_err(|e| McpError::ToolExecution(format!("unexpected schema row: {}", e)))
        })
        .collect()
}

fn schema_from_results(results: Vec<Vec<RawRecord>>) -> Result<SchemaSummary> {
    let mut results = results.into_iter();
    let labels: Vec<LabelDescriptor> = schema_rows(results.next().unwrap_or_default())?;
    let relationship_types: Vec<RelationshipTypeDescriptor> =
        schema_rows(results.next().unwrap_or_default())?;
    Ok(SchemaSummary {
        labels,
        relationship_types,
    })
}

/// Read the schema summary outside of a tool call (resources use this).
pub async fn read_schema<S>(store: &S) -> Result<SchemaSummary>
where
    S: GraphStore + ?Sized,
{
    let results = run_scoped(store, &schema_queries()).await?;
    schema_from_results(results)
}

// ─── Dispatch ─────────────────────────────────────────────────────────────────

/// Dispatch a tool call and return `{"toolResult": …}`.
///
/// Validation and unknown-tool failures return before a session is opened.
pub async fn call_tool<S>(store: &S, name: &str, arguments: Option<&Value>) -> Result<Value>
where
    S: GraphStore + ?Sized,
{
    let span = info_span!("tool_call", tool = %name, call_id = %Uuid::new_v4());

    async move {
        let request = ToolRequest::parse(name, arguments)?;
        let queries = request.queries(name)?;

        let results = run_scoped(store, &queries).await.map_err(|e| {
            warn!(error = %e, "store rejected tool query");
            McpError::from(e)
        })?;

        let payload = request.shape(results)?;
        debug!("tool call completed");
        Ok(json!({ "toolResult": payload }))
    }
    .instrument(span)
    .await
}
