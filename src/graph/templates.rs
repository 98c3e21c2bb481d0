//! Reusable Cypher query templates.
//!
//! A template is Cypher text plus a declaration of every parameter it takes.
//! Values travel as bound parameters. Labels, relationship types, comparison
//! operators and hop bounds cannot be parameterized, so they sit in
//! `{{name}}` slots and are spliced in only after passing their check.

use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

use super::cypher::{identifier, CypherQuery};

/// Comparison operators accepted by templates with an `Operator` slot.
pub const OPERATORS: &[&str] = &["=", ">", "<", ">=", "<=", "CONTAINS", "STARTS WITH", "ENDS WITH"];

/// Upper bound for a `Hops` slot.
pub const MAX_HOPS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Search,
    Analysis,
    Analytics,
    Recommendation,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Search,
        Category::Analysis,
        Category::Analytics,
        Category::Recommendation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Search => "search",
            Category::Analysis => "analysis",
            Category::Analytics => "analytics",
            Category::Recommendation => "recommendation",
        }
    }

    pub fn parse(name: &str) -> Option<Category> {
        Category::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

/// How a template parameter reaches the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Node label, spliced into its slot.
    Label,
    /// Relationship type, spliced into its slot.
    RelType,
    /// One of [`OPERATORS`], spliced into its slot.
    Operator,
    /// Variable-length upper bound, 1 to [`MAX_HOPS`], spliced into its slot.
    Hops,
    /// Any JSON value, bound.
    Value,
    /// Property name used as `n[$key]`, bound.
    PropertyKey,
    /// Non-empty list of relationship types, bound.
    TypeList,
    /// Positive integer up to `max`, bound.
    Limit { max: u64 },
}

impl ParamKind {
    fn spliced(self) -> bool {
        matches!(
            self,
            ParamKind::Label | ParamKind::RelType | ParamKind::Operator | ParamKind::Hops
        )
    }

    /// Human-readable constraint, absent for free values.
    pub fn rule(self) -> Option<String> {
        let ident = "matching ^[A-Za-z_][A-Za-z0-9_]*$";
        match self {
            ParamKind::Label => Some(format!("must be a node label {}", ident)),
            ParamKind::RelType => Some(format!("must be a relationship type {}", ident)),
            ParamKind::Operator => Some(format!("must be one of: {}", OPERATORS.join(", "))),
            ParamKind::Hops => Some(format!("must be an integer from 1 to {}", MAX_HOPS)),
            ParamKind::Value => None,
            ParamKind::PropertyKey => Some(format!("must be a property key {}", ident)),
            ParamKind::TypeList => Some(format!(
                "must be a non-empty list of relationship types {}",
                ident
            )),
            ParamKind::Limit { max } => Some(format!(
                "must be a positive integer less than or equal to {}",
                max
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateParam {
    pub name: &'static str,
    pub kind: ParamKind,
    pub description: &'static str,
}

const fn param(name: &'static str, kind: ParamKind, description: &'static str) -> TemplateParam {
    TemplateParam {
        name,
        kind,
        description,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryTemplate {
    pub name: &'static str,
    pub category: Category,
    pub description: &'static str,
    pub query: &'static str,
    pub params: Vec<TemplateParam>,
    pub example: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unknown template {0:?}")]
    UnknownTemplate(String),

    #[error("missing parameter {0:?}")]
    Missing(&'static str),

    #[error("unexpected parameter {0:?}")]
    Unexpected(String),

    #[error("parameter {name:?} {rule}")]
    Invalid { name: &'static str, rule: String },
}

/// Every template, in catalogue order.
pub fn catalogue() -> Vec<QueryTemplate> {
    vec![
        QueryTemplate {
            name: "find_relationships",
            category: Category::Search,
            description: "Find all relationships and connected nodes for a given node",
            query: "MATCH (a)-[r]->(b) WHERE a.name = $name \
                    RETURN type(r) AS relationship, \
                    collect({node: b.name, properties: properties(r)}) AS connections",
            params: vec![param("name", ParamKind::Value, "Value of the start node's name property")],
            example: json!({"name": "John"}),
        },
        QueryTemplate {
            name: "path_analysis",
            category: Category::Analysis,
            description: "Analyze paths between two nodes including path details",
            query: "MATCH path = (start)-[*1..{{max_depth}}]-(end) \
                    WHERE start.name = $start_name AND end.name = $end_name \
                    RETURN path, length(path) AS path_length, \
                    [n IN nodes(path) | n.name] AS node_names, \
                    [r IN relationships(path) | type(r)] AS relationship_types \
                    LIMIT $limit",
            params: vec![
                param("start_name", ParamKind::Value, "Name of the start node"),
                param("end_name", ParamKind::Value, "Name of the end node"),
                param("max_depth", ParamKind::Hops, "Maximum number of hops"),
                param("limit", ParamKind::Limit { max: 100 }, "Maximum number of paths"),
            ],
            example: json!({"start_name": "Alice", "end_name": "Bob", "max_depth": 3, "limit": 10}),
        },
        QueryTemplate {
            name: "relationship_analytics",
            category: Category::Analysis,
            description: "Analyze relationship patterns and metrics",
            query: "MATCH (n)-[r]->(m) WHERE type(r) = $relationship_type \
                    RETURN type(r) AS relationship, count(*) AS total_count, \
                    collect(DISTINCT labels(n)) AS source_types, \
                    collect(DISTINCT labels(m)) AS target_types, \
                    avg(toFloat(r.weight)) AS avg_weight",
            params: vec![param(
                "relationship_type",
                ParamKind::Value,
                "Relationship type to analyze",
            )],
            example: json!({"relationship_type": "FOLLOWS"}),
        },
        QueryTemplate {
            name: "entity_search",
            category: Category::Search,
            description: "Search for entities based on property values with optional \
                          relationship constraints",
            query: "MATCH (n:{{label}}) WHERE n[$property] {{operator}} $value \
                    OPTIONAL MATCH (n)-[r]-(related) WHERE type(r) IN $relationship_types \
                    WITH n, collect(CASE WHEN r IS NULL THEN NULL ELSE { \
                      relationship: type(r), \
                      direction: CASE WHEN startNode(r) = n THEN 'outgoing' ELSE 'incoming' END, \
                      entity: {labels: labels(related), properties: properties(related)} \
                    } END) AS connections \
                    RETURN n AS entity, connections \
                    LIMIT $limit",
            params: vec![
                param("label", ParamKind::Label, "Label of entities to search"),
                param("property", ParamKind::PropertyKey, "Property to filter on"),
                param("operator", ParamKind::Operator, "Comparison operator"),
                param("value", ParamKind::Value, "Value to compare against"),
                param(
                    "relationship_types",
                    ParamKind::TypeList,
                    "Relationship types to include in connections",
                ),
                param("limit", ParamKind::Limit { max: 100 }, "Maximum number of entities"),
            ],
            example: json!({
                "label": "Person",
                "property": "age",
                "operator": ">",
                "value": 25,
                "relationship_types": ["KNOWS", "WORKS_WITH"],
                "limit": 10
            }),
        },
        QueryTemplate {
            name: "graph_analytics",
            category: Category::Analytics,
            description: "Perform graph analytics on entities and their relationships",
            query: "MATCH (n:{{label}}) OPTIONAL MATCH (n)-[r]-() \
                    WITH n, count(DISTINCT type(r)) AS relationship_types_count, \
                    count(r) AS total_relationships, \
                    collect(DISTINCT type(r)) AS relationship_types, \
                    collect(r) AS rels \
                    RETURN { \
                      entity: {labels: labels(n), properties: properties(n)}, \
                      metrics: { \
                        relationship_types_count: relationship_types_count, \
                        total_relationships: total_relationships, \
                        outgoing_count: size([x IN rels WHERE startNode(x) = n]), \
                        incoming_count: size([x IN rels WHERE endNode(x) = n]), \
                        relationship_types: relationship_types \
                      } \
                    } AS analysis \
                    ORDER BY total_relationships DESC \
                    LIMIT $limit",
            params: vec![
                param("label", ParamKind::Label, "Label of entities to analyze"),
                param("limit", ParamKind::Limit { max: 100 }, "Maximum number of results"),
            ],
            example: json!({"label": "Person", "limit": 10}),
        },
        QueryTemplate {
            name: "temporal_pattern",
            category: Category::Analytics,
            description: "Count relationships per year and month of a timestamp property",
            query: "MATCH (n:{{label}})-[r:{{relationship_type}}]->() \
                    WHERE r[$timestamp_property] IS NOT NULL \
                    WITH datetime(r[$timestamp_property]) AS dt \
                    WITH dt.year AS year, dt.month AS month, count(*) AS count \
                    RETURN year, month, count \
                    ORDER BY year, month",
            params: vec![
                param("label", ParamKind::Label, "Label of source entities"),
                param("relationship_type", ParamKind::RelType, "Type of relationship to analyze"),
                param(
                    "timestamp_property",
                    ParamKind::PropertyKey,
                    "Relationship property holding a datetime or ISO-8601 string",
                ),
            ],
            example: json!({
                "label": "Person",
                "relationship_type": "POSTED",
                "timestamp_property": "created_at"
            }),
        },
        QueryTemplate {
            name: "recommendation",
            category: Category::Recommendation,
            description: "Generate recommendations based on shared patterns",
            query: "MATCH (source:{{label}}) WHERE source[$match_prop] = $match_value \
                    MATCH (source)-[:{{through_relationship}}]->(shared)\
                    <-[:{{through_relationship}}]-(recommended:{{label}}) \
                    WHERE recommended <> source \
                    AND NOT (source)-[:{{existing_relationship}}]->(recommended) \
                    WITH recommended, count(shared) AS shared_count, \
                    collect(shared) AS shared_items \
                    RETURN recommended { \
                      .*, \
                      shared_count: shared_count, \
                      shared_items: [item IN shared_items | item {.*}] \
                    } AS recommendation \
                    ORDER BY shared_count DESC \
                    LIMIT $limit",
            params: vec![
                param("label", ParamKind::Label, "Label of entities to recommend"),
                param("match_prop", ParamKind::PropertyKey, "Property identifying the source"),
                param("match_value", ParamKind::Value, "Value of that property on the source"),
                param(
                    "through_relationship",
                    ParamKind::RelType,
                    "Relationship type shared items are reached through",
                ),
                param(
                    "existing_relationship",
                    ParamKind::RelType,
                    "Relationship type marking already-connected entities",
                ),
                param("limit", ParamKind::Limit { max: 50 }, "Maximum number of recommendations"),
            ],
            example: json!({
                "label": "Person",
                "match_prop": "email",
                "match_value": "alice@example.com",
                "through_relationship": "LIKES",
                "existing_relationship": "FOLLOWS",
                "limit": 5
            }),
        },
        QueryTemplate {
            name: "graph_metrics",
            category: Category::Analytics,
            description: "Rank nodes of a label by out-degree over one relationship type",
            query: "MATCH (n:{{label}}) \
                    OPTIONAL MATCH (n)-[r:{{relationship}}]->(:{{label}}) \
                    WITH n, count(r) AS degree \
                    RETURN n {.*, degree: degree} AS node \
                    ORDER BY degree DESC \
                    LIMIT $limit",
            params: vec![
                param("label", ParamKind::Label, "Node label to analyze"),
                param("relationship", ParamKind::RelType, "Relationship type to consider"),
                param("limit", ParamKind::Limit { max: 100 }, "Maximum number of results"),
            ],
            example: json!({"label": "Person", "relationship": "FOLLOWS", "limit": 10}),
        },
    ]
}

pub fn find(name: &str) -> Result<QueryTemplate, TemplateError> {
    catalogue()
        .into_iter()
        .find(|t| t.name == name)
        .ok_or_else(|| TemplateError::UnknownTemplate(name.to_string()))
}

impl QueryTemplate {
    /// Check `params` against the declaration and produce the query.
    /// Every declared parameter is required and undeclared ones are refused.
    pub fn render(&self, params: &Map<String, Value>) -> Result<CypherQuery, TemplateError> {
        if let Some(extra) = params
            .keys()
            .find(|k| !self.params.iter().any(|p| p.name == k.as_str()))
        {
            return Err(TemplateError::Unexpected(extra.clone()));
        }

        let mut text = self.query.to_string();
        let mut query_params = Map::new();
        for declared in &self.params {
            let value = params
                .get(declared.name)
                .ok_or(TemplateError::Missing(declared.name))?;
            let checked = check(declared, value)?;
            if declared.kind.spliced() {
                let slot = format!("{{{{{}}}}}", declared.name);
                text = text.replace(&slot, &checked);
            } else {
                query_params.insert(declared.name.to_string(), value.clone());
            }
        }

        Ok(CypherQuery {
            text,
            params: query_params,
        })
    }

    /// Catalogue entry as served to clients.
    pub fn describe(&self) -> Value {
        let parameters: Map<String, Value> = self
            .params
            .iter()
            .map(|p| (p.name.to_string(), Value::from(p.description)))
            .collect();
        let rules: Map<String, Value> = self
            .params
            .iter()
            .filter_map(|p| p.kind.rule().map(|r| (p.name.to_string(), Value::from(r))))
            .collect();
        json!({
            "query": self.query,
            "description": self.description,
            "category": self.category,
            "parameters": parameters,
            "example_params": self.example,
            "validation_rules": rules,
        })
    }
}

/// Validate one parameter. Returns the text to splice for slot kinds.
fn check(declared: &TemplateParam, value: &Value) -> Result<String, TemplateError> {
    let invalid = || TemplateError::Invalid {
        name: declared.name,
        rule: declared.kind.rule().unwrap_or_default(),
    };
    let ident = |v: &Value| {
        v.as_str()
            .and_then(|s| identifier(s).ok())
            .ok_or_else(invalid)
    };

    match declared.kind {
        ParamKind::Label | ParamKind::RelType => ident(value),
        ParamKind::PropertyKey => ident(value).map(|_| String::new()),
        ParamKind::Operator => {
            let op = value
                .as_str()
                .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_uppercase())
                .ok_or_else(invalid)?;
            if OPERATORS.contains(&op.as_str()) {
                Ok(op)
            } else {
                Err(invalid())
            }
        }
        ParamKind::Hops => match value.as_u64() {
            Some(hops) if (1..=MAX_HOPS).contains(&hops) => Ok(hops.to_string()),
            _ => Err(invalid()),
        },
        ParamKind::Limit { max } => match value.as_u64() {
            Some(limit) if (1..=max).contains(&limit) => Ok(String::new()),
            _ => Err(invalid()),
        },
        ParamKind::TypeList => match value.as_array() {
            Some(items) if !items.is_empty() => {
                for item in items {
                    ident(item)?;
                }
                Ok(String::new())
            }
            _ => Err(invalid()),
        },
        ParamKind::Value => Ok(String::new()),
    }
}

/// `{name: entry}` for every template, optionally one category only.
pub fn describe_all(category: Option<Category>) -> Value {
    Value::Object(
        catalogue()
            .into_iter()
            .filter(|t| category.map_or(true, |c| t.category == c))
            .map(|t| (t.name.to_string(), t.describe()))
            .collect(),
    )
}
