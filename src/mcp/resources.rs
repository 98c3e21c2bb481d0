//! MCP resources: the live schema summary, the index listing, entity counts
//! and the query template catalogue.

use tracing::debug;

use super::tools;
use super::types::{ResourceContents, ResourceDefinition, ResourceTemplateDefinition};
use crate::error::{McpError, Result};
use crate::graph::templates::{self, Category};
use crate::graph::{cypher, normalize, normalize_records, BuildError, CypherQuery, RawValue};
use crate::store::{run_scoped, GraphStore};

pub const SCHEMA_URI: &str = "graph://schema";
pub const INDEXES_URI: &str = "neo4j://schema/indexes";
pub const TEMPLATES_URI: &str = "neo4j://templates/queries";
pub const ANALYTICS_TEMPLATES_URI: &str = "neo4j://templates/analytics";
pub const RECOMMENDATION_TEMPLATES_URI: &str = "neo4j://templates/recommendations";

const NODE_COUNT_PREFIX: &str = "neo4j://nodes/";
const RELATIONSHIP_COUNT_PREFIX: &str = "neo4j://relationships/";
const COUNT_SUFFIX: &str = "/count";
const CATEGORY_PREFIX: &str = "neo4j://templates/queries/";

const JSON_MIME: &str = "application/json";
const TEXT_MIME: &str = "text/plain";

fn resource(uri: &str, name: &str, description: &str) -> ResourceDefinition {
    ResourceDefinition {
        uri: uri.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        mime_type: JSON_MIME.to_string(),
    }
}

pub fn list_resources() -> Vec<ResourceDefinition> {
    vec![
        resource(
            SCHEMA_URI,
            "Graph schema",
            "Node labels and relationship types with property keys and counts",
        ),
        resource(INDEXES_URI, "Schema indexes", "Indexes defined in the database"),
        resource(
            TEMPLATES_URI,
            "Query templates",
            "Reusable Cypher templates with example parameters and validation rules",
        ),
        resource(
            ANALYTICS_TEMPLATES_URI,
            "Analytics templates",
            "Query templates in the analytics category",
        ),
        resource(
            RECOMMENDATION_TEMPLATES_URI,
            "Recommendation templates",
            "Query templates in the recommendation category",
        ),
    ]
}

pub fn list_resource_templates() -> Vec<ResourceTemplateDefinition> {
    let template = |uri: &str, name: &str, description: &str, mime: &str| {
        ResourceTemplateDefinition {
            uri_template: uri.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            mime_type: mime.to_string(),
        }
    };
    vec![
        template(
            "neo4j://nodes/{label}/count",
            "Node count by label",
            "Number of nodes carrying a label",
            TEXT_MIME,
        ),
        template(
            "neo4j://relationships/{type}/count",
            "Relationship count by type",
            "Number of relationships of a type",
            TEXT_MIME,
        ),
        template(
            "neo4j://templates/queries/{category}",
            "Query templates by category",
            "Query templates in one of: search, analysis, analytics, recommendation",
            JSON_MIME,
        ),
    ]
}

/// A URI resolved against the static resources and the resource templates.
enum Target {
    Schema,
    Indexes,
    Templates(Option<Category>),
    Count(CypherQuery),
}

fn resolve(uri: &str) -> Result<Target> {
    let invalid = |message: String| McpError::InvalidResource {
        uri: uri.to_string(),
        message,
    };
    let count = |built: std::result::Result<CypherQuery, BuildError>| {
        built.map(Target::Count).map_err(|e| invalid(e.to_string()))
    };

    match uri {
        SCHEMA_URI => return Ok(Target::Schema),
        INDEXES_URI => return Ok(Target::Indexes),
        TEMPLATES_URI => return Ok(Target::Templates(None)),
        ANALYTICS_TEMPLATES_URI => return Ok(Target::Templates(Some(Category::Analytics))),
        RECOMMENDATION_TEMPLATES_URI => {
            return Ok(Target::Templates(Some(Category::Recommendation)))
        }
        _ => {}
    }

    if let Some(label) = uri
        .strip_prefix(NODE_COUNT_PREFIX)
        .and_then(|rest| rest.strip_suffix(COUNT_SUFFIX))
    {
        return count(cypher::node_count(label));
    }
    if let Some(rel_type) = uri
        .strip_prefix(RELATIONSHIP_COUNT_PREFIX)
        .and_then(|rest| rest.strip_suffix(COUNT_SUFFIX))
    {
        return count(cypher::relationship_count(rel_type));
    }
    if let Some(name) = uri.strip_prefix(CATEGORY_PREFIX) {
        return Category::parse(name)
            .map(|c| Target::Templates(Some(c)))
            .ok_or_else(|| invalid(format!("unknown template category {:?}", name)));
    }

    Err(McpError::UnknownResource(uri.to_string()))
}

/// Read one resource. JSON resources are rendered pretty; counts are plain
/// decimal text.
pub async fn read_resource<S>(store: &S, uri: &str) -> Result<ResourceContents>
where
    S: GraphStore + ?Sized,
{
    debug!(uri, "reading resource");
    let value = match resolve(uri)? {
        Target::Schema => serde_json::to_value(tools::read_schema(store).await?)
            .map_err(|e| McpError::ToolExecution(e.to_string()))?,
        Target::Indexes => {
            let mut results = run_scoped(store, &[cypher::index_listing()]).await?;
            normalize_records(results.pop().unwrap_or_default())
        }
        Target::Templates(category) => templates::describe_all(category),
        Target::Count(query) => {
            let mut results = run_scoped(store, &[query]).await?;
            let count = results
                .pop()
                .and_then(|rows| rows.into_iter().next())
                .and_then(|mut row| row.remove("count"))
                .unwrap_or(RawValue::Integer(0));
            return Ok(ResourceContents {
                uri: uri.to_string(),
                mime_type: TEXT_MIME.to_string(),
                text: normalize(count).to_string(),
            });
        }
    };

    let text = serde_json::to_string_pretty(&value)
        .map_err(|e| McpError::ToolExecution(e.to_string()))?;
    Ok(ResourceContents {
        uri: uri.to_string(),
        mime_type: JSON_MIME.to_string(),
        text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::RawRecord;
    use crate::store::scripted::ScriptedStore;
    use serde_json::{json, Value};

    fn count_row(n: i64) -> RawRecord {
        RawRecord::from([("count".to_string(), RawValue::Integer(n))])
    }

    #[tokio::test]
    async fn test_schema_resource() {
        let store = ScriptedStore::new();
        let mut row = RawRecord::new();
        row.insert("name".into(), RawValue::String("Person".into()));
        row.insert(
            "propertyKeys".into(),
            RawValue::List(vec![RawValue::String("name".into())]),
        );
        row.insert("count".into(), RawValue::Integer(3));
        store.respond(vec![row]);

        let contents = read_resource(&store, SCHEMA_URI).await.unwrap();
        assert_eq!(contents.mime_type, "application/json");
        let parsed: Value = serde_json::from_str(&contents.text).unwrap();
        assert_eq!(parsed["labels"][0]["name"], "Person");
        assert_eq!(parsed["labels"][0]["count"], 3);
        assert_eq!(parsed["relationshipTypes"], json!([]));
    }

    #[tokio::test]
    async fn test_index_resource() {
        let store = ScriptedStore::new();
        let mut row = RawRecord::new();
        row.insert("name".into(), RawValue::String("person_name".into()));
        row.insert("type".into(), RawValue::String("RANGE".into()));
        store.respond(vec![row]);

        let contents = read_resource(&store, INDEXES_URI).await.unwrap();
        let parsed: Value = serde_json::from_str(&contents.text).unwrap();
        assert_eq!(parsed, json!([{"name": "person_name", "type": "RANGE"}]));
        assert!(store.executed()[0].text.starts_with("SHOW INDEXES"));
    }

    #[tokio::test]
    async fn test_templates_need_no_store() {
        let store = ScriptedStore::new();
        let contents = read_resource(&store, TEMPLATES_URI).await.unwrap();
        let parsed: Value = serde_json::from_str(&contents.text).unwrap();
        assert_eq!(parsed.as_object().unwrap().len(), 8);
        assert!(parsed["path_analysis"]["query"]
            .as_str()
            .unwrap()
            .contains("{{max_depth}}"));
        assert_eq!(
            parsed["entity_search"]["validation_rules"]["operator"],
            "must be one of: =, >, <, >=, <=, CONTAINS, STARTS WITH, ENDS WITH"
        );
        assert_eq!(store.sessions_opened(), 0);
    }

    #[tokio::test]
    async fn test_category_resources() {
        let store = ScriptedStore::new();

        let contents = read_resource(&store, RECOMMENDATION_TEMPLATES_URI).await.unwrap();
        let parsed: Value = serde_json::from_str(&contents.text).unwrap();
        let names: Vec<&String> = parsed.as_object().unwrap().keys().collect();
        assert_eq!(names, vec!["recommendation"]);

        let contents = read_resource(&store, "neo4j://templates/queries/search")
            .await
            .unwrap();
        let parsed: Value = serde_json::from_str(&contents.text).unwrap();
        assert!(parsed.get("entity_search").is_some());
        assert!(parsed.get("find_relationships").is_some());
        assert!(parsed.get("graph_metrics").is_none());

        let err = read_resource(&store, "neo4j://templates/queries/everything")
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::InvalidResource { .. }));
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn test_count_resources() {
        let store = ScriptedStore::new();
        store.respond(vec![count_row(42)]);
        store.respond(vec![count_row(7)]);

        let nodes = read_resource(&store, "neo4j://nodes/Person/count").await.unwrap();
        assert_eq!(nodes.mime_type, "text/plain");
        assert_eq!(nodes.text, "42");

        let rels = read_resource(&store, "neo4j://relationships/KNOWS/count")
            .await
            .unwrap();
        assert_eq!(rels.text, "7");

        let executed = store.executed();
        assert_eq!(executed[0].text, "MATCH (n:`Person`) RETURN count(n) AS count");
        assert_eq!(
            executed[1].text,
            "MATCH ()-[r:`KNOWS`]->() RETURN count(r) AS count"
        );
        assert!(executed.iter().all(|q| !q.text.contains("apoc.")));
    }

    #[tokio::test]
    async fn test_count_resource_rejects_bad_identifier() {
        let store = ScriptedStore::new();
        let err = read_resource(&store, "neo4j://nodes/Person) DETACH DELETE (n/count")
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::InvalidResource { .. }));
        assert!(err.to_string().contains("invalid identifier"));
        assert_eq!(store.sessions_opened(), 0);
    }

    #[tokio::test]
    async fn test_unknown_resource() {
        let store = ScriptedStore::new();
        let err = read_resource(&store, "graph://nope").await.unwrap_err();
        assert!(matches!(err, McpError::UnknownResource(_)));
        let err = read_resource(&store, "neo4j://nodes/Person").await.unwrap_err();
        assert!(matches!(err, McpError::UnknownResource(_)));
    }

    #[test]
    fn test_catalogue_uris() {
        let uris: Vec<String> = list_resources().into_iter().map(|r| r.uri).collect();
        assert_eq!(
            uris,
            vec![
                SCHEMA_URI,
                INDEXES_URI,
                TEMPLATES_URI,
                ANALYTICS_TEMPLATES_URI,
                RECOMMENDATION_TEMPLATES_URI
            ]
        );
        let templates: Vec<String> = list_resource_templates()
            .into_iter()
            .map(|t| t.uri_template)
            .collect();
        assert_eq!(
            templates,
            vec![
                "neo4j://nodes/{label}/count",
                "neo4j://relationships/{type}/count",
                "neo4j://templates/queries/{category}"
            ]
        );
    }
}
