//! Prompt templates that steer a client towards the graph tools.

use serde_json::{Map, Value};

use super::types::{PromptArgument, PromptDefinition, PromptMessage, PromptsGetResult, TextContent};
use crate::error::{McpError, Result};

struct PromptSpec {
    name: &'static str,
    description: &'static str,
    arguments: &'static [(&'static str, &'static str, bool)],
}

const PROMPTS: &[PromptSpec] = &[
    PromptSpec {
        name: "graph-query",
        description: "Generate and execute a Cypher query based on natural language",
        arguments: &[(
            "question",
            "Natural language question about the graph data",
            true,
        )],
    },
    PromptSpec {
        name: "relationship-analysis",
        description: "Analyze relationships between nodes in the graph",
        arguments: &[
            ("start_node", "Starting node label or identifier", true),
            ("end_node", "Ending node label or identifier", true),
            ("max_depth", "Maximum path depth to analyze", false),
        ],
    },
    PromptSpec {
        name: "schema-suggestion",
        description: "Get suggestions for optimizing graph schema based on current usage patterns",
        arguments: &[(
            "focus_area",
            "Specific area of the schema to analyze (optional)",
            false,
        )],
    },
    PromptSpec {
        name: "query-optimization",
        description: "Analyze and optimize a Cypher query",
        arguments: &[
            ("query", "Cypher query to optimize", true),
            ("context", "Additional context about query usage", false),
        ],
    },
];

pub fn list_prompts() -> Vec<PromptDefinition> {
    PROMPTS
        .iter()
        .map(|p| PromptDefinition {
            name: p.name.to_string(),
            description: p.description.to_string(),
            arguments: p
                .arguments
                .iter()
                .map(|(name, description, required)| PromptArgument {
                    name: name.to_string(),
                    description: description.to_string(),
                    required: *required,
                })
                .collect(),
        })
        .collect()
}

/// String form of an argument. Numbers are accepted for numeric arguments
/// such as `max_depth`.
fn argument(arguments: &Map<String, Value>, name: &str) -> Option<String> {
    match arguments.get(name)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Render a prompt into a single user message.
pub fn get_prompt(name: &str, arguments: &Map<String, Value>) -> Result<PromptsGetResult> {
    let spec = PROMPTS
        .iter()
        .find(|p| p.name == name)
        .ok_or_else(|| McpError::UnknownPrompt(name.to_string()))?;

    for (arg, _, required) in spec.arguments {
        if *required && argument(arguments, arg).is_none() {
            return Err(McpError::InvalidPromptArguments {
                prompt: name.to_string(),
                message: format!("missing required argument {:?}", arg),
            });
        }
    }

    let arg = |key: &str| argument(arguments, key).unwrap_or_default();
    let text = match spec.name {
        "graph-query" => format!(
            "Answer this question about the graph: \"{}\"\n\n\
             Start with the explore_schema tool to learn the labels, relationship \
             types and property keys. Then write a parameterized Cypher query and run \
             it with execute_cypher. Explain the query and summarize the results.",
            arg("question")
        ),
        "relationship-analysis" => {
            let depth = argument(arguments, "max_depth").unwrap_or_else(|| "3".to_string());
            format!(
                "Analyze how \"{}\" and \"{}\" are connected, looking at paths of up \
                 to {} hops.\n\n\
                 I'll consider:\n\
                 1. The shortest path between them (find_path)\n\
                 2. Their direct neighbors (get_neighbors)\n\
                 3. Which relationship types dominate the connecting paths",
                arg("start_node"),
                arg("end_node"),
                depth
            )
        }
        "schema-suggestion" => {
            let mut text = "Review the current graph schema (graph://schema resource or \
                            explore_schema tool) and suggest improvements.\n\n\
                            I'll suggest:\n\
                            1. Node labels and their properties\n\
                            2. Relationship types and structures\n\
                            3. Indexes and constraints"
                .to_string();
            if let Some(focus) = argument(arguments, "focus_area") {
                text.push_str(&format!("\n\nFocus on this area:\n{}", focus));
            }
            text
        }
        "query-optimization" => {
            let mut text = format!(
                "Let me analyze this Cypher query for optimization opportunities:\n\n\
                 ```cypher\n{}\n```\n\n\
                 I'll consider:\n\
                 1. Index usage and label scans\n\
                 2. Relationship traversal patterns\n\
                 3. Parameter usage and literal values\n\
                 4. Aggregation and collection handling",
                arg("query")
            );
            if let Some(context) = argument(arguments, "context") {
                text.push_str(&format!("\n\nAdditional context to consider:\n{}", context));
            }
            text
        }
        _ => return Err(McpError::UnknownPrompt(name.to_string())),
    };

    Ok(PromptsGetResult {
        description: spec.description.to_string(),
        messages: vec![PromptMessage {
            role: "user".to_string(),
            content: TextContent::new(text),
        }],
    })
}
