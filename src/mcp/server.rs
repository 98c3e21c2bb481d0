//! MCP JSON-RPC 2.0 server: reads requests from stdin, writes responses to stdout.
//!
//! The MCP protocol uses newline-delimited JSON over STDIO.
//! Tracing output goes to stderr so it doesn't interfere with the protocol.
//!
//! Each request runs as its own task; responses funnel through one channel
//! into a single writer so output lines never interleave.

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use super::types::*;
use super::{prompts, resources, tools};
use crate::error::McpError;
use crate::store::GraphStore;

const RESPONSE_BUFFER: usize = 64;

/// Protocol front end over a graph store.
#[derive(Clone)]
pub struct McpServer {
    store: Arc<dyn GraphStore>,
}

impl McpServer {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Handle a single JSON-RPC request and return a response (or None for notifications).
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = request.id.clone();

        if request.method.starts_with("notifications/") {
            if request.method == "notifications/initialized" {
                info!("client initialized");
            } else {
                debug!(method = %request.method, "ignoring notification");
            }
            return None;
        }

        let response = match request.method.as_str() {
            "initialize" => {
                info!(client = %request.params["clientInfo"]["name"], "client initializing");
                let result = InitializeResult {
                    protocol_version: PROTOCOL_VERSION.to_string(),
                    capabilities: ServerCapabilities::default(),
                    server_info: ServerInfo {
                        name: env!("CARGO_PKG_NAME").to_string(),
                        version: env!("CARGO_PKG_VERSION").to_string(),
                    },
                };
                success(id, &result)
            }

            "ping" => JsonRpcResponse::success(id, Value::Object(Default::default())),

            "tools/list" => {
                debug!("listing tools");
                success(
                    id,
                    &ToolsListResult {
                        tools: tools::list_tools(),
                    },
                )
            }

            "tools/call" => match params::<ToolsCallParams>(&request) {
                Ok(p) => {
                    let result = self.call_tool(&p).await;
                    success(id, &result)
                }
                Err(resp) => resp,
            },

            "resources/list" => success(
                id,
                &ResourcesListResult {
                    resources: resources::list_resources(),
                },
            ),

            "resources/templates/list" => success(
                id,
                &ResourceTemplatesListResult {
                    resource_templates: resources::list_resource_templates(),
                },
            ),

            "resources/read" => match params::<ResourceReadParams>(&request) {
                Ok(p) => match resources::read_resource(self.store.as_ref(), &p.uri).await {
                    Ok(contents) => success(
                        id,
                        &ResourceReadResult {
                            contents: vec![contents],
                        },
                    ),
                    Err(e) => error_response(id, &e),
                },
                Err(resp) => resp,
            },

            "prompts/list" => success(
                id,
                &PromptsListResult {
                    prompts: prompts::list_prompts(),
                },
            ),

            "prompts/get" => match params::<PromptsGetParams>(&request) {
                Ok(p) => match prompts::get_prompt(&p.name, &p.arguments) {
                    Ok(result) => success(id, &result),
                    Err(e) => error_response(id, &e),
                },
                Err(resp) => resp,
            },

            _ => {
                warn!(method = %request.method, "unknown method");
                JsonRpcResponse::error(
                    id,
                    METHOD_NOT_FOUND,
                    format!("Method not found: {}", request.method),
                )
            }
        };

        Some(response)
    }

    /// Tool failures are reported in-band as `isError` results.
    async fn call_tool(&self, params: &ToolsCallParams) -> ToolsCallResult {
        match tools::call_tool(self.store.as_ref(), &params.name, params.arguments.as_ref()).await
        {
            Ok(value) => match serde_json::to_string_pretty(&value) {
                Ok(text) => ToolsCallResult::text(text),
                Err(e) => ToolsCallResult::error(McpError::ToolExecution(e.to_string()).to_string()),
            },
            Err(e) => {
                if e.is_client_error() {
                    warn!(tool = %params.name, error = %e, "tool call rejected");
                } else {
                    error!(tool = %params.name, error = %e, "tool call failed");
                }
                ToolsCallResult::error(e.to_string())
            }
        }
    }

    /// Serve newline-delimited JSON-RPC from `input` to `output`.
    ///
    /// On end of input, in-flight requests are drained. When `shutdown`
    /// resolves first, in-flight requests are aborted.
    pub async fn serve<R, W, F>(&self, input: R, output: W, shutdown: F) -> std::io::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
        F: Future<Output = ()>,
    {
        let (tx, rx) = mpsc::channel::<JsonRpcResponse>(RESPONSE_BUFFER);
        let writer = tokio::spawn(write_responses(output, rx));

        let mut lines = BufReader::new(input).lines();
        let mut tasks = JoinSet::new();
        tokio::pin!(shutdown);
        let mut interrupted = false;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    interrupted = true;
                    break;
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => log_join(joined),
                line = lines.next_line() => {
                    let line = match line {
                        Ok(Some(l)) => l,
                        Ok(None) => break,
                        Err(e) => {
                            error!(error = %e, "failed to read stdin");
                            break;
                        }
                    };

                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    debug!(request = %trimmed, "received request");

                    let request: JsonRpcRequest = match serde_json::from_str(trimmed) {
                        Ok(r) => r,
                        Err(e) => {
                            warn!(error = %e, "invalid JSON-RPC request");
                            let response =
                                JsonRpcResponse::error(None, PARSE_ERROR, format!("Parse error: {}", e));
                            if tx.send(response).await.is_err() {
                                break;
                            }
                            continue;
                        }
                    };

                    let server = self.clone();
                    let tx = tx.clone();
                    tasks.spawn(async move {
                        if let Some(response) = server.handle_request(request).await {
                            let _ = tx.send(response).await;
                        }
                    });
                }
            }
        }

        if !interrupted && !tasks.is_empty() {
            info!(in_flight = tasks.len(), "input closed, draining requests");
            loop {
                tokio::select! {
                    _ = &mut shutdown => {
                        interrupted = true;
                        break;
                    }
                    joined = tasks.join_next() => match joined {
                        Some(joined) => log_join(joined),
                        None => break,
                    },
                }
            }
        }

        if interrupted {
            info!(in_flight = tasks.len(), "shutdown signal received, aborting requests");
            tasks.shutdown().await;
        }

        drop(tx);
        match writer.await {
            Ok(result) => result,
            Err(e) => Err(std::io::Error::new(std::io::ErrorKind::Other, e)),
        }
    }
}

/// Run the server on stdin/stdout until EOF, SIGINT or SIGTERM.
pub async fn run(store: Arc<dyn GraphStore>) -> std::io::Result<()> {
    info!("MCP server ready, waiting for JSON-RPC requests on stdin");
    McpServer::new(store)
        .serve(tokio::io::stdin(), tokio::io::stdout(), shutdown_signal())
        .await?;
    info!("MCP server shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Owns the output stream; one line per response.
async fn write_responses<W>(
    mut output: W,
    mut rx: mpsc::Receiver<JsonRpcResponse>,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let json = match serde_json::to_string(&response) {
            Ok(j) => j,
            Err(e) => {
                error!(error = %e, "failed to serialize response");
                continue;
            }
        };
        debug!(response = %json, "sending response");
        output.write_all(json.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
    }
    output.shutdown().await
}

fn log_join(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!(error = %e, "request task panicked");
        }
    }
}

fn params<T: DeserializeOwned>(request: &JsonRpcRequest) -> Result<T, JsonRpcResponse> {
    serde_json::from_value(request.params.clone()).map_err(|e| {
        JsonRpcResponse::error(
            request.id.clone(),
            INVALID_PARAMS,
            format!("Invalid params: {}", e),
        )
    })
}

fn success<T: Serialize>(id: Option<Value>, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, e.to_string()),
    }
}

fn error_response(id: Option<Value>, err: &McpError) -> JsonRpcResponse {
    let code = if err.is_client_error() {
        INVALID_PARAMS
    } else {
        INTERNAL_ERROR
    };
    JsonRpcResponse::error(id, code, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{RawRecord, RawValue};
    use crate::store::scripted::ScriptedStore;
    use serde_json::json;
    use tokio::io::AsyncReadExt;

    fn server(store: &ScriptedStore) -> McpServer {
        McpServer::new(Arc::new(store.clone()))
    }

    fn request(value: Value) -> JsonRpcRequest {
        serde_json::from_value(value).unwrap()
    }

    async fn roundtrip(server: &McpServer, value: Value) -> Value {
        let response = server.handle_request(request(value)).await.unwrap();
        serde_json::to_value(response).unwrap()
    }

    #[tokio::test]
    async fn test_initialize_advertises_capabilities() {
        let store = ScriptedStore::new();
        let resp = roundtrip(
            &server(&store),
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {
                "protocolVersion": "2024-11-05",
                "clientInfo": {"name": "test", "version": "0"}
            }}),
        )
        .await;

        assert_eq!(resp["id"], 1);
        assert_eq!(resp["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(resp["result"]["serverInfo"]["name"], "neo4j-mcp");
        for capability in ["tools", "resources", "prompts"] {
            assert!(resp["result"]["capabilities"][capability].is_object());
        }
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let store = ScriptedStore::new();
        let resp = server(&store)
            .handle_request(request(
                json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            ))
            .await;
        assert!(resp.is_none());
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let store = ScriptedStore::new();
        let resp = roundtrip(
            &server(&store),
            json!({"jsonrpc": "2.0", "id": 7, "method": "tools/destroy"}),
        )
        .await;
        assert_eq!(resp["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn test_tools_call_success_and_error_results() {
        let store = ScriptedStore::new();
        let mut row = RawRecord::new();
        row.insert("n".into(), RawValue::Integer(42));
        store.respond(vec![row]);
        let srv = server(&store);

        let ok = roundtrip(
            &srv,
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call", "params": {
                "name": "execute_cypher",
                "arguments": {"query": "RETURN $value as n", "params": {"value": 42}}
            }}),
        )
        .await;
        assert!(ok["result"].get("isError").is_none());
        let text = ok["result"]["content"][0]["text"].as_str().unwrap();
        let payload: Value = serde_json::from_str(text).unwrap();
        assert_eq!(payload, json!({"toolResult": [{"n": 42}]}));

        let unknown = roundtrip(
            &srv,
            json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": {
                "name": "teleport"
            }}),
        )
        .await;
        assert_eq!(unknown["result"]["isError"], true);
        assert_eq!(unknown["result"]["content"][0]["text"], "Unknown tool: teleport");
    }

    #[tokio::test]
    async fn test_tools_call_bad_params() {
        let store = ScriptedStore::new();
        let resp = roundtrip(
            &server(&store),
            json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call", "params": {"arguments": {}}}),
        )
        .await;
        assert_eq!(resp["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn test_resources_and_prompts() {
        let store = ScriptedStore::new();
        let srv = server(&store);

        let list = roundtrip(
            &srv,
            json!({"jsonrpc": "2.0", "id": 5, "method": "resources/list"}),
        )
        .await;
        assert_eq!(list["result"]["resources"][0]["uri"], "graph://schema");

        let read = roundtrip(
            &srv,
            json!({"jsonrpc": "2.0", "id": 6, "method": "resources/read",
                   "params": {"uri": "neo4j://templates/queries"}}),
        )
        .await;
        assert_eq!(read["result"]["contents"][0]["uri"], "neo4j://templates/queries");

        let templates = roundtrip(
            &srv,
            json!({"jsonrpc": "2.0", "id": 9, "method": "resources/templates/list"}),
        )
        .await;
        assert_eq!(
            templates["result"]["resourceTemplates"][0]["uriTemplate"],
            "neo4j://nodes/{label}/count"
        );

        let bad_count = roundtrip(
            &srv,
            json!({"jsonrpc": "2.0", "id": 10, "method": "resources/read",
                   "params": {"uri": "neo4j://nodes/no such label/count"}}),
        )
        .await;
        assert_eq!(bad_count["error"]["code"], -32602);

        let missing = roundtrip(
            &srv,
            json!({"jsonrpc": "2.0", "id": 7, "method": "resources/read",
                   "params": {"uri": "graph://elsewhere"}}),
        )
        .await;
        assert_eq!(missing["error"]["code"], -32602);

        let prompt = roundtrip(
            &srv,
            json!({"jsonrpc": "2.0", "id": 8, "method": "prompts/get",
                   "params": {"name": "graph-query", "arguments": {"question": "how many?"}}}),
        )
        .await;
        assert_eq!(prompt["result"]["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn test_serve_answers_each_line_then_drains() {
        let store = ScriptedStore::new();
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n",
            "not json\n",
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n",
        );
        let (mut client, output) = tokio::io::duplex(1 << 20);

        server(&store)
            .serve(input.as_bytes(), output, std::future::pending())
            .await
            .unwrap();

        let mut written = String::new();
        client.read_to_string(&mut written).await.unwrap();
        let responses: Vec<Value> = written
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(responses.len(), 3);
        let by_id = |id: Value| responses.iter().find(|r| r["id"] == id).unwrap();
        assert_eq!(by_id(json!(1))["result"], json!({}));
        assert_eq!(by_id(Value::Null)["error"]["code"], -32700);
        assert!(by_id(json!(2))["result"]["tools"].is_array());
    }

    #[tokio::test]
    async fn test_shutdown_signal_stops_open_input() {
        let store = ScriptedStore::new();
        // The peer stays open, so input never reaches EOF.
        let (_peer, input) = tokio::io::duplex(64);
        let (_client, output) = tokio::io::duplex(64);

        server(&store)
            .serve(input, output, async {})
            .await
            .unwrap();
        assert_eq!(store.open_sessions(), 0);
    }
}
