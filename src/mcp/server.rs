//! MCP JSON-RPC 2.0 server over stdio.

use crate::auth::{AuthResolver, TransportAuth};
use crate::error::Result;
use crate::workflow::{HealthRequest, HealthWorkflow};
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, Write};

/// MCP Server for AI assistant integration.
pub struct McpServer {
    resolver: AuthResolver,
    workflow: HealthWorkflow,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JsonRpcRequest {
    #[serde(rename = "jsonrpc")]
    _jsonrpc: String,
    id: Option<serde_json::Value>,
    method: String,
    #[serde(default)]
    params: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonRpcResponse {
    jsonrpc: String,
    id: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonRpcError {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
}

impl JsonRpcError {
    fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
            data: None,
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            code: -32603,
            message: message.into(),
            data: None,
        }
    }
}

type RpcResult = std::result::Result<serde_json::Value, JsonRpcError>;

/// Wrap a serializable payload as MCP text content.
fn text_content<T: Serialize>(payload: &T) -> RpcResult {
    let text = serde_json::to_string_pretty(payload)
        .map_err(|e| JsonRpcError::internal(format!("Failed to encode result: {}", e)))?;
    Ok(serde_json::json!({
        "content": [{
            "type": "text",
            "text": text
        }]
    }))
}

impl McpServer {
    /// Create a new MCP server.
    pub fn new(resolver: AuthResolver, workflow: HealthWorkflow) -> Self {
        Self { resolver, workflow }
    }

    /// Run the MCP server over stdio.
    pub async fn run(&self) -> Result<()> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        tracing::info!("account-health MCP server started");
        self.serve(stdin.lock(), stdout.lock()).await
    }

    /// Serve line-delimited JSON-RPC until the reader is exhausted.
    pub async fn serve<R: BufRead, W: Write>(&self, reader: R, mut writer: W) -> Result<()> {
        for line in reader.lines() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    tracing::warn!("Error reading input: {}", e);
                    continue;
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str(&line) {
                Ok(r) => r,
                Err(e) => {
                    let error_response = JsonRpcResponse {
                        jsonrpc: "2.0".to_string(),
                        id: None,
                        result: None,
                        error: Some(JsonRpcError {
                            code: -32700,
                            message: format!("Parse error: {}", e),
                            data: None,
                        }),
                    };
                    writeln!(writer, "{}", serde_json::to_string(&error_response)?)?;
                    writer.flush()?;
                    continue;
                }
            };

            // Messages without an id are notifications and get no response.
            if request.id.is_none() {
                tracing::debug!(method = %request.method, "Notification received");
                continue;
            }

            let response = self.handle_request(request).await;
            writeln!(writer, "{}", serde_json::to_string(&response)?)?;
            writer.flush()?;
        }

        Ok(())
    }

    pub(crate) async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize().await,
            "tools/list" => self.handle_tools_list().await,
            "tools/call" => self.handle_tools_call(request.params).await,
            _ => Err(JsonRpcError {
                code: -32601,
                message: format!("Method not found: {}", request.method),
                data: None,
            }),
        };

        match result {
            Ok(value) => JsonRpcResponse {
                jsonrpc: "2.0".to_string(),
                id: request.id,
                result: Some(value),
                error: None,
            },
            Err(error) => JsonRpcResponse {
                jsonrpc: "2.0".to_string(),
                id: request.id,
                result: None,
                error: Some(error),
            },
        }
    }

    async fn handle_initialize(&self) -> RpcResult {
        Ok(serde_json::json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": "account-health",
                "version": env!("CARGO_PKG_VERSION")
            }
        }))
    }

    async fn handle_tools_list(&self) -> RpcResult {
        let tools = super::tools::get_tools();
        Ok(serde_json::json!({ "tools": tools }))
    }

    async fn handle_tools_call(&self, params: serde_json::Value) -> RpcResult {
        let name = params
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| JsonRpcError::invalid_params("Missing tool name"))?;

        let arguments = params
            .get("arguments")
            .cloned()
            .unwrap_or(serde_json::json!({}));

        let transport = transport_auth(&params);

        match name {
            "compute_account_health" => self.tool_compute_health(arguments, transport).await,
            "whoami" => self.tool_whoami(transport).await,
            _ => Err(JsonRpcError::invalid_params(format!("Unknown tool: {}", name))),
        }
    }

    async fn tool_compute_health(
        &self,
        arguments: serde_json::Value,
        transport: Option<TransportAuth>,
    ) -> RpcResult {
        let request: HealthRequest = serde_json::from_value(arguments)
            .map_err(|e| JsonRpcError::invalid_params(format!("Invalid arguments: {}", e)))?;
        request
            .validate()
            .map_err(|e| JsonRpcError::invalid_params(e.to_string()))?;

        let context = self.resolver.resolve(transport.as_ref());
        let report = self.workflow.compute_account_health(&context, &request).await;

        text_content(&report)
    }

    async fn tool_whoami(&self, transport: Option<TransportAuth>) -> RpcResult {
        let context = self.resolver.resolve(transport.as_ref());
        text_content(&context)
    }
}

/// Credential bundle from `params._meta.auth`, if the caller attached one.
///
/// A malformed bundle is treated as no credential.
fn transport_auth(params: &serde_json::Value) -> Option<TransportAuth> {
    let auth = params.get("_meta").and_then(|meta| meta.get("auth"))?;
    match serde_json::from_value(auth.clone()) {
        Ok(bundle) => Some(bundle),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring malformed auth bundle");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PrincipalDirectory;
    use crate::ledger::Ledger;
    use crate::signals::{SimulatedSatisfactionSource, SimulatedSupportSource, SignalFetcher};
    use chrono::Utc;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn server(fallback: Option<&str>) -> McpServer {
        let fetcher = SignalFetcher::new(
            Arc::new(SimulatedSatisfactionSource::new(Duration::ZERO, 100)),
            Arc::new(SimulatedSupportSource::new(Duration::ZERO, 100)),
            Duration::from_secs(1),
        );
        let workflow = HealthWorkflow::new(Arc::new(Ledger::sample(Utc::now())), fetcher, 500);
        let resolver = AuthResolver::new(PrincipalDirectory::builtin(), fallback.map(String::from));
        McpServer::new(resolver, workflow)
    }

    fn request(method: &str, params: serde_json::Value) -> JsonRpcRequest {
        serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params
        }))
        .unwrap()
    }

    fn tool_payload(response: &JsonRpcResponse) -> serde_json::Value {
        let text = response.result.as_ref().unwrap()["content"][0]["text"]
            .as_str()
            .unwrap();
        serde_json::from_str(text).unwrap()
    }

    #[tokio::test]
    async fn test_initialize() {
        let response = server(None).handle_request(request("initialize", json!({}))).await;
        let result = response.result.unwrap();
        assert_eq!(result["serverInfo"]["name"], "account-health");
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let response = server(None).handle_request(request("resources/list", json!({}))).await;
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn test_compute_with_transport_credential() {
        let params = json!({
            "name": "compute_account_health",
            "arguments": {"limit": 200, "includeReasons": true},
            "_meta": {"auth": {"token": "admin-token-123", "clientId": "test"}}
        });
        let response = server(None).handle_request(request("tools/call", params)).await;
        let payload = tool_payload(&response);
        assert_eq!(payload["summary"]["totalAnalyzed"], 5);
        assert_eq!(payload["accounts"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_compute_without_credential_is_empty_success() {
        let params = json!({"name": "compute_account_health", "arguments": {}});
        let response = server(None).handle_request(request("tools/call", params)).await;
        assert!(response.error.is_none());
        let payload = tool_payload(&response);
        assert_eq!(payload["accounts"], json!([]));
        assert_eq!(payload["summary"]["totalAnalyzed"], 0);
    }

    #[tokio::test]
    async fn test_compute_uses_fallback_credential() {
        let params = json!({"name": "compute_account_health", "arguments": {"segment": "all"}});
        let response = server(Some("viewer-token-789"))
            .handle_request(request("tools/call", params))
            .await;
        assert_eq!(tool_payload(&response)["summary"]["totalAnalyzed"], 5);
    }

    #[tokio::test]
    async fn test_compute_rejects_out_of_range_arguments() {
        for arguments in [
            json!({"limit": 0}),
            json!({"limit": 201}),
            json!({"windowDays": 400}),
            json!({"segment": "vip"}),
        ] {
            let params = json!({"name": "compute_account_health", "arguments": arguments});
            let response = server(None).handle_request(request("tools/call", params)).await;
            assert_eq!(response.error.unwrap().code, -32602);
        }
    }

    #[tokio::test]
    async fn test_whoami() {
        let params = json!({
            "name": "whoami",
            "_meta": {"auth": {"token": "analyst-token-456"}}
        });
        let response = server(None).handle_request(request("tools/call", params)).await;
        let payload = tool_payload(&response);
        assert_eq!(payload["authenticated"], true);
        assert_eq!(payload["principal"]["role"], "user");
    }

    #[tokio::test]
    async fn test_serve_handles_parse_errors_and_notifications() {
        let input = concat!(
            "not json\n",
            "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n",
            "{\"jsonrpc\":\"2.0\",\"id\":7,\"method\":\"tools/list\"}\n"
        );
        let mut output = Vec::new();
        server(None).serve(input.as_bytes(), &mut output).await.unwrap();

        let lines: Vec<serde_json::Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["error"]["code"], -32700);
        assert_eq!(lines[1]["id"], 7);
        assert_eq!(lines[1]["result"]["tools"][0]["name"], "compute_account_health");
    }

    #[tokio::test]
    async fn test_auth_bundle_without_token_is_unauthenticated() {
        for auth in [
            json!({"clientId": "c", "scopes": []}),
            json!({"token": 42, "clientId": "c"}),
        ] {
            let params = json!({
                "name": "compute_account_health",
                "arguments": {},
                "_meta": {"auth": auth}
            });
            let response = server(None).handle_request(request("tools/call", params)).await;
            assert!(response.error.is_none());
            let payload = tool_payload(&response);
            assert_eq!(payload["accounts"], json!([]));
            assert_eq!(payload["summary"]["totalAnalyzed"], 0);
        }
    }

    #[tokio::test]
    async fn test_serve_never_answers_requests_without_id() {
        let input = concat!(
            "{\"jsonrpc\":\"2.0\",\"method\":\"tools/list\"}\n",
            "{\"jsonrpc\":\"2.0\",\"method\":\"initialize\",\"params\":{}}\n",
            "{\"jsonrpc\":\"2.0\",\"id\":\"a\",\"method\":\"initialize\"}\n"
        );
        let mut output = Vec::new();
        server(None).serve(input.as_bytes(), &mut output).await.unwrap();

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1);
        let response: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(response["id"], "a");
    }
}
