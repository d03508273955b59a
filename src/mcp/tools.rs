//! MCP tool definitions.

use serde::Serialize;
use serde_json::json;

#[derive(Debug, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

/// Get all available MCP tools.
pub fn get_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "compute_account_health".to_string(),
            description: "Compute a 0-100 health score and risk tier (good, watch, at_risk) per customer account from order recency, spend momentum, satisfaction and support signals. Results are ordered worst-first.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "segment": {
                        "type": "string",
                        "description": "Account population to analyze",
                        "enum": ["all", "inactive", "highValue"],
                        "default": "all"
                    },
                    "windowDays": {
                        "type": "integer",
                        "description": "Length of the current and prior comparison windows in days",
                        "minimum": 1,
                        "maximum": 365,
                        "default": 30
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of accounts to return",
                        "minimum": 1,
                        "maximum": 200,
                        "default": 50
                    },
                    "includeReasons": {
                        "type": "boolean",
                        "description": "Attach human-readable reasons to each account",
                        "default": false
                    }
                },
                "required": []
            }),
        },
        ToolDefinition {
            name: "whoami".to_string(),
            description: "Show the identity, role and permissions resolved for the current credential.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        },
    ]
}
