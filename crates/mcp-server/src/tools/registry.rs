//! Immutable tool registry
//!
//! Registration happens once at startup through `RegistryBuilder`; a
//! duplicate name is a build-time error, never a call-time surprise. The
//! built registry is read-only and shared without locking.

use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

use ib_core::SessionProxy;

use crate::protocol::{McpInputSchema, McpTool};

/// Async tool callable: arguments in, JSON payload out, executed against the
/// shared broker session.
pub type ToolHandler =
    Arc<dyn Fn(Value, Arc<SessionProxy>) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// Registration-time errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Tool '{0}' is already registered")]
    DuplicateTool(String),
}

/// One registered tool: MCP metadata plus its handler.
pub struct ToolDefinition {
    pub tool: McpTool,
    pub handler: ToolHandler,
}

/// Builder for the registry. Consumed by `build()`.
#[derive(Default)]
pub struct RegistryBuilder {
    tools: HashMap<String, ToolDefinition>,
    order: Vec<String>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Fails on a duplicate name.
    pub fn register(mut self, tool: McpTool, handler: ToolHandler) -> Result<Self, RegistryError> {
        let name = tool.name.clone();
        if self.tools.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }
        self.order.push(name.clone());
        self.tools.insert(name, ToolDefinition { tool, handler });
        Ok(self)
    }

    pub fn build(self) -> ToolRegistry {
        ToolRegistry {
            tools: self.tools,
            order: self.order,
        }
    }
}

/// Immutable mapping from tool name to definition.
pub struct ToolRegistry {
    tools: HashMap<String, ToolDefinition>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn resolve(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    /// Tool metadata for tools/list, in registration order.
    pub fn list(&self) -> Vec<McpTool> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|def| def.tool.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Wrap a plain async fn/closure into the boxed handler shape.
pub fn handler<F, Fut>(f: F) -> ToolHandler
where
    F: Fn(Value, Arc<SessionProxy>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    Arc::new(move |args, session| Box::pin(f(args, session)))
}

/// Validate arguments against a tool's declared input schema: object shape,
/// required keys present, supplied keys matching their declared type.
pub fn validate_arguments(schema: &McpInputSchema, arguments: &Value) -> Result<(), String> {
    let empty = serde_json::Map::new();
    let args = match arguments {
        Value::Null => &empty,
        Value::Object(map) => map,
        other => {
            return Err(format!(
                "arguments must be a JSON object, got {}",
                json_type_name(other)
            ))
        }
    };

    if let Some(required) = &schema.required {
        for key in required {
            if !args.contains_key(key) {
                return Err(format!("missing required argument '{}'", key));
            }
        }
    }

    if let Some(properties) = &schema.properties {
        for (key, value) in args {
            let Some(declared) = properties.get(key) else {
                continue;
            };
            let Some(expected) = declared.get("type").and_then(Value::as_str) else {
                continue;
            };
            if !value_matches_type(value, expected) {
                return Err(format!(
                    "argument '{}' must be of type {}, got {}",
                    key,
                    expected,
                    json_type_name(value)
                ));
            }
        }
    }

    Ok(())
}

fn value_matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// Helper functions for declaring input schemas

pub fn json_schema_object(
    properties: Vec<(&str, Value)>,
    required: Vec<&str>,
) -> McpInputSchema {
    let mut map = serde_json::Map::new();
    for (name, schema) in properties {
        map.insert(name.to_string(), schema);
    }
    McpInputSchema {
        schema_type: "object".to_string(),
        properties: if map.is_empty() { None } else { Some(map) },
        required: if required.is_empty() {
            None
        } else {
            Some(required.into_iter().map(String::from).collect())
        },
    }
}

pub fn json_schema_string(description: &str) -> Value {
    serde_json::json!({
        "type": "string",
        "description": description
    })
}

pub fn json_schema_number(description: &str) -> Value {
    serde_json::json!({
        "type": "number",
        "description": description
    })
}
