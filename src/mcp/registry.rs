//! Tool catalog: descriptors, handlers and argument validation
//!
//! Built once at start-up and shared read-only across every connection.

use std::{collections::BTreeMap, panic::AssertUnwindSafe, sync::Arc};

use async_trait::async_trait;
use futures_util::FutureExt;
use rust_mcp_sdk::schema::{ContentBlock, TextContent};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::errors::{RegistryError, ToolError};

pub type ToolArguments = Map<String, Value>;

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: &ToolArguments) -> Result<Vec<ContentBlock>, ToolError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'static str>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<&'static str>>,
}

impl PropertySchema {
    pub fn string(description: &'static str) -> Self {
        Self {
            kind: "string",
            description: Some(description),
            allowed: None,
        }
    }

    pub fn number(description: &'static str) -> Self {
        Self {
            kind: "number",
            description: Some(description),
            allowed: None,
        }
    }

    pub fn one_of(mut self, allowed: &[&'static str]) -> Self {
        self.allowed = Some(allowed.to_vec());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputSchema {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub properties: BTreeMap<&'static str, PropertySchema>,
    pub required: Vec<&'static str>,
}

impl InputSchema {
    pub fn object() -> Self {
        Self {
            kind: "object",
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }

    pub fn property(mut self, name: &'static str, schema: PropertySchema) -> Self {
        self.properties.insert(name, schema);
        self
    }

    pub fn required_property(mut self, name: &'static str, schema: PropertySchema) -> Self {
        self.required.push(name);
        self.property(name, schema)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: InputSchema,
}

struct RegisteredTool {
    descriptor: ToolDescriptor,
    handler: Arc<dyn ToolHandler>,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        descriptor: ToolDescriptor,
        handler: impl ToolHandler + 'static,
    ) -> Result<(), RegistryError> {
        if self.lookup(descriptor.name).is_ok() {
            return Err(RegistryError::DuplicateTool(descriptor.name.to_string()));
        }

        debug!(tool = descriptor.name, "registering tool");
        self.tools.push(RegisteredTool {
            descriptor,
            handler: Arc::new(handler),
        });
        Ok(())
    }

    /// Descriptors in registration order.
    pub fn list(&self) -> Vec<&ToolDescriptor> {
        self.tools.iter().map(|tool| &tool.descriptor).collect()
    }

    pub fn lookup(&self, name: &str) -> Result<&ToolDescriptor, ToolError> {
        self.find(name)
            .map(|tool| &tool.descriptor)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validates required keys, then runs the handler. A panicking handler
    /// is reported as an internal error instead of unwinding into the caller.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: &ToolArguments,
    ) -> Result<Vec<ContentBlock>, ToolError> {
        let tool = self
            .find(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        check_required(&tool.descriptor.input_schema, arguments)?;

        let handler = Arc::clone(&tool.handler);
        match AssertUnwindSafe(handler.call(arguments))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(tool = name, error = %message, "tool handler panicked");
                Err(ToolError::internal(message))
            }
        }
    }

    fn find(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.iter().find(|tool| tool.descriptor.name == name)
    }
}

fn check_required(schema: &InputSchema, arguments: &ToolArguments) -> Result<(), ToolError> {
    let missing = schema
        .required
        .iter()
        .filter(|key| arguments.get(**key).map_or(true, Value::is_null))
        .copied()
        .collect::<Vec<_>>();

    match missing.as_slice() {
        [] => Ok(()),
        [key] => Err(ToolError::invalid_params(format!(
            "Missing required argument: {key}"
        ))),
        keys => Err(ToolError::invalid_params(format!(
            "Missing required arguments: {}",
            keys.join(", ")
        ))),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "tool handler panicked".to_string()
    }
}

pub fn text_content(text: impl Into<String>) -> ContentBlock {
    ContentBlock::from(TextContent::new(text.into(), None, None))
}

/// Text payload of the first content block, if that block is textual.
pub fn first_text(blocks: &[ContentBlock]) -> Option<String> {
    let block = serde_json::to_value(blocks.first()?).ok()?;
    block.get("text")?.as_str().map(str::to_string)
}
