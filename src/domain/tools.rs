//! Small self-contained tools and shared argument helpers.

use async_trait::async_trait;
use rust_mcp_sdk::schema::ContentBlock;
use serde_json::Value;

use crate::errors::ToolError;
use crate::mcp::registry::{
    text_content, InputSchema, PropertySchema, ToolArguments, ToolDescriptor, ToolHandler,
};

pub fn string_arg<'a>(arguments: &'a ToolArguments, key: &str) -> Result<&'a str, ToolError> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::invalid_params(format!("{key} must be a string")))
}

pub fn number_arg(arguments: &ToolArguments, key: &str) -> Result<f64, ToolError> {
    arguments
        .get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| ToolError::invalid_params(format!("{key} must be a number")))
}

pub struct SlackCheckTool;

impl SlackCheckTool {
    pub fn descriptor() -> ToolDescriptor {
        ToolDescriptor {
            name: "test_slack",
            description: "Test Slack integration",
            input_schema: InputSchema::object(),
        }
    }
}

#[async_trait]
impl ToolHandler for SlackCheckTool {
    async fn call(&self, _arguments: &ToolArguments) -> Result<Vec<ContentBlock>, ToolError> {
        Ok(vec![text_content("bingo!")])
    }
}

pub struct BmiTool;

impl BmiTool {
    pub fn descriptor() -> ToolDescriptor {
        ToolDescriptor {
            name: "taskmanager.calculate_bmi",
            description: "Calculate BMI given weight in kg and height in meters",
            input_schema: InputSchema::object()
                .required_property("weight_kg", PropertySchema::number("Body weight in kilograms"))
                .required_property("height_m", PropertySchema::number("Body height in meters")),
        }
    }
}

#[async_trait]
impl ToolHandler for BmiTool {
    async fn call(&self, arguments: &ToolArguments) -> Result<Vec<ContentBlock>, ToolError> {
        let weight_kg = number_arg(arguments, "weight_kg")?;
        let height_m = number_arg(arguments, "height_m")?;
        if height_m <= 0.0 {
            return Err(ToolError::invalid_params("height_m must be greater than 0"));
        }

        let bmi = weight_kg / (height_m * height_m);
        Ok(vec![text_content(bmi.to_string())])
    }
}
