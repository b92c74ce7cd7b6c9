//! `taskmanager.fetch_weather`: a thin upstream HTTP fetch.

use std::time::Duration;

use async_trait::async_trait;
use rust_mcp_sdk::schema::ContentBlock;

use crate::domain::tools::string_arg;
use crate::errors::{RegistryError, ToolError};
use crate::mcp::registry::{
    text_content, InputSchema, PropertySchema, ToolArguments, ToolDescriptor, ToolHandler,
};

const PREVIEW_CHARS: usize = 100;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct WeatherTool {
    client: reqwest::Client,
    endpoint: String,
}

impl WeatherTool {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, RegistryError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| RegistryError::Setup(format!("weather client: {err}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn descriptor() -> ToolDescriptor {
        ToolDescriptor {
            name: "taskmanager.fetch_weather",
            description: "Fetch current weather for a city",
            input_schema: InputSchema::object()
                .required_property("city", PropertySchema::string("City to fetch weather for")),
        }
    }

    async fn fetch(&self) -> Result<String, reqwest::Error> {
        self.client
            .get(&self.endpoint)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

#[async_trait]
impl ToolHandler for WeatherTool {
    async fn call(&self, arguments: &ToolArguments) -> Result<Vec<ContentBlock>, ToolError> {
        let city = string_arg(arguments, "city")?;
        let body = self.fetch().await.map_err(|err| {
            ToolError::internal(format!("Weather lookup for {city} failed: {err}"))
        })?;

        let preview = body.chars().take(PREVIEW_CHARS).collect::<String>();
        Ok(vec![text_content(format!(
            "Weather for {city}: Mock weather data - {preview}..."
        ))])
    }
}
