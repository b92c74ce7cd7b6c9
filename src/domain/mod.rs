//! Concrete tools exposed over the Model Context Protocol
//!
//! The catalog is assembled here once at start-up; the dispatcher never sees
//! domain data directly.

pub mod tasks;
pub mod tools;
pub mod weather;

use crate::config::Config;
use crate::errors::RegistryError;
use crate::mcp::registry::ToolRegistry;

use tasks::{TaskBook, TaskListTool};
use tools::{BmiTool, SlackCheckTool};
use weather::WeatherTool;

pub fn build_registry(config: &Config) -> Result<ToolRegistry, RegistryError> {
    let book = TaskBook::sample();
    let mut registry = ToolRegistry::new();

    registry.register(book.descriptor(), TaskListTool::new(book))?;
    registry.register(SlackCheckTool::descriptor(), SlackCheckTool)?;
    registry.register(BmiTool::descriptor(), BmiTool)?;
    registry.register(
        WeatherTool::descriptor(),
        WeatherTool::new(config.weather_api_url.clone())?,
    )?;

    Ok(registry)
}
