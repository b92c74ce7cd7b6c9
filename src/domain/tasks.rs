//! Sample task book and the `get_tasklist` tool.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use rust_mcp_sdk::schema::ContentBlock;
use serde::Serialize;
use serde_json::Value;

use crate::errors::ToolError;
use crate::mcp::registry::{
    text_content, InputSchema, PropertySchema, ToolArguments, ToolDescriptor, ToolHandler,
};

pub const TOOL_NAME: &str = "get_tasklist";
pub const ALL_CATEGORIES: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: u32,
    pub title: &'static str,
    pub status: TaskStatus,
    pub priority: Priority,
    pub due_date: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CategorizedTask<'a> {
    #[serde(flatten)]
    pub task: &'a Task,
    pub category: &'a str,
}

#[derive(Debug, Serialize)]
pub struct TaskListing<'a> {
    pub category: String,
    pub total_tasks: usize,
    pub tasks: Vec<CategorizedTask<'a>>,
    pub timestamp: String,
}

/// Tasks grouped by category, in a fixed category order.
#[derive(Debug, Clone)]
pub struct TaskBook {
    categories: Vec<(&'static str, Vec<Task>)>,
}

impl TaskBook {
    pub fn new(categories: Vec<(&'static str, Vec<Task>)>) -> Self {
        Self { categories }
    }

    pub fn sample() -> Self {
        use Priority::{High, Low, Medium};
        use TaskStatus::{Completed, InProgress, Pending};

        let task = |id, title, status, priority, due_date| Task {
            id,
            title,
            status,
            priority,
            due_date,
        };

        Self::new(vec![
            (
                "work",
                vec![
                    task(1, "Complete project proposal", Pending, High, "2024-01-15"),
                    task(2, "Review code changes", InProgress, Medium, "2024-01-12"),
                    task(3, "Team meeting preparation", Completed, Low, "2024-01-10"),
                    task(4, "Update documentation", Pending, Medium, "2024-01-20"),
                ],
            ),
            (
                "personal",
                vec![
                    task(5, "Grocery shopping", Pending, Medium, "2024-01-13"),
                    task(6, "Doctor appointment", Completed, High, "2024-01-08"),
                    task(7, "Call family", Pending, Low, "2024-01-14"),
                    task(8, "Exercise routine", InProgress, Medium, "2024-01-11"),
                ],
            ),
            (
                "learning",
                vec![
                    task(9, "Read Python book chapter 5", InProgress, Medium, "2024-01-16"),
                    task(10, "Complete online course module", Pending, High, "2024-01-18"),
                    task(11, "Practice coding exercises", Completed, Low, "2024-01-09"),
                ],
            ),
            (
                "home",
                vec![
                    task(12, "Fix leaky faucet", Pending, High, "2024-01-17"),
                    task(13, "Organize garage", Pending, Low, "2024-01-25"),
                    task(14, "Plant new flowers", Completed, Medium, "2024-01-05"),
                ],
            ),
        ])
    }

    /// Category names followed by `all`.
    pub fn available_categories(&self) -> Vec<&'static str> {
        self.categories
            .iter()
            .map(|(name, _)| *name)
            .chain(std::iter::once(ALL_CATEGORIES))
            .collect()
    }

    /// Case-insensitive lookup; `all` yields every task tagged with its source category.
    pub fn query(&self, category: &str) -> Result<TaskListing<'_>, ToolError> {
        let category = category.trim().to_lowercase();

        let tasks = if category == ALL_CATEGORIES {
            self.categories
                .iter()
                .flat_map(|&(name, ref tasks)| {
                    tasks
                        .iter()
                        .map(move |task| CategorizedTask { task, category: name })
                })
                .collect::<Vec<_>>()
        } else {
            let (name, tasks) = self
                .categories
                .iter()
                .find(|(name, _)| *name == category)
                .ok_or_else(|| {
                    ToolError::invalid_params(format!(
                        "Invalid category '{category}'. Available categories: {}",
                        self.available_categories().join(", ")
                    ))
                })?;
            tasks
                .iter()
                .map(|task| CategorizedTask { task, category: name })
                .collect()
        };

        Ok(TaskListing {
            category,
            total_tasks: tasks.len(),
            tasks,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        })
    }

    pub fn descriptor(&self) -> ToolDescriptor {
        let categories = self.available_categories();
        ToolDescriptor {
            name: TOOL_NAME,
            description: "Get a list of tasks filtered by category",
            input_schema: InputSchema::object().required_property(
                "category",
                PropertySchema::string("The category to filter tasks by").one_of(&categories),
            ),
        }
    }
}

pub struct TaskListTool {
    book: TaskBook,
}

impl TaskListTool {
    pub fn new(book: TaskBook) -> Self {
        Self { book }
    }
}

#[async_trait]
impl ToolHandler for TaskListTool {
    async fn call(&self, arguments: &ToolArguments) -> Result<Vec<ContentBlock>, ToolError> {
        let category = arguments
            .get("category")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::invalid_params("category must be a string"))?;

        let listing = self.book.query(category)?;
        let text = serde_json::to_string_pretty(&listing)
            .map_err(|err| ToolError::internal(format!("Error retrieving tasks: {err}")))?;
        Ok(vec![text_content(text)])
    }
}
