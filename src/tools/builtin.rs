//! Demo tools for the CLI and tests.
//!
//! Each tool returns a deterministic placeholder payload; none of them touch
//! the network or the filesystem.
//!
//! ```rust
//! use toolloop::tools::{builtin, ToolRegistry};
//!
//! let registry = ToolRegistry::new();
//! builtin::register_all(&registry).unwrap();
//! assert_eq!(registry.len(), 5);
//! ```

use serde_json::json;

use super::definition::ToolDefinition;
use super::registry::ToolRegistry;
use super::schema::ParameterSchema;
use crate::error::Result;

/// Placeholder search results; at most three hits are returned.
pub fn web_search_tool() -> ToolDefinition {
    ToolDefinition::new(
        "web_search",
        "Search the web for information",
        ParameterSchema::object()
            .string("query", "The search query to execute", true)
            .integer("max_results", "Maximum number of results to return", false)
            .with_default(json!(10))
            .build(),
        |args| async move {
            let query = args.get_str("query")?;
            let max_results = args.get_i64("max_results")?;
            let results: Vec<_> = (1..=max_results.clamp(0, 3))
                .map(|i| {
                    json!({
                        "title": format!("Result {i} for '{query}'"),
                        "url": format!("https://example.com/result-{i}"),
                        "snippet": format!("This is a placeholder snippet for result {i} about {query}."),
                    })
                })
                .collect();
            Ok(json!({
                "query": query,
                "results": results,
                "total_results": max_results,
            }))
        },
    )
}

pub fn file_operations_tool() -> ToolDefinition {
    ToolDefinition::new(
        "file_operations",
        "Perform file operations (read, write, delete, list)",
        ParameterSchema::object()
            .string_enum(
                "operation",
                "Type of operation",
                &["read", "write", "delete", "list"],
                true,
            )
            .string("path", "File or directory path to operate on", true)
            .string("content", "Content to write (write only)", false)
            .build(),
        |args| async move {
            let operation = args.get_str("operation")?;
            let path = args.get_str("path")?;
            let content = args.get_str_opt("content");
            let message = match operation {
                "read" => format!("Reading file: {path}"),
                "write" => format!(
                    "Writing to file: {path} with {} characters",
                    content.map(|c| c.chars().count()).unwrap_or(0)
                ),
                "delete" => format!("Deleting file: {path}"),
                _ => format!("Listing directory: {path}"),
            };
            let echoed = if operation == "read" { content } else { None };
            Ok(json!({
                "operation": operation,
                "path": path,
                "status": "success",
                "message": message,
                "content": echoed,
            }))
        },
    )
}

pub fn code_analysis_tool() -> ToolDefinition {
    ToolDefinition::new(
        "code_analysis",
        "Analyze code for issues and suggestions",
        ParameterSchema::object()
            .string("code", "The source code to analyze", true)
            .string("language", "Programming language of the code", false)
            .with_default(json!("python"))
            .build(),
        |args| async move {
            let code = args.get_str("code")?;
            let language = args.get_str("language")?;
            Ok(json!({
                "language": language,
                "lines_of_code": code.split('\n').count(),
                "complexity_score": 7.5,
                "issues": [
                    {"type": "warning", "line": 10, "message": "This is a placeholder warning message"},
                    {"type": "info", "line": 25, "message": "This is a placeholder info message"},
                ],
                "suggestions": [
                    "Consider adding more documentation",
                    "This is a placeholder suggestion",
                ],
            }))
        },
    )
}

pub fn data_processing_tool() -> ToolDefinition {
    ToolDefinition::new(
        "data_processing",
        "Process data with various operations",
        ParameterSchema::object()
            .array("data", "Array of data objects to process", true)
            .string("operation", "Processing operation (filter, sort, aggregate, transform)", true)
            .build(),
        |args| async move {
            let data = args.get_array("data")?;
            let operation = args.get_str("operation")?;
            let count = data.len();
            let message = match operation {
                "filter" => format!("Filtered {count} records"),
                "sort" => format!("Sorted {count} records"),
                "aggregate" => format!("Aggregated {count} records"),
                "transform" => format!("Transformed {count} records"),
                _ => "Unknown operation".to_string(),
            };
            Ok(json!({
                "operation": operation,
                "input_count": count,
                "output_count": count.saturating_sub(1),
                "status": "completed",
                "message": message,
                "preview": data.iter().take(2).collect::<Vec<_>>(),
            }))
        },
    )
}

pub fn system_info_tool() -> ToolDefinition {
    ToolDefinition::new(
        "system_info",
        "Get system information including platform, memory and CPU usage",
        ParameterSchema::empty(),
        |_args| async move {
            Ok(json!({
                "platform": std::env::consts::OS,
                "architecture": std::env::consts::ARCH,
                "memory_usage": "45%",
                "cpu_usage": "23%",
                "disk_space": "78% used",
                "uptime": "5 days, 3 hours",
                "processes": 127,
            }))
        },
    )
}

/// All demo tools, in a stable order.
pub fn all_tools() -> Vec<ToolDefinition> {
    vec![
        web_search_tool(),
        file_operations_tool(),
        code_analysis_tool(),
        data_processing_tool(),
        system_info_tool(),
    ]
}

/// Register every demo tool into `registry`.
pub fn register_all(registry: &ToolRegistry) -> Result<()> {
    all_tools()
        .into_iter()
        .try_for_each(|tool| registry.register(tool))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn registry() -> ToolRegistry {
        let registry = ToolRegistry::new();
        register_all(&registry).unwrap();
        registry
    }

    #[test]
    fn all_tools_register_cleanly() {
        let names: Vec<String> = registry()
            .list_definitions()
            .into_iter()
            .map(|spec| spec.name)
            .collect();

        assert_eq!(
            names,
            vec![
                "web_search",
                "file_operations",
                "code_analysis",
                "data_processing",
                "system_info"
            ]
        );
    }

    #[tokio::test]
    async fn web_search_caps_results_at_three() {
        let result = registry()
            .invoke("web_search", json!({"query": "rust"}))
            .await
            .unwrap();

        assert_eq!(result["results"].as_array().unwrap().len(), 3);
        assert_eq!(result["total_results"], 10);
        assert_eq!(result["results"][0]["title"], "Result 1 for 'rust'");
    }

    #[tokio::test]
    async fn file_operations_rejects_unknown_operation() {
        let err = registry()
            .invoke("file_operations", json!({"operation": "chmod", "path": "/tmp"}))
            .await
            .unwrap_err();

        assert!(matches!(err, crate::error::AgentError::Validation { .. }));
    }

    #[tokio::test]
    async fn write_reports_content_length() {
        let result = registry()
            .invoke(
                "file_operations",
                json!({"operation": "write", "path": "a.txt", "content": "hello"}),
            )
            .await
            .unwrap();

        assert_eq!(result["message"], "Writing to file: a.txt with 5 characters");
        assert_eq!(result["content"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn file_operations_accepts_null_content() {
        let result = registry()
            .invoke(
                "file_operations",
                json!({"operation": "list", "path": "/tmp", "content": null}),
            )
            .await
            .unwrap();

        assert_eq!(result["status"], "success");
        assert_eq!(result["content"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn code_analysis_defaults_language() {
        let result = registry()
            .invoke("code_analysis", json!({"code": "a\nb\nc"}))
            .await
            .unwrap();

        assert_eq!(result["language"], "python");
        assert_eq!(result["lines_of_code"], 3);
    }

    #[tokio::test]
    async fn data_processing_previews_first_two_records() {
        let result = registry()
            .invoke(
                "data_processing",
                json!({"data": [{"x": 1}, {"x": 2}, {"x": 3}], "operation": "sort"}),
            )
            .await
            .unwrap();

        assert_eq!(result["message"], "Sorted 3 records");
        assert_eq!(result["output_count"], 2);
        assert_eq!(result["preview"], json!([{"x": 1}, {"x": 2}]));
    }
}
