//! Tools module - Capabilities the model can invoke
//!
//! Every capability implements the [`Tool`] trait. The [`ToolRegistry`] is
//! built once at startup from a fixed list of tools and never changes
//! afterwards; its [`ToolDefinition`]s are the catalog advertised to the
//! model. The [`Dispatcher`] turns a model-issued invocation into a textual
//! result, absorbing every failure on the way.
//!
//! # Example
//!
//! ```rust
//! use robotcli::tools::ToolRegistry;
//!
//! let registry = ToolRegistry::builtin().unwrap();
//! assert!(registry.lookup("list_directory").is_some());
//! assert!(registry.lookup("frobnicate").is_none());
//! ```

pub mod archive;
pub mod dispatch;
pub mod filesystem;
pub mod git;
pub mod paths;
pub mod search;
pub mod system;

pub use dispatch::{Dispatcher, InvocationResult, InvocationStatus};

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, RobotError};

/// Environment handed to every tool call.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Base directory for relative paths
    pub workspace: Option<PathBuf>,
    /// Where `delete_file` moves files when `safe` is set
    pub trash_dir: Option<PathBuf>,
}

impl ToolContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workspace(mut self, workspace: &str) -> Self {
        self.workspace = Some(PathBuf::from(workspace));
        self
    }

    pub fn with_trash_dir(mut self, trash_dir: PathBuf) -> Self {
        self.trash_dir = Some(trash_dir);
        self
    }
}

/// A named operation the model can request.
///
/// Implementations are independent of each other and share no state. A
/// failure is returned as `Err`; the dispatcher converts it to text.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name the model uses to request this tool
    fn name(&self) -> &str;

    /// One-line description shown to the model
    fn description(&self) -> &str;

    /// JSON Schema object describing the accepted arguments
    fn parameters(&self) -> Value;

    /// Run the tool with already-parsed arguments.
    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String>;
}

/// Catalog entry describing one capability to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    /// Names listed in the schema's `required` array.
    pub fn required_parameters(&self) -> Vec<&str> {
        required_fields(&self.parameters)
    }
}

/// Names listed in a JSON Schema object's `required` array.
pub fn required_fields(schema: &Value) -> Vec<&str> {
    schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default()
}

/// Deserialize tool arguments into a typed struct.
///
/// Failures surface as [`RobotError::InvalidArguments`] so the dispatcher can
/// report them as malformed arguments rather than execution failures.
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T> {
    serde_json::from_value(args).map_err(|e| RobotError::InvalidArguments(e.to_string()))
}

/// Immutable name-to-tool catalog.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Build a registry from a fixed list of tools.
    ///
    /// # Errors
    ///
    /// Returns [`RobotError::Config`] if two tools share a name.
    pub fn new(tools: Vec<Box<dyn Tool>>) -> Result<Self> {
        let mut index = HashMap::with_capacity(tools.len());
        for (i, tool) in tools.iter().enumerate() {
            if index.insert(tool.name().to_string(), i).is_some() {
                return Err(RobotError::Config(format!(
                    "duplicate tool name: {}",
                    tool.name()
                )));
            }
        }
        Ok(Self { tools, index })
    }

    /// Registry with every built-in capability.
    ///
    /// # Errors
    ///
    /// Returns [`RobotError::Config`] if two built-in tools share a name.
    pub fn builtin() -> Result<Self> {
        Self::new(vec![
            Box::new(filesystem::CreateFileTool),
            Box::new(filesystem::DeleteFileTool),
            Box::new(filesystem::RenameFileTool),
            Box::new(filesystem::FileInfoTool),
            Box::new(filesystem::MoveFileTool),
            Box::new(filesystem::CopyFileTool),
            Box::new(filesystem::MakeDirectoryTool),
            Box::new(filesystem::ListDirectoryTool),
            Box::new(search::SearchFilesTool),
            Box::new(filesystem::OrganizeByExtensionTool),
            Box::new(filesystem::ReadFileTool),
            Box::new(filesystem::WriteFileTool),
            Box::new(filesystem::AppendFileTool),
            Box::new(archive::ZipFolderTool),
            Box::new(archive::ExtractArchiveTool),
            Box::new(system::CheckResourcesTool),
            Box::new(system::DiskUsageTool),
            Box::new(system::ListProcessesTool),
            Box::new(search::FindDuplicatesTool),
            Box::new(search::FindLargeFilesTool),
            Box::new(git::GitManagerTool),
        ])
    }

    /// Find a tool by name.
    pub fn lookup(&self, name: &str) -> Option<&dyn Tool> {
        self.index.get(name).map(|&i| self.tools[i].as_ref())
    }

    /// Catalog entries in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters(),
            })
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the message back"
        }

        fn parameters(&self) -> Value {
            json!({
                "type": "object",
                "properties": {"message": {"type": "string"}},
                "required": ["message"]
            })
        }

        async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<String> {
            Ok(args["message"].as_str().unwrap_or_default().to_string())
        }
    }

    #[test]
    fn test_registry_lookup() {
        let registry = ToolRegistry::new(vec![Box::new(EchoTool)]).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup("echo").is_some());
        assert!(registry.lookup("missing").is_none());
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let result = ToolRegistry::new(vec![Box::new(EchoTool), Box::new(EchoTool)]);
        assert!(matches!(result, Err(RobotError::Config(_))));
    }

    #[test]
    fn test_definitions_match_tools() {
        let registry = ToolRegistry::new(vec![Box::new(EchoTool)]).unwrap();
        let defs = registry.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
        assert_eq!(defs[0].required_parameters(), vec!["message"]);
    }

    #[test]
    fn test_builtin_registry_complete() {
        let registry = ToolRegistry::builtin().unwrap();
        assert_eq!(registry.len(), 21);
        for name in ["check_resources", "disk_usage", "list_processes", "git_manager"] {
            assert!(registry.lookup(name).is_some(), "{}", name);
        }
    }

    #[test]
    fn test_required_fields_without_required_array() {
        assert!(required_fields(&json!({"type": "object"})).is_empty());
    }

    #[test]
    fn test_builtin_names_unique_and_schemas_valid() {
        let registry = ToolRegistry::builtin().unwrap();
        let names = registry.names();
        let mut deduped = names.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(names.len(), deduped.len());

        for def in registry.definitions() {
            assert_eq!(def.parameters["type"], "object", "{}", def.name);
            assert!(def.parameters["properties"].is_object(), "{}", def.name);
            assert!(!def.description.is_empty(), "{}", def.name);
        }
    }

    #[test]
    fn test_parse_args_reports_invalid_arguments() {
        #[derive(Debug, serde::Deserialize)]
        struct Args {
            #[allow(dead_code)]
            path: String,
        }
        let err = parse_args::<Args>(json!({"path": 5})).unwrap_err();
        assert!(matches!(err, RobotError::InvalidArguments(_)));
    }
}
