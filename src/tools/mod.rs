//! Tool system: schemas, definitions and the registry.

pub mod arguments;
pub mod builtin;
pub mod definition;
pub mod registry;
pub mod schema;

pub use arguments::ToolArguments;
pub use definition::{ToolDefinition, ToolHandler, ToolSpec};
pub use registry::ToolRegistry;
pub use schema::{ParamType, ParameterBuilder, ParameterSchema, ParameterSpec};
