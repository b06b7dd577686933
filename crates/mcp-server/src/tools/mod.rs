//! Tool registration and the built-in tool set

mod ib;
mod registry;

pub use ib::builtin_registry;
pub use registry::{
    handler, json_schema_number, json_schema_object, json_schema_string, validate_arguments,
    RegistryBuilder, RegistryError, ToolDefinition, ToolHandler, ToolRegistry,
};
