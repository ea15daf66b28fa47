//! Schema-driven templates
//!
//! A document is read against a [`TemplateSchema`] into a tree of
//! [`TemplateToken`]s; `${{ }}` spans in string values become expression
//! tokens along the way.

pub mod context;
pub mod definition_info;
pub mod object_reader;
pub mod reader;
pub mod schema;
pub mod spans;
pub mod tokens;

pub use context::{
    TemplateContext, TemplateLimits, TemplateValidationError, TemplateValidationErrors,
};
pub use definition_info::DefinitionInfo;
pub use object_reader::{EventReader, ObjectReader, ObjectReaderError, ParseEvent};
pub use reader::read_template;
pub use schema::{SchemaError, TemplateSchema};
pub use tokens::{MappingPair, TemplateToken, TokenPosition, TokenRange, TokenValue};
