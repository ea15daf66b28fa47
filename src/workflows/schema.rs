//! The embedded workflow schema

use std::sync::Arc;

use lazy_static::lazy_static;

use crate::templates::schema::{SchemaError, TemplateSchema};

/// Root definition of a workflow document
pub const WORKFLOW_ROOT: &str = "workflow-root";

const WORKFLOW_SCHEMA_JSON: &str = include_str!("workflow-v1.0.json");

lazy_static! {
    static ref WORKFLOW_SCHEMA: Result<Arc<TemplateSchema>, SchemaError> =
        TemplateSchema::from_json(WORKFLOW_SCHEMA_JSON).map(Arc::new);
}

/// The workflow schema, loaded once per process.
pub fn workflow_schema() -> Result<Arc<TemplateSchema>, SchemaError> {
    WORKFLOW_SCHEMA.clone()
}
