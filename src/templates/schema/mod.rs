//! Template schemas
//!
//! A schema is a set of named [`Definition`]s. Schema documents are read with
//! the same template reader used for workflows, validated against a small
//! bootstrap schema (see [`internal`]).

pub mod definition;
pub mod internal;

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

pub use definition::{
    Definition, DefinitionKind, DefinitionType, MappingDefinition, PropertyDefinition,
    StringDefinition,
};

use super::context::{TemplateContext, TemplateLimits};
use super::object_reader::{EventReader, ObjectReader};
use super::reader::read_template;
use super::tokens::{TemplateToken, TokenTypeError};
use definition::{ANY, BOOLEAN, MAPPING, NULL, NUMBER, SEQUENCE, STRING};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Schema definition '{0}' not found")]
    NotFound(String),

    #[error("{0}")]
    Invalid(String),

    #[error("Failed to load schema: {0}")]
    Load(String),
}

impl From<TokenTypeError> for SchemaError {
    fn from(err: TokenTypeError) -> Self {
        SchemaError::Load(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct TemplateSchema {
    pub version: Option<String>,
    definitions: HashMap<String, Arc<Definition>>,
}

impl Default for TemplateSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateSchema {
    /// A schema holding only the built-in definitions
    /// (`null`, `boolean`, `number`, `string`, `sequence`, `mapping`, `any`).
    pub fn new() -> Self {
        let mut schema = Self {
            version: None,
            definitions: HashMap::new(),
        };

        schema.insert(Definition::new(NULL, DefinitionKind::Null));
        schema.insert(Definition::new(BOOLEAN, DefinitionKind::Boolean));
        schema.insert(Definition::new(NUMBER, DefinitionKind::Number));
        schema.insert(Definition::new(
            STRING,
            DefinitionKind::String(StringDefinition::default()),
        ));
        schema.insert(Definition::new(
            SEQUENCE,
            DefinitionKind::Sequence {
                item_type: ANY.to_string(),
            },
        ));
        schema.insert(Definition::new(
            MAPPING,
            DefinitionKind::Mapping(MappingDefinition {
                properties: Vec::new(),
                loose_key_type: Some(STRING.to_string()),
                loose_value_type: Some(ANY.to_string()),
            }),
        ));
        schema.insert(Definition::new(
            ANY,
            DefinitionKind::OneOf {
                one_of: [NULL, BOOLEAN, NUMBER, STRING, SEQUENCE, MAPPING]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            },
        ));

        schema
    }

    pub fn insert(&mut self, definition: Definition) {
        self.definitions
            .insert(definition.key.clone(), Arc::new(definition));
    }

    pub fn get_definition(&self, name: &str) -> Result<&Arc<Definition>, SchemaError> {
        self.definitions
            .get(name)
            .ok_or_else(|| SchemaError::NotFound(name.to_string()))
    }

    pub fn definitions(&self) -> impl Iterator<Item = &Arc<Definition>> {
        self.definitions.values()
    }

    /// Validate every definition. One-of definitions are checked after all
    /// other definitions, once every reference can be resolved.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut names: Vec<&String> = self.definitions.keys().collect();
        names.sort();

        let (one_ofs, plain): (Vec<_>, Vec<_>) = names
            .into_iter()
            .filter_map(|name| self.definitions.get(name))
            .partition(|d| d.definition_type() == DefinitionType::OneOf);

        for definition in plain.into_iter().chain(one_ofs) {
            definition.validate(self)?;
        }
        Ok(())
    }

    /// The definitions of `ty` reachable from `definition`: the definition
    /// itself, or the matching alternatives of a one-of.
    pub fn definitions_of_type(
        &self,
        definition: &Arc<Definition>,
        ty: DefinitionType,
    ) -> Vec<Arc<Definition>> {
        match &definition.kind {
            DefinitionKind::OneOf { one_of } => one_of
                .iter()
                .filter_map(|name| self.definitions.get(name))
                .filter(|d| d.definition_type() == ty)
                .cloned()
                .collect(),
            _ if definition.definition_type() == ty => vec![Arc::clone(definition)],
            _ => Vec::new(),
        }
    }

    pub fn scalar_definitions(&self, definition: &Arc<Definition>) -> Vec<Arc<Definition>> {
        match &definition.kind {
            DefinitionKind::OneOf { one_of } => one_of
                .iter()
                .filter_map(|name| self.definitions.get(name))
                .filter(|d| d.is_scalar())
                .cloned()
                .collect(),
            _ if definition.is_scalar() => vec![Arc::clone(definition)],
            _ => Vec::new(),
        }
    }

    /// Find the type of `property` among candidate mapping definitions and
    /// drop the candidates that do not declare it.
    pub fn match_property_and_filter(
        definitions: &mut Vec<Arc<Definition>>,
        property: &str,
    ) -> Option<String> {
        let mut result = None;
        let mut missing_in_some = false;
        for definition in definitions.iter() {
            match definition.as_mapping().and_then(|m| m.property(property)) {
                Some(p) => result = Some(p.type_name.clone()),
                None => missing_in_some = true,
            }
        }

        if result.is_some() && missing_in_some {
            definitions.retain(|d| d.as_mapping().and_then(|m| m.property(property)).is_some());
        }
        result
    }

    /// Load a schema document read through `reader`.
    pub fn load(reader: &mut dyn ObjectReader) -> Result<Self, SchemaError> {
        let internal = Arc::new(internal::internal_schema());
        let mut context = TemplateContext::new(internal, TemplateLimits::default());
        let template = read_template(&mut context, internal::TEMPLATE_SCHEMA, reader, None);

        if !context.errors.is_empty() {
            let messages: Vec<String> = context.errors.iter().map(|e| e.to_string()).collect();
            return Err(SchemaError::Load(messages.join("\n")));
        }
        let template = template
            .ok_or_else(|| SchemaError::Load("The schema document is empty".to_string()))?;

        let mut schema = Self::new();
        for pair in template.assert_mapping("template schema")? {
            let key = pair.key.assert_string("template schema key")?;
            match key {
                "version" => {
                    schema.version = Some(pair.value.assert_string("version")?.to_string());
                }
                "definitions" => {
                    for definition in pair.value.assert_mapping("definitions")? {
                        let name = definition.key.assert_string("definition key")?;
                        schema.insert(read_definition(name, &definition.value)?);
                    }
                }
                other => {
                    return Err(SchemaError::Load(format!(
                        "Unexpected template schema property '{}'",
                        other
                    )))
                }
            }
        }

        schema.validate()?;
        debug!(definitions = schema.definitions.len(), "loaded template schema");
        Ok(schema)
    }

    /// Load a schema from JSON text.
    pub fn from_json(text: &str) -> Result<Self, SchemaError> {
        let mut reader =
            EventReader::from_json(None, text).map_err(|e| SchemaError::Load(e.to_string()))?;
        Self::load(&mut reader)
    }
}

fn read_definition(name: &str, token: &TemplateToken) -> Result<Definition, SchemaError> {
    let mut description = None;
    let mut context = Vec::new();
    let mut kind = None;

    for pair in token.assert_mapping(&format!("definition '{}'", name))? {
        let key = pair.key.assert_string("definition property")?;
        let value = &pair.value;
        match key {
            "description" => description = Some(value.assert_string("description")?.to_string()),
            "context" => {
                for item in value.assert_sequence("context")? {
                    context.push(item.assert_string("context item")?.to_string());
                }
            }
            "null" => kind = Some(DefinitionKind::Null),
            "boolean" => kind = Some(DefinitionKind::Boolean),
            "number" => kind = Some(DefinitionKind::Number),
            "string" => kind = Some(DefinitionKind::String(read_string_definition(value)?)),
            "sequence" => {
                let mut item_type = String::new();
                for p in value.assert_mapping("sequence definition")? {
                    if p.key.assert_string("sequence definition key")? == "item-type" {
                        item_type = p.value.assert_string("item-type")?.to_string();
                    }
                }
                kind = Some(DefinitionKind::Sequence { item_type });
            }
            "mapping" => kind = Some(DefinitionKind::Mapping(read_mapping_definition(value)?)),
            "one-of" => {
                let mut one_of = Vec::new();
                for item in value.assert_sequence("one-of")? {
                    one_of.push(item.assert_string("one-of item")?.to_string());
                }
                kind = Some(DefinitionKind::OneOf { one_of });
            }
            other => {
                return Err(SchemaError::Load(format!(
                    "Unexpected property '{}' in definition '{}'",
                    other, name
                )))
            }
        }
    }

    let kind = kind.ok_or_else(|| {
        SchemaError::Load(format!("Definition '{}' does not declare a type", name))
    })?;
    Ok(Definition {
        key: name.to_string(),
        description,
        context,
        kind,
    })
}

fn read_string_definition(token: &TemplateToken) -> Result<StringDefinition, SchemaError> {
    let mut def = StringDefinition::default();
    for pair in token.assert_mapping("string definition")? {
        match pair.key.assert_string("string definition key")? {
            "constant" => def.constant = Some(pair.value.assert_string("constant")?.to_string()),
            "ignore-case" => def.ignore_case = pair.value.assert_boolean("ignore-case")?,
            "require-non-empty" => {
                def.require_non_empty = pair.value.assert_boolean("require-non-empty")?
            }
            "is-expression" => def.is_expression = pair.value.assert_boolean("is-expression")?,
            _ => {}
        }
    }
    Ok(def)
}

fn read_mapping_definition(token: &TemplateToken) -> Result<MappingDefinition, SchemaError> {
    let mut def = MappingDefinition::default();
    for pair in token.assert_mapping("mapping definition")? {
        match pair.key.assert_string("mapping definition key")? {
            "properties" => {
                for property in pair.value.assert_mapping("properties")? {
                    let name = property.key.assert_string("property name")?;
                    def.properties
                        .push((name.to_string(), read_property(&property.value)?));
                }
            }
            "loose-key-type" => {
                def.loose_key_type = Some(pair.value.assert_string("loose-key-type")?.to_string())
            }
            "loose-value-type" => {
                def.loose_value_type =
                    Some(pair.value.assert_string("loose-value-type")?.to_string())
            }
            _ => {}
        }
    }
    Ok(def)
}

/// A property is either a bare type name or `{type, required, description}`.
fn read_property(token: &TemplateToken) -> Result<PropertyDefinition, SchemaError> {
    if let Ok(type_name) = token.assert_string("property type") {
        return Ok(PropertyDefinition::new(type_name));
    }

    let mut property = PropertyDefinition::new("");
    for pair in token.assert_mapping("property")? {
        match pair.key.assert_string("property key")? {
            "type" => property.type_name = pair.value.assert_string("type")?.to_string(),
            "required" => property.required = pair.value.assert_boolean("required")?,
            "description" => {
                property.description = Some(pair.value.assert_string("description")?.to_string())
            }
            _ => {}
        }
    }
    Ok(property)
}
