//! Schema definitions

use std::fmt;

use super::{SchemaError, TemplateSchema};
use crate::templates::tokens::{TemplateToken, TokenValue};

pub const NULL: &str = "null";
pub const BOOLEAN: &str = "boolean";
pub const NUMBER: &str = "number";
pub const STRING: &str = "string";
pub const SEQUENCE: &str = "sequence";
pub const MAPPING: &str = "mapping";
pub const ANY: &str = "any";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionType {
    Null,
    Boolean,
    Number,
    String,
    Sequence,
    Mapping,
    OneOf,
}

impl fmt::Display for DefinitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DefinitionType::Null => "null",
            DefinitionType::Boolean => "boolean",
            DefinitionType::Number => "number",
            DefinitionType::String => "string",
            DefinitionType::Sequence => "sequence",
            DefinitionType::Mapping => "mapping",
            DefinitionType::OneOf => "one-of",
        };
        f.write_str(name)
    }
}

/// A named type in a template schema
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub key: String,
    pub description: Option<String>,
    /// Named-values and `name(min,max)` functions expressions may use here
    pub context: Vec<String>,
    pub kind: DefinitionKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DefinitionKind {
    Null,
    Boolean,
    Number,
    String(StringDefinition),
    Sequence { item_type: String },
    Mapping(MappingDefinition),
    OneOf { one_of: Vec<String> },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringDefinition {
    pub constant: Option<String>,
    pub ignore_case: bool,
    pub require_non_empty: bool,
    /// The whole value is an expression even without `${{ }}`
    pub is_expression: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingDefinition {
    /// Declared properties, in declaration order
    pub properties: Vec<(String, PropertyDefinition)>,
    pub loose_key_type: Option<String>,
    pub loose_value_type: Option<String>,
}

impl MappingDefinition {
    pub fn property(&self, name: &str) -> Option<&PropertyDefinition> {
        self.properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, p)| p)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDefinition {
    pub type_name: String,
    pub required: bool,
    pub description: Option<String>,
}

impl PropertyDefinition {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            required: false,
            description: None,
        }
    }

    pub fn required(type_name: impl Into<String>) -> Self {
        Self {
            required: true,
            ..Self::new(type_name)
        }
    }
}

impl Definition {
    pub fn new(key: impl Into<String>, kind: DefinitionKind) -> Self {
        Self {
            key: key.into(),
            description: None,
            context: Vec::new(),
            kind,
        }
    }

    pub fn definition_type(&self) -> DefinitionType {
        match self.kind {
            DefinitionKind::Null => DefinitionType::Null,
            DefinitionKind::Boolean => DefinitionType::Boolean,
            DefinitionKind::Number => DefinitionType::Number,
            DefinitionKind::String(_) => DefinitionType::String,
            DefinitionKind::Sequence { .. } => DefinitionType::Sequence,
            DefinitionKind::Mapping(_) => DefinitionType::Mapping,
            DefinitionKind::OneOf { .. } => DefinitionType::OneOf,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self.kind,
            DefinitionKind::Null
                | DefinitionKind::Boolean
                | DefinitionKind::Number
                | DefinitionKind::String(_)
        )
    }

    pub fn as_mapping(&self) -> Option<&MappingDefinition> {
        match &self.kind {
            DefinitionKind::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&StringDefinition> {
        match &self.kind {
            DefinitionKind::String(s) => Some(s),
            _ => None,
        }
    }

    /// Whether a literal token satisfies this scalar definition.
    pub fn is_match(&self, token: &TemplateToken) -> bool {
        match (&self.kind, &token.value) {
            (DefinitionKind::Null, TokenValue::Null) => true,
            (DefinitionKind::Boolean, TokenValue::Boolean(_)) => true,
            (DefinitionKind::Number, TokenValue::Number(_)) => true,
            (DefinitionKind::String(def), TokenValue::String { value, .. }) => {
                match &def.constant {
                    Some(constant) if def.ignore_case => constant.eq_ignore_ascii_case(value),
                    Some(constant) => constant == value,
                    None => !def.require_non_empty || !value.is_empty(),
                }
            }
            _ => false,
        }
    }

    /// Check the definition's own rules and references.
    pub fn validate(&self, schema: &TemplateSchema) -> Result<(), SchemaError> {
        let name = &self.key;
        match &self.kind {
            DefinitionKind::Null | DefinitionKind::Boolean | DefinitionKind::Number => Ok(()),
            DefinitionKind::String(def) => {
                if def.constant.is_some() && def.require_non_empty {
                    return Err(SchemaError::Invalid(format!(
                        "Properties 'constant' and 'require-non-empty' cannot both be set on '{}'",
                        name
                    )));
                }
                Ok(())
            }
            DefinitionKind::Sequence { item_type } => {
                if item_type.is_empty() {
                    return Err(SchemaError::Invalid(format!(
                        "'{}' does not define 'item-type'",
                        name
                    )));
                }
                schema.get_definition(item_type)?;
                Ok(())
            }
            DefinitionKind::Mapping(def) => validate_mapping(name, def, schema),
            DefinitionKind::OneOf { one_of } => validate_one_of(name, one_of, schema),
        }
    }
}

fn validate_mapping(
    name: &str,
    def: &MappingDefinition,
    schema: &TemplateSchema,
) -> Result<(), SchemaError> {
    match (&def.loose_key_type, &def.loose_value_type) {
        (Some(key_type), Some(value_type)) => {
            let key_definition = schema.get_definition(key_type)?;
            if key_definition.definition_type() != DefinitionType::String {
                return Err(SchemaError::Invalid(format!(
                    "'{}' sets 'loose-key-type' to '{}', which is not a 'string' definition",
                    name, key_type
                )));
            }
            schema.get_definition(value_type)?;
        }
        (Some(_), None) => {
            return Err(SchemaError::Invalid(format!(
                "'{}' sets 'loose-key-type' without 'loose-value-type'",
                name
            )))
        }
        (None, Some(_)) => {
            return Err(SchemaError::Invalid(format!(
                "'{}' sets 'loose-value-type' without 'loose-key-type'",
                name
            )))
        }
        (None, None) => {}
    }

    for (property, value) in &def.properties {
        if value.type_name.is_empty() {
            return Err(SchemaError::Invalid(format!(
                "Property '{}' of '{}' does not define a type",
                property, name
            )));
        }
        schema.get_definition(&value.type_name)?;
    }
    Ok(())
}

fn validate_one_of(
    name: &str,
    one_of: &[String],
    schema: &TemplateSchema,
) -> Result<(), SchemaError> {
    if one_of.is_empty() {
        return Err(SchemaError::Invalid(format!(
            "'{}' does not contain any references",
            name
        )));
    }

    let mut seen: Vec<&str> = Vec::new();
    let mut mappings: Vec<&MappingDefinition> = Vec::new();
    let mut found_loose_key_type = false;
    let mut single_types: Vec<DefinitionType> = Vec::new();
    let mut strings: Vec<&StringDefinition> = Vec::new();

    for nested in one_of {
        if seen.contains(&nested.as_str()) {
            return Err(SchemaError::Invalid(format!(
                "'{}' contains duplicate nested type '{}'",
                name, nested
            )));
        }
        seen.push(nested);

        let definition = schema.get_definition(nested)?;
        if !definition.context.is_empty() {
            return Err(SchemaError::Invalid(format!(
                "'{}' is a one-of definition and references another definition that defines context. This is currently not supported.",
                name
            )));
        }

        match &definition.kind {
            DefinitionKind::Mapping(mapping) => {
                found_loose_key_type |= mapping.loose_key_type.is_some();
                mappings.push(mapping);
            }
            DefinitionKind::Sequence { .. }
            | DefinitionKind::Null
            | DefinitionKind::Boolean
            | DefinitionKind::Number => {
                let ty = definition.definition_type();
                if single_types.contains(&ty) {
                    return Err(SchemaError::Invalid(format!(
                        "'{}' refers to more than one definition of type '{}'",
                        name, ty
                    )));
                }
                single_types.push(ty);
            }
            DefinitionKind::String(string) => {
                let mixed = strings
                    .first()
                    .is_some_and(|first| first.constant.is_none() || string.constant.is_none());
                if mixed {
                    return Err(SchemaError::Invalid(format!(
                        "'{}' refers to more than one definition of type 'string', but some do not set 'constant'",
                        name
                    )));
                }
                strings.push(string);
            }
            DefinitionKind::OneOf { .. } => {
                return Err(SchemaError::Invalid(format!(
                    "'{}' refers to '{}', which is also a one-of definition. Nested one-of definitions are not supported",
                    name, nested
                )));
            }
        }
    }

    if mappings.len() > 1 {
        if found_loose_key_type {
            return Err(SchemaError::Invalid(format!(
                "'{}' refers to two mappings and at least one sets 'loose-key-type'. This is not currently supported.",
                name
            )));
        }

        let mut seen_properties: Vec<(&str, &str)> = Vec::new();
        for mapping in &mappings {
            for (property, value) in &mapping.properties {
                match seen_properties.iter().find(|(p, _)| p == property) {
                    Some((_, existing)) if *existing == value.type_name => {}
                    Some(_) => {
                        return Err(SchemaError::Invalid(format!(
                            "'{}' contains two mappings with the same property, but each refers to a different type. All matching properties must refer to the same type.",
                            name
                        )));
                    }
                    None => seen_properties.push((property, &value.type_name)),
                }
            }
        }
    }

    Ok(())
}
