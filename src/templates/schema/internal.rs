//! The bootstrap schema that describes the schema document format itself.
//!
//! Built directly in code; everything else is loaded through the reader
//! against this schema.

use super::definition::{
    Definition, DefinitionKind, MappingDefinition, PropertyDefinition, StringDefinition, ANY,
    BOOLEAN, STRING,
};
use super::TemplateSchema;

pub const TEMPLATE_SCHEMA: &str = "template-schema";
pub const DEFINITIONS: &str = "definitions";
pub const DEFINITION: &str = "definition";
pub const NON_EMPTY_STRING: &str = "non-empty-string";
pub const SEQUENCE_OF_NON_EMPTY_STRING: &str = "sequence-of-non-empty-string";

const PROPERTIES: &str = "properties";
const PROPERTY_VALUE: &str = "property-value";
const MAPPING_PROPERTY_VALUE: &str = "mapping-property-value";

/// Each kind of definition is a mapping with a marker property naming its type
const DEFINITION_KINDS: &[(&str, &str)] = &[
    ("null", "null-definition"),
    ("boolean", "boolean-definition"),
    ("number", "number-definition"),
    ("string", "string-definition"),
    ("sequence", "sequence-definition"),
    ("mapping", "mapping-definition"),
    ("one-of", "one-of-definition"),
];

pub fn internal_schema() -> TemplateSchema {
    let mut schema = TemplateSchema::new();

    schema.insert(mapping(
        TEMPLATE_SCHEMA,
        vec![
            ("version", PropertyDefinition::new(NON_EMPTY_STRING)),
            ("definitions", PropertyDefinition::new(DEFINITIONS)),
        ],
    ));

    schema.insert(loose_mapping(DEFINITIONS, NON_EMPTY_STRING, DEFINITION));

    schema.insert(Definition::new(
        DEFINITION,
        DefinitionKind::OneOf {
            one_of: DEFINITION_KINDS
                .iter()
                .map(|(_, def)| def.to_string())
                .collect(),
        },
    ));

    for (marker, name) in DEFINITION_KINDS {
        let properties_type = match *marker {
            "one-of" => SEQUENCE_OF_NON_EMPTY_STRING.to_string(),
            other => format!("{}-definition-properties", other),
        };
        schema.insert(mapping(
            name,
            vec![
                ("description", PropertyDefinition::new(STRING)),
                ("context", PropertyDefinition::new(SEQUENCE_OF_NON_EMPTY_STRING)),
                (marker, PropertyDefinition::required(properties_type)),
            ],
        ));
    }

    schema.insert(mapping("null-definition-properties", vec![]));
    schema.insert(mapping("boolean-definition-properties", vec![]));
    schema.insert(mapping("number-definition-properties", vec![]));
    schema.insert(mapping(
        "string-definition-properties",
        vec![
            ("constant", PropertyDefinition::new(NON_EMPTY_STRING)),
            ("ignore-case", PropertyDefinition::new(BOOLEAN)),
            ("require-non-empty", PropertyDefinition::new(BOOLEAN)),
            ("is-expression", PropertyDefinition::new(BOOLEAN)),
        ],
    ));
    schema.insert(mapping(
        "sequence-definition-properties",
        vec![("item-type", PropertyDefinition::required(NON_EMPTY_STRING))],
    ));
    schema.insert(mapping(
        "mapping-definition-properties",
        vec![
            ("properties", PropertyDefinition::new(PROPERTIES)),
            ("loose-key-type", PropertyDefinition::new(NON_EMPTY_STRING)),
            ("loose-value-type", PropertyDefinition::new(NON_EMPTY_STRING)),
        ],
    ));

    schema.insert(loose_mapping(PROPERTIES, NON_EMPTY_STRING, PROPERTY_VALUE));
    schema.insert(Definition::new(
        PROPERTY_VALUE,
        DefinitionKind::OneOf {
            one_of: vec![NON_EMPTY_STRING.to_string(), MAPPING_PROPERTY_VALUE.to_string()],
        },
    ));
    schema.insert(mapping(
        MAPPING_PROPERTY_VALUE,
        vec![
            ("type", PropertyDefinition::required(NON_EMPTY_STRING)),
            ("required", PropertyDefinition::new(BOOLEAN)),
            ("description", PropertyDefinition::new(STRING)),
        ],
    ));

    schema.insert(Definition::new(
        NON_EMPTY_STRING,
        DefinitionKind::String(StringDefinition {
            require_non_empty: true,
            ..Default::default()
        }),
    ));
    schema.insert(Definition::new(
        SEQUENCE_OF_NON_EMPTY_STRING,
        DefinitionKind::Sequence {
            item_type: NON_EMPTY_STRING.to_string(),
        },
    ));

    schema
}

fn mapping(name: &str, properties: Vec<(&str, PropertyDefinition)>) -> Definition {
    Definition::new(
        name,
        DefinitionKind::Mapping(MappingDefinition {
            properties: properties
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            ..Default::default()
        }),
    )
}

fn loose_mapping(name: &str, key_type: &str, value_type: &str) -> Definition {
    Definition::new(
        name,
        DefinitionKind::Mapping(MappingDefinition {
            properties: Vec::new(),
            loose_key_type: Some(key_type.to_string()),
            loose_value_type: Some(value_type.to_string()),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_schema_is_valid() {
        let schema = internal_schema();
        schema.validate().expect("bootstrap schema validates");
        assert!(schema.get_definition(TEMPLATE_SCHEMA).is_ok());
        assert!(schema.get_definition(ANY).is_ok());
    }
}
