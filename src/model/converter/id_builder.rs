//! Job and step identifiers

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;

pub const MAX_ID_LENGTH: usize = 100;
pub const MAX_ATTEMPTS: usize = 1000;
pub const GENERATED_ID_PREFIX: &str = "__";

const SEPARATOR: char = '_';

lazy_static! {
    static ref ID_RE: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").unwrap();
}

/// Tracks the ids used within one scope (the jobs of a workflow, or the
/// steps of a job) and generates unique ids for unnamed entries.
#[derive(Debug, Default)]
pub struct IdBuilder {
    name: String,
    /// Lower-cased, ids are case-insensitive
    distinct: HashSet<String>,
}

impl IdBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an authored id. Returns the error message when the id is
    /// malformed or already taken.
    pub fn try_add_known_id(&mut self, value: &str) -> Result<(), String> {
        if !is_valid_id(value) {
            return Err(format!(
                "The identifier '{}' is invalid. IDs may only contain alphanumeric characters, '_', and '-'. IDs must start with a letter or '_' and must be less than {} characters.",
                value, MAX_ID_LENGTH
            ));
        }

        if value.starts_with(GENERATED_ID_PREFIX) {
            return Err(format!(
                "The identifier '{}' is invalid. IDs starting with '{}' are reserved.",
                value, GENERATED_ID_PREFIX
            ));
        }

        if !self.distinct.insert(value.to_lowercase()) {
            return Err(format!(
                "The identifier '{}' may not be used more than once within the same scope.",
                value
            ));
        }
        Ok(())
    }

    /// Append text to the id being built, replacing characters that are not
    /// allowed in ids.
    pub fn append_segment(&mut self, value: &str) {
        let Some(first) = value.chars().next() else {
            return;
        };

        if self.name.is_empty() {
            if !(first.is_ascii_alphabetic() || first == '_') {
                self.name.push(SEPARATOR);
            }
        } else {
            self.name.push(SEPARATOR);
        }

        for c in value.chars() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                self.name.push(c);
            } else {
                self.name.push(SEPARATOR);
            }
        }
    }

    /// Finish the current id, suffixing `_2`, `_3`, ... until it is unique.
    pub fn build(&mut self) -> Result<String, String> {
        let original = if self.name.is_empty() {
            "job".to_string()
        } else {
            std::mem::take(&mut self.name)
        };

        for attempt in 1..=MAX_ATTEMPTS {
            let suffix = if attempt == 1 {
                String::new()
            } else {
                format!("_{}", attempt)
            };
            let keep = original.len().min(MAX_ID_LENGTH - 1 - suffix.len());
            let candidate = format!("{}{}", &original[..keep], suffix);
            if self.distinct.insert(candidate.to_lowercase()) {
                return Ok(candidate);
            }
        }

        Err(format!("Unable to create a unique name from '{}'", original))
    }
}

pub fn is_valid_id(value: &str) -> bool {
    value.len() < MAX_ID_LENGTH && ID_RE.is_match(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_ids() {
        let mut builder = IdBuilder::new();
        assert!(builder.try_add_known_id("build").is_ok());
        assert!(builder.try_add_known_id("_setup-2").is_ok());

        let err = builder.try_add_known_id("BUILD").unwrap_err();
        assert_eq!(
            err,
            "The identifier 'BUILD' may not be used more than once within the same scope."
        );

        let err = builder.try_add_known_id("1st").unwrap_err();
        assert!(err.starts_with("The identifier '1st' is invalid."), "{}", err);
        assert!(builder.try_add_known_id("has space").is_err());
        assert!(builder.try_add_known_id(&"a".repeat(100)).is_err());
        assert!(builder.try_add_known_id(&"a".repeat(99)).is_ok());
        assert!(builder.try_add_known_id("__run").unwrap_err().contains("reserved"));
    }

    #[test]
    fn test_generated_ids() {
        let mut builder = IdBuilder::new();
        builder.append_segment("__actions/checkout");
        assert_eq!(builder.build().unwrap(), "__actions_checkout");

        builder.append_segment("__actions/checkout");
        assert_eq!(builder.build().unwrap(), "__actions_checkout_2");

        builder.append_segment("9lives");
        assert_eq!(builder.build().unwrap(), "_9lives");

        assert_eq!(builder.build().unwrap(), "job");
    }

    #[test]
    fn test_generated_ids_respect_known_ids() {
        let mut builder = IdBuilder::new();
        builder.try_add_known_id("__run").unwrap_err();
        builder.try_add_known_id("compile").unwrap();

        builder.append_segment("compile");
        assert_eq!(builder.build().unwrap(), "compile_2");
    }

    #[test]
    fn test_generated_ids_are_truncated() {
        let mut builder = IdBuilder::new();
        builder.append_segment(&"x".repeat(150));
        let first = builder.build().unwrap();
        assert_eq!(first.len(), MAX_ID_LENGTH - 1);

        builder.append_segment(&"x".repeat(150));
        let second = builder.build().unwrap();
        assert!(second.ends_with("_2"));
        assert_eq!(second.len(), MAX_ID_LENGTH - 1);
        assert!(is_valid_id(&second));
    }
}
