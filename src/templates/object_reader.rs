//! Reading raw document nodes
//!
//! The template reader pulls nodes through [`ObjectReader`]. Parsers for
//! concrete formats flatten their documents into a list of [`ParseEvent`]s and
//! hand them to an [`EventReader`].

use thiserror::Error;

use super::tokens::TemplateToken;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ObjectReaderError {
    #[error("{0}")]
    Parse(String),

    #[error("Expected end of document")]
    ExpectedEnd,
}

pub trait ObjectReader {
    /// Consume a scalar node, if one is next.
    fn allow_literal(&mut self) -> Option<TemplateToken>;
    fn allow_sequence_start(&mut self) -> Option<TemplateToken>;
    fn allow_sequence_end(&mut self) -> bool;
    fn allow_mapping_start(&mut self) -> Option<TemplateToken>;
    fn allow_mapping_end(&mut self) -> bool;
    fn validate_start(&mut self) -> Result<(), ObjectReaderError>;
    fn validate_end(&mut self) -> Result<(), ObjectReaderError>;
}

#[derive(Debug, Clone)]
pub enum ParseEvent {
    Literal(TemplateToken),
    SequenceStart(TemplateToken),
    SequenceEnd,
    MappingStart(TemplateToken),
    MappingEnd,
}

/// An [`ObjectReader`] over a pre-built event list
#[derive(Debug, Clone, Default)]
pub struct EventReader {
    events: Vec<ParseEvent>,
    position: usize,
}

impl EventReader {
    pub fn new(events: Vec<ParseEvent>) -> Self {
        Self {
            events,
            position: 0,
        }
    }

    /// Read a JSON document. JSON carries no positions, so tokens have no range.
    pub fn from_json(file: Option<usize>, text: &str) -> Result<Self, ObjectReaderError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| ObjectReaderError::Parse(e.to_string()))?;
        let mut events = Vec::new();
        push_json_events(file, &value, &mut events);
        Ok(Self::new(events))
    }

    fn peek(&self) -> Option<&ParseEvent> {
        self.events.get(self.position)
    }
}

impl ObjectReader for EventReader {
    fn allow_literal(&mut self) -> Option<TemplateToken> {
        match self.peek() {
            Some(ParseEvent::Literal(token)) => {
                let token = token.clone();
                self.position += 1;
                Some(token)
            }
            _ => None,
        }
    }

    fn allow_sequence_start(&mut self) -> Option<TemplateToken> {
        match self.peek() {
            Some(ParseEvent::SequenceStart(token)) => {
                let token = token.clone();
                self.position += 1;
                Some(token)
            }
            _ => None,
        }
    }

    fn allow_sequence_end(&mut self) -> bool {
        if matches!(self.peek(), Some(ParseEvent::SequenceEnd)) {
            self.position += 1;
            return true;
        }
        false
    }

    fn allow_mapping_start(&mut self) -> Option<TemplateToken> {
        match self.peek() {
            Some(ParseEvent::MappingStart(token)) => {
                let token = token.clone();
                self.position += 1;
                Some(token)
            }
            _ => None,
        }
    }

    fn allow_mapping_end(&mut self) -> bool {
        if matches!(self.peek(), Some(ParseEvent::MappingEnd)) {
            self.position += 1;
            return true;
        }
        false
    }

    fn validate_start(&mut self) -> Result<(), ObjectReaderError> {
        Ok(())
    }

    fn validate_end(&mut self) -> Result<(), ObjectReaderError> {
        if self.position < self.events.len() {
            return Err(ObjectReaderError::ExpectedEnd);
        }
        Ok(())
    }
}

fn push_json_events(file: Option<usize>, value: &serde_json::Value, events: &mut Vec<ParseEvent>) {
    use serde_json::Value;

    match value {
        Value::Null => events.push(ParseEvent::Literal(TemplateToken::null(file, None))),
        Value::Bool(b) => events.push(ParseEvent::Literal(TemplateToken::boolean(file, None, *b))),
        Value::Number(n) => events.push(ParseEvent::Literal(TemplateToken::number(
            file,
            None,
            n.as_f64().unwrap_or(f64::NAN),
        ))),
        Value::String(s) => events.push(ParseEvent::Literal(TemplateToken::string(file, None, s.as_str()))),
        Value::Array(items) => {
            events.push(ParseEvent::SequenceStart(TemplateToken::sequence(file, None)));
            for item in items {
                push_json_events(file, item, events);
            }
            events.push(ParseEvent::SequenceEnd);
        }
        Value::Object(map) => {
            events.push(ParseEvent::MappingStart(TemplateToken::mapping(file, None)));
            for (key, value) in map {
                events.push(ParseEvent::Literal(TemplateToken::string(file, None, key.as_str())));
                push_json_events(file, value, events);
            }
            events.push(ParseEvent::MappingEnd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::tokens::TokenValue;
    use assert_matches::assert_matches;

    #[test]
    fn test_json_events_in_document_order() {
        let mut reader = EventReader::from_json(Some(0), r#"{"b": [1, true], "a": null}"#).unwrap();
        reader.validate_start().unwrap();

        assert!(reader.allow_mapping_start().is_some());
        assert_matches!(reader.allow_literal().map(|t| t.value), Some(TokenValue::String { value, .. }) if value == "b");
        assert!(reader.allow_literal().is_none());
        assert!(reader.allow_sequence_start().is_some());
        assert_matches!(reader.allow_literal().map(|t| t.value), Some(TokenValue::Number(n)) if n == 1.0);
        assert_matches!(reader.allow_literal().map(|t| t.value), Some(TokenValue::Boolean(true)));
        assert!(!reader.allow_mapping_end());
        assert!(reader.allow_sequence_end());
        assert_matches!(reader.allow_literal().map(|t| t.value), Some(TokenValue::String { value, .. }) if value == "a");
        assert_matches!(reader.allow_literal().map(|t| t.value), Some(TokenValue::Null));
        assert_eq!(reader.validate_end(), Err(ObjectReaderError::ExpectedEnd));
        assert!(reader.allow_mapping_end());
        assert!(reader.validate_end().is_ok());
    }

    #[test]
    fn test_invalid_json() {
        assert_matches!(
            EventReader::from_json(None, "{"),
            Err(ObjectReaderError::Parse(_))
        );
    }
}
