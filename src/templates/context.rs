//! Shared state threaded through template reading and conversion

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::schema::TemplateSchema;
use super::tokens::{TemplateToken, TokenRange};

/// Bounds applied while reading a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateLimits {
    pub max_errors: usize,
    pub max_error_message_length: usize,
    pub max_depth: usize,
    pub max_events: usize,
    pub max_bytes: usize,
}

impl Default for TemplateLimits {
    fn default() -> Self {
        Self {
            max_errors: 100,
            max_error_message_length: 500,
            max_depth: 50,
            max_events: 1_000_000,
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

/// A problem found in a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateValidationError {
    pub message: String,
    pub file: Option<String>,
    pub range: Option<TokenRange>,
}

impl fmt::Display for TemplateValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, &self.range) {
            (Some(file), Some(range)) => write!(
                f,
                "{} (Line: {}, Col: {}): {}",
                file, range.start.line, range.start.column, self.message
            ),
            (None, Some(range)) => write!(
                f,
                "(Line: {}, Col: {}): {}",
                range.start.line, range.start.column, self.message
            ),
            (Some(file), None) => write!(f, "{}: {}", file, self.message),
            (None, None) => f.write_str(&self.message),
        }
    }
}

/// Error list bounded by count and message length
#[derive(Debug, Clone)]
pub struct TemplateValidationErrors {
    max_errors: usize,
    max_message_length: usize,
    errors: Vec<TemplateValidationError>,
}

impl TemplateValidationErrors {
    pub fn new(max_errors: usize, max_message_length: usize) -> Self {
        Self {
            max_errors,
            max_message_length,
            errors: Vec::new(),
        }
    }

    /// Record an error. Errors beyond the count limit are dropped.
    pub fn add(&mut self, mut error: TemplateValidationError) {
        if self.errors.len() >= self.max_errors {
            return;
        }

        if error.message.chars().count() > self.max_message_length {
            let truncated: String = error.message.chars().take(self.max_message_length).collect();
            error.message = format!("{}[...]", truncated);
        }
        self.errors.push(error);
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TemplateValidationError> {
        self.errors.iter()
    }

    pub fn clear(&mut self) {
        self.errors.clear();
    }

    pub fn into_vec(self) -> Vec<TemplateValidationError> {
        self.errors
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateLimitError {
    #[error("Maximum object depth exceeded. The limit is {0}.")]
    MaxDepth(usize),

    #[error("Maximum number of nodes exceeded. The limit is {0}.")]
    MaxEvents(usize),

    #[error("Maximum object size exceeded. The limit is {0} bytes.")]
    MaxBytes(usize),
}

/// Tracks nesting depth, node count and approximate size while reading
#[derive(Debug, Clone)]
pub struct TemplateMemory {
    limits: TemplateLimits,
    depth: usize,
    events: usize,
    bytes: usize,
}

/// Fixed per-node cost, so documents of many tiny nodes still count
const NODE_OVERHEAD: usize = 16;

impl TemplateMemory {
    pub fn new(limits: TemplateLimits) -> Self {
        Self {
            limits,
            depth: 0,
            events: 0,
            bytes: 0,
        }
    }

    pub fn increment_depth(&mut self) -> Result<(), TemplateLimitError> {
        self.depth += 1;
        if self.depth > self.limits.max_depth {
            return Err(TemplateLimitError::MaxDepth(self.limits.max_depth));
        }
        Ok(())
    }

    pub fn decrement_depth(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn increment_events(&mut self) -> Result<(), TemplateLimitError> {
        self.events += 1;
        if self.events > self.limits.max_events {
            return Err(TemplateLimitError::MaxEvents(self.limits.max_events));
        }
        Ok(())
    }

    pub fn add_bytes(&mut self, bytes: usize) -> Result<(), TemplateLimitError> {
        self.bytes += bytes;
        if self.bytes > self.limits.max_bytes {
            return Err(TemplateLimitError::MaxBytes(self.limits.max_bytes));
        }
        Ok(())
    }

    /// Account for one token: one event plus its approximate size.
    pub fn add_token(&mut self, token: &TemplateToken) -> Result<(), TemplateLimitError> {
        use super::tokens::TokenValue;

        self.increment_events()?;
        let size = match &token.value {
            TokenValue::String { value, .. } => value.len(),
            TokenValue::BasicExpression { expression, .. } => expression.len(),
            _ => 0,
        };
        self.add_bytes(NODE_OVERHEAD + size)
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// State for one read or conversion: the schema, the error sink, memory
/// accounting and the table of file names tokens refer to by index.
#[derive(Debug, Clone)]
pub struct TemplateContext {
    pub schema: Arc<TemplateSchema>,
    pub errors: TemplateValidationErrors,
    pub memory: TemplateMemory,
    pub limits: TemplateLimits,
    file_names: Vec<String>,
}

impl TemplateContext {
    pub fn new(schema: Arc<TemplateSchema>, limits: TemplateLimits) -> Self {
        Self {
            schema,
            errors: TemplateValidationErrors::new(limits.max_errors, limits.max_error_message_length),
            memory: TemplateMemory::new(limits),
            limits,
            file_names: Vec::new(),
        }
    }

    /// The id for `name`, registering it on first use.
    pub fn get_file_id(&mut self, name: &str) -> usize {
        if let Some(id) = self.file_names.iter().position(|n| n == name) {
            return id;
        }
        self.file_names.push(name.to_string());
        self.file_names.len() - 1
    }

    pub fn get_file_name(&self, id: usize) -> Option<&str> {
        self.file_names.get(id).map(String::as_str)
    }

    /// Record an error at the token's location.
    pub fn error(&mut self, token: &TemplateToken, message: impl Into<String>) {
        self.error_at(token.file, token.range, message);
    }

    pub fn error_at(
        &mut self,
        file: Option<usize>,
        range: Option<TokenRange>,
        message: impl Into<String>,
    ) {
        let file = file.and_then(|id| self.get_file_name(id)).map(str::to_string);
        self.errors.add(TemplateValidationError {
            message: message.into(),
            file,
            range,
        });
    }

    /// A fresh context over the same schema and files, with its own errors.
    pub fn child(&self) -> Self {
        Self {
            schema: Arc::clone(&self.schema),
            errors: TemplateValidationErrors::new(
                self.limits.max_errors,
                self.limits.max_error_message_length,
            ),
            memory: TemplateMemory::new(self.limits),
            limits: self.limits,
            file_names: self.file_names.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::tokens::TokenPosition;
    use assert_matches::assert_matches;

    fn context(limits: TemplateLimits) -> TemplateContext {
        TemplateContext::new(Arc::new(TemplateSchema::new()), limits)
    }

    #[test]
    fn test_errors_are_bounded() {
        let mut ctx = context(TemplateLimits {
            max_errors: 2,
            max_error_message_length: 5,
            ..Default::default()
        });
        ctx.error_at(None, None, "one");
        ctx.error_at(None, None, "a long message");
        ctx.error_at(None, None, "dropped");

        let messages: Vec<String> = ctx.errors.iter().map(|e| e.message.clone()).collect();
        assert_eq!(messages, vec!["one", "a lon[...]"]);
    }

    #[test]
    fn test_error_prefix() {
        let mut ctx = context(TemplateLimits::default());
        let file = ctx.get_file_id(".github/workflows/ci.yml");
        assert_eq!(ctx.get_file_id(".github/workflows/ci.yml"), file);

        let range = TokenRange::new(TokenPosition::new(3, 5), TokenPosition::new(3, 9));
        ctx.error_at(Some(file), Some(range), "Unexpected value 'x'");
        assert_eq!(
            ctx.errors.iter().next().unwrap().to_string(),
            ".github/workflows/ci.yml (Line: 3, Col: 5): Unexpected value 'x'"
        );
    }

    #[test]
    fn test_memory_limits() {
        let mut memory = TemplateMemory::new(TemplateLimits {
            max_depth: 2,
            max_events: 3,
            max_bytes: 40,
            ..Default::default()
        });
        assert!(memory.increment_depth().is_ok());
        assert!(memory.increment_depth().is_ok());
        assert_matches!(memory.increment_depth(), Err(TemplateLimitError::MaxDepth(2)));
        memory.decrement_depth();

        let token = TemplateToken::string(None, None, "abcd");
        assert!(memory.add_token(&token).is_ok());
        assert!(memory.add_token(&token).is_ok());
        assert_matches!(memory.add_token(&token), Err(TemplateLimitError::MaxBytes(40)));
        assert_matches!(memory.increment_events(), Err(TemplateLimitError::MaxEvents(3)));
    }
}
