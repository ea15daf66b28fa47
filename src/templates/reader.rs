//! Template reader
//!
//! Walks raw nodes and schema definitions together and builds the token tree.
//! Problems with individual nodes are recorded in the context and reading
//! carries on; only exceeded limits and malformed node streams stop it.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, trace};

use super::context::{TemplateContext, TemplateLimitError};
use super::definition_info::DefinitionInfo;
use super::object_reader::{ObjectReader, ObjectReaderError};
use super::schema::definition::ANY;
use super::schema::{DefinitionKind, DefinitionType, SchemaError, TemplateSchema};
use super::spans::{offset_to_line_col, scan_expressions, ExpressionSpan};
use super::tokens::{MappingPair, TemplateToken, TokenPosition, TokenRange, TokenValue};
use crate::expressions::parse_expression;

const INSERT_DIRECTIVE: &str = "insert";

/// Why reading stopped early
#[derive(Debug)]
struct ReadAbort {
    message: String,
    range: Option<TokenRange>,
}

impl From<ObjectReaderError> for ReadAbort {
    fn from(err: ObjectReaderError) -> Self {
        Self {
            message: err.to_string(),
            range: None,
        }
    }
}

impl From<SchemaError> for ReadAbort {
    fn from(err: SchemaError) -> Self {
        Self {
            message: err.to_string(),
            range: None,
        }
    }
}

impl ReadAbort {
    fn limit(err: TemplateLimitError, token: &TemplateToken) -> Self {
        Self {
            message: err.to_string(),
            range: token.range,
        }
    }

    fn unexpected_node() -> Self {
        Self {
            message: "Expected a scalar value, a sequence, or a mapping".to_string(),
            range: None,
        }
    }
}

/// Read a document against the definition named `root_type`.
///
/// Errors accumulate in `context.errors`. Returns `None` when nothing
/// meaningful could be read (empty document, aborted read).
pub fn read_template(
    context: &mut TemplateContext,
    root_type: &str,
    reader: &mut dyn ObjectReader,
    file: Option<usize>,
) -> Option<TemplateToken> {
    let root = match DefinitionInfo::root(&context.schema, root_type) {
        Ok(root) => Arc::new(root),
        Err(err) => {
            context.error_at(file, None, err.to_string());
            return None;
        }
    };

    debug!(root_type, "reading template");
    let mut template_reader = TemplateReader {
        schema: Arc::clone(&context.schema),
        context,
        reader,
    };

    match template_reader.read_root(&root) {
        Ok(token) => Some(token),
        Err(abort) => {
            debug!(message = %abort.message, "template read aborted");
            template_reader
                .context
                .error_at(file, abort.range, abort.message);
            None
        }
    }
}

struct TemplateReader<'a> {
    schema: Arc<TemplateSchema>,
    context: &'a mut TemplateContext,
    reader: &'a mut dyn ObjectReader,
}

impl<'a> TemplateReader<'a> {
    fn read_root(&mut self, root: &Arc<DefinitionInfo>) -> Result<TemplateToken, ReadAbort> {
        self.reader.validate_start()?;
        let value = self.read_value(root)?;
        self.reader.validate_end()?;
        Ok(value)
    }

    fn read_value(&mut self, definition: &Arc<DefinitionInfo>) -> Result<TemplateToken, ReadAbort> {
        if let Some(literal) = self.reader.allow_literal() {
            self.account(&literal)?;
            let scalar = self.parse_scalar(literal, definition);
            return Ok(self.validate_scalar(scalar, definition));
        }

        if let Some(mut sequence) = self.reader.allow_sequence_start() {
            self.account(&sequence)?;
            self.enter(&sequence)?;

            let sequence_definitions = self
                .schema
                .definitions_of_type(&definition.definition, DefinitionType::Sequence);
            match sequence_definitions.first().map(|d| &d.kind) {
                Some(DefinitionKind::Sequence { item_type }) => {
                    let item_definition = Arc::new(definition.child(&self.schema, item_type)?);
                    let mut items = Vec::new();
                    while !self.reader.allow_sequence_end() {
                        items.push(self.read_value(&item_definition)?);
                    }
                    sequence.value = TokenValue::Sequence(items);
                    sequence.definition = Some(Arc::clone(definition));
                }
                _ => {
                    self.context.error(&sequence, "A sequence was not expected");
                    while !self.reader.allow_sequence_end() {
                        self.skip_value()?;
                    }
                }
            }

            self.context.memory.decrement_depth();
            return Ok(sequence);
        }

        if let Some(mut mapping) = self.reader.allow_mapping_start() {
            self.account(&mapping)?;
            self.enter(&mapping)?;

            let mut mapping_definitions = self
                .schema
                .definitions_of_type(&definition.definition, DefinitionType::Mapping);
            if mapping_definitions.is_empty() {
                self.context.error(&mapping, "A mapping was not expected");
                while self.reader.allow_literal().is_some() {
                    self.skip_value()?;
                }
                self.expect_mapping_end()?;
            } else {
                self.read_mapping(definition, &mut mapping_definitions, &mut mapping)?;
                mapping.definition = Some(Arc::clone(definition));
            }

            self.context.memory.decrement_depth();
            return Ok(mapping);
        }

        Err(ReadAbort::unexpected_node())
    }

    fn read_mapping(
        &mut self,
        definition: &Arc<DefinitionInfo>,
        mapping_definitions: &mut Vec<Arc<crate::templates::schema::Definition>>,
        mapping: &mut TemplateToken,
    ) -> Result<(), ReadAbort> {
        // Loose properties are only allowed with a single candidate definition
        let loose = match mapping_definitions[0].as_mapping() {
            Some(m) => match (&m.loose_key_type, &m.loose_value_type) {
                (Some(key_type), Some(value_type)) => Some((
                    Arc::new(definition.child(&self.schema, key_type)?),
                    Arc::new(definition.child(&self.schema, value_type)?),
                )),
                _ => None,
            },
            None => None,
        };

        let mut pairs = Vec::new();
        let mut seen_keys: HashSet<String> = HashSet::new();
        let mut has_expression_key = false;

        while let Some(raw_key) = self.reader.allow_literal() {
            self.account(&raw_key)?;
            let key = self.parse_scalar(raw_key, definition);

            if key.is_expression() {
                has_expression_key = true;
                if definition.is_expression_allowed() {
                    let any = Arc::new(definition.child(&self.schema, ANY)?);
                    let value = self.read_value(&any)?;
                    pairs.push(MappingPair { key, value });
                } else {
                    self.context
                        .error(&key, "A template expression is not allowed in this context");
                    self.skip_value()?;
                }
                continue;
            }

            let mut key = match key.value {
                TokenValue::String { .. } => key,
                _ => key.to_string_token(),
            };
            let name = key.to_display_string();

            if !seen_keys.insert(name.to_uppercase()) {
                self.context
                    .error(&key, format!("'{}' is already defined", name));
                self.skip_value()?;
                continue;
            }

            if let Some(value_type) =
                TemplateSchema::match_property_and_filter(mapping_definitions, &name)
            {
                let value_definition = Arc::new(definition.child(&self.schema, &value_type)?);
                key.definition = Some(Arc::clone(definition));
                let value = self.read_value(&value_definition)?;
                pairs.push(MappingPair { key, value });
                continue;
            }

            if let Some((key_definition, value_definition)) = &loose {
                let key = self.validate_scalar(key, key_definition);
                let value = self.read_value(value_definition)?;
                pairs.push(MappingPair { key, value });
                continue;
            }

            self.context
                .error(&key, format!("Unexpected value '{}'", name));
            self.skip_value()?;
        }

        if mapping_definitions.len() > 1 {
            let mut hits: Vec<(String, usize)> = Vec::new();
            for mapping_definition in mapping_definitions.iter() {
                let Some(m) = mapping_definition.as_mapping() else {
                    continue;
                };
                for (property, _) in &m.properties {
                    match hits.iter().position(|(p, _)| p == property) {
                        Some(index) => hits[index].1 += 1,
                        None => hits.push((property.clone(), 1)),
                    }
                }
            }
            let mut unique: Vec<String> = hits
                .into_iter()
                .filter(|(_, count)| *count == 1)
                .map(|(p, _)| p)
                .collect();
            unique.sort_unstable();
            self.context.error(
                mapping,
                format!(
                    "There's not enough info to determine what property value is being constructed. Exactly one of the following properties is required: {}",
                    unique.join(", ")
                ),
            );
        } else if !has_expression_key {
            if let Some(m) = mapping_definitions[0].as_mapping() {
                for (property, value) in &m.properties {
                    if value.required && !seen_keys.contains(&property.to_uppercase()) {
                        self.context
                            .error(mapping, format!("Required property is missing: {}", property));
                    }
                }
            }
        }

        mapping.value = TokenValue::Mapping(pairs);
        self.expect_mapping_end()
    }

    /// Turn `${{ }}` spans in a string literal into expression tokens.
    fn parse_scalar(&mut self, token: TemplateToken, definition: &DefinitionInfo) -> TemplateToken {
        let raw = match &token.value {
            TokenValue::String { value, source } => source.clone().unwrap_or_else(|| value.clone()),
            _ => return token,
        };

        let is_expression_definition = definition
            .definition
            .as_string()
            .is_some_and(|s| s.is_expression);

        let spans = match scan_expressions(&raw) {
            Ok(spans) => spans,
            Err(_) => {
                self.context.error(
                    &token,
                    "The expression is not closed. An unescaped ${{ sequence was found, but the closing }} sequence was not found.",
                );
                return token;
            }
        };

        if spans.is_empty() {
            if is_expression_definition {
                let range = token.range;
                return self.parse_expression_token(&token, range, &raw, definition);
            }
            return token;
        }

        // A single span covering the whole value
        if spans.len() == 1 && spans[0].start == 0 && spans[0].end == raw.len() {
            let inner = spans[0].inner(&raw);
            let mut expression = self.parse_expression_token(&token, token.range, inner, definition);
            if let TokenValue::BasicExpression { source, .. } = &mut expression.value {
                *source = Some(raw.clone());
            }
            return expression;
        }

        self.build_format_expression(&token, &raw, &spans, definition)
    }

    /// Rewrite `a-${{ x }}-${{ y }}` as `format('a-{0}-{1}', x, y)`.
    fn build_format_expression(
        &mut self,
        token: &TemplateToken,
        raw: &str,
        spans: &[ExpressionSpan],
        definition: &DefinitionInfo,
    ) -> TemplateToken {
        let mut format_string = String::new();
        let mut args = Vec::new();
        let mut originals = Vec::new();
        let mut last = 0;

        for span in spans {
            format_string.push_str(&escape_format_literal(&raw[last..span.start]));

            let range = sub_range(token.range, raw, span.start, span.end);
            let expression = self.parse_expression_token(token, range, span.inner(raw), definition);
            match expression.expression_text().map(str::to_string) {
                Some(text) => {
                    format_string.push_str(&format!("{{{}}}", args.len()));
                    args.push(text);
                    originals.push(expression);
                }
                None => {
                    self.context.error(
                        &expression,
                        format!("The directive '{}' is not allowed in this context", INSERT_DIRECTIVE),
                    );
                    return token.clone();
                }
            }
            last = span.end;
        }
        format_string.push_str(&escape_format_literal(&raw[last..]));

        let expression = format!(
            "format('{}', {})",
            format_string.replace('\'', "''"),
            args.join(", ")
        );
        trace!(%expression, "built implicit format expression");

        let mut result = TemplateToken::new(
            token.file,
            token.range,
            TokenValue::BasicExpression {
                expression,
                original_expressions: originals,
                source: Some(raw.to_string()),
            },
        );
        result.definition = token.definition.clone();
        result
    }

    /// Parse and validate one expression body. Validation errors are
    /// recorded; the expression token is returned either way.
    fn parse_expression_token(
        &mut self,
        token: &TemplateToken,
        range: Option<TokenRange>,
        raw: &str,
        definition: &DefinitionInfo,
    ) -> TemplateToken {
        let trimmed = raw.trim();

        if trimmed == INSERT_DIRECTIVE {
            return TemplateToken::new(token.file, range, TokenValue::InsertExpression);
        }

        if trimmed.is_empty() {
            self.context
                .error_at(token.file, range, "An expression was expected");
        } else if definition.is_expression_allowed() {
            if let Err(err) = parse_expression(
                trimmed,
                definition.named_contexts(),
                definition.functions(),
            ) {
                self.context
                    .error_at(token.file, range, format!("{}: {}", err, trimmed));
            }
        }

        TemplateToken::expression(token.file, range, trimmed)
    }

    fn validate_scalar(&mut self, mut scalar: TemplateToken, definition: &Arc<DefinitionInfo>) -> TemplateToken {
        match scalar.value {
            TokenValue::Null
            | TokenValue::Boolean(_)
            | TokenValue::Number(_)
            | TokenValue::String { .. } => {
                let scalar_definitions = self.schema.scalar_definitions(&definition.definition);
                if scalar_definitions.iter().any(|d| d.is_match(&scalar)) {
                    scalar.definition = Some(Arc::clone(definition));
                    return scalar;
                }

                if !matches!(scalar.value, TokenValue::String { .. }) {
                    let mut as_string = scalar.to_string_token();
                    if scalar_definitions.iter().any(|d| d.is_match(&as_string)) {
                        as_string.definition = Some(Arc::clone(definition));
                        return as_string;
                    }
                }

                self.context.error(
                    &scalar,
                    format!("Unexpected value '{}'", scalar.to_display_string()),
                );
                scalar
            }
            TokenValue::BasicExpression { .. } => {
                if !definition.is_expression_allowed() {
                    self.context
                        .error(&scalar, "A template expression is not allowed in this context");
                }
                scalar.definition = Some(Arc::clone(definition));
                scalar
            }
            TokenValue::InsertExpression => {
                self.context.error(
                    &scalar,
                    format!("The directive '{}' is not allowed in this context", INSERT_DIRECTIVE),
                );
                scalar
            }
            TokenValue::Sequence(_) | TokenValue::Mapping(_) => {
                self.context.error(
                    &scalar,
                    format!("Unexpected value '{}'", scalar.to_display_string()),
                );
                scalar
            }
        }
    }

    fn skip_value(&mut self) -> Result<(), ReadAbort> {
        if self.reader.allow_literal().is_some() {
            return Ok(());
        }
        if self.reader.allow_sequence_start().is_some() {
            while !self.reader.allow_sequence_end() {
                self.skip_value()?;
            }
            return Ok(());
        }
        if self.reader.allow_mapping_start().is_some() {
            while self.reader.allow_literal().is_some() {
                self.skip_value()?;
            }
            return self.expect_mapping_end();
        }
        Err(ReadAbort::unexpected_node())
    }

    fn expect_mapping_end(&mut self) -> Result<(), ReadAbort> {
        if self.reader.allow_mapping_end() {
            return Ok(());
        }
        Err(ReadAbort {
            message: "Expected a mapping key or the end of the mapping".to_string(),
            range: None,
        })
    }

    fn account(&mut self, token: &TemplateToken) -> Result<(), ReadAbort> {
        self.context
            .memory
            .add_token(token)
            .map_err(|e| ReadAbort::limit(e, token))
    }

    fn enter(&mut self, token: &TemplateToken) -> Result<(), ReadAbort> {
        self.context
            .memory
            .increment_depth()
            .map_err(|e| ReadAbort::limit(e, token))
    }
}

/// Literal text inside a `format()` string: braces are doubled.
fn escape_format_literal(text: &str) -> String {
    text.replace('{', "{{").replace('}', "}}")
}

/// The range of `raw[start..end]` given the range of the whole value.
/// Exact for plain scalars; block and quoted scalars shift slightly.
/// The range of `raw[start..end]` inside a scalar. Offsets only map onto the
/// source for plain scalars written on one line; quoted and block scalars
/// report the whole scalar.
fn sub_range(
    range: Option<TokenRange>,
    raw: &str,
    start: usize,
    end: usize,
) -> Option<TokenRange> {
    let range = range?;
    let width = range.end.column.checked_sub(range.start.column);
    if range.start.line != range.end.line || width != Some(raw.chars().count() as u32) {
        return Some(range);
    }

    let base = range.start;
    let at = |offset: usize| {
        let (_, column) = offset_to_line_col(raw, offset);
        TokenPosition::new(base.line, base.column + column)
    };
    Some(TokenRange::new(at(start), at(end)))
}
