//! YAML-backed object reader
//!
//! Parse events come from `yaml-rust2`, which marks where each node starts.
//! Mappings are passed on key by key, so duplicate keys reach the template
//! reader as ordinary entries instead of failing the whole document.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use tracing::trace;
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser};
use yaml_rust2::scanner::{Marker, ScanError, TScalarStyle};

use crate::templates::object_reader::{EventReader, ObjectReader, ObjectReaderError, ParseEvent};
use crate::templates::tokens::{TemplateToken, TokenPosition, TokenRange};

/// A YAML syntax error, located at a one-based line and column
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct YamlSyntaxError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

impl YamlSyntaxError {
    pub fn range(&self) -> TokenRange {
        let position = TokenPosition::new(self.line, self.column);
        TokenRange::new(position, position)
    }
}

impl From<ScanError> for YamlSyntaxError {
    fn from(err: ScanError) -> Self {
        let marker = err.marker();
        Self {
            message: err.info().to_string(),
            line: (marker.line() as u32).max(1),
            column: marker.col() as u32 + 1,
        }
    }
}

/// An [`ObjectReader`] over a YAML document
#[derive(Debug, Clone)]
pub struct YamlObjectReader {
    events: EventReader,
    empty: bool,
}

impl YamlObjectReader {
    pub fn new(file: Option<usize>, text: &str) -> Result<Self, YamlSyntaxError> {
        let mut builder = EventBuilder::new(file, text);
        // only the first document of a stream is read
        Parser::new(text.chars()).load(&mut builder, false)?;

        let empty = builder.events.is_empty();
        trace!(events = builder.events.len(), "read YAML document");

        Ok(Self {
            events: EventReader::new(builder.events),
            empty,
        })
    }

    /// Whether the document holds no nodes at all.
    pub fn is_empty(&self) -> bool {
        self.empty
    }
}
impl ObjectReader for YamlObjectReader {
    fn allow_literal(&mut self) -> Option<TemplateToken> {
        self.events.allow_literal()
    }

    fn allow_sequence_start(&mut self) -> Option<TemplateToken> {
        self.events.allow_sequence_start()
    }

    fn allow_sequence_end(&mut self) -> bool {
        self.events.allow_sequence_end()
    }

    fn allow_mapping_start(&mut self) -> Option<TemplateToken> {
        self.events.allow_mapping_start()
    }

    fn allow_mapping_end(&mut self) -> bool {
        self.events.allow_mapping_end()
    }

    fn validate_start(&mut self) -> Result<(), ObjectReaderError> {
        self.events.validate_start()
    }

    fn validate_end(&mut self) -> Result<(), ObjectReaderError> {
        self.events.validate_end()
    }
}

struct EventBuilder<'t> {
    file: Option<usize>,
    lines: Vec<&'t str>,
    events: Vec<ParseEvent>,
    /// Open collections, with the anchor and first event of anchored ones
    open: Vec<Option<(usize, usize)>>,
    anchors: HashMap<usize, Vec<ParseEvent>>,
}

impl<'t> EventBuilder<'t> {
    fn new(file: Option<usize>, text: &'t str) -> Self {
        Self {
            file,
            lines: text.split('\n').map(|line| line.trim_end_matches('\r')).collect(),
            events: Vec::new(),
            open: Vec::new(),
            anchors: HashMap::new(),
        }
    }

    fn line(&self, line: u32) -> &'t str {
        line.checked_sub(1)
            .and_then(|index| self.lines.get(index as usize))
            .copied()
            .unwrap_or("")
    }

    fn line_end(&self, line: u32) -> TokenPosition {
        TokenPosition::new(line, self.line(line).chars().count() as u32 + 1)
    }

    /// Where a scalar starting at `start` ends in the source.
    fn scalar_end(&self, start: TokenPosition, value: &str, style: TScalarStyle) -> TokenPosition {
        match style {
            TScalarStyle::Plain => {
                let rest: String = self
                    .line(start.line)
                    .chars()
                    .skip(start.column as usize - 1)
                    .collect();
                if rest.starts_with(value) {
                    TokenPosition::new(start.line, start.column + value.chars().count() as u32)
                } else {
                    // folded over several lines
                    self.line_end(start.line)
                }
            }
            TScalarStyle::SingleQuoted => self.quoted_end(start, '\''),
            TScalarStyle::DoubleQuoted => self.quoted_end(start, '"'),
            _ => {
                let last = start.line + value.lines().count() as u32;
                self.line_end(last.min(self.lines.len() as u32))
            }
        }
    }

    fn quoted_end(&self, start: TokenPosition, quote: char) -> TokenPosition {
        // skip up to and including the opening quote
        let mut skip = start.column as usize;
        for line in start.line..=self.lines.len() as u32 {
            let mut chars = self.line(line).chars().enumerate().skip(skip).peekable();
            while let Some((at, c)) = chars.next() {
                if quote == '"' && c == '\\' {
                    chars.next();
                } else if c == quote {
                    if quote == '\'' && chars.peek().map(|(_, next)| *next) == Some('\'') {
                        chars.next();
                    } else {
                        return TokenPosition::new(line, at as u32 + 2);
                    }
                }
            }
            skip = 0;
        }
        self.line_end(start.line)
    }

    fn open(&mut self, anchor: usize) {
        self.open.push((anchor > 0).then_some((anchor, self.events.len())));
    }

    fn close(&mut self) {
        if let Some(Some((anchor, first))) = self.open.pop() {
            self.anchor(anchor, first);
        }
    }

    fn anchor(&mut self, anchor: usize, first: usize) {
        if anchor > 0 {
            self.anchors.insert(anchor, self.events[first..].to_vec());
        }
    }
}

impl MarkedEventReceiver for EventBuilder<'_> {
    fn on_event(&mut self, event: Event, mark: Marker) {
        let file = self.file;
        let start = TokenPosition::new(mark.line() as u32, mark.col() as u32 + 1);
        match event {
            Event::Scalar(value, style, anchor, _) => {
                let range = TokenRange::new(start, self.scalar_end(start, &value, style));
                let first = self.events.len();
                self.events
                    .push(ParseEvent::Literal(resolve_scalar(file, Some(range), value, style)));
                self.anchor(anchor, first);
            }
            Event::SequenceStart(anchor, _) => {
                self.open(anchor);
                let range = TokenRange::new(start, start);
                self.events
                    .push(ParseEvent::SequenceStart(TemplateToken::sequence(file, Some(range))));
            }
            Event::SequenceEnd => {
                self.events.push(ParseEvent::SequenceEnd);
                self.close();
            }
            Event::MappingStart(anchor, _) => {
                self.open(anchor);
                let range = TokenRange::new(start, start);
                self.events
                    .push(ParseEvent::MappingStart(TemplateToken::mapping(file, Some(range))));
            }
            Event::MappingEnd => {
                self.events.push(ParseEvent::MappingEnd);
                self.close();
            }
            Event::Alias(anchor) => {
                if let Some(replay) = self.anchors.get(&anchor).cloned() {
                    self.events.extend(replay);
                }
            }
            _ => {}
        }
    }
}

/// Type a scalar the way the YAML 1.2 core schema does. Quoted and block
/// scalars are always strings.
fn resolve_scalar(
    file: Option<usize>,
    range: Option<TokenRange>,
    value: String,
    style: TScalarStyle,
) -> TemplateToken {
    if !matches!(style, TScalarStyle::Plain) {
        return TemplateToken::string(file, range, value);
    }
    match value.as_str() {
        "" | "~" | "null" | "Null" | "NULL" => TemplateToken::null(file, range),
        "true" | "True" | "TRUE" => TemplateToken::boolean(file, range, true),
        "false" | "False" | "FALSE" => TemplateToken::boolean(file, range, false),
        text => match parse_number(text) {
            Some(number) => TemplateToken::number(file, range, number),
            None => TemplateToken::string(file, range, value),
        },
    }
}

fn parse_number(text: &str) -> Option<f64> {
    lazy_static! {
        static ref DECIMAL_RE: Regex =
            Regex::new(r"^[-+]?(\.[0-9]+|[0-9]+(\.[0-9]*)?)([eE][-+]?[0-9]+)?$").unwrap();
    }

    if let Some(hex) = text.strip_prefix("0x") {
        return i64::from_str_radix(hex, 16).ok().map(|n| n as f64);
    }
    if let Some(octal) = text.strip_prefix("0o") {
        return i64::from_str_radix(octal, 8).ok().map(|n| n as f64);
    }

    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    match unsigned {
        ".inf" | ".Inf" | ".INF" if negative => Some(f64::NEG_INFINITY),
        ".inf" | ".Inf" | ".INF" => Some(f64::INFINITY),
        ".nan" | ".NaN" | ".NAN" if text == unsigned => Some(f64::NAN),
        _ if DECIMAL_RE.is_match(text) => text.parse().ok(),
        _ => None,
    }
}
