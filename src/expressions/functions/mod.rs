//! Built-in function library
//!
//! Every function is pure: no I/O and no shared state, so they can be called
//! any number of times while completing or validating a document.

mod json;
mod strings;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::data::Value;
use super::evaluator::EvaluationError;
use super::parser::FunctionInfo;

pub use json::{from_json, to_json};
pub use strings::{contains, ends_with, format, join, starts_with};

pub type FunctionImpl = fn(&[Value]) -> Result<Value, EvaluationError>;

/// A built-in function with its arity contract
pub struct Function {
    pub name: &'static str,
    pub description: &'static str,
    pub min_args: usize,
    pub max_args: usize,
    pub call: FunctionImpl,
}

impl Function {
    pub fn info(&self) -> FunctionInfo {
        FunctionInfo::new(self.name, self.min_args, self.max_args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .finish()
    }
}

pub static BUILTIN_FUNCTIONS: &[Function] = &[
    Function {
        name: "contains",
        description: "Returns true if `search` contains `item`. If `search` is an array, \
                      returns true if `item` is an element of it.",
        min_args: 2,
        max_args: 2,
        call: contains,
    },
    Function {
        name: "endsWith",
        description: "Returns true if `searchString` ends with `searchValue`. Case insensitive.",
        min_args: 2,
        max_args: 2,
        call: ends_with,
    },
    Function {
        name: "format",
        description: "Replaces `{N}` placeholders in a string with the given arguments. \
                      Escape braces by doubling them.",
        min_args: 1,
        max_args: usize::MAX,
        call: format,
    },
    Function {
        name: "fromJSON",
        description: "Returns a JSON object or JSON data type for `value`.",
        min_args: 1,
        max_args: 1,
        call: from_json,
    },
    Function {
        name: "join",
        description: "Concatenates the elements of an array with a separator, `,` by default.",
        min_args: 1,
        max_args: 2,
        call: join,
    },
    Function {
        name: "startsWith",
        description: "Returns true if `searchString` starts with `searchValue`. Case insensitive.",
        min_args: 2,
        max_args: 2,
        call: starts_with,
    },
    Function {
        name: "toJSON",
        description: "Returns a pretty-print JSON representation of `value`.",
        min_args: 1,
        max_args: 1,
        call: to_json,
    },
];

/// Find a built-in function by name, ignoring case.
pub fn lookup(name: &str) -> Option<&'static Function> {
    BUILTIN_FUNCTIONS
        .iter()
        .find(|f| f.name.eq_ignore_ascii_case(name))
}

pub type ExtensionImpl = Arc<dyn Fn(&[Value]) -> Result<Value, EvaluationError> + Send + Sync>;

/// Functions supplied by the embedding layer (e.g. status functions or
/// `hashFiles`), looked up after the built-ins.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, (FunctionInfo, ExtensionImpl)>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        info: FunctionInfo,
        call: impl Fn(&[Value]) -> Result<Value, EvaluationError> + Send + Sync + 'static,
    ) {
        self.functions
            .insert(info.name.to_lowercase(), (info, Arc::new(call)));
    }

    pub fn get(&self, name: &str) -> Option<&ExtensionImpl> {
        self.functions.get(&name.to_lowercase()).map(|(_, f)| f)
    }

    /// Signatures for handing to the parser
    pub fn infos(&self) -> Vec<FunctionInfo> {
        self.functions.values().map(|(info, _)| info.clone()).collect()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.functions.values().map(|(info, _)| info))
            .finish()
    }
}
