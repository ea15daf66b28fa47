//! Expression syntax tree

use std::fmt;

use super::data::{number_to_string, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            LogicalOp::And => "&&",
            LogicalOp::Or => "||",
        }
    }
}

/// The index part of `base[index]`
#[derive(Debug, Clone, PartialEq)]
pub enum Index {
    /// `[*]` or `.*`
    Star,
    Expr(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// A flattened chain of the same logical operator
    Logical {
        op: LogicalOp,
        args: Vec<Expr>,
    },
    Grouping(Box<Expr>),
    ContextAccess(String),
    IndexAccess {
        base: Box<Expr>,
        index: Index,
    },
    FunctionCall {
        name: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Depth-first visit of this node and all of its descendants.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Expr)) {
        visit(self);
        match self {
            Expr::Literal(_) | Expr::ContextAccess(_) => {}
            Expr::Unary { operand, .. } => operand.walk(visit),
            Expr::Binary { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            Expr::Logical { args, .. } | Expr::FunctionCall { args, .. } => {
                for arg in args {
                    arg.walk(visit);
                }
            }
            Expr::Grouping(inner) => inner.walk(visit),
            Expr::IndexAccess { base, index } => {
                base.walk(visit);
                if let Index::Expr(e) = index {
                    e.walk(visit);
                }
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(value) => match value {
                Value::Null => f.write_str("null"),
                Value::Boolean(b) => write!(f, "{}", b),
                Value::Number(n) => f.write_str(&number_to_string(*n)),
                Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
                Value::Array(_) => f.write_str("Array"),
                Value::Dictionary(_) => f.write_str("Object"),
            },
            Expr::Unary { operand, .. } => write!(f, "!{}", operand),
            Expr::Binary { op, left, right } => write!(f, "{} {} {}", left, op.symbol(), right),
            Expr::Logical { op, args } => {
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", op.symbol())?;
                    }
                    write!(f, "{}", arg)?;
                }
                Ok(())
            }
            Expr::Grouping(inner) => write!(f, "({})", inner),
            Expr::ContextAccess(name) => f.write_str(name),
            Expr::IndexAccess { base, index } => match index {
                Index::Star => write!(f, "{}.*", base),
                Index::Expr(e) => match e.as_ref() {
                    Expr::Literal(Value::String(s)) if is_property_name(s) => {
                        write!(f, "{}.{}", base, s)
                    }
                    other => write!(f, "{}[{}]", base, other),
                },
            },
            Expr::FunctionCall { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
        }
    }
}

fn is_property_name(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
