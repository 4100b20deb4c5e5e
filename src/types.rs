//! Semantic types and synthesized attributes
//!
//! The parser evaluates attributes bottom-up without building a tree:
//! every expression rule yields a [`TypedExpr`], every statement rule a
//! [`StatementCode`].

use std::fmt;

use crate::codegen::Code;

/// Pascal scalar types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Integer,
    Real,
    Boolean,
    Char,
    String,
}

impl Type {
    pub fn is_numeric(self) -> bool {
        matches!(self, Type::Integer | Type::Real)
    }

    pub fn is_boolean(self) -> bool {
        self == Type::Boolean
    }

    /// String or char: both are text on the VM
    pub fn is_text(self) -> bool {
        matches!(self, Type::String | Type::Char)
    }

    pub fn name(self) -> &'static str {
        match self {
            Type::Integer => "integer",
            Type::Real => "real",
            Type::Boolean => "boolean",
            Type::Char => "char",
            Type::String => "string",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declared type of a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    Scalar(Type),
    /// One-dimensional array with inclusive bounds
    Array { element: Type, lower: i64, upper: i64 },
}

impl VarType {
    /// Scalar type, or the element type of an array
    pub fn base(self) -> Type {
        match self {
            VarType::Scalar(ty) => ty,
            VarType::Array { element, .. } => element,
        }
    }

    pub fn is_array(self) -> bool {
        matches!(self, VarType::Array { .. })
    }

    pub fn bounds(self) -> Option<(i64, i64)> {
        match self {
            VarType::Array { lower, upper, .. } => Some((lower, upper)),
            VarType::Scalar(_) => None,
        }
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarType::Scalar(ty) => write!(f, "{}", ty),
            VarType::Array {
                element,
                lower,
                upper,
            } => write!(f, "array[{}..{}] of {}", lower, upper, element),
        }
    }
}

/// An expression attribute: the value's type and the code that pushes it
#[derive(Debug, Clone, PartialEq)]
pub struct TypedExpr {
    pub ty: Type,
    pub code: Code,
}

impl TypedExpr {
    pub fn new(ty: Type, code: impl Into<Code>) -> Self {
        Self {
            ty,
            code: code.into(),
        }
    }

    /// Placeholder produced after a semantic error so parsing can go on
    pub fn empty(ty: Type) -> Self {
        Self {
            ty,
            code: Code::new(),
        }
    }
}

/// A statement attribute: code that leaves the stack unchanged
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementCode(pub Code);

impl StatementCode {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn into_code(self) -> Code {
        self.0
    }
}

impl From<Code> for StatementCode {
    fn from(code: Code) -> Self {
        Self(code)
    }
}
