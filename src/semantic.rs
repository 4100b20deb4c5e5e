//! Semantic Analysis for Pascal
//!
//! Symbol table with address allocation, and the type rules for operators
//! and assignment.

use std::fmt;

use indexmap::IndexMap;
use thiserror::Error;

use crate::codegen::Instr;
use crate::types::{Type, VarType};

/// Symbol information
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub ty: VarType,
    /// Always 0: the language has a single global scope
    pub scope: u32,
    /// Global slot; for arrays, the slot holding the heap pointer
    pub address: usize,
    pub declared: bool,
}

impl Symbol {
    pub fn is_array(&self) -> bool {
        self.ty.is_array()
    }
}

/// Heap allocation owed for a declared array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayAlloc {
    pub name: String,
    pub size: i64,
    pub address: usize,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeclareError {
    #[error("Variable '{0}' already declared")]
    Duplicate(String),

    #[error("Array '{name}' has empty range {lower}..{upper}")]
    EmptyRange { name: String, lower: i64, upper: i64 },

    #[error("Array '{name}' range {lower}..{upper} is too large")]
    RangeTooLarge { name: String, lower: i64, upper: i64 },
}

/// Flat global symbol table and sequential address allocator
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: IndexMap<String, Symbol>,
    arrays: Vec<ArrayAlloc>,
    next_address: usize,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a variable, assigning it the next free global slot.
    ///
    /// A name that is already bound keeps its original binding.
    pub fn declare(&mut self, name: &str, ty: VarType) -> Result<&Symbol, DeclareError> {
        if self.symbols.contains_key(name) {
            return Err(DeclareError::Duplicate(name.to_string()));
        }

        if let VarType::Array { lower, upper, .. } = ty {
            if upper < lower {
                return Err(DeclareError::EmptyRange {
                    name: name.to_string(),
                    lower,
                    upper,
                });
            }
            let size = upper
                .checked_sub(lower)
                .and_then(|span| span.checked_add(1))
                .ok_or_else(|| DeclareError::RangeTooLarge {
                    name: name.to_string(),
                    lower,
                    upper,
                })?;
            self.arrays.push(ArrayAlloc {
                name: name.to_string(),
                size,
                address: self.next_address,
            });
        }

        let symbol = Symbol {
            name: name.to_string(),
            ty,
            scope: 0,
            address: self.next_address,
            declared: true,
        };
        self.next_address += 1;

        let (index, _) = self.symbols.insert_full(name.to_string(), symbol);
        Ok(&self.symbols[index])
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    /// Non-array symbols in declaration order
    pub fn scalars(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values().filter(|s| !s.is_array())
    }

    /// Pending array allocations in declaration order
    pub fn allocations(&self) -> &[ArrayAlloc] {
        &self.arrays
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn next_address(&self) -> usize {
        self.next_address
    }

    pub fn clear(&mut self) {
        self.symbols.clear();
        self.arrays.clear();
        self.next_address = 0;
    }
}

// =============================================================================
// Operators
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// `/`, always real
    Divide,
    /// `div`, always integer
    IntDiv,
    Mod,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Divide => "/",
            BinaryOp::IntDiv => "div",
            BinaryOp::Mod => "mod",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }

    /// Produces a boolean
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge | BinaryOp::Eq | BinaryOp::Ne
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    /// Type of the placeholder expression used when the operands are rejected
    pub fn fallback_type(self) -> Type {
        if self.is_comparison() || self.is_logical() {
            Type::Boolean
        } else {
            Type::Integer
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Check operand types for a binary operator
pub fn check_operation(op: BinaryOp, left: Type, right: Type) -> Result<(), String> {
    match op {
        BinaryOp::Eq | BinaryOp::Ne => {
            let compatible = left == right
                || (left.is_numeric() && right.is_numeric())
                || (left.is_text() && right.is_text());
            if !compatible {
                return Err(format!(
                    "Comparison '{}' between incompatible types: {} and {}",
                    op, left, right
                ));
            }
        }
        BinaryOp::And | BinaryOp::Or => {
            if !left.is_boolean() || !right.is_boolean() {
                return Err(format!(
                    "Operation '{}' requires boolean operands, not {} and {}",
                    op, left, right
                ));
            }
        }
        _ => {
            if !left.is_numeric() || !right.is_numeric() {
                return Err(format!(
                    "Operation '{}' requires numeric operands, not {} and {}",
                    op, left, right
                ));
            }
        }
    }
    Ok(())
}

// =============================================================================
// Assignment
// =============================================================================

/// Implicit conversion applied to an assigned value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    None,
    /// integer into real
    Widen,
    /// integer into boolean: nonzero is true
    Truthy,
    /// char into string
    CharToString,
    /// string into char, accepted with a warning
    Narrow,
}

impl Coercion {
    /// Instructions appended after the value's code
    pub fn instrs(self) -> Vec<Instr> {
        match self {
            Coercion::Widen => vec![Instr::Itof],
            Coercion::Truthy => vec![Instr::PushI(0), Instr::Equal, Instr::Not],
            Coercion::None | Coercion::CharToString | Coercion::Narrow => Vec::new(),
        }
    }

    /// Advisory message for conversions that are allowed but unchecked
    pub fn warning(self, target: &str) -> Option<String> {
        match self {
            Coercion::Narrow => Some(format!(
                "Assigning string to char variable '{}'; length is checked at runtime",
                target
            )),
            _ => None,
        }
    }
}

/// Check that a value of type `source` may be stored into `target`.
///
/// `name` is the assignment target as written, used in messages.
pub fn check_assignment(target: Type, source: Type, name: &str) -> Result<Coercion, String> {
    if target == source {
        return Ok(Coercion::None);
    }

    match (target, source) {
        (Type::Real, Type::Integer) => Ok(Coercion::Widen),
        (Type::Boolean, Type::Integer) => Ok(Coercion::Truthy),
        (Type::String, Type::Char) => Ok(Coercion::CharToString),
        (Type::Integer, Type::Real) => Err(format!(
            "Assigning real to integer variable '{}' requires explicit conversion",
            name
        )),
        (Type::Char, Type::String) => Ok(Coercion::Narrow),
        (t, s) if (t.is_text() && s.is_numeric()) || (t.is_numeric() && s.is_text()) => Err(
            format!("Cannot assign {} to {} variable '{}'", s, t, name),
        ),
        (t, s) => Err(format!(
            "Incompatible assignment to variable '{}': {} to {}",
            name, s, t
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_addresses() {
        let mut table = SymbolTable::new();
        assert_eq!(table.declare("a", VarType::Scalar(Type::Integer)).unwrap().address, 0);
        let arr = VarType::Array {
            element: Type::Integer,
            lower: 1,
            upper: 5,
        };
        assert_eq!(table.declare("v", arr).unwrap().address, 1);
        assert_eq!(table.declare("b", VarType::Scalar(Type::Real)).unwrap().address, 2);
        assert_eq!(table.next_address(), 3);

        let scalars: Vec<_> = table.scalars().map(|s| s.name.as_str()).collect();
        assert_eq!(scalars, vec!["a", "b"]);
        assert_eq!(
            table.allocations(),
            &[ArrayAlloc {
                name: "v".into(),
                size: 5,
                address: 1
            }]
        );
    }

    #[test]
    fn test_duplicate_keeps_original() {
        let mut table = SymbolTable::new();
        table.declare("x", VarType::Scalar(Type::Integer)).unwrap();
        let err = table.declare("x", VarType::Scalar(Type::Real)).unwrap_err();
        assert_eq!(err, DeclareError::Duplicate("x".into()));
        assert_eq!(err.to_string(), "Variable 'x' already declared");

        let symbol = table.lookup("x").unwrap();
        assert_eq!(symbol.ty, VarType::Scalar(Type::Integer));
        assert_eq!(symbol.address, 0);
        assert_eq!(table.next_address(), 1);
    }

    #[test]
    fn test_empty_range_rejected() {
        let mut table = SymbolTable::new();
        let ty = VarType::Array {
            element: Type::Char,
            lower: 5,
            upper: 1,
        };
        assert!(matches!(
            table.declare("bad", ty),
            Err(DeclareError::EmptyRange { .. })
        ));
        assert!(table.is_empty());
        assert_eq!(table.next_address(), 0);
    }

    #[test]
    fn test_oversized_range_rejected() {
        let mut table = SymbolTable::new();
        let ty = VarType::Array {
            element: Type::Integer,
            lower: 0,
            upper: i64::MAX,
        };
        assert_eq!(
            table.declare("a", ty).unwrap_err().to_string(),
            format!("Array 'a' range 0..{} is too large", i64::MAX)
        );
        let ty = VarType::Array {
            element: Type::Integer,
            lower: -5,
            upper: i64::MAX,
        };
        assert!(matches!(
            table.declare("b", ty),
            Err(DeclareError::RangeTooLarge { .. })
        ));
        assert!(table.is_empty());
        assert!(table.allocations().is_empty());
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let mut table = SymbolTable::new();
        table.declare("x", VarType::Scalar(Type::Integer)).unwrap();
        assert!(table.lookup("X").is_none());
    }

    #[test]
    fn test_operation_compatibility() {
        assert!(check_operation(BinaryOp::Add, Type::Integer, Type::Real).is_ok());
        assert!(check_operation(BinaryOp::Lt, Type::Char, Type::Integer).is_err());
        assert!(check_operation(BinaryOp::And, Type::Boolean, Type::Boolean).is_ok());
        assert!(check_operation(BinaryOp::Or, Type::Boolean, Type::Integer).is_err());
        assert!(check_operation(BinaryOp::Eq, Type::Char, Type::String).is_ok());
        assert!(check_operation(BinaryOp::Ne, Type::Integer, Type::Real).is_ok());
        assert!(check_operation(BinaryOp::Eq, Type::Boolean, Type::Boolean).is_ok());
        assert_eq!(
            check_operation(BinaryOp::Eq, Type::Boolean, Type::Integer).unwrap_err(),
            "Comparison '=' between incompatible types: boolean and integer"
        );
        assert_eq!(
            check_operation(BinaryOp::Mod, Type::String, Type::Integer).unwrap_err(),
            "Operation 'mod' requires numeric operands, not string and integer"
        );
    }

    #[test]
    fn test_assignment_rules() {
        assert_eq!(check_assignment(Type::Integer, Type::Integer, "x"), Ok(Coercion::None));
        assert_eq!(check_assignment(Type::Real, Type::Integer, "x"), Ok(Coercion::Widen));
        assert_eq!(check_assignment(Type::Boolean, Type::Integer, "x"), Ok(Coercion::Truthy));
        assert_eq!(
            check_assignment(Type::String, Type::Char, "x"),
            Ok(Coercion::CharToString)
        );
        assert_eq!(check_assignment(Type::Char, Type::String, "x"), Ok(Coercion::Narrow));
        assert!(check_assignment(Type::Integer, Type::Real, "x")
            .unwrap_err()
            .contains("requires explicit conversion"));
        assert_eq!(
            check_assignment(Type::String, Type::Integer, "s").unwrap_err(),
            "Cannot assign integer to string variable 's'"
        );
        assert!(check_assignment(Type::Real, Type::Char, "r").is_err());
        assert_eq!(
            check_assignment(Type::Boolean, Type::Real, "b").unwrap_err(),
            "Incompatible assignment to variable 'b': real to boolean"
        );
    }

    #[test]
    fn test_coercion_code() {
        assert_eq!(Coercion::Widen.instrs(), vec![Instr::Itof]);
        assert_eq!(
            Coercion::Truthy.instrs(),
            vec![Instr::PushI(0), Instr::Equal, Instr::Not]
        );
        assert!(Coercion::Narrow.warning("c").is_some());
        assert!(Coercion::CharToString.warning("c").is_none());
    }
}
