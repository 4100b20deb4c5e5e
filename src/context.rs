//! Per-compilation state
//!
//! Everything a grammar rule may read or mutate lives here. A fresh
//! `Context` is created for every compilation; nothing is shared between
//! compiles.

use crate::codegen::LabelCounter;
use crate::error::{Diagnostic, Diagnostics};
use crate::semantic::{Symbol, SymbolTable};
use crate::types::VarType;

#[derive(Debug, Clone, Default)]
pub struct Context {
    pub symbols: SymbolTable,
    pub diagnostics: Diagnostics,
    pub labels: LabelCounter,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all state so the context can serve an independent compilation
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Record a blocking semantic error
    pub fn error(&mut self, line: usize, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::error(Some(line), message));
    }

    /// Record an advisory message that does not block code generation
    pub fn warn(&mut self, line: usize, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::warning(Some(line), message));
    }

    pub fn fresh_label(&mut self) -> u32 {
        self.labels.fresh()
    }

    /// Declare a variable, reporting duplicates and empty ranges as errors
    pub fn declare(&mut self, name: &str, ty: VarType, line: usize) {
        if let Err(err) = self.symbols.declare(name, ty) {
            self.error(line, err.to_string());
        }
    }

    /// Look up a name, reporting it as undeclared when missing
    pub fn resolve(&mut self, name: &str, what: &str, line: usize) -> Option<Symbol> {
        match self.symbols.lookup(name) {
            Some(symbol) => Some(symbol.clone()),
            None => {
                self.error(line, format!("{} '{}' not declared", what, name));
                None
            }
        }
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    #[test]
    fn test_reset_clears_everything() {
        let mut ctx = Context::new();
        ctx.declare("x", VarType::Scalar(Type::Integer), 1);
        ctx.declare("x", VarType::Scalar(Type::Integer), 2);
        ctx.fresh_label();
        assert!(ctx.has_errors());

        ctx.reset();
        assert!(ctx.symbols.is_empty());
        assert!(ctx.diagnostics.is_empty());
        assert_eq!(ctx.symbols.next_address(), 0);
        assert_eq!(ctx.fresh_label(), 0);
    }

    #[test]
    fn test_resolve_reports_missing() {
        let mut ctx = Context::new();
        assert!(ctx.resolve("y", "Variable", 4).is_none());
        assert_eq!(
            ctx.diagnostics.to_string(),
            "Line 4: Error: Variable 'y' not declared"
        );
    }
}
