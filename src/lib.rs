//! Pascal Compiler
//!
//! A single-pass compiler for a Pascal subset targeting a textual stack
//! virtual machine.
//!
//! The parser performs type checking and code generation while it reads the
//! program: every grammar rule synthesizes typed code fragments which are
//! concatenated into the final instruction listing. Semantic problems are
//! collected as diagnostics; any error blocks output, warnings do not.

pub mod codegen;
pub mod context;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod semantic;
pub mod types;

pub use error::{CompileError, Result};
pub use parser::{compile, Compilation};
