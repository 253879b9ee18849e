//! Front end for the IDL architecture description language: parsing,
//! type checking and compile-time evaluation of instruction and CSR
//! behavior against a partially specified architecture.

pub mod arch;
pub mod ast;
pub mod checker;
pub mod error;
pub mod eval;
pub mod parser;
pub mod session;
pub mod symtab;
pub mod types;
pub mod value;

// Re-export main types for convenient usage
pub use arch::{ArchConfig, Architecture, CsrField, CsrInfo, CsrLength, FieldAccess, FieldLocation};
pub use ast::pretty_printer::{PrettyPrinter, PrintConfig};
pub use ast::{AstIdx, AstPool, NameIdx, Program};
pub use checker::{build_global_scope, CheckerConfig};
pub use error::{IdlError, InternalError, Result, TypeError, ValueError};
pub use eval::{Executable, Returns, Rvalue};
pub use parser::{parse_expression, parse_fragment, parse_isa, ParserError};
pub use session::Session;
pub use symtab::{GlobalScope, Symbol, SymbolTable, SymtabError, SymtabPool, Var};
pub use types::{Type, TypeKind, Width};
pub use value::Value;
