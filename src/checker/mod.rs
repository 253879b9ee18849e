//! Static semantic analysis.
//!
//! Every pass is a method on [`Context`], which pairs the AST pool being
//! walked with the request-local [`SessionState`]. Function bodies live in
//! the pool of the definition that declared them, so calls switch pools by
//! building a nested context over the same state.

pub mod expr;
pub mod function;
pub mod global;
pub mod type_check;

use std::collections::HashSet;
use std::sync::Arc;

use crate::ast::{AstIdx, AstPool, PoolId};
use crate::error::{IdlError, InternalError, Result, TypeError};
use crate::symtab::{SymbolTable, SymtabError};
use crate::types::Type;
use crate::value::Value;

pub use self::global::build_global_scope;

#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Type-check the right operand of `&&`/`||` even when the left operand
    /// already decides the result.
    pub strict_short_circuit: bool,
    /// Iterations a compile-time `for` loop may run before its value is
    /// treated as unknown.
    pub max_loop_iterations: u64,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            strict_short_circuit: false,
            max_loop_iterations: 65_536,
        }
    }
}

/// One instantiation of a function body: definition plus template values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct InstanceKey {
    pool: PoolId,
    node: AstIdx,
    template_values: Vec<Value>,
}

/// Mutable state owned by a single checking/evaluation request.
#[derive(Debug)]
pub struct SessionState {
    pub symtab: SymbolTable,
    pub config: CheckerConfig,
    instantiated: HashSet<InstanceKey>,
    /// Names of functions whose bodies are being checked, innermost last.
    active_functions: Vec<String>,
    /// Declared return types of the enclosing function bodies.
    return_types: Vec<Vec<Type>>,
    checked: HashSet<(PoolId, AstIdx)>,
}

impl SessionState {
    pub fn new(symtab: SymbolTable, config: CheckerConfig) -> Self {
        Self {
            symtab,
            config,
            instantiated: HashSet::new(),
            active_functions: Vec::new(),
            return_types: Vec::new(),
            checked: HashSet::new(),
        }
    }

    pub fn is_checked(&self, pool: PoolId, node: AstIdx) -> bool {
        self.checked.contains(&(pool, node))
    }

    /// Number of distinct function instantiations checked so far.
    pub fn instantiation_count(&self) -> usize {
        self.instantiated.len()
    }
}

pub struct Context<'a> {
    pub pool: &'a Arc<AstPool>,
    pub state: &'a mut SessionState,
}

impl<'a> Context<'a> {
    pub fn new(pool: &'a Arc<AstPool>, state: &'a mut SessionState) -> Self {
        Self { pool, state }
    }

    pub fn symtab(&self) -> &SymbolTable {
        &self.state.symtab
    }

    pub fn symtab_mut(&mut self) -> &mut SymbolTable {
        &mut self.state.symtab
    }

    pub fn name(&self, idx: crate::ast::NameIdx) -> &'a str {
        let pool: &'a AstPool = self.pool;
        pool.get_string(idx)
    }

    pub fn node(&self, at: AstIdx) -> &'a crate::ast::Node {
        let pool: &'a AstPool = self.pool;
        &pool[at]
    }

    pub fn type_error(&self, at: AstIdx, message: impl Into<String>) -> IdlError {
        let span = self.pool.span(at);
        TypeError {
            file: Arc::clone(self.pool.file()),
            line: span.line,
            column: span.column,
            message: message.into(),
        }
        .into()
    }

    pub(crate) fn symtab_error(&self, at: AstIdx, err: SymtabError) -> IdlError {
        match err {
            SymtabError::DuplicateSym(name) => {
                self.type_error(at, format!("'{name}' is already defined"))
            }
            other => InternalError::new(other.to_string()).into(),
        }
    }

    pub(crate) fn mark_checked(&mut self, at: AstIdx) {
        self.state.checked.insert((self.pool.id(), at));
    }

    pub fn is_checked(&self, at: AstIdx) -> bool {
        self.state.is_checked(self.pool.id(), at)
    }

    /// Runs `f` inside a freshly pushed scope and verifies the scope depth is
    /// restored afterwards, on success and on error alike.
    pub fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let depth = self.state.symtab.levels();
        self.state.symtab.push();

        let result = f(self);

        if self.state.symtab.levels() > depth {
            self.state.symtab.pop();
        }
        let after = self.state.symtab.levels();
        if after != depth {
            return Err(InternalError::new(format!(
                "scope depth {after} after block, expected {depth}"
            ))
            .into());
        }
        result
    }

    /// Runs `f` against `symtab`, restoring the current table afterwards.
    pub(crate) fn with_symtab<T>(
        &mut self,
        symtab: SymbolTable,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let saved = std::mem::replace(&mut self.state.symtab, symtab);
        let result = f(self);
        self.state.symtab = saved;
        result
    }

    /// Same state, different pool.
    pub(crate) fn over<'b>(&'b mut self, pool: &'b Arc<AstPool>) -> Context<'b> {
        Context {
            pool,
            state: &mut *self.state,
        }
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.state.config
    }
}

/// Identifiers written entirely in uppercase are constants.
pub fn is_const_name(name: &str) -> bool {
    name.chars().any(|c| c.is_ascii_alphabetic())
        && !name.chars().any(|c| c.is_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn const_names_are_all_uppercase() {
        assert!(is_const_name("XLEN"));
        assert!(is_const_name("MAX_2"));
        assert!(!is_const_name("Max"));
        assert!(!is_const_name("_1"));
    }
}
