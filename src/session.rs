//! Request-level entry point: one [`Session`] per instruction or CSR body
//! being analyzed, all sharing an immutable [`GlobalScope`].

use std::sync::Arc;

use tracing::debug;

use crate::ast::{AstIdx, Node, Program};
use crate::checker::{CheckerConfig, Context, SessionState};
use crate::error::{InternalError, Result};
use crate::eval::{Executable, Rvalue};
use crate::symtab::{GlobalScope, PooledSymtab, Symbol, SymbolTable, SymtabError, Var};
use crate::types::Type;
use crate::value::Value;

/// Owns the scope stack of one request. Statements checked or executed at
/// the top level of a fragment bind into the session frame, so later
/// programs see them.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    decode_vars: Vec<(String, u32)>,
}

impl Session {
    pub fn new(global: Arc<GlobalScope>) -> Self {
        Self::with_config(global, CheckerConfig::default())
    }

    pub fn with_config(global: Arc<GlobalScope>, config: CheckerConfig) -> Self {
        Self::from_table(SymbolTable::new(global), config)
    }

    fn from_table(mut symtab: SymbolTable, config: CheckerConfig) -> Self {
        symtab.reset_to_global();
        symtab.push();
        Self {
            state: SessionState::new(symtab, config),
            decode_vars: Vec::new(),
        }
    }

    /// Runs `f` in a session backed by a table taken from a
    /// [`SymtabPool`](crate::symtab::SymtabPool). The table is handed back to
    /// the guard afterwards and reset to global depth when the guard drops.
    pub fn pooled<T>(
        table: &mut PooledSymtab<'_>,
        config: CheckerConfig,
        f: impl FnOnce(&mut Session) -> T,
    ) -> T {
        let placeholder = SymbolTable::new(Arc::clone(table.global()));
        let owned = std::mem::replace(&mut **table, placeholder);
        let mut session = Session::from_table(owned, config);
        let out = f(&mut session);
        **table = session.state.symtab;
        out
    }

    pub fn global(&self) -> &Arc<GlobalScope> {
        self.state.symtab.global()
    }

    pub fn symtab(&self) -> &SymbolTable {
        &self.state.symtab
    }

    /// Binds an encoded instruction field. Decode variables have a type but
    /// never a compile-time value, and cannot be written.
    pub fn add_decode_var(
        &mut self,
        name: &str,
        width: u32,
    ) -> std::result::Result<(), SymtabError> {
        self.state
            .symtab
            .add_unique(name, Symbol::Var(Var::decode(name, width)))?;
        self.decode_vars.push((name.to_string(), width));
        Ok(())
    }

    /// Drops everything bound by earlier programs, keeping decode variables.
    pub fn reset(&mut self) {
        let symtab = &mut self.state.symtab;
        symtab.reset_to_global();
        symtab.push();
        for (name, width) in &self.decode_vars {
            // Names were unique when first added and the frame is fresh.
            let added = symtab.add(name.as_str(), Symbol::Var(Var::decode(name.as_str(), *width)));
            debug_assert!(added.is_ok(), "decode variable '{name}' rebound after reset");
        }
    }

    /// Type-checks a program. The items of a fragment are checked directly
    /// in the session frame.
    pub fn type_check(&mut self, program: &Program) -> Result<()> {
        let mut ctx = Context::new(&program.pool, &mut self.state);
        match program.root_node() {
            Node::Fragment(items) => {
                for item in items {
                    ctx.type_check(*item)?;
                }
                ctx.mark_checked(program.root);
                Ok(())
            }
            Node::Isa(_) => Err(InternalError::new(
                "isa programs are checked by build_global_scope",
            )
            .into()),
            _ => ctx.type_check(program.root),
        }
    }

    pub fn type_of(&mut self, program: &Program, node: AstIdx) -> Result<Type> {
        let mut ctx = Context::new(&program.pool, &mut self.state);
        node.type_in(&mut ctx)
    }

    /// Compile-time value of an expression program's root.
    pub fn value(&mut self, program: &Program) -> Result<Value> {
        self.value_of(program, program.root)
    }

    pub fn value_of(&mut self, program: &Program, node: AstIdx) -> Result<Value> {
        let mut ctx = Context::new(&program.pool, &mut self.state);
        node.value_in(&mut ctx)
    }

    /// Executes a checked fragment in the session frame.
    pub fn execute(&mut self, program: &Program) -> Result<()> {
        let mut ctx = Context::new(&program.pool, &mut self.state);
        match program.root_node() {
            Node::Fragment(items) => {
                debug!(statements = items.len(), "executing fragment");
                items.iter().try_for_each(|item| item.execute_in(&mut ctx))
            }
            _ => program.root.execute_in(&mut ctx),
        }
    }

    /// Current compile-time value of a variable, if known.
    pub fn var_value(&self, name: &str) -> Option<Value> {
        self.state.symtab.get_var(name)?.value().cloned()
    }

    pub fn instantiation_count(&self) -> usize {
        self.state.instantiation_count()
    }
}
