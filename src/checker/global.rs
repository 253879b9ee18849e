//! Construction of the frozen global scope from an `isa` program.
//!
//! Definitions are entered in three passes so that order within the source
//! only matters inside a pass: user types first, then global constants
//! (which may use the types), then function signatures (which may use
//! both). Function bodies are not checked here.

use std::sync::Arc;

use super::{is_const_name, CheckerConfig, Context, SessionState};
use crate::arch::Architecture;
use crate::ast::{AstIdx, Node, Program};
use crate::error::{InternalError, Result};
use crate::symtab::{GlobalScope, Symbol, SymbolTable};
use crate::types::{
    BitRange, BitfieldDef, EnumDef, FunctionDef, Qualifiers, ShapeError, Type, TypeKind,
};
use crate::value::Value;

/// Builds the global scope for `arch`, extended with the definitions of
/// `isa` when given.
pub fn build_global_scope(
    arch: Arc<dyn Architecture>,
    isa: Option<&Program>,
    config: CheckerConfig,
) -> Result<Arc<GlobalScope>> {
    let builtin = Arc::new(GlobalScope::builtin(Arc::clone(&arch)));
    let Some(isa) = isa else {
        return Ok(builtin);
    };

    let mut symtab = SymbolTable::new(Arc::clone(&builtin));
    symtab.push();
    let mut state = SessionState::new(symtab, config);

    let mut ctx = Context::new(&isa.pool, &mut state);
    let items = isa.items();
    for item in items {
        ctx.define_type(*item)?;
    }
    for item in items {
        ctx.define_constant(*item)?;
    }
    for item in items {
        ctx.define_function(*item)?;
    }

    let defined = state
        .symtab
        .take_frame()
        .map_err(|err| InternalError::new(err.to_string()))?;
    let mut symbols = builtin.symbols().clone();
    symbols.extend(defined);
    Ok(Arc::new(GlobalScope::from_parts(arch, symbols)))
}

impl Context<'_> {
    fn shape_error(&self, at: AstIdx, err: ShapeError) -> crate::error::IdlError {
        self.type_error(at, err.to_string())
    }

    fn define_type(&mut self, at: AstIdx) -> Result<()> {
        let (name, ty) = match self.node(at) {
            Node::EnumDef { name, members } => {
                let mut next = 0u128;
                let mut values = Vec::with_capacity(members.len());
                for member in members {
                    let value = member.value.unwrap_or(next);
                    let value = u64::try_from(value).map_err(|_| {
                        self.type_error(at, format!("enum value {value} does not fit in 64 bits"))
                    })?;
                    values.push((self.name(member.name).to_string(), value));
                    next = u128::from(value) + 1;
                }
                let def = EnumDef::new(self.name(*name), values)
                    .map_err(|err| self.shape_error(at, err))?;
                (*name, Type::new(TypeKind::Enum(Arc::new(def))))
            }
            Node::BitfieldDef {
                name,
                width,
                fields,
            } => {
                let fields = fields
                    .iter()
                    .map(|field| {
                        BitRange::try_new(field.msb, field.lsb)
                            .map(|range| (self.name(field.name).to_string(), range))
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|err| self.shape_error(at, err))?;
                let def = BitfieldDef::new(self.name(*name), *width, fields)
                    .map_err(|err| self.shape_error(at, err))?;
                (*name, Type::new(TypeKind::Bitfield(Arc::new(def))))
            }
            _ => return Ok(()),
        };

        let name = self.name(name);
        self.state
            .symtab
            .add_unique(name, Symbol::Type(ty))
            .map_err(|err| self.symtab_error(at, err))
    }

    fn define_constant(&mut self, at: AstIdx) -> Result<()> {
        let Node::GlobalConstant(decl) = self.node(at) else {
            return Ok(());
        };
        let Node::DeclarationInit {
            ty,
            name,
            array_len,
            init,
        } = self.node(*decl)
        else {
            return Err(InternalError::new("global constant without an initializer").into());
        };

        let text = self.name(*name);
        if !is_const_name(text) {
            return Err(self.type_error(
                at,
                format!("global constant '{text}' must be written in uppercase"),
            ));
        }
        self.check_declaration_init(
            *decl,
            *ty,
            *name,
            *array_len,
            *init,
            Qualifiers::CONST | Qualifiers::GLOBAL,
        )?;
        self.mark_checked(at);
        Ok(())
    }

    fn define_function(&mut self, at: AstIdx) -> Result<()> {
        let Node::FunctionDef {
            name,
            template,
            returns,
            args,
            description,
            body,
        } = self.node(at)
        else {
            return Ok(());
        };

        let def = FunctionDef {
            name: self.name(*name).to_string(),
            pool: Arc::clone(self.pool),
            node: at,
            template: template.clone(),
            returns: returns.clone(),
            arguments: args.clone(),
            description: description.map(|d| self.name(d).trim().to_string()),
            body: body.clone(),
        };

        // Signatures are validated with the template parameters unknown.
        let unknown: Vec<Option<Value>> = vec![None; def.template.len()];
        self.scoped(|ctx| ctx.resolve_signature(&def, &unknown))?;

        self.state
            .symtab
            .add_unique(def.name.clone(), Symbol::Function(Arc::new(def)))
            .map_err(|err| self.symtab_error(at, err))
    }
}
