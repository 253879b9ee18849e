//! Calls to user functions: signature instantiation and the lazy, once per
//! instantiation, check of function bodies.

use std::sync::Arc;

use tracing::debug;

use super::{Context, InstanceKey};
use crate::ast::{AstIdx, NameIdx};
use crate::error::{value_try, Result};
use crate::eval::coerce;
use crate::symtab::{Var, VarKind};
use crate::types::{FunctionDef, Qualifiers, Type};
use crate::value::Value;

/// Argument and return types of one instantiation of a function.
#[derive(Debug, Clone)]
pub struct Signature {
    pub args: Vec<Type>,
    pub returns: Vec<Type>,
}

impl Signature {
    /// Type of a call expression: void, the single result, or a tuple.
    pub fn return_type(&self) -> Type {
        match self.returns.as_slice() {
            [] => Type::void(),
            [single] => single.clone(),
            many => Type::tuple(many.to_vec()),
        }
    }
}

impl Context<'_> {
    pub(crate) fn check_call(
        &mut self,
        at: AstIdx,
        name: NameIdx,
        template_args: &[AstIdx],
        args: &[AstIdx],
    ) -> Result<()> {
        for arg in template_args.iter().chain(args) {
            self.type_check(*arg)?;
        }

        let def = self.lookup_function(at, name)?;
        if args.len() != def.arguments.len() {
            return Err(self.type_error(
                at,
                format!(
                    "function '{}' expects {} argument(s), {} given",
                    def.name,
                    def.arguments.len(),
                    args.len()
                ),
            ));
        }

        let values = self.template_values(at, &def, template_args)?;
        let sig = self.instantiate(&def, &values)?;

        for (i, (arg, want)) in args.iter().zip(&sig.args).enumerate() {
            let got = self.type_of(*arg)?;
            if !got.convertable_to(want) {
                return Err(self.type_error(
                    *arg,
                    format!(
                        "argument {} of '{}' has type {got}, expected {want}",
                        i + 1,
                        def.name
                    ),
                ));
            }
        }

        if def.is_builtin() {
            return Ok(());
        }

        let key = InstanceKey {
            pool: def.pool.id(),
            node: def.node,
            template_values: values.iter().flatten().cloned().collect(),
        };
        if !self.state.instantiated.contains(&key) {
            debug!(
                function = %def.name,
                template = ?key.template_values,
                "checking function body"
            );
            self.check_body(&def, &values, &sig)?;
            self.state.instantiated.insert(key);
        }
        Ok(())
    }

    pub(crate) fn call_type(
        &mut self,
        at: AstIdx,
        name: NameIdx,
        template_args: &[AstIdx],
    ) -> Result<Type> {
        let def = self.lookup_function(at, name)?;
        let values = self.template_values(at, &def, template_args)?;
        Ok(self.instantiate(&def, &values)?.return_type())
    }

    /// A function visible at the call site. Functions whose bodies are
    /// being checked are hidden, so recursion is rejected here.
    pub(crate) fn lookup_function(&self, at: AstIdx, name: NameIdx) -> Result<Arc<FunctionDef>> {
        let name = self.name(name);
        if self.state.active_functions.iter().any(|f| f == name) {
            return Err(self.type_error(
                at,
                format!("recursive call to '{name}' is not supported"),
            ));
        }
        match self.symtab().get(name) {
            Some(symbol) => match symbol.as_function() {
                Some(def) => Ok(Arc::clone(def)),
                None => Err(self.type_error(at, format!("'{name}' is not a function"))),
            },
            None => Err(self.type_error(at, format!("undefined function '{name}'"))),
        }
    }

    pub(crate) fn template_values(
        &mut self,
        at: AstIdx,
        def: &FunctionDef,
        template_args: &[AstIdx],
    ) -> Result<Vec<Option<Value>>> {
        if template_args.len() != def.template.len() {
            return Err(self.type_error(
                at,
                format!(
                    "function '{}' expects {} template argument(s), {} given",
                    def.name,
                    def.template.len(),
                    template_args.len()
                ),
            ));
        }

        template_args
            .iter()
            .map(|arg| match value_try(self.value(*arg))? {
                Some(value) => Ok(Some(value)),
                None => Err(self.type_error(
                    *arg,
                    "template argument must be known at compile time",
                )),
            })
            .collect()
    }

    /// Resolves the signature of `def` in a fresh scope above global,
    /// inside the pool that defines it.
    pub(crate) fn instantiate(
        &mut self,
        def: &Arc<FunctionDef>,
        template_values: &[Option<Value>],
    ) -> Result<Signature> {
        let mut symtab = self.symtab().global_clone();
        symtab.push();
        self.with_symtab(symtab, |ctx| {
            ctx.over(&def.pool).resolve_signature(def, template_values)
        })
    }

    /// Binds template parameters in the current scope and resolves the
    /// argument and return types. `self` must be over the defining pool.
    pub(crate) fn resolve_signature(
        &mut self,
        def: &FunctionDef,
        template_values: &[Option<Value>],
    ) -> Result<Signature> {
        self.bind_template(def, template_values)?;
        let returns = def
            .returns
            .iter()
            .map(|ty| self.resolve_type(*ty))
            .collect::<Result<Vec<_>>>()?;
        let args = def
            .arguments
            .iter()
            .map(|arg| self.resolve_type(arg.ty))
            .collect::<Result<Vec<_>>>()?;
        Ok(Signature { args, returns })
    }

    pub(crate) fn bind_template(
        &mut self,
        def: &FunctionDef,
        values: &[Option<Value>],
    ) -> Result<()> {
        for (index, param) in def.template.iter().enumerate() {
            let ty = self
                .resolve_type(param.ty)?
                .qualify(Qualifiers::CONST | Qualifiers::TEMPLATE_VAR);
            let value = values
                .get(index)
                .cloned()
                .flatten()
                .map(|v| coerce(v, &ty));
            let var = Var::new(self.name(param.name), ty, value)
                .with_kind(VarKind::TemplateParam { index });
            self.declare(param.ty, var)?;
        }
        Ok(())
    }

    fn check_body(
        &mut self,
        def: &Arc<FunctionDef>,
        template_values: &[Option<Value>],
        sig: &Signature,
    ) -> Result<()> {
        let Some(body) = &def.body else {
            return Ok(());
        };

        let mut symtab = self.symtab().global_clone();
        symtab.push();
        self.with_symtab(symtab, |ctx| {
            let mut inner = ctx.over(&def.pool);
            inner.bind_template(def, template_values)?;
            for (arg, ty) in def.arguments.iter().zip(&sig.args) {
                let var = Var::new(inner.name(arg.name), ty.clone(), None)
                    .with_kind(VarKind::Argument);
                inner.declare(arg.ty, var)?;
            }

            inner.push_return_types(sig.returns.clone());
            inner.state.active_functions.push(def.name.clone());
            let result = inner.check_block(body);
            inner.state.active_functions.pop();
            inner.pop_return_types();
            result
        })
    }
}
