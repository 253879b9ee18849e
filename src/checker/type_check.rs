use tracing::trace;

use super::{is_const_name, Context};
use crate::ast::{AstIdx, Capabilities, ElseIf, NameIdx, Node, TypeName};
use crate::error::{value_try, InternalError, Result};
use crate::eval::coerce;
use crate::symtab::{Symbol, Var};
use crate::types::{Qualifiers, Type, TypeKind, Width};
use crate::value::Value;

impl Context<'_> {
    /// Validates the subtree at `at`. Statements that introduce bindings
    /// leave them in the current scope; blocks push and pop their own.
    pub fn type_check(&mut self, at: AstIdx) -> Result<()> {
        let node = self.node(at);
        if node.capabilities().contains(Capabilities::RVALUE) {
            self.check_expr(at)?;
        } else {
            self.check_statement(at, node)?;
        }
        self.mark_checked(at);
        Ok(())
    }

    fn check_statement(&mut self, at: AstIdx, node: &Node) -> Result<()> {
        match node {
            Node::TypeName(_) => self.resolve_type(at).map(|_| ()),
            Node::Declaration {
                ty,
                names,
                array_len,
            } => self.check_declaration(at, *ty, names, *array_len),
            Node::DeclarationInit {
                ty,
                name,
                array_len,
                init,
            } => {
                self.check_declaration_init(at, *ty, *name, *array_len, *init, Qualifiers::empty())
            }
            Node::Assign { target, value } => {
                self.type_check(*target)?;
                self.type_check(*value)?;
                let target_ty = self.check_writable(*target)?;
                let value_ty = self.type_of(*value)?;
                if !value_ty.convertable_to(&target_ty) {
                    return Err(self.type_error(
                        at,
                        format!("cannot assign a value of type {value_ty} to {target_ty}"),
                    ));
                }
                Ok(())
            }
            Node::MultiAssign { targets, value } => self.check_multi_assign(at, targets, *value),
            Node::Step { target, .. } => {
                self.type_check(*target)?;
                let ty = self.check_writable(*target)?;
                if !ty.is_bits_like() {
                    return Err(self.type_error(
                        at,
                        format!("cannot increment a value of type {ty}"),
                    ));
                }
                Ok(())
            }
            Node::CallStatement(call) => self.type_check(*call),
            Node::Return(values) => {
                let expected = self.expected_returns(at)?;
                self.check_return_values(at, values, &expected)
            }
            Node::ConditionalReturn { values, cond } => {
                let expected = self.expected_returns(at)?;
                self.check_condition(*cond)?;
                self.check_return_values(at, values, &expected)
            }
            Node::Conditional { stmt, cond } => match self.check_condition(*cond)? {
                Some(false) => {
                    trace!(line = self.pool.span(at).line, "conditional statement is dead");
                    Ok(())
                }
                _ => self.type_check(*stmt),
            },
            Node::If {
                cond,
                then_body,
                else_ifs,
                else_body,
            } => self.check_if(*cond, then_body, else_ifs, else_body.as_deref()),
            Node::For {
                init,
                cond,
                update,
                body,
            } => self.scoped(|ctx| {
                ctx.type_check(*init)?;
                ctx.check_condition(*cond)?;
                ctx.type_check(*update)?;
                ctx.check_block(body)
            }),
            Node::Fragment(items) => self.check_block(items),
            Node::Isa(_)
            | Node::EnumDef { .. }
            | Node::BitfieldDef { .. }
            | Node::FunctionDef { .. }
            | Node::GlobalConstant(_) => Err(InternalError::new(format!(
                "{} is checked while building the global scope",
                node.kind_name()
            ))
            .into()),
            other => Err(InternalError::new(format!(
                "{} reached statement checking",
                other.kind_name()
            ))
            .into()),
        }
    }

    /// Checks a statement list inside its own scope.
    pub fn check_block(&mut self, body: &[AstIdx]) -> Result<()> {
        self.scoped(|ctx| body.iter().try_for_each(|stmt| ctx.type_check(*stmt)))
    }

    /// Checks a condition and returns its value when it is known.
    pub(crate) fn check_condition(&mut self, cond: AstIdx) -> Result<Option<bool>> {
        self.type_check(cond)?;
        let ty = self.type_of(cond)?;
        if !ty.is_boolean() {
            return Err(self.type_error(cond, format!("condition must be Boolean, found {ty}")));
        }
        Ok(value_try(self.value(cond))?.and_then(|v| v.as_bool()))
    }

    fn check_if(
        &mut self,
        cond: AstIdx,
        then_body: &[AstIdx],
        else_ifs: &[ElseIf],
        else_body: Option<&[AstIdx]>,
    ) -> Result<()> {
        let arms = std::iter::once((cond, then_body))
            .chain(else_ifs.iter().map(|arm| (arm.cond, arm.body.as_slice())));

        for (cond, body) in arms {
            match self.check_condition(cond)? {
                Some(true) => return self.check_block(body),
                Some(false) => {
                    trace!(line = self.pool.span(cond).line, "branch statically dead");
                }
                None => {
                    trace!(line = self.pool.span(cond).line, "branch not statically known");
                    self.check_block(body)?;
                }
            }
        }

        match else_body {
            Some(body) => self.check_block(body),
            None => Ok(()),
        }
    }

    // ------------------------------------------------------------ types

    /// Type denoted by a type-name node.
    pub fn resolve_type(&mut self, at: AstIdx) -> Result<Type> {
        let Node::TypeName(name) = self.node(at) else {
            return Err(InternalError::new(format!(
                "expected a type name, found {}",
                self.node(at).kind_name()
            ))
            .into());
        };

        let ty = match name {
            TypeName::Bits(width) => Type::bits_of(self.const_width(*width)?),
            TypeName::XReg => Type::bits_of(match self.symtab().xlen() {
                Some(w) => Width::Known(w),
                None => Width::Unknown,
            }),
            TypeName::U32 => Type::bits(32),
            TypeName::U64 => Type::bits(64),
            TypeName::Boolean => Type::boolean(),
            TypeName::String => Type::string(),
            TypeName::User(name) => {
                let name = self.name(*name);
                match self.symtab().get(name) {
                    Some(Symbol::Type(ty)) => match &ty.kind {
                        TypeKind::Enum(def) => Type::enum_ref(def.clone()),
                        _ => ty.unqualified(),
                    },
                    Some(_) => return Err(self.type_error(at, format!("'{name}' is not a type"))),
                    None => return Err(self.type_error(at, format!("undefined type '{name}'"))),
                }
            }
        };

        self.mark_checked(at);
        Ok(ty)
    }

    /// Width expression of `Bits<...>`: known, or unknown only when it
    /// depends on constants the configuration leaves open.
    fn const_width(&mut self, expr: AstIdx) -> Result<Width> {
        self.type_check(expr)?;
        let ty = self.type_of(expr)?;
        if !ty.is_integral() {
            return Err(self.type_error(expr, format!("Bits width must be an integer, found {ty}")));
        }
        match value_try(self.value(expr))? {
            Some(Value::Int(n)) => match u32::try_from(n) {
                Ok(w) if w > 0 => Ok(Width::Known(w)),
                _ => Err(self.type_error(expr, format!("Bits width must be positive, found {n}"))),
            },
            Some(other) => Err(self.type_error(expr, format!("invalid Bits width {other}"))),
            None if ty.is_const() => Ok(Width::Unknown),
            None => Err(self.type_error(expr, "Bits width must be known at compile time")),
        }
    }

    pub(crate) fn declared_type(&mut self, ty: AstIdx, array_len: Option<AstIdx>) -> Result<Type> {
        let base = self.resolve_type(ty)?;
        let Some(len) = array_len else {
            return Ok(base);
        };

        self.type_check(len)?;
        match value_try(self.value(len))? {
            Some(Value::Int(n)) => match usize::try_from(n) {
                Ok(n) => Ok(Type::array(base, n)),
                Err(_) => Err(self.type_error(
                    len,
                    format!("array size must not be negative, found {n}"),
                )),
            },
            Some(other) => Err(self.type_error(len, format!("invalid array size {other}"))),
            None => Err(self.type_error(len, "array size must be known at compile time")),
        }
    }

    // ------------------------------------------------------------ declarations

    fn check_declaration(
        &mut self,
        at: AstIdx,
        ty: AstIdx,
        names: &[NameIdx],
        array_len: Option<AstIdx>,
    ) -> Result<()> {
        let decl_ty = self.declared_type(ty, array_len)?;
        for name in names {
            let name = self.name(*name);
            if is_const_name(name) {
                return Err(self.type_error(
                    at,
                    format!("constant '{name}' must be initialized"),
                ));
            }
            self.declare(at, Var::new(name, decl_ty.clone(), None))?;
        }
        Ok(())
    }

    pub(crate) fn check_declaration_init(
        &mut self,
        at: AstIdx,
        ty: AstIdx,
        name: NameIdx,
        array_len: Option<AstIdx>,
        init: AstIdx,
        qualifiers: Qualifiers,
    ) -> Result<()> {
        let decl_ty = self.declared_type(ty, array_len)?;
        self.type_check(init)?;
        let init_ty = self.type_of(init)?;
        let name = self.name(name);

        if !init_ty.convertable_to(&decl_ty) {
            return Err(self.type_error(
                at,
                format!(
                    "cannot initialize '{name}' of type {decl_ty} with a value of type {init_ty}"
                ),
            ));
        }

        if !is_const_name(name) && !qualifiers.contains(Qualifiers::CONST) {
            return self.declare(at, Var::new(name, decl_ty, None));
        }

        let Some(value) = value_try(self.value(init))? else {
            return Err(self.type_error(
                init,
                format!("constant '{name}' must be initialized with a value known at compile time"),
            ));
        };
        let ty = decl_ty.qualify(Qualifiers::CONST | qualifiers);
        let value = coerce(value, &ty);
        self.declare(at, Var::new(name, ty, Some(value)))
    }

    pub(crate) fn declare(&mut self, at: AstIdx, var: Var) -> Result<()> {
        let name = var.name().to_string();
        self.state
            .symtab
            .add_unique(name, Symbol::Var(var))
            .map_err(|err| self.symtab_error(at, err))
    }

    // ------------------------------------------------------------ assignment

    /// Type of a writable location, or a type error explaining why the
    /// target cannot be written.
    pub(crate) fn check_writable(&mut self, target: AstIdx) -> Result<Type> {
        match self.node(target) {
            Node::Id(name) => {
                let name = self.name(*name);
                let Some(Symbol::Var(var)) = self.symtab().get(name) else {
                    return Err(self.type_error(target, format!("'{name}' is not a variable")));
                };
                if var.is_decode() {
                    Err(self.type_error(
                        target,
                        format!("cannot assign to decode variable '{name}'"),
                    ))
                } else if var.ty().is_template_var() {
                    Err(self.type_error(
                        target,
                        format!("cannot assign to template parameter '{name}'"),
                    ))
                } else if var.ty().is_global() {
                    Err(self.type_error(
                        target,
                        format!("cannot assign to global constant '{name}'"),
                    ))
                } else if var.ty().is_const() {
                    Err(self.type_error(target, format!("cannot assign to constant '{name}'")))
                } else {
                    Ok(var.ty().clone())
                }
            }
            Node::BitExtract { expr, .. }
            | Node::RangeExtract { expr, .. }
            | Node::FieldAccess { expr, .. } => {
                self.check_writable(*expr)?;
                self.type_of(target)
            }
            Node::CsrField { csr, field } => {
                let csr_ty = self.type_of(*csr)?;
                let TypeKind::Csr { info, .. } = &csr_ty.kind else {
                    return Err(InternalError::new("CSR field on a non-CSR").into());
                };
                let field_name = self.name(*field);
                if let Some(field) = info.get_field(field_name) {
                    if !field.access.is_writable() {
                        return Err(self.type_error(
                            target,
                            format!(
                                "CSR field {}.{} is read-only ({})",
                                info.name,
                                field_name,
                                field.access.name()
                            ),
                        ));
                    }
                }
                self.type_of(target)
            }
            Node::XReg(_) => self.type_of(target),
            other => Err(self.type_error(
                target,
                format!("cannot assign to a {}", other.kind_name()),
            )),
        }
    }

    fn check_multi_assign(&mut self, at: AstIdx, targets: &[AstIdx], value: AstIdx) -> Result<()> {
        self.type_check(value)?;
        let value_ty = self.type_of(value)?;
        let TypeKind::Tuple(elems) = &value_ty.kind else {
            return Err(self.type_error(
                at,
                format!("multi-assignment needs a multi-value function call, found {value_ty}"),
            ));
        };
        if elems.len() != targets.len() {
            return Err(self.type_error(
                at,
                format!(
                    "{} values assigned to {} targets",
                    elems.len(),
                    targets.len()
                ),
            ));
        }
        for (target, elem) in targets.iter().zip(elems) {
            self.type_check(*target)?;
            let target_ty = self.check_writable(*target)?;
            if !elem.convertable_to(&target_ty) {
                return Err(self.type_error(
                    *target,
                    format!("cannot assign a value of type {elem} to {target_ty}"),
                ));
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------ returns

    fn expected_returns(&self, at: AstIdx) -> Result<Vec<Type>> {
        self.state
            .return_types
            .last()
            .cloned()
            .ok_or_else(|| self.type_error(at, "return outside of a function body"))
    }

    fn check_return_values(
        &mut self,
        at: AstIdx,
        values: &[AstIdx],
        expected: &[Type],
    ) -> Result<()> {
        let mut actual = Vec::with_capacity(values.len());
        for value in values {
            self.type_check(*value)?;
            actual.push(self.type_of(*value)?);
        }

        // A single call may forward all of another function's results.
        if let [single] = actual.as_slice() {
            if let TypeKind::Tuple(elems) = &single.kind {
                actual = elems.clone();
            }
        }

        if actual.len() != expected.len() {
            return Err(self.type_error(
                at,
                format!(
                    "function returns {} value(s), {} given",
                    expected.len(),
                    actual.len()
                ),
            ));
        }
        for (i, (got, want)) in actual.iter().zip(expected).enumerate() {
            if !got.convertable_to(want) {
                return Err(self.type_error(
                    at,
                    format!("return value {} has type {got}, expected {want}", i + 1),
                ));
            }
        }
        Ok(())
    }

    pub(crate) fn push_return_types(&mut self, types: Vec<Type>) {
        self.state.return_types.push(types);
    }

    pub(crate) fn pop_return_types(&mut self) {
        self.state.return_types.pop();
    }
}
