//! Lowering of a normalized raw tree into [`AstPool`] nodes.
//!
//! Lowering is 1:1 apart from postfix suffixes, which become nested
//! extraction, field and CSR nodes. Chains that survived normalization are
//! a defect and are reported as internal errors.

use super::error::{error_with_location, ParserError};
use super::parser::Rule;
use super::raw::{RawKind, RawNode};
use crate::ast::literal::parse_int_literal;
use crate::ast::{
    AstIdx, AstPool, BitfieldField, BuiltinFunc, CsrMethod, CsrSelector, ElseIf, EnumMember,
    Literal, NameIdx, Node, Span, StepOp, TypeName, TypedName, UnaryOp,
};
use crate::error::{InternalError, Result};

pub struct Lowerer<'a> {
    pool: AstPool,
    input: &'a str,
}

impl<'a> Lowerer<'a> {
    pub fn new(file: &str, input: &'a str) -> Self {
        Self {
            pool: AstPool::new(file),
            input,
        }
    }

    pub fn finish(self) -> AstPool {
        self.pool
    }

    fn error(&self, span: Span, message: &str) -> ParserError {
        error_with_location(self.input, span, message)
    }

    fn rule_of(&self, node: &RawNode) -> Result<Rule> {
        match node.kind {
            RawKind::Rule(rule) if node.is_chain() => Err(InternalError::new(format!(
                "operator chain {rule:?} at {}:{} reached lowering without normalization",
                node.span.line, node.span.column
            ))
            .into()),
            RawKind::Rule(rule) => Ok(rule),
            RawKind::Binary(_) => Ok(Rule::expression),
        }
    }

    fn expect_rule(&self, node: &RawNode, rule: Rule) -> Result<()> {
        if self.rule_of(node)? == rule {
            Ok(())
        } else {
            Err(self
                .error(
                    node.span,
                    &format!("Expected {rule:?} but found {:?}", node.kind),
                )
                .into())
        }
    }

    fn child<'n>(&self, node: &'n RawNode, index: usize) -> Result<&'n RawNode> {
        node.children.get(index).ok_or_else(|| {
            self.error(
                node.span,
                &format!("{:?} is missing element {}", node.kind, index + 1),
            )
            .into()
        })
    }

    fn add(&mut self, node: Node, span: Span) -> AstIdx {
        self.pool.add(node, span)
    }

    fn name(&mut self, node: &RawNode) -> NameIdx {
        self.pool.intern_string(node.text.trim())
    }

    fn literal(&self, node: &RawNode) -> Result<Literal> {
        parse_int_literal(&node.text).map_err(|source| {
            ParserError::InvalidLiteral {
                text: node.text.clone(),
                line: node.span.line,
                column: node.span.column,
                source,
            }
            .into()
        })
    }

    fn small_int(&self, node: &RawNode) -> Result<u32> {
        let literal = self.literal(node)?;
        u32::try_from(literal.magnitude).map_err(|_| {
            self.error(node.span, &format!("'{}' is too large here", node.text))
                .into()
        })
    }

    // ------------------------------------------------------------ roots

    pub fn lower_isa(&mut self, node: &RawNode) -> Result<AstIdx> {
        self.expect_rule(node, Rule::isa)?;
        let mut items = Vec::new();
        for child in &node.children {
            if child.is_rule(Rule::EOI) {
                continue;
            }
            items.push(self.lower_definition(child)?);
        }
        Ok(self.add(Node::Isa(items), node.span))
    }

    pub fn lower_fragment(&mut self, node: &RawNode) -> Result<AstIdx> {
        self.expect_rule(node, Rule::fragment)?;
        let items = self.lower_statements(&node.children)?;
        Ok(self.add(Node::Fragment(items), node.span))
    }

    pub fn lower_expression_fragment(&mut self, node: &RawNode) -> Result<AstIdx> {
        self.expect_rule(node, Rule::expression_fragment)?;
        let expr = self.child(node, 0)?;
        self.lower_expr(expr)
    }

    // ------------------------------------------------------------ definitions

    fn lower_definition(&mut self, node: &RawNode) -> Result<AstIdx> {
        match self.rule_of(node)? {
            Rule::global_constant => {
                let decl = self.lower_statement(self.child(node, 0)?)?;
                Ok(self.add(Node::GlobalConstant(decl), node.span))
            }
            Rule::enum_definition => self.lower_enum(node),
            Rule::bitfield_definition => self.lower_bitfield(node),
            Rule::function_definition | Rule::builtin_function_definition => {
                self.lower_function(node)
            }
            other => Err(ParserError::UnexpectedRule(other).into()),
        }
    }

    fn lower_enum(&mut self, node: &RawNode) -> Result<AstIdx> {
        let name = self.name(self.child(node, 0)?);
        let mut members = Vec::new();
        for member in &node.children[1..] {
            let member_name = self.name(self.child(member, 0)?);
            let value = match member.children.get(1) {
                Some(lit) => Some(self.literal(lit)?.magnitude),
                None => None,
            };
            members.push(EnumMember {
                name: member_name,
                value,
            });
        }
        Ok(self.add(Node::EnumDef { name, members }, node.span))
    }

    fn lower_bitfield(&mut self, node: &RawNode) -> Result<AstIdx> {
        let width = self.small_int(self.child(node, 0)?)?;
        let name = self.name(self.child(node, 1)?);
        let mut fields = Vec::new();
        for field in &node.children[2..] {
            let field_name = self.name(self.child(field, 0)?);
            let msb = self.small_int(self.child(field, 1)?)?;
            let lsb = match field.children.get(2) {
                Some(lsb) => self.small_int(lsb)?,
                None => msb,
            };
            fields.push(BitfieldField {
                name: field_name,
                msb,
                lsb,
            });
        }
        Ok(self.add(Node::BitfieldDef { name, width, fields }, node.span))
    }

    fn lower_function(&mut self, node: &RawNode) -> Result<AstIdx> {
        let builtin = node.is_rule(Rule::builtin_function_definition);
        let name = self.name(self.child(node, 0)?);

        let mut template = Vec::new();
        let mut returns = Vec::new();
        let mut args = Vec::new();
        let mut description = None;
        let mut body = None;

        for part in &node.children[1..] {
            match self.rule_of(part)? {
                Rule::function_template => template = self.lower_typed_names(part)?,
                Rule::function_arguments => args = self.lower_typed_names(part)?,
                Rule::function_returns => {
                    for ty in &part.children {
                        returns.push(self.lower_type(ty)?);
                    }
                }
                Rule::function_description => {
                    let text = self.child(part, 0)?.text.trim().to_string();
                    description = Some(self.pool.intern_string(&text));
                }
                Rule::function_body => body = Some(self.lower_statements(&part.children)?),
                other => return Err(ParserError::UnexpectedRule(other).into()),
            }
        }

        if !builtin && body.is_none() {
            return Err(self
                .error(node.span, "Function definition is missing its body")
                .into());
        }

        Ok(self.add(
            Node::FunctionDef {
                name,
                template,
                returns,
                args,
                description,
                body,
            },
            node.span,
        ))
    }

    fn lower_typed_names(&mut self, node: &RawNode) -> Result<Vec<TypedName>> {
        node.children
            .iter()
            .map(|typed| -> Result<TypedName> {
                let ty = self.lower_type(self.child(typed, 0)?)?;
                let name = self.name(self.child(typed, 1)?);
                Ok(TypedName { ty, name })
            })
            .collect()
    }

    fn lower_type(&mut self, node: &RawNode) -> Result<AstIdx> {
        self.expect_rule(node, Rule::type_name)?;
        let inner = self.child(node, 0)?;
        let ty = match self.rule_of(inner)? {
            Rule::bits_type => {
                let width = self.child(inner, 0)?;
                let width = match self.rule_of(width)? {
                    Rule::int => self.lower_int(width)?,
                    Rule::id => {
                        let name = self.name(width);
                        self.add(Node::Id(name), width.span)
                    }
                    _ => self.lower_expr(width)?,
                };
                TypeName::Bits(width)
            }
            Rule::builtin_type => match inner.text.as_str() {
                "XReg" => TypeName::XReg,
                "U32" => TypeName::U32,
                "U64" => TypeName::U64,
                "Boolean" => TypeName::Boolean,
                "String" => TypeName::String,
                other => {
                    return Err(self
                        .error(inner.span, &format!("Unknown builtin type '{other}'"))
                        .into())
                }
            },
            Rule::user_type_name => TypeName::User(self.name(inner)),
            other => return Err(ParserError::UnexpectedRule(other).into()),
        };
        Ok(self.add(Node::TypeName(ty), node.span))
    }

    // ------------------------------------------------------------ statements

    fn lower_statements(&mut self, nodes: &[RawNode]) -> Result<Vec<AstIdx>> {
        nodes
            .iter()
            .filter(|n| !n.is_rule(Rule::EOI))
            .map(|n| self.lower_statement(n))
            .collect()
    }

    fn lower_statement(&mut self, node: &RawNode) -> Result<AstIdx> {
        let span = node.span;
        let stmt = match self.rule_of(node)? {
            Rule::declaration => {
                let ty = self.lower_type(self.child(node, 0)?)?;
                let mut names = Vec::new();
                let mut array_len = None;
                for part in &node.children[1..] {
                    if part.is_rule(Rule::array_size) {
                        array_len = Some(self.lower_expr(self.child(part, 0)?)?);
                    } else {
                        names.push(self.name(part));
                    }
                }
                if array_len.is_some() && names.len() > 1 {
                    return Err(self
                        .error(span, "Array declarations declare a single name")
                        .into());
                }
                Node::Declaration {
                    ty,
                    names,
                    array_len,
                }
            }
            Rule::declaration_with_init => {
                let ty = self.lower_type(self.child(node, 0)?)?;
                let name = self.name(self.child(node, 1)?);
                let (array_len, init) = match node.children.len() {
                    4 => (
                        Some(self.lower_expr(self.child(self.child(node, 2)?, 0)?)?),
                        self.lower_expr(self.child(node, 3)?)?,
                    ),
                    _ => (None, self.lower_expr(self.child(node, 2)?)?),
                };
                Node::DeclarationInit {
                    ty,
                    name,
                    array_len,
                    init,
                }
            }
            Rule::assignment => {
                let target = self.lower_target(self.child(node, 0)?)?;
                let value = self.lower_expr(self.child(node, 1)?)?;
                Node::Assign { target, value }
            }
            Rule::multi_assignment => {
                let (value, targets) = node
                    .children
                    .split_last()
                    .ok_or_else(|| ParserError::UnexpectedRule(Rule::multi_assignment))?;
                let targets = targets
                    .iter()
                    .map(|t| self.lower_target(t))
                    .collect::<Result<Vec<_>>>()?;
                let value = self.lower_expr(value)?;
                Node::MultiAssign { targets, value }
            }
            Rule::post_increment | Rule::post_decrement => {
                let op = if node.is_rule(Rule::post_increment) {
                    StepOp::Increment
                } else {
                    StepOp::Decrement
                };
                let target = self.lower_target(self.child(node, 0)?)?;
                Node::Step { target, op }
            }
            Rule::call_statement => {
                let call = self.lower_expr(self.child(node, 0)?)?;
                match &self.pool[call] {
                    Node::Call { .. } | Node::Builtin { .. } | Node::CsrMethodCall { .. } => {}
                    other => {
                        let message =
                            format!("A {} has no effect as a statement", other.kind_name());
                        return Err(self.error(span, &message).into());
                    }
                }
                Node::CallStatement(call)
            }
            Rule::return_statement => match node.children.first() {
                Some(list) => Node::Return(self.lower_expr_list(list)?),
                None => Node::Return(Vec::new()),
            },
            Rule::conditional_return => {
                let values = self.lower_expr_list(self.child(node, 0)?)?;
                let cond = self.lower_expr(self.child(node, 1)?)?;
                Node::ConditionalReturn { values, cond }
            }
            Rule::conditional_statement => {
                let stmt = self.lower_statement(self.child(node, 0)?)?;
                let cond = self.lower_expr(self.child(node, 1)?)?;
                Node::Conditional { stmt, cond }
            }
            Rule::if_statement => self.lower_if(node)?,
            Rule::for_loop => {
                let init = self.lower_statement(self.child(node, 0)?)?;
                let cond = self.lower_expr(self.child(node, 1)?)?;
                let update = self.lower_statement(self.child(node, 2)?)?;
                let body = self.lower_block(self.child(node, 3)?)?;
                Node::For {
                    init,
                    cond,
                    update,
                    body,
                }
            }
            other => return Err(ParserError::UnexpectedRule(other).into()),
        };
        Ok(self.add(stmt, span))
    }

    fn lower_if(&mut self, node: &RawNode) -> Result<Node> {
        let cond = self.lower_expr(self.child(node, 0)?)?;
        let then_body = self.lower_block(self.child(node, 1)?)?;
        let mut else_ifs = Vec::new();
        let mut else_body = None;
        for clause in &node.children[2..] {
            match self.rule_of(clause)? {
                Rule::else_if_clause => {
                    let cond = self.lower_expr(self.child(clause, 0)?)?;
                    let body = self.lower_block(self.child(clause, 1)?)?;
                    else_ifs.push(ElseIf { cond, body });
                }
                Rule::else_clause => {
                    else_body = Some(self.lower_block(self.child(clause, 0)?)?);
                }
                other => return Err(ParserError::UnexpectedRule(other).into()),
            }
        }
        Ok(Node::If {
            cond,
            then_body,
            else_ifs,
            else_body,
        })
    }

    fn lower_block(&mut self, node: &RawNode) -> Result<Vec<AstIdx>> {
        self.expect_rule(node, Rule::block)?;
        self.lower_statements(&node.children)
    }

    fn lower_expr_list(&mut self, node: &RawNode) -> Result<Vec<AstIdx>> {
        self.expect_rule(node, Rule::expression_list)?;
        node.children.iter().map(|e| self.lower_expr(e)).collect()
    }

    fn lower_target(&mut self, node: &RawNode) -> Result<AstIdx> {
        let target = self.lower_expr(node)?;
        match &self.pool[target] {
            Node::Id(_)
            | Node::BitExtract { .. }
            | Node::RangeExtract { .. }
            | Node::FieldAccess { .. }
            | Node::CsrField { .. }
            | Node::XReg(_) => Ok(target),
            other => Err(ParserError::InvalidAssignmentTarget(other.kind_name()).into()),
        }
    }

    // ------------------------------------------------------------ expressions

    pub fn lower_expr(&mut self, node: &RawNode) -> Result<AstIdx> {
        let span = node.span;

        if let RawKind::Binary(op) = node.kind {
            let lhs = self.lower_expr(self.child(node, 0)?)?;
            let rhs = self.lower_expr(self.child(node, 1)?)?;
            return Ok(self.add(Node::Binary { op, lhs, rhs }, span));
        }

        let expr = match self.rule_of(node)? {
            Rule::expression => {
                let cond = self.lower_expr(self.child(node, 0)?)?;
                if node.children.len() == 1 {
                    return Ok(cond);
                }
                let if_true = self.lower_expr(self.child(node, 1)?)?;
                let if_false = self.lower_expr(self.child(node, 2)?)?;
                Node::Ternary {
                    cond,
                    if_true,
                    if_false,
                }
            }
            Rule::unary => {
                let (operand, ops) = node
                    .children
                    .split_last()
                    .ok_or_else(|| ParserError::UnexpectedRule(Rule::unary))?;
                let mut expr = self.lower_expr(operand)?;
                for op_node in ops.iter().rev() {
                    let op = UnaryOp::from_symbol(&op_node.text).ok_or_else(|| {
                        self.error(
                            op_node.span,
                            &format!("Unknown unary operator '{}'", op_node.text),
                        )
                    })?;
                    expr = self.add(Node::Unary { op, operand: expr }, op_node.span);
                }
                return Ok(expr);
            }
            Rule::postfix => return self.lower_postfix(node),
            Rule::paren_expr => Node::Paren(self.lower_expr(self.child(node, 0)?)?),
            Rule::replication => {
                let count = self.lower_expr(self.child(node, 0)?)?;
                let expr = self.lower_expr(self.child(node, 1)?)?;
                Node::Replicate { count, expr }
            }
            Rule::concatenation => Node::Concat(
                node.children
                    .iter()
                    .map(|e| self.lower_expr(e))
                    .collect::<Result<Vec<_>>>()?,
            ),
            Rule::builtin_call => {
                let name_node = self.child(node, 0)?;
                let func = BuiltinFunc::from_name(&name_node.text).ok_or_else(|| {
                    self.error(
                        name_node.span,
                        &format!("Unknown builtin '{}'", name_node.text),
                    )
                })?;
                let args = node.children[1..]
                    .iter()
                    .map(|e| self.lower_expr(e))
                    .collect::<Result<Vec<_>>>()?;
                if args.len() != func.arity() {
                    return Err(self
                        .error(
                            span,
                            &format!(
                                "{} takes {} argument(s), {} given",
                                func.name(),
                                func.arity(),
                                args.len()
                            ),
                        )
                        .into());
                }
                Node::Builtin { func, args }
            }
            Rule::implemented_call => Node::Implemented(self.lower_expr(self.child(node, 0)?)?),
            Rule::csr_ref => {
                let inner = self.child(node, 0)?;
                let selector = if inner.is_rule(Rule::csr_name) {
                    CsrSelector::Name(self.name(inner))
                } else {
                    CsrSelector::Address(self.lower_expr(inner)?)
                };
                Node::Csr(selector)
            }
            Rule::xreg_ref => Node::XReg(self.lower_expr(self.child(node, 0)?)?),
            Rule::int => return self.lower_int(node),
            Rule::bool_lit => Node::BoolLiteral(node.text == "true"),
            Rule::string_lit => {
                let body = node.children.first().map(|b| b.text.as_str()).unwrap_or("");
                Node::StringLiteral(self.pool.intern_string(body))
            }
            Rule::enum_ref => {
                let enum_name = self.name(self.child(node, 0)?);
                let member = self.name(self.child(node, 1)?);
                Node::EnumRef { enum_name, member }
            }
            Rule::function_call => {
                let name = self.name(self.child(node, 0)?);
                let mut template_args = Vec::new();
                let mut args = Vec::new();
                for part in &node.children[1..] {
                    match self.rule_of(part)? {
                        Rule::template_args => {
                            for arg in &part.children {
                                template_args.push(self.lower_expr(self.child(arg, 0)?)?);
                            }
                        }
                        Rule::call_args => args = self.lower_call_args(part)?,
                        other => return Err(ParserError::UnexpectedRule(other).into()),
                    }
                }
                Node::Call {
                    name,
                    template_args,
                    args,
                }
            }
            Rule::id => Node::Id(self.name(node)),
            other => return Err(ParserError::UnexpectedRule(other).into()),
        };
        Ok(self.add(expr, span))
    }

    fn lower_int(&mut self, node: &RawNode) -> Result<AstIdx> {
        let literal = self.literal(node)?;
        Ok(self.add(Node::IntLiteral(literal), node.span))
    }

    fn lower_call_args(&mut self, node: &RawNode) -> Result<Vec<AstIdx>> {
        node.children.iter().map(|e| self.lower_expr(e)).collect()
    }

    fn lower_postfix(&mut self, node: &RawNode) -> Result<AstIdx> {
        let (first, suffixes) = node
            .children
            .split_first()
            .ok_or_else(|| ParserError::UnexpectedRule(Rule::postfix))?;
        let mut expr = self.lower_expr(first)?;

        for suffix in suffixes {
            let span = suffix.span;
            let lowered = match self.rule_of(suffix)? {
                Rule::index_suffix => {
                    let first = self.lower_expr(self.child(suffix, 0)?)?;
                    match suffix.children.get(1) {
                        Some(lsb) => Node::RangeExtract {
                            expr,
                            msb: first,
                            lsb: self.lower_expr(lsb)?,
                        },
                        None => Node::BitExtract { expr, index: first },
                    }
                }
                Rule::field_suffix => {
                    let field_node = self.child(suffix, 0)?;
                    let field = self.name(field_node);
                    let is_csr = matches!(self.pool[expr], Node::Csr(_));
                    match suffix.children.get(1) {
                        Some(call_args) => {
                            let method = CsrMethod::from_name(&field_node.text)
                                .filter(|_| is_csr)
                                .ok_or_else(|| {
                                    self.error(
                                        field_node.span,
                                        &format!(
                                            "'{}' is not a method of this expression",
                                            field_node.text
                                        ),
                                    )
                                })?;
                            let args = self.lower_call_args(call_args)?;
                            if args.len() != method.arity() {
                                return Err(self
                                    .error(
                                        span,
                                        &format!(
                                            "{}() takes {} argument(s), {} given",
                                            method.name(),
                                            method.arity(),
                                            args.len()
                                        ),
                                    )
                                    .into());
                            }
                            Node::CsrMethodCall {
                                csr: expr,
                                method,
                                args,
                            }
                        }
                        None if is_csr => Node::CsrField { csr: expr, field },
                        None => Node::FieldAccess { expr, field },
                    }
                }
                other => return Err(ParserError::UnexpectedRule(other).into()),
            };
            expr = self.add(lowered, span);
        }

        Ok(expr)
    }
}
