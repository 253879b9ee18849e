use std::collections::HashMap;
use std::ops::Index;
use std::sync::Arc;

use super::indices::{AstIdx, NameIdx, PoolId};
use super::{ElseIf, Node, Span};

/// Arena holding every node of one parsed source unit.
///
/// Nodes are appended children-first and never mutated afterwards; the pool
/// is shared read-only (usually behind an [`Arc`]) once lowering finishes.
#[derive(Debug)]
pub struct AstPool {
    id: PoolId,
    file: Arc<str>,
    nodes: Vec<Node>,
    spans: Vec<Span>,

    string_pool: Vec<String>,
    string_map: HashMap<String, NameIdx>,
}

impl AstPool {
    pub fn new(file: impl Into<Arc<str>>) -> Self {
        Self {
            id: PoolId::fresh(),
            file: file.into(),
            nodes: Vec::new(),
            spans: Vec::new(),
            string_pool: Vec::new(),
            string_map: HashMap::new(),
        }
    }

    pub fn id(&self) -> PoolId {
        self.id
    }

    pub fn file(&self) -> &Arc<str> {
        &self.file
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn intern_string(&mut self, s: &str) -> NameIdx {
        if let Some(&idx) = self.string_map.get(s) {
            return idx;
        }

        let idx = NameIdx(self.string_pool.len());
        self.string_pool.push(s.to_string());
        self.string_map.insert(s.to_string(), idx);
        idx
    }

    pub fn get_string(&self, idx: NameIdx) -> &str {
        &self.string_pool[idx.0]
    }

    pub fn add(&mut self, node: Node, span: Span) -> AstIdx {
        let node_idx = AstIdx(self.nodes.len());
        self.nodes.push(node);
        self.spans.push(span);
        node_idx
    }

    pub fn get(&self, idx: AstIdx) -> Option<&Node> {
        self.nodes.get(idx.0)
    }

    pub fn span(&self, idx: AstIdx) -> Span {
        self.spans.get(idx.0).copied().unwrap_or_default()
    }

    /// Direct children in source order.
    pub fn children(&self, idx: AstIdx) -> Vec<AstIdx> {
        match &self[idx] {
            Node::IntLiteral(_)
            | Node::BoolLiteral(_)
            | Node::StringLiteral(_)
            | Node::Id(_)
            | Node::EnumRef { .. }
            | Node::EnumDef { .. }
            | Node::BitfieldDef { .. } => Vec::new(),

            Node::Csr(selector) => match selector {
                super::CsrSelector::Name(_) => Vec::new(),
                super::CsrSelector::Address(addr) => vec![*addr],
            },

            Node::TypeName(name) => match name {
                super::TypeName::Bits(width) => vec![*width],
                _ => Vec::new(),
            },

            Node::Paren(inner)
            | Node::Implemented(inner)
            | Node::XReg(inner)
            | Node::CallStatement(inner)
            | Node::GlobalConstant(inner) => vec![*inner],

            Node::Unary { operand, .. } => vec![*operand],
            Node::Binary { lhs, rhs, .. } => vec![*lhs, *rhs],
            Node::Ternary {
                cond,
                if_true,
                if_false,
            } => vec![*cond, *if_true, *if_false],
            Node::Concat(items)
            | Node::Return(items)
            | Node::Isa(items)
            | Node::Fragment(items) => items.clone(),
            Node::Replicate { count, expr } => vec![*count, *expr],
            Node::BitExtract { expr, index } => vec![*expr, *index],
            Node::RangeExtract { expr, msb, lsb } => vec![*expr, *msb, *lsb],
            Node::FieldAccess { expr, .. } => vec![*expr],
            Node::Call {
                template_args,
                args,
                ..
            } => template_args.iter().chain(args.iter()).copied().collect(),
            Node::Builtin { args, .. } => args.clone(),
            Node::CsrField { csr, .. } => vec![*csr],
            Node::CsrMethodCall { csr, args, .. } => {
                std::iter::once(*csr).chain(args.iter().copied()).collect()
            }

            Node::Declaration { ty, array_len, .. } => {
                std::iter::once(*ty).chain(*array_len).collect()
            }
            Node::DeclarationInit {
                ty,
                array_len,
                init,
                ..
            } => std::iter::once(*ty)
                .chain(*array_len)
                .chain(std::iter::once(*init))
                .collect(),
            Node::Assign { target, value } => vec![*target, *value],
            Node::MultiAssign { targets, value } => {
                targets.iter().copied().chain(std::iter::once(*value)).collect()
            }
            Node::Step { target, .. } => vec![*target],
            Node::ConditionalReturn { values, cond } => {
                values.iter().copied().chain(std::iter::once(*cond)).collect()
            }
            Node::Conditional { stmt, cond } => vec![*stmt, *cond],
            Node::If {
                cond,
                then_body,
                else_ifs,
                else_body,
            } => {
                let mut children = vec![*cond];
                children.extend(then_body);
                for ElseIf { cond, body } in else_ifs {
                    children.push(*cond);
                    children.extend(body);
                }
                if let Some(body) = else_body {
                    children.extend(body);
                }
                children
            }
            Node::For {
                init,
                cond,
                update,
                body,
            } => {
                let mut children = vec![*init, *cond, *update];
                children.extend(body);
                children
            }
            Node::FunctionDef {
                template,
                returns,
                args,
                body,
                ..
            } => {
                let mut children: Vec<AstIdx> = template.iter().map(|t| t.ty).collect();
                children.extend(returns);
                children.extend(args.iter().map(|a| a.ty));
                if let Some(body) = body {
                    children.extend(body);
                }
                children
            }
        }
    }

    /// Debug listing of every node, one `idx: [line:col] kind Node` per line.
    pub fn display(&self) -> String {
        let mut out = String::new();
        for (i, node) in self.nodes.iter().enumerate() {
            let span = self.spans[i];
            out.push_str(&format!(
                "{i}: [{}:{}] {} {:?}\n",
                span.line,
                span.column,
                node.kind_name(),
                node
            ));
        }
        out
    }
}

impl Index<AstIdx> for AstPool {
    type Output = Node;

    fn index(&self, index: AstIdx) -> &Self::Output {
        &self.nodes[index.0]
    }
}

impl Index<NameIdx> for AstPool {
    type Output = str;

    fn index(&self, index: NameIdx) -> &Self::Output {
        &self.string_pool[index.0]
    }
}

/// A lowered source unit: the frozen pool plus its root node.
#[derive(Debug, Clone)]
pub struct Program {
    pub pool: Arc<AstPool>,
    pub root: AstIdx,
}

impl Program {
    pub fn new(pool: AstPool, root: AstIdx) -> Self {
        Self {
            pool: Arc::new(pool),
            root,
        }
    }

    pub fn node(&self, idx: AstIdx) -> &Node {
        &self.pool[idx]
    }

    pub fn root_node(&self) -> &Node {
        &self.pool[self.root]
    }

    /// Top-level items of an `isa` or `fragment` root.
    pub fn items(&self) -> &[AstIdx] {
        match self.root_node() {
            Node::Isa(items) | Node::Fragment(items) => items,
            _ => std::slice::from_ref(&self.root),
        }
    }
}
