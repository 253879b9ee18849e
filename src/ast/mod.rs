pub mod indices;
pub mod literal;
pub mod pool;

pub mod pretty_printer;

use bitflags::bitflags;

// Re-export main types for convenient usage
pub use self::indices::{AstIdx, NameIdx, PoolId};
pub use self::literal::{Literal, LiteralWidth};
pub use self::pool::{AstPool, Program};

/// Source position of a node (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub line: u32,
    pub column: u32,
}

bitflags! {
    /// What a node kind can be asked to do.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        /// Has a type and possibly a compile-time value.
        const RVALUE     = 0b0001;
        /// Mutates the scope when executed.
        const EXECUTABLE = 0b0010;
        /// May produce a function return value.
        const RETURNS    = 0b0100;
        /// Introduces a global definition.
        const DEFINITION = 0b1000;
        const TYPE_NAME  = 0b1_0000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Or,
    And,
    BitOr,
    BitXor,
    BitAnd,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Shl,
    WideShl,
    Shr,
    Sar,
    Add,
    WideAdd,
    Sub,
    WideSub,
    Mul,
    WideMul,
    Div,
    Rem,
}

impl BinaryOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "||" => BinaryOp::Or,
            "&&" => BinaryOp::And,
            "|" => BinaryOp::BitOr,
            "^" => BinaryOp::BitXor,
            "&" => BinaryOp::BitAnd,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Le,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Ge,
            "<<" => BinaryOp::Shl,
            "`<<" => BinaryOp::WideShl,
            ">>" => BinaryOp::Shr,
            ">>>" => BinaryOp::Sar,
            "+" => BinaryOp::Add,
            "`+" => BinaryOp::WideAdd,
            "-" => BinaryOp::Sub,
            "`-" => BinaryOp::WideSub,
            "*" => BinaryOp::Mul,
            "`*" => BinaryOp::WideMul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Rem,
            _ => return None,
        })
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::BitAnd => "&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Shl => "<<",
            BinaryOp::WideShl => "`<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Sar => ">>>",
            BinaryOp::Add => "+",
            BinaryOp::WideAdd => "`+",
            BinaryOp::Sub => "-",
            BinaryOp::WideSub => "`-",
            BinaryOp::Mul => "*",
            BinaryOp::WideMul => "`*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        }
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::Or | BinaryOp::And)
    }

    pub fn is_equality(self) -> bool {
        matches!(self, BinaryOp::Eq | BinaryOp::Ne)
    }

    pub fn is_relational(self) -> bool {
        matches!(self, BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge)
    }

    pub fn is_shift(self) -> bool {
        matches!(
            self,
            BinaryOp::Shl | BinaryOp::WideShl | BinaryOp::Shr | BinaryOp::Sar
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    BitNot,
    Not,
}

impl UnaryOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "-" => Some(UnaryOp::Neg),
            "~" => Some(UnaryOp::BitNot),
            "!" => Some(UnaryOp::Not),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::BitNot => "~",
            UnaryOp::Not => "!",
        }
    }
}

/// `$`-prefixed compiler intrinsics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinFunc {
    Bits,
    Signed,
    EnumSize,
    EnumElementSize,
    Enum,
    ArraySize,
    EnumToA,
}

impl BuiltinFunc {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "$bits" => BuiltinFunc::Bits,
            "$signed" => BuiltinFunc::Signed,
            "$enum_size" => BuiltinFunc::EnumSize,
            "$enum_element_size" => BuiltinFunc::EnumElementSize,
            "$enum" => BuiltinFunc::Enum,
            "$array_size" => BuiltinFunc::ArraySize,
            "$enum_to_a" => BuiltinFunc::EnumToA,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            BuiltinFunc::Bits => "$bits",
            BuiltinFunc::Signed => "$signed",
            BuiltinFunc::EnumSize => "$enum_size",
            BuiltinFunc::EnumElementSize => "$enum_element_size",
            BuiltinFunc::Enum => "$enum",
            BuiltinFunc::ArraySize => "$array_size",
            BuiltinFunc::EnumToA => "$enum_to_a",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            BuiltinFunc::Enum => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CsrMethod {
    Address,
    SwRead,
    SwWrite,
}

impl CsrMethod {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "address" => Some(CsrMethod::Address),
            "sw_read" => Some(CsrMethod::SwRead),
            "sw_write" => Some(CsrMethod::SwWrite),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CsrMethod::Address => "address",
            CsrMethod::SwRead => "sw_read",
            CsrMethod::SwWrite => "sw_write",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            CsrMethod::SwWrite => 1,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepOp {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeName {
    /// `Bits<width>`; the width is an expression node.
    Bits(AstIdx),
    XReg,
    U32,
    U64,
    Boolean,
    String,
    /// Enum or bitfield name.
    User(NameIdx),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CsrSelector {
    Name(NameIdx),
    Address(AstIdx),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElseIf {
    pub cond: AstIdx,
    pub body: Vec<AstIdx>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    pub name: NameIdx,
    pub value: Option<u128>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BitfieldField {
    pub name: NameIdx,
    pub msb: u32,
    pub lsb: u32,
}

/// `Type name` pair used by template parameters and arguments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypedName {
    pub ty: AstIdx,
    pub name: NameIdx,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    // ---- rvalues
    IntLiteral(Literal),
    BoolLiteral(bool),
    StringLiteral(NameIdx),
    Id(NameIdx),
    Paren(AstIdx),
    Unary {
        op: UnaryOp,
        operand: AstIdx,
    },
    Binary {
        op: BinaryOp,
        lhs: AstIdx,
        rhs: AstIdx,
    },
    Ternary {
        cond: AstIdx,
        if_true: AstIdx,
        if_false: AstIdx,
    },
    Concat(Vec<AstIdx>),
    Replicate {
        count: AstIdx,
        expr: AstIdx,
    },
    BitExtract {
        expr: AstIdx,
        index: AstIdx,
    },
    RangeExtract {
        expr: AstIdx,
        msb: AstIdx,
        lsb: AstIdx,
    },
    FieldAccess {
        expr: AstIdx,
        field: NameIdx,
    },
    EnumRef {
        enum_name: NameIdx,
        member: NameIdx,
    },
    Call {
        name: NameIdx,
        template_args: Vec<AstIdx>,
        args: Vec<AstIdx>,
    },
    Builtin {
        func: BuiltinFunc,
        args: Vec<AstIdx>,
    },
    Implemented(AstIdx),
    XReg(AstIdx),
    Csr(CsrSelector),
    CsrField {
        csr: AstIdx,
        field: NameIdx,
    },
    CsrMethodCall {
        csr: AstIdx,
        method: CsrMethod,
        args: Vec<AstIdx>,
    },

    // ---- types
    TypeName(TypeName),

    // ---- statements
    Declaration {
        ty: AstIdx,
        names: Vec<NameIdx>,
        array_len: Option<AstIdx>,
    },
    DeclarationInit {
        ty: AstIdx,
        name: NameIdx,
        array_len: Option<AstIdx>,
        init: AstIdx,
    },
    Assign {
        target: AstIdx,
        value: AstIdx,
    },
    MultiAssign {
        targets: Vec<AstIdx>,
        value: AstIdx,
    },
    Step {
        target: AstIdx,
        op: StepOp,
    },
    CallStatement(AstIdx),
    Return(Vec<AstIdx>),
    ConditionalReturn {
        values: Vec<AstIdx>,
        cond: AstIdx,
    },
    Conditional {
        stmt: AstIdx,
        cond: AstIdx,
    },
    If {
        cond: AstIdx,
        then_body: Vec<AstIdx>,
        else_ifs: Vec<ElseIf>,
        else_body: Option<Vec<AstIdx>>,
    },
    For {
        init: AstIdx,
        cond: AstIdx,
        update: AstIdx,
        body: Vec<AstIdx>,
    },

    // ---- definitions
    EnumDef {
        name: NameIdx,
        members: Vec<EnumMember>,
    },
    BitfieldDef {
        name: NameIdx,
        width: u32,
        fields: Vec<BitfieldField>,
    },
    FunctionDef {
        name: NameIdx,
        template: Vec<TypedName>,
        returns: Vec<AstIdx>,
        args: Vec<TypedName>,
        description: Option<NameIdx>,
        /// `None` for `builtin function` declarations.
        body: Option<Vec<AstIdx>>,
    },
    GlobalConstant(AstIdx),
    Isa(Vec<AstIdx>),
    Fragment(Vec<AstIdx>),
}

impl Node {
    pub fn capabilities(&self) -> Capabilities {
        match self {
            Node::IntLiteral(_)
            | Node::BoolLiteral(_)
            | Node::StringLiteral(_)
            | Node::Id(_)
            | Node::Paren(_)
            | Node::Unary { .. }
            | Node::Binary { .. }
            | Node::Ternary { .. }
            | Node::Concat(_)
            | Node::Replicate { .. }
            | Node::BitExtract { .. }
            | Node::RangeExtract { .. }
            | Node::FieldAccess { .. }
            | Node::EnumRef { .. }
            | Node::Call { .. }
            | Node::Builtin { .. }
            | Node::Implemented(_)
            | Node::XReg(_)
            | Node::Csr(_)
            | Node::CsrField { .. }
            | Node::CsrMethodCall { .. } => Capabilities::RVALUE,

            Node::TypeName(_) => Capabilities::TYPE_NAME,

            Node::Return(_) | Node::ConditionalReturn { .. } => Capabilities::RETURNS,

            Node::Declaration { .. }
            | Node::DeclarationInit { .. }
            | Node::Assign { .. }
            | Node::MultiAssign { .. }
            | Node::Step { .. }
            | Node::CallStatement(_)
            | Node::Conditional { .. }
            | Node::If { .. }
            | Node::For { .. } => Capabilities::EXECUTABLE | Capabilities::RETURNS,

            Node::EnumDef { .. }
            | Node::BitfieldDef { .. }
            | Node::FunctionDef { .. }
            | Node::GlobalConstant(_) => Capabilities::DEFINITION,

            Node::Isa(_) | Node::Fragment(_) => Capabilities::empty(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::IntLiteral(_) => "integer literal",
            Node::BoolLiteral(_) => "boolean literal",
            Node::StringLiteral(_) => "string literal",
            Node::Id(_) => "identifier",
            Node::Paren(_) => "parenthesized expression",
            Node::Unary { .. } => "unary expression",
            Node::Binary { .. } => "binary expression",
            Node::Ternary { .. } => "ternary expression",
            Node::Concat(_) => "concatenation",
            Node::Replicate { .. } => "replication",
            Node::BitExtract { .. } => "bit extraction",
            Node::RangeExtract { .. } => "range extraction",
            Node::FieldAccess { .. } => "field access",
            Node::EnumRef { .. } => "enum reference",
            Node::Call { .. } => "function call",
            Node::Builtin { .. } => "builtin call",
            Node::Implemented(_) => "implemented? check",
            Node::XReg(_) => "register file access",
            Node::Csr(_) => "CSR reference",
            Node::CsrField { .. } => "CSR field",
            Node::CsrMethodCall { .. } => "CSR method call",
            Node::TypeName(_) => "type name",
            Node::Declaration { .. } => "declaration",
            Node::DeclarationInit { .. } => "initialized declaration",
            Node::Assign { .. } => "assignment",
            Node::MultiAssign { .. } => "multi-assignment",
            Node::Step { .. } => "increment/decrement",
            Node::CallStatement(_) => "call statement",
            Node::Return(_) => "return",
            Node::ConditionalReturn { .. } => "conditional return",
            Node::Conditional { .. } => "conditional statement",
            Node::If { .. } => "if statement",
            Node::For { .. } => "for loop",
            Node::EnumDef { .. } => "enum definition",
            Node::BitfieldDef { .. } => "bitfield definition",
            Node::FunctionDef { .. } => "function definition",
            Node::GlobalConstant(_) => "global constant",
            Node::Isa(_) => "isa",
            Node::Fragment(_) => "fragment",
        }
    }
}
