//! Value-independent description of a program value's shape.

pub mod defs;

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;

use crate::arch::CsrInfo;
use crate::value::Value;

pub use self::defs::{BitRange, BitfieldDef, EnumDef, FunctionDef, ShapeError};

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Qualifiers: u8 {
        const CONST        = 0b0001;
        const SIGNED       = 0b0010;
        const GLOBAL       = 0b0100;
        const TEMPLATE_VAR = 0b1000;
    }
}

/// Width of a bit vector. `Unknown` only appears while a width depends on an
/// open configuration parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    Known(u32),
    Unknown,
}

impl Width {
    pub fn known(self) -> Option<u32> {
        match self {
            Width::Known(w) => Some(w),
            Width::Unknown => None,
        }
    }

    /// Combines two widths with `f`, staying unknown if either side is.
    pub fn zip_with(self, other: Width, f: impl FnOnce(u32, u32) -> u32) -> Width {
        match (self, other) {
            (Width::Known(a), Width::Known(b)) => Width::Known(f(a, b)),
            _ => Width::Unknown,
        }
    }

    /// Like [`Width::zip_with`], but `None` when `f` overflows.
    pub fn try_zip_with(
        self,
        other: Width,
        f: impl FnOnce(u32, u32) -> Option<u32>,
    ) -> Option<Width> {
        match (self, other) {
            (Width::Known(a), Width::Known(b)) => f(a, b).map(Width::Known),
            _ => Some(Width::Unknown),
        }
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Width::Known(w) => write!(f, "{w}"),
            Width::Unknown => write!(f, "?"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum TypeKind {
    Bits(Width),
    Boolean,
    Void,
    /// Placeholder that converts to and from anything.
    DontCare,
    String,
    /// The enum type itself, as named in `$enum_size(E)`.
    Enum(Arc<EnumDef>),
    /// A value of an enum.
    EnumRef(Arc<EnumDef>),
    Bitfield(Arc<BitfieldDef>),
    Csr { info: Arc<CsrInfo>, width: Width },
    Array { len: usize, elem: Box<Type> },
    /// Multiple return values; transient.
    Tuple(Vec<Type>),
}

#[derive(Debug, Clone)]
pub struct Type {
    pub kind: TypeKind,
    pub qualifiers: Qualifiers,
}

impl Type {
    pub fn new(kind: TypeKind) -> Self {
        Self {
            kind,
            qualifiers: Qualifiers::empty(),
        }
    }

    pub fn bits(width: u32) -> Self {
        Self::new(TypeKind::Bits(Width::Known(width)))
    }

    pub fn bits_of(width: Width) -> Self {
        Self::new(TypeKind::Bits(width))
    }

    pub fn boolean() -> Self {
        Self::new(TypeKind::Boolean)
    }

    pub fn void() -> Self {
        Self::new(TypeKind::Void)
    }

    pub fn string() -> Self {
        Self::new(TypeKind::String)
    }

    pub fn dont_care() -> Self {
        Self::new(TypeKind::DontCare)
    }

    pub fn enum_ref(def: Arc<EnumDef>) -> Self {
        Self::new(TypeKind::EnumRef(def))
    }

    pub fn array(elem: Type, len: usize) -> Self {
        Self::new(TypeKind::Array {
            len,
            elem: Box::new(elem),
        })
    }

    pub fn tuple(elems: Vec<Type>) -> Self {
        Self::new(TypeKind::Tuple(elems))
    }

    /// Bit width of integral and bit-vector-like types.
    pub fn width(&self) -> Option<Width> {
        match &self.kind {
            TypeKind::Bits(w) => Some(*w),
            TypeKind::Boolean => Some(Width::Known(1)),
            TypeKind::EnumRef(def) => Some(Width::Known(def.width())),
            TypeKind::Bitfield(def) => Some(Width::Known(def.width)),
            TypeKind::Csr { width, .. } => Some(*width),
            _ => None,
        }
    }

    pub fn known_width(&self) -> Option<u32> {
        self.width().and_then(Width::known)
    }

    pub fn is_signed(&self) -> bool {
        self.qualifiers.contains(Qualifiers::SIGNED)
    }

    pub fn is_const(&self) -> bool {
        self.qualifiers.contains(Qualifiers::CONST)
    }

    pub fn is_global(&self) -> bool {
        self.qualifiers.contains(Qualifiers::GLOBAL)
    }

    pub fn is_template_var(&self) -> bool {
        self.qualifiers.contains(Qualifiers::TEMPLATE_VAR)
    }

    pub fn is_integral(&self) -> bool {
        matches!(self.kind, TypeKind::Bits(_) | TypeKind::EnumRef(_))
    }

    /// Accepted by arithmetic and bitwise operators.
    pub fn is_bits_like(&self) -> bool {
        matches!(self.kind, TypeKind::Bits(_) | TypeKind::Bitfield(_))
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self.kind, TypeKind::Boolean)
    }

    pub fn is_dont_care(&self) -> bool {
        matches!(self.kind, TypeKind::DontCare)
    }

    pub fn qualify(&self, qualifiers: Qualifiers) -> Type {
        let mut ty = self.clone();
        ty.qualifiers |= qualifiers;
        ty
    }

    pub fn make_const(&self) -> Type {
        self.qualify(Qualifiers::CONST)
    }

    pub fn make_signed(&self) -> Type {
        self.qualify(Qualifiers::SIGNED)
    }

    /// Same type with every qualifier removed.
    pub fn unqualified(&self) -> Type {
        Type::new(self.kind.clone())
    }

    /// Structural identity; qualifiers other than `signed` are ignored.
    pub fn equal_to(&self, other: &Type) -> bool {
        if self.is_signed() != other.is_signed() {
            return false;
        }
        kinds_equal(&self.kind, &other.kind)
    }

    /// May a value of `self` be assigned to a location of type `target`?
    pub fn convertable_to(&self, target: &Type) -> bool {
        use TypeKind::*;
        match (&self.kind, &target.kind) {
            (DontCare, _) | (_, DontCare) => true,
            (Bits(_), Bits(_)) => true,
            (Bits(_), Bitfield(_)) | (Bitfield(_), Bits(_)) => true,
            (Bitfield(a), Bitfield(b)) => a.name == b.name,
            (Boolean, Boolean) => true,
            (String, String) => true,
            (EnumRef(a), EnumRef(b)) => a.name == b.name,
            (Csr { .. }, Bits(_)) => true,
            (Csr { info: a, .. }, Csr { info: b, .. }) => a.name == b.name,
            (Array { len: la, elem: ea }, Array { len: lb, elem: eb }) => {
                la == lb && ea.convertable_to(eb) && eb.convertable_to(ea)
            }
            _ => false,
        }
    }

    /// Relaxed compatibility used by relational operators.
    pub fn comparable_to(&self, other: &Type) -> bool {
        if self.convertable_to(other) || other.convertable_to(self) {
            return true;
        }
        self.is_integral() && other.is_integral()
    }

    /// Zero value used for declarations without an initializer.
    pub fn default_value(&self) -> Option<Value> {
        match &self.kind {
            TypeKind::Bits(_) | TypeKind::Bitfield(_) => Some(Value::Int(0)),
            TypeKind::Boolean => Some(Value::Bool(false)),
            TypeKind::String => Some(Value::String(String::new())),
            TypeKind::EnumRef(def) => def.members.first().map(|(_, v)| Value::Int(i128::from(*v))),
            TypeKind::Array { len, elem } => {
                let item = elem.default_value()?;
                Some(Value::Array(vec![item; *len]))
            }
            _ => None,
        }
    }
}

fn kinds_equal(a: &TypeKind, b: &TypeKind) -> bool {
    use TypeKind::*;
    match (a, b) {
        (Bits(wa), Bits(wb)) => wa == wb,
        (Boolean, Boolean) | (Void, Void) | (DontCare, DontCare) | (String, String) => true,
        (Enum(x), Enum(y)) | (EnumRef(x), EnumRef(y)) => x.name == y.name,
        (Bitfield(x), Bitfield(y)) => x.name == y.name,
        (Csr { info: x, .. }, Csr { info: y, .. }) => x.name == y.name,
        (Array { len: la, elem: ea }, Array { len: lb, elem: eb }) => {
            la == lb && ea.equal_to(eb)
        }
        (Tuple(xs), Tuple(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| x.equal_to(y))
        }
        _ => false,
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_const() {
            write!(f, "const ")?;
        }
        if self.is_signed() {
            write!(f, "signed ")?;
        }
        match &self.kind {
            TypeKind::Bits(w) => write!(f, "Bits<{w}>"),
            TypeKind::Boolean => write!(f, "Boolean"),
            TypeKind::Void => write!(f, "void"),
            TypeKind::DontCare => write!(f, "dont_care"),
            TypeKind::String => write!(f, "String"),
            TypeKind::Enum(def) => write!(f, "enum {}", def.name),
            TypeKind::EnumRef(def) => write!(f, "{}", def.name),
            TypeKind::Bitfield(def) => write!(f, "{}", def.name),
            TypeKind::Csr { info, .. } => write!(f, "CSR[{}]", info.name),
            TypeKind::Array { len, elem } => write!(f, "{elem}[{len}]"),
            TypeKind::Tuple(elems) => {
                write!(f, "(")?;
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{elem}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode_enum() -> Arc<EnumDef> {
        Arc::new(EnumDef::new("Mode", vec![("M".into(), 3), ("U".into(), 0)]).unwrap())
    }

    #[test]
    fn bits_convert_regardless_of_width() {
        assert!(Type::bits(8).convertable_to(&Type::bits(32)));
        assert!(Type::bits(32).convertable_to(&Type::bits(1)));
        assert!(!Type::bits(1).convertable_to(&Type::boolean()));
        assert!(!Type::boolean().convertable_to(&Type::bits(1)));
    }

    #[test]
    fn enum_ref_needs_explicit_cast_to_bits() {
        let mode = Type::enum_ref(mode_enum());
        assert!(!mode.convertable_to(&Type::bits(2)));
        assert!(mode.convertable_to(&Type::enum_ref(mode_enum())));
        assert!(mode.comparable_to(&Type::bits(2)));
    }

    #[test]
    fn arrays_need_matching_length() {
        let a = Type::array(Type::bits(8), 4);
        assert!(a.convertable_to(&Type::array(Type::bits(16), 4)));
        assert!(!a.convertable_to(&Type::array(Type::bits(8), 5)));
    }

    #[test]
    fn tuples_never_convert() {
        let t = Type::tuple(vec![Type::bits(1), Type::bits(2)]);
        assert!(!t.convertable_to(&Type::tuple(vec![Type::bits(1), Type::bits(2)])));
        assert!(t.equal_to(&Type::tuple(vec![Type::bits(1), Type::bits(2)])));
    }

    #[test]
    fn qualifiers_are_additive() {
        let ty = Type::bits(8).make_signed().make_const();
        assert!(ty.is_signed() && ty.is_const());
        assert_eq!(ty.to_string(), "const signed Bits<8>");
        assert!(!ty.unqualified().is_const());
    }

    #[test]
    fn enum_width_and_default() {
        let mode = Type::enum_ref(mode_enum());
        assert_eq!(mode.known_width(), Some(2));
        assert_eq!(mode.default_value(), Some(Value::Int(3)));
        assert_eq!(
            Type::array(Type::bits(2), 2).default_value(),
            Some(Value::Array(vec![Value::Int(0), Value::Int(0)]))
        );
    }
}
