use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::ast::literal::bit_length;
use crate::ast::{AstIdx, AstPool, TypedName};

/// Structural problems in a user definition. The analyzer attaches the
/// source location and reports them as type errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    #[error("bit range {msb}-{lsb} is inverted")]
    InvertedRange { msb: u32, lsb: u32 },

    #[error("bitfield width must be positive")]
    ZeroWidth,

    #[error("field '{field}' ({msb}-{lsb}) does not fit in {width} bits")]
    FieldOutOfRange {
        field: String,
        msb: u32,
        lsb: u32,
        width: u32,
    },

    #[error("fields '{0}' and '{1}' overlap")]
    Overlap(String, String),

    #[error("duplicate member '{0}'")]
    DuplicateMember(String),

    #[error("enum '{0}' has no members")]
    EmptyEnum(String),
}

/// Inclusive `msb..=lsb` range inside a bit vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitRange {
    pub msb: u32,
    pub lsb: u32,
}

impl BitRange {
    pub fn try_new(msb: u32, lsb: u32) -> Result<Self, ShapeError> {
        if msb < lsb {
            return Err(ShapeError::InvertedRange { msb, lsb });
        }
        Ok(Self { msb, lsb })
    }

    pub fn single(bit: u32) -> Self {
        Self { msb: bit, lsb: bit }
    }

    pub fn width(&self) -> u32 {
        self.msb - self.lsb + 1
    }

    fn overlaps(&self, other: &BitRange) -> bool {
        self.lsb <= other.msb && other.lsb <= self.msb
    }
}

impl fmt::Display for BitRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.msb == self.lsb {
            write!(f, "{}", self.msb)
        } else {
            write!(f, "{}-{}", self.msb, self.lsb)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDef {
    pub name: String,
    pub members: Vec<(String, u64)>,
}

impl EnumDef {
    pub fn new(name: impl Into<String>, members: Vec<(String, u64)>) -> Result<Self, ShapeError> {
        let name = name.into();
        if members.is_empty() {
            return Err(ShapeError::EmptyEnum(name));
        }
        for (i, (member, _)) in members.iter().enumerate() {
            if members[..i].iter().any(|(other, _)| other == member) {
                return Err(ShapeError::DuplicateMember(member.clone()));
            }
        }
        Ok(Self { name, members })
    }

    /// Bits needed for the largest member value.
    pub fn width(&self) -> u32 {
        self.members
            .iter()
            .map(|(_, v)| bit_length(u128::from(*v)))
            .max()
            .unwrap_or(1)
    }

    pub fn value_of(&self, member: &str) -> Option<u64> {
        self.members
            .iter()
            .find(|(name, _)| name == member)
            .map(|(_, v)| *v)
    }

    pub fn member_of(&self, value: u64) -> Option<&str> {
        self.members
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(name, _)| name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitfieldDef {
    pub name: String,
    pub width: u32,
    pub fields: Vec<(String, BitRange)>,
}

impl BitfieldDef {
    pub fn new(
        name: impl Into<String>,
        width: u32,
        fields: Vec<(String, BitRange)>,
    ) -> Result<Self, ShapeError> {
        if width == 0 {
            return Err(ShapeError::ZeroWidth);
        }
        for (i, (field, range)) in fields.iter().enumerate() {
            if range.msb >= width {
                return Err(ShapeError::FieldOutOfRange {
                    field: field.clone(),
                    msb: range.msb,
                    lsb: range.lsb,
                    width,
                });
            }
            for (other, other_range) in &fields[..i] {
                if other == field {
                    return Err(ShapeError::DuplicateMember(field.clone()));
                }
                if range.overlaps(other_range) {
                    return Err(ShapeError::Overlap(other.clone(), field.clone()));
                }
            }
        }
        Ok(Self {
            name: name.into(),
            width,
            fields,
        })
    }

    pub fn field(&self, name: &str) -> Option<BitRange> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, range)| *range)
    }
}

/// A declared function. Return and argument types stay as syntax because
/// they may mention template parameters; they are resolved per
/// instantiation.
#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub pool: Arc<AstPool>,
    pub node: AstIdx,
    pub template: Vec<TypedName>,
    pub returns: Vec<AstIdx>,
    pub arguments: Vec<TypedName>,
    pub description: Option<String>,
    /// `None` for builtin functions supplied by the embedder.
    pub body: Option<Vec<AstIdx>>,
}

impl FunctionDef {
    pub fn is_builtin(&self) -> bool {
        self.body.is_none()
    }

    pub fn is_template(&self) -> bool {
        !self.template.is_empty()
    }

    pub fn arg_name(&self, index: usize) -> &str {
        &self.pool[self.arguments[index].name]
    }

    pub fn template_name(&self, index: usize) -> &str {
        &self.pool[self.template[index].name]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members(values: &[(&str, u64)]) -> Vec<(String, u64)> {
        values.iter().map(|(n, v)| (n.to_string(), *v)).collect()
    }

    #[test]
    fn enum_width_follows_largest_member() {
        let e = EnumDef::new("Mode", members(&[("M", 3), ("S", 1), ("U", 0)])).unwrap();
        assert_eq!(e.width(), 2);
        assert_eq!(e.value_of("S"), Some(1));
        assert_eq!(e.member_of(3), Some("M"));
        assert_eq!(e.value_of("H"), None);
    }

    #[test]
    fn enum_rejects_duplicates_and_empty() {
        assert!(matches!(
            EnumDef::new("E", members(&[("A", 0), ("A", 1)])),
            Err(ShapeError::DuplicateMember(_))
        ));
        assert!(matches!(
            EnumDef::new("E", Vec::new()),
            Err(ShapeError::EmptyEnum(_))
        ));
    }

    #[test]
    fn inverted_range_is_rejected() {
        assert!(BitRange::try_new(3, 4).is_err());
        assert_eq!(BitRange::try_new(7, 4).unwrap().width(), 4);
    }

    #[test]
    fn bitfield_validation() {
        let ok = BitfieldDef::new(
            "Satp",
            8,
            vec![
                ("MODE".into(), BitRange::try_new(7, 4).unwrap()),
                ("ASID".into(), BitRange::try_new(3, 0).unwrap()),
            ],
        )
        .unwrap();
        assert_eq!(ok.field("MODE"), Some(BitRange { msb: 7, lsb: 4 }));

        let overlap = BitfieldDef::new(
            "Bad",
            8,
            vec![
                ("A".into(), BitRange::try_new(7, 4).unwrap()),
                ("B".into(), BitRange::try_new(4, 0).unwrap()),
            ],
        );
        assert!(matches!(overlap, Err(ShapeError::Overlap(_, _))));

        let too_wide = BitfieldDef::new("Bad", 4, vec![("A".into(), BitRange::single(4))]);
        assert!(matches!(too_wide, Err(ShapeError::FieldOutOfRange { .. })));
    }
}
