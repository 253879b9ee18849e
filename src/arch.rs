//! Read-only architecture facts supplied by the embedder.
//!
//! The core never resolves a configuration itself; it asks an
//! [`Architecture`] which parameters, extensions and CSRs exist and whether
//! they are implemented. [`ArchConfig`] is a plain in-memory implementation.

use std::fmt::Debug;
use std::sync::Arc;

use crate::types::defs::BitRange;
use crate::types::Type;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldAccess {
    /// `RO`
    ReadOnly,
    /// `RW`
    ReadWrite,
    /// `RO-H`: read-only to software, updated by hardware.
    ReadOnlyHw,
    /// `RW-H`
    ReadWriteHw,
    /// `RW-R`: writable, with restricted legal values.
    ReadWriteR,
}

impl FieldAccess {
    pub fn is_writable(self) -> bool {
        !matches!(self, FieldAccess::ReadOnly | FieldAccess::ReadOnlyHw)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "RO" => FieldAccess::ReadOnly,
            "RW" => FieldAccess::ReadWrite,
            "RO-H" => FieldAccess::ReadOnlyHw,
            "RW-H" => FieldAccess::ReadWriteHw,
            "RW-R" => FieldAccess::ReadWriteR,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            FieldAccess::ReadOnly => "RO",
            FieldAccess::ReadWrite => "RW",
            FieldAccess::ReadOnlyHw => "RO-H",
            FieldAccess::ReadWriteHw => "RW-H",
            FieldAccess::ReadWriteR => "RW-R",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLocation {
    Fixed(BitRange),
    /// Different placement in RV32 and RV64.
    PerBase { rv32: BitRange, rv64: BitRange },
}

impl FieldLocation {
    /// Location for the given XLEN. With XLEN unknown the 64-bit layout is
    /// used.
    pub fn resolve(&self, xlen: Option<u32>) -> BitRange {
        match self {
            FieldLocation::Fixed(range) => *range,
            FieldLocation::PerBase { rv32, rv64 } => match xlen {
                Some(32) => *rv32,
                _ => *rv64,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrField {
    pub name: String,
    pub location: FieldLocation,
    pub access: FieldAccess,
    pub implemented: bool,
}

impl CsrField {
    pub fn new(name: impl Into<String>, location: FieldLocation, access: FieldAccess) -> Self {
        Self {
            name: name.into(),
            location,
            access,
            implemented: true,
        }
    }

    pub fn unimplemented(mut self) -> Self {
        self.implemented = false;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrLength {
    Fixed(u32),
    Xlen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrInfo {
    pub name: String,
    pub address: u16,
    pub length: CsrLength,
    pub fields: Vec<CsrField>,
    pub implemented: bool,
}

impl CsrInfo {
    pub fn new(name: impl Into<String>, address: u16, length: CsrLength) -> Self {
        Self {
            name: name.into(),
            address,
            length,
            fields: Vec::new(),
            implemented: true,
        }
    }

    pub fn field(mut self, field: CsrField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn unimplemented(mut self) -> Self {
        self.implemented = false;
        self
    }

    pub fn width(&self, xlen: Option<u32>) -> Option<u32> {
        match self.length {
            CsrLength::Fixed(w) => Some(w),
            CsrLength::Xlen => xlen,
        }
    }

    pub fn get_field(&self, name: &str) -> Option<&CsrField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionInfo {
    pub name: String,
    /// `None` when the configuration leaves the extension open.
    pub implemented: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ParamInfo {
    pub name: String,
    pub ty: Type,
    /// `None` when only the parameter's type is known.
    pub value: Option<Value>,
}

/// The narrow query surface the analyzer consumes.
pub trait Architecture: Send + Sync + Debug {
    /// XLEN, when the configuration fixes it.
    fn xlen(&self) -> Option<u32>;

    fn params(&self) -> &[ParamInfo];

    fn extensions(&self) -> &[ExtensionInfo];

    fn csrs(&self) -> &[Arc<CsrInfo>];

    fn exception_codes(&self) -> &[(String, u64)];

    fn interrupt_codes(&self) -> &[(String, u64)];

    fn csr(&self, name: &str) -> Option<&Arc<CsrInfo>> {
        self.csrs().iter().find(|c| c.name == name)
    }

    fn extension(&self, name: &str) -> Option<&ExtensionInfo> {
        self.extensions().iter().find(|e| e.name == name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ArchConfig {
    xlen: Option<u32>,
    params: Vec<ParamInfo>,
    extensions: Vec<ExtensionInfo>,
    csrs: Vec<Arc<CsrInfo>>,
    exception_codes: Vec<(String, u64)>,
    interrupt_codes: Vec<(String, u64)>,
}

impl ArchConfig {
    pub fn builder() -> ArchConfigBuilder {
        ArchConfigBuilder::default()
    }
}

impl Architecture for ArchConfig {
    fn xlen(&self) -> Option<u32> {
        self.xlen
    }

    fn params(&self) -> &[ParamInfo] {
        &self.params
    }

    fn extensions(&self) -> &[ExtensionInfo] {
        &self.extensions
    }

    fn csrs(&self) -> &[Arc<CsrInfo>] {
        &self.csrs
    }

    fn exception_codes(&self) -> &[(String, u64)] {
        &self.exception_codes
    }

    fn interrupt_codes(&self) -> &[(String, u64)] {
        &self.interrupt_codes
    }
}

#[derive(Debug, Default)]
pub struct ArchConfigBuilder {
    config: ArchConfig,
}

impl ArchConfigBuilder {
    pub fn xlen(mut self, xlen: u32) -> Self {
        self.config.xlen = Some(xlen);
        self
    }

    /// Parameter with a known value.
    pub fn param(mut self, name: impl Into<String>, ty: Type, value: Value) -> Self {
        self.config.params.push(ParamInfo {
            name: name.into(),
            ty,
            value: Some(value),
        });
        self
    }

    /// Parameter whose value the configuration leaves open.
    pub fn open_param(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.config.params.push(ParamInfo {
            name: name.into(),
            ty,
            value: None,
        });
        self
    }

    pub fn extension(mut self, name: impl Into<String>, implemented: Option<bool>) -> Self {
        self.config.extensions.push(ExtensionInfo {
            name: name.into(),
            implemented,
        });
        self
    }

    pub fn csr(mut self, csr: CsrInfo) -> Self {
        self.config.csrs.push(Arc::new(csr));
        self
    }

    pub fn exception_code(mut self, name: impl Into<String>, code: u64) -> Self {
        self.config.exception_codes.push((name.into(), code));
        self
    }

    pub fn interrupt_code(mut self, name: impl Into<String>, code: u64) -> Self {
        self.config.interrupt_codes.push((name.into(), code));
        self
    }

    pub fn build(self) -> ArchConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_base_location_falls_back_to_rv64() {
        let loc = FieldLocation::PerBase {
            rv32: BitRange::single(31),
            rv64: BitRange::try_new(63, 60).unwrap(),
        };
        assert_eq!(loc.resolve(Some(32)), BitRange::single(31));
        assert_eq!(loc.resolve(Some(64)).msb, 63);
        assert_eq!(loc.resolve(None).lsb, 60);
    }

    #[test]
    fn read_only_accesses_are_not_writable() {
        assert!(!FieldAccess::ReadOnly.is_writable());
        assert!(!FieldAccess::ReadOnlyHw.is_writable());
        assert!(FieldAccess::ReadWriteR.is_writable());
        assert_eq!(FieldAccess::from_name("RO-H"), Some(FieldAccess::ReadOnlyHw));
    }

    #[test]
    fn builder_collects_facts() {
        let arch = ArchConfig::builder()
            .xlen(32)
            .extension("S", Some(true))
            .csr(CsrInfo::new("mscratch", 0x340, CsrLength::Xlen))
            .build();
        assert_eq!(arch.xlen(), Some(32));
        assert!(arch.extension("S").is_some());
        assert_eq!(arch.csr("mscratch").map(|c| c.width(arch.xlen())), Some(Some(32)));
    }
}
