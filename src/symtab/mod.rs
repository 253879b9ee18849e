//! Scoped name resolution.
//!
//! Two tiers: a [`GlobalScope`] built once per architecture and frozen
//! behind an [`Arc`], and a per-request [`SymbolTable`] that owns only the
//! frames pushed above it. Cloning a table never copies the global frame.

pub mod pool;

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::arch::{Architecture, CsrInfo};
use crate::types::{EnumDef, FunctionDef, Qualifiers, Type, TypeKind, Width};
use crate::value::Value;

pub use self::pool::{PooledSymtab, SymtabPool};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SymtabError {
    #[error("symbol '{0}' is already defined")]
    DuplicateSym(String),

    #[error("cannot add symbols to the frozen global scope")]
    GlobalFrozen,

    #[error("scope level {0} is not writable")]
    InvalidLevel(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Local,
    /// Bound to an encoded instruction field; never known, never writable.
    Decode,
    TemplateParam { index: usize },
    /// Architecture parameter.
    Parameter,
    Argument,
}

#[derive(Debug, Clone)]
pub struct Var {
    name: String,
    ty: Type,
    value: Option<Value>,
    kind: VarKind,
}

impl Var {
    pub fn new(name: impl Into<String>, ty: Type, value: Option<Value>) -> Self {
        Self {
            name: name.into(),
            ty,
            value,
            kind: VarKind::Local,
        }
    }

    pub fn with_kind(mut self, kind: VarKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn decode(name: impl Into<String>, width: u32) -> Self {
        Self::new(name, Type::bits(width), None).with_kind(VarKind::Decode)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn kind(&self) -> VarKind {
        self.kind
    }

    pub fn is_decode(&self) -> bool {
        self.kind == VarKind::Decode
    }

    pub fn is_template_param(&self) -> bool {
        matches!(self.kind, VarKind::TemplateParam { .. })
    }

    pub fn set_value(&mut self, value: Option<Value>) {
        self.value = value;
    }
}

#[derive(Debug, Clone)]
pub enum Symbol {
    Var(Var),
    Type(Type),
    Function(Arc<FunctionDef>),
}

impl Symbol {
    pub fn as_var(&self) -> Option<&Var> {
        match self {
            Symbol::Var(var) => Some(var),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<&Type> {
        match self {
            Symbol::Type(ty) => Some(ty),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Arc<FunctionDef>> {
        match self {
            Symbol::Function(def) => Some(def),
            _ => None,
        }
    }
}

pub(crate) type Frame = HashMap<String, Symbol>;

/// Frame 0, shared by every request against one architecture.
#[derive(Debug)]
pub struct GlobalScope {
    arch: Arc<dyn Architecture>,
    symbols: Frame,
    csrs_by_name: HashMap<String, Arc<CsrInfo>>,
    csrs_by_address: HashMap<u16, Arc<CsrInfo>>,
}

impl GlobalScope {
    /// Global scope holding only what the architecture provides: builtin
    /// types, parameters and the builtin enumerations.
    pub fn builtin(arch: Arc<dyn Architecture>) -> Self {
        let symbols = builtin_frame(arch.as_ref());
        Self::from_parts(arch, symbols)
    }

    pub(crate) fn from_parts(arch: Arc<dyn Architecture>, symbols: Frame) -> Self {
        let csrs_by_name = arch
            .csrs()
            .iter()
            .map(|csr| (csr.name.clone(), Arc::clone(csr)))
            .collect();
        let csrs_by_address = arch
            .csrs()
            .iter()
            .map(|csr| (csr.address, Arc::clone(csr)))
            .collect();

        debug!(
            symbols = symbols.len(),
            params = arch.params().len(),
            extensions = arch.extensions().len(),
            csrs = arch.csrs().len(),
            "global scope built"
        );

        Self {
            arch,
            symbols,
            csrs_by_name,
            csrs_by_address,
        }
    }

    pub fn arch(&self) -> &Arc<dyn Architecture> {
        &self.arch
    }

    pub fn xlen(&self) -> Option<u32> {
        self.arch.xlen()
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn csr(&self, name: &str) -> Option<&Arc<CsrInfo>> {
        self.csrs_by_name.get(name)
    }

    pub fn csr_at(&self, address: u16) -> Option<&Arc<CsrInfo>> {
        self.csrs_by_address.get(&address)
    }

    pub(crate) fn symbols(&self) -> &Frame {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

fn builtin_frame(arch: &dyn Architecture) -> Frame {
    let mut frame = Frame::new();

    let xlen = match arch.xlen() {
        Some(w) => Width::Known(w),
        None => Width::Unknown,
    };
    frame.insert("XReg".into(), Symbol::Type(Type::bits_of(xlen)));
    frame.insert("U32".into(), Symbol::Type(Type::bits(32)));
    frame.insert("U64".into(), Symbol::Type(Type::bits(64)));
    frame.insert("Boolean".into(), Symbol::Type(Type::boolean()));
    frame.insert("String".into(), Symbol::Type(Type::string()));

    let param_ty = Type::bits(8).qualify(Qualifiers::CONST | Qualifiers::GLOBAL);
    for name in ["XLEN", "MXLEN"] {
        let value = arch.xlen().map(|w| Value::Int(i128::from(w)));
        let var = Var::new(name, param_ty.clone(), value).with_kind(VarKind::Parameter);
        frame.insert(name.into(), Symbol::Var(var));
    }

    for param in arch.params() {
        let ty = param.ty.qualify(Qualifiers::CONST | Qualifiers::GLOBAL);
        let var =
            Var::new(param.name.clone(), ty, param.value.clone()).with_kind(VarKind::Parameter);
        frame.insert(param.name.clone(), Symbol::Var(var));
    }

    let extensions: Vec<(String, u64)> = arch
        .extensions()
        .iter()
        .enumerate()
        .map(|(i, ext)| (ext.name.clone(), i as u64))
        .collect();
    let builtin_enums = [
        ("ExtensionName", extensions),
        ("ExceptionCode", arch.exception_codes().to_vec()),
        ("InterruptCode", arch.interrupt_codes().to_vec()),
    ];
    for (name, members) in builtin_enums {
        // An enum needs at least one member; an architecture without
        // exceptions simply has no such type.
        if let Ok(def) = EnumDef::new(name, members) {
            frame.insert(name.into(), Symbol::Type(Type::new(TypeKind::Enum(Arc::new(def)))));
        }
    }

    frame
}

/// Per-request scope stack over a frozen global scope.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    global: Arc<GlobalScope>,
    frames: Vec<Frame>,
}

impl SymbolTable {
    pub fn new(global: Arc<GlobalScope>) -> Self {
        Self {
            global,
            frames: Vec::new(),
        }
    }

    pub fn global(&self) -> &Arc<GlobalScope> {
        &self.global
    }

    /// Number of frames including the global one.
    pub fn levels(&self) -> usize {
        self.frames.len() + 1
    }

    pub fn push(&mut self) {
        self.frames.push(Frame::new());
    }

    /// # Panics
    ///
    /// Popping the global frame is a defect in the caller.
    pub fn pop(&mut self) {
        if self.frames.pop().is_none() {
            panic!("internal error: attempted to pop the global scope");
        }
    }

    /// Innermost definition of `name`.
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name))
            .or_else(|| self.global.get(name))
    }

    /// Lookup that ignores every frame above `level` (0 is global).
    pub fn get_from(&self, name: &str, level: usize) -> Option<&Symbol> {
        let top = level.min(self.frames.len());
        self.frames[..top]
            .iter()
            .rev()
            .find_map(|frame| frame.get(name))
            .or_else(|| self.global.get(name))
    }

    pub fn get_global(&self, name: &str) -> Option<&Symbol> {
        self.global.get(name)
    }

    pub fn get_var(&self, name: &str) -> Option<&Var> {
        self.get(name).and_then(Symbol::as_var)
    }

    /// Mutable access to a variable in a pushed frame. Global variables are
    /// never mutable.
    pub fn get_var_mut(&mut self, name: &str) -> Option<&mut Var> {
        for frame in self.frames.iter_mut().rev() {
            if let Some(symbol) = frame.get_mut(name) {
                return match symbol {
                    Symbol::Var(var) => Some(var),
                    _ => None,
                };
            }
        }
        None
    }

    /// Every visible symbol matching `pred`, innermost first. Shadowed
    /// definitions are included.
    pub fn find_all(&self, mut pred: impl FnMut(&str, &Symbol) -> bool) -> Vec<&Symbol> {
        let mut found = Vec::new();
        for frame in self.frames.iter().rev() {
            found.extend(frame.iter().filter(|(n, s)| pred(n, s)).map(|(_, s)| s));
        }
        found.extend(
            self.global
                .symbols()
                .iter()
                .filter(|(n, s)| pred(n, s))
                .map(|(_, s)| s),
        );
        found
    }

    /// Writes to the innermost frame, shadowing outer definitions.
    pub fn add(&mut self, name: impl Into<String>, symbol: Symbol) -> Result<(), SymtabError> {
        let frame = self.frames.last_mut().ok_or(SymtabError::GlobalFrozen)?;
        frame.insert(name.into(), symbol);
        Ok(())
    }

    /// Writes to the innermost frame; fails if `name` is visible anywhere.
    pub fn add_unique(
        &mut self,
        name: impl Into<String>,
        symbol: Symbol,
    ) -> Result<(), SymtabError> {
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(SymtabError::DuplicateSym(name));
        }
        self.add(name, symbol)
    }

    /// Writes to the frame below the innermost one; fails if `name` is
    /// visible from that frame.
    pub fn add_above(
        &mut self,
        name: impl Into<String>,
        symbol: Symbol,
    ) -> Result<(), SymtabError> {
        let level = self.levels().saturating_sub(2);
        self.add_at(level, name, symbol)
    }

    /// Writes to frame `level`; fails if `name` is visible from that frame.
    pub fn add_at(
        &mut self,
        level: usize,
        name: impl Into<String>,
        symbol: Symbol,
    ) -> Result<(), SymtabError> {
        if level == 0 {
            return Err(SymtabError::GlobalFrozen);
        }
        if level > self.frames.len() {
            return Err(SymtabError::InvalidLevel(level));
        }
        let name = name.into();
        if self.get_from(&name, level).is_some() {
            return Err(SymtabError::DuplicateSym(name));
        }
        self.frames[level - 1].insert(name, symbol);
        Ok(())
    }

    /// Updates the value of the innermost visible variable `name`. Returns
    /// false when no writable variable exists.
    pub fn set_value(&mut self, name: &str, value: Option<Value>) -> bool {
        match self.get_var_mut(name) {
            Some(var) => {
                var.set_value(value);
                true
            }
            None => false,
        }
    }

    /// Copy sharing the global frame; only pushed frames are duplicated.
    pub fn deep_clone(&self) -> Self {
        self.clone()
    }

    /// Fresh table at global depth over the same global scope.
    pub fn global_clone(&self) -> Self {
        Self::new(Arc::clone(&self.global))
    }

    pub fn reset_to_global(&mut self) {
        self.frames.clear();
    }

    /// Removes and returns the innermost pushed frame.
    pub(crate) fn take_frame(&mut self) -> Result<Frame, SymtabError> {
        self.frames.pop().ok_or(SymtabError::GlobalFrozen)
    }

    pub fn csr(&self, name: &str) -> Option<&Arc<CsrInfo>> {
        self.global.csr(name)
    }

    pub fn csr_at(&self, address: u16) -> Option<&Arc<CsrInfo>> {
        self.global.csr_at(address)
    }

    pub fn xlen(&self) -> Option<u32> {
        self.global.xlen()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::ArchConfig;

    fn table() -> SymbolTable {
        let arch = Arc::new(ArchConfig::builder().xlen(64).extension("C", Some(true)).build());
        SymbolTable::new(Arc::new(GlobalScope::builtin(arch)))
    }

    fn var(name: &str, v: i128) -> Symbol {
        Symbol::Var(Var::new(name, Type::bits(8), Some(Value::Int(v))))
    }

    #[test]
    fn global_frame_has_builtins() {
        let t = table();
        assert!(t.get("XReg").and_then(Symbol::as_type).is_some());
        assert_eq!(
            t.get_var("XLEN").and_then(Var::value),
            Some(&Value::Int(64))
        );
        assert!(t.get("ExtensionName").is_some());
        assert!(t.get("ExceptionCode").is_none());
    }

    #[test]
    fn lookup_prefers_innermost_frame() {
        let mut t = table();
        t.push();
        t.add("a", var("a", 1)).unwrap();
        t.push();
        t.add("a", var("a", 2)).unwrap();
        assert_eq!(t.get_var("a").and_then(Var::value), Some(&Value::Int(2)));
        assert_eq!(
            t.get_from("a", 1).and_then(Symbol::as_var).and_then(Var::value),
            Some(&Value::Int(1))
        );
        t.pop();
        assert_eq!(t.get_var("a").and_then(Var::value), Some(&Value::Int(1)));
    }

    #[test]
    fn add_unique_rejects_visible_names() {
        let mut t = table();
        t.push();
        t.add_unique("a", var("a", 1)).unwrap();
        t.push();
        assert_eq!(
            t.add_unique("a", var("a", 2)),
            Err(SymtabError::DuplicateSym("a".into()))
        );
        assert_eq!(
            t.add_unique("XLEN", var("XLEN", 2)),
            Err(SymtabError::DuplicateSym("XLEN".into()))
        );
        t.add("a", var("a", 2)).unwrap();
    }

    #[test]
    fn add_above_and_add_at_target_lower_frames() {
        let mut t = table();
        t.push();
        t.push();
        t.add_above("outer", var("outer", 1)).unwrap();
        t.pop();
        assert!(t.get("outer").is_some());
        assert_eq!(
            t.add_at(1, "outer", var("outer", 1)),
            Err(SymtabError::DuplicateSym("outer".into()))
        );
        assert_eq!(t.add_at(0, "g", var("g", 0)), Err(SymtabError::GlobalFrozen));
        assert_eq!(t.add_at(5, "g", var("g", 0)), Err(SymtabError::InvalidLevel(5)));
    }

    #[test]
    fn global_scope_is_frozen() {
        let mut t = table();
        assert_eq!(t.add("x", var("x", 0)), Err(SymtabError::GlobalFrozen));
        assert!(t.get_var_mut("XLEN").is_none());
    }

    #[test]
    #[should_panic(expected = "pop the global scope")]
    fn popping_global_panics() {
        table().pop();
    }

    #[test]
    fn deep_clone_isolates_pushed_frames() {
        let mut t = table();
        t.push();
        t.add("a", var("a", 1)).unwrap();
        let mut copy = t.deep_clone();
        assert!(copy.set_value("a", Some(Value::Int(9))));
        assert_eq!(t.get_var("a").and_then(Var::value), Some(&Value::Int(1)));
        assert!(Arc::ptr_eq(t.global(), copy.global()));
    }

    #[test]
    fn find_all_includes_shadowed() {
        let mut t = table();
        t.push();
        t.add("a", var("a", 1)).unwrap();
        t.push();
        t.add("a", var("a", 2)).unwrap();
        assert_eq!(t.find_all(|name, _| name == "a").len(), 2);
    }
}
