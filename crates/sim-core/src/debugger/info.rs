//! Read-only symbol, line and variable lookups consumed by the debugger.

#![allow(clippy::cast_sign_loss)]

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

use crate::state::{GeneralRegister, MachineState};

/// A `(file, line)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceLocation {
    /// Source file path as recorded by the toolchain.
    pub file: String,
    /// 1-based line number.
    pub line: u32,
}

impl SourceLocation {
    /// Creates a location.
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Where a variable lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableLocation {
    /// Fixed address.
    Absolute(u32),
    /// Signed byte offset from the frame pointer.
    FrameOffset(i32),
}

impl VariableLocation {
    /// Resolves to an address using the current frame pointer.
    #[must_use]
    pub const fn resolve(self, state: &MachineState) -> u32 {
        match self {
            Self::Absolute(addr) => addr,
            Self::FrameOffset(offset) => {
                (state.register(GeneralRegister::FP) as u32).wrapping_add(offset as u32)
            }
        }
    }
}

/// A variable visible at some program counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalVariable {
    /// Source-level name.
    pub name: String,
    /// Source-level type name.
    pub type_name: String,
    /// Storage location.
    pub location: VariableLocation,
}

/// Lookup service over a program's debug metadata.
pub trait DebugInfo {
    /// Maps a program counter to a source location.
    fn address_to_line(&self, pc: u32) -> Option<SourceLocation>;

    /// Variables (arguments and locals) visible at `pc`.
    fn locals_at(&self, pc: u32) -> Vec<LocalVariable>;

    /// Address of a named symbol.
    fn symbol_address(&self, name: &str) -> Option<u32>;

    /// Text of a source line, if the file is available.
    fn source_text(&self, _location: &SourceLocation) -> Option<String> {
        None
    }
}

impl<T: DebugInfo + ?Sized> DebugInfo for &T {
    fn address_to_line(&self, pc: u32) -> Option<SourceLocation> {
        (**self).address_to_line(pc)
    }

    fn locals_at(&self, pc: u32) -> Vec<LocalVariable> {
        (**self).locals_at(pc)
    }

    fn symbol_address(&self, name: &str) -> Option<u32> {
        (**self).symbol_address(name)
    }

    fn source_text(&self, location: &SourceLocation) -> Option<String> {
        (**self).source_text(location)
    }
}

/// In-memory [`DebugInfo`] built up by hand or from an image's symbol table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticDebugInfo {
    symbols: BTreeMap<String, u32>,
    lines: BTreeMap<u32, SourceLocation>,
    scopes: Vec<(Range<u32>, Vec<LocalVariable>)>,
    sources: BTreeMap<String, Vec<String>>,
}

impl StaticDebugInfo {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a symbol.
    pub fn insert_symbol(&mut self, name: impl Into<String>, addr: u32) {
        self.symbols.insert(name.into(), addr);
    }

    /// Maps an address to a source line.
    pub fn insert_line(&mut self, addr: u32, location: SourceLocation) {
        self.lines.insert(addr, location);
    }

    /// Makes `variables` visible for every pc in `range`.
    pub fn insert_scope(&mut self, range: Range<u32>, variables: Vec<LocalVariable>) {
        self.scopes.push((range, variables));
    }

    /// Provides the text of a source file, one entry per line.
    pub fn insert_source(&mut self, file: impl Into<String>, lines: Vec<String>) {
        self.sources.insert(file.into(), lines);
    }

    /// Builder form of [`Self::insert_symbol`].
    #[must_use]
    pub fn with_symbol(mut self, name: impl Into<String>, addr: u32) -> Self {
        self.insert_symbol(name, addr);
        self
    }

    /// Builder form of [`Self::insert_line`].
    #[must_use]
    pub fn with_line(mut self, addr: u32, file: impl Into<String>, line: u32) -> Self {
        self.insert_line(addr, SourceLocation::new(file, line));
        self
    }

    /// Number of known symbols.
    #[must_use]
    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }
}

impl DebugInfo for StaticDebugInfo {
    fn address_to_line(&self, pc: u32) -> Option<SourceLocation> {
        self.lines.get(&pc).cloned()
    }

    fn locals_at(&self, pc: u32) -> Vec<LocalVariable> {
        self.scopes
            .iter()
            .filter(|(range, _)| range.contains(&pc))
            .flat_map(|(_, vars)| vars.iter().cloned())
            .collect()
    }

    fn symbol_address(&self, name: &str) -> Option<u32> {
        self.symbols.get(name).copied()
    }

    fn source_text(&self, location: &SourceLocation) -> Option<String> {
        let index = usize::try_from(location.line).ok()?.checked_sub(1)?;
        self.sources.get(&location.file)?.get(index).cloned()
    }
}
