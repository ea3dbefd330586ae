//! Program image loading: ELF32 executables and flat binaries.

use std::collections::BTreeMap;

use alex_sim_core::MachineState;
use object::{Object, ObjectSection, ObjectSymbol, SectionKind, SymbolKind};
use tracing::debug;

use crate::error::CliError;

/// Contents of one mapped region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentData {
    /// Bytes copied from the image.
    Bytes(Vec<u8>),
    /// A zero-filled region of the given length (`.bss`).
    Zeroed(u32),
}

/// A region placed in memory before the run starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Section name, or `raw` for flat images.
    pub name: String,
    /// Load address.
    pub addr: u32,
    /// What to place there.
    pub data: SegmentData,
}

impl Segment {
    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> u32 {
        match &self.data {
            SegmentData::Bytes(bytes) => u32::try_from(bytes.len()).unwrap_or(u32::MAX),
            SegmentData::Zeroed(len) => *len,
        }
    }

    /// Returns `true` for an empty region.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A loaded program: where it starts, what goes where, and its symbols.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    /// Entry point.
    pub entry: u32,
    /// Regions to map, in image order.
    pub segments: Vec<Segment>,
    /// Symbol table from the image.
    pub symbols: BTreeMap<String, u32>,
}

impl Program {
    /// Parses an ELF32 executable.
    ///
    /// Code, data and read-only data sections are mapped with their contents
    /// and `.bss`-style sections are mapped zero-filled. Every defined symbol
    /// that is not a section or file marker lands in [`Program::symbols`].
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Elf`] for a malformed image and
    /// [`CliError::Image`] when an address does not fit in 32 bits.
    pub fn parse_elf(bytes: &[u8]) -> Result<Self, CliError> {
        let file = object::File::parse(bytes)?;
        let mut segments = Vec::new();

        for section in file.sections() {
            let kind = section.kind();
            let zeroed = kind == SectionKind::UninitializedData;
            let loadable = matches!(
                kind,
                SectionKind::Text
                    | SectionKind::Data
                    | SectionKind::ReadOnlyData
                    | SectionKind::ReadOnlyString
            );
            if !(loadable || zeroed) || section.size() == 0 {
                continue;
            }

            let name = section.name()?.to_owned();
            let addr = to_u32(section.address(), &name)?;
            let data = if zeroed {
                SegmentData::Zeroed(to_u32(section.size(), &name)?)
            } else {
                SegmentData::Bytes(section.data()?.to_vec())
            };
            let segment = Segment { name, addr, data };
            debug!(section = %segment.name, addr, len = segment.len(), "mapped section");
            segments.push(segment);
        }

        let mut symbols = BTreeMap::new();
        for symbol in file.symbols() {
            if symbol.is_undefined() || matches!(symbol.kind(), SymbolKind::Section | SymbolKind::File)
            {
                continue;
            }
            let (Ok(name), Ok(addr)) = (symbol.name(), u32::try_from(symbol.address())) else {
                continue;
            };
            if !name.is_empty() {
                symbols.insert(name.to_owned(), addr);
            }
        }

        let entry = to_u32(file.entry(), "entry point")?;
        debug!(entry, sections = segments.len(), symbols = symbols.len(), "parsed ELF image");
        Ok(Self {
            entry,
            segments,
            symbols,
        })
    }

    /// Wraps a flat binary loaded at `base`, which is also the entry point.
    #[must_use]
    pub fn raw(bytes: Vec<u8>, base: u32) -> Self {
        Self {
            entry: base,
            segments: vec![Segment {
                name: "raw".to_owned(),
                addr: base,
                data: SegmentData::Bytes(bytes),
            }],
            symbols: BTreeMap::new(),
        }
    }

    /// Copies every segment into `state`.
    pub fn install(&self, state: &mut MachineState) {
        for segment in &self.segments {
            match &segment.data {
                SegmentData::Bytes(bytes) => state.load_image(segment.addr, bytes),
                SegmentData::Zeroed(len) => state.zero_fill(segment.addr, *len),
            }
        }
    }
}

fn to_u32(value: u64, what: &str) -> Result<u32, CliError> {
    u32::try_from(value)
        .map_err(|_| CliError::Image(format!("{what} address 0x{value:x} does not fit in 32 bits")))
}
