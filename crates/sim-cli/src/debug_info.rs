//! Debug info side file.
//!
//! The toolchain writes a JSON file next to each executable:
//!
//! ```json
//! {
//!   "debugLines": { "main.c": { "3": 4096, "4": 4104 } },
//!   "functions": {
//!     "main": {
//!       "startAddress": 4096, "size": 64,
//!       "arguments": [{ "name": "argc", "typeOffset": 40 }],
//!       "localVariables": [{ "name": "i", "location": { "offset": -4 }, "typeOffset": 40 }]
//!     }
//!   },
//!   "types": { "40": { "name": "int" } }
//! }
//! ```
//!
//! Arguments live at `fp + 8 + 4 * index`; locals at `fp + offset`.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use alex_sim_core::{DebugInfo, LocalVariable, SourceLocation, VariableLocation};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::CliError;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DebugInfoFile {
    #[serde(default)]
    debug_lines: BTreeMap<String, BTreeMap<String, u32>>,
    #[serde(default)]
    functions: BTreeMap<String, FunctionEntry>,
    #[serde(default)]
    types: BTreeMap<String, TypeEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FunctionEntry {
    start_address: u32,
    size: u32,
    #[serde(default)]
    arguments: Vec<VariableEntry>,
    #[serde(default)]
    local_variables: Vec<VariableEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VariableEntry {
    name: String,
    #[serde(default)]
    location: Option<LocationEntry>,
    #[serde(default)]
    type_offset: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LocationEntry {
    offset: i32,
}

#[derive(Debug, Deserialize)]
struct TypeEntry {
    name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FunctionScope {
    range: Range<u32>,
    variables: Vec<LocalVariable>,
}

/// [`DebugInfo`] backed by an image's symbol table and, when present, the
/// JSON side file. Source files are read on first use and cached.
#[derive(Debug, Default)]
pub struct ProgramDebugInfo {
    symbols: BTreeMap<String, u32>,
    lines: BTreeMap<u32, SourceLocation>,
    scopes: Vec<FunctionScope>,
    source_root: PathBuf,
    sources: RefCell<BTreeMap<String, Option<Vec<String>>>>,
}

impl ProgramDebugInfo {
    /// Symbol lookups only; no line or variable information.
    #[must_use]
    pub fn from_symbols(symbols: BTreeMap<String, u32>) -> Self {
        Self {
            symbols,
            ..Self::default()
        }
    }

    /// Parses a side file. Relative source paths resolve against
    /// `source_root`. Function names are added to `symbols` unless the
    /// image already defines them.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Json`] if the text is not a valid side file.
    pub fn from_json(
        text: &str,
        symbols: BTreeMap<String, u32>,
        source_root: impl Into<PathBuf>,
    ) -> Result<Self, CliError> {
        let file: DebugInfoFile = serde_json::from_str(text)?;
        let mut info = Self {
            symbols,
            source_root: source_root.into(),
            ..Self::default()
        };

        for (path, lines) in &file.debug_lines {
            let mut numbered: Vec<(u32, u32)> = lines
                .iter()
                .filter_map(|(line, addr)| match line.parse() {
                    Ok(line) => Some((line, *addr)),
                    Err(_) => {
                        warn!(file = %path, line = %line, "ignoring non-numeric line key");
                        None
                    }
                })
                .collect();
            numbered.sort_unstable();
            for (line, addr) in numbered {
                info.lines
                    .entry(addr)
                    .or_insert_with(|| SourceLocation::new(path.clone(), line));
            }
        }

        for (name, function) in &file.functions {
            info.symbols
                .entry(name.clone())
                .or_insert(function.start_address);
            info.scopes.push(FunctionScope {
                range: function.start_address
                    ..function.start_address.saturating_add(function.size),
                variables: function_variables(function, &file.types),
            });
        }

        debug!(
            lines = info.lines.len(),
            functions = info.scopes.len(),
            symbols = info.symbols.len(),
            "loaded debug info"
        );
        Ok(info)
    }

    /// Reads and parses a side file from disk. Source paths resolve against
    /// the side file's directory.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Read`] if the file cannot be read and
    /// [`CliError::Json`] if it does not parse.
    pub fn load(path: &Path, symbols: BTreeMap<String, u32>) -> Result<Self, CliError> {
        let text = fs::read_to_string(path).map_err(|err| CliError::read(path, err))?;
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::from_json(&text, symbols, root)
    }

    /// Number of addresses with a source mapping.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    fn read_source(&self, file: &str) -> Option<Vec<String>> {
        let path = self.source_root.join(file);
        match fs::read_to_string(&path) {
            Ok(text) => Some(text.lines().map(str::to_owned).collect()),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "source file unavailable");
                None
            }
        }
    }
}

fn function_variables(
    function: &FunctionEntry,
    types: &BTreeMap<String, TypeEntry>,
) -> Vec<LocalVariable> {
    let type_name = |entry: &VariableEntry| {
        entry
            .type_offset
            .and_then(|offset| types.get(&offset.to_string()))
            .map_or_else(|| "?".to_owned(), |ty| ty.name.clone())
    };

    let arguments = (8_i32..).step_by(4).zip(&function.arguments).map(|(offset, arg)| {
        LocalVariable {
            name: arg.name.clone(),
            type_name: type_name(arg),
            location: VariableLocation::FrameOffset(offset),
        }
    });
    let locals = function.local_variables.iter().filter_map(|local| {
        local.location.as_ref().map(|location| LocalVariable {
            name: local.name.clone(),
            type_name: type_name(local),
            location: VariableLocation::FrameOffset(location.offset),
        })
    });
    arguments.chain(locals).collect()
}

impl DebugInfo for ProgramDebugInfo {
    fn address_to_line(&self, pc: u32) -> Option<SourceLocation> {
        self.lines.get(&pc).cloned()
    }

    fn locals_at(&self, pc: u32) -> Vec<LocalVariable> {
        self.scopes
            .iter()
            .filter(|scope| scope.range.contains(&pc))
            .flat_map(|scope| scope.variables.iter().cloned())
            .collect()
    }

    fn symbol_address(&self, name: &str) -> Option<u32> {
        self.symbols.get(name).copied()
    }

    fn source_text(&self, location: &SourceLocation) -> Option<String> {
        let index = usize::try_from(location.line).ok()?.checked_sub(1)?;
        let mut sources = self.sources.borrow_mut();
        let lines = sources
            .entry(location.file.clone())
            .or_insert_with(|| self.read_source(&location.file));
        lines.as_ref()?.get(index).cloned()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs;

    use alex_sim_core::{DebugInfo, LocalVariable, SourceLocation, VariableLocation};

    use super::ProgramDebugInfo;
    use crate::error::CliError;

    const SAMPLE: &str = r#"{
        "debugLines": { "main.c": { "3": 4096, "4": 4104, "x": 1 } },
        "functions": {
            "main": {
                "startAddress": 4096,
                "size": 64,
                "arguments": [
                    { "name": "argc", "typeOffset": 40 },
                    { "name": "argv", "typeOffset": 52 }
                ],
                "localVariables": [
                    { "name": "i", "location": { "offset": -4 }, "typeOffset": 40 },
                    { "name": "dropped" }
                ]
            }
        },
        "types": { "40": { "name": "int" }, "52": { "name": "char**" } }
    }"#;

    fn sample() -> ProgramDebugInfo {
        ProgramDebugInfo::from_json(SAMPLE, BTreeMap::new(), "").expect("valid side file")
    }

    #[test]
    fn maps_addresses_to_lines() {
        let info = sample();
        assert_eq!(info.address_to_line(4096), Some(SourceLocation::new("main.c", 3)));
        assert_eq!(info.address_to_line(4104), Some(SourceLocation::new("main.c", 4)));
        assert_eq!(info.address_to_line(4100), None);
        assert_eq!(info.line_count(), 2);
    }

    #[test]
    fn arguments_and_locals_use_frame_offsets() {
        let info = sample();
        let vars = info.locals_at(4100);
        assert_eq!(
            vars,
            vec![
                LocalVariable {
                    name: "argc".into(),
                    type_name: "int".into(),
                    location: VariableLocation::FrameOffset(8),
                },
                LocalVariable {
                    name: "argv".into(),
                    type_name: "char**".into(),
                    location: VariableLocation::FrameOffset(12),
                },
                LocalVariable {
                    name: "i".into(),
                    type_name: "int".into(),
                    location: VariableLocation::FrameOffset(-4),
                },
            ]
        );
        assert!(info.locals_at(4160).is_empty());
    }

    #[test]
    fn functions_become_symbols_without_shadowing_the_image() {
        let mut symbols = BTreeMap::new();
        symbols.insert("main".to_owned(), 0x2000);
        let info = ProgramDebugInfo::from_json(SAMPLE, symbols, "").expect("valid side file");
        assert_eq!(info.symbol_address("main"), Some(0x2000));
        assert_eq!(sample().symbol_address("main"), Some(4096));
        assert_eq!(sample().symbol_address("nope"), None);
    }

    #[test]
    fn source_lines_are_read_lazily() {
        let dir = tempfile::tempdir().expect("temp dir");
        let json = dir.path().join("prog.json");
        fs::write(&json, SAMPLE).expect("write json");
        let info = ProgramDebugInfo::load(&json, BTreeMap::new()).expect("loads");

        let location = SourceLocation::new("main.c", 3);
        assert_eq!(info.source_text(&location), None);

        let fresh = ProgramDebugInfo::load(&json, BTreeMap::new()).expect("loads");
        fs::write(dir.path().join("main.c"), "int main(int argc) {\n\nint i = 0;\n")
            .expect("write source");
        assert_eq!(fresh.source_text(&location).as_deref(), Some("int i = 0;"));
        fs::remove_file(dir.path().join("main.c")).expect("remove source");
        assert_eq!(fresh.source_text(&location).as_deref(), Some("int i = 0;"));
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = ProgramDebugInfo::from_json("{ \"functions\": 3 }", BTreeMap::new(), "")
            .expect_err("bad shape");
        assert!(matches!(err, CliError::Json(_)));
    }

    #[test]
    fn symbol_only_lookup() {
        let mut symbols = BTreeMap::new();
        symbols.insert("start".to_owned(), 0x40);
        let info = ProgramDebugInfo::from_symbols(symbols);
        assert_eq!(info.symbol_address("start"), Some(0x40));
        assert_eq!(info.address_to_line(0x40), None);
    }
}
