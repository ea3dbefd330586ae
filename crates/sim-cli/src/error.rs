use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures that stop the runner before or after a run. Faults raised by
/// the program itself are reported separately.
#[derive(Debug, Error)]
pub enum CliError {
    /// Reading an input file failed.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// File that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// Writing program output failed.
    #[error("output error: {0}")]
    Io(#[from] io::Error),
    /// The program image is not a readable ELF file.
    #[error("invalid ELF image: {0}")]
    Elf(#[from] object::read::Error),
    /// The ELF image parsed but cannot be placed in a 32-bit address space.
    #[error("invalid image: {0}")]
    Image(String),
    /// The debug info side file is not valid JSON of the expected shape.
    #[error("invalid debug info: {0}")]
    Json(#[from] serde_json::Error),
    /// Bad command-line input.
    #[error("{0}")]
    Usage(String),
}

impl CliError {
    /// Wraps an I/O error with the path that produced it.
    pub fn read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }
}
