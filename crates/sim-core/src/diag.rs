//! Counters for non-fatal diagnostics raised while a program runs.

use crate::fault::Diagnostic;

/// Saturating diagnostic counters plus the most recent occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Diagnostics {
    /// Reads of bytes that had never been written.
    pub uninitialized_reads: u32,
    /// Writes discarded because they targeted `r0`.
    pub read_only_writes: u32,
    /// The last diagnostic recorded, if any.
    pub last: Option<Diagnostic>,
    /// Program counter at the time of the last diagnostic.
    pub last_pc: u32,
}

impl Diagnostics {
    /// Creates an empty set of counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one occurrence and bumps the matching counter.
    #[allow(clippy::missing_const_for_fn)]
    pub fn record(&mut self, diagnostic: Diagnostic, pc: u32) {
        self.last = Some(diagnostic);
        self.last_pc = pc;
        match diagnostic {
            Diagnostic::UninitializedMemoryRead { .. } => {
                self.uninitialized_reads = self.uninitialized_reads.saturating_add(1);
            }
            Diagnostic::ReadOnlyRegisterWrite { .. } => {
                self.read_only_writes = self.read_only_writes.saturating_add(1);
            }
        }
    }

    /// Sum of all counters, saturating.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.uninitialized_reads.saturating_add(self.read_only_writes)
    }

    /// Resets all counters.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
