/// Execution-loop state machine.
///
/// `Running` moves to `Halted` on the all-ones sentinel word, on the `halt`
/// opcode, or when the instruction budget runs out. Only a reset leaves
/// `Halted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RunState {
    /// Ready to execute the next instruction.
    #[default]
    Running,
    /// Stopped; further steps are refused.
    Halted,
}

impl RunState {
    /// Returns `true` once the loop has stopped.
    #[must_use]
    pub const fn is_halted(self) -> bool {
        matches!(self, Self::Halted)
    }
}
