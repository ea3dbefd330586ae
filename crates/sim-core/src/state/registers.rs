/// Number of integer registers (`R0..R15`).
pub const GENERAL_REGISTER_COUNT: usize = 16;
/// Number of double-precision float registers.
pub const FLOAT_REGISTER_COUNT: usize = 16;

/// Conventional assembler names, indexed by register number.
pub const REGISTER_NAMES: [&str; GENERAL_REGISTER_COUNT] = [
    "r0", "s0", "s1", "s2", "s3", "s4", "t0", "t1", "t2", "t3", "t4", "fp", "sp", "gp", "at", "lr",
];

/// Integer register identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum GeneralRegister {
    R0 = 0,
    R1 = 1,
    R2 = 2,
    R3 = 3,
    R4 = 4,
    R5 = 5,
    R6 = 6,
    R7 = 7,
    R8 = 8,
    R9 = 9,
    R10 = 10,
    R11 = 11,
    R12 = 12,
    R13 = 13,
    R14 = 14,
    R15 = 15,
}

impl GeneralRegister {
    /// Ordered list of all integer registers.
    pub const ALL: [Self; GENERAL_REGISTER_COUNT] = [
        Self::R0,
        Self::R1,
        Self::R2,
        Self::R3,
        Self::R4,
        Self::R5,
        Self::R6,
        Self::R7,
        Self::R8,
        Self::R9,
        Self::R10,
        Self::R11,
        Self::R12,
        Self::R13,
        Self::R14,
        Self::R15,
    ];

    /// Frame pointer by convention.
    pub const FP: Self = Self::R11;
    /// Stack pointer by convention. `call`, `ret` and the push/pop family use it.
    pub const SP: Self = Self::R12;
    /// Global pointer by convention.
    pub const GP: Self = Self::R13;
    /// Assembler temporary by convention.
    pub const AT: Self = Self::R14;
    /// Link register by convention.
    pub const LR: Self = Self::R15;

    /// Returns the array index for this register (`0..=15`).
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Decodes a 4-bit register field. Upper bits are masked off, so every
    /// input names some register.
    #[must_use]
    pub const fn from_u4(bits: u8) -> Self {
        Self::ALL[(bits & 0x0F) as usize]
    }

    /// Conventional assembler name (`r0`, `s0`, ..., `lr`).
    #[must_use]
    pub const fn name(self) -> &'static str {
        REGISTER_NAMES[self.index()]
    }

    /// Looks a register up by its conventional name or by `rN`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        if let Some(pos) = REGISTER_NAMES.iter().position(|n| *n == name) {
            return Some(Self::ALL[pos]);
        }
        let index: usize = name.strip_prefix('r')?.parse().ok()?;
        Self::ALL.get(index).copied()
    }
}

/// Integer, float and privileged register storage.
///
/// `R0` is hardwired to zero: [`RegisterFile::set_gpr`] refuses the write and
/// reports it so the owner can raise a diagnostic.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegisterFile {
    gpr: [i32; GENERAL_REGISTER_COUNT],
    fpr: [f64; FLOAT_REGISTER_COUNT],
    ivec: u32,
    ptbr: u32,
    flags: u32,
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self {
            gpr: [0; GENERAL_REGISTER_COUNT],
            fpr: [0.0; FLOAT_REGISTER_COUNT],
            ivec: 0,
            ptbr: 0,
            flags: 0,
        }
    }
}

impl RegisterFile {
    /// Reads an integer register.
    #[must_use]
    pub const fn gpr(&self, reg: GeneralRegister) -> i32 {
        self.gpr[reg.index()]
    }

    /// Writes an integer register. Returns `false` when the target is `R0`
    /// and the value was discarded.
    #[must_use]
    pub const fn set_gpr(&mut self, reg: GeneralRegister, value: i32) -> bool {
        if matches!(reg, GeneralRegister::R0) {
            return false;
        }
        self.gpr[reg.index()] = value;
        true
    }

    /// All integer registers in index order.
    #[must_use]
    pub const fn gprs(&self) -> &[i32; GENERAL_REGISTER_COUNT] {
        &self.gpr
    }

    /// Reads a float register.
    #[must_use]
    pub const fn fpr(&self, reg: GeneralRegister) -> f64 {
        self.fpr[reg.index()]
    }

    /// Writes a float register. Float registers have no hardwired entry.
    pub const fn set_fpr(&mut self, reg: GeneralRegister, value: f64) {
        self.fpr[reg.index()] = value;
    }

    /// All float registers in index order.
    #[must_use]
    pub const fn fprs(&self) -> &[f64; FLOAT_REGISTER_COUNT] {
        &self.fpr
    }

    /// Reads the interrupt vector register.
    #[must_use]
    pub const fn ivec(&self) -> u32 {
        self.ivec
    }

    /// Writes the interrupt vector register.
    pub const fn set_ivec(&mut self, value: u32) {
        self.ivec = value;
    }

    /// Reads the page-table base register. Stored only; never used for translation.
    #[must_use]
    pub const fn ptbr(&self) -> u32 {
        self.ptbr
    }

    /// Writes the page-table base register.
    pub const fn set_ptbr(&mut self, value: u32) {
        self.ptbr = value;
    }

    /// Reads the `FLGS` register.
    #[must_use]
    pub const fn flags(&self) -> u32 {
        self.flags
    }

    /// Returns `true` when bit `index & 31` of `FLGS` is set.
    #[must_use]
    pub const fn flag_is_set(&self, index: u8) -> bool {
        (self.flags >> (index & 31)) & 1 != 0
    }

    /// Sets or clears bit `index & 31` of `FLGS`.
    pub const fn set_flag_bit(&mut self, index: u8, enabled: bool) {
        let mask = 1_u32 << (index & 31);
        if enabled {
            self.flags |= mask;
        } else {
            self.flags &= !mask;
        }
    }
}
