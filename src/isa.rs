use std::sync::OnceLock;

use crate::error::{Error, Result};

/// The Ahmes instruction set: an accumulator machine with 24 documented
/// instructions spread over the 256 opcode values.
///
/// Opcodes:
/// - 0   (NOP):            no operation
/// - 16  (STA a):          Mem[a] = AC
/// - 32  (LDA a):          reads Mem[a]; AC is left unchanged (incomplete)
/// - 48  (ADD a):          no ALU effect yet
/// - 64  (OR a):           no ALU effect yet
/// - 80  (AND a):          no ALU effect yet
/// - 96  (NOT):            no ALU effect yet
/// - 112 (SUB a):          no ALU effect yet
/// - 128 (JMP a):          PC = a
/// - 144..=188 (Jcc a):    PC = a if the condition holds
/// - 224 (SHR), 225 (SHL): logical shifts of AC
/// - 226 (ROR), 227 (ROL): 8-bit rotations of AC
/// - 240 (HLT):            stop running
///
/// Undocumented opcodes resolve permissively to the nearest documented
/// opcode below them, so opcode 17 behaves as STA and 255 as HLT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub mnemonic: &'static str,
    /// Declared opcode. For a fallback slot this differs from the slot index.
    pub opcode: u8,
    pub kind: Kind,
}

/// How an instruction consumes the instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Single-byte instruction acting on the accumulator or run state.
    NoOperand(Unary),
    /// Two-byte instruction whose operand is a memory address.
    OneOperand(MemoryOp),
    /// Two-byte instruction whose operand is a branch target.
    Jump(Condition),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unary {
    Nop,
    Not,
    Shr,
    Shl,
    Ror,
    Rol,
    Hlt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryOp {
    Sta,
    Lda,
    Add,
    Or,
    And,
    Sub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Always,
    Negative,
    Positive,
    Overflow,
    NoOverflow,
    Zero,
    NotZero,
    Carry,
    NoCarry,
    Borrow,
    NoBorrow,
}

/// Condition codes derived from the accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Indicators {
    pub negative: bool,
    pub zero: bool,
    /// Never set: no implemented instruction produces it.
    pub overflow: bool,
    /// Never set: no implemented instruction produces it.
    pub carry: bool,
    /// Never set: no implemented instruction produces it.
    pub borrow: bool,
}

impl Indicators {
    pub fn from_accumulator(ac: u8) -> Self {
        Self {
            negative: crate::bytemath::is_negative(ac),
            zero: ac == 0,
            overflow: false,
            carry: false,
            borrow: false,
        }
    }
}

impl Condition {
    pub fn holds(self, ind: Indicators) -> bool {
        match self {
            Condition::Always => true,
            Condition::Negative => ind.negative,
            Condition::Positive => !ind.negative,
            Condition::Overflow => ind.overflow,
            Condition::NoOverflow => !ind.overflow,
            Condition::Zero => ind.zero,
            Condition::NotZero => !ind.zero,
            Condition::Carry => ind.carry,
            Condition::NoCarry => !ind.carry,
            Condition::Borrow => ind.borrow,
            Condition::NoBorrow => !ind.borrow,
        }
    }
}

impl Instruction {
    const fn new(mnemonic: &'static str, opcode: u8, kind: Kind) -> Self {
        Self {
            mnemonic,
            opcode,
            kind,
        }
    }

    /// Number of operand bytes following the opcode (0 or 1).
    pub fn operand_bytes(&self) -> u8 {
        match self.kind {
            Kind::NoOperand(_) => 0,
            Kind::OneOperand(_) | Kind::Jump(_) => 1,
        }
    }
}

/// Documented instructions, in ascending opcode order.
pub const DOCUMENTED: [Instruction; 24] = [
    Instruction::new("NOP", 0, Kind::NoOperand(Unary::Nop)),
    Instruction::new("STA", 16, Kind::OneOperand(MemoryOp::Sta)),
    Instruction::new("LDA", 32, Kind::OneOperand(MemoryOp::Lda)),
    Instruction::new("ADD", 48, Kind::OneOperand(MemoryOp::Add)),
    Instruction::new("OR", 64, Kind::OneOperand(MemoryOp::Or)),
    Instruction::new("AND", 80, Kind::OneOperand(MemoryOp::And)),
    Instruction::new("NOT", 96, Kind::NoOperand(Unary::Not)),
    Instruction::new("SUB", 112, Kind::OneOperand(MemoryOp::Sub)),
    Instruction::new("JMP", 128, Kind::Jump(Condition::Always)),
    Instruction::new("JN", 144, Kind::Jump(Condition::Negative)),
    Instruction::new("JP", 148, Kind::Jump(Condition::Positive)),
    Instruction::new("JV", 152, Kind::Jump(Condition::Overflow)),
    Instruction::new("JNV", 156, Kind::Jump(Condition::NoOverflow)),
    Instruction::new("JZ", 160, Kind::Jump(Condition::Zero)),
    Instruction::new("JNZ", 164, Kind::Jump(Condition::NotZero)),
    Instruction::new("JC", 176, Kind::Jump(Condition::Carry)),
    Instruction::new("JNC", 180, Kind::Jump(Condition::NoCarry)),
    Instruction::new("JB", 184, Kind::Jump(Condition::Borrow)),
    Instruction::new("JNB", 188, Kind::Jump(Condition::NoBorrow)),
    Instruction::new("SHR", 224, Kind::NoOperand(Unary::Shr)),
    Instruction::new("SHL", 225, Kind::NoOperand(Unary::Shl)),
    Instruction::new("ROR", 226, Kind::NoOperand(Unary::Ror)),
    Instruction::new("ROL", 227, Kind::NoOperand(Unary::Rol)),
    Instruction::new("HLT", 240, Kind::NoOperand(Unary::Hlt)),
];

/// One instruction per opcode byte, with undocumented slots filled from the
/// nearest documented opcode below.
#[derive(Debug, Clone)]
pub struct InstructionTable {
    slots: [Instruction; 256],
}

impl InstructionTable {
    pub fn new() -> Self {
        let mut declared: [Option<Instruction>; 256] = [None; 256];
        for ins in DOCUMENTED {
            declared[ins.opcode as usize] = Some(ins);
        }

        // Slot 0 is NOP, so there is always a lower neighbour to inherit.
        let mut slots = [DOCUMENTED[0]; 256];
        let mut current = DOCUMENTED[0];
        for (slot, entry) in slots.iter_mut().zip(declared) {
            if let Some(ins) = entry {
                current = ins;
            }
            *slot = current;
        }
        Self { slots }
    }

    /// Process-wide table, built on first use.
    pub fn shared() -> &'static InstructionTable {
        static TABLE: OnceLock<InstructionTable> = OnceLock::new();
        TABLE.get_or_init(InstructionTable::new)
    }

    /// True if `opcode` is declared by an instruction rather than inherited.
    pub fn is_documented(&self, opcode: u8) -> bool {
        self.slots[opcode as usize].opcode == opcode
    }

    /// Resolve only documented opcodes.
    pub fn resolve_strict(&self, opcode: u8) -> Result<Instruction> {
        if self.is_documented(opcode) {
            Ok(self.slots[opcode as usize])
        } else {
            Err(Error::UnmappedOpcode(opcode))
        }
    }

    /// Resolve any opcode, falling back to the nearest lower documented one.
    pub fn resolve_permissive(&self, opcode: u8) -> Instruction {
        self.slots[opcode as usize]
    }

    /// Case-insensitive lookup of a declared mnemonic.
    pub fn resolve_by_mnemonic(&self, text: &str) -> Option<Instruction> {
        DOCUMENTED
            .iter()
            .find(|ins| ins.mnemonic.eq_ignore_ascii_case(text))
            .copied()
    }
}

impl Default for InstructionTable {
    fn default() -> Self {
        Self::new()
    }
}
