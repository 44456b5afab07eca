use crate::image::{MEMORY_SIZE, ProgramImage};
use crate::isa::InstructionTable;
use crate::listing;
use crate::machine::Machine;

/// A machine that can run a raw byte tape as its whole memory.
///
/// This is the seam between an instruction set and generic drivers such as
/// [`soak`](crate::soak): they only hand over bytes and a step budget.
pub trait Substrate {
    /// Execute the program encoded in `tape`, starting from address 0.
    ///
    /// The tape is modified in place (programs may overwrite themselves).
    /// Execution stops when the program halts or after `step_limit` steps.
    ///
    /// Returns the number of steps actually executed and whether the
    /// program stopped itself.
    fn execute(tape: &mut [u8], step_limit: usize) -> Outcome;

    /// Returns true if the byte is a documented opcode, as opposed to one
    /// that only runs through fallback.
    fn is_instruction(byte: u8) -> bool;

    /// Pretty-print a disassembly of the given tape for human inspection.
    fn disassemble(tape: &[u8]) -> String;
}

/// How a tape execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Outcome {
    pub steps: usize,
    /// The program executed HLT. A halt on the very last budgeted step
    /// still counts.
    pub halted: bool,
}

/// The Ahmes machine as a substrate. Tapes must be exactly 256 bytes; any
/// other length runs for zero steps and is left untouched.
pub struct Ahmes;

impl Substrate for Ahmes {
    fn execute(tape: &mut [u8], step_limit: usize) -> Outcome {
        let Ok(image) = ProgramImage::from_bytes(tape) else {
            return Outcome::default();
        };
        let mut machine = Machine::default();
        machine.load_program(&image);
        let steps = machine.run(step_limit);
        tape.copy_from_slice(machine.memory());
        Outcome {
            steps,
            halted: !machine.is_running(),
        }
    }

    fn is_instruction(byte: u8) -> bool {
        InstructionTable::shared().is_documented(byte)
    }

    fn disassemble(tape: &[u8]) -> String {
        listing::disassemble(tape, InstructionTable::shared())
    }
}
