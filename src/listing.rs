use std::fmt::Write;

use crate::isa::InstructionTable;

/// One line per cell, `index: value`, indices right-aligned to the width of
/// the largest one.
pub fn dump(bytes: &[u8]) -> String {
    let width = bytes.len().to_string().len();
    bytes
        .iter()
        .enumerate()
        .map(|(i, b)| format!("{i:>width$}: {b}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Disassemble from address 0, stepping over operands by instruction arity.
///
/// Undocumented opcodes are shown as the instruction they fall back to,
/// marked with `?`. An operand cut off by the end of the tape is shown as
/// `(truncated)`.
pub fn disassemble(tape: &[u8], table: &InstructionTable) -> String {
    let mut out = String::new();
    let mut addr = 0;

    while addr < tape.len() {
        let opcode = tape[addr];
        let ins = table.resolve_permissive(opcode);
        let mark = if ins.opcode == opcode { ' ' } else { '?' };

        if ins.operand_bytes() == 0 {
            let _ = writeln!(out, "{addr:3}: {opcode:3}      {mark}{}", ins.mnemonic);
            addr += 1;
            continue;
        }

        match tape.get(addr + 1) {
            Some(&operand) => {
                let _ = writeln!(
                    out,
                    "{addr:3}: {opcode:3} {operand:3}  {mark}{} {operand}",
                    ins.mnemonic
                );
            }
            None => {
                let _ = writeln!(
                    out,
                    "{addr:3}: {opcode:3}      {mark}{} (truncated)",
                    ins.mnemonic
                );
            }
        }
        addr += 2;
    }

    out
}
