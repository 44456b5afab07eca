use crate::bytemath;
use crate::error::{ParseError, ParseErrorKind};
use crate::image::{MEMORY_SIZE, ProgramImage};
use crate::isa::InstructionTable;

/// Assemble `source` into a full-size image, trailing cells zero.
///
/// This is a flat transliterator: every whitespace-separated token becomes
/// exactly one byte. Mnemonics contribute their opcode, decimal literals
/// contribute themselves. Operand counts are not checked against
/// instruction arity, so `HLT 5` and `STA` are both accepted.
///
/// Fails on the first bad token; no partial image is produced.
pub fn assemble(source: &str, table: &InstructionTable) -> Result<ProgramImage, ParseError> {
    let mut bytes = [0u8; MEMORY_SIZE];
    let mut len = 0;

    for token in source.split_whitespace() {
        let byte = assemble_token(token, table)?;
        if len == MEMORY_SIZE {
            return Err(ParseError::new(ParseErrorKind::ProgramTooLong, token));
        }
        bytes[len] = byte;
        len += 1;
    }

    log::debug!("assembled {len} bytes");
    Ok(ProgramImage::from(bytes))
}

fn assemble_token(token: &str, table: &InstructionTable) -> Result<u8, ParseError> {
    if is_integer_literal(token) {
        // Literals too large for i64 are still out of range.
        let value = token.parse::<i64>().unwrap_or(i64::MAX);
        return bytemath::require_byte_value(value)
            .map_err(|_| ParseError::new(ParseErrorKind::ValueOutOfRange, token));
    }
    table
        .resolve_by_mnemonic(token)
        .map(|ins| ins.opcode)
        .ok_or_else(|| ParseError::new(ParseErrorKind::UnknownMnemonic, token))
}

/// Run of ASCII digits, optionally negative. A leading `+` is not a number.
fn is_integer_literal(token: &str) -> bool {
    let digits = token.strip_prefix('-').unwrap_or(token);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}
