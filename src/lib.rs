pub mod error;
pub mod bytemath;
pub mod isa;
pub mod image;
pub mod machine;
pub mod assembler;
pub mod listing;
pub mod substrate;
pub mod soak;

pub use error::{Error, ParseError, ParseErrorKind, Result};
pub use image::ProgramImage;
pub use isa::{Indicators, Instruction, InstructionTable};
pub use machine::Machine;
