use thiserror::Error;

/// Closed set of failure modes surfaced by cartridge loading and CPU execution.
///
/// Mirrors the outcome-code taxonomy used throughout the reference emulator's
/// return-value convention, collapsed into a single `std::error::Error` type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("bad arguments: {0}")]
    BadArguments(String),

    #[error("not an iNES image: {0}")]
    BadInesFormat(String),

    #[error("truncated ROM image: expected at least {expected} bytes, found {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("unsupported mapper id {0}")]
    UnsupportedMapper(u8),

    #[error("write to read-only PRG-ROM at ${addr:04x}")]
    PrgRomReadOnly { addr: u16 },

    #[error("unsupported opcode ${opcode:02x} at ${pc:04x}")]
    UnsupportedInstruction { opcode: u8, pc: u16 },

    #[error("internal addressing-mode decode error for opcode ${opcode:02x}")]
    BadAddressing { opcode: u8 },
}
