//! Error types for the ambient layers around the pipeline core.
//!
//! The core engine's `clock()` never fails: illegal instructions and
//! out-of-range memory accesses are silent by design. Only the loader
//! and CLI can fail, and they do so through this module.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the ambient (non-core) parts of the simulator.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to load ELF file: {0}")]
    Elf(#[from] ElfError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(
        "program of {len} bytes starting at {start:#010x} overruns \
         {mem_size:#010x}-byte memory"
    )]
    ProgramTooLarge { start: u32, len: usize, mem_size: u32 },

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Errors specific to ELF program loading.
#[derive(Error, Debug)]
pub enum ElfError {
    #[error("failed to read '{0}': {1}")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("failed to parse ELF file '{0}': {1}")]
    Parse(PathBuf, String),

    #[error("'{0}' is not a 32-bit little-endian RISC-V ELF (machine {1:#06x})")]
    WrongMachine(PathBuf, u16),

    #[error(
        "segment at {vaddr:#010x} of size {memsz:#x} overflows 32-bit address space"
    )]
    SegmentOverflow { vaddr: u32, memsz: u32 },
}

pub type EngineResult<T> = Result<T, EngineError>;
