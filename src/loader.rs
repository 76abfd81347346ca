//! Program loading: either a raw instruction-word array (the literal
//! `load_words` contract) or an ELF binary, via the `object` crate —
//! the same crate and segment-walking approach as the teacher's
//! `elf_helper.rs`/`loader.rs`, trimmed of paging (segments are copied
//! straight into a flat `Memory`) and generalized to return `u32`
//! entry points instead of writing into a CPU struct directly.
//! `load_program_file` sniffs which of the two a path names, the way
//! the CLI needs to.

use std::path::Path;

use object::elf;
use object::read::elf::{FileHeader, ProgramHeader};
use object::Endianness;

use crate::error::{ElfError, EngineError, EngineResult};
use crate::memory::Memory;

type ElfHeader = elf::FileHeader32<Endianness>;

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

/// Writes `words` contiguously starting at `start`, failing instead of
/// silently truncating when the program doesn't fit.
pub fn load_words(
    mem: &mut impl Memory,
    mem_size: u32,
    words: &[u32],
    start: u32,
) -> EngineResult<()> {
    let len = words.len() * 4;
    if start.checked_add(len as u32).filter(|&end| end <= mem_size).is_none() {
        return Err(EngineError::ProgramTooLarge { start, len, mem_size });
    }
    mem.load_program(words, start);
    Ok(())
}

/// A program loaded into memory: where execution starts, and how many
/// instruction words it's reasonable to expect the pipeline to drain
/// (used to compute the default `N + 4` tick count).
pub struct LoadedProgram {
    pub entry: u32,
    pub word_count: usize,
}

/// Loads `path` into `mem`, sniffing the `\x7fELF` magic to decide
/// between an ELF binary and a flat file of little-endian 32-bit
/// instruction words loaded at address 0.
pub fn load_program_file(
    mem: &mut impl Memory,
    mem_size: u32,
    path: &Path,
) -> EngineResult<LoadedProgram> {
    let data = std::fs::read(path).map_err(|e| ElfError::Read(path.to_path_buf(), e))?;

    if data.starts_with(&ELF_MAGIC) {
        let entry = load_elf(mem, path)?;
        Ok(LoadedProgram { entry, word_count: data.len() / 4 })
    } else {
        let words: Vec<u32> = data
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        load_words(mem, mem_size, &words, 0)?;
        Ok(LoadedProgram { entry: 0, word_count: words.len() })
    }
}

/// Parses and loads an ELF file, returning its entry point.
pub fn load_elf(mem: &mut impl Memory, path: &Path) -> EngineResult<u32> {
    let data = std::fs::read(path).map_err(|e| ElfError::Read(path.to_path_buf(), e))?;
    load_elf_bytes(mem, path, &data)
}

fn load_elf_bytes(mem: &mut impl Memory, path: &Path, data: &[u8]) -> EngineResult<u32> {
    let header = ElfHeader::parse(data)
        .map_err(|e| ElfError::Parse(path.to_path_buf(), e.to_string()))?;
    let endian = header
        .endian()
        .map_err(|e| ElfError::Parse(path.to_path_buf(), e.to_string()))?;

    if header.e_machine(endian) != elf::EM_RISCV {
        return Err(ElfError::WrongMachine(path.to_path_buf(), header.e_machine(endian)).into());
    }

    let segments = header
        .program_headers(endian, data)
        .map_err(|e| ElfError::Parse(path.to_path_buf(), e.to_string()))?;

    for segment in segments {
        let vaddr = segment.p_vaddr(endian);
        let memsz = segment.p_memsz(endian);
        let filesz = segment.p_filesz(endian);
        let offset = segment.p_offset(endian) as usize;

        if vaddr.checked_add(memsz).is_none() {
            return Err(ElfError::SegmentOverflow { vaddr, memsz }.into());
        }

        for i in 0..memsz {
            let byte = if i < filesz { data[offset + i as usize] } else { 0 };
            mem.write8(vaddr.wrapping_add(i), byte);
        }
    }

    Ok(header.e_entry(endian))
}
