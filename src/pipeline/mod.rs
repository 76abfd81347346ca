//! The four inter-stage latches and the stage functions that read and
//! produce them. `Engine::clock` (in `engine.rs`) owns the tick
//! ordering; the functions here are pure, taking the latches and
//! collaborators they need and returning the values the next tick's
//! latches are built from.

pub mod stages;

use crate::instruction::Instruction;

/// IF/ID: what fetch handed to decode. `valid = false` is the bubble,
/// inserted on flush; a stalled IF/ID is simply held unchanged.
#[derive(Clone, Copy, Debug)]
pub struct IfId {
    pub pc: u32,
    pub raw: u32,
    pub valid: bool,
}

impl Default for IfId {
    fn default() -> Self {
        Self::bubble()
    }
}

impl IfId {
    pub fn bubble() -> Self {
        Self { pc: 0, raw: 0, valid: false }
    }
}

/// ID/EX: a decoded instruction plus the operand values read (or
/// forwarded-from-bubble zero) at decode time.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdEx {
    pub pc: u32,
    pub inst: Instruction,
    pub reg_val1: u32,
    pub reg_val2: u32,
}

impl IdEx {
    pub fn bubble() -> Self {
        Self::default()
    }
}

/// EX/MEM: the instruction plus its ALU result and the (forwarded)
/// rs2 value MEM needs as store data.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExMem {
    pub pc: u32,
    pub inst: Instruction,
    pub alu_result: u32,
    pub reg_val2: u32,
}

impl ExMem {
    pub fn bubble() -> Self {
        Self::default()
    }
}

/// MEM/WB: the instruction plus whatever WB will commit — `mem_data`
/// for loads, `alu_result` for everything else.
#[derive(Clone, Copy, Debug, Default)]
pub struct MemWb {
    pub pc: u32,
    pub inst: Instruction,
    pub mem_data: u32,
    pub alu_result: u32,
}

impl MemWb {
    pub fn bubble() -> Self {
        Self::default()
    }
}

/// The pipeline's full latch state, as seen at the start of a tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct Latches {
    pub if_id: IfId,
    pub id_ex: IdEx,
    pub ex_mem: ExMem,
    pub mem_wb: MemWb,
}
