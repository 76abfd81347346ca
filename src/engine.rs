//! The top-level pipeline engine: register file, CSR file, PC and the
//! four latches, advanced one tick at a time by `clock`.

use crate::csr::CsrFile;
use crate::instruction::Instruction;
use crate::memory::Memory;
use crate::pipeline::{self, stages, ExMem, IdEx, IfId, Latches, MemWb};
use crate::registers::RegisterFile;

#[derive(Clone, Copy, Debug, Default)]
pub struct EngineConfig {
    /// Mirrors the teacher's `verbose`-gated `eprintln!` policy: when
    /// set, every tick narrates fetch address, stalls and flushes.
    pub verbose: bool,
}

/// Cycle/instruction bookkeeping, separate from architectural state so
/// `reset` can zero it without touching `EngineConfig`.
#[derive(Clone, Copy, Debug, Default)]
pub struct History {
    pub cycles: u64,
    pub retired: u64,
}

pub struct Engine {
    regs: RegisterFile,
    csrs: CsrFile,
    pc: u32,
    latches: Latches,
    pub config: EngineConfig,
    history: History,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            regs: RegisterFile::default(),
            csrs: CsrFile::new(),
            pc: 0,
            latches: Latches::default(),
            config,
            history: History::default(),
        }
    }

    pub fn reset(&mut self) {
        self.regs.reset();
        self.csrs.clear();
        self.pc = 0;
        self.latches = Latches::default();
        self.history = History::default();
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    /// Sets the fetch PC directly; used to seed execution at an ELF's
    /// entry point after `reset`.
    pub fn set_pc(&mut self, pc: u32) {
        self.pc = pc;
    }

    pub fn get_reg(&self, index: u32) -> u32 {
        self.regs.read(index)
    }

    pub fn get_csr(&self, addr: u16) -> u32 {
        self.csrs.read(addr)
    }

    pub fn cycle_count(&self) -> u64 {
        self.history.cycles
    }

    pub fn retired_count(&self) -> u64 {
        self.history.retired
    }

    /// Advances every stage by one tick against `mem`. Ordering within
    /// a tick: decode the incoming instruction and check for a
    /// load-use hazard, run EX (forwarding from the *current* EX/MEM
    /// and MEM/WB latches) and MEM, then commit WB — so the following
    /// IF/ID register read sees this tick's write-back — and finally
    /// build the next latch set, with flush taking priority over
    /// stall.
    pub fn clock(&mut self, mem: &mut impl Memory) {
        self.history.cycles += 1;

        if self.config.verbose {
            eprintln!("tick {}: pc={:#010x}", self.history.cycles, self.pc);
        }

        let incoming = if self.latches.if_id.valid {
            Instruction::decode(self.latches.if_id.raw)
        } else {
            Instruction::bubble()
        };
        let load_hazard = stages::load_use_hazard(&self.latches, &incoming);

        let ex_out = stages::execute(&self.latches, &mut self.csrs);
        let mem_data = stages::memory_access(&self.latches.ex_mem, mem);

        if !self.latches.mem_wb.inst.is_bubble() {
            self.history.retired += 1;
        }
        stages::write_back(&self.latches.mem_wb, &mut self.regs);

        let next_ex_mem = ExMem {
            pc: self.latches.id_ex.pc,
            inst: self.latches.id_ex.inst,
            alu_result: ex_out.alu_result,
            reg_val2: ex_out.store_data,
        };
        let next_mem_wb = MemWb {
            pc: self.latches.ex_mem.pc,
            inst: self.latches.ex_mem.inst,
            mem_data,
            alu_result: self.latches.ex_mem.alu_result,
        };

        let (next_if_id, next_id_ex) = if let Some(target) = ex_out.flush_target {
            if self.config.verbose {
                eprintln!("tick {}: flush, target={:#010x}", self.history.cycles, target);
            }
            self.pc = target;
            (IfId::bubble(), IdEx::bubble())
        } else if load_hazard {
            if self.config.verbose {
                eprintln!("tick {}: load-use stall", self.history.cycles);
            }
            (self.latches.if_id, IdEx::bubble())
        } else {
            let raw = stages::fetch(self.pc, mem);
            let fetched = IfId { pc: self.pc, raw, valid: true };
            self.pc = self.pc.wrapping_add(4);

            let (reg_val1, reg_val2) = stages::read_operands(&incoming, &self.regs);
            let decoded = IdEx {
                pc: self.latches.if_id.pc,
                inst: incoming,
                reg_val1,
                reg_val2,
            };
            (fetched, decoded)
        };

        self.latches = pipeline::Latches {
            if_id: next_if_id,
            id_ex: next_id_ex,
            ex_mem: next_ex_mem,
            mem_wb: next_mem_wb,
        };
    }
}

/// A register/CSR dump, 4 registers per row, grounded on
/// `original_source::CPU::dump_registers`.
impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "--- CPU State ---")?;
        writeln!(f, "PC: {:#010x}", self.pc)?;
        for i in 0..32u32 {
            write!(f, "x{:2}: {:#010x}  ", i, self.regs.read(i))?;
            if (i + 1) % 4 == 0 {
                writeln!(f)?;
            }
        }
        writeln!(f, "mepc   = {:#010x}", self.csrs.read(crate::csr::MEPC))?;
        writeln!(f, "mcause = {:#010x}", self.csrs.read(crate::csr::MCAUSE))?;
        writeln!(f, "mtval  = {:#010x}", self.csrs.read(crate::csr::MTVAL))?;
        write!(f, "-----------------")
    }
}
