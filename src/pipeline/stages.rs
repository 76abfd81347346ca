//! The five stage functions: fetch, decode's operand read, execute
//! (ALU/branch/jump/CSR dispatch with forwarding), memory access, and
//! write-back. `Engine::clock` sequences these and builds the next
//! latch set from their outputs.

use super::{ExMem, Latches};
use crate::alu;
use crate::csr::CsrFile;
use crate::instruction::{AluOp, Instruction, Opcode, SysOp};
use crate::memory::Memory;
use crate::registers::RegisterFile;

/// IF: read the instruction word at `pc`.
pub fn fetch(pc: u32, mem: &impl Memory) -> u32 {
    mem.read32(pc)
}

/// ID's operand read: resolves `rs1`/`rs2` against the register file,
/// falling back to the raw `zimm` field when `rs1` carries no register
/// dependency (the CSR-immediate variants).
pub fn read_operands(inst: &Instruction, regs: &RegisterFile) -> (u32, u32) {
    let v1 = match inst.rs1 {
        Some(r) => regs.read(r),
        None => inst.zimm,
    };
    let v2 = match inst.rs2 {
        Some(r) => regs.read(r),
        None => 0,
    };
    (v1, v2)
}

/// Load-use hazard check: is the instruction currently in ID/EX a load
/// whose destination is read by the instruction being decoded?
pub fn load_use_hazard(latches: &Latches, incoming: &Instruction) -> bool {
    let producer = &latches.id_ex.inst;
    producer.controls.mem_read
        && producer.rd != 0
        && (Some(producer.rd) == incoming.rs1 || Some(producer.rd) == incoming.rs2)
}

/// Selects the newest producer (EX/MEM ahead of MEM/WB) whose `rd`
/// matches `rs` and is non-zero; otherwise falls back to the value
/// decode already read. `rs = None` (no register operand) never
/// forwards.
fn forward(latches: &Latches, rs: Option<u32>, decoded_val: u32) -> u32 {
    let rs = match rs {
        Some(r) => r,
        None => return decoded_val,
    };

    let ex_mem = &latches.ex_mem;
    if ex_mem.inst.controls.reg_write && ex_mem.inst.rd != 0 && ex_mem.inst.rd == rs {
        return ex_mem.alu_result;
    }

    let mem_wb = &latches.mem_wb;
    if mem_wb.inst.controls.reg_write && mem_wb.inst.rd != 0 && mem_wb.inst.rd == rs {
        return if mem_wb.inst.controls.mem_read {
            mem_wb.mem_data
        } else {
            mem_wb.alu_result
        };
    }

    decoded_val
}

/// What EX produces for this tick: the value EX/MEM will carry, the
/// (forwarded) register value MEM will use as store data, and,
/// whenever a taken branch, jump, ECALL or MRET resolves, the target
/// PC that flushes the two younger in-flight instructions.
pub struct ExecOutcome {
    pub alu_result: u32,
    pub store_data: u32,
    pub flush_target: Option<u32>,
}

/// EX: forwards operands, dispatches the ALU/branch/jump/CSR family
/// selected by `alu_op`, and resolves control transfers.
pub fn execute(latches: &Latches, csrs: &mut CsrFile) -> ExecOutcome {
    let id_ex = &latches.id_ex;
    let inst = &id_ex.inst;

    let a = forward(latches, inst.rs1, id_ex.reg_val1);
    let b_reg = forward(latches, inst.rs2, id_ex.reg_val2);
    let b = if inst.controls.alu_src { inst.imm } else { b_reg };

    let (alu_result, flush_target) = match inst.controls.alu_op {
        AluOp::Lui => (inst.imm, None),
        AluOp::AuiPc => (id_ex.pc.wrapping_add(inst.imm), None),
        AluOp::Jal => {
            let target = id_ex.pc.wrapping_add(inst.imm);
            (id_ex.pc.wrapping_add(4), Some(target))
        }
        AluOp::Jalr => {
            let target = a.wrapping_add(inst.imm) & !1u32;
            (id_ex.pc.wrapping_add(4), Some(target))
        }
        AluOp::Add => (a.wrapping_add(b), None),
        AluOp::Alu => {
            let is_op = inst.opcode == Opcode::Op;
            let funct7_sub = match inst.controls.funct3 {
                0 => is_op && inst.controls.funct7 == 0x20,
                5 => inst.controls.funct7 == 0x20,
                _ => false,
            };
            (alu::alu(inst.controls.funct3, funct7_sub, a, b), None)
        }
        AluOp::Cmp => {
            let taken = alu::branch_taken(inst.controls.funct3, a, b);
            let target = id_ex.pc.wrapping_add(inst.imm);
            (0, if taken { Some(target) } else { None })
        }
        AluOp::Sys(sys_op) => execute_sys(sys_op, inst.imm, a, id_ex.pc, csrs),
    };

    ExecOutcome { alu_result, store_data: b_reg, flush_target }
}

fn execute_sys(sys_op: SysOp, imm: u32, a: u32, pc: u32, csrs: &mut CsrFile) -> (u32, Option<u32>) {
    use crate::csr;

    match sys_op {
        SysOp::Ecall => {
            csrs.write(csr::MCAUSE, csr::CAUSE_ECALL_M_MODE);
            csrs.write(csr::MEPC, pc);
            csrs.write(csr::MTVAL, pc);
            (0, Some(csrs.read(csr::MTVEC)))
        }
        SysOp::Mret => (0, Some(csrs.read(csr::MEPC))),
        _ => {
            let addr = imm as u16;
            let old = csrs.read(addr);
            let new = match sys_op {
                SysOp::CsrRw | SysOp::CsrRwi => a,
                SysOp::CsrRs | SysOp::CsrRsi => old | a,
                SysOp::CsrRc | SysOp::CsrRci => old & !a,
                SysOp::Ecall | SysOp::Mret => unreachable!(),
            };
            csrs.write(addr, new);
            (old, None)
        }
    }
}

/// MEM: performs the load or store `ex_mem` carries, returning the
/// (sign/zero-extended) loaded word. A no-op for everything else.
pub fn memory_access(ex_mem: &ExMem, mem: &mut impl Memory) -> u32 {
    let inst = &ex_mem.inst;
    let addr = ex_mem.alu_result;

    if inst.controls.mem_read {
        match inst.controls.funct3 {
            0x0 => ((mem.read8(addr) as i8) as i32) as u32,
            0x1 => ((mem.read16(addr) as i16) as i32) as u32,
            0x2 => mem.read32(addr),
            0x4 => mem.read8(addr) as u32,
            0x5 => mem.read16(addr) as u32,
            _ => 0,
        }
    } else if inst.controls.mem_write {
        match inst.controls.funct3 {
            0x0 => mem.write8(addr, ex_mem.reg_val2 as u8),
            0x1 => mem.write16(addr, ex_mem.reg_val2 as u16),
            0x2 => mem.write32(addr, ex_mem.reg_val2),
            _ => {}
        }
        0
    } else {
        0
    }
}

/// WB: commits the latched value to the register file when `reg_write`
/// is set. `RegisterFile::write` already drops writes to `x0`.
pub fn write_back(mem_wb: &super::MemWb, regs: &mut RegisterFile) {
    if mem_wb.inst.controls.reg_write {
        let value = if mem_wb.inst.controls.mem_read {
            mem_wb.mem_data
        } else {
            mem_wb.alu_result
        };
        regs.write(mem_wb.inst.rd, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Controls;

    fn producer(rd: u32) -> Instruction {
        Instruction {
            rd,
            rs1: Some(0),
            rs2: None,
            controls: Controls { reg_write: true, ..Controls::default() },
            ..Instruction::bubble()
        }
    }

    /// A three-deep producer chain all targeting the same `rd`: EX/MEM
    /// must win over MEM/WB, the "newest wins" rule from the forwarding
    /// priority note.
    #[test]
    fn ex_mem_forwarding_wins_over_mem_wb() {
        let mut latches = Latches::default();
        latches.ex_mem.inst = producer(5);
        latches.ex_mem.alu_result = 100;
        latches.mem_wb.inst = producer(5);
        latches.mem_wb.alu_result = 200;

        assert_eq!(forward(&latches, Some(5), 0), 100);
    }

    #[test]
    fn mem_wb_forwarding_used_when_ex_mem_does_not_match() {
        let mut latches = Latches::default();
        latches.ex_mem.inst = producer(6);
        latches.mem_wb.inst = producer(5);
        latches.mem_wb.alu_result = 200;

        assert_eq!(forward(&latches, Some(5), 0), 200);
    }

    #[test]
    fn no_producer_falls_back_to_decoded_value() {
        let latches = Latches::default();
        assert_eq!(forward(&latches, Some(5), 42), 42);
    }

    #[test]
    fn mem_wb_forwards_loaded_data_not_stale_alu_result() {
        let mut latches = Latches::default();
        let mut load = producer(7);
        load.controls.mem_read = true;
        latches.mem_wb.inst = load;
        latches.mem_wb.alu_result = 0xdead;
        latches.mem_wb.mem_data = 0xbeef;

        assert_eq!(forward(&latches, Some(7), 0), 0xbeef);
    }

    #[test]
    fn load_use_hazard_detected_against_incoming_rs1() {
        let mut latches = Latches::default();
        let mut load = producer(3);
        load.controls.mem_read = true;
        latches.id_ex.inst = load;

        let incoming = Instruction { rs1: Some(3), ..Instruction::bubble() };
        assert!(load_use_hazard(&latches, &incoming));
    }

    #[test]
    fn load_use_hazard_ignores_x0_destination() {
        let mut latches = Latches::default();
        let mut load = producer(0);
        load.controls.mem_read = true;
        latches.id_ex.inst = load;

        let incoming = Instruction { rs1: Some(0), ..Instruction::bubble() };
        assert!(!load_use_hazard(&latches, &incoming));
    }
}
