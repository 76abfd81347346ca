//! ALU and branch-condition evaluation.
//!
//! `alu_op` selects the family (see `instruction::AluOp`); within the
//! `Alu` and `Cmp` families the concrete operation is further selected
//! by `funct3`/`funct7`, matching the RV32I encoding rather than a
//! pre-decoded mnemonic.

/// Evaluates an R-type/I-type ALU operation. `funct7_sub` is true when
/// bit 30 of the instruction word is set (distinguishes ADD/SUB and
/// SRL/SRA); it is ignored by every `funct3` except 0x0 and 0x5, and
/// for OP-IMM's `funct3 = 0x0` (ADDI) it must be passed as `false` by
/// the caller since immediate-form instructions have no SUB variant.
pub fn alu(funct3: u32, funct7_sub: bool, a: u32, b: u32) -> u32 {
    match funct3 {
        0x0 => {
            if funct7_sub {
                a.wrapping_sub(b)
            } else {
                a.wrapping_add(b)
            }
        }
        0x1 => a.wrapping_shl(b & 0x1f),
        0x2 => ((a as i32) < (b as i32)) as u32,
        0x3 => (a < b) as u32,
        0x4 => a ^ b,
        0x5 => {
            if funct7_sub {
                ((a as i32).wrapping_shr(b & 0x1f)) as u32
            } else {
                a.wrapping_shr(b & 0x1f)
            }
        }
        0x6 => a | b,
        0x7 => a & b,
        _ => unreachable!("funct3 is a 3-bit field"),
    }
}

/// Evaluates a branch condition. Returns whether the branch is taken.
pub fn branch_taken(funct3: u32, a: u32, b: u32) -> bool {
    match funct3 {
        0x0 => a == b,                         // BEQ
        0x1 => a != b,                         // BNE
        0x4 => (a as i32) < (b as i32),        // BLT
        0x5 => (a as i32) >= (b as i32),       // BGE
        0x6 => a < b,                          // BLTU
        0x7 => a >= b,                         // BGEU
        _ => false,
    }
}
