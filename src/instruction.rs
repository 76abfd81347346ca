//! Instruction decoding and the control bundle.
//!
//! `decode` never fails. An unrecognized opcode/funct3/funct7
//! combination produces `Opcode::Illegal`, whose control bundle is a
//! bubble (all booleans clear, `rd = 0`); the pipeline then carries it
//! through as a silent no-op. This is a deliberate, documented
//! deviation from the base ISA (which would trap), preserved for
//! compatibility with the reference behavior this simulator is built
//! against.

/// rv32i opcode, decoded from bits\[6:0\].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Opcode {
    Lui,
    AuiPc,
    Jal,
    Jalr,
    Branch,
    Load,
    Store,
    Op,
    OpImm,
    System,
    /// Unknown opcode bits; decodes to a no-op control bundle.
    #[default]
    Illegal,
}

/// Instruction format, determines how the immediate is carried and sign-extended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    R,
    I,
    S,
    B,
    U,
    J,
    Sys,
    /// No operands to decode (illegal instruction).
    None,
}

/// CSR/ECALL/MRET sub-operation, carried by `AluOp::Sys`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SysOp {
    Ecall,
    Mret,
    CsrRw,
    CsrRs,
    CsrRc,
    CsrRwi,
    CsrRsi,
    CsrRci,
}

/// Selects the ALU/branch/jump/CSR family used in EX. Mirrors the
/// `alu_op` column of the decode table directly rather than collapsing
/// to a handful of generic arithmetic tags, so EX can match on it
/// without re-inspecting the opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AluOp {
    Lui,
    AuiPc,
    Jal,
    Jalr,
    Add,
    #[default]
    Alu,
    Cmp,
    Sys(SysOp),
}

/// Control signals produced by decode and carried through the latches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Controls {
    pub reg_write: bool,
    pub mem_read: bool,
    pub mem_write: bool,
    pub branch: bool,
    pub jump: bool,
    /// `false` selects the register operand, `true` the immediate.
    pub alu_src: bool,
    pub alu_op: AluOp,
    pub funct3: u32,
    pub funct7: u32,
}

impl Controls {
    /// A bubble carries no side effect: every boolean is clear.
    /// Combined with `rd == 0` on the owning instruction, this is the
    /// latch's bubble state (see the pipeline invariants).
    pub fn bubble() -> Self {
        Self::default()
    }

    pub fn is_bubble(&self) -> bool {
        *self == Self::default()
    }
}

/// A decoded instruction, carried through ID/EX, EX/MEM and MEM/WB.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub raw: u32,
    pub opcode: Opcode,
    pub format: Format,
    pub rd: u32,
    pub rs1: Option<u32>,
    pub rs2: Option<u32>,
    /// Sign-extended (or, for U/SYS formats, already-placed) immediate.
    pub imm: u32,
    /// Raw 5-bit `rs1` field reinterpreted as a zero-extended immediate,
    /// used only by CSRRWI/CSRRSI/CSRRCI (whose `rs1` is `None`).
    pub zimm: u32,
    pub controls: Controls,
}

impl Default for Instruction {
    fn default() -> Self {
        Self::bubble()
    }
}

impl Instruction {
    /// The explicit bubble value: no register indices, no control
    /// signals, `rd = 0`. Distinct from decoding any particular
    /// encoding, per the spec's bubble definition.
    pub fn bubble() -> Self {
        Self {
            raw: 0,
            opcode: Opcode::Illegal,
            format: Format::None,
            rd: 0,
            rs1: None,
            rs2: None,
            imm: 0,
            zimm: 0,
            controls: Controls::bubble(),
        }
    }

    pub fn is_bubble(&self) -> bool {
        self.rd == 0 && self.controls.is_bubble()
    }

    /// Decodes a raw 32-bit instruction word. Never fails; unknown
    /// encodings become `Opcode::Illegal` bubbles.
    pub fn decode(raw: u32) -> Self {
        let opcode_bits = raw & 0x7f;
        let rd = (raw >> 7) & 0x1f;
        let funct3 = (raw >> 12) & 0x7;
        let rs1 = (raw >> 15) & 0x1f;
        let rs2 = (raw >> 20) & 0x1f;
        let funct7 = (raw >> 25) & 0x7f;

        let opcode = match opcode_bits {
            0x37 => Opcode::Lui,
            0x17 => Opcode::AuiPc,
            0x6f => Opcode::Jal,
            0x67 => Opcode::Jalr,
            0x63 => Opcode::Branch,
            0x03 => Opcode::Load,
            0x23 => Opcode::Store,
            0x33 => Opcode::Op,
            0x13 => Opcode::OpImm,
            0x73 => Opcode::System,
            _ => Opcode::Illegal,
        };

        if opcode == Opcode::Illegal {
            return Self::bubble();
        }

        let format = match opcode {
            Opcode::Lui | Opcode::AuiPc => Format::U,
            Opcode::Jal => Format::J,
            Opcode::Jalr | Opcode::Load | Opcode::OpImm => Format::I,
            Opcode::Branch => Format::B,
            Opcode::Store => Format::S,
            Opcode::Op => Format::R,
            Opcode::System => Format::Sys,
            Opcode::Illegal => Format::None,
        };

        let imm = decode_immediate(format, raw);
        let controls = decode_controls(opcode, funct3, funct7, raw);

        let (rs1_opt, rs2_opt) = match format {
            Format::R => (Some(rs1), Some(rs2)),
            Format::I => (Some(rs1), None),
            Format::S | Format::B => (Some(rs1), Some(rs2)),
            Format::U | Format::J => (None, None),
            // CSRRWI/CSRRSI/CSRRCI repurpose rs1 as a literal zimm
            // field: no register dependency, so no forwarding either.
            Format::Sys => match controls.alu_op {
                AluOp::Sys(SysOp::CsrRwi | SysOp::CsrRsi | SysOp::CsrRci) => {
                    (None, None)
                }
                _ => (Some(rs1), None),
            },
            Format::None => (None, None),
        };

        Self {
            raw,
            opcode,
            format,
            rd,
            rs1: rs1_opt,
            rs2: rs2_opt,
            imm,
            zimm: rs1,
            controls,
        }
    }
}

/// Extracts and sign-extends (where applicable) the immediate for the given format.
fn decode_immediate(format: Format, raw: u32) -> u32 {
    match format {
        Format::R => 0,
        Format::I => sign_extend((raw >> 20) & 0xfff, 12),
        Format::S => {
            let bits = ((raw >> 25) << 5) | ((raw >> 7) & 0x1f);
            sign_extend(bits, 12)
        }
        Format::B => {
            let bits = (((raw >> 31) & 0x1) << 12)
                | (((raw >> 7) & 0x1) << 11)
                | (((raw >> 25) & 0x3f) << 5)
                | (((raw >> 8) & 0xf) << 1);
            sign_extend(bits, 13)
        }
        Format::U => raw & 0xffff_f000,
        Format::J => {
            let bits = (((raw >> 31) & 0x1) << 20)
                | (((raw >> 12) & 0xff) << 12)
                | (((raw >> 20) & 0x1) << 11)
                | (((raw >> 21) & 0x3ff) << 1);
            sign_extend(bits, 21)
        }
        // The SYSTEM format carries the CSR address (or zimm, for the
        // immediate CSR variants) in bits[31:20], unsigned — not
        // sign-extended, unlike every other I-like immediate.
        Format::Sys => (raw >> 20) & 0xfff,
        Format::None => 0,
    }
}

/// Sign-extends the low `bits` bits of `value` to 32 bits.
fn sign_extend(value: u32, bits: u32) -> u32 {
    let shift = 32 - bits;
    (((value << shift) as i32) >> shift) as u32
}

fn decode_controls(opcode: Opcode, funct3: u32, funct7: u32, raw: u32) -> Controls {
    use Opcode::*;

    let branch = opcode == Branch;
    let jump = matches!(opcode, Jal | Jalr);
    let mem_read = opcode == Load;
    let mem_write = opcode == Store;
    let reg_write = !matches!(opcode, Branch | Store | System) || {
        // SYSTEM: CSR variants write back the old CSR value;
        // ECALL/MRET (funct3 == 0) never do.
        opcode == System && funct3 != 0
    };
    let alu_src = matches!(opcode, Lui | AuiPc | Jalr | Load | Store | OpImm);

    let alu_op = match opcode {
        Lui => AluOp::Lui,
        AuiPc => AluOp::AuiPc,
        Jal => AluOp::Jal,
        Jalr => AluOp::Jalr,
        Load | Store => AluOp::Add,
        Op | OpImm => AluOp::Alu,
        Branch => AluOp::Cmp,
        System => AluOp::Sys(decode_sys_op(funct3, raw)),
        Illegal => AluOp::Alu,
    };

    Controls {
        reg_write,
        mem_read,
        mem_write,
        branch,
        jump,
        alu_src,
        alu_op,
        funct3,
        funct7,
    }
}

fn decode_sys_op(funct3: u32, raw: u32) -> SysOp {
    match funct3 {
        0 if raw == 0x3020_0073 => SysOp::Mret,
        0 => SysOp::Ecall,
        1 => SysOp::CsrRw,
        2 => SysOp::CsrRs,
        3 => SysOp::CsrRc,
        5 => SysOp::CsrRwi,
        6 => SysOp::CsrRsi,
        7 => SysOp::CsrRci,
        _ => SysOp::Ecall,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_addi_as_i_type() {
        // addi x1, x0, 10
        let inst = Instruction::decode(0x00A00093);
        assert_eq!(inst.opcode, Opcode::OpImm);
        assert_eq!(inst.format, Format::I);
        assert_eq!(inst.rd, 1);
        assert_eq!(inst.rs1, Some(0));
        assert_eq!(inst.imm, 10);
        assert!(inst.controls.reg_write);
        assert!(inst.controls.alu_src);
    }

    #[test]
    fn decodes_negative_i_immediate() {
        // addi x2, x1, -5
        let inst = Instruction::decode(0xFFB08113);
        assert_eq!(inst.imm, (-5i32) as u32);
    }

    #[test]
    fn decodes_s_type_store() {
        // sw x2, 4(x1): imm=4, rs2=2, rs1=1, funct3=2, opcode=0x23
        let raw = (4u32 << 7) | (1 << 15) | (2 << 12) | (2 << 20) | 0x23;
        let inst = Instruction::decode(raw);
        assert_eq!(inst.opcode, Opcode::Store);
        assert_eq!(inst.format, Format::S);
        assert_eq!(inst.imm, 4);
        assert_eq!(inst.rs1, Some(1));
        assert_eq!(inst.rs2, Some(2));
        assert!(inst.controls.mem_write);
    }

    #[test]
    fn decodes_branch_target_bit_layout() {
        // beq x0, x0, 8: imm = 8
        let raw = 0x00000463; // known encoding: beq x0,x0,8
        let inst = Instruction::decode(raw);
        assert_eq!(inst.opcode, Opcode::Branch);
        assert_eq!(inst.imm, 8);
    }

    #[test]
    fn decodes_lui_u_immediate() {
        let inst = Instruction::decode(0x123450B7);
        assert_eq!(inst.opcode, Opcode::Lui);
        assert_eq!(inst.imm, 0x12345000);
        assert_eq!(inst.rd, 1);
    }

    #[test]
    fn decodes_jal_j_immediate() {
        // jal x1, 8
        let raw = 0x008000EF;
        let inst = Instruction::decode(raw);
        assert_eq!(inst.opcode, Opcode::Jal);
        assert_eq!(inst.imm, 8);
        assert_eq!(inst.rd, 1);
        assert!(inst.controls.jump);
    }

    #[test]
    fn unknown_opcode_is_illegal_bubble() {
        let inst = Instruction::decode(0xFFFFFFFF);
        assert_eq!(inst.opcode, Opcode::Illegal);
        assert!(inst.is_bubble());
    }

    #[test]
    fn ecall_and_mret_recognized_by_exact_encoding() {
        let ecall = Instruction::decode(0x0000_0073);
        assert_eq!(ecall.controls.alu_op, AluOp::Sys(SysOp::Ecall));
        let mret = Instruction::decode(0x3020_0073);
        assert_eq!(mret.controls.alu_op, AluOp::Sys(SysOp::Mret));
    }

    #[test]
    fn csr_immediate_variant_has_no_rs1_register() {
        // csrrwi x3, 0x300, 5
        let raw = (3u32 << 7) | (5 << 12) | (5 << 15) | (0x300 << 20) | 0x73;
        let inst = Instruction::decode(raw);
        assert_eq!(inst.controls.alu_op, AluOp::Sys(SysOp::CsrRwi));
        assert_eq!(inst.imm, 0x300);
        assert_eq!(inst.rs1, None);
        assert_eq!(inst.zimm, 5);
    }
}
