use crate::bus::Bus;

use super::cpu::{Cpu, Flag, R8};

/// Rotate/shift row of the CB block (opcode bits 5..3), applied to `v`
/// with flags set the way the whole family shares them: Z from the
/// result, N/H cleared, C from the bit rotated or shifted out.
fn rotate_shift(cpu: &mut Cpu, row: u8, v: u8) -> u8 {
    let carry_in = cpu.flag(Flag::C) as u8;

    let (res, carry_out) = match row {
        0 => (v.rotate_left(1), v >> 7),         // RLC
        1 => (v.rotate_right(1), v & 1),         // RRC
        2 => ((v << 1) | carry_in, v >> 7),      // RL
        3 => ((v >> 1) | (carry_in << 7), v & 1), // RR
        4 => (v << 1, v >> 7),                   // SLA
        5 => ((v >> 1) | (v & 0x80), v & 1),     // SRA (sign kept)
        6 => ((v << 4) | (v >> 4), 0),           // SWAP
        _ => (v >> 1, v & 1),                    // SRL
    };

    cpu.set_flag(Flag::Z, res == 0);
    cpu.set_flag(Flag::N, false);
    cpu.set_flag(Flag::H, false);
    cpu.set_flag(Flag::C, carry_out != 0);
    res
}

// CB-prefixed (0xCBxx) instruction implementations.
//
// The 256 opcodes are one flat grid: bits 7..6 pick the operation block,
// bits 5..3 the rotate row or bit number, bits 2..0 the operand. Every
// opcode reads its operand once; all except BIT write a result back.
pub fn exec(cpu: &mut Cpu, bus: &mut Bus, opcode: u8) -> u32 {
    let target = R8::from_code(opcode);
    let selector = (opcode >> 3) & 0x07;
    let v = cpu.read_r8(bus, target);

    let writeback = match opcode >> 6 {
        0 => Some(rotate_shift(cpu, selector, v)),
        1 => {
            // BIT b,r: test only, C untouched.
            cpu.set_flag(Flag::Z, v & (1 << selector) == 0);
            cpu.set_flag(Flag::N, false);
            cpu.set_flag(Flag::H, true);
            None
        }
        2 => Some(v & !(1 << selector)), // RES b,r
        _ => Some(v | (1 << selector)),  // SET b,r
    };

    if let Some(res) = writeback {
        cpu.write_r8(bus, target, res);
    }

    // Prefix fetch + opcode fetch cost 8; each (HL) memory access adds 4.
    match (target, writeback.is_some()) {
        (R8::HlInd, true) => 16,
        (R8::HlInd, false) => 12,
        _ => 8,
    }
}
