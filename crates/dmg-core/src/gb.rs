use serde::{Deserialize, Serialize};

use crate::bus::Bus;
use crate::cartridge::Cartridge;
use crate::cpu::Cpu;

/// 4194304 Hz / 59.7 Hz, rounded to the hardware frame length.
pub const CYCLES_PER_FRAME: u32 = 70_224;

/// The whole machine: CPU plus everything behind the bus. Owned by a
/// single tick loop. The host touches it only between frames, and the
/// only state it may mutate there is the button matrix, via
/// `Bus::set_joypad_button`.
#[derive(Serialize, Deserialize)]
pub struct GameBoy {
    pub cpu: Cpu,
    pub bus: Bus,
}

impl GameBoy {
    pub fn new(cart: Cartridge) -> Self {
        Self {
            cpu: Cpu::new(),
            bus: Bus::new(cart),
        }
    }

    /// One instruction boundary: service/execute on the CPU, then advance
    /// the peripherals by exactly the cycles the CPU consumed.
    pub fn step(&mut self) -> u32 {
        let cycles = self.cpu.step(&mut self.bus);
        self.bus.tick(cycles);
        cycles
    }

    /// Runs one video frame's worth of cycles (or less if the host cleared
    /// `cpu.running`). Presentation is driven by `Ppu::frame_ready`.
    pub fn run_frame(&mut self) {
        let mut frame_cycles = 0;
        while frame_cycles < CYCLES_PER_FRAME && self.cpu.running {
            frame_cycles += self.step();
        }
    }

    /// Register and IO state the boot ROM would leave behind, for running
    /// cartridges without one.
    pub fn power_on_defaults(&mut self) {
        self.cpu.a = 0x01;
        self.cpu.f = 0xB0;
        self.cpu.b = 0x00;
        self.cpu.c = 0x13;
        self.cpu.d = 0x00;
        self.cpu.e = 0xD8;
        self.cpu.h = 0x01;
        self.cpu.l = 0x4D;
        self.cpu.sp = 0xFFFE;
        self.cpu.pc = 0x0100;

        self.bus.ie = 0x00;
        self.bus.iflag = 0x01;

        // Use bus writes so register masking side effects apply.
        let io_inits: &[(u16, u8)] = &[
            (0xFF00, 0xCF),
            (0xFF05, 0x00),
            (0xFF06, 0x00),
            (0xFF07, 0x00),
            (0xFF40, 0x91),
            (0xFF42, 0x00),
            (0xFF43, 0x00),
            (0xFF45, 0x00),
            (0xFF47, 0xFC),
            (0xFF48, 0xFF),
            (0xFF49, 0xFF),
            (0xFF4A, 0x00),
            (0xFF4B, 0x00),
        ];
        for &(addr, val) in io_inits {
            self.bus.write8(addr, val);
        }
    }
}
