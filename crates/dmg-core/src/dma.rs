use serde::{Deserialize, Serialize};

/// Cycles the CPU is locked off the bus after an OAM DMA trigger
/// (160 bytes at 1 byte per M-cycle).
pub const OAM_DMA_LOCKOUT_CYCLES: u32 = 640;

/// OAM DMA bus lockout.
///
/// The 160-byte copy itself happens at the moment FF46 is written; this
/// tracks the window during which the CPU sees 0xFF on every read outside
/// HRAM.
#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize)]
pub struct OamDma {
    active: bool,
    elapsed: u32,
}

impl OamDma {
    pub fn start(&mut self) {
        self.active = true;
        self.elapsed = 0;
    }

    #[inline]
    pub fn active(&self) -> bool {
        self.active
    }

    /// Reads outside 0xFF80..=0xFFFE return 0xFF while the lockout runs.
    /// Writes are not affected.
    #[inline]
    pub fn blocks_cpu_read(&self, addr: u16) -> bool {
        self.active && !(0xFF80..=0xFFFE).contains(&addr)
    }

    pub fn tick(&mut self, cycles: u32) {
        if !self.active {
            return;
        }
        self.elapsed += cycles;
        if self.elapsed >= OAM_DMA_LOCKOUT_CYCLES {
            self.active = false;
        }
    }
}
