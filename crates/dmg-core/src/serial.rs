use crate::interrupt::Interrupt;
use serde::{Deserialize, Serialize};

/// 8 bits at the internal 8192 Hz serial clock.
pub const TRANSFER_CYCLES: u32 = 4096;

/// Serial port, reduced to the debug tap used by test ROMs: writing SC
/// (0xFF02) with bit 7 set "sends" the current SB byte. The byte lands in
/// the output buffer immediately so the host can stream it; the transfer
/// itself completes 4096 cycles later, clearing SC bit 7 and requesting
/// the serial interrupt. There is no link partner, so nothing is received.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Serial {
    countdown: u32,
    #[serde(with = "serde_bytes")]
    output: Vec<u8>,
}

impl Serial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_transfer(&mut self, sb: u8) {
        self.output.push(sb);
        self.countdown = TRANSFER_CYCLES;
    }

    pub fn stop_transfer(&mut self) {
        self.countdown = 0;
    }

    pub fn tick(&mut self, cycles: u32, iflag: &mut u8, sc: &mut u8) {
        if self.countdown == 0 {
            return;
        }
        if self.countdown > cycles {
            self.countdown -= cycles;
            return;
        }
        self.countdown = 0;
        *sc &= 0x7F;
        *iflag |= Interrupt::Serial.bit();
    }

    pub fn drain_output(&mut self) -> std::vec::Drain<'_, u8> {
        self.output.drain(..)
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }
}
