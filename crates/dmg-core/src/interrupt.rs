//! Interrupt helper types.

/// Interrupt bits and vectors, in CPU priority order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Interrupt {
    VBlank,
    LcdStat,
    Timer,
    Serial,
    Joypad,
}

impl Interrupt {
    #[inline]
    pub const fn bit(self) -> u8 {
        match self {
            Self::VBlank => 1 << 0,
            Self::LcdStat => 1 << 1,
            Self::Timer => 1 << 2,
            Self::Serial => 1 << 3,
            Self::Joypad => 1 << 4,
        }
    }

    #[inline]
    pub const fn vector(self) -> u16 {
        match self {
            Self::VBlank => 0x0040,
            Self::LcdStat => 0x0048,
            Self::Timer => 0x0050,
            Self::Serial => 0x0058,
            Self::Joypad => 0x0060,
        }
    }

    /// Highest-priority interrupt in a pending mask (lowest set bit).
    #[inline]
    pub fn from_pending_mask(pending: u8) -> Option<Self> {
        match pending.trailing_zeros() {
            0 => Some(Self::VBlank),
            1 => Some(Self::LcdStat),
            2 => Some(Self::Timer),
            3 => Some(Self::Serial),
            4 => Some(Self::Joypad),
            _ => None,
        }
    }
}

#[inline]
pub const fn pending_mask(ie: u8, iflag: u8) -> u8 {
    ie & iflag & 0x1F
}
