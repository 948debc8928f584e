use serde::{Deserialize, Serialize};

/// Bytes of cartridge address space visible on the bus (0x0000..=0x7FFF).
pub const ROM_WINDOW: usize = 0x8000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CartridgeError {
    EmptyRom,
}

/// Header fields parsed for diagnostics. Bank switching is not emulated,
/// so the type byte is reported as-is instead of selecting a mapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    pub title: String,
    pub cartridge_type: u8,
    pub declared_rom_len: Option<usize>,
}

impl Header {
    /// Best-effort parse; short images just yield empty fields.
    pub fn parse(rom: &[u8]) -> Self {
        let title = rom
            .get(0x0134..0x0144)
            .map(|bytes| {
                bytes
                    .iter()
                    .take_while(|&&b| b != 0)
                    .filter(|b| b.is_ascii_graphic() || **b == b' ')
                    .map(|&b| b as char)
                    .collect()
            })
            .unwrap_or_default();

        let cartridge_type = rom.get(0x0147).copied().unwrap_or(0);
        let declared_rom_len = rom
            .get(0x0148)
            .and_then(|&code| (code <= 0x08).then(|| 0x8000usize << code));

        Self {
            title,
            cartridge_type,
            declared_rom_len,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct Cartridge {
    #[serde(with = "serde_bytes")]
    pub rom: Vec<u8>,
    pub header: Header,
}

impl Cartridge {
    pub fn from_rom(rom: Vec<u8>) -> Result<Self, CartridgeError> {
        if rom.is_empty() {
            return Err(CartridgeError::EmptyRom);
        }

        let header = Header::parse(&rom);
        if rom.len() > ROM_WINDOW {
            log::warn!(
                "ROM is {} bytes; only the first 32 KiB are addressable without a mapper",
                rom.len()
            );
        }

        Ok(Self { rom, header })
    }

    /// Reads inside 0x0000..=0x7FFF; past the image end returns open-bus 0xFF.
    #[inline]
    pub fn read_rom(&self, addr: u16) -> u8 {
        debug_assert!((addr as usize) < ROM_WINDOW);
        self.rom.get(addr as usize).copied().unwrap_or(0xFF)
    }
}
