//! OAM scan: per-scanline sprite selection.

use serde::{Deserialize, Serialize};

/// Sprites the hardware can fetch on one scanline.
pub const MAX_LINE_SPRITES: usize = 10;

/// One OAM record, raw: Y is screen-top + 16, X is screen-left + 8.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SpriteEntry {
    pub y: u8,
    pub x: u8,
    pub tile: u8,
    pub attrs: u8,
}

/// Walks the 40 OAM entries in index order, keeps the first 10 that cover
/// scanline `ly`, and sorts them by X (stable, so ties keep OAM order).
pub fn scan_line(
    oam: &[u8; 0xA0],
    ly: u8,
    tall_sprites: bool,
) -> ([SpriteEntry; MAX_LINE_SPRITES], usize) {
    let height: i16 = if tall_sprites { 16 } else { 8 };
    let ly = ly as i16;

    let mut sprites = [SpriteEntry::default(); MAX_LINE_SPRITES];
    let mut count = 0;

    for entry in oam.chunks_exact(4) {
        let top = entry[0] as i16 - 16;
        if ly < top || ly >= top + height {
            continue;
        }

        sprites[count] = SpriteEntry {
            y: entry[0],
            x: entry[1],
            tile: entry[2],
            attrs: entry[3],
        };
        count += 1;
        if count == MAX_LINE_SPRITES {
            break;
        }
    }

    sprites[..count].sort_by_key(|s| s.x);
    (sprites, count)
}
