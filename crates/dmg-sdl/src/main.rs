use std::path::PathBuf;

use dmg_core::cartridge::Cartridge;
use dmg_core::gb::GameBoy;
use dmg_core::input::Button;
use dmg_core::ppu::render::DMG_SHADES;
use dmg_core::ppu::{Framebuffer, LCD_HEIGHT, LCD_WIDTH};
use sdl2::keyboard::Keycode;

/// Keyboard bindings, one row per console button.
const KEY_BINDINGS: [(Keycode, Button); 8] = [
    (Keycode::Z, Button::A),
    (Keycode::X, Button::B),
    (Keycode::Backspace, Button::Select),
    (Keycode::Return, Button::Start),
    (Keycode::Up, Button::Up),
    (Keycode::Down, Button::Down),
    (Keycode::Left, Button::Left),
    (Keycode::Right, Button::Right),
];

fn keycode_to_button(key: Keycode) -> Option<Button> {
    KEY_BINDINGS
        .iter()
        .find(|&&(bound, _)| bound == key)
        .map(|&(_, button)| button)
}

/// Expands the shade framebuffer through the fixed DMG palette into RGBA8888
/// texture bytes.
fn write_framebuffer_rgba8888_bytes(fb: &Framebuffer, out: &mut [u8]) {
    assert_eq!(out.len(), fb.len() * 4);
    for (shade, chunk) in fb.iter().zip(out.chunks_exact_mut(4)) {
        let argb = DMG_SHADES[(*shade & 0x03) as usize];
        chunk[0] = (argb >> 16) as u8; // R
        chunk[1] = (argb >> 8) as u8; // G
        chunk[2] = argb as u8; // B
        chunk[3] = (argb >> 24) as u8; // A
    }
}

fn save_state(gb: &GameBoy, path: &PathBuf) {
    match bincode::serialize(gb).map_err(|e| e.to_string()) {
        Ok(bytes) => {
            if let Err(e) = std::fs::write(path, bytes) {
                log::error!("failed to write state {}: {e}", path.display());
            } else {
                log::info!("state saved to {}", path.display());
            }
        }
        Err(e) => log::error!("failed to serialize state: {e}"),
    }
}

fn load_state(path: &PathBuf) -> Option<GameBoy> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            log::warn!("no state at {}: {e}", path.display());
            return None;
        }
    };
    match bincode::deserialize(&bytes) {
        Ok(gb) => {
            log::info!("state loaded from {}", path.display());
            Some(gb)
        }
        Err(e) => {
            log::error!("failed to decode state {}: {e}", path.display());
            None
        }
    }
}

fn main() -> Result<(), String> {
    env_logger::init();

    use sdl2::event::Event;
    use sdl2::pixels::PixelFormatEnum;

    let mut args = std::env::args().skip(1);
    let Some(rom_path) = args.next().map(PathBuf::from) else {
        eprintln!("Usage: dmg-sdl <rom.gb> [boot.bin]");
        std::process::exit(1);
    };
    let boot_path = args.next().map(PathBuf::from);
    let state_path = rom_path.with_extension("state");

    let rom = std::fs::read(&rom_path)
        .map_err(|e| format!("failed to read ROM {}: {e}", rom_path.display()))?;
    let cart = Cartridge::from_rom(rom).map_err(|e| format!("invalid ROM: {e:?}"))?;

    let mut gb = GameBoy::new(cart);
    match &boot_path {
        Some(path) => {
            let image = std::fs::read(path)
                .map_err(|e| format!("failed to read boot ROM {}: {e}", path.display()))?;
            gb.bus
                .load_boot_rom(&image)
                .map_err(|e| format!("invalid boot ROM: {e:?}"))?;
        }
        None => gb.power_on_defaults(),
    }

    let sdl = sdl2::init()?;
    let video_subsystem = sdl.video()?;

    let window = video_subsystem
        .window("dmg-sdl", (LCD_WIDTH as u32) * 3, (LCD_HEIGHT as u32) * 3)
        .position_centered()
        .resizable()
        .build()
        .map_err(|e| e.to_string())?;

    let mut canvas = window
        .into_canvas()
        .present_vsync()
        .build()
        .map_err(|e| e.to_string())?;
    canvas
        .set_logical_size(LCD_WIDTH as u32, LCD_HEIGHT as u32)
        .map_err(|e| e.to_string())?;

    let texture_creator = canvas.texture_creator();
    let mut texture = texture_creator
        .create_texture_streaming(
            PixelFormatEnum::RGBA8888,
            LCD_WIDTH as u32,
            LCD_HEIGHT as u32,
        )
        .map_err(|e| e.to_string())?;
    let mut framebuffer_bytes = vec![0u8; LCD_WIDTH * LCD_HEIGHT * 4];

    let mut event_pump = sdl.event_pump()?;

    while gb.cpu.running {
        for event in event_pump.poll_iter() {
            match event {
                Event::Quit { .. }
                | Event::KeyDown {
                    keycode: Some(Keycode::Escape),
                    ..
                } => gb.cpu.running = false,

                Event::KeyDown {
                    keycode: Some(Keycode::F5),
                    repeat: false,
                    ..
                } => save_state(&gb, &state_path),

                Event::KeyDown {
                    keycode: Some(Keycode::F7),
                    repeat: false,
                    ..
                } => {
                    if let Some(loaded) = load_state(&state_path) {
                        gb = loaded;
                    }
                }

                Event::KeyDown {
                    keycode: Some(key),
                    repeat: false,
                    ..
                } => {
                    if let Some(btn) = keycode_to_button(key) {
                        gb.bus.set_joypad_button(btn, true);
                    }
                }

                Event::KeyUp {
                    keycode: Some(key), ..
                } => {
                    if let Some(btn) = keycode_to_button(key) {
                        gb.bus.set_joypad_button(btn, false);
                    }
                }

                _ => {}
            }
        }

        gb.run_frame();

        if gb.bus.ppu.frame_ready() {
            gb.bus.ppu.clear_frame_ready();
        }
        write_framebuffer_rgba8888_bytes(gb.bus.ppu.framebuffer(), &mut framebuffer_bytes);

        texture
            .update(None, &framebuffer_bytes, LCD_WIDTH * 4)
            .map_err(|e| e.to_string())?;

        canvas.clear();
        canvas
            .copy(&texture, None, None)
            .map_err(|e| e.to_string())?;
        // present_vsync paces the loop to the display's refresh.
        canvas.present();
    }

    Ok(())
}
