use std::io::Write;
use std::path::{Path, PathBuf};

use dmg_core::bus::Bus;
use dmg_core::cartridge::Cartridge;
use dmg_core::gb::GameBoy;

#[derive(Debug)]
enum Command {
    Run(RunArgs),
    Suite(SuiteArgs),
    SelfTest(SelfTestArgs),
}

#[derive(Debug)]
struct RunArgs {
    rom_path: PathBuf,
    boot_rom_path: Option<PathBuf>,
    max_frames: Option<u64>,
    max_cycles: Option<u64>,
    verbose: bool,
    trace_cpu: bool,
    trace_ppu: bool,
    log_serial: bool,
    print_serial: bool,
}

#[derive(Debug)]
struct SuiteArgs {
    rom_dir: PathBuf,
    rom_paths: Vec<PathBuf>,
    max_frames: Option<u64>,
    max_cycles: Option<u64>,
    pass_text: Vec<String>,
    fail_text: Vec<String>,
    print_serial: bool,
    print_vram: bool,
}

#[derive(Debug)]
struct SelfTestArgs {
    max_cycles: Option<u64>,
    pass_text: Vec<String>,
    fail_text: Vec<String>,
    print_serial: bool,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum RomResult {
    Pass,
    Fail,
    Timeout,
}

impl RomResult {
    fn as_str(self) -> &'static str {
        match self {
            RomResult::Pass => "PASS",
            RomResult::Fail => "FAIL",
            RomResult::Timeout => "TIMEOUT",
        }
    }
}

fn print_usage() {
    eprintln!(
        "Usage:\n\
  dmg-cli <rom.gb> [--boot-rom FILE] [--frames N] [--cycles N] [-v|--verbose]\n\
        [--trace-cpu] [--trace-ppu] [--log-serial] [--print-serial]\n\
  dmg-cli run <rom.gb> [...same flags]\n\
  dmg-cli suite [--rom-dir DIR] [--frames N] [--cycles N] [--pass-text S] [--fail-text S] [--print-serial] [--print-vram] [ROM...]+\n\
  dmg-cli self-test [--cycles N] [--pass-text S] [--fail-text S] [--print-serial]\n\
\n\
Commands:\n\
  run        Run a single ROM (default if no subcommand is given).\n\
  suite      Discover and run a set of ROMs (default dir: ./roms).\n\
  self-test  Run a tiny built-in ROM that prints 'Passed' via serial.\n\
\n\
Optional debug output (run command):\n\
  --boot-rom FILE Map a 256-byte boot image under 0x0000 until 0xFF50.\n\
  -v, --verbose   Print ROM metadata + run summary (stderr).\n\
  --trace-cpu     Print per-instruction CPU trace (stderr).\n\
  --trace-ppu     Print PPU LY/mode transitions (stderr).\n\
  --log-serial    Stream serial output to stdout as it is produced.\n\
  --print-serial  Print captured serial output at the end.\n\
\n\
Suite pass/fail detection:\n\
  - Captures bytes written to SB (0xFF01) when SC (0xFF02) is written with\n\
    bit7 set (the blargg/mooneye convention).\n\
  - Marks PASS if output contains any --pass-text (default: 'passed').\n\
  - Marks FAIL if output contains any --fail-text (default: 'failed', 'fail').\n\
  - Otherwise stops at limits and marks TIMEOUT.\n\
  - --print-vram dumps the scraped BG tilemap text on FAIL/TIMEOUT."
    );
}

fn parse_args() -> Result<Command, String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        return Err("missing args".to_string());
    }

    match args[0].as_str() {
        "-h" | "--help" => {
            print_usage();
            std::process::exit(0);
        }
        "run" => parse_run_args(&args[1..]).map(Command::Run),
        "suite" => parse_suite_args(&args[1..]).map(Command::Suite),
        "self-test" => parse_self_test_args(&args[1..]).map(Command::SelfTest),
        _ => parse_run_args(&args).map(Command::Run),
    }
}

fn parse_u64(flag: &str, v: Option<&String>) -> Result<u64, String> {
    let v = v.ok_or_else(|| format!("{flag} requires a value"))?;
    v.parse::<u64>()
        .map_err(|_| format!("invalid {flag} value: {v}"))
}

fn parse_run_args(args: &[String]) -> Result<RunArgs, String> {
    if args.is_empty() {
        return Err("missing ROM path".to_string());
    }

    let mut it = args.iter();
    let rom_path = PathBuf::from(it.next().unwrap());

    let mut out = RunArgs {
        rom_path,
        boot_rom_path: None,
        max_frames: None,
        max_cycles: None,
        verbose: false,
        trace_cpu: false,
        trace_ppu: false,
        log_serial: false,
        print_serial: false,
    };

    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            "-v" | "--verbose" => out.verbose = true,
            "--trace-cpu" => out.trace_cpu = true,
            "--trace-ppu" => out.trace_ppu = true,
            "--log-serial" => out.log_serial = true,
            "--print-serial" => out.print_serial = true,
            "--boot-rom" => {
                let v = it
                    .next()
                    .ok_or_else(|| "--boot-rom requires a value".to_string())?;
                out.boot_rom_path = Some(PathBuf::from(v));
            }
            "--frames" => out.max_frames = Some(parse_u64("--frames", it.next())?),
            "--cycles" => out.max_cycles = Some(parse_u64("--cycles", it.next())?),
            _ if arg.starts_with('-') => return Err(format!("unknown flag: {arg}")),
            _ => return Err(format!("unexpected extra positional arg: {arg}")),
        }
    }

    Ok(out)
}

fn parse_suite_args(args: &[String]) -> Result<SuiteArgs, String> {
    let mut out = SuiteArgs {
        rom_dir: PathBuf::from("roms"),
        rom_paths: Vec::new(),
        max_frames: None,
        max_cycles: Some(300_000_000),
        pass_text: vec!["passed".to_string()],
        fail_text: vec!["failed".to_string(), "fail".to_string()],
        print_serial: false,
        print_vram: false,
    };

    let mut it = args.iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            "--rom-dir" => {
                let v = it
                    .next()
                    .ok_or_else(|| "--rom-dir requires a value".to_string())?;
                out.rom_dir = PathBuf::from(v);
            }
            "--frames" => out.max_frames = Some(parse_u64("--frames", it.next())?),
            "--cycles" => out.max_cycles = Some(parse_u64("--cycles", it.next())?),
            "--pass-text" => {
                let v = it
                    .next()
                    .ok_or_else(|| "--pass-text requires a value".to_string())?;
                out.pass_text.push(v.to_string());
            }
            "--fail-text" => {
                let v = it
                    .next()
                    .ok_or_else(|| "--fail-text requires a value".to_string())?;
                out.fail_text.push(v.to_string());
            }
            "--print-serial" => out.print_serial = true,
            "--print-vram" => out.print_vram = true,
            _ if arg.starts_with('-') => return Err(format!("unknown flag: {arg}")),
            _ => out.rom_paths.push(PathBuf::from(arg)),
        }
    }

    Ok(out)
}

fn parse_self_test_args(args: &[String]) -> Result<SelfTestArgs, String> {
    let mut out = SelfTestArgs {
        max_cycles: Some(5_000_000),
        pass_text: vec!["passed".to_string()],
        fail_text: vec!["failed".to_string(), "fail".to_string()],
        print_serial: false,
    };

    let mut it = args.iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            "--cycles" => out.max_cycles = Some(parse_u64("--cycles", it.next())?),
            "--pass-text" => {
                let v = it
                    .next()
                    .ok_or_else(|| "--pass-text requires a value".to_string())?;
                out.pass_text.push(v.to_string());
            }
            "--fail-text" => {
                let v = it
                    .next()
                    .ok_or_else(|| "--fail-text requires a value".to_string())?;
                out.fail_text.push(v.to_string());
            }
            "--print-serial" => out.print_serial = true,
            _ if arg.starts_with('-') => return Err(format!("unknown flag: {arg}")),
            _ => return Err(format!("unexpected positional arg: {arg}")),
        }
    }

    Ok(out)
}

fn discover_roms(dir: &Path) -> Result<Vec<PathBuf>, String> {
    fn visit(out: &mut Vec<PathBuf>, p: &Path) -> Result<(), String> {
        let rd = std::fs::read_dir(p)
            .map_err(|e| format!("failed to read ROM directory {}: {e}", p.display()))?;
        for ent in rd {
            let ent = ent.map_err(|e| format!("failed to read entry in {}: {e}", p.display()))?;
            let path = ent.path();
            if path.is_dir() {
                visit(out, &path)?;
                continue;
            }
            let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            if ext.eq_ignore_ascii_case("gb") {
                out.push(path);
            }
        }
        Ok(())
    }

    let mut out = Vec::new();
    visit(&mut out, dir)?;
    out.sort();
    Ok(out)
}

fn contains_any(haystack_lower: &str, needles: &[String]) -> bool {
    needles
        .iter()
        .any(|n| !n.is_empty() && haystack_lower.contains(&n.to_ascii_lowercase()))
}

fn decode_screen_char(tile_id: u8) -> u8 {
    // Text-mode test ROMs put ASCII character codes straight into the BG
    // tilemap, often with the high bit set.
    let c = tile_id & 0x7F;
    if (0x20..=0x7E).contains(&c) {
        c
    } else {
        b' '
    }
}

fn scrape_bg_tilemap_text(vram: &[u8], map_offset: usize) -> String {
    // BG tilemaps are 32x32 bytes at VRAM offsets 0x1800 (0x9800) and
    // 0x1C00 (0x9C00).
    const MAP_W: usize = 32;
    const MAP_H: usize = 32;

    let mut out: Vec<u8> = Vec::with_capacity(MAP_W * MAP_H + MAP_H);
    for y in 0..MAP_H {
        for x in 0..MAP_W {
            out.push(decode_screen_char(vram[map_offset + y * MAP_W + x]));
        }
        out.push(b'\n');
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn scrape_all_bg_text(bus: &Bus) -> String {
    // Check both tilemaps; substring search hits either.
    let t9800 = scrape_bg_tilemap_text(&bus.vram, 0x1800);
    let t9c00 = scrape_bg_tilemap_text(&bus.vram, 0x1C00);
    format!("{t9800}\n{t9c00}")
}

fn run_for_serial_result(
    cart: Cartridge,
    max_frames: Option<u64>,
    max_cycles: Option<u64>,
    pass_text: &[String],
    fail_text: &[String],
    print_vram: bool,
) -> (RomResult, Vec<u8>, u64, u64) {
    let mut gb = GameBoy::new(cart);
    gb.power_on_defaults();

    let mut frames: u64 = 0;
    let mut cycles: u64 = 0;
    let mut output: Vec<u8> = Vec::new();

    let screen_verdict = |gb: &GameBoy| -> Option<RomResult> {
        let screen_lower = scrape_all_bg_text(&gb.bus).to_ascii_lowercase();
        if contains_any(&screen_lower, fail_text) {
            return Some(RomResult::Fail);
        }
        if contains_any(&screen_lower, pass_text) {
            return Some(RomResult::Pass);
        }
        None
    };

    loop {
        if max_frames.is_some_and(|m| frames >= m) || max_cycles.is_some_and(|m| cycles >= m) {
            // Last chance: some ROMs only report their result on screen.
            let verdict = screen_verdict(&gb).unwrap_or(RomResult::Timeout);
            if verdict != RomResult::Pass && print_vram {
                println!(
                    "--- VRAM BG tilemap (on {}) ---\n{}",
                    verdict.as_str(),
                    scrape_all_bg_text(&gb.bus)
                );
            }
            return (verdict, output, frames, cycles);
        }

        cycles += gb.step() as u64;

        let new = gb.bus.serial.take_output();
        if !new.is_empty() {
            output.extend_from_slice(&new);
            let out_lower = String::from_utf8_lossy(&output).to_ascii_lowercase();
            if contains_any(&out_lower, fail_text) {
                if print_vram {
                    println!(
                        "--- VRAM BG tilemap (on FAIL) ---\n{}",
                        scrape_all_bg_text(&gb.bus)
                    );
                }
                return (RomResult::Fail, output, frames, cycles);
            }
            if contains_any(&out_lower, pass_text) {
                return (RomResult::Pass, output, frames, cycles);
            }
        }

        if gb.bus.ppu.frame_ready() {
            frames += 1;
            gb.bus.ppu.clear_frame_ready();

            // Screen scrape on early frames, then every few frames.
            if frames <= 3 || frames % 5 == 0 {
                if let Some(verdict) = screen_verdict(&gb) {
                    if verdict == RomResult::Fail && print_vram {
                        println!(
                            "--- VRAM BG tilemap (on FAIL) ---\n{}",
                            scrape_all_bg_text(&gb.bus)
                        );
                    }
                    return (verdict, output, frames, cycles);
                }
            }
        }
    }
}

fn make_self_test_rom() -> Vec<u8> {
    let mut rom = vec![0u8; 0x8000];

    // Entry point convention: execution starts at 0x0100; jump over the
    // header area.
    let start = 0x0150usize;
    rom[0x0100] = 0xC3; // JP a16
    rom[0x0101] = (start & 0xFF) as u8;
    rom[0x0102] = (start >> 8) as u8;

    let mut pc = start;
    for &b in b"Passed\n" {
        // LD A,d8 ; LD (0xFF01),A ; LD A,0x81 ; LD (0xFF02),A
        rom[pc] = 0x3E;
        rom[pc + 1] = b;
        rom[pc + 2] = 0xEA;
        rom[pc + 3] = 0x01;
        rom[pc + 4] = 0xFF;
        rom[pc + 5] = 0x3E;
        rom[pc + 6] = 0x81;
        rom[pc + 7] = 0xEA;
        rom[pc + 8] = 0x02;
        rom[pc + 9] = 0xFF;
        pc += 10;
    }
    // JR -2 (spin forever)
    rom[pc] = 0x18;
    rom[pc + 1] = 0xFE;

    rom
}

fn load_cartridge(path: &Path) -> Result<Cartridge, String> {
    let rom =
        std::fs::read(path).map_err(|e| format!("failed to read ROM {}: {e}", path.display()))?;
    Cartridge::from_rom(rom).map_err(|e| format!("invalid ROM {}: {e:?}", path.display()))
}

fn run_single(args: RunArgs) -> Result<i32, String> {
    let cart = load_cartridge(&args.rom_path)?;

    if args.verbose {
        eprintln!(
            "Loaded ROM: {} (title {:?}, type {:#04X}, {} bytes)",
            args.rom_path.display(),
            cart.header.title,
            cart.header.cartridge_type,
            cart.rom.len()
        );
    }

    let mut gb = GameBoy::new(cart);
    match &args.boot_rom_path {
        Some(path) => {
            let image = std::fs::read(path)
                .map_err(|e| format!("failed to read boot ROM {}: {e}", path.display()))?;
            gb.bus
                .load_boot_rom(&image)
                .map_err(|e| format!("invalid boot ROM {}: {e:?}", path.display()))?;
            // PC stays at 0x0000; the boot image hands over to the cartridge.
        }
        None => gb.power_on_defaults(),
    }

    let mut frames: u64 = 0;
    let mut cycles: u64 = 0;

    let mut last_ly: u8 = gb.bus.read8(0xFF44);
    let mut last_mode: u8 = gb.bus.read8(0xFF41) & 0x03;

    let mut serial_out: Vec<u8> = Vec::new();
    let mut stdout = std::io::stdout();

    while gb.cpu.running {
        if args.max_frames.is_some_and(|m| frames >= m)
            || args.max_cycles.is_some_and(|m| cycles >= m)
        {
            break;
        }

        if args.trace_cpu {
            let pc = gb.cpu.pc;
            let b0 = gb.bus.read8(pc);
            let b1 = gb.bus.read8(pc.wrapping_add(1));
            let b2 = gb.bus.read8(pc.wrapping_add(2));
            eprintln!(
                "CYC={cycles:010} PC={pc:04X} OP={b0:02X} {b1:02X} {b2:02X} AF={:04X} BC={:04X} DE={:04X} HL={:04X} SP={:04X} IME={} HALT={} IE={:02X} IF={:02X}",
                gb.cpu.af(),
                gb.cpu.bc(),
                gb.cpu.de(),
                gb.cpu.hl(),
                gb.cpu.sp,
                gb.cpu.ime,
                gb.cpu.halted,
                gb.bus.ie,
                gb.bus.iflag
            );
        }

        cycles += gb.step() as u64;

        if args.trace_ppu {
            let ly = gb.bus.read8(0xFF44);
            let mode = gb.bus.read8(0xFF41) & 0x03;
            if ly != last_ly || mode != last_mode {
                eprintln!("PPU ly={ly} mode={mode}");
                last_ly = ly;
                last_mode = mode;
            }
        }

        let batch: Vec<u8> = gb.bus.serial.drain_output().collect();
        if !batch.is_empty() {
            if args.log_serial {
                stdout
                    .write_all(&batch)
                    .and_then(|()| stdout.flush())
                    .map_err(|e| format!("failed to write serial output: {e}"))?;
            }
            if args.print_serial {
                serial_out.extend_from_slice(&batch);
            }
        }

        if gb.bus.ppu.frame_ready() {
            frames += 1;
            gb.bus.ppu.clear_frame_ready();

            if args.verbose {
                let checksum: u64 = gb
                    .bus
                    .ppu
                    .framebuffer()
                    .iter()
                    .fold(0u64, |acc, &px| acc.wrapping_mul(31).wrapping_add(px as u64));
                eprintln!("frame {frames} (cycles={cycles}) fb_checksum={checksum:#018x}");
            }
        }
    }

    if args.verbose {
        eprintln!("Done: frames={frames} cycles={cycles}");
    }
    if args.print_serial && !args.log_serial && !serial_out.is_empty() {
        print!("{}", String::from_utf8_lossy(&serial_out));
    }

    Ok(0)
}

fn run_suite(args: SuiteArgs) -> Result<i32, String> {
    let mut roms: Vec<PathBuf> = if args.rom_paths.is_empty() {
        discover_roms(&args.rom_dir)?
    } else {
        args.rom_paths
    };
    roms.sort();

    if roms.is_empty() {
        println!("No ROMs found. Use: dmg-cli suite --rom-dir <dir>  (or run: dmg-cli self-test)");
        return Ok(1);
    }

    let mut pass = 0usize;
    let mut fail = 0usize;
    let mut timeout = 0usize;

    for path in roms {
        let cart = match load_cartridge(&path) {
            Ok(c) => c,
            Err(e) => {
                println!("FAIL {} ({e})", path.display());
                fail += 1;
                continue;
            }
        };

        let (res, serial, frames, cycles) = run_for_serial_result(
            cart,
            args.max_frames,
            args.max_cycles,
            &args.pass_text,
            &args.fail_text,
            args.print_vram,
        );

        match res {
            RomResult::Pass => pass += 1,
            RomResult::Fail => fail += 1,
            RomResult::Timeout => timeout += 1,
        }

        println!(
            "{} {} (frames={frames} cycles={cycles})",
            res.as_str(),
            path.display()
        );

        if args.print_serial && !serial.is_empty() {
            print!("{}", String::from_utf8_lossy(&serial));
            if !serial.ends_with(b"\n") {
                println!();
            }
        }
    }

    println!("Summary: {pass} passed, {fail} failed, {timeout} timed out");

    if fail == 0 && timeout == 0 {
        Ok(0)
    } else {
        Ok(1)
    }
}

fn run_self_test(args: SelfTestArgs) -> Result<i32, String> {
    let rom = make_self_test_rom();
    let cart = Cartridge::from_rom(rom).map_err(|e| format!("invalid ROM: {e:?}"))?;

    let (res, serial, frames, cycles) = run_for_serial_result(
        cart,
        None,
        args.max_cycles,
        &args.pass_text,
        &args.fail_text,
        false,
    );

    println!(
        "{} self-test (frames={frames} cycles={cycles})",
        res.as_str()
    );
    if args.print_serial && !serial.is_empty() {
        print!("{}", String::from_utf8_lossy(&serial));
        if !serial.ends_with(b"\n") {
            println!();
        }
    }

    Ok(if res == RomResult::Pass { 0 } else { 1 })
}

fn run() -> Result<i32, String> {
    let cmd = parse_args()?;
    match cmd {
        Command::Run(a) => run_single(a),
        Command::Suite(a) => run_suite(a),
        Command::SelfTest(a) => run_self_test(a),
    }
}

fn main() {
    env_logger::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            print_usage();
            std::process::exit(1);
        }
    }
}
