use dmg_core::bus::Bus;
use dmg_core::cartridge::Cartridge;
use dmg_core::cpu::cpu::Flag;
use dmg_core::cpu::Cpu;

fn make_rom(program: &[u8]) -> Vec<u8> {
    let mut rom = vec![0u8; 0x8000];
    rom[..program.len()].copy_from_slice(program);
    rom
}

fn setup(program: &[u8]) -> (Cpu, Bus) {
    let cart = Cartridge::from_rom(make_rom(program)).unwrap();
    (Cpu::new(), Bus::new(cart))
}

fn assert_flags(cpu: &Cpu, z: bool, n: bool, h: bool, c: bool) {
    assert_eq!(cpu.flag(Flag::Z), z, "Z");
    assert_eq!(cpu.flag(Flag::N), n, "N");
    assert_eq!(cpu.flag(Flag::H), h, "H");
    assert_eq!(cpu.flag(Flag::C), c, "C");
}

#[test]
fn add_a_n_sets_znhc() {
    // Half-carry, no carry.
    let (mut cpu, mut bus) = setup(&[0xC6, 0x01]); // ADD A,0x01
    cpu.a = 0x0F;
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x10);
    assert_flags(&cpu, false, false, true, false);

    // Half-carry + carry + zero.
    let (mut cpu, mut bus) = setup(&[0xC6, 0x01]);
    cpu.a = 0xFF;
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x00);
    assert_flags(&cpu, true, false, true, true);
}

#[test]
fn adc_a_n_uses_carry_in() {
    let (mut cpu, mut bus) = setup(&[0xCE, 0x00]); // ADC A,0x00
    cpu.a = 0x0F;
    cpu.set_flag(Flag::C, true);
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x10);
    assert_flags(&cpu, false, false, true, false);

    let (mut cpu, mut bus) = setup(&[0xCE, 0x00]);
    cpu.a = 0xFF;
    cpu.set_flag(Flag::C, true);
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x00);
    assert_flags(&cpu, true, false, true, true);
}

#[test]
fn sub_a_n_sets_znhc() {
    let (mut cpu, mut bus) = setup(&[0xD6, 0x01]); // SUB A,0x01
    cpu.a = 0x10;
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x0F);
    assert_flags(&cpu, false, true, true, false);

    // Borrow all the way down: 0x00 - 0x01.
    let (mut cpu, mut bus) = setup(&[0xD6, 0x01]);
    cpu.a = 0x00;
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0xFF);
    assert_flags(&cpu, false, true, true, true);
}

#[test]
fn sbc_a_n_uses_carry_in() {
    let (mut cpu, mut bus) = setup(&[0xDE, 0x0F]); // SBC A,0x0F
    cpu.a = 0x10;
    cpu.set_flag(Flag::C, true);
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x00);
    assert_flags(&cpu, true, true, true, false);

    let (mut cpu, mut bus) = setup(&[0xDE, 0x00]);
    cpu.a = 0x00;
    cpu.set_flag(Flag::C, true);
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0xFF);
    assert_flags(&cpu, false, true, true, true);
}

#[test]
fn and_xor_or_flags() {
    let (mut cpu, mut bus) = setup(&[0xE6, 0x0F]); // AND 0x0F
    cpu.a = 0xF0;
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x00);
    assert_flags(&cpu, true, false, true, false);

    let (mut cpu, mut bus) = setup(&[0xEE, 0xFF]); // XOR 0xFF
    cpu.a = 0xFF;
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x00);
    assert_flags(&cpu, true, false, false, false);

    let (mut cpu, mut bus) = setup(&[0xF6, 0x00]); // OR 0x00
    cpu.a = 0x00;
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x00);
    assert_flags(&cpu, true, false, false, false);
}

#[test]
fn cp_a_n_sets_flags_without_changing_a() {
    let (mut cpu, mut bus) = setup(&[0xFE, 0x3C]); // CP 0x3C
    cpu.a = 0x3C;
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x3C);
    assert_flags(&cpu, true, true, false, false);

    let (mut cpu, mut bus) = setup(&[0xFE, 0x01]); // CP 0x01
    cpu.a = 0x00;
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x00);
    assert_flags(&cpu, false, true, true, true);
}

#[test]
fn inc_dec_r8_sets_znh_and_preserves_c() {
    let (mut cpu, mut bus) = setup(&[0x04]); // INC B
    cpu.b = 0x0F;
    cpu.set_flag(Flag::C, true);
    cpu.step(&mut bus);
    assert_eq!(cpu.b, 0x10);
    assert_flags(&cpu, false, false, true, true);

    let (mut cpu, mut bus) = setup(&[0x05]); // DEC B
    cpu.b = 0x10;
    cpu.set_flag(Flag::C, true);
    cpu.step(&mut bus);
    assert_eq!(cpu.b, 0x0F);
    assert_flags(&cpu, false, true, true, true);

    let (mut cpu, mut bus) = setup(&[0x04]);
    cpu.b = 0xFF;
    cpu.step(&mut bus);
    assert_eq!(cpu.b, 0x00);
    assert_flags(&cpu, true, false, true, false);

    let (mut cpu, mut bus) = setup(&[0x05]);
    cpu.b = 0x01;
    cpu.step(&mut bus);
    assert_eq!(cpu.b, 0x00);
    assert_flags(&cpu, true, true, false, false);
}

#[test]
fn add_hl_rr_uses_12bit_half_carry_threshold() {
    let (mut cpu, mut bus) = setup(&[0x09]); // ADD HL,BC
    cpu.set_hl(0x0FFF);
    cpu.set_bc(0x0001);
    cpu.set_flag(Flag::Z, true); // Z must survive
    cpu.step(&mut bus);
    assert_eq!(cpu.hl(), 0x1000);
    assert_flags(&cpu, true, false, true, false);

    let (mut cpu, mut bus) = setup(&[0x09]);
    cpu.set_hl(0xFFFF);
    cpu.set_bc(0x0001);
    cpu.step(&mut bus);
    assert_eq!(cpu.hl(), 0x0000);
    assert_flags(&cpu, false, false, true, true);
}

#[test]
fn add_sp_e8_uses_low_byte_thresholds() {
    let (mut cpu, mut bus) = setup(&[0xE8, 0x01]); // ADD SP,+1
    cpu.sp = 0x00FF;
    cpu.step(&mut bus);
    assert_eq!(cpu.sp, 0x0100);
    assert_flags(&cpu, false, false, true, true);

    // Negative offset: flags still come from low-byte unsigned addition.
    let (mut cpu, mut bus) = setup(&[0xE8, 0xFF]); // ADD SP,-1
    cpu.sp = 0x0000;
    cpu.step(&mut bus);
    assert_eq!(cpu.sp, 0xFFFF);
    assert_flags(&cpu, false, false, false, false);
}

#[test]
fn daa_corrects_bcd_addition() {
    // 0x45 + 0x38 = 0x7D; DAA folds it to BCD 0x83.
    let (mut cpu, mut bus) = setup(&[0xC6, 0x38, 0x27]); // ADD A,0x38 ; DAA
    cpu.a = 0x45;
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x7D);

    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x83);
    assert_flags(&cpu, false, false, false, false);

    // A set H flag forces the +0x06 adjustment even with a low nibble <= 9.
    let (mut cpu, mut bus) = setup(&[0xC6, 0x06, 0x27]); // ADD A,0x06 ; DAA
    cpu.a = 0x3A;
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x40);
    assert!(cpu.flag(Flag::H));

    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x46);
    assert_flags(&cpu, false, false, false, false);

    // 0x99 + 0x01 = 0x9A; DAA folds it to 0x00 with carry.
    let (mut cpu, mut bus) = setup(&[0xC6, 0x01, 0x27]);
    cpu.a = 0x99;
    cpu.step(&mut bus);
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x00);
    assert!(cpu.flag(Flag::Z));
    assert!(cpu.flag(Flag::C));
}

#[test]
fn daa_corrects_bcd_subtraction() {
    // 0x20 - 0x05 = 0x1B; DAA folds it to 0x15.
    let (mut cpu, mut bus) = setup(&[0xD6, 0x05, 0x27]); // SUB A,0x05 ; DAA
    cpu.a = 0x20;
    cpu.step(&mut bus);
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x15);
    assert!(cpu.flag(Flag::N));
    assert!(!cpu.flag(Flag::H));
}

#[test]
fn cpl_twice_restores_a_and_sets_nh() {
    let (mut cpu, mut bus) = setup(&[0x2F, 0x2F]); // CPL ; CPL
    cpu.a = 0x5A;
    cpu.set_flag(Flag::Z, true);
    cpu.set_flag(Flag::C, true);

    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0xA5);

    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x5A);
    assert_flags(&cpu, true, true, true, true);
}

#[test]
fn scf_then_ccf_clears_carry() {
    let (mut cpu, mut bus) = setup(&[0x37, 0x3F]); // SCF ; CCF
    cpu.step(&mut bus);
    assert_flags(&cpu, false, false, false, true);

    cpu.step(&mut bus);
    assert_flags(&cpu, false, false, false, false);
}

#[test]
fn rotate_a_clears_z_and_reports_carry_out() {
    let (mut cpu, mut bus) = setup(&[0x07]); // RLCA
    cpu.a = 0x80;
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x01);
    assert_flags(&cpu, false, false, false, true);

    let (mut cpu, mut bus) = setup(&[0x1F]); // RRA
    cpu.a = 0x01;
    cpu.set_flag(Flag::C, false);
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x00);
    // Z stays clear even for a zero result.
    assert_flags(&cpu, false, false, false, true);
}
