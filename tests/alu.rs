//! Direct tests of the arithmetic unit, driven over a private test bus the
//! same way the CPU core drives it.

use arbitrary_int::u4;

use mcs4::alu::{Alu, AluMode, FLAG_CARRY, FLAG_ZERO};
use mcs4::bus::Bus;

// Accumulator group sub-opcodes (low nibble of 0xFX).
const CLB: u8 = 0x0;
const CLC: u8 = 0x1;
const IAC: u8 = 0x2;
const CMC: u8 = 0x3;
const CMA: u8 = 0x4;
const RAL: u8 = 0x5;
const RAR: u8 = 0x6;
const TCC: u8 = 0x7;
const DAC: u8 = 0x8;
const TCS: u8 = 0x9;
const STC: u8 = 0xA;
const DAA: u8 = 0xB;
const KBP: u8 = 0xC;
const DCL: u8 = 0xD;

fn write_accumulator(alu: &mut Alu, bus: &mut Bus, val: u8) {
  bus.reset();
  bus.write(u4::new(val));
  alu.write_accumulator(bus);
  bus.reset();
}

fn write_temp(alu: &mut Alu, bus: &mut Bus, val: u8) {
  bus.reset();
  bus.write(u4::new(val));
  alu.write_temp(bus);
  bus.reset();
}

fn read_accumulator(alu: &Alu, bus: &mut Bus) -> u8 {
  bus.reset();
  alu.read_accumulator(bus);
  bus.read().value()
}

fn flags(alu: &Alu, bus: &mut Bus) -> u16 {
  bus.reset();
  alu.read_flags(bus);
  bus.read().value() as u16
}

#[test]
fn registers_move_through_the_bus() {
  let mut alu = Alu::new();
  let mut bus = Bus::new("test");

  // Fresh ALU: accumulator empty, so the zero flag reads set
  assert_eq!(flags(&alu, &mut bus), FLAG_ZERO);

  write_accumulator(&mut alu, &mut bus, 0x4);
  write_temp(&mut alu, &mut bus, 0x6);

  assert_eq!(read_accumulator(&alu, &mut bus), 0x4);
  bus.reset();
  alu.read_temp(&mut bus);
  assert_eq!(bus.read().value(), 0x6);
  assert_eq!(flags(&alu, &mut bus), 0);
}

#[test]
fn add_core_with_overflow() {
  let mut alu = Alu::new();
  let mut bus = Bus::new("test");

  write_accumulator(&mut alu, &mut bus, 0x9);
  write_temp(&mut alu, &mut bus, 0x6);

  alu.set_mode(AluMode::Add);
  alu.evaluate();
  bus.reset();
  alu.read_eval(&mut bus);
  alu.write_accumulator(&bus);
  assert_eq!(read_accumulator(&alu, &mut bus), 0xF);
  assert_eq!(flags(&alu, &mut bus), 0);

  // Second pass overflows
  alu.evaluate();
  bus.reset();
  alu.read_eval(&mut bus);
  alu.write_accumulator(&bus);
  assert_eq!(read_accumulator(&alu, &mut bus), (0x9 + 0x6 + 0x6) & 0xF);
  assert_eq!(flags(&alu, &mut bus), FLAG_CARRY);
}

#[test]
fn sub_core_sets_carry_on_no_borrow() {
  let mut alu = Alu::new();
  let mut bus = Bus::new("test");

  write_accumulator(&mut alu, &mut bus, 0x9);
  write_temp(&mut alu, &mut bus, 0x6);

  alu.set_mode(AluMode::Sub);
  alu.evaluate();
  bus.reset();
  alu.read_eval(&mut bus);
  alu.write_accumulator(&bus);
  assert_eq!(read_accumulator(&alu, &mut bus), 0x3);
  // No borrow happened, which reads as carry set
  assert_eq!(flags(&alu, &mut bus), FLAG_CARRY);
}

#[test]
fn sub_core_borrow_clears_carry() {
  let mut alu = Alu::new();
  let mut bus = Bus::new("test");

  write_accumulator(&mut alu, &mut bus, 0x3);
  write_temp(&mut alu, &mut bus, 0x6);

  alu.set_mode(AluMode::Sub);
  alu.evaluate();
  bus.reset();
  alu.read_eval(&mut bus);
  alu.write_accumulator(&bus);
  assert_eq!(read_accumulator(&alu, &mut bus), (3u8.wrapping_sub(6)) & 0xF);
  assert_eq!(flags(&alu, &mut bus), 0);
}

#[test]
fn sub_core_adds_one_when_carry_was_set() {
  let mut alu = Alu::new();
  let mut bus = Bus::new("test");

  write_accumulator(&mut alu, &mut bus, 0x5);
  write_temp(&mut alu, &mut bus, 0x3);
  alu.execute_acc_inst(STC);

  alu.set_mode(AluMode::Sub);
  alu.evaluate();
  bus.reset();
  alu.read_eval(&mut bus);
  // 5 - 3, plus one for the incoming carry
  assert_eq!(bus.read().value(), 0x3);
  assert_eq!(flags(&alu, &mut bus), FLAG_CARRY);
}

#[test]
fn clb_clears_accumulator_and_carry() {
  let mut alu = Alu::new();
  let mut bus = Bus::new("test");

  write_accumulator(&mut alu, &mut bus, 0x9);
  write_temp(&mut alu, &mut bus, 0x9);
  alu.set_mode(AluMode::Add);
  alu.evaluate();
  bus.reset();
  alu.read_eval(&mut bus);
  alu.write_accumulator(&bus);
  assert_eq!(flags(&alu, &mut bus), FLAG_CARRY);

  alu.execute_acc_inst(CLB);
  assert_eq!(read_accumulator(&alu, &mut bus), 0);
  assert_eq!(flags(&alu, &mut bus), FLAG_ZERO);
}

#[test]
fn clc_leaves_the_accumulator_alone() {
  let mut alu = Alu::new();
  let mut bus = Bus::new("test");

  write_accumulator(&mut alu, &mut bus, 0x2);
  alu.execute_acc_inst(STC);
  assert_eq!(flags(&alu, &mut bus), FLAG_CARRY);

  alu.execute_acc_inst(CLC);
  assert_eq!(flags(&alu, &mut bus), 0);
  assert_eq!(read_accumulator(&alu, &mut bus), 0x2);
}

#[test]
fn iac_wraps_and_carries() {
  let mut alu = Alu::new();
  let mut bus = Bus::new("test");

  write_accumulator(&mut alu, &mut bus, 0xE);
  alu.execute_acc_inst(IAC);
  assert_eq!(read_accumulator(&alu, &mut bus), 0xF);
  assert_eq!(flags(&alu, &mut bus), 0);

  alu.execute_acc_inst(IAC);
  assert_eq!(read_accumulator(&alu, &mut bus), 0);
  assert_eq!(flags(&alu, &mut bus), FLAG_CARRY | FLAG_ZERO);
}

#[test]
fn cmc_toggles_carry() {
  let mut alu = Alu::new();
  let mut bus = Bus::new("test");

  assert_eq!(flags(&alu, &mut bus), FLAG_ZERO);
  alu.execute_acc_inst(CMC);
  assert_eq!(flags(&alu, &mut bus), FLAG_ZERO | FLAG_CARRY);
  alu.execute_acc_inst(CMC);
  assert_eq!(flags(&alu, &mut bus), FLAG_ZERO);
}

#[test]
fn cma_is_its_own_inverse() {
  let mut alu = Alu::new();
  let mut bus = Bus::new("test");

  for val in 0..16u8 {
    write_accumulator(&mut alu, &mut bus, val);
    alu.execute_acc_inst(CMA);
    assert_eq!(read_accumulator(&alu, &mut bus), !val & 0xF);
    alu.execute_acc_inst(CMA);
    assert_eq!(read_accumulator(&alu, &mut bus), val);
  }
}

#[test]
fn ral_rotates_through_carry() {
  let mut alu = Alu::new();
  let mut bus = Bus::new("test");

  write_accumulator(&mut alu, &mut bus, 0xA);
  alu.execute_acc_inst(RAL);
  assert_eq!(read_accumulator(&alu, &mut bus), 0x4);
  assert_eq!(flags(&alu, &mut bus), FLAG_CARRY);

  alu.execute_acc_inst(RAL);
  // The old carry comes back in at the bottom
  assert_eq!(read_accumulator(&alu, &mut bus), 0x9);
  assert_eq!(flags(&alu, &mut bus), 0);
}

#[test]
fn rar_rotates_through_carry() {
  let mut alu = Alu::new();
  let mut bus = Bus::new("test");

  write_accumulator(&mut alu, &mut bus, 0x5);
  alu.execute_acc_inst(RAR);
  assert_eq!(read_accumulator(&alu, &mut bus), 0x2);
  assert_eq!(flags(&alu, &mut bus), FLAG_CARRY);

  alu.execute_acc_inst(RAR);
  assert_eq!(read_accumulator(&alu, &mut bus), 0x9);
  assert_eq!(flags(&alu, &mut bus), 0);
}

#[test]
fn ral_then_rar_restores_with_clear_carry() {
  let mut alu = Alu::new();
  let mut bus = Bus::new("test");

  for val in 0..8u8 {
    // Keep bit 3 clear so no carry is in flight between the two rotates
    write_accumulator(&mut alu, &mut bus, val);
    alu.execute_acc_inst(RAL);
    alu.execute_acc_inst(RAR);
    assert_eq!(read_accumulator(&alu, &mut bus), val);
  }
}

#[test]
fn tcc_moves_carry_into_accumulator() {
  let mut alu = Alu::new();
  let mut bus = Bus::new("test");

  write_accumulator(&mut alu, &mut bus, 0x5);
  alu.execute_acc_inst(TCC);
  assert_eq!(read_accumulator(&alu, &mut bus), 0);
  assert_eq!(flags(&alu, &mut bus), FLAG_ZERO);

  alu.execute_acc_inst(STC);
  alu.execute_acc_inst(TCC);
  assert_eq!(read_accumulator(&alu, &mut bus), 1);
  assert_eq!(flags(&alu, &mut bus), 0);
}

#[test]
fn dac_decrements_with_reversed_carry() {
  let mut alu = Alu::new();
  let mut bus = Bus::new("test");

  write_accumulator(&mut alu, &mut bus, 0x1);
  alu.execute_acc_inst(DAC);
  assert_eq!(read_accumulator(&alu, &mut bus), 0);
  // Carry set means no borrow
  assert_eq!(flags(&alu, &mut bus), FLAG_CARRY | FLAG_ZERO);

  alu.execute_acc_inst(CLC);
  alu.execute_acc_inst(DAC);
  assert_eq!(read_accumulator(&alu, &mut bus), 0xF);
  assert_eq!(flags(&alu, &mut bus), 0);
}

#[test]
fn tcs_loads_nine_or_ten() {
  let mut alu = Alu::new();
  let mut bus = Bus::new("test");

  alu.execute_acc_inst(TCS);
  assert_eq!(read_accumulator(&alu, &mut bus), 9);
  assert_eq!(flags(&alu, &mut bus), 0);

  alu.execute_acc_inst(STC);
  alu.execute_acc_inst(TCS);
  assert_eq!(read_accumulator(&alu, &mut bus), 10);
  assert_eq!(flags(&alu, &mut bus), 0);
}

#[test]
fn daa_adjusts_only_out_of_range_values() {
  let mut alu = Alu::new();
  let mut bus = Bus::new("test");

  write_accumulator(&mut alu, &mut bus, 0x1);
  alu.execute_acc_inst(DAA);
  assert_eq!(read_accumulator(&alu, &mut bus), 0x1);
  assert_eq!(flags(&alu, &mut bus), 0);

  write_accumulator(&mut alu, &mut bus, 0x9);
  alu.execute_acc_inst(DAA);
  assert_eq!(read_accumulator(&alu, &mut bus), 0x9);
  assert_eq!(flags(&alu, &mut bus), 0);

  write_accumulator(&mut alu, &mut bus, 0xB);
  alu.execute_acc_inst(DAA);
  assert_eq!(read_accumulator(&alu, &mut bus), 0x1);
  assert_eq!(flags(&alu, &mut bus), FLAG_CARRY);
}

#[test]
fn daa_with_carry_set_adds_six_and_keeps_carry() {
  let mut alu = Alu::new();
  let mut bus = Bus::new("test");

  write_accumulator(&mut alu, &mut bus, 0x2);
  alu.execute_acc_inst(STC);
  alu.execute_acc_inst(DAA);
  // In range, but the set carry still forces the +6; carry is never cleared
  assert_eq!(read_accumulator(&alu, &mut bus), 0x8);
  assert_eq!(flags(&alu, &mut bus), FLAG_CARRY);
}

#[test]
fn kbp_maps_one_hot_bits() {
  let mut alu = Alu::new();
  let mut bus = Bus::new("test");

  for val in 0..16u8 {
    write_accumulator(&mut alu, &mut bus, val);
    alu.execute_acc_inst(KBP);
    let expected = match val {
      0 | 1 | 2 => val,
      4 => 3,
      8 => 4,
      _ => 0xF,
    };
    assert_eq!(read_accumulator(&alu, &mut bus), expected, "KBP of {:X}", val);
  }
}

#[test]
fn dcl_latches_the_low_three_bits() {
  let mut alu = Alu::new();
  let mut bus = Bus::new("test");

  for val in 0..16u8 {
    write_accumulator(&mut alu, &mut bus, val);
    alu.execute_acc_inst(DCL);
    assert_eq!(alu.current_ram_bank(), val & 0x7);
    // The accumulator itself is untouched
    assert_eq!(read_accumulator(&alu, &mut bus), val);
  }
}

#[test]
fn unknown_sub_op_changes_nothing_but_refreshes_flags() {
  let mut alu = Alu::new();
  let mut bus = Bus::new("test");

  write_accumulator(&mut alu, &mut bus, 0x7);
  alu.execute_acc_inst(STC);
  alu.execute_acc_inst(0xE);
  assert_eq!(read_accumulator(&alu, &mut bus), 0x7);
  assert_eq!(flags(&alu, &mut bus), FLAG_CARRY);
}

#[test]
fn zero_flag_tracks_every_accumulator_write() {
  let mut alu = Alu::new();
  let mut bus = Bus::new("test");

  for val in 0..16u8 {
    write_accumulator(&mut alu, &mut bus, val);
    let f = flags(&alu, &mut bus);
    assert_eq!(f & FLAG_ZERO != 0, val == 0, "flags {:X} after load {:X}", f, val);
  }
}
