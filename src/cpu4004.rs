//! The 4004 CPU core.
//!
//! The core is a thin nervous system around the decoder: every tick it asks
//! the decoder for the control flag table, then latches (`clock_in`) and
//! drives (`clock_out`) the datapath in a fixed order. All data moves over
//! the internal 4 bit bus; the transceiver gates it onto the shared
//! external bus according to the `BusDir` flag.
//!
//! The tick protocol is `calculate` then `clock_in` then `clock_out`, the
//! same three sub-steps every participant on the board runs.

use arbitrary_int::u4;
use log::{debug, trace};

use crate::addrstack::AddressStack;
use crate::alu::{Alu, AluMode};
use crate::bus::{Bus, Transceiver};
use crate::decoder::{self, Condition, Decoder, Signal};
use crate::instreg::InstructionRegister;
use crate::scratchpad::ScratchPad;

/// Intel 4004 CPU.
pub struct Cpu4004 {
  alu: Alu,
  stack: AddressStack,
  scratch: ScratchPad,
  instreg: InstructionRegister,
  decoder: Decoder,
  /// Internal data bus; everything the decoder routes goes through here.
  bus_int: Bus,
  /// Gate between the internal and the shared external bus.
  xcvr: Transceiver,
  /// SYNC output. True while the active-low line is pulled down.
  sync: bool,
}

impl Cpu4004 {
  pub fn new() -> Self {
    Self {
      alu: Alu::new(),
      stack: AddressStack::new(),
      scratch: ScratchPad::new(),
      instreg: InstructionRegister::new(),
      decoder: Decoder::new(),
      bus_int: Bus::new("CPU internal"),
      xcvr: Transceiver::new(),
      sync: false,
    }
  }

  /// Hardware reset: PC, stack pointer, accumulator and carry to zero.
  /// The scratch pad keeps whatever it held. The phase logic re-arms so
  /// the decoder waits for its own first SYNC before fetching.
  pub fn reset(&mut self) {
    self.alu.reset();
    self.stack.reset();
    self.instreg.reset();
    self.decoder.reset();
    self.bus_int.reset();
    self.xcvr.disable();
    self.sync = false;
  }

  #[inline]
  pub fn pc(&self) -> u16 {
    self.stack.pc()
  }

  #[inline]
  pub fn accumulator(&self) -> u4 {
    self.alu.accumulator()
  }

  #[inline]
  pub fn carry(&self) -> bool {
    self.alu.carry()
  }

  #[inline]
  pub fn stack_pointer(&self) -> usize {
    self.stack.pointer()
  }

  #[inline]
  pub fn scratch_register(&self, index: u8) -> u4 {
    self.scratch.register(index)
  }

  /// The opcode byte currently latched.
  #[inline]
  pub fn instruction(&self) -> u8 {
    self.instreg.value()
  }

  /// Phase the next tick will calculate, 0..7.
  #[inline]
  pub fn phase(&self) -> u8 {
    self.decoder.phase()
  }

  /// SYNC line state. True means the active-low pulse is being driven.
  #[inline]
  pub fn sync(&self) -> bool {
    self.sync
  }

  /// CM-ROM select. This CPU keeps its one ROM bank enabled whenever it is
  /// running, so the line simply reads asserted.
  #[inline]
  pub fn cm_rom(&self) -> bool {
    true
  }

  #[inline]
  pub fn decoder(&self) -> &Decoder {
    &self.decoder
  }

  /// Dump the programmer visible state at debug level.
  pub fn log_registers(&self) {
    debug!("PC: {:03X} Acc: {:X} Carry: {} SP: {} Inst: {:02X}",
      self.pc(), self.accumulator().value(), self.carry(),
      self.stack_pointer(), self.instruction());
    self.scratch.log_registers();
  }

  /// Combinational sub-step: rebuild the control flags for this phase.
  pub fn calculate(&mut self) {
    self.decoder.calculate_flags();
  }

  /// Latching sub-step. Bus direction is applied before anything samples
  /// the internal bus, so a mid-transition nibble is never captured.
  pub fn clock_in(&mut self, bus: &mut Bus) {
    match self.decoder.flag(Signal::BusDir) {
      decoder::DIR_IN => self.xcvr.b_to_a(bus, &mut self.bus_int),
      decoder::DIR_OUT => self.xcvr.set_a_to_b(),
      _ => {}
    }

    self.apply_scratch_index();

    if self.decoder.flag(Signal::InstRegLoad) == 1 {
      self.instreg.write_from_bus(&self.bus_int);
    }

    if self.decoder.flag(Signal::DecodeInstruction) == 1 {
      let result = match self.decoder.take_condition() {
        Condition::Jcn => self.evaluate_jcn(),
        Condition::Isz => !self.scratch.is_current_zero(),
        Condition::None => false,
      };
      let inst = self.instreg.value();
      self.decoder.set_current_instruction(inst, result);
      // The decode may have picked a register for a load later this tick
      self.apply_scratch_index();
    }

    if self.decoder.flag(Signal::ScratchPadInc) == 1 {
      self.scratch.inc();
    }

    let acc_inst = self.decoder.flag(Signal::AccInst);
    if acc_inst >= 0 {
      self.alu.execute_acc_inst(acc_inst as u8);
    }

    match self.decoder.flag(Signal::AluMode) {
      decoder::MODE_ADD => self.alu.set_mode(AluMode::Add),
      decoder::MODE_SUB => self.alu.set_mode(AluMode::Sub),
      _ => {}
    }
    if self.decoder.flag(Signal::AluEval) == 1 {
      self.alu.evaluate();
    }
    if self.decoder.flag(Signal::AluOut) == 1 {
      self.alu.read_eval(&mut self.bus_int);
    }

    if self.decoder.flag(Signal::AccLoad) == 1 {
      self.alu.write_accumulator(&self.bus_int);
    }
    if self.decoder.flag(Signal::TempLoad) == 1 {
      self.alu.write_temp(&self.bus_int);
    }

    let pc_load = self.decoder.flag(Signal::PcLoad);
    if pc_load > 0 {
      self.stack.write_pc_nibble((pc_load - 1) as u8, &self.bus_int);
    }

    if self.decoder.flag(Signal::ScratchPadLoad4) == 1 {
      self.scratch.write_from_bus(&self.bus_int);
    }
  }

  /// Driving sub-step: advance the phase, route register outputs onto the
  /// internal bus, and gate it out if this phase drives the shared bus.
  pub fn clock_out(&mut self, bus: &mut Bus) {
    self.bus_int.reset();
    self.decoder.clock();
    self.xcvr.disable();

    if self.decoder.flag(Signal::Sync) == 1 {
      // Frame boundary: pull SYNC low and wind the instruction latch back
      self.sync = true;
      self.instreg.reset();
    } else {
      self.sync = false;
    }

    if self.decoder.flag(Signal::PcInc) == 1 {
      self.stack.inc_pc();
    }

    if self.decoder.flag(Signal::PcOut) == 1 {
      // The driving phase picks which address nibble goes out
      self.stack.read_pc_nibble(self.decoder.inst_phase(), &mut self.bus_int);
    }
    if self.decoder.flag(Signal::AccOut) == 1 {
      self.alu.read_accumulator(&mut self.bus_int);
    }
    if self.decoder.flag(Signal::TempOut) == 1 {
      self.alu.read_temp(&mut self.bus_int);
    }
    if self.decoder.flag(Signal::ScratchPadOut) == 1 {
      self.scratch.read_to_bus(&mut self.bus_int);
    }
    let inst_out = self.decoder.flag(Signal::InstRegOut);
    if inst_out > 0 {
      self.instreg.read_nibble((inst_out - 1) as u8, &mut self.bus_int);
    }

    match self.decoder.flag(Signal::BusDir) {
      decoder::DIR_OUT => self.xcvr.a_to_b(&self.bus_int, bus),
      decoder::DIR_IN => self.xcvr.set_b_to_a(),
      _ => {}
    }

    if self.decoder.flag(Signal::StackPush) == 1 {
      self.stack.push();
    }
    if self.decoder.flag(Signal::StackPop) == 1 {
      self.stack.pop();
    }

    if self.decoder.flag(Signal::EvaluateJcn) == 1 {
      self.decoder.install_condition(Condition::Jcn);
    }
    if self.decoder.flag(Signal::EvaluateIsz) == 1 {
      self.decoder.install_condition(Condition::Isz);
    }
  }

  fn apply_scratch_index(&mut self) {
    let index = self.decoder.flag(Signal::ScratchPadIndex);
    if index >= 0 {
      self.scratch.select(index as u8);
    }
  }

  /// JCN condition nibble, parked in temp by the first cycle.
  /// Bit 0 is the TEST pin (tied inactive here), bit 1 tests carry,
  /// bit 2 tests accumulator-zero, bit 3 inverts the whole thing.
  fn evaluate_jcn(&self) -> bool {
    let cond = self.alu.temp().value();
    let carry_cond = cond & 0x2 != 0;
    let zero_cond = cond & 0x4 != 0;
    let invert = cond & 0x8 != 0;
    let carry = self.alu.carry();
    let zero = self.alu.is_accumulator_zero();
    let taken = if invert {
      (carry_cond && !carry) || (zero_cond && !zero)
    } else {
      (!carry_cond || carry) && (!zero_cond || zero)
    };
    trace!("JCN cond {:X}: carry={} zero={} -> {}", cond, carry, zero,
      if taken { "jump" } else { "no jump" });
    taken
  }
}

impl Default for Cpu4004 {
  fn default() -> Self {
    Self::new()
  }
}
