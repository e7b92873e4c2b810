//! The instruction decoder.
//!
//! Each half-clock the decoder recomputes a table of control flags from the
//! current phase and the instruction in flight; the CPU core then latches
//! and drives the datapath strictly according to that table. Keeping decode
//! separate from the datapath mirrors the real two-level structure of the
//! chip and makes every instruction's choreography visible as a plain
//! per-phase plan.
//!
//! An instruction cycle is 8 phases: three address nibbles out, a bus
//! turn-around, two opcode nibbles in (decode fires on the second), then
//! the two execution phases. Two cycle instructions park their opcode in a
//! pending slot and keep emitting flags while the second byte is fetched.

use log::{debug, info, trace};

/// Bus direction values of the `BusDir` flag.
pub const DIR_NONE: i8 = 0;
pub const DIR_IN: i8 = 1;
pub const DIR_OUT: i8 = 2;

/// ALU mode values of the `AluMode` flag.
pub const MODE_ADD: i8 = 1;
pub const MODE_SUB: i8 = 2;

// Opcode bases. FIM/SRC and FIN/JIN share an upper nibble and split on
// bit 0 of the OPA.
pub const NOP: u8 = 0x00;
pub const JCN: u8 = 0x10;
pub const FIM: u8 = 0x20;
pub const SRC: u8 = 0x21;
pub const FIN: u8 = 0x30;
pub const JIN: u8 = 0x31;
pub const JUN: u8 = 0x40;
pub const JMS: u8 = 0x50;
pub const INC: u8 = 0x60;
pub const ISZ: u8 = 0x70;
pub const ADD: u8 = 0x80;
pub const SUB: u8 = 0x90;
pub const LD: u8 = 0xA0;
pub const XCH: u8 = 0xB0;
pub const BBL: u8 = 0xC0;
pub const LDM: u8 = 0xD0;
pub const WRR: u8 = 0xE2;
pub const RDR: u8 = 0xEA;

/// Control signals emitted by the decoder. Names are contracts with the
/// CPU core, which consumes them in a fixed order every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Signal {
  /// Assert the SYNC output this tick.
  Sync,
  /// External bus direction: none / in / out.
  BusDir,
  /// Instruction register drives the bus; 1 = low nibble, 2 = high.
  InstRegOut,
  /// Latch the next instruction nibble off the bus.
  InstRegLoad,
  /// Program counter drives the bus (nibble picked by the phase).
  PcOut,
  /// Load a PC nibble from the bus; 1 = low, 2 = mid, 3 = high.
  PcLoad,
  /// Increment the program counter.
  PcInc,
  AccOut,
  AccLoad,
  /// Run an accumulator group instruction; -1 none, else the low nibble.
  AccInst,
  TempOut,
  TempLoad,
  /// ALU drives its output latch onto the bus.
  AluOut,
  /// Run the ALU add/sub core.
  AluEval,
  /// Latch the ALU mode; 1 = add, 2 = sub.
  AluMode,
  /// Select a scratch pad register; -1 means leave the selection alone.
  ScratchPadIndex,
  ScratchPadOut,
  ScratchPadLoad4,
  ScratchPadInc,
  StackPush,
  StackPop,
  /// The instruction register holds a full opcode, decode it.
  DecodeInstruction,
  /// Arm the JCN condition evaluator for the next decode.
  EvaluateJcn,
  /// Arm the ISZ condition evaluator for the next decode.
  EvaluateIsz,
}

pub const SIGNAL_COUNT: usize = Signal::EvaluateIsz as usize + 1;

/// One table entry: the value plus a changed marker for observers.
#[derive(Clone, Copy)]
pub struct Flag {
  pub value: i8,
  pub changed: bool,
}

/// Condition evaluator armed for the next decode of a two cycle jump.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
  #[default]
  None,
  Jcn,
  Isz,
}

pub struct Decoder {
  flags: [Flag; SIGNAL_COUNT],
  /// Phase about to be calculated, 0..7.
  clock_count: u8,
  /// Phase whose flags are currently driving, one tick behind.
  inst_phase: u8,
  sync_sent: bool,
  /// Instruction currently emitting flags. None while idle.
  current: Option<u8>,
  /// First byte of a two cycle instruction awaiting its second cycle.
  pending: Option<u8>,
  /// Block the frame end PC increment (jumps in progress).
  inhibit_pc_inc: bool,
  /// Keep the PC off the bus (FIN steals the address phases).
  inhibit_pc: bool,
  /// The X2 execution phase reads the bus instead of driving it.
  x2_is_read: bool,
  /// The X3 execution phase reads the bus instead of driving it.
  x3_is_read: bool,
  condition: Condition,
}

impl Decoder {
  pub fn new() -> Self {
    let mut decoder = Self {
      flags: [Flag { value: 0, changed: false }; SIGNAL_COUNT],
      clock_count: 0,
      inst_phase: 0,
      sync_sent: false,
      current: None,
      pending: None,
      inhibit_pc_inc: false,
      inhibit_pc: false,
      x2_is_read: false,
      x3_is_read: false,
      condition: Condition::None,
    };
    for i in 0..SIGNAL_COUNT {
      decoder.flags[i].value = Self::default_value(i);
    }
    decoder
  }

  pub fn reset(&mut self) {
    *self = Self::new();
  }

  #[inline]
  pub fn flag(&self, signal: Signal) -> i8 {
    self.flags[signal as usize].value
  }

  #[inline]
  pub fn flag_changed(&self, signal: Signal) -> bool {
    self.flags[signal as usize].changed
  }

  /// Phase the next `calculate_flags` call will compute, 0..7.
  #[inline]
  pub fn phase(&self) -> u8 {
    self.clock_count
  }

  /// Phase whose outputs are on the bus, one tick behind [`Self::phase`].
  #[inline]
  pub fn inst_phase(&self) -> u8 {
    self.inst_phase
  }

  #[inline]
  pub fn sync_sent(&self) -> bool {
    self.sync_sent
  }

  /// Arm a condition evaluator; fired by the core during clock-out.
  #[inline]
  pub fn install_condition(&mut self, condition: Condition) {
    self.condition = condition;
  }

  /// Hand over and clear the armed evaluator.
  #[inline]
  pub fn take_condition(&mut self) -> Condition {
    core::mem::take(&mut self.condition)
  }

  fn default_value(signal: usize) -> i8 {
    if signal == Signal::ScratchPadIndex as usize || signal == Signal::AccInst as usize {
      -1
    } else {
      0
    }
  }

  fn reset_flags(&mut self) {
    for i in 0..SIGNAL_COUNT {
      let default = Self::default_value(i);
      let flag = &mut self.flags[i];
      flag.changed = flag.value != default;
      flag.value = default;
    }
  }

  fn write_flag(&mut self, signal: Signal, value: i8) {
    let flag = &mut self.flags[signal as usize];
    flag.value = value;
    flag.changed = true; //Always marked so observers see rewrites too
    trace!("Flag {:?}={} at phase {}", signal, value, self.clock_count);
  }

  /// Advance to the next phase. Called on the driving edge, after the
  /// flags for the old phase were computed.
  pub fn clock(&mut self) {
    self.inst_phase = self.clock_count; //delayed by one clock
    self.clock_count = (self.clock_count + 1) & 7;
    if self.flag(Signal::Sync) == 1 {
      self.sync_sent = true;
    }
  }

  /// Combinational half of the tick: rebuild the flag table for the
  /// current phase.
  pub fn calculate_flags(&mut self) {
    self.reset_flags();

    if self.clock_count == 7 {
      // Startup: never increment before the first SYNC went out
      if self.sync_sent && !self.inhibit_pc_inc {
        self.write_flag(Signal::PcInc, 1);
      }
    }

    // A multi-phase instruction keeps emitting flags on every phase except
    // the decode phase itself, where set_current_instruction drives it
    if self.clock_count != 5 && self.current.is_some() {
      self.decode_current_instruction(false);
    }

    match self.clock_count {
      0 | 1 => {
        if !self.inhibit_pc {
          self.write_flag(Signal::PcOut, 1);
        }
        self.write_flag(Signal::BusDir, DIR_OUT);
      }
      2 => {
        self.write_flag(Signal::BusDir, DIR_OUT);
        self.write_flag(Signal::PcOut, 1);
      }
      3 => {} //Bus turn-around, everyone tri-states
      4 => {
        if self.sync_sent {
          self.write_flag(Signal::BusDir, DIR_IN);
          self.write_flag(Signal::InstRegLoad, 1);
        }
      }
      5 => {
        if self.sync_sent {
          self.write_flag(Signal::BusDir, DIR_IN);
          self.write_flag(Signal::InstRegLoad, 1);
          self.write_flag(Signal::DecodeInstruction, 1);
        }
      }
      6 => {
        if self.sync_sent {
          let dir = if self.x2_is_read { DIR_IN } else { DIR_OUT };
          self.write_flag(Signal::BusDir, dir);
        }
      }
      _ => {
        let dir = if self.x3_is_read { DIR_IN } else { DIR_OUT };
        self.write_flag(Signal::BusDir, dir);
        self.write_flag(Signal::Sync, 1);
      }
    }
  }

  /// Accept the freshly latched opcode, or resume the pending half of a
  /// two cycle instruction, and emit this phase's flags for it.
  pub fn set_current_instruction(&mut self, inst: u8, eval_result: bool) {
    match self.pending {
      Some(pending) => self.current = Some(pending),
      None => {
        if inst != NOP {
          debug!("Decoding instruction {:02X}", inst);
        }
        self.current = Some(inst);
        self.x2_is_read = false;
        self.x3_is_read = false;
      }
    }
    self.decode_current_instruction(eval_result);
  }

  fn decode_current_instruction(&mut self, eval_result: bool) {
    let inst = match self.current {
      Some(inst) => inst,
      None => return,
    };
    match inst & 0xF0 {
      0x00 => self.current = None, //NOP runs the baseline schedule only
      0x10 | 0x40 | 0x50 | 0x70 => self.plan_jump(inst, eval_result),
      0x20 => self.plan_fim_src(inst),
      0x30 => self.plan_fin_jin(inst),
      0x60 => self.plan_inc(inst),
      0x80 => self.plan_add_sub(inst, MODE_ADD),
      0x90 => self.plan_add_sub(inst, MODE_SUB),
      0xA0 => self.plan_ld(inst),
      0xB0 => self.plan_xch(inst),
      0xC0 => self.plan_bbl(inst),
      0xD0 => self.plan_ldm(inst),
      0xE0 => match inst {
        WRR => self.plan_wrr(),
        RDR => self.plan_rdr(),
        // RAM traffic belongs to the 4002, which is not on this board
        _ => self.current = None,
      },
      _ => self.plan_acc(inst),
    }
  }

  /// JCN, JUN, JMS and ISZ: fetch a second byte, then splice it into the
  /// PC nibble by nibble, unless a failed condition abandons the jump.
  fn plan_jump(&mut self, inst: u8, eval_result: bool) {
    let opr = inst & 0xF0;
    if self.pending.is_none() {
      // First cycle: save the low nibble (the high target bits, or the
      // JCN condition) and arm the evaluator
      match opr {
        JCN => self.write_flag(Signal::EvaluateJcn, 1),
        ISZ => self.write_flag(Signal::EvaluateIsz, 1),
        _ => {}
      }
      if self.clock_count == 5 {
        match opr {
          JCN => trace!("JCN {:X}", inst & 0xF),
          JUN => trace!("JUN {:X}", inst & 0xF),
          JMS => trace!("JMS {:X}", inst & 0xF),
          _ => trace!("ISZ R{:X}", inst & 0xF),
        }
        self.write_flag(Signal::InstRegOut, 1);
      } else if self.clock_count == 6 {
        if opr == ISZ {
          self.write_flag(Signal::ScratchPadIndex, (inst & 0xF) as i8);
          self.write_flag(Signal::ScratchPadInc, 1);
        } else {
          // Park the high target bits in the temp register
          self.write_flag(Signal::TempLoad, 1);
        }
        self.pending = Some(inst);
        self.current = None;
      }
    } else {
      // Second cycle, the address byte is in the instruction register
      if self.clock_count == 5 {
        let blocked = matches!(opr, JCN | ISZ) && !eval_result;
        if !blocked {
          self.inhibit_pc_inc = true;
          // Lowest 4 target bits out first
          self.write_flag(Signal::InstRegOut, 1);
        } else {
          info!("Conditional jump was not taken");
          self.pending = None;
          self.current = None;
        }
        if opr == JMS {
          // The pushed address still points at the second byte; the
          // frame end increment after BBL moves past it
          self.write_flag(Signal::StackPush, 1);
        }
      } else if self.clock_count == 6 {
        self.write_flag(Signal::PcLoad, 1);
        self.write_flag(Signal::InstRegOut, 2);
      } else if self.clock_count == 7 {
        self.write_flag(Signal::PcLoad, 2);
        self.write_flag(Signal::TempOut, 1);
      } else if self.clock_count == 0 {
        if opr == JUN || opr == JMS {
          // The low PC nibble is already going out for the next fetch,
          // but the high nibble leaves last and can still be replaced
          self.write_flag(Signal::PcLoad, 3);
        }
        self.pending = None;
        self.current = None;
        self.inhibit_pc_inc = false;
      }
    }
  }

  /// FIM fetches the next byte into a register pair; SRC sends a pair out
  /// over X2/X3 to address a ROM for the following I/O instruction.
  fn plan_fim_src(&mut self, inst: u8) {
    let even = (inst & 0xE) as i8;
    if inst & 1 == 0 {
      // FIM: ride along while the data byte is fetched, then capture its
      // nibbles as they cross the bus: high at phase 4, low at phase 5
      match self.clock_count {
        6 if self.pending.is_none() => {
          trace!("FIM R{:X}R{:X}", even, even + 1);
          self.pending = Some(inst);
        }
        4 if self.pending.is_some() => {
          self.write_flag(Signal::ScratchPadIndex, even + 1);
          self.write_flag(Signal::ScratchPadLoad4, 1);
        }
        5 if self.pending.is_some() => {
          self.write_flag(Signal::ScratchPadIndex, even);
          self.write_flag(Signal::ScratchPadLoad4, 1);
          self.pending = None;
          self.current = None;
        }
        _ => {}
      }
    } else {
      // SRC: even register first, it names the ROM chip
      if self.clock_count == 6 {
        trace!("SRC R{:X}R{:X}", even, even + 1);
        self.write_flag(Signal::ScratchPadIndex, even);
        self.write_flag(Signal::ScratchPadOut, 1);
      } else if self.clock_count == 7 {
        self.write_flag(Signal::ScratchPadIndex, even + 1);
        self.write_flag(Signal::ScratchPadOut, 1);
        self.current = None;
      }
    }
  }

  /// JIN jumps through a register pair; FIN steals the next fetch cycle to
  /// read ROM through pair 0 and load the result into a pair.
  fn plan_fin_jin(&mut self, inst: u8) {
    let even = (inst & 0xE) as i8;
    if inst & 1 == 1 {
      // JIN
      match self.clock_count {
        6 => {
          trace!("JIN R{:X}R{:X}", even, even + 1);
          self.write_flag(Signal::ScratchPadIndex, even);
          self.write_flag(Signal::ScratchPadOut, 1);
          self.inhibit_pc_inc = true;
        }
        7 => {
          self.write_flag(Signal::PcLoad, 1);
          self.write_flag(Signal::ScratchPadIndex, even + 1);
          self.write_flag(Signal::ScratchPadOut, 1);
        }
        0 => {
          self.write_flag(Signal::PcLoad, 2);
          self.current = None;
          self.inhibit_pc_inc = false;
        }
        _ => {}
      }
    } else {
      // FIN
      match self.clock_count {
        6 if self.pending.is_none() => {
          trace!("FIN R{:X}R{:X}", even, even + 1);
          // Hold the PC so the stolen cycle re-fetches through pair 0
          self.inhibit_pc_inc = true;
        }
        0 if self.pending.is_none() => {
          // Stolen cycle: pair 0 supplies the low address byte
          self.write_flag(Signal::ScratchPadIndex, 0);
          self.write_flag(Signal::ScratchPadOut, 1);
          self.inhibit_pc_inc = false;
          self.inhibit_pc = true;
          self.pending = Some(inst);
        }
        1 => {
          self.write_flag(Signal::ScratchPadIndex, 1);
          self.write_flag(Signal::ScratchPadOut, 1);
        }
        2 => {
          // The high address nibble is the PC's own page again
          self.inhibit_pc = false;
        }
        4 if self.pending.is_some() => {
          self.write_flag(Signal::ScratchPadIndex, even + 1);
          self.write_flag(Signal::ScratchPadLoad4, 1);
        }
        5 if self.pending.is_some() => {
          self.write_flag(Signal::ScratchPadIndex, even);
          self.write_flag(Signal::ScratchPadLoad4, 1);
          self.pending = None;
          self.current = None;
        }
        _ => {}
      }
    }
  }

  fn plan_xch(&mut self, inst: u8) {
    // Four phase swap through the temp register
    if self.clock_count == 5 {
      trace!("XCH R{:X}", inst & 0xF);
      self.write_flag(Signal::ScratchPadIndex, (inst & 0xF) as i8);
      self.write_flag(Signal::ScratchPadOut, 1);
    } else if self.clock_count == 6 {
      self.write_flag(Signal::TempLoad, 1);
      self.write_flag(Signal::AccOut, 1);
    } else if self.clock_count == 7 {
      self.write_flag(Signal::ScratchPadIndex, (inst & 0xF) as i8);
      self.write_flag(Signal::ScratchPadLoad4, 1);
      self.write_flag(Signal::TempOut, 1);
    } else if self.clock_count == 0 {
      self.write_flag(Signal::AccLoad, 1);
      self.current = None;
    }
  }

  fn plan_ldm(&mut self, inst: u8) {
    if self.clock_count == 5 {
      trace!("LDM {:X}", inst & 0xF);
      self.write_flag(Signal::InstRegOut, 1);
    } else if self.clock_count == 6 {
      self.write_flag(Signal::AccLoad, 1);
      self.current = None;
    }
  }

  fn plan_ld(&mut self, inst: u8) {
    if self.clock_count == 6 {
      trace!("LD R{:X}", inst & 0xF);
      self.write_flag(Signal::ScratchPadIndex, (inst & 0xF) as i8);
      self.write_flag(Signal::ScratchPadOut, 1);
    } else if self.clock_count == 7 {
      self.write_flag(Signal::AccLoad, 1);
      self.current = None;
    }
  }

  fn plan_inc(&mut self, inst: u8) {
    if self.clock_count == 6 {
      trace!("INC R{:X}", inst & 0xF);
      self.write_flag(Signal::ScratchPadIndex, (inst & 0xF) as i8);
      self.write_flag(Signal::ScratchPadInc, 1);
      self.current = None;
    }
  }

  fn plan_add_sub(&mut self, inst: u8, mode: i8) {
    if self.clock_count == 5 {
      if mode == MODE_ADD {
        trace!("ADD R{:X}", inst & 0xF);
      } else {
        trace!("SUB R{:X}", inst & 0xF);
      }
      self.write_flag(Signal::AluMode, mode);
      self.write_flag(Signal::ScratchPadIndex, (inst & 0xF) as i8);
      self.write_flag(Signal::ScratchPadOut, 1);
    } else if self.clock_count == 6 {
      self.write_flag(Signal::TempLoad, 1);
    } else if self.clock_count == 7 {
      self.write_flag(Signal::AluEval, 1);
      self.write_flag(Signal::AluOut, 1);
      self.write_flag(Signal::AccLoad, 1);
      self.current = None;
    }
  }

  fn plan_bbl(&mut self, inst: u8) {
    if self.clock_count == 6 {
      trace!("BBL {:X}", inst & 0xF);
      self.write_flag(Signal::StackPop, 1);
      // The immediate rides the low instruction nibble into the accumulator
      self.write_flag(Signal::InstRegOut, 1);
    } else if self.clock_count == 7 {
      self.write_flag(Signal::AccLoad, 1);
      self.current = None;
    }
  }

  fn plan_acc(&mut self, inst: u8) {
    if self.clock_count == 5 {
      self.write_flag(Signal::AccInst, (inst & 0xF) as i8);
      self.current = None;
    }
  }

  fn plan_wrr(&mut self) {
    if self.clock_count == 6 {
      trace!("WRR");
      self.write_flag(Signal::AccOut, 1);
      self.current = None;
    }
  }

  fn plan_rdr(&mut self) {
    if self.clock_count == 5 {
      trace!("RDR");
      // The ROM drives the bus through both execution phases
      self.x2_is_read = true;
      self.x3_is_read = true;
    } else if self.clock_count == 7 {
      self.write_flag(Signal::AccLoad, 1);
      self.current = None;
    }
  }
}

impl Default for Decoder {
  fn default() -> Self {
    Self::new()
  }
}
