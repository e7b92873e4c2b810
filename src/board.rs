//! The co-simulation board: one 4004, one shared bus, up to 16 ROMs.
//!
//! The board owns the external bus and steps every chip through the three
//! tick sub-steps in a fixed order, CPU first. Nothing else synchronizes
//! the chips; the CPU and the ROMs stay in lockstep purely through the bus
//! and the SYNC line, which is the point of the exercise.

use alloc::vec::Vec;
use arbitrary_int::u4;
use log::warn;

use crate::bus::Bus;
use crate::cpu4004::Cpu4004;
use crate::rom4001::Rom4001;

/// A 4004 system board.
pub struct Board {
  pub bus: Bus,
  pub cpu: Cpu4004,
  pub roms: Vec<Rom4001>,
}

impl Board {
  /// Build a board from a flat program image. Every 256 byte page becomes
  /// one ROM chip with the next ascending chip id; a short final page is
  /// zero padded.
  pub fn new(image: &[u8]) -> Self {
    let mut roms = Vec::new();
    for (page, chunk) in image.chunks(0x100).enumerate() {
      let mut data = [0u8; 0x100];
      data[..chunk.len()].copy_from_slice(chunk);
      roms.push(Rom4001::new(data, u4::new(page as u8)));
    }
    Self {
      bus: Bus::new("external"),
      cpu: Cpu4004::new(),
      roms,
    }
  }

  /// Reset every chip. ROM contents and the scratch pad survive.
  pub fn reset(&mut self) {
    self.bus.reset();
    self.cpu.reset();
    for rom in &mut self.roms {
      rom.reset();
    }
  }

  /// Combinational sub-step for every participant.
  pub fn calculate(&mut self) {
    self.cpu.calculate();
    for rom in &mut self.roms {
      rom.calculate();
    }
  }

  /// Latching sub-step. The ROMs sample the SYNC and CM-ROM lines as the
  /// CPU left them on the previous driving edge.
  pub fn clock_in(&mut self) {
    self.cpu.clock_in(&mut self.bus);
    let sync = self.cpu.sync();
    let cm_rom = self.cpu.cm_rom();
    for rom in &mut self.roms {
      rom.clock_in(&mut self.bus, sync, cm_rom);
    }
  }

  /// Driving sub-step. The shared bus resets first, so the write counter
  /// tells us exactly how many chips drove this tick.
  pub fn clock_out(&mut self) {
    self.bus.reset();
    self.cpu.clock_out(&mut self.bus);
    for rom in &mut self.roms {
      rom.clock_out(&mut self.bus);
    }
    if self.bus.writes() > 1 {
      warn!("Bus collision: {} writers on the {} bus in one tick",
        self.bus.writes(), self.bus.name());
    }
  }

  /// One half-clock: calculate, latch, drive.
  pub fn tick(&mut self) {
    self.calculate();
    self.clock_in();
    self.clock_out();
  }

  /// One full 8 phase instruction cycle.
  pub fn run_cycle(&mut self) {
    for _ in 0..8 {
      self.tick();
    }
  }
}
