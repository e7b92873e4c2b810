//! The 4001 mask programmed ROM.
//!
//! 256 bytes of program, a hard wired 4 bit chip id, and four I/O port
//! lines. Up to 16 chips share the bus; the top address nibble picks which
//! one answers. The ROM has no window into the CPU: it runs its own 8 phase
//! counter, aligned by the SYNC pulse, and re-derives everything it needs
//! to know by watching the same bus cycles the CPU drives. Address nibbles
//! are latched during the address phases, the opcode goes back out during
//! the memory phases, and SRC/WRR/RDR traffic is picked up during the
//! execution phases.

use arbitrary_int::u4;
use log::{debug, trace};

use crate::bus::{Bus, Transceiver};
use crate::register::Register;
use crate::{Address, Byte};

// The two I/O opcodes this chip answers to. The ROM recognizes traffic by
// nibble matching only; it shares no decoder with the CPU.
const WRR: u8 = 0xE2;
const RDR: u8 = 0xEA;

/// Intel 4001 ROM chip.
pub struct Rom4001 {
  data: [u8; 0x100],
  chip_id: u4,
  /// Address latched from the three address phases.
  addr: Register,
  /// Opcode observed crossing the bus this frame.
  inst: Register,
  /// Output port register.
  port: Register,
  /// The port pins. The host reads WRR results here and parks RDR input.
  io_bus: Bus,
  bus_int: Bus,
  xcvr: Transceiver,
  clock_count: u8,
  sync_latched: bool,
  sync_seen: bool,
  /// This frame's fetch addresses this chip.
  chip_selected: bool,
  /// A SRC named this chip; the next I/O op is ours to serve.
  src_detected: bool,
  /// This frame's opcode is in the I/O row (0xE).
  io_op_detected: bool,
}

impl Rom4001 {
  /// Create a chip with its program and its metal-masked id.
  pub fn new(data: [u8; 0x100], chip_id: u4) -> Self {
    Self {
      data,
      chip_id,
      addr: Register::new(12, "ROM addr"),
      inst: Register::new(8, "ROM inst"),
      port: Register::new(4, "ROM port"),
      io_bus: Bus::new("ROM I/O"),
      bus_int: Bus::new("ROM internal"),
      xcvr: Transceiver::new(),
      clock_count: 0,
      sync_latched: false,
      sync_seen: false,
      chip_selected: false,
      src_detected: false,
      io_op_detected: false,
    }
  }

  #[inline]
  pub fn chip_id(&self) -> u4 {
    self.chip_id
  }

  /// Current value on the port pins.
  #[inline]
  pub fn read_ports(&self) -> u4 {
    self.io_bus.read()
  }

  /// Drive the port pins from the host side, for RDR to pick up.
  pub fn write_ports(&mut self, value: u4) {
    self.io_bus.reset();
    self.io_bus.write(value);
  }

  /// Forget the frame alignment; the chip idles until the next SYNC.
  pub fn reset(&mut self) {
    self.clock_count = 0;
    self.sync_latched = false;
    self.sync_seen = false;
    self.chip_selected = false;
    self.src_detected = false;
    self.io_op_detected = false;
    self.addr.write_direct(0);
    self.inst.write_direct(0);
  }

  /// Combinational sub-step. The ROM computes nothing ahead of its clock
  /// edges, but it runs the same tick protocol as every bus participant.
  pub fn calculate(&mut self) {}

  /// Latching sub-step. `sync` and `cm_rom` are the line states, true
  /// while the active-low signal is pulled down.
  pub fn clock_in(&mut self, bus: &mut Bus, sync: bool, cm_rom: bool) {
    self.sync_latched = sync;
    self.sync_seen |= sync;
    if !self.sync_seen {
      return;
    }

    match self.clock_count {
      0 => {
        self.xcvr.b_to_a(bus, &mut self.bus_int);
        self.addr.write_direct(self.bus_int.read().value() as u16);
      }
      1 => {
        self.xcvr.b_to_a(bus, &mut self.bus_int);
        let nibble = self.bus_int.read().value() as u16;
        self.addr.write_direct(self.addr.read_direct() | (nibble << 4));
      }
      2 => {
        self.xcvr.b_to_a(bus, &mut self.bus_int);
        let nibble = self.bus_int.read().value() as u16;
        self.addr.write_direct(self.addr.read_direct() | (nibble << 8));
        let addr = Address::new_with_raw_value(self.addr.read_direct());
        self.chip_selected = cm_rom && addr.chip_index() == self.chip_id;
        if self.chip_selected {
          trace!("ROM {:X}: selected for address {:03X}",
            self.chip_id.value(), self.addr.read_direct());
        }
      }
      3 => {
        // If we served this fetch, the internal bus already holds the
        // nibble we drove; otherwise snoop it off the shared bus
        if !self.chip_selected {
          self.xcvr.b_to_a(bus, &mut self.bus_int);
        }
        let high = self.bus_int.read().value();
        self.inst.write_direct((high as u16) << 4);
        self.io_op_detected = high == 0xE;
      }
      4 => {
        if !self.chip_selected {
          self.xcvr.b_to_a(bus, &mut self.bus_int);
        }
        let low = self.bus_int.read().value() as u16;
        self.inst.write_direct(self.inst.read_direct() | low);
      }
      6 => {
        self.xcvr.b_to_a(bus, &mut self.bus_int);
        let inst = Byte::new_with_raw_value(self.inst.read_direct() as u8);
        if inst.high().value() == 0x2 && inst.low().value() & 1 == 1 {
          // SRC: the first operand nibble names a chip
          let id = self.bus_int.read();
          self.src_detected = id == self.chip_id;
          if self.src_detected {
            trace!("ROM {:X}: addressed by SRC", self.chip_id.value());
          } else {
            debug!("ROM {:X}: SRC named chip {:X}, standing down",
              self.chip_id.value(), id.value());
          }
        } else if self.io_op_detected
          && self.inst.read_direct() as u8 == WRR
          && self.src_detected
        {
          self.port.write_from_bus(&self.bus_int);
          self.io_bus.reset();
          self.port.read_to_bus(&mut self.io_bus);
          trace!("ROM {:X}: WRR port = {:X}",
            self.chip_id.value(), self.port.read_direct());
        }
      }
      _ => {}
    }
  }

  /// Driving sub-step: serve opcode nibbles and RDR responses.
  pub fn clock_out(&mut self, bus: &mut Bus) {
    self.bus_int.reset();
    self.xcvr.disable();

    if self.sync_seen {
      match self.clock_count {
        7 | 0 | 1 => {
          // Turn toward the CPU, an address is coming
          self.xcvr.set_b_to_a();
        }
        2 | 3 => {
          if self.chip_selected {
            let offset = (self.addr.read_direct() & 0xFF) as usize;
            let byte = Byte::new_with_raw_value(self.data[offset]);
            let nibble = if self.clock_count == 2 { byte.high() } else { byte.low() };
            self.bus_int.write(nibble);
            self.xcvr.a_to_b(&self.bus_int, bus);
            if self.clock_count == 3 {
              trace!("ROM {:X}: served {:02X} from {:02X}",
                self.chip_id.value(), byte.raw_value(), offset);
            }
          }
        }
        5 => {
          if self.io_op_detected
            && self.inst.read_direct() as u8 == RDR
            && self.src_detected
          {
            self.port.write_direct(self.io_bus.read().value() as u16);
            self.port.read_to_bus(&mut self.bus_int);
            self.xcvr.a_to_b(&self.bus_int, bus);
            trace!("ROM {:X}: RDR port {:X}",
              self.chip_id.value(), self.port.read_direct());
          }
        }
        _ => {}
      }
    }

    if self.sync_latched {
      // Frame boundary: realign and forget this frame's opcode
      self.clock_count = 0;
      self.io_op_detected = false;
    } else {
      self.clock_count = (self.clock_count + 1) & 7;
    }
  }
}
