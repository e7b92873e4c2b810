//! The 16 scratch pad index registers.
//!
//! Sixteen 4 bit registers, addressed either singly (ADD, XCH, INC...) or
//! as eight even/odd pairs (FIM, SRC, FIN, JIN). All sixty four bits pack
//! into one `u64`, nibble by nibble. The selection index is not an
//! architectural register: every instruction that touches the scratch pad
//! selects before it reads or writes.

use arbitrary_int::u4;
use log::debug;

use crate::bus::Bus;

/// The scratch pad register file plus its selection index.
#[derive(Default)]
pub struct ScratchPad {
  /// 16 nibbles packed low-to-high.
  data: u64,
  index: u8,
}

impl ScratchPad {
  pub fn new() -> Self {
    Default::default()
  }

  /// Pick which register the bus operations address.
  #[inline]
  pub fn select(&mut self, index: u8) {
    self.index = index & 0xF;
  }

  #[inline]
  pub fn selected(&self) -> u8 {
    self.index
  }

  /// Read any register directly. Used by the debug dump and by tests.
  #[inline]
  pub fn register(&self, index: u8) -> u4 {
    u4::new(((self.data >> ((index & 0xF) * 4)) & 0xF) as u8)
  }

  #[inline]
  fn store(&mut self, index: u8, nibble: u4) {
    let shift = (index & 0xF) * 4;
    self.data &= !(0xF << shift);
    self.data |= (nibble.value() as u64) << shift;
  }

  /// Drive the selected register onto the bus.
  pub fn read_to_bus(&self, bus: &mut Bus) {
    bus.write(self.register(self.index));
  }

  /// Capture the bus nibble into the selected register.
  pub fn write_from_bus(&mut self, bus: &Bus) {
    self.store(self.index, bus.read());
  }

  /// Increment the selected register, wrapping at 16. No flags change.
  pub fn inc(&mut self) {
    let next = self.register(self.index).wrapping_add(u4::new(1));
    self.store(self.index, next);
  }

  /// Is the selected register zero? ISZ's condition check.
  #[inline]
  pub fn is_current_zero(&self) -> bool {
    self.register(self.index) == u4::new(0)
  }

  /// Dump all sixteen registers at debug level.
  pub fn log_registers(&self) {
    debug!("R0: {:X} R1: {:X} R2: {:X} R3: {:X} R4: {:X} R5: {:X} R6: {:X} R7: {:X}",
      self.register(0).value(), self.register(1).value(), self.register(2).value(), self.register(3).value(),
      self.register(4).value(), self.register(5).value(), self.register(6).value(), self.register(7).value());
    debug!("R8: {:X} R9: {:X} RA: {:X} RB: {:X} RC: {:X} RD: {:X} RE: {:X} RF: {:X}",
      self.register(8).value(), self.register(9).value(), self.register(10).value(), self.register(11).value(),
      self.register(12).value(), self.register(13).value(), self.register(14).value(), self.register(15).value());
  }
}
