//! The 4 bit data bus and the bidirectional bus transceiver.
//!
//! The MCS-4 multiplexed everything over four data lines: addresses go out
//! as three nibbles, opcodes come back as two, and the execution phases
//! reuse the same wires for I/O traffic. Nobody owns the bus. Whoever wrote
//! last wins, which is why the bus keeps a write counter: more than one
//! write between resets means two chips were driving at once.

use arbitrary_int::u4;

/// A 4 bit bus.
///
/// The bus holds a single nibble and counts how many times it was written
/// since the last reset. A count above one is a bus fight, which the board
/// surfaces as a warning but never treats as fatal.
///
/// ### Example
/// ```
/// use arbitrary_int::u4;
/// use mcs4::bus::Bus;
///
/// let mut bus = Bus::new("demo");
/// bus.write(u4::new(0xA));
/// assert_eq!(bus.read(), u4::new(0xA));
/// assert_eq!(bus.writes(), 1);
///
/// bus.reset();
/// assert_eq!(bus.read(), u4::new(0xF)); //floats high
/// assert_eq!(bus.writes(), 0);
/// ```
pub struct Bus {
  name: &'static str,
  value: u4,
  writes: u32,
}

impl Bus {
  /// Create a new bus. The name shows up in collision warnings.
  #[inline]
  pub fn new(name: &'static str) -> Self {
    Self {
      name,
      value: u4::new(0xF),
      writes: 0,
    }
  }

  #[inline]
  pub fn name(&self) -> &'static str {
    self.name
  }

  /// Drive a nibble onto the bus.
  #[inline]
  pub fn write(&mut self, value: u4) {
    self.value = value;
    self.writes += 1;
  }

  /// Read whatever the last writer left.
  #[inline]
  pub fn read(&self) -> u4 {
    self.value
  }

  /// How many writes happened since the last reset. More than one in a
  /// single drive window is a collision.
  #[inline]
  pub fn writes(&self) -> u32 {
    self.writes
  }

  /// Release the bus. The undriven lines float high.
  #[inline]
  pub fn reset(&mut self) {
    self.value = u4::new(0xF);
    self.writes = 0;
  }
}

/// Which way a [`Transceiver`] is currently passing data.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
  /// Disconnected from both buses.
  #[default]
  Disabled,
  /// Transferring from bus A to bus B.
  AToB,
  /// Transferring from bus B to bus A.
  BToA,
}

/// A bi-directional non-latching bus transceiver.
///
/// Couples two buses, copying a nibble across whenever a transfer fires.
/// The direction can also be declared without moving data, for the cycles
/// where a chip turns its pins around before the other side starts driving.
#[derive(Default)]
pub struct Transceiver {
  dir: Direction,
}

impl Transceiver {
  #[inline]
  pub fn new() -> Self {
    Default::default()
  }

  #[inline]
  pub fn dir(&self) -> Direction {
    self.dir
  }

  /// Disconnect from both buses. No copy happens this tick.
  #[inline]
  pub fn disable(&mut self) {
    self.dir = Direction::Disabled;
  }

  /// Copy the nibble on bus A over to bus B.
  #[inline]
  pub fn a_to_b(&mut self, a: &Bus, b: &mut Bus) {
    b.write(a.read());
    self.dir = Direction::AToB;
  }

  /// Copy the nibble on bus B over to bus A.
  #[inline]
  pub fn b_to_a(&mut self, b: &Bus, a: &mut Bus) {
    a.write(b.read());
    self.dir = Direction::BToA;
  }

  /// Point the transceiver A to B without copying anything yet.
  #[inline]
  pub fn set_a_to_b(&mut self) {
    self.dir = Direction::AToB;
  }

  /// Point the transceiver B to A without copying anything yet.
  #[inline]
  pub fn set_b_to_a(&mut self) {
    self.dir = Direction::BToA;
  }
}
