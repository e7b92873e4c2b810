//! Tick level simulation of the Intel MCS-4 chip set: the 4004 CPU and the
//! 4001 ROM, talking over the shared 4 bit multiplexed data bus.
//!
//! Unlike an instruction stepper, this crate reproduces the 8 phase machine
//! cycle one half-clock at a time. The CPU emits its 12 bit program counter
//! as three nibbles, the addressed ROM answers with the two opcode nibbles,
//! and the execution phases carry SRC/WRR/RDR traffic. Both chips run their
//! own state machines and stay in lockstep purely through the bus and the
//! SYNC line, the same way the real silicon did.
//!
//! ### Example
//! ```
//! use arbitrary_int::u4;
//! use mcs4::board::Board;
//!
//! // LDM 5, XCH r2
//! let mut board = Board::new(&[0xD5, 0xB2]);
//! for _ in 0..4 {
//!   board.run_cycle();
//! }
//! assert_eq!(board.cpu.scratch_register(2), u4::new(5));
//! ```
//!
//! Useful links:
//! * <http://e4004.szyc.org/>
//! * <https://pyntel4004.readthedocs.io/en/latest/intro/opcodes.html>

#![no_std]
#![forbid(unsafe_code)]

extern crate alloc;

use arbitrary_int::u4;
use bitbybit::bitfield;

/// 8 bit instruction opcode as it crosses the 4 bit bus.
#[bitfield(u8, default: 0)]
pub struct Byte {
  /// High nibble, the operation code (OPR).
  #[bits(4..=7, rw)]
  high: u4,

  /// Low nibble, the modifier (OPA).
  #[bits(0..=3, rw)]
  low: u4,
}

/// 12 bit program address.
#[bitfield(u16, default: 0)]
pub struct Address {
  /// Which ROM chip?
  #[bits(8..=11, rw)]
  chip_index: u4,

  /// High address nibble inside the chip.
  #[bits(4..=7, rw)]
  high: u4,

  /// Low address nibble inside the chip.
  #[bits(0..=3, rw)]
  low: u4,
}

pub mod bus;
pub mod register;
pub mod alu;
pub mod scratchpad;
pub mod addrstack;
pub mod instreg;
pub mod decoder;
pub mod cpu4004;
pub mod rom4001;
pub mod board;
