//! Register bus contract.
//!
//! A [`RegisterBus`] moves 16-bit words to and from a device address. The
//! platform hands one out per operation (acquire), the caller uses it for a
//! single logical operation and drops it (release); a bus handle is never
//! shared between two unrelated operations.
//!
//! # Byte order
//!
//! Words cross the bus in SMBus word order: the register's low-order byte
//! is transferred first. PHY registers are defined most-significant byte
//! first, so a word read from the bus is the register value with its bytes
//! swapped. The driver converts with [`from_wire`] after every read and
//! [`to_wire`] before every write; all bit constants in [`crate::regs`] are
//! in register (PHY) order.

use crate::error::BusError;

/// Word-oriented access to devices on a transceiver's management bus.
pub trait RegisterBus {
    /// Reads the 16-bit word at `reg` of the device at `addr`, in wire order.
    fn read_word(&mut self, addr: u8, reg: u8) -> Result<u16, BusError>;

    /// Writes the 16-bit word `value`, already in wire order, to `reg`.
    fn write_word(&mut self, addr: u8, reg: u8, value: u16) -> Result<(), BusError>;
}

impl<B: RegisterBus + ?Sized> RegisterBus for &mut B {
    fn read_word(&mut self, addr: u8, reg: u8) -> Result<u16, BusError> {
        (**self).read_word(addr, reg)
    }

    fn write_word(&mut self, addr: u8, reg: u8, value: u16) -> Result<(), BusError> {
        (**self).write_word(addr, reg, value)
    }
}

impl<B: RegisterBus + ?Sized> RegisterBus for Box<B> {
    fn read_word(&mut self, addr: u8, reg: u8) -> Result<u16, BusError> {
        (**self).read_word(addr, reg)
    }

    fn write_word(&mut self, addr: u8, reg: u8, value: u16) -> Result<(), BusError> {
        (**self).write_word(addr, reg, value)
    }
}

/// Converts a word as carried on the bus into register order.
#[inline]
pub const fn from_wire(word: u16) -> u16 {
    word.swap_bytes()
}

/// Converts a register-order value into the word carried on the bus.
#[inline]
pub const fn to_wire(value: u16) -> u16 {
    value.swap_bytes()
}
