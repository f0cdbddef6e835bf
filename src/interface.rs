//! Capabilities the polling and sequencing layers need from the surrounding driver.
//!
//! [`crate::blocking::MX25LowLevel`] implements [`FlashInterface`] over an embedded-hal
//! `SpiDevice`. Anything else speaking the MX25 command set (a different bus, a simulator)
//! can implement it too and reuse [`crate::poll`] and [`crate::sequence`] unchanged.

use crate::address::{Address, EraseSize};

/// Raw command dispatch to the flash chip.
///
/// None of these confirm completion, the caller polls the status register for that.
pub trait FlashInterface {
    type Error;

    /// Single status register read
    fn read_status_register(&mut self) -> Result<u8, Self::Error>;

    /// Send write enable (`true`) or write disable (`false`)
    fn issue_write_enable(&mut self, enable: bool) -> Result<(), Self::Error>;

    /// Send a page program with its payload. Write enable must already be latched.
    fn issue_program(&mut self, addr: Address, buff: &[u8]) -> Result<(), Self::Error>;

    /// Send an erase of the unit containing `addr`. Write enable must already be latched.
    fn issue_erase(&mut self, size: EraseSize, addr: Address) -> Result<(), Self::Error>;
}

impl<T: FlashInterface + ?Sized> FlashInterface for &mut T {
    type Error = T::Error;

    fn read_status_register(&mut self) -> Result<u8, Self::Error> {
        T::read_status_register(self)
    }

    fn issue_write_enable(&mut self, enable: bool) -> Result<(), Self::Error> {
        T::issue_write_enable(self, enable)
    }

    fn issue_program(&mut self, addr: Address, buff: &[u8]) -> Result<(), Self::Error> {
        T::issue_program(self, addr, buff)
    }

    fn issue_erase(&mut self, size: EraseSize, addr: Address) -> Result<(), Self::Error> {
        T::issue_erase(self, size, addr)
    }
}

/// Monotonic microsecond time source used to measure wait deadlines.
///
/// The value must never go backwards. Its origin is irrelevant, only differences are used.
pub trait Clock {
    fn now_us(&mut self) -> u64;
}

impl<T: Clock + ?Sized> Clock for &mut T {
    fn now_us(&mut self) -> u64 {
        T::now_us(self)
    }
}
