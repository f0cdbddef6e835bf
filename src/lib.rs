#![cfg_attr(not(test), no_std)]
//! This is a platform agnostic library for the Macronix MX25 NOR flash series using [embedded-hal](https://github.com/rust-embedded/embedded-hal).
//!
//! The driver is split in layers:
//! * [`blocking::MX25LowLevel`] speaks the command set over an embedded-hal `SpiDevice`.
//! * [`poll::Poller`] waits for the WEL and WIP status bits with a bounded, backing-off poll.
//! * [`sequence`] composes write enable, the command and the completion wait into one operation.
//! * [`blocking::MX25`] owns the pins, identifies the chip and exposes read/write/erase/reset.
//!
//! Chip definitions for the supported parts live in [`chip`], e.g.
//! * [MX25R6435F](https://www.macronix.com/Lists/Datasheet/Attachments/7913/MX25R6435F,%20Wide%20Range,%2064Mb,%20v1.5.pdf)
//! * [MX25R3235F](https://www.macronix.com/Lists/Datasheet/Attachments/7966/MX25R3235F,%20Wide%20Range,%2032Mb,%20v1.8.pdf)
//! * [MX25R1635F](https://www.macronix.com/Lists/Datasheet/Attachments/7595/MX25R1635F,%20Wide%20Range,%2016Mb,%20v1.6.pdf)
//!
//! The driver is blocking and non-reentrant. Waits busy-sleep on the calling thread through
//! [`embedded_hal::delay::DelayNs`], and deadlines are measured with a [`interface::Clock`].

pub mod address;
pub mod blocking;
pub mod chip;
mod command;
pub mod error;
pub mod interface;
pub mod poll;
pub mod register;
pub mod sequence;

pub use crate::address::{BLOCK32_SIZE, BLOCK64_SIZE, PAGE_SIZE, SECTOR_SIZE};
use crate::error::Error;

pub(crate) fn check_erase<E>(capacity: usize, from: u32, to: u32) -> Result<(), Error<E>> {
    let capacity = capacity as u32;
    if from > to || to > capacity {
        return Err(Error::OutOfBounds);
    }
    if from % SECTOR_SIZE != 0 || to % SECTOR_SIZE != 0 {
        return Err(Error::NotAligned);
    }
    Ok(())
}

pub(crate) fn check_bounds<E>(capacity: usize, offset: u32, length: usize) -> Result<(), Error<E>> {
    let capacity = capacity as u32;
    let length = length as u32;
    if length > capacity || offset > capacity - length {
        return Err(Error::OutOfBounds);
    }
    Ok(())
}
