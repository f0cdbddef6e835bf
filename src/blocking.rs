use core::{convert::Infallible, fmt::Debug};

use embedded_hal::{
    delay::DelayNs,
    digital::{Error as _, ErrorType as PinErrorType, OutputPin},
    spi::{Operation, SpiDevice},
};

use crate::{
    address::{Address, EraseSize, PAGE_SIZE, SECTOR_SIZE},
    check_bounds, check_erase,
    chip::ChipInfo,
    command::Command,
    error::Error,
    interface::{Clock, FlashInterface},
    poll::{PollOutcome, Poller, WaitStrategy},
    register::*,
    sequence::{self, Report},
};

/// Last kind of bus transaction issued to the chip
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Idle,
    Reading,
    Writing,
}

/// The generic low level MX25 driver, one method per command
pub struct MX25LowLevel<SPI> {
    spi: SPI,
    state: DeviceState,
}

fn addr_command(cmd: Command, addr: Address) -> [u8; 4] {
    let addr_val: u32 = addr.into();
    [
        cmd as u8,
        (addr_val >> 16) as u8,
        (addr_val >> 8) as u8,
        addr_val as u8,
    ]
}

impl<SPI, E> MX25LowLevel<SPI>
where
    SPI: SpiDevice<Error = E>,
{
    pub fn new(spi: SPI) -> Self {
        Self {
            spi,
            state: DeviceState::Idle,
        }
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn release(self) -> SPI {
        self.spi
    }

    fn command_write(&mut self, bytes: &[u8]) -> Result<(), E> {
        log::trace!("SPI>> {:02x?}", bytes);
        self.spi.write(bytes)?;
        self.state = DeviceState::Writing;
        Ok(())
    }

    fn write_read_base(&mut self, write: &[u8], read: &mut [u8]) -> Result<(), E> {
        self.spi
            .transaction(&mut [Operation::Write(write), Operation::Read(read)])?;
        log::trace!("SPI>> {:02x?} SPI<< {:02x?}", write, read);
        self.state = DeviceState::Reading;
        Ok(())
    }

    fn write_base(&mut self, cmd: &[u8], buff: &[u8]) -> Result<(), E> {
        log::trace!("SPI>> {:02x?} {} bytes", cmd, buff.len());
        self.spi
            .transaction(&mut [Operation::Write(cmd), Operation::Write(buff)])?;
        self.state = DeviceState::Writing;
        Ok(())
    }

    fn read_status_raw(&mut self) -> Result<u8, E> {
        let mut status = [0];
        self.write_read_base(&[Command::ReadStatus as u8], &mut status)?;
        Ok(status[0])
    }

    fn erase_raw(&mut self, size: EraseSize, addr: Address) -> Result<(), E> {
        let cmd = match size {
            EraseSize::Sector4K => Command::SectorErase,
            EraseSize::Block32K => Command::BlockErase32,
            EraseSize::Block64K => Command::BlockErase,
            EraseSize::Chip => return self.command_write(&[Command::ChipErase as u8]),
        };
        self.command_write(&addr_command(cmd, size.align(addr)))
    }

    /// Read n bytes from an addresss
    pub fn read(&mut self, addr: Address, buff: &mut [u8]) -> Result<(), Error<E>> {
        self.write_read_base(&addr_command(Command::Read, addr), buff)
            .map_err(Error::Spi)
    }

    /// Read n bytes quickly from an address
    pub fn read_fast(&mut self, addr: Address, buff: &mut [u8]) -> Result<(), Error<E>> {
        let [cmd, a2, a1, a0] = addr_command(Command::ReadF, addr);
        self.write_read_base(&[cmd, a2, a1, a0, Command::Dummy as u8], buff)
            .map_err(Error::Spi)
    }

    /// Write n bytes to a page. Write must be enabled, see `write_enable`
    pub fn write_page(&mut self, addr: Address, buff: &[u8]) -> Result<(), Error<E>> {
        self.issue_program(addr, buff).map_err(Error::Spi)
    }

    /// Erase the unit containing `addr`. Write must be enabled, see `write_enable`
    pub fn erase(&mut self, size: EraseSize, addr: Address) -> Result<(), Error<E>> {
        self.issue_erase(size, addr).map_err(Error::Spi)
    }

    /// Enable write operation
    pub fn write_enable(&mut self) -> Result<(), Error<E>> {
        self.issue_write_enable(true).map_err(Error::Spi)
    }

    /// Disable write
    pub fn write_disable(&mut self) -> Result<(), Error<E>> {
        self.issue_write_enable(false).map_err(Error::Spi)
    }

    /// Read the status register
    pub fn read_status(&mut self) -> Result<StatusRegister, Error<E>> {
        Ok(self.read_status_raw().map_err(Error::Spi)?.into())
    }

    /// Read the identification of the device
    pub fn read_identification(&mut self) -> Result<Identification, Error<E>> {
        let mut id = [0; 3];
        self.write_read_base(&[Command::ReadIdentification as u8], &mut id)
            .map_err(Error::Spi)?;
        Ok(Identification::new(id[0], id[1], id[2]))
    }

    /// Enable reset
    pub fn reset_enable(&mut self) -> Result<(), Error<E>> {
        self.command_write(&[Command::ResetEnable as u8])
            .map_err(Error::Spi)
    }

    /// Reset the chip, note that the chip must have reset enabled. See `reset_enable`
    pub fn reset(&mut self) -> Result<(), Error<E>> {
        self.command_write(&[Command::ResetMemory as u8])
            .map_err(Error::Spi)
    }
}

impl<SPI, E> FlashInterface for MX25LowLevel<SPI>
where
    SPI: SpiDevice<Error = E>,
{
    type Error = E;

    fn read_status_register(&mut self) -> Result<u8, E> {
        self.read_status_raw()
    }

    fn issue_write_enable(&mut self, enable: bool) -> Result<(), E> {
        let cmd = if enable {
            Command::WriteEnable
        } else {
            Command::WriteDisable
        };
        self.command_write(&[cmd as u8])
    }

    fn issue_program(&mut self, addr: Address, buff: &[u8]) -> Result<(), E> {
        self.write_base(&addr_command(Command::ProgramPage, addr), buff)
    }

    fn issue_erase(&mut self, size: EraseSize, addr: Address) -> Result<(), E> {
        self.erase_raw(size, addr)
    }
}

/// Stand-in for a reset or write protect line that is not wired to the MCU
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPin;

impl PinErrorType for NoPin {
    type Error = Infallible;
}

impl OutputPin for NoPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

/// How long [`MX25::reset_chip`] holds the reset line
pub const RESET_PULSE_MS: u32 = 100;

/// The higher level driver for an MX25 chip.
///
/// Owns the bus, the active-low reset and write protect lines, and the poller. Program and
/// erase go through [`crate::sequence`] and return a [`Report`] of every sub-step.
pub struct MX25<SPI, RST, WP, C, D> {
    ll: MX25LowLevel<SPI>,
    poller: Poller<C, D>,
    reset: RST,
    wp: WP,
    chip: ChipInfo,
    id: Identification,
}

impl<SPI, E, RST, WP, C, D> MX25<SPI, RST, WP, C, D>
where
    SPI: SpiDevice<Error = E>,
    RST: OutputPin,
    WP: OutputPin,
    C: Clock,
    D: DelayNs,
{
    /// Create a new instance for the `chip` part. Nothing is sent until [`Self::begin`].
    pub fn new(spi: SPI, reset: RST, wp: WP, clock: C, delay: D, chip: ChipInfo) -> Self {
        Self {
            ll: MX25LowLevel::new(spi),
            poller: Poller::new(clock, delay, chip.strategy),
            reset,
            wp,
            chip,
            id: Identification::new(0, 0, 0),
        }
    }

    /// Deassert the reset and write protect lines, identify the chip and check it is the
    /// expected part.
    pub fn begin(&mut self) -> Result<bool, Error<E>> {
        self.reset
            .set_high()
            .map_err(|e| Error::Gpio(e.kind()))?;
        self.wp.set_high().map_err(|e| Error::Gpio(e.kind()))?;

        let id = self.read_identities()?;
        let compatible = self.chip.matches(&id);
        log::debug!(
            "{}: id {:02x} {:02x} {:02x}, state {:?}, compatible {}",
            self.chip.name,
            id.manufacturer_id.0,
            id.memory_type.0,
            id.memory_density.0,
            self.ll.state(),
            compatible
        );
        Ok(compatible)
    }

    /// Read the JEDEC ids from the chip and keep them for the getters
    pub fn read_identities(&mut self) -> Result<Identification, Error<E>> {
        self.id = Identification::new(0, 0, 0);
        self.id = self.ll.read_identification()?;
        Ok(self.id)
    }

    pub fn identification(&self) -> Identification {
        self.id
    }

    pub fn manufacturer_id(&self) -> u8 {
        self.id.manufacturer_id.0
    }

    pub fn memory_type(&self) -> u8 {
        self.id.memory_type.0
    }

    pub fn memory_density(&self) -> u8 {
        self.id.memory_density.0
    }

    pub fn chip_name(&self) -> &'static str {
        self.chip.name
    }

    pub fn chip_definition(&self) -> &ChipInfo {
        &self.chip
    }

    /// Size in bytes
    pub fn memory_size(&self) -> u32 {
        self.chip.memory_size
    }

    pub fn state(&self) -> DeviceState {
        self.ll.state()
    }

    pub fn wait_strategy(&self) -> WaitStrategy {
        self.poller.strategy()
    }

    pub fn set_wait_strategy(&mut self, strategy: WaitStrategy) {
        self.poller.set_strategy(strategy);
    }

    /// Read the status register
    pub fn read_status(&mut self) -> Result<StatusRegister, Error<E>> {
        self.ll.read_status()
    }

    /// Read `buff.len()` bytes from `addr`. The buffer is zeroed first.
    pub fn read(&mut self, addr: Address, buff: &mut [u8], fast: bool) -> Result<(), Error<E>> {
        check_bounds(self.chip.memory_size as usize, addr.0, buff.len())?;
        buff.fill(0);
        if fast {
            self.ll.read_fast(addr, buff)
        } else {
            self.ll.read(addr, buff)
        }
    }

    /// Program `buff` at `addr`, within a single page. An empty `buff` is rejected.
    ///
    /// With `block` the call returns once WIP clears or its deadline passes. Errors are only
    /// returned for arguments rejected before anything is sent, the rest is in the report.
    pub fn write(
        &mut self,
        addr: Address,
        buff: &[u8],
        block: bool,
    ) -> Result<Report<E>, Error<E>> {
        if buff.is_empty() {
            return Err(Error::Value);
        }
        check_bounds(self.chip.memory_size as usize, addr.0, buff.len())?;
        if addr.page_offset() as usize + buff.len() > PAGE_SIZE as usize {
            return Err(Error::NotAligned);
        }
        Ok(sequence::program(
            &mut self.ll,
            &mut self.poller,
            &self.chip.timing,
            addr,
            buff,
            block,
        ))
    }

    /// Erase the `size` unit containing `addr`, write is disabled again afterwards.
    pub fn erase(
        &mut self,
        addr: Address,
        size: EraseSize,
        block: bool,
    ) -> Result<Report<E>, Error<E>> {
        if size != EraseSize::Chip && addr.0 >= self.chip.memory_size {
            return Err(Error::OutOfBounds);
        }
        Ok(sequence::erase(
            &mut self.ll,
            &mut self.poller,
            &self.chip.timing,
            size,
            addr,
            block,
        ))
    }

    /// Wait for a previous non blocking program or erase, `max_expected_us` being its
    /// nominal duration.
    pub fn wait_idle(&mut self, max_expected_us: u32) -> Result<PollOutcome, Error<E>> {
        self.poller
            .wait(&mut self.ll, PollTarget::IDLE, max_expected_us)
            .map_err(Error::Spi)
    }

    /// Hold the reset line low for [`RESET_PULSE_MS`]
    pub fn reset_chip(&mut self) -> Result<(), Error<E>> {
        self.reset.set_low().map_err(|e| Error::Gpio(e.kind()))?;
        self.poller.delay().delay_ms(RESET_PULSE_MS);
        self.reset.set_high().map_err(|e| Error::Gpio(e.kind()))
    }

    /// Reset through the reset-enable, reset-memory command pair
    pub fn software_reset(&mut self) -> Result<(), Error<E>> {
        self.ll.reset_enable()?;
        self.ll.reset()
    }

    /// Give back the bus, the pins, the clock and the delay
    pub fn release(self) -> (SPI, RST, WP, C, D) {
        let (clock, delay) = self.poller.release();
        (self.ll.release(), self.reset, self.wp, clock, delay)
    }
}

/// Largest erase unit starting at `addr` that fits in `left` bytes
fn largest_erase(addr: u32, left: u32) -> EraseSize {
    [EraseSize::Block64K, EraseSize::Block32K]
        .into_iter()
        .find(|size| {
            let len = size.size().unwrap_or(u32::MAX);
            addr % len == 0 && left >= len
        })
        .unwrap_or(EraseSize::Sector4K)
}

/// Implementation of the `NorFlash` trait of the `embedded_storage` crate. Every program and
/// erase waits for completion, a timeout surfaces as [`Error::Timeout`].
mod es {
    use super::*;
    use embedded_storage::nor_flash::{
        check_read, ErrorType, MultiwriteNorFlash, NorFlash, NorFlashError, NorFlashErrorKind,
        ReadNorFlash,
    };

    impl<E> From<NorFlashErrorKind> for Error<E> {
        fn from(e: NorFlashErrorKind) -> Self {
            match e {
                NorFlashErrorKind::NotAligned => Error::NotAligned,
                NorFlashErrorKind::OutOfBounds => Error::OutOfBounds,
                _ => Error::Value,
            }
        }
    }

    impl<SpiError> NorFlashError for Error<SpiError>
    where
        SpiError: Debug,
    {
        fn kind(&self) -> NorFlashErrorKind {
            match self {
                Error::OutOfBounds => NorFlashErrorKind::OutOfBounds,
                Error::NotAligned => NorFlashErrorKind::NotAligned,
                _ => NorFlashErrorKind::Other,
            }
        }
    }

    impl<SPI, RST, WP, C, D> ErrorType for MX25<SPI, RST, WP, C, D>
    where
        SPI: SpiDevice,
    {
        type Error = Error<SPI::Error>;
    }

    impl<SPI, RST, WP, C, D> ReadNorFlash for MX25<SPI, RST, WP, C, D>
    where
        SPI: SpiDevice,
        RST: OutputPin,
        WP: OutputPin,
        C: Clock,
        D: DelayNs,
    {
        const READ_SIZE: usize = 1;

        fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
            check_read(self, offset, bytes.len())?;
            MX25::read(self, Address(offset), bytes, true)
        }

        fn capacity(&self) -> usize {
            self.chip.memory_size as usize
        }
    }

    impl<SPI, RST, WP, C, D> NorFlash for MX25<SPI, RST, WP, C, D>
    where
        SPI: SpiDevice,
        RST: OutputPin,
        WP: OutputPin,
        C: Clock,
        D: DelayNs,
    {
        const WRITE_SIZE: usize = 1;
        const ERASE_SIZE: usize = SECTOR_SIZE as usize;

        fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
            check_erase(self.capacity(), from, to)?;
            let mut addr = from;
            while addr < to {
                let size = largest_erase(addr, to - addr);
                MX25::erase(self, Address(addr), size, true)?.into_result()?;
                addr += size.size().unwrap_or(SECTOR_SIZE);
            }
            Ok(())
        }

        fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
            check_bounds(self.capacity(), offset, bytes.len())?;
            let mut cursor = offset;
            let mut bytes = bytes;
            while !bytes.is_empty() {
                // Stay within the page, a program wraps around at the page end
                let page_left = (PAGE_SIZE - cursor % PAGE_SIZE) as usize;
                let (now, later) = bytes.split_at(page_left.min(bytes.len()));
                MX25::write(self, Address(cursor), now, true)?.into_result()?;
                cursor += now.len() as u32;
                bytes = later;
            }
            Ok(())
        }
    }

    impl<SPI, RST, WP, C, D> MultiwriteNorFlash for MX25<SPI, RST, WP, C, D>
    where
        SPI: SpiDevice,
        RST: OutputPin,
        WP: OutputPin,
        C: Clock,
        D: DelayNs,
    {
    }
}
