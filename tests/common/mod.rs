//! Simulated MX25 chip on a virtual clock.
//!
//! The chip interprets the commands it receives over an embedded-hal `SpiDevice`, keeps a
//! memory array, and models WEL and WIP in virtual microseconds. Time only moves when the
//! driver sleeps through [`SimDelay`].

#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    convert::Infallible,
    rc::Rc,
};

use embedded_hal::{
    delay::DelayNs,
    digital::{ErrorType as PinErrorType, OutputPin},
    spi::{self, ErrorKind, Operation, SpiDevice},
};
use mx25::{blocking::MX25, chip::ChipInfo, interface::Clock};

pub const WRITE_ENABLE: u8 = 0x06;
pub const WRITE_DISABLE: u8 = 0x04;
pub const PROGRAM: u8 = 0x02;
pub const SECTOR_ERASE: u8 = 0x20;
pub const BLOCK32_ERASE: u8 = 0x52;
pub const BLOCK64_ERASE: u8 = 0xD8;
pub const RESET_ENABLE: u8 = 0x66;
pub const RESET_MEMORY: u8 = 0x99;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimError;

impl spi::Error for SimError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

pub struct Chip {
    pub time: Rc<Cell<u64>>,
    pub mem: Vec<u8>,
    pub id: [u8; 3],
    pub wel: bool,
    pub busy_until: u64,
    /// Opcode of every transaction, in order
    pub commands: Vec<u8>,
    /// Write enable is never latched
    pub stuck_wel: bool,
    /// Every transaction fails
    pub bus_broken: bool,
    pub program_us: u64,
    pub erase_us: u64,
    reset_enabled: bool,
    pub reset_high: Option<bool>,
    pub wp_high: Option<bool>,
    /// (low at, high at) of every reset pulse
    pub reset_pulses: Vec<(u64, Option<u64>)>,
}

impl Chip {
    fn now(&self) -> u64 {
        self.time.get()
    }

    fn busy(&self) -> bool {
        self.now() < self.busy_until
    }

    fn status(&self) -> u8 {
        ((self.wel as u8) << 1) | self.busy() as u8
    }

    fn addr(tx: &[u8]) -> usize {
        ((tx[1] as usize) << 16) | ((tx[2] as usize) << 8) | tx[3] as usize
    }

    fn respond(&self, tx: &[u8], rx: &mut [u8]) {
        match tx[0] {
            0x05 => rx.fill(self.status()),
            0x9F => rx.copy_from_slice(&self.id[..rx.len()]),
            0x03 | 0x0B => {
                let addr = Self::addr(tx);
                rx.copy_from_slice(&self.mem[addr..addr + rx.len()]);
            }
            _ => rx.fill(0),
        }
    }

    fn erase(&mut self, unit: usize, addr: usize) {
        let start = addr - addr % unit;
        self.mem[start..start + unit].fill(0xFF);
        self.wel = false;
        self.busy_until = self.now().saturating_add(self.erase_us);
    }

    fn execute(&mut self, tx: &[u8]) {
        let cmd = tx[0];
        self.commands.push(cmd);
        match cmd {
            WRITE_ENABLE => self.wel = !self.stuck_wel,
            WRITE_DISABLE => self.wel = false,
            PROGRAM if self.wel && !self.busy() => {
                let addr = Self::addr(tx);
                let page = addr - addr % 256;
                for (i, byte) in tx[4..].iter().enumerate() {
                    let at = page + (addr + i) % 256;
                    self.mem[at] &= byte;
                }
                self.wel = false;
                self.busy_until = self.now().saturating_add(self.program_us);
            }
            SECTOR_ERASE if self.wel && !self.busy() => self.erase(0x1000, Self::addr(tx)),
            BLOCK32_ERASE if self.wel && !self.busy() => self.erase(0x8000, Self::addr(tx)),
            BLOCK64_ERASE if self.wel && !self.busy() => self.erase(0x10000, Self::addr(tx)),
            0x60 if self.wel && !self.busy() => {
                let len = self.mem.len();
                self.erase(len, 0)
            }
            RESET_ENABLE => self.reset_enabled = true,
            RESET_MEMORY if self.reset_enabled => {
                self.wel = false;
                self.busy_until = 0;
                self.reset_enabled = false;
            }
            _ => {}
        }
    }

    /// Opcodes that change the array or the latch
    pub fn writes(&self) -> Vec<u8> {
        self.commands
            .iter()
            .copied()
            .filter(|c| *c != 0x05)
            .collect()
    }
}

#[derive(Clone)]
pub struct SimSpi(pub Rc<RefCell<Chip>>);

impl spi::ErrorType for SimSpi {
    type Error = SimError;
}

impl SpiDevice for SimSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), SimError> {
        let mut chip = self.0.borrow_mut();
        if chip.bus_broken {
            return Err(SimError);
        }
        let mut tx = Vec::new();
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => tx.extend_from_slice(bytes),
                Operation::Read(bytes) => chip.respond(&tx, bytes),
                Operation::Transfer(read, write) => {
                    tx.extend_from_slice(write);
                    chip.respond(&tx, read);
                }
                Operation::TransferInPlace(bytes) => {
                    tx.extend_from_slice(bytes);
                    chip.respond(&tx, bytes);
                }
                Operation::DelayNs(_) => {}
            }
        }
        chip.execute(&tx);
        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Line {
    Reset,
    WriteProtect,
}

pub struct SimPin(pub Rc<RefCell<Chip>>, pub Line);

impl SimPin {
    fn drive(&mut self, high: bool) {
        let mut chip = self.0.borrow_mut();
        let now = chip.now();
        match self.1 {
            Line::Reset => {
                if !high {
                    chip.reset_pulses.push((now, None));
                } else if let Some(pulse) = chip.reset_pulses.last_mut() {
                    if pulse.1.is_none() {
                        pulse.1 = Some(now);
                    }
                }
                chip.reset_high = Some(high);
            }
            Line::WriteProtect => chip.wp_high = Some(high),
        }
    }
}

impl PinErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.drive(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.drive(true);
        Ok(())
    }
}

pub struct SimClock(pub Rc<Cell<u64>>);

impl Clock for SimClock {
    fn now_us(&mut self) -> u64 {
        self.0.get()
    }
}

pub struct SimDelay(pub Rc<Cell<u64>>);

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0.set(self.0.get() + (ns as u64).div_ceil(1000));
    }

    fn delay_us(&mut self, us: u32) {
        self.0.set(self.0.get() + us as u64);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.0.set(self.0.get() + ms as u64 * 1000);
    }
}

pub type SimFlash = MX25<SimSpi, SimPin, SimPin, SimClock, SimDelay>;

/// A chip answering with `chip`'s ids, and a driver expecting `expected`
pub fn setup_with(chip: &ChipInfo, expected: ChipInfo) -> (Rc<RefCell<Chip>>, SimFlash) {
    let time = Rc::new(Cell::new(0));
    let sim = Rc::new(RefCell::new(Chip {
        time: time.clone(),
        mem: vec![0xFF; chip.memory_size as usize],
        id: [chip.manufacturer_id, chip.memory_type, chip.memory_density],
        wel: false,
        busy_until: 0,
        commands: Vec::new(),
        stuck_wel: false,
        bus_broken: false,
        program_us: 50,
        erase_us: 30_000,
        reset_enabled: false,
        reset_high: None,
        wp_high: None,
        reset_pulses: Vec::new(),
    }));
    let flash = MX25::new(
        SimSpi(sim.clone()),
        SimPin(sim.clone(), Line::Reset),
        SimPin(sim.clone(), Line::WriteProtect),
        SimClock(time.clone()),
        SimDelay(time),
        expected,
    );
    (sim, flash)
}

pub fn setup(chip: ChipInfo) -> (Rc<RefCell<Chip>>, SimFlash) {
    setup_with(&chip, chip)
}
