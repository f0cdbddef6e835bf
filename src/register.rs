use bit::BitIndex;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManufacturerId(pub u8);

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryType(pub u8);

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryDensity(pub u8);

/// JEDEC identification as returned by the RDID command
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identification {
    pub manufacturer_id: ManufacturerId,
    pub memory_type: MemoryType,
    pub memory_density: MemoryDensity,
}

impl Identification {
    pub const fn new(manufacturer_id: u8, memory_type: u8, memory_density: u8) -> Self {
        Self {
            manufacturer_id: ManufacturerId(manufacturer_id),
            memory_type: MemoryType(memory_type),
            memory_density: MemoryDensity(memory_density),
        }
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRegister {
    pub write_protect_disable: bool,
    pub quad_enable: bool,
    pub protected_block: u8,
    pub write_enable_latch: bool,
    pub wip_bit: bool,
}

impl StatusRegister {
    /// Value of a single status bit
    pub fn bit(&self, bit: StatusBit) -> bool {
        match bit {
            StatusBit::Wel => self.write_enable_latch,
            StatusBit::Wip => self.wip_bit,
        }
    }
}

impl From<u8> for StatusRegister {
    fn from(val: u8) -> StatusRegister {
        StatusRegister {
            write_protect_disable: val.bit(7),
            quad_enable: val.bit(6),
            protected_block: val.bit_range(2..6),
            write_enable_latch: val.bit(1),
            wip_bit: val.bit(0),
        }
    }
}

/// Status register bits the driver waits on
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusBit {
    /// Write enable latch, set once a write enable has been accepted
    Wel,
    /// Write in progress, set while a program or erase runs
    Wip,
}

/// The bit and value a wait is expecting
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTarget {
    pub bit: StatusBit,
    pub value: bool,
}

impl PollTarget {
    /// Write enable latch set
    pub const WRITE_ENABLED: PollTarget = PollTarget {
        bit: StatusBit::Wel,
        value: true,
    };

    /// No program or erase running
    pub const IDLE: PollTarget = PollTarget {
        bit: StatusBit::Wip,
        value: false,
    };

    pub const fn new(bit: StatusBit, value: bool) -> Self {
        Self { bit, value }
    }

    pub fn matches(&self, status: u8) -> bool {
        StatusRegister::from(status).bit(self.bit) == self.value
    }
}
