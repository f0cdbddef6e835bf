//! Chip definitions: identification, geometry and nominal timings.
//!
//! Timings are nominal maxima in microseconds. The adaptive poller allows 50% on top of them
//! before reporting a timeout.

use crate::{
    address::EraseSize,
    poll::WaitStrategy,
    register::{Identification, ManufacturerId, MemoryDensity, MemoryType},
};

/// Macronix JEDEC manufacturer id
pub const MACRONIX: u8 = 0xC2;

/// Fixed deadline polling of the single-part MX25R6435F driver: 1 s, sampled every 100 µs
pub const FIXED_TIMEOUT: WaitStrategy = WaitStrategy::fixed(1_000_000, 100);

/// Nominal maximum durations of the chip's internal operations, in microseconds
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Write enable latch settle (tWSR)
    pub t_wsr_us: u32,
    /// Byte program (tBP)
    pub t_bp_us: u32,
    /// Page program (tPP)
    pub t_pp_us: u32,
    /// 4kB sector erase (tSE)
    pub t_se_us: u32,
    /// 32kB block erase (tBE32)
    pub t_be32_us: u32,
    /// 64kB block erase (tBE)
    pub t_be64_us: u32,
    /// Chip erase (tCE)
    pub t_ce_us: u32,
}

impl Timing {
    /// Maximum expected duration of an erase of the given granularity
    pub const fn erase_max_us(&self, size: EraseSize) -> u32 {
        match size {
            EraseSize::Sector4K => self.t_se_us,
            EraseSize::Block32K => self.t_be32_us,
            EraseSize::Block64K => self.t_be64_us,
            EraseSize::Chip => self.t_ce_us,
        }
    }

    /// Maximum expected duration of programming `len` bytes within one page.
    ///
    /// tBP for a single byte, growing per byte up to tPP. Wider than a plain tBP budget for
    /// multi-byte programs.
    pub fn program_max_us(&self, len: usize) -> u32 {
        let len = len.max(1) as u32;
        self.t_bp_us.saturating_mul(len).min(self.t_pp_us)
    }

    const fn with_chip_erase(mut self, t_ce_us: u32) -> Self {
        self.t_ce_us = t_ce_us;
        self
    }
}

const MX25R_TIMING: Timing = Timing {
    t_wsr_us: 30_000,
    t_bp_us: 100,
    t_pp_us: 10_000,
    t_se_us: 240_000,
    t_be32_us: 3_000_000,
    t_be64_us: 3_500_000,
    t_ce_us: 240_000_000,
};

const MX25L_TIMING: Timing = Timing {
    t_wsr_us: 40_000,
    t_bp_us: 60,
    t_pp_us: 3_000,
    t_se_us: 400_000,
    t_be32_us: 1_000_000,
    t_be64_us: 2_000_000,
    t_ce_us: 150_000_000,
};

const MX25V_TIMING: Timing = Timing {
    t_wsr_us: 20_000,
    t_bp_us: 60,
    t_pp_us: 4_000,
    t_se_us: 240_000,
    t_be32_us: 1_500_000,
    t_be64_us: 2_000_000,
    t_ce_us: 20_000_000,
};

/// Everything the driver needs to know about a part
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipInfo {
    pub name: &'static str,
    pub manufacturer_id: u8,
    pub memory_type: u8,
    pub memory_density: u8,
    /// Size in bytes
    pub memory_size: u32,
    pub timing: Timing,
    /// How status bits are waited on for this family
    pub strategy: WaitStrategy,
}

impl ChipInfo {
    const fn macronix(
        name: &'static str,
        memory_type: u8,
        memory_density: u8,
        memory_size: u32,
        timing: Timing,
    ) -> Self {
        Self {
            name,
            manufacturer_id: MACRONIX,
            memory_type,
            memory_density,
            memory_size,
            timing,
            strategy: WaitStrategy::Adaptive,
        }
    }

    /// Same chip, waited on with another strategy
    pub const fn with_strategy(mut self, strategy: WaitStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub const fn identification(&self) -> Identification {
        Identification::new(self.manufacturer_id, self.memory_type, self.memory_density)
    }

    /// True when all three JEDEC ids match
    pub fn matches(&self, id: &Identification) -> bool {
        id.manufacturer_id == ManufacturerId(self.manufacturer_id)
            && id.memory_type == MemoryType(self.memory_type)
            && id.memory_density == MemoryDensity(self.memory_density)
    }
}

pub const MX25R512F: ChipInfo =
    ChipInfo::macronix("MX25R512F", 0x28, 0x10, 0x01_0000, MX25R_TIMING.with_chip_erase(6_000_000));
pub const MX25R1035F: ChipInfo =
    ChipInfo::macronix("MX25R1035F", 0x28, 0x11, 0x02_0000, MX25R_TIMING.with_chip_erase(8_000_000));
pub const MX25R2035F: ChipInfo = ChipInfo::macronix(
    "MX25R2035F",
    0x28,
    0x12,
    0x04_0000,
    MX25R_TIMING.with_chip_erase(15_000_000),
);
pub const MX25R4035F: ChipInfo = ChipInfo::macronix(
    "MX25R4035F",
    0x28,
    0x13,
    0x08_0000,
    MX25R_TIMING.with_chip_erase(30_000_000),
);
pub const MX25R8035F: ChipInfo = ChipInfo::macronix(
    "MX25R8035F",
    0x28,
    0x14,
    0x10_0000,
    MX25R_TIMING.with_chip_erase(60_000_000),
);
pub const MX25R1635F: ChipInfo = ChipInfo::macronix(
    "MX25R1635F",
    0x28,
    0x15,
    0x20_0000,
    MX25R_TIMING.with_chip_erase(120_000_000),
);
pub const MX25R3235F: ChipInfo = ChipInfo::macronix(
    "MX25R3235F",
    0x28,
    0x16,
    0x40_0000,
    MX25R_TIMING.with_chip_erase(180_000_000),
);
pub const MX25R6435F: ChipInfo =
    ChipInfo::macronix("MX25R6435F", 0x28, 0x17, 0x80_0000, MX25R_TIMING);
pub const MX25L12833F: ChipInfo =
    ChipInfo::macronix("MX25L12833F", 0x20, 0x18, 0x100_0000, MX25L_TIMING);
pub const MX25V8035F: ChipInfo =
    ChipInfo::macronix("MX25V8035F", 0x23, 0x14, 0x10_0000, MX25V_TIMING);

/// Every known part
pub const CHIPS: &[ChipInfo] = &[
    MX25R512F,
    MX25R1035F,
    MX25R2035F,
    MX25R4035F,
    MX25R8035F,
    MX25R1635F,
    MX25R3235F,
    MX25R6435F,
    MX25L12833F,
    MX25V8035F,
];

/// Find the definition matching a read identification
pub fn lookup(id: &Identification) -> Option<&'static ChipInfo> {
    CHIPS.iter().find(|chip| chip.matches(id))
}
