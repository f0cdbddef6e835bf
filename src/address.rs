pub const BLOCK64_SIZE: u32 = 0x010000;
pub const BLOCK32_SIZE: u32 = BLOCK64_SIZE / 2;
pub const SECTOR_SIZE: u32 = 0x1000;
pub const PAGE_SIZE: u32 = 0x100;

/// A 32kB block address, containing 8 sectors
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Block32(pub u16);

/// A 64kB block address, containing 16 sector
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Block64(pub u16);

/// A sector id, containing 16 pages for a total of 4kB.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Sector(pub u16);

/// A page id within a sector, each page holds 256 bytes
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Page(pub u8);

/// An address on the memory chip
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Address(pub u32);

impl Address {
    /// Represents any address in memory.
    pub fn from_addr(sector: Sector, page: Page, offset: u8) -> Self {
        let addr = sector.0 as u32 * SECTOR_SIZE + page.0 as u32 * PAGE_SIZE + offset as u32;
        Address(addr)
    }

    /// Represents a specific page in memory.
    pub fn from_page(sector: Sector, page: Page) -> Self {
        Self::from_addr(sector, page, 0)
    }

    /// Represents a specific sector in memory.
    pub fn from_sector(sector: Sector) -> Self {
        Self::from_addr(sector, Page(0), 0)
    }

    /// Represents a specific 32kB block in memory.
    pub fn from_block32(block: Block32) -> Self {
        Address(block.0 as u32 * BLOCK32_SIZE)
    }

    /// Represents a specific 64kB block in memory.
    pub fn from_block64(block: Block64) -> Self {
        Address(block.0 as u32 * BLOCK64_SIZE)
    }

    /// Offset of this address inside its page
    pub fn page_offset(self) -> u32 {
        self.0 % PAGE_SIZE
    }
}

/// Granularity of an erase command
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EraseSize {
    /// 4kB sector erase
    Sector4K,
    /// 32kB block erase
    Block32K,
    /// 64kB block erase
    Block64K,
    /// Whole chip erase, the address is ignored
    Chip,
}

impl EraseSize {
    /// Number of bytes cleared, `None` for a chip erase since it depends on the part.
    pub const fn size(self) -> Option<u32> {
        match self {
            EraseSize::Sector4K => Some(SECTOR_SIZE),
            EraseSize::Block32K => Some(BLOCK32_SIZE),
            EraseSize::Block64K => Some(BLOCK64_SIZE),
            EraseSize::Chip => None,
        }
    }

    /// Start of the erase unit containing `addr`
    pub fn align(self, addr: Address) -> Address {
        match self.size() {
            Some(size) => Address(addr.0 - addr.0 % size),
            None => Address(0),
        }
    }
}

impl From<u16> for Block32 {
    fn from(block_id: u16) -> Block32 {
        Block32(block_id)
    }
}

impl From<u16> for Block64 {
    fn from(block_id: u16) -> Block64 {
        Block64(block_id)
    }
}

impl From<u16> for Sector {
    fn from(sector_id: u16) -> Sector {
        Sector(sector_id)
    }
}

impl From<u8> for Page {
    fn from(page_id: u8) -> Page {
        Page(page_id)
    }
}

impl From<u32> for Address {
    fn from(addr: u32) -> Address {
        Address(addr)
    }
}

impl From<Address> for u32 {
    fn from(addr: Address) -> u32 {
        addr.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_addresses() {
        assert_eq!(Address::from_block32(Block32(3)), Address(3 * 0x8000));
        assert_eq!(Address::from_block64(Block64(2)), Address(0x20000));
        assert_eq!(
            Address::from_addr(Sector(1), Page(2), 3),
            Address(0x1000 + 0x200 + 3)
        );
    }

    #[test]
    fn erase_alignment() {
        let addr = Address(0x1_2345);
        assert_eq!(EraseSize::Sector4K.align(addr), Address(0x1_2000));
        assert_eq!(EraseSize::Block32K.align(addr), Address(0x1_0000));
        assert_eq!(EraseSize::Block64K.align(addr), Address(0x1_0000));
        assert_eq!(EraseSize::Chip.align(addr), Address(0));
        assert_eq!(addr.page_offset(), 0x45);
    }
}
