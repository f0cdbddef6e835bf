/// Opcodes of the MX25 serial command set used by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum Command {
    Read = 0x03,
    ReadF = 0x0B,
    ProgramPage = 0x02,
    SectorErase = 0x20,
    BlockErase32 = 0x52,
    BlockErase = 0xD8,
    ChipErase = 0x60,
    WriteEnable = 0x06,
    WriteDisable = 0x04,
    ReadStatus = 0x05,
    ReadIdentification = 0x9F,
    ResetEnable = 0x66,
    ResetMemory = 0x99,
    Dummy = 0xFF,
}
