use embedded_hal::digital::ErrorKind;

/// All possible errors emitted by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<SpiError> {
    /// Internal Spi error
    Spi(SpiError),

    /// A reset or write protect pin could not be driven
    Gpio(ErrorKind),

    /// Invalid value passed
    Value,

    /// Address out of bound
    OutOfBounds,

    /// Address not aligned, or a program would wrap around its page
    NotAligned,

    /// A status bit did not reach its expected value before the deadline
    Timeout,
}

#[cfg(feature = "defmt")]
impl<SpiError> defmt::Format for Error<SpiError> {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Spi(_) => defmt::write!(f, "Spi"),
            Error::Gpio(_) => defmt::write!(f, "Gpio"),
            Error::Value => defmt::write!(f, "Value"),
            Error::OutOfBounds => defmt::write!(f, "OutOfBounds"),
            Error::NotAligned => defmt::write!(f, "NotAligned"),
            Error::Timeout => defmt::write!(f, "Timeout"),
        }
    }
}
