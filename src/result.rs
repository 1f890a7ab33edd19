use core::fmt::{Debug, Display, Formatter, Result as FmtResult};

/// Error type
#[derive(Debug, PartialEq, Eq)]
pub enum Error<E: Sized + Debug> {
    /// Wire never went high before a reset, shorted or missing pull-up
    WireFault,
    /// No presence pulse after a reset
    NoPresence,
    /// Computed and received CRC-8 differ
    CrcMismatch(u8, u8),
    /// Expected and actual family code differ
    FamilyCodeMismatch(u8, u8),
    PortError(E),
}

impl<E: Sized + Debug> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::PortError(e)
    }
}

impl<E: Sized + Debug> Display for Error<E> {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Error::WireFault => write!(f, "wire is held low"),
            Error::NoPresence => write!(f, "no presence pulse"),
            Error::CrcMismatch(computed, received) => write!(
                f,
                "crc mismatch: computed {:#04x}, received {:#04x}",
                computed, received
            ),
            Error::FamilyCodeMismatch(expected, actual) => write!(
                f,
                "family code mismatch: expected {:#04x}, got {:#04x}",
                expected, actual
            ),
            Error::PortError(e) => write!(f, "pin error: {:?}", e),
        }
    }
}
