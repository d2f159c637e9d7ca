use thiserror::Error;

/// Errors raised by an I2C transport.
///
/// Only the open errors ever leave [`crate::transport::RegisterTransport`];
/// transfer failures are logged and swallowed there.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("cannot open I2C bus {bus}: {reason}")]
    BusUnavailable { bus: String, reason: String },

    #[error("cannot bind slave address 0x{address:02x} on {bus}: {reason}")]
    AddressBindFailed {
        bus: String,
        address: u8,
        reason: String,
    },

    #[error("{direction} transfer to 0x{address:02x} failed: {reason}")]
    TransferFailed {
        direction: Direction,
        address: u8,
        reason: String,
    },

    #[error("bus is not open")]
    NotOpen,

    #[error("register frame encoding failed: {0}")]
    Frame(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Write,
    Read,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Write => f.write_str("write"),
            Direction::Read => f.write_str("read"),
        }
    }
}

/// Errors returned by the device driver.
#[derive(Debug, Error)]
pub enum AdcError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("{0} has no comparator support")]
    ComparatorUnsupported(&'static str),
}

/// Errors raised while loading the daemon configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),

    #[error("invalid {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid device entry {0:?}, expected address:variant:mode")]
    DeviceEntry(String),

    #[error("I2C address 0x{0:02x} is outside the 7-bit range")]
    AddressRange(u16),
}
