//! Register transport.
//!
//! Every register access is an independent open / transfer / close
//! transaction; no bus handle is kept between calls. Open failures are
//! returned to the caller, transfer failures are logged and the access
//! carries on with whatever data it got.

pub mod linux;
pub mod mock;

use std::thread;
use std::time::Duration;

use log::{error, trace, warn};

use crate::error::TransportError;
use crate::registers::{RegisterWrite, decode_register};

pub use linux::LinuxI2c;
pub use mock::MockI2c;

/// Attempts made to open the bus and bind the address before giving up.
pub const OPEN_ATTEMPTS: u32 = 3;
/// Pause between open attempts.
pub const OPEN_BACKOFF: Duration = Duration::from_millis(1);

/// Raw byte transport to a single I2C slave.
pub trait I2cTransport {
    /// Acquire `bus` and bind `address` as the target of later transfers.
    fn open(&mut self, bus: &str, address: u8) -> Result<(), TransportError>;

    /// Plain write to the bound slave.
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Plain read from the bound slave.
    fn read(&mut self, buf: &mut [u8]) -> Result<(), TransportError>;

    /// Release the bus. Must be safe to call when nothing is open.
    fn close(&mut self);
}

/// Open bus, closed again when dropped.
struct Session<'a, T: I2cTransport> {
    transport: &'a mut T,
}

impl<T: I2cTransport> Drop for Session<'_, T> {
    fn drop(&mut self) {
        self.transport.close();
    }
}

/// 16-bit register access to one chip on one bus.
#[derive(Debug)]
pub struct RegisterTransport<T> {
    transport: T,
    bus: String,
    address: u8,
}

impl<T: I2cTransport> RegisterTransport<T> {
    pub fn new(transport: T, bus: impl Into<String>, address: u8) -> Self {
        Self {
            transport,
            bus: bus.into(),
            address,
        }
    }

    pub fn bus(&self) -> &str {
        &self.bus
    }

    pub fn set_bus(&mut self, bus: impl Into<String>) {
        self.bus = bus.into();
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Write `value` to register `reg`: pointer byte then value, high byte first.
    pub fn write_register(&mut self, reg: u8, value: u16) -> Result<(), TransportError> {
        let frame = RegisterWrite {
            pointer: reg,
            value,
        }
        .encode()?;
        let address = self.address;
        let mut session = self.begin()?;

        trace!("0x{:02x} <- reg 0x{:02x} = 0x{:04x}", address, reg, value);
        if let Err(e) = session.transport.write(&frame) {
            error!("write of reg 0x{:02x} failed: {}", reg, e);
        }
        Ok(())
    }

    /// Read register `reg`. Bytes that could not be read come back as zero.
    pub fn read_register(&mut self, reg: u8) -> Result<u16, TransportError> {
        let address = self.address;
        let mut session = self.begin()?;

        if let Err(e) = session.transport.write(&[reg]) {
            error!("pointer write for reg 0x{:02x} failed: {}", reg, e);
        }
        let mut buf = [0u8; 2];
        if let Err(e) = session.transport.read(&mut buf) {
            error!("read of reg 0x{:02x} failed: {}", reg, e);
        }
        drop(session);

        let value = decode_register(buf)?;
        trace!("0x{:02x} -> reg 0x{:02x} = 0x{:04x}", address, reg, value);
        Ok(value)
    }

    fn begin(&mut self) -> Result<Session<'_, T>, TransportError> {
        let mut attempt = 1;
        loop {
            match self.transport.open(&self.bus, self.address) {
                Ok(()) => {
                    return Ok(Session {
                        transport: &mut self.transport,
                    });
                }
                Err(e) if attempt < OPEN_ATTEMPTS => {
                    warn!("open attempt {}/{} failed: {}", attempt, OPEN_ATTEMPTS, e);
                    self.transport.close();
                    thread::sleep(OPEN_BACKOFF);
                    attempt += 1;
                }
                Err(e) => {
                    error!("giving up after {} open attempts: {}", OPEN_ATTEMPTS, e);
                    self.transport.close();
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{OpenFault, Transaction};
    use super::*;
    use crate::registers::pointer;

    fn transport() -> RegisterTransport<MockI2c> {
        RegisterTransport::new(MockI2c::new(), "/dev/i2c-1", 0x48)
    }

    #[test]
    fn write_register_is_one_closed_transaction() {
        let mut t = transport();
        t.write_register(pointer::CONFIG, 0x8583).unwrap();

        assert_eq!(
            t.transport().transactions(),
            &[
                Transaction::Open {
                    bus: "/dev/i2c-1".to_string(),
                    address: 0x48
                },
                Transaction::Write(vec![0x01, 0x85, 0x83]),
                Transaction::Close,
            ]
        );
        assert_eq!(t.transport().register(pointer::CONFIG), Some(0x8583));
    }

    #[test]
    fn read_register_writes_pointer_then_reads_two_bytes() {
        let mut t = transport();
        t.transport_mut().set_register(pointer::CONVERSION, 0x1234);

        assert_eq!(t.read_register(pointer::CONVERSION).unwrap(), 0x1234);
        assert_eq!(
            &t.transport().transactions()[1..],
            &[
                Transaction::Write(vec![0x00]),
                Transaction::Read(2),
                Transaction::Close,
            ]
        );
        assert!(!t.transport().is_open());
    }

    #[test]
    fn transfer_faults_are_swallowed() {
        let mut t = transport();
        t.transport_mut().set_register(pointer::CONVERSION, 0x1234);
        t.transport_mut().fail_writes(true);
        t.transport_mut().fail_reads(true);

        assert!(t.write_register(pointer::CONFIG, 0x0001).is_ok());
        assert_eq!(t.read_register(pointer::CONVERSION).unwrap(), 0);
        assert!(!t.transport().is_open());
    }

    #[test]
    fn open_is_retried_then_succeeds() {
        let mut t = transport();
        t.transport_mut().fail_open(OpenFault::Bind, Some(2));

        t.write_register(pointer::CONFIG, 0x0001).unwrap();
        assert_eq!(t.transport().open_attempts(), 3);
        assert_eq!(t.transport().register(pointer::CONFIG), Some(0x0001));
    }

    #[test]
    fn open_gives_up_after_three_attempts() {
        let mut t = transport();
        t.transport_mut().fail_open(OpenFault::Bus, None);

        let err = t.read_register(pointer::CONFIG).unwrap_err();
        assert!(matches!(err, TransportError::BusUnavailable { .. }));
        assert_eq!(t.transport().open_attempts(), OPEN_ATTEMPTS);
        assert!(
            !t.transport()
                .transactions()
                .iter()
                .any(|tx| matches!(tx, Transaction::Write(_) | Transaction::Read(_)))
        );
    }
}
