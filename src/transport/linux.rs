//! `/dev/i2c-N` character device transport.

use i2cdev::core::I2CDevice;
use i2cdev::linux::{LinuxI2CDevice, LinuxI2CError};

use crate::error::{Direction, TransportError};

use super::I2cTransport;

/// Linux i2c-dev transport. The device node is opened on `open` and the
/// descriptor dropped on `close`.
#[derive(Default)]
pub struct LinuxI2c {
    device: Option<LinuxI2CDevice>,
    address: u8,
}

impl LinuxI2c {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for LinuxI2c {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinuxI2c")
            .field("open", &self.device.is_some())
            .field("address", &self.address)
            .finish()
    }
}

impl I2cTransport for LinuxI2c {
    fn open(&mut self, bus: &str, address: u8) -> Result<(), TransportError> {
        self.close();
        // LinuxI2CDevice::new opens the node (Io on failure) and then issues
        // the I2C_SLAVE ioctl (Errno on failure).
        match LinuxI2CDevice::new(bus, u16::from(address)) {
            Ok(device) => {
                self.device = Some(device);
                self.address = address;
                Ok(())
            }
            Err(LinuxI2CError::Io(e)) => Err(TransportError::BusUnavailable {
                bus: bus.to_string(),
                reason: e.to_string(),
            }),
            Err(e) => Err(TransportError::AddressBindFailed {
                bus: bus.to_string(),
                address,
                reason: e.to_string(),
            }),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let address = self.address;
        let device = self.device.as_mut().ok_or(TransportError::NotOpen)?;
        device
            .write(data)
            .map_err(|e| TransportError::TransferFailed {
                direction: Direction::Write,
                address,
                reason: e.to_string(),
            })
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        let address = self.address;
        let device = self.device.as_mut().ok_or(TransportError::NotOpen)?;
        device
            .read(buf)
            .map_err(|e| TransportError::TransferFailed {
                direction: Direction::Read,
                address,
                reason: e.to_string(),
            })
    }

    fn close(&mut self) {
        self.device = None;
    }
}
