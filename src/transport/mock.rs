//! Mock transport for tests and dry runs.
//!
//! Behaves like a tiny ADS1x15 register file: a one-byte write selects the
//! pointer, a three-byte write stores a register, a two-byte read returns
//! the register under the pointer. Every call is recorded.

use std::collections::HashMap;

use crate::error::{Direction, TransportError};
use crate::registers::{ConfigWord, pointer};

use super::I2cTransport;

/// Recorded bus activity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    /// Successful open + address bind
    Open { bus: String, address: u8 },
    Write(Vec<u8>),
    Read(usize),
    Close,
}

/// Which open step to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenFault {
    Bus,
    Bind,
}

#[derive(Debug, Default)]
pub struct MockI2c {
    registers: HashMap<u8, u16>,
    pointer: u8,
    open: Option<u8>,
    transactions: Vec<Transaction>,
    open_attempts: u32,
    /// Fault and remaining failures, `None` = fail forever
    open_fault: Option<(OpenFault, Option<u32>)>,
    fail_writes: bool,
    fail_reads: bool,
    busy_polls: u32,
}

impl MockI2c {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload a register.
    pub fn set_register(&mut self, reg: u8, value: u16) {
        self.registers.insert(reg, value);
    }

    pub fn register(&self, reg: u8) -> Option<u16> {
        self.registers.get(&reg).copied()
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn clear_transactions(&mut self) {
        self.transactions.clear();
    }

    /// Payloads of every write issued, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.transactions
            .iter()
            .filter_map(|tx| match tx {
                Transaction::Write(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn read_count(&self) -> usize {
        self.transactions
            .iter()
            .filter(|tx| matches!(tx, Transaction::Read(_)))
            .count()
    }

    pub fn open_attempts(&self) -> u32 {
        self.open_attempts
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Fail the next `times` opens (`None` = every open) at the given step.
    pub fn fail_open(&mut self, fault: OpenFault, times: Option<u32>) {
        self.open_fault = Some((fault, times));
    }

    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    /// Report a conversion in progress for the next `polls` config reads.
    pub fn set_busy_polls(&mut self, polls: u32) {
        self.busy_polls = polls;
    }

    fn take_open_fault(&mut self) -> Option<OpenFault> {
        let (fault, remaining) = self.open_fault?;
        match remaining {
            None => Some(fault),
            Some(0) => {
                self.open_fault = None;
                None
            }
            Some(n) => {
                self.open_fault = Some((fault, Some(n - 1)));
                Some(fault)
            }
        }
    }

    fn transfer_error(&self, direction: Direction) -> TransportError {
        TransportError::TransferFailed {
            direction,
            address: self.open.unwrap_or_default(),
            reason: "injected fault".to_string(),
        }
    }
}

impl I2cTransport for MockI2c {
    fn open(&mut self, bus: &str, address: u8) -> Result<(), TransportError> {
        self.open_attempts += 1;
        match self.take_open_fault() {
            Some(OpenFault::Bus) => Err(TransportError::BusUnavailable {
                bus: bus.to_string(),
                reason: "injected fault".to_string(),
            }),
            Some(OpenFault::Bind) => Err(TransportError::AddressBindFailed {
                bus: bus.to_string(),
                address,
                reason: "injected fault".to_string(),
            }),
            None => {
                self.open = Some(address);
                self.transactions.push(Transaction::Open {
                    bus: bus.to_string(),
                    address,
                });
                Ok(())
            }
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if self.open.is_none() {
            return Err(TransportError::NotOpen);
        }
        self.transactions.push(Transaction::Write(data.to_vec()));
        if self.fail_writes {
            return Err(self.transfer_error(Direction::Write));
        }
        if let Some(&reg) = data.first() {
            self.pointer = reg;
        }
        if let &[reg, hi, lo] = data {
            self.registers.insert(reg, u16::from_be_bytes([hi, lo]));
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        if self.open.is_none() {
            return Err(TransportError::NotOpen);
        }
        self.transactions.push(Transaction::Read(buf.len()));
        if self.fail_reads {
            return Err(self.transfer_error(Direction::Read));
        }
        let mut value = self.register(self.pointer).unwrap_or_default();
        if self.pointer == pointer::CONFIG && self.busy_polls > 0 {
            self.busy_polls -= 1;
            value &= !ConfigWord::OS.bits();
        }
        for (dst, src) in buf.iter_mut().zip(value.to_be_bytes()) {
            *dst = src;
        }
        Ok(())
    }

    fn close(&mut self) {
        self.open = None;
        self.transactions.push(Transaction::Close);
    }
}
