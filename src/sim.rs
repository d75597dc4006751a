//! In-memory Modbus RTU slave and a device bus built on it.
//!
//! Used by `serve --simulate` to demo the UI without hardware, and by the
//! tests to drive real request/response frames end to end.
use std::collections::{HashMap, VecDeque};
use std::io::{self, Read, Write};
use std::sync::Mutex;

use anyhow::Result;
use rmodbus::{
    server::{context::ModbusContext, storage::ModbusStorageSmall, ModbusFrame},
    ErrorKind, ModbusProto,
};

use crate::bus::{DeviceBus, LinkSettings};
use crate::modbus::{self, ModbusError, ReadPlan, Values};

/// A slave that answers frames written to it; replies are read back from
/// the same object, like a half-duplex serial line.
pub struct SimulatedSlave {
    unit: u8,
    storage: ModbusStorageSmall,
    pending: VecDeque<u8>,
    corrupt_next: bool,
}

impl SimulatedSlave {
    pub fn new(unit: u8) -> Self {
        Self {
            unit,
            storage: ModbusStorageSmall::new(),
            pending: VecDeque::new(),
            corrupt_next: false,
        }
    }

    /// Slave preloaded with a recognizable register pattern.
    pub fn with_demo_data(unit: u8) -> Result<Self, ErrorKind> {
        let mut slave = Self::new(unit);
        for reg in 0..32u16 {
            slave.storage.set_holding(reg, reg * 100 + 23)?;
            slave.storage.set_input(reg, 1000 + reg)?;
            slave.storage.set_coil(reg, reg % 3 == 0)?;
            slave.storage.set_discrete(reg, reg % 2 == 1)?;
        }
        Ok(slave)
    }

    pub fn set_holding(&mut self, reg: u16, value: u16) -> Result<(), ErrorKind> {
        self.storage.set_holding(reg, value)
    }

    pub fn set_coil(&mut self, reg: u16, value: bool) -> Result<(), ErrorKind> {
        self.storage.set_coil(reg, value)
    }

    /// Flip a CRC bit in the next reply.
    pub fn corrupt_next_response(&mut self) {
        self.corrupt_next = true;
    }

    fn answer(&mut self, request: &[u8]) -> io::Result<()> {
        let mut response = Vec::new();
        {
            let mut frame = ModbusFrame::new(self.unit, request, ModbusProto::Rtu, &mut response);
            frame.parse().map_err(invalid_data)?;
            if frame.processing_required {
                let result = if frame.readonly {
                    frame.process_read(&self.storage)
                } else {
                    frame.process_write(&mut self.storage)
                };
                result.map_err(invalid_data)?;
            }
            if !frame.response_required {
                return Ok(());
            }
            frame.finalize_response().map_err(invalid_data)?;
        }
        if self.corrupt_next {
            self.corrupt_next = false;
            if let Some(last) = response.last_mut() {
                *last ^= 0x01;
            }
        }
        self.pending.extend(response);
        Ok(())
    }
}

fn invalid_data(e: ErrorKind) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e.to_string())
}

impl Write for SimulatedSlave {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.answer(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for SimulatedSlave {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no reply"));
        }
        let n = buf.len().min(self.pending.len());
        for (dst, src) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

/// Device bus exposing a fixed set of fake ports, each with one slave.
pub struct SimulatedBus {
    slaves: Mutex<HashMap<String, SimulatedSlave>>,
}

impl SimulatedBus {
    pub fn new() -> Self {
        Self {
            slaves: Mutex::new(HashMap::new()),
        }
    }

    /// Attach a slave behind `port`, replacing any previous one.
    pub fn with_slave(self, port: impl Into<String>, slave: SimulatedSlave) -> Self {
        self.slaves
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(port.into(), slave);
        self
    }

    /// Two demo ports with slave id 1 behind each.
    pub fn demo() -> Result<Self, ErrorKind> {
        Ok(Self::new()
            .with_slave("SIM0", SimulatedSlave::with_demo_data(1)?)
            .with_slave("SIM1", SimulatedSlave::with_demo_data(1)?))
    }

    fn with_link<T>(
        &self,
        settings: &LinkSettings,
        f: impl FnOnce(&mut SimulatedSlave) -> Result<T, ModbusError>,
    ) -> Result<T, ModbusError> {
        let mut slaves = self.slaves.lock().unwrap_or_else(|e| e.into_inner());
        match slaves.get_mut(&settings.port) {
            Some(slave) => f(slave),
            None => Err(ModbusError::Open {
                port: settings.port.clone(),
                source: serialport::Error::new(
                    serialport::ErrorKind::NoDevice,
                    "no simulated device on this port",
                ),
            }),
        }
    }
}

impl Default for SimulatedBus {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceBus for SimulatedBus {
    fn list_ports(&self) -> Result<Vec<String>> {
        let slaves = self.slaves.lock().unwrap_or_else(|e| e.into_inner());
        Ok(crate::ports::normalize_port_names(slaves.keys().cloned()))
    }

    fn read(&self, settings: &LinkSettings, plan: &ReadPlan) -> Result<Values, ModbusError> {
        self.with_link(settings, |slave| modbus::read_values(slave, plan))
    }

    fn write(
        &self,
        settings: &LinkSettings,
        slave_id: u8,
        register: u16,
        value: u16,
    ) -> Result<(), ModbusError> {
        self.with_link(settings, |slave| {
            modbus::write_register(slave, slave_id, register, value)
        })
    }
}
