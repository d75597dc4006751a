use std::time::Duration;

use anyhow::Result;
use serialport::{DataBits, Parity, SerialPortBuilder, StopBits};

use crate::modbus::{self, ModbusError, ReadPlan, Values};
use crate::ports;

/// Serial line parameters for one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSettings {
    pub port: String,
    pub baud_rate: u32,
    pub parity: Parity,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub timeout: Duration,
}

impl LinkSettings {
    pub fn apply_builder(&self, b: SerialPortBuilder) -> SerialPortBuilder {
        b.parity(self.parity)
            .data_bits(self.data_bits)
            .stop_bits(self.stop_bits)
            .timeout(self.timeout)
    }
}

/// Everything the HTTP layer needs from the hardware side.
///
/// Methods block; callers run them off the async runtime.
pub trait DeviceBus: Send + Sync + 'static {
    fn list_ports(&self) -> Result<Vec<String>>;

    fn read(&self, settings: &LinkSettings, plan: &ReadPlan) -> Result<Values, ModbusError>;

    fn write(
        &self,
        settings: &LinkSettings,
        slave_id: u8,
        register: u16,
        value: u16,
    ) -> Result<(), ModbusError>;
}

/// Real serial ports. Each transaction opens the port, runs, and closes it.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialBus;

impl SerialBus {
    fn open(&self, settings: &LinkSettings) -> Result<Box<dyn serialport::SerialPort>, ModbusError> {
        let builder = serialport::new(settings.port.clone(), settings.baud_rate);
        settings
            .apply_builder(builder)
            .open()
            .map_err(|source| ModbusError::Open {
                port: settings.port.clone(),
                source,
            })
    }
}

impl DeviceBus for SerialBus {
    fn list_ports(&self) -> Result<Vec<String>> {
        ports::list_serial_ports()
    }

    fn read(&self, settings: &LinkSettings, plan: &ReadPlan) -> Result<Values, ModbusError> {
        let mut port = self.open(settings)?;
        modbus::read_values(port.as_mut(), plan)
    }

    fn write(
        &self,
        settings: &LinkSettings,
        slave_id: u8,
        register: u16,
        value: u16,
    ) -> Result<(), ModbusError> {
        let mut port = self.open(settings)?;
        modbus::write_register(port.as_mut(), slave_id, register, value)
    }
}
