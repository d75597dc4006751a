//! One-shot Modbus RTU transactions over any byte link.
//!
//! Request framing and response validation (unit id, CRC, exception codes)
//! are delegated to `rmodbus`; this module only moves bytes and turns the
//! decoded values into the text lines shown to the user.
use std::io::{self, Read, Write};

use rmodbus::{client::ModbusRequest, ModbusProto};
use thiserror::Error;

/// Read functions supported by a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FunctionCode {
    Coils = 1,
    DiscreteInputs = 2,
    HoldingRegisters = 3,
    InputRegisters = 4,
}

impl FunctionCode {
    /// Whether the function returns packed bits rather than 16-bit words.
    pub fn is_bits(self) -> bool {
        matches!(self, FunctionCode::Coils | FunctionCode::DiscreteInputs)
    }

    /// Largest quantity a single request may ask for.
    pub fn max_count(self) -> u16 {
        if self.is_bits() {
            2000
        } else {
            125
        }
    }
}

impl TryFrom<u8> for FunctionCode {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(FunctionCode::Coils),
            2 => Ok(FunctionCode::DiscreteInputs),
            3 => Ok(FunctionCode::HoldingRegisters),
            4 => Ok(FunctionCode::InputRegisters),
            other => Err(other),
        }
    }
}

/// A validated read: which device, which table, which range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadPlan {
    pub slave_id: u8,
    pub function: FunctionCode,
    pub start: u16,
    pub count: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Values {
    Registers(Vec<u16>),
    Bits(Vec<bool>),
}

impl Values {
    pub fn len(&self) -> usize {
        match self {
            Values::Registers(v) => v.len(),
            Values::Bits(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Error)]
pub enum ModbusError {
    #[error("failed to open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },
    #[error("device did not answer before the timeout")]
    Timeout,
    #[error("serial I/O error: {0}")]
    Io(#[source] io::Error),
    #[error("invalid response frame: {0}")]
    Frame(String),
    #[error("modbus error: {0}")]
    Protocol(String),
}

impl From<io::Error> for ModbusError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ModbusError::Timeout,
            _ => ModbusError::Io(e),
        }
    }
}

fn protocol(e: rmodbus::ErrorKind) -> ModbusError {
    ModbusError::Protocol(e.to_string())
}

/// Send one read request and decode the answer.
pub fn read_values<L>(link: &mut L, plan: &ReadPlan) -> Result<Values, ModbusError>
where
    L: Read + Write + ?Sized,
{
    let mut request = ModbusRequest::new(plan.slave_id, ModbusProto::Rtu);
    let mut raw = Vec::with_capacity(8);
    match plan.function {
        FunctionCode::Coils => request.generate_get_coils(plan.start, plan.count, &mut raw),
        FunctionCode::DiscreteInputs => {
            request.generate_get_discretes(plan.start, plan.count, &mut raw)
        }
        FunctionCode::HoldingRegisters => {
            request.generate_get_holdings(plan.start, plan.count, &mut raw)
        }
        FunctionCode::InputRegisters => {
            request.generate_get_inputs(plan.start, plan.count, &mut raw)
        }
    }
    .map_err(protocol)?;

    tracing::debug!(request = ?raw, "sending modbus request");
    link.write_all(&raw)?;
    link.flush()?;

    let response = read_frame(link)?;
    tracing::debug!(response = ?response, "received modbus response");
    request.parse_ok(&response).map_err(protocol)?;

    let payload = &response[3..response.len() - 2];
    let values = if plan.function.is_bits() {
        // First coil is bit 0 of the first data byte.
        let mut bits: Vec<bool> = payload
            .iter()
            .flat_map(|byte| (0..8).map(move |i| byte & (1 << i) != 0))
            .collect();
        bits.truncate(plan.count as usize);
        Values::Bits(bits)
    } else {
        Values::Registers(
            payload
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect(),
        )
    };
    Ok(values)
}

/// Write a single holding register and wait for the device's echo.
pub fn write_register<L>(
    link: &mut L,
    slave_id: u8,
    register: u16,
    value: u16,
) -> Result<(), ModbusError>
where
    L: Read + Write + ?Sized,
{
    let mut request = ModbusRequest::new(slave_id, ModbusProto::Rtu);
    let mut raw = Vec::with_capacity(8);
    request
        .generate_set_holding(register, value, &mut raw)
        .map_err(protocol)?;
    link.write_all(&raw)?;
    link.flush()?;

    let response = read_frame(link)?;
    request.parse_ok(&response).map_err(protocol)
}

/// Render decoded values as one line per requested address. Addresses the
/// device did not return a value for are reported as `Error`.
pub fn format_lines(start: u16, count: u16, values: &Values) -> Vec<String> {
    (0..count as usize)
        .map(|i| {
            let addr = start as usize + i;
            let text = match values {
                Values::Registers(v) => v.get(i).map(|x| x.to_string()),
                Values::Bits(v) => v
                    .get(i)
                    .map(|&on| (if on { "ON" } else { "OFF" }).to_string()),
            };
            format!("Register {addr}: {}", text.as_deref().unwrap_or("Error"))
        })
        .collect()
}

fn read_frame<L: Read + ?Sized>(link: &mut L) -> Result<Vec<u8>, ModbusError> {
    let mut head = [0u8; 3];
    link.read_exact(&mut head)?;
    let len = expected_frame_len(&head)?;
    let mut frame = Vec::with_capacity(len);
    frame.extend_from_slice(&head);
    frame.resize(len, 0);
    link.read_exact(&mut frame[3..])?;
    Ok(frame)
}

/// Total RTU response length implied by the first three bytes
/// (unit id, function, byte count or exception code).
fn expected_frame_len(head: &[u8; 3]) -> Result<usize, ModbusError> {
    let func = head[1];
    if func & 0x80 != 0 {
        return Ok(5);
    }
    match func {
        0x01..=0x04 => Ok(5 + head[2] as usize),
        0x05 | 0x06 | 0x0f | 0x10 => Ok(8),
        other => Err(ModbusError::Frame(format!(
            "unexpected function code 0x{other:02x}"
        ))),
    }
}
