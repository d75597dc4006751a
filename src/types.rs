use std::time::Duration;

use serde::{Deserialize, Serialize};
use serialport::{DataBits, Parity, StopBits};
use thiserror::Error;

use crate::bus::LinkSettings;
use crate::modbus::{FunctionCode, ReadPlan};

pub const DEFAULT_DATA_BITS: u8 = 8;
pub const DEFAULT_STOP_BITS: u8 = 1;
pub const DEFAULT_TIMEOUT_MS: u64 = 2_000;

/// Parameters of one requested device scan, as sent to `POST /api/scan`.
///
/// The optional fields are left out of the JSON body when unset, so a config
/// built from the six form fields serializes to exactly those six keys.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScanConfig {
    pub com_port: String,
    pub baud_rate: u32,
    pub parity: String,
    pub slave_id: u8,
    pub start_register: u16,
    pub num_registers: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_bits: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_bits: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_code: Option<u8>,
}

/// Single holding register write, as sent to `POST /api/write`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WriteRequest {
    pub com_port: String,
    pub baud_rate: u32,
    pub parity: String,
    pub slave_id: u8,
    pub register: u16,
    pub value: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_bits: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_bits: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct WriteAck {
    pub message: String,
}

/// Body of every non-2xx API response.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}

/// A request the server refuses before touching the serial port.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no serial port selected")]
    EmptyPort,
    #[error("baud rate must be positive")]
    ZeroBaudRate,
    #[error("unknown parity {0:?} (expected none, even or odd)")]
    UnknownParity(String),
    #[error("unsupported data bits {0} (expected 5 to 8)")]
    DataBits(u8),
    #[error("unsupported stop bits {0} (expected 1 or 2)")]
    StopBits(u8),
    #[error("unsupported function code {0} (expected 1 to 4)")]
    FunctionCode(u8),
    #[error("register count {count} out of range (1 to {max})")]
    CountOutOfRange { count: u16, max: u16 },
    #[error("registers {start}..{start}+{count} exceed the 16-bit address space")]
    AddressOverflow { start: u16, count: u16 },
}

/// Parse the textual parity used on the wire. Accepts the form's long names
/// and the single-letter codes, case-insensitively.
pub fn parse_parity(s: &str) -> Result<Parity, ConfigError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "none" | "n" => Ok(Parity::None),
        "even" | "e" => Ok(Parity::Even),
        "odd" | "o" => Ok(Parity::Odd),
        _ => Err(ConfigError::UnknownParity(s.to_string())),
    }
}

impl ScanConfig {
    /// Config with only the six form fields set.
    pub fn new(
        com_port: impl Into<String>,
        baud_rate: u32,
        parity: impl Into<String>,
        slave_id: u8,
        start_register: u16,
        num_registers: u16,
    ) -> Self {
        Self {
            com_port: com_port.into(),
            baud_rate,
            parity: parity.into(),
            slave_id,
            start_register,
            num_registers,
            data_bits: None,
            stop_bits: None,
            timeout_ms: None,
            function_code: None,
        }
    }

    pub fn link_settings(&self) -> Result<LinkSettings, ConfigError> {
        link_settings(
            &self.com_port,
            self.baud_rate,
            &self.parity,
            self.data_bits,
            self.stop_bits,
            self.timeout_ms,
        )
    }

    pub fn read_plan(&self) -> Result<ReadPlan, ConfigError> {
        let code = self.function_code.unwrap_or(FunctionCode::HoldingRegisters as u8);
        let function =
            FunctionCode::try_from(code).map_err(|_| ConfigError::FunctionCode(code))?;
        let count = self.num_registers;
        let max = function.max_count();
        if count == 0 || count > max {
            return Err(ConfigError::CountOutOfRange { count, max });
        }
        if u32::from(self.start_register) + u32::from(count) > 0x1_0000 {
            return Err(ConfigError::AddressOverflow {
                start: self.start_register,
                count,
            });
        }
        Ok(ReadPlan {
            slave_id: self.slave_id,
            function,
            start: self.start_register,
            count,
        })
    }
}

impl WriteRequest {
    pub fn link_settings(&self) -> Result<LinkSettings, ConfigError> {
        link_settings(
            &self.com_port,
            self.baud_rate,
            &self.parity,
            self.data_bits,
            self.stop_bits,
            self.timeout_ms,
        )
    }
}

fn link_settings(
    port: &str,
    baud_rate: u32,
    parity: &str,
    data_bits: Option<u8>,
    stop_bits: Option<u8>,
    timeout_ms: Option<u64>,
) -> Result<LinkSettings, ConfigError> {
    let port = port.trim();
    if port.is_empty() {
        return Err(ConfigError::EmptyPort);
    }
    if baud_rate == 0 {
        return Err(ConfigError::ZeroBaudRate);
    }
    let data_bits = match data_bits.unwrap_or(DEFAULT_DATA_BITS) {
        5 => DataBits::Five,
        6 => DataBits::Six,
        7 => DataBits::Seven,
        8 => DataBits::Eight,
        other => return Err(ConfigError::DataBits(other)),
    };
    let stop_bits = match stop_bits.unwrap_or(DEFAULT_STOP_BITS) {
        1 => StopBits::One,
        2 => StopBits::Two,
        other => return Err(ConfigError::StopBits(other)),
    };
    Ok(LinkSettings {
        port: port.to_string(),
        baud_rate,
        parity: parse_parity(parity)?,
        data_bits,
        stop_bits,
        timeout: Duration::from_millis(timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)),
    })
}
