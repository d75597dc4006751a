use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::types::ScanConfig;

/// Inputs of the scan form, by element id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    ComPort,
    BaudRate,
    Parity,
    SlaveId,
    StartRegister,
    NumRegisters,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::ComPort,
        Field::BaudRate,
        Field::Parity,
        Field::SlaveId,
        Field::StartRegister,
        Field::NumRegisters,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Field::ComPort => "comPort",
            Field::BaudRate => "baudRate",
            Field::Parity => "parity",
            Field::SlaveId => "slaveId",
            Field::StartRegister => "startRegister",
            Field::NumRegisters => "numRegisters",
        }
    }

    pub fn from_id(id: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.id() == id)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("{field} must be a whole number, got {value:?}")]
    InvalidNumber { field: Field, value: String },
}

/// Raw text of the scan form as the user typed it. Unset fields read as
/// empty strings, like an untouched input element.
#[derive(Debug, Clone, Default)]
pub struct ScanForm {
    values: HashMap<Field, String>,
}

impl ScanForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) -> &mut Self {
        self.values.insert(field, value.into());
        self
    }

    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    pub fn value(&self, field: Field) -> &str {
        self.values.get(&field).map(String::as_str).unwrap_or("")
    }

    /// Read the six fields into a fresh [`ScanConfig`], coercing the numeric
    /// ones. Text fields are passed through untouched.
    pub fn to_config(&self) -> Result<ScanConfig, FormError> {
        Ok(ScanConfig::new(
            self.value(Field::ComPort),
            self.number(Field::BaudRate)?,
            self.value(Field::Parity),
            self.number(Field::SlaveId)?,
            self.number(Field::StartRegister)?,
            self.number(Field::NumRegisters)?,
        ))
    }

    /// Plain decimal digits only; no sign, exponent or radix prefix.
    fn number<T: FromStr>(&self, field: Field) -> Result<T, FormError> {
        let raw = self.value(field);
        let digits = raw.trim();
        let invalid = || FormError::InvalidNumber {
            field,
            value: raw.to_string(),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        digits.parse().map_err(|_| invalid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled() -> ScanForm {
        ScanForm::new()
            .with(Field::ComPort, "COM1")
            .with(Field::BaudRate, "9600")
            .with(Field::Parity, "none")
            .with(Field::SlaveId, "1")
            .with(Field::StartRegister, "0")
            .with(Field::NumRegisters, "10")
    }

    #[test]
    fn numeric_fields_become_numbers() {
        let cfg = filled().to_config().unwrap();
        assert_eq!(cfg, ScanConfig::new("COM1", 9600, "none", 1, 0, 10));
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let cfg = filled()
            .with(Field::StartRegister, " 500 ")
            .to_config()
            .unwrap();
        assert_eq!(cfg.start_register, 500);
    }

    #[test]
    fn non_numeric_input_names_the_field() {
        let err = filled().with(Field::SlaveId, "abc").to_config().unwrap_err();
        assert_eq!(
            err,
            FormError::InvalidNumber {
                field: Field::SlaveId,
                value: "abc".into()
            }
        );
        assert_eq!(err.to_string(), r#"slaveId must be a whole number, got "abc""#);
    }

    #[test]
    fn out_of_range_is_not_a_number_for_the_field() {
        // slave ids are a single byte
        let err = filled().with(Field::SlaveId, "300").to_config().unwrap_err();
        assert!(matches!(err, FormError::InvalidNumber { field: Field::SlaveId, .. }));

        let err = filled().with(Field::NumRegisters, "-1").to_config().unwrap_err();
        assert!(matches!(err, FormError::InvalidNumber { field: Field::NumRegisters, .. }));
    }

    #[test]
    fn only_plain_decimal_digits_are_numbers() {
        for raw in ["1e3", "0x10", "+5", "1.0", "1_000"] {
            let err = filled().with(Field::BaudRate, raw).to_config().unwrap_err();
            assert!(
                matches!(err, FormError::InvalidNumber { field: Field::BaudRate, .. }),
                "{raw}"
            );
        }
        let cfg = filled().with(Field::BaudRate, "0019200").to_config().unwrap();
        assert_eq!(cfg.baud_rate, 19200);
    }

    #[test]
    fn missing_field_reads_empty() {
        let form = ScanForm::new().with(Field::ComPort, "COM1");
        assert_eq!(form.value(Field::Parity), "");
        assert!(form.to_config().is_err());
    }

    #[test]
    fn ids_round_trip() {
        for f in Field::ALL {
            assert_eq!(Field::from_id(f.id()), Some(f));
        }
        assert_eq!(Field::from_id("timeout"), None);
    }
}
