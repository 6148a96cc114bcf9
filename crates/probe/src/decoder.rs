//! Decoder for the packed `productState` field of registered security
//! products.
//!
//! The value is 24 bits wide. Byte 0 is the most significant byte:
//!
//! ```text
//!   bits 16..23  byte 0  product category
//!   bits  8..15  byte 1  running status   (high nibble)
//!   bits  0..7   byte 2  signature status (high nibble)
//! ```
//!
//! Each byte is decoded on its own. Codes missing from the tables render as
//! `Unknown(0xHH)` with the exact byte value, so states never seen before
//! still show up in the report.

use std::fmt;
use thiserror::Error;

pub const MAX_STATE_VALUE: u32 = 0x00FF_FFFF;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("productState '{0}' is not a decimal integer")]
    NotNumeric(String),

    #[error("productState {0} does not fit in 24 bits")]
    OutOfRange(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductCategory {
    Firewall,
    AutoUpdateSettings,
    Antivirus,
    Antispyware,
    InternetSettings,
    UserAccountControl,
    Service,
    Unknown(u8),
}

// 0x06 is what Security Center reports for antivirus products that also
// register auto-update handling.
const CATEGORY_CODES: [(u8, ProductCategory); 8] = [
    (0x01, ProductCategory::Firewall),
    (0x02, ProductCategory::AutoUpdateSettings),
    (0x04, ProductCategory::Antivirus),
    (0x06, ProductCategory::Antivirus),
    (0x08, ProductCategory::Antispyware),
    (0x10, ProductCategory::InternetSettings),
    (0x20, ProductCategory::UserAccountControl),
    (0x40, ProductCategory::Service),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunningStatus {
    NotRunning,
    RunningUpToDate,
    Snoozed,
    Expired,
    Unknown(u8),
}

const RUNNING_CODES: [(u8, RunningStatus); 4] = [
    (0x00, RunningStatus::NotRunning),
    (0x10, RunningStatus::RunningUpToDate),
    (0x20, RunningStatus::Snoozed),
    (0x30, RunningStatus::Expired),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureStatus {
    UpToDate,
    OutOfDate,
    PartiallyOutOfDate,
    Unknown(u8),
}

const SIGNATURE_CODES: [(u8, SignatureStatus); 3] = [
    (0x00, SignatureStatus::UpToDate),
    (0x10, SignatureStatus::OutOfDate),
    (0x20, SignatureStatus::PartiallyOutOfDate),
];

fn lookup<T: Copy>(table: &[(u8, T)], code: u8) -> Option<T> {
    table
        .iter()
        .find(|(candidate, _)| *candidate == code)
        .map(|(_, value)| *value)
}

struct UnknownCode(u8);

impl fmt::Display for UnknownCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown(0x{:02X})", self.0)
    }
}

impl ProductCategory {
    pub fn from_byte(byte: u8) -> Self {
        lookup(&CATEGORY_CODES, byte).unwrap_or(ProductCategory::Unknown(byte))
    }
}

impl RunningStatus {
    /// Looks up the high nibble; an unmapped byte keeps its full value.
    pub fn from_byte(byte: u8) -> Self {
        lookup(&RUNNING_CODES, byte & 0xF0).unwrap_or(RunningStatus::Unknown(byte))
    }
}

impl SignatureStatus {
    /// Looks up the high nibble; an unmapped byte keeps its full value.
    pub fn from_byte(byte: u8) -> Self {
        lookup(&SIGNATURE_CODES, byte & 0xF0).unwrap_or(SignatureStatus::Unknown(byte))
    }
}

impl fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductCategory::Firewall => f.write_str("Firewall"),
            ProductCategory::AutoUpdateSettings => f.write_str("Auto Update Settings"),
            ProductCategory::Antivirus => f.write_str("Antivirus"),
            ProductCategory::Antispyware => f.write_str("Antispyware"),
            ProductCategory::InternetSettings => f.write_str("Internet Settings"),
            ProductCategory::UserAccountControl => f.write_str("User Account Control"),
            ProductCategory::Service => f.write_str("Service"),
            ProductCategory::Unknown(code) => write!(f, "{}", UnknownCode(*code)),
        }
    }
}

impl fmt::Display for RunningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunningStatus::NotRunning => f.write_str("Not running"),
            RunningStatus::RunningUpToDate => f.write_str("Running and up to date"),
            RunningStatus::Snoozed => f.write_str("Snoozed"),
            RunningStatus::Expired => f.write_str("Expired"),
            RunningStatus::Unknown(code) => write!(f, "{}", UnknownCode(*code)),
        }
    }
}

impl fmt::Display for SignatureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureStatus::UpToDate => f.write_str("Up to date"),
            SignatureStatus::OutOfDate => f.write_str("Out of date"),
            SignatureStatus::PartiallyOutOfDate => f.write_str("Partially out of date"),
            SignatureStatus::Unknown(code) => write!(f, "{}", UnknownCode(*code)),
        }
    }
}

/// The three decoded dimensions of one state value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductState {
    pub category: ProductCategory,
    pub running: RunningStatus,
    pub signature: SignatureStatus,
    pub raw: u32,
}

/// Parse the decimal text emitted by the enumerating tool.
pub fn parse_state(text: &str) -> Result<u32, DecodeError> {
    let trimmed = text.trim();
    let value: u64 = trimmed
        .parse()
        .map_err(|_| DecodeError::NotNumeric(trimmed.to_string()))?;
    if value > u64::from(MAX_STATE_VALUE) {
        return Err(DecodeError::OutOfRange(value));
    }
    Ok(value as u32)
}

/// Decode a state value. Bits above the 24-bit field are ignored.
pub fn decode(value: u32) -> ProductState {
    let [_, byte0, byte1, byte2] = value.to_be_bytes();
    ProductState {
        category: ProductCategory::from_byte(byte0),
        running: RunningStatus::from_byte(byte1),
        signature: SignatureStatus::from_byte(byte2),
        raw: value,
    }
}

/// `parse_state` followed by `decode`.
pub fn decode_text(text: &str) -> Result<ProductState, DecodeError> {
    parse_state(text).map(decode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defender_reference_value() {
        let state = decode(parse_state("397568").unwrap());
        assert_eq!(state.category.to_string(), "Antivirus");
        assert_eq!(state.running.to_string(), "Running and up to date");
        assert_eq!(state.signature.to_string(), "Up to date");
        assert_eq!(state.raw, 0x061100);
    }

    #[test]
    fn test_unknown_category_renders_exact_byte() {
        let state = decode(0x99_10_00);
        assert_eq!(state.category, ProductCategory::Unknown(0x99));
        assert_eq!(state.category.to_string(), "Unknown(0x99)");
        // The other dimensions still decode.
        assert_eq!(state.running, RunningStatus::RunningUpToDate);
        assert_eq!(state.signature, SignatureStatus::UpToDate);
    }

    #[test]
    fn test_dimensions_decode_independently() {
        assert_eq!(decode(0x04_00_10).running, RunningStatus::NotRunning);
        assert_eq!(decode(0x04_00_10).signature, SignatureStatus::OutOfDate);
        assert_eq!(decode(0x01_20_20).category, ProductCategory::Firewall);
        assert_eq!(decode(0x01_20_20).running, RunningStatus::Snoozed);
        assert_eq!(
            decode(0x01_20_20).signature,
            SignatureStatus::PartiallyOutOfDate
        );
        assert_eq!(decode(0x08_30_00).running, RunningStatus::Expired);
    }

    #[test]
    fn test_low_nibble_is_masked() {
        // 0x11 and 0x1F share the high nibble.
        assert_eq!(decode(0x04_1F_0F).running, RunningStatus::RunningUpToDate);
        assert_eq!(decode(0x04_1F_0F).signature, SignatureStatus::UpToDate);
    }

    #[test]
    fn test_unknown_status_bytes_keep_full_value() {
        let state = decode(0x04_4F_E1);
        assert_eq!(state.running.to_string(), "Unknown(0x4F)");
        assert_eq!(state.signature.to_string(), "Unknown(0xE1)");
    }

    #[test]
    fn test_parse_state_errors() {
        assert_eq!(
            parse_state("enabled"),
            Err(DecodeError::NotNumeric("enabled".to_string()))
        );
        assert_eq!(parse_state(""), Err(DecodeError::NotNumeric(String::new())));
        assert_eq!(
            parse_state("16777216"),
            Err(DecodeError::OutOfRange(16_777_216))
        );
        assert_eq!(parse_state(" 266240\r"), Ok(266_240));
    }

    #[test]
    fn test_every_byte_decodes_without_panicking() {
        for byte in 0..=u8::MAX {
            let value = u32::from_be_bytes([0, byte, byte, byte]);
            let state = decode(value);
            assert!(!state.category.to_string().is_empty());
            assert!(!state.running.to_string().is_empty());
            assert!(!state.signature.to_string().is_empty());
        }
    }
}
