//! Conversion of shell-supplied integers to transfer bytes
//!
//! The shell sends print data as a JSON array of numbers. Values in
//! `0..=255` are unsigned bytes and values in `-128..=-1` are signed bytes;
//! both map to the same 8-bit pattern. Anything else is governed by
//! [`OutOfRangePolicy`].

use crate::error::{PrinterError, Result};
use serde::{Deserialize, Serialize};

/// Handling of values that do not fit in a byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutOfRangePolicy {
    /// Reject the whole payload
    #[default]
    Strict,
    /// Keep the low 8 bits
    Truncate,
}

/// Convert a list of integers to bytes
pub fn to_bytes(values: &[i64], policy: OutOfRangePolicy) -> Result<Vec<u8>> {
    values
        .iter()
        .enumerate()
        .map(|(index, &value)| match value {
            0..=255 => Ok(value as u8),
            -128..=-1 => Ok(value as i8 as u8),
            _ => match policy {
                OutOfRangePolicy::Strict => Err(PrinterError::InvalidData { index, value }),
                OutOfRangePolicy::Truncate => Ok(value as u8),
            },
        })
        .collect()
}
