//! Typed resource values (`Res_value`).

use crate::apk::chunk::{Reader, WriteLe};
use crate::error::{FormatError, Result};

/// Encoded size of a [`ResValue`].
pub const RES_VALUE_LEN: usize = 8;

/// Value type tags used by this crate.
pub mod data_type {
    /// No value
    pub const NULL: u8 = 0x00;
    /// Reference to another resource
    pub const REFERENCE: u8 = 0x01;
    /// String pool index
    pub const STRING: u8 = 0x03;
    /// Decimal integer
    pub const INT_DEC: u8 = 0x10;
    /// Hexadecimal integer
    pub const INT_HEX: u8 = 0x11;
    /// Boolean
    pub const INT_BOOLEAN: u8 = 0x12;
}

/// A typed value as stored in attributes and resource entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResValue {
    /// Type tag
    pub data_type: u8,
    /// Payload
    pub data: u32,
}

impl ResValue {
    /// String value pointing into the owning document's string pool.
    pub fn string(index: u32) -> Self {
        Self {
            data_type: data_type::STRING,
            data: index,
        }
    }

    /// Decimal integer value.
    pub fn int_dec(value: u32) -> Self {
        Self {
            data_type: data_type::INT_DEC,
            data: value,
        }
    }

    /// Reference value.
    pub fn reference(id: u32) -> Self {
        Self {
            data_type: data_type::REFERENCE,
            data: id,
        }
    }

    /// Decode from a reader.
    pub fn read(r: &mut Reader<'_>) -> Result<Self> {
        let offset = r.position();
        let size = r.u16()?;
        let _res0 = r.bytes(1)?;
        let data_type = r.bytes(1)?[0];
        let data = r.u32()?;
        if size as usize != RES_VALUE_LEN {
            return Err(FormatError::BadHeader {
                what: "typed value",
                offset,
                reason: format!("value size {size}, expected {RES_VALUE_LEN}"),
            }
            .into());
        }
        Ok(Self { data_type, data })
    }

    /// Append the encoded value.
    pub fn write(&self, out: &mut Vec<u8>) {
        out.put_u16(RES_VALUE_LEN as u16);
        out.push(0);
        out.push(self.data_type);
        out.put_u32(self.data);
    }
}
