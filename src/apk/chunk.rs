//! Compiled resource chunk framing shared by the manifest and resource table codecs.
//!
//! Every chunk starts with an 8 byte header:
//!
//! | offset | size | field |
//! |--------|------|-------|
//! | 0 | 2 | chunk type |
//! | 2 | 2 | header size (including these 8 bytes) |
//! | 4 | 4 | total chunk size (header + body) |
//!
//! All integers are little-endian.

use crate::error::{FormatError, Result};

/// String pool chunk.
pub const RES_STRING_POOL_TYPE: u16 = 0x0001;
/// Resource table root chunk.
pub const RES_TABLE_TYPE: u16 = 0x0002;
/// Binary XML root chunk.
pub const RES_XML_TYPE: u16 = 0x0003;

/// First XML node chunk type.
pub const RES_XML_START_NAMESPACE_TYPE: u16 = 0x0100;
/// End of a namespace scope.
pub const RES_XML_END_NAMESPACE_TYPE: u16 = 0x0101;
/// Element start with attributes.
pub const RES_XML_START_ELEMENT_TYPE: u16 = 0x0102;
/// Element end.
pub const RES_XML_END_ELEMENT_TYPE: u16 = 0x0103;
/// Character data.
pub const RES_XML_CDATA_TYPE: u16 = 0x0104;
/// Attribute name to resource id map.
pub const RES_XML_RESOURCE_MAP_TYPE: u16 = 0x0180;

/// Package chunk in a resource table.
pub const RES_TABLE_PACKAGE_TYPE: u16 = 0x0200;
/// Type chunk (entries for one configuration).
pub const RES_TABLE_TYPE_TYPE: u16 = 0x0201;
/// Type spec chunk (configuration change flags).
pub const RES_TABLE_TYPE_SPEC_TYPE: u16 = 0x0202;
/// Shared library references.
pub const RES_TABLE_LIBRARY_TYPE: u16 = 0x0203;
/// Overlayable declaration.
pub const RES_TABLE_OVERLAYABLE_TYPE: u16 = 0x0204;
/// Overlayable policy.
pub const RES_TABLE_OVERLAYABLE_POLICY_TYPE: u16 = 0x0205;
/// Staged resource id aliases.
pub const RES_TABLE_STAGED_ALIAS_TYPE: u16 = 0x0206;

/// Size of the common chunk header.
pub const CHUNK_HEADER_LEN: usize = 8;

/// A chunk as found in the input: its header fields and byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawChunk<'a> {
    /// Chunk type
    pub chunk_type: u16,
    /// Header size
    pub header_size: usize,
    /// Offset of the chunk in the enclosing buffer
    pub offset: usize,
    /// Entire chunk including header
    pub bytes: &'a [u8],
}

impl<'a> RawChunk<'a> {
    /// Header bytes (including the common 8 byte header).
    pub fn header(&self) -> &'a [u8] {
        &self.bytes[..self.header_size]
    }

    /// Bytes following the header.
    pub fn body(&self) -> &'a [u8] {
        &self.bytes[self.header_size..]
    }
}

/// Little-endian cursor over a byte slice with structure-aware errors.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    what: &'static str,
}

impl<'a> Reader<'a> {
    /// New reader labelled `what` for error messages.
    pub fn new(data: &'a [u8], what: &'static str) -> Self {
        Self { data, pos: 0, what }
    }

    /// Current offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Whether the reader is exhausted.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Take the next `n` bytes.
    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(FormatError::Truncated {
                what: self.what,
                offset: self.pos,
                needed: n,
                available: self.remaining(),
            }
            .into());
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Read a `u16`.
    pub fn u16(&mut self) -> Result<u16> {
        let b = self.bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Read a `u32`.
    pub fn u32(&mut self) -> Result<u32> {
        let b = self.bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read the next chunk, validating its header against the remaining input.
    pub fn chunk(&mut self) -> Result<RawChunk<'a>> {
        let offset = self.pos;
        let mut peek = self.clone();
        let chunk_type = peek.u16()?;
        let header_size = peek.u16()? as usize;
        let size = peek.u32()? as usize;

        if header_size < CHUNK_HEADER_LEN || header_size > size {
            return Err(FormatError::BadHeader {
                what: self.what,
                offset,
                reason: format!("header size {header_size} with chunk size {size}"),
            }
            .into());
        }
        if size > self.remaining() {
            return Err(FormatError::BadHeader {
                what: self.what,
                offset,
                reason: format!(
                    "chunk size {size} exceeds the {} remaining bytes",
                    self.remaining()
                ),
            }
            .into());
        }
        let bytes = self.bytes(size)?;
        Ok(RawChunk {
            chunk_type,
            header_size,
            offset,
            bytes,
        })
    }

    /// Read the next chunk and require it to have `expected` type.
    pub fn expect_chunk(&mut self, expected: u16) -> Result<RawChunk<'a>> {
        let chunk = self.chunk()?;
        if chunk.chunk_type != expected {
            return Err(FormatError::UnexpectedChunk {
                what: self.what,
                chunk_type: chunk.chunk_type,
                offset: chunk.offset,
            }
            .into());
        }
        Ok(chunk)
    }
}

/// Little-endian append helpers.
pub trait WriteLe {
    /// Append a `u16`.
    fn put_u16(&mut self, v: u16);
    /// Append a `u32`.
    fn put_u32(&mut self, v: u32);
}

impl WriteLe for Vec<u8> {
    fn put_u16(&mut self, v: u16) {
        self.extend_from_slice(&v.to_le_bytes());
    }

    fn put_u32(&mut self, v: u32) {
        self.extend_from_slice(&v.to_le_bytes());
    }
}

/// Overwrite a `u32` at `offset`.
pub fn set_u32(buf: &mut [u8], offset: usize, v: u32) {
    buf[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
}

/// Assemble a chunk from its type, the header fields after the common 8 bytes,
/// and its body. Sizes are computed from the parts.
pub fn write_chunk(chunk_type: u16, header_extra: &[u8], body: &[u8]) -> Vec<u8> {
    let header_size = CHUNK_HEADER_LEN + header_extra.len();
    let size = header_size + body.len();
    let mut out = Vec::with_capacity(size);
    out.put_u16(chunk_type);
    out.put_u16(header_size as u16);
    out.put_u32(size as u32);
    out.extend_from_slice(header_extra);
    out.extend_from_slice(body);
    out
}
