//! String pool chunk codec.
//!
//! Pools are decoded fully so structure errors surface at parse time. A pool
//! that is never modified is re-emitted from its original bytes, which keeps
//! deduplicated string data and padding exactly as the input had them.

use crate::apk::chunk::{RES_STRING_POOL_TYPE, RawChunk, Reader, WriteLe, write_chunk};
use crate::error::{FormatError, Result};

/// Pool strings are sorted.
pub const SORTED_FLAG: u32 = 1 << 0;
/// Pool strings are UTF-8 (otherwise UTF-16).
pub const UTF8_FLAG: u32 = 1 << 8;

const WHAT: &str = "string pool";

/// Decoded string pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringPool {
    strings: Vec<String>,
    flags: u32,
    style_offsets: Vec<u32>,
    style_data: Vec<u8>,
    raw: Option<Vec<u8>>,
}

impl StringPool {
    /// Empty pool using the given encoding.
    pub fn new(utf8: bool) -> Self {
        Self {
            strings: Vec::new(),
            flags: if utf8 { UTF8_FLAG } else { 0 },
            style_offsets: Vec::new(),
            style_data: Vec::new(),
            raw: None,
        }
    }

    /// Pool holding `strings`, in order.
    pub fn from_strings<I, S>(strings: I, utf8: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut pool = Self::new(utf8);
        pool.strings = strings.into_iter().map(Into::into).collect();
        pool
    }

    /// Decode a string pool chunk.
    pub fn parse(chunk: &RawChunk<'_>) -> Result<Self> {
        if chunk.chunk_type != RES_STRING_POOL_TYPE {
            return Err(FormatError::UnexpectedChunk {
                what: WHAT,
                chunk_type: chunk.chunk_type,
                offset: chunk.offset,
            }
            .into());
        }
        let mut header = Reader::new(chunk.header(), WHAT);
        header.bytes(8)?;
        let string_count = header.u32()? as usize;
        let style_count = header.u32()? as usize;
        let flags = header.u32()?;
        let strings_start = header.u32()? as usize;
        let styles_start = header.u32()? as usize;

        let bytes = chunk.bytes;
        let mut offsets = Reader::new(&bytes[chunk.header_size..], WHAT);
        let string_offsets = (0..string_count)
            .map(|_| offsets.u32())
            .collect::<Result<Vec<_>>>()?;
        let style_offsets = (0..style_count)
            .map(|_| offsets.u32())
            .collect::<Result<Vec<_>>>()?;

        let strings_end = if style_count > 0 { styles_start } else { bytes.len() };
        if string_count > 0 && (strings_start > strings_end || strings_end > bytes.len()) {
            return Err(bad_header(chunk.offset, "string data out of bounds"));
        }
        let utf8 = flags & UTF8_FLAG != 0;
        let data = if string_count > 0 {
            &bytes[strings_start..strings_end]
        } else {
            &[][..]
        };
        let strings = string_offsets
            .iter()
            .map(|&off| decode_string(data, off as usize, utf8))
            .collect::<Result<Vec<_>>>()?;

        let style_data = if style_count > 0 {
            if styles_start > bytes.len() {
                return Err(bad_header(chunk.offset, "style data out of bounds"));
            }
            bytes[styles_start..].to_vec()
        } else {
            Vec::new()
        };

        Ok(Self {
            strings,
            flags,
            style_offsets,
            style_data,
            raw: Some(bytes.to_vec()),
        })
    }

    /// Number of strings.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Whether strings are stored as UTF-8.
    pub fn is_utf8(&self) -> bool {
        self.flags & UTF8_FLAG != 0
    }

    /// Whether the pool has not been modified since parsing.
    pub fn is_pristine(&self) -> bool {
        self.raw.is_some()
    }

    /// String at `index`.
    pub fn get(&self, index: u32) -> Result<&str> {
        self.strings
            .get(index as usize)
            .map(String::as_str)
            .ok_or_else(|| {
                FormatError::StringIndex {
                    what: WHAT,
                    index,
                    len: self.strings.len(),
                }
                .into()
            })
    }

    /// String at `index`, or `None` for the "no string" marker `0xFFFFFFFF`.
    pub fn get_opt(&self, index: u32) -> Result<Option<&str>> {
        if index == u32::MAX {
            Ok(None)
        } else {
            self.get(index).map(Some)
        }
    }

    /// Index of the first string equal to `s`.
    pub fn find(&self, s: &str) -> Option<u32> {
        self.strings.iter().position(|x| x == s).map(|i| i as u32)
    }

    /// Append a string and return its index.
    ///
    /// Appending never moves existing strings, so indices aligned with a
    /// resource map stay valid.
    pub fn push(&mut self, s: impl Into<String>) -> u32 {
        self.invalidate();
        self.flags &= !SORTED_FLAG;
        self.strings.push(s.into());
        (self.strings.len() - 1) as u32
    }

    /// Index of `s`, appending it when absent.
    pub fn intern(&mut self, s: &str) -> u32 {
        match self.find(s) {
            Some(i) => i,
            None => self.push(s),
        }
    }

    /// Iterate over all strings.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(String::as_str)
    }

    fn invalidate(&mut self) {
        self.raw = None;
    }

    /// Encode the pool as a chunk.
    pub fn encode(&self) -> Result<Vec<u8>> {
        if let Some(raw) = &self.raw {
            return Ok(raw.clone());
        }
        let utf8 = self.is_utf8();
        let mut offsets = Vec::with_capacity(self.strings.len());
        let mut data = Vec::new();
        for s in &self.strings {
            offsets.push(data.len() as u32);
            encode_string(&mut data, s, utf8)?;
        }
        while data.len() % 4 != 0 {
            data.push(0);
        }

        const HEADER_LEN: usize = 28;
        let index_len = 4 * (self.strings.len() + self.style_offsets.len());
        let strings_start = if self.strings.is_empty() {
            0
        } else {
            HEADER_LEN + index_len
        };
        let styles_start = if self.style_offsets.is_empty() {
            0
        } else {
            HEADER_LEN + index_len + data.len()
        };

        let mut header = Vec::with_capacity(HEADER_LEN - 8);
        header.put_u32(self.strings.len() as u32);
        header.put_u32(self.style_offsets.len() as u32);
        header.put_u32(self.flags);
        header.put_u32(strings_start as u32);
        header.put_u32(styles_start as u32);

        let mut body = Vec::with_capacity(index_len + data.len() + self.style_data.len());
        for off in &offsets {
            body.put_u32(*off);
        }
        for off in &self.style_offsets {
            body.put_u32(*off);
        }
        body.extend_from_slice(&data);
        body.extend_from_slice(&self.style_data);

        Ok(write_chunk(RES_STRING_POOL_TYPE, &header, &body))
    }
}

fn bad_header(offset: usize, reason: &str) -> crate::error::Error {
    FormatError::BadHeader {
        what: WHAT,
        offset,
        reason: reason.to_string(),
    }
    .into()
}

fn bad_string(reason: impl Into<String>) -> crate::error::Error {
    FormatError::BadString {
        what: WHAT,
        reason: reason.into(),
    }
    .into()
}

fn decode_string(data: &[u8], offset: usize, utf8: bool) -> Result<String> {
    if offset > data.len() {
        return Err(bad_string(format!("offset {offset} past string data")));
    }
    let mut r = Reader::new(&data[offset..], WHAT);
    if utf8 {
        let _utf16_len = utf8_length(&mut r)?;
        let byte_len = utf8_length(&mut r)?;
        let bytes = r.bytes(byte_len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| bad_string(e.to_string()))
    } else {
        let first = r.u16()? as usize;
        let len = if first & 0x8000 != 0 {
            ((first & 0x7fff) << 16) | r.u16()? as usize
        } else {
            first
        };
        let units = (0..len).map(|_| r.u16()).collect::<Result<Vec<_>>>()?;
        String::from_utf16(&units).map_err(|e| bad_string(e.to_string()))
    }
}

fn utf8_length(r: &mut Reader<'_>) -> Result<usize> {
    let first = r.bytes(1)?[0] as usize;
    if first & 0x80 != 0 {
        let second = r.bytes(1)?[0] as usize;
        Ok(((first & 0x7f) << 8) | second)
    } else {
        Ok(first)
    }
}

fn put_utf8_length(out: &mut Vec<u8>, len: usize) -> Result<()> {
    if len > 0x7fff {
        return Err(bad_string(format!("string of length {len} is too long")));
    }
    if len > 0x7f {
        out.push(((len >> 8) as u8) | 0x80);
    }
    out.push((len & 0xff) as u8);
    Ok(())
}

fn encode_string(out: &mut Vec<u8>, s: &str, utf8: bool) -> Result<()> {
    if utf8 {
        put_utf8_length(out, s.encode_utf16().count())?;
        put_utf8_length(out, s.len())?;
        out.extend_from_slice(s.as_bytes());
        out.push(0);
    } else {
        let units: Vec<u16> = s.encode_utf16().collect();
        if units.len() > 0x7fff {
            out.put_u16(((units.len() >> 16) as u16) | 0x8000);
        }
        out.put_u16((units.len() & 0xffff) as u16);
        for unit in units {
            out.put_u16(unit);
        }
        out.put_u16(0);
    }
    Ok(())
}
