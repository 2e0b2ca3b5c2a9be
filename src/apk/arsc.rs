//! Resource table (`resources.arsc`) codec and package rename.
//!
//! Only the table, package and library structures are decoded. Type and type
//! spec chunks are carried as opaque bytes; their layout does not depend on the
//! package name.

use crate::apk::chunk::{
    RES_STRING_POOL_TYPE, RES_TABLE_LIBRARY_TYPE, RES_TABLE_OVERLAYABLE_TYPE,
    RES_TABLE_PACKAGE_TYPE, RES_TABLE_STAGED_ALIAS_TYPE, RES_TABLE_TYPE,
    RES_TABLE_TYPE_SPEC_TYPE, RES_TABLE_TYPE_TYPE, RawChunk, Reader, WriteLe, write_chunk,
};
use crate::apk::string_pool::StringPool;
use crate::config::MAX_PACKAGE_NAME_LEN;
use crate::error::{FormatError, Result, ValidationError};

const WHAT: &str = "resource table";

/// Package name field width in UTF-16 units.
pub const PACKAGE_NAME_UNITS: usize = 128;

/// Package header size before `typeIdOffset` was added.
const PACKAGE_HEADER_V0: usize = 284;
/// Package header size with `typeIdOffset`.
const PACKAGE_HEADER_V1: usize = 288;

/// Library chunk header: common header plus entry count.
const LIBRARY_HEADER_LEN: usize = 12;
const LIBRARY_ENTRY_LEN: usize = 4 + 2 * PACKAGE_NAME_UNITS;

/// Shared library reference inside a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryEntry {
    /// Assigned package id
    pub package_id: u32,
    /// Library package name
    pub package_name: String,
}

/// A child chunk of a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageChunk {
    /// Library references, decoded because they carry package names
    Library(Vec<LibraryEntry>),
    /// Type, type spec, overlayable and staged alias chunks, kept verbatim
    Opaque(Vec<u8>),
}

/// A package in the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePackage {
    /// Package id (0x7f for applications)
    pub id: u32,
    /// Package name
    pub name: String,
    /// Type names pool
    pub type_strings: StringPool,
    /// Entry key pool
    pub key_strings: StringPool,
    /// `lastPublicType` header field
    pub last_public_type: u32,
    /// `lastPublicKey` header field
    pub last_public_key: u32,
    /// `typeIdOffset`, present in newer headers
    pub type_id_offset: Option<u32>,
    /// Child chunks in file order
    pub chunks: Vec<PackageChunk>,
}

/// Parsed resource table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTable {
    /// Global value string pool
    pub strings: StringPool,
    /// Packages in file order
    pub packages: Vec<ResourcePackage>,
}

impl ResourceTable {
    /// Parse a resource table.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut top = Reader::new(bytes, WHAT);
        let root = top.expect_chunk(RES_TABLE_TYPE)?;
        let mut header = Reader::new(root.header(), WHAT);
        header.bytes(8)?;
        let package_count = header.u32()? as usize;

        let mut strings = None;
        let mut packages = Vec::with_capacity(package_count);
        let mut r = Reader::new(root.body(), WHAT);
        while !r.is_empty() {
            let chunk = r.chunk()?;
            match chunk.chunk_type {
                RES_STRING_POOL_TYPE if strings.is_none() => {
                    strings = Some(StringPool::parse(&chunk)?);
                }
                RES_TABLE_PACKAGE_TYPE => packages.push(parse_package(&chunk)?),
                other => {
                    return Err(FormatError::UnexpectedChunk {
                        what: WHAT,
                        chunk_type: other,
                        offset: chunk.offset,
                    }
                    .into());
                }
            }
        }

        if packages.len() != package_count {
            return Err(FormatError::BadHeader {
                what: WHAT,
                offset: 0,
                reason: format!(
                    "header declares {package_count} packages, found {}",
                    packages.len()
                ),
            }
            .into());
        }
        let strings = strings.ok_or_else(|| FormatError::Missing {
            what: WHAT,
            item: "global string pool".to_string(),
        })?;
        Ok(Self { strings, packages })
    }

    /// Serialize the table, recomputing sizes and pool offsets.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut body = self.strings.encode()?;
        for package in &self.packages {
            body.extend_from_slice(&package.encode()?);
        }
        let mut header = Vec::with_capacity(4);
        header.put_u32(self.packages.len() as u32);
        Ok(write_chunk(RES_TABLE_TYPE, &header, &body))
    }

    /// Name of the first package.
    pub fn package_name(&self) -> Option<&str> {
        self.packages.first().map(|p| p.name.as_str())
    }

    /// Rename a package and every library reference to it.
    ///
    /// With `old` absent the first package is renamed. Returns the name that was
    /// replaced.
    pub fn rename_package(&mut self, old: Option<&str>, new: &str) -> Result<String> {
        check_name(new)?;
        let target = match old {
            Some(old) => self
                .packages
                .iter_mut()
                .find(|p| p.name == old)
                .ok_or_else(|| FormatError::Missing {
                    what: WHAT,
                    item: format!("package {old}"),
                })?,
            None => self.packages.first_mut().ok_or_else(|| FormatError::Missing {
                what: WHAT,
                item: "package chunk".to_string(),
            })?,
        };
        let previous = std::mem::replace(&mut target.name, new.to_string());

        for package in &mut self.packages {
            for chunk in &mut package.chunks {
                if let PackageChunk::Library(entries) = chunk {
                    for entry in entries.iter_mut().filter(|e| e.package_name == previous) {
                        entry.package_name = new.to_string();
                    }
                }
            }
        }
        Ok(previous)
    }
}

impl ResourcePackage {
    fn encode(&self) -> Result<Vec<u8>> {
        let header_size = if self.type_id_offset.is_some() {
            PACKAGE_HEADER_V1
        } else {
            PACKAGE_HEADER_V0
        };
        let type_pool = self.type_strings.encode()?;
        let key_pool = self.key_strings.encode()?;

        let mut header = Vec::with_capacity(header_size - 8);
        header.put_u32(self.id);
        put_name(&mut header, &self.name)?;
        header.put_u32(header_size as u32);
        header.put_u32(self.last_public_type);
        header.put_u32((header_size + type_pool.len()) as u32);
        header.put_u32(self.last_public_key);
        if let Some(offset) = self.type_id_offset {
            header.put_u32(offset);
        }

        let mut body = type_pool;
        body.extend_from_slice(&key_pool);
        for chunk in &self.chunks {
            match chunk {
                PackageChunk::Opaque(bytes) => body.extend_from_slice(bytes),
                PackageChunk::Library(entries) => body.extend_from_slice(&encode_library(entries)?),
            }
        }
        Ok(write_chunk(RES_TABLE_PACKAGE_TYPE, &header, &body))
    }
}

fn parse_package(chunk: &RawChunk<'_>) -> Result<ResourcePackage> {
    if chunk.header_size != PACKAGE_HEADER_V0 && chunk.header_size != PACKAGE_HEADER_V1 {
        return Err(FormatError::BadHeader {
            what: WHAT,
            offset: chunk.offset,
            reason: format!("package header size {}", chunk.header_size),
        }
        .into());
    }
    let mut h = Reader::new(chunk.header(), WHAT);
    h.bytes(8)?;
    let id = h.u32()?;
    let name = read_name(&mut h)?;
    let type_strings_at = h.u32()? as usize;
    let last_public_type = h.u32()?;
    let key_strings_at = h.u32()? as usize;
    let last_public_key = h.u32()?;
    let type_id_offset = if chunk.header_size == PACKAGE_HEADER_V1 {
        Some(h.u32()?)
    } else {
        None
    };

    let mut type_strings = None;
    let mut key_strings = None;
    let mut chunks = Vec::new();
    let mut r = Reader::new(chunk.body(), WHAT);
    while !r.is_empty() {
        let at = chunk.header_size + r.position();
        let child = r.chunk()?;
        match child.chunk_type {
            RES_STRING_POOL_TYPE if at == type_strings_at => {
                type_strings = Some(StringPool::parse(&child)?);
            }
            RES_STRING_POOL_TYPE if at == key_strings_at => {
                key_strings = Some(StringPool::parse(&child)?);
            }
            RES_TABLE_LIBRARY_TYPE => chunks.push(PackageChunk::Library(parse_library(&child)?)),
            RES_TABLE_TYPE_TYPE
            | RES_TABLE_TYPE_SPEC_TYPE
            | RES_TABLE_OVERLAYABLE_TYPE
            | RES_TABLE_STAGED_ALIAS_TYPE => chunks.push(PackageChunk::Opaque(child.bytes.to_vec())),
            other => {
                return Err(FormatError::UnexpectedChunk {
                    what: WHAT,
                    chunk_type: other,
                    offset: chunk.offset + at,
                }
                .into());
            }
        }
    }

    let missing = |item: &str| FormatError::Missing {
        what: WHAT,
        item: format!("{item} of package {name}"),
    };
    Ok(ResourcePackage {
        id,
        type_strings: type_strings.ok_or_else(|| missing("type strings"))?,
        key_strings: key_strings.ok_or_else(|| missing("key strings"))?,
        name,
        last_public_type,
        last_public_key,
        type_id_offset,
        chunks,
    })
}

fn parse_library(chunk: &RawChunk<'_>) -> Result<Vec<LibraryEntry>> {
    if chunk.header_size != LIBRARY_HEADER_LEN {
        return Err(FormatError::BadHeader {
            what: WHAT,
            offset: chunk.offset,
            reason: format!("library header size {}", chunk.header_size),
        }
        .into());
    }
    let mut h = Reader::new(chunk.header(), WHAT);
    h.bytes(8)?;
    let count = h.u32()? as usize;
    let mut r = Reader::new(chunk.body(), WHAT);
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        entries.push(LibraryEntry {
            package_id: r.u32()?,
            package_name: read_name(&mut r)?,
        });
    }
    Ok(entries)
}

fn encode_library(entries: &[LibraryEntry]) -> Result<Vec<u8>> {
    let mut header = Vec::with_capacity(4);
    header.put_u32(entries.len() as u32);
    let mut body = Vec::with_capacity(entries.len() * LIBRARY_ENTRY_LEN);
    for entry in entries {
        body.put_u32(entry.package_id);
        put_name(&mut body, &entry.package_name)?;
    }
    Ok(write_chunk(RES_TABLE_LIBRARY_TYPE, &header, &body))
}

fn read_name(r: &mut Reader<'_>) -> Result<String> {
    let raw = r.bytes(2 * PACKAGE_NAME_UNITS)?;
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .take_while(|u| *u != 0)
        .collect();
    String::from_utf16(&units).map_err(|e| {
        FormatError::BadString {
            what: WHAT,
            reason: format!("package name: {e}"),
        }
        .into()
    })
}

fn check_name(name: &str) -> Result<()> {
    let len = name.encode_utf16().count();
    if len > MAX_PACKAGE_NAME_LEN {
        return Err(ValidationError::PackageNameTooLong {
            name: name.to_string(),
            len,
            max: MAX_PACKAGE_NAME_LEN,
        }
        .into());
    }
    Ok(())
}

/// Write a NUL-padded fixed-width name.
fn put_name(out: &mut Vec<u8>, name: &str) -> Result<()> {
    check_name(name)?;
    let mut written = 0;
    for unit in name.encode_utf16() {
        out.put_u16(unit);
        written += 1;
    }
    for _ in written..PACKAGE_NAME_UNITS {
        out.put_u16(0);
    }
    Ok(())
}

/// Rename the package of an encoded resource table.
///
/// Returns the patched bytes and the name that was replaced. Everything except
/// the package name fields is preserved byte for byte.
pub fn patch_resource_table(bytes: &[u8], old: Option<&str>, new: &str) -> Result<(Vec<u8>, String)> {
    let mut table = ResourceTable::parse(bytes)?;
    let previous = table.rename_package(old, new)?;
    log::debug!("Renamed resource package {} -> {}", previous, new);
    Ok((table.encode()?, previous))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::Error;

    fn opaque(chunk_type: u16) -> PackageChunk {
        let mut header = Vec::new();
        header.put_u32(0x0000_0001);
        PackageChunk::Opaque(write_chunk(chunk_type, &header, &[1, 2, 3, 4, 5, 6, 7, 8]))
    }

    pub(crate) fn sample_table(package: &str) -> Vec<u8> {
        let table = ResourceTable {
            strings: StringPool::from_strings(["res/mipmap/ic_launcher.png", "Template"], true),
            packages: vec![ResourcePackage {
                id: 0x7f,
                name: package.to_string(),
                type_strings: StringPool::from_strings(["mipmap", "string"], false),
                key_strings: StringPool::from_strings(["ic_launcher", "app_name"], true),
                last_public_type: 0,
                last_public_key: 0,
                type_id_offset: Some(0),
                chunks: vec![
                    opaque(RES_TABLE_TYPE_SPEC_TYPE),
                    opaque(RES_TABLE_TYPE_TYPE),
                    PackageChunk::Library(vec![LibraryEntry {
                        package_id: 0x7f,
                        package_name: package.to_string(),
                    }]),
                ],
            }],
        };
        table.encode().unwrap()
    }

    #[test]
    fn test_parse_encode_is_identity() {
        let bytes = sample_table("org.template.app");
        let table = ResourceTable::parse(&bytes).unwrap();
        assert_eq!(table.package_name(), Some("org.template.app"));
        assert_eq!(table.encode().unwrap(), bytes);
    }

    #[test]
    fn test_rename_changes_only_names() {
        let bytes = sample_table("org.template.app");
        let (patched, previous) =
            patch_resource_table(&bytes, Some("org.template.app"), "com.acme.tool").unwrap();
        assert_eq!(previous, "org.template.app");
        assert_eq!(patched.len(), bytes.len());
        assert_eq!(patched, sample_table("com.acme.tool"));

        let table = ResourceTable::parse(&patched).unwrap();
        let PackageChunk::Library(entries) = &table.packages[0].chunks[2] else {
            panic!("library chunk expected");
        };
        assert_eq!(entries[0].package_name, "com.acme.tool");
    }

    #[test]
    fn test_rename_without_old_name_uses_first_package() {
        let bytes = sample_table("org.template.app");
        let (_, previous) = patch_resource_table(&bytes, None, "com.acme.tool").unwrap();
        assert_eq!(previous, "org.template.app");
    }

    #[test]
    fn test_rename_unknown_package_fails() {
        let bytes = sample_table("org.template.app");
        let err = patch_resource_table(&bytes, Some("nope"), "com.acme.tool").unwrap_err();
        assert!(matches!(err, Error::Format(FormatError::Missing { .. })));
    }

    #[test]
    fn test_overlong_name_is_rejected() {
        let bytes = sample_table("org.template.app");
        let long = format!("a.{}", "b".repeat(200));
        let err = patch_resource_table(&bytes, None, &long).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::PackageNameTooLong { .. })
        ));
    }

    #[test]
    fn test_unknown_package_child_is_fatal() {
        let mut table = ResourceTable::parse(&sample_table("org.template.app")).unwrap();
        table.packages[0].chunks.push(opaque(0x02ff));
        let bytes = table.encode().unwrap();
        let err = ResourceTable::parse(&bytes).unwrap_err();
        assert!(matches!(
            err,
            Error::Format(FormatError::UnexpectedChunk {
                chunk_type: 0x02ff,
                ..
            })
        ));
    }
}
