//! Binary XML (compiled `AndroidManifest.xml`) codec and manifest patcher.
//!
//! The document is parsed into a string pool, an optional resource map and a
//! flat list of nodes. Patching changes attribute values only; new strings are
//! appended to the pool. Serialization recomputes every chunk size.

use crate::apk::chunk::{
    RES_STRING_POOL_TYPE, RES_XML_CDATA_TYPE, RES_XML_END_ELEMENT_TYPE,
    RES_XML_END_NAMESPACE_TYPE, RES_XML_RESOURCE_MAP_TYPE, RES_XML_START_ELEMENT_TYPE,
    RES_XML_START_NAMESPACE_TYPE, RES_XML_TYPE, RawChunk, Reader, WriteLe, write_chunk,
};
use crate::apk::string_pool::StringPool;
use crate::apk::value::{ResValue, data_type};
use crate::error::{FormatError, Result};

const WHAT: &str = "binary manifest";

/// Index value meaning "no string".
pub const NO_INDEX: u32 = u32::MAX;

/// Android attribute namespace.
pub const ANDROID_NS: &str = "http://schemas.android.com/apk/res/android";

/// Framework attribute ids.
pub mod attr {
    /// `android:label`
    pub const LABEL: u32 = 0x0101_0001;
    /// `android:authorities`
    pub const AUTHORITIES: u32 = 0x0101_0018;
    /// `android:versionCode`
    pub const VERSION_CODE: u32 = 0x0101_021b;
    /// `android:versionName`
    pub const VERSION_NAME: u32 = 0x0101_021c;
}

const NODE_HEADER_LEN: usize = 16;
const ATTRIBUTE_START: u16 = 20;
const ATTRIBUTE_LEN: u16 = 20;

/// Element attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    /// Namespace uri string index or [`NO_INDEX`]
    pub namespace: u32,
    /// Name string index
    pub name: u32,
    /// Raw string value index or [`NO_INDEX`]
    pub raw_value: u32,
    /// Typed value
    pub value: ResValue,
}

/// Element start with its attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlStartElement {
    /// Namespace uri string index or [`NO_INDEX`]
    pub namespace: u32,
    /// Element name string index
    pub name: u32,
    /// 1-based index of the `id` attribute, 0 if none
    pub id_index: u16,
    /// 1-based index of the `class` attribute, 0 if none
    pub class_index: u16,
    /// 1-based index of the `style` attribute, 0 if none
    pub style_index: u16,
    /// Attributes in file order
    pub attributes: Vec<XmlAttribute>,
}

/// Node payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNodeKind {
    /// Namespace scope start
    StartNamespace {
        /// Prefix string index
        prefix: u32,
        /// Uri string index
        uri: u32,
    },
    /// Namespace scope end
    EndNamespace {
        /// Prefix string index
        prefix: u32,
        /// Uri string index
        uri: u32,
    },
    /// Element start
    StartElement(XmlStartElement),
    /// Element end
    EndElement {
        /// Namespace uri string index or [`NO_INDEX`]
        namespace: u32,
        /// Element name string index
        name: u32,
    },
    /// Character data
    Cdata {
        /// Raw text string index
        data: u32,
        /// Typed value
        value: ResValue,
    },
}

/// A node with its source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlNode {
    /// Source line number
    pub line: u32,
    /// Comment string index or [`NO_INDEX`]
    pub comment: u32,
    /// Payload
    pub kind: XmlNodeKind,
}

/// Parsed binary XML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    /// Document string pool
    pub pool: StringPool,
    /// Resource ids of the first `resource_map.len()` pool strings
    pub resource_map: Option<Vec<u32>>,
    /// Nodes in document order
    pub nodes: Vec<XmlNode>,
}

impl XmlDocument {
    /// Parse a compiled XML document.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut top = Reader::new(bytes, WHAT);
        let root = top.expect_chunk(RES_XML_TYPE)?;

        let mut r = Reader::new(root.body(), WHAT);
        let pool_chunk = r.expect_chunk(RES_STRING_POOL_TYPE)?;
        let pool = StringPool::parse(&pool_chunk)?;

        let mut resource_map = None;
        let mut nodes = Vec::new();
        while !r.is_empty() {
            let chunk = r.chunk()?;
            match chunk.chunk_type {
                RES_XML_RESOURCE_MAP_TYPE if resource_map.is_none() && nodes.is_empty() => {
                    let mut ids = Reader::new(chunk.body(), WHAT);
                    let mut map = Vec::with_capacity(chunk.body().len() / 4);
                    while !ids.is_empty() {
                        map.push(ids.u32()?);
                    }
                    resource_map = Some(map);
                }
                RES_XML_START_NAMESPACE_TYPE
                | RES_XML_END_NAMESPACE_TYPE
                | RES_XML_START_ELEMENT_TYPE
                | RES_XML_END_ELEMENT_TYPE
                | RES_XML_CDATA_TYPE => nodes.push(parse_node(&chunk)?),
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

        let doc = Self {
            pool,
            resource_map,
            nodes,
        };
        doc.check_indices()?;
        Ok(doc)
    }

    /// Every string index used by a node must exist in the pool.
    fn check_indices(&self) -> Result<()> {
        let check = |index: u32| -> Result<()> {
            if index != NO_INDEX {
                self.pool.get(index)?;
            }
            Ok(())
        };
        for node in &self.nodes {
            check(node.comment)?;
            match &node.kind {
                XmlNodeKind::StartNamespace { prefix, uri }
                | XmlNodeKind::EndNamespace { prefix, uri } => {
                    check(*prefix)?;
                    check(*uri)?;
                }
                XmlNodeKind::StartElement(el) => {
                    check(el.namespace)?;
                    self.pool.get(el.name)?;
                    for a in &el.attributes {
                        check(a.namespace)?;
                        self.pool.get(a.name)?;
                        check(a.raw_value)?;
                        if a.value.data_type == data_type::STRING {
                            self.pool.get(a.value.data)?;
                        }
                    }
                }
                XmlNodeKind::EndElement { namespace, name } => {
                    check(*namespace)?;
                    self.pool.get(*name)?;
                }
                XmlNodeKind::Cdata { data, .. } => check(*data)?,
            }
        }
        Ok(())
    }

    /// Serialize the document, recomputing all sizes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut body = self.pool.encode()?;
        if let Some(map) = &self.resource_map {
            let mut ids = Vec::with_capacity(map.len() * 4);
            for id in map {
                ids.put_u32(*id);
            }
            body.extend_from_slice(&write_chunk(RES_XML_RESOURCE_MAP_TYPE, &[], &ids));
        }
        for node in &self.nodes {
            body.extend_from_slice(&encode_node(node));
        }
        Ok(write_chunk(RES_XML_TYPE, &[], &body))
    }

    /// Resource id mapped to a pool string, if any.
    pub fn resource_id(&self, string_index: u32) -> Option<u32> {
        self.resource_map
            .as_ref()
            .and_then(|map| map.get(string_index as usize).copied())
            .filter(|id| *id != 0)
    }

    /// Index of the first start-element node named `name`.
    pub fn find_element(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|node| match &node.kind {
            XmlNodeKind::StartElement(el) => self.pool.get(el.name).is_ok_and(|n| n == name),
            _ => false,
        })
    }

    fn element(&self, node: usize) -> Option<&XmlStartElement> {
        match &self.nodes.get(node)?.kind {
            XmlNodeKind::StartElement(el) => Some(el),
            _ => None,
        }
    }

    fn element_mut(&mut self, node: usize) -> Option<&mut XmlStartElement> {
        match &mut self.nodes.get_mut(node)?.kind {
            XmlNodeKind::StartElement(el) => Some(el),
            _ => None,
        }
    }

    /// Position of an attribute on an element.
    ///
    /// Framework attributes (`resource_id` given) match by mapped id, falling
    /// back to name plus android namespace. Plain attributes match by name with
    /// no namespace.
    pub fn find_attribute(&self, node: usize, name: &str, resource_id: Option<u32>) -> Option<usize> {
        let el = self.element(node)?;
        el.attributes.iter().position(|a| {
            let name_matches = self.pool.get(a.name).is_ok_and(|n| n == name);
            match resource_id {
                Some(id) => {
                    self.resource_id(a.name) == Some(id)
                        || (name_matches
                            && self.pool.get_opt(a.namespace).ok().flatten() == Some(ANDROID_NS))
                }
                None => name_matches && a.namespace == NO_INDEX,
            }
        })
    }

    /// String value of an attribute, if it holds one.
    pub fn attribute_string(&self, node: usize, attr: usize) -> Option<&str> {
        let a = self.element(node)?.attributes.get(attr)?;
        let index = if a.value.data_type == data_type::STRING {
            a.value.data
        } else {
            a.raw_value
        };
        self.pool.get_opt(index).ok().flatten()
    }

    /// Typed value of an attribute.
    pub fn attribute_value(&self, node: usize, attr: usize) -> Option<ResValue> {
        Some(self.element(node)?.attributes.get(attr)?.value)
    }

    /// Set an attribute to a literal string.
    pub fn set_attribute_string(&mut self, node: usize, attr: usize, value: &str) -> Result<()> {
        let index = self.pool.intern(value);
        let a = self.attribute_mut(node, attr)?;
        a.raw_value = index;
        a.value = ResValue::string(index);
        Ok(())
    }

    /// Set an attribute to a decimal integer.
    pub fn set_attribute_int(&mut self, node: usize, attr: usize, value: u32) -> Result<()> {
        let a = self.attribute_mut(node, attr)?;
        a.raw_value = NO_INDEX;
        a.value = ResValue::int_dec(value);
        Ok(())
    }

    fn attribute_mut(&mut self, node: usize, attr: usize) -> Result<&mut XmlAttribute> {
        self.element_mut(node)
            .and_then(|el| el.attributes.get_mut(attr))
            .ok_or_else(|| {
                FormatError::Missing {
                    what: WHAT,
                    item: format!("attribute {attr} of node {node}"),
                }
                .into()
            })
    }

    fn require_attribute(
        &self,
        node: usize,
        element: &str,
        name: &str,
        resource_id: Option<u32>,
    ) -> Result<usize> {
        self.find_attribute(node, name, resource_id).ok_or_else(|| {
            FormatError::Missing {
                what: WHAT,
                item: format!("{element}@{name}"),
            }
            .into()
        })
    }

    fn require_element(&self, name: &str) -> Result<usize> {
        self.find_element(name).ok_or_else(|| {
            FormatError::Missing {
                what: WHAT,
                item: format!("<{name}> element"),
            }
            .into()
        })
    }

    /// Package declared by the `<manifest>` element.
    pub fn package_name(&self) -> Result<&str> {
        let manifest = self.require_element("manifest")?;
        let attr = self.require_attribute(manifest, "manifest", "package", None)?;
        self.attribute_string(manifest, attr).ok_or_else(|| {
            FormatError::Missing {
                what: WHAT,
                item: "string value of manifest@package".to_string(),
            }
            .into()
        })
    }
}

fn parse_node(chunk: &RawChunk<'_>) -> Result<XmlNode> {
    if chunk.header_size != NODE_HEADER_LEN {
        return Err(FormatError::BadHeader {
            what: WHAT,
            offset: chunk.offset,
            reason: format!(
                "node header size {}, expected {NODE_HEADER_LEN}",
                chunk.header_size
            ),
        }
        .into());
    }
    let mut header = Reader::new(chunk.header(), WHAT);
    header.bytes(8)?;
    let line = header.u32()?;
    let comment = header.u32()?;

    let mut r = Reader::new(chunk.body(), WHAT);
    let kind = match chunk.chunk_type {
        RES_XML_START_NAMESPACE_TYPE => XmlNodeKind::StartNamespace {
            prefix: r.u32()?,
            uri: r.u32()?,
        },
        RES_XML_END_NAMESPACE_TYPE => XmlNodeKind::EndNamespace {
            prefix: r.u32()?,
            uri: r.u32()?,
        },
        RES_XML_END_ELEMENT_TYPE => XmlNodeKind::EndElement {
            namespace: r.u32()?,
            name: r.u32()?,
        },
        RES_XML_CDATA_TYPE => XmlNodeKind::Cdata {
            data: r.u32()?,
            value: ResValue::read(&mut r)?,
        },
        RES_XML_START_ELEMENT_TYPE => {
            let namespace = r.u32()?;
            let name = r.u32()?;
            let attribute_start = r.u16()?;
            let attribute_size = r.u16()?;
            let attribute_count = r.u16()?;
            let id_index = r.u16()?;
            let class_index = r.u16()?;
            let style_index = r.u16()?;
            if attribute_start != ATTRIBUTE_START || attribute_size != ATTRIBUTE_LEN {
                return Err(FormatError::BadHeader {
                    what: WHAT,
                    offset: chunk.offset,
                    reason: format!(
                        "attribute layout start={attribute_start} size={attribute_size}"
                    ),
                }
                .into());
            }
            let mut attributes = Vec::with_capacity(attribute_count as usize);
            for _ in 0..attribute_count {
                attributes.push(XmlAttribute {
                    namespace: r.u32()?,
                    name: r.u32()?,
                    raw_value: r.u32()?,
                    value: ResValue::read(&mut r)?,
                });
            }
            XmlNodeKind::StartElement(XmlStartElement {
                namespace,
                name,
                id_index,
                class_index,
                style_index,
                attributes,
            })
        }
        other => {
            return Err(FormatError::UnexpectedChunk {
                what: WHAT,
                chunk_type: other,
                offset: chunk.offset,
            }
            .into());
        }
    };
    if !r.is_empty() {
        return Err(FormatError::BadHeader {
            what: WHAT,
            offset: chunk.offset,
            reason: format!("{} trailing bytes in node", r.remaining()),
        }
        .into());
    }
    Ok(XmlNode {
        line,
        comment,
        kind,
    })
}

fn encode_node(node: &XmlNode) -> Vec<u8> {
    let mut header = Vec::with_capacity(8);
    header.put_u32(node.line);
    header.put_u32(node.comment);

    let mut body = Vec::new();
    let chunk_type = match &node.kind {
        XmlNodeKind::StartNamespace { prefix, uri } => {
            body.put_u32(*prefix);
            body.put_u32(*uri);
            RES_XML_START_NAMESPACE_TYPE
        }
        XmlNodeKind::EndNamespace { prefix, uri } => {
            body.put_u32(*prefix);
            body.put_u32(*uri);
            RES_XML_END_NAMESPACE_TYPE
        }
        XmlNodeKind::EndElement { namespace, name } => {
            body.put_u32(*namespace);
            body.put_u32(*name);
            RES_XML_END_ELEMENT_TYPE
        }
        XmlNodeKind::Cdata { data, value } => {
            body.put_u32(*data);
            value.write(&mut body);
            RES_XML_CDATA_TYPE
        }
        XmlNodeKind::StartElement(el) => {
            body.put_u32(el.namespace);
            body.put_u32(el.name);
            body.put_u16(ATTRIBUTE_START);
            body.put_u16(ATTRIBUTE_LEN);
            body.put_u16(el.attributes.len() as u16);
            body.put_u16(el.id_index);
            body.put_u16(el.class_index);
            body.put_u16(el.style_index);
            for a in &el.attributes {
                body.put_u32(a.namespace);
                body.put_u32(a.name);
                body.put_u32(a.raw_value);
                a.value.write(&mut body);
            }
            RES_XML_START_ELEMENT_TYPE
        }
    };
    write_chunk(chunk_type, &header, &body)
}

/// Identity written into the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestIdentity {
    /// New package name
    pub package_name: String,
    /// New `android:versionName`
    pub version_name: String,
    /// New `android:versionCode`
    pub version_code: u32,
    /// New `application@android:label`
    pub app_label: String,
}

/// Result of patching a manifest.
#[derive(Debug, Clone)]
pub struct PatchedManifest {
    /// Package name the template declared
    pub old_package: String,
    /// Patched document bytes
    pub bytes: Vec<u8>,
    /// Number of authority entries rewritten
    pub authorities_rewritten: usize,
}

/// Rewrite package, version and label of a compiled manifest.
///
/// Content provider authorities that start with the old package name are
/// moved to the new one so installs do not collide with the template.
pub fn patch_manifest(bytes: &[u8], identity: &ManifestIdentity) -> Result<PatchedManifest> {
    let mut doc = XmlDocument::parse(bytes)?;
    let old_package = doc.package_name()?.to_string();

    let manifest = doc.require_element("manifest")?;
    let package = doc.require_attribute(manifest, "manifest", "package", None)?;
    let version_code =
        doc.require_attribute(manifest, "manifest", "versionCode", Some(attr::VERSION_CODE))?;
    let version_name =
        doc.require_attribute(manifest, "manifest", "versionName", Some(attr::VERSION_NAME))?;
    let application = doc.require_element("application")?;
    let label = doc.require_attribute(application, "application", "label", Some(attr::LABEL))?;

    doc.set_attribute_string(manifest, package, &identity.package_name)?;
    doc.set_attribute_int(manifest, version_code, identity.version_code)?;
    doc.set_attribute_string(manifest, version_name, &identity.version_name)?;
    doc.set_attribute_string(application, label, &identity.app_label)?;

    let authorities_rewritten =
        rewrite_authorities(&mut doc, &old_package, &identity.package_name)?;

    log::debug!(
        "Patched manifest: {} -> {} (v{} {}), {} authorities moved",
        old_package,
        identity.package_name,
        identity.version_code,
        identity.version_name,
        authorities_rewritten
    );

    Ok(PatchedManifest {
        old_package,
        bytes: doc.encode()?,
        authorities_rewritten,
    })
}

fn rewrite_authorities(doc: &mut XmlDocument, old: &str, new: &str) -> Result<usize> {
    if old == new {
        return Ok(0);
    }
    let mut edits = Vec::new();
    let mut count = 0;
    for node in 0..doc.nodes.len() {
        let Some(attr) = doc.find_attribute(node, "authorities", Some(attr::AUTHORITIES)) else {
            continue;
        };
        let Some(value) = doc.attribute_string(node, attr) else {
            continue;
        };
        let mut changed = 0;
        let rewritten: Vec<String> = value
            .split(';')
            .map(|authority| match authority.strip_prefix(old) {
                Some(rest) if rest.is_empty() || rest.starts_with('.') => {
                    changed += 1;
                    format!("{new}{rest}")
                }
                _ => authority.to_string(),
            })
            .collect();
        if changed > 0 {
            count += changed;
            edits.push((node, attr, rewritten.join(";")));
        }
    }
    for (node, attr, value) in edits {
        doc.set_attribute_string(node, attr, &value)?;
    }
    Ok(count)
}
