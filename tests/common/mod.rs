//! Shared fixtures: a minimal template package and script projects.
#![allow(dead_code)]

use scriptapk::ProjectDescriptor;
use scriptapk::apk::arsc::{ResourcePackage, ResourceTable};
use scriptapk::apk::axml::{
    ANDROID_NS, NO_INDEX, XmlAttribute, XmlDocument, XmlNode, XmlNodeKind, XmlStartElement, attr,
};
use scriptapk::apk::string_pool::StringPool;
use scriptapk::apk::value::ResValue;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Package name the template declares.
pub const TEMPLATE_PACKAGE: &str = "org.template.app";

fn node(kind: XmlNodeKind) -> XmlNode {
    XmlNode {
        line: 1,
        comment: NO_INDEX,
        kind,
    }
}

fn start(name: u32, attributes: Vec<XmlAttribute>) -> XmlNode {
    node(XmlNodeKind::StartElement(XmlStartElement {
        namespace: NO_INDEX,
        name,
        id_index: 0,
        class_index: 0,
        style_index: 0,
        attributes,
    }))
}

fn end(name: u32) -> XmlNode {
    node(XmlNodeKind::EndElement {
        namespace: NO_INDEX,
        name,
    })
}

/// `<manifest package versionCode versionName><application label/></manifest>`
pub fn manifest(package: &str) -> Vec<u8> {
    let pool = StringPool::from_strings(
        [
            "label",
            "versionCode",
            "versionName",
            "android",
            ANDROID_NS,
            "package",
            "manifest",
            "application",
            package,
            "0.1",
            "Template",
        ],
        false,
    );
    let android = |name: u32, raw_value: u32, value: ResValue| XmlAttribute {
        namespace: 4,
        name,
        raw_value,
        value,
    };
    let doc = XmlDocument {
        pool,
        resource_map: Some(vec![attr::LABEL, attr::VERSION_CODE, attr::VERSION_NAME]),
        nodes: vec![
            node(XmlNodeKind::StartNamespace { prefix: 3, uri: 4 }),
            start(
                6,
                vec![
                    android(1, NO_INDEX, ResValue::int_dec(1)),
                    android(2, 9, ResValue::string(9)),
                    XmlAttribute {
                        namespace: NO_INDEX,
                        name: 5,
                        raw_value: 8,
                        value: ResValue::string(8),
                    },
                ],
            ),
            start(7, vec![android(0, 10, ResValue::string(10))]),
            end(7),
            end(6),
            node(XmlNodeKind::EndNamespace { prefix: 3, uri: 4 }),
        ],
    };
    doc.encode().unwrap()
}

/// Resource table with one package and no types.
pub fn resource_table(package: &str) -> Vec<u8> {
    ResourceTable {
        strings: StringPool::from_strings(["res/mipmap/ic_launcher.png"], true),
        packages: vec![ResourcePackage {
            id: 0x7f,
            name: package.to_string(),
            type_strings: StringPool::from_strings(["mipmap"], false),
            key_strings: StringPool::from_strings(["ic_launcher"], true),
            last_public_type: 0,
            last_public_key: 0,
            type_id_offset: Some(0),
            chunks: Vec::new(),
        }],
    }
    .encode()
    .unwrap()
}

/// Write a template package into `dir` and return its path.
///
/// Carries a stale signature from the runtime's own release build.
pub fn template_apk(dir: &Path) -> PathBuf {
    let path = dir.join("template.apk");
    let file = std::fs::File::create(&path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    let entries: Vec<(&str, Vec<u8>)> = vec![
        ("AndroidManifest.xml", manifest(TEMPLATE_PACKAGE)),
        ("resources.arsc", resource_table(TEMPLATE_PACKAGE)),
        ("classes.dex", b"dex\n035\0".to_vec()),
        ("res/mipmap/ic_launcher.png", b"not really a png".to_vec()),
        ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\r\n\r\n".to_vec()),
        ("META-INF/CERT.RSA", vec![0x30, 0x82]),
    ];
    for (name, data) in entries {
        zip.start_file(name, options).unwrap();
        zip.write_all(&data).unwrap();
    }
    zip.finish().unwrap();
    path
}

/// Scaffold a project with a few scripts, a data file and a stale build output.
pub fn project(dir: &Path) -> PathBuf {
    let root = dir.join("tool");
    let descriptor = ProjectDescriptor::scaffold(&root, "Tool", "com.acme.tool").unwrap();
    std::fs::write(root.join(&descriptor.main_script_file), "X").unwrap();
    std::fs::create_dir_all(root.join("lib")).unwrap();
    std::fs::write(root.join("lib/util.js"), "\"auto\";\nmodule.exports = 1;").unwrap();
    std::fs::create_dir_all(root.join("res")).unwrap();
    std::fs::write(root.join("res/data.txt"), "plain data").unwrap();
    std::fs::create_dir_all(root.join("build")).unwrap();
    std::fs::write(root.join("build/Tool_v0.9.apk"), "old").unwrap();
    root
}

/// Names of all entries in a package.
pub fn entry_names(apk: &Path) -> Vec<String> {
    let archive = zip::ZipArchive::new(std::fs::File::open(apk).unwrap()).unwrap();
    archive.file_names().map(String::from).collect()
}

/// Bytes of one entry of a package.
pub fn read_entry(apk: &Path, name: &str) -> Vec<u8> {
    let mut archive = zip::ZipArchive::new(std::fs::File::open(apk).unwrap()).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut data = Vec::new();
    entry.read_to_end(&mut data).unwrap();
    data
}
