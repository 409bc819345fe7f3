#![allow(dead_code)]

use jarweave_java::classfile;
use ristretto_classfile::attributes::{Attribute, StackFrame};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Decoded `Code` attribute of one method.
pub struct CodeInfo {
    pub max_stack: u16,
    pub max_locals: u16,
    /// Bytecode as serialized.
    pub code: Vec<u8>,
    /// Names of the attributes nested in `Code`.
    pub attributes: Vec<String>,
    /// `StackMapTable` entries, empty without the attribute.
    pub frames: Vec<StackFrame>,
}

pub fn code_of(bytes: &[u8], name: &str, descriptor: &str) -> CodeInfo {
    let class = classfile::parse(bytes).expect("class parses");
    let pool = &class.constant_pool;
    let method = class
        .methods
        .iter()
        .find(|m| {
            pool.try_get_utf8(m.name_index).unwrap() == name
                && pool.try_get_utf8(m.descriptor_index).unwrap() == descriptor
        })
        .unwrap_or_else(|| panic!("method {name}{descriptor} exists"));
    let attribute = method
        .attributes
        .iter()
        .find(|a| matches!(a, Attribute::Code { .. }))
        .expect("Code attribute");

    let frames = match attribute {
        Attribute::Code { attributes, .. } => attributes
            .iter()
            .find_map(|a| match a {
                Attribute::StackMapTable { frames, .. } => Some(frames.clone()),
                _ => None,
            })
            .unwrap_or_default(),
        _ => unreachable!(),
    };

    let mut raw = Vec::new();
    attribute.to_bytes(&mut raw).expect("Code attribute serializes");
    let info = &raw[6..];

    let u16_at = |i: usize| u16::from_be_bytes([info[i], info[i + 1]]);
    let u32_at = |i: usize| u32::from_be_bytes([info[i], info[i + 1], info[i + 2], info[i + 3]]);

    let length = u32_at(4) as usize;
    let code = info[8..8 + length].to_vec();
    let mut p = 8 + length;
    let handlers = u16_at(p) as usize;
    p += 2 + handlers * 8;
    let count = u16_at(p);
    p += 2;
    let mut attributes = Vec::new();
    for _ in 0..count {
        attributes.push(pool.try_get_utf8(u16_at(p)).unwrap().to_string());
        p += 6 + u32_at(p + 2) as usize;
    }
    assert_eq!(p, info.len(), "Code attribute fully consumed");

    CodeInfo {
        max_stack: u16_at(0),
        max_locals: u16_at(2),
        code,
        attributes,
        frames,
    }
}

pub fn write_jar(path: &Path, entries: &[(&str, &[u8], CompressionMethod)]) {
    let mut zip = ZipWriter::new(File::create(path).expect("create jar"));
    for (name, bytes, method) in entries {
        let options = SimpleFileOptions::default().compression_method(*method);
        zip.start_file(*name, options).expect("start entry");
        zip.write_all(bytes).expect("write entry");
    }
    zip.finish().expect("finish jar");
}

/// Entry names with their decompressed contents.
pub fn read_entries(path: &Path) -> Vec<(String, Vec<u8>)> {
    let mut zip = ZipArchive::new(File::open(path).expect("open jar")).expect("read jar");
    (0..zip.len())
        .map(|i| {
            let mut entry = zip.by_index(i).unwrap();
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes).unwrap();
            (entry.name().to_string(), bytes)
        })
        .collect()
}

/// Entry names with their stored (possibly compressed) bytes and CRC.
pub fn raw_entries(path: &Path) -> Vec<(String, Vec<u8>, u32)> {
    let mut zip = ZipArchive::new(File::open(path).expect("open jar")).expect("read jar");
    (0..zip.len())
        .map(|i| {
            let mut entry = zip.by_index_raw(i).unwrap();
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes).unwrap();
            (entry.name().to_string(), bytes, entry.crc32())
        })
        .collect()
}

pub fn entry<'a>(entries: &'a [(String, Vec<u8>)], name: &str) -> &'a [u8] {
    &entries
        .iter()
        .find(|(n, _)| n == name)
        .unwrap_or_else(|| panic!("entry {name} exists"))
        .1
}
