#![allow(dead_code)]

use jarweave_api::{MethodAccessFlags, MethodSignature, ModuleId};
use jarweave_java::bytecode::{Insn, ValueKind};
use jarweave_java::classfile::ClassBuilder;
use jarweave_java::{DelegateBody, ExtensionMethodDefinition, InstructionBody};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

pub fn module(name: &str) -> ModuleId {
    ModuleId::parse(name).expect("valid module")
}

/// A jar holding one empty class per internal name, plus a manifest.
pub fn write_jar(path: &Path, classes: &[&str]) {
    let mut zip = ZipWriter::new(File::create(path).expect("create jar"));
    zip.start_file("META-INF/MANIFEST.MF", SimpleFileOptions::default())
        .expect("start manifest");
    zip.write_all(b"Manifest-Version: 1.0\n\n").expect("write manifest");
    for class in classes {
        let bytes = ClassBuilder::new(class)
            .and_then(|b| b.default_constructor())
            .and_then(|b| b.to_bytes())
            .expect("fixture class builds");
        zip.start_file(format!("{class}.class"), SimpleFileOptions::default())
            .expect("start class");
        zip.write_all(&bytes).expect("write class");
    }
    zip.finish().expect("finish jar");
}

pub fn class_entry(jar: &Path, internal_name: &str) -> Vec<u8> {
    let mut zip = ZipArchive::new(File::open(jar).expect("open jar")).expect("read jar");
    let mut entry = zip
        .by_name(&format!("{internal_name}.class"))
        .expect("class entry exists");
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes).expect("read entry");
    bytes
}

pub fn method_names(jar: &Path, internal_name: &str) -> Vec<String> {
    jarweave_java::inspect::method_table(&class_entry(jar, internal_name))
        .expect("class parses")
        .into_iter()
        .map(|(name, _)| name)
        .collect()
}

/// `public static int answer()` returning 42.
pub fn answer(target: &str) -> ExtensionMethodDefinition {
    ExtensionMethodDefinition::new(
        module(target),
        MethodSignature::new(MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC, "answer", "()I")
            .expect("valid signature"),
        InstructionBody(vec![Insn::IConst(42), Insn::ValueReturn(ValueKind::Int)]),
    )
}

/// `public String describe()` delegating to `{owner}.describe(target)`.
pub fn describe(target: &str, owner: &str) -> ExtensionMethodDefinition {
    ExtensionMethodDefinition::new(
        module(target),
        MethodSignature::new(MethodAccessFlags::PUBLIC, "describe", "()Ljava/lang/String;")
            .expect("valid signature"),
        DelegateBody::new(&module(owner)),
    )
}
