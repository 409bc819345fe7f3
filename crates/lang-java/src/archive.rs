use crate::definition::ExtensionMethodDefinition;
use crate::enhance::enhance_class;
use crate::error::{PatchCause, PatchError};
use jarweave_api::ModuleId;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// Summary of one patched archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchReport {
    pub archive: PathBuf,
    /// Classes that were rewritten, in entry path order.
    pub modules: Vec<ModuleId>,
    /// Number of methods injected across all classes.
    pub methods: usize,
}

/// Rewrites class entries of a jar in place.
///
/// The archive is replaced atomically: a new container is written next to
/// it and renamed over it, so a failure never leaves a half-written jar.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArchivePatcher;

impl ArchivePatcher {
    pub fn new() -> Self {
        Self
    }

    pub fn patch(
        &self,
        archive: &Path,
        definitions: &BTreeMap<ModuleId, Vec<ExtensionMethodDefinition>>,
    ) -> Result<PatchReport, PatchError> {
        let mut report = PatchReport {
            archive: archive.to_path_buf(),
            modules: Vec::new(),
            methods: 0,
        };
        if definitions.is_empty() {
            return Ok(report);
        }

        let file = File::open(archive).map_err(|e| PatchError::new(archive, None, e))?;
        let mut zip = ZipArchive::new(file).map_err(|e| PatchError::new(archive, None, e))?;

        let mut replacements = HashMap::with_capacity(definitions.len());
        for (module, module_definitions) in definitions {
            let entry_path = module.entry_path();
            let bytes = read_entry(&mut zip, &entry_path).map_err(|cause| PatchError::new(archive, Some(module), cause))?;
            let rewritten = enhance_class(&bytes, module, module_definitions)
                .map_err(|e| PatchError::new(archive, Some(module), e))?;
            debug!(
                "Rewrote {} ({} -> {} bytes)",
                entry_path,
                bytes.len(),
                rewritten.len()
            );
            replacements.insert(entry_path, rewritten);
            report.modules.push(module.clone());
            report.methods += module_definitions.len();
        }

        rewrite_container(archive, &mut zip, replacements).map_err(|cause| PatchError::new(archive, None, cause))?;

        info!(
            "Patched {} classes ({} methods) in {}",
            report.modules.len(),
            report.methods,
            archive.display()
        );
        Ok(report)
    }
}

fn read_entry(zip: &mut ZipArchive<File>, path: &str) -> Result<Vec<u8>, PatchCause> {
    let mut entry = match zip.by_name(path) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Err(PatchCause::MissingEntry(path.to_string())),
        Err(e) => return Err(e.into()),
    };
    let mut bytes = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Writes a copy of `zip` with `replacements` swapped in and renames it over `archive`.
///
/// Untouched entries are copied raw, keeping their compressed bytes and
/// headers. Replaced entries reuse the original compression method,
/// timestamp and permissions.
fn rewrite_container(
    archive: &Path,
    zip: &mut ZipArchive<File>,
    mut replacements: HashMap<String, Vec<u8>>,
) -> Result<(), PatchCause> {
    let dir = match archive.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut temp = NamedTempFile::new_in(&dir)?;

    {
        let mut writer = ZipWriter::new(BufWriter::new(temp.as_file_mut()));
        for i in 0..zip.len() {
            let entry = zip.by_index_raw(i)?;
            let name = entry.name().to_string();
            match replacements.remove(&name) {
                Some(bytes) => {
                    let mut options = SimpleFileOptions::default().compression_method(entry.compression());
                    if let Some(modified) = entry.last_modified() {
                        options = options.last_modified_time(modified);
                    }
                    if let Some(mode) = entry.unix_mode() {
                        options = options.unix_permissions(mode);
                    }
                    drop(entry);
                    writer.start_file(name, options)?;
                    writer.write_all(&bytes)?;
                }
                None => writer.raw_copy_file(entry)?,
            }
        }
        writer.set_raw_comment(zip.comment().into())?;
        let mut inner = writer.finish()?;
        inner.flush()?;
    }

    let permissions = fs::metadata(archive)?.permissions();
    fs::set_permissions(temp.path(), permissions)?;
    temp.persist(archive).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{Insn, ValueKind};
    use crate::classfile::ClassBuilder;
    use crate::definition::InstructionBody;
    use jarweave_api::{MethodAccessFlags, MethodSignature};
    use tempfile::tempdir;

    fn write_jar(path: &Path, entries: &[(&str, Vec<u8>)]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, bytes) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.finish().unwrap();
    }

    fn answer(target: &str) -> BTreeMap<ModuleId, Vec<ExtensionMethodDefinition>> {
        let module = ModuleId::parse(target).unwrap();
        let definition = ExtensionMethodDefinition::new(
            module.clone(),
            MethodSignature::new(MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC, "answer", "()I").unwrap(),
            InstructionBody(vec![Insn::IConst(42), Insn::ValueReturn(ValueKind::Int)]),
        );
        BTreeMap::from([(module, vec![definition])])
    }

    #[test]
    fn test_missing_entry_names_module() {
        let dir = tempdir().unwrap();
        let jar = dir.path().join("lib.jar");
        write_jar(&jar, &[("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n".to_vec())]);

        let err = ArchivePatcher::new().patch(&jar, &answer("demo.Missing")).unwrap_err();
        assert_eq!(err.archive, jar);
        assert_eq!(err.module, Some(ModuleId::parse("demo.Missing").unwrap()));
        assert!(matches!(err.cause, PatchCause::MissingEntry(ref p) if p == "demo/Missing.class"));
    }

    #[test]
    fn test_not_a_zip_is_container_failure() {
        let dir = tempdir().unwrap();
        let jar = dir.path().join("broken.jar");
        fs::write(&jar, b"not a zip").unwrap();

        let err = ArchivePatcher::new().patch(&jar, &answer("demo.Box")).unwrap_err();
        assert!(err.module.is_none());
        assert!(matches!(err.cause, PatchCause::Zip(_)));
    }

    #[test]
    fn test_patch_rewrites_target_and_keeps_comment() {
        let dir = tempdir().unwrap();
        let jar = dir.path().join("lib.jar");
        let class = ClassBuilder::new("demo/Box").unwrap().to_bytes().unwrap();
        {
            let mut zip = ZipWriter::new(File::create(&jar).unwrap());
            zip.start_file("demo/Box.class", SimpleFileOptions::default()).unwrap();
            zip.write_all(&class).unwrap();
            zip.set_raw_comment(b"built by tests".to_vec().into_boxed_slice()).unwrap();
            zip.finish().unwrap();
        }

        let report = ArchivePatcher::new().patch(&jar, &answer("demo.Box")).unwrap();
        assert_eq!(report.methods, 1);

        let mut zip = ZipArchive::new(File::open(&jar).unwrap()).unwrap();
        assert_eq!(zip.comment(), b"built by tests");
        let mut bytes = Vec::new();
        zip.by_name("demo/Box.class").unwrap().read_to_end(&mut bytes).unwrap();
        let keys = crate::inspect::method_table(&bytes).unwrap();
        assert_eq!(keys, vec![("answer".to_string(), "()I".to_string())]);
    }

    #[test]
    fn test_empty_definitions_leave_archive_alone() {
        let dir = tempdir().unwrap();
        let jar = dir.path().join("lib.jar");
        fs::write(&jar, b"anything").unwrap();
        let report = ArchivePatcher::new().patch(&jar, &BTreeMap::new()).unwrap();
        assert!(report.modules.is_empty());
        assert_eq!(fs::read(&jar).unwrap(), b"anything");
    }
}
