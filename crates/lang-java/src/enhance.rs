use crate::classfile::{self, ClassFileExt, INTERFACE_METHODS_VERSION};
use crate::definition::{BodyContext, ExtensionMethodDefinition};
use crate::error::{RewriteError, RewriteResult};
use crate::inspect;
use jarweave_api::{MethodAccessFlags, ModuleId, access_keywords};
use std::collections::HashSet;
use tracing::debug;

/// Injects `definitions` into the class file `bytes`, returning the rewritten class.
///
/// Existing members are carried over and the new methods are appended to
/// the method table in definition order. The serialized result is decoded
/// again and its method table checked before it is returned. Without
/// definitions the input bytes come back unchanged.
pub fn enhance_class(bytes: &[u8], target: &ModuleId, definitions: &[ExtensionMethodDefinition]) -> RewriteResult<Vec<u8>> {
    let mut class = classfile::parse(bytes)?;
    let class_name = class.internal_name()?;
    if class_name != target.internal_name() {
        return Err(RewriteError::WrongTarget {
            expected: target.internal_name(),
            found: class_name,
        });
    }
    if definitions.is_empty() {
        return Ok(bytes.to_vec());
    }

    let major_version = class.major_version();
    let is_interface = class.is_interface();
    let original = class.method_keys()?;
    let mut seen: HashSet<(String, String)> = original.iter().cloned().collect();
    let mut expected = original;

    for definition in definitions {
        let signature = &definition.signature;
        let method = format!("{class_name}.{signature}");
        let key = definition.key();
        if !seen.insert(key.clone()) {
            return Err(RewriteError::DuplicateMethod(method));
        }

        if signature
            .access
            .intersects(MethodAccessFlags::ABSTRACT | MethodAccessFlags::NATIVE)
        {
            return Err(RewriteError::UnsupportedFlags {
                method,
                flags: access_keywords(signature.access),
            });
        }
        if is_interface && !signature.is_static() && major_version < INTERFACE_METHODS_VERSION {
            return Err(RewriteError::InterfaceVersion {
                class: class_name,
                major: major_version,
                method: signature.to_string(),
            });
        }

        let ctx = BodyContext {
            class_name: &class_name,
            signature,
            major_version,
            is_interface,
        };
        let body = definition.body.generate(&ctx)?;
        class.push_method(signature, &body)?;
        debug!("Injected {} ({} instructions)", method, body.len());
        expected.push(key);
    }

    let rewritten = classfile::to_bytes(&class)?;
    inspect::verify_method_table(&rewritten, &expected)?;
    Ok(rewritten)
}
