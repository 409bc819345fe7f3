//! Class file editing on top of `ristretto_classfile`.
//!
//! Classes are decoded into `ristretto_classfile`'s model, new methods are
//! appended to it, and the model is serialized again. Only the method table
//! and the constant pool grow; everything else is carried over as decoded.

mod builder;

pub use builder::ClassBuilder;
pub use ristretto_classfile::{ClassFile, ConstantPool};

use crate::bytecode::{Insn, MethodContext, assemble};
use crate::error::{ClassFileError, RewriteResult};
use jarweave_api::MethodSignature;
use ristretto_classfile::attributes::Attribute;
use ristretto_classfile::{ClassAccessFlags, Method};
use std::io::Cursor;

/// First class file version that carries `StackMapTable` frames.
pub const STACK_MAP_VERSION: u16 = 50;
/// First class file version that allows non-abstract interface methods.
pub const INTERFACE_METHODS_VERSION: u16 = 52;

pub fn parse(bytes: &[u8]) -> Result<ClassFile, ClassFileError> {
    Ok(ClassFile::from_bytes(&mut Cursor::new(bytes.to_vec()))?)
}

pub fn to_bytes(class: &ClassFile) -> Result<Vec<u8>, ClassFileError> {
    let mut bytes = Vec::new();
    class.to_bytes(&mut bytes)?;
    Ok(bytes)
}

/// Lookups and edits the rewrite needs on a decoded class.
pub trait ClassFileExt {
    /// Internal name of this class (`java/lang/String`).
    fn internal_name(&self) -> Result<String, ClassFileError>;

    /// `None` only for `java/lang/Object` and module descriptors.
    fn super_name(&self) -> Result<Option<String>, ClassFileError>;

    fn major_version(&self) -> u16;

    fn is_interface(&self) -> bool;

    /// `(name, descriptor)` of every method in table order.
    fn method_keys(&self) -> Result<Vec<(String, String)>, ClassFileError>;

    /// Assembles `body` and appends it as a new method with a `Code` attribute.
    fn push_method(&mut self, signature: &MethodSignature, body: &[Insn]) -> RewriteResult<()>;

    /// Appends a method record without any attributes.
    fn push_declaration(&mut self, signature: &MethodSignature) -> RewriteResult<()>;
}

impl ClassFileExt for ClassFile {
    fn internal_name(&self) -> Result<String, ClassFileError> {
        Ok(self.constant_pool.try_get_class(self.this_class)?.to_string())
    }

    fn super_name(&self) -> Result<Option<String>, ClassFileError> {
        if self.super_class == 0 {
            return Ok(None);
        }
        Ok(Some(self.constant_pool.try_get_class(self.super_class)?.to_string()))
    }

    fn major_version(&self) -> u16 {
        self.version.major()
    }

    fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::INTERFACE)
    }

    fn method_keys(&self) -> Result<Vec<(String, String)>, ClassFileError> {
        self.methods
            .iter()
            .map(|method| -> Result<(String, String), ClassFileError> {
                let name = self.constant_pool.try_get_utf8(method.name_index)?;
                let descriptor = self.constant_pool.try_get_utf8(method.descriptor_index)?;
                Ok((name.to_string(), descriptor.to_string()))
            })
            .collect()
    }

    fn push_method(&mut self, signature: &MethodSignature, body: &[Insn]) -> RewriteResult<()> {
        let class_name = self.internal_name()?;
        let ctx = MethodContext {
            class_name: &class_name,
            major_version: self.major_version(),
            signature,
        };
        let code = assemble(body, &ctx, &mut self.constant_pool)?;
        let code = code.into_attribute(&mut self.constant_pool)?;
        push_member(self, signature, vec![code])
    }

    fn push_declaration(&mut self, signature: &MethodSignature) -> RewriteResult<()> {
        push_member(self, signature, Vec::new())
    }
}

fn push_member(class: &mut ClassFile, signature: &MethodSignature, attributes: Vec<Attribute>) -> RewriteResult<()> {
    let name_index = class.constant_pool.add_utf8(signature.name.as_str())?;
    let descriptor_index = class
        .constant_pool
        .add_utf8(signature.descriptor.to_string().as_str())?;
    class.methods.push(Method {
        access_flags: signature.access,
        name_index,
        descriptor_index,
        attributes,
    });
    Ok(())
}
