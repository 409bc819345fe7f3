use super::{ClassFile, ClassFileExt, ConstantPool, parse, to_bytes};
use crate::bytecode::{Insn, InvokeKind, MethodRef, ValueKind};
use crate::error::RewriteResult;
use jarweave_api::{MethodAccessFlags, MethodSignature};
use ristretto_classfile::{ClassAccessFlags, Version};

const JAVA_LANG_OBJECT: &str = "java/lang/Object";
const DEFAULT_MAJOR_VERSION: u16 = 52;

/// Builds class files from scratch, mostly for fixtures.
///
/// ```ignore
/// let bytes = ClassBuilder::new("demo/Greeter")?
///     .default_constructor()?
///     .method(&signature, &body)?
///     .to_bytes()?;
/// ```
pub struct ClassBuilder {
    class: ClassFile,
    super_name: String,
}

impl ClassBuilder {
    /// A public class at version 52 extending `java/lang/Object`.
    pub fn new(internal_name: &str) -> RewriteResult<Self> {
        Self::with_flags(internal_name, ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER)
    }

    pub fn interface(internal_name: &str) -> RewriteResult<Self> {
        Self::with_flags(
            internal_name,
            ClassAccessFlags::PUBLIC | ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT,
        )
    }

    fn with_flags(internal_name: &str, access_flags: ClassAccessFlags) -> RewriteResult<Self> {
        let mut constant_pool = ConstantPool::default();
        let this_class = constant_pool.add_class(internal_name)?;
        let super_class = constant_pool.add_class(JAVA_LANG_OBJECT)?;
        let class = ClassFile {
            version: Version::from(DEFAULT_MAJOR_VERSION, 0)?,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            ..Default::default()
        };
        Ok(Self {
            class,
            super_name: JAVA_LANG_OBJECT.to_string(),
        })
    }

    pub fn version(mut self, major: u16) -> RewriteResult<Self> {
        self.class.version = Version::from(major, 0)?;
        Ok(self)
    }

    pub fn extends(mut self, super_name: &str) -> RewriteResult<Self> {
        self.class.super_class = self.class.constant_pool.add_class(super_name)?;
        self.super_name = super_name.to_string();
        Ok(self)
    }

    pub fn implements(mut self, interface: &str) -> RewriteResult<Self> {
        let index = self.class.constant_pool.add_class(interface)?;
        self.class.interfaces.push(index);
        Ok(self)
    }

    pub fn method(mut self, signature: &MethodSignature, body: &[Insn]) -> RewriteResult<Self> {
        self.class.push_method(signature, body)?;
        Ok(self)
    }

    /// A method without a `Code` attribute; `ACC_ABSTRACT` is added to its flags.
    pub fn abstract_method(mut self, signature: &MethodSignature) -> RewriteResult<Self> {
        let mut signature = signature.clone();
        signature.access |= MethodAccessFlags::ABSTRACT;
        self.class.push_declaration(&signature)?;
        Ok(self)
    }

    /// `public <init>()V` calling the superclass constructor.
    pub fn default_constructor(self) -> RewriteResult<Self> {
        let signature = MethodSignature::new(MethodAccessFlags::PUBLIC, "<init>", "()V")?;
        let body = [
            Insn::Load(ValueKind::Reference, 0),
            Insn::Invoke(
                InvokeKind::Special,
                MethodRef::new(self.super_name.clone(), "<init>", "()V"),
            ),
            Insn::Return,
        ];
        self.method(&signature, &body)
    }

    pub fn build(self) -> ClassFile {
        self.class
    }

    pub fn to_bytes(self) -> RewriteResult<Vec<u8>> {
        Ok(to_bytes(&self.class)?)
    }
}
