use crate::bytecode::{Insn, InvokeKind, MethodRef, ValueKind};
use crate::error::{RewriteError, RewriteResult};
use jarweave_api::descriptor::{FieldType, MethodDescriptor, slots};
use jarweave_api::{MethodSignature, ModuleId};
use std::fmt;
use std::sync::Arc;

/// What a body generator knows about the method it fills in.
#[derive(Debug, Clone, Copy)]
pub struct BodyContext<'a> {
    /// Internal name of the class receiving the method.
    pub class_name: &'a str,
    pub signature: &'a MethodSignature,
    pub major_version: u16,
    pub is_interface: bool,
}

impl BodyContext<'_> {
    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.signature.descriptor
    }
}

/// Produces the symbolic instructions of an injected method.
pub trait BodyGenerator: fmt::Debug + Send + Sync {
    fn generate(&self, ctx: &BodyContext<'_>) -> RewriteResult<Vec<Insn>>;
}

/// Forwards to a static method on a helper class.
///
/// For an instance method the receiver becomes the first argument of the
/// helper: `String.reverse()` calls `StringExtension.reverse(String)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegateBody {
    /// Internal name of the helper class.
    pub owner: String,
    /// Helper method name; the injected method's name when `None`.
    pub name: Option<String>,
    /// The helper is declared on an interface.
    pub interface: bool,
}

impl DelegateBody {
    pub fn new(owner: &ModuleId) -> Self {
        Self {
            owner: owner.internal_name(),
            name: None,
            interface: false,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn on_interface(mut self) -> Self {
        self.interface = true;
        self
    }

    /// Descriptor of the helper for `ctx`.
    pub fn helper_descriptor(&self, ctx: &BodyContext<'_>) -> MethodDescriptor {
        if ctx.signature.is_static() {
            ctx.descriptor().clone()
        } else {
            ctx.descriptor()
                .with_receiver(FieldType::Object(ctx.class_name.to_string()))
        }
    }
}

impl BodyGenerator for DelegateBody {
    fn generate(&self, ctx: &BodyContext<'_>) -> RewriteResult<Vec<Insn>> {
        if ctx.signature.name == "<init>" {
            return Err(RewriteError::Generator {
                method: ctx.signature.to_string(),
                reason: "constructors cannot delegate to a static helper".to_string(),
            });
        }

        let descriptor = self.helper_descriptor(ctx);
        let mut insns = Vec::with_capacity(descriptor.parameters.len() + 2);
        let mut slot = 0u16;
        for parameter in &descriptor.parameters {
            insns.push(Insn::Load(ValueKind::of(parameter), slot));
            slot += slots(parameter);
        }

        let name = self.name.as_deref().unwrap_or(&ctx.signature.name);
        let mut target = MethodRef::new(self.owner.clone(), name, descriptor.to_string());
        target.interface = self.interface;
        insns.push(Insn::Invoke(InvokeKind::Static, target));

        insns.push(match &descriptor.return_type {
            None => Insn::Return,
            Some(ty) => Insn::ValueReturn(ValueKind::of(ty)),
        });
        Ok(insns)
    }
}

/// A fixed instruction list.
#[derive(Debug, Clone, PartialEq)]
pub struct InstructionBody(pub Vec<Insn>);

impl BodyGenerator for InstructionBody {
    fn generate(&self, _ctx: &BodyContext<'_>) -> RewriteResult<Vec<Insn>> {
        Ok(self.0.clone())
    }
}

/// A method to inject into `target`.
#[derive(Debug, Clone)]
pub struct ExtensionMethodDefinition {
    pub target: ModuleId,
    pub signature: MethodSignature,
    pub body: Arc<dyn BodyGenerator>,
}

impl ExtensionMethodDefinition {
    pub fn new(target: ModuleId, signature: MethodSignature, body: impl BodyGenerator + 'static) -> Self {
        Self {
            target,
            signature,
            body: Arc::new(body),
        }
    }

    /// `(name, descriptor)` as it appears in the method table.
    pub fn key(&self) -> (String, String) {
        (self.signature.name.clone(), self.signature.descriptor.to_string())
    }
}

impl fmt::Display for ExtensionMethodDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.target, self.signature)
    }
}
