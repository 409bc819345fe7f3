//! JVM method descriptors on top of `ristretto_classfile`'s [`FieldType`].

use crate::error::{ApiError, ApiResult};
pub use ristretto_classfile::{BaseType, FieldType};
use std::fmt;

/// Local variable / operand stack slots occupied by a value of `ty`.
pub fn slots(ty: &FieldType) -> u16 {
    match ty {
        FieldType::Base(BaseType::Long | BaseType::Double) => 2,
        _ => 1,
    }
}

pub fn is_reference(ty: &FieldType) -> bool {
    matches!(ty, FieldType::Object(_) | FieldType::Array(_))
}

/// Descriptor text of `ty`, e.g. `I`, `Ljava/lang/String;` or `[[D`.
pub fn field_descriptor(ty: &FieldType) -> String {
    let mut out = String::new();
    write_descriptor(&mut out, ty);
    out
}

fn write_descriptor(out: &mut String, ty: &FieldType) {
    match ty {
        FieldType::Base(base) => out.push(match base {
            BaseType::Byte => 'B',
            BaseType::Char => 'C',
            BaseType::Double => 'D',
            BaseType::Float => 'F',
            BaseType::Int => 'I',
            BaseType::Long => 'J',
            BaseType::Short => 'S',
            BaseType::Boolean => 'Z',
        }),
        FieldType::Object(name) => {
            out.push('L');
            out.push_str(name);
            out.push(';');
        }
        FieldType::Array(component) => {
            out.push('[');
            write_descriptor(out, component);
        }
    }
}

/// Name usable in a `CONSTANT_Class` entry: the internal name for classes,
/// the full descriptor for arrays.
pub fn class_name(ty: &FieldType) -> Option<String> {
    match ty {
        FieldType::Object(name) => Some(name.clone()),
        FieldType::Array(_) => Some(field_descriptor(ty)),
        FieldType::Base(_) => None,
    }
}

/// Parses a field descriptor such as `[Ljava/lang/String;`.
pub fn parse_field_type(descriptor: &str) -> ApiResult<FieldType> {
    let (mut parameters, _) = FieldType::parse_method_descriptor(&format!("({descriptor})V"))
        .map_err(|e| invalid(descriptor, e))?;
    match (parameters.pop(), parameters.is_empty()) {
        (Some(ty), true) => Ok(ty),
        _ => Err(ApiError::InvalidDescriptor {
            descriptor: descriptor.to_string(),
            reason: "expected exactly one field type".to_string(),
        }),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDescriptor {
    pub parameters: Vec<FieldType>,
    /// `None` for `void`.
    pub return_type: Option<FieldType>,
}

impl MethodDescriptor {
    pub fn parse(descriptor: &str) -> ApiResult<Self> {
        let (parameters, return_type) =
            FieldType::parse_method_descriptor(descriptor).map_err(|e| invalid(descriptor, e))?;
        let parsed = Self {
            parameters,
            return_type,
        };
        if parsed.parameter_slots() > 255 {
            return Err(ApiError::InvalidDescriptor {
                descriptor: descriptor.to_string(),
                reason: "more than 255 parameter slots".to_string(),
            });
        }
        Ok(parsed)
    }

    pub fn parameter_slots(&self) -> u16 {
        self.parameters.iter().map(slots).sum()
    }

    /// The same descriptor with `receiver` inserted as the first parameter.
    pub fn with_receiver(&self, receiver: FieldType) -> Self {
        let mut parameters = Vec::with_capacity(self.parameters.len() + 1);
        parameters.push(receiver);
        parameters.extend(self.parameters.iter().cloned());
        Self {
            parameters,
            return_type: self.return_type.clone(),
        }
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::from("(");
        for parameter in &self.parameters {
            write_descriptor(&mut out, parameter);
        }
        out.push(')');
        match &self.return_type {
            Some(ty) => write_descriptor(&mut out, ty),
            None => out.push('V'),
        }
        f.write_str(&out)
    }
}

fn invalid(descriptor: &str, cause: ristretto_classfile::Error) -> ApiError {
    ApiError::InvalidDescriptor {
        descriptor: descriptor.to_string(),
        reason: cause.to_string(),
    }
}
