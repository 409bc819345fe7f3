//! Verification types, frames and `StackMapTable` encoding (JVMS 4.7.4, 4.10.1).

use crate::error::{AnalysisError, ClassFileError};
use jarweave_api::descriptor::{self, BaseType, FieldType};
use ristretto_classfile::ConstantPool;
use std::fmt;

const JAVA_LANG_OBJECT: &str = "java/lang/Object";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VType {
    Top,
    Integer,
    Float,
    Long,
    Double,
    Null,
    UninitializedThis,
    /// Internal class name or array descriptor.
    Object(String),
    /// Result of the `new` at this bytecode offset, before its constructor ran.
    Uninitialized(u32),
}

impl VType {
    pub fn from_field_type(ty: &FieldType) -> Self {
        match ty {
            FieldType::Base(BaseType::Long) => VType::Long,
            FieldType::Base(BaseType::Float) => VType::Float,
            FieldType::Base(BaseType::Double) => VType::Double,
            FieldType::Base(_) => VType::Integer,
            FieldType::Object(name) => VType::Object(name.clone()),
            FieldType::Array(_) => VType::Object(descriptor::field_descriptor(ty)),
        }
    }

    pub fn slots(&self) -> u16 {
        match self {
            VType::Long | VType::Double => 2,
            _ => 1,
        }
    }

    pub fn is_wide(&self) -> bool {
        self.slots() == 2
    }

    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            VType::Null | VType::UninitializedThis | VType::Object(_) | VType::Uninitialized(_)
        )
    }

    /// Array component of an array reference; `Null` stays `Null`.
    pub fn component(&self) -> Option<VType> {
        match self {
            VType::Null => Some(VType::Null),
            VType::Object(name) => {
                let component = name.strip_prefix('[')?;
                descriptor::parse_field_type(component)
                    .ok()
                    .map(|t| VType::from_field_type(&t))
            }
            _ => None,
        }
    }

    /// Appends the `verification_type_info` of this type.
    fn encode(&self, out: &mut Vec<u8>, pool: &mut ConstantPool) -> Result<(), ClassFileError> {
        match self {
            VType::Top => out.push(0),
            VType::Integer => out.push(1),
            VType::Float => out.push(2),
            VType::Double => out.push(3),
            VType::Long => out.push(4),
            VType::Null => out.push(5),
            VType::UninitializedThis => out.push(6),
            VType::Object(name) => {
                out.push(7);
                out.extend_from_slice(&pool.add_class(name.as_str())?.to_be_bytes());
            }
            VType::Uninitialized(offset) => {
                out.push(8);
                out.extend_from_slice(&(*offset as u16).to_be_bytes());
            }
        }
        Ok(())
    }
}

impl fmt::Display for VType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VType::Top => f.write_str("top"),
            VType::Integer => f.write_str("int"),
            VType::Float => f.write_str("float"),
            VType::Long => f.write_str("long"),
            VType::Double => f.write_str("double"),
            VType::Null => f.write_str("null"),
            VType::UninitializedThis => f.write_str("uninitialized this"),
            VType::Object(name) => f.write_str(name),
            VType::Uninitialized(offset) => write!(f, "uninitialized object from offset {offset}"),
        }
    }
}

/// Type state before an instruction.
///
/// `locals` is indexed by slot (the second slot of a long or double holds
/// `Top`); `stack` holds one entry per value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    pub locals: Vec<VType>,
    pub stack: Vec<VType>,
}

impl Frame {
    pub fn stack_slots(&self) -> usize {
        self.stack.iter().map(|v| v.slots() as usize).sum()
    }

    /// Least upper bound of two frames reaching the same instruction.
    pub fn merge(&self, other: &Frame) -> Result<Frame, AnalysisError> {
        if self.stack.len() != other.stack.len() {
            return Err(AnalysisError::StackHeightMismatch {
                expected: self.stack.len(),
                found: other.stack.len(),
            });
        }
        let stack = self
            .stack
            .iter()
            .zip(&other.stack)
            .map(|(a, b)| merge_stack_value(a, b))
            .collect::<Result<Vec<_>, _>>()?;

        let len = self.locals.len().max(other.locals.len());
        let locals = (0..len)
            .map(|i| {
                let a = self.locals.get(i).unwrap_or(&VType::Top);
                let b = other.locals.get(i).unwrap_or(&VType::Top);
                merge_local(a, b)
            })
            .collect::<Vec<_>>();

        let mut merged = Frame { locals, stack };
        merged.repair_wide_locals();
        Ok(merged)
    }

    /// A long or double whose second slot got merged away is unusable.
    fn repair_wide_locals(&mut self) {
        let mut i = 0;
        while i < self.locals.len() {
            if self.locals[i].is_wide() {
                if self.locals.get(i + 1) != Some(&VType::Top) {
                    self.locals[i] = VType::Top;
                }
                i += 2;
            } else {
                i += 1;
            }
        }
    }

    /// Locals as `StackMapTable` lists them: one entry per value, trailing `Top`s dropped.
    pub fn compressed_locals(&self) -> Vec<VType> {
        let mut out = Vec::with_capacity(self.locals.len());
        let mut i = 0;
        while i < self.locals.len() {
            let v = &self.locals[i];
            i += v.slots() as usize;
            out.push(v.clone());
        }
        while out.last() == Some(&VType::Top) {
            out.pop();
        }
        out
    }
}

fn merge_local(a: &VType, b: &VType) -> VType {
    match (a, b) {
        _ if a == b => a.clone(),
        (VType::Null, VType::Object(_)) => b.clone(),
        (VType::Object(_), VType::Null) => a.clone(),
        (VType::Object(_), VType::Object(_)) => VType::Object(JAVA_LANG_OBJECT.to_string()),
        _ => VType::Top,
    }
}

fn merge_stack_value(a: &VType, b: &VType) -> Result<VType, AnalysisError> {
    match (a, b) {
        _ if a == b => Ok(a.clone()),
        (VType::Null, VType::Object(_)) => Ok(b.clone()),
        (VType::Object(_), VType::Null) => Ok(a.clone()),
        (VType::Object(x), VType::Object(y)) if x == JAVA_LANG_OBJECT || y == JAVA_LANG_OBJECT => {
            Ok(VType::Object(JAVA_LANG_OBJECT.to_string()))
        }
        _ => Err(AnalysisError::IncompatibleMerge {
            left: a.to_string(),
            right: b.to_string(),
        }),
    }
}

/// Encodes the body of a `StackMapTable` attribute.
///
/// `frames` must be sorted by bytecode offset. The most compact frame kind
/// that describes each entry relative to its predecessor is chosen.
pub fn encode_stack_map(
    initial: &Frame,
    frames: &[(u32, Frame)],
    pool: &mut ConstantPool,
) -> Result<Vec<u8>, ClassFileError> {
    let mut out = Vec::new();
    out.extend_from_slice(&count16("stack map table", frames.len())?);

    let mut previous_locals = initial.compressed_locals();
    let mut previous_offset: Option<u32> = None;
    for (offset, frame) in frames {
        let delta = match previous_offset {
            None => *offset,
            Some(p) => offset - p - 1,
        } as u16;
        let locals = frame.compressed_locals();
        let stack = &frame.stack;
        let same_locals = locals == previous_locals;

        if stack.is_empty() && same_locals {
            if delta < 64 {
                out.push(delta as u8);
            } else {
                out.push(251);
                out.extend_from_slice(&delta.to_be_bytes());
            }
        } else if stack.len() == 1 && same_locals {
            if delta < 64 {
                out.push(64 + delta as u8);
            } else {
                out.push(247);
                out.extend_from_slice(&delta.to_be_bytes());
            }
            stack[0].encode(&mut out, pool)?;
        } else if stack.is_empty()
            && locals.len() < previous_locals.len()
            && previous_locals.len() - locals.len() <= 3
            && previous_locals.starts_with(&locals)
        {
            out.push(251 - (previous_locals.len() - locals.len()) as u8);
            out.extend_from_slice(&delta.to_be_bytes());
        } else if stack.is_empty()
            && locals.len() > previous_locals.len()
            && locals.len() - previous_locals.len() <= 3
            && locals.starts_with(&previous_locals)
        {
            out.push(251 + (locals.len() - previous_locals.len()) as u8);
            out.extend_from_slice(&delta.to_be_bytes());
            for v in &locals[previous_locals.len()..] {
                v.encode(&mut out, pool)?;
            }
        } else {
            out.push(255);
            out.extend_from_slice(&delta.to_be_bytes());
            out.extend_from_slice(&count16("frame locals", locals.len())?);
            for v in &locals {
                v.encode(&mut out, pool)?;
            }
            out.extend_from_slice(&count16("frame stack", stack.len())?);
            for v in stack {
                v.encode(&mut out, pool)?;
            }
        }

        previous_locals = locals;
        previous_offset = Some(*offset);
    }
    Ok(out)
}

/// Big-endian `u16` count, or `TooLarge` past 65535 entries.
pub(crate) fn count16(what: &'static str, len: usize) -> Result<[u8; 2], ClassFileError> {
    u16::try_from(len)
        .map(u16::to_be_bytes)
        .map_err(|_| ClassFileError::TooLarge { what, len })
}
