use super::analyzer::{MethodShape, analyze};
use super::frame::encode_stack_map;
use super::insn::{ArithOp, FieldOp, Insn, IntNarrow, InvokeKind, Label, NumKind};
use super::opcode::*;
use crate::classfile::STACK_MAP_VERSION;
use crate::error::{AnalysisError, ClassFileError, RewriteError, RewriteResult};
use jarweave_api::{MethodDescriptor, MethodSignature};
use ristretto_classfile::ConstantPool;
use ristretto_classfile::attributes::Attribute;
use std::collections::HashMap;
use std::io::Cursor;

/// Largest `code_length` a method may have.
const MAX_CODE_LENGTH: usize = 65535;

/// Where the assembled method will live.
pub struct MethodContext<'a> {
    /// Internal name of the declaring class.
    pub class_name: &'a str,
    pub major_version: u16,
    pub signature: &'a MethodSignature,
}

#[derive(Debug, Clone)]
pub struct AssembledCode {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    /// `StackMapTable` body; `None` when the class version predates frames
    /// or the method has no jump targets.
    pub stack_map: Option<Vec<u8>>,
}

impl AssembledCode {
    /// Serializes a complete `Code` attribute (name, length and body)
    /// without exception handlers.
    pub fn attribute_bytes(&self, pool: &mut ConstantPool) -> Result<Vec<u8>, ClassFileError> {
        let mut info = Vec::with_capacity(self.code.len() + 32);
        info.extend_from_slice(&self.max_stack.to_be_bytes());
        info.extend_from_slice(&self.max_locals.to_be_bytes());
        info.extend_from_slice(&(self.code.len() as u32).to_be_bytes());
        info.extend_from_slice(&self.code);
        info.extend_from_slice(&0u16.to_be_bytes());

        match &self.stack_map {
            Some(stack_map) => {
                info.extend_from_slice(&1u16.to_be_bytes());
                push_attribute(&mut info, pool.add_utf8("StackMapTable")?, stack_map)?;
            }
            None => info.extend_from_slice(&0u16.to_be_bytes()),
        }

        let mut bytes = Vec::with_capacity(info.len() + 6);
        push_attribute(&mut bytes, pool.add_utf8("Code")?, &info)?;
        Ok(bytes)
    }

    /// The `Code` attribute in `ristretto_classfile`'s model, ready to attach to a method.
    pub fn into_attribute(self, pool: &mut ConstantPool) -> Result<Attribute, ClassFileError> {
        let bytes = self.attribute_bytes(pool)?;
        Ok(Attribute::from_bytes(pool, &mut Cursor::new(bytes))?)
    }
}

fn push_attribute(out: &mut Vec<u8>, name_index: u16, info: &[u8]) -> Result<(), ClassFileError> {
    let len = u32::try_from(info.len()).map_err(|_| ClassFileError::TooLarge {
        what: "attribute",
        len: info.len(),
    })?;
    out.extend_from_slice(&name_index.to_be_bytes());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(info);
    Ok(())
}

enum Piece {
    Bytes(Vec<u8>),
    /// Two-byte relative branch, resolved once offsets are known.
    Branch { opcode: u8, label: Label },
}

impl Piece {
    fn len(&self) -> usize {
        match self {
            Piece::Bytes(bytes) => bytes.len(),
            Piece::Branch { .. } => 3,
        }
    }
}

enum LowerError {
    Pool(ClassFileError),
    Invalid(AnalysisError),
}

impl From<ristretto_classfile::Error> for LowerError {
    fn from(e: ristretto_classfile::Error) -> Self {
        LowerError::Pool(e.into())
    }
}

/// Assembles a symbolic body into bytecode, adding the constants it needs to `pool`.
pub fn assemble(insns: &[Insn], ctx: &MethodContext<'_>, pool: &mut ConstantPool) -> RewriteResult<AssembledCode> {
    let method = format!("{}.{}", ctx.class_name, ctx.signature);
    let targets = bind_labels(insns)?;
    for insn in insns {
        if let Some(label) = insn.jump_target() {
            if !targets.contains_key(&label) {
                return Err(RewriteError::UnboundLabel(label.0));
            }
        }
    }

    let mut pieces = Vec::with_capacity(insns.len());
    for (index, insn) in insns.iter().enumerate() {
        let piece = lower(insn, pool).map_err(|e| match e {
            LowerError::Pool(e) => RewriteError::ClassFile(e),
            LowerError::Invalid(error) => RewriteError::Analysis {
                method: method.clone(),
                index,
                error,
            },
        })?;
        pieces.push(piece);
    }

    let mut offsets = Vec::with_capacity(pieces.len());
    let mut length = 0usize;
    for piece in &pieces {
        offsets.push(length as u32);
        length += piece.len();
    }
    if length > MAX_CODE_LENGTH {
        return Err(RewriteError::CodeTooLarge(length));
    }

    let shape = MethodShape {
        class_name: ctx.class_name,
        name: &ctx.signature.name,
        is_static: ctx.signature.is_static(),
        descriptor: &ctx.signature.descriptor,
    };
    let analysis = analyze(insns, &offsets, &targets, &shape)
        .map_err(|(index, error)| RewriteError::Analysis { method, index, error })?;

    let mut code = Vec::with_capacity(length);
    for (index, piece) in pieces.iter().enumerate() {
        match piece {
            Piece::Bytes(bytes) => code.extend_from_slice(bytes),
            Piece::Branch { opcode, label } => {
                let from = offsets[index];
                let to = targets
                    .get(label)
                    .map(|&t| offsets[t])
                    .ok_or(RewriteError::UnboundLabel(label.0))?;
                let delta = i16::try_from(to as i64 - from as i64)
                    .map_err(|_| RewriteError::BranchOutOfRange { from, to })?;
                code.push(*opcode);
                code.extend_from_slice(&delta.to_be_bytes());
            }
        }
    }

    let stack_map = if ctx.major_version >= STACK_MAP_VERSION && !analysis.frames.is_empty() {
        Some(encode_stack_map(&analysis.initial, &analysis.frames, pool)?)
    } else {
        None
    };

    Ok(AssembledCode {
        max_stack: analysis.max_stack,
        max_locals: analysis.max_locals,
        code,
        stack_map,
    })
}

/// Maps each label to the index of the first label in its run, so adjacent
/// labels share one offset and one frame.
fn bind_labels(insns: &[Insn]) -> RewriteResult<HashMap<Label, usize>> {
    let mut targets = HashMap::new();
    let mut run_start = None;
    for (i, insn) in insns.iter().enumerate() {
        if let Insn::Label(label) = insn {
            let start = *run_start.get_or_insert(i);
            if targets.insert(*label, start).is_some() {
                return Err(RewriteError::DuplicateLabel(label.0));
            }
        } else {
            run_start = None;
        }
    }
    Ok(targets)
}

fn indexed(opcode: u8, index: u16) -> Piece {
    let [hi, lo] = index.to_be_bytes();
    Piece::Bytes(vec![opcode, hi, lo])
}

fn ldc(index: u16) -> Piece {
    match u8::try_from(index) {
        Ok(index) => Piece::Bytes(vec![LDC, index]),
        Err(_) => indexed(LDC_W, index),
    }
}

/// `xload`/`xstore` in the shortest form for `index`.
fn local(short_base: u8, base: u8, kind: u8, index: u16) -> Piece {
    if index <= 3 {
        Piece::Bytes(vec![short_base + kind * 4 + index as u8])
    } else if let Ok(index) = u8::try_from(index) {
        Piece::Bytes(vec![base + kind, index])
    } else {
        let [hi, lo] = index.to_be_bytes();
        Piece::Bytes(vec![WIDE, base + kind, hi, lo])
    }
}

fn single(opcode: u8) -> Piece {
    Piece::Bytes(vec![opcode])
}

fn lower(insn: &Insn, pool: &mut ConstantPool) -> Result<Piece, LowerError> {
    let piece = match insn {
        Insn::Label(_) => Piece::Bytes(Vec::new()),
        Insn::Nop => single(NOP),
        Insn::AconstNull => single(ACONST_NULL),
        Insn::IConst(v) => match *v {
            -1..=5 => single((ICONST_0 as i32 + v) as u8),
            v if i8::try_from(v).is_ok() => Piece::Bytes(vec![BIPUSH, v as i8 as u8]),
            v if i16::try_from(v).is_ok() => {
                let [hi, lo] = (v as i16).to_be_bytes();
                Piece::Bytes(vec![SIPUSH, hi, lo])
            }
            v => ldc(pool.add_integer(v)?),
        },
        Insn::LConst(v) => match *v {
            0 | 1 => single(LCONST_0 + *v as u8),
            v => indexed(LDC2_W, pool.add_long(v)?),
        },
        Insn::FConst(v) => match v.to_bits() {
            b if b == 0f32.to_bits() => single(FCONST_0),
            b if b == 1f32.to_bits() => single(FCONST_0 + 1),
            b if b == 2f32.to_bits() => single(FCONST_0 + 2),
            _ => ldc(pool.add_float(*v)?),
        },
        Insn::DConst(v) => match v.to_bits() {
            b if b == 0f64.to_bits() => single(DCONST_0),
            b if b == 1f64.to_bits() => single(DCONST_0 + 1),
            _ => indexed(LDC2_W, pool.add_double(*v)?),
        },
        Insn::LdcString(s) => ldc(pool.add_string(s.as_str())?),
        Insn::LdcClass(c) => ldc(pool.add_class(c.as_str())?),
        Insn::Load(kind, index) => local(ILOAD_0, ILOAD, kind.index(), *index),
        Insn::Store(kind, index) => local(ISTORE_0, ISTORE, kind.index(), *index),
        Insn::Iinc(index, delta) => match (u8::try_from(*index), i8::try_from(*delta)) {
            (Ok(index), Ok(delta)) => Piece::Bytes(vec![IINC, index, delta as u8]),
            _ => {
                let [ih, il] = index.to_be_bytes();
                let [dh, dl] = delta.to_be_bytes();
                Piece::Bytes(vec![WIDE, IINC, ih, il, dh, dl])
            }
        },
        Insn::Arith(kind, op) => {
            if op.is_integral_only() && matches!(kind, NumKind::Float | NumKind::Double) {
                return Err(LowerError::Invalid(AnalysisError::TypeMismatch {
                    expected: "int or long operands",
                    found: format!("{kind:?}").to_lowercase(),
                }));
            }
            let base = match op {
                ArithOp::Add => IADD,
                ArithOp::Sub => ISUB,
                ArithOp::Mul => IMUL,
                ArithOp::Div => IDIV,
                ArithOp::Rem => IREM,
                ArithOp::Neg => INEG,
                ArithOp::Shl => ISHL,
                ArithOp::Shr => ISHR,
                ArithOp::Ushr => IUSHR,
                ArithOp::And => IAND,
                ArithOp::Or => IOR,
                ArithOp::Xor => IXOR,
            };
            single(base + kind.index())
        }
        Insn::Convert(from, to) => {
            let opcode = match (from, to) {
                (NumKind::Int, NumKind::Long) => I2L,
                (NumKind::Int, NumKind::Float) => I2F,
                (NumKind::Int, NumKind::Double) => I2D,
                (NumKind::Long, NumKind::Int) => L2I,
                (NumKind::Long, NumKind::Float) => L2F,
                (NumKind::Long, NumKind::Double) => L2D,
                (NumKind::Float, NumKind::Int) => F2I,
                (NumKind::Float, NumKind::Long) => F2L,
                (NumKind::Float, NumKind::Double) => F2D,
                (NumKind::Double, NumKind::Int) => D2I,
                (NumKind::Double, NumKind::Long) => D2L,
                (NumKind::Double, NumKind::Float) => D2F,
                _ => {
                    return Err(LowerError::Invalid(AnalysisError::TypeMismatch {
                        expected: "conversion between distinct types",
                        found: format!("{from:?} to {to:?}").to_lowercase(),
                    }));
                }
            };
            single(opcode)
        }
        Insn::Narrow(narrow) => single(match narrow {
            IntNarrow::Byte => I2B,
            IntNarrow::Char => I2C,
            IntNarrow::Short => I2S,
        }),
        Insn::LCmp => single(LCMP),
        Insn::FCmp { nan_greater } => single(if *nan_greater { FCMPG } else { FCMPL }),
        Insn::DCmp { nan_greater } => single(if *nan_greater { DCMPG } else { DCMPL }),
        Insn::Pop => single(POP),
        Insn::Pop2 => single(POP2),
        Insn::Dup => single(DUP),
        Insn::DupX1 => single(DUP_X1),
        Insn::DupX2 => single(DUP_X2),
        Insn::Dup2 => single(DUP2),
        Insn::Swap => single(SWAP),
        Insn::ArrayLoad(elem) => single(IALOAD + elem.index()),
        Insn::ArrayStore(elem) => single(IASTORE + elem.index()),
        Insn::ArrayLength => single(ARRAYLENGTH),
        Insn::NewArray(primitive) => Piece::Bytes(vec![NEWARRAY, primitive.atype()]),
        Insn::ANewArray(component) => indexed(ANEWARRAY, pool.add_class(component.as_str())?),
        Insn::If(cond, label) => Piece::Branch {
            opcode: IFEQ + cond.index(),
            label: *label,
        },
        Insn::IfICmp(cond, label) => Piece::Branch {
            opcode: IF_ICMPEQ + cond.index(),
            label: *label,
        },
        Insn::IfACmpEq(label) => Piece::Branch {
            opcode: IF_ACMPEQ,
            label: *label,
        },
        Insn::IfACmpNe(label) => Piece::Branch {
            opcode: IF_ACMPNE,
            label: *label,
        },
        Insn::IfNull(label) => Piece::Branch {
            opcode: IFNULL,
            label: *label,
        },
        Insn::IfNonNull(label) => Piece::Branch {
            opcode: IFNONNULL,
            label: *label,
        },
        Insn::Goto(label) => Piece::Branch {
            opcode: GOTO,
            label: *label,
        },
        Insn::Field(op, field) => {
            let opcode = match op {
                FieldOp::GetStatic => GETSTATIC,
                FieldOp::PutStatic => PUTSTATIC,
                FieldOp::GetField => GETFIELD,
                FieldOp::PutField => PUTFIELD,
            };
            let owner = pool.add_class(field.owner.as_str())?;
            indexed(opcode, pool.add_field_ref(owner, field.name.as_str(), field.descriptor.as_str())?)
        }
        Insn::Invoke(kind, method) => {
            let interface = method.interface || *kind == InvokeKind::Interface;
            let owner = pool.add_class(method.owner.as_str())?;
            let (name, descriptor) = (method.name.as_str(), method.descriptor.as_str());
            let index = if interface {
                pool.add_interface_method_ref(owner, name, descriptor)?
            } else {
                pool.add_method_ref(owner, name, descriptor)?
            };
            match kind {
                InvokeKind::Virtual => indexed(INVOKEVIRTUAL, index),
                InvokeKind::Special => indexed(INVOKESPECIAL, index),
                InvokeKind::Static => indexed(INVOKESTATIC, index),
                InvokeKind::Interface => {
                    let descriptor = MethodDescriptor::parse(&method.descriptor).map_err(|_| {
                        LowerError::Invalid(AnalysisError::TypeMismatch {
                            expected: "method descriptor",
                            found: method.descriptor.clone(),
                        })
                    })?;
                    let count = u8::try_from(descriptor.parameter_slots() + 1).map_err(|_| {
                        LowerError::Invalid(AnalysisError::LimitExceeded {
                            what: "invokeinterface argument slots",
                            limit: 255,
                        })
                    })?;
                    let [hi, lo] = index.to_be_bytes();
                    Piece::Bytes(vec![INVOKEINTERFACE, hi, lo, count, 0])
                }
            }
        }
        Insn::New(class) => indexed(NEW, pool.add_class(class.as_str())?),
        Insn::CheckCast(class) => indexed(CHECKCAST, pool.add_class(class.as_str())?),
        Insn::InstanceOf(class) => indexed(INSTANCEOF, pool.add_class(class.as_str())?),
        Insn::Return => single(RETURN),
        Insn::ValueReturn(kind) => single(IRETURN + kind.index()),
        Insn::Athrow => single(ATHROW),
        Insn::MonitorEnter => single(MONITORENTER),
        Insn::MonitorExit => single(MONITOREXIT),
    };
    Ok(piece)
}
