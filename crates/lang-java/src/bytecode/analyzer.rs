//! Data-flow pass over a symbolic method body.
//!
//! Computes the operand stack and local variable limits and the type state
//! at every jump target. Reference types are compared by name only; there is
//! no class hierarchy, so two distinct class types only merge when one side
//! is `java/lang/Object`.

use super::frame::{Frame, VType};
use super::insn::{ArithOp, ArrayElem, FieldOp, Insn, InvokeKind, Label, NumKind, ValueKind};
use crate::error::AnalysisError;
use jarweave_api::descriptor::{FieldType, MethodDescriptor, field_descriptor, parse_field_type as parse_type};
use std::collections::{BTreeSet, HashMap};

const JAVA_LANG_OBJECT: &str = "java/lang/Object";
const CONSTRUCTOR: &str = "<init>";

/// The method whose body is analyzed.
pub(crate) struct MethodShape<'a> {
    pub class_name: &'a str,
    pub name: &'a str,
    pub is_static: bool,
    pub descriptor: &'a MethodDescriptor,
}

#[derive(Debug)]
pub(crate) struct Analysis {
    pub max_stack: u16,
    pub max_locals: u16,
    pub initial: Frame,
    /// Frames at jump targets, ordered by offset.
    pub frames: Vec<(u32, Frame)>,
}

/// `targets` maps every label to the index of the first label of its run;
/// `offsets` holds the bytecode offset of every instruction.
pub(crate) fn analyze(
    insns: &[Insn],
    offsets: &[u32],
    targets: &HashMap<Label, usize>,
    shape: &MethodShape<'_>,
) -> Result<Analysis, (usize, AnalysisError)> {
    let initial = initial_frame(shape);
    let n = insns.len();
    if n == 0 {
        return Err((0, AnalysisError::FallsOffEnd));
    }

    let mut states: Vec<Option<Frame>> = vec![None; n];
    states[0] = Some(initial.clone());
    let mut work = vec![0usize];
    let mut jump_targets = BTreeSet::new();
    let mut max_stack = 0usize;
    let mut max_locals = initial.locals.len();

    while let Some(i) = work.pop() {
        let Some(mut frame) = states[i].clone() else {
            continue;
        };
        let insn = &insns[i];
        execute(insn, &mut frame, offsets[i], shape).map_err(|e| (i, e))?;
        max_stack = max_stack.max(frame.stack_slots());
        max_locals = max_locals.max(frame.locals.len());

        let mut successors = Vec::with_capacity(2);
        if let Some(&target) = insn.jump_target().and_then(|l| targets.get(&l)) {
            jump_targets.insert(target);
            successors.push(target);
        }
        if insn.falls_through() {
            if i + 1 == n {
                return Err((i, AnalysisError::FallsOffEnd));
            }
            successors.push(i + 1);
        }

        for s in successors {
            let updated = match &states[s] {
                None => Some(frame.clone()),
                Some(old) => {
                    let merged = old.merge(&frame).map_err(|e| (s, e))?;
                    (merged != *old).then_some(merged)
                }
            };
            if let Some(f) = updated {
                states[s] = Some(f);
                work.push(s);
            }
        }
    }

    if let Some(i) = (0..n).find(|&i| states[i].is_none() && !matches!(insns[i], Insn::Label(_))) {
        return Err((i, AnalysisError::Unreachable));
    }

    let max_stack = u16::try_from(max_stack).map_err(|_| {
        (
            0,
            AnalysisError::LimitExceeded {
                what: "max_stack",
                limit: u16::MAX as u32,
            },
        )
    })?;
    let max_locals = u16::try_from(max_locals).map_err(|_| {
        (
            0,
            AnalysisError::LimitExceeded {
                what: "max_locals",
                limit: u16::MAX as u32,
            },
        )
    })?;

    let frames = jump_targets
        .into_iter()
        .filter_map(|t| states[t].take().map(|f| (offsets[t], f)))
        .collect();

    Ok(Analysis {
        max_stack,
        max_locals,
        initial,
        frames,
    })
}

fn initial_frame(shape: &MethodShape<'_>) -> Frame {
    let mut locals = Vec::new();
    if !shape.is_static {
        if shape.name == CONSTRUCTOR && shape.class_name != JAVA_LANG_OBJECT {
            locals.push(VType::UninitializedThis);
        } else {
            locals.push(VType::Object(shape.class_name.to_string()));
        }
    }
    for parameter in &shape.descriptor.parameters {
        let v = VType::from_field_type(parameter);
        let wide = v.is_wide();
        locals.push(v);
        if wide {
            locals.push(VType::Top);
        }
    }
    Frame {
        locals,
        stack: Vec::new(),
    }
}

fn kind_name(kind: ValueKind) -> &'static str {
    match kind {
        ValueKind::Int => "int",
        ValueKind::Long => "long",
        ValueKind::Float => "float",
        ValueKind::Double => "double",
        ValueKind::Reference => "reference",
    }
}

fn matches_kind(v: &VType, kind: ValueKind) -> bool {
    match kind {
        ValueKind::Int => *v == VType::Integer,
        ValueKind::Long => *v == VType::Long,
        ValueKind::Float => *v == VType::Float,
        ValueKind::Double => *v == VType::Double,
        ValueKind::Reference => v.is_reference(),
    }
}

fn num_value_kind(kind: NumKind) -> ValueKind {
    match kind {
        NumKind::Int => ValueKind::Int,
        NumKind::Long => ValueKind::Long,
        NumKind::Float => ValueKind::Float,
        NumKind::Double => ValueKind::Double,
    }
}

fn kind_vtype(kind: ValueKind) -> VType {
    match kind {
        ValueKind::Int => VType::Integer,
        ValueKind::Long => VType::Long,
        ValueKind::Float => VType::Float,
        ValueKind::Double => VType::Double,
        ValueKind::Reference => VType::Null,
    }
}

fn pop(frame: &mut Frame) -> Result<VType, AnalysisError> {
    frame.stack.pop().ok_or(AnalysisError::StackUnderflow)
}

fn pop_kind(frame: &mut Frame, kind: ValueKind) -> Result<VType, AnalysisError> {
    let v = pop(frame)?;
    if matches_kind(&v, kind) {
        Ok(v)
    } else {
        Err(AnalysisError::TypeMismatch {
            expected: kind_name(kind),
            found: v.to_string(),
        })
    }
}

fn pop_category1(frame: &mut Frame) -> Result<VType, AnalysisError> {
    let v = pop(frame)?;
    if v.is_wide() {
        Err(AnalysisError::TypeMismatch {
            expected: "category 1 value",
            found: v.to_string(),
        })
    } else {
        Ok(v)
    }
}

fn parse_field_type(descriptor: &str) -> Result<FieldType, AnalysisError> {
    parse_type(descriptor).map_err(|_| AnalysisError::TypeMismatch {
        expected: "field descriptor",
        found: descriptor.to_string(),
    })
}

fn parse_method_descriptor(descriptor: &str) -> Result<MethodDescriptor, AnalysisError> {
    MethodDescriptor::parse(descriptor).map_err(|_| AnalysisError::TypeMismatch {
        expected: "method descriptor",
        found: descriptor.to_string(),
    })
}

fn load(frame: &Frame, kind: ValueKind, index: u16) -> Result<VType, AnalysisError> {
    let i = index as usize;
    let v = frame.locals.get(i).cloned().unwrap_or(VType::Top);
    let complete = !v.is_wide() || frame.locals.get(i + 1) == Some(&VType::Top);
    if matches_kind(&v, kind) && complete {
        Ok(v)
    } else {
        Err(AnalysisError::BadLocal {
            index,
            found: v.to_string(),
        })
    }
}

fn store(frame: &mut Frame, index: u16, v: VType) -> Result<(), AnalysisError> {
    let i = index as usize;
    let width = v.slots() as usize;
    if i + width > u16::MAX as usize {
        return Err(AnalysisError::LimitExceeded {
            what: "max_locals",
            limit: u16::MAX as u32,
        });
    }
    if frame.locals.len() < i + width {
        frame.locals.resize(i + width, VType::Top);
    }
    if i > 0 && frame.locals[i - 1].is_wide() {
        frame.locals[i - 1] = VType::Top;
    }
    frame.locals[i] = v;
    if width == 2 {
        frame.locals[i + 1] = VType::Top;
    }
    Ok(())
}

/// Component type loaded from or stored into `array` by an `elem` access.
fn array_component(array: &VType, elem: ArrayElem) -> Result<VType, AnalysisError> {
    if *array == VType::Null {
        return Ok(kind_vtype(elem.value_kind()));
    }
    let mismatch = || AnalysisError::TypeMismatch {
        expected: "array of matching element type",
        found: array.to_string(),
    };
    let VType::Object(name) = array else {
        return Err(mismatch());
    };
    let component = name.strip_prefix('[').and_then(|c| c.chars().next()).ok_or_else(mismatch)?;
    if !elem.accepts(component) {
        return Err(mismatch());
    }
    array.component().ok_or_else(mismatch)
}

fn array_class(component: &str) -> String {
    if component.starts_with('[') {
        format!("[{component}")
    } else {
        format!("[L{component};")
    }
}

fn execute(insn: &Insn, frame: &mut Frame, offset: u32, shape: &MethodShape<'_>) -> Result<(), AnalysisError> {
    match insn {
        Insn::Label(_) | Insn::Nop => {}
        Insn::AconstNull => frame.stack.push(VType::Null),
        Insn::IConst(_) => frame.stack.push(VType::Integer),
        Insn::LConst(_) => frame.stack.push(VType::Long),
        Insn::FConst(_) => frame.stack.push(VType::Float),
        Insn::DConst(_) => frame.stack.push(VType::Double),
        Insn::LdcString(_) => frame.stack.push(VType::Object("java/lang/String".to_string())),
        Insn::LdcClass(_) => frame.stack.push(VType::Object("java/lang/Class".to_string())),
        Insn::Load(kind, index) => {
            let v = load(frame, *kind, *index)?;
            frame.stack.push(v);
        }
        Insn::Store(kind, index) => {
            let v = pop_kind(frame, *kind)?;
            store(frame, *index, v)?;
        }
        Insn::Iinc(index, _) => {
            load(frame, ValueKind::Int, *index)?;
        }
        Insn::Arith(kind, op) => {
            let kind = num_value_kind(*kind);
            if op.is_shift() {
                pop_kind(frame, ValueKind::Int)?;
                pop_kind(frame, kind)?;
            } else if *op == ArithOp::Neg {
                pop_kind(frame, kind)?;
            } else {
                pop_kind(frame, kind)?;
                pop_kind(frame, kind)?;
            }
            frame.stack.push(kind_vtype(kind));
        }
        Insn::Convert(from, to) => {
            pop_kind(frame, num_value_kind(*from))?;
            frame.stack.push(kind_vtype(num_value_kind(*to)));
        }
        Insn::Narrow(_) => {
            pop_kind(frame, ValueKind::Int)?;
            frame.stack.push(VType::Integer);
        }
        Insn::LCmp => compare(frame, ValueKind::Long)?,
        Insn::FCmp { .. } => compare(frame, ValueKind::Float)?,
        Insn::DCmp { .. } => compare(frame, ValueKind::Double)?,
        Insn::Pop => {
            pop_category1(frame)?;
        }
        Insn::Pop2 => {
            if !pop(frame)?.is_wide() {
                pop_category1(frame)?;
            }
        }
        Insn::Dup => {
            let v = pop_category1(frame)?;
            frame.stack.push(v.clone());
            frame.stack.push(v);
        }
        Insn::DupX1 => {
            let v1 = pop_category1(frame)?;
            let v2 = pop_category1(frame)?;
            frame.stack.extend([v1.clone(), v2, v1]);
        }
        Insn::DupX2 => {
            let v1 = pop_category1(frame)?;
            let v2 = pop(frame)?;
            if v2.is_wide() {
                frame.stack.extend([v1.clone(), v2, v1]);
            } else {
                let v3 = pop_category1(frame)?;
                frame.stack.extend([v1.clone(), v3, v2, v1]);
            }
        }
        Insn::Dup2 => {
            let v1 = pop(frame)?;
            if v1.is_wide() {
                frame.stack.extend([v1.clone(), v1]);
            } else {
                let v2 = pop_category1(frame)?;
                frame.stack.extend([v2.clone(), v1.clone(), v2, v1]);
            }
        }
        Insn::Swap => {
            let v1 = pop_category1(frame)?;
            let v2 = pop_category1(frame)?;
            frame.stack.extend([v1, v2]);
        }
        Insn::ArrayLoad(elem) => {
            pop_kind(frame, ValueKind::Int)?;
            let array = pop_kind(frame, ValueKind::Reference)?;
            let component = array_component(&array, *elem)?;
            frame.stack.push(component);
        }
        Insn::ArrayStore(elem) => {
            pop_kind(frame, elem.value_kind())?;
            pop_kind(frame, ValueKind::Int)?;
            let array = pop_kind(frame, ValueKind::Reference)?;
            array_component(&array, *elem)?;
        }
        Insn::ArrayLength => {
            let array = pop_kind(frame, ValueKind::Reference)?;
            let is_array = matches!(&array, VType::Null)
                || matches!(&array, VType::Object(name) if name.starts_with('['));
            if !is_array {
                return Err(AnalysisError::TypeMismatch {
                    expected: "array",
                    found: array.to_string(),
                });
            }
            frame.stack.push(VType::Integer);
        }
        Insn::NewArray(primitive) => {
            pop_kind(frame, ValueKind::Int)?;
            frame.stack.push(VType::Object(primitive.descriptor().to_string()));
        }
        Insn::ANewArray(component) => {
            pop_kind(frame, ValueKind::Int)?;
            frame.stack.push(VType::Object(array_class(component)));
        }
        Insn::If(_, _) => {
            pop_kind(frame, ValueKind::Int)?;
        }
        Insn::IfICmp(_, _) => {
            pop_kind(frame, ValueKind::Int)?;
            pop_kind(frame, ValueKind::Int)?;
        }
        Insn::IfACmpEq(_) | Insn::IfACmpNe(_) => {
            pop_kind(frame, ValueKind::Reference)?;
            pop_kind(frame, ValueKind::Reference)?;
        }
        Insn::IfNull(_) | Insn::IfNonNull(_) => {
            pop_kind(frame, ValueKind::Reference)?;
        }
        Insn::Goto(_) => {}
        Insn::Field(op, field) => {
            let ty = parse_field_type(&field.descriptor)?;
            match op {
                FieldOp::GetStatic => frame.stack.push(VType::from_field_type(&ty)),
                FieldOp::PutStatic => {
                    pop_kind(frame, ValueKind::of(&ty))?;
                }
                FieldOp::GetField => {
                    pop_kind(frame, ValueKind::Reference)?;
                    frame.stack.push(VType::from_field_type(&ty));
                }
                FieldOp::PutField => {
                    pop_kind(frame, ValueKind::of(&ty))?;
                    pop_kind(frame, ValueKind::Reference)?;
                }
            }
        }
        Insn::Invoke(kind, method) => {
            let descriptor = parse_method_descriptor(&method.descriptor)?;
            for parameter in descriptor.parameters.iter().rev() {
                pop_kind(frame, ValueKind::of(parameter))?;
            }
            if *kind != InvokeKind::Static {
                let receiver = pop_kind(frame, ValueKind::Reference)?;
                if *kind == InvokeKind::Special && method.name == CONSTRUCTOR {
                    let initialized = match &receiver {
                        VType::UninitializedThis => VType::Object(shape.class_name.to_string()),
                        VType::Uninitialized(_) => VType::Object(method.owner.clone()),
                        other => {
                            return Err(AnalysisError::TypeMismatch {
                                expected: "uninitialized object",
                                found: other.to_string(),
                            });
                        }
                    };
                    for slot in frame.locals.iter_mut().chain(frame.stack.iter_mut()) {
                        if *slot == receiver {
                            *slot = initialized.clone();
                        }
                    }
                }
            }
            if let Some(ret) = &descriptor.return_type {
                frame.stack.push(VType::from_field_type(ret));
            }
        }
        Insn::New(_) => frame.stack.push(VType::Uninitialized(offset)),
        Insn::CheckCast(class) => {
            pop_kind(frame, ValueKind::Reference)?;
            frame.stack.push(VType::Object(class.clone()));
        }
        Insn::InstanceOf(_) => {
            pop_kind(frame, ValueKind::Reference)?;
            frame.stack.push(VType::Integer);
        }
        Insn::Return => {
            if let Some(ret) = &shape.descriptor.return_type {
                return Err(AnalysisError::ReturnMismatch {
                    expected: field_descriptor(ret),
                    found: "void".to_string(),
                });
            }
            if frame.locals.contains(&VType::UninitializedThis) {
                return Err(AnalysisError::TypeMismatch {
                    expected: "initialized this",
                    found: VType::UninitializedThis.to_string(),
                });
            }
        }
        Insn::ValueReturn(kind) => {
            let declared = shape.descriptor.return_type.as_ref().map(ValueKind::of);
            if declared != Some(*kind) {
                return Err(AnalysisError::ReturnMismatch {
                    expected: shape
                        .descriptor
                        .return_type
                        .as_ref()
                        .map_or_else(|| "void".to_string(), field_descriptor),
                    found: kind_name(*kind).to_string(),
                });
            }
            pop_kind(frame, *kind)?;
        }
        Insn::Athrow | Insn::MonitorEnter | Insn::MonitorExit => {
            pop_kind(frame, ValueKind::Reference)?;
        }
    }
    Ok(())
}

fn compare(frame: &mut Frame, kind: ValueKind) -> Result<(), AnalysisError> {
    pop_kind(frame, kind)?;
    pop_kind(frame, kind)?;
    frame.stack.push(VType::Integer);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::insn::{Cond, MethodRef};

    fn run(
        insns: &[Insn],
        class_name: &str,
        name: &str,
        is_static: bool,
        descriptor: &str,
    ) -> Result<Analysis, (usize, AnalysisError)> {
        let descriptor = MethodDescriptor::parse(descriptor).unwrap();
        let shape = MethodShape {
            class_name,
            name,
            is_static,
            descriptor: &descriptor,
        };
        // Offsets are irrelevant to typing; use the instruction index.
        let offsets: Vec<u32> = (0..insns.len() as u32).collect();
        let mut targets = HashMap::new();
        for (i, insn) in insns.iter().enumerate() {
            if let Insn::Label(l) = insn {
                targets.entry(*l).or_insert(i);
            }
        }
        analyze(insns, &offsets, &targets, &shape)
    }

    #[test]
    fn test_limits_for_wide_parameters() {
        let insns = vec![
            Insn::Load(ValueKind::Long, 1),
            Insn::Load(ValueKind::Double, 3),
            Insn::Convert(NumKind::Double, NumKind::Long),
            Insn::Arith(NumKind::Long, ArithOp::Add),
            Insn::ValueReturn(ValueKind::Long),
        ];
        let analysis = run(&insns, "a/A", "sum", false, "(JD)J").unwrap();
        assert_eq!(analysis.max_stack, 4);
        assert_eq!(analysis.max_locals, 5);
        assert!(analysis.frames.is_empty());
    }

    #[test]
    fn test_frames_at_jump_targets() {
        let else_label = Label(0);
        let insns = vec![
            Insn::Load(ValueKind::Int, 0),
            Insn::If(Cond::Eq, else_label),
            Insn::IConst(1),
            Insn::ValueReturn(ValueKind::Int),
            Insn::Label(else_label),
            Insn::IConst(2),
            Insn::ValueReturn(ValueKind::Int),
        ];
        let analysis = run(&insns, "a/A", "pick", true, "(Z)I").unwrap();
        assert_eq!(analysis.frames.len(), 1);
        let (offset, frame) = &analysis.frames[0];
        assert_eq!(*offset, 4);
        assert_eq!(frame.locals, vec![VType::Integer]);
        assert!(frame.stack.is_empty());
    }

    #[test]
    fn test_loop_merges_locals() {
        let head = Label(1);
        let insns = vec![
            Insn::AconstNull,
            Insn::Store(ValueKind::Reference, 1),
            Insn::Label(head),
            Insn::LdcString("x".into()),
            Insn::Store(ValueKind::Reference, 1),
            Insn::Load(ValueKind::Int, 0),
            Insn::If(Cond::Ne, head),
            Insn::Return,
        ];
        let analysis = run(&insns, "a/A", "spin", true, "(I)V").unwrap();
        let (_, frame) = &analysis.frames[0];
        assert_eq!(
            frame.locals,
            vec![VType::Integer, VType::Object("java/lang/String".into())]
        );
    }

    #[test]
    fn test_constructor_initializes_this() {
        let insns = vec![
            Insn::Load(ValueKind::Reference, 0),
            Insn::Invoke(InvokeKind::Special, MethodRef::new("java/lang/Object", "<init>", "()V")),
            Insn::Return,
        ];
        assert!(run(&insns, "a/A", "<init>", false, "()V").is_ok());

        let missing_super = vec![Insn::Return];
        let (index, error) = run(&missing_super, "a/A", "<init>", false, "()V").unwrap_err();
        assert_eq!(index, 0);
        assert!(matches!(error, AnalysisError::TypeMismatch { .. }));
    }

    #[test]
    fn test_new_dup_init_leaves_object() {
        let insns = vec![
            Insn::New("java/lang/StringBuilder".into()),
            Insn::Dup,
            Insn::Invoke(
                InvokeKind::Special,
                MethodRef::new("java/lang/StringBuilder", "<init>", "()V"),
            ),
            Insn::ValueReturn(ValueKind::Reference),
        ];
        let analysis = run(&insns, "a/A", "make", true, "()Ljava/lang/Object;").unwrap();
        assert_eq!(analysis.max_stack, 2);
    }

    #[test]
    fn test_rejects_type_errors() {
        let insns = vec![Insn::Load(ValueKind::Reference, 0), Insn::ValueReturn(ValueKind::Reference)];
        let (index, error) = run(&insns, "a/A", "f", true, "(I)Ljava/lang/Object;").unwrap_err();
        assert_eq!(index, 0);
        assert!(matches!(error, AnalysisError::BadLocal { index: 0, .. }));

        let insns = vec![Insn::IConst(1), Insn::ValueReturn(ValueKind::Int)];
        let (_, error) = run(&insns, "a/A", "f", true, "()V").unwrap_err();
        assert!(matches!(error, AnalysisError::ReturnMismatch { .. }));
    }

    #[test]
    fn test_rejects_fall_off_and_dead_code() {
        let insns = vec![Insn::IConst(1), Insn::Pop];
        let (index, error) = run(&insns, "a/A", "f", true, "()V").unwrap_err();
        assert_eq!((index, error), (1, AnalysisError::FallsOffEnd));

        let insns = vec![Insn::Return, Insn::Nop, Insn::Return];
        let (index, error) = run(&insns, "a/A", "f", true, "()V").unwrap_err();
        assert_eq!((index, error), (1, AnalysisError::Unreachable));
    }

    #[test]
    fn test_stack_underflow() {
        let insns = vec![Insn::Pop, Insn::Return];
        let (_, error) = run(&insns, "a/A", "f", true, "()V").unwrap_err();
        assert_eq!(error, AnalysisError::StackUnderflow);
    }
}
