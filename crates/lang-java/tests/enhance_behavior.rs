mod common;

use common::code_of;
use jarweave_api::{MethodAccessFlags, MethodSignature, ModuleId};
use jarweave_java::bytecode::{ArithOp, ArrayElem, Cond, FieldOp, FieldRef, Insn, InvokeKind, Label, MethodRef, NumKind, ValueKind};
use jarweave_java::classfile::{self, ClassBuilder, ClassFileExt};
use jarweave_java::enhance::enhance_class;
use jarweave_java::{AnalysisError, DelegateBody, ExtensionMethodDefinition, InstructionBody, RewriteError, inspect};
use ristretto_classfile::attributes::{StackFrame, VerificationType};

fn module(name: &str) -> ModuleId {
    ModuleId::parse(name).expect("valid module")
}

fn signature(access: MethodAccessFlags, name: &str, descriptor: &str) -> MethodSignature {
    MethodSignature::new(access, name, descriptor).expect("valid signature")
}

fn public_static() -> MethodAccessFlags {
    MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC
}

fn box_class() -> Vec<u8> {
    ClassBuilder::new("demo/Box")
        .and_then(|b| b.implements("java/io/Serializable"))
        .and_then(|b| b.default_constructor())
        .and_then(|b| b.to_bytes())
        .expect("fixture builds")
}

fn inject(bytes: &[u8], target: &str, definitions: Vec<ExtensionMethodDefinition>) -> Vec<u8> {
    enhance_class(bytes, &module(target), &definitions).expect("enhance succeeds")
}

fn instructions(target: &str, sig: MethodSignature, body: Vec<Insn>) -> ExtensionMethodDefinition {
    ExtensionMethodDefinition::new(module(target), sig, InstructionBody(body))
}

#[test]
fn test_method_without_locals() {
    let bytes = box_class();
    let rewritten = inject(
        &bytes,
        "demo.Box",
        vec![instructions(
            "demo.Box",
            signature(public_static(), "answer", "()I"),
            vec![Insn::IConst(42), Insn::ValueReturn(ValueKind::Int)],
        )],
    );

    let code = code_of(&rewritten, "answer", "()I");
    assert_eq!(code.code, vec![0x10, 42, 0xac]);
    assert_eq!(code.max_stack, 1);
    assert_eq!(code.max_locals, 0);
    assert!(code.attributes.is_empty());
    assert!(code.frames.is_empty());
}

#[test]
fn test_delegate_with_wide_parameters() {
    let bytes = box_class();
    let descriptor = "(IJDLjava/lang/String;[IF)D";
    let definition = ExtensionMethodDefinition::new(
        module("demo.Box"),
        signature(MethodAccessFlags::PUBLIC, "mix", descriptor),
        DelegateBody::new(&module("demo.BoxExtension")),
    );
    let rewritten = inject(&bytes, "demo.Box", vec![definition]);

    let code = code_of(&rewritten, "mix", descriptor);
    assert_eq!(code.max_locals, 9);
    assert_eq!(code.max_stack, 9);
    assert_eq!(
        code.code[..12],
        [0x2a, 0x1b, 0x20, 0x18, 4, 0x19, 6, 0x19, 7, 0x17, 8, 0xb8]
    );
    assert_eq!(code.code.last(), Some(&0xaf));

    let class = classfile::parse(&rewritten).unwrap();
    let helper = "(Ldemo/Box;IJDLjava/lang/String;[IF)D";
    assert!((1..512u16).any(|i| class.constant_pool.try_get_utf8(i).is_ok_and(|s| s == helper)));
}

#[test]
fn test_many_locals_use_wide_forms() {
    let bytes = box_class();
    let rewritten = inject(
        &bytes,
        "demo.Box",
        vec![instructions(
            "demo.Box",
            signature(public_static(), "countdown", "()I"),
            vec![
                Insn::IConst(5),
                Insn::Store(ValueKind::Int, 299),
                Insn::Iinc(299, -1),
                Insn::Load(ValueKind::Int, 299),
                Insn::ValueReturn(ValueKind::Int),
            ],
        )],
    );

    let code = code_of(&rewritten, "countdown", "()I");
    assert_eq!(code.max_locals, 300);
    assert_eq!(
        code.code,
        vec![
            0x08, // iconst_5
            0xc4, 0x36, 0x01, 0x2b, // wide istore 299
            0xc4, 0x84, 0x01, 0x2b, 0xff, 0xff, // wide iinc 299 -1
            0xc4, 0x15, 0x01, 0x2b, // wide iload 299
            0xac,
        ]
    );
}

#[test]
fn test_branch_over_long_slots_gets_frames() {
    let bytes = box_class();
    let second = Label(0);
    let body = vec![
        Insn::Load(ValueKind::Long, 0),
        Insn::Load(ValueKind::Long, 2),
        Insn::LCmp,
        Insn::If(Cond::Lt, second),
        Insn::Load(ValueKind::Long, 0),
        Insn::ValueReturn(ValueKind::Long),
        Insn::Label(second),
        Insn::Load(ValueKind::Long, 2),
        Insn::ValueReturn(ValueKind::Long),
    ];
    let rewritten = inject(
        &bytes,
        "demo.Box",
        vec![instructions("demo.Box", signature(public_static(), "max", "(JJ)J"), body)],
    );

    let code = code_of(&rewritten, "max", "(JJ)J");
    assert_eq!(code.code, vec![0x1e, 0x20, 0x94, 0x9b, 0, 5, 0x1e, 0xad, 0x20, 0xad]);
    assert_eq!(code.max_stack, 4);
    assert_eq!(code.max_locals, 4);
    assert_eq!(code.attributes, vec!["StackMapTable".to_string()]);
    // Branch target at offset 8 with the parameter locals unchanged.
    assert!(matches!(code.frames[..], [StackFrame::SameFrame { frame_type: 8, .. }]));
}

fn sum_body() -> Vec<Insn> {
    let (head, done) = (Label(1), Label(2));
    vec![
        Insn::DConst(0.0),
        Insn::Store(ValueKind::Double, 1),
        Insn::IConst(0),
        Insn::Store(ValueKind::Int, 3),
        Insn::Label(head),
        Insn::Load(ValueKind::Int, 3),
        Insn::Load(ValueKind::Reference, 0),
        Insn::ArrayLength,
        Insn::IfICmp(Cond::Ge, done),
        Insn::Load(ValueKind::Double, 1),
        Insn::Load(ValueKind::Reference, 0),
        Insn::Load(ValueKind::Int, 3),
        Insn::ArrayLoad(ArrayElem::Double),
        Insn::Arith(NumKind::Double, ArithOp::Add),
        Insn::Store(ValueKind::Double, 1),
        Insn::Iinc(3, 1),
        Insn::Goto(head),
        Insn::Label(done),
        Insn::Load(ValueKind::Double, 1),
        Insn::ValueReturn(ValueKind::Double),
    ]
}

#[test]
fn test_loop_with_double_accumulator() {
    let bytes = box_class();
    let rewritten = inject(
        &bytes,
        "demo.Box",
        vec![instructions("demo.Box", signature(public_static(), "sum", "([D)D"), sum_body())],
    );

    let code = code_of(&rewritten, "sum", "([D)D");
    assert_eq!(code.max_locals, 4);
    assert_eq!(code.max_stack, 4);
    assert_eq!(code.attributes, vec!["StackMapTable".to_string()]);
    assert_eq!(
        inspect::method_table(&rewritten).unwrap().last(),
        Some(&("sum".to_string(), "([D)D".to_string()))
    );
}

#[test]
fn test_old_class_versions_get_no_frames() {
    let bytes = ClassBuilder::new("demo/Legacy")
        .and_then(|b| b.version(49))
        .and_then(|b| b.default_constructor())
        .and_then(|b| b.to_bytes())
        .unwrap();
    let rewritten = inject(
        &bytes,
        "demo.Legacy",
        vec![instructions("demo.Legacy", signature(public_static(), "sum", "([D)D"), sum_body())],
    );
    let code = code_of(&rewritten, "sum", "([D)D");
    assert!(code.attributes.is_empty());
    assert!(code.frames.is_empty());
}

#[test]
fn test_loop_frames_decode() {
    let bytes = box_class();
    let rewritten = inject(
        &bytes,
        "demo.Box",
        vec![instructions("demo.Box", signature(public_static(), "sum", "([D)D"), sum_body())],
    );

    // Loop head at offset 4 adds the accumulator and the index; the exit at
    // offset 22 sees the same locals.
    let code = code_of(&rewritten, "sum", "([D)D");
    match &code.frames[..] {
        [
            StackFrame::AppendFrame {
                frame_type: 253,
                offset_delta: 4,
                locals,
                ..
            },
            StackFrame::SameFrame { frame_type: 17, .. },
        ] => assert!(matches!(locals[..], [VerificationType::Double, VerificationType::Integer])),
        other => panic!("unexpected frames {other:?}"),
    }
}

#[test]
fn test_reference_local_frame_decodes_as_object() {
    let bytes = box_class();
    let fallback = Label(0);
    let body = vec![
        Insn::LdcString("x".into()),
        Insn::Store(ValueKind::Reference, 1),
        Insn::Load(ValueKind::Int, 0),
        Insn::If(Cond::Eq, fallback),
        Insn::Load(ValueKind::Reference, 1),
        Insn::ValueReturn(ValueKind::Reference),
        Insn::Label(fallback),
        Insn::AconstNull,
        Insn::ValueReturn(ValueKind::Reference),
    ];
    let rewritten = inject(
        &bytes,
        "demo.Box",
        vec![instructions(
            "demo.Box",
            signature(public_static(), "label", "(Z)Ljava/lang/Object;"),
            body,
        )],
    );

    let code = code_of(&rewritten, "label", "(Z)Ljava/lang/Object;");
    assert_eq!(code.max_locals, 2);
    match &code.frames[..] {
        [StackFrame::AppendFrame {
            frame_type: 252,
            offset_delta: 9,
            locals,
            ..
        }] => assert!(matches!(locals[..], [VerificationType::Object { .. }])),
        other => panic!("unexpected frames {other:?}"),
    }
}

#[test]
fn test_injected_constructor() {
    let bytes = box_class();
    let body = vec![
        Insn::Load(ValueKind::Reference, 0),
        Insn::Invoke(InvokeKind::Special, MethodRef::new("java/lang/Object", "<init>", "()V")),
        Insn::Load(ValueKind::Reference, 0),
        Insn::Load(ValueKind::Int, 1),
        Insn::Field(FieldOp::PutField, FieldRef::new("demo/Box", "size", "I")),
        Insn::Return,
    ];
    let rewritten = inject(
        &bytes,
        "demo.Box",
        vec![instructions("demo.Box", signature(MethodAccessFlags::PUBLIC, "<init>", "(I)V"), body)],
    );
    let code = code_of(&rewritten, "<init>", "(I)V");
    assert_eq!(code.max_stack, 2);
    assert_eq!(code.max_locals, 2);
}

#[test]
fn test_default_method_on_interface() {
    let bytes = ClassBuilder::interface("demo/Shape")
        .and_then(|b| b.abstract_method(&signature(MethodAccessFlags::PUBLIC, "area", "()D")))
        .and_then(|b| b.to_bytes())
        .unwrap();
    let definition = ExtensionMethodDefinition::new(
        module("demo.Shape"),
        signature(MethodAccessFlags::PUBLIC, "describe", "()Ljava/lang/String;"),
        DelegateBody::new(&module("demo.Shapes")),
    );
    let rewritten = inject(&bytes, "demo.Shape", vec![definition]);

    let expected = vec![
        ("area".to_string(), "()D".to_string()),
        ("describe".to_string(), "()Ljava/lang/String;".to_string()),
    ];
    assert_eq!(inspect::method_table(&rewritten).unwrap(), expected);
    let class = classfile::parse(&rewritten).unwrap();
    assert!(class.is_interface());
    assert_eq!(class.method_keys().unwrap(), expected);
}

#[test]
fn test_unmodified_class_round_trips() {
    let bytes = box_class();
    assert_eq!(classfile::to_bytes(&classfile::parse(&bytes).unwrap()).unwrap(), bytes);
    assert_eq!(inject(&bytes, "demo.Box", Vec::new()), bytes);
}

#[test]
fn test_original_members_survive() {
    let bytes = box_class();
    let original = classfile::parse(&bytes).unwrap();
    let rewritten = inject(
        &bytes,
        "demo.Box",
        vec![instructions(
            "demo.Box",
            signature(public_static(), "answer", "()I"),
            vec![Insn::IConst(42), Insn::ValueReturn(ValueKind::Int)],
        )],
    );
    let class = classfile::parse(&rewritten).unwrap();
    assert_eq!(class.methods.len(), original.methods.len() + 1);
    assert_eq!(class.methods[0], original.methods[0]);
    assert_eq!(class.fields, original.fields);
    assert_eq!(class.attributes, original.attributes);
    assert_eq!(class.this_class, original.this_class);
    assert_eq!(class.super_class, original.super_class);
    assert_eq!(class.interfaces, original.interfaces);
    assert_eq!(class.internal_name().unwrap(), "demo/Box");
    assert_eq!(class.super_name().unwrap(), original.super_name().unwrap());
}

#[test]
fn test_incompatible_stack_merge_is_rejected() {
    let bytes = box_class();
    let (other, join) = (Label(0), Label(1));
    let body = vec![
        Insn::Load(ValueKind::Int, 0),
        Insn::If(Cond::Eq, other),
        Insn::LdcString("a".into()),
        Insn::Goto(join),
        Insn::Label(other),
        Insn::LdcClass("demo/Box".into()),
        Insn::Label(join),
        Insn::ValueReturn(ValueKind::Reference),
    ];
    let definitions = vec![instructions(
        "demo.Box",
        signature(public_static(), "pick", "(Z)Ljava/lang/Object;"),
        body,
    )];
    let err = enhance_class(&bytes, &module("demo.Box"), &definitions).unwrap_err();
    assert!(matches!(
        err,
        RewriteError::Analysis {
            error: AnalysisError::IncompatibleMerge { .. },
            ..
        }
    ));
}
