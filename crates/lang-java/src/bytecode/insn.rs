use jarweave_api::{BaseType, FieldType};

/// Branch target placeholder; bound with [`Insn::Label`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub u32);

/// Computational type of a local variable or return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Int,
    Long,
    Float,
    Double,
    Reference,
}

impl ValueKind {
    pub fn of(ty: &FieldType) -> Self {
        match ty {
            FieldType::Base(BaseType::Long) => ValueKind::Long,
            FieldType::Base(BaseType::Float) => ValueKind::Float,
            FieldType::Base(BaseType::Double) => ValueKind::Double,
            FieldType::Object(_) | FieldType::Array(_) => ValueKind::Reference,
            FieldType::Base(_) => ValueKind::Int,
        }
    }

    pub fn slots(self) -> u16 {
        match self {
            ValueKind::Long | ValueKind::Double => 2,
            _ => 1,
        }
    }

    pub(crate) fn index(self) -> u8 {
        match self {
            ValueKind::Int => 0,
            ValueKind::Long => 1,
            ValueKind::Float => 2,
            ValueKind::Double => 3,
            ValueKind::Reference => 4,
        }
    }
}

/// Numeric operand type of arithmetic and conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumKind {
    Int,
    Long,
    Float,
    Double,
}

impl NumKind {
    pub(crate) fn index(self) -> u8 {
        match self {
            NumKind::Int => 0,
            NumKind::Long => 1,
            NumKind::Float => 2,
            NumKind::Double => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Neg,
    Shl,
    Shr,
    Ushr,
    And,
    Or,
    Xor,
}

impl ArithOp {
    pub(crate) fn is_integral_only(self) -> bool {
        matches!(
            self,
            ArithOp::Shl | ArithOp::Shr | ArithOp::Ushr | ArithOp::And | ArithOp::Or | ArithOp::Xor
        )
    }

    pub(crate) fn is_shift(self) -> bool {
        matches!(self, ArithOp::Shl | ArithOp::Shr | ArithOp::Ushr)
    }
}

/// Comparison of conditional jumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cond {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

impl Cond {
    pub(crate) fn index(self) -> u8 {
        match self {
            Cond::Eq => 0,
            Cond::Ne => 1,
            Cond::Lt => 2,
            Cond::Ge => 3,
            Cond::Gt => 4,
            Cond::Le => 5,
        }
    }
}

/// Element type of array loads and stores. `Byte` also covers `boolean[]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayElem {
    Int,
    Long,
    Float,
    Double,
    Reference,
    Byte,
    Char,
    Short,
}

impl ArrayElem {
    pub(crate) fn index(self) -> u8 {
        match self {
            ArrayElem::Int => 0,
            ArrayElem::Long => 1,
            ArrayElem::Float => 2,
            ArrayElem::Double => 3,
            ArrayElem::Reference => 4,
            ArrayElem::Byte => 5,
            ArrayElem::Char => 6,
            ArrayElem::Short => 7,
        }
    }

    pub(crate) fn value_kind(self) -> ValueKind {
        match self {
            ArrayElem::Long => ValueKind::Long,
            ArrayElem::Float => ValueKind::Float,
            ArrayElem::Double => ValueKind::Double,
            ArrayElem::Reference => ValueKind::Reference,
            _ => ValueKind::Int,
        }
    }

    /// Whether an array whose descriptor component starts with `component` holds this element.
    pub(crate) fn accepts(self, component: char) -> bool {
        match self {
            ArrayElem::Int => component == 'I',
            ArrayElem::Long => component == 'J',
            ArrayElem::Float => component == 'F',
            ArrayElem::Double => component == 'D',
            ArrayElem::Reference => component == 'L' || component == '[',
            ArrayElem::Byte => component == 'B' || component == 'Z',
            ArrayElem::Char => component == 'C',
            ArrayElem::Short => component == 'S',
        }
    }
}

/// Element type of `newarray`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveArray {
    Boolean,
    Char,
    Float,
    Double,
    Byte,
    Short,
    Int,
    Long,
}

impl PrimitiveArray {
    pub(crate) fn atype(self) -> u8 {
        match self {
            PrimitiveArray::Boolean => 4,
            PrimitiveArray::Char => 5,
            PrimitiveArray::Float => 6,
            PrimitiveArray::Double => 7,
            PrimitiveArray::Byte => 8,
            PrimitiveArray::Short => 9,
            PrimitiveArray::Int => 10,
            PrimitiveArray::Long => 11,
        }
    }

    pub(crate) fn descriptor(self) -> &'static str {
        match self {
            PrimitiveArray::Boolean => "[Z",
            PrimitiveArray::Char => "[C",
            PrimitiveArray::Float => "[F",
            PrimitiveArray::Double => "[D",
            PrimitiveArray::Byte => "[B",
            PrimitiveArray::Short => "[S",
            PrimitiveArray::Int => "[I",
            PrimitiveArray::Long => "[J",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntNarrow {
    Byte,
    Char,
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldOp {
    GetStatic,
    PutStatic,
    GetField,
    PutField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvokeKind {
    Virtual,
    Special,
    Static,
    Interface,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

impl FieldRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    /// Owner is an interface (`InterfaceMethodref`).
    pub interface: bool,
}

impl MethodRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
            interface: false,
        }
    }

    pub fn on_interface(mut self) -> Self {
        self.interface = true;
        self
    }
}

/// Symbolic JVM instruction. Class names are internal names
/// (`java/lang/String`) or array descriptors (`[I`).
#[derive(Debug, Clone, PartialEq)]
pub enum Insn {
    Label(Label),
    Nop,
    AconstNull,
    IConst(i32),
    LConst(i64),
    FConst(f32),
    DConst(f64),
    LdcString(String),
    LdcClass(String),
    Load(ValueKind, u16),
    Store(ValueKind, u16),
    Iinc(u16, i16),
    Arith(NumKind, ArithOp),
    Convert(NumKind, NumKind),
    Narrow(IntNarrow),
    LCmp,
    /// `fcmpg` when `nan_greater`, else `fcmpl`.
    FCmp { nan_greater: bool },
    DCmp { nan_greater: bool },
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Swap,
    ArrayLoad(ArrayElem),
    ArrayStore(ArrayElem),
    ArrayLength,
    NewArray(PrimitiveArray),
    ANewArray(String),
    If(Cond, Label),
    IfICmp(Cond, Label),
    IfACmpEq(Label),
    IfACmpNe(Label),
    IfNull(Label),
    IfNonNull(Label),
    Goto(Label),
    Field(FieldOp, FieldRef),
    Invoke(InvokeKind, MethodRef),
    New(String),
    CheckCast(String),
    InstanceOf(String),
    Return,
    ValueReturn(ValueKind),
    Athrow,
    MonitorEnter,
    MonitorExit,
}

impl Insn {
    pub fn jump_target(&self) -> Option<Label> {
        match self {
            Insn::If(_, l)
            | Insn::IfICmp(_, l)
            | Insn::IfACmpEq(l)
            | Insn::IfACmpNe(l)
            | Insn::IfNull(l)
            | Insn::IfNonNull(l)
            | Insn::Goto(l) => Some(*l),
            _ => None,
        }
    }

    /// Whether control can continue with the next instruction.
    pub fn falls_through(&self) -> bool {
        !matches!(
            self,
            Insn::Goto(_) | Insn::Return | Insn::ValueReturn(_) | Insn::Athrow
        )
    }
}
