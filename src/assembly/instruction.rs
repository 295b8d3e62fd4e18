//! JVM instruction representation, operand types, and decoding metadata.
//!
//! This module defines the types that describe a decoded instruction. Every opcode has one
//! static [`OpcodeInfo`] row in [`INSTRUCTIONS`] giving its mnemonic, operand layout, control
//! flow behaviour and semantic [`OpKind`]. Later stages dispatch on the `OpKind` tag through
//! plain `match` expressions: the stack simulator derives stack deltas from it and lowering
//! turns it into statements.
//!
//! # Key Components
//!
//! - [`Instruction`] - Complete decoded instruction
//! - [`Operand`] - Decoded operand values
//! - [`OperandType`] - Operand layout in the code array
//! - [`FlowType`] - Control flow classification
//! - [`OpKind`] - Semantic family of an opcode
//! - [`BinaryOp`], [`CompareOp`], [`InvokeKind`], [`ConstValue`] - Operation details shared
//!   with the statement IR
//!
//! # Usage Examples
//!
//! ```rust
//! use jvmscope::assembly::{FlowType, INSTRUCTIONS, opcodes};
//!
//! let info = &INSTRUCTIONS[opcodes::IF_ICMPGE as usize];
//! assert_eq!(info.mnemonic, "if_icmpge");
//! assert_eq!(info.flow, FlowType::ConditionalBranch);
//! ```

use std::fmt;

use strum::Display;

use crate::metadata::descriptor::{PrimitiveType, StackType};

/// Layout of an instruction's operand bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    /// No operand bytes
    None,
    /// Signed byte immediate (`bipush`)
    Byte,
    /// Signed short immediate (`sipush`)
    Short,
    /// Local variable index, one byte or two after `wide`
    Local,
    /// Local variable index encoded in the opcode itself (`iload_2`)
    ImplicitLocal(u8),
    /// One-byte constant-pool index (`ldc`)
    ConstantIndex8,
    /// Two-byte constant-pool index
    ConstantIndex,
    /// Two-byte signed branch offset
    Branch16,
    /// Four-byte signed branch offset (`goto_w`, `jsr_w`)
    Branch32,
    /// Local index plus signed increment (`iinc`)
    Iinc,
    /// Primitive array type code (`newarray`)
    ArrayType,
    /// Constant-pool index, argument count and a zero byte (`invokeinterface`)
    InvokeInterface,
    /// Constant-pool index and two zero bytes (`invokedynamic`)
    InvokeDynamic,
    /// Constant-pool index and dimension count (`multianewarray`)
    MultiANewArray,
    /// Padded `tableswitch` operands
    TableSwitch,
    /// Padded `lookupswitch` operands
    LookupSwitch,
    /// The `wide` prefix; the modified opcode follows
    Wide,
}

/// A decoded operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// The instruction has no operand
    None,
    /// An integer immediate (`bipush`, `sipush`)
    Immediate(i32),
    /// A local variable slot
    Local(u16),
    /// A constant-pool index
    Constant(u16),
    /// A branch offset relative to the instruction's own offset
    Branch(i32),
    /// `iinc` operands
    Iinc {
        /// The incremented slot
        local: u16,
        /// The signed increment
        delta: i16,
    },
    /// `newarray` element type code
    ArrayType(u8),
    /// `invokeinterface` / `invokedynamic` operands
    Invoke {
        /// Constant-pool index of the callee
        index: u16,
        /// Argument slot count (`invokeinterface` only, otherwise 0)
        count: u8,
    },
    /// `multianewarray` operands
    MultiArray {
        /// Constant-pool index of the array class
        index: u16,
        /// Number of dimensions popped from the stack
        dimensions: u8,
    },
    /// `tableswitch` operands; offsets are relative to the instruction
    TableSwitch {
        /// Default offset
        default: i32,
        /// Lowest matched key
        low: i32,
        /// Offsets for keys `low..=low + offsets.len() - 1`
        offsets: Vec<i32>,
    },
    /// `lookupswitch` operands; offsets are relative to the instruction
    LookupSwitch {
        /// Default offset
        default: i32,
        /// `(key, offset)` pairs in ascending key order
        pairs: Vec<(i32, i32)>,
    },
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::None => Ok(()),
            Operand::Immediate(value) => write!(f, "{value}"),
            Operand::Local(slot) => write!(f, "{slot}"),
            Operand::Constant(index) => write!(f, "#{index}"),
            Operand::Branch(delta) => write!(f, "{delta:+}"),
            Operand::Iinc { local, delta } => write!(f, "{local} {delta}"),
            Operand::ArrayType(code) => write!(f, "{code}"),
            Operand::Invoke { index, count } => write!(f, "#{index} {count}"),
            Operand::MultiArray { index, dimensions } => write!(f, "#{index} {dimensions}"),
            Operand::TableSwitch {
                default,
                low,
                offsets,
            } => write!(f, "default {default:+} low {low} ({} cases)", offsets.len()),
            Operand::LookupSwitch { default, pairs } => {
                write!(f, "default {default:+} ({} cases)", pairs.len())
            }
        }
    }
}

/// How control leaves an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Falls through to the next instruction
    Sequential,
    /// Falls through or branches
    ConditionalBranch,
    /// Always branches
    UnconditionalBranch,
    /// Multi-way branch (`tableswitch`, `lookupswitch`)
    Switch,
    /// Leaves the method normally
    Return,
    /// Leaves through an exception
    Throw,
    /// Subroutine call (`jsr`)
    Subroutine,
    /// Subroutine return (`ret`)
    SubroutineReturn,
}

/// Binary arithmetic and bitwise operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum BinaryOp {
    /// Addition
    #[strum(to_string = "+")]
    Add,
    /// Subtraction
    #[strum(to_string = "-")]
    Sub,
    /// Multiplication
    #[strum(to_string = "*")]
    Mul,
    /// Division
    #[strum(to_string = "/")]
    Div,
    /// Remainder
    #[strum(to_string = "%")]
    Rem,
    /// Shift left
    #[strum(to_string = "<<")]
    Shl,
    /// Arithmetic shift right
    #[strum(to_string = ">>")]
    Shr,
    /// Logical shift right
    #[strum(to_string = ">>>")]
    Ushr,
    /// Bitwise and
    #[strum(to_string = "&")]
    And,
    /// Bitwise or
    #[strum(to_string = "|")]
    Or,
    /// Bitwise exclusive or
    #[strum(to_string = "^")]
    Xor,
}

/// Relational operators of conditional branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum CompareOp {
    /// Equal
    #[strum(to_string = "==")]
    Eq,
    /// Not equal
    #[strum(to_string = "!=")]
    Ne,
    /// Less than
    #[strum(to_string = "<")]
    Lt,
    /// Greater or equal
    #[strum(to_string = ">=")]
    Ge,
    /// Greater than
    #[strum(to_string = ">")]
    Gt,
    /// Less or equal
    #[strum(to_string = "<=")]
    Le,
}

impl CompareOp {
    /// Returns the operator testing the opposite condition.
    #[must_use]
    pub const fn negate(self) -> Self {
        match self {
            CompareOp::Eq => CompareOp::Ne,
            CompareOp::Ne => CompareOp::Eq,
            CompareOp::Lt => CompareOp::Ge,
            CompareOp::Ge => CompareOp::Lt,
            CompareOp::Gt => CompareOp::Le,
            CompareOp::Le => CompareOp::Gt,
        }
    }
}

/// The five invocation instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum InvokeKind {
    /// `invokevirtual`
    Virtual,
    /// `invokespecial`
    Special,
    /// `invokestatic`
    Static,
    /// `invokeinterface`
    Interface,
    /// `invokedynamic`
    Dynamic,
}

/// A constant pushed by an instruction without a pool reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    /// `aconst_null`
    Null,
    /// `iconst_*`
    Int(i32),
    /// `lconst_*`
    Long(i64),
    /// `fconst_*`
    Float(f32),
    /// `dconst_*`
    Double(f64),
}

/// Semantic family of an opcode.
///
/// This is the tag the stack simulator and lowering dispatch on. The operand supplies the
/// remaining detail (slot numbers, pool indices, branch offsets).
#[derive(Debug, Clone, Copy, PartialEq)]
#[allow(missing_docs)]
pub enum OpKind {
    Nop,
    Const(ConstValue),
    /// `bipush`, `sipush`
    Push,
    /// `ldc`, `ldc_w`, `ldc2_w`
    Ldc,
    Load(StackType),
    Store(StackType),
    ArrayLoad(StackType),
    ArrayStore(StackType),
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
    Binary(BinaryOp, StackType),
    Negate(StackType),
    Iinc,
    /// Conversion from a stack type to a primitive type
    Convert(StackType, PrimitiveType),
    /// `lcmp`, `fcmpl`, `fcmpg`, `dcmpl`, `dcmpg`
    Cmp(StackType),
    /// `ifeq` .. `ifle`: compare against zero
    IfZero(CompareOp),
    /// `if_icmp*`, `if_acmp*`
    IfCompare(CompareOp, StackType),
    /// `ifnull` (`Eq`), `ifnonnull` (`Ne`)
    IfNull(CompareOp),
    Goto,
    Jsr,
    Ret,
    TableSwitch,
    LookupSwitch,
    Return(Option<StackType>),
    GetStatic,
    PutStatic,
    GetField,
    PutField,
    Invoke(InvokeKind),
    New,
    NewArray,
    ANewArray,
    MultiANewArray,
    ArrayLength,
    Throw,
    CheckCast,
    InstanceOf,
    MonitorEnter,
    MonitorExit,
    Wide,
}

/// Static decoding rule for one opcode.
#[derive(Debug, Clone, Copy)]
pub struct OpcodeInfo {
    /// Mnemonic as written in the JVMS
    pub mnemonic: &'static str,
    /// Operand layout
    pub operand: OperandType,
    /// Control flow behaviour
    pub flow: FlowType,
    /// Semantic family
    pub kind: OpKind,
}

impl OpcodeInfo {
    const fn new(
        mnemonic: &'static str,
        operand: OperandType,
        flow: FlowType,
        kind: OpKind,
    ) -> Self {
        OpcodeInfo {
            mnemonic,
            operand,
            flow,
            kind,
        }
    }
}

/// A decoded JVM instruction.
///
/// Offsets are signed so that the synthetic sentinel can live at offset `-1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Byte offset of the first byte (the `wide` prefix, if any)
    pub offset: i32,
    /// Length in bytes including prefix and padding
    pub size: u32,
    /// The (modified) opcode
    pub opcode: u8,
    /// Whether the instruction carried a `wide` prefix
    pub wide: bool,
    /// Mnemonic of the opcode
    pub mnemonic: &'static str,
    /// Semantic family
    pub kind: OpKind,
    /// Control flow behaviour
    pub flow_type: FlowType,
    /// Decoded operand
    pub operand: Operand,
    /// Raw instruction bytes
    pub bytes: Vec<u8>,
    /// Absolute branch target offsets; for switches the default comes first
    pub branch_targets: Vec<i32>,
}

impl Instruction {
    /// Creates the synthetic no-op placed before the first real instruction.
    #[must_use]
    pub fn sentinel() -> Self {
        Instruction {
            offset: -1,
            size: 0,
            opcode: crate::assembly::opcodes::NOP,
            wide: false,
            mnemonic: "nop",
            kind: OpKind::Nop,
            flow_type: FlowType::Sequential,
            operand: Operand::None,
            bytes: Vec::new(),
            branch_targets: Vec::new(),
        }
    }

    /// Returns `true` for the synthetic sentinel.
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.offset < 0
    }

    /// Returns `true` if the instruction can transfer control to a branch target.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        matches!(
            self.flow_type,
            FlowType::ConditionalBranch | FlowType::UnconditionalBranch | FlowType::Switch
        )
    }

    /// Returns `true` if control can continue with the next instruction.
    #[must_use]
    pub fn falls_through(&self) -> bool {
        matches!(
            self.flow_type,
            FlowType::Sequential | FlowType::ConditionalBranch
        )
    }

    /// Returns the offset of the instruction that follows this one.
    #[must_use]
    pub fn next_offset(&self) -> i32 {
        if self.is_sentinel() {
            0
        } else {
            self.offset + self.size as i32
        }
    }

    /// Returns the local variable slot this instruction reads or writes, if any.
    #[must_use]
    pub fn local(&self) -> Option<u16> {
        match self.operand {
            Operand::Local(slot) | Operand::Iinc { local: slot, .. } => Some(slot),
            _ => None,
        }
    }

    /// Returns the constant-pool index this instruction references, if any.
    #[must_use]
    pub fn constant_index(&self) -> Option<u16> {
        match self.operand {
            Operand::Constant(index)
            | Operand::Invoke { index, .. }
            | Operand::MultiArray { index, .. } => Some(index),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>5}: {}", self.offset, self.mnemonic)?;
        if self.operand != Operand::None {
            write!(f, " {}", self.operand)?;
        }
        Ok(())
    }
}

/// Decoding rules for every defined opcode, indexed by opcode byte.
pub static INSTRUCTIONS: [OpcodeInfo; 202] = [
    // Constants (0x00)
    OpcodeInfo::new("nop", OperandType::None, FlowType::Sequential, OpKind::Nop),
    OpcodeInfo::new("aconst_null", OperandType::None, FlowType::Sequential, OpKind::Const(ConstValue::Null)),
    OpcodeInfo::new("iconst_m1", OperandType::None, FlowType::Sequential, OpKind::Const(ConstValue::Int(-1))),
    OpcodeInfo::new("iconst_0", OperandType::None, FlowType::Sequential, OpKind::Const(ConstValue::Int(0))),
    OpcodeInfo::new("iconst_1", OperandType::None, FlowType::Sequential, OpKind::Const(ConstValue::Int(1))),
    OpcodeInfo::new("iconst_2", OperandType::None, FlowType::Sequential, OpKind::Const(ConstValue::Int(2))),
    OpcodeInfo::new("iconst_3", OperandType::None, FlowType::Sequential, OpKind::Const(ConstValue::Int(3))),
    OpcodeInfo::new("iconst_4", OperandType::None, FlowType::Sequential, OpKind::Const(ConstValue::Int(4))),
    OpcodeInfo::new("iconst_5", OperandType::None, FlowType::Sequential, OpKind::Const(ConstValue::Int(5))),
    OpcodeInfo::new("lconst_0", OperandType::None, FlowType::Sequential, OpKind::Const(ConstValue::Long(0))),
    OpcodeInfo::new("lconst_1", OperandType::None, FlowType::Sequential, OpKind::Const(ConstValue::Long(1))),
    OpcodeInfo::new("fconst_0", OperandType::None, FlowType::Sequential, OpKind::Const(ConstValue::Float(0.0))),
    OpcodeInfo::new("fconst_1", OperandType::None, FlowType::Sequential, OpKind::Const(ConstValue::Float(1.0))),
    OpcodeInfo::new("fconst_2", OperandType::None, FlowType::Sequential, OpKind::Const(ConstValue::Float(2.0))),
    OpcodeInfo::new("dconst_0", OperandType::None, FlowType::Sequential, OpKind::Const(ConstValue::Double(0.0))),
    OpcodeInfo::new("dconst_1", OperandType::None, FlowType::Sequential, OpKind::Const(ConstValue::Double(1.0))),
    OpcodeInfo::new("bipush", OperandType::Byte, FlowType::Sequential, OpKind::Push),
    OpcodeInfo::new("sipush", OperandType::Short, FlowType::Sequential, OpKind::Push),
    OpcodeInfo::new("ldc", OperandType::ConstantIndex8, FlowType::Sequential, OpKind::Ldc),
    OpcodeInfo::new("ldc_w", OperandType::ConstantIndex, FlowType::Sequential, OpKind::Ldc),
    OpcodeInfo::new("ldc2_w", OperandType::ConstantIndex, FlowType::Sequential, OpKind::Ldc),

    // Loads (0x15)
    OpcodeInfo::new("iload", OperandType::Local, FlowType::Sequential, OpKind::Load(StackType::Int)),
    OpcodeInfo::new("lload", OperandType::Local, FlowType::Sequential, OpKind::Load(StackType::Long)),
    OpcodeInfo::new("fload", OperandType::Local, FlowType::Sequential, OpKind::Load(StackType::Float)),
    OpcodeInfo::new("dload", OperandType::Local, FlowType::Sequential, OpKind::Load(StackType::Double)),
    OpcodeInfo::new("aload", OperandType::Local, FlowType::Sequential, OpKind::Load(StackType::Reference)),
    OpcodeInfo::new("iload_0", OperandType::ImplicitLocal(0), FlowType::Sequential, OpKind::Load(StackType::Int)),
    OpcodeInfo::new("iload_1", OperandType::ImplicitLocal(1), FlowType::Sequential, OpKind::Load(StackType::Int)),
    OpcodeInfo::new("iload_2", OperandType::ImplicitLocal(2), FlowType::Sequential, OpKind::Load(StackType::Int)),
    OpcodeInfo::new("iload_3", OperandType::ImplicitLocal(3), FlowType::Sequential, OpKind::Load(StackType::Int)),
    OpcodeInfo::new("lload_0", OperandType::ImplicitLocal(0), FlowType::Sequential, OpKind::Load(StackType::Long)),
    OpcodeInfo::new("lload_1", OperandType::ImplicitLocal(1), FlowType::Sequential, OpKind::Load(StackType::Long)),
    OpcodeInfo::new("lload_2", OperandType::ImplicitLocal(2), FlowType::Sequential, OpKind::Load(StackType::Long)),
    OpcodeInfo::new("lload_3", OperandType::ImplicitLocal(3), FlowType::Sequential, OpKind::Load(StackType::Long)),
    OpcodeInfo::new("fload_0", OperandType::ImplicitLocal(0), FlowType::Sequential, OpKind::Load(StackType::Float)),
    OpcodeInfo::new("fload_1", OperandType::ImplicitLocal(1), FlowType::Sequential, OpKind::Load(StackType::Float)),
    OpcodeInfo::new("fload_2", OperandType::ImplicitLocal(2), FlowType::Sequential, OpKind::Load(StackType::Float)),
    OpcodeInfo::new("fload_3", OperandType::ImplicitLocal(3), FlowType::Sequential, OpKind::Load(StackType::Float)),
    OpcodeInfo::new("dload_0", OperandType::ImplicitLocal(0), FlowType::Sequential, OpKind::Load(StackType::Double)),
    OpcodeInfo::new("dload_1", OperandType::ImplicitLocal(1), FlowType::Sequential, OpKind::Load(StackType::Double)),
    OpcodeInfo::new("dload_2", OperandType::ImplicitLocal(2), FlowType::Sequential, OpKind::Load(StackType::Double)),
    OpcodeInfo::new("dload_3", OperandType::ImplicitLocal(3), FlowType::Sequential, OpKind::Load(StackType::Double)),
    OpcodeInfo::new("aload_0", OperandType::ImplicitLocal(0), FlowType::Sequential, OpKind::Load(StackType::Reference)),
    OpcodeInfo::new("aload_1", OperandType::ImplicitLocal(1), FlowType::Sequential, OpKind::Load(StackType::Reference)),
    OpcodeInfo::new("aload_2", OperandType::ImplicitLocal(2), FlowType::Sequential, OpKind::Load(StackType::Reference)),
    OpcodeInfo::new("aload_3", OperandType::ImplicitLocal(3), FlowType::Sequential, OpKind::Load(StackType::Reference)),
    OpcodeInfo::new("iaload", OperandType::None, FlowType::Sequential, OpKind::ArrayLoad(StackType::Int)),
    OpcodeInfo::new("laload", OperandType::None, FlowType::Sequential, OpKind::ArrayLoad(StackType::Long)),
    OpcodeInfo::new("faload", OperandType::None, FlowType::Sequential, OpKind::ArrayLoad(StackType::Float)),
    OpcodeInfo::new("daload", OperandType::None, FlowType::Sequential, OpKind::ArrayLoad(StackType::Double)),
    OpcodeInfo::new("aaload", OperandType::None, FlowType::Sequential, OpKind::ArrayLoad(StackType::Reference)),
    OpcodeInfo::new("baload", OperandType::None, FlowType::Sequential, OpKind::ArrayLoad(StackType::Int)),
    OpcodeInfo::new("caload", OperandType::None, FlowType::Sequential, OpKind::ArrayLoad(StackType::Int)),
    OpcodeInfo::new("saload", OperandType::None, FlowType::Sequential, OpKind::ArrayLoad(StackType::Int)),

    // Stores (0x36)
    OpcodeInfo::new("istore", OperandType::Local, FlowType::Sequential, OpKind::Store(StackType::Int)),
    OpcodeInfo::new("lstore", OperandType::Local, FlowType::Sequential, OpKind::Store(StackType::Long)),
    OpcodeInfo::new("fstore", OperandType::Local, FlowType::Sequential, OpKind::Store(StackType::Float)),
    OpcodeInfo::new("dstore", OperandType::Local, FlowType::Sequential, OpKind::Store(StackType::Double)),
    OpcodeInfo::new("astore", OperandType::Local, FlowType::Sequential, OpKind::Store(StackType::Reference)),
    OpcodeInfo::new("istore_0", OperandType::ImplicitLocal(0), FlowType::Sequential, OpKind::Store(StackType::Int)),
    OpcodeInfo::new("istore_1", OperandType::ImplicitLocal(1), FlowType::Sequential, OpKind::Store(StackType::Int)),
    OpcodeInfo::new("istore_2", OperandType::ImplicitLocal(2), FlowType::Sequential, OpKind::Store(StackType::Int)),
    OpcodeInfo::new("istore_3", OperandType::ImplicitLocal(3), FlowType::Sequential, OpKind::Store(StackType::Int)),
    OpcodeInfo::new("lstore_0", OperandType::ImplicitLocal(0), FlowType::Sequential, OpKind::Store(StackType::Long)),
    OpcodeInfo::new("lstore_1", OperandType::ImplicitLocal(1), FlowType::Sequential, OpKind::Store(StackType::Long)),
    OpcodeInfo::new("lstore_2", OperandType::ImplicitLocal(2), FlowType::Sequential, OpKind::Store(StackType::Long)),
    OpcodeInfo::new("lstore_3", OperandType::ImplicitLocal(3), FlowType::Sequential, OpKind::Store(StackType::Long)),
    OpcodeInfo::new("fstore_0", OperandType::ImplicitLocal(0), FlowType::Sequential, OpKind::Store(StackType::Float)),
    OpcodeInfo::new("fstore_1", OperandType::ImplicitLocal(1), FlowType::Sequential, OpKind::Store(StackType::Float)),
    OpcodeInfo::new("fstore_2", OperandType::ImplicitLocal(2), FlowType::Sequential, OpKind::Store(StackType::Float)),
    OpcodeInfo::new("fstore_3", OperandType::ImplicitLocal(3), FlowType::Sequential, OpKind::Store(StackType::Float)),
    OpcodeInfo::new("dstore_0", OperandType::ImplicitLocal(0), FlowType::Sequential, OpKind::Store(StackType::Double)),
    OpcodeInfo::new("dstore_1", OperandType::ImplicitLocal(1), FlowType::Sequential, OpKind::Store(StackType::Double)),
    OpcodeInfo::new("dstore_2", OperandType::ImplicitLocal(2), FlowType::Sequential, OpKind::Store(StackType::Double)),
    OpcodeInfo::new("dstore_3", OperandType::ImplicitLocal(3), FlowType::Sequential, OpKind::Store(StackType::Double)),
    OpcodeInfo::new("astore_0", OperandType::ImplicitLocal(0), FlowType::Sequential, OpKind::Store(StackType::Reference)),
    OpcodeInfo::new("astore_1", OperandType::ImplicitLocal(1), FlowType::Sequential, OpKind::Store(StackType::Reference)),
    OpcodeInfo::new("astore_2", OperandType::ImplicitLocal(2), FlowType::Sequential, OpKind::Store(StackType::Reference)),
    OpcodeInfo::new("astore_3", OperandType::ImplicitLocal(3), FlowType::Sequential, OpKind::Store(StackType::Reference)),
    OpcodeInfo::new("iastore", OperandType::None, FlowType::Sequential, OpKind::ArrayStore(StackType::Int)),
    OpcodeInfo::new("lastore", OperandType::None, FlowType::Sequential, OpKind::ArrayStore(StackType::Long)),
    OpcodeInfo::new("fastore", OperandType::None, FlowType::Sequential, OpKind::ArrayStore(StackType::Float)),
    OpcodeInfo::new("dastore", OperandType::None, FlowType::Sequential, OpKind::ArrayStore(StackType::Double)),
    OpcodeInfo::new("aastore", OperandType::None, FlowType::Sequential, OpKind::ArrayStore(StackType::Reference)),
    OpcodeInfo::new("bastore", OperandType::None, FlowType::Sequential, OpKind::ArrayStore(StackType::Int)),
    OpcodeInfo::new("castore", OperandType::None, FlowType::Sequential, OpKind::ArrayStore(StackType::Int)),
    OpcodeInfo::new("sastore", OperandType::None, FlowType::Sequential, OpKind::ArrayStore(StackType::Int)),

    // Stack (0x57)
    OpcodeInfo::new("pop", OperandType::None, FlowType::Sequential, OpKind::Pop),
    OpcodeInfo::new("pop2", OperandType::None, FlowType::Sequential, OpKind::Pop2),
    OpcodeInfo::new("dup", OperandType::None, FlowType::Sequential, OpKind::Dup),
    OpcodeInfo::new("dup_x1", OperandType::None, FlowType::Sequential, OpKind::DupX1),
    OpcodeInfo::new("dup_x2", OperandType::None, FlowType::Sequential, OpKind::DupX2),
    OpcodeInfo::new("dup2", OperandType::None, FlowType::Sequential, OpKind::Dup2),
    OpcodeInfo::new("dup2_x1", OperandType::None, FlowType::Sequential, OpKind::Dup2X1),
    OpcodeInfo::new("dup2_x2", OperandType::None, FlowType::Sequential, OpKind::Dup2X2),
    OpcodeInfo::new("swap", OperandType::None, FlowType::Sequential, OpKind::Swap),

    // Math (0x60)
    OpcodeInfo::new("iadd", OperandType::None, FlowType::Sequential, OpKind::Binary(BinaryOp::Add, StackType::Int)),
    OpcodeInfo::new("ladd", OperandType::None, FlowType::Sequential, OpKind::Binary(BinaryOp::Add, StackType::Long)),
    OpcodeInfo::new("fadd", OperandType::None, FlowType::Sequential, OpKind::Binary(BinaryOp::Add, StackType::Float)),
    OpcodeInfo::new("dadd", OperandType::None, FlowType::Sequential, OpKind::Binary(BinaryOp::Add, StackType::Double)),
    OpcodeInfo::new("isub", OperandType::None, FlowType::Sequential, OpKind::Binary(BinaryOp::Sub, StackType::Int)),
    OpcodeInfo::new("lsub", OperandType::None, FlowType::Sequential, OpKind::Binary(BinaryOp::Sub, StackType::Long)),
    OpcodeInfo::new("fsub", OperandType::None, FlowType::Sequential, OpKind::Binary(BinaryOp::Sub, StackType::Float)),
    OpcodeInfo::new("dsub", OperandType::None, FlowType::Sequential, OpKind::Binary(BinaryOp::Sub, StackType::Double)),
    OpcodeInfo::new("imul", OperandType::None, FlowType::Sequential, OpKind::Binary(BinaryOp::Mul, StackType::Int)),
    OpcodeInfo::new("lmul", OperandType::None, FlowType::Sequential, OpKind::Binary(BinaryOp::Mul, StackType::Long)),
    OpcodeInfo::new("fmul", OperandType::None, FlowType::Sequential, OpKind::Binary(BinaryOp::Mul, StackType::Float)),
    OpcodeInfo::new("dmul", OperandType::None, FlowType::Sequential, OpKind::Binary(BinaryOp::Mul, StackType::Double)),
    OpcodeInfo::new("idiv", OperandType::None, FlowType::Sequential, OpKind::Binary(BinaryOp::Div, StackType::Int)),
    OpcodeInfo::new("ldiv", OperandType::None, FlowType::Sequential, OpKind::Binary(BinaryOp::Div, StackType::Long)),
    OpcodeInfo::new("fdiv", OperandType::None, FlowType::Sequential, OpKind::Binary(BinaryOp::Div, StackType::Float)),
    OpcodeInfo::new("ddiv", OperandType::None, FlowType::Sequential, OpKind::Binary(BinaryOp::Div, StackType::Double)),
    OpcodeInfo::new("irem", OperandType::None, FlowType::Sequential, OpKind::Binary(BinaryOp::Rem, StackType::Int)),
    OpcodeInfo::new("lrem", OperandType::None, FlowType::Sequential, OpKind::Binary(BinaryOp::Rem, StackType::Long)),
    OpcodeInfo::new("frem", OperandType::None, FlowType::Sequential, OpKind::Binary(BinaryOp::Rem, StackType::Float)),
    OpcodeInfo::new("drem", OperandType::None, FlowType::Sequential, OpKind::Binary(BinaryOp::Rem, StackType::Double)),
    OpcodeInfo::new("ineg", OperandType::None, FlowType::Sequential, OpKind::Negate(StackType::Int)),
    OpcodeInfo::new("lneg", OperandType::None, FlowType::Sequential, OpKind::Negate(StackType::Long)),
    OpcodeInfo::new("fneg", OperandType::None, FlowType::Sequential, OpKind::Negate(StackType::Float)),
    OpcodeInfo::new("dneg", OperandType::None, FlowType::Sequential, OpKind::Negate(StackType::Double)),
    OpcodeInfo::new("ishl", OperandType::None, FlowType::Sequential, OpKind::Binary(BinaryOp::Shl, StackType::Int)),
    OpcodeInfo::new("lshl", OperandType::None, FlowType::Sequential, OpKind::Binary(BinaryOp::Shl, StackType::Long)),
    OpcodeInfo::new("ishr", OperandType::None, FlowType::Sequential, OpKind::Binary(BinaryOp::Shr, StackType::Int)),
    OpcodeInfo::new("lshr", OperandType::None, FlowType::Sequential, OpKind::Binary(BinaryOp::Shr, StackType::Long)),
    OpcodeInfo::new("iushr", OperandType::None, FlowType::Sequential, OpKind::Binary(BinaryOp::Ushr, StackType::Int)),
    OpcodeInfo::new("lushr", OperandType::None, FlowType::Sequential, OpKind::Binary(BinaryOp::Ushr, StackType::Long)),
    OpcodeInfo::new("iand", OperandType::None, FlowType::Sequential, OpKind::Binary(BinaryOp::And, StackType::Int)),
    OpcodeInfo::new("land", OperandType::None, FlowType::Sequential, OpKind::Binary(BinaryOp::And, StackType::Long)),
    OpcodeInfo::new("ior", OperandType::None, FlowType::Sequential, OpKind::Binary(BinaryOp::Or, StackType::Int)),
    OpcodeInfo::new("lor", OperandType::None, FlowType::Sequential, OpKind::Binary(BinaryOp::Or, StackType::Long)),
    OpcodeInfo::new("ixor", OperandType::None, FlowType::Sequential, OpKind::Binary(BinaryOp::Xor, StackType::Int)),
    OpcodeInfo::new("lxor", OperandType::None, FlowType::Sequential, OpKind::Binary(BinaryOp::Xor, StackType::Long)),
    OpcodeInfo::new("iinc", OperandType::Iinc, FlowType::Sequential, OpKind::Iinc),

    // Conversions (0x85)
    OpcodeInfo::new("i2l", OperandType::None, FlowType::Sequential, OpKind::Convert(StackType::Int, PrimitiveType::Long)),
    OpcodeInfo::new("i2f", OperandType::None, FlowType::Sequential, OpKind::Convert(StackType::Int, PrimitiveType::Float)),
    OpcodeInfo::new("i2d", OperandType::None, FlowType::Sequential, OpKind::Convert(StackType::Int, PrimitiveType::Double)),
    OpcodeInfo::new("l2i", OperandType::None, FlowType::Sequential, OpKind::Convert(StackType::Long, PrimitiveType::Int)),
    OpcodeInfo::new("l2f", OperandType::None, FlowType::Sequential, OpKind::Convert(StackType::Long, PrimitiveType::Float)),
    OpcodeInfo::new("l2d", OperandType::None, FlowType::Sequential, OpKind::Convert(StackType::Long, PrimitiveType::Double)),
    OpcodeInfo::new("f2i", OperandType::None, FlowType::Sequential, OpKind::Convert(StackType::Float, PrimitiveType::Int)),
    OpcodeInfo::new("f2l", OperandType::None, FlowType::Sequential, OpKind::Convert(StackType::Float, PrimitiveType::Long)),
    OpcodeInfo::new("f2d", OperandType::None, FlowType::Sequential, OpKind::Convert(StackType::Float, PrimitiveType::Double)),
    OpcodeInfo::new("d2i", OperandType::None, FlowType::Sequential, OpKind::Convert(StackType::Double, PrimitiveType::Int)),
    OpcodeInfo::new("d2l", OperandType::None, FlowType::Sequential, OpKind::Convert(StackType::Double, PrimitiveType::Long)),
    OpcodeInfo::new("d2f", OperandType::None, FlowType::Sequential, OpKind::Convert(StackType::Double, PrimitiveType::Float)),
    OpcodeInfo::new("i2b", OperandType::None, FlowType::Sequential, OpKind::Convert(StackType::Int, PrimitiveType::Byte)),
    OpcodeInfo::new("i2c", OperandType::None, FlowType::Sequential, OpKind::Convert(StackType::Int, PrimitiveType::Char)),
    OpcodeInfo::new("i2s", OperandType::None, FlowType::Sequential, OpKind::Convert(StackType::Int, PrimitiveType::Short)),

    // Comparisons (0x94)
    OpcodeInfo::new("lcmp", OperandType::None, FlowType::Sequential, OpKind::Cmp(StackType::Long)),
    OpcodeInfo::new("fcmpl", OperandType::None, FlowType::Sequential, OpKind::Cmp(StackType::Float)),
    OpcodeInfo::new("fcmpg", OperandType::None, FlowType::Sequential, OpKind::Cmp(StackType::Float)),
    OpcodeInfo::new("dcmpl", OperandType::None, FlowType::Sequential, OpKind::Cmp(StackType::Double)),
    OpcodeInfo::new("dcmpg", OperandType::None, FlowType::Sequential, OpKind::Cmp(StackType::Double)),
    OpcodeInfo::new("ifeq", OperandType::Branch16, FlowType::ConditionalBranch, OpKind::IfZero(CompareOp::Eq)),
    OpcodeInfo::new("ifne", OperandType::Branch16, FlowType::ConditionalBranch, OpKind::IfZero(CompareOp::Ne)),
    OpcodeInfo::new("iflt", OperandType::Branch16, FlowType::ConditionalBranch, OpKind::IfZero(CompareOp::Lt)),
    OpcodeInfo::new("ifge", OperandType::Branch16, FlowType::ConditionalBranch, OpKind::IfZero(CompareOp::Ge)),
    OpcodeInfo::new("ifgt", OperandType::Branch16, FlowType::ConditionalBranch, OpKind::IfZero(CompareOp::Gt)),
    OpcodeInfo::new("ifle", OperandType::Branch16, FlowType::ConditionalBranch, OpKind::IfZero(CompareOp::Le)),
    OpcodeInfo::new("if_icmpeq", OperandType::Branch16, FlowType::ConditionalBranch, OpKind::IfCompare(CompareOp::Eq, StackType::Int)),
    OpcodeInfo::new("if_icmpne", OperandType::Branch16, FlowType::ConditionalBranch, OpKind::IfCompare(CompareOp::Ne, StackType::Int)),
    OpcodeInfo::new("if_icmplt", OperandType::Branch16, FlowType::ConditionalBranch, OpKind::IfCompare(CompareOp::Lt, StackType::Int)),
    OpcodeInfo::new("if_icmpge", OperandType::Branch16, FlowType::ConditionalBranch, OpKind::IfCompare(CompareOp::Ge, StackType::Int)),
    OpcodeInfo::new("if_icmpgt", OperandType::Branch16, FlowType::ConditionalBranch, OpKind::IfCompare(CompareOp::Gt, StackType::Int)),
    OpcodeInfo::new("if_icmple", OperandType::Branch16, FlowType::ConditionalBranch, OpKind::IfCompare(CompareOp::Le, StackType::Int)),
    OpcodeInfo::new("if_acmpeq", OperandType::Branch16, FlowType::ConditionalBranch, OpKind::IfCompare(CompareOp::Eq, StackType::Reference)),
    OpcodeInfo::new("if_acmpne", OperandType::Branch16, FlowType::ConditionalBranch, OpKind::IfCompare(CompareOp::Ne, StackType::Reference)),

    // Control (0xA7)
    OpcodeInfo::new("goto", OperandType::Branch16, FlowType::UnconditionalBranch, OpKind::Goto),
    OpcodeInfo::new("jsr", OperandType::Branch16, FlowType::Subroutine, OpKind::Jsr),
    OpcodeInfo::new("ret", OperandType::Local, FlowType::SubroutineReturn, OpKind::Ret),
    OpcodeInfo::new("tableswitch", OperandType::TableSwitch, FlowType::Switch, OpKind::TableSwitch),
    OpcodeInfo::new("lookupswitch", OperandType::LookupSwitch, FlowType::Switch, OpKind::LookupSwitch),
    OpcodeInfo::new("ireturn", OperandType::None, FlowType::Return, OpKind::Return(Some(StackType::Int))),
    OpcodeInfo::new("lreturn", OperandType::None, FlowType::Return, OpKind::Return(Some(StackType::Long))),
    OpcodeInfo::new("freturn", OperandType::None, FlowType::Return, OpKind::Return(Some(StackType::Float))),
    OpcodeInfo::new("dreturn", OperandType::None, FlowType::Return, OpKind::Return(Some(StackType::Double))),
    OpcodeInfo::new("areturn", OperandType::None, FlowType::Return, OpKind::Return(Some(StackType::Reference))),
    OpcodeInfo::new("return", OperandType::None, FlowType::Return, OpKind::Return(None)),

    // References (0xB2)
    OpcodeInfo::new("getstatic", OperandType::ConstantIndex, FlowType::Sequential, OpKind::GetStatic),
    OpcodeInfo::new("putstatic", OperandType::ConstantIndex, FlowType::Sequential, OpKind::PutStatic),
    OpcodeInfo::new("getfield", OperandType::ConstantIndex, FlowType::Sequential, OpKind::GetField),
    OpcodeInfo::new("putfield", OperandType::ConstantIndex, FlowType::Sequential, OpKind::PutField),
    OpcodeInfo::new("invokevirtual", OperandType::ConstantIndex, FlowType::Sequential, OpKind::Invoke(InvokeKind::Virtual)),
    OpcodeInfo::new("invokespecial", OperandType::ConstantIndex, FlowType::Sequential, OpKind::Invoke(InvokeKind::Special)),
    OpcodeInfo::new("invokestatic", OperandType::ConstantIndex, FlowType::Sequential, OpKind::Invoke(InvokeKind::Static)),
    OpcodeInfo::new("invokeinterface", OperandType::InvokeInterface, FlowType::Sequential, OpKind::Invoke(InvokeKind::Interface)),
    OpcodeInfo::new("invokedynamic", OperandType::InvokeDynamic, FlowType::Sequential, OpKind::Invoke(InvokeKind::Dynamic)),
    OpcodeInfo::new("new", OperandType::ConstantIndex, FlowType::Sequential, OpKind::New),
    OpcodeInfo::new("newarray", OperandType::ArrayType, FlowType::Sequential, OpKind::NewArray),
    OpcodeInfo::new("anewarray", OperandType::ConstantIndex, FlowType::Sequential, OpKind::ANewArray),
    OpcodeInfo::new("arraylength", OperandType::None, FlowType::Sequential, OpKind::ArrayLength),
    OpcodeInfo::new("athrow", OperandType::None, FlowType::Throw, OpKind::Throw),
    OpcodeInfo::new("checkcast", OperandType::ConstantIndex, FlowType::Sequential, OpKind::CheckCast),
    OpcodeInfo::new("instanceof", OperandType::ConstantIndex, FlowType::Sequential, OpKind::InstanceOf),
    OpcodeInfo::new("monitorenter", OperandType::None, FlowType::Sequential, OpKind::MonitorEnter),
    OpcodeInfo::new("monitorexit", OperandType::None, FlowType::Sequential, OpKind::MonitorExit),

    // Extended (0xC4)
    OpcodeInfo::new("wide", OperandType::Wide, FlowType::Sequential, OpKind::Wide),
    OpcodeInfo::new("multianewarray", OperandType::MultiANewArray, FlowType::Sequential, OpKind::MultiANewArray),
    OpcodeInfo::new("ifnull", OperandType::Branch16, FlowType::ConditionalBranch, OpKind::IfNull(CompareOp::Eq)),
    OpcodeInfo::new("ifnonnull", OperandType::Branch16, FlowType::ConditionalBranch, OpKind::IfNull(CompareOp::Ne)),
    OpcodeInfo::new("goto_w", OperandType::Branch32, FlowType::UnconditionalBranch, OpKind::Goto),
    OpcodeInfo::new("jsr_w", OperandType::Branch32, FlowType::Subroutine, OpKind::Jsr),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::opcodes;

    #[test]
    fn test_table_matches_opcode_constants() {
        assert_eq!(INSTRUCTIONS[opcodes::NOP as usize].mnemonic, "nop");
        assert_eq!(INSTRUCTIONS[opcodes::DUP2_X1 as usize].kind, OpKind::Dup2X1);
        assert_eq!(INSTRUCTIONS[opcodes::JSR_W as usize].mnemonic, "jsr_w");
        assert_eq!(
            INSTRUCTIONS[opcodes::ALOAD_3 as usize].operand,
            OperandType::ImplicitLocal(3)
        );
        assert_eq!(
            INSTRUCTIONS[opcodes::I2C as usize].kind,
            OpKind::Convert(StackType::Int, PrimitiveType::Char)
        );
        assert_eq!(INSTRUCTIONS.len(), opcodes::BREAKPOINT as usize);
    }

    #[test]
    fn test_branch_flows() {
        let branches = INSTRUCTIONS
            .iter()
            .filter(|info| info.flow == FlowType::ConditionalBranch)
            .count();
        // ifeq..if_acmpne plus ifnull/ifnonnull
        assert_eq!(branches, 16);
        assert_eq!(
            INSTRUCTIONS[opcodes::GOTO_W as usize].operand,
            OperandType::Branch32
        );
    }

    #[test]
    fn test_compare_negation_is_involutive() {
        for op in [
            CompareOp::Eq,
            CompareOp::Ne,
            CompareOp::Lt,
            CompareOp::Ge,
            CompareOp::Gt,
            CompareOp::Le,
        ] {
            assert_eq!(op.negate().negate(), op);
            assert_ne!(op.negate(), op);
        }
        assert_eq!(CompareOp::Ge.to_string(), ">=");
        assert_eq!(BinaryOp::Ushr.to_string(), ">>>");
        assert_eq!(InvokeKind::Special.to_string(), "special");
    }

    #[test]
    fn test_sentinel() {
        let sentinel = Instruction::sentinel();
        assert!(sentinel.is_sentinel());
        assert_eq!(sentinel.next_offset(), 0);
        assert!(sentinel.falls_through());
    }
}
