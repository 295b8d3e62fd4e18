//! JVM bytecode decoding and assembly.
//!
//! This module is the first stage of the pipeline. It turns a method's raw code array into a
//! dense instruction list with an offset lookup table, and provides the inverse assembler used to
//! build fixtures.
//!
//! # Architecture
//!
//! - **Opcode table**: [`INSTRUCTIONS`] holds one static [`OpcodeInfo`] per defined opcode.
//!   Decoding, stack simulation and lowering all key off its [`OpKind`] tag.
//! - **Decoder**: [`decode_code`] walks the code array, prepends the sentinel `nop` at offset
//!   `-1` and produces the [`OffsetTable`].
//! - **Assembler**: [`InstructionAssembler`] writes bytecode with symbolic labels.
//!
//! # Key Components
//!
//! - [`Instruction`] - A decoded instruction
//! - [`decode_code`] / [`decode_instruction`] - Decoding entry points
//! - [`OffsetTable`] - Offset to index bijection
//! - [`InstructionAssembler`] - Label-resolving bytecode builder
//! - [`opcodes`] - Opcode byte constants
//!
//! # Examples
//!
//! ```rust
//! use jvmscope::assembly::{decode_code, InstructionAssembler, OpKind};
//!
//! let mut asm = InstructionAssembler::new();
//! asm.iload(1)?.iconst(2)?.iadd()?.ireturn()?;
//! let (code, _) = asm.finish()?;
//!
//! let decoded = decode_code(&code, code.len())?;
//! assert!(decoded.instructions[0].is_sentinel());
//! assert!(matches!(decoded.instructions[3].kind, OpKind::Binary(..)));
//! # Ok::<(), jvmscope::Error>(())
//! ```

mod decoder;
mod encoder;
mod instruction;
pub mod opcodes;

pub use decoder::{decode_code, decode_instruction, DecodedCode, OffsetTable};
pub use encoder::InstructionAssembler;
pub use instruction::{
    BinaryOp, CompareOp, ConstValue, FlowType, InvokeKind, Instruction, OpKind, OpcodeInfo,
    Operand, OperandType, INSTRUCTIONS,
};
