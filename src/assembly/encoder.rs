//! JVM bytecode assembly with label resolution.
//!
//! [`InstructionAssembler`] is the reverse counterpart of the decoder. It builds a code array
//! instruction by instruction through a fluent API, resolving symbolic labels for branches,
//! switches and exception-table ranges when [`InstructionAssembler::finish`] is called. It is
//! used to write readable test fixtures and benchmark inputs.
//!
//! # Usage Examples
//!
//! ```rust
//! use jvmscope::assembly::InstructionAssembler;
//!
//! // int i = 0; while (i < 10) i++; return i;
//! let mut asm = InstructionAssembler::new();
//! asm.iconst(0)?
//!     .istore(1)?
//!     .label("test")?
//!     .iload(1)?
//!     .iconst(10)?
//!     .if_icmpge("end")?
//!     .iinc(1, 1)?
//!     .goto("test")?
//!     .label("end")?
//!     .iload(1)?
//!     .ireturn()?;
//!
//! let (code, exception_table) = asm.finish()?;
//! assert_eq!(code.len(), 16);
//! assert!(exception_table.is_empty());
//! # Ok::<(), jvmscope::Error>(())
//! ```

use std::collections::HashMap;

use crate::{
    assembly::{
        instruction::{FlowType, OperandType, INSTRUCTIONS},
        opcodes,
    },
    metadata::method::ExceptionTableEntry,
    Error, Result,
};

struct LabelFixup {
    label: String,
    /// Offset of the branching instruction; JVM branch offsets are relative to it
    instruction_position: usize,
    fixup_position: usize,
    wide: bool,
}

struct HandlerFixup {
    start: String,
    end: String,
    handler: String,
    catch_type: Option<u16>,
}

/// A fluent JVM bytecode builder with symbolic labels.
#[derive(Default)]
pub struct InstructionAssembler {
    code: Vec<u8>,
    labels: HashMap<String, usize>,
    fixups: Vec<LabelFixup>,
    handlers: Vec<HandlerFixup>,
}

impl InstructionAssembler {
    /// Creates an empty assembler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current code position in bytes.
    #[must_use]
    pub fn position(&self) -> usize {
        self.code.len()
    }

    /// Emits an instruction without operand bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedBytecode`] if the opcode is undefined or needs operand
    /// bytes; use the dedicated helpers for those.
    pub fn emit(&mut self, opcode: u8) -> Result<&mut Self> {
        let info = INSTRUCTIONS
            .get(opcode as usize)
            .ok_or_else(|| malformed_error!("Invalid opcode {:02X}", opcode))?;
        if !matches!(
            info.operand,
            OperandType::None | OperandType::ImplicitLocal(_)
        ) {
            return Err(malformed_error!(
                "Opcode '{}' requires operands",
                info.mnemonic
            ));
        }
        self.code.push(opcode);
        Ok(self)
    }

    /// Emits an opcode followed by one raw operand byte.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedBytecode`] if the opcode is undefined.
    pub fn emit_u8(&mut self, opcode: u8, operand: u8) -> Result<&mut Self> {
        Self::check_defined(opcode)?;
        self.code.extend_from_slice(&[opcode, operand]);
        Ok(self)
    }

    /// Emits an opcode followed by a big-endian two-byte operand.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedBytecode`] if the opcode is undefined.
    pub fn emit_u16(&mut self, opcode: u8, operand: u16) -> Result<&mut Self> {
        Self::check_defined(opcode)?;
        self.code.push(opcode);
        self.code.extend_from_slice(&operand.to_be_bytes());
        Ok(self)
    }

    /// Defines a label at the current position.
    ///
    /// # Errors
    /// Returns [`crate::Error::DuplicateLabel`] if the label already exists.
    pub fn label(&mut self, name: &str) -> Result<&mut Self> {
        if self.labels.contains_key(name) {
            return Err(Error::DuplicateLabel(name.to_string()));
        }
        self.labels.insert(name.to_string(), self.code.len());
        Ok(self)
    }

    /// Emits a branch to a label.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidBranch`] if `opcode` is not a branch.
    pub fn branch(&mut self, opcode: u8, label: &str) -> Result<&mut Self> {
        let info = INSTRUCTIONS
            .get(opcode as usize)
            .ok_or_else(|| malformed_error!("Invalid opcode {:02X}", opcode))?;
        let wide = match (info.flow, info.operand) {
            (
                FlowType::ConditionalBranch | FlowType::UnconditionalBranch | FlowType::Subroutine,
                OperandType::Branch16,
            ) => false,
            (FlowType::UnconditionalBranch | FlowType::Subroutine, OperandType::Branch32) => true,
            _ => {
                return Err(Error::InvalidBranch(format!(
                    "instruction '{}' is not a branch instruction",
                    info.mnemonic
                )))
            }
        };

        let instruction_position = self.code.len();
        self.code.push(opcode);
        self.fixups.push(LabelFixup {
            label: label.to_string(),
            instruction_position,
            fixup_position: self.code.len(),
            wide,
        });
        self.code
            .extend_from_slice(if wide { &[0, 0, 0, 0] } else { &[0, 0] });
        Ok(self)
    }

    /// Emits a `tableswitch` over keys `low..low + labels.len()`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidBranch`] if `labels` is empty.
    pub fn tableswitch(&mut self, low: i32, default: &str, labels: &[&str]) -> Result<&mut Self> {
        if labels.is_empty() {
            return Err(Error::InvalidBranch(
                "tableswitch must have at least one case".to_string(),
            ));
        }
        let count = i32::try_from(labels.len())
            .map_err(|_| Error::InvalidBranch("too many switch cases".to_string()))?;

        let instruction_position = self.switch_header(opcodes::TABLESWITCH);
        self.switch_target(instruction_position, default);
        self.code.extend_from_slice(&low.to_be_bytes());
        self.code
            .extend_from_slice(&(low + count - 1).to_be_bytes());
        for label in labels {
            self.switch_target(instruction_position, label);
        }
        Ok(self)
    }

    /// Emits a `lookupswitch`; pairs are sorted by key as the JVMS requires.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidBranch`] if there are too many pairs.
    pub fn lookupswitch(&mut self, default: &str, pairs: &[(i32, &str)]) -> Result<&mut Self> {
        let count = i32::try_from(pairs.len())
            .map_err(|_| Error::InvalidBranch("too many switch cases".to_string()))?;
        let mut sorted = pairs.to_vec();
        sorted.sort_by_key(|(key, _)| *key);

        let instruction_position = self.switch_header(opcodes::LOOKUPSWITCH);
        self.switch_target(instruction_position, default);
        self.code.extend_from_slice(&count.to_be_bytes());
        for (key, label) in sorted {
            self.code.extend_from_slice(&key.to_be_bytes());
            self.switch_target(instruction_position, label);
        }
        Ok(self)
    }

    /// Records an exception-table entry over labelled positions.
    ///
    /// `end` is exclusive. Labels may be defined after this call.
    pub fn exception_handler(
        &mut self,
        start: &str,
        end: &str,
        handler: &str,
        catch_type: Option<u16>,
    ) -> Result<&mut Self> {
        self.handlers.push(HandlerFixup {
            start: start.to_string(),
            end: end.to_string(),
            handler: handler.to_string(),
            catch_type,
        });
        Ok(self)
    }

    /// Pushes an int constant using the shortest encoding.
    pub fn iconst(&mut self, value: i32) -> Result<&mut Self> {
        match value {
            -1..=5 => {
                let offset = u8::try_from(value + 1)
                    .map_err(|_| malformed_error!("iconst value {} out of range", value))?;
                self.emit(opcodes::ICONST_M1 + offset)
            }
            _ => {
                if let Ok(byte) = i8::try_from(value) {
                    self.emit_u8(opcodes::BIPUSH, byte.to_be_bytes()[0])
                } else if let Ok(short) = i16::try_from(value) {
                    self.emit_u16(opcodes::SIPUSH, u16::from_be_bytes(short.to_be_bytes()))
                } else {
                    Err(malformed_error!(
                        "iconst value {} needs a constant-pool entry",
                        value
                    ))
                }
            }
        }
    }

    /// Loads an int local.
    pub fn iload(&mut self, slot: u16) -> Result<&mut Self> {
        self.local(opcodes::ILOAD, opcodes::ILOAD_0, slot)
    }

    /// Loads a long local.
    pub fn lload(&mut self, slot: u16) -> Result<&mut Self> {
        self.local(opcodes::LLOAD, opcodes::LLOAD_0, slot)
    }

    /// Loads a reference local.
    pub fn aload(&mut self, slot: u16) -> Result<&mut Self> {
        self.local(opcodes::ALOAD, opcodes::ALOAD_0, slot)
    }

    /// Stores an int local.
    pub fn istore(&mut self, slot: u16) -> Result<&mut Self> {
        self.local(opcodes::ISTORE, opcodes::ISTORE_0, slot)
    }

    /// Stores a long local.
    pub fn lstore(&mut self, slot: u16) -> Result<&mut Self> {
        self.local(opcodes::LSTORE, opcodes::LSTORE_0, slot)
    }

    /// Stores a reference local.
    pub fn astore(&mut self, slot: u16) -> Result<&mut Self> {
        self.local(opcodes::ASTORE, opcodes::ASTORE_0, slot)
    }

    /// Increments an int local in place.
    pub fn iinc(&mut self, slot: u16, delta: i16) -> Result<&mut Self> {
        match (u8::try_from(slot), i8::try_from(delta)) {
            (Ok(slot), Ok(delta)) => {
                self.code
                    .extend_from_slice(&[opcodes::IINC, slot, delta.to_be_bytes()[0]]);
            }
            _ => {
                self.code.extend_from_slice(&[opcodes::WIDE, opcodes::IINC]);
                self.code.extend_from_slice(&slot.to_be_bytes());
                self.code.extend_from_slice(&delta.to_be_bytes());
            }
        }
        Ok(self)
    }

    /// Unconditional jump.
    pub fn goto(&mut self, label: &str) -> Result<&mut Self> {
        self.branch(opcodes::GOTO, label)
    }

    /// Jumps if the int on top of the stack is zero.
    pub fn ifeq(&mut self, label: &str) -> Result<&mut Self> {
        self.branch(opcodes::IFEQ, label)
    }

    /// Jumps if the int on top of the stack is non-zero.
    pub fn ifne(&mut self, label: &str) -> Result<&mut Self> {
        self.branch(opcodes::IFNE, label)
    }

    /// Jumps if the first int is greater or equal to the second.
    pub fn if_icmpge(&mut self, label: &str) -> Result<&mut Self> {
        self.branch(opcodes::IF_ICMPGE, label)
    }

    /// Jumps if the first int is less than the second.
    pub fn if_icmplt(&mut self, label: &str) -> Result<&mut Self> {
        self.branch(opcodes::IF_ICMPLT, label)
    }

    /// Jumps if the reference is null.
    pub fn ifnull(&mut self, label: &str) -> Result<&mut Self> {
        self.branch(opcodes::IFNULL, label)
    }

    /// Pushes a constant-pool entry (`ldc` or `ldc_w`).
    pub fn ldc(&mut self, index: u16) -> Result<&mut Self> {
        match u8::try_from(index) {
            Ok(short) => self.emit_u8(opcodes::LDC, short),
            Err(_) => self.emit_u16(opcodes::LDC_W, index),
        }
    }

    /// Calls a virtual method.
    pub fn invokevirtual(&mut self, index: u16) -> Result<&mut Self> {
        self.emit_u16(opcodes::INVOKEVIRTUAL, index)
    }

    /// Calls a constructor, private or super method.
    pub fn invokespecial(&mut self, index: u16) -> Result<&mut Self> {
        self.emit_u16(opcodes::INVOKESPECIAL, index)
    }

    /// Calls a static method.
    pub fn invokestatic(&mut self, index: u16) -> Result<&mut Self> {
        self.emit_u16(opcodes::INVOKESTATIC, index)
    }

    /// Calls an interface method; `count` is the argument slot count including the receiver.
    pub fn invokeinterface(&mut self, index: u16, count: u8) -> Result<&mut Self> {
        self.emit_u16(opcodes::INVOKEINTERFACE, index)?;
        self.code.extend_from_slice(&[count, 0]);
        Ok(self)
    }

    /// Reads a static field.
    pub fn getstatic(&mut self, index: u16) -> Result<&mut Self> {
        self.emit_u16(opcodes::GETSTATIC, index)
    }

    /// Reads an instance field.
    pub fn getfield(&mut self, index: u16) -> Result<&mut Self> {
        self.emit_u16(opcodes::GETFIELD, index)
    }

    /// Allocates an uninitialised object.
    pub fn new_object(&mut self, class_index: u16) -> Result<&mut Self> {
        self.emit_u16(opcodes::NEW, class_index)
    }

    /// Duplicates the top stack value.
    pub fn dup(&mut self) -> Result<&mut Self> {
        self.emit(opcodes::DUP)
    }

    /// Discards the top stack value.
    pub fn pop(&mut self) -> Result<&mut Self> {
        self.emit(opcodes::POP)
    }

    /// Adds two ints.
    pub fn iadd(&mut self) -> Result<&mut Self> {
        self.emit(opcodes::IADD)
    }

    /// Loads an int array element.
    pub fn iaload(&mut self) -> Result<&mut Self> {
        self.emit(opcodes::IALOAD)
    }

    /// Pushes the length of an array.
    pub fn arraylength(&mut self) -> Result<&mut Self> {
        self.emit(opcodes::ARRAYLENGTH)
    }

    /// Enters a monitor.
    pub fn monitorenter(&mut self) -> Result<&mut Self> {
        self.emit(opcodes::MONITORENTER)
    }

    /// Exits a monitor.
    pub fn monitorexit(&mut self) -> Result<&mut Self> {
        self.emit(opcodes::MONITOREXIT)
    }

    /// Throws the exception on top of the stack.
    pub fn athrow(&mut self) -> Result<&mut Self> {
        self.emit(opcodes::ATHROW)
    }

    /// Returns an int.
    pub fn ireturn(&mut self) -> Result<&mut Self> {
        self.emit(opcodes::IRETURN)
    }

    /// Returns a reference.
    pub fn areturn(&mut self) -> Result<&mut Self> {
        self.emit(opcodes::ARETURN)
    }

    /// Returns from a `void` method.
    pub fn vreturn(&mut self) -> Result<&mut Self> {
        self.emit(opcodes::RETURN)
    }

    /// Resolves all labels and returns the code array and exception table.
    ///
    /// # Errors
    /// Returns [`crate::Error::UndefinedLabel`] for a reference to an undefined label and
    /// [`crate::Error::InvalidBranch`] if a 16-bit branch offset does not fit.
    pub fn finish(mut self) -> Result<(Vec<u8>, Vec<ExceptionTableEntry>)> {
        let fixups = std::mem::take(&mut self.fixups);
        for fixup in &fixups {
            let target = self.resolve_label(&fixup.label)?;
            let delta = signed(target)? - signed(fixup.instruction_position)?;
            if fixup.wide {
                self.code[fixup.fixup_position..fixup.fixup_position + 4]
                    .copy_from_slice(&delta.to_be_bytes());
            } else {
                let short = i16::try_from(delta).map_err(|_| {
                    Error::InvalidBranch(format!(
                        "offset {delta} out of range for 2-byte branch to '{}'",
                        fixup.label
                    ))
                })?;
                self.code[fixup.fixup_position..fixup.fixup_position + 2]
                    .copy_from_slice(&short.to_be_bytes());
            }
        }

        let mut table = Vec::with_capacity(self.handlers.len());
        for handler in &self.handlers {
            table.push(ExceptionTableEntry::new(
                pc(self.resolve_label(&handler.start)?)?,
                pc(self.resolve_label(&handler.end)?)?,
                pc(self.resolve_label(&handler.handler)?)?,
                handler.catch_type,
            ));
        }

        Ok((self.code, table))
    }

    fn check_defined(opcode: u8) -> Result<()> {
        if INSTRUCTIONS.get(opcode as usize).is_none() {
            return Err(malformed_error!("Invalid opcode {:02X}", opcode));
        }
        Ok(())
    }

    fn local(&mut self, generic: u8, short_base: u8, slot: u16) -> Result<&mut Self> {
        match slot {
            0..=3 => {
                let offset = u8::try_from(slot)
                    .map_err(|_| malformed_error!("Local slot {} out of range", slot))?;
                self.emit(short_base + offset)
            }
            _ => match u8::try_from(slot) {
                Ok(byte) => self.emit_u8(generic, byte),
                Err(_) => {
                    self.code.push(opcodes::WIDE);
                    self.emit_u16(generic, slot)
                }
            },
        }
    }

    fn switch_header(&mut self, opcode: u8) -> usize {
        let position = self.code.len();
        self.code.push(opcode);
        while self.code.len() % 4 != 0 {
            self.code.push(0);
        }
        position
    }

    fn switch_target(&mut self, instruction_position: usize, label: &str) {
        self.fixups.push(LabelFixup {
            label: label.to_string(),
            instruction_position,
            fixup_position: self.code.len(),
            wide: true,
        });
        self.code.extend_from_slice(&[0, 0, 0, 0]);
    }

    fn resolve_label(&self, label: &str) -> Result<usize> {
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| Error::UndefinedLabel(label.to_string()))
    }
}

fn signed(position: usize) -> Result<i32> {
    i32::try_from(position).map_err(|_| malformed_error!("Code position exceeds i32 range"))
}

fn pc(position: usize) -> Result<u16> {
    u16::try_from(position).map_err(|_| malformed_error!("Code position exceeds u16 range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::{decode_code, Operand};

    #[test]
    fn test_backward_and_forward_branches() -> Result<()> {
        let mut asm = InstructionAssembler::new();
        asm.label("top")?
            .iload(0)?
            .ifeq("out")?
            .goto("top")?
            .label("out")?
            .vreturn()?;
        let (code, _) = asm.finish()?;

        assert_eq!(code, vec![0x1A, 0x99, 0x00, 0x06, 0xA7, 0xFF, 0xFC, 0xB1]);
        Ok(())
    }

    #[test]
    fn test_switch_round_trips_through_decoder() -> Result<()> {
        let mut asm = InstructionAssembler::new();
        asm.iload(0)?
            .tableswitch(1, "default", &["one", "two"])?
            .label("one")?
            .vreturn()?
            .label("two")?
            .vreturn()?
            .label("default")?
            .vreturn()?;
        let (code, _) = asm.finish()?;
        let decoded = decode_code(&code, code.len())?;

        let switch = &decoded.instructions[2];
        assert!(matches!(switch.operand, Operand::TableSwitch { low: 1, .. }));
        let targets: Vec<Option<usize>> = switch
            .branch_targets
            .iter()
            .map(|&t| decoded.offsets.index_of(t))
            .collect();
        assert_eq!(targets, vec![Some(5), Some(3), Some(4)]);
        Ok(())
    }

    #[test]
    fn test_exception_table_labels() -> Result<()> {
        let mut asm = InstructionAssembler::new();
        asm.exception_handler("start", "end", "handler", Some(7))?
            .label("start")?
            .iconst(1)?
            .pop()?
            .label("end")?
            .vreturn()?
            .label("handler")?
            .athrow()?;
        let (_, table) = asm.finish()?;
        assert_eq!(table, vec![ExceptionTableEntry::new(0, 2, 3, Some(7))]);
        Ok(())
    }

    #[test]
    fn test_label_errors() {
        let mut asm = InstructionAssembler::new();
        asm.label("a").unwrap();
        assert!(matches!(asm.label("a"), Err(Error::DuplicateLabel(_))));
        assert!(matches!(
            asm.branch(opcodes::IADD, "a"),
            Err(Error::InvalidBranch(_))
        ));
        asm.goto("missing").unwrap();
        assert!(matches!(asm.finish(), Err(Error::UndefinedLabel(_))));
    }

    #[test]
    fn test_constant_and_local_encodings() -> Result<()> {
        let mut asm = InstructionAssembler::new();
        asm.iconst(-1)?
            .iconst(100)?
            .iconst(1000)?
            .istore(5)?
            .iload(300)?
            .iinc(2, 200)?;
        let (code, _) = asm.finish()?;
        assert_eq!(
            code,
            vec![
                0x02, 0x10, 0x64, 0x11, 0x03, 0xE8, 0x36, 0x05, 0xC4, 0x15, 0x01, 0x2C, 0xC4,
                0x84, 0x00, 0x02, 0x00, 0xC8
            ]
        );
        Ok(())
    }
}
