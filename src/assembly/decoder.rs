//! JVM instruction decoder.
//!
//! This module turns a method's code array into a dense list of [`Instruction`]s. Decoding is
//! table driven: the first byte selects an [`crate::assembly::OpcodeInfo`] row from
//! [`INSTRUCTIONS`], whose [`OperandType`] says how many operand bytes follow and how to read
//! them.
//!
//! [`decode_code`] walks the whole array and builds the [`OffsetTable`] that maps byte offsets
//! to instruction indices and back. Index 0 is always a synthetic `nop` at offset `-1`; real
//! instructions start at index 1. The sentinel gives the first real instruction a predecessor,
//! which the exception region inserter relies on when a protected range starts at offset 0.
//!
//! # Examples
//!
//! ```rust
//! use jvmscope::assembly::decode_code;
//!
//! // iconst_1; ireturn
//! let decoded = decode_code(&[0x04, 0xAC], 2)?;
//! assert_eq!(decoded.instructions.len(), 3);
//! assert_eq!(decoded.offsets.index_of(-1), Some(0));
//! assert_eq!(decoded.offsets.index_of(1), Some(2));
//! # Ok::<(), jvmscope::Error>(())
//! ```

use std::collections::HashMap;

use crate::{
    assembly::{
        instruction::{FlowType, Instruction, Operand, OperandType, INSTRUCTIONS},
        opcodes,
    },
    file::parser::Parser,
    Error, Result,
};

/// Bidirectional map between instruction indices and byte offsets.
///
/// The map is a bijection over instruction-start boundaries, including the sentinel pair
/// `-1 <-> 0`. A byte offset inside an instruction has no index.
#[derive(Debug, Clone, Default)]
pub struct OffsetTable {
    index_to_offset: Vec<i32>,
    offset_to_index: HashMap<i32, usize>,
}

impl OffsetTable {
    fn push(&mut self, offset: i32) {
        self.offset_to_index
            .insert(offset, self.index_to_offset.len());
        self.index_to_offset.push(offset);
    }

    /// Returns the index of the instruction starting at `offset`.
    #[must_use]
    pub fn index_of(&self, offset: i32) -> Option<usize> {
        self.offset_to_index.get(&offset).copied()
    }

    /// Returns the byte offset of the instruction at `index`.
    #[must_use]
    pub fn offset_of(&self, index: usize) -> Option<i32> {
        self.index_to_offset.get(index).copied()
    }

    /// Resolves a jump or exception-table offset to an instruction index.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedBytecode`] if `offset` is not an instruction boundary.
    pub fn resolve(&self, offset: i32) -> Result<usize> {
        self.index_of(offset).ok_or_else(|| {
            malformed_error!("Offset {} is not an instruction boundary", offset)
        })
    }

    /// Returns the number of entries, sentinel included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index_to_offset.len()
    }

    /// Returns `true` if the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index_to_offset.is_empty()
    }

    /// Iterates over `(index, offset)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, i32)> + '_ {
        self.index_to_offset.iter().copied().enumerate()
    }
}

/// The result of decoding one code array.
#[derive(Debug, Clone)]
pub struct DecodedCode {
    /// Instructions in code order; index 0 is the sentinel
    pub instructions: Vec<Instruction>,
    /// Offset lookup for `instructions`
    pub offsets: OffsetTable,
    /// The declared code length
    pub code_length: usize,
}

/// Decodes the instruction at the parser's current position.
///
/// # Errors
/// Returns [`crate::Error::MalformedBytecode`] for an unknown opcode or an illegal `wide`
/// target, and [`crate::Error::OutOfBounds`] if the operands are truncated.
pub fn decode_instruction(parser: &mut Parser) -> Result<Instruction> {
    let start = parser.pos();
    let first_byte = parser.read_be::<u8>()?;

    let (opcode, wide) = if first_byte == opcodes::WIDE {
        let modified = parser.read_be::<u8>()?;
        if !is_widenable(modified) {
            return Err(malformed_error!(
                "Opcode {:02X} cannot follow wide at offset {}",
                modified,
                start
            ));
        }
        (modified, true)
    } else {
        (first_byte, false)
    };

    let Some(info) = INSTRUCTIONS.get(opcode as usize) else {
        return Err(malformed_error!(
            "Invalid opcode {:02X} at offset {}",
            opcode,
            start
        ));
    };

    let operand = match info.operand {
        OperandType::None => Operand::None,
        OperandType::Byte => Operand::Immediate(i32::from(parser.read_be::<i8>()?)),
        OperandType::Short => Operand::Immediate(i32::from(parser.read_be::<i16>()?)),
        OperandType::Local => {
            if wide {
                Operand::Local(parser.read_be::<u16>()?)
            } else {
                Operand::Local(u16::from(parser.read_be::<u8>()?))
            }
        }
        OperandType::ImplicitLocal(slot) => Operand::Local(u16::from(slot)),
        OperandType::ConstantIndex8 => Operand::Constant(u16::from(parser.read_be::<u8>()?)),
        OperandType::ConstantIndex => Operand::Constant(parser.read_be::<u16>()?),
        OperandType::Branch16 => Operand::Branch(i32::from(parser.read_be::<i16>()?)),
        OperandType::Branch32 => Operand::Branch(parser.read_be::<i32>()?),
        OperandType::Iinc => {
            if wide {
                Operand::Iinc {
                    local: parser.read_be::<u16>()?,
                    delta: parser.read_be::<i16>()?,
                }
            } else {
                Operand::Iinc {
                    local: u16::from(parser.read_be::<u8>()?),
                    delta: i16::from(parser.read_be::<i8>()?),
                }
            }
        }
        OperandType::ArrayType => Operand::ArrayType(parser.read_be::<u8>()?),
        OperandType::InvokeInterface => {
            let index = parser.read_be::<u16>()?;
            let count = parser.read_be::<u8>()?;
            parser.advance_by(1)?;
            Operand::Invoke { index, count }
        }
        OperandType::InvokeDynamic => {
            let index = parser.read_be::<u16>()?;
            parser.advance_by(2)?;
            Operand::Invoke { index, count: 0 }
        }
        OperandType::MultiANewArray => Operand::MultiArray {
            index: parser.read_be::<u16>()?,
            dimensions: parser.read_be::<u8>()?,
        },
        OperandType::TableSwitch => decode_table_switch(parser)?,
        OperandType::LookupSwitch => decode_lookup_switch(parser)?,
        OperandType::Wide => return Err(malformed_error!("Nested wide prefix at {}", start)),
    };

    let size = parser.pos() - start;
    let offset = i32::try_from(start).map_err(|_| malformed_error!("Code offset overflow"))?;

    let mut instruction = Instruction {
        offset,
        size: u32::try_from(size).map_err(|_| malformed_error!("Instruction size overflow"))?,
        opcode,
        wide,
        mnemonic: info.mnemonic,
        kind: info.kind,
        flow_type: info.flow,
        operand,
        bytes: parser.slice_from(start)?.to_vec(),
        branch_targets: Vec::new(),
    };

    // JVM branch offsets are relative to the branching instruction's own offset
    match (&instruction.flow_type, &instruction.operand) {
        (
            FlowType::ConditionalBranch | FlowType::UnconditionalBranch | FlowType::Subroutine,
            Operand::Branch(delta),
        ) => {
            instruction.branch_targets.push(relative(offset, *delta)?);
        }
        (FlowType::Switch, Operand::TableSwitch { default, offsets, .. }) => {
            instruction.branch_targets.push(relative(offset, *default)?);
            for delta in offsets {
                instruction.branch_targets.push(relative(offset, *delta)?);
            }
        }
        (FlowType::Switch, Operand::LookupSwitch { default, pairs }) => {
            instruction.branch_targets.push(relative(offset, *default)?);
            for (_, delta) in pairs {
                instruction.branch_targets.push(relative(offset, *delta)?);
            }
        }
        _ => {}
    }

    Ok(instruction)
}

/// Decodes a whole code array.
///
/// # Arguments
/// * `code` - The code buffer
/// * `code_length` - The declared code length; decoding stops exactly there
///
/// # Errors
/// Returns [`crate::Error::MalformedBytecode`] if the declared length exceeds the buffer, an
/// opcode is unknown, or an instruction runs past the declared length.
pub fn decode_code(code: &[u8], code_length: usize) -> Result<DecodedCode> {
    let Some(code) = code.get(..code_length) else {
        return Err(malformed_error!(
            "Declared code length {} exceeds buffer of {} bytes",
            code_length,
            code.len()
        ));
    };
    if code.is_empty() {
        return Err(malformed_error!("Method has no code"));
    }

    let mut parser = Parser::new(code);
    let mut instructions = vec![Instruction::sentinel()];
    let mut offsets = OffsetTable::default();
    offsets.push(-1);

    while parser.has_more_data() {
        let start = parser.pos();
        let instruction = decode_instruction(&mut parser).map_err(|error| match error {
            Error::OutOfBounds { .. } => malformed_error!(
                "Instruction at offset {} runs past code length {}",
                start,
                code_length
            ),
            other => other,
        })?;
        offsets.push(instruction.offset);
        instructions.push(instruction);
    }

    Ok(DecodedCode {
        instructions,
        offsets,
        code_length,
    })
}

fn is_widenable(opcode: u8) -> bool {
    matches!(
        opcode,
        opcodes::ILOAD..=opcodes::ALOAD
            | opcodes::ISTORE..=opcodes::ASTORE
            | opcodes::IINC
            | opcodes::RET
    )
}

fn relative(offset: i32, delta: i32) -> Result<i32> {
    offset
        .checked_add(delta)
        .ok_or_else(|| malformed_error!("Branch offset overflow at {}", offset))
}

fn decode_table_switch(parser: &mut Parser) -> Result<Operand> {
    parser.align(4)?;
    let default = parser.read_be::<i32>()?;
    let low = parser.read_be::<i32>()?;
    let high = parser.read_be::<i32>()?;
    if high < low {
        return Err(malformed_error!(
            "tableswitch high {} is below low {}",
            high,
            low
        ));
    }

    let count = usize::try_from(i64::from(high) - i64::from(low) + 1)
        .map_err(|_| malformed_error!("tableswitch range overflow"))?;
    if count.saturating_mul(4) > parser.remaining() {
        return Err(out_of_bounds_error!());
    }

    let mut offsets = Vec::with_capacity(count);
    for _ in 0..count {
        offsets.push(parser.read_be::<i32>()?);
    }

    Ok(Operand::TableSwitch {
        default,
        low,
        offsets,
    })
}

fn decode_lookup_switch(parser: &mut Parser) -> Result<Operand> {
    parser.align(4)?;
    let default = parser.read_be::<i32>()?;
    let npairs = parser.read_be::<i32>()?;
    let count = usize::try_from(npairs)
        .map_err(|_| malformed_error!("lookupswitch has negative pair count {}", npairs))?;
    if count.saturating_mul(8) > parser.remaining() {
        return Err(out_of_bounds_error!());
    }

    let mut pairs = Vec::with_capacity(count);
    for _ in 0..count {
        let key = parser.read_be::<i32>()?;
        let delta = parser.read_be::<i32>()?;
        pairs.push((key, delta));
    }

    Ok(Operand::LookupSwitch { default, pairs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::OpKind;

    #[test]
    fn test_decode_simple_sequence() -> Result<()> {
        // iload_1; bipush -3; iadd; ireturn
        let decoded = decode_code(&[0x1B, 0x10, 0xFD, 0x60, 0xAC], 5)?;

        assert_eq!(decoded.instructions.len(), 5);
        assert!(decoded.instructions[0].is_sentinel());
        assert_eq!(decoded.instructions[1].operand, Operand::Local(1));
        assert_eq!(decoded.instructions[2].operand, Operand::Immediate(-3));
        assert_eq!(decoded.instructions[3].offset, 3);
        assert_eq!(decoded.instructions[4].flow_type, FlowType::Return);
        Ok(())
    }

    #[test]
    fn test_offset_table_is_bijective() -> Result<()> {
        let decoded = decode_code(&[0x03, 0x3C, 0x84, 0x01, 0x01, 0xB1], 6)?;
        for (index, offset) in decoded.offsets.iter() {
            assert_eq!(decoded.offsets.index_of(offset), Some(index));
            assert_eq!(decoded.offsets.offset_of(index), Some(offset));
        }
        assert_eq!(decoded.offsets.index_of(3), None);
        assert!(decoded.offsets.resolve(3).unwrap_err().is_malformed());
        Ok(())
    }

    #[test]
    fn test_branch_targets_are_absolute() -> Result<()> {
        // 0: iconst_0; 1: ifeq +4 (-> 5); 4: nop; 5: return
        let decoded = decode_code(&[0x03, 0x99, 0x00, 0x04, 0x00, 0xB1], 6)?;
        assert_eq!(decoded.instructions[2].branch_targets, vec![5]);
        assert_eq!(decoded.instructions[2].kind, OpKind::IfZero(crate::assembly::CompareOp::Eq));
        Ok(())
    }

    #[test]
    fn test_wide_forms() -> Result<()> {
        // wide iload 0x0100; wide iinc 0x0100 -2; return
        let code = [0xC4, 0x15, 0x01, 0x00, 0xC4, 0x84, 0x01, 0x00, 0xFF, 0xFE, 0xB1];
        let decoded = decode_code(&code, code.len())?;
        assert_eq!(decoded.instructions[1].operand, Operand::Local(256));
        assert!(decoded.instructions[1].wide);
        assert_eq!(decoded.instructions[1].size, 4);
        assert_eq!(
            decoded.instructions[2].operand,
            Operand::Iinc {
                local: 256,
                delta: -2
            }
        );
        assert!(decode_code(&[0xC4, 0x60], 2).is_err());
        Ok(())
    }

    #[test]
    fn test_table_switch_padding() -> Result<()> {
        // 0: iload_0; 1: tableswitch (pad 2) default +27 low 0 high 1 [+25, +26]
        let mut code = vec![0x1A, 0xAA, 0x00, 0x00];
        for value in [27_i32, 0, 1, 25, 26] {
            code.extend_from_slice(&value.to_be_bytes());
        }
        code.extend_from_slice(&[0xB1, 0xB1, 0xB1]);
        let decoded = decode_code(&code, code.len())?;

        let switch = &decoded.instructions[2];
        assert_eq!(switch.size, 23);
        assert_eq!(switch.branch_targets, vec![28, 26, 27]);
        assert_eq!(decoded.offsets.index_of(24), Some(3));
        Ok(())
    }

    #[test]
    fn test_malformed_inputs() {
        // unknown opcode
        assert!(decode_code(&[0xCB], 1).unwrap_err().is_malformed());
        // sipush truncated by the declared length
        assert!(decode_code(&[0x11, 0x00, 0x01], 2).unwrap_err().is_malformed());
        // declared length beyond the buffer
        assert!(decode_code(&[0xB1], 3).unwrap_err().is_malformed());
        // empty body
        assert!(decode_code(&[], 0).is_err());
    }
}
