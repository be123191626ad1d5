/*!
  The human readable textual form of bytecode is called assembly. Each line holds at most one
  instruction, a mnemonic followed by whitespace separated operands:

    ```text
    block i32          ;; block type is optional
      local.get 0
      br_table 0 1 0   # the last label is the default
    end
    ```

  Mnemonics are resolved through the `strum` derives on `Opcode`, and operands are read according
  to the opcode's `ImmediateKind`. The result is plain bytecode produced with `encode_instruction`,
  so anything assembled here decodes back to the same instructions.
*/

use std::str::FromStr;

use nom::{
  branch::alt,
  bytes::complete::{tag, tag_no_case, take_while1},
  character::complete::{
    i32 as signed32,
    i64 as signed64,
    space0,
    space1,
    u32 as unsigned32
  },
  combinator::{all_consuming, eof, opt, rest, value},
  multi::many0,
  number::complete::{double, float},
  sequence::{pair, preceded, terminated, tuple},
  IResult
};
use thiserror::Error;
use tracing::debug;

use super::{encode_instruction, BlockType, Immediate, ImmediateKind, MemArg, Opcode, ValueType};

#[derive(Error, Clone, Eq, PartialEq, Debug)]
pub enum AssemblyError {
  #[error("Error on line {line}: {name} is not an instruction.")]
  UnknownMnemonic {
    line: usize,
    name: String
  },
  #[error("Error on line {line}: {mnemonic} cannot take the operands `{operands}`.")]
  BadImmediate {
    line: usize,
    mnemonic: &'static str,
    operands: String
  },
  #[error("Error on line {line}: cannot parse `{text}`.")]
  Syntax {
    line: usize,
    text: String
  },
}

// region Line syntax

fn mnemonic_p(input: &str) -> IResult<&str, &str> {
  take_while1(|c: char| c.is_ascii_alphanumeric() || c == '.' || c == '_')(input)
}

fn operand_p(input: &str) -> IResult<&str, &str> {
  take_while1(|c: char| !c.is_whitespace() && c != ';' && c != '#')(input)
}

fn comment_p(input: &str) -> IResult<&str, &str> {
  preceded(alt((tag(";;"), tag("#"))), rest)(input)
}

/// A mnemonic and its operands, or `None` for a blank or comment-only line.
fn line_p(input: &str) -> IResult<&str, Option<(&str, Vec<&str>)>> {
  terminated(
    preceded(space0, opt(pair(mnemonic_p, many0(preceded(space1, operand_p))))),
    tuple((space0, opt(comment_p), eof))
  )(input)
}

// endregion

// region Operands

fn f32_p(input: &str) -> IResult<&str, f32> {
  alt((
    value(f32::NAN, tag_no_case("nan")),
    value(f32::INFINITY, alt((tag_no_case("infinity"), tag_no_case("inf")))),
    value(f32::NEG_INFINITY, alt((tag_no_case("-infinity"), tag_no_case("-inf")))),
    float
  ))(input)
}

fn f64_p(input: &str) -> IResult<&str, f64> {
  alt((
    value(f64::NAN, tag_no_case("nan")),
    value(f64::INFINITY, alt((tag_no_case("infinity"), tag_no_case("inf")))),
    value(f64::NEG_INFINITY, alt((tag_no_case("-infinity"), tag_no_case("-inf")))),
    double
  ))(input)
}

/// Runs `parser` over the whole of `text`.
fn operand<'a, T>(parser: impl FnMut(&'a str) -> IResult<&'a str, T>, text: &'a str) -> Option<T> {
  all_consuming(parser)(text).ok().map(|(_, parsed)| parsed)
}

fn index(text: &str) -> Option<u32> {
  operand(unsigned32, text)
}

/// Reserved table and memory indices are one bit wide in the binary format.
fn reserved(text: &str) -> Option<u32> {
  index(text).filter(|value| *value <= 1)
}

/// Builds the immediate of `kind` from its textual operands, or `None` if they don't fit.
fn parse_immediate(kind: ImmediateKind, operands: &[&str]) -> Option<Immediate> {
  let immediate =
    match (kind, operands) {

      (ImmediateKind::BlockType, []) => Immediate::BlockType(BlockType::Empty),
      (ImmediateKind::BlockType, [value_type]) => {
        Immediate::BlockType(BlockType::Value(ValueType::from_str(value_type).ok()?))
      }

      (ImmediateKind::BranchTarget, [label])         => Immediate::BranchTarget(index(label)?),
      (ImmediateKind::CallTarget, [function])        => Immediate::CallTarget(index(function)?),
      (ImmediateKind::LocalOrGlobalIndex, [variable]) => Immediate::LocalOrGlobalIndex(index(variable)?),

      (ImmediateKind::BranchTable, [targets @ .., default]) => {
        Immediate::BranchTable {
          targets : targets.iter().map(|target| index(target)).collect::<Option<Vec<u32>>>()?,
          default : index(default)?
        }
      }

      (ImmediateKind::CallIndirectTarget, [type_index]) => {
        Immediate::CallIndirectTarget { type_index: index(type_index)?, table_index: 0 }
      }
      (ImmediateKind::CallIndirectTarget, [type_index, table_index]) => {
        Immediate::CallIndirectTarget { type_index: index(type_index)?, table_index: reserved(table_index)? }
      }

      (ImmediateKind::MemoryAccess, []) => Immediate::MemoryAccess(MemArg::default()),
      (ImmediateKind::MemoryAccess, [align]) => {
        Immediate::MemoryAccess(MemArg { align: index(align)?, offset: 0 })
      }
      (ImmediateKind::MemoryAccess, [align, offset]) => {
        Immediate::MemoryAccess(MemArg { align: index(align)?, offset: index(offset)? })
      }

      (ImmediateKind::MemorySize, [])       => Immediate::MemorySize(0),
      (ImmediateKind::MemorySize, [memory]) => Immediate::MemorySize(reserved(memory)?),

      (ImmediateKind::ConstI32, [constant]) => Immediate::ConstI32(operand(signed32, constant)?),
      (ImmediateKind::ConstI64, [constant]) => Immediate::ConstI64(operand(signed64, constant)?),
      (ImmediateKind::ConstF32, [constant]) => Immediate::ConstF32(operand(f32_p, constant)?.into()),
      (ImmediateKind::ConstF64, [constant]) => Immediate::ConstF64(operand(f64_p, constant)?.into()),

      _ => {
        return None;
      }

    };
  Some(immediate)
}

// endregion

/// Translates assembly text into bytecode, stopping at the first bad line.
pub fn assemble(text: &str) -> Result<Vec<u8>, AssemblyError> {
  let mut code = Vec::new();

  for (number, source) in text.lines().enumerate() {
    let line = number + 1;

    let (mnemonic, operands) =
      match line_p(source) {
        Ok((_, Some(instruction))) => instruction,
        Ok((_, None))              => continue,
        Err(_)                     => {
          return Err(AssemblyError::Syntax { line, text: source.trim().to_string() });
        }
      };

    let opcode = Opcode::from_str(mnemonic).map_err(
      |_| AssemblyError::UnknownMnemonic { line, name: mnemonic.to_string() }
    )?;

    let bad_immediate = || AssemblyError::BadImmediate {
      line,
      mnemonic : opcode.mnemonic(),
      operands : operands.join(" ")
    };
    let immediate =
      match opcode.immediate_kind() {
        Some(kind) => Some(parse_immediate(kind, &operands).ok_or_else(bad_immediate)?),
        None if operands.is_empty() => None,
        None => {
          return Err(bad_immediate());
        }
      };

    encode_instruction(opcode, immediate.as_ref(), &mut code);
  }

  debug!(bytes = code.len(), "assembled");
  Ok(code)
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::varint::{Ieee32, Ieee64};

  #[test]
  fn assemble_block(){
    let text = "
      ;; an empty block
      block
        nop   # does nothing
      end
    ";
    assert_eq!(assemble(text), Ok(vec![0x02, 0x40, 0x01, 0x0B]));
  }

  #[test]
  fn assemble_operands(){
    let text = "
      block i64
      call 128
      i32.load 2 8
      i32.store
      br_table 0 1 0
      call_indirect 3
      memory.grow
      local.get 0;;trailing comment
      end
    ";
    let expected = vec![
      0x02, 0x7E,
      0x10, 0x80, 0x01,
      0x28, 0x02, 0x08,
      0x36, 0x00, 0x00,
      0x0E, 0x02, 0x00, 0x01, 0x00,
      0x11, 0x03, 0x00,
      0x40, 0x00,
      0x20, 0x00,
      0x0B,
    ];
    assert_eq!(assemble(text), Ok(expected));
  }

  #[test]
  fn assemble_constants(){
    assert_eq!(assemble("i32.const -1"), Ok(vec![0x41, 0x7F]));
    assert_eq!(assemble("i64.const 64"), Ok(vec![0x42, 0xC0, 0x00]));

    let mut expected = vec![0x43];
    expected.extend_from_slice(&Ieee32::from(f32::NEG_INFINITY).bits().to_le_bytes());
    assert_eq!(assemble("f32.const -inf"), Ok(expected));

    let mut expected = vec![0x44];
    expected.extend_from_slice(&Ieee64::from(1.5f64).bits().to_le_bytes());
    assert_eq!(assemble("f64.const 1.5"), Ok(expected));

    let code = assemble("f64.const nan").unwrap();
    let bits = u64::from_le_bytes([code[1], code[2], code[3], code[4], code[5], code[6], code[7], code[8]]);
    assert!(f64::from_bits(bits).is_nan());
  }

  #[test]
  fn unknown_mnemonic(){
    assert_eq!(
      assemble("nop\ni32.konst 1"),
      Err(AssemblyError::UnknownMnemonic { line: 2, name: "i32.konst".to_string() })
    );
  }

  #[test]
  fn bad_immediates(){
    assert_eq!(
      assemble("nop 3"),
      Err(AssemblyError::BadImmediate { line: 1, mnemonic: "nop", operands: "3".to_string() })
    );
    assert!(matches!(assemble("br"), Err(AssemblyError::BadImmediate { .. })));
    assert!(matches!(assemble("br_table"), Err(AssemblyError::BadImmediate { .. })));
    assert!(matches!(assemble("call -1"), Err(AssemblyError::BadImmediate { .. })));
    assert!(matches!(assemble("block v128"), Err(AssemblyError::BadImmediate { .. })));
    assert!(matches!(assemble("i32.const 2147483648"), Err(AssemblyError::BadImmediate { .. })));
  }

  #[test]
  fn reserved_indices_are_one_bit(){
    assert_eq!(assemble("memory.size 1"), Ok(vec![0x3F, 0x01]));
    assert_eq!(assemble("call_indirect 2 1"), Ok(vec![0x11, 0x02, 0x01]));
    assert_eq!(
      assemble("memory.size 5"),
      Err(AssemblyError::BadImmediate { line: 1, mnemonic: "memory.size", operands: "5".to_string() })
    );
    assert!(matches!(assemble("call_indirect 0 2"), Err(AssemblyError::BadImmediate { .. })));
  }

  #[test]
  fn spelled_out_infinity(){
    let mut expected = vec![0x43];
    expected.extend_from_slice(&Ieee32::from(f32::INFINITY).bits().to_le_bytes());
    assert_eq!(assemble("f32.const infinity"), Ok(expected));

    let mut expected = vec![0x44];
    expected.extend_from_slice(&Ieee64::from(f64::NEG_INFINITY).bits().to_le_bytes());
    assert_eq!(assemble("f64.const -Infinity"), Ok(expected));
  }

  #[test]
  fn syntax_error(){
    let error = assemble("\n\n  ; nop").unwrap_err();
    assert_eq!(error, AssemblyError::Syntax { line: 3, text: "; nop".to_string() });
    assert_eq!(error.to_string(), "Error on line 3: cannot parse `; nop`.");
  }
}
