/*!
  Errors produced while decoding an instruction stream. Every variant carries the byte offset at
  which decoding stopped, so a caller can report it or keep the instructions decoded before it.
*/

use thiserror::Error;

/// Why a variable-length integer was rejected.
#[derive(Error, Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum VarintReason {
  #[error("more than {max_bits} bits worth of continuation bytes")]
  TooLong { max_bits: u32 },
  #[error("terminal byte sets bits beyond the {max_bits}-bit range")]
  Overflow { max_bits: u32 },
}

/// The way a stream violated block nesting.
#[derive(Error, Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum BlockViolation {
  #[error("`end` without a matching open block")]
  UnmatchedEnd,
  #[error("`else` outside of an `if` block")]
  ElseWithoutIf,
  #[error("second `else` in the same `if` block")]
  DuplicateElse,
  #[error("bytes remain after the function body's final `end`")]
  TrailingBytes,
}

#[derive(Error, Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum DecodeError {
  #[error("unknown opcode {0:#04x} at offset {1}")]
  UnknownOpcode(u8, usize),

  #[error("malformed varint at offset {0}: {1}")]
  MalformedVarint(usize, VarintReason),

  #[error("unexpected end of stream at offset {0}")]
  UnexpectedEndOfStream(usize),

  #[error("malformed block structure at offset {0}: {1}")]
  MalformedBlockStructure(usize, BlockViolation),

  #[error("invalid block type {0:#04x} at offset {1}")]
  InvalidBlockType(u8, usize),
}

impl DecodeError {
  /// The byte offset at which the error was detected.
  pub fn offset(&self) -> usize {
    match self {
      | DecodeError::UnknownOpcode(_, offset)
      | DecodeError::InvalidBlockType(_, offset) => *offset,

      | DecodeError::MalformedVarint(offset, _)
      | DecodeError::UnexpectedEndOfStream(offset)
      | DecodeError::MalformedBlockStructure(offset, _) => *offset,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn offsets(){
    assert_eq!(DecodeError::UnknownOpcode(0x06, 3).offset(), 3);
    assert_eq!(DecodeError::UnexpectedEndOfStream(9).offset(), 9);
    assert_eq!(
      DecodeError::MalformedBlockStructure(2, BlockViolation::UnmatchedEnd).offset(),
      2
    );
  }

  #[test]
  fn messages(){
    let e = DecodeError::UnknownOpcode(0x06, 12);
    assert_eq!(e.to_string(), "unknown opcode 0x06 at offset 12");

    let e = DecodeError::MalformedVarint(4, VarintReason::TooLong { max_bits: 32 });
    assert_eq!(
      e.to_string(),
      "malformed varint at offset 4: more than 32 bits worth of continuation bytes"
    );
  }
}
