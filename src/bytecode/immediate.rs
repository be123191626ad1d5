/*!
  Immediate operands. `ImmediateKind` is the tag a descriptor declares; `Immediate` is the decoded
  value, one variant per kind with exactly the fields that kind implies. `decode_immediate`
  dispatches exhaustively over the kind, so every kind has a decoding rule by construction.

  Widths follow the binary format: indices, counts, alignments and offsets are 32 bit unsigned;
  the reserved table/memory index fields are one bit; the block signature is a seven bit signed
  value whose single byte is either a value type or `EMPTY_BLOCK_TYPE`. No index is checked
  against a module's actual counts here.
*/

use std::fmt::{Display, Formatter};

use super::{ImmediateKind, ValueType, EMPTY_BLOCK_TYPE};
use crate::cursor::ByteCursor;
use crate::error::DecodeError;
use crate::varint::{
  encode_signed, encode_unsigned, read_f32, read_f64, read_signed, read_unsigned, Ieee32, Ieee64
};

const INDEX_BITS    : u32 = 32;
const RESERVED_BITS : u32 = 1;
const BLOCK_BITS    : u32 = 7;

/// The result type of a block.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum BlockType {
  Empty,
  Value(ValueType),
}

/// The alignment exponent and byte offset of a load or store, in encoding order.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash, Default)]
pub struct MemArg {
  pub align  : u32,
  pub offset : u32,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum Immediate {
  BlockType(BlockType),
  /// Label depth.
  BranchTarget(u32),
  BranchTable {
    targets : Vec<u32>,
    default : u32
  },
  /// Function index.
  CallTarget(u32),
  CallIndirectTarget {
    type_index  : u32,
    /// Reserved, zero in the base format.
    table_index : u32
  },
  LocalOrGlobalIndex(u32),
  MemoryAccess(MemArg),
  /// Reserved memory index, zero in the base format.
  MemorySize(u32),
  ConstI32(i32),
  ConstI64(i64),
  ConstF32(Ieee32),
  ConstF64(Ieee64),
}

impl Immediate {

  /// The kind this value decodes from. Always equal to the kind that produced it.
  pub fn kind(&self) -> ImmediateKind {
    match self {
      Immediate::BlockType(_)                => ImmediateKind::BlockType,
      Immediate::BranchTarget(_)             => ImmediateKind::BranchTarget,
      Immediate::BranchTable { .. }          => ImmediateKind::BranchTable,
      Immediate::CallTarget(_)               => ImmediateKind::CallTarget,
      Immediate::CallIndirectTarget { .. }   => ImmediateKind::CallIndirectTarget,
      Immediate::LocalOrGlobalIndex(_)       => ImmediateKind::LocalOrGlobalIndex,
      Immediate::MemoryAccess(_)             => ImmediateKind::MemoryAccess,
      Immediate::MemorySize(_)               => ImmediateKind::MemorySize,
      Immediate::ConstI32(_)                 => ImmediateKind::ConstI32,
      Immediate::ConstI64(_)                 => ImmediateKind::ConstI64,
      Immediate::ConstF32(_)                 => ImmediateKind::ConstF32,
      Immediate::ConstF64(_)                 => ImmediateKind::ConstF64,
    }
  }

  /// Appends the binary encoding of the operands to `out`, using minimal varints.
  pub fn encode(&self, out: &mut Vec<u8>) {
    match self {

      Immediate::BlockType(BlockType::Empty)        => out.push(EMPTY_BLOCK_TYPE),
      Immediate::BlockType(BlockType::Value(value)) => out.push(value.code()),

      | Immediate::BranchTarget(index)
      | Immediate::CallTarget(index)
      | Immediate::LocalOrGlobalIndex(index)
      | Immediate::MemorySize(index) => encode_unsigned(*index as u64, out),

      Immediate::BranchTable { targets, default } => {
        encode_unsigned(targets.len() as u64, out);
        for target in targets {
          encode_unsigned(*target as u64, out);
        }
        encode_unsigned(*default as u64, out);
      }

      Immediate::CallIndirectTarget { type_index, table_index } => {
        encode_unsigned(*type_index as u64, out);
        encode_unsigned(*table_index as u64, out);
      }

      Immediate::MemoryAccess(MemArg { align, offset }) => {
        encode_unsigned(*align as u64, out);
        encode_unsigned(*offset as u64, out);
      }

      Immediate::ConstI32(value) => encode_signed(*value as i64, out),
      Immediate::ConstI64(value) => encode_signed(*value, out),
      Immediate::ConstF32(value) => out.extend_from_slice(&value.bits().to_le_bytes()),
      Immediate::ConstF64(value) => out.extend_from_slice(&value.bits().to_le_bytes()),

    }
  }
}

/// Operands in the assembler's syntax.
impl Display for Immediate {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Immediate::BlockType(BlockType::Empty)        => Ok(()),
      Immediate::BlockType(BlockType::Value(value)) => write!(f, "{}", value),

      | Immediate::BranchTarget(index)
      | Immediate::CallTarget(index)
      | Immediate::LocalOrGlobalIndex(index)
      | Immediate::MemorySize(index) => write!(f, "{}", index),

      Immediate::BranchTable { targets, default } => {
        for target in targets {
          write!(f, "{} ", target)?;
        }
        write!(f, "{}", default)
      }

      Immediate::CallIndirectTarget { type_index, table_index } => {
        write!(f, "{} {}", type_index, table_index)
      }

      Immediate::MemoryAccess(MemArg { align, offset }) => write!(f, "{} {}", align, offset),

      Immediate::ConstI32(value) => write!(f, "{}", value),
      Immediate::ConstI64(value) => write!(f, "{}", value),
      Immediate::ConstF32(value) => write!(f, "{}", value),
      Immediate::ConstF64(value) => write!(f, "{}", value),
    }
  }
}

fn read_index(cursor: &mut ByteCursor) -> Result<u32, DecodeError> {
  Ok(read_unsigned(cursor, INDEX_BITS)? as u32)
}

fn read_reserved(cursor: &mut ByteCursor) -> Result<u32, DecodeError> {
  Ok(read_unsigned(cursor, RESERVED_BITS)? as u32)
}

fn read_block_type(cursor: &mut ByteCursor) -> Result<BlockType, DecodeError> {
  let offset = cursor.position();
  // A single byte: 0x40 is -64, the value types are -1 through -4.
  let tag = (read_signed(cursor, BLOCK_BITS)? as u8) & 0x7F;
  if tag == EMPTY_BLOCK_TYPE {
    return Ok(BlockType::Empty);
  }
  match ValueType::try_from(tag) {
    Ok(value) => Ok(BlockType::Value(value)),
    Err(_)    => Err(DecodeError::InvalidBlockType(tag, offset))
  }
}

/**
  Reads a count, that many labels, then the default label. A count larger than what the stream
  holds surfaces as `UnexpectedEndOfStream` from the label reads; since every label takes at
  least one byte, no more slots are reserved up front than there are bytes left.
*/
fn read_branch_table(cursor: &mut ByteCursor) -> Result<Immediate, DecodeError> {
  let count = read_index(cursor)? as usize;
  let mut targets = Vec::with_capacity(count.min(cursor.remaining()));
  for _ in 0..count {
    targets.push(read_index(cursor)?);
  }
  let default = read_index(cursor)?;
  Ok(Immediate::BranchTable { targets, default })
}

/// Consumes the operands of `kind` from `cursor`.
pub fn decode_immediate(kind: ImmediateKind, cursor: &mut ByteCursor) -> Result<Immediate, DecodeError> {
  let immediate =
    match kind {
      ImmediateKind::BlockType          => Immediate::BlockType(read_block_type(cursor)?),
      ImmediateKind::BranchTarget       => Immediate::BranchTarget(read_index(cursor)?),
      ImmediateKind::BranchTable        => read_branch_table(cursor)?,
      ImmediateKind::CallTarget         => Immediate::CallTarget(read_index(cursor)?),

      ImmediateKind::CallIndirectTarget => {
        let type_index  = read_index(cursor)?;
        let table_index = read_reserved(cursor)?;
        Immediate::CallIndirectTarget { type_index, table_index }
      }

      ImmediateKind::LocalOrGlobalIndex => Immediate::LocalOrGlobalIndex(read_index(cursor)?),

      ImmediateKind::MemoryAccess       => {
        let align  = read_index(cursor)?;
        let offset = read_index(cursor)?;
        Immediate::MemoryAccess(MemArg { align, offset })
      }

      ImmediateKind::MemorySize         => Immediate::MemorySize(read_reserved(cursor)?),
      ImmediateKind::ConstI32           => Immediate::ConstI32(read_signed(cursor, 32)? as i32),
      ImmediateKind::ConstI64           => Immediate::ConstI64(read_signed(cursor, 64)?),
      ImmediateKind::ConstF32           => Immediate::ConstF32(read_f32(cursor)?),
      ImmediateKind::ConstF64           => Immediate::ConstF64(read_f64(cursor)?),
    };
  Ok(immediate)
}
