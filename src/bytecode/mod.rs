/*!

  The instruction set of the stack machine. Every instruction begins with a one byte opcode,
  optionally followed by immediate operands whose shape is fixed by the opcode. The set below is
  the single-byte base instruction set, 0x00 through 0xBF, with gaps where no instruction is
  assigned.

  As in C, a `#[repr(u8)]` enum can be treated as its numeric value, so each `Opcode` variant is
  given its byte explicitly and converts to and from `u8` for free. The mnemonic is attached with
  `strum`, which gives us both directions of opcode <-> text. What an opcode means to the decoder
  (its immediate kind, its control-flow flags, the block it opens) is answered by the methods on
  `Opcode` and collected into `InstructionDescriptor`s by the registry.

*/

mod assembly;
mod binary;
mod descriptor;
mod immediate;
mod registry;

pub use assembly::{assemble, AssemblyError};
pub use binary::encode_instruction;
pub use descriptor::{ImmediateKind, InsnFlags, InstructionDescriptor};
pub use immediate::{decode_immediate, BlockType, Immediate, MemArg};
pub use registry::{standard_registry, OpcodeRegistry, RegistryError, UnknownOpcode};

use strum_macros::{Display as StrumDisplay, EnumIter, EnumString, IntoStaticStr};
use num_enum::{TryFromPrimitive, IntoPrimitive};

use crate::blocks::BlockKind;

/// Opcodes from `FIRST_MEMORY_ACCESS_OPCODE` through `LAST_MEMORY_ACCESS_OPCODE` are the loads and
/// stores, all of which take an alignment/offset pair.
pub const FIRST_MEMORY_ACCESS_OPCODE: u8 = 0x28;
pub const LAST_MEMORY_ACCESS_OPCODE : u8 = 0x3E;

/// The block signature byte meaning "no result".
pub const EMPTY_BLOCK_TYPE: u8 = 0x40;

#[derive(
  StrumDisplay, IntoStaticStr, EnumString, EnumIter, TryFromPrimitive, IntoPrimitive,
  Clone,        Copy,          Eq,         PartialEq, Debug,            Hash
)]
#[repr(u8)]
pub enum Opcode {
  // Control //
  #[strum(serialize = "unreachable")]          Unreachable         = 0x00,
  #[strum(serialize = "nop")]                  Nop                 = 0x01,
  #[strum(serialize = "block")]                Block               = 0x02,
  #[strum(serialize = "loop")]                 Loop                = 0x03,
  #[strum(serialize = "if")]                   If                  = 0x04,
  #[strum(serialize = "else")]                 Else                = 0x05,
  #[strum(serialize = "end")]                  End                 = 0x0B,
  #[strum(serialize = "br")]                   Br                  = 0x0C,
  #[strum(serialize = "br_if")]                BrIf                = 0x0D,
  #[strum(serialize = "br_table")]             BrTable             = 0x0E,
  #[strum(serialize = "return")]               Return              = 0x0F,
  #[strum(serialize = "call")]                 Call                = 0x10,
  #[strum(serialize = "call_indirect")]        CallIndirect        = 0x11,

  // Parametric //
  #[strum(serialize = "drop")]                 Drop                = 0x1A,
  #[strum(serialize = "select")]               Select              = 0x1B,

  // Variable //
  #[strum(serialize = "local.get")]            LocalGet            = 0x20,
  #[strum(serialize = "local.set")]            LocalSet            = 0x21,
  #[strum(serialize = "local.tee")]            LocalTee            = 0x22,
  #[strum(serialize = "global.get")]           GlobalGet           = 0x23,
  #[strum(serialize = "global.set")]           GlobalSet           = 0x24,

  // Memory //
  #[strum(serialize = "i32.load")]             I32Load             = 0x28,
  #[strum(serialize = "i64.load")]             I64Load             = 0x29,
  #[strum(serialize = "f32.load")]             F32Load             = 0x2A,
  #[strum(serialize = "f64.load")]             F64Load             = 0x2B,
  #[strum(serialize = "i32.load8_s")]          I32Load8S           = 0x2C,
  #[strum(serialize = "i32.load8_u")]          I32Load8U           = 0x2D,
  #[strum(serialize = "i32.load16_s")]         I32Load16S          = 0x2E,
  #[strum(serialize = "i32.load16_u")]         I32Load16U          = 0x2F,
  #[strum(serialize = "i64.load8_s")]          I64Load8S           = 0x30,
  #[strum(serialize = "i64.load8_u")]          I64Load8U           = 0x31,
  #[strum(serialize = "i64.load16_s")]         I64Load16S          = 0x32,
  #[strum(serialize = "i64.load16_u")]         I64Load16U          = 0x33,
  #[strum(serialize = "i64.load32_s")]         I64Load32S          = 0x34,
  #[strum(serialize = "i64.load32_u")]         I64Load32U          = 0x35,
  #[strum(serialize = "i32.store")]            I32Store            = 0x36,
  #[strum(serialize = "i64.store")]            I64Store            = 0x37,
  #[strum(serialize = "f32.store")]            F32Store            = 0x38,
  #[strum(serialize = "f64.store")]            F64Store            = 0x39,
  #[strum(serialize = "i32.store8")]           I32Store8           = 0x3A,
  #[strum(serialize = "i32.store16")]          I32Store16          = 0x3B,
  #[strum(serialize = "i64.store8")]           I64Store8           = 0x3C,
  #[strum(serialize = "i64.store16")]          I64Store16          = 0x3D,
  #[strum(serialize = "i64.store32")]          I64Store32          = 0x3E,
  #[strum(serialize = "memory.size")]          MemorySize          = 0x3F,
  #[strum(serialize = "memory.grow")]          MemoryGrow          = 0x40,

  // Constants //
  #[strum(serialize = "i32.const")]            I32Const            = 0x41,
  #[strum(serialize = "i64.const")]            I64Const            = 0x42,
  #[strum(serialize = "f32.const")]            F32Const            = 0x43,
  #[strum(serialize = "f64.const")]            F64Const            = 0x44,

  // Comparison //
  #[strum(serialize = "i32.eqz")]              I32Eqz              = 0x45,
  #[strum(serialize = "i32.eq")]               I32Eq               = 0x46,
  #[strum(serialize = "i32.ne")]               I32Ne               = 0x47,
  #[strum(serialize = "i32.lt_s")]             I32LtS              = 0x48,
  #[strum(serialize = "i32.lt_u")]             I32LtU              = 0x49,
  #[strum(serialize = "i32.gt_s")]             I32GtS              = 0x4A,
  #[strum(serialize = "i32.gt_u")]             I32GtU              = 0x4B,
  #[strum(serialize = "i32.le_s")]             I32LeS              = 0x4C,
  #[strum(serialize = "i32.le_u")]             I32LeU              = 0x4D,
  #[strum(serialize = "i32.ge_s")]             I32GeS              = 0x4E,
  #[strum(serialize = "i32.ge_u")]             I32GeU              = 0x4F,
  #[strum(serialize = "i64.eqz")]              I64Eqz              = 0x50,
  #[strum(serialize = "i64.eq")]               I64Eq               = 0x51,
  #[strum(serialize = "i64.ne")]               I64Ne               = 0x52,
  #[strum(serialize = "i64.lt_s")]             I64LtS              = 0x53,
  #[strum(serialize = "i64.lt_u")]             I64LtU              = 0x54,
  #[strum(serialize = "i64.gt_s")]             I64GtS              = 0x55,
  #[strum(serialize = "i64.gt_u")]             I64GtU              = 0x56,
  #[strum(serialize = "i64.le_s")]             I64LeS              = 0x57,
  #[strum(serialize = "i64.le_u")]             I64LeU              = 0x58,
  #[strum(serialize = "i64.ge_s")]             I64GeS              = 0x59,
  #[strum(serialize = "i64.ge_u")]             I64GeU              = 0x5A,
  #[strum(serialize = "f32.eq")]               F32Eq               = 0x5B,
  #[strum(serialize = "f32.ne")]               F32Ne               = 0x5C,
  #[strum(serialize = "f32.lt")]               F32Lt               = 0x5D,
  #[strum(serialize = "f32.gt")]               F32Gt               = 0x5E,
  #[strum(serialize = "f32.le")]               F32Le               = 0x5F,
  #[strum(serialize = "f32.ge")]               F32Ge               = 0x60,
  #[strum(serialize = "f64.eq")]               F64Eq               = 0x61,
  #[strum(serialize = "f64.ne")]               F64Ne               = 0x62,
  #[strum(serialize = "f64.lt")]               F64Lt               = 0x63,
  #[strum(serialize = "f64.gt")]               F64Gt               = 0x64,
  #[strum(serialize = "f64.le")]               F64Le               = 0x65,
  #[strum(serialize = "f64.ge")]               F64Ge               = 0x66,

  // Arithmetic //
  #[strum(serialize = "i32.clz")]              I32Clz              = 0x67,
  #[strum(serialize = "i32.ctz")]              I32Ctz              = 0x68,
  #[strum(serialize = "i32.popcnt")]           I32Popcnt           = 0x69,
  #[strum(serialize = "i32.add")]              I32Add              = 0x6A,
  #[strum(serialize = "i32.sub")]              I32Sub              = 0x6B,
  #[strum(serialize = "i32.mul")]              I32Mul              = 0x6C,
  #[strum(serialize = "i32.div_s")]            I32DivS             = 0x6D,
  #[strum(serialize = "i32.div_u")]            I32DivU             = 0x6E,
  #[strum(serialize = "i32.rem_s")]            I32RemS             = 0x6F,
  #[strum(serialize = "i32.rem_u")]            I32RemU             = 0x70,
  #[strum(serialize = "i32.and")]              I32And              = 0x71,
  #[strum(serialize = "i32.or")]               I32Or               = 0x72,
  #[strum(serialize = "i32.xor")]              I32Xor              = 0x73,
  #[strum(serialize = "i32.shl")]              I32Shl              = 0x74,
  #[strum(serialize = "i32.shr_s")]            I32ShrS             = 0x75,
  #[strum(serialize = "i32.shr_u")]            I32ShrU             = 0x76,
  #[strum(serialize = "i32.rotl")]             I32Rotl             = 0x77,
  #[strum(serialize = "i32.rotr")]             I32Rotr             = 0x78,
  #[strum(serialize = "i64.clz")]              I64Clz              = 0x79,
  #[strum(serialize = "i64.ctz")]              I64Ctz              = 0x7A,
  #[strum(serialize = "i64.popcnt")]           I64Popcnt           = 0x7B,
  #[strum(serialize = "i64.add")]              I64Add              = 0x7C,
  #[strum(serialize = "i64.sub")]              I64Sub              = 0x7D,
  #[strum(serialize = "i64.mul")]              I64Mul              = 0x7E,
  #[strum(serialize = "i64.div_s")]            I64DivS             = 0x7F,
  #[strum(serialize = "i64.div_u")]            I64DivU             = 0x80,
  #[strum(serialize = "i64.rem_s")]            I64RemS             = 0x81,
  #[strum(serialize = "i64.rem_u")]            I64RemU             = 0x82,
  #[strum(serialize = "i64.and")]              I64And              = 0x83,
  #[strum(serialize = "i64.or")]               I64Or               = 0x84,
  #[strum(serialize = "i64.xor")]              I64Xor              = 0x85,
  #[strum(serialize = "i64.shl")]              I64Shl              = 0x86,
  #[strum(serialize = "i64.shr_s")]            I64ShrS             = 0x87,
  #[strum(serialize = "i64.shr_u")]            I64ShrU             = 0x88,
  #[strum(serialize = "i64.rotl")]             I64Rotl             = 0x89,
  #[strum(serialize = "i64.rotr")]             I64Rotr             = 0x8A,
  #[strum(serialize = "f32.abs")]              F32Abs              = 0x8B,
  #[strum(serialize = "f32.neg")]              F32Neg              = 0x8C,
  #[strum(serialize = "f32.ceil")]             F32Ceil             = 0x8D,
  #[strum(serialize = "f32.floor")]            F32Floor            = 0x8E,
  #[strum(serialize = "f32.trunc")]            F32Trunc            = 0x8F,
  #[strum(serialize = "f32.nearest")]          F32Nearest          = 0x90,
  #[strum(serialize = "f32.sqrt")]             F32Sqrt             = 0x91,
  #[strum(serialize = "f32.add")]              F32Add              = 0x92,
  #[strum(serialize = "f32.sub")]              F32Sub              = 0x93,
  #[strum(serialize = "f32.mul")]              F32Mul              = 0x94,
  #[strum(serialize = "f32.div")]              F32Div              = 0x95,
  #[strum(serialize = "f32.min")]              F32Min              = 0x96,
  #[strum(serialize = "f32.max")]              F32Max              = 0x97,
  #[strum(serialize = "f32.copysign")]         F32Copysign         = 0x98,
  #[strum(serialize = "f64.abs")]              F64Abs              = 0x99,
  #[strum(serialize = "f64.neg")]              F64Neg              = 0x9A,
  #[strum(serialize = "f64.ceil")]             F64Ceil             = 0x9B,
  #[strum(serialize = "f64.floor")]            F64Floor            = 0x9C,
  #[strum(serialize = "f64.trunc")]            F64Trunc            = 0x9D,
  #[strum(serialize = "f64.nearest")]          F64Nearest          = 0x9E,
  #[strum(serialize = "f64.sqrt")]             F64Sqrt             = 0x9F,
  #[strum(serialize = "f64.add")]              F64Add              = 0xA0,
  #[strum(serialize = "f64.sub")]              F64Sub              = 0xA1,
  #[strum(serialize = "f64.mul")]              F64Mul              = 0xA2,
  #[strum(serialize = "f64.div")]              F64Div              = 0xA3,
  #[strum(serialize = "f64.min")]              F64Min              = 0xA4,
  #[strum(serialize = "f64.max")]              F64Max              = 0xA5,
  #[strum(serialize = "f64.copysign")]         F64Copysign         = 0xA6,

  // Conversion //
  #[strum(serialize = "i32.wrap_i64")]         I32WrapI64          = 0xA7,
  #[strum(serialize = "i32.trunc_f32_s")]      I32TruncF32S        = 0xA8,
  #[strum(serialize = "i32.trunc_f32_u")]      I32TruncF32U        = 0xA9,
  #[strum(serialize = "i32.trunc_f64_s")]      I32TruncF64S        = 0xAA,
  #[strum(serialize = "i32.trunc_f64_u")]      I32TruncF64U        = 0xAB,
  #[strum(serialize = "i64.extend_i32_s")]     I64ExtendI32S       = 0xAC,
  #[strum(serialize = "i64.extend_i32_u")]     I64ExtendI32U       = 0xAD,
  #[strum(serialize = "i64.trunc_f32_s")]      I64TruncF32S        = 0xAE,
  #[strum(serialize = "i64.trunc_f32_u")]      I64TruncF32U        = 0xAF,
  #[strum(serialize = "i64.trunc_f64_s")]      I64TruncF64S        = 0xB0,
  #[strum(serialize = "i64.trunc_f64_u")]      I64TruncF64U        = 0xB1,
  #[strum(serialize = "f32.convert_i32_s")]    F32ConvertI32S      = 0xB2,
  #[strum(serialize = "f32.convert_i32_u")]    F32ConvertI32U      = 0xB3,
  #[strum(serialize = "f32.convert_i64_s")]    F32ConvertI64S      = 0xB4,
  #[strum(serialize = "f32.convert_i64_u")]    F32ConvertI64U      = 0xB5,
  #[strum(serialize = "f32.demote_f64")]       F32DemoteF64        = 0xB6,
  #[strum(serialize = "f64.convert_i32_s")]    F64ConvertI32S      = 0xB7,
  #[strum(serialize = "f64.convert_i32_u")]    F64ConvertI32U      = 0xB8,
  #[strum(serialize = "f64.convert_i64_s")]    F64ConvertI64S      = 0xB9,
  #[strum(serialize = "f64.convert_i64_u")]    F64ConvertI64U      = 0xBA,
  #[strum(serialize = "f64.promote_f32")]      F64PromoteF32       = 0xBB,

  // Reinterpretation //
  #[strum(serialize = "i32.reinterpret_f32")]  I32ReinterpretF32   = 0xBC,
  #[strum(serialize = "i64.reinterpret_f64")]  I64ReinterpretF64   = 0xBD,
  #[strum(serialize = "f32.reinterpret_i32")]  F32ReinterpretI32   = 0xBE,
  #[strum(serialize = "f64.reinterpret_i64")]  F64ReinterpretI64   = 0xBF,
}

/// Value types that may appear as a block's result type.
#[derive(
  StrumDisplay, IntoStaticStr, EnumString, TryFromPrimitive, IntoPrimitive,
  Clone,        Copy,          Eq,         PartialEq,        Debug,         Hash
)]
#[repr(u8)]
pub enum ValueType {
  #[strum(serialize = "i32")] I32 = 0x7F,
  #[strum(serialize = "i64")] I64 = 0x7E,
  #[strum(serialize = "f32")] F32 = 0x7D,
  #[strum(serialize = "f64")] F64 = 0x7C,
}

impl ValueType {
  pub fn code(&self) -> u8 {
    Into::<u8>::into(*self)
  }
}

impl Opcode {
  pub fn code(&self) -> u8 {
    Into::<u8>::into(*self)
  }

  pub fn mnemonic(&self) -> &'static str {
    self.into()
  }

  pub fn is_memory_access(&self) -> bool {
    (FIRST_MEMORY_ACCESS_OPCODE..=LAST_MEMORY_ACCESS_OPCODE).contains(&self.code())
  }

  /// The shape of the immediate operands following this opcode, if it has any.
  pub fn immediate_kind(&self) -> Option<ImmediateKind> {
    match self {
      | Opcode::Block
      | Opcode::Loop
      | Opcode::If           => Some(ImmediateKind::BlockType),

      | Opcode::Br
      | Opcode::BrIf         => Some(ImmediateKind::BranchTarget),

      Opcode::BrTable        => Some(ImmediateKind::BranchTable),
      Opcode::Call           => Some(ImmediateKind::CallTarget),
      Opcode::CallIndirect   => Some(ImmediateKind::CallIndirectTarget),

      | Opcode::LocalGet
      | Opcode::LocalSet
      | Opcode::LocalTee
      | Opcode::GlobalGet
      | Opcode::GlobalSet    => Some(ImmediateKind::LocalOrGlobalIndex),

      | Opcode::MemorySize
      | Opcode::MemoryGrow   => Some(ImmediateKind::MemorySize),

      Opcode::I32Const       => Some(ImmediateKind::ConstI32),
      Opcode::I64Const       => Some(ImmediateKind::ConstI64),
      Opcode::F32Const       => Some(ImmediateKind::ConstF32),
      Opcode::F64Const       => Some(ImmediateKind::ConstF64),

      _ if self.is_memory_access() => Some(ImmediateKind::MemoryAccess),

      _                      => None
    }
  }

  pub fn flags(&self) -> InsnFlags {
    match self {
      | Opcode::Unreachable
      | Opcode::Return       => InsnFlags::NO_FALLTHROUGH,

      | Opcode::Block
      | Opcode::Loop
      | Opcode::If           => InsnFlags::ENTERS_BLOCK,

      Opcode::Else           => InsnFlags::ENTERS_BLOCK | InsnFlags::LEAVES_BLOCK,
      Opcode::End            => InsnFlags::LEAVES_BLOCK,

      | Opcode::Br
      | Opcode::BrIf
      | Opcode::BrTable
      | Opcode::Call
      | Opcode::CallIndirect => InsnFlags::IS_BRANCH,

      _                      => InsnFlags::NONE
    }
  }

  /// The kind of block frame this opcode opens.
  pub fn block_kind(&self) -> Option<BlockKind> {
    match self {
      Opcode::Block => Some(BlockKind::Block),
      Opcode::Loop  => Some(BlockKind::Loop),
      Opcode::If    => Some(BlockKind::If),
      _             => None
    }
  }

  /// The descriptor of this opcode in the standard registry.
  pub fn descriptor(&self) -> &'static InstructionDescriptor {
    match standard_registry().lookup(self.code()) {
      Ok(descriptor) => descriptor,
      Err(e) => unreachable!("Error: The standard registry is missing {}: {}", self, e)
    }
  }
}
