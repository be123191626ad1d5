use std::fmt::{Display, Formatter};
use std::ops::BitOr;

use strum_macros::{Display as StrumDisplay, IntoStaticStr};

use super::Opcode;
use crate::blocks::BlockKind;

/// Selects the routine that decodes an instruction's immediate operands.
#[derive(StrumDisplay, IntoStaticStr, Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum ImmediateKind {
  BlockType,
  BranchTarget,
  BranchTable,
  CallTarget,
  CallIndirectTarget,
  LocalOrGlobalIndex,
  MemoryAccess,
  MemorySize,
  ConstI32,
  ConstI64,
  ConstF32,
  ConstF64,
}

/**
  Control-flow metadata of an instruction. The flags are not exclusive: `else` both leaves the
  `if` arm and enters the `else` arm, so it carries `ENTERS_BLOCK | LEAVES_BLOCK`. The block
  tracker relies on that combination rather than on the mnemonic.
*/
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash, Default)]
pub struct InsnFlags(u8);

impl InsnFlags {
  pub const NONE           : InsnFlags = InsnFlags(0);
  pub const ENTERS_BLOCK   : InsnFlags = InsnFlags(1 << 0);
  pub const LEAVES_BLOCK   : InsnFlags = InsnFlags(1 << 1);
  pub const IS_BRANCH      : InsnFlags = InsnFlags(1 << 2);
  /// Control never passes to the next instruction.
  pub const NO_FALLTHROUGH : InsnFlags = InsnFlags(1 << 3);

  pub fn bits(&self) -> u8 {
    self.0
  }

  pub fn contains(&self, other: InsnFlags) -> bool {
    self.0 & other.0 == other.0
  }

  pub fn is_empty(&self) -> bool {
    self.0 == 0
  }

  pub fn enters_block(&self) -> bool {
    self.contains(InsnFlags::ENTERS_BLOCK)
  }

  pub fn leaves_block(&self) -> bool {
    self.contains(InsnFlags::LEAVES_BLOCK)
  }

  pub fn is_branch(&self) -> bool {
    self.contains(InsnFlags::IS_BRANCH)
  }

  pub fn no_fallthrough(&self) -> bool {
    self.contains(InsnFlags::NO_FALLTHROUGH)
  }
}

impl BitOr for InsnFlags {
  type Output = InsnFlags;
  fn bitor(self, rhs: InsnFlags) -> InsnFlags {
    InsnFlags(self.0 | rhs.0)
  }
}

impl Display for InsnFlags {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let names: Vec<&str> =
      [
        (InsnFlags::ENTERS_BLOCK,   "enter"),
        (InsnFlags::LEAVES_BLOCK,   "leave"),
        (InsnFlags::IS_BRANCH,      "branch"),
        (InsnFlags::NO_FALLTHROUGH, "no-flow"),
      ]
        .iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| *name)
        .collect();
    write!(f, "{}", names.join("|"))
  }
}

/// Everything the decoder needs to know about one opcode.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct InstructionDescriptor {
  pub opcode     :  u8,
  pub mnemonic   :  &'static str,
  pub immediate  :  Option<ImmediateKind>,
  pub flags      :  InsnFlags,
  /// The frame kind pushed when this instruction enters a block.
  pub block_kind :  Option<BlockKind>,
}

impl From<Opcode> for InstructionDescriptor {
  fn from(opcode: Opcode) -> Self {
    InstructionDescriptor {
      opcode     :  opcode.code(),
      mnemonic   :  opcode.mnemonic(),
      immediate  :  opcode.immediate_kind(),
      flags      :  opcode.flags(),
      block_kind :  opcode.block_kind(),
    }
  }
}

impl Display for InstructionDescriptor {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{:#04x} {}", self.opcode, self.mnemonic)
  }
}
