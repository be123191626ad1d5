/*!
  Block-nesting bookkeeping. The tracker is a stack machine driven purely by an instruction's
  control-flow flags:

    ```text
    ENTERS_BLOCK                 push a frame
    ENTERS_BLOCK | LEAVES_BLOCK  switch the top `if` frame to its `else` arm
    LEAVES_BLOCK                 pop a frame
    NO_FALLTHROUGH               the rest of the current arm is unreachable
    IS_BRANCH                    no stack action
    ```

  Mnemonics never enter into it, so any future opcode that shares an existing flag combination is
  tracked correctly without changes here.
*/

use std::fmt::{Display, Formatter};

use strum_macros::{Display as StrumDisplay, IntoStaticStr};
use tracing::debug;

use crate::bytecode::InstructionDescriptor;
use crate::error::{BlockViolation, DecodeError};

#[derive(StrumDisplay, IntoStaticStr, Clone, Copy, Eq, PartialEq, Debug, Hash)]
#[strum(serialize_all = "lowercase")]
pub enum BlockKind {
  Block,
  Loop,
  If,
  /// The implicit outermost frame of a function body.
  Function,
}

impl BlockKind {
  /// Only an `if` frame has a second arm.
  pub fn accepts_else(&self) -> bool {
    *self == BlockKind::If
  }
}

#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub struct BlockFrame {
  /// Offset of the instruction that opened the frame.
  pub offset  :  usize,
  pub kind    :  BlockKind,
  /// Set once an `if` frame has seen its `else`.
  pub in_else :  bool,
}

impl Display for BlockFrame {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self.in_else {
      true  => write!(f, "{}/else@{}", self.kind, self.offset),
      false => write!(f, "{}@{}", self.kind, self.offset)
    }
  }
}

/// What an instruction did to the block stack.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum BlockEvent {
  Continue,
  Entered(BlockFrame),
  /// An `if` frame moved to its `else` arm.
  Switched(BlockFrame),
  /// The frame closed by an `end`.
  Left(BlockFrame),
}

#[derive(Clone, Debug, Default)]
pub struct BlockTracker {
  frames      : Vec<BlockFrame>,
  /// Reachability of each enclosing arm, saved when the matching frame was pushed.
  enclosing   : Vec<bool>,
  unreachable : bool,
}

impl BlockTracker {

  pub fn new() -> BlockTracker {
    BlockTracker::default()
  }

  /// A tracker whose stack starts with the implicit frame of a function body at offset zero.
  pub fn for_function_body() -> BlockTracker {
    BlockTracker {
      frames      : vec![BlockFrame { offset: 0, kind: BlockKind::Function, in_else: false }],
      enclosing   : vec![false],
      unreachable : false
    }
  }

  pub fn depth(&self) -> usize {
    self.frames.len()
  }

  pub fn is_empty(&self) -> bool {
    self.frames.is_empty()
  }

  /// Innermost open frame.
  pub fn top(&self) -> Option<&BlockFrame> {
    self.frames.last()
  }

  /// Open frames, outermost first.
  pub fn frames(&self) -> &[BlockFrame] {
    &self.frames
  }

  /// True after a `NO_FALLTHROUGH` instruction until the current arm ends. Closing a block
  /// returns to the state of the arm that contains it.
  pub fn is_unreachable(&self) -> bool {
    self.unreachable
  }

  /**
    Feeds one instruction, read at `offset`, through the state machine. On error the stack is
    left as it was before the call.
  */
  pub fn update(&mut self, descriptor: &InstructionDescriptor, offset: usize)
    -> Result<BlockEvent, DecodeError>
  {
    let flags = descriptor.flags;

    let event =
      match (flags.enters_block(), flags.leaves_block()) {

        (true, false) => {
          let frame = BlockFrame {
            offset,
            kind    : descriptor.block_kind.unwrap_or(BlockKind::Block),
            in_else : false
          };
          self.frames.push(frame);
          self.enclosing.push(self.unreachable);
          self.unreachable = false;
          debug!(offset, depth = self.frames.len(), "entered {}", frame);
          BlockEvent::Entered(frame)
        }

        (true, true) => {
          let top = match self.frames.last_mut() {
            Some(top) if top.kind.accepts_else() => top,
            _ => {
              return Err(DecodeError::MalformedBlockStructure(offset, BlockViolation::ElseWithoutIf));
            }
          };
          if top.in_else {
            return Err(DecodeError::MalformedBlockStructure(offset, BlockViolation::DuplicateElse));
          }
          top.in_else = true;
          let frame = *top;
          self.unreachable = false;
          debug!(offset, "switched {}", frame);
          BlockEvent::Switched(frame)
        }

        (false, true) => {
          match self.frames.pop() {
            Some(frame) => {
              self.unreachable = self.enclosing.pop().unwrap_or(false);
              debug!(offset, depth = self.frames.len(), "left {}", frame);
              BlockEvent::Left(frame)
            }
            None => {
              return Err(DecodeError::MalformedBlockStructure(offset, BlockViolation::UnmatchedEnd));
            }
          }
        }

        (false, false) => BlockEvent::Continue

      }; // end match on block flags

    if flags.no_fallthrough() {
      self.unreachable = true;
    }

    Ok(event)
  }
}
