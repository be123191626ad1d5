/*!
  The instruction stream decoder. A `Decoder` walks a raw instruction stream one instruction per
  step:

    ```text
    opcode byte -> [`OpcodeRegistry::lookup`] -> descriptor ->⋯

    ⋯-> [`decode_immediate`] -> immediate -> [`BlockTracker::update`] -> `DecodedInstruction`
    ```

  As an `Iterator` it is lazy and yields `Result`s. The first error is yielded once and ends the
  sequence; everything yielded before it stays valid. A decoder is not restartable, but any number
  of decoders may run over the same buffer (and share one registry) independently.
*/

use std::iter::FusedIterator;

use tracing::debug;
#[cfg(feature = "trace_decoding")]
use tracing::trace;

use crate::blocks::{BlockEvent, BlockFrame, BlockKind, BlockTracker};
use crate::bytecode::{
  decode_immediate, standard_registry, Immediate, InsnFlags, InstructionDescriptor, OpcodeRegistry
};
use crate::cursor::ByteCursor;
use crate::error::{BlockViolation, DecodeError};

/// How the end of a stream is recognized.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
pub enum StreamMode {
  /// A bare run of instructions. The stream ends with the buffer, which must not leave any
  /// block open.
  #[default]
  Bare,
  /// A function body. An implicit outermost frame is open from the start, the stream ends at the
  /// `end` that closes it, and no bytes may follow that `end`.
  FunctionBody,
}

#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
pub struct DecodeOptions {
  pub mode: StreamMode,
}

impl DecodeOptions {
  pub fn function_body() -> DecodeOptions {
    DecodeOptions {
      mode: StreamMode::FunctionBody
    }
  }
}

/// One decoded instruction. Owned by the consumer; the decoder keeps nothing of it.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct DecodedInstruction<'r> {
  /// Offset of the opcode byte.
  pub offset     :  usize,
  pub opcode     :  u8,
  pub descriptor :  &'r InstructionDescriptor,
  /// Present exactly when the descriptor declares an immediate kind, and of that kind.
  pub immediate  :  Option<Immediate>,
  /// Number of enclosing open blocks. An `else` or `end` sits at the depth of its opener.
  pub depth      :  usize,
  /// False if an earlier `NO_FALLTHROUGH` instruction in the same arm makes this one dead.
  pub reachable  :  bool,
}

impl<'r> DecodedInstruction<'r> {
  pub fn mnemonic(&self) -> &'static str {
    self.descriptor.mnemonic
  }

  pub fn flags(&self) -> InsnFlags {
    self.descriptor.flags
  }
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
enum State {
  Running,
  /// The implicit function frame has been closed.
  BodyClosed,
  Failed(DecodeError),
}

#[derive(Debug)]
pub struct Decoder<'a, 'r> {
  cursor   : ByteCursor<'a>,
  registry : &'r OpcodeRegistry,
  tracker  : BlockTracker,
  state    : State,
}

/// Decodes `buffer` as a bare instruction stream against the standard registry.
pub fn decode_all(buffer: &[u8]) -> Decoder<'_, 'static> {
  Decoder::new(buffer)
}

impl<'a> Decoder<'a, 'static> {

  pub fn new(buffer: &'a [u8]) -> Decoder<'a, 'static> {
    Decoder::with_registry(buffer, standard_registry(), DecodeOptions::default())
  }

  pub fn with_options(buffer: &'a [u8], options: DecodeOptions) -> Decoder<'a, 'static> {
    Decoder::with_registry(buffer, standard_registry(), options)
  }

}

impl<'a, 'r> Decoder<'a, 'r> {

  pub fn with_registry(buffer: &'a [u8], registry: &'r OpcodeRegistry, options: DecodeOptions)
    -> Decoder<'a, 'r>
  {
    let tracker = match options.mode {
      StreamMode::Bare         => BlockTracker::new(),
      StreamMode::FunctionBody => BlockTracker::for_function_body()
    };
    Decoder {
      cursor: ByteCursor::new(buffer),
      registry,
      tracker,
      state: State::Running
    }
  }

  /// Offset of the next opcode byte.
  pub fn offset(&self) -> usize {
    self.cursor.position()
  }

  pub fn tracker(&self) -> &BlockTracker {
    &self.tracker
  }

  pub fn block_depth(&self) -> usize {
    self.tracker.depth()
  }

  /// True once the iterator has nothing more to yield.
  pub fn is_finished(&self) -> bool {
    match self.state {
      State::Failed(_)  => true,
      State::BodyClosed => self.cursor.is_empty(),
      State::Running    => self.cursor.is_empty() && self.tracker.is_empty()
    }
  }

  /**
    Decodes exactly one instruction. Fails with `UnexpectedEndOfStream` if no opcode byte is left.
    After a failure every further call returns the same error.
  */
  pub fn step(&mut self) -> Result<DecodedInstruction<'r>, DecodeError> {
    if let State::Failed(e) = self.state {
      return Err(e);
    }
    let result = self.decode_next();
    if let Err(e) = result {
      debug!(offset = e.offset(), error = %e, "decoding stopped");
      self.state = State::Failed(e);
    }
    result
  }

  fn decode_next(&mut self) -> Result<DecodedInstruction<'r>, DecodeError> {
    let offset = self.cursor.position();

    if self.state == State::BodyClosed && !self.cursor.is_empty() {
      return Err(DecodeError::MalformedBlockStructure(offset, BlockViolation::TrailingBytes));
    }

    let registry = self.registry;
    let opcode = self.cursor.read_byte()?;
    let descriptor = registry.lookup(opcode).map_err(|e| e.at(offset))?;

    let immediate = match descriptor.immediate {
      Some(kind) => Some(decode_immediate(kind, &mut self.cursor)?),
      None       => None
    };

    let reachable = !self.tracker.is_unreachable();
    let depth = match descriptor.flags.leaves_block() {
      true  => self.tracker.depth().saturating_sub(1),
      false => self.tracker.depth()
    };

    let event = self.tracker.update(descriptor, offset)?;
    if let BlockEvent::Left(BlockFrame { kind: BlockKind::Function, .. }) = event {
      self.state = State::BodyClosed;
    }

    #[cfg(feature = "trace_decoding")]
    match &immediate {
      Some(immediate) => trace!(offset, depth, "{} {}", descriptor.mnemonic, immediate),
      None            => trace!(offset, depth, "{}", descriptor.mnemonic)
    }

    Ok(DecodedInstruction {
      offset,
      opcode,
      descriptor,
      immediate,
      depth,
      reachable
    })
  }
}

impl<'a, 'r> Iterator for Decoder<'a, 'r> {
  type Item = Result<DecodedInstruction<'r>, DecodeError>;

  fn next(&mut self) -> Option<Self::Item> {
    match self.is_finished() {
      true  => None,
      false => Some(self.step())
    }
  }
}

impl<'a, 'r> FusedIterator for Decoder<'a, 'r> {}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::bytecode::{BlockType, InsnFlags, MemArg};

  fn decode_ok(buffer: &[u8]) -> Vec<DecodedInstruction<'static>> {
    decode_all(buffer).collect::<Result<Vec<_>, _>>().unwrap()
  }

  #[test]
  fn standalone_end_is_malformed(){
    let mut decoder = decode_all(&[0x41, 0x05, 0x0B]);

    let first = decoder.next().unwrap().unwrap();
    assert_eq!(first.offset, 0);
    assert_eq!(first.opcode, 0x41);
    assert_eq!(first.mnemonic(), "i32.const");
    assert_eq!(first.immediate, Some(Immediate::ConstI32(5)));

    assert_eq!(
      decoder.next(),
      Some(Err(DecodeError::MalformedBlockStructure(2, BlockViolation::UnmatchedEnd)))
    );
    assert_eq!(decoder.next(), None);
  }

  #[test]
  fn block_nop_end(){
    let mut decoder = decode_all(&[0x02, 0x40, 0x01, 0x0B]);
    let instructions: Vec<_> = decoder.by_ref().collect::<Result<_, _>>().unwrap();
    assert_eq!(instructions.len(), 3);
    assert_eq!(
      instructions.iter().map(|i| i.mnemonic()).collect::<Vec<_>>(),
      vec!["block", "nop", "end"]
    );
    assert_eq!(instructions[0].immediate, Some(Immediate::BlockType(BlockType::Empty)));
    assert_eq!(instructions.iter().map(|i| i.depth).collect::<Vec<_>>(), vec![0, 1, 0]);
    assert_eq!(decoder.block_depth(), 0);
    assert!(decoder.is_finished());
  }

  #[test]
  fn call_with_two_byte_index(){
    let instructions = decode_ok(&[0x10, 0x80, 0x01]);
    assert_eq!(instructions.len(), 1);
    assert_eq!(instructions[0].immediate, Some(Immediate::CallTarget(128)));
    assert!(instructions[0].flags().is_branch());
  }

  #[test]
  fn truncated_immediate(){
    let mut decoder = decode_all(&[0x01, 0x10]);
    assert!(decoder.next().unwrap().is_ok());
    assert_eq!(decoder.next(), Some(Err(DecodeError::UnexpectedEndOfStream(2))));
    assert_eq!(decoder.next(), None);
  }

  #[test]
  fn unknown_opcode(){
    let results: Vec<_> = decode_all(&[0x01, 0x06, 0x01]).collect();
    assert_eq!(results.len(), 2);
    assert_eq!(results[1], Err(DecodeError::UnknownOpcode(0x06, 1)));
  }

  #[test]
  fn open_block_at_end_of_stream(){
    let results: Vec<_> = decode_all(&[0x02, 0x40, 0x03, 0x40, 0x0B]).collect();
    assert_eq!(results.len(), 4);
    assert_eq!(results[3], Err(DecodeError::UnexpectedEndOfStream(5)));
  }

  #[test]
  fn empty_stream(){
    assert_eq!(decode_all(&[]).count(), 0);
    let mut decoder = decode_all(&[]);
    assert_eq!(decoder.step(), Err(DecodeError::UnexpectedEndOfStream(0)));
  }

  #[test]
  fn step_after_failure_repeats_error(){
    let mut decoder = decode_all(&[0xFF, 0x01]);
    assert_eq!(decoder.step(), Err(DecodeError::UnknownOpcode(0xFF, 0)));
    assert_eq!(decoder.step(), Err(DecodeError::UnknownOpcode(0xFF, 0)));
    assert!(decoder.is_finished());
  }

  #[test]
  fn offsets_strictly_increase(){
    let buffer = [
      0x41, 0xFF, 0x00,                         // i32.const 127
      0x44, 0, 0, 0, 0, 0, 0, 0xF0, 0x3F,       // f64.const 1
      0x28, 0x02, 0x08,                         // i32.load 2 8
      0x0E, 0x02, 0x00, 0x01, 0x00,             // br_table 0 1 0
      0x1A,                                     // drop
    ];
    let instructions = decode_ok(&buffer);
    let offsets: Vec<usize> = instructions.iter().map(|i| i.offset).collect();
    assert_eq!(offsets, vec![0, 3, 12, 15, 20]);
    assert_eq!(
      instructions[2].immediate,
      Some(Immediate::MemoryAccess(MemArg { align: 2, offset: 8 }))
    );
  }

  #[test]
  fn immediate_matches_descriptor(){
    let buffer = [0x02, 0x7F, 0x20, 0x00, 0x0D, 0x00, 0x3F, 0x00, 0x0B, 0x0F];
    for instruction in decode_ok(&buffer) {
      assert_eq!(
        instruction.immediate.as_ref().map(Immediate::kind),
        instruction.descriptor.immediate
      );
    }
  }

  #[test]
  fn reachability_marks(){
    // block; return; nop; end; nop
    let instructions = decode_ok(&[0x02, 0x40, 0x0F, 0x01, 0x0B, 0x01]);
    let reachable: Vec<bool> = instructions.iter().map(|i| i.reachable).collect();
    assert_eq!(reachable, vec![true, true, false, false, true]);
  }

  #[test]
  fn dead_code_survives_nested_block(){
    // block; return; block; nop; end; nop; end
    let instructions = decode_ok(&[0x02, 0x40, 0x0F, 0x02, 0x40, 0x01, 0x0B, 0x01, 0x0B]);
    let reachable: Vec<(usize, bool)> = instructions.iter().map(|i| (i.offset, i.reachable)).collect();
    assert_eq!(
      reachable,
      vec![(0, true), (2, true), (3, false), (5, true), (6, true), (7, false), (8, false)]
    );
  }

  #[test]
  fn if_else_depths(){
    // if; nop; else; nop; end
    let instructions = decode_ok(&[0x04, 0x40, 0x01, 0x05, 0x01, 0x0B]);
    let depths: Vec<usize> = instructions.iter().map(|i| i.depth).collect();
    assert_eq!(depths, vec![0, 1, 0, 1, 0]);
    assert_eq!(
      instructions[2].flags(),
      InsnFlags::ENTERS_BLOCK | InsnFlags::LEAVES_BLOCK
    );
  }

  #[test]
  fn bare_stream_continues_after_balance(){
    let instructions = decode_ok(&[0x02, 0x40, 0x0B, 0x01]);
    assert_eq!(instructions.len(), 3);
  }

  #[test]
  fn function_body(){
    // nop; block; end; end
    let buffer = [0x01, 0x02, 0x40, 0x0B, 0x0B];
    let mut decoder = Decoder::with_options(&buffer, DecodeOptions::function_body());
    let instructions: Vec<_> = decoder.by_ref().collect::<Result<_, _>>().unwrap();
    assert_eq!(instructions.len(), 4);
    assert_eq!(instructions.iter().map(|i| i.depth).collect::<Vec<_>>(), vec![1, 1, 1, 0]);
    assert!(decoder.is_finished());
    assert_eq!(decoder.block_depth(), 0);
  }

  #[test]
  fn function_body_trailing_bytes(){
    let buffer = [0x0B, 0x01];
    let results: Vec<_> = Decoder::with_options(&buffer, DecodeOptions::function_body()).collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert_eq!(
      results[1],
      Err(DecodeError::MalformedBlockStructure(1, BlockViolation::TrailingBytes))
    );
  }

  #[test]
  fn function_body_without_end(){
    let buffer = [0x01];
    let results: Vec<_> = Decoder::with_options(&buffer, DecodeOptions::function_body()).collect();
    assert_eq!(results[1], Err(DecodeError::UnexpectedEndOfStream(1)));
  }

  #[test]
  fn custom_registry(){
    let nop = InstructionDescriptor {
      opcode     : 0xAA,
      mnemonic   : "nop",
      immediate  : None,
      flags      : InsnFlags::NONE,
      block_kind : None,
    };
    let registry = OpcodeRegistry::new(vec![nop]).unwrap();
    let buffer = [0xAA, 0x01];
    let results: Vec<_> =
      Decoder::with_registry(&buffer, &registry, DecodeOptions::default()).collect();
    assert_eq!(results[0].as_ref().map(|i| i.mnemonic()), Ok("nop"));
    assert_eq!(results[1], Err(DecodeError::UnknownOpcode(0x01, 1)));
  }

  #[test]
  fn independent_decoders(){
    let buffer = [0x01, 0x01, 0x01];
    let mut first = decode_all(&buffer);
    let mut second = decode_all(&buffer);
    first.next();
    first.next();
    assert_eq!(second.next().unwrap().map(|i| i.offset), Ok(0));
    assert_eq!(first.next().unwrap().map(|i| i.offset), Ok(2));
  }
}
