/*!
  Decoding of WebAssembly instruction streams.

  A `Decoder` turns a byte buffer of instructions into a lazy sequence of `DecodedInstruction`s,
  each carrying its offset, its opcode's `InstructionDescriptor`, its typed `Immediate` operands,
  and its block nesting depth. Malformed input of any kind ends the sequence with a `DecodeError`
  that names the offending offset.

  ```
  use wasmdecode::{decode_all, Immediate};

  let instructions: Vec<_> = decode_all(&[0x41, 0x05, 0x1A]).collect::<Result<_, _>>().unwrap();
  assert_eq!(instructions[0].mnemonic(), "i32.const");
  assert_eq!(instructions[0].immediate, Some(Immediate::ConstI32(5)));
  ```

  The instruction set itself lives in `bytecode`: the `Opcode` table, the `OpcodeRegistry` built
  from it, immediate decoding and encoding, and a small line based assembler used to write test
  streams by hand.
*/

pub mod blocks;
pub mod bytecode;
pub mod cursor;
pub mod decoder;
pub mod error;
pub mod varint;

pub use blocks::{BlockEvent, BlockFrame, BlockKind, BlockTracker};
pub use bytecode::{
  assemble, standard_registry, BlockType, Immediate, ImmediateKind, InsnFlags,
  InstructionDescriptor, MemArg, Opcode, OpcodeRegistry, ValueType
};
pub use decoder::{decode_all, DecodeOptions, DecodedInstruction, Decoder, StreamMode};
pub use error::{BlockViolation, DecodeError, VarintReason};
pub use varint::{Ieee32, Ieee64};
