/*!
  Encoding of single instructions into bytecode, the inverse of the decoder.
*/

use super::{Immediate, Opcode};

/**
  Appends the opcode byte followed by the encoded immediate to `out`. It is the caller's
  responsibility to pass an immediate of the kind the opcode declares, or none if it declares none.
*/
pub fn encode_instruction(opcode: Opcode, immediate: Option<&Immediate>, out: &mut Vec<u8>) {
  debug_assert_eq!(opcode.immediate_kind(), immediate.map(Immediate::kind));
  out.push(opcode.code());
  if let Some(immediate) = immediate {
    immediate.encode(out);
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::bytecode::{BlockType, MemArg};

  #[test]
  fn encode_instructions(){
    let mut code = Vec::new();
    encode_instruction(Opcode::Block, Some(&Immediate::BlockType(BlockType::Empty)), &mut code);
    encode_instruction(Opcode::Call, Some(&Immediate::CallTarget(128)), &mut code);
    encode_instruction(
      Opcode::I32Store,
      Some(&Immediate::MemoryAccess(MemArg { align: 2, offset: 4 })),
      &mut code
    );
    encode_instruction(Opcode::End, None, &mut code);
    assert_eq!(code, vec![0x02, 0x40, 0x10, 0x80, 0x01, 0x36, 0x02, 0x04, 0x0B]);
  }
}
