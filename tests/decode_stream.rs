use wasmdecode::{
  assemble, decode_all, BlockType, BlockViolation, DecodeError, DecodeOptions, Decoder, Immediate,
  MemArg, ValueType, VarintReason
};

const FACTORIAL: &str = "
  ;; n! for n in local 0
  local.get 0
  i64.eqz
  if i64
    i64.const 1
  else
    local.get 0
    local.get 0
    i64.const 1
    i64.sub
    call 0
    i64.mul
  end
  end
";

#[test]
fn assembled_function_body(){
  let code = assemble(FACTORIAL).unwrap();
  let decoder = Decoder::with_options(&code, DecodeOptions::function_body());
  let instructions: Vec<_> = decoder.collect::<Result<_, _>>().unwrap();

  let mnemonics: Vec<&str> = instructions.iter().map(|i| i.mnemonic()).collect();
  assert_eq!(
    mnemonics,
    vec![
      "local.get", "i64.eqz", "if", "i64.const", "else", "local.get", "local.get", "i64.const",
      "i64.sub", "call", "i64.mul", "end", "end",
    ]
  );
  assert_eq!(instructions[2].immediate, Some(Immediate::BlockType(BlockType::Value(ValueType::I64))));
  assert_eq!(instructions[9].immediate, Some(Immediate::CallTarget(0)));

  let depths: Vec<usize> = instructions.iter().map(|i| i.depth).collect();
  assert_eq!(depths, vec![1, 1, 1, 2, 1, 2, 2, 2, 2, 2, 2, 1, 0]);

  let offsets: Vec<usize> = instructions.iter().map(|i| i.offset).collect();
  assert!(offsets.windows(2).all(|pair| pair[0] < pair[1]));
  assert_eq!(offsets.last(), Some(&(code.len() - 1)));
}

#[test]
fn decoded_immediates_re_encode(){
  let text = "
    block f32
      f32.const 0.5
      br_table 2 0 1
      i32.load8_u 0 16
      call_indirect 7
      memory.size
      drop
    end
  ";
  let code = assemble(text).unwrap();
  let mut reencoded = Vec::new();
  for instruction in decode_all(&code) {
    let instruction = instruction.unwrap();
    reencoded.push(instruction.opcode);
    if let Some(immediate) = &instruction.immediate {
      immediate.encode(&mut reencoded);
    }
  }
  assert_eq!(reencoded, code);
}

#[test]
fn constant_then_stray_end(){
  let results: Vec<_> = decode_all(&[0x41, 0x05, 0x0B]).collect();
  assert_eq!(results.len(), 2);
  assert_eq!(results[0].as_ref().map(|i| i.immediate.clone()), Ok(Some(Immediate::ConstI32(5))));
  assert_eq!(
    results[1],
    Err(DecodeError::MalformedBlockStructure(2, BlockViolation::UnmatchedEnd))
  );
}

#[test]
fn call_target_and_truncation(){
  let results: Vec<_> = decode_all(&[0x10, 0x80, 0x01]).collect();
  assert_eq!(results.len(), 1);
  assert_eq!(results[0].as_ref().map(|i| i.immediate.clone()), Ok(Some(Immediate::CallTarget(128))));

  let results: Vec<_> = decode_all(&[0x10]).collect();
  assert_eq!(results, vec![Err(DecodeError::UnexpectedEndOfStream(1))]);
}

#[test]
fn overlong_index(){
  // Six bytes cannot hold a 32 bit index.
  let results: Vec<_> = decode_all(&[0x20, 0x80, 0x80, 0x80, 0x80, 0x80, 0x00]).collect();
  assert_eq!(
    results,
    vec![Err(DecodeError::MalformedVarint(1, VarintReason::TooLong { max_bits: 32 }))]
  );
}

#[test]
fn memory_access_operands(){
  let results: Vec<_> = decode_all(&[0x28, 0x02, 0x00]).collect();
  assert_eq!(
    results[0].as_ref().map(|i| i.immediate.clone()),
    Ok(Some(Immediate::MemoryAccess(MemArg { align: 2, offset: 0 })))
  );
}

#[test]
fn block_without_signature_byte_is_rejected(){
  // `block` always reads a signature byte, so `nop` cannot follow the opcode directly: 0x01 is
  // taken as the signature and rejected. With the empty signature the same stream decodes.
  let results: Vec<_> = decode_all(&[0x02, 0x01, 0x0B]).collect();
  assert_eq!(results, vec![Err(DecodeError::InvalidBlockType(0x01, 1))]);

  let instructions: Vec<_> = decode_all(&[0x02, 0x40, 0x01, 0x0B]).collect::<Result<_, _>>().unwrap();
  assert_eq!(instructions.len(), 3);
}

#[test]
fn error_messages(){
  let error = decode_all(&[0xFF]).next().unwrap().unwrap_err();
  assert_eq!(error.offset(), 0);
  assert_eq!(error.to_string(), "unknown opcode 0xff at offset 0");
}
