/*!
  The variable-length integer codec. Integers are little-endian base 128: each byte contributes its
  low seven bits and a set high bit means another byte follows. Floating point values are raw
  little-endian IEEE-754 and are carried as bit patterns, so NaN payloads survive a round trip.

  The decoder is not canonical-only. An over-long encoding (say `0x80 0x00` for zero) is accepted
  as long as it fits in `ceil(max_bits / 7)` bytes and sets no bits beyond `max_bits`. The
  encoders always emit the minimal form.
*/

use std::fmt::{Display, Formatter};

use crate::cursor::ByteCursor;
use crate::error::{DecodeError, VarintReason};

const CONTINUATION : u8 = 0x80;
const SIGN         : u8 = 0x40;
const PAYLOAD      : u8 = 0x7F;

/// Bit pattern of a 32 bit IEEE-754 value. Equality is bitwise, so `NaN == NaN` here.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub struct Ieee32(pub u32);

/// Bit pattern of a 64 bit IEEE-754 value. Equality is bitwise, so `NaN == NaN` here.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub struct Ieee64(pub u64);

impl Ieee32 {
  pub fn bits(&self) -> u32 {
    self.0
  }

  pub fn value(&self) -> f32 {
    f32::from_bits(self.0)
  }
}

impl Ieee64 {
  pub fn bits(&self) -> u64 {
    self.0
  }

  pub fn value(&self) -> f64 {
    f64::from_bits(self.0)
  }
}

impl From<f32> for Ieee32 {
  fn from(value: f32) -> Self {
    Ieee32(value.to_bits())
  }
}

impl From<f64> for Ieee64 {
  fn from(value: f64) -> Self {
    Ieee64(value.to_bits())
  }
}

impl Display for Ieee32 {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.value())
  }
}

impl Display for Ieee64 {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.value())
  }
}

// region Decoding

/**
  Decodes an unsigned varint of at most `max_bits` bits (1 to 64).

  Fails with `MalformedVarint` if the encoding runs past `ceil(max_bits / 7)` bytes or its terminal
  byte sets a bit above `max_bits`, and with `UnexpectedEndOfStream` if the buffer ends before a
  byte with the continuation bit clear.
*/
pub fn read_unsigned(cursor: &mut ByteCursor, max_bits: u32) -> Result<u64, DecodeError> {
  debug_assert!(max_bits >= 1 && max_bits <= 64);
  let start = cursor.position();
  let mut result: u64 = 0;
  let mut shift: u32 = 0;

  loop {
    let byte = cursor.read_byte()?;
    let payload = (byte & PAYLOAD) as u64;
    let bits_left = max_bits - shift;

    if bits_left <= 7 {
      // Last byte the width permits.
      if byte & CONTINUATION != 0 {
        return Err(DecodeError::MalformedVarint(start, VarintReason::TooLong { max_bits }));
      }
      if bits_left < 7 && payload >> bits_left != 0 {
        return Err(DecodeError::MalformedVarint(start, VarintReason::Overflow { max_bits }));
      }
      return Ok(result | payload << shift);
    }

    result |= payload << shift;
    if byte & CONTINUATION == 0 {
      return Ok(result);
    }
    shift += 7;
  }
}

/**
  Decodes a signed varint of at most `max_bits` bits (1 to 64), sign extending from bit 6 of the
  terminal byte.

  The failure conditions are those of `read_unsigned`, except that the unused high bits of a
  full-width terminal byte must repeat the sign bit rather than be zero.
*/
pub fn read_signed(cursor: &mut ByteCursor, max_bits: u32) -> Result<i64, DecodeError> {
  debug_assert!(max_bits >= 1 && max_bits <= 64);
  let start = cursor.position();
  let mut result: i64 = 0;
  let mut shift: u32 = 0;

  loop {
    let byte = cursor.read_byte()?;
    let payload = (byte & PAYLOAD) as i64;
    let bits_left = max_bits - shift;

    if bits_left <= 7 {
      if byte & CONTINUATION != 0 {
        return Err(DecodeError::MalformedVarint(start, VarintReason::TooLong { max_bits }));
      }
      if bits_left < 7 {
        // Bits from the value's sign bit up through bit 6 must all agree.
        let top = (byte & PAYLOAD) >> (bits_left - 1);
        if top != 0 && top != PAYLOAD >> (bits_left - 1) {
          return Err(DecodeError::MalformedVarint(start, VarintReason::Overflow { max_bits }));
        }
      }
      result |= payload << shift;
      return Ok(sign_extend(result, byte, shift + 7));
    }

    result |= payload << shift;
    shift += 7;
    if byte & CONTINUATION == 0 {
      return Ok(sign_extend(result, byte, shift));
    }
  }
}

fn sign_extend(value: i64, terminal: u8, width: u32) -> i64 {
  match width < 64 && terminal & SIGN != 0 {
    true  => value | (-1i64 << width),
    false => value
  }
}

/// Reads four raw little-endian bytes as an `f32` bit pattern.
pub fn read_f32(cursor: &mut ByteCursor) -> Result<Ieee32, DecodeError> {
  let bytes = cursor.read_array::<4>()?;
  Ok(Ieee32(u32::from_le_bytes(bytes)))
}

/// Reads eight raw little-endian bytes as an `f64` bit pattern.
pub fn read_f64(cursor: &mut ByteCursor) -> Result<Ieee64, DecodeError> {
  let bytes = cursor.read_array::<8>()?;
  Ok(Ieee64(u64::from_le_bytes(bytes)))
}

// endregion

// region Encoding

/// Appends the minimal unsigned encoding of `value` to `out`.
pub fn encode_unsigned(mut value: u64, out: &mut Vec<u8>) {
  loop {
    let byte = (value as u8) & PAYLOAD;
    value >>= 7;
    match value == 0 {
      true  => {
        out.push(byte);
        return;
      }
      false => out.push(byte | CONTINUATION)
    }
  }
}

/// Appends the minimal signed encoding of `value` to `out`.
pub fn encode_signed(mut value: i64, out: &mut Vec<u8>) {
  loop {
    let byte = (value as u8) & PAYLOAD;
    // Arithmetic shift keeps the sign.
    value >>= 7;
    let done = (value == 0 && byte & SIGN == 0) || (value == -1 && byte & SIGN != 0);
    match done {
      true  => {
        out.push(byte);
        return;
      }
      false => out.push(byte | CONTINUATION)
    }
  }
}

// endregion
