/*!
  A read position into a fixed byte buffer. Every decoding routine in the crate threads the same
  `ByteCursor` through its reads, so the current offset and the end-of-stream check live in
  exactly one place.
*/

use crate::error::DecodeError;

#[derive(Clone, Debug)]
pub struct ByteCursor<'d> {
  data     :  &'d [u8],
  position :  usize
}

impl<'d> ByteCursor<'d> {

  pub fn new(data: &'d [u8]) -> Self {
    ByteCursor {
      data,
      position: 0
    }
  }

  /// Offset of the next byte to be read, counted from the start of the buffer.
  pub fn position(&self) -> usize {
    self.position
  }

  pub fn remaining(&self) -> usize {
    self.data.len() - self.position
  }

  pub fn is_empty(&self) -> bool {
    self.remaining() == 0
  }

  /// Gives the unread part of the underlying buffer.
  pub fn data(&self) -> &'d [u8] {
    &self.data[self.position..]
  }

  /// Returns the next byte without consuming it.
  pub fn peek(&self) -> Option<u8> {
    self.data.get(self.position).copied()
  }

  pub fn read_byte(&mut self) -> Result<u8, DecodeError> {
    match self.peek() {
      Some(byte) => {
        self.position += 1;
        Ok(byte)
      }
      None => Err(DecodeError::UnexpectedEndOfStream(self.position))
    }
  }

  /// Consumes exactly `N` bytes. On failure nothing is consumed and the error reports the
  /// offset of the first missing byte.
  pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
    match self.data().get(..N) {
      Some(bytes) => {
        let mut array = [0u8; N];
        array.copy_from_slice(bytes);
        self.position += N;
        Ok(array)
      }
      None => Err(DecodeError::UnexpectedEndOfStream(self.data.len()))
    }
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn peek_and_read(){
    let mut c = ByteCursor::new(&[1, 2, 3]);
    assert_eq!(c.peek(), Some(1));
    assert_eq!(c.read_byte(), Ok(1));
    assert_eq!(c.position(), 1);
    assert_eq!(c.read_byte(), Ok(2));
    assert_eq!(c.remaining(), 1);
    assert_eq!(c.read_byte(), Ok(3));
    assert!(c.is_empty());
    assert_eq!(c.read_byte(), Err(DecodeError::UnexpectedEndOfStream(3)));
  }

  #[test]
  fn read_array_short(){
    let mut c = ByteCursor::new(&[0xAA, 0xBB, 0xCC]);
    assert_eq!(c.read_byte(), Ok(0xAA));
    assert_eq!(c.read_array::<4>(), Err(DecodeError::UnexpectedEndOfStream(3)));
    // Nothing was consumed by the failed read.
    assert_eq!(c.position(), 1);
    assert_eq!(c.read_array::<2>(), Ok([0xBB, 0xCC]));
    assert_eq!(c.data(), &[] as &[u8]);
  }
}
