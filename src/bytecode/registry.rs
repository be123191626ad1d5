/*!
  The opcode registry maps an opcode byte to its `InstructionDescriptor`. A registry is immutable
  once built and is shared read-only by any number of decoders. Construction checks that no two
  descriptors share an opcode or a mnemonic, which is really just a matter of inserting every pair
  into a `BiMap` without overwriting.
*/

use std::fmt::{Display, Formatter};

use bimap::BiMap;
use lazy_static::lazy_static;
use prettytable::{format as TableFormat, row, Table};
use strum::IntoEnumIterator;
use thiserror::Error;
use tracing::debug;

use super::{InstructionDescriptor, Opcode};
use crate::error::DecodeError;

/// Raised when a registry is built from inconsistent descriptors. This is a programming error.
#[derive(Error, Clone, Eq, PartialEq, Debug)]
pub enum RegistryError {
  #[error("opcode {0:#04x} is registered twice")]
  DuplicateOpcode(u8),
  #[error("mnemonic `{0}` is registered twice")]
  DuplicateMnemonic(&'static str),
}

/// Lookup of a byte that no descriptor claims.
#[derive(Error, Clone, Copy, Eq, PartialEq, Debug, Hash)]
#[error("no instruction is registered for opcode {0:#04x}")]
pub struct UnknownOpcode(pub u8);

impl UnknownOpcode {
  /// Attaches the stream offset at which the byte was read.
  pub fn at(self, offset: usize) -> DecodeError {
    DecodeError::UnknownOpcode(self.0, offset)
  }
}

#[derive(Clone, Debug)]
pub struct OpcodeRegistry {
  /// Sorted by opcode.
  descriptors : Vec<InstructionDescriptor>,
  /// Position in `descriptors` for each possible byte.
  index       : [Option<usize>; 256],
  names       : BiMap<u8, &'static str>,
}

impl OpcodeRegistry {

  pub fn new(mut descriptors: Vec<InstructionDescriptor>) -> Result<OpcodeRegistry, RegistryError> {
    descriptors.sort_by_key(|descriptor| descriptor.opcode);

    let mut names: BiMap<u8, &'static str> = BiMap::new();
    let mut index = [None; 256];

    for (position, descriptor) in descriptors.iter().enumerate() {
      if let Err((opcode, mnemonic)) = names.insert_no_overwrite(descriptor.opcode, descriptor.mnemonic) {
        return match names.contains_left(&opcode) {
          true  => Err(RegistryError::DuplicateOpcode(opcode)),
          false => Err(RegistryError::DuplicateMnemonic(mnemonic))
        };
      }
      index[descriptor.opcode as usize] = Some(position);
    }

    Ok(OpcodeRegistry {
      descriptors,
      index,
      names
    })
  }

  /// The registry of the base instruction set, one descriptor per `Opcode` variant.
  pub fn standard() -> Result<OpcodeRegistry, RegistryError> {
    OpcodeRegistry::new(Opcode::iter().map(InstructionDescriptor::from).collect())
  }

  pub fn lookup(&self, opcode: u8) -> Result<&InstructionDescriptor, UnknownOpcode> {
    match self.index[opcode as usize] {
      Some(position) => Ok(&self.descriptors[position]),
      None           => Err(UnknownOpcode(opcode))
    }
  }

  pub fn by_mnemonic(&self, mnemonic: &str) -> Option<&InstructionDescriptor> {
    let opcode = self.names.get_by_right(mnemonic)?;
    self.lookup(*opcode).ok()
  }

  /// All descriptors in opcode order.
  pub fn all(&self) -> &[InstructionDescriptor] {
    &self.descriptors
  }

  pub fn len(&self) -> usize {
    self.descriptors.len()
  }

  pub fn is_empty(&self) -> bool {
    self.descriptors.is_empty()
  }
}

lazy_static! {
  static ref STANDARD_REGISTRY: OpcodeRegistry = {
    match OpcodeRegistry::standard() {
      Ok(registry) => {
        debug!(descriptors = registry.len(), "built standard opcode registry");
        registry
      }
      Err(e) => panic!("Error: The standard opcode table is inconsistent: {}", e)
    }
  };

  static ref TABLE_DISPLAY_FORMAT: TableFormat::TableFormat =
    TableFormat::FormatBuilder::new()
      .column_separator('│')
      .borders(' ')
      .separator(
        TableFormat::LinePosition::Title,
        TableFormat::LineSeparator::new('─', '┼', ' ', ' ')
      )
      .separator(
        TableFormat::LinePosition::Bottom,
        TableFormat::LineSeparator::new('─', '┴', ' ', ' ')
      )
      .padding(1, 1)
      .build();
}

/// The process-wide registry of the base instruction set. Built on first use.
pub fn standard_registry() -> &'static OpcodeRegistry {
  &STANDARD_REGISTRY
}

impl Display for OpcodeRegistry {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let mut table = Table::new();

    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->"Opcode", ubl->"Mnemonic", ubl->"Immediate", ubl->"Flags"]);

    for descriptor in self.descriptors.iter() {
      let immediate = match descriptor.immediate {
        Some(kind) => kind.to_string(),
        None       => String::new()
      };
      table.add_row(
        row![
          r->format!("{:#04x}", descriptor.opcode),
          descriptor.mnemonic,
          immediate,
          descriptor.flags.to_string()
        ]
      );
    }

    write!(f, "{}", table)
  }
}
