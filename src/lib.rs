pub mod bitcode;
pub mod bits;
pub mod bitstream;
pub mod printer;
pub mod read;

pub use self::bitcode::{Block, BlockInfo, Operand, Record};
pub use self::bits::BitValue;
pub use self::bitstream::{BlockId, OperandKind, Structure};
pub use self::printer::dump;
pub use self::read::{BitStreamReader, Error};

/// Parse a bitstream whose container header has already been stripped.
///
/// Returns the synthetic root block holding the top-level blocks.
pub fn parse(data: &[u8]) -> Result<Block, Error> {
    BitStreamReader::new(data).parse()
}
