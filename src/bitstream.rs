use std::fmt;

use num_enum::TryFromPrimitive;

use crate::bits::BitValue;

/// Describes how a single field of an abbreviated record is encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperandKind {
    /// A literal value. It is part of the abbreviation, not of the stream.
    Literal(BitValue),
    /// A fixed-width field
    Fixed(usize),
    /// A VBR-encoded value with the provided chunk width
    Vbr(usize),
    /// A vbr6 length followed by that many elements of the given kind
    Array(Box<OperandKind>),
    /// A char6-encoded ASCII character. Decoding it is not supported.
    Char6,
    /// A vbr6 length, padding to a 32-bit boundary, that many bytes and
    /// padding again
    Blob,
}

/// The operand layout declared by an abbreviation. The first entry encodes
/// the record code.
pub type Structure = Vec<OperandKind>;

/// The 3-bit encoding selector of a non-literal abbreviation operand.
/// - note: Must match the encoding in
///         <http://llvm.org/docs/BitCodeFormat.html#define-abbrev-encoding>
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum Encoding {
    Fixed = 1,
    Vbr = 2,
    Array = 3,
    Char6 = 4,
    Blob = 5,
}

/// An abbreviation id is a fixed-width field that occurs at the start of
/// abbreviated data records and inside block definitions.
///
/// Bitstream reserves 4 special abbreviation IDs for its own bookkeeping.
/// Ids from [`FIRST_APPLICATION_ABBREV_ID`] on are assigned to abbreviation
/// definitions in the order they appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum BuiltinAbbreviationId {
    /// Marks the end of the current block.
    EndBlock = 0,
    /// Marks the beginning of a new block.
    EnterSubBlock = 1,
    /// Marks the definition of a new abbreviation.
    DefineAbbreviation = 2,
    /// Marks the definition of a new unabbreviated record.
    UnabbreviatedRecord = 3,
}

impl BuiltinAbbreviationId {
    pub fn from_bits(id: &BitValue) -> Option<Self> {
        id.as_u8().ok().and_then(|id| Self::try_from(id).ok())
    }
}

pub const FIRST_APPLICATION_ABBREV_ID: usize = 4;

/// A `BlockInfoCode` enumerates the records that may occur inside the
/// BLOCKINFO block. Of these, only `SetBid` is required. Names given with
/// `BlockName` or `SetRecordName` are cosmetic and only used when dumping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum BlockInfoCode {
    /// Indicates which block ID is being described.
    SetBid = 1,
    /// An optional element that records which bytes of the record are the
    /// name of the block.
    BlockName = 2,
    /// An optional element that records the record ID number and the bytes
    /// for the name of the corresponding record.
    SetRecordName = 3,
}

impl BlockInfoCode {
    pub fn from_bits(code: &BitValue) -> Option<Self> {
        code.as_u8().ok().and_then(|code| Self::try_from(code).ok())
    }
}

/// Identifies a block.
///
/// The outermost container that holds the top-level blocks has no id in the
/// stream and is tagged [`BlockId::Root`], so it cannot be confused with the
/// reserved BLOCKINFO id 0.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BlockId {
    Root,
    Id(BitValue),
}

impl BlockId {
    /// Block id reserved for the BLOCKINFO block.
    pub const BLOCKINFO: u64 = 0;

    pub fn is_root(&self) -> bool {
        matches!(self, Self::Root)
    }

    pub fn is_block_info(&self) -> bool {
        matches!(self, Self::Id(id) if *id == Self::BLOCKINFO)
    }

    pub fn as_bits(&self) -> Option<&BitValue> {
        match self {
            Self::Root => None,
            Self::Id(id) => Some(id),
        }
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("<root>"),
            Self::Id(id) => write!(f, "{id}"),
        }
    }
}
