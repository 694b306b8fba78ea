use std::collections::HashMap;

use crate::bits::BitValue;
use crate::bitstream::{BlockId, FIRST_APPLICATION_ABBREV_ID, Structure};

/// A decoded record operand
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// A scalar value
    Bits(BitValue),
    /// Raw bytes of a blob field
    Blob(Vec<u8>),
    /// Elements of an array field, in stream order
    Array(Vec<Operand>),
}

impl Operand {
    /// If it is a scalar, returns its value. Returns `None` otherwise.
    #[must_use]
    pub fn as_bits(&self) -> Option<&BitValue> {
        match self {
            Self::Bits(value) => Some(value),
            Self::Blob(_) | Self::Array(_) => None,
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Self::Blob(data) => Some(data),
            Self::Bits(_) | Self::Array(_) => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&[Operand]> {
        match self {
            Self::Array(elements) => Some(elements),
            Self::Bits(_) | Self::Blob(_) => None,
        }
    }
}

/// Data records consist of a record code and a number of operands
///
/// The interpretation of the code and operands is application specific and
/// may vary between different block types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Record code
    pub code: BitValue,
    pub operands: Vec<Operand>,
}

impl Record {
    /// Interprets the scalar operands from `start_at` on as the bytes of a
    /// UTF-8 string.
    ///
    /// Returns `None` if one of them is not a scalar byte or the bytes are not
    /// valid UTF-8.
    pub fn string(&self, start_at: usize) -> Option<String> {
        let bytes = self
            .operands
            .iter()
            .skip(start_at)
            .map(|op| op.as_bits().and_then(|bits| bits.as_u8().ok()))
            .collect::<Option<Vec<u8>>>()?;
        String::from_utf8(bytes).ok()
    }
}

/// Per-block metadata: names and declared abbreviations.
///
/// Blocks entered with an id that BLOCKINFO described start from a copy of
/// the registered template, so local definitions never leak into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    pub id: BlockId,
    /// Block name
    pub name: Option<String>,
    /// Data record names
    pub record_names: HashMap<BitValue, String>,
    /// Abbreviation structures by abbreviation id
    pub abbreviations: HashMap<BitValue, Structure>,
}

impl BlockInfo {
    pub fn new(id: BlockId) -> Self {
        Self {
            id,
            name: None,
            record_names: HashMap::new(),
            abbreviations: HashMap::new(),
        }
    }

    pub fn abbreviation(&self, id: &BitValue) -> Option<&Structure> {
        self.abbreviations.get(id)
    }

    /// Registers `structure` under the next free abbreviation id and returns
    /// that id.
    pub(crate) fn define_abbreviation(&mut self, structure: Structure) -> BitValue {
        let id = BitValue::from(FIRST_APPLICATION_ABBREV_ID + self.abbreviations.len());
        self.abbreviations.insert(id.clone(), structure);
        id
    }
}

/// Blocks in a bitstream denote nested regions of the stream,
/// and are identified by a content-specific id number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub info: BlockInfo,
    /// Records, in stream order
    pub records: Vec<Record>,
    /// Nested blocks, in stream order
    pub subblocks: Vec<Block>,
    /// Width of the abbreviation ids inside this block
    pub abbrev_width: usize,
    /// Length of the block body in 32-bit words, as declared by the stream
    pub block_len_words: u32,
}

impl Block {
    /// Abbreviation id width of the synthetic root block
    pub const ROOT_ABBREV_WIDTH: usize = 2;

    pub fn new(info: BlockInfo, abbrev_width: usize, block_len_words: u32) -> Self {
        Self {
            info,
            records: Vec::new(),
            subblocks: Vec::new(),
            abbrev_width,
            block_len_words,
        }
    }

    /// The synthetic outermost block holding the top-level blocks.
    pub fn root() -> Self {
        Self::new(BlockInfo::new(BlockId::Root), Self::ROOT_ABBREV_WIDTH, 0)
    }

    pub fn id(&self) -> &BlockId {
        &self.info.id
    }

    pub fn name(&self) -> Option<&str> {
        self.info.name.as_deref()
    }

    /// Name given to the code of `record` by BLOCKINFO, if any.
    pub fn name_of(&self, record: &Record) -> Option<&str> {
        self.info.record_names.get(&record.code).map(String::as_str)
    }

    /// Returns the first direct subblock called `name`.
    pub fn subblock_named(&self, name: &str) -> Option<&Block> {
        self.subblocks.iter().find(|block| block.name() == Some(name))
    }

    /// Iterates over the records whose code is named `name`.
    pub fn records_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Record> + 'a {
        self.records
            .iter()
            .filter(move |record| self.name_of(record) == Some(name))
    }
}
