use std::{collections::HashMap, mem};

use log::{debug, trace, warn};
use thiserror::Error;

use crate::bitcode::{Block, BlockInfo, Operand, Record};
use crate::bits::{self, BitValue, Cursor};
use crate::bitstream::{
    BlockId, BlockInfoCode, BuiltinAbbreviationId, Encoding, OperandKind, Structure,
};

/// Bitstream reader errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    ReadBits(#[from] bits::Error),
    #[error("unsupported abbreviation `{0}` in BLOCKINFO block")]
    UnsupportedBlockInfoAbbrev(BitValue),
    #[error("unsupported BLOCKINFO record `{0}`")]
    UnsupportedBlockInfoRecord(BitValue),
    #[error("undeclared abbreviation `{abbrev_id}` in block `{block}`")]
    UndeclaredAbbreviation { block: BlockId, abbrev_id: BitValue },
    #[error("record code must be a scalar, found {0:?}")]
    UnsupportedRecordId(Operand),
    #[error("unexpected END_BLOCK outside of any block")]
    UnbalancedBlocks,
    #[error("end of stream encountered with {0} block(s) still open")]
    UnterminatedBlocks(usize),
    #[error("block `{block}` declares {declared} words but spans {actual}")]
    BlockLengthMismatch {
        block: BlockId,
        declared: u32,
        actual: usize,
    },
    #[error("parse error: {0}")]
    ParseError(String),
}

fn reads_no_bits(kind: &OperandKind) -> bool {
    matches!(kind, OperandKind::Literal(_) | OperandKind::Fixed(0))
}

/// A block that is still being read, with the bit offset its body starts at.
#[derive(Debug)]
struct OpenBlock {
    block: Block,
    body_start: usize,
}

/// Bitstream reader
///
/// Reads a whole stream into a tree of [`Block`]s. The BLOCKINFO templates
/// collected on the way live as long as the reader, which is consumed by
/// [`BitStreamReader::parse`].
#[derive(Debug, Clone)]
pub struct BitStreamReader<'a> {
    cursor: Cursor<'a>,
    /// Templates registered by BLOCKINFO, by target block id
    block_info: HashMap<BitValue, BlockInfo>,
    verify_block_lengths: bool,
}

impl<'a> BitStreamReader<'a> {
    /// Create a new reader from bytes
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(buffer),
            block_info: HashMap::new(),
            verify_block_lengths: false,
        }
    }

    /// Fail with [`Error::BlockLengthMismatch`] when a block does not span the
    /// number of words its header declares. Off by default.
    #[must_use]
    pub fn verify_block_lengths(mut self, verify: bool) -> Self {
        self.verify_block_lengths = verify;
        self
    }

    pub fn read_fixed(&mut self, width: usize) -> Result<BitValue, Error> {
        Ok(self.cursor.next_bits(width)?)
    }

    /// Read a VBR value: `width - 1` data bits followed by a continuation bit,
    /// repeated until the continuation bit is clear.
    pub fn read_vbr(&mut self, width: usize) -> Result<BitValue, Error> {
        if width < 1 {
            return Err(Error::ParseError(
                "VBR fields cannot have a width smaller than 1".to_string(),
            ));
        }
        let mut chunks = Vec::new();
        loop {
            chunks.push(self.cursor.next_bits(width - 1)?);
            if !self.cursor.next_bit()? {
                break;
            }
        }
        Ok(BitValue::join(&chunks))
    }

    fn read_length(&mut self) -> Result<usize, Error> {
        Ok(self.read_vbr(6)?.as_usize()?)
    }

    /// Decode one operand described by `kind`
    pub fn read_operand(&mut self, kind: &OperandKind) -> Result<Operand, Error> {
        let operand = match kind {
            OperandKind::Literal(value) => Operand::Bits(value.clone()),
            OperandKind::Fixed(width) => Operand::Bits(self.read_fixed(*width)?),
            OperandKind::Vbr(width) => Operand::Bits(self.read_vbr(*width)?),
            OperandKind::Array(element) => {
                let length = self.read_length()?;
                // elements that read no bits are not bounded by the input
                if reads_no_bits(element) && length > self.cursor.remaining() {
                    return Err(Error::ParseError(format!(
                        "array of {length} empty elements exceeds the remaining input"
                    )));
                }
                let mut elements = Vec::new();
                for _ in 0..length {
                    elements.push(self.read_operand(element)?);
                }
                Operand::Array(elements)
            }
            OperandKind::Char6 => {
                return Err(Error::ParseError(
                    "char6 operands are not supported".to_string(),
                ));
            }
            OperandKind::Blob => {
                let length = self.read_length()?;
                self.cursor.align(32)?;
                let data = self.cursor.next_bytes(length)?;
                self.cursor.align(32)?;
                Operand::Blob(data)
            }
        };
        Ok(operand)
    }

    /// Read one operand of an abbreviation definition, together with the
    /// number of declared operands it accounts for.
    fn read_abbrev_op(&mut self) -> Result<(OperandKind, usize), Error> {
        let is_literal = self.cursor.next_bit()?;
        if is_literal {
            return Ok((OperandKind::Literal(self.read_vbr(8)?), 1));
        }
        let selector = self.read_fixed(3)?;
        let encoding = Encoding::try_from(selector.as_u8()?).map_err(|_| {
            Error::ParseError(format!("unknown record field encoding: {selector}"))
        })?;
        let op = match encoding {
            Encoding::Fixed => OperandKind::Fixed(self.read_vbr(5)?.as_usize()?),
            Encoding::Vbr => OperandKind::Vbr(self.read_vbr(5)?.as_usize()?),
            Encoding::Array => {
                let (element, complexity) = self.read_abbrev_op()?;
                return Ok((OperandKind::Array(Box::new(element)), complexity + 1));
            }
            Encoding::Char6 => OperandKind::Char6,
            Encoding::Blob => OperandKind::Blob,
        };
        Ok((op, 1))
    }

    /// Read the body of a DEFINE_ABBREV
    pub fn read_abbrev_structure(&mut self) -> Result<Structure, Error> {
        let num_ops = self.read_vbr(5)?.as_usize()?;
        let mut structure = Vec::new();
        let mut declared = 0;
        while declared < num_ops {
            let (op, complexity) = self.read_abbrev_op()?;
            structure.push(op);
            declared += complexity;
        }
        Ok(structure)
    }

    /// Read an unabbreviated record: `[code(vbr6), numops(vbr6), op0(vbr6), ...]`
    pub fn read_unabbrev_record(&mut self) -> Result<Record, Error> {
        let code = self.read_vbr(6)?;
        let num_ops = self.read_length()?;
        let mut operands = Vec::new();
        for _ in 0..num_ops {
            operands.push(Operand::Bits(self.read_vbr(6)?));
        }
        Ok(Record { code, operands })
    }

    /// Read a record laid out by `structure`. Its first operand is the code.
    pub fn read_abbrev_record(&mut self, structure: &Structure) -> Result<Record, Error> {
        let (code_kind, operand_kinds) = structure
            .split_first()
            .ok_or_else(|| Error::ParseError("empty abbreviation".to_string()))?;
        let code = match self.read_operand(code_kind)? {
            Operand::Bits(code) => code,
            other => return Err(Error::UnsupportedRecordId(other)),
        };
        let mut operands = Vec::with_capacity(operand_kinds.len());
        for kind in operand_kinds {
            operands.push(self.read_operand(kind)?);
        }
        Ok(Record { code, operands })
    }

    fn template(&mut self, block_id: &BitValue) -> &mut BlockInfo {
        self.block_info
            .entry(block_id.clone())
            .or_insert_with(|| BlockInfo::new(BlockId::Id(block_id.clone())))
    }

    fn check_block_length(
        &self,
        block: &BlockId,
        declared: u32,
        body_start: usize,
    ) -> Result<(), Error> {
        let actual = (self.cursor.offset() - body_start) / 32;
        if actual == declared as usize {
            return Ok(());
        }
        if self.verify_block_lengths {
            return Err(Error::BlockLengthMismatch {
                block: block.clone(),
                declared,
                actual,
            });
        }
        warn!("block {block} declares {declared} words but spans {actual}");
        Ok(())
    }

    /// Read the BLOCKINFO block into the template registry. Called right
    /// after its header has been read.
    fn read_block_info_block(
        &mut self,
        abbrev_width: usize,
        declared_words: u32,
        body_start: usize,
    ) -> Result<(), Error> {
        use BuiltinAbbreviationId::*;

        let mut current: Option<BitValue> = None;
        loop {
            let abbrev_id = self.read_fixed(abbrev_width)?;
            match BuiltinAbbreviationId::from_bits(&abbrev_id) {
                Some(EndBlock) => {
                    self.cursor.align(32)?;
                    let block = BlockId::Id(BitValue::from(BlockId::BLOCKINFO));
                    return self.check_block_length(&block, declared_words, body_start);
                }
                Some(DefineAbbreviation) => {
                    let structure = self.read_abbrev_structure()?;
                    let Some(target) = current.as_ref() else {
                        return Err(Error::ParseError(
                            "DEFINE_ABBREV before SETBID in BLOCKINFO".to_string(),
                        ));
                    };
                    let id = self.template(target).define_abbreviation(structure);
                    trace!("abbreviation {id} registered for block {target}");
                }
                Some(UnabbreviatedRecord) => {
                    let record = self.read_unabbrev_record()?;
                    match BlockInfoCode::from_bits(&record.code) {
                        Some(BlockInfoCode::SetBid) => {
                            let [Operand::Bits(target)] = record.operands.as_slice() else {
                                return Err(Error::ParseError(format!(
                                    "SETBID expects exactly one operand, found {}",
                                    record.operands.len()
                                )));
                            };
                            debug!("BLOCKINFO describes block {target}");
                            self.template(target);
                            current = Some(target.clone());
                        }
                        Some(BlockInfoCode::BlockName) => {
                            // Names are cosmetic, a malformed one is dropped.
                            let Some(name) = record.string(0) else {
                                warn!("skipping BLOCKNAME that is not valid UTF-8");
                                continue;
                            };
                            if let Some(target) = &current {
                                self.template(target).name = Some(name);
                            }
                        }
                        Some(BlockInfoCode::SetRecordName) => {
                            let Some(Operand::Bits(code)) = record.operands.first() else {
                                return Err(Error::ParseError(
                                    "SETRECORDNAME without a record code".to_string(),
                                ));
                            };
                            let Some(name) = record.string(1) else {
                                warn!("skipping SETRECORDNAME for {code} that is not valid UTF-8");
                                continue;
                            };
                            if let Some(target) = &current {
                                self.template(target)
                                    .record_names
                                    .insert(code.clone(), name);
                            }
                        }
                        None => return Err(Error::UnsupportedBlockInfoRecord(record.code)),
                    }
                }
                Some(EnterSubBlock) | None => {
                    return Err(Error::UnsupportedBlockInfoAbbrev(abbrev_id));
                }
            }
        }
    }

    /// Read the whole stream and return the synthetic root block holding
    /// the top-level blocks.
    pub fn parse(mut self) -> Result<Block, Error> {
        use BuiltinAbbreviationId::*;

        let mut parents: Vec<OpenBlock> = Vec::new();
        let mut current = OpenBlock {
            block: Block::root(),
            body_start: 0,
        };
        loop {
            if self.cursor.is_empty() {
                if !parents.is_empty() {
                    return Err(Error::UnterminatedBlocks(parents.len()));
                }
                return Ok(current.block);
            }
            let abbrev_id = self.read_fixed(current.block.abbrev_width)?;
            match BuiltinAbbreviationId::from_bits(&abbrev_id) {
                Some(EndBlock) => {
                    // [endBlock, <align32bits>]
                    self.cursor.align(32)?;
                    let parent = parents.pop().ok_or(Error::UnbalancedBlocks)?;
                    let finished = mem::replace(&mut current, parent);
                    self.check_block_length(
                        finished.block.id(),
                        finished.block.block_len_words,
                        finished.body_start,
                    )?;
                    debug!("exiting block {}", finished.block.id());
                    current.block.subblocks.push(finished.block);
                }
                Some(EnterSubBlock) => {
                    // [enterSubBlock, blockid(vbr8), newabbrevlen(vbr4), <align32bits>, blocklen_32]
                    let block_id = self.read_vbr(8)?;
                    let abbrev_width = self.read_vbr(4)?.as_usize()?;
                    self.cursor.align(32)?;
                    let block_len_words = self.read_fixed(32)?.as_u32()?;
                    let body_start = self.cursor.offset();
                    if block_id == BlockId::BLOCKINFO {
                        debug!("reading BLOCKINFO block");
                        self.read_block_info_block(abbrev_width, block_len_words, body_start)?;
                        continue;
                    }
                    let info = match self.block_info.get(&block_id) {
                        Some(template) => template.clone(),
                        None => BlockInfo::new(BlockId::Id(block_id)),
                    };
                    debug!(
                        "entering block {} (abbrev width {abbrev_width}, {block_len_words} words)",
                        info.id
                    );
                    let block = Block::new(info, abbrev_width, block_len_words);
                    parents.push(mem::replace(&mut current, OpenBlock { block, body_start }));
                }
                Some(DefineAbbreviation) => {
                    let structure = self.read_abbrev_structure()?;
                    let id = current.block.info.define_abbreviation(structure);
                    trace!("abbreviation {id} defined in block {}", current.block.id());
                }
                Some(UnabbreviatedRecord) => {
                    let record = self.read_unabbrev_record()?;
                    trace!("record {} with {} operands", record.code, record.operands.len());
                    current.block.records.push(record);
                }
                None => {
                    let Some(structure) = current.block.info.abbreviation(&abbrev_id) else {
                        return Err(Error::UndeclaredAbbreviation {
                            block: current.block.id().clone(),
                            abbrev_id,
                        });
                    };
                    let record = self.read_abbrev_record(structure)?;
                    trace!(
                        "record {} with {} operands (abbreviation {abbrev_id})",
                        record.code,
                        record.operands.len()
                    );
                    current.block.records.push(record);
                }
            }
        }
    }
}
