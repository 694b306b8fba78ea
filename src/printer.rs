//! Textual dump of a decoded block tree.
//!
//! The output follows `llvm-bcanalyzer -dump`, except that arrays are never
//! reinterpreted as strings and the abbreviation used for a record is not
//! reported. It is a diagnostic format only and cannot be read back.

use std::fmt::{self, Write};

use crate::bitcode::{Block, Operand, Record};
use crate::bits::BitValue;

/// Renders `block` and everything below it. The synthetic root block gets no
/// tags of its own; its children are printed at the outermost level.
pub fn dump(block: &Block) -> String {
    block.to_string()
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        enum Step<'a> {
            Enter(&'a Block, usize),
            Exit(&'a Block, usize),
        }

        let mut steps = vec![Step::Enter(self, 0)];
        while let Some(step) = steps.pop() {
            match step {
                Step::Enter(block, depth) => {
                    let inner = if block.id().is_root() {
                        depth
                    } else {
                        write!(f, "{:indent$}<", "", indent = depth * 2)?;
                        write_block_name(f, block)?;
                        writeln!(
                            f,
                            " NumWords={} BlockCodeSize={}>",
                            block.block_len_words, block.abbrev_width
                        )?;
                        depth + 1
                    };
                    for record in &block.records {
                        write_record(f, block, record, inner)?;
                    }
                    steps.push(Step::Exit(block, depth));
                    for subblock in block.subblocks.iter().rev() {
                        steps.push(Step::Enter(subblock, inner));
                    }
                }
                Step::Exit(block, depth) => {
                    if !block.id().is_root() {
                        write!(f, "{:indent$}</", "", indent = depth * 2)?;
                        write_block_name(f, block)?;
                        f.write_str(">\n")?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn write_value(f: &mut impl Write, value: &BitValue) -> fmt::Result {
    match value.as_u32() {
        Ok(value) => write!(f, "{value}"),
        Err(_) => f.write_str("..."),
    }
}

fn write_block_name(f: &mut impl Write, block: &Block) -> fmt::Result {
    match (block.name(), block.id().as_bits()) {
        (Some(name), _) => f.write_str(name),
        (None, Some(id)) => {
            f.write_str("blockid=")?;
            write_value(f, id)
        }
        (None, None) => f.write_str("root"),
    }
}

// Arrays are flattened into the operand numbering, blobs are not numbered.
fn write_operand(f: &mut impl Write, operand: &Operand, index: &mut usize) -> fmt::Result {
    match operand {
        Operand::Bits(value) => {
            write!(f, " op{index}=")?;
            write_value(f, value)?;
            *index += 1;
        }
        Operand::Array(elements) => {
            for element in elements {
                write_operand(f, element, index)?;
            }
        }
        Operand::Blob(_) => {}
    }
    Ok(())
}

fn write_record(f: &mut impl Write, block: &Block, record: &Record, depth: usize) -> fmt::Result {
    write!(f, "{:indent$}<", "", indent = depth * 2)?;
    match block.name_of(record) {
        Some(name) => f.write_str(name)?,
        None => {
            f.write_str("code=")?;
            write_value(f, &record.code)?;
        }
    }
    let mut index = 0;
    for operand in &record.operands {
        write_operand(f, operand, &mut index)?;
    }
    f.write_str("/>")?;
    if let Some(Operand::Blob(data)) = record.operands.last() {
        f.write_str(" blob data = ")?;
        match std::str::from_utf8(data) {
            Ok(text) => write!(f, "'{text}'")?,
            Err(_) => write!(f, "unprintable, {} bytes.", data.len())?,
        }
    }
    f.write_str("\n")
}
