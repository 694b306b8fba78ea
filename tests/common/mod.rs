#![allow(dead_code)]

/// One operand of an abbreviation definition, as it appears on the wire.
/// An array takes two entries: `Array` followed by its element.
#[derive(Debug, Clone, Copy)]
pub enum AbbrevOp {
    Literal(u64),
    Fixed(u64),
    Vbr(u64),
    Array,
    Char6,
    Blob,
    /// An encoding selector with no meaning
    Invalid(u64),
}

/// Writes bitstreams for the tests, least significant bit first.
pub struct BitWriter {
    bytes: Vec<u8>,
    bit_len: usize,
    abbrev_width: usize,
    // enclosing abbreviation width and bit offset of the length word
    open_blocks: Vec<(usize, usize)>,
}

impl BitWriter {
    pub fn new() -> Self {
        Self {
            bytes: Vec::new(),
            bit_len: 0,
            abbrev_width: 2,
            open_blocks: Vec::new(),
        }
    }

    pub fn emit(&mut self, value: u64, width: usize) -> &mut Self {
        for i in 0..width {
            if self.bit_len % 8 == 0 {
                self.bytes.push(0);
            }
            let bit = if i < 64 { (value >> i) & 1 } else { 0 };
            let last = self.bytes.len() - 1;
            self.bytes[last] |= (bit as u8) << (self.bit_len % 8);
            self.bit_len += 1;
        }
        self
    }

    pub fn emit_vbr(&mut self, mut value: u64, width: usize) -> &mut Self {
        let data_bits = width - 1;
        loop {
            let chunk = value & ((1u64 << data_bits) - 1);
            value >>= data_bits;
            self.emit(chunk, data_bits);
            self.emit(u64::from(value != 0), 1);
            if value == 0 {
                return self;
            }
        }
    }

    pub fn align32(&mut self) -> &mut Self {
        while self.bit_len % 32 != 0 {
            self.emit(0, 1);
        }
        self
    }

    pub fn abbrev_id(&mut self, id: u64) -> &mut Self {
        let width = self.abbrev_width;
        self.emit(id, width)
    }

    pub fn enter_block(&mut self, block_id: u64, abbrev_width: usize) -> &mut Self {
        self.abbrev_id(1);
        self.emit_vbr(block_id, 8);
        self.emit_vbr(abbrev_width as u64, 4);
        self.align32();
        self.open_blocks.push((self.abbrev_width, self.bit_len));
        self.emit(0, 32);
        self.abbrev_width = abbrev_width;
        self
    }

    pub fn end_block(&mut self) -> &mut Self {
        self.abbrev_id(0);
        self.align32();
        let (width, length_at) = self.open_blocks.pop().expect("no open block");
        let words = ((self.bit_len - length_at - 32) / 32) as u32;
        let at = length_at / 8;
        self.bytes[at..at + 4].copy_from_slice(&words.to_le_bytes());
        self.abbrev_width = width;
        self
    }

    pub fn unabbrev_record(&mut self, code: u64, operands: &[u64]) -> &mut Self {
        self.abbrev_id(3);
        self.emit_vbr(code, 6);
        self.emit_vbr(operands.len() as u64, 6);
        for &op in operands {
            self.emit_vbr(op, 6);
        }
        self
    }

    /// A record whose operands are the bytes of `text`, after `prefix`.
    pub fn text_record(&mut self, code: u64, prefix: &[u64], text: &[u8]) -> &mut Self {
        let mut operands = prefix.to_vec();
        operands.extend(text.iter().map(|&b| u64::from(b)));
        self.unabbrev_record(code, &operands)
    }

    pub fn define_abbrev(&mut self, ops: &[AbbrevOp]) -> &mut Self {
        self.abbrev_id(2);
        self.emit_vbr(ops.len() as u64, 5);
        for op in ops {
            match *op {
                AbbrevOp::Literal(value) => {
                    self.emit(1, 1);
                    self.emit_vbr(value, 8);
                }
                AbbrevOp::Fixed(width) => {
                    self.emit(0, 1).emit(1, 3).emit_vbr(width, 5);
                }
                AbbrevOp::Vbr(width) => {
                    self.emit(0, 1).emit(2, 3).emit_vbr(width, 5);
                }
                AbbrevOp::Array => {
                    self.emit(0, 1).emit(3, 3);
                }
                AbbrevOp::Char6 => {
                    self.emit(0, 1).emit(4, 3);
                }
                AbbrevOp::Blob => {
                    self.emit(0, 1).emit(5, 3);
                }
                AbbrevOp::Invalid(selector) => {
                    self.emit(0, 1).emit(selector, 3);
                }
            }
        }
        self
    }

    pub fn blob(&mut self, data: &[u8]) -> &mut Self {
        self.emit_vbr(data.len() as u64, 6);
        self.align32();
        for &byte in data {
            self.emit(u64::from(byte), 8);
        }
        self.align32()
    }

    pub fn finish(&self) -> Vec<u8> {
        assert!(self.open_blocks.is_empty(), "unbalanced test stream");
        self.bytes.clone()
    }

    /// The bytes written so far, even with blocks left open.
    pub fn bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }
}
