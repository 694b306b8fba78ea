use std::fmt;
use std::hash::{Hash, Hasher};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("unexpected end of stream")]
    EndOfStream,
    #[error("casting a bit sequence of length {count} to an integer of width {width}")]
    CastOverflow { count: usize, width: u32 },
}

const WORD_BITS: usize = u64::BITS as usize;

/// An arbitrary-length bit sequence, least significant bit first.
///
/// It can be seen either as a `[bool]` or as an arbitrary precision unsigned
/// integer with checked casts to fixed-width values. Equality and hashing only
/// look at the significant bits, so trailing (high-order) zero bits never
/// change the identity of a value.
#[derive(Clone, Default)]
pub struct BitValue {
    // Bits past `len` are always zero.
    words: Vec<u64>,
    len: usize,
}

impl BitValue {
    /// An empty sequence, equal to zero.
    pub const fn new() -> Self {
        Self {
            words: Vec::new(),
            len: 0,
        }
    }

    pub fn from_bits_least_first(bits: &[bool]) -> Self {
        let mut value = Self::new();
        for &bit in bits {
            value.push(bit);
        }
        value
    }

    pub fn from_bits_most_first(bits: &[bool]) -> Self {
        let mut value = Self::new();
        for &bit in bits.iter().rev() {
            value.push(bit);
        }
        value
    }

    /// Concatenates `values` end to end. The first value provides the least
    /// significant bits of the result.
    pub fn join<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a BitValue>,
    {
        let mut result = Self::new();
        for value in values {
            result.append(value);
        }
        result
    }

    /// Appends the low `width` bits of `value` above the current top bit.
    pub(crate) fn push_word(&mut self, value: u64, width: usize) {
        debug_assert!(width <= WORD_BITS);
        if width == 0 {
            return;
        }
        let value = if width < WORD_BITS {
            value & ((1u64 << width) - 1)
        } else {
            value
        };
        let shift = self.len % WORD_BITS;
        if shift == 0 {
            self.words.push(value);
        } else {
            let last = self.words.len() - 1;
            self.words[last] |= value << shift;
            if shift + width > WORD_BITS {
                self.words.push(value >> (WORD_BITS - shift));
            }
        }
        self.len += width;
    }

    pub fn push(&mut self, bit: bool) {
        self.push_word(u64::from(bit), 1);
    }

    pub fn append(&mut self, other: &BitValue) {
        let mut remaining = other.len;
        for &word in &other.words {
            let width = remaining.min(WORD_BITS);
            self.push_word(word, width);
            remaining -= width;
        }
    }

    /// Raw number of stored bits, including high-order zeros.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns the bit at `index`, or `false` past the end.
    pub fn bit(&self, index: usize) -> bool {
        self.words
            .get(index / WORD_BITS)
            .is_some_and(|word| (word >> (index % WORD_BITS)) & 1 == 1)
    }

    /// Number of significant bits: the index of the highest set bit plus one.
    pub fn count(&self) -> usize {
        self.words
            .iter()
            .rposition(|&word| word != 0)
            .map_or(0, |index| {
                index * WORD_BITS + (WORD_BITS - self.words[index].leading_zeros() as usize)
            })
    }

    pub fn is_zero(&self) -> bool {
        self.words.iter().all(|&word| word == 0)
    }

    fn significant_words(&self) -> &[u64] {
        let count = self.count();
        &self.words[..count.div_ceil(WORD_BITS)]
    }

    fn check_width(&self, width: u32) -> Result<(), Error> {
        let count = self.count();
        if count > width as usize {
            return Err(Error::CastOverflow { count, width });
        }
        Ok(())
    }

    pub fn as_u64(&self) -> Result<u64, Error> {
        self.check_width(u64::BITS)?;
        Ok(self.words.first().copied().unwrap_or(0))
    }

    pub fn as_u32(&self) -> Result<u32, Error> {
        self.check_width(u32::BITS)?;
        Ok(self.as_u64()? as u32)
    }

    pub fn as_u8(&self) -> Result<u8, Error> {
        self.check_width(u8::BITS)?;
        Ok(self.as_u64()? as u8)
    }

    pub fn as_usize(&self) -> Result<usize, Error> {
        self.check_width(usize::BITS)?;
        Ok(self.as_u64()? as usize)
    }
}

impl From<u64> for BitValue {
    fn from(value: u64) -> Self {
        let mut result = Self::new();
        result.push_word(value, WORD_BITS - value.leading_zeros() as usize);
        result
    }
}

impl From<u32> for BitValue {
    fn from(value: u32) -> Self {
        Self::from(u64::from(value))
    }
}

impl From<u8> for BitValue {
    fn from(value: u8) -> Self {
        Self::from(u64::from(value))
    }
}

impl From<usize> for BitValue {
    fn from(value: usize) -> Self {
        Self::from(value as u64)
    }
}

impl PartialEq for BitValue {
    fn eq(&self, other: &Self) -> bool {
        self.significant_words() == other.significant_words()
    }
}

impl Eq for BitValue {}

impl PartialEq<u64> for BitValue {
    fn eq(&self, other: &u64) -> bool {
        self.as_u64().is_ok_and(|value| value == *other)
    }
}

impl Hash for BitValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant_words().hash(state);
    }
}

impl fmt::Display for BitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_u64() {
            Ok(value) => write!(f, "{value}"),
            Err(_) => {
                f.write_str("0b")?;
                for index in (0..self.count()).rev() {
                    f.write_str(if self.bit(index) { "1" } else { "0" })?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for BitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BitValue(0b")?;
        if self.len == 0 {
            f.write_str("0")?;
        }
        for index in (0..self.len).rev() {
            f.write_str(if self.bit(index) { "1" } else { "0" })?;
        }
        f.write_str(")")
    }
}

/// A bit cursor over an immutable byte buffer.
///
/// Bits are consumed least significant bit first within each byte.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    /// Total number of bits in the buffer.
    pub fn len(&self) -> usize {
        self.buffer.len() * 8
    }

    /// Current position, in bits.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.len() - self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.offset == self.len()
    }

    fn check(&self, needed: usize) -> Result<(), Error> {
        if self.remaining() < needed {
            return Err(Error::EndOfStream);
        }
        Ok(())
    }

    // Caller checks bounds. At most 32 bits so the shifted bytes fit a u64.
    fn read_word(&mut self, count: usize) -> u64 {
        debug_assert!(count <= 32);
        let offset = self.offset;
        let upper_bound = offset + count;
        let top_byte_index = upper_bound >> 3;
        let mut res = 0;
        if upper_bound & 7 != 0 {
            let mask = (1u8 << (upper_bound & 7) as u8).wrapping_sub(1);
            res = u64::from(self.buffer[top_byte_index] & mask);
        }
        for i in ((offset >> 3)..(upper_bound >> 3)).rev() {
            res <<= 8;
            res |= u64::from(self.buffer[i]);
        }
        if offset & 7 != 0 {
            res >>= offset & 7;
        }
        self.offset = upper_bound;
        res
    }

    pub fn next_bit(&mut self) -> Result<bool, Error> {
        self.check(1)?;
        let byte = self.buffer[self.offset >> 3];
        let bit = (byte >> (self.offset & 7)) & 1 == 1;
        self.offset += 1;
        Ok(bit)
    }

    pub fn next_byte(&mut self) -> Result<u8, Error> {
        self.check(8)?;
        if self.offset & 7 == 0 {
            let byte = self.buffer[self.offset >> 3];
            self.offset += 8;
            return Ok(byte);
        }
        Ok(self.read_word(8) as u8)
    }

    /// Reads `count` bits into a value whose least significant bit is the
    /// first one read.
    pub fn next_bits(&mut self, count: usize) -> Result<BitValue, Error> {
        self.check(count)?;
        let mut value = BitValue::new();
        let mut remaining = count;
        while remaining > 0 {
            let width = remaining.min(32);
            value.push_word(self.read_word(width), width);
            remaining -= width;
        }
        Ok(value)
    }

    pub fn next_bytes(&mut self, count: usize) -> Result<Vec<u8>, Error> {
        let bits = count.checked_mul(8).ok_or(Error::EndOfStream)?;
        self.check(bits)?;
        if self.offset & 7 == 0 {
            let start = self.offset >> 3;
            self.offset += bits;
            return Ok(self.buffer[start..start + count].to_vec());
        }
        let mut bytes = Vec::with_capacity(count);
        for _ in 0..count {
            bytes.push(self.next_byte()?);
        }
        Ok(bytes)
    }

    /// Moves the cursor forward to the next multiple of `multiple` bits.
    /// Padding bits are skipped without being decoded.
    pub fn align(&mut self, multiple: usize) -> Result<(), Error> {
        let rem = self.offset % multiple;
        if rem == 0 {
            return Ok(());
        }
        let offset = self.offset + (multiple - rem);
        if offset > self.len() {
            return Err(Error::EndOfStream);
        }
        self.offset = offset;
        Ok(())
    }
}
