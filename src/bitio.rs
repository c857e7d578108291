//! Bit-level writer/reader layered over a byte stream, used by the dynamic
//! histogram's packed count storage and the serialization codec's
//! fixed-width count sections. The accumulator here is a single pending
//! byte rather than a 64-bit buffer (the `bitvec`/`bitcode`-style approach
//! seen elsewhere in the retrieval pack) — chunk widths are bounded but
//! arbitrary, and writing one bit at a time keeps the MSB-first framing
//! obviously correct rather than merely fast.

use std::io::{Read, Write};

use crate::error::{Error, Result};

/// Writes arbitrary-width (0-64 bit) chunks into a byte stream, most
/// significant bit first, flushing whole bytes as they fill up.
pub struct BitOutput<W> {
    writer: W,
    pending_byte: u8,
    pending_bits: u32,
}

impl<W: Write> BitOutput<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            pending_byte: 0,
            pending_bits: 0,
        }
    }

    /// Writes the low `num_bits` bits of `value` (0..=64), most significant
    /// bit first. Bits above `num_bits` in `value` are ignored.
    pub fn write(&mut self, num_bits: u32, value: u64) -> Result<()> {
        debug_assert!(num_bits <= 64);
        for i in (0..num_bits).rev() {
            let bit = ((value >> i) & 1) as u8;
            self.pending_byte = (self.pending_byte << 1) | bit;
            self.pending_bits += 1;
            if self.pending_bits == 8 {
                self.writer.write_all(&[self.pending_byte])?;
                self.pending_byte = 0;
                self.pending_bits = 0;
            }
        }
        Ok(())
    }

    /// Flushes any buffered bits as one final, zero-padded-on-the-right
    /// byte if needed, then returns the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        if self.pending_bits > 0 {
            let byte = self.pending_byte << (8 - self.pending_bits);
            self.writer.write_all(&[byte])?;
            self.pending_bits = 0;
        }
        Ok(self.writer)
    }
}

/// Reads arbitrary-width (0-64 bit) chunks from a byte stream written by
/// [`BitOutput`].
pub struct BitInput<R> {
    reader: R,
    pending_byte: u8,
    pending_bits: u32,
}

impl<R: Read> BitInput<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pending_byte: 0,
            pending_bits: 0,
        }
    }

    /// Reads `num_bits` bits (0..=64), most significant bit first.
    pub fn read(&mut self, num_bits: u32) -> Result<u64> {
        debug_assert!(num_bits <= 64);
        let mut result: u64 = 0;
        for _ in 0..num_bits {
            if self.pending_bits == 0 {
                self.refill()?;
            }
            let bit = (self.pending_byte >> (self.pending_bits - 1)) & 1;
            self.pending_bits -= 1;
            result = (result << 1) | u64::from(bit);
        }
        Ok(result)
    }

    fn refill(&mut self) -> Result<()> {
        let mut byte = [0u8; 1];
        self.reader.read_exact(&mut byte).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                Error::MalformedData(
                    "unexpected end of stream while reading bit-packed data".to_string(),
                )
            } else {
                Error::Io(e)
            }
        })?;
        self.pending_byte = byte[0];
        self.pending_bits = 8;
        Ok(())
    }
}
