//! The binary wire format (version 0): a self-describing, space-optimized
//! encoding of a histogram's layout-independent state (everything but the
//! layout itself, which the reader must already have agreed on out of
//! band).
//!
//! Byte-level primitives are shared with the rest of the crate: fixed-width
//! fields go through [`byteorder`]'s `BigEndian` extension traits (grounded
//! on `other_examples/.../HdrHistogram_rust__src-serialization-v2_serializer.rs`,
//! which uses the same crate for its own header fields), variable-length
//! integers through [`crate::varint`], and the bit-packed bin-count section
//! through [`crate::bitio`] at the same mode-to-cell-width mapping
//! [`crate::histogram::DynamicHistogram`] uses for its in-memory storage.
//!
//! There is no separate builder trait: the reader drives a freshly created
//! [`Histogram`] through its own crate-internal mutation primitives
//! (`increment`, `set_min_max`), which is all the spec's builder interface
//! (`setMinValue`/`incrementUnderflow`/.../`build`) amounts to once the
//! three container shapes already live behind one enum.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use tracing::{error, instrument};

use crate::bitio::{BitInput, BitOutput};
use crate::error::{Error, Result};
use crate::histogram::{cell_bits, mode_for_value, Histogram};
use crate::layout::Layout;
use crate::varint::{read_signed_varint, read_unsigned_varint, write_signed_varint, write_unsigned_varint};

const SERIAL_VERSION: u8 = 0;

const INFO_BIT_IS_MIN_SMALLER_OR_TOTAL_ONE: u8 = 1 << 3;
const INFO_BIT_UNDERFLOW_PRESENT: u8 = 1 << 6;
const INFO_BIT_OVERFLOW_PRESENT: u8 = 1 << 7;
const INFO_MASK_MODE: u8 = 0b0000_0111;
const INFO_SHIFT_EFF_REGULAR: u8 = 4;
const INFO_MASK_EFF_REGULAR: u8 = 0b0011_0000;

/// Writes `histogram` in the version-0 binary format.
#[instrument(skip(histogram, writer))]
pub fn write<W: Write>(histogram: &Histogram, writer: &mut W) -> Result<()> {
    writer.write_u8(SERIAL_VERSION)?;

    let total = histogram.get_total_count();
    if total == 0 {
        writer.write_u8(0)?;
        return Ok(());
    }

    let min = histogram.get_min();
    let max = histogram.get_max();
    if total == 1 {
        writer.write_u8(INFO_BIT_IS_MIN_SMALLER_OR_TOTAL_ONE)?;
        writer.write_f64::<BigEndian>(min)?;
        return Ok(());
    }

    let layout = histogram.get_layout();
    let underflow_idx = layout.underflow_bin_index();
    let overflow_idx = layout.overflow_bin_index();
    let min_bin = layout.map_to_bin_index(min);
    let max_bin = layout.map_to_bin_index(max);
    let is_min_smaller = min < max;

    let effective_underflow = histogram.get_underflow_count() - u64::from(min_bin <= underflow_idx);
    let effective_overflow = histogram.get_overflow_count() - u64::from(max_bin >= overflow_idx);

    // Every non-empty regular bin's count, with min's and max's own single
    // occurrence removed from whichever regular bin each landed in (their
    // values are recoverable from the `min`/`max` fields alone, so encoding
    // their contribution again here would be redundant).
    let mut effective_regular: BTreeMap<i32, u64> = BTreeMap::new();
    let mut it = histogram.first_non_empty_bin()?;
    loop {
        let bin = it.bin();
        if !bin.is_underflow_bin() && !bin.is_overflow_bin() {
            effective_regular.insert(bin.bin_index(), bin.count());
        }
        if it.is_last_non_empty_bin() {
            break;
        }
        it.next()?;
    }
    for bin_index in [min_bin, max_bin] {
        if bin_index > underflow_idx && bin_index < overflow_idx {
            if let Some(count) = effective_regular.get_mut(&bin_index) {
                *count -= 1;
                if *count == 0 {
                    effective_regular.remove(&bin_index);
                }
            }
        }
    }

    // The {1, 2}-bin compact path only omits count bytes when every bin in
    // it holds exactly one occurrence; otherwise fall back to explicitly
    // enumerating the full `[first, last]` range so the format stays
    // lossless regardless of how the mass within it is distributed.
    let compact = effective_regular.len() <= 2 && effective_regular.values().all(|&c| c == 1);
    let eff_regular_field: u8 = if effective_regular.is_empty() {
        0
    } else if compact {
        effective_regular.len() as u8
    } else {
        3
    };
    let mode = mode_for_value(effective_regular.values().copied().max().unwrap_or(0));

    let mut info = (mode + 1) & INFO_MASK_MODE;
    if is_min_smaller {
        info |= INFO_BIT_IS_MIN_SMALLER_OR_TOTAL_ONE;
    }
    info |= (eff_regular_field << INFO_SHIFT_EFF_REGULAR) & INFO_MASK_EFF_REGULAR;
    if effective_underflow >= 1 {
        info |= INFO_BIT_UNDERFLOW_PRESENT;
    }
    if effective_overflow >= 1 {
        info |= INFO_BIT_OVERFLOW_PRESENT;
    }
    writer.write_u8(info)?;

    writer.write_f64::<BigEndian>(min)?;
    if is_min_smaller {
        writer.write_f64::<BigEndian>(max)?;
    }
    if effective_underflow >= 1 {
        write_unsigned_varint(writer, effective_underflow - 1)?;
    }
    if effective_overflow >= 1 {
        write_unsigned_varint(writer, effective_overflow - 1)?;
    }

    if eff_regular_field >= 1 {
        let first = *effective_regular.keys().next().expect("non-empty checked above");
        write_signed_varint(writer, first as i64)?;
    }
    if eff_regular_field >= 2 {
        let last = *effective_regular.keys().next_back().expect("non-empty checked above");
        write_signed_varint(writer, last as i64)?;
    }
    if eff_regular_field >= 3 {
        let first = *effective_regular.keys().next().expect("non-empty checked above");
        let last = *effective_regular.keys().next_back().expect("non-empty checked above");
        let width = cell_bits(mode);
        let mut bits = BitOutput::new(writer);
        for bin_index in first..=last {
            let count = effective_regular.get(&bin_index).copied().unwrap_or(0);
            bits.write(width, count)?;
        }
        bits.finish()?;
    }

    Ok(())
}

/// Deserializes into a [`StaticHistogram`](crate::histogram::StaticHistogram).
pub fn read_as_static<R: Read>(reader: &mut R, layout: Layout) -> Result<Histogram> {
    read_raw(reader, layout, Shape::Static)
}

/// Deserializes into a [`DynamicHistogram`](crate::histogram::DynamicHistogram).
pub fn read_as_dynamic<R: Read>(reader: &mut R, layout: Layout) -> Result<Histogram> {
    read_raw(reader, layout, Shape::Dynamic)
}

/// Deserializes into a [`PreprocessedHistogram`](crate::histogram::PreprocessedHistogram).
pub fn read_as_preprocessed<R: Read>(reader: &mut R, layout: Layout) -> Result<Histogram> {
    Ok(read_raw(reader, layout, Shape::Dynamic)?.get_preprocessed_copy())
}

enum Shape {
    Static,
    Dynamic,
}

#[instrument(skip(reader, layout))]
fn read_raw<R: Read>(reader: &mut R, layout: Layout, shape: Shape) -> Result<Histogram> {
    let version = reader.read_u8()?;
    if version != SERIAL_VERSION {
        error!(version, "unknown serial version");
        return Err(Error::MalformedData(format!("unknown serial version {version}")));
    }

    let underflow_idx = layout.underflow_bin_index();
    let overflow_idx = layout.overflow_bin_index();
    let mut histogram = match shape {
        Shape::Static => Histogram::create_static(layout),
        Shape::Dynamic => Histogram::create_dynamic(layout),
    };

    let info = reader.read_u8()?;
    if info & INFO_MASK_MODE == 0 {
        if info & INFO_BIT_IS_MIN_SMALLER_OR_TOTAL_ONE == 0 {
            return Ok(histogram); // total == 0
        }
        let value = reader.read_f64::<BigEndian>()?;
        histogram.add_value(value)?;
        return Ok(histogram);
    }

    let mode = (info & INFO_MASK_MODE) - 1;
    let is_min_smaller = info & INFO_BIT_IS_MIN_SMALLER_OR_TOTAL_ONE != 0;
    let eff_regular_field = (info & INFO_MASK_EFF_REGULAR) >> INFO_SHIFT_EFF_REGULAR;
    let has_underflow = info & INFO_BIT_UNDERFLOW_PRESENT != 0;
    let has_overflow = info & INFO_BIT_OVERFLOW_PRESENT != 0;

    let min = reader.read_f64::<BigEndian>()?;
    let max = if is_min_smaller { reader.read_f64::<BigEndian>()? } else { min };

    if has_underflow {
        let effective = read_unsigned_varint(reader)? + 1;
        histogram.increment(underflow_idx, effective)?;
    }
    if has_overflow {
        let effective = read_unsigned_varint(reader)? + 1;
        histogram.increment(overflow_idx, effective)?;
    }

    // Re-add min's and max's own occurrence. `increment` routes to
    // whichever cell (underflow, overflow, or regular) the bin index
    // resolves to, so this is correct regardless of which region either
    // extreme falls in.
    let min_bin = histogram.get_layout().map_to_bin_index(min);
    histogram.increment(min_bin, 1)?;
    let max_bin = histogram.get_layout().map_to_bin_index(max);
    histogram.increment(max_bin, 1)?;

    if eff_regular_field >= 1 {
        let first = read_signed_varint(reader)? as i32;
        if eff_regular_field == 1 {
            histogram.increment(first, 1)?;
        } else {
            let last = read_signed_varint(reader)? as i32;
            if eff_regular_field == 2 {
                histogram.increment(first, 1)?;
                histogram.increment(last, 1)?;
            } else {
                let width = cell_bits(mode);
                let mut bits = BitInput::new(reader);
                for bin_index in first..=last {
                    let count = bits.read(width)?;
                    if count > 0 {
                        histogram.increment(bin_index, count)?;
                    }
                }
            }
        }
    }

    histogram.set_min_max(min, max);
    Ok(histogram)
}

/// Wraps [`write`] in a standard DEFLATE (zlib) stream.
#[cfg(feature = "compression")]
pub fn write_compressed<W: Write>(histogram: &Histogram, writer: W) -> Result<()> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;

    let mut encoder = ZlibEncoder::new(writer, Compression::default());
    write(histogram, &mut encoder)?;
    encoder.finish()?;
    Ok(())
}

#[cfg(feature = "compression")]
pub fn read_compressed_as_static<R: Read>(reader: R, layout: Layout) -> Result<Histogram> {
    use flate2::read::ZlibDecoder;
    read_as_static(&mut ZlibDecoder::new(reader), layout)
}

#[cfg(feature = "compression")]
pub fn read_compressed_as_dynamic<R: Read>(reader: R, layout: Layout) -> Result<Histogram> {
    use flate2::read::ZlibDecoder;
    read_as_dynamic(&mut ZlibDecoder::new(reader), layout)
}

#[cfg(feature = "compression")]
pub fn read_compressed_as_preprocessed<R: Read>(reader: R, layout: Layout) -> Result<Histogram> {
    use flate2::read::ZlibDecoder;
    read_as_preprocessed(&mut ZlibDecoder::new(reader), layout)
}
