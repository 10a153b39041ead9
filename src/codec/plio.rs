//! PLIO_1 codec: IRAF pixel-list run-length encoding.
//!
//! A line list is a sequence of 16-bit words. Seven header words come
//! first:
//!
//! | word | meaning                                            |
//! |------|----------------------------------------------------|
//! | 0    | unused (0)                                         |
//! | 1    | offset of the first opcode word (7)                |
//! | 2    | form marker: negative (-100) for this full layout  |
//! | 3, 4 | total word count as `lo + (hi << 15)`              |
//! | 5, 6 | unused (0)                                         |
//!
//! Older streams may use the compact three-word header instead.  Its word 2
//! is positive and holds the total word count, and opcodes start at word 3.
//!
//! Every following word is `opcode << 12 | data`:
//!
//! | op | effect                                                  |
//! |----|---------------------------------------------------------|
//! | 0  | `data` zeros                                            |
//! | 1  | `pv = (next_word << 12) + data` (two words)             |
//! | 2  | `pv += data`                                            |
//! | 3  | `pv -= data`                                            |
//! | 4  | `data` pixels of `pv`                                   |
//! | 5  | `data - 1` zeros, then one pixel of `pv`                |
//! | 6  | `pv += data`, then one pixel of `pv`                    |
//! | 7  | `pv -= data`, then one pixel of `pv`                    |
//!
//! Compressed tiles are stored as these words in native byte order.

use std::marker::PhantomData;

use byteorder::{ByteOrder, NativeEndian};

use crate::error::{Result, TileCompError};
use crate::tile::IntegerSample;

use super::option::CompressOption;
use super::traits::TileCodec;

/// Largest pixel value the codec accepts (24 bits).
pub const MAX_PIXEL_VALUE: i32 = (1 << 24) - 1;

/// Largest value of a 12-bit data field.
const MAX_DATA: i32 = 0x0FFF;

/// Full-form header; words 3 and 4 are patched with the total length.
const HEADER: [i16; 7] = [0, 7, -100, 0, 0, 0, 0];

const FIRST_OPCODE_FIELD: usize = 1;
const FORM_FIELD: usize = 2;
const LENGTH_LO_FIELD: usize = 3;
const LENGTH_HI_FIELD: usize = 4;
const COMPACT_HEADER_LEN: usize = 3;
const LENGTH_SPLIT: usize = 1 << 15;

const OP_SET_VALUE: i32 = 1 << 12;
const OP_INCREMENT: i32 = 2 << 12;
const OP_DECREMENT: i32 = 3 << 12;
const OP_VALUE_RUN: i32 = 4 << 12;
/// Turns an increment/decrement (2, 3) into its pixel-emitting form (6, 7).
const EMIT_PIXEL: i32 = 4 << 12;
/// Turns a zero run of `n` into opcode 5 with data `n + 1`.
const ZERO_RUN_THEN_PIXEL: i32 = (5 << 12) + 1;

/// Encode pixels into a line list, header included.
///
/// Negative pixels are encoded as 0.
pub fn encode_line(pixels: &[i32]) -> Vec<i16> {
    let mut ll = HEADER.to_vec();
    let npix = pixels.len();
    if npix == 0 {
        patch_length(&mut ll);
        return ll;
    }

    let xe = npix - 1;
    let mut pv = pixels[0].max(0);
    let mut nv = 0;
    let mut x1 = 0usize;
    let mut iz = 0usize;
    let mut hi = 1i32;

    for ip in 0..npix {
        if ip < xe {
            nv = pixels[ip + 1].max(0);
            if nv == pv {
                continue;
            }
            if pv == 0 {
                pv = nv;
                x1 = ip + 1;
                continue;
            }
        } else if pv == 0 {
            x1 = npix;
        }

        // Flush zeros [iz, x1) followed by pixels of pv over [x1, ip].
        let mut np = (ip + 1 - x1) as i32;
        let mut nz = (x1 - iz) as i32;
        let mut flushed = false;

        if pv > 0 {
            let dv = pv - hi;
            if dv != 0 {
                hi = pv;
                if dv.abs() > MAX_DATA {
                    ll.push(((pv & MAX_DATA) + OP_SET_VALUE) as i16);
                    ll.push((pv / (MAX_DATA + 1)) as i16);
                } else {
                    let word = if dv < 0 {
                        -dv + OP_DECREMENT
                    } else {
                        dv + OP_INCREMENT
                    };
                    if np == 1 && nz == 0 {
                        ll.push((word | EMIT_PIXEL) as i16);
                        flushed = true;
                    } else {
                        ll.push(word as i16);
                    }
                }
            }
        }

        if !flushed && nz > 0 {
            while nz > 0 {
                ll.push(nz.min(MAX_DATA) as i16);
                nz -= MAX_DATA;
            }
            // A full 4095 chunk would carry into opcode 6.
            let last = ll.len() - 1;
            if np == 1 && pv > 0 && i32::from(ll[last]) < MAX_DATA {
                ll[last] = (i32::from(ll[last]) + ZERO_RUN_THEN_PIXEL) as i16;
                flushed = true;
            }
        }

        if !flushed {
            while np > 0 {
                ll.push((np.min(MAX_DATA) + OP_VALUE_RUN) as i16);
                np -= MAX_DATA;
            }
        }

        x1 = ip + 1;
        iz = x1;
        pv = nv;
    }

    patch_length(&mut ll);
    ll
}

fn patch_length(ll: &mut [i16]) {
    let total = ll.len();
    ll[LENGTH_LO_FIELD] = (total % LENGTH_SPLIT) as i16;
    ll[LENGTH_HI_FIELD] = (total / LENGTH_SPLIT) as i16;
}

/// Locate the opcode words of a line list: `(first, end)` word indices.
fn opcode_bounds(ll: &[i16]) -> Result<(usize, usize)> {
    if ll.len() < COMPACT_HEADER_LEN {
        return Err(TileCompError::Decode(format!(
            "line list of {} words has no header",
            ll.len()
        )));
    }

    let (first, end) = if ll[FORM_FIELD] > 0 {
        (COMPACT_HEADER_LEN, ll[FORM_FIELD] as usize)
    } else {
        if ll.len() < HEADER.len() {
            return Err(TileCompError::Decode(format!(
                "line list of {} words is shorter than its header",
                ll.len()
            )));
        }
        let lo = ll[LENGTH_LO_FIELD];
        let hi = ll[LENGTH_HI_FIELD];
        let first = ll[FIRST_OPCODE_FIELD];
        if lo < 0 || hi < 0 || first < 0 {
            return Err(TileCompError::Decode(format!(
                "corrupt line list header: first={}, length={}/{}",
                first, lo, hi
            )));
        }
        (first as usize, ((hi as usize) << 15) + lo as usize)
    };

    if end > ll.len() {
        return Err(TileCompError::Decode(format!(
            "line list declares {} words but only {} are present",
            end,
            ll.len()
        )));
    }
    Ok((first, end))
}

/// Decode a line list into exactly `out.len()` pixels.
///
/// Runs are clipped at the end of `out`, and every position the opcodes do
/// not reach is set to 0.
pub fn decode_line(ll: &[i16], out: &mut [i32]) -> Result<()> {
    let (first, end) = opcode_bounds(ll)?;
    let npix = out.len();
    let xe = npix as i64 - 1;

    let mut op = 0usize;
    let mut x1 = 0i64;
    let mut pv = 1i32;
    let mut ip = first;

    while ip < end && x1 <= xe {
        let word = ll[ip] as u16;
        let opcode = word >> 12;
        let data = i32::from(word & MAX_DATA as u16);

        match opcode {
            0 | 4 | 5 => {
                let x2 = x1 + i64::from(data) - 1;
                let i2 = x2.min(xe);
                let np = i2 - x1.max(0) + 1;
                if np > 0 {
                    let otop = op + np as usize - 1;
                    let fill = if opcode == 4 { pv } else { 0 };
                    out[op..=otop].fill(fill);
                    if opcode == 5 && i2 == x2 {
                        out[otop] = pv;
                    }
                    op = otop + 1;
                }
                x1 = x2 + 1;
            }
            1 => {
                let high = *ll.get(ip + 1).filter(|_| ip + 1 < end).ok_or_else(|| {
                    TileCompError::Decode(format!("set-value opcode at word {} is truncated", ip))
                })?;
                pv = (i32::from(high) << 12) + data;
                ip += 1;
            }
            2 => pv = pv.wrapping_add(data),
            3 => pv = pv.wrapping_sub(data),
            6 | 7 => {
                pv = if opcode == 6 {
                    pv.wrapping_add(data)
                } else {
                    pv.wrapping_sub(data)
                };
                if x1 >= 0 && x1 <= xe {
                    out[op] = pv;
                    op += 1;
                }
                x1 += 1;
            }
            _ => {
                return Err(TileCompError::Decode(format!(
                    "invalid opcode {} in word {:#06x} at index {}",
                    opcode, word, ip
                )));
            }
        }
        ip += 1;
    }

    out[op..].fill(0);
    Ok(())
}

/// PLIO_1 tile codec for integer samples.
pub struct PlioCodec<T> {
    pixels: Vec<i32>,
    _sample: PhantomData<fn() -> T>,
}

impl<T: IntegerSample> PlioCodec<T> {
    /// Create a codec instance. PLIO takes no options.
    pub fn new() -> Self {
        Self {
            pixels: Vec::new(),
            _sample: PhantomData,
        }
    }

    /// Factory used by the codec registry.
    pub fn create(option: &CompressOption) -> Result<Box<dyn TileCodec<T>>> {
        if !option.is_null() {
            return Err(TileCompError::InvalidOption(format!(
                "PLIO takes no option, got {:?}",
                option
            )));
        }
        Ok(Box::new(Self::new()))
    }
}

impl<T: IntegerSample> Default for PlioCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: IntegerSample> TileCodec<T> for PlioCodec<T> {
    fn compress(&mut self, input: &[T], output: &mut Vec<u8>) -> Result<()> {
        self.pixels.clear();
        self.pixels.reserve(input.len());
        for (i, &sample) in input.iter().enumerate() {
            match sample.to_i32() {
                Some(v) if (0..=MAX_PIXEL_VALUE).contains(&v) => self.pixels.push(v),
                _ => {
                    return Err(TileCompError::Declined(format!(
                        "pixel {} = {:?} is outside 0..={}",
                        i, sample, MAX_PIXEL_VALUE
                    )));
                }
            }
        }

        let words = encode_line(&self.pixels);
        let start = output.len();
        output.resize(start + words.len() * 2, 0);
        NativeEndian::write_i16_into(&words, &mut output[start..]);

        log::trace!(
            "PLIO encoded {} pixels into {} words",
            input.len(),
            words.len()
        );
        Ok(())
    }

    fn decompress(&mut self, input: &[u8], output: &mut [T]) -> Result<()> {
        if input.len() % 2 != 0 {
            return Err(TileCompError::Decode(format!(
                "PLIO stream has odd length {}",
                input.len()
            )));
        }
        let mut words = vec![0i16; input.len() / 2];
        NativeEndian::read_i16_into(input, &mut words);

        self.pixels.clear();
        self.pixels.resize(output.len(), 0);
        decode_line(&words, &mut self.pixels)?;

        for (i, (dst, &v)) in output.iter_mut().zip(&self.pixels).enumerate() {
            *dst = T::from_i32(v).ok_or_else(|| {
                TileCompError::Decode(format!("decoded pixel {} = {} does not fit the tile", i, v))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(pixels: &[i32]) -> Vec<i32> {
        let ll = encode_line(pixels);
        let mut out = vec![-1; pixels.len()];
        decode_line(&ll, &mut out).unwrap();
        out
    }

    fn header_length(ll: &[i16]) -> usize {
        ((ll[LENGTH_HI_FIELD] as usize) << 15) + ll[LENGTH_LO_FIELD] as usize
    }

    /// Small deterministic generator for run-heavy test images.
    fn run_image(len: usize, seed: u32) -> Vec<i32> {
        let mut state = seed;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state
        };
        let mut pixels = Vec::with_capacity(len);
        while pixels.len() < len {
            let run = (next() % 40 + 1) as usize;
            let value = match next() % 4 {
                0 | 1 => 0,
                2 => (next() % 16) as i32,
                _ => (next() % 200_000) as i32,
            };
            let take = run.min(len - pixels.len());
            pixels.extend(std::iter::repeat(value).take(take));
        }
        pixels
    }

    #[test]
    fn test_reference_vector_words() {
        let pixels = [0, 0, 0, 5, 5, 5, 5, 0, 0, 3];
        let ll = encode_line(&pixels);

        assert_eq!(&ll[..7], &[0, 7, -100, 12, 0, 0, 0]);
        assert_eq!(
            &ll[7..],
            &[0x2004, 3, 0x4004, 0x3002, 0x5003].map(|w: i32| w as i16)
        );
        assert_eq!(roundtrip(&pixels), pixels);
    }

    #[test]
    fn test_long_zero_run_is_chunked() {
        let pixels = vec![0; 5000];
        let ll = encode_line(&pixels);

        assert_eq!(&ll[7..], &[4095, 905]);
        assert_eq!(roundtrip(&pixels), pixels);
    }

    #[test]
    fn test_header_length_matches_word_count() {
        for seed in 1..20 {
            let pixels = run_image(3000, seed);
            let ll = encode_line(&pixels);
            assert_eq!(header_length(&ll), ll.len());
            assert_eq!(ll[FIRST_OPCODE_FIELD], 7);
            assert!(ll[FORM_FIELD] < 0);
        }
    }

    #[test]
    fn test_length_above_15_bits_is_split() {
        let pixels: Vec<i32> = (0..40_000).map(|i| (i % 2) * 7 + 1).collect();
        let ll = encode_line(&pixels);
        assert!(ll.len() > LENGTH_SPLIT);
        assert_eq!(ll[LENGTH_HI_FIELD], 1);
        assert_eq!(header_length(&ll), ll.len());
        assert_eq!(roundtrip(&pixels), pixels);
    }

    #[test]
    fn test_edge_sequences_roundtrip() {
        let cases: Vec<Vec<i32>> = vec![
            vec![],
            vec![0],
            vec![1],
            vec![9],
            vec![70_000],
            vec![0; 17],
            vec![42; 9000],
            (0..500).collect(),
            (1..500).rev().collect(),
            vec![5, 0, 5, 0, 5],
            vec![1, 100_000, 1, 100_000, 3, 3, 0, 16_777_215],
        ];
        for pixels in cases {
            assert_eq!(roundtrip(&pixels), pixels, "pixels {:?}", pixels);
        }
    }

    #[test]
    fn test_random_runs_roundtrip() {
        for seed in 1..50 {
            let pixels = run_image(2500, seed * 7919);
            assert_eq!(roundtrip(&pixels), pixels);
        }
    }

    #[test]
    fn test_single_pixel_after_full_zero_chunk() {
        let mut pixels = vec![0; 4095];
        pixels.push(7);
        let ll = encode_line(&pixels);

        assert_eq!(&ll[7..], &[0x2006, 4095, 0x4001].map(|w: i32| w as i16));
        assert_eq!(roundtrip(&pixels), pixels);

        let mut pixels = vec![0; 8190];
        pixels.push(3);
        assert_eq!(roundtrip(&pixels), pixels);
    }

    #[test]
    fn test_single_pixel_after_short_zero_run_merges() {
        let ll = encode_line(&[0, 0, 1]);
        assert_eq!(&ll[7..], &[0x5003]);
    }

    #[test]
    fn test_run_clipped_to_npix() {
        // Run of 100 pixels at pv = 1, decoded into 10 slots.
        let mut ll = HEADER.to_vec();
        ll.push((OP_VALUE_RUN + 100) as i16);
        ll.push((OP_VALUE_RUN + 100) as i16);
        patch_length(&mut ll);

        let mut out = vec![-1; 10];
        decode_line(&ll, &mut out).unwrap();
        assert_eq!(out, vec![1; 10]);
    }

    #[test]
    fn test_unreached_positions_zero_filled() {
        // Three zeros, then two pixels of 1; the rest comes from zero fill.
        let mut ll = HEADER.to_vec();
        ll.push(3);
        ll.push((OP_VALUE_RUN + 2) as i16);
        patch_length(&mut ll);

        let mut out = vec![-1; 8];
        decode_line(&ll, &mut out).unwrap();
        assert_eq!(out, vec![0, 0, 0, 1, 1, 0, 0, 0]);
    }

    #[test]
    fn test_compact_header_form() {
        // Compact form: word 2 holds the total length, opcodes start at 3.
        let ll = [0, 0, 5, 0x2004, 0x4003];
        let mut out = vec![-1; 5];
        decode_line(&ll, &mut out).unwrap();
        assert_eq!(out, vec![5, 5, 5, 0, 0]);
    }

    #[test]
    fn test_words_past_declared_length_ignored() {
        let mut ll = encode_line(&[2, 2]);
        ll.push((OP_VALUE_RUN + 50) as i16);
        let mut out = vec![-1; 4];
        decode_line(&ll, &mut out).unwrap();
        assert_eq!(out, vec![2, 2, 0, 0]);
    }

    #[test]
    fn test_decode_rejects_truncated_stream() {
        let ll = encode_line(&[0, 0, 5, 5, 9]);
        let mut out = vec![0; 5];
        assert!(decode_line(&ll[..ll.len() - 1], &mut out).is_err());
        assert!(decode_line(&ll[..2], &mut out).is_err());
    }

    #[test]
    fn test_decode_rejects_truncated_set_value() {
        let mut ll = HEADER.to_vec();
        ll.push((OP_SET_VALUE + 5) as i16);
        patch_length(&mut ll);
        let mut out = vec![0; 3];
        assert!(decode_line(&ll, &mut out).is_err());
    }

    #[test]
    fn test_decode_rejects_high_bit_word() {
        let mut ll = HEADER.to_vec();
        ll.push(-1);
        patch_length(&mut ll);
        let mut out = vec![0; 3];
        assert!(decode_line(&ll, &mut out).is_err());
    }

    #[test]
    fn test_typed_codec_roundtrip_bytes() {
        let pixels: Vec<u8> = vec![0, 0, 255, 255, 255, 1, 0, 0, 0, 0, 200];
        let mut codec = PlioCodec::<u8>::new();
        let mut bytes = Vec::new();
        codec.compress(&pixels, &mut bytes).unwrap();

        let mut out = vec![0u8; pixels.len()];
        codec.decompress(&bytes, &mut out).unwrap();
        assert_eq!(out, pixels);
    }

    #[test]
    fn test_typed_codec_declines_negative_and_large() {
        let mut codec = PlioCodec::<i16>::new();
        let mut bytes = Vec::new();
        assert!(matches!(
            codec.compress(&[1, -1, 2], &mut bytes),
            Err(TileCompError::Declined(_))
        ));

        let mut codec = PlioCodec::<i32>::new();
        assert!(matches!(
            codec.compress(&[MAX_PIXEL_VALUE + 1], &mut bytes),
            Err(TileCompError::Declined(_))
        ));
    }

    #[test]
    fn test_typed_codec_rejects_values_too_wide_for_tile() {
        let ll = encode_line(&[300, 300]);
        let mut bytes = vec![0u8; ll.len() * 2];
        NativeEndian::write_i16_into(&ll, &mut bytes);

        let mut out = [0u8; 2];
        let mut codec = PlioCodec::<u8>::new();
        assert!(matches!(
            codec.decompress(&bytes, &mut out),
            Err(TileCompError::Decode(_))
        ));
    }

    #[test]
    fn test_factory_rejects_foreign_option() {
        let option = CompressOption::Gzip(Default::default());
        assert!(PlioCodec::<i32>::create(&option).is_err());
        assert!(PlioCodec::<i32>::create(&CompressOption::Null).is_ok());
    }
}
