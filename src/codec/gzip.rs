//! GZIP_1 and GZIP_2 codecs.
//!
//! Both serialize samples big-endian, as FITS stores them. GZIP_2 shuffles
//! the bytes first (every sample's most significant byte, then the next, and
//! so on), which lets deflate see the slowly varying high bytes as long runs.

use std::io::{Read, Write};
use std::marker::PhantomData;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{Result, TileCompError};
use crate::tile::PixelSample;

use super::option::{CompressOption, GzipOption};
use super::traits::TileCodec;

/// gzip tile codec.
pub struct GzipCodec<T> {
    level: u32,
    shuffle: bool,
    _sample: PhantomData<fn() -> T>,
}

impl<T: PixelSample> GzipCodec<T> {
    /// Create a codec with the given deflate level.
    pub fn new(level: u32, shuffle: bool) -> Result<Self> {
        if level > 9 {
            return Err(TileCompError::InvalidOption(format!(
                "gzip level {} is outside 0..=9",
                level
            )));
        }
        Ok(Self {
            level,
            shuffle,
            _sample: PhantomData,
        })
    }

    /// Factory for `GZIP_1`.
    pub fn create(option: &CompressOption) -> Result<Box<dyn TileCodec<T>>> {
        let level = gzip_level(option)?;
        Ok(Box::new(Self::new(level, false)?))
    }

    /// Factory for `GZIP_2`.
    pub fn create_shuffled(option: &CompressOption) -> Result<Box<dyn TileCodec<T>>> {
        let level = gzip_level(option)?;
        Ok(Box::new(Self::new(level, true)?))
    }
}

fn gzip_level(option: &CompressOption) -> Result<u32> {
    match option {
        CompressOption::Gzip(GzipOption { level }) => Ok(*level),
        CompressOption::Null => Ok(GzipOption::default().level),
    }
}

/// Default option of the gzip codecs.
pub fn default_option() -> CompressOption {
    CompressOption::Gzip(GzipOption::default())
}

/// Group byte `j` of every `width`-byte sample together.
pub fn shuffle(bytes: &[u8], width: usize) -> Vec<u8> {
    let count = bytes.len() / width;
    let mut out = vec![0u8; bytes.len()];
    for (i, sample) in bytes.chunks_exact(width).enumerate() {
        for (j, &b) in sample.iter().enumerate() {
            out[j * count + i] = b;
        }
    }
    out
}

/// Inverse of [`shuffle`].
pub fn unshuffle(bytes: &[u8], width: usize) -> Vec<u8> {
    let count = bytes.len() / width;
    let mut out = vec![0u8; bytes.len()];
    for (i, sample) in out.chunks_exact_mut(width).enumerate() {
        for (j, b) in sample.iter_mut().enumerate() {
            *b = bytes[j * count + i];
        }
    }
    out
}

impl<T: PixelSample> TileCodec<T> for GzipCodec<T> {
    fn compress(&mut self, input: &[T], output: &mut Vec<u8>) -> Result<()> {
        let width = T::ELEMENT.byte_width();
        let mut raw = vec![0u8; input.len() * width];
        T::write_be(input, &mut raw);
        if self.shuffle && width > 1 {
            raw = shuffle(&raw, width);
        }

        let mut encoder = GzEncoder::new(output, Compression::new(self.level));
        encoder
            .write_all(&raw)
            .map_err(|e| TileCompError::Internal(format!("gzip compression failed: {}", e)))?;
        encoder
            .finish()
            .map_err(|e| TileCompError::Internal(format!("gzip compression failed: {}", e)))?;
        Ok(())
    }

    fn decompress(&mut self, input: &[u8], output: &mut [T]) -> Result<()> {
        let width = T::ELEMENT.byte_width();
        let expected = output.len() * width;

        let mut raw = Vec::with_capacity(expected);
        GzDecoder::new(input)
            .read_to_end(&mut raw)
            .map_err(|e| TileCompError::Decode(format!("gzip decompression failed: {}", e)))?;

        if raw.len() != expected {
            return Err(TileCompError::Decode(format!(
                "decompressed size {} doesn't match expected {}",
                raw.len(),
                expected
            )));
        }
        if self.shuffle && width > 1 {
            raw = unshuffle(&raw, width);
        }
        T::read_be(&raw, output);
        Ok(())
    }
}
