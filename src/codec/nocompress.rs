//! NOCOMPRESS codec: tiles stored as raw big-endian samples.

use std::marker::PhantomData;

use crate::error::{Result, TileCompError};
use crate::tile::PixelSample;

use super::option::CompressOption;
use super::traits::TileCodec;

/// Passthrough codec.
pub struct NoCompressCodec<T>(PhantomData<fn() -> T>);

impl<T: PixelSample> NoCompressCodec<T> {
    /// Factory used by the codec registry.
    pub fn create(_option: &CompressOption) -> Result<Box<dyn TileCodec<T>>> {
        Ok(Box::new(NoCompressCodec(PhantomData)))
    }
}

impl<T: PixelSample> TileCodec<T> for NoCompressCodec<T> {
    fn compress(&mut self, input: &[T], output: &mut Vec<u8>) -> Result<()> {
        let start = output.len();
        output.resize(start + input.len() * T::ELEMENT.byte_width(), 0);
        T::write_be(input, &mut output[start..]);
        Ok(())
    }

    fn decompress(&mut self, input: &[u8], output: &mut [T]) -> Result<()> {
        let expected = output.len() * T::ELEMENT.byte_width();
        if input.len() < expected {
            return Err(TileCompError::Decode(format!(
                "raw tile has {} bytes, expected {}",
                input.len(),
                expected
            )));
        }
        T::read_be(&input[..expected], output);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_layout_is_big_endian() {
        let mut codec = NoCompressCodec::<i32>(PhantomData);
        let mut out = Vec::new();
        codec.compress(&[1, -1], &mut out).unwrap();
        assert_eq!(out, vec![0, 0, 0, 1, 0xFF, 0xFF, 0xFF, 0xFF]);

        let mut decoded = [0i32; 2];
        codec.decompress(&out, &mut decoded).unwrap();
        assert_eq!(decoded, [1, -1]);
    }

    #[test]
    fn test_short_input_rejected() {
        let mut codec = NoCompressCodec::<f32>(PhantomData);
        let mut decoded = [0f32; 2];
        assert!(codec.decompress(&[0; 7], &mut decoded).is_err());
    }
}
