//! Codec trait definitions.

use crate::error::Result;
use crate::tile::PixelSample;

use super::option::CompressOption;

/// A lossless tile codec for one element type.
///
/// Instances are single-use working objects: a control creates one per call
/// and drops it afterwards, so implementations are free to keep scratch
/// state in fields.
pub trait TileCodec<T: PixelSample>: Send {
    /// Compress `input`, appending the encoded stream to `output`.
    ///
    /// Returns [`crate::error::TileCompError::Declined`] when the input cannot
    /// be represented by this codec.
    fn compress(&mut self, input: &[T], output: &mut Vec<u8>) -> Result<()>;

    /// Decode `input` into `output`, filling every sample.
    fn decompress(&mut self, input: &[u8], output: &mut [T]) -> Result<()>;
}

/// Builds a codec instance from an option.
pub type CodecFactory<T> = fn(&CompressOption) -> Result<Box<dyn TileCodec<T>>>;
