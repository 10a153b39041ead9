//! Tile codecs and the registry that resolves them.
//!
//! This module provides the [`TileCodec`] trait, the [`CodecControl`]
//! adapter each resolved binding is handed out as, and implementations for:
//! - PLIO_1 (IRAF pixel lists, integer tiles)
//! - GZIP_1 and GZIP_2 (via flate2)
//! - NOCOMPRESS (raw samples)

mod control;
pub mod gzip;
mod nocompress;
mod option;
pub mod plio;
mod registry;
mod traits;

pub use control::{CodecControl, TypedControl};
pub use gzip::GzipCodec;
pub use nocompress::NoCompressCodec;
pub use option::{CompressOption, GzipOption, DEFAULT_GZIP_LEVEL};
pub use plio::PlioCodec;
pub use registry::{
    compressor_name, standard_compression_name, BuiltinProvider, CodecBinding, CodecInfo,
    CodecRegistry, TileCompressorProvider,
};
pub use traits::{CodecFactory, TileCodec};
