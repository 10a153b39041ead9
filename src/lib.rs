//! FITS tiled image compression codecs.
//!
//! Compresses tiles (contiguous runs of samples of one element type) with
//! the algorithms of the FITS tiled image convention, and resolves the codec
//! for an algorithm and element type through an ordered provider chain.
//!
//! # Codecs
//!
//! - **PLIO_1**: IRAF pixel-list run-length encoding for integer masks
//! - **GZIP_1 / GZIP_2**: deflate over big-endian samples, GZIP_2 byte-shuffled
//! - **NOCOMPRESS**: raw big-endian samples
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use fits_tilecomp::{CodecRegistry, ElementType, TileData};
//!
//! let control = CodecRegistry::global()
//!     .resolve("none", "PLIO_1", ElementType::Int32)?
//!     .expect("PLIO is built in");
//!
//! let pixels = [0i32, 0, 0, 5, 5, 5, 5, 0, 0, 3];
//! let mut stream = Vec::new();
//! assert!(control.compress(TileData::from(&pixels[..]), &mut stream, &control.new_option()));
//! ```
//!
//! Compression never fails loudly: a codec that cannot represent a tile
//! returns `false` and leaves the output untouched, and the caller stores
//! the tile raw. Decompression failures are errors.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod tile;

// Re-export commonly used types
pub use codec::{
    CodecControl, CodecInfo, CodecRegistry, CompressOption, GzipOption, TileCodec,
    TileCompressorProvider,
};
pub use config::{AlgorithmIdentity, PipelineConfig, RegistryConfig, Settings};
pub use error::{Result, TileCompError};
pub use pipeline::{CompressedTile, PipelineStats, TileEncoding, TilePipeline};
pub use tile::{ElementType, TileBuffer, TileData, TileDataMut};

/// Library version information.
pub mod version {
    /// Library version string.
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");

    /// Library name.
    pub const NAME: &str = env!("CARGO_PKG_NAME");

    /// Get full version string.
    pub fn full_version() -> String {
        format!("{} {}", NAME, VERSION)
    }
}
