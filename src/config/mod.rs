//! Configuration types: algorithm identities, pipeline settings and the
//! provider order of the codec registry.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::codec::CompressOption;
use crate::error::{Result, TileCompError};
use crate::tile::ElementType;

/// Nominal (quantization, compression) algorithm pair.
///
/// Both tokens are opaque and compared case-sensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlgorithmIdentity {
    /// Quantization algorithm token (`none` for integer data).
    pub quantization: String,
    /// Compression algorithm token, e.g. `PLIO_1`.
    pub compression: String,
}

impl AlgorithmIdentity {
    /// Create an identity from its two tokens.
    pub fn new(quantization: impl Into<String>, compression: impl Into<String>) -> Self {
        Self {
            quantization: quantization.into(),
            compression: compression.into(),
        }
    }
}

impl fmt::Display for AlgorithmIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.quantization, self.compression)
    }
}

/// FITS `ZCMPTYPE` compression algorithm keywords.
pub mod algorithm {
    /// Rice compression.
    pub const RICE_1: &str = "RICE_1";
    /// IRAF pixel-list compression.
    pub const PLIO_1: &str = "PLIO_1";
    /// gzip over sample bytes.
    pub const GZIP_1: &str = "GZIP_1";
    /// gzip over byte-shuffled sample bytes.
    pub const GZIP_2: &str = "GZIP_2";
    /// H-transform compression.
    pub const HCOMPRESS_1: &str = "HCOMPRESS_1";
    /// Raw samples.
    pub const NOCOMPRESS: &str = "NOCOMPRESS";
    /// Quantization token for unquantized data.
    pub const QUANT_NONE: &str = "none";
}

/// Settings for a [`crate::pipeline::TilePipeline`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Quantization algorithm token.
    pub quantization: String,
    /// Compression algorithm token.
    pub compression: String,
    /// Element type of every tile.
    pub element: ElementType,
    /// Samples per tile when splitting a flat sample stream.
    pub tile_len: usize,
    /// Codec option; the control's default option is used when absent.
    pub option: Option<CompressOption>,
    /// Verify each compressed tile by round-trip decode.
    pub verify: bool,
    /// Worker threads for tile processing.
    pub max_parallel: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            quantization: algorithm::QUANT_NONE.to_string(),
            compression: algorithm::PLIO_1.to_string(),
            element: ElementType::Int32,
            tile_len: 4096,
            option: None,
            verify: true,
            max_parallel: num_cpus::get(),
        }
    }
}

impl PipelineConfig {
    /// Configuration for the given compression algorithm and element type.
    pub fn new(compression: impl Into<String>, element: ElementType) -> Self {
        Self {
            compression: compression.into(),
            element,
            ..Default::default()
        }
    }

    /// Algorithm identity of this configuration.
    pub fn identity(&self) -> AlgorithmIdentity {
        AlgorithmIdentity::new(self.quantization.clone(), self.compression.clone())
    }

    /// Check the settings for values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.tile_len == 0 {
            return Err(TileCompError::Config("tile_len must be at least 1".into()));
        }
        if self.max_parallel == 0 {
            return Err(TileCompError::Config("max_parallel must be at least 1".into()));
        }
        if self.compression.is_empty() {
            return Err(TileCompError::Config("compression algorithm is empty".into()));
        }
        Ok(())
    }
}

/// Provider order for [`crate::codec::CodecRegistry::from_config`].
///
/// Names the non-default providers to enable, in query order. The built-in
/// provider is always consulted last and is not listed here. Names with no
/// provider available in the running program are skipped with a warning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Provider names, queried first to last.
    pub providers: Vec<String>,
}

/// Top-level settings file.
///
/// ```toml
/// [pipeline]
/// compression = "GZIP_2"
/// element = "int16"
/// tile_len = 1024
/// option = { kind = "gzip", level = 9 }
///
/// [registry]
/// providers = ["site-rice"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Pipeline settings.
    pub pipeline: PipelineConfig,
    /// Registry provider order.
    pub registry: RegistryConfig,
}

impl Settings {
    /// Parse settings from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(text)?;
        settings.pipeline.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        log::debug!("Loaded settings from {}", path.as_ref().display());
        Self::from_toml_str(&text)
    }
}
