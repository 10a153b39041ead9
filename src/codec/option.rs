//! Codec options.

use serde::{Deserialize, Serialize};

/// Default gzip compression level.
pub const DEFAULT_GZIP_LEVEL: u32 = 6;

/// Per-call codec configuration.
///
/// Codecs that take no configuration receive [`CompressOption::Null`], so
/// callers never special-case "no option".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CompressOption {
    /// The canonical empty option.
    #[default]
    Null,
    /// Options for `GZIP_1` and `GZIP_2`.
    Gzip(GzipOption),
}

impl CompressOption {
    /// The canonical empty option.
    pub fn null() -> Self {
        CompressOption::Null
    }

    /// Whether this is the empty option.
    pub fn is_null(&self) -> bool {
        matches!(self, CompressOption::Null)
    }
}

/// Options for the gzip codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GzipOption {
    /// Deflate level, 0 (store) to 9 (best).
    pub level: u32,
}

impl Default for GzipOption {
    fn default() -> Self {
        Self {
            level: DEFAULT_GZIP_LEVEL,
        }
    }
}

impl From<GzipOption> for CompressOption {
    fn from(option: GzipOption) -> Self {
        CompressOption::Gzip(option)
    }
}
