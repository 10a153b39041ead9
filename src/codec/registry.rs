//! Codec registry: resolves an algorithm triple to a [`CodecControl`].
//!
//! Resolution walks an explicit provider chain. Non-default providers are
//! asked in registration order and the first one returning a control wins.
//! If none does, the built-in provider looks the triple up in its static
//! binding table.

use std::sync::{Arc, OnceLock};

use serde::Serialize;

use crate::config::{algorithm, AlgorithmIdentity, RegistryConfig};
use crate::error::{Result, TileCompError};
use crate::tile::{ElementType, IntegerSample, PixelSample};

use super::control::{CodecControl, TypedControl};
use super::gzip::{self, GzipCodec};
use super::nocompress::NoCompressCodec;
use super::option::CompressOption;
use super::plio::PlioCodec;

/// A source of codec controls.
pub trait TileCompressorProvider: Send + Sync {
    /// Provider name, as listed in [`RegistryConfig::providers`].
    fn name(&self) -> &str;

    /// Create a control for the triple, or `Ok(None)` if this provider has
    /// no codec for it.
    fn create_control(
        &self,
        quantization: &str,
        compression: &str,
        element: ElementType,
    ) -> Result<Option<Arc<dyn CodecControl>>>;
}

/// Map a FITS `ZCMPTYPE` keyword to the token used in compressor names.
///
/// Unknown tokens are returned unchanged, so `PLIO` and `PLIO_1` name the
/// same codec. Matching is case-sensitive.
pub fn standard_compression_name(compression: &str) -> &str {
    match compression {
        algorithm::RICE_1 => "Rice",
        algorithm::PLIO_1 => "PLIO",
        algorithm::GZIP_1 => "GZip",
        algorithm::GZIP_2 => "GZip2",
        algorithm::HCOMPRESS_1 => "H",
        algorithm::NOCOMPRESS => "NoCompress",
        other => other,
    }
}

/// Canonical compressor name: `{Element}{Quant?}{Compression}Compressor`.
///
/// `""`, `none` and `NONE` quantization add no segment; any other token is
/// inserted verbatim.
pub fn compressor_name(quantization: &str, compression: &str, element: ElementType) -> String {
    let mut name = String::from(element.class_prefix());
    if !matches!(quantization, "" | "none" | "NONE") {
        name.push_str(quantization);
    }
    name.push_str(standard_compression_name(compression));
    name.push_str("Compressor");
    name
}

type BuildControl = fn(&'static str, AlgorithmIdentity) -> Result<Arc<dyn CodecControl>>;

/// One entry of the built-in codec table.
pub struct CodecBinding {
    /// Canonical compressor name matched by [`compressor_name`].
    pub name: &'static str,
    /// FITS compression keyword of the codec.
    pub compression: &'static str,
    /// Element type the codec is instantiated for.
    pub element: ElementType,
    build: BuildControl,
}

/// Serializable description of a [`CodecBinding`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodecInfo {
    /// Canonical compressor name.
    pub name: &'static str,
    /// FITS compression keyword.
    pub compression: &'static str,
    /// Element type.
    pub element: ElementType,
}

impl CodecBinding {
    /// Describe this binding.
    pub fn info(&self) -> CodecInfo {
        CodecInfo {
            name: self.name,
            compression: self.compression,
            element: self.element,
        }
    }
}

fn plio<T: IntegerSample>(
    name: &'static str,
    identity: AlgorithmIdentity,
) -> Result<Arc<dyn CodecControl>> {
    let control =
        TypedControl::<T>::new(name, identity, PlioCodec::<T>::create, CompressOption::null)?;
    Ok(Arc::new(control))
}

fn gzip1<T: PixelSample>(
    name: &'static str,
    identity: AlgorithmIdentity,
) -> Result<Arc<dyn CodecControl>> {
    let control =
        TypedControl::<T>::new(name, identity, GzipCodec::<T>::create, gzip::default_option)?;
    Ok(Arc::new(control))
}

fn gzip2<T: PixelSample>(
    name: &'static str,
    identity: AlgorithmIdentity,
) -> Result<Arc<dyn CodecControl>> {
    let control = TypedControl::<T>::new(
        name,
        identity,
        GzipCodec::<T>::create_shuffled,
        gzip::default_option,
    )?;
    Ok(Arc::new(control))
}

fn nocompress<T: PixelSample>(
    name: &'static str,
    identity: AlgorithmIdentity,
) -> Result<Arc<dyn CodecControl>> {
    let control = TypedControl::<T>::new(
        name,
        identity,
        NoCompressCodec::<T>::create,
        CompressOption::null,
    )?;
    Ok(Arc::new(control))
}

macro_rules! binding {
    ($name:literal, $compression:expr, $element:ident, $build:expr) => {
        CodecBinding {
            name: $name,
            compression: $compression,
            element: ElementType::$element,
            build: $build,
        }
    };
}

static BUILTIN_CODECS: &[CodecBinding] = &[
    binding!("BytePLIOCompressor", algorithm::PLIO_1, Int8, plio::<u8>),
    binding!("ShortPLIOCompressor", algorithm::PLIO_1, Int16, plio::<i16>),
    binding!("IntPLIOCompressor", algorithm::PLIO_1, Int32, plio::<i32>),
    binding!("ByteGZip2Compressor", algorithm::GZIP_2, Int8, gzip2::<u8>),
    binding!("ShortGZip2Compressor", algorithm::GZIP_2, Int16, gzip2::<i16>),
    binding!("IntGZip2Compressor", algorithm::GZIP_2, Int32, gzip2::<i32>),
    binding!("LongGZip2Compressor", algorithm::GZIP_2, Int64, gzip2::<i64>),
    binding!("ByteGZipCompressor", algorithm::GZIP_1, Int8, gzip1::<u8>),
    binding!("ShortGZipCompressor", algorithm::GZIP_1, Int16, gzip1::<i16>),
    binding!("IntGZipCompressor", algorithm::GZIP_1, Int32, gzip1::<i32>),
    binding!("LongGZipCompressor", algorithm::GZIP_1, Int64, gzip1::<i64>),
    binding!("FloatGZipCompressor", algorithm::GZIP_1, Float32, gzip1::<f32>),
    binding!("DoubleGZipCompressor", algorithm::GZIP_1, Float64, gzip1::<f64>),
    binding!("ByteNoCompressCompressor", algorithm::NOCOMPRESS, Int8, nocompress::<u8>),
    binding!("ShortNoCompressCompressor", algorithm::NOCOMPRESS, Int16, nocompress::<i16>),
    binding!("IntNoCompressCompressor", algorithm::NOCOMPRESS, Int32, nocompress::<i32>),
    binding!("LongNoCompressCompressor", algorithm::NOCOMPRESS, Int64, nocompress::<i64>),
    binding!("FloatNoCompressCompressor", algorithm::NOCOMPRESS, Float32, nocompress::<f32>),
    binding!("DoubleNoCompressCompressor", algorithm::NOCOMPRESS, Float64, nocompress::<f64>),
];

/// Look a triple up in a binding table by canonical name.
fn lookup(
    table: &[CodecBinding],
    quantization: &str,
    compression: &str,
    element: ElementType,
) -> Result<Option<Arc<dyn CodecControl>>> {
    let name = compressor_name(quantization, compression, element);
    let Some(binding) = table.iter().find(|b| b.name == name) else {
        return Ok(None);
    };

    let identity = AlgorithmIdentity::new(quantization, compression);
    let key = format!("{} ({}, {})", binding.name, identity, element);
    if binding.element != element {
        return Err(TileCompError::Construction {
            key,
            reason: format!("binding is declared for {}", binding.element),
        });
    }

    let control = (binding.build)(binding.name, identity)?;
    if control.element() != element {
        return Err(TileCompError::Construction {
            key,
            reason: format!("binding builds a {} codec", control.element()),
        });
    }
    Ok(Some(control))
}

/// The default provider, backed by the static built-in table.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinProvider;

impl BuiltinProvider {
    /// Name of the built-in provider.
    pub const NAME: &'static str = "builtin";

    /// The static binding table.
    pub fn bindings() -> &'static [CodecBinding] {
        BUILTIN_CODECS
    }
}

impl TileCompressorProvider for BuiltinProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn create_control(
        &self,
        quantization: &str,
        compression: &str,
        element: ElementType,
    ) -> Result<Option<Arc<dyn CodecControl>>> {
        lookup(BUILTIN_CODECS, quantization, compression, element)
    }
}

static GLOBAL_REGISTRY: OnceLock<CodecRegistry> = OnceLock::new();

/// Ordered provider chain with the built-in provider as fallback.
pub struct CodecRegistry {
    providers: Vec<Arc<dyn TileCompressorProvider>>,
    default_provider: Arc<dyn TileCompressorProvider>,
}

impl CodecRegistry {
    /// A registry with only the built-in provider.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            default_provider: Arc::new(BuiltinProvider),
        }
    }

    /// Append a provider; it is queried after those added before it.
    pub fn with_provider(mut self, provider: Arc<dyn TileCompressorProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Build the chain from a configured order.
    ///
    /// Configured names with no match in `available` are skipped with a
    /// warning. A name listed twice is an error.
    pub fn from_config(
        config: &RegistryConfig,
        available: Vec<Arc<dyn TileCompressorProvider>>,
    ) -> Result<Self> {
        let mut registry = Self::new();
        for (i, wanted) in config.providers.iter().enumerate() {
            if config.providers[..i].contains(wanted) {
                return Err(TileCompError::Config(format!(
                    "provider '{}' listed twice",
                    wanted
                )));
            }
            match available.iter().find(|p| p.name() == wanted) {
                Some(provider) => registry = registry.with_provider(Arc::clone(provider)),
                None => log::warn!(
                    "codec provider '{}' is not available in this build, skipping it",
                    wanted
                ),
            }
        }

        let skipped = available
            .iter()
            .filter(|p| !config.providers.iter().any(|n| n == p.name()))
            .count();
        if skipped > 0 {
            log::debug!(
                "{} available codec provider(s) not enabled by configuration",
                skipped
            );
        }
        Ok(registry)
    }

    /// Provider names in query order, the default provider last.
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers
            .iter()
            .chain(std::iter::once(&self.default_provider))
            .map(|p| p.name())
            .collect()
    }

    /// Resolve a control for the triple.
    ///
    /// `Ok(None)` means no provider has a codec for it. `Err` means a
    /// provider had one but could not build it.
    pub fn resolve(
        &self,
        quantization: &str,
        compression: &str,
        element: ElementType,
    ) -> Result<Option<Arc<dyn CodecControl>>> {
        for provider in &self.providers {
            if let Some(control) = provider.create_control(quantization, compression, element)? {
                log::debug!(
                    "resolved {}/{} for {} to {} via provider {}",
                    quantization,
                    compression,
                    element,
                    control.name(),
                    provider.name()
                );
                return Ok(Some(control));
            }
        }
        self.default_provider
            .create_control(quantization, compression, element)
    }

    /// Resolve a control for an identity.
    pub fn resolve_identity(
        &self,
        identity: &AlgorithmIdentity,
        element: ElementType,
    ) -> Result<Option<Arc<dyn CodecControl>>> {
        self.resolve(&identity.quantization, &identity.compression, element)
    }

    /// The process-wide registry, created on first use.
    pub fn global() -> &'static CodecRegistry {
        GLOBAL_REGISTRY.get_or_init(CodecRegistry::new)
    }

    /// Install the process-wide registry. Must happen before the first call
    /// to [`CodecRegistry::global`].
    pub fn install_global(registry: CodecRegistry) -> Result<()> {
        GLOBAL_REGISTRY
            .set(registry)
            .map_err(|_| TileCompError::Config("codec registry is already initialized".into()))
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}
