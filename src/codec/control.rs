//! Codec controls: the uniform, type-erased face of one codec binding.

use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};

use crate::config::AlgorithmIdentity;
use crate::error::{Result, TileCompError};
use crate::tile::{ElementType, PixelSample, TileData, TileDataMut};

use super::option::CompressOption;
use super::traits::CodecFactory;

/// Lifecycle owner of one (algorithm identity, element type) binding.
///
/// Compression fails soft: `false` means "store this tile some other way".
/// Decompression fails hard.
pub trait CodecControl: Send + Sync {
    /// Canonical codec name, e.g. `IntPLIOCompressor`.
    fn name(&self) -> &str;

    /// Algorithm identity the control was resolved for.
    fn identity(&self) -> &AlgorithmIdentity;

    /// Element type of the bound codec.
    fn element(&self) -> ElementType;

    /// A fresh default option for the bound codec.
    fn new_option(&self) -> CompressOption;

    /// Compress one tile, appending to `output`.
    ///
    /// Returns `false` if the codec declined or failed; `output` is then left
    /// exactly as it was.
    fn compress(&self, input: TileData<'_>, output: &mut Vec<u8>, option: &CompressOption) -> bool;

    /// Decompress one tile into `output`.
    fn decompress(
        &self,
        input: &[u8],
        output: TileDataMut<'_>,
        option: &CompressOption,
    ) -> Result<()>;
}

/// [`CodecControl`] over a [`TileCodec`](super::TileCodec) factory for
/// sample type `T`.
pub struct TypedControl<T: PixelSample> {
    name: &'static str,
    identity: AlgorithmIdentity,
    factory: CodecFactory<T>,
    default_option: fn() -> CompressOption,
    _sample: PhantomData<fn() -> T>,
}

impl<T: PixelSample> TypedControl<T> {
    /// Bind a factory.
    ///
    /// The factory is probed once with its own default option; a factory that
    /// rejects it is a broken binding and yields
    /// [`TileCompError::Construction`].
    pub fn new(
        name: &'static str,
        identity: AlgorithmIdentity,
        factory: CodecFactory<T>,
        default_option: fn() -> CompressOption,
    ) -> Result<Self> {
        if let Err(e) = factory(&default_option()) {
            return Err(TileCompError::Construction {
                key: format!("{} ({}, {})", name, identity, T::ELEMENT),
                reason: format!("factory rejects its default option: {}", e),
            });
        }

        Ok(Self {
            name,
            identity,
            factory,
            default_option,
            _sample: PhantomData,
        })
    }

    fn try_compress(
        &self,
        input: TileData<'_>,
        output: &mut Vec<u8>,
        option: &CompressOption,
    ) -> Result<()> {
        let actual = input.element();
        let samples = T::view(input).ok_or(TileCompError::TypeMismatch {
            expected: T::ELEMENT,
            actual,
        })?;
        let mut codec = (self.factory)(option)?;
        codec.compress(samples, output)
    }

    fn try_decompress(
        &self,
        input: &[u8],
        output: TileDataMut<'_>,
        option: &CompressOption,
    ) -> Result<()> {
        let actual = output.element();
        let samples = T::view_mut(output).ok_or(TileCompError::TypeMismatch {
            expected: T::ELEMENT,
            actual,
        })?;
        let mut codec = (self.factory)(option)?;
        codec.decompress(input, samples)
    }
}

impl<T: PixelSample> CodecControl for TypedControl<T> {
    fn name(&self) -> &str {
        self.name
    }

    fn identity(&self) -> &AlgorithmIdentity {
        &self.identity
    }

    fn element(&self) -> ElementType {
        T::ELEMENT
    }

    fn new_option(&self) -> CompressOption {
        (self.default_option)()
    }

    fn compress(&self, input: TileData<'_>, output: &mut Vec<u8>, option: &CompressOption) -> bool {
        let mark = output.len();
        let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
            self.try_compress(input, output, option)
        }));
        match attempt {
            Ok(Ok(())) => true,
            Err(payload) => {
                output.truncate(mark);
                log::warn!(
                    "{} ({}, {}) panicked while compressing, must fall back to another method: {}",
                    self.name,
                    self.identity,
                    T::ELEMENT,
                    panic_message(payload.as_ref())
                );
                false
            }
            Ok(Err(e)) => {
                output.truncate(mark);
                log::debug!(
                    "could not compress using {} ({}, {}), must fall back to another method: {}",
                    self.name,
                    self.identity,
                    T::ELEMENT,
                    e
                );
                false
            }
        }
    }

    fn decompress(
        &self,
        input: &[u8],
        output: TileDataMut<'_>,
        option: &CompressOption,
    ) -> Result<()> {
        self.try_decompress(input, output, option).map_err(|e| {
            TileCompError::Decode(format!(
                "could not decompress using {} ({}, {}): {}",
                self.name,
                self.identity,
                T::ELEMENT,
                e
            ))
        })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic"
    }
}
