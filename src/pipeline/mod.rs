//! Tile compression pipeline.
//!
//! The pipeline is the caller side of the codec boundary. It resolves one
//! control per configuration and compresses tiles in parallel. It falls
//! back to raw storage whenever no codec matches or the codec declines a
//! tile.

use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;

use crate::codec::{CodecControl, CodecRegistry, CompressOption};
use crate::config::PipelineConfig;
use crate::error::{Result, TileCompError};
use crate::tile::{ElementType, TileBuffer, TileData};

/// How a tile's bytes are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileEncoding {
    /// Encoded by the configured codec.
    Compressed,
    /// Raw big-endian samples, used when compression was not possible.
    Uncompressed,
}

/// One processed tile.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedTile {
    /// Position of the tile in its input sequence.
    pub index: usize,
    /// Storage form of `data`.
    pub encoding: TileEncoding,
    /// Number of samples in the tile.
    pub npix: usize,
    /// Stored bytes.
    pub data: Vec<u8>,
}

/// Statistics for a batch of tiles.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PipelineStats {
    /// Total tiles processed.
    pub total_tiles: usize,
    /// Tiles stored compressed.
    pub compressed_tiles: usize,
    /// Tiles stored raw.
    pub raw_tiles: usize,
    /// Total sample bytes in.
    pub total_original_bytes: usize,
    /// Total stored bytes out.
    pub total_stored_bytes: usize,
    /// Processing time in milliseconds.
    pub total_time_ms: u64,
}

impl PipelineStats {
    /// Overall compression ratio.
    pub fn overall_ratio(&self) -> f64 {
        if self.total_stored_bytes == 0 {
            0.0
        } else {
            self.total_original_bytes as f64 / self.total_stored_bytes as f64
        }
    }

    /// Overall space savings as a percentage.
    pub fn overall_savings_percent(&self) -> f64 {
        if self.total_original_bytes == 0 {
            0.0
        } else {
            (1.0 - (self.total_stored_bytes as f64 / self.total_original_bytes as f64)) * 100.0
        }
    }

    fn record(&mut self, original: usize, tile: &CompressedTile) {
        self.total_tiles += 1;
        self.total_original_bytes += original;
        self.total_stored_bytes += tile.data.len();
        match tile.encoding {
            TileEncoding::Compressed => self.compressed_tiles += 1,
            TileEncoding::Uncompressed => self.raw_tiles += 1,
        }
    }
}

/// Compresses and decompresses tiles with one resolved codec.
pub struct TilePipeline {
    config: PipelineConfig,
    control: Option<Arc<dyn CodecControl>>,
    option: CompressOption,
}

impl TilePipeline {
    /// Create a pipeline using the process-wide registry.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::with_registry(config, CodecRegistry::global())
    }

    /// Create a pipeline resolving its codec from `registry`.
    pub fn with_registry(config: PipelineConfig, registry: &CodecRegistry) -> Result<Self> {
        config.validate()?;

        let control = registry.resolve_identity(&config.identity(), config.element)?;
        let option = match (&control, config.option) {
            (_, Some(option)) => option,
            (Some(control), None) => control.new_option(),
            (None, None) => CompressOption::Null,
        };

        match &control {
            Some(control) => log::info!(
                "Using {} for {} tiles ({})",
                control.name(),
                config.element,
                control.identity()
            ),
            None => log::warn!(
                "No codec for {} with {} tiles; tiles will be stored uncompressed",
                config.identity(),
                config.element
            ),
        }

        Ok(Self {
            config,
            control,
            option,
        })
    }

    /// Name of the resolved codec, if any.
    pub fn codec_name(&self) -> Option<&str> {
        self.control.as_deref().map(|c| c.name())
    }

    /// Pipeline configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn check_element(&self, actual: ElementType) -> Result<()> {
        if actual != self.config.element {
            return Err(TileCompError::TypeMismatch {
                expected: self.config.element,
                actual,
            });
        }
        Ok(())
    }

    /// Compress one tile, falling back to raw storage.
    pub fn compress_tile(&self, index: usize, tile: TileData<'_>) -> Result<CompressedTile> {
        self.check_element(tile.element())?;
        let npix = tile.len();

        if let Some(control) = &self.control {
            let mut data = Vec::new();
            if control.compress(tile, &mut data, &self.option) {
                let compressed = CompressedTile {
                    index,
                    encoding: TileEncoding::Compressed,
                    npix,
                    data,
                };
                if !self.config.verify || self.verify(control.as_ref(), &compressed, tile) {
                    return Ok(compressed);
                }
            } else {
                log::debug!("Tile {} declined by {}, storing raw", index, control.name());
            }
        }

        Ok(CompressedTile {
            index,
            encoding: TileEncoding::Uncompressed,
            npix,
            data: raw_bytes(tile),
        })
    }

    /// Round-trip a freshly compressed tile; `false` means store it raw.
    fn verify(
        &self,
        control: &dyn CodecControl,
        compressed: &CompressedTile,
        original: TileData<'_>,
    ) -> bool {
        let mut decoded = TileBuffer::zeros(self.config.element, compressed.npix);
        match control.decompress(&compressed.data, decoded.as_data_mut(), &self.option) {
            Ok(()) if decoded.as_data() == original => {
                log::trace!("Tile {} verified", compressed.index);
                true
            }
            Ok(()) => {
                log::warn!(
                    "Tile {} failed lossless verification with {}, storing raw",
                    compressed.index,
                    control.name()
                );
                false
            }
            Err(e) => {
                log::warn!("Tile {} failed verification: {}, storing raw", compressed.index, e);
                false
            }
        }
    }

    fn thread_pool(&self) -> Result<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.max_parallel)
            .build()
            .map_err(|e| TileCompError::Internal(format!("failed to create thread pool: {}", e)))
    }

    /// Compress tiles in parallel. Results are in input order.
    pub fn compress_tiles(
        &self,
        tiles: &[TileBuffer],
    ) -> Result<(Vec<CompressedTile>, PipelineStats)> {
        let start = Instant::now();
        let pool = self.thread_pool()?;

        let compressed: Vec<CompressedTile> = pool.install(|| {
            tiles
                .par_iter()
                .enumerate()
                .map(|(index, tile)| self.compress_tile(index, tile.as_data()))
                .collect::<Result<Vec<_>>>()
        })?;

        let mut stats = PipelineStats::default();
        for (tile, out) in tiles.iter().zip(&compressed) {
            stats.record(tile.byte_len(), out);
        }
        stats.total_time_ms = start.elapsed().as_millis() as u64;

        log::info!(
            "Compressed {} tiles ({} raw), ratio {:.2}:1",
            stats.total_tiles,
            stats.raw_tiles,
            stats.overall_ratio()
        );
        Ok((compressed, stats))
    }

    /// Split a flat sample stream into tiles of `tile_len` and compress them.
    pub fn compress_samples(
        &self,
        samples: &TileBuffer,
    ) -> Result<(Vec<CompressedTile>, PipelineStats)> {
        self.compress_tiles(&samples.chunks(self.config.tile_len))
    }

    /// Decompress one tile.
    pub fn decompress_tile(&self, tile: &CompressedTile) -> Result<TileBuffer> {
        match tile.encoding {
            TileEncoding::Uncompressed => {
                let decoded = TileBuffer::from_be_bytes(self.config.element, &tile.data)?;
                if decoded.len() != tile.npix {
                    return Err(TileCompError::Decode(format!(
                        "raw tile {} holds {} samples, expected {}",
                        tile.index,
                        decoded.len(),
                        tile.npix
                    )));
                }
                Ok(decoded)
            }
            TileEncoding::Compressed => {
                let control = self.control.as_ref().ok_or_else(|| {
                    TileCompError::Decode(format!(
                        "tile {} is compressed but no codec is available for {}",
                        tile.index,
                        self.config.identity()
                    ))
                })?;
                let mut decoded = TileBuffer::zeros(self.config.element, tile.npix);
                control.decompress(&tile.data, decoded.as_data_mut(), &self.option)?;
                Ok(decoded)
            }
        }
    }

    /// Decompress tiles in parallel. Results are in input order.
    pub fn decompress_tiles(&self, tiles: &[CompressedTile]) -> Result<Vec<TileBuffer>> {
        let pool = self.thread_pool()?;
        pool.install(|| tiles.par_iter().map(|t| self.decompress_tile(t)).collect())
    }
}

fn raw_bytes(tile: TileData<'_>) -> Vec<u8> {
    use crate::tile::PixelSample;

    fn encode<T: PixelSample>(samples: &[T]) -> Vec<u8> {
        let mut bytes = vec![0u8; samples.len() * T::ELEMENT.byte_width()];
        T::write_be(samples, &mut bytes);
        bytes
    }

    match tile {
        TileData::Int8(s) => s.to_vec(),
        TileData::Int16(s) => encode(s),
        TileData::Int32(s) => encode(s),
        TileData::Int64(s) => encode(s),
        TileData::Float32(s) => encode(s),
        TileData::Float64(s) => encode(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{GzipOption, TileCompressorProvider, TypedControl};
    use crate::config::AlgorithmIdentity;

    fn mask_image(len: usize) -> TileBuffer {
        let samples: Vec<i32> = (0..len)
            .map(|i| match (i / 37) % 4 {
                0 => 0,
                1 => 3,
                2 => 0,
                _ => (i / 500) as i32 + 1,
            })
            .collect();
        TileBuffer::from(samples)
    }

    fn config(compression: &str, element: ElementType) -> PipelineConfig {
        PipelineConfig {
            tile_len: 256,
            max_parallel: 2,
            ..PipelineConfig::new(compression, element)
        }
    }

    fn builtin(config: PipelineConfig) -> TilePipeline {
        TilePipeline::with_registry(config, &CodecRegistry::new()).unwrap()
    }

    #[test]
    fn test_global_registry_pipeline() {
        let pipeline = TilePipeline::new(config("NOCOMPRESS", ElementType::Float64)).unwrap();
        assert_eq!(pipeline.codec_name(), Some("DoubleNoCompressCompressor"));

        let tiles = vec![TileBuffer::from(vec![0.25f64, -1.0])];
        let (out, _) = pipeline.compress_tiles(&tiles).unwrap();
        assert_eq!(out[0].encoding, TileEncoding::Compressed);
        assert_eq!(pipeline.decompress_tiles(&out).unwrap(), tiles);
    }

    #[test]
    fn test_plio_pipeline_roundtrip() {
        let pipeline = builtin(config("PLIO_1", ElementType::Int32));
        assert_eq!(pipeline.codec_name(), Some("IntPLIOCompressor"));

        let image = mask_image(5000);
        let (tiles, stats) = pipeline.compress_samples(&image).unwrap();

        assert_eq!(tiles.len(), 20);
        assert_eq!(stats.total_tiles, 20);
        assert_eq!(stats.compressed_tiles, 20);
        assert!(stats.overall_ratio() > 1.0);
        assert!(tiles.iter().enumerate().all(|(i, t)| t.index == i));

        let decoded = pipeline.decompress_tiles(&tiles).unwrap();
        assert_eq!(decoded, image.chunks(256));
    }

    #[test]
    fn test_declined_tiles_stored_raw() {
        let pipeline = builtin(config("PLIO_1", ElementType::Int16));
        let tiles = vec![
            TileBuffer::from(vec![0i16, 2, 2, 2]),
            TileBuffer::from(vec![-4i16, 2]),
        ];

        let (out, stats) = pipeline.compress_tiles(&tiles).unwrap();
        assert_eq!(out[0].encoding, TileEncoding::Compressed);
        assert_eq!(out[1].encoding, TileEncoding::Uncompressed);
        assert_eq!(out[1].data, vec![0xFF, 0xFC, 0x00, 0x02]);
        assert_eq!(stats.raw_tiles, 1);

        assert_eq!(pipeline.decompress_tiles(&out).unwrap(), tiles);
    }

    #[test]
    fn test_resolution_miss_stores_everything_raw() {
        let pipeline = builtin(config("RICE_1", ElementType::Int32));
        assert_eq!(pipeline.codec_name(), None);

        let image = mask_image(600);
        let (tiles, stats) = pipeline.compress_samples(&image).unwrap();
        assert!(tiles.iter().all(|t| t.encoding == TileEncoding::Uncompressed));
        assert_eq!(stats.total_stored_bytes, stats.total_original_bytes);
        assert_eq!(pipeline.decompress_tiles(&tiles).unwrap(), image.chunks(256));
    }

    #[test]
    fn test_gzip_option_from_config() {
        let mut cfg = config("GZIP_2", ElementType::Int64);
        cfg.option = Some(CompressOption::Gzip(GzipOption { level: 9 }));
        let pipeline = TilePipeline::with_registry(cfg, &CodecRegistry::new()).unwrap();
        assert_eq!(pipeline.codec_name(), Some("LongGZip2Compressor"));

        let image = TileBuffer::from((0..1000i64).map(|i| i * 3).collect::<Vec<_>>());
        let (tiles, _) = pipeline.compress_samples(&image).unwrap();
        assert!(tiles.iter().all(|t| t.encoding == TileEncoding::Compressed));
        assert_eq!(pipeline.decompress_tiles(&tiles).unwrap(), image.chunks(256));
    }

    #[test]
    fn test_invalid_option_falls_back_to_raw() {
        let mut cfg = config("GZIP_1", ElementType::Float32);
        cfg.option = Some(CompressOption::Gzip(GzipOption { level: 42 }));
        let pipeline = TilePipeline::with_registry(cfg, &CodecRegistry::new()).unwrap();

        let image = TileBuffer::from(vec![1.5f32; 300]);
        let (tiles, stats) = pipeline.compress_samples(&image).unwrap();
        assert_eq!(stats.raw_tiles, tiles.len());
        assert_eq!(pipeline.decompress_tiles(&tiles).unwrap(), image.chunks(256));
    }

    #[test]
    fn test_wrong_element_tile_is_error() {
        let pipeline = builtin(config("PLIO_1", ElementType::Int32));
        let tiles = vec![TileBuffer::from(vec![1i16, 2])];
        assert!(matches!(
            pipeline.compress_tiles(&tiles),
            Err(TileCompError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let image = mask_image(20_000);
        let mut cfg = config("PLIO_1", ElementType::Int32);
        cfg.max_parallel = 1;
        let sequential = TilePipeline::with_registry(cfg.clone(), &CodecRegistry::new()).unwrap();
        cfg.max_parallel = 4;
        let parallel = TilePipeline::with_registry(cfg, &CodecRegistry::new()).unwrap();

        let (a, _) = sequential.compress_samples(&image).unwrap();
        let (b, _) = parallel.compress_samples(&image).unwrap();
        assert_eq!(a, b);
    }

    /// Claims PLIO for int32 but corrupts every stream it writes.
    struct LossyProvider;

    impl TileCompressorProvider for LossyProvider {
        fn name(&self) -> &str {
            "lossy"
        }

        fn create_control(
            &self,
            quantization: &str,
            compression: &str,
            element: ElementType,
        ) -> Result<Option<Arc<dyn CodecControl>>> {
            if element != ElementType::Int32 {
                return Ok(None);
            }
            let control = TypedControl::<i32>::new(
                "IntLossyCompressor",
                AlgorithmIdentity::new(quantization, compression),
                lossy_factory,
                CompressOption::null,
            )?;
            Ok(Some(Arc::new(control)))
        }
    }

    struct Lossy;

    impl crate::codec::TileCodec<i32> for Lossy {
        fn compress(&mut self, input: &[i32], output: &mut Vec<u8>) -> Result<()> {
            output.extend(std::iter::repeat(0u8).take(input.len()));
            Ok(())
        }

        fn decompress(&mut self, _input: &[u8], output: &mut [i32]) -> Result<()> {
            output.fill(0);
            Ok(())
        }
    }

    fn lossy_factory(_option: &CompressOption) -> Result<Box<dyn crate::codec::TileCodec<i32>>> {
        Ok(Box::new(Lossy))
    }

    #[test]
    fn test_verification_failure_stores_raw() {
        let registry = CodecRegistry::new().with_provider(Arc::new(LossyProvider));
        let pipeline =
            TilePipeline::with_registry(config("PLIO_1", ElementType::Int32), &registry).unwrap();
        assert_eq!(pipeline.codec_name(), Some("IntLossyCompressor"));

        let tiles = vec![TileBuffer::from(vec![0i32; 8]), TileBuffer::from(vec![5i32; 8])];
        let (out, _) = pipeline.compress_tiles(&tiles).unwrap();
        // All-zero tiles survive the lossy codec; the other one cannot.
        assert_eq!(out[0].encoding, TileEncoding::Compressed);
        assert_eq!(out[1].encoding, TileEncoding::Uncompressed);
        assert_eq!(pipeline.decompress_tiles(&out).unwrap(), tiles);
    }

    #[test]
    fn test_stats_percentages() {
        let stats = PipelineStats {
            total_original_bytes: 1000,
            total_stored_bytes: 250,
            ..Default::default()
        };
        assert!((stats.overall_ratio() - 4.0).abs() < 1e-9);
        assert!((stats.overall_savings_percent() - 75.0).abs() < 1e-9);
        assert_eq!(PipelineStats::default().overall_ratio(), 0.0);
    }
}
