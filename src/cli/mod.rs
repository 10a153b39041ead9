//! Command-line interface for the tile compression tool.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use crate::codec::{BuiltinProvider, CodecRegistry, CompressOption, GzipOption};
use crate::config::Settings;
use crate::pipeline::{PipelineStats, TileEncoding, TilePipeline};
use crate::tile::{ElementType, TileBuffer};

/// FITS tile compression tool
///
/// Compresses raw big-endian sample files tile by tile with the FITS tiled
/// image codecs (PLIO_1, GZIP_1, GZIP_2, NOCOMPRESS).
#[derive(Parser, Debug)]
#[command(name = "tilecomp")]
#[command(version)]
#[command(about = "FITS tiled image compression codecs")]
#[command(long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the built-in codecs
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compress a raw sample file in memory and report the result
    Analyze {
        /// Input file of big-endian samples
        #[arg(short, long)]
        input: PathBuf,

        /// Sample type of the input
        #[arg(short, long, value_enum)]
        element: ElementArg,

        /// Compression algorithm (PLIO_1, GZIP_1, GZIP_2, NOCOMPRESS, ...)
        #[arg(short, long)]
        algorithm: Option<String>,

        /// Quantization algorithm
        #[arg(long)]
        quant: Option<String>,

        /// Samples per tile
        #[arg(short, long)]
        tile_len: Option<usize>,

        /// gzip level (0-9)
        #[arg(short, long)]
        level: Option<u32>,

        /// TOML settings file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Skip round-trip verification
        #[arg(long)]
        no_verify: bool,
    },
}

/// Sample type argument.
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ElementArg {
    /// 8-bit unsigned (BITPIX 8)
    Int8,
    /// 16-bit signed (BITPIX 16)
    Int16,
    /// 32-bit signed (BITPIX 32)
    Int32,
    /// 64-bit signed (BITPIX 64)
    Int64,
    /// 32-bit IEEE float (BITPIX -32)
    Float32,
    /// 64-bit IEEE float (BITPIX -64)
    Float64,
}

impl From<ElementArg> for ElementType {
    fn from(arg: ElementArg) -> Self {
        match arg {
            ElementArg::Int8 => ElementType::Int8,
            ElementArg::Int16 => ElementType::Int16,
            ElementArg::Int32 => ElementType::Int32,
            ElementArg::Int64 => ElementType::Int64,
            ElementArg::Float32 => ElementType::Float32,
            ElementArg::Float64 => ElementType::Float64,
        }
    }
}

/// Options of the analyze command.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeArgs {
    /// Compression algorithm override.
    pub algorithm: Option<String>,
    /// Quantization override.
    pub quant: Option<String>,
    /// Tile length override.
    pub tile_len: Option<usize>,
    /// gzip level override.
    pub level: Option<u32>,
    /// Disable verification.
    pub no_verify: bool,
}

/// Run the CLI application.
pub fn run(cli: Cli) -> anyhow::Result<()> {
    // Initialize logging
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
            .init();
    } else if !cli.quiet {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .init();
    }

    match cli.command {
        Commands::List { json } => run_list(json),
        Commands::Analyze {
            input,
            element,
            algorithm,
            quant,
            tile_len,
            level,
            config,
            no_verify,
        } => {
            let settings = match config {
                Some(path) => Settings::from_file(&path)
                    .with_context(|| format!("failed to load settings from {}", path.display()))?,
                None => Settings::default(),
            };
            let args = AnalyzeArgs {
                algorithm,
                quant,
                tile_len,
                level,
                no_verify,
            };
            let settings = apply_overrides(settings, element.into(), &args)?;
            run_analyze(&input, settings, cli.quiet)
        }
    }
}

/// Merge command-line flags over loaded settings.
pub fn apply_overrides(
    mut settings: Settings,
    element: ElementType,
    args: &AnalyzeArgs,
) -> anyhow::Result<Settings> {
    let pipeline = &mut settings.pipeline;
    pipeline.element = element;
    if let Some(algorithm) = &args.algorithm {
        pipeline.compression = algorithm.clone();
    }
    if let Some(quant) = &args.quant {
        pipeline.quantization = quant.clone();
    }
    if let Some(tile_len) = args.tile_len {
        pipeline.tile_len = tile_len;
    }
    if let Some(level) = args.level {
        pipeline.option = Some(CompressOption::Gzip(GzipOption { level }));
    }
    if args.no_verify {
        pipeline.verify = false;
    }
    pipeline.validate().context("invalid pipeline settings")?;
    Ok(settings)
}

fn run_list(json: bool) -> anyhow::Result<()> {
    let infos: Vec<_> = BuiltinProvider::bindings().iter().map(|b| b.info()).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&infos)?);
        return Ok(());
    }

    println!("{:<26} {:<12} {:<8} {}", "Compressor", "Algorithm", "Element", "BITPIX");
    for info in &infos {
        println!(
            "{:<26} {:<12} {:<8} {}",
            info.name,
            info.compression,
            info.element,
            info.element.bitpix()
        );
    }
    Ok(())
}

fn run_analyze(input: &Path, settings: Settings, quiet: bool) -> anyhow::Result<()> {
    let element = settings.pipeline.element;
    let bytes =
        std::fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
    if bytes.len() % element.byte_width() != 0 {
        bail!(
            "{} is {} bytes, not a whole number of {} samples",
            input.display(),
            bytes.len(),
            element
        );
    }
    let samples = TileBuffer::from_be_bytes(element, &bytes)?;

    let pipeline = if settings.registry.providers.is_empty() {
        TilePipeline::new(settings.pipeline)?
    } else {
        let registry = CodecRegistry::from_config(&settings.registry, Vec::new())
            .context("failed to build codec registry")?;
        TilePipeline::with_registry(settings.pipeline, &registry)?
    };

    let (tiles, stats) = pipeline.compress_samples(&samples)?;
    let decoded = pipeline
        .decompress_tiles(&tiles)
        .context("compressed tiles failed to decode")?;
    let restored: usize = decoded.iter().map(TileBuffer::len).sum();
    if decoded != samples.chunks(pipeline.config().tile_len) {
        bail!("decoded samples differ from the input ({} samples restored)", restored);
    }

    if !quiet {
        println!("Compression Analysis: {}", input.display());
        println!("========================================");
        println!();
        println!("  Algorithm: {}", pipeline.config().identity());
        println!("  Codec: {}", pipeline.codec_name().unwrap_or("none (stored raw)"));
        println!("  Element: {} ({} samples)", element, samples.len());
        print_stats(&stats);
        let raw = tiles
            .iter()
            .filter(|t| t.encoding == TileEncoding::Uncompressed)
            .count();
        if raw > 0 && pipeline.codec_name().is_some() {
            println!("  Note: {} tile(s) could not be compressed and were stored raw", raw);
        }
    }

    Ok(())
}

/// Print pipeline statistics.
fn print_stats(stats: &PipelineStats) {
    println!(
        "  Tiles: {} ({} compressed, {} raw)",
        stats.total_tiles, stats.compressed_tiles, stats.raw_tiles
    );
    println!(
        "  Original Size: {} bytes ({:.2} MB)",
        stats.total_original_bytes,
        stats.total_original_bytes as f64 / 1_048_576.0
    );
    println!(
        "  Stored Size: {} bytes ({:.2} MB)",
        stats.total_stored_bytes,
        stats.total_stored_bytes as f64 / 1_048_576.0
    );
    println!("  Compression Ratio: {:.2}:1", stats.overall_ratio());
    println!("  Space Savings: {:.1}%", stats.overall_savings_percent());
    println!("  Time: {} ms", stats.total_time_ms);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_analyze() {
        let cli = Cli::try_parse_from([
            "tilecomp", "analyze", "-i", "mask.raw", "-e", "int16", "-a", "GZIP_2", "--level", "9",
        ])
        .unwrap();
        match cli.command {
            Commands::Analyze {
                element,
                algorithm,
                level,
                no_verify,
                ..
            } => {
                assert_eq!(ElementType::from(element), ElementType::Int16);
                assert_eq!(algorithm.as_deref(), Some("GZIP_2"));
                assert_eq!(level, Some(9));
                assert!(!no_verify);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_overrides_win_over_settings() {
        let settings = Settings::from_toml_str(
            "[pipeline]\ncompression = \"PLIO_1\"\ntile_len = 100\nverify = true\n",
        )
        .unwrap();
        let args = AnalyzeArgs {
            algorithm: Some("GZIP_1".into()),
            level: Some(3),
            no_verify: true,
            ..Default::default()
        };

        let merged = apply_overrides(settings, ElementType::Float32, &args).unwrap();
        assert_eq!(merged.pipeline.compression, "GZIP_1");
        assert_eq!(merged.pipeline.tile_len, 100);
        assert_eq!(merged.pipeline.element, ElementType::Float32);
        assert_eq!(merged.pipeline.option, Some(CompressOption::Gzip(GzipOption { level: 3 })));
        assert!(!merged.pipeline.verify);
    }

    #[test]
    fn test_zero_tile_len_rejected() {
        let args = AnalyzeArgs {
            tile_len: Some(0),
            ..Default::default()
        };
        assert!(apply_overrides(Settings::default(), ElementType::Int32, &args).is_err());
    }

    fn int16_settings(settings: Settings) -> Settings {
        apply_overrides(settings, ElementType::Int16, &AnalyzeArgs::default()).unwrap()
    }

    #[test]
    fn test_analyze_with_unavailable_provider_uses_builtin() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&TileBuffer::from(vec![0i16, 4, 4]).to_be_bytes()).unwrap();

        let toml = "[registry]\nproviders = [\"site-rice\"]\n";
        let settings = Settings::from_toml_str(toml).unwrap();
        assert_eq!(settings.registry.providers, vec!["site-rice".to_string()]);
        run_analyze(file.path(), int16_settings(settings), true).unwrap();
    }

    #[test]
    fn test_analyze_reads_raw_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        let samples: Vec<i16> = (0..3000).map(|i| if i % 100 < 60 { 0 } else { 7 }).collect();
        file.write_all(&TileBuffer::from(samples).to_be_bytes()).unwrap();

        let settings = int16_settings(Settings::default());
        run_analyze(file.path(), settings, true).unwrap();
    }

    #[test]
    fn test_analyze_rejects_partial_sample() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0, 1, 2]).unwrap();

        let settings = int16_settings(Settings::default());
        assert!(run_analyze(file.path(), settings, true).is_err());
    }
}
