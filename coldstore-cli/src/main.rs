//! ColdStore CLI - compress, decompress and inspect framed values on disk

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use coldstore_core::transparent::{is_compressed, FrameHeader, HEADER_SIZE};
use coldstore_core::{CompressionMonitor, SystemClock, TransparentCompression, TransparentConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "coldstore-cli")]
#[command(version, about = "Work with ColdStore compressed frames")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compress a file into a self-describing frame
    Compress {
        input: PathBuf,
        output: PathBuf,

        /// Files smaller than this are copied unchanged
        #[arg(long, default_value_t = coldstore_core::config::MIN_COMPRESS_SIZE)]
        min_size: u64,

        /// Zstd compression level
        #[arg(long, default_value_t = coldstore_core::config::ZSTD_LEVEL)]
        level: i32,
    },

    /// Restore the original bytes of a framed file
    Decompress { input: PathBuf, output: PathBuf },

    /// Print the frame header of a file
    Inspect { file: PathBuf },
}

/// Key under which CLI operations are tracked
const CLI_KEY: &str = "coldstore-cli";

fn codec(min_size: u64, level: i32) -> anyhow::Result<TransparentCompression> {
    let config = TransparentConfig {
        min_size,
        compression_level: level,
        ..Default::default()
    };
    Ok(TransparentCompression::with_config(
        config,
        Arc::new(CompressionMonitor::new()),
        Arc::new(SystemClock),
    )?)
}

fn read_file(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn write_file(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    std::fs::write(path, data).with_context(|| format!("writing {}", path.display()))
}

fn compress(input: &Path, output: &Path, min_size: u64, level: i32) -> anyhow::Result<String> {
    let data = read_file(input)?;
    let encoded = codec(min_size, level)?.write(CLI_KEY, &data)?;
    write_file(output, &encoded)?;

    if !is_compressed(&encoded) {
        return Ok(format!("{}: stored raw ({} bytes)", input.display(), data.len()));
    }

    let header = FrameHeader::parse(&encoded)?;
    Ok(format!(
        "{}: {} -> {} bytes with {} ({:.2}x)",
        input.display(),
        data.len(),
        encoded.len(),
        header.algorithm.name(),
        ratio(&header),
    ))
}

fn decompress(input: &Path, output: &Path) -> anyhow::Result<String> {
    let data = read_file(input)?;
    let decoded = codec(coldstore_core::config::MIN_COMPRESS_SIZE, coldstore_core::config::ZSTD_LEVEL)?
        .read(CLI_KEY, &data)?;
    write_file(output, &decoded)?;
    Ok(format!(
        "{}: {} -> {} bytes",
        input.display(),
        data.len(),
        decoded.len()
    ))
}

fn inspect(file: &Path) -> anyhow::Result<String> {
    let data = read_file(file)?;
    if !is_compressed(&data) {
        return Ok(format!("{}: raw value, {} bytes", file.display(), data.len()));
    }

    let header = FrameHeader::parse(&data)?;
    let payload = data.len() - HEADER_SIZE;
    if payload as u64 != header.compressed_size {
        bail!(
            "{}: header declares {} payload bytes, found {}",
            file.display(),
            header.compressed_size,
            payload
        );
    }

    Ok(format!(
        "file:            {}\n\
         version:         {}\n\
         algorithm:       {}\n\
         original size:   {}\n\
         compressed size: {}\n\
         ratio:           {:.2}x\n\
         created:         {}",
        file.display(),
        header.version,
        header.algorithm.name(),
        header.original_size,
        header.compressed_size,
        ratio(&header),
        header.created_at().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
    ))
}

fn ratio(header: &FrameHeader) -> f64 {
    if header.compressed_size == 0 {
        return 0.0;
    }
    header.original_size as f64 / header.compressed_size as f64
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let summary = match cli.command {
        Command::Compress {
            input,
            output,
            min_size,
            level,
        } => compress(&input, &output, min_size, level)?,
        Command::Decompress { input, output } => decompress(&input, &output)?,
        Command::Inspect { file } => inspect(&file)?,
    };

    println!("{}", summary);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn log_lines(len: usize) -> Vec<u8> {
        b"2024-01-01T00:00:00Z GET /api/v1/items 200 12ms\n"
            .iter()
            .copied()
            .cycle()
            .take(len)
            .collect()
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_compress_inspect_decompress() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("access.log");
        let framed = dir.path().join("access.log.cmpr");
        let restored = dir.path().join("access.log.out");

        let original = log_lines(64 * 1024);
        std::fs::write(&input, &original).unwrap();

        let summary = compress(&input, &framed, 1024, 3).unwrap();
        assert!(summary.contains("zstd"));

        let report = inspect(&framed).unwrap();
        assert!(report.contains("algorithm:       zstd"));
        assert!(report.contains(&format!("original size:   {}", original.len())));

        decompress(&framed, &restored).unwrap();
        assert_eq!(std::fs::read(&restored).unwrap(), original);
    }

    #[test]
    fn test_small_file_stored_raw() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("tiny");
        let output = dir.path().join("tiny.out");
        std::fs::write(&input, b"short").unwrap();

        let summary = compress(&input, &output, 1024, 3).unwrap();
        assert!(summary.contains("stored raw"));
        assert_eq!(std::fs::read(&output).unwrap(), b"short");
        assert!(inspect(&output).unwrap().contains("raw value, 5 bytes"));
    }

    #[test]
    fn test_inspect_truncated_frame() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("data");
        let framed = dir.path().join("data.cmpr");
        std::fs::write(&input, log_lines(4096)).unwrap();
        compress(&input, &framed, 1024, 3).unwrap();

        let mut bytes = std::fs::read(&framed).unwrap();
        bytes.truncate(bytes.len() - 1);
        std::fs::write(&framed, &bytes).unwrap();

        assert!(inspect(&framed).is_err());
        assert!(decompress(&framed, &dir.path().join("x")).is_err());
    }
}
