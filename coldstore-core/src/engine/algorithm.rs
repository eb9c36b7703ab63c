//! Compression algorithm implementations
//!
//! Algorithms are pure byte transforms. Anything that depends on metadata
//! belongs in a policy, not here.

use crate::{ColdStoreError, Result};
use std::fmt;

/// Name reported when a value is stored uncompressed
pub const NONE: &str = "none";
/// Fast algorithm, used for small and warm values
pub const LZ4: &str = "lz4";
/// Mid-ratio algorithm
pub const SNAPPY: &str = "snappy";
/// High-ratio algorithm, used for large and cold values
pub const ZSTD: &str = "zstd";

/// Capability contract shared by every algorithm
pub trait CompressionAlgorithm: Send + Sync + fmt::Debug {
    /// Registry name
    fn name(&self) -> &str;

    /// Compress a buffer
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress a buffer produced by `compress`
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Nominal ratio on typical data
    fn typical_ratio(&self) -> f64;
}

/// LZ4 block compression with a size prefix
#[derive(Debug, Default, Clone, Copy)]
pub struct Lz4Algorithm;

impl CompressionAlgorithm for Lz4Algorithm {
    fn name(&self) -> &str {
        LZ4
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(lz4_flex::compress_prepend_size(data))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4_flex::decompress_size_prepended(data).map_err(|e| ColdStoreError::compression(LZ4, e))
    }

    fn typical_ratio(&self) -> f64 {
        2.5
    }
}

/// Raw (unframed) Snappy
#[derive(Debug, Default, Clone, Copy)]
pub struct SnappyAlgorithm;

impl CompressionAlgorithm for SnappyAlgorithm {
    fn name(&self) -> &str {
        SNAPPY
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        snap::raw::Encoder::new()
            .compress_vec(data)
            .map_err(|e| ColdStoreError::compression(SNAPPY, e))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        snap::raw::Decoder::new()
            .decompress_vec(data)
            .map_err(|e| ColdStoreError::compression(SNAPPY, e))
    }

    fn typical_ratio(&self) -> f64 {
        2.0
    }
}

/// Zstandard at a fixed level
#[derive(Debug, Clone, Copy)]
pub struct ZstdAlgorithm {
    level: i32,
}

impl ZstdAlgorithm {
    /// Create with an explicit compression level
    pub fn new(level: i32) -> Self {
        Self { level }
    }

    /// Configured compression level
    pub fn level(&self) -> i32 {
        self.level
    }
}

impl Default for ZstdAlgorithm {
    fn default() -> Self {
        Self::new(crate::config::ZSTD_LEVEL)
    }
}

impl CompressionAlgorithm for ZstdAlgorithm {
    fn name(&self) -> &str {
        ZSTD
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        zstd::encode_all(data, self.level).map_err(|e| ColdStoreError::compression(ZSTD, e))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        zstd::decode_all(data).map_err(|e| ColdStoreError::compression(ZSTD, e))
    }

    fn typical_ratio(&self) -> f64 {
        3.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        b"the quick brown fox jumps over the lazy dog. ".repeat(200)
    }

    #[test]
    fn test_all_algorithms_roundtrip() {
        let algorithms: Vec<Box<dyn CompressionAlgorithm>> = vec![
            Box::new(Lz4Algorithm),
            Box::new(SnappyAlgorithm),
            Box::new(ZstdAlgorithm::default()),
        ];
        let data = sample();

        for algo in algorithms {
            let compressed = algo.compress(&data).unwrap();
            assert!(
                compressed.len() < data.len(),
                "{} did not shrink repetitive input",
                algo.name()
            );
            assert_eq!(algo.decompress(&compressed).unwrap(), data);
        }
    }

    #[test]
    fn test_empty_input() {
        let zstd = ZstdAlgorithm::default();
        let compressed = zstd.compress(&[]).unwrap();
        assert!(zstd.decompress(&compressed).unwrap().is_empty());

        let lz4 = Lz4Algorithm;
        let compressed = lz4.compress(&[]).unwrap();
        assert!(lz4.decompress(&compressed).unwrap().is_empty());
    }

    #[test]
    fn test_garbage_input_errors() {
        let garbage = [0xffu8; 16];
        assert!(matches!(
            SnappyAlgorithm.decompress(&garbage),
            Err(ColdStoreError::Compression { .. })
        ));
        assert!(ZstdAlgorithm::default().decompress(&garbage).is_err());

        // Declares 16 bytes, then a literal run that overruns the input
        let truncated = [16u8, 0, 0, 0, 0xf0, 0xff];
        assert!(Lz4Algorithm.decompress(&truncated).is_err());
    }

    #[test]
    fn test_zstd_beats_lz4_on_text() {
        let data = sample();
        let lz4 = Lz4Algorithm.compress(&data).unwrap();
        let zstd = ZstdAlgorithm::new(9).compress(&data).unwrap();
        assert!(zstd.len() <= lz4.len());
    }
}
