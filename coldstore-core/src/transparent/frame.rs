//! Binary frame for compressed payloads
//!
//! Layout (all integers little-endian):
//!
//! | Offset | Size | Field                      |
//! |--------|------|----------------------------|
//! | 0      | 4    | Magic `CMPR`               |
//! | 4      | 1    | Version (1)                |
//! | 5      | 1    | Algorithm ID               |
//! | 6      | 2    | Reserved, must be 0        |
//! | 8      | 8    | Original size              |
//! | 16     | 8    | Compressed size            |
//! | 24     | 8    | Unix timestamp, seconds    |
//! | 32     | N    | Payload                    |

use crate::engine::{LZ4, NONE, SNAPPY, ZSTD};
use crate::{ColdStoreError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Frame marker
pub const MAGIC: &[u8; 4] = b"CMPR";

/// Fixed header length
pub const HEADER_SIZE: usize = 32;

/// Only version this codec reads and writes
pub const FRAME_VERSION: u8 = 1;

/// Stable on-wire algorithm identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AlgorithmId {
    None = 0,
    Lz4 = 1,
    Snappy = 2,
    Zstd = 3,
}

impl AlgorithmId {
    /// Registry name of the algorithm
    pub fn name(self) -> &'static str {
        match self {
            AlgorithmId::None => NONE,
            AlgorithmId::Lz4 => LZ4,
            AlgorithmId::Snappy => SNAPPY,
            AlgorithmId::Zstd => ZSTD,
        }
    }

    /// Wire ID for a registry name
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            NONE => Ok(AlgorithmId::None),
            LZ4 => Ok(AlgorithmId::Lz4),
            SNAPPY => Ok(AlgorithmId::Snappy),
            ZSTD => Ok(AlgorithmId::Zstd),
            other => Err(ColdStoreError::AlgorithmNotFound(other.to_string())),
        }
    }
}

impl TryFrom<u8> for AlgorithmId {
    type Error = ColdStoreError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(AlgorithmId::None),
            1 => Ok(AlgorithmId::Lz4),
            2 => Ok(AlgorithmId::Snappy),
            3 => Ok(AlgorithmId::Zstd),
            _ => Err(ColdStoreError::FrameParse(format!(
                "unknown algorithm ID: {}",
                value
            ))),
        }
    }
}

/// Decoded fixed header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: u8,
    pub algorithm: AlgorithmId,
    pub original_size: u64,
    pub compressed_size: u64,
    /// Unix seconds at frame creation
    pub timestamp: u64,
}

impl FrameHeader {
    /// Header for a payload produced now
    pub fn new(algorithm: AlgorithmId, original_size: u64, compressed_size: u64) -> Self {
        Self {
            version: FRAME_VERSION,
            algorithm,
            original_size,
            compressed_size,
            timestamp: Utc::now().timestamp().max(0) as u64,
        }
    }

    /// Write the 32 header bytes into `buf`
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(HEADER_SIZE);
        buf.put_slice(MAGIC);
        buf.put_u8(self.version);
        buf.put_u8(self.algorithm as u8);
        buf.put_u16_le(0);
        buf.put_u64_le(self.original_size);
        buf.put_u64_le(self.compressed_size);
        buf.put_u64_le(self.timestamp);
    }

    /// Parse and validate the header at the start of `data`
    ///
    /// Checks length, magic, version, reserved bits and algorithm ID. Does not
    /// look at the payload.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(ColdStoreError::FrameParse(format!(
                "frame too short: {} bytes, header needs {}",
                data.len(),
                HEADER_SIZE
            )));
        }

        let mut cursor = &data[..HEADER_SIZE];

        let mut magic = [0u8; 4];
        cursor.copy_to_slice(&mut magic);
        if &magic != MAGIC {
            return Err(ColdStoreError::FrameParse("invalid frame magic".into()));
        }

        let version = cursor.get_u8();
        if version != FRAME_VERSION {
            return Err(ColdStoreError::FrameParse(format!(
                "unsupported frame version: {}",
                version
            )));
        }

        let algorithm = AlgorithmId::try_from(cursor.get_u8())?;

        let reserved = cursor.get_u16_le();
        if reserved != 0 {
            return Err(ColdStoreError::FrameParse(format!(
                "reserved field must be 0, found {:#06x}",
                reserved
            )));
        }

        Ok(Self {
            version,
            algorithm,
            original_size: cursor.get_u64_le(),
            compressed_size: cursor.get_u64_le(),
            timestamp: cursor.get_u64_le(),
        })
    }

    /// Frame creation time
    pub fn created_at(&self) -> DateTime<Utc> {
        i64::try_from(self.timestamp)
            .ok()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Whether `data` starts with the frame magic
///
/// Buffers without the magic are raw data.
pub fn is_compressed(data: &[u8]) -> bool {
    data.starts_with(MAGIC)
}

/// A complete frame: header fields plus payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedData {
    pub algorithm: AlgorithmId,
    pub original_size: u64,
    pub compressed_size: u64,
    pub timestamp: DateTime<Utc>,
    pub data: Bytes,
}

impl CompressedData {
    /// Frame `payload` compressed by `algorithm` from `original_size` bytes
    pub fn new(algorithm: AlgorithmId, original_size: u64, payload: impl Into<Bytes>) -> Self {
        let data = payload.into();
        let header = FrameHeader::new(algorithm, original_size, data.len() as u64);
        Self {
            algorithm,
            original_size,
            compressed_size: header.compressed_size,
            timestamp: header.created_at(),
            data,
        }
    }

    fn header(&self) -> FrameHeader {
        FrameHeader {
            version: FRAME_VERSION,
            algorithm: self.algorithm,
            original_size: self.original_size,
            compressed_size: self.compressed_size,
            timestamp: self.timestamp.timestamp().max(0) as u64,
        }
    }

    /// Serialize header and payload
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + self.data.len());
        self.header().encode(&mut buf);
        buf.put_slice(&self.data);
        buf.freeze()
    }

    /// Parse a full frame
    ///
    /// The declared compressed size must equal the bytes following the
    /// header exactly.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let header = FrameHeader::parse(data)?;
        let payload = &data[HEADER_SIZE..];

        if payload.len() as u64 != header.compressed_size {
            return Err(ColdStoreError::FrameParse(format!(
                "compressed size mismatch: header says {}, frame has {}",
                header.compressed_size,
                payload.len()
            )));
        }

        Ok(Self {
            algorithm: header.algorithm,
            original_size: header.original_size,
            compressed_size: header.compressed_size,
            timestamp: header.created_at(),
            data: Bytes::copy_from_slice(payload),
        })
    }
}
