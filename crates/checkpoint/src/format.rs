//! On-disk checkpoint artifact format
//!
//! Layout (little-endian):
//! `magic | version u32 | epoch u64 | sequence u64 | score f64 |
//! data_size u64 | metadata_len u32 | metadata JSON | payload`

use bytes::{Buf, BufMut, Bytes, BytesMut};
use runtime_core::{Epoch, Error, Result, Score, Sequence};
use std::collections::HashMap;
use tracing::warn;

/// Magic bytes for checkpoint files
pub const CHECKPOINT_MAGIC: [u8; 4] = *b"CKPT";

/// Checkpoint format version
pub const CHECKPOINT_VERSION: u32 = 1;

/// Size of the fixed part of the header
const FIXED_HEADER_LEN: usize = 4 + 4 + 8 + 8 + 8 + 8 + 4;

/// Checkpoint file header
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointHeader {
    pub version: u32,
    pub epoch: Epoch,
    pub sequence: Sequence,
    pub score: Score,
    pub data_size: u64,
    pub metadata: HashMap<String, String>,
}

impl CheckpointHeader {
    /// Create a header for the current format version
    pub fn new(epoch: Epoch, sequence: Sequence, score: Score, data_size: u64) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            epoch,
            sequence,
            score,
            data_size,
            metadata: HashMap::new(),
        }
    }

    /// Attach free-form metadata
    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Serialize a header followed by its payload
pub fn encode(header: &CheckpointHeader, payload: &[u8]) -> Result<Bytes> {
    let metadata_json = serde_json::to_vec(&header.metadata)?;
    let mut buf = BytesMut::with_capacity(FIXED_HEADER_LEN + metadata_json.len() + payload.len());

    buf.put_slice(&CHECKPOINT_MAGIC);
    buf.put_u32_le(header.version);
    buf.put_u64_le(header.epoch);
    buf.put_u64_le(header.sequence);
    buf.put_f64_le(header.score.value());
    buf.put_u64_le(payload.len() as u64);
    buf.put_u32_le(metadata_json.len() as u32);
    buf.put_slice(&metadata_json);
    buf.put_slice(payload);

    Ok(buf.freeze())
}

/// Parse an artifact into its header and payload
///
/// `checkpoint_id` only labels errors.
pub fn decode(checkpoint_id: &str, mut data: Bytes) -> Result<(CheckpointHeader, Bytes)> {
    let corrupted = |reason: String| Error::CheckpointCorrupted {
        checkpoint_id: checkpoint_id.to_string(),
        reason,
    };

    if data.len() < FIXED_HEADER_LEN {
        return Err(corrupted(format!(
            "truncated header: {} bytes",
            data.len()
        )));
    }

    let magic = data.split_to(4);
    if magic[..] != CHECKPOINT_MAGIC {
        return Err(corrupted("invalid magic".to_string()));
    }

    let version = data.get_u32_le();
    if version != CHECKPOINT_VERSION {
        warn!(
            checkpoint_id,
            expected = CHECKPOINT_VERSION,
            actual = version,
            "Checkpoint version mismatch"
        );
    }

    let epoch = data.get_u64_le();
    let sequence = data.get_u64_le();
    let score = Score(data.get_f64_le());
    let data_size = data.get_u64_le();
    let metadata_len = data.get_u32_le() as usize;

    if data.len() < metadata_len {
        return Err(corrupted("truncated metadata".to_string()));
    }
    let metadata: HashMap<String, String> = serde_json::from_slice(&data.split_to(metadata_len))?;

    if data.len() as u64 != data_size {
        return Err(corrupted(format!(
            "payload size mismatch: header says {}, found {}",
            data_size,
            data.len()
        )));
    }

    let header = CheckpointHeader {
        version,
        epoch,
        sequence,
        score,
        data_size,
        metadata,
    };
    Ok((header, data))
}
