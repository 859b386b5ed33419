//! Exact (brute-force) L2 index over fixed-dimension `f32` vectors.
//!
//! On-disk layout, all integers little-endian:
//!
//! ```text
//! magic "DRFLATL2" | u32 version | u32 dim | u64 count | [u8; 32] id map digest
//! | count * dim f32 | [u8; 32] blake3 of every preceding byte
//! ```

use docrag_core::error::{Error, Result};

const MAGIC: &[u8; 8] = b"DRFLATL2";
const FORMAT_VERSION: u32 = 1;
const DIGEST_LEN: usize = 32;
const HEADER_LEN: usize = MAGIC.len() + 4 + 4 + 8 + DIGEST_LEN;

/// Append-only vector storage. Positions are dense, `0..len()`, in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatL2Index {
    dim: usize,
    data: Vec<f32>,
}

impl FlatL2Index {
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 || u32::try_from(dim).is_err() {
            return Err(Error::InvalidConfig(format!("unsupported index dimension {dim}")));
        }
        Ok(Self { dim, data: Vec::new() })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append a vector and return its position.
    pub fn add(&mut self, vector: &[f32]) -> Result<usize> {
        if vector.len() != self.dim {
            return Err(Error::dimension_mismatch("index add", self.dim, vector.len()));
        }
        let position = self.len();
        self.data.extend_from_slice(vector);
        Ok(position)
    }

    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dim)?;
        self.data.get(start..start + self.dim)
    }

    /// The `k` nearest positions as `(position, squared L2 distance)`, nearest
    /// first, equal distances in ascending position order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dim {
            return Err(Error::dimension_mismatch("index search", self.dim, query.len()));
        }
        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(position, stored)| (position, squared_l2(query, stored)))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }

    /// Serialize with the digest of the companion id map embedded in the header.
    pub fn to_bytes(&self, id_map_digest: &[u8; 32]) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.data.len() * 4 + DIGEST_LEN);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        // dim fits in u32, checked in new()
        #[allow(clippy::cast_possible_truncation)]
        let dim = self.dim as u32;
        out.extend_from_slice(&dim.to_le_bytes());
        out.extend_from_slice(&(self.len() as u64).to_le_bytes());
        out.extend_from_slice(id_map_digest);
        for value in &self.data {
            out.extend_from_slice(&value.to_le_bytes());
        }
        let checksum = blake3::hash(&out);
        out.extend_from_slice(checksum.as_bytes());
        out
    }

    /// Parse bytes written by [`FlatL2Index::to_bytes`], returning the index and
    /// the id map digest recorded with it.
    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, [u8; 32])> {
        if bytes.len() < HEADER_LEN + DIGEST_LEN {
            return Err(corrupt(format!("index file too short ({} bytes)", bytes.len())));
        }
        let (body, checksum) = bytes.split_at(bytes.len() - DIGEST_LEN);
        if blake3::hash(body).as_bytes() != checksum {
            return Err(corrupt("index checksum mismatch".to_string()));
        }
        if &body[..MAGIC.len()] != MAGIC {
            return Err(corrupt("not a docrag index (bad magic)".to_string()));
        }
        let mut cursor = MAGIC.len();
        let version = read_u32(body, &mut cursor);
        if version != FORMAT_VERSION {
            return Err(corrupt(format!("unsupported index format version {version}")));
        }
        let dim = read_u32(body, &mut cursor) as usize;
        let count = usize::try_from(read_u64(body, &mut cursor))
            .map_err(|_| corrupt("vector count overflows usize".to_string()))?;
        let mut digest = [0u8; DIGEST_LEN];
        digest.copy_from_slice(&body[cursor..cursor + DIGEST_LEN]);
        cursor += DIGEST_LEN;

        if dim == 0 {
            return Err(corrupt("index dimension is zero".to_string()));
        }
        let expected = count
            .checked_mul(dim)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| corrupt("index size overflows".to_string()))?;
        let payload = &body[cursor..];
        if payload.len() != expected {
            return Err(corrupt(format!(
                "index payload is {} bytes, header promises {expected}",
                payload.len()
            )));
        }
        let data = payload
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        Ok((Self { dim, data }, digest))
    }
}

/// Plain sum of squared differences, accumulated in `f32` in index order.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn corrupt(msg: String) -> Error {
    Error::CorruptIndex(msg)
}

// Callers check the header length before reading.
fn read_u32(bytes: &[u8], cursor: &mut usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[*cursor..*cursor + 4]);
    *cursor += 4;
    u32::from_le_bytes(buf)
}

fn read_u64(bytes: &[u8], cursor: &mut usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[*cursor..*cursor + 8]);
    *cursor += 8;
    u64::from_le_bytes(buf)
}
