//! Consensus-critical wire encoding for `BlockHeader`/`Block`.
//!
//! Fixes the endianness convention the distilled spec left open (§9, open
//! question): every multi-byte field serializes little-endian, matching the
//! teacher's `bincode`-based encoding elsewhere in the crate. Header layout:
//!
//! ```text
//! version:1 | timestamp_ms:8 | height:8 | parent_count:1 | parent_hashes:32·parent_count |
//! vdf_output:32 | vdf_iterations:8 | heartbeat_root:32 | tx_root:32 | state_root:32 |
//! producer_id:32 | nonce:8
//! ```
//!
//! Fixed portion is 194 bytes; variable portion adds `32 * parent_count`.

use super::types::{Block, BlockHeader, HeartbeatRecord};
use crate::types::Hash256;
use thiserror::Error;

pub const FIXED_HEADER_LEN: usize = 1 + 8 + 8 + 1 + 32 + 8 + 32 + 32 + 32 + 32 + 8;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum WireError {
    #[error("truncated header: need at least {0} bytes")]
    TruncatedHeader(usize),
    #[error("parent count {0} outside allowed range [1, {1}] (0 only for genesis)")]
    BadParentCount(usize, usize),
    #[error("trailing bytes after header")]
    TrailingBytes,
    #[error("body decode failed: {0}")]
    BodyDecode(String),
}

/// Encode a header to its exact consensus-critical wire form.
pub fn encode_header(header: &BlockHeader) -> Vec<u8> {
    let mut buf = Vec::with_capacity(FIXED_HEADER_LEN + 32 * header.parent_hashes.len());
    buf.push(header.version);
    buf.extend_from_slice(&header.timestamp_ms.to_le_bytes());
    buf.extend_from_slice(&header.height.to_le_bytes());
    buf.push(header.parent_hashes.len() as u8);
    for parent in &header.parent_hashes {
        buf.extend_from_slice(parent);
    }
    buf.extend_from_slice(&header.vdf_output);
    buf.extend_from_slice(&header.vdf_iterations.to_le_bytes());
    buf.extend_from_slice(&header.heartbeat_root);
    buf.extend_from_slice(&header.tx_root);
    buf.extend_from_slice(&header.state_root);
    buf.extend_from_slice(&header.producer_id);
    buf.extend_from_slice(&header.nonce.to_le_bytes());
    buf
}

/// Decode a header from its wire form. `max_parents` bounds `parent_count`
/// (0 is only accepted by callers that know this is the genesis header).
pub fn decode_header(bytes: &[u8], max_parents: usize) -> Result<(BlockHeader, usize), WireError> {
    if bytes.len() < 1 + 8 + 8 + 1 {
        return Err(WireError::TruncatedHeader(1 + 8 + 8 + 1));
    }
    let mut cursor = 0usize;
    let version = bytes[cursor];
    cursor += 1;
    let timestamp_ms = i64::from_le_bytes(bytes[cursor..cursor + 8].try_into().unwrap());
    cursor += 8;
    let height = u64::from_le_bytes(bytes[cursor..cursor + 8].try_into().unwrap());
    cursor += 8;
    let parent_count = bytes[cursor] as usize;
    cursor += 1;
    if parent_count > max_parents {
        return Err(WireError::BadParentCount(parent_count, max_parents));
    }

    let variable_len = 32 * parent_count;
    let remaining_fixed = 32 + 8 + 32 + 32 + 32 + 32 + 8;
    if bytes.len() < cursor + variable_len + remaining_fixed {
        return Err(WireError::TruncatedHeader(cursor + variable_len + remaining_fixed));
    }

    let mut parent_hashes = Vec::with_capacity(parent_count);
    for _ in 0..parent_count {
        let mut h: Hash256 = [0u8; 32];
        h.copy_from_slice(&bytes[cursor..cursor + 32]);
        parent_hashes.push(h);
        cursor += 32;
    }

    let mut read32 = |cursor: &mut usize| -> Hash256 {
        let mut h: Hash256 = [0u8; 32];
        h.copy_from_slice(&bytes[*cursor..*cursor + 32]);
        *cursor += 32;
        h
    };

    let vdf_output = read32(&mut cursor);
    let vdf_iterations = u64::from_le_bytes(bytes[cursor..cursor + 8].try_into().unwrap());
    cursor += 8;
    let heartbeat_root = read32(&mut cursor);
    let tx_root = read32(&mut cursor);
    let state_root = read32(&mut cursor);
    let producer_id = read32(&mut cursor);
    let nonce = u64::from_le_bytes(bytes[cursor..cursor + 8].try_into().unwrap());
    cursor += 8;

    Ok((
        BlockHeader {
            version,
            timestamp_ms,
            height,
            parent_hashes,
            vdf_output,
            vdf_iterations,
            heartbeat_root,
            tx_root,
            state_root,
            producer_id,
            nonce,
        },
        cursor,
    ))
}

/// Encode the full block: header, then varint-counted heartbeats, then
/// varint-counted transactions, then the raw 64-byte signature.
pub fn encode_block(block: &Block) -> Vec<u8> {
    let mut buf = encode_header(&block.header);

    buf.extend_from_slice(&(block.heartbeats.len() as u64).to_le_bytes());
    for hb in &block.heartbeats {
        let encoded = bincode::serialize(hb).expect("heartbeat always serializes");
        buf.extend_from_slice(&(encoded.len() as u32).to_le_bytes());
        buf.extend_from_slice(&encoded);
    }

    buf.extend_from_slice(&(block.transactions.len() as u64).to_le_bytes());
    for tx in &block.transactions {
        buf.extend_from_slice(&(tx.len() as u32).to_le_bytes());
        buf.extend_from_slice(tx);
    }

    buf.extend_from_slice(&block.signature);
    buf
}

pub fn decode_block(bytes: &[u8], max_parents: usize) -> Result<Block, WireError> {
    let (header, mut cursor) = decode_header(bytes, max_parents)?;

    let heartbeat_count = read_u64(bytes, &mut cursor)?;
    let mut heartbeats = Vec::with_capacity(heartbeat_count.min(1 << 20) as usize);
    for _ in 0..heartbeat_count {
        let len = read_u32(bytes, &mut cursor)? as usize;
        let slice = slice_of(bytes, cursor, len)?;
        cursor += len;
        let hb: HeartbeatRecord =
            bincode::deserialize(slice).map_err(|e| WireError::BodyDecode(e.to_string()))?;
        heartbeats.push(hb);
    }

    let tx_count = read_u64(bytes, &mut cursor)?;
    let mut transactions = Vec::with_capacity(tx_count.min(1 << 20) as usize);
    for _ in 0..tx_count {
        let len = read_u32(bytes, &mut cursor)? as usize;
        let slice = slice_of(bytes, cursor, len)?;
        cursor += len;
        transactions.push(slice.to_vec());
    }

    let signature_slice = slice_of(bytes, cursor, 64)?;
    cursor += 64;
    let mut signature = [0u8; 64];
    signature.copy_from_slice(signature_slice);

    if cursor != bytes.len() {
        return Err(WireError::TrailingBytes);
    }

    Ok(Block {
        header,
        heartbeats,
        transactions,
        signature,
    })
}

fn read_u64(bytes: &[u8], cursor: &mut usize) -> Result<u64, WireError> {
    let slice = slice_of(bytes, *cursor, 8)?;
    *cursor += 8;
    Ok(u64::from_le_bytes(slice.try_into().unwrap()))
}

fn read_u32(bytes: &[u8], cursor: &mut usize) -> Result<u32, WireError> {
    let slice = slice_of(bytes, *cursor, 4)?;
    *cursor += 4;
    Ok(u32::from_le_bytes(slice.try_into().unwrap()))
}

fn slice_of(bytes: &[u8], start: usize, len: usize) -> Result<&[u8], WireError> {
    bytes
        .get(start..start + len)
        .ok_or(WireError::TruncatedHeader(start + len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParticipationTier;

    fn sample_block() -> Block {
        Block {
            header: BlockHeader {
                version: 1,
                timestamp_ms: 1_700_000_000_000,
                height: 3,
                parent_hashes: vec![[1u8; 32], [2u8; 32]],
                vdf_output: [3u8; 32],
                vdf_iterations: 1 << 24,
                heartbeat_root: [0u8; 32],
                tx_root: [0u8; 32],
                state_root: [4u8; 32],
                producer_id: [5u8; 32],
                nonce: 42,
            },
            heartbeats: vec![HeartbeatRecord::Light {
                node_id: [6u8; 32],
                source_tier: ParticipationTier::Tier2,
                timestamp_ms: 123,
                prev_hash: [0u8; 32],
            }],
            transactions: vec![vec![1, 2, 3], vec![4, 5]],
            signature: [9u8; 64],
        }
    }

    #[test]
    fn header_roundtrip() {
        let block = sample_block();
        let encoded = encode_header(&block.header);
        assert_eq!(encoded.len(), FIXED_HEADER_LEN + 32 * 2);
        let (decoded, consumed) = decode_header(&encoded, 8).unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded, block.header);
    }

    #[test]
    fn block_roundtrip() {
        let block = sample_block();
        let encoded = encode_block(&block);
        let decoded = decode_block(&encoded, 8).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn over_max_parents_rejected() {
        let mut block = sample_block();
        block.header.parent_hashes = (0..9).map(|i| [i as u8; 32]).collect();
        let encoded = encode_header(&block.header);
        assert_eq!(decode_header(&encoded, 8), Err(WireError::BadParentCount(9, 8)));
    }

    #[test]
    fn genesis_zero_parents_allowed_when_max_allows_it() {
        let mut block = sample_block();
        block.header.parent_hashes.clear();
        let encoded = encode_header(&block.header);
        let (decoded, _) = decode_header(&encoded, 8).unwrap();
        assert!(decoded.is_genesis());
    }
}
