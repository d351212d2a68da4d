//! Persisted consensus state.
//!
//! Narrows the teacher's `BlockStorage`/`UtxoStorage` split (`get_block`/
//! `store_block`/`get_tip` over a `sled::Db`, driven through
//! `spawn_blocking` per operation) to the handful of trees this kernel
//! actually needs: DAG nodes by hash, the children index, the irreversible
//! set, and per-block checkpoint accumulator state. Keeps the teacher's sled
//! tuning (`HighThroughput` mode, periodic flush, available-memory-scaled
//! cache) and `spawn_blocking`-per-call shape.

use crate::block::Block;
use crate::finality::AccumulatedState;
use crate::types::Hash256;
use async_trait::async_trait;
use tokio::task::spawn_blocking;

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("serialization failed: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("database error: {0}")]
    Database(#[from] sled::Error),

    #[error("task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("block {0:?} not found")]
    BlockNotFound(Hash256),
}

/// The narrow persistence surface the consensus kernel depends on. A
/// production node is free to back this with any key/value store; the
/// default implementation here uses `sled`. Reputation profiles persist
/// themselves via their own injected `sled::Db` handle (`reputation.rs`)
/// rather than going through this trait.
#[async_trait]
pub trait ConsensusStorage: Send + Sync {
    async fn put_block(&self, block: &Block) -> Result<(), StorageError>;
    async fn get_block(&self, hash: &Hash256) -> Result<Option<Block>, StorageError>;
    async fn children_of(&self, hash: &Hash256) -> Result<Vec<Hash256>, StorageError>;

    async fn set_best_block(&self, hash: Hash256) -> Result<(), StorageError>;
    async fn best_block(&self) -> Result<Option<Hash256>, StorageError>;

    async fn mark_irreversible(&self, hash: Hash256) -> Result<(), StorageError>;
    async fn irreversible_set(&self) -> Result<Vec<Hash256>, StorageError>;

    async fn put_finality_state(&self, hash: Hash256, state: &AccumulatedState) -> Result<(), StorageError>;
    async fn get_finality_state(&self, hash: &Hash256) -> Result<Option<AccumulatedState>, StorageError>;
}

/// Sled-backed `ConsensusStorage`, one tree per kind of record, matching the
/// teacher's `SledBlockStorage` tuning.
pub struct SledConsensusStorage {
    blocks: sled::Tree,
    children: sled::Tree,
    irreversible: sled::Tree,
    finality: sled::Tree,
    meta: sled::Tree,
}

const KEY_BEST_BLOCK: &[u8] = b"best_block";

impl SledConsensusStorage {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        use sysinfo::{MemoryRefreshKind, RefreshKind, System};

        let sys = System::new_with_specifics(RefreshKind::new().with_memory(MemoryRefreshKind::everything()));
        let available_memory = sys.available_memory();
        let cache_size = std::cmp::min(available_memory / 10, 512 * 1024 * 1024);

        let db = sled::Config::new()
            .path(path)
            .cache_capacity(cache_size)
            .flush_every_ms(Some(1000))
            .mode(sled::Mode::HighThroughput)
            .open()?;

        Ok(Self {
            blocks: db.open_tree("blocks")?,
            children: db.open_tree("children")?,
            irreversible: db.open_tree("irreversible")?,
            finality: db.open_tree("finality")?,
            meta: db.open_tree("meta")?,
        })
    }
}

#[async_trait]
impl ConsensusStorage for SledConsensusStorage {
    async fn put_block(&self, block: &Block) -> Result<(), StorageError> {
        let blocks = self.blocks.clone();
        let children = self.children.clone();
        let hash = block.hash();
        let value = bincode::serialize(block)?;
        let parent_hashes = block.header.parent_hashes.clone();

        spawn_blocking(move || {
            blocks.insert(hash, value)?;
            for parent in parent_hashes {
                let mut existing: Vec<Hash256> = children
                    .get(parent)?
                    .map(|v| bincode::deserialize(&v))
                    .transpose()?
                    .unwrap_or_default();
                existing.push(hash);
                children.insert(parent, bincode::serialize(&existing)?)?;
            }
            blocks.flush()?;
            Ok::<_, StorageError>(())
        })
        .await?
    }

    async fn get_block(&self, hash: &Hash256) -> Result<Option<Block>, StorageError> {
        let blocks = self.blocks.clone();
        let hash = *hash;
        spawn_blocking(move || {
            let Some(value) = blocks.get(hash)? else {
                return Ok(None);
            };
            Ok(Some(bincode::deserialize(&value)?))
        })
        .await?
    }

    async fn children_of(&self, hash: &Hash256) -> Result<Vec<Hash256>, StorageError> {
        let children = self.children.clone();
        let hash = *hash;
        spawn_blocking(move || {
            let Some(value) = children.get(hash)? else {
                return Ok(Vec::new());
            };
            Ok(bincode::deserialize(&value)?)
        })
        .await?
    }

    async fn set_best_block(&self, hash: Hash256) -> Result<(), StorageError> {
        let meta = self.meta.clone();
        spawn_blocking(move || {
            meta.insert(KEY_BEST_BLOCK, hash.as_ref())?;
            meta.flush()?;
            Ok::<_, StorageError>(())
        })
        .await?
    }

    async fn best_block(&self) -> Result<Option<Hash256>, StorageError> {
        let meta = self.meta.clone();
        spawn_blocking(move || {
            let Some(bytes) = meta.get(KEY_BEST_BLOCK)? else {
                return Ok(None);
            };
            let hash: Hash256 = bytes.as_ref().try_into().map_err(|_| {
                StorageError::Serialization(bincode::ErrorKind::Custom("malformed best-block key".into()).into())
            })?;
            Ok(Some(hash))
        })
        .await?
    }

    async fn mark_irreversible(&self, hash: Hash256) -> Result<(), StorageError> {
        let irreversible = self.irreversible.clone();
        spawn_blocking(move || {
            irreversible.insert(hash, &[])?;
            Ok::<_, StorageError>(())
        })
        .await?
    }

    async fn irreversible_set(&self) -> Result<Vec<Hash256>, StorageError> {
        let irreversible = self.irreversible.clone();
        spawn_blocking(move || {
            irreversible
                .iter()
                .keys()
                .map(|k| {
                    let key = k?;
                    let hash: Hash256 = key.as_ref().try_into().map_err(|_| {
                        StorageError::Serialization(bincode::ErrorKind::Custom("malformed irreversible key".into()).into())
                    })?;
                    Ok(hash)
                })
                .collect::<Result<Vec<_>, StorageError>>()
        })
        .await?
    }

    async fn put_finality_state(&self, hash: Hash256, state: &AccumulatedState) -> Result<(), StorageError> {
        let finality = self.finality.clone();
        let value = bincode::serialize(&(
            state.initial_vdf_output,
            state.accumulated_checkpoints,
            state.last_checkpoint_output,
            state.last_checkpoint_time_ms,
            state.irreversible,
        ))?;
        spawn_blocking(move || {
            finality.insert(hash, value)?;
            Ok::<_, StorageError>(())
        })
        .await?
    }

    async fn get_finality_state(&self, hash: &Hash256) -> Result<Option<AccumulatedState>, StorageError> {
        let finality = self.finality.clone();
        let hash = *hash;
        spawn_blocking(move || {
            let Some(value) = finality.get(hash)? else {
                return Ok(None);
            };
            let (initial_vdf_output, accumulated_checkpoints, last_checkpoint_output, last_checkpoint_time_ms, irreversible): (
                Hash256,
                u64,
                Hash256,
                i64,
                bool,
            ) = bincode::deserialize(&value)?;
            Ok(Some(AccumulatedState {
                block_hash: hash,
                initial_vdf_output,
                accumulated_checkpoints,
                last_checkpoint_output,
                last_checkpoint_time_ms,
                irreversible,
            }))
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockHeader;

    fn sample_block() -> Block {
        Block {
            header: BlockHeader {
                version: 1,
                timestamp_ms: 0,
                height: 0,
                parent_hashes: vec![],
                vdf_output: [1u8; 32],
                vdf_iterations: 1,
                heartbeat_root: [0u8; 32],
                tx_root: [0u8; 32],
                state_root: [0u8; 32],
                producer_id: [0u8; 32],
                nonce: 0,
            },
            heartbeats: vec![],
            transactions: vec![],
            signature: [0u8; 64],
        }
    }

    #[tokio::test]
    async fn put_and_get_block_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SledConsensusStorage::open(dir.path().join("db").to_str().unwrap()).unwrap();

        let block = sample_block();
        let hash = block.hash();
        storage.put_block(&block).await.unwrap();

        let fetched = storage.get_block(&hash).await.unwrap().unwrap();
        assert_eq!(fetched.header, block.header);
    }

    #[tokio::test]
    async fn best_block_pointer_persists() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SledConsensusStorage::open(dir.path().join("db").to_str().unwrap()).unwrap();

        assert_eq!(storage.best_block().await.unwrap(), None);
        storage.set_best_block([7u8; 32]).await.unwrap();
        assert_eq!(storage.best_block().await.unwrap(), Some([7u8; 32]));
    }

    #[tokio::test]
    async fn irreversible_set_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SledConsensusStorage::open(dir.path().join("db").to_str().unwrap()).unwrap();

        storage.mark_irreversible([1u8; 32]).await.unwrap();
        storage.mark_irreversible([2u8; 32]).await.unwrap();
        let mut set = storage.irreversible_set().await.unwrap();
        set.sort();
        assert_eq!(set, vec![[1u8; 32], [2u8; 32]]);
    }
}
