use serde::{Deserialize, Serialize};

use crate::chain::EpochId;
use crate::header::{DsBlock, Hash32, TxBlock};

/// Which of the two source-chain block types a record holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// Directory-service block opening the committee's authority period.
    Boundary,
    /// First transaction block the destination chain trusts.
    Content,
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockKind::Boundary => f.write_str("boundary"),
            BlockKind::Content => f.write_str("content"),
        }
    }
}

/// Decoded block, serialised without a tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SourceBlock {
    Ds(DsBlock),
    Tx(TxBlock),
}

/// Decoded block tagged with the epoch it was requested for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRecord {
    pub epoch: EpochId,
    pub block: SourceBlock,
}

impl BlockRecord {
    pub fn boundary(epoch: EpochId, block: DsBlock) -> Self {
        Self {
            epoch,
            block: SourceBlock::Ds(block),
        }
    }

    pub fn content(epoch: EpochId, block: TxBlock) -> Self {
        Self {
            epoch,
            block: SourceBlock::Tx(block),
        }
    }

    pub fn kind(&self) -> BlockKind {
        match self.block {
            SourceBlock::Ds(_) => BlockKind::Boundary,
            SourceBlock::Tx(_) => BlockKind::Content,
        }
    }

    pub fn block_num(&self) -> u64 {
        match &self.block {
            SourceBlock::Ds(block) => block.block_header.block_num,
            SourceBlock::Tx(block) => block.block_header.block_num,
        }
    }

    pub fn block_hash(&self) -> &Hash32 {
        match &self.block {
            SourceBlock::Ds(block) => &block.block_hash,
            SourceBlock::Tx(block) => &block.block_hash,
        }
    }

    pub fn block_hash_hex(&self) -> String {
        hex::encode(self.block_hash())
    }
}
