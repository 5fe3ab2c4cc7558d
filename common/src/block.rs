use serde::{Deserialize, Serialize};

use crate::resource::{Resource, ResourceKind, TimeStamp, Timestamps};

pub type BlockHeight = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionGuarantee {
    pub collection_id: String,
    pub signer_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: String,
    pub parent_id: String,
    pub height: BlockHeight,
    /// Chain time the block was proposed at.
    pub timestamp: TimeStamp,
    pub collection_guarantees: Vec<CollectionGuarantee>,
    pub block_seals: Vec<String>,
    pub signatures: Vec<String>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockPatch {
    pub collection_guarantees: Option<Vec<CollectionGuarantee>>,
    pub block_seals: Option<Vec<String>>,
    pub signatures: Option<Vec<String>>,
}

impl Resource for Block {
    const KIND: ResourceKind = ResourceKind::Block;

    type Patch = BlockPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn timestamps(&self) -> Timestamps {
        self.timestamps
    }

    fn timestamps_mut(&mut self) -> &mut Timestamps {
        &mut self.timestamps
    }

    // Id, parent and height identify the block on chain and never change.
    fn apply_patch(&mut self, patch: BlockPatch) {
        let BlockPatch {
            collection_guarantees,
            block_seals,
            signatures,
        } = patch;

        if let Some(collection_guarantees) = collection_guarantees {
            self.collection_guarantees = collection_guarantees;
        }
        if let Some(block_seals) = block_seals {
            self.block_seals = block_seals;
        }
        if let Some(signatures) = signatures {
            self.signatures = signatures;
        }
    }

    fn into_patch(self) -> BlockPatch {
        BlockPatch {
            collection_guarantees: Some(self.collection_guarantees),
            block_seals: Some(self.block_seals),
            signatures: Some(self.signatures),
        }
    }
}

impl Block {
    pub fn collection_ids(&self) -> impl Iterator<Item = &str> {
        self.collection_guarantees
            .iter()
            .map(|guarantee| guarantee.collection_id.as_str())
    }
}
