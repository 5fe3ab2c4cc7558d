use serde::{Deserialize, Serialize};

use crate::resource::{Resource, ResourceKind, Timestamps};

pub fn contract_id(address: &str, name: &str) -> String {
    format!("{address}.{name}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    /// `<address>.<name>`
    pub id: String,
    pub address: String,
    pub name: String,
    pub code: String,
    pub block_id: String,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractPatch {
    pub code: Option<String>,
    pub block_id: Option<String>,
}

impl Resource for Contract {
    const KIND: ResourceKind = ResourceKind::Contract;

    type Patch = ContractPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn timestamps(&self) -> Timestamps {
        self.timestamps
    }

    fn timestamps_mut(&mut self) -> &mut Timestamps {
        &mut self.timestamps
    }

    fn apply_patch(&mut self, patch: ContractPatch) {
        let ContractPatch { code, block_id } = patch;

        if let Some(code) = code {
            self.code = code;
        }
        if let Some(block_id) = block_id {
            self.block_id = block_id;
        }
    }

    fn into_patch(self) -> ContractPatch {
        ContractPatch {
            code: Some(self.code),
            block_id: Some(self.block_id),
        }
    }
}
