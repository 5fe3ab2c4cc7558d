use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::resource::{Resource, ResourceKind, Timestamps};

/// Every storage path is `/<domain>/<identifier>`.
/// See <https://developers.flow.com/cadence/language/accounts#paths>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageDomain {
    Private,
    Public,
    Storage,
}

impl StorageDomain {
    pub fn from_path(path: &str) -> anyhow::Result<Self> {
        let raw_domain = path
            .split('/')
            .nth(1)
            .ok_or_else(|| anyhow!("storage path {path:?} has no domain"))?;
        raw_domain.parse()
    }
}

impl FromStr for StorageDomain {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(Self::Private),
            "public" => Ok(Self::Public),
            "storage" => Ok(Self::Storage),
            other => Err(anyhow!("unknown storage domain {other:?}")),
        }
    }
}

pub fn storage_item_id(address: &str, path: &str) -> String {
    format!("{address}.{path}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageItem {
    /// `<address>.<path>`
    pub id: String,
    pub address: String,
    pub path: String,
    pub domain: StorageDomain,
    /// Capability target, only set for linked public paths.
    pub target_path: Option<String>,
    /// Type information of the stored value.
    pub data: serde_json::Value,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageItemPatch {
    pub domain: Option<StorageDomain>,
    pub target_path: Option<Option<String>>,
    pub data: Option<serde_json::Value>,
}

impl Resource for StorageItem {
    const KIND: ResourceKind = ResourceKind::StorageItem;

    type Patch = StorageItemPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn timestamps(&self) -> Timestamps {
        self.timestamps
    }

    fn timestamps_mut(&mut self) -> &mut Timestamps {
        &mut self.timestamps
    }

    fn apply_patch(&mut self, patch: StorageItemPatch) {
        let StorageItemPatch {
            domain,
            target_path,
            data,
        } = patch;

        if let Some(domain) = domain {
            self.domain = domain;
        }
        if let Some(target_path) = target_path {
            self.target_path = target_path;
        }
        if let Some(data) = data {
            self.data = data;
        }
    }

    fn into_patch(self) -> StorageItemPatch {
        StorageItemPatch {
            domain: Some(self.domain),
            target_path: Some(self.target_path),
            data: Some(self.data),
        }
    }
}
