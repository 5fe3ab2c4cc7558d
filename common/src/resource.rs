use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Unix time in milliseconds.
pub type TimeStamp = u64;

/// Change timestamps every indexed resource carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timestamps {
    pub created_at: TimeStamp,
    pub updated_at: TimeStamp,
}

impl Timestamps {
    pub fn new(at: TimeStamp) -> Self {
        Self {
            created_at: at,
            updated_at: at,
        }
    }

    /// Latest change to the resource, the value polling cursors are built from.
    pub fn last_changed_at(&self) -> TimeStamp {
        self.created_at.max(self.updated_at)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Account,
    Block,
    Transaction,
    Event,
    Contract,
    StorageItem,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::Account,
        ResourceKind::Block,
        ResourceKind::Transaction,
        ResourceKind::Event,
        ResourceKind::Contract,
        ResourceKind::StorageItem,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Account => "account",
            ResourceKind::Block => "block",
            ResourceKind::Transaction => "transaction",
            ResourceKind::Event => "event",
            ResourceKind::Contract => "contract",
            ResourceKind::StorageItem => "storage_item",
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Base contract of every resource kind held in a resource index.
///
/// Partial updates go through [`Resource::Patch`], an explicit per-kind list of optional
/// fields. Fields left as `None` keep their stored value.
pub trait Resource: Clone + PartialEq + Send + Sync + 'static {
    const KIND: ResourceKind;

    type Patch: Send + 'static;

    fn id(&self) -> &str;

    fn timestamps(&self) -> Timestamps;

    fn timestamps_mut(&mut self) -> &mut Timestamps;

    fn apply_patch(&mut self, patch: Self::Patch);

    /// Patch overriding every mutable field with the values of `self`.
    fn into_patch(self) -> Self::Patch;

    fn last_changed_at(&self) -> TimeStamp {
        self.timestamps().last_changed_at()
    }

    /// Equality ignoring change timestamps.
    fn content_eq(&self, other: &Self) -> bool {
        let mut lhs = self.clone();
        let mut rhs = other.clone();
        *lhs.timestamps_mut() = Timestamps::default();
        *rhs.timestamps_mut() = Timestamps::default();
        lhs == rhs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_changed_at_takes_the_later_stamp() {
        let stamps = Timestamps {
            created_at: 10,
            updated_at: 25,
        };
        assert_eq!(stamps.last_changed_at(), 25);

        // Clock skew between writers must not hide a creation.
        let skewed = Timestamps {
            created_at: 30,
            updated_at: 25,
        };
        assert_eq!(skewed.last_changed_at(), 30);
    }

    #[test]
    fn timestamps_serialize_camel_case() {
        let json = serde_json::to_value(Timestamps::new(7)).unwrap();
        assert_eq!(json, serde_json::json!({ "createdAt": 7, "updatedAt": 7 }));
    }
}
