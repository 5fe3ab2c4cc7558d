use serde::{Deserialize, Serialize};

use crate::resource::{Resource, ResourceKind, Timestamps};

/// Core event types emitted by the protocol itself.
/// See <https://developers.flow.com/cadence/language/core-events>
pub mod core_events {
    pub const ACCOUNT_CREATED: &str = "flow.AccountCreated";
    pub const ACCOUNT_KEY_ADDED: &str = "flow.AccountKeyAdded";
    pub const ACCOUNT_KEY_REMOVED: &str = "flow.AccountKeyRemoved";
    pub const ACCOUNT_CONTRACT_ADDED: &str = "flow.AccountContractAdded";
    pub const ACCOUNT_CONTRACT_UPDATED: &str = "flow.AccountContractUpdated";
    pub const ACCOUNT_CONTRACT_REMOVED: &str = "flow.AccountContractRemoved";

    /// Suffixes of the fungible token events, the prefix carries the token contract address.
    pub const TOKENS_WITHDRAWN_SUFFIX: &str = ".FlowToken.TokensWithdrawn";
    pub const TOKENS_DEPOSITED_SUFFIX: &str = ".FlowToken.TokensDeposited";
}

pub fn event_id(transaction_id: &str, event_index: u32) -> String {
    format!("{transaction_id}.{event_index}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// `<transaction_id>.<event_index>`
    pub id: String,
    pub transaction_id: String,
    pub block_id: String,
    pub event_index: u32,
    pub transaction_index: u32,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: serde_json::Value,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl Event {
    /// Address field of the event payload, if it has one.
    pub fn data_address(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(serde_json::Value::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPatch {
    pub block_id: Option<String>,
    pub transaction_index: Option<u32>,
    pub event_type: Option<String>,
    pub data: Option<serde_json::Value>,
}

impl Resource for Event {
    const KIND: ResourceKind = ResourceKind::Event;

    type Patch = EventPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn timestamps(&self) -> Timestamps {
        self.timestamps
    }

    fn timestamps_mut(&mut self) -> &mut Timestamps {
        &mut self.timestamps
    }

    fn apply_patch(&mut self, patch: EventPatch) {
        let EventPatch {
            block_id,
            transaction_index,
            event_type,
            data,
        } = patch;

        if let Some(block_id) = block_id {
            self.block_id = block_id;
        }
        if let Some(transaction_index) = transaction_index {
            self.transaction_index = transaction_index;
        }
        if let Some(event_type) = event_type {
            self.event_type = event_type;
        }
        if let Some(data) = data {
            self.data = data;
        }
    }

    fn into_patch(self) -> EventPatch {
        EventPatch {
            block_id: Some(self.block_id),
            transaction_index: Some(self.transaction_index),
            event_type: Some(self.event_type),
            data: Some(self.data),
        }
    }
}
