use crate::{
    account::Account,
    block::{Block, BlockHeight},
    contract::{Contract, contract_id},
    event::{Event, event_id},
    resource::Timestamps,
    storage_item::{StorageDomain, StorageItem, storage_item_id},
    transaction::{ProposalKey, Transaction, TransactionStatus},
};

//Dummy producers
//
// All of them leave change timestamps at zero, indexes stamp on write.

pub fn dummy_block_id(height: BlockHeight) -> String {
    format!("block-{height}")
}

///Produce dummy block with
///
/// `height` - block height, parent id is derived from `height - 1`
pub fn produce_dummy_block(height: BlockHeight) -> Block {
    Block {
        id: dummy_block_id(height),
        parent_id: dummy_block_id(height.saturating_sub(1)),
        height,
        timestamp: 1_704_067_200_000 + height * 1_000,
        collection_guarantees: vec![],
        block_seals: vec![],
        signatures: vec![],
        timestamps: Timestamps::default(),
    }
}

pub fn produce_dummy_account(address: &str, balance: u64) -> Account {
    Account {
        id: address.to_string(),
        address: address.to_string(),
        balance,
        code: String::new(),
        keys: vec![],
        block_id: String::new(),
        is_default_account: false,
        timestamps: Timestamps::default(),
    }
}

/// Transaction paid, proposed and authorized by `payer`.
pub fn produce_dummy_transaction(id: &str, block_id: &str, payer: &str) -> Transaction {
    Transaction {
        id: id.to_string(),
        block_id: block_id.to_string(),
        reference_block_id: block_id.to_string(),
        script: "transaction { execute {} }".to_string(),
        arguments: vec![],
        gas_limit: 9_999,
        payer: payer.to_string(),
        proposal_key: ProposalKey {
            address: payer.to_string(),
            key_id: 0,
            sequence_number: 0,
        },
        authorizers: vec![payer.to_string()],
        payload_signatures: vec![],
        envelope_signatures: vec![],
        status: TransactionStatus::default(),
        timestamps: Timestamps::default(),
    }
}

pub fn produce_dummy_event(transaction_id: &str, event_index: u32, event_type: &str) -> Event {
    Event {
        id: event_id(transaction_id, event_index),
        transaction_id: transaction_id.to_string(),
        block_id: String::new(),
        event_index,
        transaction_index: 0,
        event_type: event_type.to_string(),
        data: serde_json::Value::Null,
        timestamps: Timestamps::default(),
    }
}

pub fn produce_dummy_contract(address: &str, name: &str) -> Contract {
    Contract {
        id: contract_id(address, name),
        address: address.to_string(),
        name: name.to_string(),
        code: format!("access(all) contract {name} {{}}"),
        block_id: String::new(),
        timestamps: Timestamps::default(),
    }
}

/// `path` must be a valid `/<domain>/<identifier>` path.
pub fn produce_dummy_storage_item(address: &str, path: &str) -> StorageItem {
    StorageItem {
        id: storage_item_id(address, path),
        address: address.to_string(),
        path: path.to_string(),
        domain: StorageDomain::from_path(path).unwrap_or(StorageDomain::Storage),
        target_path: None,
        data: serde_json::json!({ "type": "A.0x01.Dummy.Resource" }),
        timestamps: Timestamps::default(),
    }
}
