//! Access REST API payloads.
//!
//! See <https://developers.flow.com/http-api>

use std::{collections::BTreeMap, str::FromStr};

use chrono::DateTime;
use common::{
    Account, AccountKey, Block, CollectionGuarantee, Contract, Event, ExecutionStatus,
    GrpcStatus, ProposalKey, SignableObject, StorageDomain, StorageItem, Timestamps, Transaction,
    TransactionStatus,
    address::ensure_prefixed_address,
    contract::contract_id,
    event::event_id,
    storage_item::storage_item_id,
};
use serde::{Deserialize, Deserializer, de::Error as _};

use crate::{
    GatewayResult,
    cadence::{decode_base64_json, decode_base64_string, decode_value},
    error::GatewayError,
};

/// Integers are transported as strings.
fn from_str_value<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(D::Error::custom)
}

#[derive(Debug, Deserialize)]
pub struct RestBlock {
    pub header: RestBlockHeader,
    #[serde(default)]
    pub payload: Option<RestBlockPayload>,
}

#[derive(Debug, Deserialize)]
pub struct RestBlockHeader {
    pub id: String,
    pub parent_id: String,
    #[serde(deserialize_with = "from_str_value")]
    pub height: u64,
    pub timestamp: String,
    #[serde(default)]
    pub parent_voter_signature: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RestBlockPayload {
    #[serde(default)]
    pub collection_guarantees: Vec<RestCollectionGuarantee>,
    #[serde(default)]
    pub block_seals: Vec<RestBlockSeal>,
}

#[derive(Debug, Deserialize)]
pub struct RestCollectionGuarantee {
    pub collection_id: String,
    #[serde(default)]
    pub signer_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RestBlockSeal {
    pub block_id: String,
}

impl TryFrom<RestBlock> for Block {
    type Error = GatewayError;

    fn try_from(value: RestBlock) -> GatewayResult<Self> {
        let RestBlock { header, payload } = value;
        let payload = payload.unwrap_or_default();

        let timestamp = DateTime::parse_from_rfc3339(&header.timestamp)
            .map_err(|err| {
                GatewayError::decode(format!("block {} timestamp: {err}", header.id))
            })?
            .timestamp_millis();

        Ok(Block {
            id: header.id,
            parent_id: header.parent_id,
            height: header.height,
            timestamp: u64::try_from(timestamp).unwrap_or_default(),
            collection_guarantees: payload
                .collection_guarantees
                .into_iter()
                .map(|guarantee| CollectionGuarantee {
                    collection_id: guarantee.collection_id,
                    signer_ids: guarantee.signer_ids,
                })
                .collect(),
            block_seals: payload
                .block_seals
                .into_iter()
                .map(|seal| seal.block_id)
                .collect(),
            signatures: header.parent_voter_signature.into_iter().collect(),
            timestamps: Timestamps::default(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct RestCollection {
    #[serde(default)]
    pub transactions: Vec<RestTransaction>,
}

#[derive(Debug, Deserialize)]
pub struct RestProposalKey {
    pub address: String,
    #[serde(deserialize_with = "from_str_value")]
    pub key_index: u32,
    #[serde(deserialize_with = "from_str_value")]
    pub sequence_number: u64,
}

#[derive(Debug, Deserialize)]
pub struct RestSignature {
    pub address: String,
    #[serde(deserialize_with = "from_str_value")]
    pub key_index: u32,
    pub signature: String,
}

impl From<RestSignature> for SignableObject {
    fn from(value: RestSignature) -> Self {
        SignableObject {
            address: ensure_prefixed_address(&value.address),
            key_id: value.key_index,
            signature: value.signature,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RestTransaction {
    pub id: String,
    pub script: String,
    #[serde(default)]
    pub arguments: Vec<String>,
    pub reference_block_id: String,
    #[serde(deserialize_with = "from_str_value")]
    pub gas_limit: u64,
    pub payer: String,
    pub proposal_key: RestProposalKey,
    #[serde(default)]
    pub authorizers: Vec<String>,
    #[serde(default)]
    pub payload_signatures: Vec<RestSignature>,
    #[serde(default)]
    pub envelope_signatures: Vec<RestSignature>,
}

impl RestTransaction {
    pub fn into_transaction(
        self,
        block_id: &str,
        status: TransactionStatus,
    ) -> GatewayResult<Transaction> {
        let arguments = self
            .arguments
            .iter()
            .map(|argument| decode_base64_json(argument))
            .collect::<GatewayResult<Vec<_>>>()?;

        Ok(Transaction {
            script: decode_base64_string(&self.script)?,
            arguments,
            block_id: block_id.to_string(),
            reference_block_id: self.reference_block_id,
            gas_limit: self.gas_limit,
            payer: ensure_prefixed_address(&self.payer),
            proposal_key: ProposalKey {
                address: ensure_prefixed_address(&self.proposal_key.address),
                key_id: self.proposal_key.key_index,
                sequence_number: self.proposal_key.sequence_number,
            },
            authorizers: self
                .authorizers
                .iter()
                .map(|address| ensure_prefixed_address(address))
                .collect(),
            payload_signatures: self.payload_signatures.into_iter().map(Into::into).collect(),
            envelope_signatures: self
                .envelope_signatures
                .into_iter()
                .map(Into::into)
                .collect(),
            status,
            id: self.id,
            timestamps: Timestamps::default(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct RestTransactionResult {
    #[serde(default)]
    pub block_id: String,
    pub status: String,
    #[serde(default)]
    pub status_code: u32,
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub events: Vec<RestEvent>,
}

impl RestTransactionResult {
    pub fn status(&self) -> GatewayResult<TransactionStatus> {
        Ok(TransactionStatus {
            execution_status: ExecutionStatus::from_str(&self.status)
                .map_err(GatewayError::decode)?,
            grpc_status: GrpcStatus::from_status_code(self.status_code),
            error_message: self.error_message.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct RestEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub transaction_id: String,
    #[serde(deserialize_with = "from_str_value")]
    pub transaction_index: u32,
    #[serde(deserialize_with = "from_str_value")]
    pub event_index: u32,
    pub payload: String,
}

impl RestEvent {
    pub fn into_event(self, block_id: &str) -> GatewayResult<Event> {
        let payload = decode_base64_json(&self.payload)?;

        Ok(Event {
            id: event_id(&self.transaction_id, self.event_index),
            transaction_id: self.transaction_id,
            block_id: block_id.to_string(),
            event_index: self.event_index,
            transaction_index: self.transaction_index,
            event_type: self.event_type,
            data: decode_value(&payload),
            timestamps: Timestamps::default(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct RestAccountKey {
    #[serde(deserialize_with = "from_str_value")]
    pub index: u32,
    pub public_key: String,
    pub signing_algorithm: String,
    pub hashing_algorithm: String,
    #[serde(deserialize_with = "from_str_value")]
    pub sequence_number: u64,
    #[serde(deserialize_with = "from_str_value")]
    pub weight: u32,
    #[serde(default)]
    pub revoked: bool,
}

#[derive(Debug, Deserialize)]
pub struct RestAccount {
    pub address: String,
    #[serde(deserialize_with = "from_str_value")]
    pub balance: u64,
    #[serde(default)]
    pub keys: Vec<RestAccountKey>,
    /// Contract name to base64 encoded code.
    #[serde(default)]
    pub contracts: BTreeMap<String, String>,
}

impl RestAccount {
    pub fn to_account(&self) -> Account {
        let address = ensure_prefixed_address(&self.address);

        Account {
            id: address.clone(),
            address,
            balance: self.balance,
            code: String::new(),
            keys: self
                .keys
                .iter()
                .map(|key| AccountKey {
                    index: key.index,
                    public_key: key.public_key.clone(),
                    sign_algo: key.signing_algorithm.parse().ok(),
                    hash_algo: key.hashing_algorithm.parse().ok(),
                    weight: key.weight,
                    sequence_number: key.sequence_number,
                    revoked: key.revoked,
                })
                .collect(),
            block_id: String::new(),
            is_default_account: false,
            timestamps: Timestamps::default(),
        }
    }

    pub fn contracts(&self) -> GatewayResult<Vec<Contract>> {
        let address = ensure_prefixed_address(&self.address);

        self.contracts
            .iter()
            .map(|(name, code)| {
                Ok(Contract {
                    id: contract_id(&address, name),
                    address: address.clone(),
                    name: name.clone(),
                    code: decode_base64_string(code)?,
                    block_id: String::new(),
                    timestamps: Timestamps::default(),
                })
            })
            .collect()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct RestScriptRequest {
    pub script: String,
    pub arguments: Vec<String>,
}

/// Converts the decoded result of the storage traversal script.
pub fn storage_items(address: &str, listing: &serde_json::Value) -> GatewayResult<Vec<StorageItem>> {
    let address = ensure_prefixed_address(address);
    let entries = listing
        .as_array()
        .ok_or_else(|| GatewayError::decode("storage listing is not an array"))?;

    entries
        .iter()
        .map(|entry| {
            let path = entry
                .get("path")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| GatewayError::decode("storage entry without path"))?;
            let domain = StorageDomain::from_path(path).map_err(GatewayError::decode)?;
            let target_path = entry
                .get("targetPath")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string);

            Ok(StorageItem {
                id: storage_item_id(&address, path),
                address: address.clone(),
                path: path.to_string(),
                domain,
                target_path,
                data: serde_json::json!({
                    "type": entry.get("type").cloned().unwrap_or_default()
                }),
                timestamps: Timestamps::default(),
            })
        })
        .collect()
}
