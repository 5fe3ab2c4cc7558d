use std::{fmt::Display, str::FromStr};

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::resource::{Resource, ResourceKind, Timestamps};

/// See <https://developers.flow.com/tools/clients/fcl-js/api#transaction-statuses>
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionStatus {
    #[default]
    Unknown,
    /// Awaiting finalization.
    Pending,
    /// Awaiting execution.
    Finalized,
    /// Awaiting sealing.
    Executed,
    /// Result committed to the chain.
    Sealed,
    Expired,
}

impl ExecutionStatus {
    /// Position in the execution lifecycle. Terminal states share the top rank.
    pub fn rank(&self) -> u8 {
        match self {
            ExecutionStatus::Unknown => 0,
            ExecutionStatus::Pending => 1,
            ExecutionStatus::Finalized => 2,
            ExecutionStatus::Executed => 3,
            ExecutionStatus::Sealed | ExecutionStatus::Expired => 4,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, ExecutionStatus::Sealed | ExecutionStatus::Expired)
    }
}

impl FromStr for ExecutionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "Unknown" => Ok(Self::Unknown),
            "Pending" => Ok(Self::Pending),
            "Finalized" => Ok(Self::Finalized),
            "Executed" => Ok(Self::Executed),
            "Sealed" => Ok(Self::Sealed),
            "Expired" => Ok(Self::Expired),
            other => Err(anyhow!("unknown execution status {other:?}")),
        }
    }
}

impl Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrpcStatus {
    #[default]
    Ok,
    Failed,
}

impl GrpcStatus {
    /// Some emulator versions report codes other than 0 and 1, those are all failures.
    /// See <https://github.com/onflow/flow-go/issues/4494#issuecomment-1601995168>
    pub fn from_status_code(code: u32) -> Self {
        match code {
            0 => GrpcStatus::Ok,
            _ => GrpcStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStatus {
    pub execution_status: ExecutionStatus,
    pub grpc_status: GrpcStatus,
    pub error_message: String,
}

impl TransactionStatus {
    pub fn advances_over(&self, previous: &TransactionStatus) -> bool {
        self.execution_status.rank() > previous.execution_status.rank()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalKey {
    pub address: String,
    pub key_id: u32,
    pub sequence_number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignableObject {
    pub address: String,
    pub key_id: u32,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub block_id: String,
    pub reference_block_id: String,
    pub script: String,
    /// Decoded argument values, type annotations included.
    pub arguments: Vec<serde_json::Value>,
    pub gas_limit: u64,
    pub payer: String,
    pub proposal_key: ProposalKey,
    pub authorizers: Vec<String>,
    pub payload_signatures: Vec<SignableObject>,
    pub envelope_signatures: Vec<SignableObject>,
    pub status: TransactionStatus,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl Transaction {
    /// Addresses that took part in the transaction: payer, proposer and authorizers.
    pub fn participant_addresses(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.payer.as_str())
            .chain(std::iter::once(self.proposal_key.address.as_str()))
            .chain(self.authorizers.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionPatch {
    pub block_id: Option<String>,
    pub reference_block_id: Option<String>,
    pub script: Option<String>,
    pub arguments: Option<Vec<serde_json::Value>>,
    pub gas_limit: Option<u64>,
    pub payer: Option<String>,
    pub proposal_key: Option<ProposalKey>,
    pub authorizers: Option<Vec<String>>,
    pub payload_signatures: Option<Vec<SignableObject>>,
    pub envelope_signatures: Option<Vec<SignableObject>>,
    pub status: Option<TransactionStatus>,
}

impl Resource for Transaction {
    const KIND: ResourceKind = ResourceKind::Transaction;

    type Patch = TransactionPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn timestamps(&self) -> Timestamps {
        self.timestamps
    }

    fn timestamps_mut(&mut self) -> &mut Timestamps {
        &mut self.timestamps
    }

    fn apply_patch(&mut self, patch: TransactionPatch) {
        let TransactionPatch {
            block_id,
            reference_block_id,
            script,
            arguments,
            gas_limit,
            payer,
            proposal_key,
            authorizers,
            payload_signatures,
            envelope_signatures,
            status,
        } = patch;

        if let Some(block_id) = block_id {
            self.block_id = block_id;
        }
        if let Some(reference_block_id) = reference_block_id {
            self.reference_block_id = reference_block_id;
        }
        if let Some(script) = script {
            self.script = script;
        }
        if let Some(arguments) = arguments {
            self.arguments = arguments;
        }
        if let Some(gas_limit) = gas_limit {
            self.gas_limit = gas_limit;
        }
        if let Some(payer) = payer {
            self.payer = payer;
        }
        if let Some(proposal_key) = proposal_key {
            self.proposal_key = proposal_key;
        }
        if let Some(authorizers) = authorizers {
            self.authorizers = authorizers;
        }
        if let Some(payload_signatures) = payload_signatures {
            self.payload_signatures = payload_signatures;
        }
        if let Some(envelope_signatures) = envelope_signatures {
            self.envelope_signatures = envelope_signatures;
        }
        if let Some(status) = status {
            self.status = status;
        }
    }

    fn into_patch(self) -> TransactionPatch {
        TransactionPatch {
            block_id: Some(self.block_id),
            reference_block_id: Some(self.reference_block_id),
            script: Some(self.script),
            arguments: Some(self.arguments),
            gas_limit: Some(self.gas_limit),
            payer: Some(self.payer),
            proposal_key: Some(self.proposal_key),
            authorizers: Some(self.authorizers),
            payload_signatures: Some(self.payload_signatures),
            envelope_signatures: Some(self.envelope_signatures),
            status: Some(self.status),
        }
    }
}
