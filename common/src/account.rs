use std::{fmt::Display, str::FromStr};

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::resource::{Resource, ResourceKind, Timestamps};

/// See <https://developers.flow.com/cadence/language/crypto#hashing>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    #[serde(rename = "ECDSA_P256")]
    EcdsaP256,
    #[serde(rename = "ECDSA_secp256k1")]
    EcdsaSecp256k1,
    #[serde(rename = "BLS_BLS12_381")]
    BlsBls12381,
}

impl FromStr for SignatureAlgorithm {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ECDSA_P256" => Ok(Self::EcdsaP256),
            "ECDSA_secp256k1" | "ECDSA_SECP256K1" => Ok(Self::EcdsaSecp256k1),
            "BLS_BLS12_381" => Ok(Self::BlsBls12381),
            other => Err(anyhow!("unknown signature algorithm {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    #[serde(rename = "SHA2_256")]
    Sha2_256,
    #[serde(rename = "SHA2_384")]
    Sha2_384,
    #[serde(rename = "SHA3_256")]
    Sha3_256,
    #[serde(rename = "SHA3_384")]
    Sha3_384,
    #[serde(rename = "KMAC128_BLS_BLS12_381")]
    Kmac128BlsBls12381,
    #[serde(rename = "KECCAK_256")]
    Keccak256,
}

impl FromStr for HashAlgorithm {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SHA2_256" => Ok(Self::Sha2_256),
            "SHA2_384" => Ok(Self::Sha2_384),
            "SHA3_256" => Ok(Self::Sha3_256),
            "SHA3_384" => Ok(Self::Sha3_384),
            "KMAC128_BLS_BLS12_381" => Ok(Self::Kmac128BlsBls12381),
            "KECCAK_256" => Ok(Self::Keccak256),
            other => Err(anyhow!("unknown hash algorithm {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountKey {
    pub index: u32,
    pub public_key: String,
    pub sign_algo: Option<SignatureAlgorithm>,
    pub hash_algo: Option<HashAlgorithm>,
    pub weight: u32,
    pub sequence_number: u64,
    pub revoked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Equal to `address`.
    pub id: String,
    pub address: String,
    pub balance: u64,
    pub code: String,
    pub keys: Vec<AccountKey>,
    /// Block the account was last observed in.
    pub block_id: String,
    pub is_default_account: bool,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountPatch {
    pub balance: Option<u64>,
    pub code: Option<String>,
    pub keys: Option<Vec<AccountKey>>,
    pub block_id: Option<String>,
    pub is_default_account: Option<bool>,
}

impl Resource for Account {
    const KIND: ResourceKind = ResourceKind::Account;

    type Patch = AccountPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn timestamps(&self) -> Timestamps {
        self.timestamps
    }

    fn timestamps_mut(&mut self) -> &mut Timestamps {
        &mut self.timestamps
    }

    fn apply_patch(&mut self, patch: AccountPatch) {
        let AccountPatch {
            balance,
            code,
            keys,
            block_id,
            is_default_account,
        } = patch;

        if let Some(balance) = balance {
            self.balance = balance;
        }
        if let Some(code) = code {
            self.code = code;
        }
        if let Some(keys) = keys {
            self.keys = keys;
        }
        if let Some(block_id) = block_id {
            self.block_id = block_id;
        }
        if let Some(is_default_account) = is_default_account {
            self.is_default_account = is_default_account;
        }
    }

    fn into_patch(self) -> AccountPatch {
        AccountPatch {
            balance: Some(self.balance),
            code: Some(self.code),
            keys: Some(self.keys),
            block_id: Some(self.block_id),
            is_default_account: Some(self.is_default_account),
        }
    }
}

impl Display for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.address)
    }
}
