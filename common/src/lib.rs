//! Resource model shared by the index, the ingestion core and the polling service.

pub mod account;
pub mod address;
pub mod block;
pub mod clock;
pub mod config;
pub mod contract;
pub mod event;
pub mod resource;
pub mod storage_item;
pub mod transaction;

// Dummy resource producers, shared by tests of downstream crates
pub mod test_utils;

pub use account::{Account, AccountKey, AccountPatch, HashAlgorithm, SignatureAlgorithm};
pub use block::{Block, BlockPatch, CollectionGuarantee};
pub use contract::{Contract, ContractPatch};
pub use event::{Event, EventPatch};
pub use resource::{Resource, ResourceKind, TimeStamp, Timestamps};
pub use storage_item::{StorageDomain, StorageItem, StorageItemPatch};
pub use transaction::{
    ExecutionStatus, GrpcStatus, ProposalKey, SignableObject, Transaction, TransactionPatch,
    TransactionStatus,
};
