use common::ResourceKind;

/// Data the gateway returned that cannot be merged without corrupting an index.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error("Malformed {kind} {id:?}: {reason}")]
    MalformedRecord {
        kind: ResourceKind,
        id: String,
        reason: String,
    },
}

impl IngestError {
    pub fn malformed(kind: ResourceKind, id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            kind,
            id: id.into(),
            reason: reason.into(),
        }
    }
}
