use common::ResourceKind;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("{kind} {id:?} already exists")]
    AlreadyExists { kind: ResourceKind, id: String },
    #[error("{kind} {id:?} not found")]
    NotFound { kind: ResourceKind, id: String },
}

impl IndexError {
    pub fn already_exists(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            id: id.into(),
        }
    }

    pub fn not_found(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
