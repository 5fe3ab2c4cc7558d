//! This crate defines the polling protocol spoken by the indexer service.
//!
//! A client remembers the `latestTimestamp` of the last response and sends it back as the
//! `timestamp` bound of the next request. The server answers with resources changed strictly
//! after that bound, so polling converges without redelivering or missing changes.

use common::{Resource, TimeStamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingQuery {
    /// Exclusive lower bound on `max(createdAt, updatedAt)`, `0` when absent.
    #[serde(default)]
    pub timestamp: TimeStamp,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollingMeta {
    pub latest_timestamp: TimeStamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingResponse<T> {
    pub data: Vec<T>,
    pub meta: PollingMeta,
}

impl<T: Resource> PollingResponse<T> {
    /// Wraps exactly the resources the client is about to receive.
    pub fn new(data: Vec<T>) -> Self {
        let meta = PollingMeta {
            latest_timestamp: latest_timestamp(&data),
        };
        Self { data, meta }
    }
}

/// Highest change timestamp within `resources`, `0` for an empty slice.
pub fn latest_timestamp<T: Resource>(resources: &[T]) -> TimeStamp {
    resources
        .iter()
        .map(|resource| resource.last_changed_at())
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use common::{Timestamps, test_utils::produce_dummy_block};
    use serde_json::json;

    use super::*;

    #[test]
    fn cursor_is_max_of_returned_slice() {
        let mut older = produce_dummy_block(1);
        older.timestamps = Timestamps {
            created_at: 10,
            updated_at: 40,
        };
        let mut newer = produce_dummy_block(2);
        newer.timestamps = Timestamps::new(30);

        let response = PollingResponse::new(vec![older, newer]);
        assert_eq!(response.meta.latest_timestamp, 40);
    }

    #[test]
    fn empty_slice_has_zero_cursor() {
        let response = PollingResponse::<common::Block>::new(vec![]);
        assert_eq!(response.meta.latest_timestamp, 0);
        assert!(response.data.is_empty());
    }

    #[test]
    fn wire_format() {
        let mut block = produce_dummy_block(1);
        block.timestamps = Timestamps::new(5);

        let encoded = serde_json::to_value(PollingResponse::new(vec![block])).unwrap();

        assert_eq!(encoded["meta"], json!({ "latestTimestamp": 5 }));
        assert_eq!(encoded["data"][0]["id"], json!("block-1"));
        assert_eq!(encoded["data"][0]["createdAt"], json!(5));
    }

    #[test]
    fn missing_timestamp_means_zero() {
        let query: PollingQuery = serde_json::from_value(json!({})).unwrap();
        assert_eq!(query.timestamp, 0);
    }
}
