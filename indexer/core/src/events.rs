//! Core events that point at accounts worth re-indexing.

use common::{Event, address::ensure_prefixed_address, event::core_events};

pub fn is_account_created(event: &Event) -> bool {
    event.event_type == core_events::ACCOUNT_CREATED
}

/// Address whose account or contracts changed because of `event`.
pub fn referenced_address(event: &Event) -> Option<String> {
    let field = match event.event_type.as_str() {
        core_events::ACCOUNT_CREATED
        | core_events::ACCOUNT_KEY_ADDED
        | core_events::ACCOUNT_KEY_REMOVED
        | core_events::ACCOUNT_CONTRACT_ADDED
        | core_events::ACCOUNT_CONTRACT_UPDATED
        | core_events::ACCOUNT_CONTRACT_REMOVED => "address",
        event_type if event_type.ends_with(core_events::TOKENS_WITHDRAWN_SUFFIX) => "from",
        event_type if event_type.ends_with(core_events::TOKENS_DEPOSITED_SUFFIX) => "to",
        _ => return None,
    };

    event.data_address(field).map(ensure_prefixed_address)
}

#[cfg(test)]
mod tests {
    use common::test_utils::produce_dummy_event;
    use serde_json::json;

    use super::*;

    #[test]
    fn account_events_reference_address_field() {
        let mut event = produce_dummy_event("tx1", 0, core_events::ACCOUNT_CONTRACT_ADDED);
        event.data = json!({ "address": "0x01", "contract": "HelloWorld" });

        assert_eq!(referenced_address(&event).as_deref(), Some("0x01"));
        assert!(!is_account_created(&event));
    }

    #[test]
    fn token_events_reference_counterparty() {
        let mut withdrawn = produce_dummy_event("tx1", 0, "A.0ae53cb6e3f42a79.FlowToken.TokensWithdrawn");
        withdrawn.data = json!({ "amount": "1.0", "from": "0xf8d6e0586b0a20c7" });
        let mut deposited = produce_dummy_event("tx1", 1, "A.0ae53cb6e3f42a79.FlowToken.TokensDeposited");
        deposited.data = json!({ "amount": "1.0", "to": null });

        assert_eq!(
            referenced_address(&withdrawn).as_deref(),
            Some("0xf8d6e0586b0a20c7")
        );
        assert_eq!(referenced_address(&deposited), None);
    }

    #[test]
    fn other_events_are_ignored() {
        let mut event = produce_dummy_event("tx1", 0, "A.01.Marketplace.Listed");
        event.data = json!({ "address": "0x01" });
        assert_eq!(referenced_address(&event), None);
    }
}
